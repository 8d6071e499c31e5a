//! Constant `NamedNodeRef`s for the RDF vocabularies the Data Management
//! Core reasons about directly: RDF, RDFS, OWL, NAO, NIE, NRL, NCO and NFO.

use oxigraph::model::NamedNodeRef;

// rdf / rdfs / owl
pub const RDF_TYPE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#type");
pub const RDFS_RESOURCE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2000/01/rdf-schema#Resource");
pub const RDFS_SUBCLASS_OF: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2000/01/rdf-schema#subClassOf");
pub const RDFS_SUBPROPERTY_OF: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2000/01/rdf-schema#subPropertyOf");
pub const RDFS_DOMAIN: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2000/01/rdf-schema#domain");
pub const RDFS_RANGE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2000/01/rdf-schema#range");
pub const RDFS_LITERAL: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2000/01/rdf-schema#Literal");
pub const OWL_CLASS: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#Class");
pub const OWL_OBJECT_PROPERTY: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#ObjectProperty");
pub const OWL_DATATYPE_PROPERTY: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#DatatypeProperty");

// xsd
pub const XSD_DATE_TIME: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#dateTime");
pub const XSD_DOUBLE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#double");
pub const XSD_INTEGER: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#integer");
pub const XSD_BOOLEAN: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#boolean");
pub const XSD_STRING: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#string");

// nrl (reasoner layer)
pub const NRL_MAX_CARDINALITY: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.semanticdesktop.org/ontologies/2007/08/15/nrl#maxCardinality");
pub const NRL_DEFINING_PROPERTY: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.semanticdesktop.org/ontologies/2007/08/15/nrl#DefiningProperty");
pub const NRL_NON_DEFINING_PROPERTY: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.semanticdesktop.org/ontologies/2007/08/15/nrl#NonDefiningProperty");

// nao (annotation ontology)
pub const NAO_CREATED: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.semanticdesktop.org/ontologies/2007/08/15/nao#created");
pub const NAO_LAST_MODIFIED: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.semanticdesktop.org/ontologies/2007/08/15/nao#lastModified");
pub const NAO_MAINTAINED_BY: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.semanticdesktop.org/ontologies/2007/08/15/nao#maintainedBy");
pub const NAO_HAS_SUB_RESOURCE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.semanticdesktop.org/ontologies/2007/08/15/nao#hasSubResource");
pub const NAO_IDENTIFIER: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.semanticdesktop.org/ontologies/2007/08/15/nao#identifier");
pub const NAO_AGENT: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.semanticdesktop.org/ontologies/2007/08/15/nao#Agent");
pub const NAO_PREF_LABEL: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.semanticdesktop.org/ontologies/2007/08/15/nao#prefLabel");
pub const NAO_DESCRIPTION: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.semanticdesktop.org/ontologies/2007/08/15/nao#description");
pub const NAO_USER_VISIBLE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.semanticdesktop.org/ontologies/2007/08/15/nao#userVisible");
pub const NAO_CREATOR: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.semanticdesktop.org/ontologies/2007/08/15/nao#creator");
pub const NAO_INSTANCE_BASE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.semanticdesktop.org/ontologies/2007/08/15/nao#InstanceBase");
pub const NAO_DISCARDABLE_INSTANCE_BASE: NamedNodeRef<'_> = NamedNodeRef::new_unchecked(
    "http://www.semanticdesktop.org/ontologies/2007/08/15/nao#DiscardableInstanceBase",
);

// nie (information element)
pub const NIE_URL: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.semanticdesktop.org/ontologies/2007/01/19/nie#url");
pub const NIE_DATA_OBJECT: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.semanticdesktop.org/ontologies/2007/01/19/nie#DataObject");

/// Meta-properties excluded from the defining-property comparison used during
/// identification: they describe the storage event, not the resource's identity.
pub const IDENTITY_EXCLUDED_PROPERTIES: [NamedNodeRef<'_>; 4] =
    [NAO_CREATED, NAO_LAST_MODIFIED, NAO_USER_VISIBLE, NAO_CREATOR];

/// Properties that are always defining, regardless of ontology declaration.
pub const ALWAYS_DEFINING_PROPERTIES: [NamedNodeRef<'_>; 2] = [RDF_TYPE, NAO_HAS_SUB_RESOURCE];

/// Properties a caller may never set directly through `addProperty`/`setProperty`.
pub const RDF_SYNTAX_INTERNAL_PROPERTIES: [NamedNodeRef<'_>; 3] =
    [RDF_TYPE, NAO_CREATED, NAO_LAST_MODIFIED];
