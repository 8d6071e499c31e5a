//! End-to-end scenarios against an in-memory `CoreContext`, covering the
//! Data Management Model's public mutation API the way a caller on the other
//! side of the transport would exercise it.

use std::collections::HashMap;

use nepomuk_core::consts::{
    NAO_HAS_SUB_RESOURCE, NAO_IDENTIFIER, NAO_PREF_LABEL, NIE_URL, NRL_DEFINING_PROPERTY,
    OWL_DATATYPE_PROPERTY, OWL_OBJECT_PROPERTY, RDF_TYPE, RDFS_RESOURCE,
};
use nepomuk_core::{
    ChangeKind, Config, CoreContext, DescribeFlags, IdentificationMode, RemoveFlags,
    SimpleResourceGraph, StoreFlags, SyncResource, Value, WatchFilter,
};
use oxigraph::model::vocab::xsd;
use oxigraph::model::{GraphName, Literal, NamedNode, Quad, Term};

const NFO_FILE_DATA_OBJECT: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#FileDataObject";
const NCO_EMAIL_ADDRESS: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nco#emailAddress";
const NCO_FULLNAME: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nco#fullname";
const NIE_TITLE: &str = "http://www.semanticdesktop.org/ontologies/2007/01/19/nie#title";
const NAO_TAG: &str = "http://www.semanticdesktop.org/ontologies/2007/08/15/nao#Tag";
const NAO_HAS_TAG: &str = "http://www.semanticdesktop.org/ontologies/2007/08/15/nao#hasTag";

fn new_ctx() -> CoreContext {
    CoreContext::open(Config::builder().build().unwrap()).unwrap()
}

/// Declares `uri` as a property in the store's ontology graph and rebuilds
/// the CPT so `storeResources`'s "unknown property" check accepts it. Only
/// the facets a given test actually needs get declared; everything else is
/// left to the CPT's defaults (unknown = defining, max-cardinality 0 =
/// unbounded).
fn declare_property(ctx: &CoreContext, uri: &str, object_valued: bool, max_cardinality: Option<u32>, defining: Option<bool>) {
    let prop = NamedNode::new_unchecked(uri);
    let prop_type = if object_valued { OWL_OBJECT_PROPERTY } else { OWL_DATATYPE_PROPERTY };
    ctx.store()
        .inner()
        .insert(&Quad::new(prop.clone(), RDF_TYPE, prop_type, GraphName::DefaultGraph))
        .unwrap();
    if let Some(max) = max_cardinality {
        ctx.store()
            .inner()
            .insert(&Quad::new(
                prop.clone(),
                nepomuk_core::consts::NRL_MAX_CARDINALITY,
                Literal::new_typed_literal(max.to_string(), xsd::INTEGER),
                GraphName::DefaultGraph,
            ))
            .unwrap();
    }
    if let Some(true) = defining {
        ctx.store()
            .inner()
            .insert(&Quad::new(prop.clone(), RDF_TYPE, NRL_DEFINING_PROPERTY, GraphName::DefaultGraph))
            .unwrap();
    }
    ctx.cpt().rebuild(ctx.store().inner()).unwrap();
}

fn literal_values(ctx: &CoreContext, subject: &NamedNode, property: &NamedNode) -> Vec<Term> {
    ctx.store()
        .inner()
        .quads_for_pattern(Some(subject.as_ref().into()), Some(property.as_ref()), None, None)
        .filter_map(std::result::Result::ok)
        .map(|q| q.object)
        .collect()
}

// ---------------------------------------------------------------
// S1 - add/set/remove on a literal property
// ---------------------------------------------------------------

#[test]
fn s1_add_set_remove_on_a_literal_property() {
    let ctx = new_ctx();
    let tag_type = NamedNode::new_unchecked(NAO_TAG);
    let identifier = NamedNode::from(NAO_IDENTIFIER);

    let r = ctx.create_resource(&[tag_type], "", "", "appA").unwrap();

    ctx.add_property(&[r.clone()], &identifier, &[Value::from("Work")], "appA")
        .unwrap();
    let values = literal_values(&ctx, &r, &identifier);
    assert_eq!(values.len(), 1);
    assert_eq!(values[0], Term::Literal(Literal::new_simple_literal("Work")));

    ctx.set_property(&[r.clone()], &identifier, &[Value::from("Home")], "appA")
        .unwrap();
    let values = literal_values(&ctx, &r, &identifier);
    assert_eq!(values, vec![Term::Literal(Literal::new_simple_literal("Home"))]);

    ctx.remove_property(&[r.clone()], &identifier, &[Value::from("Home")], "appA")
        .unwrap();
    assert!(literal_values(&ctx, &r, &identifier).is_empty());
}

// ---------------------------------------------------------------
// S2 - file by URL
// ---------------------------------------------------------------

#[test]
fn s2_file_by_url_is_identified_across_separate_stores() {
    let ctx = new_ctx();
    declare_property(&ctx, NIE_URL.as_str(), true, Some(1), None);

    let mut first = SyncResource::new("_:a");
    first.insert(
        NamedNode::from(RDF_TYPE),
        Term::NamedNode(NamedNode::new_unchecked(NFO_FILE_DATA_OBJECT)),
    );
    first.insert(
        NamedNode::from(NIE_URL),
        Term::NamedNode(NamedNode::new("file:///tmp/a.txt").unwrap()),
    );
    let mut graph = SimpleResourceGraph::new();
    graph.insert(first);
    let resolved = ctx
        .store_resources(graph, IdentificationMode::IdentifyNew, StoreFlags::default(), &HashMap::new(), "appA")
        .unwrap();
    let u1 = resolved.get("_:a").unwrap().clone();

    let mut second = SyncResource::new("_:b");
    second.insert(
        NamedNode::from(RDF_TYPE),
        Term::NamedNode(NamedNode::new_unchecked(NFO_FILE_DATA_OBJECT)),
    );
    second.insert(
        NamedNode::from(NIE_URL),
        Term::NamedNode(NamedNode::new("file:///tmp/a.txt").unwrap()),
    );
    let mut graph = SimpleResourceGraph::new();
    graph.insert(second);
    let resolved = ctx
        .store_resources(graph, IdentificationMode::IdentifyNew, StoreFlags::default(), &HashMap::new(), "appA")
        .unwrap();
    assert_eq!(resolved.get("_:b").unwrap(), &u1);

    let type_triples: Vec<_> = ctx
        .store()
        .inner()
        .quads_for_pattern(
            Some(u1.as_ref().into()),
            Some(RDF_TYPE),
            Some(NamedNode::new_unchecked(NFO_FILE_DATA_OBJECT).as_ref().into()),
            None,
        )
        .collect();
    assert_eq!(type_triples.len(), 1, "re-storing must not duplicate the type triple");
}

// ---------------------------------------------------------------
// S3 - two-app provenance split
// ---------------------------------------------------------------

#[test]
fn s3_two_app_provenance_split_and_partial_removal() {
    let ctx = new_ctx();
    let has_tag = NamedNode::new_unchecked(NAO_HAS_TAG);
    let r = ctx.create_resource(&[], "", "", "owner").unwrap();

    ctx.add_property(&[r.clone()], &has_tag, &[Value::from("T")], "appA").unwrap();
    ctx.add_property(&[r.clone()], &has_tag, &[Value::from("T")], "appB").unwrap();
    assert_eq!(literal_values(&ctx, &r, &has_tag).len(), 1);

    ctx.remove_data_by_application(&[r.clone()], RemoveFlags::default(), "appA")
        .unwrap();
    assert_eq!(
        literal_values(&ctx, &r, &has_tag),
        vec![Term::Literal(Literal::new_simple_literal("T"))],
        "appB's contribution to the split statement must survive appA's removal"
    );

    ctx.remove_data_by_application(&[r.clone()], RemoveFlags::default(), "appB")
        .unwrap();
    assert!(literal_values(&ctx, &r, &has_tag).is_empty());
}

// ---------------------------------------------------------------
// S4 - sub-resource cascade
// ---------------------------------------------------------------

#[test]
fn s4_sub_resource_cascade_keeps_children_with_another_parent() {
    let ctx = new_ctx();
    declare_property(&ctx, NAO_HAS_SUB_RESOURCE.as_str(), true, None, None);
    declare_property(&ctx, NIE_TITLE, false, None, None);

    let mut parent = SyncResource::new("_:p");
    parent.insert(NamedNode::from(NAO_HAS_SUB_RESOURCE), Term::NamedNode(NamedNode::new_unchecked("_:c")));
    let mut child = SyncResource::new("_:c");
    child.insert(
        NamedNode::new_unchecked(NIE_TITLE),
        Term::Literal(Literal::new_simple_literal("child")),
    );
    let mut graph = SimpleResourceGraph::new();
    graph.insert(parent);
    graph.insert(child);
    let resolved = ctx
        .store_resources(graph, IdentificationMode::IdentifyNew, StoreFlags::default(), &HashMap::new(), "appA")
        .unwrap();
    let p = resolved.get("_:p").unwrap().clone();
    let c = resolved.get("_:c").unwrap().clone();

    // A second parent links to the already-minted child directly; IdentifyNone
    // keeps it from being folded into `p` via the defining-property match that
    // `nao:hasSubResource` (always-defining) would otherwise trigger.
    let mut second_parent = SyncResource::new("_:p2");
    second_parent.insert(NamedNode::from(NAO_HAS_SUB_RESOURCE), Term::NamedNode(c.clone()));
    let mut graph2 = SimpleResourceGraph::new();
    graph2.insert(second_parent);
    let resolved2 = ctx
        .store_resources(graph2, IdentificationMode::IdentifyNone, StoreFlags::default(), &HashMap::new(), "appA")
        .unwrap();
    let p2 = resolved2.get("_:p2").unwrap().clone();
    assert_ne!(p2, p);

    ctx.remove_resources(&[p.clone()], RemoveFlags { remove_sub_resources: true }, "appA")
        .unwrap();

    let describe_p = ctx.describe_resources(&[p.clone()], DescribeFlags::default()).unwrap();
    assert!(describe_p.get(p.as_str()).is_none(), "removed parent must be gone");
    let describe_c = ctx.describe_resources(&[c.clone()], DescribeFlags::default()).unwrap();
    assert!(describe_c.get(c.as_str()).is_some(), "child still owned by p2 must survive");
}

// ---------------------------------------------------------------
// S5 - identification by defining property
// ---------------------------------------------------------------

#[test]
fn s5_identification_by_defining_property_is_stable_across_stores() {
    let ctx = new_ctx();
    declare_property(&ctx, NCO_EMAIL_ADDRESS, false, None, Some(true));
    let email_prop = NamedNode::new_unchecked(NCO_EMAIL_ADDRESS);

    let mut first = SyncResource::new("_:e1");
    first.insert(email_prop.clone(), Term::Literal(Literal::new_simple_literal("x@y")));
    let mut graph = SimpleResourceGraph::new();
    graph.insert(first);
    let resolved = ctx
        .store_resources(graph, IdentificationMode::IdentifyNew, StoreFlags::default(), &HashMap::new(), "appA")
        .unwrap();
    let first_uri = resolved.get("_:e1").unwrap().clone();

    let mut second = SyncResource::new("_:e2");
    second.insert(email_prop, Term::Literal(Literal::new_simple_literal("x@y")));
    let mut graph = SimpleResourceGraph::new();
    graph.insert(second);
    let resolved = ctx
        .store_resources(graph, IdentificationMode::IdentifyNew, StoreFlags::default(), &HashMap::new(), "appA")
        .unwrap();
    assert_eq!(resolved.get("_:e2").unwrap(), &first_uri);
}

// ---------------------------------------------------------------
// S6 - cardinality rejection
// ---------------------------------------------------------------

#[test]
fn s6_cardinality_rejection_leaves_the_store_unchanged() {
    let ctx = new_ctx();
    declare_property(&ctx, NCO_FULLNAME, false, Some(1), None);
    let fullname = NamedNode::new_unchecked(NCO_FULLNAME);
    let c = ctx.create_resource(&[], "", "", "appA").unwrap();

    let err = ctx
        .add_property(&[c.clone()], &fullname, &[Value::from("A"), Value::from("B")], "appA")
        .unwrap_err();
    assert!(matches!(err, nepomuk_core::Error::CardinalityExceeded { .. }));
    assert!(literal_values(&ctx, &c, &fullname).is_empty());
}

// ---------------------------------------------------------------
// Invariants beyond the six named scenarios
// ---------------------------------------------------------------

#[test]
fn invariant_idempotence_of_add_property() {
    let ctx = new_ctx();
    let identifier = NamedNode::from(NAO_IDENTIFIER);
    let r = ctx.create_resource(&[], "", "", "appA").unwrap();

    ctx.add_property(&[r.clone()], &identifier, &[Value::from("x")], "appA").unwrap();
    ctx.add_property(&[r.clone()], &identifier, &[Value::from("x")], "appA").unwrap();
    assert_eq!(literal_values(&ctx, &r, &identifier).len(), 1);
}

#[test]
fn invariant_url_uniqueness_rejects_a_second_claimant() {
    let ctx = new_ctx();
    declare_property(&ctx, NIE_URL.as_str(), true, Some(1), None);
    let url_prop = NamedNode::from(NIE_URL);
    let url = NamedNode::new("file:///tmp/shared.txt").unwrap();

    let a = ctx.create_resource(&[], "", "", "appA").unwrap();
    let b = ctx.create_resource(&[], "", "", "appA").unwrap();
    ctx.add_property(&[a], &url_prop, &[Value::Resource(url.as_str().to_string())], "appA")
        .unwrap();
    let err = ctx
        .add_property(&[b], &url_prop, &[Value::Resource(url.as_str().to_string())], "appA")
        .unwrap_err();
    assert!(matches!(err, nepomuk_core::Error::UniquenessViolation(_)));
}

#[test]
fn invariant_watcher_totality_reports_exactly_the_filtered_changes() {
    let ctx = new_ctx();
    let identifier = NamedNode::from(NAO_IDENTIFIER);
    let pref_label = NamedNode::from(NAO_PREF_LABEL);
    let r = ctx.create_resource(&[], "", "", "appA").unwrap();

    let mut wanted_properties = std::collections::HashSet::new();
    wanted_properties.insert(identifier.clone());
    let (_id, rx) = ctx.watch(WatchFilter {
        resources: None,
        properties: Some(wanted_properties),
        types: None,
    });

    ctx.add_property(&[r.clone()], &identifier, &[Value::from("x")], "appA").unwrap();
    ctx.add_property(&[r.clone()], &pref_label, &[Value::from("ignored")], "appA").unwrap();
    ctx.remove_property(&[r.clone()], &identifier, &[Value::from("x")], "appA").unwrap();

    let added = rx.try_recv().expect("add batch");
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].predicate, identifier);
    assert_eq!(added[0].kind, ChangeKind::Added);

    let removed = rx.try_recv().expect("remove batch");
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].predicate, identifier);
    assert_eq!(removed[0].kind, ChangeKind::Removed);

    assert!(rx.try_recv().is_err(), "the prefLabel mutation must not reach a subscriber filtered to identifier");
}

#[test]
fn invariant_round_trip_through_store_and_describe() {
    let ctx = new_ctx();
    declare_property(&ctx, NAO_PREF_LABEL.as_str(), false, None, None);

    let mut resource = SyncResource::new("_:a");
    resource.insert(NamedNode::from(NAO_PREF_LABEL), Term::Literal(Literal::new_simple_literal("hello")));
    let mut graph = SimpleResourceGraph::new();
    graph.insert(resource);
    let resolved = ctx
        .store_resources(graph, IdentificationMode::IdentifyNew, StoreFlags::default(), &HashMap::new(), "appA")
        .unwrap();
    let uri = resolved.get("_:a").unwrap().clone();

    let described = ctx.describe_resources(&[uri.clone()], DescribeFlags::default()).unwrap();
    let back = described.get(uri.as_str()).expect("described resource present");
    assert_eq!(
        back.values(&NamedNode::from(NAO_PREF_LABEL)),
        &[Term::Literal(Literal::new_simple_literal("hello"))]
    );
}

#[test]
fn unknown_property_is_rejected_by_store_resources() {
    let ctx = new_ctx();
    let mut resource = SyncResource::new("_:a");
    resource.insert(
        NamedNode::new_unchecked("urn:example:neverDeclared"),
        Term::Literal(Literal::new_simple_literal("x")),
    );
    let mut graph = SimpleResourceGraph::new();
    graph.insert(resource);
    let err = ctx
        .store_resources(graph, IdentificationMode::IdentifyNew, StoreFlags::default(), &HashMap::new(), "appA")
        .unwrap_err();
    assert!(matches!(err, nepomuk_core::Error::UnknownProperty(_)));
}

#[test]
fn sanity_check_cpt_is_wired_up() {
    let ctx = new_ctx();
    assert!(ctx.cpt().is_subclass_of(RDFS_RESOURCE, RDFS_RESOURCE));
}

#[test]
fn pre_cancelled_token_aborts_remove_resources_before_any_write() {
    let ctx = new_ctx();
    declare_property(&ctx, NAO_PREF_LABEL.as_str(), false, None, None);
    let r = ctx.create_resource(&[], "", "", "appA").unwrap();
    ctx.add_property(&[r.clone()], &NamedNode::from(NAO_PREF_LABEL), &[Value::from("hi")], "appA")
        .unwrap();

    let token = nepomuk_core::CancellationToken::new();
    token.cancel();
    let err = ctx
        .remove_resources_with_cancellation(&[r.clone()], RemoveFlags::default(), "appA", &token)
        .unwrap_err();
    assert!(matches!(err, nepomuk_core::Error::Cancelled));

    let described = ctx.describe_resources(&[r.clone()], DescribeFlags::default()).unwrap();
    assert!(
        described.get(r.as_str()).is_some(),
        "a cancelled removal must not have touched the resource's statements"
    );
}
