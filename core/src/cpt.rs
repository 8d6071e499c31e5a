//! The Class/Property Tree: a cached, in-memory view of the ontology graphs,
//! answering subclass/subproperty, cardinality, range and defining-ness
//! queries on every mutation.
//!
//! Class and property nodes live in a single arena (a `petgraph::DiGraph`);
//! callers refer to them by stable `NodeIndex` internally, by `NamedNode`
//! externally. An edge `child -> parent` records a direct `rdfs:subClassOf`
//! or `rdfs:subPropertyOf` assertion; `all_parents` walks the transitive
//! closure with a visited set so a cyclic ontology (bad inference data)
//! cannot loop forever.

use crate::consts::*;
use crate::errors::{Error, Result};
use crate::value::{variant_to_node, Value};
use log::{debug, warn};
use oxigraph::model::{NamedNode, NamedNodeRef, Term};
use oxigraph::store::Store;
use parking_lot::ReentrantMutex;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
enum EntityKind {
    Class,
    Property {
        domain: Option<NamedNode>,
        range: Option<NamedNode>,
        max_cardinality: u32,
        defining: bool,
    },
}

#[derive(Debug, Clone)]
struct EntityNode {
    uri: NamedNode,
    kind: EntityKind,
}

struct Inner {
    graph: DiGraph<EntityNode, ()>,
    index: HashMap<NamedNode, NodeIndex>,
    resource_root: NodeIndex,
}

impl Inner {
    fn empty() -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(EntityNode {
            uri: NamedNode::from(RDFS_RESOURCE),
            kind: EntityKind::Class,
        });
        let mut index = HashMap::new();
        index.insert(NamedNode::from(RDFS_RESOURCE), root);
        Inner {
            graph,
            index,
            resource_root: root,
        }
    }

    fn get_or_insert(&mut self, uri: &NamedNode, kind: EntityKind) -> NodeIndex {
        if let Some(&idx) = self.index.get(uri) {
            // upgrade a bare placeholder (inserted only to anchor an edge) to
            // a fully-typed node once we learn its real kind.
            if matches!(self.graph[idx].kind, EntityKind::Class)
                && matches!(kind, EntityKind::Property { .. })
            {
                self.graph[idx].kind = kind;
            }
            idx
        } else {
            let idx = self.graph.add_node(EntityNode {
                uri: uri.clone(),
                kind,
            });
            self.index.insert(uri.clone(), idx);
            idx
        }
    }

    fn add_parent_edge(&mut self, child: NodeIndex, parent: NodeIndex) {
        if child == parent {
            // Cycle-breaking: drop self-edges introduced by bad inference data.
            return;
        }
        if !self.graph.contains_edge(child, parent) {
            self.graph.add_edge(child, parent, ());
        }
    }

    fn all_parents(&self, start: NodeIndex) -> HashSet<NodeIndex> {
        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for parent in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if visited.insert(parent) {
                    stack.push(parent);
                }
            }
        }
        // every class is implicitly a subclass of rdfs:Resource
        visited.insert(self.resource_root);
        visited
    }
}

/// The ontology cache. Cheaply cloneable handle: clones share the same
/// underlying tree via the recursive lock.
pub struct ClassPropertyTree {
    inner: ReentrantMutex<RefCell<Inner>>,
}

impl ClassPropertyTree {
    pub fn new() -> Self {
        ClassPropertyTree {
            inner: ReentrantMutex::new(RefCell::new(Inner::empty())),
        }
    }

    /// Rebuilds the tree from the ontology statements currently in `store`.
    /// Holds the lock for the duration of the rebuild, blocking all other
    /// CPT operations on this thread until it completes (re-entrant calls
    /// from the same thread, e.g. a `variant_to_node` invoked mid-rebuild,
    /// do not deadlock).
    pub fn rebuild(&self, store: &Store) -> Result<()> {
        let guard = self.inner.lock();
        let mut next = Inner::empty();

        // classes
        for class_type in [OWL_CLASS] {
            for quad in store
                .quads_for_pattern(None, Some(RDF_TYPE), Some(class_type.into()), None)
                .filter_map(std::result::Result::ok)
            {
                if let oxigraph::model::NamedOrBlankNode::NamedNode(ref n) = quad.subject {
                    next.get_or_insert(n, EntityKind::Class);
                }
            }
        }

        // properties (object + datatype)
        for (prop_type, is_object_prop) in
            [(OWL_OBJECT_PROPERTY, true), (OWL_DATATYPE_PROPERTY, false)]
        {
            for quad in store
                .quads_for_pattern(None, Some(RDF_TYPE), Some(prop_type.into()), None)
                .filter_map(std::result::Result::ok)
            {
                if let oxigraph::model::NamedOrBlankNode::NamedNode(ref n) = quad.subject {
                    let domain = first_object_named_node(store, n, RDFS_DOMAIN);
                    let range = first_object_named_node(store, n, RDFS_RANGE);
                    let max_cardinality = first_object_literal(store, n, NRL_MAX_CARDINALITY)
                        .and_then(|s| s.parse::<u32>().ok())
                        .unwrap_or(0);
                    let defining = is_declared_defining(store, n)
                        .unwrap_or_else(|| default_defining(n, range.as_ref(), is_object_prop));
                    next.get_or_insert(
                        n,
                        EntityKind::Property {
                            domain,
                            range,
                            max_cardinality,
                            defining,
                        },
                    );
                }
            }
        }

        // subclass / subproperty hierarchy
        for (pred, _) in [(RDFS_SUBCLASS_OF, ()), (RDFS_SUBPROPERTY_OF, ())] {
            for quad in store
                .quads_for_pattern(None, Some(pred), None, None)
                .filter_map(std::result::Result::ok)
            {
                if let (oxigraph::model::NamedOrBlankNode::NamedNode(child), Term::NamedNode(parent)) =
                    (&quad.subject, &quad.object)
                {
                    let child_idx = next.get_or_insert(child, EntityKind::Class);
                    let parent_idx = next.get_or_insert(parent, EntityKind::Class);
                    next.add_parent_edge(child_idx, parent_idx);
                }
            }
        }

        debug!(
            "rebuilt class/property tree: {} entities",
            next.graph.node_count()
        );
        *guard.borrow_mut() = next;
        Ok(())
    }

    fn with_node<T>(&self, uri: NamedNodeRef<'_>, f: impl FnOnce(&Inner, NodeIndex) -> T) -> Option<T> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        let idx = *inner.index.get(&NamedNode::from(uri))?;
        Some(f(&inner, idx))
    }

    pub fn is_class(&self, uri: NamedNodeRef<'_>) -> bool {
        self.with_node(uri, |inner, idx| matches!(inner.graph[idx].kind, EntityKind::Class))
            .unwrap_or(false)
    }

    pub fn is_property(&self, uri: NamedNodeRef<'_>) -> bool {
        self.with_node(uri, |inner, idx| {
            matches!(inner.graph[idx].kind, EntityKind::Property { .. })
        })
        .unwrap_or(false)
    }

    /// All direct and transitive parents of `uri` (subclass/subproperty closure),
    /// including the implicit `rdfs:Resource` top.
    pub fn all_parents(&self, uri: NamedNodeRef<'_>) -> Vec<NamedNode> {
        self.with_node(uri, |inner, idx| {
            inner
                .all_parents(idx)
                .into_iter()
                .map(|i| inner.graph[i].uri.clone())
                .collect()
        })
        .unwrap_or_default()
    }

    pub fn is_subclass_of(&self, a: NamedNodeRef<'_>, b: NamedNodeRef<'_>) -> bool {
        if a == b {
            return true;
        }
        self.all_parents(a).iter().any(|p| p.as_ref() == b)
    }

    pub fn max_cardinality(&self, property: NamedNodeRef<'_>) -> u32 {
        self.with_node(property, |inner, idx| match &inner.graph[idx].kind {
            EntityKind::Property { max_cardinality, .. } => *max_cardinality,
            EntityKind::Class => 0,
        })
        .unwrap_or(0)
    }

    pub fn domain(&self, property: NamedNodeRef<'_>) -> Option<NamedNode> {
        self.with_node(property, |inner, idx| match &inner.graph[idx].kind {
            EntityKind::Property { domain, .. } => domain.clone(),
            EntityKind::Class => None,
        })
        .flatten()
    }

    pub fn range(&self, property: NamedNodeRef<'_>) -> Option<NamedNode> {
        self.with_node(property, |inner, idx| match &inner.graph[idx].kind {
            EntityKind::Property { range, .. } => range.clone(),
            EntityKind::Class => None,
        })
        .flatten()
    }

    pub fn has_literal_range(&self, property: NamedNodeRef<'_>) -> bool {
        match self.range(property) {
            Some(r) => {
                r.as_ref() == RDFS_LITERAL
                    || r.as_str().starts_with("http://www.w3.org/2001/XMLSchema#")
            }
            None => false,
        }
    }

    /// Whether `property` participates in resource identity. Unknown
    /// properties (no CPT entry at all) default to defining, the historical
    /// fallback for properties from ontologies not yet indexed. A property
    /// declared non-defining is still defining if any of its transitive
    /// `rdfs:subPropertyOf` parents is.
    pub fn is_defining(&self, property: NamedNodeRef<'_>) -> bool {
        if ALWAYS_DEFINING_PROPERTIES.iter().any(|p| *p == property) {
            return true;
        }
        match self.declared_defining(property) {
            Some(true) => true,
            Some(false) => self
                .all_parents(property)
                .iter()
                .any(|p| self.declared_defining(p.as_ref()) == Some(true)),
            None => true,
        }
    }

    fn declared_defining(&self, property: NamedNodeRef<'_>) -> Option<bool> {
        self.with_node(property, |inner, idx| match &inner.graph[idx].kind {
            EntityKind::Property { defining, .. } => Some(*defining),
            EntityKind::Class => None,
        })
        .flatten()
    }

    /// Converts `value` to an RDF term appropriate for `property`'s declared range.
    pub fn variant_to_node(&self, value: &Value, property: NamedNodeRef<'_>) -> Result<Term> {
        let range = self.range(property);
        variant_to_node(value, range.as_ref().map(|n| n.as_ref())).map_err(|e| match e {
            Error::InvalidArgument(msg) => {
                Error::InvalidArgument(format!("property {property}: {msg}"))
            }
            other => other,
        })
    }
}

impl Default for ClassPropertyTree {
    fn default() -> Self {
        Self::new()
    }
}

fn first_object_named_node(
    store: &Store,
    subject: &NamedNode,
    predicate: NamedNodeRef<'_>,
) -> Option<NamedNode> {
    store
        .quads_for_pattern(Some(subject.as_ref().into()), Some(predicate), None, None)
        .filter_map(std::result::Result::ok)
        .find_map(|q| match q.object {
            Term::NamedNode(n) => Some(n),
            _ => None,
        })
}

fn first_object_literal(store: &Store, subject: &NamedNode, predicate: NamedNodeRef<'_>) -> Option<String> {
    store
        .quads_for_pattern(Some(subject.as_ref().into()), Some(predicate), None, None)
        .filter_map(std::result::Result::ok)
        .find_map(|q| match q.object {
            Term::Literal(lit) => Some(lit.value().to_string()),
            _ => None,
        })
}

/// Returns `Some(true/false)` if an explicit `NRL::DefiningProperty` /
/// `NRL::NonDefiningProperty` type assertion exists, `None` otherwise.
fn is_declared_defining(store: &Store, subject: &NamedNode) -> Option<bool> {
    let types: Vec<NamedNode> = store
        .quads_for_pattern(Some(subject.as_ref().into()), Some(RDF_TYPE), None, None)
        .filter_map(std::result::Result::ok)
        .filter_map(|q| match q.object {
            Term::NamedNode(n) => Some(n),
            _ => None,
        })
        .collect();
    if types.iter().any(|t| t.as_ref() == NRL_DEFINING_PROPERTY) {
        Some(true)
    } else if types.iter().any(|t| t.as_ref() == NRL_NON_DEFINING_PROPERTY) {
        Some(false)
    } else {
        None
    }
}

/// Default: `true` for properties whose range is a literal, `false` for
/// object properties, absent an explicit NRL declaration.
fn default_defining(_uri: &NamedNode, range: Option<&NamedNode>, is_object_property: bool) -> bool {
    if is_object_property {
        warn!("property has no explicit defining declaration, defaulting to non-defining");
        false
    } else {
        let _ = range;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_property_defaults_to_defining() {
        let cpt = ClassPropertyTree::new();
        let p = NamedNode::new_unchecked("urn:example:unknownProp");
        assert!(cpt.is_defining(p.as_ref()));
    }

    #[test]
    fn rdf_type_and_sub_resource_are_always_defining() {
        let cpt = ClassPropertyTree::new();
        assert!(cpt.is_defining(RDF_TYPE));
        assert!(cpt.is_defining(NAO_HAS_SUB_RESOURCE));
    }

    #[test]
    fn non_defining_property_inherits_defining_from_a_defining_parent() {
        let store = Store::new().unwrap();
        let parent = NamedNode::new_unchecked("urn:example:definingParent");
        let child = NamedNode::new_unchecked("urn:example:nonDefiningChild");
        store
            .insert(&oxigraph::model::Quad::new(
                parent.clone(),
                RDF_TYPE,
                OWL_DATATYPE_PROPERTY,
                oxigraph::model::GraphName::DefaultGraph,
            ))
            .unwrap();
        store
            .insert(&oxigraph::model::Quad::new(
                parent.clone(),
                RDF_TYPE,
                NRL_DEFINING_PROPERTY,
                oxigraph::model::GraphName::DefaultGraph,
            ))
            .unwrap();
        store
            .insert(&oxigraph::model::Quad::new(
                child.clone(),
                RDF_TYPE,
                OWL_OBJECT_PROPERTY,
                oxigraph::model::GraphName::DefaultGraph,
            ))
            .unwrap();
        store
            .insert(&oxigraph::model::Quad::new(
                child.clone(),
                RDF_TYPE,
                NRL_NON_DEFINING_PROPERTY,
                oxigraph::model::GraphName::DefaultGraph,
            ))
            .unwrap();
        store
            .insert(&oxigraph::model::Quad::new(
                child.clone(),
                RDFS_SUBPROPERTY_OF,
                parent.clone(),
                oxigraph::model::GraphName::DefaultGraph,
            ))
            .unwrap();
        let cpt = ClassPropertyTree::new();
        cpt.rebuild(&store).unwrap();
        assert_eq!(cpt.declared_defining(child.as_ref()), Some(false));
        assert!(cpt.is_defining(child.as_ref()));
    }

    #[test]
    fn known_class_without_declared_parents_still_has_rdfs_resource_as_ancestor() {
        let store = Store::new().unwrap();
        let class = NamedNode::new_unchecked("urn:example:Thing");
        store
            .insert(&oxigraph::model::Quad::new(
                class.clone(),
                RDF_TYPE,
                OWL_CLASS,
                oxigraph::model::GraphName::DefaultGraph,
            ))
            .unwrap();
        let cpt = ClassPropertyTree::new();
        cpt.rebuild(&store).unwrap();
        assert!(cpt.is_subclass_of(class.as_ref(), RDFS_RESOURCE));
    }
}
