//! The transient in-memory multimap used only by `storeResources`:
//! `uri -> multihash(property -> node)`, with blank-node URIs represented as
//! strings prefixed `"_:"`.

use oxigraph::model::{NamedNode, Term};
use std::collections::HashMap;

/// A single incoming resource description, keyed by property, gathered
/// before identification decides its final URI.
#[derive(Debug, Clone, Default)]
pub struct SyncResource {
    uri: String,
    statements: HashMap<NamedNode, Vec<Term>>,
}

impl SyncResource {
    pub fn new(uri: impl Into<String>) -> Self {
        SyncResource {
            uri: uri.into(),
            statements: HashMap::new(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = uri.into();
    }

    pub fn is_blank(&self) -> bool {
        self.uri.starts_with("_:")
    }

    pub fn is_valid(&self) -> bool {
        !self.uri.is_empty() && !self.statements.is_empty()
    }

    pub fn insert(&mut self, property: NamedNode, value: Term) {
        let values = self.statements.entry(property).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    pub fn values(&self, property: &NamedNode) -> &[Term] {
        self.statements
            .get(property)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn properties(&self) -> impl Iterator<Item = &NamedNode> {
        self.statements.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NamedNode, &Term)> {
        self.statements
            .iter()
            .flat_map(|(p, vs)| vs.iter().map(move |v| (p, v)))
    }

    /// Drops every statement whose *object* names `target`, used to clean up
    /// dangling references after a resource is dropped from the incoming graph.
    pub fn remove_object(&mut self, target: &NamedNode) {
        for values in self.statements.values_mut() {
            values.retain(|v| !matches!(v, Term::NamedNode(n) if n == target));
        }
    }

    pub fn nie_url(&self) -> Option<&str> {
        use crate::consts::NIE_URL;
        self.statements
            .get(&NamedNode::from(NIE_URL))
            .and_then(|vs| vs.first())
            .and_then(|t| match t {
                Term::NamedNode(n) => Some(n.as_str()),
                Term::Literal(l) => Some(l.value()),
                _ => None,
            })
    }

    pub fn as_quads(&self) -> Vec<(NamedNode, NamedNode, Term)> {
        self.statements
            .iter()
            .flat_map(|(p, vs)| {
                vs.iter()
                    .map(move |v| (NamedNode::new_unchecked(self.uri.clone()), p.clone(), v.clone()))
            })
            .collect()
    }
}

/// Content-based equality/hash, deliberately excluding the resource's own
/// URI. The identification pass in `storeResources` relies on this: two
/// sync-resources describing the same incoming entity via different
/// (possibly still-unminted) URIs must compare equal on their statements
/// alone so duplicate blank-node descriptions collapse.
pub fn content_hash(res: &SyncResource) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut pairs: Vec<(String, String)> = res
        .statements
        .iter()
        .flat_map(|(p, vs)| vs.iter().map(move |v| (p.as_str().to_string(), term_key(v))))
        .collect();
    pairs.sort();
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    pairs.hash(&mut hasher);
    hasher.finish()
}

fn term_key(term: &Term) -> String {
    match term {
        Term::NamedNode(n) => format!("uri:{}", n.as_str()),
        Term::BlankNode(b) => format!("blank:{}", b.as_str()),
        Term::Literal(l) => format!("lit:{}:{}", l.datatype().as_str(), l.value()),
        #[allow(unreachable_patterns)]
        _ => String::new(),
    }
}

/// A set of sync-resources grouped by subject, as produced by parsing an
/// incoming graph or returned by `describeResources`.
#[derive(Debug, Clone, Default)]
pub struct SimpleResourceGraph {
    resources: HashMap<String, SyncResource>,
}

impl SimpleResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource: SyncResource) {
        self.resources.insert(resource.uri().to_string(), resource);
    }

    pub fn get(&self, uri: &str) -> Option<&SyncResource> {
        self.resources.get(uri)
    }

    pub fn get_mut(&mut self, uri: &str) -> Option<&mut SyncResource> {
        self.resources.get_mut(uri)
    }

    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn resources(&self) -> impl Iterator<Item = &SyncResource> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn from_quads(quads: impl IntoIterator<Item = (NamedNode, NamedNode, Term)>) -> Self {
        let mut graph = SimpleResourceGraph::new();
        for (subject, predicate, object) in quads {
            let entry = graph
                .resources
                .entry(subject.as_str().to_string())
                .or_insert_with(|| SyncResource::new(subject.as_str()));
            entry.insert(predicate, object);
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::Literal;

    #[test]
    fn content_hash_ignores_uri() {
        let mut a = SyncResource::new("_:a");
        a.insert(
            NamedNode::new_unchecked("urn:p"),
            Term::Literal(Literal::new_simple_literal("x")),
        );
        let mut b = SyncResource::new("_:b");
        b.insert(
            NamedNode::new_unchecked("urn:p"),
            Term::Literal(Literal::new_simple_literal("x")),
        );
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn remove_object_drops_only_matching_values() {
        let mut res = SyncResource::new("nepomuk:/res/1");
        let target = NamedNode::new_unchecked("nepomuk:/res/2");
        res.insert(
            NamedNode::new_unchecked("urn:p"),
            Term::NamedNode(target.clone()),
        );
        res.insert(
            NamedNode::new_unchecked("urn:p"),
            Term::Literal(Literal::new_simple_literal("keep")),
        );
        res.remove_object(&target);
        assert_eq!(res.values(&NamedNode::new_unchecked("urn:p")).len(), 1);
    }
}
