//! A small LRU of `resource -> rdf:type set` to avoid repeated
//! `quads_for_pattern` lookups on hot mutation paths.

use lru::LruCache;
use oxigraph::model::{NamedNode, NamedNodeRef, Term};
use oxigraph::store::Store;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

use crate::consts::{RDFS_RESOURCE, RDF_TYPE};

pub struct TypeCache {
    cache: Mutex<LruCache<NamedNode, Vec<NamedNode>>>,
}

impl TypeCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to at least 1");
        TypeCache {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the resolved `rdf:type` set for `uri`, querying the store on a
    /// cache miss. `rdfs:Resource` is always included.
    pub fn types(&self, store: &Store, uri: NamedNodeRef<'_>) -> Vec<NamedNode> {
        let key = NamedNode::from(uri);
        if let Some(cached) = self.cache.lock().get(&key) {
            return cached.clone();
        }

        let mut types: Vec<NamedNode> = store
            .quads_for_pattern(Some(uri.into()), Some(RDF_TYPE), None, None)
            .filter_map(std::result::Result::ok)
            .filter_map(|q| match q.object {
                Term::NamedNode(n) => Some(n),
                _ => None,
            })
            .collect();
        types.push(NamedNode::from(RDFS_RESOURCE));

        self.cache.lock().put(key, types.clone());
        types
    }

    /// Invalidates the cached entry for `uri` (called on every mutation of its types).
    pub fn invalidate(&self, uri: NamedNodeRef<'_>) {
        self.cache.lock().pop(&NamedNode::from(uri));
    }

    /// Drops all cached entries, e.g. after a CPT rebuild changes the hierarchy.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_hit_returns_same_types() {
        let store = Store::new().unwrap();
        let cache = TypeCache::new(4);
        let uri = NamedNode::new_unchecked("nepomuk:/res/abc");
        let first = cache.types(&store, uri.as_ref());
        let second = cache.types(&store, uri.as_ref());
        assert_eq!(first, second);
        assert!(first.contains(&NamedNode::from(RDFS_RESOURCE)));
    }

    #[test]
    fn invalidate_forces_a_fresh_lookup() {
        let store = Store::new().unwrap();
        let cache = TypeCache::new(4);
        let uri = NamedNode::new_unchecked("nepomuk:/res/abc");
        let _ = cache.types(&store, uri.as_ref());
        cache.invalidate(uri.as_ref());
        assert!(cache.cache.lock().get(&uri).is_none());
    }
}
