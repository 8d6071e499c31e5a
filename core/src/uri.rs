//! Mints fresh resource and graph URIs.
//!
//! Resource URIs: `nepomuk:/res/<uuid>`. Graph URIs: `nepomuk:/ctx/<uuid>`.
//! Never reused: each call draws a fresh random (v4) UUID.

use oxigraph::model::NamedNode;
use uuid::Uuid;

pub const RESOURCE_SCHEME_PREFIX: &str = "nepomuk:/res/";
pub const GRAPH_SCHEME_PREFIX: &str = "nepomuk:/ctx/";

/// Mints a fresh `nepomuk:/res/<uuid>` resource URI.
pub fn new_resource_uri() -> NamedNode {
    NamedNode::new_unchecked(format!("{RESOURCE_SCHEME_PREFIX}{}", Uuid::new_v4().simple()))
}

/// Mints a fresh `nepomuk:/ctx/<uuid>` provenance graph URI.
pub fn new_graph_uri() -> NamedNode {
    NamedNode::new_unchecked(format!("{GRAPH_SCHEME_PREFIX}{}", Uuid::new_v4().simple()))
}

/// True if `uri` was minted by [`new_resource_uri`] (as opposed to e.g. a `file://` URL).
pub fn is_resource_uri(uri: &str) -> bool {
    uri.starts_with(RESOURCE_SCHEME_PREFIX)
}

/// True if `uri` was minted by [`new_graph_uri`].
pub fn is_graph_uri(uri: &str) -> bool {
    uri.starts_with(GRAPH_SCHEME_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_uris_are_unique_and_tagged() {
        let a = new_resource_uri();
        let b = new_resource_uri();
        assert_ne!(a, b);
        assert!(is_resource_uri(a.as_str()));
        assert!(!is_graph_uri(a.as_str()));
    }

    #[test]
    fn graph_uris_are_tagged_distinctly() {
        let g = new_graph_uri();
        assert!(is_graph_uri(g.as_str()));
        assert!(!is_resource_uri(g.as_str()));
    }
}
