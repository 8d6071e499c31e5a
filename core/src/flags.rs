//! Small flag and mode enums threaded through the mutation API.

/// Controls sub-resource cascading for `removeResources` / `removeDataByApplication`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoveFlags {
    /// Recursively remove sub-resources (`nao:hasSubResource`) that would
    /// otherwise be left with no other parent.
    pub remove_sub_resources: bool,
}

/// Controls `storeResources` identification behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentificationMode {
    /// Attempt identification by defining properties when no `nie:url` match is found.
    IdentifyNew,
    /// Never identify by defining properties; mint a fresh URI unless a `nie:url` matches.
    IdentifyNone,
}

/// Controls `storeResources` merge behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreFlags {
    /// When a max-cardinality-1 property would be overwritten, replace the
    /// value instead of rejecting the store.
    pub overwrite_properties: bool,
    /// Defer cardinality checks until the whole ingestion batch has been
    /// merged, rather than checking after each individual statement.
    pub lazy_cardinalities: bool,
}

/// Controls `describeResources` read behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DescribeFlags {
    /// Also include resources directly referenced by the requested resources.
    pub include_related_resources: bool,
    /// Omit quads that live in a discardable graph.
    pub exclude_discardable_data: bool,
}

/// Outcome of running the Resource Identifier on an incoming sync-resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentificationResult {
    Identified(oxigraph::model::NamedNode),
    Fresh(oxigraph::model::NamedNode),
    Ambiguous(Vec<oxigraph::model::NamedNode>),
}
