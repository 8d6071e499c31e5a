//! The Resource Identifier: decides whether an incoming sync-resource names
//! an already-known store resource.
//!
//! Identification proceeds in a fixed order, each step short-circuiting: (1)
//! the resource's own URI, if already a known store resource; (2) an exact
//! `nie:url` match: once a `nie:url` is present at all, this step alone
//! decides the outcome, match or fresh, with no fallthrough to defining
//! properties; (3) only absent a `nie:url`, defining-property identification,
//! gated on the identification mode and excluded for `nie:DataObject`s.

use std::collections::HashMap;

use oxigraph::model::{NamedNode, NamedOrBlankNodeRef, Term};

use crate::consts::{IDENTITY_EXCLUDED_PROPERTIES, NIE_DATA_OBJECT, NIE_URL, RDF_TYPE};
use crate::cpt::ClassPropertyTree;
use crate::errors::Result;
use crate::flags::IdentificationMode;
use crate::flags::IdentificationResult;
use crate::store::Store;
use crate::sync_resource::SyncResource;

pub struct ResourceIdentifier<'a> {
    store: &'a Store,
    cpt: &'a ClassPropertyTree,
}

impl<'a> ResourceIdentifier<'a> {
    pub fn new(store: &'a Store, cpt: &'a ClassPropertyTree) -> Self {
        ResourceIdentifier { store, cpt }
    }

    pub fn run(&self, resource: &SyncResource, mode: IdentificationMode) -> Result<IdentificationResult> {
        if resource.is_blank() {
            return self.fresh_or_defining(resource, mode);
        }

        if self.resource_exists(resource.uri()) {
            return Ok(IdentificationResult::Identified(NamedNode::new_unchecked(
                resource.uri(),
            )));
        }

        if let Some(url) = resource.nie_url() {
            return match self.find_by_nie_url(url)? {
                Some(existing) => Ok(IdentificationResult::Identified(existing)),
                None => Ok(IdentificationResult::Fresh(crate::uri::new_resource_uri())),
            };
        }

        self.fresh_or_defining(resource, mode)
    }

    fn fresh_or_defining(
        &self,
        resource: &SyncResource,
        mode: IdentificationMode,
    ) -> Result<IdentificationResult> {
        if mode != IdentificationMode::IdentifyNew {
            return Ok(IdentificationResult::Fresh(crate::uri::new_resource_uri()));
        }
        if self.is_data_object(resource) {
            return Ok(IdentificationResult::Fresh(crate::uri::new_resource_uri()));
        }
        self.identify_by_defining_properties(resource)
    }

    fn is_data_object(&self, resource: &SyncResource) -> bool {
        let type_prop = NamedNode::from(RDF_TYPE);
        resource.values(&type_prop).iter().any(|t| match t {
            Term::NamedNode(n) => {
                n.as_ref() == NIE_DATA_OBJECT || self.cpt.is_subclass_of(n.as_ref(), NIE_DATA_OBJECT)
            }
            _ => false,
        })
    }

    fn resource_exists(&self, uri: &str) -> bool {
        let Ok(node) = NamedNode::new(uri) else {
            return false;
        };
        self.store
            .inner()
            .quads_for_pattern(Some(node.as_ref().into()), None, None, None)
            .next()
            .is_some()
    }

    fn find_by_nie_url(&self, url: &str) -> Result<Option<NamedNode>> {
        let url_term: Term = match NamedNode::new(url) {
            Ok(n) => Term::NamedNode(n),
            Err(_) => Term::Literal(oxigraph::model::Literal::new_simple_literal(url)),
        };
        Ok(self
            .store
            .inner()
            .quads_for_pattern(None, Some(NIE_URL), Some(url_term.as_ref()), None)
            .filter_map(std::result::Result::ok)
            .find_map(|q| match q.subject {
                oxigraph::model::NamedOrBlankNode::NamedNode(n) => Some(n),
                _ => None,
            }))
    }

    /// A candidate matches when the store resource's (defining-property,
    /// defining-value) pairs are a *superset* of the incoming resource's.
    /// Ties among several candidates are broken by oldest `nao:created`, then
    /// deterministically by URI.
    fn identify_by_defining_properties(&self, resource: &SyncResource) -> Result<IdentificationResult> {
        let defining: Vec<(NamedNode, Vec<Term>)> = resource
            .properties()
            .filter(|p| {
                self.cpt.is_defining(p.as_ref())
                    && !IDENTITY_EXCLUDED_PROPERTIES.iter().any(|ip| *ip == p.as_ref())
            })
            .map(|p| (p.clone(), resource.values(p).to_vec()))
            .collect();

        if defining.is_empty() {
            return Ok(IdentificationResult::Fresh(crate::uri::new_resource_uri()));
        }

        // Candidates: any store subject having, for every defining property
        // of the incoming resource, at least one of the incoming values.
        let mut candidate_counts: HashMap<NamedNode, usize> = HashMap::new();
        for (prop, values) in &defining {
            for value in values {
                for quad in self
                    .store
                    .inner()
                    .quads_for_pattern(None, Some(prop.as_ref()), Some(value.as_ref()), None)
                    .filter_map(std::result::Result::ok)
                {
                    if let oxigraph::model::NamedOrBlankNode::NamedNode(subject) = quad.subject {
                        *candidate_counts.entry(subject).or_insert(0) += 1;
                    }
                }
            }
        }

        let candidates: Vec<NamedNode> = candidate_counts
            .into_iter()
            .filter(|(_, count)| *count == defining.len())
            .map(|(node, _)| node)
            .collect();

        match candidates.len() {
            0 => Ok(IdentificationResult::Fresh(crate::uri::new_resource_uri())),
            1 => Ok(IdentificationResult::Identified(candidates[0].clone())),
            _ => {
                let oldest = self.oldest_by_created(&candidates);
                Ok(IdentificationResult::Identified(oldest))
            }
        }
    }

    fn oldest_by_created(&self, candidates: &[NamedNode]) -> NamedNode {
        use crate::consts::NAO_CREATED;
        let mut best: Option<(String, &NamedNode)> = None;
        for candidate in candidates {
            let created = self
                .store
                .inner()
                .quads_for_pattern(
                    Some(NamedOrBlankNodeRef::NamedNode(candidate.as_ref())),
                    Some(NAO_CREATED),
                    None,
                    None,
                )
                .filter_map(std::result::Result::ok)
                .find_map(|q| match q.object {
                    Term::Literal(l) => Some(l.value().to_string()),
                    _ => None,
                })
                .unwrap_or_default();
            best = match best {
                None => Some((created, candidate)),
                Some((best_created, best_candidate)) => {
                    if created < best_created
                        || (created == best_created && candidate.as_str() < best_candidate.as_str())
                    {
                        Some((created, candidate))
                    } else {
                        Some((best_created, best_candidate))
                    }
                }
            };
        }
        best.map(|(_, n)| n.clone())
            .unwrap_or_else(|| candidates[0].clone())
    }
}
