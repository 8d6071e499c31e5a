//! The Resource Merger: buffers pending writes produced by identification
//! and applies them in a single transaction, enforcing cardinality,
//! `nie:url` uniqueness and domain/range, and routing every accepted
//! statement through the Graph registry so provenance stays exact.
//!
//! `addProperty` (the Data Management Model) and `storeResources`'s merge
//! step share this machinery: both are "add this statement on behalf of this
//! app, splitting or reusing a provenance graph as needed."

use chrono::Utc;
use oxigraph::model::{GraphName, NamedNode, Quad, Term};

use crate::consts::{NAO_CREATED, NAO_LAST_MODIFIED, NIE_URL};
use crate::cpt::ClassPropertyTree;
use crate::errors::{Error, Result};
use crate::graph_registry::GraphRegistry;
use crate::store::Store;
use crate::type_cache::TypeCache;



pub struct ResourceMerger<'a> {
    store: &'a Store,
    cpt: &'a ClassPropertyTree,
    registry: &'a GraphRegistry,
    type_cache: &'a TypeCache,
}

/// Whether a just-requested write was a fresh addition, already present for
/// the requesting app, or requires provenance splitting.
#[derive(Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    AlreadyPresentForApp,
}

impl<'a> ResourceMerger<'a> {
    pub fn new(
        store: &'a Store,
        cpt: &'a ClassPropertyTree,
        registry: &'a GraphRegistry,
        type_cache: &'a TypeCache,
    ) -> Self {
        ResourceMerger {
            store,
            cpt,
            registry,
            type_cache,
        }
    }

    /// Adds `(subject, property, value)` on behalf of `app`, enforcing
    /// cumulative max-cardinality and `nie:url` uniqueness, and routing the
    /// statement through the graph-split/reuse machinery.
    pub fn add_statement(
        &self,
        subject: &NamedNode,
        property: &NamedNode,
        value: &Term,
        app: &str,
        discardable: bool,
    ) -> Result<WriteOutcome> {
        self.validate_statement(subject, property, value)?;

        let existing_graph = self.find_statement_graph(subject, property, value)?;
        let outcome = match existing_graph {
            Some(graph) => {
                let maintainers = self.registry.maintainers(&graph);
                if maintainers.contains(app) {
                    WriteOutcome::AlreadyPresentForApp
                } else {
                    self.split_statement_into_new_graph(
                        subject, property, value, &graph, app, discardable,
                    )?;
                    WriteOutcome::Inserted
                }
            }
            None => {
                let target = self
                    .registry
                    .graph_for(self.store.inner(), app, discardable, Utc::now())?;
                self.store.inner().insert(&Quad::new(
                    subject.clone(),
                    property.clone(),
                    value.clone(),
                    GraphName::NamedNode(target),
                ))?;
                WriteOutcome::Inserted
            }
        };

        self.type_cache.invalidate(subject.as_ref());
        self.touch_last_modified(subject)?;
        Ok(outcome)
    }

    /// Removes `(subject, property, value)` on behalf of `app`. If `app` is
    /// the statement's sole maintainer the statement is deleted outright;
    /// otherwise the statement is split off into a graph whose maintainer
    /// set excludes `app`, so it stays visible to the remaining maintainers.
    /// Returns whether the statement was actually present and maintained by
    /// `app`. Absent statements are not an error, but callers building
    /// change notifications need to know whether anything happened.
    pub fn remove_statement(
        &self,
        subject: &NamedNode,
        property: &NamedNode,
        value: &Term,
        app: &str,
    ) -> Result<bool> {
        let Some(graph) = self.find_statement_graph(subject, property, value)? else {
            return Ok(false); // absent statements produce no error
        };
        let maintainers = self.registry.maintainers(&graph);
        if !maintainers.contains(app) {
            return Ok(false);
        }

        self.store.inner().remove(&Quad::new(
            subject.clone(),
            property.clone(),
            value.clone(),
            GraphName::NamedNode(graph.clone()),
        ))?;

        let remaining: Vec<String> = maintainers.into_iter().filter(|m| m != app).collect();
        if !remaining.is_empty() {
            let discardable = false;
            let target = self
                .registry
                .graph_for_agents(self.store.inner(), &remaining, discardable, Utc::now())?;
            self.store.inner().insert(&Quad::new(
                subject.clone(),
                property.clone(),
                value.clone(),
                GraphName::NamedNode(target),
            ))?;
        }

        self.type_cache.invalidate(subject.as_ref());
        Ok(true)
    }

    /// Sets `nao:created` on `subject` to `now` unless it already has one.
    /// Meta-properties live outside any app's provenance graph, so they are
    /// written directly to the default graph rather than through the
    /// graph-registry machinery.
    pub fn ensure_created(&self, subject: &NamedNode, now: chrono::DateTime<Utc>) -> Result<()> {
        let has_created = self
            .store
            .inner()
            .quads_for_pattern(Some(subject.as_ref().into()), Some(NAO_CREATED.into()), None, None)
            .next()
            .is_some();
        if has_created {
            return Ok(());
        }
        self.store.inner().insert(&Quad::new(
            subject.clone(),
            NAO_CREATED,
            oxigraph::model::Literal::new_typed_literal(
                now.to_rfc3339(),
                oxigraph::model::vocab::xsd::DATE_TIME,
            ),
            GraphName::DefaultGraph,
        ))?;
        Ok(())
    }

    /// Removes the default-graph meta-properties (`nao:created`,
    /// `nao:lastModified`) for a subject that no longer has any statement
    /// naming it, the final step of garbage-collecting a fully-deleted
    /// resource. Leaves `rdf:type`, which lives in app-owned graphs and is
    /// already gone once every maintainer's contribution is removed.
    pub fn remove_meta_properties(&self, subject: &NamedNode) -> Result<()> {
        for prop in [NAO_CREATED, NAO_LAST_MODIFIED] {
            let existing: Vec<Quad> = self
                .store
                .inner()
                .quads_for_pattern(
                    Some(subject.as_ref().into()),
                    Some(prop.into()),
                    None,
                    Some(GraphName::DefaultGraph.as_ref()),
                )
                .filter_map(std::result::Result::ok)
                .collect();
            for quad in existing {
                self.store.inner().remove(&quad)?;
            }
        }
        Ok(())
    }

    /// True if `subject` is named by any quad at all, as subject or object,
    /// in any graph, other than the `nao:created`/`nao:lastModified` meta
    /// properties every touched resource carries. Used to decide whether a
    /// resource survives a removal; counting the meta properties themselves
    /// would make every resource permanently non-orphanable.
    pub fn resource_has_statements(&self, subject: &NamedNode) -> Result<bool> {
        let has_content = self
            .store
            .inner()
            .quads_for_pattern(Some(subject.as_ref().into()), None, None, None)
            .filter_map(std::result::Result::ok)
            .any(|q| q.predicate.as_ref() != NAO_CREATED && q.predicate.as_ref() != NAO_LAST_MODIFIED);
        if has_content {
            return Ok(true);
        }
        Ok(self
            .store
            .inner()
            .quads_for_pattern(None, None, Some(Term::NamedNode(subject.clone()).as_ref()), None)
            .next()
            .is_some())
    }

    /// Runs the cardinality, `nie:url` uniqueness and domain checks without
    /// writing anything. Callers that must validate a whole batch before
    /// committing any of it (`addProperty`, `storeResources`) run this over
    /// every planned statement first, then call [`ResourceMerger::add_statement`]
    /// only once every statement in the batch has cleared validation.
    pub fn validate_statement(&self, subject: &NamedNode, property: &NamedNode, value: &Term) -> Result<()> {
        self.check_cardinality(subject, property, value)?;
        self.check_nie_url_uniqueness(subject, property, value)?;
        self.check_domain(subject, property, &[])?;
        Ok(())
    }

    /// As [`ResourceMerger::validate_statement`], but the domain check also
    /// considers `extra_types`, `rdf:type` assertions the same ingestion
    /// batch is about to write but that have not landed in the store yet.
    /// `storeResources` uses this so a type and a domain-constrained property
    /// on that type can arrive in the same batch without the domain check
    /// seeing a stale, not-yet-written type set.
    pub fn validate_statement_with_extra_types(
        &self,
        subject: &NamedNode,
        property: &NamedNode,
        value: &Term,
        extra_types: &[NamedNode],
    ) -> Result<()> {
        self.check_cardinality(subject, property, value)?;
        self.check_nie_url_uniqueness(subject, property, value)?;
        self.check_domain(subject, property, extra_types)?;
        Ok(())
    }

    fn split_statement_into_new_graph(
        &self,
        subject: &NamedNode,
        property: &NamedNode,
        value: &Term,
        old_graph: &NamedNode,
        app: &str,
        discardable: bool,
    ) -> Result<()> {
        self.store.inner().remove(&Quad::new(
            subject.clone(),
            property.clone(),
            value.clone(),
            GraphName::NamedNode(old_graph.clone()),
        ))?;
        let mut agents: Vec<String> = self.registry.maintainers(old_graph).into_iter().collect();
        if !agents.iter().any(|a| a == app) {
            agents.push(app.to_string());
        }
        let target = self
            .registry
            .graph_for_agents(self.store.inner(), &agents, discardable, Utc::now())?;
        self.store.inner().insert(&Quad::new(
            subject.clone(),
            property.clone(),
            value.clone(),
            GraphName::NamedNode(target),
        ))?;
        Ok(())
    }

    fn find_statement_graph(
        &self,
        subject: &NamedNode,
        property: &NamedNode,
        value: &Term,
    ) -> Result<Option<NamedNode>> {
        Ok(self
            .store
            .inner()
            .quads_for_pattern(
                Some(subject.as_ref().into()),
                Some(property.as_ref()),
                Some(value.as_ref()),
                None,
            )
            .filter_map(std::result::Result::ok)
            .find_map(|q| match q.graph_name {
                GraphName::NamedNode(g) => Some(g),
                _ => None,
            }))
    }

    fn check_cardinality(&self, subject: &NamedNode, property: &NamedNode, value: &Term) -> Result<()> {
        let max = self.cpt.max_cardinality(property.as_ref());
        if max == 0 {
            return Ok(());
        }
        let existing: Vec<Term> = self
            .store
            .inner()
            .quads_for_pattern(Some(subject.as_ref().into()), Some(property.as_ref()), None, None)
            .filter_map(std::result::Result::ok)
            .map(|q| q.object)
            .collect();
        if existing.contains(value) {
            return Ok(());
        }
        let would_have = existing.len() + 1;
        if would_have > max as usize {
            return Err(Error::CardinalityExceeded {
                property: property.clone(),
                resource: subject.clone(),
                max,
                would_have,
            });
        }
        Ok(())
    }

    fn check_nie_url_uniqueness(&self, subject: &NamedNode, property: &NamedNode, value: &Term) -> Result<()> {
        if property.as_ref() != NIE_URL {
            return Ok(());
        }
        let taken_by_other = self
            .store
            .inner()
            .quads_for_pattern(None, Some(NIE_URL), Some(value.as_ref()), None)
            .filter_map(std::result::Result::ok)
            .any(|q| match q.subject {
                oxigraph::model::NamedOrBlankNode::NamedNode(n) => n != *subject,
                _ => false,
            });
        if taken_by_other {
            return Err(Error::UniquenessViolation(format!(
                "nie:url {value:?} is already claimed by another resource"
            )));
        }
        Ok(())
    }

    fn check_domain(&self, subject: &NamedNode, property: &NamedNode, extra_types: &[NamedNode]) -> Result<()> {
        let Some(domain) = self.cpt.domain(property.as_ref()) else {
            return Ok(());
        };
        let mut types = self.type_cache.types(self.store.inner(), subject.as_ref());
        types.extend(extra_types.iter().cloned());
        let satisfies = types
            .iter()
            .any(|t| t.as_ref() == domain.as_ref() || self.cpt.is_subclass_of(t.as_ref(), domain.as_ref()));
        if !satisfies {
            return Err(Error::InvalidArgument(format!(
                "{subject} lacks required domain type {domain} for property {property}"
            )));
        }
        Ok(())
    }

    fn touch_last_modified(&self, subject: &NamedNode) -> Result<()> {
        let now = oxigraph::model::Literal::new_typed_literal(
            Utc::now().to_rfc3339(),
            oxigraph::model::vocab::xsd::DATE_TIME,
        );
        // nao:lastModified lives alongside the resource's other metadata, not
        // under any single app's provenance; it is overwritten in place.
        let existing: Vec<Quad> = self
            .store
            .inner()
            .quads_for_pattern(Some(subject.as_ref().into()), Some(NAO_LAST_MODIFIED), None, None)
            .filter_map(std::result::Result::ok)
            .collect();
        for quad in existing {
            self.store.inner().remove(&quad)?;
        }
        self.store.inner().insert(&Quad::new(
            subject.clone(),
            NAO_LAST_MODIFIED,
            now,
            GraphName::DefaultGraph,
        ))?;
        Ok(())
    }
}
