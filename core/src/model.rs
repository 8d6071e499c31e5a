//! The Data Management Model: the public mutation API every external
//! request ultimately goes through. Consults the CPT for constraints, the
//! Graph registry for provenance, and routes every accepted statement change
//! through the [`crate::merger::ResourceMerger`]; every successful mutation
//! is published to the [`crate::watcher::ResourceWatcher`] once committed.
//!
//! Atomicity note: `oxigraph`'s per-statement `insert`/`remove` are each
//! individually infallible (barring I/O errors) once a statement has been
//! validated, so every operation here follows a validate-then-apply split,
//! the same split `ResourceMerger` already exposes via
//! `validate_statement`/`add_statement`, rather than wrapping a whole batch
//! in a single `oxigraph::store::Transaction`. A batch is fully checked
//! against current store state before any of its writes land.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use log::warn;
use oxigraph::model::vocab::xsd;
use oxigraph::model::{GraphName, NamedNode, NamedNodeRef, Quad, Term};

use crate::cancel::CancellationToken;
use crate::consts::{
    NAO_DESCRIPTION, NAO_HAS_SUB_RESOURCE, NAO_PREF_LABEL, NIE_URL, RDF_SYNTAX_INTERNAL_PROPERTIES,
    RDF_TYPE,
};
use crate::context::CoreContext;
use crate::errors::{Error, Result};
use crate::flags::{DescribeFlags, IdentificationMode, IdentificationResult, RemoveFlags, StoreFlags};
use crate::identifier::ResourceIdentifier;
use crate::merger::{ResourceMerger, WriteOutcome};
use crate::sync_resource::{SimpleResourceGraph, SyncResource};
use crate::uri;
use crate::value::Value;
use crate::watcher::{ChangeEvent, ChangeKind};

fn require_non_empty_app(app: &str) -> Result<()> {
    if app.is_empty() {
        return Err(Error::InvalidArgument("application id must not be empty".into()));
    }
    Ok(())
}

fn require_non_empty_resources(resources: &[NamedNode]) -> Result<()> {
    if resources.is_empty() {
        return Err(Error::InvalidArgument("resources must not be empty".into()));
    }
    Ok(())
}

impl CoreContext {
    fn merger(&self) -> ResourceMerger<'_> {
        ResourceMerger::new(&self.store, &self.cpt, &self.registry, &self.type_cache)
    }

    fn subject_types(&self, subject: &NamedNode) -> Vec<NamedNode> {
        self.type_cache.types(self.store.inner(), subject.as_ref())
    }

    fn event(&self, subject: &NamedNode, predicate: NamedNodeRef<'_>, object: Term, kind: ChangeKind) -> ChangeEvent {
        ChangeEvent {
            subject: subject.clone(),
            predicate: NamedNode::from(predicate),
            object,
            kind,
            subject_types: self.subject_types(subject),
        }
    }

    fn publish(&self, events: Vec<ChangeEvent>) {
        self.watcher.dispatch(&events, &self.cpt);
    }

    /// Adds `nao:created` (if absent) to `subject`. Every mutation already
    /// bumps `nao:lastModified` via [`ResourceMerger::add_statement`] /
    /// [`ResourceMerger::remove_statement`], so only the creation timestamp
    /// needs an explicit touch here.
    fn ensure_created(&self, subject: &NamedNode) -> Result<()> {
        self.merger().ensure_created(subject, Utc::now())
    }

    /// Removes the default-graph meta-properties if `subject` no longer has
    /// any statement naming it, and invalidates its type-cache entry.
    fn gc_if_orphaned(&self, subject: &NamedNode) -> Result<bool> {
        let merger = self.merger();
        if merger.resource_has_statements(subject)? {
            return Ok(false);
        }
        merger.remove_meta_properties(subject)?;
        self.type_cache.invalidate(subject.as_ref());
        Ok(true)
    }

    fn check_url_free_for(&self, subject: &NamedNode, url: &Term) -> Result<()> {
        let taken_by_other = self
            .store
            .inner()
            .quads_for_pattern(None, Some(NIE_URL), Some(url.as_ref()), None)
            .filter_map(std::result::Result::ok)
            .any(|q| match q.subject {
                oxigraph::model::NamedOrBlankNode::NamedNode(n) => n != *subject,
                _ => false,
            });
        if taken_by_other {
            return Err(Error::UniquenessViolation(format!(
                "nie:url {url:?} is already claimed by another resource"
            )));
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // addProperty
    // ---------------------------------------------------------------

    pub fn add_property(
        &self,
        resources: &[NamedNode],
        property: &NamedNode,
        values: &[Value],
        app: &str,
    ) -> Result<()> {
        require_non_empty_resources(resources)?;
        require_non_empty_app(app)?;
        if RDF_SYNTAX_INTERNAL_PROPERTIES.iter().any(|p| *p == property.as_ref()) {
            return Err(Error::InvalidArgument(format!(
                "{property} is managed by the core and cannot be set directly"
            )));
        }

        let terms = self.coerce_values(property, values)?;
        self.validate_cardinality_and_url(resources, property, &terms)?;

        let merger = self.merger();
        for resource in resources {
            for term in &terms {
                merger.validate_statement(resource, property, term)?;
            }
        }

        let mut events = Vec::new();
        for resource in resources {
            self.ensure_created(resource)?;
            for term in &terms {
                let outcome = merger.add_statement(resource, property, term, app, false)?;
                if outcome == WriteOutcome::Inserted {
                    events.push(self.event(resource, property.as_ref(), term.clone(), ChangeKind::Added));
                }
            }
        }
        self.publish(events);
        Ok(())
    }

    /// Converts every input [`Value`] to an RDF term for `property`'s range,
    /// deduplicating equal terms within the batch.
    fn coerce_values(&self, property: &NamedNode, values: &[Value]) -> Result<Vec<Term>> {
        let mut terms = Vec::with_capacity(values.len());
        for value in values {
            let term = self.cpt.variant_to_node(value, property.as_ref())?;
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
        Ok(terms)
    }

    /// Validates cumulative max-cardinality and `nie:url` uniqueness across
    /// the whole `resources x terms` batch before any statement is written,
    /// so a violation discovered partway through does not leave a partial
    /// mutation behind.
    fn validate_cardinality_and_url(
        &self,
        resources: &[NamedNode],
        property: &NamedNode,
        terms: &[Term],
    ) -> Result<()> {
        let max = self.cpt.max_cardinality(property.as_ref());
        for resource in resources {
            if max > 0 {
                let existing: HashSet<Term> = self
                    .store
                    .inner()
                    .quads_for_pattern(Some(resource.as_ref().into()), Some(property.as_ref()), None, None)
                    .filter_map(std::result::Result::ok)
                    .map(|q| q.object)
                    .collect();
                let mut union = existing.clone();
                union.extend(terms.iter().cloned());
                if union.len() > max as usize {
                    return Err(Error::CardinalityExceeded {
                        property: property.clone(),
                        resource: resource.clone(),
                        max,
                        would_have: union.len(),
                    });
                }
            }
            if property.as_ref() == NIE_URL {
                for term in terms {
                    self.check_url_free_for(resource, term)?;
                }
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // setProperty
    // ---------------------------------------------------------------

    pub fn set_property(
        &self,
        resources: &[NamedNode],
        property: &NamedNode,
        values: &[Value],
        app: &str,
    ) -> Result<()> {
        require_non_empty_resources(resources)?;
        require_non_empty_app(app)?;

        if property.as_ref() == NIE_URL {
            return self.set_nie_url(resources, values, app);
        }

        // setProperty replaces only the calling app's own prior contribution
        // to this property, so other apps' provenance on the same statement
        // survives untouched.
        self.remove_property(resources, property, &[], app)?;
        if values.is_empty() {
            return Ok(());
        }
        self.add_property(resources, property, values, app)
    }

    /// `nie:url` is functional and, once set, immutable except to move a
    /// file resource's URL onto a URL nobody else has claimed.
    fn set_nie_url(&self, resources: &[NamedNode], values: &[Value], app: &str) -> Result<()> {
        if values.len() > 1 {
            return Err(Error::InvalidArgument("nie:url accepts at most one value".into()));
        }
        let property = NamedNode::from(NIE_URL);
        for resource in resources {
            let existing: Vec<Term> = self
                .store
                .inner()
                .quads_for_pattern(Some(resource.as_ref().into()), Some(NIE_URL.into()), None, None)
                .filter_map(std::result::Result::ok)
                .map(|q| q.object)
                .collect();
            let (Some(old), Some(new_value)) = (existing.first(), values.first()) else {
                continue; // first-time set, or a removal: handled generically below
            };
            let new_term = self.cpt.variant_to_node(new_value, NIE_URL)?;
            if *old == new_term {
                continue; // unchanged
            }
            let is_file_resource = matches!(old, Term::NamedNode(n) if n.as_str().starts_with("file://"));
            if !is_file_resource {
                return Err(Error::PermissionDenied(format!(
                    "nie:url of {resource} cannot be changed once set"
                )));
            }
            self.check_url_free_for(resource, &new_term)?;
        }
        self.remove_property(resources, &property, &[], app)?;
        if values.is_empty() {
            return Ok(());
        }
        self.add_property(resources, &property, values, app)
    }

    // ---------------------------------------------------------------
    // removeProperty
    // ---------------------------------------------------------------

    pub fn remove_property(
        &self,
        resources: &[NamedNode],
        property: &NamedNode,
        values: &[Value],
        app: &str,
    ) -> Result<()> {
        require_non_empty_resources(resources)?;
        require_non_empty_app(app)?;

        let merger = self.merger();
        let mut events = Vec::new();
        for resource in resources {
            let targets: Vec<Term> = if values.is_empty() {
                self.store
                    .inner()
                    .quads_for_pattern(Some(resource.as_ref().into()), Some(property.as_ref()), None, None)
                    .filter_map(std::result::Result::ok)
                    .map(|q| q.object)
                    .collect()
            } else {
                self.coerce_values(property, values)?
            };
            for term in targets {
                if merger.remove_statement(resource, property, &term, app)? {
                    events.push(self.event(resource, property.as_ref(), term, ChangeKind::Removed));
                }
            }
            self.gc_if_orphaned(resource)?;
        }
        self.publish(events);
        Ok(())
    }

    // ---------------------------------------------------------------
    // removeResources / removeDataByApplication
    // ---------------------------------------------------------------

    /// Removes every statement naming `resource` (subject or object) on
    /// behalf of `app`; with `flags.remove_sub_resources`, cascades to owned
    /// children that would otherwise be left parentless. Shared by
    /// `removeResources` and `removeDataByApplication`, which differ only in
    /// which resources they start from.
    fn remove_resource_statements(
        &self,
        resource: &NamedNode,
        flags: RemoveFlags,
        app: &str,
        events: &mut Vec<ChangeEvent>,
        visited: &mut HashSet<NamedNode>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        cancel.check()?;
        if !visited.insert(resource.clone()) {
            return Ok(());
        }

        let children: Vec<NamedNode> = self
            .store
            .inner()
            .quads_for_pattern(Some(resource.as_ref().into()), Some(NAO_HAS_SUB_RESOURCE), None, None)
            .filter_map(std::result::Result::ok)
            .filter_map(|q| match q.object {
                Term::NamedNode(n) => Some(n),
                _ => None,
            })
            .collect();

        let as_subject: Vec<(NamedNode, Term)> = self
            .store
            .inner()
            .quads_for_pattern(Some(resource.as_ref().into()), None, None, None)
            .filter_map(std::result::Result::ok)
            .map(|q| (q.predicate, q.object))
            .collect();
        let as_object: Vec<(NamedNode, NamedNode)> = self
            .store
            .inner()
            .quads_for_pattern(None, None, Some(Term::NamedNode(resource.clone()).as_ref()), None)
            .filter_map(std::result::Result::ok)
            .filter_map(|q| match q.subject {
                oxigraph::model::NamedOrBlankNode::NamedNode(s) => Some((s, q.predicate)),
                _ => None,
            })
            .collect();

        let merger = self.merger();
        for (predicate, object) in as_subject {
            if merger.remove_statement(resource, &predicate, &object, app)? {
                events.push(self.event(resource, predicate.as_ref(), object, ChangeKind::Removed));
            }
        }
        for (subject, predicate) in as_object {
            let object = Term::NamedNode(resource.clone());
            if merger.remove_statement(&subject, &predicate, &object, app)? {
                events.push(self.event(&subject, predicate.as_ref(), object, ChangeKind::Removed));
            }
        }
        self.gc_if_orphaned(resource)?;

        if flags.remove_sub_resources {
            for child in children {
                let still_has_a_parent = self
                    .store
                    .inner()
                    .quads_for_pattern(
                        None,
                        Some(NAO_HAS_SUB_RESOURCE),
                        Some(Term::NamedNode(child.clone()).as_ref()),
                        None,
                    )
                    .next()
                    .is_some();
                if !still_has_a_parent {
                    self.remove_resource_statements(&child, flags, app, events, visited, cancel)?;
                }
            }
        }
        Ok(())
    }

    pub fn remove_resources(&self, resources: &[NamedNode], flags: RemoveFlags, app: &str) -> Result<()> {
        self.remove_resources_with_cancellation(resources, flags, app, &CancellationToken::new())
    }

    /// As [`Self::remove_resources`], but checks `cancel` between each
    /// resource (and sub-resource, when cascading) so a caller can abort a
    /// large removal before it finishes. Already-removed statements are not
    /// rolled back.
    pub fn remove_resources_with_cancellation(
        &self,
        resources: &[NamedNode],
        flags: RemoveFlags,
        app: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        require_non_empty_resources(resources)?;
        require_non_empty_app(app)?;
        let mut events = Vec::new();
        let mut visited = HashSet::new();
        for resource in resources {
            self.remove_resource_statements(resource, flags, app, &mut events, &mut visited, cancel)?;
        }
        self.publish(events);
        Ok(())
    }

    pub fn remove_data_by_application(
        &self,
        resources: &[NamedNode],
        flags: RemoveFlags,
        app: &str,
    ) -> Result<()> {
        self.remove_data_by_application_with_cancellation(resources, flags, app, &CancellationToken::new())
    }

    /// As [`Self::remove_data_by_application`], but checks `cancel` between
    /// each resource in the removal cascade.
    pub fn remove_data_by_application_with_cancellation(
        &self,
        resources: &[NamedNode],
        flags: RemoveFlags,
        app: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        require_non_empty_resources(resources)?;
        require_non_empty_app(app)?;
        let mut events = Vec::new();
        let mut visited = HashSet::new();
        for resource in resources {
            self.remove_resource_statements(resource, flags, app, &mut events, &mut visited, cancel)?;
        }
        self.publish(events);
        Ok(())
    }

    /// Discovers its resource set from every graph `app` maintains (there is
    /// no caller-supplied list for this operation) and removes it the same
    /// way `removeDataByApplication` would.
    pub fn remove_all_data_by_application(&self, flags: RemoveFlags, app: &str) -> Result<()> {
        self.remove_all_data_by_application_with_cancellation(flags, app, &CancellationToken::new())
    }

    /// As [`Self::remove_all_data_by_application`], but checks `cancel`
    /// between each resource in the removal cascade.
    pub fn remove_all_data_by_application_with_cancellation(
        &self,
        flags: RemoveFlags,
        app: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        require_non_empty_app(app)?;
        let graphs = self.registry.graphs_for_maintainer(app);
        let mut resources: HashSet<NamedNode> = HashSet::new();
        for graph in graphs {
            cancel.check()?;
            for quad in self
                .store
                .inner()
                .quads_for_pattern(None, None, None, Some(GraphName::NamedNode(graph).as_ref()))
                .filter_map(std::result::Result::ok)
            {
                if let oxigraph::model::NamedOrBlankNode::NamedNode(s) = quad.subject {
                    resources.insert(s);
                }
                if let Term::NamedNode(o) = quad.object {
                    resources.insert(o);
                }
            }
        }
        if resources.is_empty() {
            return Ok(());
        }
        let resources: Vec<NamedNode> = resources.into_iter().collect();
        self.remove_data_by_application_with_cancellation(&resources, flags, app, cancel)
    }

    // ---------------------------------------------------------------
    // createResource
    // ---------------------------------------------------------------

    pub fn create_resource(
        &self,
        types: &[NamedNode],
        label: &str,
        description: &str,
        app: &str,
    ) -> Result<NamedNode> {
        require_non_empty_app(app)?;
        let subject = uri::new_resource_uri();
        let collapsed = self.collapse_redundant_types(types);

        // rdf:type is an internal syntax property, so it bypasses
        // addProperty's public-entry-point restriction and is written
        // directly through the merger.
        let type_prop = NamedNode::from(RDF_TYPE);
        let mut planned: Vec<(NamedNode, Term)> = collapsed
            .iter()
            .map(|class| (type_prop.clone(), Term::NamedNode(class.clone())))
            .collect();
        if !label.is_empty() {
            let term = self.cpt.variant_to_node(&Value::String(label.to_string()), NAO_PREF_LABEL)?;
            planned.push((NamedNode::from(NAO_PREF_LABEL), term));
        }
        if !description.is_empty() {
            let term = self
                .cpt
                .variant_to_node(&Value::String(description.to_string()), NAO_DESCRIPTION)?;
            planned.push((NamedNode::from(NAO_DESCRIPTION), term));
        }

        let merger = self.merger();
        for (property, value) in &planned {
            merger.validate_statement_with_extra_types(&subject, property, value, &collapsed)?;
        }

        let mut events = Vec::new();
        for (property, value) in planned {
            let outcome = merger.add_statement(&subject, &property, &value, app, false)?;
            if outcome == WriteOutcome::Inserted {
                events.push(self.event(&subject, property.as_ref(), value, ChangeKind::Added));
            }
        }
        self.ensure_created(&subject)?;
        self.publish(events);
        Ok(subject)
    }

    /// Drops any type whose subclass closure is already implied by another
    /// type in the same batch, so redundant supertype assertions never land.
    fn collapse_redundant_types(&self, types: &[NamedNode]) -> Vec<NamedNode> {
        let mut kept = Vec::new();
        for (i, t) in types.iter().enumerate() {
            let implied_by_another = types
                .iter()
                .enumerate()
                .any(|(j, other)| i != j && other != t && self.cpt.is_subclass_of(other.as_ref(), t.as_ref()));
            if !implied_by_another && !kept.contains(t) {
                kept.push(t.clone());
            }
        }
        kept
    }

    // ---------------------------------------------------------------
    // mergeResources
    // ---------------------------------------------------------------

    pub fn merge_resources(&self, a: &NamedNode, b: &NamedNode, app: &str) -> Result<()> {
        require_non_empty_app(app)?;
        if a == b {
            return Ok(());
        }

        let subject_quads: Vec<(NamedNode, Term)> = self
            .store
            .inner()
            .quads_for_pattern(Some(b.as_ref().into()), None, None, None)
            .filter_map(std::result::Result::ok)
            .map(|q| (q.predicate, q.object))
            .collect();
        let object_quads: Vec<(NamedNode, NamedNode)> = self
            .store
            .inner()
            .quads_for_pattern(None, None, Some(Term::NamedNode(b.clone()).as_ref()), None)
            .filter_map(std::result::Result::ok)
            .filter_map(|q| match q.subject {
                oxigraph::model::NamedOrBlankNode::NamedNode(s) => Some((s, q.predicate)),
                _ => None,
            })
            .collect();

        // Pre-validate every rewritten statement against `a` before writing
        // any of them.
        let merger = self.merger();
        for (predicate, value) in &subject_quads {
            merger.validate_statement(a, predicate, value)?;
        }
        for (subject, predicate) in &object_quads {
            merger.validate_statement(subject, predicate, &Term::NamedNode(a.clone()))?;
        }

        let mut events = Vec::new();
        for (predicate, value) in subject_quads {
            if merger.remove_statement(b, &predicate, &value, app)? {
                events.push(self.event(b, predicate.as_ref(), value.clone(), ChangeKind::Removed));
            }
            let outcome = merger.add_statement(a, &predicate, &value, app, false)?;
            if outcome == WriteOutcome::Inserted {
                events.push(self.event(a, predicate.as_ref(), value, ChangeKind::Added));
            }
        }
        for (subject, predicate) in object_quads {
            let old_value = Term::NamedNode(b.clone());
            let new_value = Term::NamedNode(a.clone());
            if merger.remove_statement(&subject, &predicate, &old_value, app)? {
                events.push(self.event(&subject, predicate.as_ref(), old_value, ChangeKind::Removed));
            }
            let outcome = merger.add_statement(&subject, &predicate, &new_value, app, false)?;
            if outcome == WriteOutcome::Inserted {
                events.push(self.event(&subject, predicate.as_ref(), new_value, ChangeKind::Added));
            }
        }

        self.gc_if_orphaned(b)?;
        self.publish(events);
        Ok(())
    }

    // ---------------------------------------------------------------
    // storeResources
    // ---------------------------------------------------------------

    pub fn store_resources(
        &self,
        graph: SimpleResourceGraph,
        mode: IdentificationMode,
        flags: StoreFlags,
        additional_metadata: &HashMap<String, String>,
        app: &str,
    ) -> Result<HashMap<String, NamedNode>> {
        self.store_resources_with_cancellation(
            graph,
            mode,
            flags,
            additional_metadata,
            app,
            &CancellationToken::new(),
        )
    }

    /// As [`Self::store_resources`], but checks `cancel` between the
    /// identification, merging, and write sub-steps so a caller can abort a
    /// large batch partway through. Sub-steps already applied are not rolled
    /// back.
    pub fn store_resources_with_cancellation(
        &self,
        graph: SimpleResourceGraph,
        mode: IdentificationMode,
        flags: StoreFlags,
        additional_metadata: &HashMap<String, String>,
        app: &str,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, NamedNode>> {
        require_non_empty_app(app)?;
        if graph.is_empty() {
            return Err(Error::InvalidArgument("storeResources requires at least one resource".into()));
        }

        // 1. Validation: URI shape and property/literal coercion. Unknown
        // non-type properties are rejected; unknown rdf:type values are
        // accepted (the CPT is permissive toward third-party ontologies it
        // has not indexed).
        let input_uris: HashSet<String> = graph.uris().map(str::to_string).collect();
        let mut coerced = SimpleResourceGraph::new();
        for resource in graph.resources() {
            self.validate_incoming_uri(resource.uri())?;
            let mut fixed = SyncResource::new(resource.uri());
            for (property, value) in resource.iter() {
                if property.as_ref() != RDF_TYPE && !self.cpt.is_property(property.as_ref()) {
                    return Err(Error::UnknownProperty(property.clone()));
                }
                fixed.insert(property.clone(), self.recoerce_term(property, value)?);
            }
            coerced.insert(fixed);
        }

        // 2. Identification.
        let identifier = ResourceIdentifier::new(&self.store, &self.cpt);
        let mut resolved: HashMap<String, NamedNode> = HashMap::new();
        let mut fresh: HashSet<String> = HashSet::new();
        for uri in coerced.uris() {
            cancel.check()?;
            let resource = coerced.get(uri).expect("uri came from this graph");
            match identifier.run(resource, mode)? {
                IdentificationResult::Identified(existing) => {
                    resolved.insert(uri.to_string(), existing);
                }
                IdentificationResult::Fresh(minted) => {
                    fresh.insert(uri.to_string());
                    resolved.insert(uri.to_string(), minted);
                }
                IdentificationResult::Ambiguous(candidates) => {
                    return Err(Error::AmbiguousIdentification(candidates.len()));
                }
            }
        }

        // 3/4. Hierarchy + merging: rewrite every object reference that
        // points at one of the input graph's own (possibly blank) URIs to
        // its resolved URI, then merge statement-by-statement.
        let mut planned: Vec<(NamedNode, NamedNode, Term)> = Vec::new();
        for uri in coerced.uris() {
            let subject = resolved.get(uri).expect("every uri was resolved above").clone();
            let resource = coerced.get(uri).expect("uri came from this graph");
            for (property, value) in resource.iter() {
                let value = match value {
                    Term::NamedNode(n) if input_uris.contains(n.as_str()) => {
                        Term::NamedNode(resolved.get(n.as_str()).cloned().unwrap_or_else(|| n.clone()))
                    }
                    other => other.clone(),
                };
                planned.push((subject.clone(), property.clone(), value));
            }
        }

        // With overwrite_properties, clear any pre-existing value of a
        // functional (max-cardinality-1) property the batch is about to set,
        // *before* validating cardinalities, otherwise the old value would
        // count against the new one and the store would reject its own
        // overwrite.
        if flags.overwrite_properties {
            let mut to_clear: HashSet<(NamedNode, NamedNode)> = HashSet::new();
            for (subject, property, _) in &planned {
                if property.as_ref() != NIE_URL && self.cpt.max_cardinality(property.as_ref()) == 1 {
                    to_clear.insert((subject.clone(), property.clone()));
                }
            }
            for (subject, property) in to_clear {
                self.remove_property(std::slice::from_ref(&subject), &property, &[], app)?;
            }
        }

        let merger = self.merger();
        for (subject, property, value) in &planned {
            if property.as_ref() == NIE_URL {
                self.check_url_free_for(subject, value)?;
            }
        }
        self.validate_store_cardinalities(&planned, flags.lazy_cardinalities)?;

        // Domain checks must see rdf:type assertions the same batch is about
        // to write, not just what is already in the store.
        let mut planned_types: HashMap<NamedNode, Vec<NamedNode>> = HashMap::new();
        for (subject, property, value) in &planned {
            if property.as_ref() == RDF_TYPE {
                if let Term::NamedNode(class) = value {
                    planned_types.entry(subject.clone()).or_default().push(class.clone());
                }
            }
        }
        for (subject, property, value) in &planned {
            let extra = planned_types.get(subject).map(Vec::as_slice).unwrap_or(&[]);
            merger.validate_statement_with_extra_types(subject, property, value, extra)?;
        }

        cancel.check()?;
        let mut events = Vec::new();
        for uri in &fresh {
            let subject = resolved.get(uri).expect("fresh uri was resolved");
            self.ensure_created(subject)?;
        }
        for (subject, property, value) in planned {
            cancel.check()?;
            let outcome = merger.add_statement(&subject, &property, &value, app, false)?;
            if outcome == WriteOutcome::Inserted {
                events.push(self.event(&subject, property.as_ref(), value, ChangeKind::Added));
            }
        }

        // 5. Additional metadata is attached to the app's provenance graph
        // itself, not to any individual resource.
        if !additional_metadata.is_empty() {
            let target_graph = self.registry.graph_for(self.store.inner(), app, false, Utc::now())?;
            for (key, value) in additional_metadata {
                let Ok(prop) = NamedNode::new(format!("nepomuk:/meta/{key}")) else {
                    warn!("skipping unrepresentable metadata key {key:?}");
                    continue;
                };
                self.store.inner().insert(&Quad::new(
                    target_graph.clone(),
                    prop,
                    oxigraph::model::Literal::new_simple_literal(value.as_str()),
                    GraphName::DefaultGraph,
                ))?;
            }
        }

        self.publish(events);
        Ok(resolved)
    }

    /// Checks max-cardinality across the whole planned batch, grouped by
    /// `(subject, property)`. `lazy` defers the check until the batch's
    /// final per-pair union is known; eager mode rejects as soon as any
    /// prefix of the batch (taken in input order) would already exceed it.
    fn validate_store_cardinalities(&self, planned: &[(NamedNode, NamedNode, Term)], lazy: bool) -> Result<()> {
        let mut running: HashMap<(NamedNode, NamedNode), Vec<Term>> = HashMap::new();
        for (subject, property, value) in planned {
            let max = self.cpt.max_cardinality(property.as_ref());
            if max == 0 {
                continue;
            }
            let key = (subject.clone(), property.clone());
            let acc = running.entry(key).or_insert_with(|| {
                self.store
                    .inner()
                    .quads_for_pattern(Some(subject.as_ref().into()), Some(property.as_ref()), None, None)
                    .filter_map(std::result::Result::ok)
                    .map(|q| q.object)
                    .collect()
            });
            if !acc.contains(value) {
                acc.push(value.clone());
            }
            if !lazy && acc.len() > max as usize {
                return Err(Error::CardinalityExceeded {
                    property: property.clone(),
                    resource: subject.clone(),
                    max,
                    would_have: acc.len(),
                });
            }
        }
        if lazy {
            for ((subject, property), values) in running {
                let max = self.cpt.max_cardinality(property.as_ref());
                if values.len() > max as usize {
                    return Err(Error::CardinalityExceeded {
                        property,
                        resource: subject,
                        max,
                        would_have: values.len(),
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_incoming_uri(&self, uri: &str) -> Result<()> {
        if uri.starts_with("_:") || uri::is_resource_uri(uri) {
            return Ok(());
        }
        if uri.starts_with("nepomuk:/") {
            return Err(Error::InvalidArgument(format!(
                "'{uri}' is not a well-formed nepomuk resource URI"
            )));
        }
        if NamedNode::new(uri).is_err() {
            return Err(Error::InvalidArgument(format!("'{uri}' is not a valid URI")));
        }
        Ok(())
    }

    /// Re-coerces an incoming plain-string literal against its property's
    /// declared range (promoting it to the canonical typed literal the CPT
    /// expects); already-typed literals and resource references pass through
    /// unchanged.
    fn recoerce_term(&self, property: &NamedNode, term: &Term) -> Result<Term> {
        let Term::Literal(lit) = term else {
            return Ok(term.clone());
        };
        let is_plain_string = lit.datatype() == xsd::STRING && lit.language().is_none();
        if is_plain_string && !self.cpt.has_literal_range(property.as_ref()) {
            let value = Value::String(lit.value().to_string());
            self.cpt.variant_to_node(&value, property.as_ref())
        } else {
            Ok(term.clone())
        }
    }

    // ---------------------------------------------------------------
    // describeResources
    // ---------------------------------------------------------------

    pub fn describe_resources(&self, resources: &[NamedNode], flags: DescribeFlags) -> Result<SimpleResourceGraph> {
        require_non_empty_resources(resources)?;
        let mut graph = SimpleResourceGraph::new();
        let mut related: HashSet<NamedNode> = HashSet::new();

        for resource in resources {
            self.describe_one(resource, flags, &mut graph, &mut related);
        }
        if flags.include_related_resources {
            for extra in related {
                if graph.get(extra.as_str()).is_some() {
                    continue;
                }
                let mut unused = HashSet::new();
                self.describe_one(&extra, flags, &mut graph, &mut unused);
            }
        }
        Ok(graph)
    }

    fn describe_one(
        &self,
        resource: &NamedNode,
        flags: DescribeFlags,
        graph: &mut SimpleResourceGraph,
        related: &mut HashSet<NamedNode>,
    ) {
        let mut sync = SyncResource::new(resource.as_str());
        for quad in self
            .store
            .inner()
            .quads_for_pattern(Some(resource.as_ref().into()), None, None, None)
            .filter_map(std::result::Result::ok)
        {
            if flags.exclude_discardable_data && self.is_discardable_graph(&quad.graph_name) {
                continue;
            }
            if flags.include_related_resources {
                if let Term::NamedNode(n) = &quad.object {
                    related.insert(n.clone());
                }
            }
            sync.insert(quad.predicate, quad.object);
        }
        if sync.is_valid() {
            graph.insert(sync);
        }
    }

    fn is_discardable_graph(&self, graph_name: &GraphName) -> bool {
        let GraphName::NamedNode(graph) = graph_name else {
            return false;
        };
        let Some(metadata_graph) = self.registry.metadata_graph_of(graph) else {
            return false;
        };
        self.store
            .inner()
            .quads_for_pattern(
                Some(graph.as_ref().into()),
                Some(RDF_TYPE),
                Some(crate::consts::NAO_DISCARDABLE_INSTANCE_BASE.into()),
                Some(GraphName::NamedNode(metadata_graph).as_ref()),
            )
            .next()
            .is_some()
    }
}
