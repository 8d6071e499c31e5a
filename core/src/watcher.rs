//! The Resource Watcher: a pub/sub layer publishing fine-grained change
//! notifications, filtered by resource, property and type.
//!
//! Each registration is a tuple of optional filters acting as an AND: a
//! notification matches only if it passes every filter the client set.
//! Dispatch is serialised through [`ResourceWatcher::dispatch`]'s single
//! mutex, which both protects the registration table and gives every
//! subscriber a total order across transactions, the "single-producer
//! queue" of the design.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use oxigraph::model::{NamedNode, Term};

use crate::cpt::ClassPropertyTree;

/// Whether a statement was added or removed by the triggering operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
}

/// A single statement change, carried with the subject's resolved type set
/// so a type filter can be applied without a further store lookup.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub subject: NamedNode,
    pub predicate: NamedNode,
    pub object: Term,
    pub kind: ChangeKind,
    pub subject_types: Vec<NamedNode>,
}

pub type Notification = Vec<ChangeEvent>;

#[derive(Debug, Clone, Default)]
pub struct WatchFilter {
    pub resources: Option<HashSet<NamedNode>>,
    pub properties: Option<HashSet<NamedNode>>,
    pub types: Option<HashSet<NamedNode>>,
}

impl WatchFilter {
    pub fn any() -> Self {
        WatchFilter::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

struct Registration {
    id: WatchId,
    filter: WatchFilter,
    sender: Sender<Notification>,
}

impl Registration {
    fn matches(&self, event: &ChangeEvent, cpt: &ClassPropertyTree) -> bool {
        if let Some(resources) = &self.filter.resources {
            if !resources.contains(&event.subject) {
                return false;
            }
        }
        if let Some(properties) = &self.filter.properties {
            if !properties.contains(&event.predicate) {
                return false;
            }
        }
        if let Some(types) = &self.filter.types {
            let matches_type = types.iter().any(|wanted| {
                event
                    .subject_types
                    .iter()
                    .any(|t| t == wanted || cpt.is_subclass_of(t.as_ref(), wanted.as_ref()))
            });
            if !matches_type {
                return false;
            }
        }
        true
    }
}

/// Process-wide change-notification hub. Clients register a filter and get
/// back a handle plus a channel of notification batches; one batch is sent
/// per matching transaction, preserving that transaction's statement order.
pub struct ResourceWatcher {
    registrations: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
}

impl ResourceWatcher {
    pub fn new() -> Self {
        ResourceWatcher {
            registrations: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn register(&self, filter: WatchFilter) -> (WatchId, Receiver<Notification>) {
        let id = WatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel();
        self.registrations.lock().unwrap().push(Registration {
            id,
            filter,
            sender,
        });
        (id, receiver)
    }

    pub fn set_resources(&self, id: WatchId, resources: Option<HashSet<NamedNode>>) {
        self.with_registration(id, |r| r.filter.resources = resources);
    }

    pub fn add_resources(&self, id: WatchId, resources: impl IntoIterator<Item = NamedNode>) {
        self.with_registration(id, |r| {
            r.filter.resources.get_or_insert_with(HashSet::new).extend(resources);
        });
    }

    pub fn remove_resources(&self, id: WatchId, resources: &HashSet<NamedNode>) {
        self.with_registration(id, |r| {
            if let Some(set) = &mut r.filter.resources {
                set.retain(|n| !resources.contains(n));
            }
        });
    }

    pub fn set_properties(&self, id: WatchId, properties: Option<HashSet<NamedNode>>) {
        self.with_registration(id, |r| r.filter.properties = properties);
    }

    pub fn add_properties(&self, id: WatchId, properties: impl IntoIterator<Item = NamedNode>) {
        self.with_registration(id, |r| {
            r.filter.properties.get_or_insert_with(HashSet::new).extend(properties);
        });
    }

    pub fn remove_properties(&self, id: WatchId, properties: &HashSet<NamedNode>) {
        self.with_registration(id, |r| {
            if let Some(set) = &mut r.filter.properties {
                set.retain(|n| !properties.contains(n));
            }
        });
    }

    pub fn set_types(&self, id: WatchId, types: Option<HashSet<NamedNode>>) {
        self.with_registration(id, |r| r.filter.types = types);
    }

    pub fn add_types(&self, id: WatchId, types: impl IntoIterator<Item = NamedNode>) {
        self.with_registration(id, |r| {
            r.filter.types.get_or_insert_with(HashSet::new).extend(types);
        });
    }

    pub fn remove_types(&self, id: WatchId, types: &HashSet<NamedNode>) {
        self.with_registration(id, |r| {
            if let Some(set) = &mut r.filter.types {
                set.retain(|n| !types.contains(n));
            }
        });
    }

    pub fn close(&self, id: WatchId) {
        self.registrations.lock().unwrap().retain(|r| r.id != id);
    }

    fn with_registration(&self, id: WatchId, f: impl FnOnce(&mut Registration)) {
        if let Some(r) = self.registrations.lock().unwrap().iter_mut().find(|r| r.id == id) {
            f(r);
        }
    }

    /// Fans a committed transaction's events out to every matching
    /// registration, one batch per registration, in statement-add order.
    /// Registrations whose receiver has been dropped (transport
    /// disconnected) are removed.
    pub fn dispatch(&self, events: &[ChangeEvent], cpt: &ClassPropertyTree) {
        if events.is_empty() {
            return;
        }
        let mut registrations = self.registrations.lock().unwrap();
        registrations.retain(|reg| {
            let batch: Notification = events.iter().filter(|e| reg.matches(e, cpt)).cloned().collect();
            if batch.is_empty() {
                return true;
            }
            reg.sender.send(batch).is_ok()
        });
    }
}

impl Default for ResourceWatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::Literal;

    fn event(subject: &str, predicate: &str, kind: ChangeKind, types: Vec<&str>) -> ChangeEvent {
        ChangeEvent {
            subject: NamedNode::new_unchecked(subject),
            predicate: NamedNode::new_unchecked(predicate),
            object: Term::Literal(Literal::new_simple_literal("v")),
            kind,
            subject_types: types.into_iter().map(NamedNode::new_unchecked).collect(),
        }
    }

    #[test]
    fn unfiltered_registration_receives_every_event_in_one_batch() {
        let watcher = ResourceWatcher::new();
        let cpt = ClassPropertyTree::new();
        let (_, rx) = watcher.register(WatchFilter::any());
        let events = vec![
            event("urn:r1", "urn:p", ChangeKind::Added, vec![]),
            event("urn:r2", "urn:p", ChangeKind::Added, vec![]),
        ];
        watcher.dispatch(&events, &cpt);
        let batch = rx.try_recv().expect("expected a batch");
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn resource_filter_excludes_non_matching_subjects() {
        let watcher = ResourceWatcher::new();
        let cpt = ClassPropertyTree::new();
        let mut wanted = HashSet::new();
        wanted.insert(NamedNode::new_unchecked("urn:r1"));
        let (id, rx) = watcher.register(WatchFilter::any());
        watcher.set_resources(id, Some(wanted));
        let events = vec![
            event("urn:r1", "urn:p", ChangeKind::Added, vec![]),
            event("urn:r2", "urn:p", ChangeKind::Added, vec![]),
        ];
        watcher.dispatch(&events, &cpt);
        let batch = rx.try_recv().expect("expected a batch");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].subject.as_str(), "urn:r1");
    }

    #[test]
    fn closing_a_registration_stops_further_dispatch() {
        let watcher = ResourceWatcher::new();
        let cpt = ClassPropertyTree::new();
        let (id, rx) = watcher.register(WatchFilter::any());
        watcher.close(id);
        watcher.dispatch(&[event("urn:r1", "urn:p", ChangeKind::Added, vec![])], &cpt);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_receiver_auto_removes_registration() {
        let watcher = ResourceWatcher::new();
        let cpt = ClassPropertyTree::new();
        let (_, rx) = watcher.register(WatchFilter::any());
        drop(rx);
        watcher.dispatch(&[event("urn:r1", "urn:p", ChangeKind::Added, vec![])], &cpt);
        assert!(watcher.registrations.lock().unwrap().is_empty());
    }
}
