//! `CoreContext`: the explicit handle threaded through every public call,
//! replacing the source's manager-of-managers singletons. Owns the store
//! connection, the Class/Property Tree, the Graph registry, the type-cache
//! and the Resource Watcher; tests construct a fresh context per case.

use std::collections::HashSet;

use log::info;

use crate::config::Config;
use crate::cpt::ClassPropertyTree;
use crate::errors::Result;
use crate::graph_registry::GraphRegistry;
use crate::ontology;
use crate::store::Store;
use crate::type_cache::TypeCache;
use crate::watcher::{Notification, ResourceWatcher, WatchFilter, WatchId};

/// Reads the `NEPOMUK_LOG` environment variable and, if set, copies it into
/// `RUST_LOG` before the caller invokes `env_logger::init()`. `NEPOMUK_LOG`
/// takes precedence so a single process embedding multiple `log`-based
/// crates can scope verbosity to just this one.
pub fn init_logging() {
    if let Ok(level) = std::env::var("NEPOMUK_LOG") {
        std::env::set_var("RUST_LOG", level);
    }
}

pub struct CoreContext {
    pub(crate) store: Store,
    pub(crate) cpt: ClassPropertyTree,
    pub(crate) registry: GraphRegistry,
    pub(crate) type_cache: TypeCache,
    pub(crate) watcher: ResourceWatcher,
    pub(crate) config: Config,
}

impl CoreContext {
    /// Opens the store described by `config` (in-memory if no path is set),
    /// loads any configured ontology locations, and rebuilds the CPT and
    /// graph registry from what is now on disk.
    pub fn open(config: Config) -> Result<Self> {
        let store = match &config.store_path {
            Some(path) => Store::open_path(path)?,
            None => Store::open_memory()?,
        };

        if !config.ontology_locations.is_empty() {
            let imported = ontology::load_locations(
                store.inner(),
                &config.ontology_locations,
                config.require_ontology_names,
            )?;
            info!("imported {imported} ontology file(s)");
        }

        let cpt = ClassPropertyTree::new();
        cpt.rebuild(store.inner())?;
        let registry = GraphRegistry::new();
        registry.rebuild(store.inner())?;
        let type_cache = TypeCache::new(config.type_cache_capacity);
        let watcher = ResourceWatcher::new();

        Ok(CoreContext {
            store,
            cpt,
            registry,
            type_cache,
            watcher,
            config,
        })
    }

    /// Re-scans the configured ontology locations and rebuilds the CPT if
    /// anything changed. Also invalidates the type-cache, since defining-ness
    /// and cardinality answers may have shifted.
    pub fn reload_ontologies(&self) -> Result<usize> {
        let imported = ontology::load_locations(
            self.store.inner(),
            &self.config.ontology_locations,
            self.config.require_ontology_names,
        )?;
        if imported > 0 {
            self.cpt.rebuild(self.store.inner())?;
            self.type_cache.clear();
        }
        Ok(imported)
    }

    pub fn cpt(&self) -> &ClassPropertyTree {
        &self.cpt
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registers a new watch with the given initial filters, returning its
    /// id and the channel new notification batches arrive on.
    pub fn watch(&self, filter: WatchFilter) -> (WatchId, std::sync::mpsc::Receiver<Notification>) {
        self.watcher.register(filter)
    }

    pub fn unwatch(&self, id: WatchId) {
        self.watcher.close(id)
    }

    pub fn watch_set_resources(&self, id: WatchId, resources: Option<HashSet<oxigraph::model::NamedNode>>) {
        self.watcher.set_resources(id, resources)
    }

    pub fn watch_set_properties(&self, id: WatchId, properties: Option<HashSet<oxigraph::model::NamedNode>>) {
        self.watcher.set_properties(id, properties)
    }

    pub fn watch_set_types(&self, id: WatchId, types: Option<HashSet<oxigraph::model::NamedNode>>) {
        self.watcher.set_types(id, types)
    }

    pub fn watch_add_resources(&self, id: WatchId, resources: impl IntoIterator<Item = oxigraph::model::NamedNode>) {
        self.watcher.add_resources(id, resources)
    }

    pub fn watch_remove_resources(&self, id: WatchId, resources: &HashSet<oxigraph::model::NamedNode>) {
        self.watcher.remove_resources(id, resources)
    }

    pub fn watch_add_properties(&self, id: WatchId, properties: impl IntoIterator<Item = oxigraph::model::NamedNode>) {
        self.watcher.add_properties(id, properties)
    }

    pub fn watch_remove_properties(&self, id: WatchId, properties: &HashSet<oxigraph::model::NamedNode>) {
        self.watcher.remove_properties(id, properties)
    }

    pub fn watch_add_types(&self, id: WatchId, types: impl IntoIterator<Item = oxigraph::model::NamedNode>) {
        self.watcher.add_types(id, types)
    }

    pub fn watch_remove_types(&self, id: WatchId, types: &HashSet<oxigraph::model::NamedNode>) {
        self.watcher.remove_types(id, types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_an_in_memory_context_with_empty_config() {
        let ctx = CoreContext::open(Config::builder().build().unwrap()).unwrap();
        assert!(ctx.cpt().is_subclass_of(crate::consts::RDFS_RESOURCE, crate::consts::RDFS_RESOURCE));
    }
}
