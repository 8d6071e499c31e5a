//! Configuration for a `CoreContext`: where the store lives, where ontologies
//! are loaded from, and the handful of behavioural toggles the Data
//! Management Model consults.

use derive_builder::Builder;
use std::path::PathBuf;

#[derive(Builder, Debug, Clone)]
#[builder(setter(into, strip_option), default)]
pub struct Config {
    /// Directory backing the on-disk store; `None` uses an in-memory store
    /// (the default, convenient for tests and the `IdentifyNone` CLI demo).
    pub store_path: Option<PathBuf>,

    /// Directories and files scanned for ontology graphs on startup.
    pub ontology_locations: Vec<PathBuf>,

    /// Reject ontology files that declare no `owl:Ontology` subject instead
    /// of falling back to using the file's location as the ontology name.
    pub require_ontology_names: bool,

    /// Capacity of the type-cache LRU (resource URI -> resolved types).
    pub type_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store_path: None,
            ontology_locations: Vec::new(),
            require_ontology_names: false,
            type_cache_capacity: 20,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}
