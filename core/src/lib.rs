//! The Nepomuk Data Management Core: an ontology-aware, named-graph-backed
//! semantic store. Provides the Class/Property Tree, the Data Management
//! Model's mutation API, the Resource Identifier/Merger, and the Resource
//! Watcher pub/sub layer behind a single [`context::CoreContext`] handle.

extern crate derive_builder;

pub mod cancel;
pub mod config;
pub mod consts;
pub mod context;
pub mod cpt;
pub mod errors;
pub mod flags;
pub mod graph_registry;
pub mod identifier;
pub mod merger;
pub mod model;
pub mod ontology;
pub mod store;
pub mod sync_resource;
pub mod type_cache;
pub mod uri;
pub mod value;
pub mod watcher;

pub use cancel::CancellationToken;
pub use config::{Config, ConfigBuilder};
pub use context::{init_logging, CoreContext};
pub use cpt::ClassPropertyTree;
pub use errors::{Error, Result};
pub use flags::{DescribeFlags, IdentificationMode, IdentificationResult, RemoveFlags, StoreFlags};
pub use store::Store;
pub use sync_resource::{SimpleResourceGraph, SyncResource};
pub use value::Value;
pub use watcher::{ChangeEvent, ChangeKind, Notification, WatchFilter, WatchId};
