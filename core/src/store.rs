//! Thin wrapper around the `oxigraph` named-graph store: opens in-memory or
//! on-disk, and runs mutations inside a transaction so that either every
//! statement change happens or none does.

use std::path::Path;

use oxigraph::store::Store as OxStore;

use crate::errors::{Error, Result};

/// Handle to the underlying named-graph RDF store. Cloning is cheap:
/// `oxigraph::store::Store` is itself a handle around a shared backend, and
/// per the concurrency model each worker thread acquires its own connection
/// scoped to a single transaction.
#[derive(Clone)]
pub struct Store {
    inner: OxStore,
}

impl Store {
    pub fn open_memory() -> Result<Self> {
        Ok(Store {
            inner: OxStore::new().map_err(|e| Error::StoreError(e.to_string()))?,
        })
    }

    pub fn open_path(path: &Path) -> Result<Self> {
        Ok(Store {
            inner: OxStore::open(path).map_err(|e| Error::StoreError(e.to_string()))?,
        })
    }

    pub fn inner(&self) -> &OxStore {
        &self.inner
    }

    /// Runs `f` inside a store transaction. If `f` returns an error the
    /// transaction is rolled back and the error propagated; on panic the
    /// transaction is dropped without committing.
    pub fn transaction<T>(
        &self,
        f: impl for<'a> FnOnce(oxigraph::store::Transaction<'a>) -> Result<T>,
    ) -> Result<T> {
        self.inner.transaction(f)
    }
}
