//!
//! agendum storage module
//! ----------------------
//! The auth core and the HTTP handlers only ever talk to storage through the
//! `KeyValueStore` trait: keyed tables of JSON-like items with single-key get/put,
//! an equality lookup on one attribute, and a list-append update. Anything that can
//! honour those operations atomically per key (DynamoDB, a SQL table, the bundled
//! in-memory store) can back the service.
//!
//! The process holds exactly one store handle (`SharedStore`), created lazily on
//! first use and cloned by reference into every request.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::Value as JsonValue;

use crate::config::AppConfig;

pub mod memory;

pub use memory::{MemoryStore, TableSpec};

/// A single stored record: attribute name -> JSON value.
pub type Item = serde_json::Map<String, JsonValue>;

/// Failures surfaced by a store backend. The text is for logs only and never
/// reaches a client.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown table '{0}'")]
    UnknownTable(String),
    #[error("item in table '{table}' is missing its key attribute '{key}'")]
    MissingKey { table: String, key: String },
    #[error("duplicate value for unique attribute '{field}' in table '{table}'")]
    Conflict { table: String, field: String },
    #[error("item '{key}' already exists in table '{table}'")]
    AlreadyExists { table: String, key: String },
    #[error("item '{key}' not found in table '{table}'")]
    NotFound { table: String, key: String },
    #[error("attribute '{field}' on '{key}' is not a list")]
    NotAList { key: String, field: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal key-value contract consumed by the identity core and the handlers.
pub trait KeyValueStore: Send + Sync {
    /// Fetch one item by primary key.
    fn get_item(&self, table: &str, key: &str) -> StoreResult<Option<Item>>;

    /// Create or overwrite an item. The key is read from the table's key attribute.
    fn put_item(&self, table: &str, item: Item) -> StoreResult<()>;

    /// Create an item only if no item with the same key exists; the existence check
    /// and the write happen atomically. Fails with `AlreadyExists` otherwise.
    fn put_item_if_absent(&self, table: &str, item: Item) -> StoreResult<()>;

    /// All items whose `field` equals `value` (string comparison). Backends use an
    /// index when one exists for the field and fall back to a scan otherwise.
    fn query_eq(&self, table: &str, field: &str, value: &str) -> StoreResult<Vec<Item>>;

    /// Append a string to a list attribute, creating the list when absent.
    fn append_to_list(&self, table: &str, key: &str, field: &str, value: &str) -> StoreResult<()>;

    /// Drop every item for which `keep` returns false. Returns the number removed.
    fn sweep(&self, table: &str, keep: &dyn Fn(&Item) -> bool) -> StoreResult<usize>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

static SHARED: OnceCell<SharedStore> = OnceCell::new();

/// Process-wide store handle. The first caller decides the table layout; later
/// callers get the same handle back.
pub fn shared_store(cfg: &AppConfig) -> SharedStore {
    SHARED
        .get_or_init(|| {
            tracing::info!(target: "agendum::storage", users = %cfg.users_table, sessions = %cfg.sessions_table, teams = %cfg.teams_table, tasks = %cfg.tasks_table, "initialising in-memory store");
            Arc::new(MemoryStore::for_config(cfg)) as SharedStore
        })
        .clone()
}

/// Read a string attribute from an item.
pub fn attr_str<'a>(item: &'a Item, field: &str) -> Option<&'a str> {
    item.get(field).and_then(|v| v.as_str())
}

/// Read a list-of-strings attribute, skipping non-string entries.
pub fn attr_str_list(item: &Item, field: &str) -> Vec<String> {
    item.get(field)
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}


#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Backend that refuses every operation, for exercising failure paths.
    pub(crate) struct DownStore;

    fn down<T>() -> StoreResult<T> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    impl KeyValueStore for DownStore {
        fn get_item(&self, _: &str, _: &str) -> StoreResult<Option<Item>> { down() }
        fn put_item(&self, _: &str, _: Item) -> StoreResult<()> { down() }
        fn put_item_if_absent(&self, _: &str, _: Item) -> StoreResult<()> { down() }
        fn query_eq(&self, _: &str, _: &str, _: &str) -> StoreResult<Vec<Item>> { down() }
        fn append_to_list(&self, _: &str, _: &str, _: &str, _: &str) -> StoreResult<()> { down() }
        fn sweep(&self, _: &str, _: &dyn Fn(&Item) -> bool) -> StoreResult<usize> { down() }
    }
}
