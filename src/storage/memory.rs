use std::collections::HashMap as StdHashMap;

use parking_lot::RwLock;
use serde_json::Value as JsonValue;

use crate::config::AppConfig;
use super::{Item, KeyValueStore, StoreError, StoreResult};

/// Layout of one table: its primary key attribute plus attributes that carry a
/// unique secondary index.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub name: String,
    pub key: String,
    pub unique: Vec<String>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self { name: name.into(), key: key.into(), unique: Vec::new() }
    }

    pub fn with_unique(mut self, field: impl Into<String>) -> Self {
        self.unique.push(field.into());
        self
    }
}

#[derive(Default)]
struct Table {
    key: String,
    rows: StdHashMap<String, Item>,
    /// field -> (value -> primary key)
    indexes: StdHashMap<String, StdHashMap<String, String>>,
}

impl Table {
    fn key_of(&self, table: &str, item: &Item) -> StoreResult<String> {
        item.get(&self.key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| StoreError::MissingKey { table: table.to_string(), key: self.key.clone() })
    }

    /// Insert or replace `pk`, keeping unique indexes in step. Nothing changes on conflict.
    fn write(&mut self, table: &str, pk: String, item: Item) -> StoreResult<()> {
        for (field, idx) in self.indexes.iter() {
            if let Some(v) = item.get(field).and_then(|v| v.as_str()) {
                if idx.get(v).map(|owner| owner != &pk).unwrap_or(false) {
                    return Err(StoreError::Conflict { table: table.to_string(), field: field.clone() });
                }
            }
        }
        self.unindex(&pk);
        for (field, idx) in self.indexes.iter_mut() {
            if let Some(v) = item.get(field).and_then(|v| v.as_str()) {
                idx.insert(v.to_string(), pk.clone());
            }
        }
        self.rows.insert(pk, item);
        Ok(())
    }

    fn unindex(&mut self, pk: &str) {
        let Some(old) = self.rows.get(pk) else { return; };
        for (field, idx) in self.indexes.iter_mut() {
            if let Some(v) = old.get(field).and_then(|v| v.as_str()) {
                if idx.get(v).map(|k| k == pk).unwrap_or(false) { idx.remove(v); }
            }
        }
    }
}

/// In-process store used by the server binary and the tests. Every table lives
/// behind a single `RwLock`, so each operation is atomic with respect to the others.
pub struct MemoryStore {
    tables: RwLock<StdHashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new(specs: impl IntoIterator<Item = TableSpec>) -> Self {
        let mut tables = StdHashMap::new();
        for spec in specs {
            let indexes = spec.unique.iter().map(|f| (f.clone(), StdHashMap::new())).collect();
            tables.insert(spec.name, Table { key: spec.key, rows: StdHashMap::new(), indexes });
        }
        Self { tables: RwLock::new(tables) }
    }

    /// Tables used by the service, with email uniqueness enforced on users.
    pub fn for_config(cfg: &AppConfig) -> Self {
        Self::new([
            TableSpec::new(&cfg.users_table, "username").with_unique("email"),
            TableSpec::new(&cfg.sessions_table, "token"),
            TableSpec::new(&cfg.teams_table, "team_id"),
            TableSpec::new(&cfg.tasks_table, "task_id"),
        ])
    }

    pub fn len(&self, table: &str) -> usize {
        self.tables.read().get(table).map(|t| t.rows.len()).unwrap_or(0)
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, table: &str, key: &str) -> StoreResult<Option<Item>> {
        let r = self.tables.read();
        let t = r.get(table).ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        Ok(t.rows.get(key).cloned())
    }

    fn put_item(&self, table: &str, item: Item) -> StoreResult<()> {
        let mut w = self.tables.write();
        let t = w.get_mut(table).ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        let pk = t.key_of(table, &item)?;
        t.write(table, pk, item)
    }

    fn put_item_if_absent(&self, table: &str, item: Item) -> StoreResult<()> {
        let mut w = self.tables.write();
        let t = w.get_mut(table).ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        let pk = t.key_of(table, &item)?;
        if t.rows.contains_key(&pk) {
            return Err(StoreError::AlreadyExists { table: table.to_string(), key: pk });
        }
        t.write(table, pk, item)
    }

    fn query_eq(&self, table: &str, field: &str, value: &str) -> StoreResult<Vec<Item>> {
        let r = self.tables.read();
        let t = r.get(table).ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        if let Some(idx) = t.indexes.get(field) {
            return Ok(idx.get(value).and_then(|pk| t.rows.get(pk)).cloned().into_iter().collect());
        }
        Ok(t.rows
            .values()
            .filter(|item| item.get(field).and_then(|v| v.as_str()) == Some(value))
            .cloned()
            .collect())
    }

    fn append_to_list(&self, table: &str, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut w = self.tables.write();
        let t = w.get_mut(table).ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        let item = t
            .rows
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound { table: table.to_string(), key: key.to_string() })?;
        match item.entry(field.to_string()).or_insert_with(|| JsonValue::Array(Vec::new())) {
            JsonValue::Array(list) => {
                list.push(JsonValue::String(value.to_string()));
                Ok(())
            }
            _ => Err(StoreError::NotAList { key: key.to_string(), field: field.to_string() }),
        }
    }

    fn sweep(&self, table: &str, keep: &dyn Fn(&Item) -> bool) -> StoreResult<usize> {
        let mut w = self.tables.write();
        let t = w.get_mut(table).ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        let doomed: Vec<String> = t.rows.iter().filter(|(_, item)| !keep(*item)).map(|(k, _)| k.clone()).collect();
        for k in doomed.iter() {
            t.unindex(k);
            t.rows.remove(k);
        }
        Ok(doomed.len())
    }
}
