use crate::model::{value_token, Record, TypeName};
use crate::store::EntityStore;
use anyhow::Result;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// One batched lookup served by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub resource: TypeName,
    pub field: String,
    pub values: usize,
}

/// Rows kept in memory per resource type. Every lookup is recorded so callers
/// can check how many round trips a resolution took.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: HashMap<TypeName, Vec<Record>>,
    lookups: Mutex<Vec<Lookup>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rows for a resource type; non-object values are ignored
    pub fn insert(&mut self, resource: &str, rows: Vec<Value>) {
        let entry = self.rows.entry(resource.to_string()).or_default();
        entry.extend(rows.into_iter().filter_map(|row| match row {
            Value::Object(map) => Some(map),
            _ => None,
        }));
    }

    pub fn with_rows(mut self, resource: &str, rows: Vec<Value>) -> Self {
        self.insert(resource, rows);
        self
    }

    pub fn rows(&self, resource: &str) -> &[Record] {
        self.rows.get(resource).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn lookups(&self) -> Vec<Lookup> {
        self.lookups.lock().clone()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().len()
    }

    fn record(&self, resource: &str, field: &str, values: usize) {
        self.lookups.lock().push(Lookup {
            resource: resource.to_string(),
            field: field.to_string(),
            values,
        });
    }
}

impl EntityStore for MemoryStore {
    fn find_by_correlation(
        &self,
        resource: &str,
        key: &str,
        correlation_field: &str,
        values: &[String],
    ) -> Result<Vec<(String, Value)>> {
        self.record(resource, correlation_field, values.len());
        let wanted: HashSet<&str> = values.iter().map(String::as_str).collect();

        Ok(self
            .rows(resource)
            .iter()
            .filter_map(|row| {
                let cid = row.get(correlation_field).and_then(Value::as_str)?;
                if !wanted.contains(cid) {
                    return None;
                }
                let id = row.get(key).cloned().unwrap_or(Value::Null);
                Some((cid.to_string(), id))
            })
            .collect())
    }

    fn find_by_key(
        &self,
        resource: &str,
        key: &str,
        correlation_field: &str,
        keys: &[Value],
    ) -> Result<Vec<(Value, String)>> {
        self.record(resource, key, keys.len());
        let wanted: HashSet<String> = keys.iter().filter_map(value_token).collect();

        Ok(self
            .rows(resource)
            .iter()
            .filter_map(|row| {
                let id = row.get(key)?;
                if !value_token(id).is_some_and(|token| wanted.contains(&token)) {
                    return None;
                }
                let cid = row.get(correlation_field).and_then(Value::as_str)?;
                Some((id.clone(), cid.to_string()))
            })
            .collect())
    }
}
