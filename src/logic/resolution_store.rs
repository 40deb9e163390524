use crate::model::{value_token, TypeName};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Slot<T> {
    /// Value as it appeared in the records, handed back to the entity store
    probe: Value,
    resolved: Option<T>,
}

/// `(type, value) -> resolved | unresolved`, filled in two passes: ingest
/// registers every value found in the records, fetch fills what the entity
/// store knows. Lives for a single resolve call.
#[derive(Debug, Clone)]
pub struct ResolutionStore<T> {
    entries: BTreeMap<TypeName, BTreeMap<String, Slot<T>>>,
}

impl<T> Default for ResolutionStore<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> ResolutionStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value as pending. Values without a scalar form are ignored.
    pub fn register(&mut self, resource: &str, probe: &Value) -> bool {
        let Some(token) = value_token(probe) else {
            return false;
        };
        log::trace!("pending {} `{}`", resource, token);
        self.entries
            .entry(resource.to_string())
            .or_default()
            .entry(token)
            .or_insert_with(|| Slot {
                probe: probe.clone(),
                resolved: None,
            });
        true
    }

    /// Fill a registered value. Returns false for values nobody asked for.
    pub fn fill(&mut self, resource: &str, probe: &Value, resolved: T) -> bool {
        let slot = value_token(probe).and_then(|token| {
            self.entries
                .get_mut(resource)
                .and_then(|slots| slots.get_mut(&token))
        });
        match slot {
            Some(slot) => {
                slot.resolved = Some(resolved);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, resource: &str, probe: &Value) -> Option<&T> {
        let token = value_token(probe)?;
        self.entries.get(resource)?.get(&token)?.resolved.as_ref()
    }

    /// Unresolved values grouped per type, types in name order
    pub fn pending(&self) -> Vec<(TypeName, Vec<Value>)> {
        self.entries
            .iter()
            .filter_map(|(resource, slots)| {
                let probes: Vec<Value> = slots
                    .values()
                    .filter(|slot| slot.resolved.is_none())
                    .map(|slot| slot.probe.clone())
                    .collect();
                (!probes.is_empty()).then(|| (resource.clone(), probes))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_two_pass_fill() {
        let mut store = ResolutionStore::new();
        assert!(store.register("Tag", &json!("T1")));
        assert!(store.register("Tag", &json!("T2")));
        assert!(store.register("Tag", &json!("T1")));
        assert!(store.register("Gallery", &json!("G1")));
        assert!(!store.register("Gallery", &json!({"nested": true})));

        assert_eq!(
            store.pending(),
            vec![
                ("Gallery".to_string(), vec![json!("G1")]),
                ("Tag".to_string(), vec![json!("T1"), json!("T2")]),
            ]
        );

        assert!(store.fill("Tag", &json!("T1"), json!(1)));
        assert!(!store.fill("Tag", &json!("T9"), json!(9)));

        assert_eq!(store.get("Tag", &json!("T1")), Some(&json!(1)));
        assert_eq!(store.get("Tag", &json!("T2")), None);
        assert_eq!(store.pending()[1], ("Tag".to_string(), vec![json!("T2")]));
    }

    #[test]
    fn test_numeric_and_string_probes_share_a_slot() {
        let mut store: ResolutionStore<String> = ResolutionStore::new();
        store.register("Gallery", &json!(1));
        store.fill("Gallery", &json!("1"), "G1".to_string());
        assert_eq!(store.get("Gallery", &json!(1)).map(String::as_str), Some("G1"));
        assert!(store.pending().is_empty());
    }
}
