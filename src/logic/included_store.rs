use crate::model::{value_token, ResourceObject};
use std::collections::{HashMap, HashSet};

/// Included resources in insertion order, indexed by `(type, id)`.
///
/// The first object stored under a given identity wins; later inserts of the
/// same identity are ignored. Objects without an id cannot be referenced and
/// are never stored.
///
/// An identity can be reserved while its object is still being built, so that
/// references back to it from its own children do not store a partial copy.
#[derive(Debug, Clone, Default)]
pub struct IncludedStore {
    items: Vec<ResourceObject>,
    index: HashMap<(String, String), usize>,
    reserved: HashSet<(String, String)>,
}

impl IncludedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_objects(objects: Vec<ResourceObject>) -> Self {
        let mut store = Self::new();
        for object in objects {
            store.insert(object);
        }
        store
    }

    fn identity(object: &ResourceObject) -> Option<(String, String)> {
        let id = object.id.as_ref().and_then(value_token)?;
        Some((object.kind.clone(), id))
    }

    /// Returns whether the object was stored
    pub fn insert(&mut self, object: ResourceObject) -> bool {
        let Some(identity) = Self::identity(&object) else {
            return false;
        };
        if self.index.contains_key(&identity) {
            return false;
        }
        self.reserved.remove(&identity);
        self.index.insert(identity, self.items.len());
        self.items.push(object);
        true
    }

    /// Claim `(kind, id)` ahead of its insert. Returns false when the identity
    /// is already stored or claimed.
    pub fn reserve(&mut self, kind: &str, id: &serde_json::Value) -> bool {
        let Some(token) = value_token(id) else {
            return true;
        };
        let identity = (kind.to_string(), token);
        if self.index.contains_key(&identity) {
            return false;
        }
        self.reserved.insert(identity)
    }

    pub fn get(&self, kind: &str, id: &serde_json::Value) -> Option<&ResourceObject> {
        let token = value_token(id)?;
        let position = self.index.get(&(kind.to_string(), token))?;
        self.items.get(*position)
    }

    pub fn contains(&self, kind: &str, id: &serde_json::Value) -> bool {
        self.get(kind, id).is_some()
    }

    /// Stored object behind a reference, or the item itself when it carries
    /// its own body (inline, non-persisted resources)
    pub fn lookup<'s>(&'s self, item: &'s ResourceObject) -> Option<&'s ResourceObject> {
        match &item.id {
            Some(id) if !item.has_body() => self.get(&item.kind, id),
            _ => Some(item),
        }
    }

    pub fn items(&self) -> &[ResourceObject] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
        self.reserved.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: serde_json::Value) -> ResourceObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_first_insert_wins() {
        let mut store = IncludedStore::new();
        assert!(store.insert(object(json!({"type": "Tag", "id": 1, "attributes": {"name": "High Tech"}}))));
        assert!(!store.insert(object(json!({"type": "Tag", "id": "1", "attributes": {"name": "Other"}}))));
        assert!(store.insert(object(json!({"type": "Gallery", "id": 1}))));
        assert!(!store.insert(object(json!({"type": "Tag", "attributes": {"name": "No id"}}))));

        assert_eq!(store.len(), 2);
        let tag = store.get("Tag", &json!(1)).unwrap();
        assert_eq!(tag.attributes.as_ref().unwrap()["name"], json!("High Tech"));
        assert!(store.contains("Gallery", &json!("1")));
        assert!(!store.contains("Image", &json!(1)));

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_reserved_identity_is_filled_once() {
        let mut store = IncludedStore::new();
        assert!(store.reserve("Gallery", &json!(1)));
        assert!(!store.reserve("Gallery", &json!("1")));
        assert!(!store.contains("Gallery", &json!(1)));

        assert!(store.insert(object(json!({"type": "Gallery", "id": 1, "attributes": {"name": "Foo"}}))));
        assert!(!store.reserve("Gallery", &json!(1)));
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.reserve("Gallery", &json!(1)));
    }

    #[test]
    fn test_lookup_follows_references_only() {
        let store = IncludedStore::from_objects(vec![object(
            json!({"type": "people", "id": "9", "attributes": {"firstName": "Dan"}}),
        )]);

        let reference = object(json!({"type": "people", "id": "9"}));
        assert!(store.lookup(&reference).unwrap().has_body());

        let missing = object(json!({"type": "people", "id": "2"}));
        assert!(store.lookup(&missing).is_none());

        let inline = object(json!({"type": "Tag", "attributes": {"name": "Science"}}));
        assert_eq!(store.lookup(&inline), Some(&inline));
    }
}
