//! JSON-API payload: encodes entity graphs into documents and exports parsed
//! documents back into nested records.
//!
//! Encoding walks the loaded relations of each pushed entity under an
//! [`Embed`] tree. Persisted related entities become `{type, id, exists}`
//! references with their full object stored once in `included`; entities
//! that are not persisted yet have no stable identity and are inlined under
//! the relationship instead.
//!
//! Exporting rebuilds the nested form a persistence layer expects, inlining
//! included resources at every place they are referenced.

use crate::config::{AppConfig, DuplicatePolicy, PayloadConfig};
use crate::logic::IncludedStore;
use crate::model::{
    value_token, Document, Embed, Entity, ErrorObject, FieldErrors, Linkage, PayloadError,
    PerIndexErrors, PrimaryData, Record, Related, Relationship, Resource, ResourceObject,
};
use crate::store::SchemaProvider;
use heck::ToUpperCamelCase;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// Flattens an entity's own fields into attributes
pub type Exporter = Arc<dyn Fn(&Entity) -> Record + Send + Sync>;

/// Builds the `self` link of a persisted resource from its wire type and id
pub type LinkGenerator = Arc<dyn Fn(&str, &Value) -> String + Send + Sync>;

pub type SharedSchema = Arc<dyn SchemaProvider + Send + Sync>;

const UNSUPPORTED_ITEM: &str = "The JSON-API serializer only supports entities.";

/// Result of [`Payload::export`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Exported {
    One(Record),
    Many(Vec<Record>),
}

impl Exported {
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Exported::One(record) => vec![record],
            Exported::Many(records) => records,
        }
    }
}

#[derive(Clone, Default)]
pub struct Payload {
    config: PayloadConfig,
    duplicates: DuplicatePolicy,
    schema: Option<SharedSchema>,
    exporter: Option<Exporter>,
    link: Option<LinkGenerator>,

    jsonapi: Map<String, Value>,
    meta: Map<String, Value>,
    links: Map<String, Value>,
    data: Vec<ResourceObject>,
    /// Set when a collection was pushed or a `data` array was parsed
    collection: bool,
    /// Top-level ids in push order with their position in `data`
    indexed: Vec<(Value, usize)>,
    errors: Vec<ErrorObject>,
    validation_errors: PerIndexErrors,
    included: IncludedStore,
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payload")
            .field("config", &self.config)
            .field("duplicates", &self.duplicates)
            .field("data", &self.data)
            .field("errors", &self.errors)
            .field("included", &self.included)
            .finish_non_exhaustive()
    }
}

impl Payload {
    pub fn new(config: PayloadConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.payload.clone()).with_duplicates(config.export.duplicates)
    }

    pub fn with_schema(mut self, schema: SharedSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_exporter(mut self, exporter: Exporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn with_link(mut self, link: LinkGenerator) -> Self {
        self.link = Some(link);
        self
    }

    pub fn with_duplicates(mut self, duplicates: DuplicatePolicy) -> Self {
        self.duplicates = duplicates;
        self
    }

    // ---- encoding -------------------------------------------------------

    /// Set a resource as the payload. Validation state is reset; a
    /// collection's meta replaces the payload meta.
    pub fn set(&mut self, resource: impl Into<Resource>, embed: &Embed) -> &mut Self {
        self.validation_errors.clear();
        match resource.into() {
            Resource::Collection { entities, meta } => {
                self.collection = true;
                self.meta = meta;
                for entity in &entities {
                    self.push(entity, embed);
                }
            }
            Resource::Entity(entity) => {
                self.push(&entity, embed);
            }
            Resource::Raw(value) => self.push_unsupported(&value),
        }
        self
    }

    /// Add one entity to the payload
    pub fn push(&mut self, entity: &Entity, embed: &Embed) -> &mut Self {
        let object = self.encode(entity, embed, false);
        let position = self.data.len();
        self.data.push(object);
        self.validation_errors
            .push((!entity.errors.is_empty()).then(|| entity.errors.clone()));

        if entity.exists {
            if let Some(id) = entity.id(&self.key_of(entity)).cloned() {
                self.index(id, position);
            }
        }
        self
    }

    fn push_unsupported(&mut self, value: &Value) {
        log::debug!("refusing to encode a non-entity value: {}", value);
        self.errors.push(ErrorObject::new(500, UNSUPPORTED_ITEM));
    }

    /// Set resources to delete: `data` only holds `{type, id, exists}` shells
    pub fn delete(&mut self, resource: impl Into<Resource>) -> &mut Self {
        match resource.into() {
            Resource::Collection { entities, meta } => {
                self.collection = true;
                self.meta = meta;
                for entity in &entities {
                    let shell = self.shell(entity);
                    self.data.push(shell);
                }
            }
            Resource::Entity(entity) => {
                let shell = self.shell(&entity);
                self.data.push(shell);
            }
            Resource::Raw(value) => self.push_unsupported(&value),
        }
        self
    }

    fn index(&mut self, id: Value, position: usize) {
        let token = value_token(&id);
        match self
            .indexed
            .iter_mut()
            .find(|(known, _)| value_token(known) == token)
        {
            Some(entry) => entry.1 = position,
            None => self.indexed.push((id, position)),
        }
    }

    fn key_of(&self, entity: &Entity) -> String {
        if let Some(key) = self
            .schema
            .as_ref()
            .and_then(|schema| schema.key_field_of(&entity.resource).ok())
        {
            return key.to_string();
        }
        self.config.key_for(&self.wire_type(entity)).to_string()
    }

    /// Storage source name, upper-camel-cased: `image_tag` becomes `ImageTag`
    fn wire_type(&self, entity: &Entity) -> String {
        let source = self
            .schema
            .as_ref()
            .and_then(|schema| schema.source_of(&entity.resource).ok())
            .unwrap_or(entity.resource.as_str());
        source.to_upper_camel_case()
    }

    fn export_fields(&self, entity: &Entity) -> Record {
        match &self.exporter {
            Some(exporter) => exporter(entity),
            None => entity.fields.clone(),
        }
    }

    fn self_link(&self, kind: &str, id: &Value) -> Option<String> {
        if let Some(link) = &self.link {
            return Some(link(kind, id));
        }
        let base = self.config.link_base.as_deref()?;
        let id = value_token(id)?;
        Some(format!("{}/{}/{}", base.trim_end_matches('/'), kind, id))
    }

    /// `{type, id, exists}` for an entity
    fn shell(&self, entity: &Entity) -> ResourceObject {
        ResourceObject {
            kind: self.wire_type(entity),
            id: entity.id(&self.key_of(entity)).cloned(),
            exists: Some(entity.exists),
            ..Default::default()
        }
    }

    /// Loaded relations, in schema declaration order when a schema is known
    fn loaded_relations<'e>(&self, entity: &'e Entity) -> Vec<(&'e String, &'e Related)> {
        let declared = self
            .schema
            .as_ref()
            .and_then(|schema| schema.relations_of(&entity.resource).ok());
        match declared {
            Some(relations) => relations
                .iter()
                .filter_map(|relation| entity.relations.get_key_value(&relation.name))
                .collect(),
            None => entity.relations.iter().collect(),
        }
    }

    /// Full resource object for an entity. When `related` is set and the
    /// entity is persisted, the object goes to `included` and a reference is
    /// returned in its place.
    fn encode(&mut self, entity: &Entity, embed: &Embed, related: bool) -> ResourceObject {
        let mut object = self.shell(entity);
        if related && entity.exists {
            if let Some(id) = &object.id {
                if !self.included.reserve(&object.kind, id) {
                    return object;
                }
            }
        }

        let key = self.key_of(entity);
        let mut attributes = self.export_fields(entity);
        attributes.remove(&key);

        let loaded = self.loaded_relations(entity);
        for (_, value) in &loaded {
            if let Related::Through { pivot, .. } = value {
                attributes.remove(pivot);
            }
        }

        let mut relationships = BTreeMap::new();
        for (name, value) in loaded {
            if matches!(value, Related::Through { .. }) {
                continue;
            }
            match embed.child(name) {
                Some(child_embed) => {
                    let relationship = self.encode_relationship(value, &child_embed);
                    relationships.insert(name.clone(), relationship);
                }
                None => {
                    if let Some(flat) = self.flatten_unsaved(value) {
                        attributes.insert(name.clone(), flat);
                    }
                }
            }
        }

        object.attributes = Some(attributes);
        if !relationships.is_empty() {
            object.relationships = Some(relationships);
        }
        if entity.exists {
            if let Some(link) = object.id.as_ref().and_then(|id| self.self_link(&object.kind, id)) {
                let mut links = Map::new();
                links.insert("self".to_string(), Value::String(link));
                object.links = Some(links);
            }
        }

        if related && entity.exists && object.id.is_some() {
            let reference = object.reference();
            self.included.insert(object);
            return reference;
        }
        object
    }

    fn encode_relationship(&mut self, value: &Related, embed: &Embed) -> Relationship {
        match value {
            Related::One(child) => Relationship::to_one(self.encode(child, embed, true)),
            Related::Many(children) | Related::Through { targets: children, .. } => {
                let items = children
                    .iter()
                    .map(|child| self.encode(child, embed, true))
                    .collect();
                Relationship::to_many(items)
            }
        }
    }

    /// Non-embedded children that are not persisted keep their data as a
    /// nested attribute; persisted ones are left out.
    fn flatten_unsaved(&self, value: &Related) -> Option<Value> {
        match value {
            Related::One(child) if !child.exists => Some(Value::Object(self.flatten(child))),
            Related::Many(children)
                if !children.is_empty() && children.iter().all(|child| !child.exists) =>
            {
                Some(Value::Array(
                    children
                        .iter()
                        .map(|child| Value::Object(self.flatten(child)))
                        .collect(),
                ))
            }
            _ => None,
        }
    }

    fn flatten(&self, entity: &Entity) -> Record {
        let mut record = self.export_fields(entity);
        for (name, value) in self.loaded_relations(entity) {
            let nested = match value {
                Related::One(child) => Value::Object(self.flatten(child)),
                Related::Many(children) => Value::Array(
                    children
                        .iter()
                        .map(|child| Value::Object(self.flatten(child)))
                        .collect(),
                ),
                Related::Through { .. } => continue,
            };
            record.insert(name.clone(), nested);
        }
        record
    }

    // ---- document state -------------------------------------------------

    pub fn is_collection(&self) -> bool {
        self.collection || self.data.len() != 1
    }

    /// Primary data: the single resource, or all of them for collections
    pub fn data(&self) -> PrimaryData {
        match self.data.as_slice() {
            [one] if !self.is_collection() => PrimaryData::One(Box::new(one.clone())),
            all => PrimaryData::Many(all.to_vec()),
        }
    }

    pub fn set_data(&mut self, data: PrimaryData) -> &mut Self {
        self.indexed.clear();
        let (collection, data) = match data {
            PrimaryData::Many(items) => (true, items),
            PrimaryData::One(item) => (false, vec![*item]),
        };
        self.collection = collection;
        self.data = data;
        let ids: Vec<(Value, usize)> = self
            .data
            .iter()
            .enumerate()
            .filter_map(|(position, item)| item.id.clone().map(|id| (id, position)))
            .collect();
        for (id, position) in ids {
            self.index(id, position);
        }
        self
    }

    /// Ids of the top-level resources, in the order they were added
    pub fn keys(&self) -> Vec<Value> {
        self.indexed.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Explicit errors, followed by one aggregated validation error when any
    /// pushed entity carried validation failures
    pub fn errors(&self) -> Vec<ErrorObject> {
        let mut errors = self.errors.clone();
        if self.validation_errors.iter().any(Option::is_some) {
            let per_index: Vec<Value> = self
                .validation_errors
                .iter()
                .map(|failures| match failures {
                    Some(failures) => field_errors_value(failures),
                    None => Value::Null,
                })
                .collect();
            errors.push(ErrorObject {
                data: Some(Value::Array(per_index)),
                ..ErrorObject::new(422, "Validation Error")
            });
        }
        errors
    }

    pub fn set_errors(&mut self, errors: Vec<ErrorObject>) -> &mut Self {
        self.errors = errors;
        self
    }

    pub fn included(&self) -> &[ResourceObject] {
        self.included.items()
    }

    pub fn set_included(&mut self, included: Vec<ResourceObject>) -> &mut Self {
        self.included = IncludedStore::from_objects(included);
        self
    }

    pub fn jsonapi(&self) -> &Map<String, Value> {
        &self.jsonapi
    }

    pub fn set_jsonapi(&mut self, jsonapi: Map<String, Value>) -> &mut Self {
        self.jsonapi = jsonapi;
        self
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    pub fn set_meta(&mut self, meta: Map<String, Value>) -> &mut Self {
        self.meta = meta;
        self
    }

    pub fn links(&self) -> &Map<String, Value> {
        &self.links
    }

    pub fn set_links(&mut self, links: Map<String, Value>) -> &mut Self {
        self.links = links;
        self
    }

    /// Clear the document; configuration and collaborators are kept
    pub fn reset(&mut self) {
        self.jsonapi.clear();
        self.meta.clear();
        self.links.clear();
        self.data.clear();
        self.collection = false;
        self.indexed.clear();
        self.errors.clear();
        self.validation_errors.clear();
        self.included.clear();
    }

    /// The wire document. Errors replace `data` and `included` entirely.
    pub fn serialize(&self) -> Document {
        let mut document = Document {
            jsonapi: self.jsonapi.clone(),
            meta: self.meta.clone(),
            links: self.links.clone(),
            ..Default::default()
        };
        let errors = self.errors();
        if errors.is_empty() {
            document.data = Some(self.data());
            document.included = self.included().to_vec();
        } else {
            document.errors = errors;
        }
        document
    }

    /// Dot-joined relation paths expanded in the document, leaves only
    /// (`["gallery", "images_tags.tag"]`)
    pub fn embedded(&self) -> Vec<String> {
        let mut paths = BTreeSet::new();
        let mut trail = Vec::new();
        for object in &self.data {
            self.collect_paths(object, "", &mut trail, &mut paths);
        }
        paths.into_iter().collect()
    }

    fn collect_paths(
        &self,
        object: &ResourceObject,
        prefix: &str,
        trail: &mut Vec<(String, String)>,
        paths: &mut BTreeSet<String>,
    ) -> bool {
        let Some(relationships) = &object.relationships else {
            return false;
        };
        for (name, relationship) in relationships {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", prefix, name)
            };
            let mut deeper = false;
            let items = relationship
                .data
                .as_ref()
                .map(Linkage::items)
                .unwrap_or_default();
            for item in items {
                let identity = identity_of(item);
                if identity.as_ref().is_some_and(|identity| trail.contains(identity)) {
                    continue;
                }
                let Some(target) = self.included.lookup(item) else {
                    continue;
                };
                if let Some(identity) = identity.clone() {
                    trail.push(identity);
                }
                deeper |= self.collect_paths(target, &path, trail, paths);
                if identity.is_some() {
                    trail.pop();
                }
            }
            if !deeper {
                paths.insert(path);
            }
        }
        !relationships.is_empty()
    }

    // ---- decoding -------------------------------------------------------

    /// Parse a JSON-API body with the default configuration. An empty body
    /// gives an empty payload.
    pub fn parse(body: &str) -> Result<Self, PayloadError> {
        Self::default().decode(body.as_bytes())
    }

    pub fn parse_slice(body: &[u8]) -> Result<Self, PayloadError> {
        Self::default().decode(body)
    }

    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        Self::default().load(value)
    }

    /// Replace this payload's document with the decoded body
    pub fn decode(self, body: &[u8]) -> Result<Self, PayloadError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return self.load(Value::Null);
        }
        let value: Value = serde_json::from_slice(body)?;
        self.load(value)
    }

    pub fn load(mut self, value: Value) -> Result<Self, PayloadError> {
        let document: Document = match value {
            Value::Null => Document::default(),
            Value::Object(_) => serde_json::from_value(value)?,
            Value::Array(_) => return Err(PayloadError::InvalidDocument("an array")),
            Value::String(_) => return Err(PayloadError::InvalidDocument("a string")),
            Value::Number(_) => return Err(PayloadError::InvalidDocument("a number")),
            Value::Bool(_) => return Err(PayloadError::InvalidDocument("a boolean")),
        };
        self.load_document(document);
        Ok(self)
    }

    pub fn load_document(&mut self, document: Document) {
        self.reset();
        self.jsonapi = document.jsonapi;
        self.meta = document.meta;
        self.links = document.links;
        self.errors = document.errors;
        if let Some(data) = document.data {
            self.set_data(data);
        }
        self.included = IncludedStore::from_objects(document.included);
    }

    /// Nested records rebuilt from the document. With an id, only the
    /// top-level resource with that id is exported.
    pub fn export(&self, id: Option<&Value>) -> Result<Exported, PayloadError> {
        let roots: Vec<&ResourceObject> = match id {
            None => self.data.iter().collect(),
            Some(id) => {
                let token = value_token(id);
                let position = self
                    .indexed
                    .iter()
                    .find(|(known, _)| token.is_some() && value_token(known) == token)
                    .map(|(_, position)| *position)
                    .ok_or_else(|| PayloadError::MissingEntry {
                        id: token.unwrap_or_else(|| id.to_string()),
                    })?;
                self.data.get(position).into_iter().collect()
            }
        };

        let mut records: Vec<Record> = roots.into_iter().map(|root| self.export_root(root)).collect();
        if id.is_some() || !self.is_collection() {
            if let Some(record) = records.pop() {
                return Ok(Exported::One(record));
            }
        }
        Ok(Exported::Many(records))
    }

    fn export_root(&self, object: &ResourceObject) -> Record {
        let mut seen = HashSet::new();
        let mut record = Record::new();
        if let Some(id) = &object.id {
            record.insert(self.config.key_for(&object.kind).to_string(), id.clone());
            if let Some(identity) = identity_of(object) {
                seen.insert(identity);
            }
        }
        merge_attributes(&mut record, object.attributes.as_ref());

        for (name, relationship) in object.relationships.iter().flatten() {
            let value = match &relationship.data {
                Some(linkage @ Linkage::Many(_)) => Value::Array(
                    self.export_items(linkage, &mut seen)
                        .into_iter()
                        .map(Value::Object)
                        .collect(),
                ),
                Some(linkage) => self
                    .export_items(linkage, &mut seen)
                    .into_iter()
                    .next()
                    .map(Value::Object)
                    .unwrap_or(Value::Null),
                None => Value::Null,
            };
            record.insert(name.clone(), value);
        }
        record
    }

    fn export_items(&self, linkage: &Linkage, seen: &mut HashSet<(String, String)>) -> Vec<Record> {
        let mut records = Vec::new();
        for item in linkage.items() {
            let identity = identity_of(item);
            let (mut record, relationships) = match (&item.id, &identity) {
                (Some(id), Some(identity)) => {
                    if !seen.insert(identity.clone()) {
                        continue;
                    }
                    let Some(stored) = self.included.get(&item.kind, id) else {
                        self.leave(seen, identity);
                        continue;
                    };
                    let mut record = Record::new();
                    record.insert(self.config.key_for(&item.kind).to_string(), id.clone());
                    merge_attributes(&mut record, stored.attributes.as_ref());
                    (record, stored.relationships.as_ref())
                }
                _ => (
                    item.attributes.clone().unwrap_or_default(),
                    item.relationships.as_ref(),
                ),
            };

            for (name, relationship) in relationships.into_iter().flatten() {
                if let Some(value) = self.export_nested(relationship, seen) {
                    record.insert(name.clone(), value);
                }
            }
            if let Some(identity) = &identity {
                self.leave(seen, identity);
            }
            records.push(record);
        }
        records
    }

    /// Nested relationships only appear when they produced something
    fn export_nested(&self, relationship: &Relationship, seen: &mut HashSet<(String, String)>) -> Option<Value> {
        let linkage = relationship.data.as_ref()?;
        let mut records = self.export_items(linkage, seen);
        if linkage.is_many() {
            (!records.is_empty()).then(|| Value::Array(records.into_iter().map(Value::Object).collect()))
        } else if records.is_empty() {
            None
        } else {
            Some(Value::Object(records.swap_remove(0)))
        }
    }

    fn leave(&self, seen: &mut HashSet<(String, String)>, identity: &(String, String)) {
        if self.duplicates == DuplicatePolicy::AncestorsOnly {
            seen.remove(identity);
        }
    }
}

fn identity_of(object: &ResourceObject) -> Option<(String, String)> {
    let id = object.id.as_ref().and_then(value_token)?;
    Some((object.kind.clone(), id))
}

/// Attributes never override the identity field already in `record`
fn merge_attributes(record: &mut Record, attributes: Option<&Record>) {
    for (name, value) in attributes.into_iter().flatten() {
        record.entry(name.clone()).or_insert_with(|| value.clone());
    }
}

fn field_errors_value(errors: &FieldErrors) -> Value {
    Value::Object(
        errors
            .iter()
            .map(|(field, messages)| {
                (
                    field.clone(),
                    Value::Array(messages.iter().cloned().map(Value::String).collect()),
                )
            })
            .collect(),
    )
}
