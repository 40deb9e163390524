use crate::model::{FieldErrors, Record, RelationKind, SchemaError, TypeName};
use crate::store::SchemaProvider;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// An in-memory domain entity handed to the encoder
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub resource: TypeName,

    /// Own scalar fields, identity included
    pub fields: Record,

    /// Whether the entity is persisted
    pub exists: bool,

    /// Loaded relations only; an absent name means "not loaded"
    pub relations: BTreeMap<String, Related>,

    /// Validation failures attached by the domain layer
    pub errors: FieldErrors,
}

/// A loaded relation value
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Box<Entity>),
    Many(Vec<Entity>),
    /// Targets of a has-many-through relation; the pivot relation holds the
    /// intermediate entities.
    Through { pivot: String, targets: Vec<Entity> },
}

/// Anything that can be set as a payload
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Entity(Box<Entity>),
    Collection { entities: Vec<Entity>, meta: Map<String, Value> },
    /// Not an entity at all; encoding it yields an error entry
    Raw(Value),
}

impl From<Entity> for Resource {
    fn from(entity: Entity) -> Self {
        Resource::Entity(Box::new(entity))
    }
}

impl From<Vec<Entity>> for Resource {
    fn from(entities: Vec<Entity>) -> Self {
        Resource::Collection {
            entities,
            meta: Map::new(),
        }
    }
}

impl From<Value> for Resource {
    fn from(value: Value) -> Self {
        Resource::Raw(value)
    }
}

fn into_record(fields: Value) -> Record {
    match fields {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

impl Entity {
    /// A new, not yet persisted entity
    pub fn create(resource: &str, fields: Value) -> Self {
        Self {
            resource: resource.to_string(),
            fields: into_record(fields),
            exists: false,
            relations: BTreeMap::new(),
            errors: FieldErrors::new(),
        }
    }

    /// An entity loaded from storage
    pub fn persisted(resource: &str, fields: Value) -> Self {
        Self {
            exists: true,
            ..Self::create(resource, fields)
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Identity value under `key`, if set to something other than null
    pub fn id(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    pub fn with_one(mut self, relation: &str, entity: Entity) -> Self {
        self.relations
            .insert(relation.to_string(), Related::One(Box::new(entity)));
        self
    }

    pub fn with_many(mut self, relation: &str, entities: Vec<Entity>) -> Self {
        self.relations
            .insert(relation.to_string(), Related::Many(entities));
        self
    }

    pub fn with_error(mut self, field: &str, message: &str) -> Self {
        crate::model::add_field_error(&mut self.errors, field, message);
        self
    }

    /// Append `target` to a has-many-through relation, creating the pivot
    /// entity that links both sides under the pivot relation.
    pub fn push_through<S: SchemaProvider + ?Sized>(
        &mut self,
        schema: &S,
        relation: &str,
        target: Entity,
    ) -> Result<(), SchemaError> {
        let def = schema.definition(&self.resource)?;
        let descriptor = def.relation(relation).ok_or_else(|| SchemaError::UnknownRelation {
            resource: self.resource.clone(),
            relation: relation.to_string(),
        })?;
        if descriptor.kind != RelationKind::HasManyThrough {
            return Err(SchemaError::UnexpectedKind {
                resource: self.resource.clone(),
                relation: relation.to_string(),
                expected: RelationKind::HasManyThrough,
                actual: descriptor.kind,
            });
        }
        let incomplete = |attribute| SchemaError::IncompleteRelation {
            resource: self.resource.clone(),
            relation: relation.to_string(),
            attribute,
        };
        let pivot_name = descriptor.through.clone().ok_or_else(|| incomplete("through"))?;
        let using = descriptor.using.clone().ok_or_else(|| incomplete("using"))?;

        let pivot_relation = def.relation(&pivot_name).ok_or_else(|| SchemaError::UnknownRelation {
            resource: self.resource.clone(),
            relation: pivot_name.clone(),
        })?;
        let pivot_def = schema.definition(&pivot_relation.target)?;
        let using_relation = pivot_def.relation(&using).ok_or_else(|| SchemaError::UnknownRelation {
            resource: pivot_def.name.clone(),
            relation: using.clone(),
        })?;

        let mut pivot_fields = Record::new();
        if let Some(foreign_key) = &using_relation.foreign_key {
            let target_key = schema.key_field_of(&target.resource)?;
            let id = target.id(target_key).cloned().unwrap_or(Value::Null);
            pivot_fields.insert(foreign_key.clone(), id);
        }
        let pivot = Entity::create(&pivot_def.name, Value::Object(pivot_fields))
            .with_one(&using, target.clone());

        match self.relations.get_mut(&pivot_name) {
            Some(Related::Many(pivots)) => pivots.push(pivot),
            _ => {
                self.relations.insert(pivot_name.clone(), Related::Many(vec![pivot]));
            }
        }
        match self.relations.get_mut(relation) {
            Some(Related::Through { targets, .. }) => targets.push(target),
            _ => {
                self.relations.insert(
                    relation.to_string(),
                    Related::Through {
                        pivot: pivot_name,
                        targets: vec![target],
                    },
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::gallery_schema;
    use serde_json::json;

    #[test]
    fn test_push_through_materializes_pivots() {
        let schema = gallery_schema();
        let mut image = Entity::create("Image", json!({"title": "Amiga 1200"}));
        image
            .push_through(&schema, "tags", Entity::persisted("Tag", json!({"id": 1, "name": "Computer"})))
            .unwrap();
        image
            .push_through(&schema, "tags", Entity::create("Tag", json!({"name": "Science"})))
            .unwrap();

        let Some(Related::Many(pivots)) = image.relations.get("images_tags") else {
            panic!("pivot relation missing");
        };
        assert_eq!(pivots.len(), 2);
        assert_eq!(pivots[0].resource, "ImageTag");
        assert!(!pivots[0].exists);
        assert_eq!(pivots[0].get("tag_id"), Some(&json!(1)));
        assert_eq!(pivots[1].get("tag_id"), Some(&json!(null)));
        assert!(matches!(pivots[0].relations.get("tag"), Some(Related::One(_))));

        let Some(Related::Through { pivot, targets }) = image.relations.get("tags") else {
            panic!("through relation missing");
        };
        assert_eq!(pivot, "images_tags");
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn test_push_through_rejects_other_kinds() {
        let schema = gallery_schema();
        let mut image = Entity::create("Image", json!({}));
        let err = image
            .push_through(&schema, "gallery", Entity::create("Gallery", json!({})))
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnexpectedKind { .. }));

        let err = image
            .push_through(&schema, "nope", Entity::create("Tag", json!({})))
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownRelation { .. }));
    }

    #[test]
    fn test_id_ignores_null() {
        let entity = Entity::create("Gallery", json!({"id": null, "name": "x"}));
        assert_eq!(entity.id("id"), None);
        let entity = Entity::persisted("Gallery", json!({"id": 2}));
        assert_eq!(entity.id("id"), Some(&json!(2)));
    }
}
