use serde::{Deserialize, Serialize};

/// Name of a resource type as the schema knows it (e.g. "Gallery", "ImageTag")
pub type TypeName = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationKind {
    BelongsTo,
    HasOne,
    HasMany,
    HasManyThrough,
}

impl RelationKind {
    /// Whether the relation holds a sequence of related records
    pub fn is_many(&self) -> bool {
        matches!(self, RelationKind::HasMany | RelationKind::HasManyThrough)
    }
}

/// A relation declared on a resource type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    /// Relation name as used in records (e.g. "gallery", "images_tags")
    pub name: String,

    pub kind: RelationKind,

    /// Resource type reached by the relation. For has-many-through this is the
    /// final target, not the pivot.
    pub target: TypeName,

    /// Foreign key field. Lives on the owning record for belongs-to and on the
    /// target records for has-one/has-many.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,

    /// Pivot relation name (has-many-through only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub through: Option<String>,

    /// Relation on the pivot type that reaches the target (has-many-through only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub using: Option<String>,
}

impl RelationDescriptor {
    pub fn belongs_to(name: &str, target: &str, foreign_key: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: RelationKind::BelongsTo,
            target: target.to_string(),
            foreign_key: Some(foreign_key.to_string()),
            through: None,
            using: None,
        }
    }

    pub fn has_one(name: &str, target: &str, foreign_key: &str) -> Self {
        Self {
            kind: RelationKind::HasOne,
            ..Self::belongs_to(name, target, foreign_key)
        }
    }

    pub fn has_many(name: &str, target: &str, foreign_key: &str) -> Self {
        Self {
            kind: RelationKind::HasMany,
            ..Self::belongs_to(name, target, foreign_key)
        }
    }

    pub fn has_many_through(name: &str, target: &str, through: &str, using: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: RelationKind::HasManyThrough,
            target: target.to_string(),
            foreign_key: None,
            through: Some(through.to_string()),
            using: Some(using.to_string()),
        }
    }
}

/// Definition of one resource type: its columns, identity and relations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    /// Type handle (e.g. "ImageTag")
    pub name: TypeName,

    /// Storage source name (e.g. "image_tag"); the wire type is derived from it
    pub source: String,

    /// Primary key field
    #[serde(default = "default_key")]
    pub key: String,

    /// Correlation field, usually "cid". Types without one never take part in
    /// correlation resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_field: Option<String>,

    /// First-class columns, key and correlation field included
    #[serde(default)]
    pub fields: Vec<String>,

    #[serde(default)]
    pub relations: Vec<RelationDescriptor>,
}

fn default_key() -> String {
    "id".to_string()
}

impl ResourceDef {
    pub fn new(name: &str, source: &str) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            key: default_key(),
            correlation_field: None,
            fields: vec![default_key()],
            relations: Vec::new(),
        }
    }

    pub fn with_correlation(mut self, field: &str) -> Self {
        self.correlation_field = Some(field.to_string());
        self.with_field(field)
    }

    pub fn with_field(mut self, field: &str) -> Self {
        if !self.fields.iter().any(|f| f == field) {
            self.fields.push(field.to_string());
        }
        self
    }

    pub fn with_relation(mut self, relation: RelationDescriptor) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub resources: Vec<ResourceDef>,
}

impl Schema {
    pub fn new(resources: Vec<ResourceDef>) -> Self {
        Self { resources }
    }

    /// Find a resource definition by type name
    pub fn get_resource(&self, name: &str) -> Option<&ResourceDef> {
        self.resources.iter().find(|r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_deserializes_from_json() {
        let json = r#"{
            "resources": [{
                "name": "Image",
                "source": "image",
                "correlation_field": "cid",
                "fields": ["id", "cid", "gallery_id", "title"],
                "relations": [
                    {"name": "gallery", "kind": "belongsTo", "target": "Gallery", "foreign_key": "gallery_id"},
                    {"name": "tags", "kind": "hasManyThrough", "target": "Tag", "through": "images_tags", "using": "tag"}
                ]
            }]
        }"#;

        let schema: Schema = serde_json::from_str(json).unwrap();

        let image = schema.get_resource("Image").unwrap();
        assert_eq!(image.key, "id");
        assert_eq!(image.correlation_field.as_deref(), Some("cid"));
        assert_eq!(image.relations[0].kind, RelationKind::BelongsTo);
        assert_eq!(image.relations[1].kind, RelationKind::HasManyThrough);
        assert!(image.relations[1].kind.is_many());
        assert_eq!(image.relation("tags").unwrap().using.as_deref(), Some("tag"));
    }

    #[test]
    fn test_builders_keep_fields_unique() {
        let def = ResourceDef::new("Tag", "tag")
            .with_correlation("cid")
            .with_field("cid")
            .with_field("name");
        assert_eq!(def.fields, vec!["id", "cid", "name"]);
        assert!(def.has_field("name"));
        assert!(!def.has_field("tag_id"));
    }
}
