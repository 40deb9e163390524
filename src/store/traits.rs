use crate::model::{RelationDescriptor, ResourceDef, Schema, SchemaError};
use anyhow::Result;
use serde_json::Value;

/// Relationship and column metadata per resource type
pub trait SchemaProvider {
    fn resource_def(&self, resource: &str) -> Option<&ResourceDef>;

    fn definition(&self, resource: &str) -> Result<&ResourceDef, SchemaError> {
        self.resource_def(resource)
            .ok_or_else(|| SchemaError::UnknownResource(resource.to_string()))
    }

    fn relations_of(&self, resource: &str) -> Result<&[RelationDescriptor], SchemaError> {
        Ok(&self.definition(resource)?.relations)
    }

    fn key_field_of(&self, resource: &str) -> Result<&str, SchemaError> {
        Ok(&self.definition(resource)?.key)
    }

    fn correlation_field_of(&self, resource: &str) -> Result<Option<&str>, SchemaError> {
        Ok(self.definition(resource)?.correlation_field.as_deref())
    }

    fn has_field(&self, resource: &str, name: &str) -> bool {
        self.resource_def(resource)
            .map(|def| def.has_field(name))
            .unwrap_or(false)
    }

    /// Storage source name, used to derive the wire type
    fn source_of(&self, resource: &str) -> Result<&str, SchemaError> {
        Ok(&self.definition(resource)?.source)
    }
}

impl SchemaProvider for Schema {
    fn resource_def(&self, resource: &str) -> Option<&ResourceDef> {
        self.get_resource(resource)
    }
}

/// Batched lookups against persisted rows. Each call must cover the whole set
/// of values it is given; the resolvers never call it once per record.
pub trait EntityStore {
    /// Rows of `resource` whose `correlation_field` is one of `values`, as
    /// `(correlation value, primary key)` pairs
    fn find_by_correlation(
        &self,
        resource: &str,
        key: &str,
        correlation_field: &str,
        values: &[String],
    ) -> Result<Vec<(String, Value)>>;

    /// Rows of `resource` whose primary key `key` is one of `keys`, as
    /// `(primary key, correlation value)` pairs
    fn find_by_key(
        &self,
        resource: &str,
        key: &str,
        correlation_field: &str,
        keys: &[Value],
    ) -> Result<Vec<(Value, String)>>;
}
