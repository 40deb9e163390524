use crate::model::RelationKind;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("unknown resource type `{0}`")]
    UnknownResource(String),

    #[error("resource `{resource}` has no relation named `{relation}`")]
    UnknownRelation { resource: String, relation: String },

    #[error("relation `{resource}.{relation}` is a {actual:?} relation, expected {expected:?}")]
    UnexpectedKind {
        resource: String,
        relation: String,
        expected: RelationKind,
        actual: RelationKind,
    },

    #[error("relation `{resource}.{relation}` is missing its `{attribute}` setting")]
    IncompleteRelation {
        resource: String,
        relation: String,
        attribute: &'static str,
    },
}

/// Structural failures of the correlation resolvers. Unresolvable values are
/// not errors at this level, they are reported per record.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("unsupported value for relation `{resource}.{relation}`: expected {expected}")]
    UnsupportedShape {
        resource: String,
        relation: String,
        expected: &'static str,
    },

    #[error("entity store lookup failed for `{resource}`: {source}")]
    Store {
        resource: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("invalid JSON-API payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid JSON-API document: expected an object, got {0}")]
    InvalidDocument(&'static str),

    #[error("unexisting data entry for id `{id}` in the JSON-API payload")]
    MissingEntry { id: String },
}
