use crate::model::{is_blank, FieldErrors, PerIndexErrors, Record, RelationDescriptor, ResolveError};
use serde_json::Value;

/// A belongs-to reference made through a correlation value, e.g.
/// `gallery_cid: "G1"` standing in for `gallery_id`
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationRef {
    pub cid_field: String,
    pub id_field: String,
    pub value: Value,
}

/// `<relation>Cid` wins over `<relation>_cid`; blank values do not count.
pub fn correlation_ref(record: &Record, relation: &RelationDescriptor) -> Option<CorrelationRef> {
    let candidates = [
        (format!("{}Cid", relation.name), format!("{}Id", relation.name)),
        (format!("{}_cid", relation.name), format!("{}_id", relation.name)),
    ];
    candidates.into_iter().find_map(|(cid_field, id_field)| {
        let value = record.get(&cid_field).filter(|v| !is_blank(v))?.clone();
        Some(CorrelationRef {
            cid_field,
            id_field,
            value,
        })
    })
}

/// Field that carries the correlation value in place of a foreign key,
/// whatever the key's own style: always `<relation>Cid`.
pub fn correlation_field_for(relation: &RelationDescriptor) -> String {
    format!("{}Cid", relation.name)
}

/// Records nested under a relation. A to-one value is treated as a
/// one-element sequence; a blank value yields nothing.
pub fn nested_records<'r>(
    record: &'r Record,
    relation: &RelationDescriptor,
    resource: &str,
) -> Result<Vec<&'r Record>, ResolveError> {
    let Some(value) = record.get(&relation.name).filter(|v| !is_blank(v)) else {
        return Ok(Vec::new());
    };
    let unsupported = |expected| ResolveError::UnsupportedShape {
        resource: resource.to_string(),
        relation: relation.name.clone(),
        expected,
    };
    if relation.kind.is_many() {
        let items = value.as_array().ok_or_else(|| unsupported("an array of records"))?;
        items
            .iter()
            .map(|item| item.as_object().ok_or_else(|| unsupported("an array of records")))
            .collect()
    } else {
        let item = value.as_object().ok_or_else(|| unsupported("a record"))?;
        Ok(vec![item])
    }
}

/// Write rewritten nested records back under their relation
pub fn put_nested(record: &mut Record, relation: &RelationDescriptor, mut nested: Vec<Record>) {
    let value = if relation.kind.is_many() {
        Value::Array(nested.into_iter().map(Value::Object).collect())
    } else if nested.is_empty() {
        return;
    } else {
        Value::Object(nested.swap_remove(0))
    };
    record.insert(relation.name.clone(), value);
}

/// Fold nested per-record errors into the parent's map, keyed by path
/// (`images_tags.1.tag_cid`, `gallery.name`)
pub fn merge_nested_errors(
    parent: &mut FieldErrors,
    relation: &RelationDescriptor,
    nested: PerIndexErrors,
) {
    for (index, errors) in nested.into_iter().enumerate() {
        let Some(errors) = errors else {
            continue;
        };
        for (field, messages) in errors {
            let path = if relation.kind.is_many() {
                format!("{}.{}.{}", relation.name, index, field)
            } else {
                format!("{}.{}", relation.name, field)
            };
            parent.entry(path).or_default().extend(messages);
        }
    }
}
