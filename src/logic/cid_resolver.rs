use crate::logic::relations::{correlation_ref, merge_nested_errors, nested_records, put_nested};
use crate::logic::ResolutionStore;
use crate::model::{
    add_field_error, is_blank, value_token, FieldErrors, PerIndexErrors, Record, RecordGraph,
    RelationKind, ResolveError,
};
use crate::store::{EntityStore, SchemaProvider};
use serde::Serialize;
use serde_json::Value;

/// Rewritten records plus one error slot per top-level record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Resolution {
    pub records: RecordGraph,
    pub errors: PerIndexErrors,
}

impl Resolution {
    pub fn is_clean(&self) -> bool {
        self.errors.iter().all(Option::is_none)
    }

    pub fn failed_indexes(&self) -> Vec<usize> {
        self.errors
            .iter()
            .enumerate()
            .filter_map(|(index, errors)| errors.as_ref().map(|_| index))
            .collect()
    }
}

pub(crate) fn missing_message(resource: &str, value: &Value, field: &str) -> String {
    let shown = value_token(value).unwrap_or_else(|| value.to_string());
    format!(
        "no {} resource(s) found with value `{}` as `{}`.",
        resource, shown, field
    )
}

/// Replaces client correlation values (`gallery_cid: "G1"`) with the primary
/// keys they stand for (`gallery_id: 1`), batching store lookups per type.
pub struct CidResolver<'a, S: ?Sized, E: ?Sized> {
    schema: &'a S,
    store: &'a E,
}

impl<'a, S, E> CidResolver<'a, S, E>
where
    S: SchemaProvider + ?Sized,
    E: EntityStore + ?Sized,
{
    pub fn new(schema: &'a S, store: &'a E) -> Self {
        Self { schema, store }
    }

    /// Resolve every correlation value in `records`, rooted at resource type
    /// `root`. Unknown values are reported per record; only schema misuse and
    /// store failures abort.
    pub fn resolve(&self, records: &[Record], root: &str) -> Result<Resolution, ResolveError> {
        let records: Vec<&Record> = records.iter().collect();
        let mut lookup = ResolutionStore::new();

        self.ingest(&records, root, &mut lookup)?;
        self.fetch(&mut lookup)?;
        let (records, errors) = self.rewrite(&records, root, &lookup)?;

        Ok(Resolution { records, errors })
    }

    fn ingest(
        &self,
        records: &[&Record],
        resource: &str,
        lookup: &mut ResolutionStore<Value>,
    ) -> Result<(), ResolveError> {
        let def = self.schema.definition(resource)?;

        for record in records {
            if let Some(field) = def.correlation_field.as_deref() {
                let keyless = record.get(&def.key).map_or(true, is_blank);
                if let Some(cid) = record.get(field).filter(|cid| keyless && !is_blank(cid)) {
                    lookup.register(resource, cid);
                }
            }

            for relation in &def.relations {
                if relation.kind == RelationKind::BelongsTo {
                    if let Some(reference) = correlation_ref(record, relation) {
                        if self.schema.correlation_field_of(&relation.target)?.is_some() {
                            lookup.register(&relation.target, &reference.value);
                        }
                    }
                }

                let nested = nested_records(record, relation, resource)?;
                if !nested.is_empty() {
                    self.ingest(&nested, &relation.target, lookup)?;
                }
            }
        }
        Ok(())
    }

    fn fetch(&self, lookup: &mut ResolutionStore<Value>) -> Result<(), ResolveError> {
        for (resource, probes) in lookup.pending() {
            let def = self.schema.definition(&resource)?;
            let Some(field) = def.correlation_field.as_deref() else {
                continue;
            };

            let values: Vec<String> = probes.iter().filter_map(value_token).collect();
            let rows = self
                .store
                .find_by_correlation(&resource, &def.key, field, &values)
                .map_err(|source| ResolveError::Store {
                    resource: resource.clone(),
                    source,
                })?;

            let mut hits = 0;
            for (cid, id) in rows {
                if id.is_null() {
                    continue;
                }
                if lookup.fill(&resource, &Value::String(cid.clone()), id) {
                    hits += 1;
                } else {
                    log::warn!("ignoring unrequested {} row with {} `{}`", resource, field, cid);
                }
            }
            log::debug!(
                "resolved {}/{} {} value(s) by `{}`",
                hits,
                values.len(),
                resource,
                field
            );
        }
        Ok(())
    }

    fn rewrite(
        &self,
        records: &[&Record],
        resource: &str,
        lookup: &ResolutionStore<Value>,
    ) -> Result<(RecordGraph, PerIndexErrors), ResolveError> {
        let def = self.schema.definition(resource)?;
        let mut rewritten = Vec::with_capacity(records.len());
        let mut errors = Vec::with_capacity(records.len());

        for record in records {
            let mut data = (*record).clone();
            let mut failures = FieldErrors::new();

            // A new record that names itself by cid; unknown cids are fine here
            if let Some(field) = def.correlation_field.as_deref() {
                if data.get(&def.key).map_or(true, is_blank) {
                    let id = data.get(field).and_then(|cid| lookup.get(resource, cid)).cloned();
                    if let Some(id) = id {
                        data.insert(def.key.clone(), id);
                    }
                }
            }

            for relation in &def.relations {
                if relation.kind == RelationKind::BelongsTo {
                    if let Some(reference) = correlation_ref(record, relation) {
                        if let Some(target_field) =
                            self.schema.correlation_field_of(&relation.target)?
                        {
                            let id = lookup.get(&relation.target, &reference.value).cloned();
                            if id.is_none() {
                                add_field_error(
                                    &mut failures,
                                    reference.cid_field.clone(),
                                    missing_message(&relation.target, &reference.value, target_field),
                                );
                            }
                            data.insert(reference.id_field, id.unwrap_or(Value::Null));
                            if !def.has_field(&reference.cid_field) {
                                data.remove(&reference.cid_field);
                            }
                        }
                    }
                }

                let nested = nested_records(record, relation, resource)?;
                if nested.is_empty() {
                    continue;
                }
                let (children, child_errors) = self.rewrite(&nested, &relation.target, lookup)?;
                put_nested(&mut data, relation, children);
                merge_nested_errors(&mut failures, relation, child_errors);
            }

            rewritten.push(data);
            errors.push((!failures.is_empty()).then_some(failures));
        }
        Ok((rewritten, errors))
    }
}
