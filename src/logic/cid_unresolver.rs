use crate::logic::cid_resolver::{missing_message, Resolution};
use crate::logic::relations::{correlation_field_for, merge_nested_errors, nested_records, put_nested};
use crate::logic::ResolutionStore;
use crate::model::{
    add_field_error, is_blank, FieldErrors, PerIndexErrors, Record, RecordGraph,
    RelationDescriptor, RelationKind, ResolveError,
};
use crate::store::{EntityStore, SchemaProvider};
use serde_json::Value;

/// The mirror of `CidResolver`: swaps foreign keys for the correlation values
/// of the rows they point at and strips server identities, for clients that
/// only know cids.
pub struct CidUnresolver<'a, S: ?Sized, E: ?Sized> {
    schema: &'a S,
    store: &'a E,
}

impl<'a, S, E> CidUnresolver<'a, S, E>
where
    S: SchemaProvider + ?Sized,
    E: EntityStore + ?Sized,
{
    pub fn new(schema: &'a S, store: &'a E) -> Self {
        Self { schema, store }
    }

    pub fn unresolve(&self, records: &[Record], root: &str) -> Result<Resolution, ResolveError> {
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
        lookup: &mut ResolutionStore<String>,
    ) -> Result<(), ResolveError> {
        let def = self.schema.definition(resource)?;

        for record in records {
            for relation in &def.relations {
                if relation.kind == RelationKind::BelongsTo {
                    if let Some(foreign_key) = relation.foreign_key.as_deref() {
                        let id = record.get(foreign_key).filter(|id| !is_blank(id));
                        if let Some(id) = id {
                            if self.schema.correlation_field_of(&relation.target)?.is_some() {
                                lookup.register(&relation.target, id);
                            }
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

    fn fetch(&self, lookup: &mut ResolutionStore<String>) -> Result<(), ResolveError> {
        for (resource, keys) in lookup.pending() {
            let def = self.schema.definition(&resource)?;
            let Some(field) = def.correlation_field.as_deref() else {
                continue;
            };

            let rows = self
                .store
                .find_by_key(&resource, &def.key, field, &keys)
                .map_err(|source| ResolveError::Store {
                    resource: resource.clone(),
                    source,
                })?;

            let mut hits = 0;
            for (id, cid) in rows {
                if lookup.fill(&resource, &id, cid) {
                    hits += 1;
                } else {
                    log::warn!("ignoring unrequested {} row with {} `{}`", resource, def.key, id);
                }
            }
            log::debug!(
                "unresolved {}/{} {} key(s) to `{}`",
                hits,
                keys.len(),
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
        lookup: &ResolutionStore<String>,
    ) -> Result<(RecordGraph, PerIndexErrors), ResolveError> {
        let def = self.schema.definition(resource)?;
        let mut rewritten = Vec::with_capacity(records.len());
        let mut errors = Vec::with_capacity(records.len());

        for record in records {
            let mut data = (*record).clone();
            let mut failures = FieldErrors::new();

            if def.correlation_field.is_some() {
                data.remove(&def.key);
            }

            for relation in &def.relations {
                if relation.kind == RelationKind::BelongsTo {
                    if let Some(foreign_key) = relation.foreign_key.as_deref() {
                        self.swap_foreign_key(&mut data, &mut failures, relation, foreign_key, lookup)?;
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

    fn swap_foreign_key(
        &self,
        data: &mut Record,
        failures: &mut FieldErrors,
        relation: &RelationDescriptor,
        foreign_key: &str,
        lookup: &ResolutionStore<String>,
    ) -> Result<(), ResolveError> {
        if self.schema.correlation_field_of(&relation.target)?.is_none() {
            return Ok(());
        }
        let target_key = self.schema.key_field_of(&relation.target)?;
        let Some(id) = data.remove(foreign_key) else {
            return Ok(());
        };

        let cid = lookup.get(&relation.target, &id).cloned();
        if cid.is_none() && !is_blank(&id) {
            add_field_error(
                failures,
                foreign_key,
                missing_message(&relation.target, &id, target_key),
            );
        }
        data.insert(
            correlation_field_for(relation),
            cid.map(Value::String).unwrap_or(Value::Null),
        );
        Ok(())
    }
}
