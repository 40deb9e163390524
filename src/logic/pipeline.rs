use crate::config::AppConfig;
use crate::logic::{CidResolver, Payload, Resolution};
use crate::store::{EntityStore, SchemaProvider};
use anyhow::{Context, Result};

/// Request data flow: decode the body, export nested records, then resolve
/// their correlation values against `store`.
pub fn inbound<S, E>(
    body: &[u8],
    root: &str,
    schema: &S,
    store: &E,
    config: &AppConfig,
) -> Result<Resolution>
where
    S: SchemaProvider + ?Sized,
    E: EntityStore + ?Sized,
{
    let payload = Payload::from_config(config)
        .decode(body)
        .context("Failed to decode request body")?;
    let records = payload.export(None)?.into_records();
    log::debug!("resolving {} {} record(s)", records.len(), root);

    let resolution = CidResolver::new(schema, store)
        .resolve(&records, root)
        .with_context(|| format!("Failed to resolve {} records", root))?;
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::{gallery_schema, gallery_store};
    use serde_json::json;

    #[test]
    fn test_inbound_resolves_decoded_body() {
        let body = json!({
            "data": {
                "type": "Image",
                "attributes": {"title": "Amiga 1200", "gallery_cid": "G1"},
                "relationships": {
                    "images_tags": {"data": [
                        {"type": "ImageTag", "attributes": {"tag_cid": "T1"}},
                        {"type": "ImageTag", "attributes": {"tag_cid": "T9"}}
                    ]}
                }
            }
        })
        .to_string();

        let resolution = inbound(
            body.as_bytes(),
            "Image",
            &gallery_schema(),
            &gallery_store(),
            &AppConfig::default(),
        )
        .unwrap();

        assert_eq!(
            serde_json::to_value(&resolution.records).unwrap(),
            json!([{
                "title": "Amiga 1200",
                "gallery_id": 1,
                "images_tags": [{"tag_id": 1}, {"tag_id": null}]
            }])
        );
        assert_eq!(resolution.failed_indexes(), vec![0]);
        assert!(resolution.errors[0]
            .as_ref()
            .unwrap()
            .contains_key("images_tags.1.tag_cid"));
    }

    #[test]
    fn test_inbound_empty_body() {
        let resolution = inbound(
            b"  ",
            "Image",
            &gallery_schema(),
            &gallery_store(),
            &AppConfig::default(),
        )
        .unwrap();
        assert!(resolution.records.is_empty());
        assert!(resolution.is_clean());
    }

    #[test]
    fn test_inbound_reports_bad_json() {
        let err = inbound(
            b"{not json",
            "Image",
            &gallery_schema(),
            &gallery_store(),
            &AppConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("decode request body"));
    }
}
