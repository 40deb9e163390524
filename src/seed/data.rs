use crate::model::{value_token, Entity, RelationDescriptor, ResourceDef, Schema};
use crate::store::MemoryStore;
use serde_json::{json, Value};

/// Gallery / image / tag schema used by the demo binary and the test suites
pub fn gallery_schema() -> Schema {
    Schema::new(vec![
        ResourceDef::new("Gallery", "gallery")
            .with_correlation("cid")
            .with_field("name")
            .with_relation(RelationDescriptor::has_one("detail", "GalleryDetail", "gallery_id"))
            .with_relation(RelationDescriptor::has_many("images", "Image", "gallery_id")),
        ResourceDef::new("GalleryDetail", "gallery_detail")
            .with_field("description")
            .with_field("gallery_id")
            .with_relation(RelationDescriptor::belongs_to("gallery", "Gallery", "gallery_id")),
        ResourceDef::new("Image", "image")
            .with_correlation("cid")
            .with_field("gallery_id")
            .with_field("name")
            .with_field("title")
            .with_relation(RelationDescriptor::belongs_to("gallery", "Gallery", "gallery_id"))
            .with_relation(RelationDescriptor::has_many("images_tags", "ImageTag", "image_id"))
            .with_relation(RelationDescriptor::has_many_through("tags", "Tag", "images_tags", "tag")),
        ResourceDef::new("ImageTag", "image_tag")
            .with_field("image_id")
            .with_field("tag_id")
            .with_relation(RelationDescriptor::belongs_to("image", "Image", "image_id"))
            .with_relation(RelationDescriptor::belongs_to("tag", "Tag", "tag_id")),
        ResourceDef::new("Tag", "tag")
            .with_correlation("cid")
            .with_field("name")
            .with_relation(RelationDescriptor::has_many("images_tags", "ImageTag", "tag_id"))
            .with_relation(RelationDescriptor::has_many_through("images", "Image", "images_tags", "image")),
    ])
}

/// Persisted rows matching `gallery_schema()`
pub fn gallery_store() -> MemoryStore {
    MemoryStore::new()
        .with_rows(
            "Gallery",
            vec![
                json!({"id": 1, "cid": "G1", "name": "Foo Gallery"}),
                json!({"id": 2, "cid": "G2", "name": "Bar Gallery"}),
            ],
        )
        .with_rows(
            "GalleryDetail",
            vec![
                json!({"id": 1, "description": "Foo Gallery Description", "gallery_id": 1}),
                json!({"id": 2, "description": "Bar Gallery Description", "gallery_id": 2}),
            ],
        )
        .with_rows(
            "Image",
            vec![
                json!({"id": 1, "cid": "I1", "gallery_id": 1, "name": "amiga_1200.jpg", "title": "Amiga 1200"}),
                json!({"id": 2, "cid": "I2", "gallery_id": 1, "name": "srinivasa_ramanujan.jpg", "title": "Srinivasa Ramanujan"}),
                json!({"id": 3, "cid": "I3", "gallery_id": 1, "name": "las_vegas.jpg", "title": "Las Vegas"}),
                json!({"id": 4, "cid": "I4", "gallery_id": 2, "name": "silicon_valley.jpg", "title": "Silicon Valley"}),
                json!({"id": 5, "cid": "I5", "gallery_id": 2, "name": "unknown.gif", "title": "Unknown"}),
            ],
        )
        .with_rows(
            "ImageTag",
            vec![
                json!({"id": 1, "image_id": 1, "tag_id": 1}),
                json!({"id": 2, "image_id": 1, "tag_id": 3}),
                json!({"id": 3, "image_id": 2, "tag_id": 5}),
                json!({"id": 4, "image_id": 3, "tag_id": 6}),
                json!({"id": 5, "image_id": 4, "tag_id": 6}),
                json!({"id": 6, "image_id": 4, "tag_id": 3}),
                json!({"id": 7, "image_id": 4, "tag_id": 1}),
            ],
        )
        .with_rows(
            "Tag",
            vec![
                json!({"id": 1, "cid": "T1", "name": "High Tech"}),
                json!({"id": 2, "cid": "T2", "name": "Sport"}),
                json!({"id": 3, "cid": "T3", "name": "Computer"}),
                json!({"id": 4, "cid": "T4", "name": "Art"}),
                json!({"id": 5, "cid": "T5", "name": "Science"}),
                json!({"id": 6, "cid": "T6", "name": "City"}),
            ],
        )
}

fn find_row(store: &MemoryStore, resource: &str, id: &Value) -> Option<Entity> {
    let token = value_token(id)?;
    store
        .rows(resource)
        .iter()
        .find(|row| row.get("id").and_then(value_token).as_deref() == Some(token.as_str()))
        .map(|row| Entity::persisted(resource, Value::Object(row.clone())))
}

/// Load an image with its gallery, its image/tag pivots and its tags, the way
/// an ORM would after eager-loading `gallery` and `tags`
pub fn load_image(store: &MemoryStore, id: i64) -> Option<Entity> {
    let image = find_row(store, "Image", &json!(id))?;
    let gallery = image
        .get("gallery_id")
        .and_then(|gallery_id| find_row(store, "Gallery", gallery_id));

    let mut pivots = Vec::new();
    let mut tags = Vec::new();
    for row in store.rows("ImageTag") {
        if row.get("image_id").and_then(value_token) != Some(id.to_string()) {
            continue;
        }
        let mut pivot = Entity::persisted("ImageTag", Value::Object(row.clone()));
        if let Some(tag) = row.get("tag_id").and_then(|tag_id| find_row(store, "Tag", tag_id)) {
            pivot = pivot.with_one("tag", tag.clone());
            tags.push(tag);
        }
        pivots.push(pivot);
    }

    let mut image = image.with_many("images_tags", pivots);
    if let Some(gallery) = gallery {
        image = image.with_one("gallery", gallery);
    }
    image.relations.insert(
        "tags".to_string(),
        crate::model::Related::Through {
            pivot: "images_tags".to_string(),
            targets: tags,
        },
    );
    Some(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Related;
    use crate::store::SchemaProvider;

    #[test]
    fn test_schema_provider_lookups() {
        let schema = gallery_schema();
        assert_eq!(schema.key_field_of("Image").unwrap(), "id");
        assert_eq!(schema.correlation_field_of("Image").unwrap(), Some("cid"));
        assert_eq!(schema.correlation_field_of("ImageTag").unwrap(), None);
        assert_eq!(schema.source_of("ImageTag").unwrap(), "image_tag");
        assert_eq!(schema.relations_of("Image").unwrap().len(), 3);
        assert!(schema.has_field("Image", "gallery_id"));
        assert!(!schema.has_field("Image", "gallery_cid"));
        assert!(!schema.has_field("Nope", "id"));
        assert!(schema.definition("Nope").is_err());
    }

    #[test]
    fn test_load_image() {
        let store = gallery_store();
        let image = load_image(&store, 1).unwrap();
        assert!(image.exists);
        assert_eq!(image.get("title"), Some(&json!("Amiga 1200")));

        let Some(Related::Many(pivots)) = image.relations.get("images_tags") else {
            panic!("images_tags not loaded");
        };
        assert_eq!(pivots.len(), 2);
        let Some(Related::Through { targets, .. }) = image.relations.get("tags") else {
            panic!("tags not loaded");
        };
        let names: Vec<_> = targets.iter().filter_map(|t| t.get("name")).collect();
        assert_eq!(names, vec![&json!("High Tech"), &json!("Computer")]);

        assert!(load_image(&store, 42).is_none());
    }
}
