use pretty_assertions::assert_eq;
use resource_graph::config::{AppConfig, DuplicatePolicy};
use resource_graph::logic::Payload;
use resource_graph::model::Embed;
use resource_graph::seed::{gallery_schema, gallery_store, load_image};
use serde_json::{json, Value};
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The articles/people/comments compound document from jsonapi.org
fn collection_document() -> Value {
    json!({
        "jsonapi": {"version": "1.0"},
        "meta": {"count": 13},
        "links": {
            "self": "http://example.com/articles",
            "next": "http://example.com/articles?page[offset]=2",
            "last": "http://example.com/articles?page[offset]=10"
        },
        "data": [
            {
                "type": "articles",
                "id": "1",
                "attributes": {"title": "JSON API paints my bikeshed!"},
                "relationships": {
                    "author": {
                        "links": {
                            "self": "http://example.com/articles/1/relationships/author",
                            "related": "http://example.com/articles/1/author"
                        },
                        "data": {"type": "people", "id": "9"}
                    },
                    "comments": {
                        "links": {
                            "self": "http://example.com/articles/1/relationships/comments",
                            "related": "http://example.com/articles/1/comments"
                        },
                        "data": [
                            {"type": "comments", "id": "5"},
                            {"type": "comments", "id": "12"}
                        ]
                    }
                },
                "links": {"self": "http://example.com/articles/1"}
            },
            {
                "type": "articles",
                "id": "2",
                "attributes": {"title": "JSON API is awesome!"},
                "relationships": {
                    "author": {"data": {"type": "people", "id": "9"}},
                    "comments": {"data": []}
                },
                "links": {"self": "http://example.com/articles/2"}
            }
        ],
        "included": [
            {
                "type": "people",
                "id": "9",
                "attributes": {"firstName": "Dan", "lastName": "Gebhardt", "twitter": "dgeb"},
                "links": {"self": "http://example.com/people/9"}
            },
            {
                "type": "comments",
                "id": "5",
                "attributes": {"body": "First!"},
                "relationships": {"author": {"data": {"type": "people", "id": "2"}}},
                "links": {"self": "http://example.com/comments/5"}
            },
            {
                "type": "comments",
                "id": "12",
                "attributes": {"body": "I like XML better"},
                "relationships": {"author": {"data": {"type": "people", "id": "9"}}},
                "links": {"self": "http://example.com/comments/12"}
            }
        ]
    })
}

fn dan() -> Value {
    json!({"id": "9", "firstName": "Dan", "lastName": "Gebhardt", "twitter": "dgeb"})
}

#[test]
fn test_parsed_document_serializes_back_unchanged() {
    init_logging();
    let document = collection_document();
    let payload = Payload::parse(&document.to_string()).unwrap();
    assert_eq!(payload.serialize().to_value(), document);

    let item = json!({
        "data": {
            "type": "articles",
            "id": "1",
            "attributes": {"title": "Rails is Omakase"},
            "relationships": {"author": {"data": {"type": "people", "id": "9"}}}
        }
    });
    let payload = Payload::from_value(item.clone()).unwrap();
    assert!(!payload.is_collection());
    assert_eq!(payload.serialize().to_value(), item);
}

#[test]
fn test_parsed_document_accessors() {
    let payload = Payload::parse(&collection_document().to_string()).unwrap();

    assert!(payload.is_collection());
    assert_eq!(payload.meta()["count"], json!(13));
    assert_eq!(payload.jsonapi()["version"], json!("1.0"));
    assert_eq!(payload.keys(), vec![json!("1"), json!("2")]);
    assert_eq!(payload.included().len(), 3);
    assert_eq!(payload.embedded(), vec!["author", "comments.author"]);
}

#[test]
fn test_export_inlines_included_resources() {
    let payload = Payload::parse(&collection_document().to_string()).unwrap();

    assert_eq!(
        serde_json::to_value(payload.export(None).unwrap()).unwrap(),
        json!([
            {
                "id": "1",
                "title": "JSON API paints my bikeshed!",
                "author": dan(),
                "comments": [
                    {"id": "5", "body": "First!"},
                    {"id": "12", "body": "I like XML better"}
                ]
            },
            {
                "id": "2",
                "title": "JSON API is awesome!",
                "author": dan(),
                "comments": []
            }
        ])
    );
}

// Under the default policy the second reference to people 9 inside article 1
// (through comment 12) is dropped; the ancestors-only policy keeps it.
#[test]
fn test_export_duplicate_policies_diverge_on_repeated_siblings() {
    let mut config = AppConfig::default();
    config.export.duplicates = DuplicatePolicy::AncestorsOnly;
    let payload = Payload::from_config(&config)
        .load(collection_document())
        .unwrap();

    let exported = serde_json::to_value(payload.export(None).unwrap()).unwrap();
    assert_eq!(
        exported[0]["comments"],
        json!([
            {"id": "5", "body": "First!"},
            {"id": "12", "body": "I like XML better", "author": dan()}
        ])
    );
    assert_eq!(exported[1]["author"], dan());

    let default = Payload::parse(&collection_document().to_string()).unwrap();
    let exported = serde_json::to_value(default.export(None).unwrap()).unwrap();
    assert!(exported[0]["comments"][1].get("author").is_none());
}

#[test]
fn test_export_by_id() {
    let payload = Payload::parse(&collection_document().to_string()).unwrap();
    let exported = serde_json::to_value(payload.export(Some(&json!("2"))).unwrap()).unwrap();
    assert_eq!(exported["title"], json!("JSON API is awesome!"));
    assert!(payload.export(Some(&json!("3"))).is_err());
}

#[test]
fn test_errors_document_is_parsed() {
    let payload = Payload::from_value(json!({
        "jsonapi": {"version": "1.0"},
        "errors": [{
            "code": "123",
            "source": {"pointer": "/data/attributes/firstName"},
            "title": "Value is too short",
            "detail": "First name must contain at least three characters."
        }]
    }))
    .unwrap();

    assert_eq!(
        serde_json::to_value(payload.errors()).unwrap(),
        json!([{
            "code": "123",
            "source": {"pointer": "/data/attributes/firstName"},
            "title": "Value is too short",
            "detail": "First name must contain at least three characters."
        }])
    );
    assert!(payload.serialize().data.is_none());
}

#[test]
fn test_encoded_graph_exports_back_to_its_fields() {
    init_logging();
    let store = gallery_store();
    let image = load_image(&store, 1).unwrap();

    let mut encoder = Payload::default().with_schema(Arc::new(gallery_schema()));
    encoder.set(image, &Embed::All);
    let wire = encoder.serialize().to_json().unwrap();

    let decoded = Payload::parse(&wire).unwrap();
    assert_eq!(
        serde_json::to_value(decoded.export(None).unwrap()).unwrap(),
        json!({
            "id": 1,
            "cid": "I1",
            "gallery_id": 1,
            "name": "amiga_1200.jpg",
            "title": "Amiga 1200",
            "gallery": {"id": 1, "cid": "G1", "name": "Foo Gallery"},
            "images_tags": [
                {"id": 1, "image_id": 1, "tag_id": 1, "tag": {"id": 1, "cid": "T1", "name": "High Tech"}},
                {"id": 2, "image_id": 1, "tag_id": 3, "tag": {"id": 3, "cid": "T3", "name": "Computer"}}
            ]
        })
    );
    assert_eq!(decoded.embedded(), vec!["gallery", "images_tags.tag"]);
}

#[test]
fn test_shared_gallery_is_included_once() {
    let store = gallery_store();
    let images = vec![load_image(&store, 1).unwrap(), load_image(&store, 2).unwrap()];

    let mut payload = Payload::default().with_schema(Arc::new(gallery_schema()));
    payload.set(images, &Embed::All);

    let document = payload.serialize().to_value();
    for index in 0..2 {
        assert_eq!(
            document["data"][index]["relationships"]["gallery"]["data"],
            json!({"type": "Gallery", "id": 1, "exists": true})
        );
    }
    let galleries = payload
        .included()
        .iter()
        .filter(|object| object.kind == "Gallery")
        .count();
    assert_eq!(galleries, 1);

    let mut identities: Vec<String> = payload
        .included()
        .iter()
        .map(|object| format!("{}:{}", object.kind, object.id.as_ref().unwrap()))
        .collect();
    let total = identities.len();
    identities.sort();
    identities.dedup();
    assert_eq!(identities.len(), total);
}
