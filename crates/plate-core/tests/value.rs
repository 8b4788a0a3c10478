use folio_plate_core::{Document, Node, PlateValue, ValueError};

#[test]
fn value_round_trips_blog_body_with_images() {
    let doc = Document::from_blocks(vec![
        Node::heading(1, "Launch week"),
        Node::image("https://cdn.example.com/blog/launch.jpg", Some("Stack of books".into())),
        Node::paragraph("Our spring list is out."),
    ]);

    let json = PlateValue::from_document(doc.clone()).to_json_pretty().unwrap();
    assert!(json.contains("\"schema\": \"folio-plate\""));

    let parsed = PlateValue::from_json_str(&json).unwrap();
    assert_eq!(parsed.version, 1);
    assert_eq!(parsed.into_document(), doc);
}

#[test]
fn value_defaults_schema_and_version() {
    let parsed = PlateValue::from_json_str(r#"{ "document": { "children": [] } }"#).unwrap();
    assert_eq!(parsed.schema, "folio-plate");
    assert_eq!(parsed.version, 1);
    assert!(parsed.document.children.is_empty());
}

#[test]
fn value_rejects_foreign_schema_and_newer_versions() {
    let foreign = PlateValue::from_json_str(r#"{ "schema": "slate", "document": { "children": [] } }"#);
    assert!(matches!(foreign, Err(ValueError::Schema(ref s)) if s == "slate"));

    let newer = PlateValue::from_json_str(r#"{ "version": 2, "document": { "children": [] } }"#);
    assert!(matches!(newer, Err(ValueError::Version { found: 2 })));

    let broken = PlateValue::from_json_str("{ not json");
    assert!(matches!(broken, Err(ValueError::Json(_))));
}
