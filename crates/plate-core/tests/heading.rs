use folio_plate_core::{
    Attrs, Document, Editor, ElementNode, Marks, Node, PluginRegistry, Point, Selection, TextNode,
};

#[test]
fn heading_commands_update_block_and_query() {
    let mut editor = Editor::with_richtext_plugins();

    assert_eq!(editor.run_query::<Option<u64>>("heading.level", None).unwrap(), None);

    editor
        .run_command("heading.set", Some(serde_json::json!({ "level": 2 })))
        .unwrap();
    assert_eq!(editor.run_query::<Option<u64>>("heading.level", None).unwrap(), Some(2));

    let Node::Element(block) = &editor.doc().children[0] else {
        panic!("expected element block");
    };
    assert_eq!(block.kind, "heading");

    editor.run_command("heading.unset", None).unwrap();
    assert_eq!(editor.run_query::<Option<u64>>("heading.level", None).unwrap(), None);

    let Node::Element(block) = &editor.doc().children[0] else {
        panic!("expected element block");
    };
    assert_eq!(block.kind, "paragraph");
    assert!(block.attrs.get("level").is_none());
}

#[test]
fn heading_levels_are_clamped_on_load() {
    let mut attrs = Attrs::default();
    attrs.insert("level".to_string(), serde_json::json!(42));
    let doc = Document::from_blocks(vec![Node::Element(ElementNode {
        kind: "heading".to_string(),
        attrs,
        children: vec![Node::Text(TextNode {
            text: "Spring catalogue".to_string(),
            marks: Marks::default(),
        })],
    })]);
    let editor = Editor::new(
        doc,
        Selection::collapsed(Point::new(vec![0, 0], 0)),
        PluginRegistry::richtext(),
    );

    let Node::Element(block) = &editor.doc().children[0] else {
        panic!("expected element block");
    };
    assert_eq!(block.attrs.get("level").and_then(|v| v.as_u64()), Some(6));
}
