use folio_plate_core::{DIVIDER, Document, Editor, Node, PluginRegistry, Point, Selection};

#[test]
fn insert_divider_follows_focus_and_moves_caret_below() {
    let mut editor = Editor::new(
        Document::from_blocks(vec![Node::paragraph("intro"), Node::paragraph("outro")]),
        Selection::collapsed(Point::new(vec![0, 0], 3)),
        PluginRegistry::core(),
    );

    editor.run_command("core.insert_divider", None).unwrap();

    let kinds: Vec<_> = editor
        .doc()
        .children
        .iter()
        .map(|n| match n {
            Node::Void(v) => v.kind.clone(),
            Node::Element(el) => el.kind.clone(),
            Node::Text(_) => "text".to_string(),
        })
        .collect();
    assert_eq!(kinds, vec!["paragraph", DIVIDER, "paragraph", "paragraph"]);
    assert_eq!(editor.selection(), &Selection::collapsed(Point::new(vec![2, 0], 0)));
    assert_eq!(editor.last_source(), Some("command:core.insert_divider"));
}

#[test]
fn core_registry_has_no_image_commands() {
    let mut editor = Editor::new(
        Document::from_blocks(vec![Node::paragraph("x")]),
        Selection::collapsed(Point::new(vec![0, 0], 0)),
        PluginRegistry::core(),
    );
    let err = editor
        .run_command("image.insert", Some(serde_json::json!({ "src": "https://x/a.png" })))
        .unwrap_err();
    assert!(err.message().contains("Unknown command"));
}
