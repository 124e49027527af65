use plate_richtext_core::{
    AutoformatConfig, AutoformatRule, BlockKind, Document, EditError, Editor, EditorConfig, Node,
    Op, PlateValue, PluginRegistry, Point, Selection, Transaction, default_rules,
};
use pretty_assertions::assert_eq;

#[test]
fn empty_config_uses_defaults() {
    let config = EditorConfig::from_json_str("{}").unwrap();

    assert_eq!(config.max_normalize_iterations, 100);
    assert!(config.autoformat.enabled);
    assert_eq!(config.autoformat.rules, default_rules());
}

#[test]
fn partial_config_keeps_unlisted_fields() {
    let config = EditorConfig::from_json_str(
        r#"{
            "autoformat": {
                "rules": [{ "token": "!", "kind": "block-quote" }]
            }
        }"#,
    )
    .unwrap();

    assert_eq!(config.max_normalize_iterations, 100);
    assert!(config.autoformat.enabled);
    assert_eq!(
        config.autoformat.rules,
        vec![AutoformatRule::new("!", BlockKind::BlockQuote)]
    );
}

#[test]
fn malformed_config_is_a_serialization_error() {
    let err = EditorConfig::from_json_str(r#"{ "max_normalize_iterations": "lots" }"#).unwrap_err();
    assert!(matches!(err, EditError::Serialization(_)));
}

#[test]
fn normalization_gives_up_after_the_configured_rounds() {
    let config = EditorConfig::from_json_str(r#"{ "max_normalize_iterations": 1 }"#).unwrap();
    let mut editor = Editor::with_config(
        Document {
            children: vec![Node::paragraph("a")],
        },
        Some(Selection::collapsed(Point::new(vec![0, 0], 0))),
        PluginRegistry::richtext(),
        config,
    );

    let err = editor
        .apply(Transaction::new(vec![Op::RemoveNode {
            path: vec![0],
            node: Node::paragraph("a"),
        }]))
        .unwrap_err();

    assert_eq!(err, EditError::NormalizeDidNotConverge(1));
    assert_eq!(editor.doc().children, vec![Node::paragraph("a")]);
}

#[test]
fn removing_everything_leaves_an_empty_paragraph() {
    let mut editor = Editor::new(
        Document {
            children: vec![Node::paragraph("a")],
        },
        Some(Selection::collapsed(Point::new(vec![0, 0], 1))),
        PluginRegistry::richtext(),
    );

    editor
        .apply(Transaction::new(vec![Op::RemoveNode {
            path: vec![0],
            node: Node::paragraph("a"),
        }]))
        .unwrap();

    assert_eq!(editor.doc(), &Document::empty());
    assert_eq!(
        editor.selection(),
        Some(&Selection::collapsed(Point::new(vec![0, 0], 0)))
    );
}

#[test]
fn value_round_trips_through_json() {
    let mut editor = Editor::with_richtext_plugins();
    editor.insert_text("hello").unwrap();
    editor.toggle_block(BlockKind::HeadingOne).unwrap();

    let json = PlateValue::from_editor(&editor).to_json_pretty().unwrap();
    assert_eq!(
        &PlateValue::from_json_str(&json).unwrap().into_document(),
        editor.doc()
    );
    let restored = PlateValue::from_json_str(&json)
        .unwrap()
        .into_editor(PluginRegistry::richtext())
        .unwrap();

    assert_eq!(restored.doc(), editor.doc());
    assert_eq!(restored.selection(), editor.selection());
    assert!(restored.is_block_active(BlockKind::HeadingOne));
}

#[test]
fn value_defaults_schema_and_normalizes_on_open() {
    let value = PlateValue::from_json_str(
        r#"{ "document": { "children": [
            { "node": "element", "kind": "paragraph", "children": [] }
        ] } }"#,
    )
    .unwrap();
    assert_eq!(value.schema, "plate-richtext");
    assert_eq!(value.version, 1);

    let editor = value.into_editor(PluginRegistry::core()).unwrap();
    assert_eq!(editor.doc(), &Document::empty());
    assert_eq!(editor.selection(), None);
}

#[test]
fn unknown_schema_is_refused() {
    let value = PlateValue {
        schema: "other".to_string(),
        ..PlateValue::from_document(Document::empty())
    };

    let err = value.into_editor(PluginRegistry::richtext()).err();

    assert!(matches!(err, Some(EditError::Serialization(message)) if message.contains("other")));
}

#[test]
fn list_item_rules_are_rejected_when_parsed() {
    let err = EditorConfig::from_json_str(
        r#"{ "autoformat": { "rules": [{ "token": "~", "kind": "list-item" }] } }"#,
    )
    .unwrap_err();

    assert!(matches!(err, EditError::InvalidArgs { ref id, .. } if id == "autoformat.rules"));
}

#[test]
fn list_item_rules_are_dropped_from_built_configs() {
    let config = EditorConfig {
        autoformat: AutoformatConfig {
            enabled: true,
            rules: vec![
                AutoformatRule::new("~", BlockKind::ListItem),
                AutoformatRule::new(">", BlockKind::BlockQuote),
            ],
        },
        ..Default::default()
    };
    assert!(config.validate().is_err());

    let mut editor = Editor::with_config(
        Document::empty(),
        Some(Selection::collapsed(Point::new(vec![0, 0], 0))),
        PluginRegistry::richtext(),
        config,
    );
    assert_eq!(
        editor.config().autoformat.rules,
        vec![AutoformatRule::new(">", BlockKind::BlockQuote)]
    );

    editor.insert_text("~").unwrap();
    editor.insert_text(" ").unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("~ ")]);
}
