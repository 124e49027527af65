use plate_richtext_core::{
    BlockKind, CommandSpec, Document, EditError, Editor, Marks, Node, PlatePlugin, PluginRegistry,
    Point, QuerySpec, Selection,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn editor(children: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document { children }, Some(selection), PluginRegistry::richtext())
}

fn word_selection() -> Selection {
    Selection::new(Point::new(vec![0, 0], 0), Point::new(vec![0, 0], 5))
}

#[test]
fn mark_commands_round_trip_through_json() {
    let mut editor = editor(vec![Node::paragraph("hello world")], word_selection());

    editor
        .run_command("marks.toggle", Some(json!({ "format": "bold" })))
        .unwrap();
    editor
        .run_command("marks.set_color", Some(json!({ "value": "#ff0000" })))
        .unwrap();

    let active: bool = editor
        .run_query("marks.is_active", Some(json!({ "format": "bold" })))
        .unwrap();
    assert!(active);
    let marks: Marks = editor.run_query("marks.get_active", None).unwrap();
    assert_eq!(
        marks,
        Marks {
            bold: true,
            color: Some("#ff0000".to_string()),
            ..Default::default()
        }
    );

    editor
        .run_command("marks.set_color", Some(json!({ "value": null })))
        .unwrap();
    let marks = editor.run_query_json("marks.get_active", None).unwrap();
    assert_eq!(marks, json!({ "bold": true }));
}

#[test]
fn block_and_align_commands_round_trip_through_json() {
    let mut editor = editor(vec![Node::paragraph("hello world")], word_selection());

    editor
        .run_command("block.toggle", Some(json!({ "kind": "heading-two" })))
        .unwrap();
    editor
        .run_command("block.toggle_align", Some(json!({ "align": "center" })))
        .unwrap();

    let heading: bool = editor
        .run_query("block.is_active", Some(json!({ "kind": "heading-two" })))
        .unwrap();
    let centered: bool = editor
        .run_query("block.is_align_active", Some(json!({ "align": "center" })))
        .unwrap();
    assert!(heading);
    assert!(centered);

    let Node::Element(el) = &editor.doc().children[0] else {
        panic!("expected element");
    };
    assert_eq!(el.kind, BlockKind::HeadingTwo);
}

#[test]
fn core_commands_drive_plain_editing() {
    let mut editor = Editor::with_core_plugins();

    editor
        .run_command("core.insert_text", Some(json!({ "text": "ab" })))
        .unwrap();
    editor.run_command("core.insert_break", None).unwrap();
    editor
        .run_command("core.insert_text", Some(json!({ "text": "cd" })))
        .unwrap();
    editor.run_command("core.delete_backward", None).unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph("ab"), Node::paragraph("c")]
    );
    assert!(editor.commands()["core.insert_text"].hidden);
    assert!(!editor.commands().contains_key("marks.toggle"));
}

#[test]
fn unknown_ids_are_reported() {
    let mut editor = Editor::with_richtext_plugins();

    assert_eq!(
        editor.run_command("marks.explode", None),
        Err(EditError::UnknownCommand("marks.explode".to_string()))
    );
    assert_eq!(
        editor.run_query_json("marks.everything", None),
        Err(EditError::UnknownQuery("marks.everything".to_string()))
    );
}

#[test]
fn malformed_arguments_are_rejected() {
    let mut editor = Editor::with_richtext_plugins();

    let err = editor
        .run_command("block.toggle", Some(json!({ "kind": "title" })))
        .unwrap_err();
    assert!(matches!(err, EditError::InvalidArgs { ref id, .. } if id == "block.toggle"));

    let err = editor.run_command("marks.toggle", None).unwrap_err();
    assert!(matches!(err, EditError::InvalidArgs { ref id, .. } if id == "marks.toggle"));

    let err = editor
        .run_query::<bool>("block.is_align_active", Some(json!({ "align": 3 })))
        .unwrap_err();
    assert!(matches!(err, EditError::InvalidArgs { .. }));
    assert_eq!(editor.version(), 0);
}

struct Shouting;

impl PlatePlugin for Shouting {
    fn id(&self) -> &'static str {
        "shouting"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![CommandSpec::new("shouting.insert", "Shout", |editor, _args| {
            editor.insert_text("!")
        })]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("shouting.length", |editor, _args| {
            Ok(json!(editor.doc().plain_text().len()))
        })]
    }
}

struct Impostor;

impl PlatePlugin for Impostor {
    fn id(&self) -> &'static str {
        "impostor"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![CommandSpec::new("marks.toggle", "Not a toggle", |_, _| Ok(()))]
    }
}

#[test]
fn third_party_plugins_extend_the_registry() {
    let mut registry = PluginRegistry::richtext();
    registry.register_plugin(Box::new(Shouting)).unwrap();
    let mut editor = Editor::new(
        Document::empty(),
        Some(Selection::collapsed(Point::new(vec![0, 0], 0))),
        registry,
    );

    editor.run_command("shouting.insert", None).unwrap();
    editor.run_command("shouting.insert", None).unwrap();

    let length: usize = editor.run_query("shouting.length", None).unwrap();
    assert_eq!(length, 2);
    assert!(editor.registry().plugin_ids().contains(&"shouting"));
}

#[test]
fn duplicate_registrations_are_refused() {
    let mut registry = PluginRegistry::richtext();

    let err = registry.register_plugin(Box::new(Impostor)).unwrap_err();
    assert!(matches!(err, EditError::DuplicateId(ref id) if id.contains("marks.toggle")));
    assert!(!registry.plugin_ids().contains(&"impostor"));

    registry.register_plugin(Box::new(Shouting)).unwrap();
    let err = registry.register_plugin(Box::new(Shouting)).unwrap_err();
    assert!(matches!(err, EditError::DuplicateId(_)));
}
