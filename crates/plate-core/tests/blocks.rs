use plate_richtext_core::{
    BlockKind, Document, EditError, Editor, ElementNode, Node, PluginRegistry, Point, Selection,
};
use pretty_assertions::assert_eq;

fn editor(children: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document { children }, Some(selection), PluginRegistry::richtext())
}

fn caret(path: Vec<usize>, offset: usize) -> Selection {
    Selection::collapsed(Point::new(path, offset))
}

fn list(kind: BlockKind, items: &[&str]) -> Node {
    Node::Element(ElementNode::list(
        kind,
        items.iter().map(|s| Node::text(*s)).collect(),
    ))
}

fn block(kind: BlockKind, text: &str) -> Node {
    Node::Element(ElementNode::new(kind, vec![Node::text(text)]))
}

#[test]
fn heading_toggles_on_and_back_off() {
    let mut editor = editor(vec![Node::paragraph("hello")], caret(vec![0, 0], 2));

    editor.toggle_block(BlockKind::HeadingOne).unwrap();
    assert_eq!(
        editor.doc().children,
        vec![block(BlockKind::HeadingOne, "hello")]
    );
    assert!(editor.is_block_active(BlockKind::HeadingOne));
    assert!(!editor.is_block_active(BlockKind::Paragraph));

    editor.toggle_block(BlockKind::HeadingOne).unwrap();
    assert_eq!(editor.doc().children, vec![Node::paragraph("hello")]);
    assert_eq!(editor.selection(), Some(&caret(vec![0, 0], 2)));
}

#[test]
fn bulleted_list_wraps_the_paragraph() {
    let mut editor = editor(vec![Node::paragraph("item")], caret(vec![0, 0], 0));

    editor.toggle_block(BlockKind::BulletedList).unwrap();

    assert_eq!(
        editor.doc().children,
        vec![list(BlockKind::BulletedList, &["item"])]
    );
    assert_eq!(editor.selection(), Some(&caret(vec![0, 0, 0], 0)));
    assert!(editor.is_block_active(BlockKind::BulletedList));
    assert!(editor.is_block_active(BlockKind::ListItem));
}

#[test]
fn toggling_a_list_twice_restores_the_paragraph() {
    let mut editor = editor(vec![Node::paragraph("item")], caret(vec![0, 0], 3));

    editor.toggle_block(BlockKind::BulletedList).unwrap();
    editor.toggle_block(BlockKind::BulletedList).unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("item")]);
    assert_eq!(editor.selection(), Some(&caret(vec![0, 0], 3)));
}

#[test]
fn switching_list_kind_replaces_the_container() {
    let mut editor = editor(
        vec![list(BlockKind::BulletedList, &["a"])],
        caret(vec![0, 0, 0], 1),
    );

    editor.toggle_block(BlockKind::NumberedList).unwrap();

    assert_eq!(
        editor.doc().children,
        vec![list(BlockKind::NumberedList, &["a"])]
    );
    assert!(!editor.is_block_active(BlockKind::BulletedList));
}

#[test]
fn converting_a_middle_item_splits_the_list() {
    let mut editor = editor(
        vec![list(BlockKind::BulletedList, &["a", "b", "c"])],
        caret(vec![0, 1, 0], 0),
    );

    editor.toggle_block(BlockKind::NumberedList).unwrap();

    assert_eq!(
        editor.doc().children,
        vec![
            list(BlockKind::BulletedList, &["a"]),
            list(BlockKind::NumberedList, &["b"]),
            list(BlockKind::BulletedList, &["c"]),
        ]
    );
    assert_eq!(editor.selection(), Some(&caret(vec![1, 0, 0], 0)));
}

#[test]
fn heading_inside_a_list_leaves_the_list() {
    let mut editor = editor(
        vec![list(BlockKind::BulletedList, &["a", "b"])],
        caret(vec![0, 1, 0], 1),
    );

    editor.toggle_block(BlockKind::HeadingTwo).unwrap();

    assert_eq!(
        editor.doc().children,
        vec![
            list(BlockKind::BulletedList, &["a"]),
            block(BlockKind::HeadingTwo, "b"),
        ]
    );
}

#[test]
fn several_paragraphs_become_one_list() {
    let mut editor = editor(
        vec![Node::paragraph("a"), Node::paragraph("b")],
        Selection::new(Point::new(vec![0, 0], 0), Point::new(vec![1, 0], 1)),
    );

    editor.toggle_block(BlockKind::NumberedList).unwrap();

    assert_eq!(
        editor.doc().children,
        vec![list(BlockKind::NumberedList, &["a", "b"])]
    );
    assert_eq!(
        editor.selection(),
        Some(&Selection::new(
            Point::new(vec![0, 0, 0], 0),
            Point::new(vec![0, 1, 0], 1)
        ))
    );
}

#[test]
fn hanging_selection_ignores_the_next_block() {
    let mut editor = editor(
        vec![Node::paragraph("a"), block(BlockKind::HeadingOne, "b")],
        Selection::new(Point::new(vec![0, 0], 0), Point::new(vec![1, 0], 0)),
    );

    assert!(!editor.is_block_active(BlockKind::HeadingOne));

    editor.toggle_block(BlockKind::BlockQuote).unwrap();
    assert_eq!(
        editor.doc().children,
        vec![
            block(BlockKind::BlockQuote, "a"),
            block(BlockKind::HeadingOne, "b"),
        ]
    );
}

#[test]
fn toggle_without_selection_is_a_no_op() {
    let mut editor = Editor::new(
        Document {
            children: vec![Node::paragraph("a")],
        },
        None,
        PluginRegistry::richtext(),
    );

    editor.toggle_block(BlockKind::HeadingOne).unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("a")]);
    assert!(!editor.is_block_active(BlockKind::Paragraph));
    assert_eq!(editor.version(), 0);
}

#[test]
fn stale_selection_is_rejected_without_changes() {
    let mut editor = editor(vec![Node::paragraph("a")], caret(vec![0, 0], 0));
    editor.set_selection(Some(caret(vec![5, 0], 0)));

    let err = editor.toggle_block(BlockKind::HeadingOne).unwrap_err();

    assert!(matches!(err, EditError::InvalidSelection(_)));
    assert_eq!(editor.doc().children, vec![Node::paragraph("a")]);
    assert_eq!(editor.version(), 0);
    assert!(!editor.is_block_active(BlockKind::Paragraph));
}

#[test]
fn list_item_is_not_a_toggle_target() {
    let mut editor = editor(vec![Node::paragraph("a")], caret(vec![0, 0], 0));

    let err = editor.toggle_block(BlockKind::ListItem).unwrap_err();
    assert!(matches!(err, EditError::InvalidArgs { ref id, .. } if id == "block.toggle"));

    let err = editor
        .run_command("block.toggle", Some(serde_json::json!({ "kind": "list-item" })))
        .unwrap_err();
    assert!(matches!(err, EditError::InvalidArgs { .. }));

    assert_eq!(editor.doc().children, vec![Node::paragraph("a")]);
    assert_eq!(editor.version(), 0);
}
