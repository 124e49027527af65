use plate_richtext_core::{
    BlockKind, Document, EditError, Editor, ElementNode, MarkFormat, Marks, MatchMode, Node,
    PluginRegistry, Point, Property, Selection, SetNodesOptions, TextNode, UnwrapOptions,
    WrapOptions,
};
use pretty_assertions::assert_eq;

fn editor(children: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document { children }, Some(selection), PluginRegistry::richtext())
}

fn range(anchor: (Vec<usize>, usize), focus: (Vec<usize>, usize)) -> Selection {
    Selection::new(Point::new(anchor.0, anchor.1), Point::new(focus.0, focus.1))
}

fn bulleted(items: &[&str]) -> Node {
    Node::Element(ElementNode::list(
        BlockKind::BulletedList,
        items.iter().map(|s| Node::text(*s)).collect(),
    ))
}

fn kinds(doc: &Document) -> Vec<BlockKind> {
    doc.children
        .iter()
        .filter_map(Node::as_element)
        .map(|el| el.kind)
        .collect()
}

#[test]
fn text_between_reads_in_document_order() {
    let editor = editor(
        vec![Node::paragraph("hello world"), Node::paragraph("again")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );

    let backward = range((vec![0, 0], 6), (vec![0, 0], 0));
    assert_eq!(editor.text_between(&backward), "hello ");

    let across = range((vec![0, 0], 6), (vec![1, 0], 2));
    assert_eq!(editor.text_between(&across), "worldag");
}

#[test]
fn nearest_block_walks_ancestors_outward() {
    let editor = editor(
        vec![bulleted(&["one"])],
        Selection::collapsed(Point::new(vec![0, 0, 0], 1)),
    );

    let (item, item_path) = editor
        .nearest_block(ElementNode::is_text_block, None)
        .unwrap();
    assert_eq!(item.kind, BlockKind::ListItem);
    assert_eq!(item_path, vec![0, 0]);

    let (list, list_path) = editor.nearest_block(|el| el.kind.is_list(), None).unwrap();
    assert_eq!(list.kind, BlockKind::BulletedList);
    assert_eq!(list_path, vec![0]);

    assert!(
        editor
            .nearest_block(|el| el.kind == BlockKind::HeadingOne, None)
            .is_none()
    );

    let from_path = editor.nearest_block(|_| true, Some(&[0, 0, 0][..]));
    assert_eq!(from_path.map(|(_, path)| path), Some(vec![0, 0]));
}

#[test]
fn start_of_block_is_first_text_at_offset_zero() {
    let editor = editor(
        vec![Node::paragraph("x"), bulleted(&["one", "two"])],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );

    assert_eq!(
        editor.start_of_block(&[1]),
        Some(Point::new(vec![1, 0, 0], 0))
    );
    assert_eq!(editor.end_of(&[1]), Some(Point::new(vec![1, 1, 0], 3)));
}

#[test]
fn select_rejects_points_that_do_not_resolve() {
    let mut editor = editor(
        vec![Node::paragraph("abc")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );

    let err = editor
        .select(Selection::collapsed(Point::new(vec![0, 0], 9)))
        .unwrap_err();
    assert!(matches!(err, EditError::InvalidSelection(_)));
    assert_eq!(
        editor.selection(),
        Some(&Selection::collapsed(Point::new(vec![0, 0], 0)))
    );

    editor.select(range((vec![0, 0], 1), (vec![0, 0], 2))).unwrap();
    assert_eq!(editor.selection(), Some(&range((vec![0, 0], 1), (vec![0, 0], 2))));
}

#[test]
fn select_reports_offsets_inside_a_character() {
    let mut editor = editor(
        vec![Node::paragraph("é")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );

    let err = editor
        .select(Selection::collapsed(Point::new(vec![0, 0], 1)))
        .unwrap_err();

    let EditError::InvalidSelection(message) = &err else {
        panic!("expected invalid selection, got {err:?}");
    };
    assert!(message.contains("not a char boundary"));
}

#[test]
fn delete_range_merges_blocks_and_collapses_selection() {
    let sel = range((vec![0, 0], 2), (vec![1, 0], 3));
    let mut editor = editor(
        vec![Node::paragraph("hello"), Node::paragraph("world")],
        sel.clone(),
    );

    editor.delete_range(&sel).unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("held")]);
    assert_eq!(
        editor.selection(),
        Some(&Selection::collapsed(Point::new(vec![0, 0], 2)))
    );
}

#[test]
fn delete_range_removes_whole_blocks_in_between() {
    let sel = range((vec![0, 0], 1), (vec![2, 0], 1));
    let mut editor = editor(
        vec![
            Node::paragraph("ab"),
            Node::paragraph("gone"),
            Node::paragraph("cd"),
        ],
        sel.clone(),
    );

    editor.delete_range(&sel).unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("ad")]);
}

#[test]
fn delete_range_pulls_list_item_text_into_previous_block() {
    let sel = range((vec![0, 0], 1), (vec![1, 0, 0], 1));
    let mut editor = editor(vec![Node::paragraph("ab"), bulleted(&["cd", "ef"])], sel.clone());

    editor.delete_range(&sel).unwrap();

    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph("ad"), bulleted(&["ef"])]
    );
}

#[test]
fn set_nodes_with_split_touches_only_the_covered_slice() {
    let mut editor = editor(
        vec![Node::paragraph("abcde")],
        range((vec![0, 0], 1), (vec![0, 0], 3)),
    );

    editor
        .set_nodes(
            &[Property::Mark(MarkFormat::Bold, true)],
            Node::is_text,
            SetNodesOptions {
                split: true,
                ..Default::default()
            },
        )
        .unwrap();

    let bold = Marks {
        bold: true,
        ..Default::default()
    };
    let Node::Element(paragraph) = &editor.doc().children[0] else {
        panic!("expected paragraph element");
    };
    assert_eq!(
        paragraph.children,
        vec![
            Node::text("a"),
            Node::Text(TextNode::new("bc", bold)),
            Node::text("de"),
        ]
    );
    assert_eq!(
        editor.selection(),
        Some(&range((vec![0, 1], 0), (vec![0, 1], 2)))
    );
}

#[test]
fn wrap_then_unwrap_restores_the_tree() {
    let original = vec![Node::paragraph("a"), Node::paragraph("b")];
    let mut editor = editor(original.clone(), range((vec![0, 0], 0), (vec![1, 0], 1)));

    editor
        .wrap_nodes(
            ElementNode::new(BlockKind::BlockQuote, Vec::new()),
            WrapOptions::default(),
        )
        .unwrap();

    assert_eq!(kinds(editor.doc()), vec![BlockKind::BlockQuote]);
    let Node::Element(quote) = &editor.doc().children[0] else {
        panic!("expected block quote");
    };
    assert_eq!(quote.children, original);
    assert_eq!(
        editor.selection(),
        Some(&range((vec![0, 0, 0], 0), (vec![0, 1, 0], 1)))
    );

    editor
        .unwrap_nodes(
            |node| matches!(node, Node::Element(el) if el.kind == BlockKind::BlockQuote),
            UnwrapOptions::default(),
        )
        .unwrap();

    assert_eq!(editor.doc().children, original);
}

#[test]
fn unwrap_with_split_lifts_only_the_selected_child() {
    let mut editor = editor(
        vec![bulleted(&["a", "b", "c"])],
        Selection::collapsed(Point::new(vec![0, 1, 0], 0)),
    );

    editor
        .unwrap_nodes(
            Node::is_list,
            UnwrapOptions {
                split: true,
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(
        kinds(editor.doc()),
        vec![
            BlockKind::BulletedList,
            BlockKind::ListItem,
            BlockKind::BulletedList,
        ]
    );
    assert_eq!(editor.doc().plain_text(), "a\nb\nc");
    assert_eq!(
        editor.selection(),
        Some(&Selection::collapsed(Point::new(vec![1, 0], 0)))
    );
}

#[test]
fn set_nodes_highest_mode_targets_the_outer_match() {
    let mut editor = editor(
        vec![bulleted(&["a", "b"])],
        Selection::collapsed(Point::new(vec![0, 1, 0], 0)),
    );

    editor
        .set_nodes(
            &[Property::Kind(BlockKind::NumberedList)],
            Node::is_element,
            SetNodesOptions {
                mode: MatchMode::Highest,
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(kinds(editor.doc()), vec![BlockKind::NumberedList]);
    let Node::Element(list) = &editor.doc().children[0] else {
        panic!("expected list element");
    };
    assert!(list.children.iter().all(|item| {
        item.as_element()
            .is_some_and(|el| el.kind == BlockKind::ListItem)
    }));
}

#[test]
fn deselect_clears_the_selection_inside_a_transaction() {
    let mut editor = editor(
        vec![Node::paragraph("abc")],
        range((vec![0, 0], 0), (vec![0, 0], 2)),
    );

    editor
        .transact("test.deselect", |draft| {
            draft.delete_range(&range((vec![0, 0], 0), (vec![0, 0], 1)))?;
            draft.deselect();
            Ok(draft.ops().len())
        })
        .unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("bc")]);
    assert_eq!(editor.selection(), None);

    editor.select(range((vec![0, 0], 0), (vec![0, 0], 1))).unwrap();
    editor.deselect();
    assert_eq!(editor.selection(), None);
}

#[test]
fn unwrap_without_a_match_is_a_no_op() {
    let mut editor = editor(
        vec![Node::paragraph("plain")],
        Selection::collapsed(Point::new(vec![0, 0], 2)),
    );

    editor
        .unwrap_nodes(
            Node::is_list,
            UnwrapOptions {
                split: true,
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("plain")]);
    assert_eq!(editor.version(), 0);
}
