//! Staged mutation primitives.
//!
//! A [`Draft`] is a private copy of the document and selection. Primitives append
//! [`Op`]s to it and keep the selection (plus any points they track internally) in
//! step with every op. [`Editor::transact`] commits a draft as a whole or drops it.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{
    Align, Document, Editor, ElementNode, Marks, Node, Point, Property, Selection, TextNode,
};
use crate::error::EditError;
use crate::ops::{apply_op, transform_point, Op, Path};
use crate::plugin::InputOutcome;
use crate::query::{self, MatchMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextUnit {
    #[default]
    Character,
    Word,
    Line,
    Block,
}

#[derive(Debug, Clone, Default)]
pub struct SetNodesOptions {
    /// Target range. Defaults to the draft selection.
    pub at: Option<Selection>,
    pub mode: MatchMode,
    /// Split partially covered text nodes at the range edges first.
    pub split: bool,
}

#[derive(Debug, Clone, Default)]
pub struct WrapOptions {
    pub at: Option<Selection>,
}

#[derive(Debug, Clone, Default)]
pub struct UnwrapOptions {
    pub at: Option<Selection>,
    pub mode: MatchMode,
    /// Only lift the children covered by the range, splitting the matched element
    /// around them.
    pub split: bool,
}

#[derive(Debug, Clone)]
pub struct Draft {
    doc: Document,
    selection: Option<Selection>,
    ops: Vec<Op>,
}

impl Draft {
    pub fn new(doc: Document, selection: Option<Selection>) -> Self {
        Self {
            doc,
            selection,
            ops: Vec::new(),
        }
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn into_parts(self) -> (Document, Option<Selection>, Vec<Op>) {
        (self.doc, self.selection, self.ops)
    }

    pub fn apply(&mut self, op: Op) -> Result<(), EditError> {
        self.apply_tracking(op, &mut [])
    }

    /// Applies `op` and maps the selection and every point in `tracked` across it.
    fn apply_tracking(&mut self, op: Op, tracked: &mut [Point]) -> Result<(), EditError> {
        let selection = self.selection.as_ref().map(|sel| {
            Selection::new(
                transform_point(&sel.anchor, &op, &self.doc),
                transform_point(&sel.focus, &op, &self.doc),
            )
        });
        let moved: Vec<Point> = tracked
            .iter()
            .map(|point| transform_point(point, &op, &self.doc))
            .collect();

        apply_op(&mut self.doc, &op)?;

        self.selection = selection;
        for (slot, point) in tracked.iter_mut().zip(moved) {
            *slot = point;
        }
        self.ops.push(op);
        Ok(())
    }

    pub fn select(&mut self, range: Selection) {
        self.selection = Some(range);
    }

    pub fn deselect(&mut self) {
        self.selection = None;
    }

    fn target(&self, at: Option<Selection>) -> Result<Option<Selection>, EditError> {
        let Some(range) = at.or_else(|| self.selection.clone()) else {
            return Ok(None);
        };
        query::resolve_range(&self.doc, &range)?;
        Ok(Some(range))
    }

    /// Writes `props` onto every node in the range that satisfies `matcher`.
    pub fn set_nodes(
        &mut self,
        props: &[Property],
        matcher: &dyn Fn(&Node) -> bool,
        options: SetNodesOptions,
    ) -> Result<(), EditError> {
        let follows_selection = options.at.is_none();
        let Some(range) = self.target(options.at)? else {
            return Ok(());
        };
        let backward = range.is_backward();
        let range = query::unhang(&self.doc, &range);
        let (start, end) = range.edges();
        let mut edges = [start, end];

        if options.split && !range.is_collapsed() {
            let end = edges[1].clone();
            let end_len = text_len(&self.doc, &end.path)?;
            if end.offset > 0 && end.offset < end_len {
                self.apply_tracking(
                    Op::SplitText {
                        path: end.path,
                        offset: end.offset,
                    },
                    &mut edges,
                )?;
            }

            let start = edges[0].clone();
            let start_len = text_len(&self.doc, &start.path)?;
            if start.offset > 0 && start.offset < start_len {
                self.apply_tracking(
                    Op::SplitText {
                        path: start.path.clone(),
                        offset: start.offset,
                    },
                    &mut edges,
                )?;
                edges[0] = Point::new(next_sibling(&start.path), 0);
            }
        }

        let props: Vec<Property> = props.iter().cloned().map(canonical).collect();
        let targets = span_matches(&self.doc, &edges[0], &edges[1], matcher, options.mode);
        for path in targets {
            let Some(node) = query::node_at(&self.doc, &path) else {
                continue;
            };
            let changed: Vec<Property> = props
                .iter()
                .filter(|prop| prop.applies_to(node) && prop.read(node).as_ref() != Some(*prop))
                .cloned()
                .collect();
            if changed.is_empty() {
                continue;
            }
            let previous = changed.iter().filter_map(|prop| prop.read(node)).collect();
            self.apply(Op::SetNode {
                path,
                props: changed,
                previous,
            })?;
        }

        if follows_selection && options.split && !range.is_collapsed() {
            let [start, end] = edges;
            self.selection = Some(if backward {
                Selection::new(end, start)
            } else {
                Selection::new(start, end)
            });
        }
        Ok(())
    }

    /// Moves the lowest blocks covered by the range into a new `wrapper` element placed
    /// where the first of them was. Wrapper children are ignored.
    pub fn wrap_nodes(&mut self, wrapper: ElementNode, options: WrapOptions) -> Result<(), EditError> {
        let Some(range) = self.target(options.at)? else {
            return Ok(());
        };
        let range = query::unhang(&self.doc, &range);
        let (start, end) = range.edges();
        let blocks = span_matches(&self.doc, &start, &end, &Node::is_element, MatchMode::Lowest);
        let (Some(first), Some(last)) = (blocks.first(), blocks.last()) else {
            return Ok(());
        };

        let common = if first == last {
            query::parent(first).to_vec()
        } else {
            query::common_ancestor(first, last)
        };
        let depth = common.len();
        let mut path = common;
        path.push(first[depth]);
        let count = last[depth] - first[depth] + 1;

        self.apply(Op::WrapNodes {
            path,
            count,
            wrapper: ElementNode {
                children: Vec::new(),
                ..wrapper
            },
        })
    }

    /// Removes one level of nesting for every element in the range that satisfies
    /// `matcher`, splicing its children into its parent.
    pub fn unwrap_nodes(
        &mut self,
        matcher: &dyn Fn(&Node) -> bool,
        options: UnwrapOptions,
    ) -> Result<(), EditError> {
        let Some(range) = self.target(options.at)? else {
            return Ok(());
        };
        let range = query::unhang(&self.doc, &range);
        let (start, end) = range.edges();
        let mut edges = [start, end];
        let matches = span_matches(
            &self.doc,
            &edges[0],
            &edges[1],
            &|node: &Node| node.is_element() && matcher(node),
            options.mode,
        );

        for path in matches.into_iter().rev() {
            let Some(el) = query::element_at(&self.doc, &path) else {
                continue;
            };
            let len = el.children.len();
            if !options.split || len == 0 {
                self.apply_tracking(Op::UnwrapNode { path, count: len }, &mut edges)?;
                continue;
            }

            let depth = path.len();
            let first = if edges[0].path.len() > depth && edges[0].path.starts_with(&path) {
                edges[0].path[depth]
            } else {
                0
            };
            let last = if edges[1].path.len() > depth && edges[1].path.starts_with(&path) {
                edges[1].path[depth]
            } else {
                len - 1
            };

            if last + 1 < len {
                self.apply_tracking(
                    Op::SplitElement {
                        path: path.clone(),
                        position: last + 1,
                    },
                    &mut edges,
                )?;
            }
            let mut target = path.clone();
            if first > 0 {
                self.apply_tracking(
                    Op::SplitElement {
                        path,
                        position: first,
                    },
                    &mut edges,
                )?;
                target = next_sibling(&target);
            }
            self.apply_tracking(
                Op::UnwrapNode {
                    path: target,
                    count: last - first + 1,
                },
                &mut edges,
            )?;
        }
        Ok(())
    }

    /// Removes everything covered by `range`. Blocks the range spans are merged into the
    /// block holding its start. When `range` is the selection, it collapses to the start.
    pub fn delete_range(&mut self, range: &Selection) -> Result<(), EditError> {
        query::resolve_range(&self.doc, range)?;
        if range.is_collapsed() {
            return Ok(());
        }
        let is_selection = self
            .selection
            .as_ref()
            .is_some_and(|sel| sel.edges() == range.edges());
        let (start, end) = range.edges();
        let mut edges = [start.clone(), end.clone()];

        if start.path == end.path {
            let text = slice(&self.doc, &start.path, start.offset, end.offset)?;
            self.apply_tracking(
                Op::RemoveText {
                    path: start.path.clone(),
                    offset: start.offset,
                    text,
                },
                &mut edges,
            )?;
        } else {
            if end.offset > 0 {
                let text = slice(&self.doc, &end.path, 0, end.offset)?;
                self.apply_tracking(
                    Op::RemoveText {
                        path: end.path.clone(),
                        offset: 0,
                        text,
                    },
                    &mut edges,
                )?;
            }
            let start_len = text_len(&self.doc, &start.path)?;
            if start.offset < start_len {
                let text = slice(&self.doc, &start.path, start.offset, start_len)?;
                self.apply_tracking(
                    Op::RemoveText {
                        path: start.path.clone(),
                        offset: start.offset,
                        text,
                    },
                    &mut edges,
                )?;
            }

            let between: Vec<(Path, Node)> = query::filter_mode(
                query::nodes_in_span(&self.doc, &start.path, &end.path)
                    .into_iter()
                    .filter(|(path, _)| {
                        query::compare_paths(path, &start.path).is_gt()
                            && query::compare_paths(path, &end.path).is_lt()
                    })
                    .map(|(path, node)| (path, node.clone()))
                    .collect(),
                MatchMode::Highest,
            );
            for (path, node) in between.into_iter().rev() {
                self.apply_tracking(Op::RemoveNode { path, node }, &mut edges)?;
            }

            self.merge_blocks(&mut edges)?;
        }

        if is_selection {
            self.selection = Some(Selection::collapsed(edges[0].clone()));
        }
        Ok(())
    }

    /// Joins the block holding `edges[1]` onto the block holding `edges[0]`.
    fn merge_blocks(&mut self, edges: &mut [Point; 2]) -> Result<(), EditError> {
        let start_block = query::parent(&edges[0].path).to_vec();
        let end_block = query::parent(&edges[1].path).to_vec();
        if start_block == end_block {
            return Ok(());
        }
        let start_len = element(&self.doc, &start_block)?.children.len();

        if query::parent(&start_block) == query::parent(&end_block)
            && end_block.last() == start_block.last().map(|ix| ix + 1).as_ref()
        {
            return self.apply_tracking(
                Op::MergeElement {
                    path: end_block,
                    position: start_len,
                },
                &mut edges[..],
            );
        }

        let moved = element(&self.doc, &end_block)?.children.clone();
        for (ix, child) in moved.into_iter().enumerate() {
            let mut path = start_block.clone();
            path.push(start_len + ix);
            self.apply_tracking(Op::InsertNode { path, node: child }, &mut edges[..])?;
        }

        let mut removed = end_block;
        while removed.len() > 1 {
            let up = query::parent(&removed);
            let single = query::element_at(&self.doc, up).is_some_and(|el| el.children.len() == 1);
            if !single || query::is_ancestor(up, &start_block) {
                break;
            }
            removed = up.to_vec();
        }
        let node = query::node_at(&self.doc, &removed)
            .cloned()
            .ok_or_else(|| EditError::InvalidPath(format!("{removed:?}")))?;
        self.apply_tracking(Op::RemoveNode { path: removed, node }, &mut edges[..])
    }

    /// Inserts `text` at the selection, replacing a non-collapsed selection. When
    /// `marks` differ from the caret text's marks the text gets a node of its own.
    pub fn insert_text(&mut self, text: &str, marks: Option<&Marks>) -> Result<(), EditError> {
        let Some(sel) = self.selection.clone() else {
            return Ok(());
        };
        query::resolve_range(&self.doc, &sel)?;
        if !sel.is_collapsed() {
            self.delete_range(&sel)?;
        }
        if text.is_empty() {
            return Ok(());
        }
        let Some(point) = self.selection.as_ref().map(|sel| sel.anchor.clone()) else {
            return Ok(());
        };
        let current = query::resolve_point(&self.doc, &point)?;

        let Some(marks) = marks.filter(|marks| **marks != current.marks) else {
            return self.apply(Op::InsertText {
                path: point.path,
                offset: point.offset,
                text: text.to_string(),
            });
        };

        let len = current.text.len();
        let path = if point.offset == 0 {
            point.path.clone()
        } else if point.offset == len {
            next_sibling(&point.path)
        } else {
            self.apply(Op::SplitText {
                path: point.path.clone(),
                offset: point.offset,
            })?;
            next_sibling(&point.path)
        };
        self.apply(Op::InsertNode {
            path: path.clone(),
            node: Node::Text(TextNode::new(text, marks.clone())),
        })?;
        self.select(Selection::collapsed(Point::new(path, text.len())));
        Ok(())
    }

    pub fn delete_backward(&mut self, unit: TextUnit) -> Result<(), EditError> {
        let Some((point, block_path, global, content)) = self.caret_in_block()? else {
            return Ok(());
        };
        if global == 0 {
            let Some((prev_path, prev)) = query::previous_text(&self.doc, &block_path) else {
                return Ok(());
            };
            let from = Point::new(prev_path, prev.text.len());
            return self.delete_range(&Selection::new(from, point));
        }

        let target = match unit {
            TextUnit::Character => content[..global]
                .chars()
                .next_back()
                .map_or(0, |c| global - c.len_utf8()),
            TextUnit::Word => word_start_before(&content, global),
            TextUnit::Line | TextUnit::Block => 0,
        };
        let children = &element(&self.doc, &block_path)?.children;
        let from = query::point_for_global_offset(&block_path, children, target);
        self.delete_range(&Selection::new(from, point))
    }

    pub fn delete_forward(&mut self, unit: TextUnit) -> Result<(), EditError> {
        let Some((point, block_path, global, content)) = self.caret_in_block()? else {
            return Ok(());
        };
        if global == content.len() {
            let Some((next_path, _)) = query::next_text_after(&self.doc, &block_path) else {
                return Ok(());
            };
            return self.delete_range(&Selection::new(point, Point::new(next_path, 0)));
        }

        let target = match unit {
            TextUnit::Character => content[global..]
                .chars()
                .next()
                .map_or(content.len(), |c| global + c.len_utf8()),
            TextUnit::Word => word_end_after(&content, global),
            TextUnit::Line | TextUnit::Block => content.len(),
        };
        let children = &element(&self.doc, &block_path)?.children;
        let to = query::point_for_global_offset(&block_path, children, target);
        self.delete_range(&Selection::new(point, to))
    }

    /// Resolves a collapsed selection (deleting a non-collapsed one first) to
    /// `(caret, block path, offset within the block's text, block text)`.
    fn caret_in_block(&mut self) -> Result<Option<(Point, Path, usize, String)>, EditError> {
        let Some(sel) = self.selection.clone() else {
            return Ok(None);
        };
        query::resolve_range(&self.doc, &sel)?;
        if !sel.is_collapsed() {
            self.delete_range(&sel)?;
            return Ok(None);
        }
        let point = sel.anchor;
        let block_path = query::parent(&point.path).to_vec();
        let block = element(&self.doc, &block_path)?;
        let child_ix = point.path.last().copied().unwrap_or(0);
        let global = query::point_global_offset(&block.children, child_ix, point.offset);
        let content: String = block
            .children
            .iter()
            .filter_map(Node::as_text)
            .map(|t| t.text.as_str())
            .collect();
        Ok(Some((point, block_path, global, content)))
    }

    /// Splits the caret's block in two. The new block keeps the kind and alignment and
    /// receives the caret.
    pub fn insert_break(&mut self) -> Result<(), EditError> {
        let Some(sel) = self.selection.clone() else {
            return Ok(());
        };
        query::resolve_range(&self.doc, &sel)?;
        if !sel.is_collapsed() {
            self.delete_range(&sel)?;
        }
        let Some(point) = self.selection.as_ref().map(|sel| sel.anchor.clone()) else {
            return Ok(());
        };
        let block_path = query::parent(&point.path).to_vec();
        let block = element(&self.doc, &block_path)?;
        let child_ix = point.path.last().copied().unwrap_or(0);
        let global = query::point_global_offset(&block.children, child_ix, point.offset);
        let total: usize = block
            .children
            .iter()
            .filter_map(Node::as_text)
            .map(|t| t.text.len())
            .sum();
        let caret_marks = query::resolve_point(&self.doc, &point)?.marks.clone();
        let empty = |block: &ElementNode| {
            Node::Element(
                ElementNode::new(block.kind, vec![Node::Text(TextNode::new("", caret_marks.clone()))])
                    .with_alignment(block.alignment),
            )
        };

        if global == 0 && total > 0 {
            let node = empty(block);
            return self.apply(Op::InsertNode {
                path: block_path,
                node,
            });
        }

        let next_block = next_sibling(&block_path);
        if global == total {
            let node = empty(block);
            self.apply(Op::InsertNode {
                path: next_block.clone(),
                node,
            })?;
        } else {
            let len = text_len(&self.doc, &point.path)?;
            let position = if point.offset == 0 {
                child_ix
            } else {
                if point.offset < len {
                    self.apply(Op::SplitText {
                        path: point.path.clone(),
                        offset: point.offset,
                    })?;
                }
                child_ix + 1
            };
            self.apply(Op::SplitElement {
                path: block_path,
                position,
            })?;
        }

        let mut caret = next_block;
        caret.push(0);
        self.select(Selection::collapsed(Point::new(caret, 0)));
        Ok(())
    }
}

/// Nodes matched by `matcher` in the span between `start` and `end`, skipping text
/// nodes the range only touches at a zero-width edge.
fn span_matches(
    doc: &Document,
    start: &Point,
    end: &Point,
    matcher: &dyn Fn(&Node) -> bool,
    mode: MatchMode,
) -> Vec<Path> {
    let spans_texts = start.path != end.path;
    let matches = query::nodes_in_span(doc, &start.path, &end.path)
        .into_iter()
        .filter(|(path, node)| {
            if !matcher(node) {
                return false;
            }
            match node {
                Node::Text(t) if spans_texts => {
                    !(*path == start.path && start.offset >= t.text.len()
                        || *path == end.path && end.offset == 0)
                }
                _ => true,
            }
        })
        .collect();
    query::filter_mode(matches, mode)
        .into_iter()
        .map(|(path, _)| path)
        .collect()
}

fn canonical(prop: Property) -> Property {
    match prop {
        Property::Align(align) => Property::Align(align.and_then(Align::stored)),
        other => other,
    }
}

fn next_sibling(path: &[usize]) -> Path {
    let mut next = path.to_vec();
    if let Some(last) = next.last_mut() {
        *last += 1;
    }
    next
}

fn element<'a>(doc: &'a Document, path: &[usize]) -> Result<&'a ElementNode, EditError> {
    query::element_at(doc, path)
        .ok_or_else(|| EditError::InvalidPath(format!("Expected element at {path:?}")))
}

fn text_len(doc: &Document, path: &[usize]) -> Result<usize, EditError> {
    query::text_at(doc, path)
        .map(|t| t.text.len())
        .ok_or_else(|| EditError::InvalidPath(format!("Expected text at {path:?}")))
}

fn slice(doc: &Document, path: &[usize], from: usize, to: usize) -> Result<String, EditError> {
    query::text_at(doc, path)
        .and_then(|t| t.text.get(from..to))
        .map(str::to_string)
        .ok_or_else(|| EditError::InvalidSelection(format!("{path:?}[{from}..{to}]")))
}

fn word_start_before(content: &str, offset: usize) -> usize {
    let trimmed = content[..offset].trim_end();
    trimmed
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map_or(0, |(ix, c)| ix + c.len_utf8())
}

fn word_end_after(content: &str, offset: usize) -> usize {
    let after = &content[offset..];
    let rest = after.trim_start();
    let skipped = after.len() - rest.len();
    let word = rest.find(char::is_whitespace).unwrap_or(rest.len());
    offset + skipped + word
}

impl Editor {
    /// The nearest element above the selection (or above `from`) that satisfies
    /// `predicate`. For a selection, only elements containing both edges qualify.
    pub fn nearest_block(
        &self,
        predicate: impl Fn(&ElementNode) -> bool,
        from: Option<&[usize]>,
    ) -> Option<(ElementNode, Path)> {
        let found = match from {
            Some(path) => query::nearest_block(self.doc(), path, &predicate),
            None => {
                let sel = self.selection()?;
                let common = query::common_ancestor(&sel.anchor.path, &sel.focus.path);
                if common == sel.anchor.path {
                    query::nearest_block(self.doc(), &common, &predicate)
                } else {
                    match query::element_at(self.doc(), &common) {
                        Some(el) if predicate(el) => Some((el, common.clone())),
                        _ => query::nearest_block(self.doc(), &common, &predicate),
                    }
                }
            }
        };
        found.map(|(el, path)| (el.clone(), path))
    }

    pub fn start_of_block(&self, path: &[usize]) -> Option<Point> {
        query::start_of(self.doc(), path)
    }

    pub fn end_of(&self, path: &[usize]) -> Option<Point> {
        query::end_of(self.doc(), path)
    }

    pub fn text_between(&self, range: &Selection) -> String {
        query::text_between(self.doc(), range)
    }

    pub fn select(&mut self, range: Selection) -> Result<(), EditError> {
        query::resolve_range(self.doc(), &range)?;
        self.set_selection(Some(range));
        Ok(())
    }

    pub fn deselect(&mut self) {
        self.set_selection(None);
    }

    pub fn delete_range(&mut self, range: &Selection) -> Result<(), EditError> {
        self.transact("core.delete_range", |draft| draft.delete_range(range))
    }

    pub fn set_nodes(
        &mut self,
        props: &[Property],
        matcher: impl Fn(&Node) -> bool,
        options: SetNodesOptions,
    ) -> Result<(), EditError> {
        self.transact("core.set_nodes", |draft| {
            draft.set_nodes(props, &matcher, options)
        })
    }

    pub fn wrap_nodes(&mut self, wrapper: ElementNode, options: WrapOptions) -> Result<(), EditError> {
        self.transact("core.wrap_nodes", |draft| draft.wrap_nodes(wrapper, options))
    }

    pub fn unwrap_nodes(
        &mut self,
        matcher: impl Fn(&Node) -> bool,
        options: UnwrapOptions,
    ) -> Result<(), EditError> {
        self.transact("core.unwrap_nodes", |draft| {
            draft.unwrap_nodes(&matcher, options)
        })
    }

    /// Inserts `text` at the caret. Input handlers (such as markdown shortcuts) get the
    /// first chance to consume it.
    pub fn insert_text(&mut self, text: &str) -> Result<(), EditError> {
        let handlers = self.registry().input_handlers();
        for handler in handlers {
            match handler.insert_text(self, text) {
                Ok(InputOutcome::Handled) => return Ok(()),
                Ok(InputOutcome::Pass) => {}
                Err(err) => warn!(handler = handler.id(), %err, "input handler failed on insert"),
            }
        }

        let marks = self.pending_marks().cloned();
        self.transact("core.insert_text", |draft| {
            draft.insert_text(text, marks.as_ref())
        })?;
        self.set_pending_marks(None);
        Ok(())
    }

    pub fn delete_backward(&mut self, unit: TextUnit) -> Result<(), EditError> {
        let handlers = self.registry().input_handlers();
        for handler in handlers {
            match handler.delete_backward(self, unit) {
                Ok(InputOutcome::Handled) => return Ok(()),
                Ok(InputOutcome::Pass) => {}
                Err(err) => warn!(handler = handler.id(), %err, "input handler failed on delete"),
            }
        }
        self.transact("core.delete_backward", |draft| draft.delete_backward(unit))
    }

    pub fn delete_forward(&mut self, unit: TextUnit) -> Result<(), EditError> {
        self.transact("core.delete_forward", |draft| draft.delete_forward(unit))
    }

    pub fn insert_break(&mut self) -> Result<(), EditError> {
        self.transact("core.insert_break", |draft| draft.insert_break())
    }
}
