use serde::{Deserialize, Serialize};

use crate::core::{Document, ElementNode, Node, Point, Property, Selection, TextNode};
use crate::error::EditError;
use crate::query;

pub type Path = Vec<usize>;

/// A primitive, self-describing edit. Every op carries enough data to transform
/// points across it without consulting the tree (except `RemoveNode`, which needs the
/// pre-removal document to relocate points that sat inside the removed subtree).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    InsertText {
        path: Path,
        offset: usize,
        text: String,
    },
    RemoveText {
        path: Path,
        offset: usize,
        text: String,
    },
    InsertNode {
        path: Path,
        node: Node,
    },
    RemoveNode {
        path: Path,
        node: Node,
    },
    SetNode {
        path: Path,
        props: Vec<Property>,
        previous: Vec<Property>,
    },
    /// Splits the text at `path` so `[offset..]` becomes a new right sibling.
    SplitText {
        path: Path,
        offset: usize,
    },
    /// Appends the text at `path` to its left sibling, whose length is `position`.
    MergeText {
        path: Path,
        position: usize,
    },
    /// Moves `children[position..]` of the element at `path` into a new right sibling.
    SplitElement {
        path: Path,
        position: usize,
    },
    /// Appends the children of the element at `path` to its left sibling, which has
    /// `position` children.
    MergeElement {
        path: Path,
        position: usize,
    },
    /// Moves `count` siblings starting at `path` into `wrapper`, placed at `path`.
    WrapNodes {
        path: Path,
        count: usize,
        wrapper: ElementNode,
    },
    /// Replaces the element at `path` with its `count` children.
    UnwrapNode {
        path: Path,
        count: usize,
    },
}

impl Op {
    pub fn path(&self) -> &[usize] {
        match self {
            Op::InsertText { path, .. }
            | Op::RemoveText { path, .. }
            | Op::InsertNode { path, .. }
            | Op::RemoveNode { path, .. }
            | Op::SetNode { path, .. }
            | Op::SplitText { path, .. }
            | Op::MergeText { path, .. }
            | Op::SplitElement { path, .. }
            | Op::MergeElement { path, .. }
            | Op::WrapNodes { path, .. }
            | Op::UnwrapNode { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub ops: Vec<Op>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_after: Option<Selection>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl Transaction {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            selection_after: None,
            meta: TransactionMeta::default(),
        }
    }

    pub fn selection_after(mut self, selection_after: Selection) -> Self {
        self.selection_after = Some(selection_after);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }
}

pub(crate) fn apply_op(doc: &mut Document, op: &Op) -> Result<(), EditError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let node = text_mut(doc, path)?;
            if *offset > node.text.len() || !node.text.is_char_boundary(*offset) {
                return Err(EditError::InvalidOperation(format!(
                    "Insert offset {offset} is not a char boundary of {path:?}"
                )));
            }
            node.text.insert_str(*offset, text);
        }
        Op::RemoveText { path, offset, text } => {
            let node = text_mut(doc, path)?;
            let end = offset + text.len();
            if node.text.get(*offset..end) != Some(text.as_str()) {
                return Err(EditError::InvalidOperation(format!(
                    "Removed text does not match {path:?}[{offset}..{end}]"
                )));
            }
            node.text.replace_range(*offset..end, "");
        }
        Op::InsertNode { path, node } => {
            let (children, index) = siblings_mut(doc, path)?;
            if index > children.len() {
                return Err(EditError::InvalidPath(format!(
                    "Insert index out of bounds: {index} > {}",
                    children.len()
                )));
            }
            children.insert(index, node.clone());
        }
        Op::RemoveNode { path, .. } => {
            let (children, index) = siblings_mut(doc, path)?;
            if index >= children.len() {
                return Err(EditError::InvalidPath(format!(
                    "Remove index out of bounds: {index} >= {}",
                    children.len()
                )));
            }
            children.remove(index);
        }
        Op::SetNode { path, props, .. } => {
            let node = node_mut(doc, path)?;
            for prop in props {
                prop.write(node)?;
            }
        }
        Op::SplitText { path, offset } => {
            let (children, index) = siblings_mut(doc, path)?;
            let Some(Node::Text(left)) = children.get_mut(index) else {
                return Err(EditError::InvalidPath(format!("Expected text at {path:?}")));
            };
            if *offset > left.text.len() || !left.text.is_char_boundary(*offset) {
                return Err(EditError::InvalidOperation(format!(
                    "Split offset {offset} is not a char boundary of {path:?}"
                )));
            }
            let right = TextNode {
                text: left.text.split_off(*offset),
                marks: left.marks.clone(),
            };
            children.insert(index + 1, Node::Text(right));
        }
        Op::MergeText { path, position } => {
            let (children, index) = siblings_mut(doc, path)?;
            if index == 0 || index >= children.len() {
                return Err(EditError::InvalidPath(format!(
                    "No text to merge into at {path:?}"
                )));
            }
            let (Some(Node::Text(left)), Some(Node::Text(_))) =
                (children.get(index - 1), children.get(index))
            else {
                return Err(EditError::InvalidOperation(format!(
                    "MergeText needs two adjacent texts at {path:?}"
                )));
            };
            if left.text.len() != *position {
                return Err(EditError::InvalidOperation(format!(
                    "MergeText position {position} does not match {}",
                    left.text.len()
                )));
            }
            let Node::Text(right) = children.remove(index) else {
                unreachable!("checked above");
            };
            if let Some(Node::Text(left)) = children.get_mut(index - 1) {
                left.text.push_str(&right.text);
            }
        }
        Op::SplitElement { path, position } => {
            let (children, index) = siblings_mut(doc, path)?;
            let Some(Node::Element(left)) = children.get_mut(index) else {
                return Err(EditError::InvalidPath(format!(
                    "Expected element at {path:?}"
                )));
            };
            if *position > left.children.len() {
                return Err(EditError::InvalidOperation(format!(
                    "Split position {position} > {}",
                    left.children.len()
                )));
            }
            let right = ElementNode {
                kind: left.kind,
                alignment: left.alignment,
                children: left.children.split_off(*position),
            };
            children.insert(index + 1, Node::Element(right));
        }
        Op::MergeElement { path, position } => {
            let (children, index) = siblings_mut(doc, path)?;
            if index == 0 || index >= children.len() {
                return Err(EditError::InvalidPath(format!(
                    "No element to merge into at {path:?}"
                )));
            }
            let (Some(Node::Element(left)), Some(Node::Element(_))) =
                (children.get(index - 1), children.get(index))
            else {
                return Err(EditError::InvalidOperation(format!(
                    "MergeElement needs two adjacent elements at {path:?}"
                )));
            };
            if left.children.len() != *position {
                return Err(EditError::InvalidOperation(format!(
                    "MergeElement position {position} does not match {}",
                    left.children.len()
                )));
            }
            let Node::Element(right) = children.remove(index) else {
                unreachable!("checked above");
            };
            if let Some(Node::Element(left)) = children.get_mut(index - 1) {
                left.children.extend(right.children);
            }
        }
        Op::WrapNodes {
            path,
            count,
            wrapper,
        } => {
            let (children, index) = siblings_mut(doc, path)?;
            if *count == 0 || index + count > children.len() {
                return Err(EditError::InvalidPath(format!(
                    "Cannot wrap {count} nodes at {path:?}"
                )));
            }
            let moved: Vec<Node> = children.drain(index..index + count).collect();
            let wrapper = ElementNode {
                kind: wrapper.kind,
                alignment: wrapper.alignment,
                children: moved,
            };
            children.insert(index, Node::Element(wrapper));
        }
        Op::UnwrapNode { path, count } => {
            let (children, index) = siblings_mut(doc, path)?;
            match children.get(index) {
                Some(Node::Element(el)) if el.children.len() == *count => {}
                _ => {
                    return Err(EditError::InvalidOperation(format!(
                        "Cannot unwrap {path:?} with {count} children"
                    )));
                }
            }
            let Node::Element(el) = children.remove(index) else {
                unreachable!("checked above");
            };
            children.splice(index..index, el.children);
        }
    }
    Ok(())
}

/// Maps `point` across `op`. `doc_before` is the document `op` is applied to.
pub(crate) fn transform_point(point: &Point, op: &Op, doc_before: &Document) -> Point {
    let mut out = point.clone();
    let path = op.path();
    let Some((&index, parent)) = path.split_last() else {
        return out;
    };
    let depth = parent.len();
    let is_sibling_level = out.path.len() > depth && out.path.starts_with(parent);
    let inside = out.path.len() > path.len() && out.path.starts_with(path);

    match op {
        Op::InsertText { offset, text, .. } => {
            if out.path == path && out.offset >= *offset {
                out.offset += text.len();
            }
        }
        Op::RemoveText { offset, text, .. } => {
            if out.path == path {
                if out.offset >= offset + text.len() {
                    out.offset -= text.len();
                } else if out.offset > *offset {
                    out.offset = *offset;
                }
            }
        }
        Op::InsertNode { .. } => {
            if is_sibling_level && out.path[depth] >= index {
                out.path[depth] += 1;
            }
        }
        Op::RemoveNode { .. } => {
            if out.path.starts_with(path) {
                return relocate_removed_point(doc_before, path, out);
            }
            if is_sibling_level && out.path[depth] > index {
                out.path[depth] -= 1;
            }
        }
        Op::SetNode { .. } => {}
        Op::SplitText { offset, .. } => {
            if out.path == path {
                if out.offset > *offset {
                    out.path[depth] += 1;
                    out.offset -= offset;
                }
            } else if is_sibling_level && out.path[depth] > index {
                out.path[depth] += 1;
            }
        }
        Op::MergeText { position, .. } => {
            if out.path == path {
                out.path[depth] -= 1;
                out.offset += position;
            } else if is_sibling_level && out.path[depth] > index {
                out.path[depth] -= 1;
            }
        }
        Op::SplitElement { position, .. } => {
            if inside {
                if out.path[path.len()] >= *position {
                    out.path[depth] += 1;
                    out.path[path.len()] -= position;
                }
            } else if is_sibling_level && out.path[depth] > index {
                out.path[depth] += 1;
            }
        }
        Op::MergeElement { position, .. } => {
            if inside {
                out.path[depth] -= 1;
                out.path[path.len()] += position;
            } else if is_sibling_level && out.path[depth] > index {
                out.path[depth] -= 1;
            }
        }
        Op::WrapNodes { count, .. } => {
            if is_sibling_level {
                let ix = out.path[depth];
                if ix >= index && ix < index + count {
                    out.path.insert(depth + 1, ix - index);
                    out.path[depth] = index;
                } else if ix >= index + count {
                    out.path[depth] = ix + 1 - count;
                }
            }
        }
        Op::UnwrapNode { count, .. } => {
            if inside {
                let child = out.path.remove(path.len());
                out.path[depth] = index + child;
            } else if is_sibling_level && out.path[depth] > index {
                out.path[depth] = out.path[depth] + count - 1;
            }
        }
    }
    out
}

/// A point inside a removed subtree moves to the nearest surviving text, preferring a
/// sibling of the removed node, then the previous text, then the next one.
fn relocate_removed_point(doc_before: &Document, removed: &[usize], point: Point) -> Point {
    let depth = removed.len() - 1;
    let parent = &removed[..depth];
    let shift_next = |mut path: Path| {
        if path.len() > depth && path.starts_with(parent) && path[depth] > removed[depth] {
            path[depth] -= 1;
        }
        path
    };
    let prev = query::previous_text(doc_before, removed);
    let next = query::next_text_after(doc_before, removed);

    match (prev, next) {
        (Some((path, text)), _) if query::parent(&path) == parent => {
            Point::new(path, text.text.len())
        }
        (_, Some((path, _))) if query::parent(&path) == parent => Point::new(shift_next(path), 0),
        (Some((path, text)), _) => Point::new(path, text.text.len()),
        (None, Some((path, _))) => Point::new(shift_next(path), 0),
        (None, None) => point,
    }
}

pub(crate) fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, EditError> {
    let Some((&first, rest)) = path.split_first() else {
        return Err(EditError::InvalidPath("Empty path".into()));
    };
    let len = doc.children.len();
    let mut node = doc.children.get_mut(first).ok_or_else(|| {
        EditError::InvalidPath(format!("Path out of bounds at depth 0: {first} >= {len}"))
    })?;
    for (depth, &ix) in rest.iter().enumerate() {
        node = match node {
            Node::Element(el) => {
                let len = el.children.len();
                el.children.get_mut(ix).ok_or_else(|| {
                    EditError::InvalidPath(format!(
                        "Path out of bounds at depth {}: {ix} >= {len}",
                        depth + 1
                    ))
                })?
            }
            Node::Text(_) => {
                return Err(EditError::InvalidPath(format!(
                    "Text node has no children at depth {depth}"
                )));
            }
        };
    }
    Ok(node)
}

fn text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, EditError> {
    match node_mut(doc, path)? {
        Node::Text(t) => Ok(t),
        Node::Element(_) => Err(EditError::InvalidPath(format!(
            "Expected text node at {path:?}"
        ))),
    }
}

/// The child list holding `path` together with the index of `path` in it.
fn siblings_mut<'a>(
    doc: &'a mut Document,
    path: &[usize],
) -> Result<(&'a mut Vec<Node>, usize), EditError> {
    let Some((&index, parent)) = path.split_last() else {
        return Err(EditError::InvalidPath("Empty path".into()));
    };
    if parent.is_empty() {
        return Ok((&mut doc.children, index));
    }
    match node_mut(doc, parent)? {
        Node::Element(el) => Ok((&mut el.children, index)),
        Node::Text(_) => Err(EditError::InvalidPath(format!(
            "Parent of {path:?} is not an element"
        ))),
    }
}
