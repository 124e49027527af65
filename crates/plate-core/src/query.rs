//! Read-only queries over a [`Document`].
//!
//! Paths are compared the way a tree walk visits them: a node sorts before its
//! following siblings, and an ancestor compares equal to its descendants. Span
//! queries lean on that rule so that the ancestors of both range edges are included.

use std::cmp::Ordering;

use crate::core::{Document, ElementNode, Node, Point, Selection, TextNode};
use crate::error::EditError;
use crate::ops::Path;

/// Which of several nested matches a span query keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// The deepest match on each branch.
    #[default]
    Lowest,
    /// The shallowest match on each branch.
    Highest,
    All,
}

pub fn node_at<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
    let (&first, rest) = path.split_first()?;
    let mut node = doc.children.get(first)?;
    for &ix in rest {
        node = match node {
            Node::Element(el) => el.children.get(ix)?,
            Node::Text(_) => return None,
        };
    }
    Some(node)
}

pub fn element_at<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a ElementNode> {
    node_at(doc, path).and_then(Node::as_element)
}

pub fn text_at<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a TextNode> {
    node_at(doc, path).and_then(Node::as_text)
}

pub fn parent(path: &[usize]) -> &[usize] {
    path.split_last().map(|(_, p)| p).unwrap_or(&[])
}

pub fn is_ancestor(ancestor: &[usize], path: &[usize]) -> bool {
    ancestor.len() < path.len() && path.starts_with(ancestor)
}

pub fn compare_paths(a: &[usize], b: &[usize]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

pub fn compare_points(a: &Point, b: &Point) -> Ordering {
    match compare_paths(&a.path, &b.path) {
        Ordering::Equal => a.offset.cmp(&b.offset),
        other => other,
    }
}

pub fn common_ancestor(a: &[usize], b: &[usize]) -> Path {
    a.iter()
        .zip(b)
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| *x)
        .collect()
}

/// Every text node in document order.
pub fn texts(doc: &Document) -> Vec<(Path, &TextNode)> {
    fn walk<'a>(nodes: &'a [Node], path: &mut Path, out: &mut Vec<(Path, &'a TextNode)>) {
        for (ix, node) in nodes.iter().enumerate() {
            path.push(ix);
            match node {
                Node::Text(t) => out.push((path.clone(), t)),
                Node::Element(el) => walk(&el.children, path, out),
            }
            path.pop();
        }
    }

    let mut out = Vec::new();
    walk(&doc.children, &mut Vec::new(), &mut out);
    out
}

/// The last text node that precedes `path` and is not inside it.
pub fn previous_text<'a>(doc: &'a Document, path: &[usize]) -> Option<(Path, &'a TextNode)> {
    texts(doc)
        .into_iter()
        .filter(|(p, _)| compare_paths(p, path).is_lt())
        .last()
}

/// The first text node that follows `path` and is not inside it.
pub fn next_text_after<'a>(doc: &'a Document, path: &[usize]) -> Option<(Path, &'a TextNode)> {
    texts(doc)
        .into_iter()
        .find(|(p, _)| compare_paths(p, path).is_gt())
}

/// The point at offset 0 of the first text inside (or at) `path`.
pub fn start_of(doc: &Document, path: &[usize]) -> Option<Point> {
    texts(doc)
        .into_iter()
        .find(|(p, _)| p.starts_with(path))
        .map(|(p, _)| Point::new(p, 0))
}

/// The point after the last character of the last text inside (or at) `path`.
pub fn end_of(doc: &Document, path: &[usize]) -> Option<Point> {
    texts(doc)
        .into_iter()
        .filter(|(p, _)| p.starts_with(path))
        .last()
        .map(|(p, t)| Point::new(p, t.text.len()))
}

/// Walks the ancestors of `path` from the nearest outward and returns the first
/// element satisfying `predicate`. The node at `path` itself is not considered.
pub fn nearest_block<'a>(
    doc: &'a Document,
    path: &[usize],
    predicate: impl Fn(&ElementNode) -> bool,
) -> Option<(&'a ElementNode, Path)> {
    (1..path.len()).rev().find_map(|len| {
        let ancestor = &path[..len];
        element_at(doc, ancestor)
            .filter(|el| predicate(el))
            .map(|el| (el, ancestor.to_vec()))
    })
}

/// Concatenated text covered by `range`, in document order regardless of direction.
pub fn text_between(doc: &Document, range: &Selection) -> String {
    let (start, end) = range.edges();
    let mut out = String::new();
    for (path, text) in texts(doc) {
        if compare_paths(&path, &start.path).is_lt() || compare_paths(&path, &end.path).is_gt() {
            continue;
        }
        let from = if path == start.path { start.offset } else { 0 };
        let to = if path == end.path {
            end.offset
        } else {
            text.text.len()
        };
        if let Some(slice) = text.text.get(from.min(to)..to.min(text.text.len())) {
            out.push_str(slice);
        }
    }
    out
}

/// Nodes whose paths lie between `start` and `end` (inclusive), ancestors of either
/// edge included, in document order.
pub fn nodes_in_span<'a>(doc: &'a Document, start: &[usize], end: &[usize]) -> Vec<(Path, &'a Node)> {
    fn walk<'a>(
        nodes: &'a [Node],
        path: &mut Path,
        start: &[usize],
        end: &[usize],
        out: &mut Vec<(Path, &'a Node)>,
    ) -> bool {
        for (ix, node) in nodes.iter().enumerate() {
            path.push(ix);
            if compare_paths(path, end).is_gt() {
                path.pop();
                return false;
            }
            if compare_paths(path, start).is_lt() {
                path.pop();
                continue;
            }
            out.push((path.clone(), node));
            if let Node::Element(el) = node {
                if !walk(&el.children, path, start, end, out) {
                    path.pop();
                    return false;
                }
            }
            path.pop();
        }
        true
    }

    let mut out = Vec::new();
    walk(&doc.children, &mut Vec::new(), start, end, &mut out);
    out
}

/// Narrows `entries` (in document order) according to `mode`.
pub fn filter_mode<T>(entries: Vec<(Path, T)>, mode: MatchMode) -> Vec<(Path, T)> {
    match mode {
        MatchMode::All => entries,
        MatchMode::Highest => {
            let paths: Vec<Path> = entries.iter().map(|(p, _)| p.clone()).collect();
            entries
                .into_iter()
                .filter(|(p, _)| !paths.iter().any(|other| is_ancestor(other, p)))
                .collect()
        }
        MatchMode::Lowest => {
            let paths: Vec<Path> = entries.iter().map(|(p, _)| p.clone()).collect();
            entries
                .into_iter()
                .filter(|(p, _)| !paths.iter().any(|other| is_ancestor(p, other)))
                .collect()
        }
    }
}

/// Nodes in the span of `range` that satisfy `matcher`, narrowed by `mode`.
pub fn matching_nodes<'a>(
    doc: &'a Document,
    range: &Selection,
    matcher: &dyn Fn(&Node) -> bool,
    mode: MatchMode,
) -> Vec<(Path, &'a Node)> {
    let (start, end) = range.edges();
    let matches = nodes_in_span(doc, &start.path, &end.path)
        .into_iter()
        .filter(|(_, node)| matcher(node))
        .collect();
    filter_mode(matches, mode)
}

/// Text nodes that overlap a non-empty part of `range`. For a collapsed range this is
/// the text holding the caret.
pub fn touched_texts<'a>(doc: &'a Document, range: &Selection) -> Vec<(Path, &'a TextNode)> {
    let (start, end) = range.edges();
    let collapsed = range.is_collapsed();
    texts(doc)
        .into_iter()
        .filter(|(path, text)| {
            if compare_paths(path, &start.path).is_lt() || compare_paths(path, &end.path).is_gt() {
                return false;
            }
            if collapsed {
                return true;
            }
            if *path == start.path && *path != end.path && start.offset >= text.text.len() {
                return false;
            }
            if *path == end.path && *path != start.path && end.offset == 0 {
                return false;
            }
            true
        })
        .collect()
}

/// Fails unless `point` addresses an existing text node at a valid char boundary.
pub fn resolve_point<'a>(doc: &'a Document, point: &Point) -> Result<&'a TextNode, EditError> {
    let Some(text) = text_at(doc, &point.path) else {
        return Err(EditError::InvalidSelection(format!(
            "{:?} is not a text node",
            point.path
        )));
    };
    if point.offset > text.text.len() {
        return Err(EditError::InvalidSelection(format!(
            "Offset {} is outside {:?} (len {})",
            point.offset,
            point.path,
            text.text.len()
        )));
    }
    if !text.text.is_char_boundary(point.offset) {
        return Err(EditError::InvalidSelection(format!(
            "Offset {} in {:?} is not a char boundary",
            point.offset, point.path
        )));
    }
    Ok(text)
}

pub fn resolve_range(doc: &Document, range: &Selection) -> Result<(), EditError> {
    resolve_point(doc, &range.anchor)?;
    resolve_point(doc, &range.focus)?;
    Ok(())
}

/// Pulls the end of a range that starts at a text start and ends at the very start of
/// a later block back to the end of the preceding text.
pub fn unhang(doc: &Document, range: &Selection) -> Selection {
    let (start, end) = range.edges();
    if range.is_collapsed()
        || start.offset != 0
        || end.offset != 0
        || end.path.last().copied().unwrap_or(0) != 0
    {
        return Selection::new(start, end);
    }
    match previous_text(doc, &end.path) {
        Some((path, text)) if compare_paths(&path, &start.path).is_ge() => {
            Selection::new(start, Point::new(path, text.text.len()))
        }
        _ => Selection::new(start, end),
    }
}

pub fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

/// Offset of `(child_ix, offset)` within the concatenated text of `children`.
pub fn point_global_offset(children: &[Node], child_ix: usize, offset: usize) -> usize {
    let mut global = 0usize;
    for (ix, node) in children.iter().enumerate() {
        let Node::Text(t) = node else {
            continue;
        };
        if ix < child_ix {
            global += t.text.len();
            continue;
        }
        if ix == child_ix {
            global += clamp_to_char_boundary(&t.text, offset);
        }
        break;
    }
    global
}

/// Inverse of [`point_global_offset`]: the point inside `block_path` at `global_offset`.
/// An offset on a boundary between two texts resolves to the end of the left one.
pub fn point_for_global_offset(block_path: &[usize], children: &[Node], global_offset: usize) -> Point {
    let mut remaining = global_offset;
    let mut last_text = None;
    for (child_ix, node) in children.iter().enumerate() {
        let Node::Text(t) = node else {
            continue;
        };
        last_text = Some((child_ix, t.text.len()));
        if remaining <= t.text.len() {
            let mut path = block_path.to_vec();
            path.push(child_ix);
            return Point::new(path, clamp_to_char_boundary(&t.text, remaining));
        }
        remaining -= t.text.len();
    }

    let mut path = block_path.to_vec();
    match last_text {
        Some((child_ix, len)) => {
            path.push(child_ix);
            Point::new(path, len)
        }
        None => {
            path.push(0);
            Point::new(path, 0)
        }
    }
}

pub fn first_text_point(doc: &Document) -> Option<Point> {
    texts(doc).into_iter().next().map(|(p, _)| Point::new(p, 0))
}

/// Resolves `point` to the nearest existing text position, clamping out-of-range
/// indices and offsets along the way.
pub fn normalize_point_to_existing_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() || doc.children.is_empty() {
        return None;
    }

    let mut resolved_path: Path = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved_path.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                return Some(Point::new(
                    resolved_path,
                    clamp_to_char_boundary(&t.text, point.offset),
                ));
            }
            Node::Element(el) => children = &el.children,
        }
    }

    start_of(doc, &resolved_path)
}
