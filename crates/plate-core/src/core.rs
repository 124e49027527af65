use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::EditorConfig;
use crate::error::EditError;
use crate::ops::{Path, Transaction, TransactionMeta};
use crate::plugin::{CommandSpec, PluginRegistry};
use crate::query;
use crate::transforms::Draft;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Document {
    /// A document holding a single empty paragraph.
    pub fn empty() -> Self {
        Self {
            children: vec![Node::paragraph("")],
        }
    }

    /// Text content of every text block, one line per block.
    pub fn plain_text(&self) -> String {
        fn walk(nodes: &[Node], lines: &mut Vec<String>) {
            for node in nodes {
                let Node::Element(el) = node else {
                    continue;
                };
                if el.is_text_block() {
                    lines.push(el.text());
                } else {
                    walk(&el.children, lines);
                }
            }
        }

        let mut lines = Vec::new();
        walk(&self.children, &mut lines);
        lines.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
}

impl Node {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::Element(ElementNode::new(
            BlockKind::Paragraph,
            vec![Node::text(text)],
        ))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks: Marks::default(),
        })
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            Node::Text(t) => Some(t),
            Node::Element(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }

    pub fn is_element(&self) -> bool {
        matches!(self, Node::Element(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Node::Element(el) if el.kind.is_list())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    Paragraph,
    HeadingOne,
    HeadingTwo,
    HeadingThree,
    BlockQuote,
    BulletedList,
    NumberedList,
    ListItem,
}

impl BlockKind {
    pub fn is_list(self) -> bool {
        matches!(self, BlockKind::BulletedList | BlockKind::NumberedList)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::Paragraph => "paragraph",
            BlockKind::HeadingOne => "heading-one",
            BlockKind::HeadingTwo => "heading-two",
            BlockKind::HeadingThree => "heading-three",
            BlockKind::BlockQuote => "block-quote",
            BlockKind::BulletedList => "bulleted-list",
            BlockKind::NumberedList => "numbered-list",
            BlockKind::ListItem => "list-item",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Left,
    Center,
    Right,
    Justify,
}

impl Align {
    /// The value stored on an element. `Left` is the unset default and is never stored.
    pub fn stored(self) -> Option<Align> {
        match self {
            Align::Left => None,
            other => Some(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Align>,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl ElementNode {
    pub fn new(kind: BlockKind, children: Vec<Node>) -> Self {
        Self {
            kind,
            alignment: None,
            children,
        }
    }

    /// A list container. Every item is coerced into a `list-item` element so the
    /// container never holds anything else.
    pub fn list(kind: BlockKind, items: Vec<Node>) -> Self {
        debug_assert!(kind.is_list());
        let children = items
            .into_iter()
            .map(|node| match node {
                Node::Element(mut el) => {
                    el.kind = BlockKind::ListItem;
                    Node::Element(el)
                }
                Node::Text(t) => Node::Element(ElementNode::new(
                    BlockKind::ListItem,
                    vec![Node::Text(t)],
                )),
            })
            .collect();
        Self::new(kind, children)
    }

    pub fn with_alignment(mut self, alignment: Option<Align>) -> Self {
        self.alignment = alignment;
        self
    }

    /// True when the element directly holds inline text.
    pub fn is_text_block(&self) -> bool {
        self.children.iter().any(Node::is_text) || self.children.is_empty()
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(&t.text),
                Node::Element(el) => out.push_str(&el.text()),
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

impl TextNode {
    pub fn new(text: impl Into<String>, marks: Marks) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkFormat {
    Bold,
    Italic,
    Underline,
    Code,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarMark {
    FontFamily,
    Color,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Marks {
    pub fn get(&self, format: MarkFormat) -> bool {
        match format {
            MarkFormat::Bold => self.bold,
            MarkFormat::Italic => self.italic,
            MarkFormat::Underline => self.underline,
            MarkFormat::Code => self.code,
        }
    }

    pub fn set(&mut self, format: MarkFormat, value: bool) {
        match format {
            MarkFormat::Bold => self.bold = value,
            MarkFormat::Italic => self.italic = value,
            MarkFormat::Underline => self.underline = value,
            MarkFormat::Code => self.code = value,
        }
    }

    pub fn scalar(&self, mark: ScalarMark) -> Option<&str> {
        match mark {
            ScalarMark::FontFamily => self.font_family.as_deref(),
            ScalarMark::Color => self.color.as_deref(),
        }
    }

    pub fn set_scalar(&mut self, mark: ScalarMark, value: Option<String>) {
        match mark {
            ScalarMark::FontFamily => self.font_family = value,
            ScalarMark::Color => self.color = value,
        }
    }
}

/// A single settable property of a node.
///
/// `Kind` and `Align` target elements; the rest target text nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "property", content = "value", rename_all = "snake_case")]
pub enum Property {
    Kind(BlockKind),
    Align(Option<Align>),
    Mark(MarkFormat, bool),
    Scalar(ScalarMark, Option<String>),
}

impl Property {
    pub fn applies_to(&self, node: &Node) -> bool {
        match self {
            Property::Kind(_) | Property::Align(_) => node.is_element(),
            Property::Mark(..) | Property::Scalar(..) => node.is_text(),
        }
    }

    /// The current value of this property on `node`, or `None` if it does not apply.
    pub fn read(&self, node: &Node) -> Option<Property> {
        match (self, node) {
            (Property::Kind(_), Node::Element(el)) => Some(Property::Kind(el.kind)),
            (Property::Align(_), Node::Element(el)) => Some(Property::Align(el.alignment)),
            (Property::Mark(format, _), Node::Text(t)) => {
                Some(Property::Mark(*format, t.marks.get(*format)))
            }
            (Property::Scalar(mark, _), Node::Text(t)) => Some(Property::Scalar(
                *mark,
                t.marks.scalar(*mark).map(str::to_string),
            )),
            _ => None,
        }
    }

    pub fn write(&self, node: &mut Node) -> Result<(), EditError> {
        match (self, node) {
            (Property::Kind(kind), Node::Element(el)) => el.kind = *kind,
            (Property::Align(align), Node::Element(el)) => {
                el.alignment = align.and_then(Align::stored)
            }
            (Property::Mark(format, value), Node::Text(t)) => t.marks.set(*format, *value),
            (Property::Scalar(mark, value), Node::Text(t)) => {
                t.marks.set_scalar(*mark, value.clone())
            }
            (prop, _) => {
                return Err(EditError::InvalidOperation(format!(
                    "Property {prop:?} does not apply to this node"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn is_backward(&self) -> bool {
        query::compare_points(&self.anchor, &self.focus).is_gt()
    }

    /// `(start, end)` in document order.
    pub fn edges(&self) -> (Point, Point) {
        if self.is_backward() {
            (self.focus.clone(), self.anchor.clone())
        } else {
            (self.anchor.clone(), self.focus.clone())
        }
    }
}

type ChangeListener = Box<dyn Fn(&Transaction) + Send + Sync>;

/// An editing session: the document, the selection, and the services acting on them.
pub struct Editor {
    doc: Document,
    selection: Option<Selection>,
    pending_marks: Option<Marks>,
    registry: PluginRegistry,
    config: EditorConfig,
    listeners: Vec<ChangeListener>,
    version: u64,
}

impl Editor {
    pub fn new(doc: Document, selection: Option<Selection>, registry: PluginRegistry) -> Self {
        Self::with_config(doc, selection, registry, EditorConfig::default())
    }

    pub fn with_config(
        doc: Document,
        selection: Option<Selection>,
        registry: PluginRegistry,
        config: EditorConfig,
    ) -> Self {
        let mut editor = Self {
            doc,
            selection,
            pending_marks: None,
            registry,
            config: config.with_defaults(),
            listeners: Vec::new(),
            version: 0,
        };
        editor.normalize_in_place();
        editor
    }

    pub fn with_core_plugins() -> Self {
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        Self::new(Document::empty(), Some(selection), PluginRegistry::core())
    }

    pub fn with_richtext_plugins() -> Self {
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        Self::new(Document::empty(), Some(selection), PluginRegistry::richtext())
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Replaces the selection as reported by the host. Stored as given; operations
    /// validate it when they resolve it.
    pub fn set_selection(&mut self, selection: Option<Selection>) {
        if selection != self.selection {
            self.pending_marks = None;
        }
        self.selection = selection;
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Incremented once per committed transaction.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn pending_marks(&self) -> Option<&Marks> {
        self.pending_marks.as_ref()
    }

    pub(crate) fn set_pending_marks(&mut self, marks: Option<Marks>) {
        self.pending_marks = marks;
    }

    pub fn on_change(&mut self, listener: impl Fn(&Transaction) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Runs `f` against a staged copy of the document and commits the result only if
    /// `f` and normalization both succeed.
    pub fn transact<T>(
        &mut self,
        source: impl Into<String>,
        f: impl FnOnce(&mut Draft) -> Result<T, EditError>,
    ) -> Result<T, EditError> {
        let source = source.into();
        let mut draft = Draft::new(self.doc.clone(), self.selection.clone());
        let out = f(&mut draft)?;
        self.normalize_draft(&mut draft)?;
        self.commit(draft, source);
        Ok(out)
    }

    pub fn apply(&mut self, tx: Transaction) -> Result<(), EditError> {
        let Transaction {
            ops,
            selection_after,
            meta,
        } = tx;
        let source = meta.source.unwrap_or_else(|| "apply".to_string());
        self.transact(source, |draft| {
            for op in ops {
                draft.apply(op)?;
            }
            if let Some(sel) = selection_after {
                draft.select(sel);
            }
            Ok(())
        })
    }

    pub fn run_command(&mut self, id: &str, args: Option<Value>) -> Result<(), EditError> {
        let Some(command) = self.registry.command(id) else {
            return Err(EditError::UnknownCommand(id.to_string()));
        };
        (command.handler)(self, args)
    }

    pub fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, EditError> {
        let Some(query) = self.registry.query(id) else {
            return Err(EditError::UnknownQuery(id.to_string()));
        };
        (query.handler)(self, args)
    }

    pub fn run_query<T>(&self, id: &str, args: Option<Value>) -> Result<T, EditError>
    where
        T: DeserializeOwned,
    {
        let value = self.run_query_json(id, args)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        self.registry.commands()
    }

    fn normalize_in_place(&mut self) {
        let mut draft = Draft::new(self.doc.clone(), self.selection.clone());
        if self.normalize_draft(&mut draft).is_ok() {
            let (doc, selection, _) = draft.into_parts();
            self.doc = doc;
            self.selection = selection;
        }
        self.selection = self
            .selection
            .as_ref()
            .map(|sel| self.registry.normalize_selection(&self.doc, sel));
    }

    fn normalize_draft(&self, draft: &mut Draft) -> Result<(), EditError> {
        let max = self.config.max_normalize_iterations;
        for iteration in 0..max {
            let ops = self.registry.normalize(draft.doc());
            if ops.is_empty() {
                return Ok(());
            }
            trace!(iteration, ops = ops.len(), "normalizing draft");
            for op in ops {
                draft.apply(op)?;
            }
        }
        Err(EditError::NormalizeDidNotConverge(max))
    }

    fn commit(&mut self, draft: Draft, source: String) {
        let (doc, selection, ops) = draft.into_parts();
        let selection = selection
            .as_ref()
            .map(|sel| self.registry.normalize_selection(&doc, sel));

        let selection_changed = selection != self.selection;
        if ops.is_empty() && !selection_changed {
            return;
        }
        if selection_changed {
            self.pending_marks = None;
        }

        self.doc = doc;
        self.selection = selection;
        self.version += 1;

        let tx = Transaction {
            ops,
            selection_after: self.selection.clone(),
            meta: TransactionMeta {
                source: Some(source),
            },
        };
        debug!(
            source = tx.meta.source.as_deref().unwrap_or_default(),
            ops = tx.ops.len(),
            version = self.version,
            "committed transaction"
        );
        for listener in &self.listeners {
            listener(&tx);
        }
    }
}
