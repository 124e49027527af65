use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use crate::align::AlignPlugin;
use crate::autoformat::AutoformatPlugin;
use crate::blocks::BlockPlugin;
use crate::core::{Document, Editor, ElementNode, Node, Point, Selection};
use crate::error::EditError;
use crate::marks::MarksPlugin;
use crate::ops::{Op, Path};
use crate::query;
use crate::transforms::TextUnit;

type CommandHandler = Arc<dyn Fn(&mut Editor, Option<Value>) -> Result<(), EditError> + Send + Sync>;
type QueryHandler = Arc<dyn Fn(&Editor, Option<Value>) -> Result<Value, EditError> + Send + Sync>;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub args_example: Option<Value>,
    pub hidden: bool,
    pub handler: CommandHandler,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Editor, Option<Value>) -> Result<(), EditError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            args_example: None,
            hidden: false,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn args_example(mut self, args_example: Value) -> Self {
        self.args_example = Some(args_example);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: QueryHandler,
}

impl QuerySpec {
    pub fn new(
        id: impl Into<String>,
        handler: impl Fn(&Editor, Option<Value>) -> Result<Value, EditError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            handler: Arc::new(handler),
        }
    }
}

/// Deserializes command or query arguments, reporting failures against `id`.
pub fn parse_args<T: DeserializeOwned>(id: &str, args: Option<Value>) -> Result<T, EditError> {
    let Some(args) = args else {
        return Err(EditError::invalid_args(id, "missing arguments"));
    };
    serde_json::from_value(args).map_err(|err| EditError::invalid_args(id, err.to_string()))
}

/// A normalization rule. `run` returns ops that can be applied one after another to
/// `doc`; an empty list means the document already satisfies the rule.
pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// The handler consumed the input.
    Handled,
    /// Continue with the next handler, then the ordinary behavior.
    Pass,
}

/// Intercepts user input before the editor's ordinary text handling.
pub trait InputHandler: Send + Sync {
    fn id(&self) -> &'static str;

    fn insert_text(&self, _editor: &mut Editor, _text: &str) -> Result<InputOutcome, EditError> {
        Ok(InputOutcome::Pass)
    }

    fn delete_backward(&self, _editor: &mut Editor, _unit: TextUnit) -> Result<InputOutcome, EditError> {
        Ok(InputOutcome::Pass)
    }
}

pub trait PlatePlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn input_handlers(&self) -> Vec<Arc<dyn InputHandler>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    plugin_ids: Vec<&'static str>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    input_handlers: Vec<Arc<dyn InputHandler>>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
}

impl PluginRegistry {
    pub fn new(plugins: impl IntoIterator<Item = Box<dyn PlatePlugin>>) -> Result<Self, EditError> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    /// Normalization and plain editing commands only.
    pub fn core() -> Self {
        let plugins: Vec<Box<dyn PlatePlugin>> =
            vec![Box::new(CoreNormalizePlugin), Box::new(CoreCommandsPlugin)];
        Self::new(plugins).expect("core registry must be valid")
    }

    pub fn richtext() -> Self {
        let plugins: Vec<Box<dyn PlatePlugin>> = vec![
            Box::new(CoreNormalizePlugin),
            Box::new(CoreCommandsPlugin),
            Box::new(MarksPlugin),
            Box::new(BlockPlugin),
            Box::new(AlignPlugin),
            Box::new(AutoformatPlugin),
        ];
        Self::new(plugins).expect("richtext registry must be valid")
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn PlatePlugin>) -> Result<(), EditError> {
        if self.plugin_ids.contains(&plugin.id()) {
            return Err(EditError::DuplicateId(format!("plugin {}", plugin.id())));
        }

        let commands = plugin.commands();
        for cmd in &commands {
            if self.commands.contains_key(&cmd.id) {
                return Err(EditError::DuplicateId(format!("command {}", cmd.id)));
            }
        }
        let queries = plugin.queries();
        for query in &queries {
            if self.queries.contains_key(&query.id) {
                return Err(EditError::DuplicateId(format!("query {}", query.id)));
            }
        }

        self.plugin_ids.push(plugin.id());
        self.normalize_passes.extend(plugin.normalize_passes());
        self.input_handlers.extend(plugin.input_handlers());
        self.commands
            .extend(commands.into_iter().map(|cmd| (cmd.id.clone(), cmd)));
        self.queries
            .extend(queries.into_iter().map(|query| (query.id.clone(), query)));
        Ok(())
    }

    pub fn plugin_ids(&self) -> &[&'static str] {
        &self.plugin_ids
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    /// Handlers in registration order. Returned by value so a handler can borrow the
    /// editor mutably.
    pub fn input_handlers(&self) -> Vec<Arc<dyn InputHandler>> {
        self.input_handlers.clone()
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn queries(&self) -> &HashMap<String, QuerySpec> {
        &self.queries
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }

    /// Ops from the first pass that finds something to fix. Callers apply them and ask
    /// again until nothing is returned.
    pub fn normalize(&self, doc: &Document) -> Vec<Op> {
        for pass in &self.normalize_passes {
            let ops = pass.run(doc, self);
            if !ops.is_empty() {
                trace!(pass = pass.id(), ops = ops.len(), "normalize pass produced ops");
                return ops;
            }
        }
        Vec::new()
    }

    pub fn normalize_selection(&self, doc: &Document, selection: &Selection) -> Selection {
        let fallback = query::first_text_point(doc).unwrap_or(Point::new(vec![0, 0], 0));

        let anchor = query::normalize_point_to_existing_text(doc, &selection.anchor)
            .unwrap_or_else(|| {
                query::normalize_point_to_existing_text(doc, &selection.focus)
                    .unwrap_or_else(|| fallback.clone())
            });
        let focus = query::normalize_point_to_existing_text(doc, &selection.focus)
            .unwrap_or_else(|| anchor.clone());

        Selection::new(anchor, focus)
    }
}

struct CoreNormalizePlugin;

impl PlatePlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(EnsureElementHasChild),
            Box::new(DropEmptyTexts),
            Box::new(MergeAdjacentTexts),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        if doc.children.is_empty() {
            return vec![Op::InsertNode {
                path: vec![0],
                node: Node::paragraph(""),
            }];
        }
        Vec::new()
    }
}

/// Calls `visit` for every element with its path, parents before children.
fn walk_elements(doc: &Document, mut visit: impl FnMut(&ElementNode, &[usize])) {
    fn walk(
        nodes: &[Node],
        path: &mut Path,
        visit: &mut dyn FnMut(&ElementNode, &[usize]),
    ) {
        for (ix, node) in nodes.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            path.push(ix);
            visit(el, path);
            walk(&el.children, path, visit);
            path.pop();
        }
    }

    walk(&doc.children, &mut Vec::new(), &mut visit);
}

struct EnsureElementHasChild;

impl NormalizePass for EnsureElementHasChild {
    fn id(&self) -> &'static str {
        "core.ensure_element_has_child"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        walk_elements(doc, |el, path| {
            if el.children.is_empty() {
                let mut insert_path = path.to_vec();
                insert_path.push(0);
                ops.push(Op::InsertNode {
                    path: insert_path,
                    node: Node::text(""),
                });
            }
        });
        ops
    }
}

struct DropEmptyTexts;

impl NormalizePass for DropEmptyTexts {
    fn id(&self) -> &'static str {
        "core.drop_empty_texts"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        walk_elements(doc, |el, path| {
            if el.children.len() < 2 {
                return;
            }
            let empty: Vec<usize> = el
                .children
                .iter()
                .enumerate()
                .filter(|(_, node)| matches!(node, Node::Text(t) if t.text.is_empty()))
                .map(|(ix, _)| ix)
                .collect();
            // Keep one child when every child is an empty text.
            let skip = usize::from(empty.len() == el.children.len());
            for &ix in empty.iter().skip(skip).rev() {
                let mut remove_path = path.to_vec();
                remove_path.push(ix);
                ops.push(Op::RemoveNode {
                    path: remove_path,
                    node: el.children[ix].clone(),
                });
            }
        });
        ops
    }
}

struct MergeAdjacentTexts;

impl NormalizePass for MergeAdjacentTexts {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_texts"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        walk_elements(doc, |el, path| {
            for ix in (1..el.children.len()).rev() {
                let (Node::Text(left), Node::Text(right)) = (&el.children[ix - 1], &el.children[ix])
                else {
                    continue;
                };
                if left.marks != right.marks {
                    continue;
                }
                let mut merge_path = path.to_vec();
                merge_path.push(ix);
                ops.push(Op::MergeText {
                    path: merge_path,
                    position: left.text.len(),
                });
            }
        });
        ops
    }
}

struct CoreCommandsPlugin;

#[derive(Deserialize)]
struct InsertTextArgs {
    text: String,
}

#[derive(Deserialize)]
struct DeleteArgs {
    #[serde(default)]
    unit: TextUnit,
}

impl PlatePlugin for CoreCommandsPlugin {
    fn id(&self) -> &'static str {
        "core.commands"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("core.insert_text", "Insert text", |editor, args| {
                let args: InsertTextArgs = parse_args("core.insert_text", args)?;
                editor.insert_text(&args.text)
            })
            .description("Insert text at the caret, running input shortcuts.")
            .args_example(serde_json::json!({ "text": "a" }))
            .hidden(true),
            CommandSpec::new("core.delete_backward", "Delete backward", |editor, args| {
                let unit = match args {
                    Some(args) => parse_args::<DeleteArgs>("core.delete_backward", Some(args))?.unit,
                    None => TextUnit::Character,
                };
                editor.delete_backward(unit)
            })
            .description("Delete before the caret, or the selected content.")
            .args_example(serde_json::json!({ "unit": "word" }))
            .hidden(true),
            CommandSpec::new("core.insert_break", "Insert break", |editor, _args| {
                editor.insert_break()
            })
            .description("Split the current block at the caret.")
            .keywords(["enter", "newline", "split"]),
        ]
    }
}
