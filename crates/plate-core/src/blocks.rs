use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::core::{BlockKind, Editor, ElementNode, Node, Property};
use crate::error::EditError;
use crate::plugin::{CommandSpec, PlatePlugin, QuerySpec, parse_args};
use crate::query::{self, MatchMode};
use crate::transforms::{SetNodesOptions, UnwrapOptions, WrapOptions};

impl Editor {
    /// True when an element of `kind` lies in the selection span, list containers
    /// included.
    pub fn is_block_active(&self, kind: BlockKind) -> bool {
        let Some(sel) = self.selection() else {
            return false;
        };
        if query::resolve_range(self.doc(), sel).is_err() {
            return false;
        }
        let range = query::unhang(self.doc(), sel);
        let is_kind = |node: &Node| matches!(node, Node::Element(el) if el.kind == kind);
        !query::matching_nodes(self.doc(), &range, &is_kind, MatchMode::All).is_empty()
    }

    /// Switches the selected blocks to `kind`, or back to paragraphs when they already
    /// are. Any enclosing list is flattened first so lists never nest or mix.
    ///
    /// `list-item` is not a target; toggle one of the list kinds instead.
    pub fn toggle_block(&mut self, kind: BlockKind) -> Result<(), EditError> {
        if kind == BlockKind::ListItem {
            return Err(EditError::invalid_args(
                "block.toggle",
                "list-item only exists inside a list; toggle bulleted-list or numbered-list",
            ));
        }
        let Some(sel) = self.selection().cloned() else {
            return Ok(());
        };
        query::resolve_range(self.doc(), &sel)?;
        let active = self.is_block_active(kind);
        let target = if active {
            BlockKind::Paragraph
        } else if kind.is_list() {
            BlockKind::ListItem
        } else {
            kind
        };
        debug!(kind = kind.as_str(), active, "toggling block");

        self.transact("block.toggle", |draft| {
            draft.unwrap_nodes(
                &Node::is_list,
                UnwrapOptions {
                    split: true,
                    ..Default::default()
                },
            )?;
            draft.set_nodes(
                &[Property::Kind(target)],
                &Node::is_element,
                SetNodesOptions::default(),
            )?;
            if !active && kind.is_list() {
                draft.wrap_nodes(ElementNode::list(kind, Vec::new()), WrapOptions::default())?;
            }
            Ok(())
        })
    }
}

pub(crate) struct BlockPlugin;

#[derive(Deserialize)]
struct KindArgs {
    kind: BlockKind,
}

impl PlatePlugin for BlockPlugin {
    fn id(&self) -> &'static str {
        "block"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("block.toggle", "Toggle block type", |editor, args| {
                let args: KindArgs = parse_args("block.toggle", args)?;
                editor.toggle_block(args.kind)
            })
            .description("Turn the selected blocks into headings, quotes or lists, or back into paragraphs.")
            .keywords(["heading", "quote", "list", "bulleted", "numbered", "paragraph"])
            .args_example(json!({ "kind": "bulleted-list" })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("block.is_active", |editor, args| {
            let args: KindArgs = parse_args("block.is_active", args)?;
            Ok(json!(editor.is_block_active(args.kind)))
        })]
    }
}
