//! Markdown-style block shortcuts.
//!
//! Typing a rule's token at the start of a block followed by a space converts the
//! block, consuming both the token and the space. Backspace at the very start of a
//! converted block turns it back into a paragraph before any text is deleted.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{BlockKind, Editor, ElementNode, Node, Property, Selection};
use crate::error::EditError;
use crate::plugin::{InputHandler, InputOutcome, PlatePlugin};
use crate::transforms::{Draft, SetNodesOptions, TextUnit, UnwrapOptions, WrapOptions};

const TRIGGER: &str = " ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoformatRule {
    /// Text between the block start and the caret, matched exactly.
    pub token: String,
    pub kind: BlockKind,
}

impl AutoformatRule {
    pub fn new(token: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            token: token.into(),
            kind,
        }
    }
}

pub fn default_rules() -> Vec<AutoformatRule> {
    vec![
        AutoformatRule::new("*", BlockKind::BulletedList),
        AutoformatRule::new("-", BlockKind::BulletedList),
        AutoformatRule::new("+", BlockKind::BulletedList),
        AutoformatRule::new("1.", BlockKind::NumberedList),
        AutoformatRule::new(">", BlockKind::BlockQuote),
        AutoformatRule::new("#", BlockKind::HeadingOne),
        AutoformatRule::new("##", BlockKind::HeadingTwo),
        AutoformatRule::new("###", BlockKind::HeadingThree),
    ]
}

pub(crate) struct AutoformatPlugin;

impl PlatePlugin for AutoformatPlugin {
    fn id(&self) -> &'static str {
        "autoformat"
    }

    fn input_handlers(&self) -> Vec<Arc<dyn InputHandler>> {
        vec![Arc::new(MarkdownShortcuts)]
    }
}

struct MarkdownShortcuts;

impl MarkdownShortcuts {
    /// The caret's text block and the range from the caret back to the block start,
    /// for a collapsed selection.
    fn caret_block(editor: &Editor) -> Option<(ElementNode, Selection)> {
        let sel = editor.selection()?;
        if !sel.is_collapsed() {
            return None;
        }
        let (block, path) = editor.nearest_block(ElementNode::is_text_block, None)?;
        let start = editor.start_of_block(&path)?;
        Some((block, Selection::new(sel.anchor.clone(), start)))
    }
}

impl InputHandler for MarkdownShortcuts {
    fn id(&self) -> &'static str {
        "autoformat.markdown_shortcuts"
    }

    fn insert_text(&self, editor: &mut Editor, text: &str) -> Result<InputOutcome, EditError> {
        let config = &editor.config().autoformat;
        if !config.enabled || text != TRIGGER {
            return Ok(InputOutcome::Pass);
        }
        let Some((_, token_range)) = Self::caret_block(editor) else {
            return Ok(InputOutcome::Pass);
        };
        let token = editor.text_between(&token_range);
        let Some(kind) = config
            .rules
            .iter()
            .find(|rule| rule.token == token)
            .map(|rule| rule.kind)
        else {
            return Ok(InputOutcome::Pass);
        };

        let applied = editor.transact("autoformat.shortcut", |draft| {
            draft.select(token_range.clone());
            draft.delete_range(&token_range)?;
            convert_block(draft, kind)
        });
        match applied {
            Ok(()) => {
                debug!(token = token.as_str(), kind = kind.as_str(), "markdown shortcut applied");
                Ok(InputOutcome::Handled)
            }
            Err(err) => {
                warn!(token = token.as_str(), %err, "markdown shortcut failed, inserting text instead");
                Ok(InputOutcome::Pass)
            }
        }
    }

    fn delete_backward(&self, editor: &mut Editor, _unit: TextUnit) -> Result<InputOutcome, EditError> {
        let Some((block, token_range)) = Self::caret_block(editor) else {
            return Ok(InputOutcome::Pass);
        };
        if !token_range.is_collapsed() || block.kind == BlockKind::Paragraph {
            return Ok(InputOutcome::Pass);
        }

        editor.transact("autoformat.demote", |draft| {
            if block.kind == BlockKind::ListItem {
                draft.unwrap_nodes(
                    &Node::is_list,
                    UnwrapOptions {
                        split: true,
                        ..Default::default()
                    },
                )?;
            }
            draft.set_nodes(
                &[Property::Kind(BlockKind::Paragraph)],
                &Node::is_element,
                SetNodesOptions::default(),
            )
        })?;
        debug!(kind = block.kind.as_str(), "block demoted to paragraph");
        Ok(InputOutcome::Handled)
    }
}

/// Turns the selection's block into `kind`. List kinds become a `list-item` inside a
/// fresh list container; an enclosing list is flattened first so lists never nest.
fn convert_block(draft: &mut Draft, kind: BlockKind) -> Result<(), EditError> {
    if kind == BlockKind::ListItem {
        return Err(EditError::invalid_args(
            "autoformat.shortcut",
            "list-item is not a shortcut target",
        ));
    }
    draft.unwrap_nodes(
        &Node::is_list,
        UnwrapOptions {
            split: true,
            ..Default::default()
        },
    )?;
    let target = if kind.is_list() {
        BlockKind::ListItem
    } else {
        kind
    };
    draft.set_nodes(
        &[Property::Kind(target)],
        &Node::is_element,
        SetNodesOptions::default(),
    )?;
    if kind.is_list() {
        draft.wrap_nodes(ElementNode::list(kind, Vec::new()), WrapOptions::default())?;
    }
    Ok(())
}
