//! Character-level formatting.
//!
//! At a collapsed caret the toggles only change the pending marks; the tree is left
//! alone until text is typed. Over a range the covered text nodes are split at the
//! range edges so only the selected slice changes.

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::core::{Editor, MarkFormat, Marks, Node, Property, ScalarMark};
use crate::error::EditError;
use crate::plugin::{CommandSpec, PlatePlugin, QuerySpec, parse_args};
use crate::query;
use crate::transforms::SetNodesOptions;

impl Editor {
    /// Marks the next inserted text receives: the pending marks, else the marks of the
    /// text under the caret (or the first text the selection covers).
    pub fn marks(&self) -> Option<Marks> {
        if let Some(pending) = self.pending_marks() {
            return Some(pending.clone());
        }
        let sel = self.selection()?;
        if sel.is_collapsed() {
            return query::text_at(self.doc(), &sel.anchor.path).map(|t| t.marks.clone());
        }
        query::touched_texts(self.doc(), sel)
            .first()
            .map(|(_, t)| t.marks.clone())
    }

    /// True when every text the selection covers carries `format`.
    pub fn is_mark_active(&self, format: MarkFormat) -> bool {
        let Some(sel) = self.selection() else {
            return false;
        };
        if sel.is_collapsed() {
            return self.marks().is_some_and(|marks| marks.get(format));
        }
        let texts = query::touched_texts(self.doc(), sel);
        !texts.is_empty() && texts.iter().all(|(_, t)| t.marks.get(format))
    }

    pub fn toggle_mark(&mut self, format: MarkFormat) -> Result<(), EditError> {
        let Some(sel) = self.selection().cloned() else {
            return Ok(());
        };
        query::resolve_range(self.doc(), &sel)?;
        let value = !self.is_mark_active(format);

        if sel.is_collapsed() {
            let mut marks = self.marks().unwrap_or_default();
            marks.set(format, value);
            debug!(?format, value, "pending mark toggled");
            self.set_pending_marks(Some(marks));
            return Ok(());
        }

        self.transact("marks.toggle", |draft| {
            draft.set_nodes(
                &[Property::Mark(format, value)],
                &Node::is_text,
                SetNodesOptions {
                    split: true,
                    ..Default::default()
                },
            )
        })
    }

    /// Overwrites a scalar mark on the selected text, or clears it with `None`.
    pub fn set_scalar_mark(&mut self, mark: ScalarMark, value: Option<String>) -> Result<(), EditError> {
        let Some(sel) = self.selection().cloned() else {
            return Ok(());
        };
        query::resolve_range(self.doc(), &sel)?;

        if sel.is_collapsed() {
            let mut marks = self.marks().unwrap_or_default();
            marks.set_scalar(mark, value);
            self.set_pending_marks(Some(marks));
            return Ok(());
        }

        self.transact("marks.set_scalar", |draft| {
            draft.set_nodes(
                &[Property::Scalar(mark, value)],
                &Node::is_text,
                SetNodesOptions {
                    split: true,
                    ..Default::default()
                },
            )
        })
    }
}

pub(crate) struct MarksPlugin;

#[derive(Deserialize)]
struct FormatArgs {
    format: MarkFormat,
}

#[derive(Deserialize)]
struct ScalarArgs {
    #[serde(default)]
    value: Option<String>,
}

impl PlatePlugin for MarksPlugin {
    fn id(&self) -> &'static str {
        "marks"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("marks.toggle", "Toggle mark", |editor, args| {
                let args: FormatArgs = parse_args("marks.toggle", args)?;
                editor.toggle_mark(args.format)
            })
            .description("Toggle bold, italic, underline or code on the selection or caret.")
            .keywords(["bold", "italic", "underline", "code", "mark"])
            .args_example(json!({ "format": "bold" })),
            CommandSpec::new("marks.set_font_family", "Set font family", |editor, args| {
                let args: ScalarArgs = parse_args("marks.set_font_family", args)?;
                editor.set_scalar_mark(ScalarMark::FontFamily, args.value)
            })
            .description("Set the font family of the selected text. A null value clears it.")
            .keywords(["font", "typeface"])
            .args_example(json!({ "value": "serif" })),
            CommandSpec::new("marks.set_color", "Set text color", |editor, args| {
                let args: ScalarArgs = parse_args("marks.set_color", args)?;
                editor.set_scalar_mark(ScalarMark::Color, args.value)
            })
            .description("Set the color of the selected text. A null value clears it.")
            .keywords(["color", "colour"])
            .args_example(json!({ "value": "#ff0000" })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("marks.get_active", |editor, _args| {
                Ok(serde_json::to_value(editor.marks().unwrap_or_default())?)
            }),
            QuerySpec::new("marks.is_active", |editor, args| {
                let args: FormatArgs = parse_args("marks.is_active", args)?;
                Ok(json!(editor.is_mark_active(args.format)))
            }),
        ]
    }
}
