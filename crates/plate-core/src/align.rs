use serde::Deserialize;
use serde_json::json;

use crate::core::{Align, Document, Editor, ElementNode, Node, Property};
use crate::error::EditError;
use crate::ops::{Op, Path};
use crate::plugin::{CommandSpec, NormalizePass, PlatePlugin, PluginRegistry, QuerySpec, parse_args};
use crate::query::{self, MatchMode};
use crate::transforms::SetNodesOptions;

impl Editor {
    /// True when any text block in the selection span has `align`. `Left` matches
    /// blocks without an alignment.
    pub fn is_text_align_active(&self, align: Align) -> bool {
        let Some(sel) = self.selection() else {
            return false;
        };
        if query::resolve_range(self.doc(), sel).is_err() {
            return false;
        }
        let range = query::unhang(self.doc(), sel);
        query::matching_nodes(self.doc(), &range, &Node::is_element, MatchMode::Lowest)
            .into_iter()
            .filter_map(|(_, node)| node.as_element())
            .any(|el| el.alignment == align.stored())
    }

    pub fn toggle_text_align(&mut self, align: Align) -> Result<(), EditError> {
        let Some(sel) = self.selection().cloned() else {
            return Ok(());
        };
        query::resolve_range(self.doc(), &sel)?;
        let value = if self.is_text_align_active(align) {
            None
        } else {
            align.stored()
        };

        self.transact("block.toggle_align", |draft| {
            draft.set_nodes(
                &[Property::Align(value)],
                &Node::is_element,
                SetNodesOptions::default(),
            )
        })
    }
}

pub(crate) struct AlignPlugin;

#[derive(Deserialize)]
struct AlignArgs {
    align: Align,
}

impl PlatePlugin for AlignPlugin {
    fn id(&self) -> &'static str {
        "align"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeAlignAttrs)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("block.toggle_align", "Toggle alignment", |editor, args| {
                let args: AlignArgs = parse_args("block.toggle_align", args)?;
                editor.toggle_text_align(args.align)
            })
            .description("Align the selected blocks, or clear the alignment when it is already set.")
            .keywords(["align", "alignment", "left", "center", "right", "justify"])
            .args_example(json!({ "align": "center" })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("block.is_align_active", |editor, args| {
            let args: AlignArgs = parse_args("block.is_align_active", args)?;
            Ok(json!(editor.is_text_align_active(args.align)))
        })]
    }
}

/// Drops a stored `left` (the unset value) and any alignment on containers that hold
/// blocks rather than text.
struct NormalizeAlignAttrs;

impl NormalizePass for NormalizeAlignAttrs {
    fn id(&self) -> &'static str {
        "block.normalize_align_attrs"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        fn walk(nodes: &[Node], path: &mut Path, ops: &mut Vec<Op>) {
            for (ix, node) in nodes.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };
                path.push(ix);
                if should_clear(el) {
                    ops.push(Op::SetNode {
                        path: path.clone(),
                        props: vec![Property::Align(None)],
                        previous: vec![Property::Align(el.alignment)],
                    });
                }
                walk(&el.children, path, ops);
                path.pop();
            }
        }

        fn should_clear(el: &ElementNode) -> bool {
            match el.alignment {
                None => false,
                Some(Align::Left) => true,
                Some(_) => !el.is_text_block(),
            }
        }

        let mut ops = Vec::new();
        walk(&doc.children, &mut Vec::new(), &mut ops);
        ops
    }
}
