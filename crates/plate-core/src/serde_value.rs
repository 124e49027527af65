use serde::{Deserialize, Serialize};

use crate::core::{Document, Editor, Selection};
use crate::error::EditError;
use crate::plugin::PluginRegistry;

const DEFAULT_SCHEMA: &str = "plate-richtext";
const DEFAULT_VERSION: u32 = 1;

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_version() -> u32 {
    DEFAULT_VERSION
}

/// JSON envelope for a document and, optionally, the selection it was saved with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateValue {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub document: Document,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Selection>,
}

impl PlateValue {
    pub fn from_document(document: Document) -> Self {
        Self {
            schema: default_schema(),
            version: default_version(),
            document,
            selection: None,
        }
    }

    pub fn from_editor(editor: &Editor) -> Self {
        Self {
            selection: editor.selection().cloned(),
            ..Self::from_document(editor.doc().clone())
        }
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    /// Opens the value in a new editor session. The document is normalized on the way in.
    pub fn into_editor(self, registry: PluginRegistry) -> Result<Editor, EditError> {
        if self.schema != DEFAULT_SCHEMA {
            return Err(EditError::Serialization(format!(
                "Unsupported schema: {}",
                self.schema
            )));
        }
        Ok(Editor::new(self.document, self.selection, registry))
    }

    pub fn to_json_pretty(&self) -> Result<String, EditError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, EditError> {
        Ok(serde_json::from_str(s)?)
    }
}
