use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::autoformat::{AutoformatRule, default_rules};
use crate::core::BlockKind;
use crate::error::EditError;

const DEFAULT_MAX_NORMALIZE_ITERATIONS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EditorConfig {
    /// Upper bound on normalization rounds per transaction. Zero means the default.
    pub max_normalize_iterations: usize,
    pub autoformat: AutoformatConfig,
}

impl EditorConfig {
    /// Fills zero values with defaults and drops shortcut rules the editor cannot honor.
    pub(crate) fn with_defaults(mut self) -> Self {
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = DEFAULT_MAX_NORMALIZE_ITERATIONS;
        }
        self.autoformat.rules.retain(|rule| {
            let valid = rule_error(rule).is_none();
            if !valid {
                warn!(token = rule.token.as_str(), kind = rule.kind.as_str(), "dropping autoformat rule");
            }
            valid
        });
        self
    }

    /// Parses a possibly partial JSON config; omitted fields keep their defaults.
    pub fn from_json_str(s: &str) -> Result<Self, EditError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config.with_defaults())
    }

    pub fn validate(&self) -> Result<(), EditError> {
        match self.autoformat.rules.iter().find_map(rule_error) {
            Some(message) => Err(EditError::invalid_args("autoformat.rules", message)),
            None => Ok(()),
        }
    }
}

fn rule_error(rule: &AutoformatRule) -> Option<String> {
    if rule.token.is_empty() {
        return Some("rule token must not be empty".to_string());
    }
    if rule.kind == BlockKind::ListItem {
        return Some(format!(
            "rule {:?} targets list-item; use bulleted-list or numbered-list",
            rule.token
        ));
    }
    None
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoformatConfig {
    pub enabled: bool,
    pub rules: Vec<AutoformatRule>,
}

impl Default for AutoformatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: default_rules(),
        }
    }
}
