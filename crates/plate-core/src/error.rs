use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Selection does not resolve to a text node: {0}")]
    InvalidSelection(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Normalization did not converge after {0} iterations")]
    NormalizeDidNotConverge(usize),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Unknown query: {0}")]
    UnknownQuery(String),

    #[error("Invalid arguments for {id}: {message}")]
    InvalidArgs { id: String, message: String },

    #[error("Duplicate registration: {0}")]
    DuplicateId(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EditError {
    pub fn invalid_args(id: impl Into<String>, message: impl Into<String>) -> Self {
        EditError::InvalidArgs {
            id: id.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for EditError {
    fn from(value: serde_json::Error) -> Self {
        EditError::Serialization(value.to_string())
    }
}
