mod align;
mod autoformat;
mod blocks;
mod config;
mod core;
mod error;
mod marks;
mod ops;
mod plugin;
pub mod query;
mod serde_value;
mod transforms;

pub use crate::autoformat::{AutoformatRule, default_rules};
pub use crate::config::*;
pub use crate::core::*;
pub use crate::error::EditError;
pub use crate::ops::*;
pub use crate::plugin::*;
pub use crate::query::MatchMode;
pub use crate::serde_value::*;
pub use crate::transforms::*;
