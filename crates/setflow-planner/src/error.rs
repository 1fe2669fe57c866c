//! Planner errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("parse error at byte {pos}: {msg}")]
    Parse { pos: usize, msg: String },

    #[error("unknown relation '{0}'")]
    UnknownRelation(String),

    /// Operand headers cannot be unified (column count or type differs).
    #[error("header mismatch: {0}")]
    HeaderMismatch(String),

    #[error("invalid query document: {0}")]
    Document(String),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PlanError {
    pub(crate) fn parse(pos: usize, msg: impl Into<String>) -> Self {
        PlanError::Parse {
            pos,
            msg: msg.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;
