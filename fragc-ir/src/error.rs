//! IR construction errors

use crate::values::{BlockId, FunctionRef};
use fragc_common::{SourceLocation, TranslationError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IrError {
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Duplicate member '{member}' on type '{owner}'")]
    DuplicateMember { owner: String, member: String },

    #[error("Duplicate resolver registered for {0}")]
    DuplicateResolver(String),

    #[error("Unknown block {0}")]
    UnknownBlock(BlockId),

    #[error("Unknown function {0}")]
    UnknownFunction(FunctionRef),

    #[error("No current block to emit into")]
    NoCurrentBlock,
}

impl IrError {
    pub fn unsupported(message: impl Into<String>) -> Self {
        IrError::UnsupportedOperation(message.into())
    }

    /// Attach a source location, turning the failure into a translation error
    pub fn at(self, location: &SourceLocation) -> TranslationError {
        match self {
            IrError::UnsupportedOperation(message) => TranslationError::unsupported(message, location.clone()),
            other => TranslationError::unsupported(other.to_string(), location.clone()),
        }
    }
}
