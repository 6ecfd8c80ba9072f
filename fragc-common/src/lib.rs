//! Shader fragment compiler - Common Types and Utilities
//!
//! This crate contains shared types, error definitions, and utilities
//! used across all components of the fragment compiler.

pub mod error;
pub mod types;
pub mod source_loc;

pub use error::{
    CompilerError, Diagnostic, ErrorReporter, Severity, TranslationError, RECURSION_FULL_MESSAGE,
    RECURSION_SHORT_MESSAGE,
};
pub use types::*;
pub use source_loc::SourceLocation;
