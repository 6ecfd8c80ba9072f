//! Source location tracking for diagnostics
//!
//! Every syntax tree node carries a location so translation errors and
//! recursion call stacks can point back into the fragment source.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A location in a source file (line and column are 1-based)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    /// Create a location with filename
    pub fn new(filename: &str, line: u32, column: u32) -> Self {
        Self {
            filename: filename.to_string(),
            line,
            column,
        }
    }

    /// Create a dummy location for testing
    pub fn dummy() -> Self {
        Self::new("<unknown>", 0, 0)
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::dummy()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}
