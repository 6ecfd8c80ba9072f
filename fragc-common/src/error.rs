//! Error handling for the fragment compiler
//!
//! This module defines the error taxonomy shared by every compilation phase
//! and the diagnostic events handed to external tools.

use crate::source_loc::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const RECURSION_SHORT_MESSAGE: &str = "Recursion is illegal in shaders";
pub const RECURSION_FULL_MESSAGE: &str = "Object calls itself via the stack:";

/// Top level error returned by the compilation driver
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompilerError {
    /// The host front end rejected the fragment source
    #[error("Source compilation error at {location}: {message}")]
    SourceCompilation {
        location: SourceLocation,
        message: String,
    },

    /// Translation of the syntax tree failed; details were reported as diagnostics
    #[error("Translation of library '{library}' failed")]
    TranslationFailed { library: String },

    /// A broken invariant between the compiler and its collaborators
    #[error("Internal consistency error: {message}")]
    InternalConsistency { message: String },

    #[error("IO error: {message}")]
    IoError { message: String },
}

/// Recoverable errors raised while translating a syntax tree into IR
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    #[error("Recursion is illegal in shaders at {location}")]
    RecursionDetected {
        location: SourceLocation,
        call_stack: Vec<SourceLocation>,
    },

    #[error("Unsupported operation at {location}: {message}")]
    UnsupportedOperation {
        message: String,
        location: SourceLocation,
    },

    #[error("Missing dependency type '{name}' at {location}")]
    MissingDependencyType {
        name: String,
        location: SourceLocation,
    },
}

impl TranslationError {
    pub fn unsupported(message: impl Into<String>, location: SourceLocation) -> Self {
        TranslationError::UnsupportedOperation {
            message: message.into(),
            location,
        }
    }

    pub fn location(&self) -> &SourceLocation {
        match self {
            TranslationError::RecursionDetected { location, .. }
            | TranslationError::UnsupportedOperation { location, .. }
            | TranslationError::MissingDependencyType { location, .. } => location,
        }
    }
}

impl CompilerError {
    pub fn source_compilation(message: impl Into<String>, location: SourceLocation) -> Self {
        CompilerError::SourceCompilation {
            location,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CompilerError::InternalConsistency {
            message: message.into(),
        }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for CompilerError {
    fn from(err: std::io::Error) -> Self {
        CompilerError::IoError {
            message: err.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A structured diagnostic event consumed by editors and the command line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub short_message: String,
    pub full_message: String,
    pub location: SourceLocation,
    #[serde(default)]
    pub call_stack: Vec<SourceLocation>,
}

impl Diagnostic {
    pub fn error(short_message: impl Into<String>, full_message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            severity: Severity::Error,
            short_message: short_message.into(),
            full_message: full_message.into(),
            location,
            call_stack: Vec::new(),
        }
    }

    pub fn warning(message: impl Into<String>, location: SourceLocation) -> Self {
        let message = message.into();
        Self {
            severity: Severity::Warning,
            full_message: message.clone(),
            short_message: message,
            location,
            call_stack: Vec::new(),
        }
    }

    pub fn with_call_stack(mut self, call_stack: Vec<SourceLocation>) -> Self {
        self.call_stack = call_stack;
        self
    }
}

impl From<&TranslationError> for Diagnostic {
    fn from(err: &TranslationError) -> Self {
        match err {
            TranslationError::RecursionDetected { location, call_stack } => {
                Diagnostic::error(RECURSION_SHORT_MESSAGE, RECURSION_FULL_MESSAGE, location.clone())
                    .with_call_stack(call_stack.clone())
            }
            TranslationError::UnsupportedOperation { message, location } => {
                Diagnostic::error(message.clone(), message.clone(), location.clone())
            }
            TranslationError::MissingDependencyType { name, location } => Diagnostic::error(
                "Missing dependency type",
                format!("Type '{name}' was not found in this library or any of its dependencies"),
                location.clone(),
            ),
        }
    }
}

impl From<&CompilerError> for Diagnostic {
    fn from(err: &CompilerError) -> Self {
        match err {
            CompilerError::SourceCompilation { location, message } => {
                Diagnostic::error("Fragment source failed to compile", message.clone(), location.clone())
            }
            other => Diagnostic::error(other.to_string(), other.to_string(), SourceLocation::dummy()),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.severity, self.short_message)?;

        if self.full_message != self.short_message {
            write!(f, "\n  {}", self.full_message)?;
        }
        for location in &self.call_stack {
            write!(f, "\n    at {}", location)?;
        }

        Ok(())
    }
}

/// Collects diagnostics for one compile.
///
/// Unless `emit_multiple_errors` is set, only the first error is recorded.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
    emit_multiple_errors: bool,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_multiple_errors(emit_multiple_errors: bool) -> Self {
        Self {
            emit_multiple_errors,
            ..Self::default()
        }
    }

    pub fn set_emit_multiple_errors(&mut self, emit: bool) {
        self.emit_multiple_errors = emit;
    }

    pub fn emit_multiple_errors(&self) -> bool {
        self.emit_multiple_errors
    }

    /// Record a diagnostic. Returns false if it was suppressed.
    pub fn report(&mut self, diagnostic: Diagnostic) -> bool {
        match diagnostic.severity {
            Severity::Error => {
                if self.error_triggered() && !self.emit_multiple_errors {
                    return false;
                }
                self.error_count += 1;
            }
            Severity::Warning => self.warning_count += 1,
        }
        self.diagnostics.push(diagnostic);
        true
    }

    pub fn report_translation_error(&mut self, err: &TranslationError) -> bool {
        self.report(Diagnostic::from(err))
    }

    /// True once any error has been recorded
    pub fn error_triggered(&self) -> bool {
        self.error_count > 0
    }

    pub fn has_errors(&self) -> bool {
        self.error_triggered()
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.error_count = 0;
        self.warning_count = 0;
    }

    /// Print all diagnostics to stderr
    pub fn print_diagnostics(&self) {
        for diagnostic in &self.diagnostics {
            eprintln!("{}", diagnostic);
        }
    }

    pub fn summary(&self) -> String {
        match (self.error_count, self.warning_count) {
            (0, 0) => "No errors or warnings".to_string(),
            (0, w) => format!("{} warning{}", w, if w == 1 { "" } else { "s" }),
            (e, 0) => format!("{} error{}", e, if e == 1 { "" } else { "s" }),
            (e, w) => format!(
                "{} error{} and {} warning{}",
                e,
                if e == 1 { "" } else { "s" },
                w,
                if w == 1 { "" } else { "s" }
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn loc(line: u32) -> SourceLocation {
        SourceLocation::new("test.frag", line, 1)
    }

    #[test]
    fn test_only_first_error_is_recorded() {
        let mut reporter = ErrorReporter::new();
        assert!(reporter.report(Diagnostic::error("first", "first", loc(1))));
        assert!(!reporter.report(Diagnostic::error("second", "second", loc(2))));

        assert_eq!(reporter.error_count(), 1);
        assert_eq!(reporter.diagnostics()[0].short_message, "first");
    }

    #[test]
    fn test_emit_multiple_errors() {
        let mut reporter = ErrorReporter::with_multiple_errors(true);
        reporter.report(Diagnostic::error("first", "first", loc(1)));
        reporter.report(Diagnostic::error("second", "second", loc(2)));
        assert_eq!(reporter.error_count(), 2);
    }

    #[test]
    fn test_warnings_do_not_trigger_errors() {
        let mut reporter = ErrorReporter::new();
        reporter.report(Diagnostic::warning("unused", loc(3)));
        assert!(!reporter.error_triggered());
        assert!(reporter.report(Diagnostic::error("bad", "bad", loc(4))));
        assert_eq!(reporter.summary(), "1 error and 1 warning");
    }

    #[test]
    fn test_recursion_diagnostic() {
        let err = TranslationError::RecursionDetected {
            location: loc(1),
            call_stack: vec![loc(1), loc(2)],
        };
        let diag = Diagnostic::from(&err);
        assert_eq!(diag.short_message, RECURSION_SHORT_MESSAGE);
        assert_eq!(diag.full_message, RECURSION_FULL_MESSAGE);
        assert_eq!(diag.call_stack, vec![loc(1), loc(2)]);
        assert_eq!(
            diag.to_string(),
            "test.frag:1:1: error: Recursion is illegal in shaders\n  \
             Object calls itself via the stack:\n    at test.frag:1:1\n    at test.frag:2:1"
        );
    }

    #[test]
    fn test_summary() {
        let mut reporter = ErrorReporter::with_multiple_errors(true);
        assert_eq!(reporter.summary(), "No errors or warnings");

        reporter.report(Diagnostic::error("e1", "e1", loc(1)));
        assert_eq!(reporter.summary(), "1 error");

        reporter.report(Diagnostic::error("e2", "e2", loc(2)));
        assert_eq!(reporter.summary(), "2 errors");

        reporter.clear();
        assert!(!reporter.has_errors());
    }
}
