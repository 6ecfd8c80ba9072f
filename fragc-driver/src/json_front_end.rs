//! Front end reading serialized syntax trees
//!
//! Each code entry holds one JSON encoded `SyntaxTree`; the entries are
//! merged in order into the tree that gets translated.

use crate::host::InitializerHost;
use crate::project::{CodeEntry, FrontEnd, FrontEndOutput};
use fragc_common::{CompilerError, SourceLocation};
use fragc_frontend::SyntaxTree;
use fragc_ir::Library;
use log::debug;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct JsonFrontEnd;

impl JsonFrontEnd {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_entry(entry: &CodeEntry) -> Result<SyntaxTree, CompilerError> {
        serde_json::from_str(&entry.code).map_err(|err| {
            let location = SourceLocation::new(&entry.location, err.line() as u32, err.column() as u32);
            CompilerError::source_compilation(err.to_string(), location)
        })
    }
}

impl FrontEnd for JsonFrontEnd {
    fn compile(&mut self, entries: &[CodeEntry], _dependencies: &[Arc<Library>]) -> Result<FrontEndOutput, CompilerError> {
        let mut tree = SyntaxTree::default();
        for entry in entries {
            let parsed = Self::parse_entry(entry)?;
            debug!("{}: {} classes", entry.location, parsed.classes.len());
            tree.merge(parsed);
        }

        Ok(FrontEndOutput {
            tree,
            host: Box::new(InitializerHost::new()),
        })
    }
}
