//! Shader fragment compiler - Frontend
//!
//! This crate turns a resolved syntax tree into IR:
//! - AST: syntax tree definitions produced by the host front end
//! - Cycle detection: static rejection of recursive call graphs
//! - Core: operator, cast and intrinsic tables for builtin types
//! - Translate: IR emission, including short-circuit and bool lowering

pub mod ast;
pub mod core;
pub mod cycle_detection;
pub mod translate;

pub use ast::{
    AccessedMember, ClassNode, ConstructorNode, Expression, ExpressionKind, FunctionNode, IdGenerator, IfPart,
    IoMode, MemberAccess, MemberVariableNode, ParameterNode, Statement, StatementKind, SyntaxTree,
};
pub use self::core::{build_core_library, CORE_LIBRARY_NAME};
pub use cycle_detection::{detect_cycles, CycleDetector, SymbolKey};
pub use translate::{ShaderTranslator, Translator};
