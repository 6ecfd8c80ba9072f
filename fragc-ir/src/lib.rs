//! Typed basic-block IR for shader fragments
//!
//! This crate defines the IR produced by the fragment translator and
//! consumed by a binary shader emitter. It is designed to be built once
//! per library in a single pass and then shared read-only.
//!
//! ## Architecture
//!
//! - `types` - Type registry and the uniform-buffer layout engine
//! - `values` - Arena ids and operands
//! - `instructions` - Opcodes and ops
//! - `blocks` - Basic blocks with structured control flow metadata
//! - `function` - Function definitions
//! - `library` - Library (types, functions, constants, dependencies)
//! - `resolvers` - Operator and intrinsic dispatch tables
//! - `builder` - IR construction utilities
//! - `eval` - Reference interpreter for lowered IR
//! - `printer` - Text listing

pub use self::blocks::{BasicBlock, BlockType};
pub use self::builder::FunctionBuilder;
pub use self::error::IrError;
pub use self::eval::{EvalError, Evaluator, RuntimeValue};
pub use self::function::{IrFunction, Parameter};
pub use self::instructions::{Op, OpCode};
pub use self::library::{Constant, FieldMeta, Library, TypeMeta};
pub use self::printer::LibraryPrinter;
pub use self::resolvers::{
    BinaryOperatorKey, BinaryResolver, CastResolver, IntrinsicKey, IntrinsicResolver, ResolverRegistry,
    ShortCircuit, TypeCastKey, UnaryOperatorKey, UnaryResolver,
};
pub use self::types::{BaseKind, IrType, Layout, TypeRef, TypeRegistry};
pub use self::values::{BlockId, ConstantId, FunctionRef, LibraryId, Operand, ValueId};

mod blocks;
mod builder;
mod error;
pub mod eval;
mod function;
mod instructions;
mod library;
mod printer;
mod resolvers;
mod types;
mod values;

#[cfg(test)]
mod tests;
