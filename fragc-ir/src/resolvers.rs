//! Operator and intrinsic dispatch tables
//!
//! Every language operator, cast and intrinsic call is resolved through
//! these tables. A resolver describes how to emit the construct; the
//! translator interprets it. Keys use the language-level `TypeSpec`, so a
//! library's tables can serve any library that depends on it.

use crate::error::IrError;
use crate::instructions::OpCode;
use fragc_common::{BinaryOperator, Literal, TypeSpec, UnaryOperator};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryOperatorKey {
    pub lhs: TypeSpec,
    pub rhs: TypeSpec,
    pub op: BinaryOperator,
}

impl BinaryOperatorKey {
    pub fn new(lhs: TypeSpec, rhs: TypeSpec, op: BinaryOperator) -> Self {
        Self { lhs, rhs, op }
    }
}

impl fmt::Display for BinaryOperatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnaryOperatorKey {
    pub operand: TypeSpec,
    pub op: UnaryOperator,
}

impl UnaryOperatorKey {
    pub fn new(operand: TypeSpec, op: UnaryOperator) -> Self {
        Self { operand, op }
    }
}

impl fmt::Display for UnaryOperatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op, self.operand)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeCastKey {
    pub from: TypeSpec,
    pub to: TypeSpec,
}

impl TypeCastKey {
    pub fn new(from: TypeSpec, to: TypeSpec) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for TypeCastKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} as {}", self.from, self.to)
    }
}

/// `(owning type, name, parameter types)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntrinsicKey {
    pub owner: TypeSpec,
    pub name: String,
    pub parameters: Vec<TypeSpec>,
}

impl IntrinsicKey {
    pub fn new(owner: TypeSpec, name: &str, parameters: Vec<TypeSpec>) -> Self {
        Self {
            owner,
            name: name.to_string(),
            parameters,
        }
    }
}

impl fmt::Display for IntrinsicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.parameters.iter().map(ToString::to_string).collect();
        write!(f, "{}.{}({})", self.owner, self.name, params.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortCircuit {
    Or,
    And,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryResolver {
    /// One op over both operand values
    Instruction(OpCode),
    /// Control-flow lowering of `||` / `&&`
    ShortCircuit(ShortCircuit),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryResolver {
    Instruction(OpCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastResolver {
    Instruction(OpCode),
    /// `Select(value, one, zero)`
    FromBool { zero: Literal, one: Literal },
    /// `compare(value, zero)`
    ToBool { compare: OpCode, zero: Literal },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrinsicResolver {
    Instruction(OpCode),
    /// Returns its single argument unchanged
    Identity,
}

#[derive(Debug, Clone, Default)]
pub struct ResolverRegistry {
    binary: HashMap<BinaryOperatorKey, BinaryResolver>,
    unary: HashMap<UnaryOperatorKey, UnaryResolver>,
    casts: HashMap<TypeCastKey, CastResolver>,
    intrinsics: HashMap<IntrinsicKey, IntrinsicResolver>,
}

fn insert_or_error<K, V>(table: &mut HashMap<K, V>, key: K, value: V) -> Result<(), IrError>
where
    K: Eq + Hash + fmt::Display,
{
    if table.contains_key(&key) {
        return Err(IrError::DuplicateResolver(key.to_string()));
    }
    table.insert(key, value);
    Ok(())
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_binary(&mut self, key: BinaryOperatorKey, resolver: BinaryResolver) -> Result<(), IrError> {
        insert_or_error(&mut self.binary, key, resolver)
    }

    pub fn register_unary(&mut self, key: UnaryOperatorKey, resolver: UnaryResolver) -> Result<(), IrError> {
        insert_or_error(&mut self.unary, key, resolver)
    }

    pub fn register_cast(&mut self, key: TypeCastKey, resolver: CastResolver) -> Result<(), IrError> {
        insert_or_error(&mut self.casts, key, resolver)
    }

    pub fn register_intrinsic(&mut self, key: IntrinsicKey, resolver: IntrinsicResolver) -> Result<(), IrError> {
        insert_or_error(&mut self.intrinsics, key, resolver)
    }

    pub fn find_binary(&self, key: &BinaryOperatorKey) -> Option<BinaryResolver> {
        self.binary.get(key).copied()
    }

    pub fn find_unary(&self, key: &UnaryOperatorKey) -> Option<UnaryResolver> {
        self.unary.get(key).copied()
    }

    pub fn find_cast(&self, key: &TypeCastKey) -> Option<CastResolver> {
        self.casts.get(key).copied()
    }

    pub fn find_intrinsic(&self, key: &IntrinsicKey) -> Option<IntrinsicResolver> {
        self.intrinsics.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.binary.len() + self.unary.len() + self.casts.len() + self.intrinsics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
