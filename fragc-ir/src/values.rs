//! Arena identifiers and op operands

use serde::{Deserialize, Serialize};
use std::fmt;

/// SSA result id, unique within one function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

/// Basic block id, unique within one function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// Index into a library's constant table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstantId(pub u32);

/// Process-unique library identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LibraryId(pub u32);

/// A function in some library's owned-function arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionRef {
    pub library: LibraryId,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    Value(ValueId),
    Constant(ConstantId),
    Block(BlockId),
    Function(FunctionRef),
}

impl Operand {
    pub fn as_value(&self) -> Option<ValueId> {
        match self {
            Operand::Value(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<BlockId> {
        match self {
            Operand::Block(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<ValueId> for Operand {
    fn from(id: ValueId) -> Self {
        Operand::Value(id)
    }
}

impl From<ConstantId> for Operand {
    fn from(id: ConstantId) -> Self {
        Operand::Constant(id)
    }
}

impl From<BlockId> for Operand {
    fn from(id: BlockId) -> Self {
        Operand::Block(id)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

impl fmt::Display for ConstantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lib{}", self.0)
    }
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}.{}", self.library, self.index)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(id) => write!(f, "{}", id),
            Operand::Constant(id) => write!(f, "{}", id),
            Operand::Block(id) => write!(f, "{}", id),
            Operand::Function(func) => write!(f, "{}", func),
        }
    }
}
