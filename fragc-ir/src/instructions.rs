//! Opcodes and ops
//!
//! Opcode names follow the SPIR-V instruction set the binary emitter targets.

use crate::types::TypeRef;
use crate::values::{BlockId, Operand, ValueId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpCode {
    Undef,
    Variable,
    Load,
    Store,
    AccessChain,
    CompositeConstruct,
    FunctionCall,
    Select,

    // Arithmetic
    FAdd,
    FSub,
    FMul,
    FDiv,
    FMod,
    FNegate,
    IAdd,
    ISub,
    IMul,
    SDiv,
    SMod,
    SNegate,
    VectorTimesScalar,
    Dot,

    // Logic and comparison
    Any,
    All,
    LogicalNot,
    LogicalEqual,
    LogicalNotEqual,
    IEqual,
    INotEqual,
    SLessThan,
    SLessThanEqual,
    SGreaterThan,
    SGreaterThanEqual,
    FOrdEqual,
    FOrdNotEqual,
    FOrdLessThan,
    FOrdLessThanEqual,
    FOrdGreaterThan,
    FOrdGreaterThanEqual,

    // Conversion
    ConvertFToS,
    ConvertSToF,
    Bitcast,

    // Control flow
    Return,
    ReturnValue,
    Branch,
    BranchConditional,
}

impl OpCode {
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            OpCode::Return | OpCode::ReturnValue | OpCode::Branch | OpCode::BranchConditional
        )
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Op{:?}", self)
    }
}

/// One IR instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Op {
    pub opcode: OpCode,
    pub result: Option<ValueId>,
    pub result_type: Option<TypeRef>,
    pub operands: Vec<Operand>,
    pub debug_name: Option<String>,
}

impl Op {
    pub fn new(opcode: OpCode, result: Option<ValueId>, result_type: Option<TypeRef>, operands: Vec<Operand>) -> Self {
        Self {
            opcode,
            result,
            result_type,
            operands,
            debug_name: None,
        }
    }

    pub fn with_debug_name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = Some(name.into());
        self
    }

    pub fn is_terminator(&self) -> bool {
        self.opcode.is_terminator()
    }

    /// Blocks this op may transfer control to
    pub fn branch_targets(&self) -> Vec<BlockId> {
        match self.opcode {
            OpCode::Branch | OpCode::BranchConditional => {
                self.operands.iter().filter_map(Operand::as_block).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = self.result {
            write!(f, "{} = ", result)?;
        }
        write!(f, "{}", self.opcode)?;
        if let Some(ty) = self.result_type {
            write!(f, " {}", ty)?;
        }
        for operand in &self.operands {
            write!(f, " {}", operand)?;
        }
        if let Some(name) = &self.debug_name {
            write!(f, " ; {}", name)?;
        }
        Ok(())
    }
}
