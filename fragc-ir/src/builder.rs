//! IR Builder
//!
//! Provides utilities for constructing function bodies. Blocks may be
//! created ahead of time and placed later so that structured constructs can
//! reference their merge and continue targets before emitting into them.

use crate::blocks::BasicBlock;
use crate::error::IrError;
use crate::function::IrFunction;
use crate::instructions::{Op, OpCode};
use crate::types::TypeRef;
use crate::values::{BlockId, Operand, ValueId};

pub struct FunctionBuilder {
    function: IrFunction,
    current_block: Option<BlockId>,
}

impl FunctionBuilder {
    pub fn new(function: IrFunction) -> Self {
        Self {
            function,
            current_block: None,
        }
    }

    pub fn function(&self) -> &IrFunction {
        &self.function
    }

    pub fn finish(self) -> IrFunction {
        self.function
    }

    pub fn add_parameter(&mut self, name: &str, ty: TypeRef) -> ValueId {
        self.function.add_parameter(name, ty)
    }

    /// Allocates a block that is not yet part of the emission order
    pub fn create_block(&mut self, name: &str) -> BlockId {
        self.function.allocate_block(name)
    }

    pub fn push_block(&mut self, id: BlockId) {
        self.function.place_block(id);
    }

    pub fn create_and_push_block(&mut self, name: &str) -> BlockId {
        let id = self.create_block(name);
        self.push_block(id);
        id
    }

    pub fn set_current_block(&mut self, id: BlockId) {
        self.current_block = Some(id);
    }

    pub fn current_block(&self) -> Result<BlockId, IrError> {
        self.current_block.ok_or(IrError::NoCurrentBlock)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Result<&mut BasicBlock, IrError> {
        self.function.block_mut(id).ok_or(IrError::UnknownBlock(id))
    }

    pub fn current_block_mut(&mut self) -> Result<&mut BasicBlock, IrError> {
        let id = self.current_block()?;
        self.block_mut(id)
    }

    pub fn current_has_terminator(&self) -> bool {
        self.current_block
            .and_then(|id| self.function.block(id))
            .is_some_and(BasicBlock::has_terminator)
    }

    /// Appends an op to the current block. A result id is allocated when
    /// the op has a result type.
    pub fn build(
        &mut self,
        opcode: OpCode,
        result_type: Option<TypeRef>,
        operands: Vec<Operand>,
    ) -> Result<Option<ValueId>, IrError> {
        let result = result_type.map(|_| self.function.new_value());
        let op = Op::new(opcode, result, result_type, operands);
        self.current_block_mut()?.add_op(op);
        Ok(result)
    }

    pub fn build_value(&mut self, opcode: OpCode, result_type: TypeRef, operands: Vec<Operand>) -> Result<ValueId, IrError> {
        let result = self.function.new_value();
        let op = Op::new(opcode, Some(result), Some(result_type), operands);
        self.current_block_mut()?.add_op(op);
        Ok(result)
    }

    /// Declares a function-local variable in the entry block
    pub fn build_variable(&mut self, pointer_type: TypeRef, name: &str) -> Result<ValueId, IrError> {
        let entry = self.function.entry_block_id().ok_or(IrError::NoCurrentBlock)?;
        let result = self.function.new_value();
        let op = Op::new(OpCode::Variable, Some(result), Some(pointer_type), Vec::new()).with_debug_name(name);
        self.block_mut(entry)?.add_local_variable(op);
        Ok(result)
    }

    pub fn build_load(&mut self, value_type: TypeRef, pointer: Operand) -> Result<ValueId, IrError> {
        self.build_value(OpCode::Load, value_type, vec![pointer])
    }

    pub fn build_store(&mut self, pointer: Operand, value: Operand) -> Result<(), IrError> {
        self.build(OpCode::Store, None, vec![pointer, value])?;
        Ok(())
    }

    pub fn build_branch(&mut self, target: BlockId) -> Result<(), IrError> {
        self.build(OpCode::Branch, None, vec![Operand::Block(target)])?;
        Ok(())
    }

    pub fn build_branch_conditional(
        &mut self,
        condition: Operand,
        if_true: BlockId,
        if_false: BlockId,
    ) -> Result<(), IrError> {
        self.build(
            OpCode::BranchConditional,
            None,
            vec![condition, Operand::Block(if_true), Operand::Block(if_false)],
        )?;
        Ok(())
    }

    pub fn build_return(&mut self, value: Option<Operand>) -> Result<(), IrError> {
        match value {
            Some(value) => self.build(OpCode::ReturnValue, None, vec![value])?,
            None => self.build(OpCode::Return, None, Vec::new())?,
        };
        Ok(())
    }
}
