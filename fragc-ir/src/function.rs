//! Function Definitions

use crate::blocks::BasicBlock;
use crate::instructions::{Op, OpCode};
use crate::types::TypeRef;
use crate::values::{BlockId, Operand, ValueId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: ValueId,
    pub ty: TypeRef,
    pub name: String,
}

/// A function owned by a library.
///
/// Blocks are stored by id; `order` is the emission order, which is the
/// order a binary emitter walks them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrFunction {
    pub name: String,
    pub owner: TypeRef,
    pub function_type: TypeRef,
    pub parameters: Vec<Parameter>,
    blocks: Vec<BasicBlock>,
    order: Vec<BlockId>,
    next_value: u32,
}

impl IrFunction {
    pub fn new(name: &str, owner: TypeRef, function_type: TypeRef) -> Self {
        Self {
            name: name.to_string(),
            owner,
            function_type,
            parameters: Vec::new(),
            blocks: Vec::new(),
            order: Vec::new(),
            next_value: 0,
        }
    }

    /// A copy of the signature with no parameters bound and no body
    pub fn shell(&self) -> Self {
        Self::new(&self.name, self.owner, self.function_type)
    }

    pub fn new_value(&mut self) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        id
    }

    pub fn add_parameter(&mut self, name: &str, ty: TypeRef) -> ValueId {
        let id = self.new_value();
        self.parameters.push(Parameter {
            id,
            ty,
            name: name.to_string(),
        });
        id
    }

    /// Allocates a block without placing it in emission order
    pub fn allocate_block(&mut self, name: &str) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(id, name));
        id
    }

    /// Appends an allocated block to the emission order
    pub fn place_block(&mut self, id: BlockId) {
        if !self.order.contains(&id) {
            self.order.push(id);
        }
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.0 as usize)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(id.0 as usize)
    }

    /// Placed blocks in emission order
    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.order.iter().filter_map(|id| self.block(*id))
    }

    pub fn block_count(&self) -> usize {
        self.order.len()
    }

    pub fn entry_block(&self) -> Option<&BasicBlock> {
        self.order.first().and_then(|id| self.block(*id))
    }

    pub fn entry_block_id(&self) -> Option<BlockId> {
        self.order.first().copied()
    }

    /// Total ops, local variable declarations included
    pub fn op_count(&self) -> usize {
        self.blocks().map(BasicBlock::op_count).sum()
    }

    pub fn is_well_formed(&self) -> bool {
        self.blocks().all(BasicBlock::is_well_formed)
    }

    /// Ensures every placed block ends in exactly one terminator. Ops after
    /// a terminator are unreachable and dropped. A block that falls off the
    /// end returns: `Return` for void functions, otherwise `ReturnValue` of
    /// an undefined value of `return_type`.
    pub fn fix_block_terminators(&mut self, return_type: Option<TypeRef>) {
        let order = self.order.clone();
        for id in order {
            let terminated = match self.blocks.get_mut(id.0 as usize) {
                Some(block) => block.truncate_after_terminator(),
                None => continue,
            };
            if terminated {
                continue;
            }
            let ops = match return_type {
                None => vec![Op::new(OpCode::Return, None, None, Vec::new())],
                Some(ty) => {
                    let undef = self.new_value();
                    vec![
                        Op::new(OpCode::Undef, Some(undef), Some(ty), Vec::new()),
                        Op::new(OpCode::ReturnValue, None, None, vec![Operand::Value(undef)]),
                    ]
                }
            };
            if let Some(block) = self.blocks.get_mut(id.0 as usize) {
                block.ops.extend(ops);
            }
        }
    }
}
