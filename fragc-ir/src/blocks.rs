//! Basic Block Management
//!
//! A basic block is a straight-line op sequence ending in one terminator.
//! Structured control flow is described by the block type together with the
//! merge and continue points; these are metadata only and never own blocks.

use crate::instructions::Op;
use crate::values::BlockId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlockType {
    #[default]
    Direct,
    /// Header of an if/else or short-circuit selection
    Selection,
    /// Header of a loop
    Loop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub name: String,
    pub block_type: BlockType,
    pub merge_point: Option<BlockId>,
    pub continue_point: Option<BlockId>,
    /// `OpVariable` declarations; only populated on the entry block
    pub local_variables: Vec<Op>,
    pub ops: Vec<Op>,
}

impl BasicBlock {
    pub fn new(id: BlockId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            block_type: BlockType::Direct,
            merge_point: None,
            continue_point: None,
            local_variables: Vec::new(),
            ops: Vec::new(),
        }
    }

    pub fn add_op(&mut self, op: Op) {
        self.ops.push(op);
    }

    pub fn add_local_variable(&mut self, op: Op) {
        self.local_variables.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.local_variables.is_empty()
    }

    pub fn op_count(&self) -> usize {
        self.ops.len() + self.local_variables.len()
    }

    pub fn has_terminator(&self) -> bool {
        self.ops.iter().any(Op::is_terminator)
    }

    /// The final op, if it is a terminator
    pub fn terminator(&self) -> Option<&Op> {
        self.ops.last().filter(|op| op.is_terminator())
    }

    /// Exactly one terminator, and it is the last op
    pub fn is_well_formed(&self) -> bool {
        self.ops.iter().filter(|op| op.is_terminator()).count() == 1 && self.terminator().is_some()
    }

    /// Drops any ops after the first terminator. Returns true if the block
    /// has a terminator afterwards.
    pub fn truncate_after_terminator(&mut self) -> bool {
        match self.ops.iter().position(Op::is_terminator) {
            Some(index) => {
                self.ops.truncate(index + 1);
                true
            }
            None => false,
        }
    }

    pub fn mark_selection(&mut self, merge: BlockId) {
        self.block_type = BlockType::Selection;
        self.merge_point = Some(merge);
    }

    pub fn mark_loop(&mut self, merge: BlockId, continue_target: BlockId) {
        self.block_type = BlockType::Loop;
        self.merge_point = Some(merge);
        self.continue_point = Some(continue_target);
    }
}
