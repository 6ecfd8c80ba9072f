//! Reference interpreter for lowered IR
//!
//! Executes functions block by block so that lowered control flow can be
//! checked by running it. The evaluator records every block it enters and
//! every function it calls.

use crate::error::IrError;
use crate::function::IrFunction;
use crate::instructions::{Op, OpCode};
use crate::library::Library;
use crate::types::{BaseKind, TypeRef};
use crate::values::{BlockId, ConstantId, FunctionRef, LibraryId, Operand, ValueId};
use fragc_common::Literal;
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Blocks a single evaluation may enter before it is cut off
pub const DEFAULT_STEP_LIMIT: usize = 100_000;

/// Pointer into evaluator memory: a variable slot plus an access path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pointer {
    pub slot: usize,
    pub path: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuntimeValue {
    Bool(bool),
    Int(i32),
    Real(f32),
    Composite(Vec<RuntimeValue>),
    Pointer(Pointer),
    Undefined,
}

impl RuntimeValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RuntimeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            RuntimeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f32> {
        match self {
            RuntimeValue::Real(r) => Some(*r),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            RuntimeValue::Bool(_) => "bool",
            RuntimeValue::Int(_) => "int",
            RuntimeValue::Real(_) => "real",
            RuntimeValue::Composite(_) => "composite",
            RuntimeValue::Pointer(_) => "pointer",
            RuntimeValue::Undefined => "undefined",
        }
    }
}

impl From<Literal> for RuntimeValue {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Bool(b) => RuntimeValue::Bool(b),
            Literal::Int(i) => RuntimeValue::Int(i),
            Literal::Real(r) => RuntimeValue::Real(r),
        }
    }
}

impl fmt::Display for RuntimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeValue::Bool(b) => write!(f, "{}", b),
            RuntimeValue::Int(i) => write!(f, "{}", i),
            RuntimeValue::Real(r) => write!(f, "{:?}", r),
            RuntimeValue::Composite(values) => {
                let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
            RuntimeValue::Pointer(p) => write!(f, "&slot{}{:?}", p.slot, p.path),
            RuntimeValue::Undefined => write!(f, "undef"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Unknown function {0}")]
    UnknownFunction(FunctionRef),

    #[error("Function '{0}' has no body")]
    EmptyFunction(String),

    #[error("Unknown block {0}")]
    UnknownBlock(BlockId),

    #[error("Value {0} used before it was defined")]
    UndefinedValue(ValueId),

    #[error("Unknown constant {0}")]
    UnknownConstant(ConstantId),

    #[error("{opcode} cannot operate on {found}")]
    InvalidOperand { opcode: OpCode, found: String },

    #[error("Expected {expected} arguments, found {found}")]
    ArgumentCount { expected: usize, found: usize },

    #[error("Block {0} ended without a terminator")]
    MissingTerminator(BlockId),

    #[error("Integer division by zero")]
    DivisionByZero,

    #[error("Step limit of {0} blocks exceeded")]
    StepLimit(usize),

    #[error("Pointer does not refer to a live value")]
    InvalidPointer,

    #[error(transparent)]
    Ir(#[from] IrError),
}

fn invalid(opcode: OpCode, value: &RuntimeValue) -> EvalError {
    EvalError::InvalidOperand {
        opcode,
        found: value.kind().to_string(),
    }
}

/// Zero-initialized value of `ty` as declared in `library`
pub fn zero_value(library: &Library, ty: TypeRef) -> RuntimeValue {
    let descriptor = library.types.get(ty);
    match descriptor.base {
        BaseKind::Bool => RuntimeValue::Bool(false),
        BaseKind::Int => RuntimeValue::Int(0),
        BaseKind::Float => RuntimeValue::Real(0.0),
        BaseKind::Vector | BaseKind::Matrix | BaseKind::FixedArray => match descriptor.component_type {
            Some(component) => {
                let element = zero_value(library, component);
                RuntimeValue::Composite(vec![element; descriptor.components as usize])
            }
            None => RuntimeValue::Undefined,
        },
        BaseKind::Struct => RuntimeValue::Composite(
            descriptor
                .parameters()
                .iter()
                .map(|member| zero_value(library, *member))
                .collect(),
        ),
        _ => RuntimeValue::Undefined,
    }
}

fn find_library(library: &Library, id: LibraryId) -> Option<&Library> {
    if library.id() == id {
        return Some(library);
    }
    library.dependencies().iter().find_map(|dep| find_library(dep, id))
}

pub struct Evaluator<'a> {
    root: &'a Library,
    memory: Vec<RuntimeValue>,
    executed: Vec<(FunctionRef, BlockId)>,
    calls: Vec<FunctionRef>,
    steps: usize,
    step_limit: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(root: &'a Library) -> Self {
        Self {
            root,
            memory: Vec::new(),
            executed: Vec::new(),
            calls: Vec::new(),
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn with_step_limit(mut self, step_limit: usize) -> Self {
        self.step_limit = step_limit;
        self
    }

    /// Blocks entered so far, in execution order
    pub fn executed_blocks(&self) -> &[(FunctionRef, BlockId)] {
        &self.executed
    }

    pub fn executed_block_names(&self) -> Vec<String> {
        self.executed
            .iter()
            .filter_map(|(function, block)| {
                let library = find_library(self.root, function.library)?;
                Some(library.function(*function)?.block(*block)?.name.clone())
            })
            .collect()
    }

    pub fn calls(&self) -> &[FunctionRef] {
        &self.calls
    }

    pub fn was_called(&self, function: FunctionRef) -> bool {
        self.calls.contains(&function)
    }

    /// Places a value in memory and returns a pointer to it
    pub fn allocate(&mut self, value: RuntimeValue) -> RuntimeValue {
        self.memory.push(value);
        RuntimeValue::Pointer(Pointer {
            slot: self.memory.len() - 1,
            path: Vec::new(),
        })
    }

    pub fn read(&self, pointer: &RuntimeValue) -> Result<RuntimeValue, EvalError> {
        let RuntimeValue::Pointer(pointer) = pointer else {
            return Err(EvalError::InvalidPointer);
        };
        let mut value = self.memory.get(pointer.slot).ok_or(EvalError::InvalidPointer)?;
        for index in &pointer.path {
            value = match value {
                RuntimeValue::Composite(values) => values.get(*index as usize).ok_or(EvalError::InvalidPointer)?,
                _ => return Err(EvalError::InvalidPointer),
            };
        }
        Ok(value.clone())
    }

    fn write(&mut self, pointer: &RuntimeValue, new_value: RuntimeValue) -> Result<(), EvalError> {
        let RuntimeValue::Pointer(pointer) = pointer else {
            return Err(EvalError::InvalidPointer);
        };
        let mut value = self.memory.get_mut(pointer.slot).ok_or(EvalError::InvalidPointer)?;
        for index in &pointer.path {
            value = match value {
                RuntimeValue::Composite(values) => {
                    values.get_mut(*index as usize).ok_or(EvalError::InvalidPointer)?
                }
                _ => return Err(EvalError::InvalidPointer),
            };
        }
        *value = new_value;
        Ok(())
    }

    /// Runs `function` to completion
    pub fn call(&mut self, function: FunctionRef, args: Vec<RuntimeValue>) -> Result<Option<RuntimeValue>, EvalError> {
        let library = find_library(self.root, function.library).ok_or(EvalError::UnknownFunction(function))?;
        let body = library.function(function).ok_or(EvalError::UnknownFunction(function))?;
        trace!("eval: call {} '{}'", function, body.name);
        self.calls.push(function);

        if body.parameters.len() != args.len() {
            return Err(EvalError::ArgumentCount {
                expected: body.parameters.len(),
                found: args.len(),
            });
        }
        let mut frame: HashMap<ValueId, RuntimeValue> = HashMap::new();
        for (parameter, arg) in body.parameters.iter().zip(args) {
            frame.insert(parameter.id, arg);
        }

        let entry = body
            .entry_block()
            .ok_or_else(|| EvalError::EmptyFunction(body.name.clone()))?;
        for variable in &entry.local_variables {
            if let (Some(result), Some(ty)) = (variable.result, variable.result_type) {
                let value_type = library.types.value_type(ty);
                let pointer = self.allocate(zero_value(library, value_type));
                frame.insert(result, pointer);
            }
        }

        let mut current = entry.id;
        loop {
            self.steps += 1;
            if self.steps > self.step_limit {
                return Err(EvalError::StepLimit(self.step_limit));
            }
            self.executed.push((function, current));
            match self.run_block(library, body, current, &mut frame)? {
                Flow::Jump(next) => current = next,
                Flow::Return(value) => return Ok(value),
            }
        }
    }

    fn run_block(
        &mut self,
        library: &'a Library,
        body: &'a IrFunction,
        id: BlockId,
        frame: &mut HashMap<ValueId, RuntimeValue>,
    ) -> Result<Flow, EvalError> {
        let block = body.block(id).ok_or(EvalError::UnknownBlock(id))?;
        for op in &block.ops {
            match op.opcode {
                OpCode::Return => return Ok(Flow::Return(None)),
                OpCode::ReturnValue => {
                    let value = self.operand(library, frame, op, 0)?;
                    return Ok(Flow::Return(Some(value)));
                }
                OpCode::Branch => return Ok(Flow::Jump(block_operand(op, 0)?)),
                OpCode::BranchConditional => {
                    let condition = self.operand(library, frame, op, 0)?;
                    let taken = condition.as_bool().ok_or_else(|| invalid(op.opcode, &condition))?;
                    let target = if taken { 1 } else { 2 };
                    return Ok(Flow::Jump(block_operand(op, target)?));
                }
                _ => {
                    let value = self.execute(library, frame, op)?;
                    if let Some(result) = op.result {
                        frame.insert(result, value);
                    }
                }
            }
        }
        Err(EvalError::MissingTerminator(id))
    }

    fn operand(
        &self,
        library: &Library,
        frame: &HashMap<ValueId, RuntimeValue>,
        op: &Op,
        index: usize,
    ) -> Result<RuntimeValue, EvalError> {
        match op.operands.get(index) {
            Some(Operand::Value(id)) => frame.get(id).cloned().ok_or(EvalError::UndefinedValue(*id)),
            Some(Operand::Constant(id)) => library
                .constant_value(*id)
                .map(|constant| RuntimeValue::from(constant.value))
                .ok_or(EvalError::UnknownConstant(*id)),
            _ => Err(EvalError::InvalidOperand {
                opcode: op.opcode,
                found: format!("operand {}", index),
            }),
        }
    }

    fn execute(
        &mut self,
        library: &'a Library,
        frame: &mut HashMap<ValueId, RuntimeValue>,
        op: &Op,
    ) -> Result<RuntimeValue, EvalError> {
        let opcode = op.opcode;
        match opcode {
            OpCode::Undef => Ok(RuntimeValue::Undefined),
            OpCode::Variable => {
                let value = op
                    .result_type
                    .map(|ty| zero_value(library, library.types.value_type(ty)))
                    .unwrap_or(RuntimeValue::Undefined);
                Ok(self.allocate(value))
            }
            OpCode::Load => {
                let pointer = self.operand(library, frame, op, 0)?;
                self.read(&pointer)
            }
            OpCode::Store => {
                let pointer = self.operand(library, frame, op, 0)?;
                let value = self.operand(library, frame, op, 1)?;
                self.write(&pointer, value)?;
                Ok(RuntimeValue::Undefined)
            }
            OpCode::AccessChain => {
                let base = self.operand(library, frame, op, 0)?;
                let RuntimeValue::Pointer(mut pointer) = base else {
                    return Err(invalid(opcode, &base));
                };
                for index in 1..op.operands.len() {
                    let value = self.operand(library, frame, op, index)?;
                    let index = value.as_int().ok_or_else(|| invalid(opcode, &value))?;
                    pointer.path.push(index as u32);
                }
                Ok(RuntimeValue::Pointer(pointer))
            }
            OpCode::CompositeConstruct => {
                let parts = (0..op.operands.len())
                    .map(|index| self.operand(library, frame, op, index))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(RuntimeValue::Composite(parts))
            }
            OpCode::FunctionCall => {
                let Some(Operand::Function(callee)) = op.operands.first() else {
                    return Err(EvalError::InvalidOperand {
                        opcode,
                        found: "missing callee".to_string(),
                    });
                };
                let args = (1..op.operands.len())
                    .map(|index| self.operand(library, frame, op, index))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.call(*callee, args)?.unwrap_or(RuntimeValue::Undefined))
            }
            OpCode::Select => {
                let condition = self.operand(library, frame, op, 0)?;
                let if_true = self.operand(library, frame, op, 1)?;
                let if_false = self.operand(library, frame, op, 2)?;
                select(&condition, if_true, if_false)
            }
            OpCode::VectorTimesScalar => {
                let vector = self.operand(library, frame, op, 0)?;
                let scalar = self.operand(library, frame, op, 1)?;
                match vector {
                    RuntimeValue::Composite(lanes) => lanes
                        .iter()
                        .map(|lane| scalar_binary(OpCode::FMul, lane, &scalar))
                        .collect::<Result<Vec<_>, _>>()
                        .map(RuntimeValue::Composite),
                    other => Err(invalid(opcode, &other)),
                }
            }
            OpCode::Dot => {
                let a = self.operand(library, frame, op, 0)?;
                let b = self.operand(library, frame, op, 1)?;
                match (&a, &b) {
                    (RuntimeValue::Composite(xs), RuntimeValue::Composite(ys)) if xs.len() == ys.len() => {
                        let mut sum = 0.0;
                        for (x, y) in xs.iter().zip(ys) {
                            match (x, y) {
                                (RuntimeValue::Real(x), RuntimeValue::Real(y)) => sum += x * y,
                                _ => return Err(invalid(opcode, x)),
                            }
                        }
                        Ok(RuntimeValue::Real(sum))
                    }
                    _ => Err(invalid(opcode, &a)),
                }
            }
            OpCode::Any | OpCode::All => {
                let value = self.operand(library, frame, op, 0)?;
                let RuntimeValue::Composite(lanes) = &value else {
                    return Err(invalid(opcode, &value));
                };
                let lanes = lanes
                    .iter()
                    .map(|lane| lane.as_bool().ok_or_else(|| invalid(opcode, lane)))
                    .collect::<Result<Vec<_>, _>>()?;
                let result = if opcode == OpCode::Any {
                    lanes.iter().any(|b| *b)
                } else {
                    lanes.iter().all(|b| *b)
                };
                Ok(RuntimeValue::Bool(result))
            }
            OpCode::FNegate
            | OpCode::SNegate
            | OpCode::LogicalNot
            | OpCode::ConvertFToS
            | OpCode::ConvertSToF
            | OpCode::Bitcast => {
                let value = self.operand(library, frame, op, 0)?;
                lift1(opcode, &value)
            }
            OpCode::Return | OpCode::ReturnValue | OpCode::Branch | OpCode::BranchConditional => {
                Err(EvalError::InvalidOperand {
                    opcode,
                    found: "terminator outside block end".to_string(),
                })
            }
            _ => {
                let a = self.operand(library, frame, op, 0)?;
                let b = self.operand(library, frame, op, 1)?;
                lift2(opcode, &a, &b)
            }
        }
    }
}

enum Flow {
    Jump(BlockId),
    Return(Option<RuntimeValue>),
}

fn block_operand(op: &Op, index: usize) -> Result<BlockId, EvalError> {
    op.operands
        .get(index)
        .and_then(Operand::as_block)
        .ok_or_else(|| EvalError::InvalidOperand {
            opcode: op.opcode,
            found: format!("operand {}", index),
        })
}

fn select(condition: &RuntimeValue, if_true: RuntimeValue, if_false: RuntimeValue) -> Result<RuntimeValue, EvalError> {
    match (condition, if_true, if_false) {
        (RuntimeValue::Bool(c), t, f) => Ok(if *c { t } else { f }),
        (RuntimeValue::Composite(cs), RuntimeValue::Composite(ts), RuntimeValue::Composite(fs))
            if cs.len() == ts.len() && ts.len() == fs.len() =>
        {
            cs.iter()
                .zip(ts.into_iter().zip(fs))
                .map(|(c, (t, f))| select(c, t, f))
                .collect::<Result<Vec<_>, _>>()
                .map(RuntimeValue::Composite)
        }
        (other, _, _) => Err(invalid(OpCode::Select, other)),
    }
}

fn lift1(opcode: OpCode, value: &RuntimeValue) -> Result<RuntimeValue, EvalError> {
    match value {
        RuntimeValue::Composite(lanes) => lanes
            .iter()
            .map(|lane| lift1(opcode, lane))
            .collect::<Result<Vec<_>, _>>()
            .map(RuntimeValue::Composite),
        _ => scalar_unary(opcode, value),
    }
}

fn lift2(opcode: OpCode, a: &RuntimeValue, b: &RuntimeValue) -> Result<RuntimeValue, EvalError> {
    match (a, b) {
        (RuntimeValue::Composite(xs), RuntimeValue::Composite(ys)) if xs.len() == ys.len() => xs
            .iter()
            .zip(ys)
            .map(|(x, y)| lift2(opcode, x, y))
            .collect::<Result<Vec<_>, _>>()
            .map(RuntimeValue::Composite),
        _ => scalar_binary(opcode, a, b),
    }
}

fn scalar_unary(opcode: OpCode, value: &RuntimeValue) -> Result<RuntimeValue, EvalError> {
    use RuntimeValue::*;
    match (opcode, value) {
        (OpCode::FNegate, Real(x)) => Ok(Real(-x)),
        (OpCode::SNegate, Int(x)) => Ok(Int(x.wrapping_neg())),
        (OpCode::LogicalNot, Bool(x)) => Ok(Bool(!x)),
        (OpCode::ConvertFToS, Real(x)) => Ok(Int(*x as i32)),
        (OpCode::ConvertSToF, Int(x)) => Ok(Real(*x as f32)),
        (OpCode::Bitcast, Real(x)) => Ok(Int(x.to_bits() as i32)),
        (OpCode::Bitcast, Int(x)) => Ok(Real(f32::from_bits(*x as u32))),
        _ => Err(invalid(opcode, value)),
    }
}

fn scalar_binary(opcode: OpCode, a: &RuntimeValue, b: &RuntimeValue) -> Result<RuntimeValue, EvalError> {
    use RuntimeValue::*;
    let value = match (opcode, a, b) {
        (OpCode::FAdd, Real(x), Real(y)) => Real(x + y),
        (OpCode::FSub, Real(x), Real(y)) => Real(x - y),
        (OpCode::FMul, Real(x), Real(y)) => Real(x * y),
        (OpCode::FDiv, Real(x), Real(y)) => Real(x / y),
        // Result takes the sign of the divisor
        (OpCode::FMod, Real(x), Real(y)) => Real(x - y * (x / y).floor()),
        (OpCode::IAdd, Int(x), Int(y)) => Int(x.wrapping_add(*y)),
        (OpCode::ISub, Int(x), Int(y)) => Int(x.wrapping_sub(*y)),
        (OpCode::IMul, Int(x), Int(y)) => Int(x.wrapping_mul(*y)),
        (OpCode::SDiv | OpCode::SMod, Int(_), Int(0)) => return Err(EvalError::DivisionByZero),
        // i32::MIN / -1 wraps like the other integer ops
        (OpCode::SDiv, Int(x), Int(y)) => Int(x.wrapping_div(*y)),
        (OpCode::SMod, Int(x), Int(y)) => {
            let r = x.wrapping_rem(*y);
            Int(if r != 0 && (r < 0) != (*y < 0) { r + y } else { r })
        }
        (OpCode::LogicalEqual, Bool(x), Bool(y)) => Bool(x == y),
        (OpCode::LogicalNotEqual, Bool(x), Bool(y)) => Bool(x != y),
        (OpCode::IEqual, Int(x), Int(y)) => Bool(x == y),
        (OpCode::INotEqual, Int(x), Int(y)) => Bool(x != y),
        (OpCode::SLessThan, Int(x), Int(y)) => Bool(x < y),
        (OpCode::SLessThanEqual, Int(x), Int(y)) => Bool(x <= y),
        (OpCode::SGreaterThan, Int(x), Int(y)) => Bool(x > y),
        (OpCode::SGreaterThanEqual, Int(x), Int(y)) => Bool(x >= y),
        (OpCode::FOrdEqual, Real(x), Real(y)) => Bool(x == y),
        (OpCode::FOrdNotEqual, Real(x), Real(y)) => Bool(x != y && !x.is_nan() && !y.is_nan()),
        (OpCode::FOrdLessThan, Real(x), Real(y)) => Bool(x < y),
        (OpCode::FOrdLessThanEqual, Real(x), Real(y)) => Bool(x <= y),
        (OpCode::FOrdGreaterThan, Real(x), Real(y)) => Bool(x > y),
        (OpCode::FOrdGreaterThanEqual, Real(x), Real(y)) => Bool(x >= y),
        _ => return Err(invalid(opcode, a)),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smod_follows_divisor_sign() {
        let r = scalar_binary(OpCode::SMod, &RuntimeValue::Int(-7), &RuntimeValue::Int(3)).unwrap();
        assert_eq!(r, RuntimeValue::Int(2));
        let r = scalar_binary(OpCode::SMod, &RuntimeValue::Int(7), &RuntimeValue::Int(-3)).unwrap();
        assert_eq!(r, RuntimeValue::Int(-2));
    }

    #[test]
    fn test_componentwise_compare() {
        let a = RuntimeValue::Composite(vec![RuntimeValue::Int(1), RuntimeValue::Int(0)]);
        let zero = RuntimeValue::Composite(vec![RuntimeValue::Int(0), RuntimeValue::Int(0)]);
        assert_eq!(
            lift2(OpCode::INotEqual, &a, &zero).unwrap(),
            RuntimeValue::Composite(vec![RuntimeValue::Bool(true), RuntimeValue::Bool(false)])
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            scalar_binary(OpCode::SDiv, &RuntimeValue::Int(1), &RuntimeValue::Int(0)),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn test_division_overflow_wraps() {
        let min = RuntimeValue::Int(i32::MIN);
        let minus_one = RuntimeValue::Int(-1);
        assert_eq!(scalar_binary(OpCode::SDiv, &min, &minus_one), Ok(RuntimeValue::Int(i32::MIN)));
        assert_eq!(scalar_binary(OpCode::SMod, &min, &minus_one), Ok(RuntimeValue::Int(0)));
        assert_eq!(
            scalar_binary(OpCode::SMod, &RuntimeValue::Int(5), &RuntimeValue::Int(0)),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn test_bitcast_round_trip() {
        let bits = lift1(OpCode::Bitcast, &RuntimeValue::Real(1.0)).unwrap();
        assert_eq!(bits, RuntimeValue::Int(0x3f80_0000));
        assert_eq!(lift1(OpCode::Bitcast, &bits).unwrap(), RuntimeValue::Real(1.0));
    }
}
