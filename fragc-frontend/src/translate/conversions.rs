//! Casts between builtin types

use super::expressions::{emit_expression, emit_value};
use super::{Emitted, FunctionEmitter, IrResultExt, TranslateResult};
use crate::ast::Expression;
use fragc_common::{Literal, SourceLocation, TranslationError, TypeSpec};
use fragc_ir::{CastResolver, OpCode, Operand, TypeCastKey, TypeRef};

pub(crate) fn emit_cast(
    em: &mut FunctionEmitter<'_, '_>,
    operand: &Expression,
    to: &TypeSpec,
    location: &SourceLocation,
) -> TranslateResult<Emitted> {
    if operand.ty == *to {
        return emit_expression(em, operand);
    }

    let key = TypeCastKey::new(operand.ty.clone(), to.clone());
    let resolver = em
        .ctx
        .library
        .find_cast_resolver(&key)
        .ok_or_else(|| TranslationError::unsupported(format!("no conversion for {}", key), location.clone()))?;
    let (value, _) = emit_value(em, operand)?;
    let result_type = em.ctx.lower_type(to, location)?;

    match resolver {
        CastResolver::Instruction(opcode) => build(em, opcode, result_type, vec![value], location),
        CastResolver::FromBool { zero, one } => {
            let one = splat(em, to, one, location)?;
            let zero = splat(em, to, zero, location)?;
            build(em, OpCode::Select, result_type, vec![value, one, zero], location)
        }
        CastResolver::ToBool { compare, zero } => {
            let zero = splat(em, &operand.ty, zero, location)?;
            build(em, compare, result_type, vec![value, zero], location)
        }
    }
}

fn build(
    em: &mut FunctionEmitter<'_, '_>,
    opcode: OpCode,
    ty: TypeRef,
    operands: Vec<Operand>,
    location: &SourceLocation,
) -> TranslateResult<Emitted> {
    let value = em.builder.build_value(opcode, ty, operands).at(location)?;
    Ok(Emitted::Value {
        operand: Operand::Value(value),
        ty,
    })
}

/// `value` as a constant of `ty`'s scalar kind, broadcast to every lane of
/// a vector
fn splat(em: &mut FunctionEmitter<'_, '_>, ty: &TypeSpec, value: Literal, location: &SourceLocation) -> TranslateResult<Operand> {
    let scalar = em.ctx.lower_type(&TypeSpec::Scalar(value.scalar_kind()), location)?;
    let constant = Operand::Constant(em.ctx.library.constant(scalar, value));
    match ty.dimension() {
        Some(lanes) if lanes > 1 => {
            let vector = em.ctx.lower_type(&TypeSpec::with_dimension(value.scalar_kind(), lanes), location)?;
            let composite = em
                .builder
                .build_value(OpCode::CompositeConstruct, vector, vec![constant; lanes as usize])
                .at(location)?;
            Ok(Operand::Value(composite))
        }
        _ => Ok(constant),
    }
}
