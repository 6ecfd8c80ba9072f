//! Short-circuit lowering of `||` and `&&`
//!
//! The right operand may only run when the left one does not decide the
//! result, so both operators become a selection: the left value picks
//! between a block that keeps it and a block that evaluates the right
//! operand. Either block stores into a boolean temporary read at the merge.

use super::expressions::emit_value;
use super::{Emitted, FunctionEmitter, IrResultExt, TranslateResult};
use crate::ast::Expression;
use fragc_common::SourceLocation;
use fragc_ir::{Operand, ShortCircuit, TypeRef};

/// Lowers `lhs || right` or `lhs && right` where `lhs` is already
/// evaluated in the current block
pub(crate) fn emit_short_circuit(
    em: &mut FunctionEmitter<'_, '_>,
    kind: ShortCircuit,
    (lhs, boolean): (Operand, TypeRef),
    right: &Expression,
    location: &SourceLocation,
) -> TranslateResult<Emitted> {

    let name = match kind {
        ShortCircuit::Or => "tempOr",
        ShortCircuit::And => "tempAnd",
    };
    let pointer_type = em.ctx.library.types.pointer_type(boolean);
    let temp = em.builder.build_variable(pointer_type, name).at(location)?;

    let keep_left = em.builder.create_block("ifTrue");
    let eval_right = em.builder.create_block("ifFalse");
    let merge = em.builder.create_block("mergePoint");

    em.builder.current_block_mut().at(location)?.mark_selection(merge);
    let (if_true, if_false) = match kind {
        ShortCircuit::Or => (keep_left, eval_right),
        ShortCircuit::And => (eval_right, keep_left),
    };
    em.builder.build_branch_conditional(lhs, if_true, if_false).at(location)?;

    em.builder.push_block(keep_left);
    em.builder.set_current_block(keep_left);
    em.builder.build_store(Operand::Value(temp), lhs).at(location)?;
    em.builder.build_branch(merge).at(location)?;

    em.builder.push_block(eval_right);
    em.builder.set_current_block(eval_right);
    let (rhs, _) = emit_value(em, right)?;
    em.builder.build_store(Operand::Value(temp), rhs).at(location)?;
    em.builder.build_branch(merge).at(location)?;

    em.builder.push_block(merge);
    em.builder.set_current_block(merge);
    Ok(Emitted::Pointer {
        pointer: temp,
        ty: boolean,
    })
}
