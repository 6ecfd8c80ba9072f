//! Statement emission and structured control flow
//!
//! Every conditional gets a Selection header and every loop a Loop header
//! naming its merge (and continue) block, so a structured binary emitter
//! can recover the nesting without analysis.

use super::expressions::{
    emit_binary_with_lhs, emit_expression, emit_setter_call, emit_value, getter_of, receiver_pointer, setter_of,
};
use super::{Emitted, FunctionEmitter, IrResultExt, LoopTargets, TranslateResult};
use crate::ast::{ClassNode, Expression, ExpressionKind, IfPart, Statement, StatementKind};
use fragc_common::{BinaryOperator, SourceLocation, TranslationError, TypeSpec};
use fragc_ir::Operand;

pub(crate) fn emit_statements(em: &mut FunctionEmitter<'_, '_>, statements: &[Statement]) -> TranslateResult<()> {
    for statement in statements {
        emit_statement(em, statement)?;
    }
    Ok(())
}

pub(crate) fn emit_statement(em: &mut FunctionEmitter<'_, '_>, statement: &Statement) -> TranslateResult<()> {
    let location = &statement.location;
    match &statement.kind {
        StatementKind::Expression(expression) => {
            emit_expression(em, expression)?;
            Ok(())
        }
        StatementKind::LocalVariable {
            local,
            name,
            ty,
            initial_value,
        } => {
            let ty = em.ctx.lower_type(ty, location)?;
            let pointer = em.declare_local(*local, name, ty, location)?;
            if let Some(value) = initial_value {
                let (value, _) = emit_value(em, value)?;
                em.builder.build_store(Operand::Value(pointer), value).at(location)?;
            }
            Ok(())
        }
        StatementKind::Assign { target, op, value } => emit_assign(em, target, *op, value, location),
        StatementKind::Return(value) => {
            let value = match value {
                Some(value) => Some(emit_value(em, value)?.0),
                None => None,
            };
            if value.is_some() != em.return_type().is_some() {
                return Err(TranslationError::unsupported("return does not match the function's type", location.clone()));
            }
            em.builder.build_return(value).at(location)
        }
        StatementKind::If { parts } => emit_if(em, parts, location),
        StatementKind::While { condition, body } => emit_loop(em, Some(condition), body, None, location),
        StatementKind::For {
            initializer,
            condition,
            iterator,
            body,
        } => {
            if let Some(initializer) = initializer {
                emit_statement(em, initializer)?;
            }
            emit_loop(em, condition.as_ref(), body, iterator.as_deref(), location)
        }
        StatementKind::Break => {
            let targets = em
                .current_loop()
                .ok_or_else(|| TranslationError::unsupported("break outside of a loop", location.clone()))?;
            em.builder.build_branch(targets.merge).at(location)
        }
        StatementKind::Continue => {
            let targets = em
                .current_loop()
                .ok_or_else(|| TranslationError::unsupported("continue outside of a loop", location.clone()))?;
            em.builder.build_branch(targets.continue_target).at(location)
        }
    }
}

fn emit_assign(
    em: &mut FunctionEmitter<'_, '_>,
    target: &Expression,
    op: Option<BinaryOperator>,
    value: &Expression,
    location: &SourceLocation,
) -> TranslateResult<()> {
    if let Some(op) = op {
        return emit_compound_assign(em, target, op, value, location);
    }

    if let ExpressionKind::MemberAccess(access) = &target.kind {
        if let Some(setter) = setter_of(em, access) {
            let (value, _) = emit_value(em, value)?;
            return emit_setter_call(em, access, setter, value, location);
        }
    }

    let (value, _) = emit_value(em, value)?;
    match emit_expression(em, target)? {
        Emitted::Pointer { pointer, .. } => em.builder.build_store(Operand::Value(pointer), value).at(location),
        _ => Err(TranslationError::unsupported("assignment to a value", location.clone())),
    }
}

/// `a op= b` stores `a op b`. The receiver of `a` is evaluated once and
/// both the read and the write go through it.
fn emit_compound_assign(
    em: &mut FunctionEmitter<'_, '_>,
    target: &Expression,
    op: BinaryOperator,
    value: &Expression,
    location: &SourceLocation,
) -> TranslateResult<()> {
    if let ExpressionKind::MemberAccess(access) = &target.kind {
        if let Some(setter) = setter_of(em, access) {
            let get = getter_of(em, access).ok_or_else(|| {
                TranslationError::unsupported(format!("property '{}' has no getter", access.name), location.clone())
            })?;
            let (receiver, _) = receiver_pointer(em, access, location)?;
            let ty = em.ctx.lower_type(&target.ty, location)?;
            let getter = em.ctx.function(get, location)?;
            let current = em.call(getter, Some(ty), vec![Operand::Value(receiver)], location)?;
            let current = em.load(current, location)?;
            let (result, _) = emit_binary_with_lhs(em, op, current, &target.ty, value, location)?;
            let setter = em.ctx.function(setter, location)?;
            em.call(setter, None, vec![Operand::Value(receiver), result], location)?;
            return Ok(());
        }
    }

    let Emitted::Pointer { pointer, ty } = emit_expression(em, target)? else {
        return Err(TranslationError::unsupported("assignment to a value", location.clone()));
    };
    let current = em.builder.build_load(ty, Operand::Value(pointer)).at(location)?;
    let (result, _) = emit_binary_with_lhs(em, op, (Operand::Value(current), ty), &target.ty, value, location)?;
    em.builder.build_store(Operand::Value(pointer), result).at(location)
}

fn emit_if(em: &mut FunctionEmitter<'_, '_>, parts: &[IfPart], location: &SourceLocation) -> TranslateResult<()> {
    let Some((part, rest)) = parts.split_first() else {
        return Ok(());
    };
    let Some(condition) = &part.condition else {
        return emit_statements(em, &part.body);
    };

    let (condition, _) = emit_value(em, condition)?;
    let merge = em.builder.create_block("ifMerge");
    let if_true = em.builder.create_block("ifTrue");
    let if_false = if rest.is_empty() {
        merge
    } else {
        em.builder.create_block("ifFalse")
    };

    em.builder.current_block_mut().at(location)?.mark_selection(merge);
    em.builder.build_branch_conditional(condition, if_true, if_false).at(location)?;

    em.builder.push_block(if_true);
    em.builder.set_current_block(if_true);
    emit_statements(em, &part.body)?;
    em.builder.build_branch(merge).at(location)?;

    if !rest.is_empty() {
        em.builder.push_block(if_false);
        em.builder.set_current_block(if_false);
        emit_if(em, rest, location)?;
        em.builder.build_branch(merge).at(location)?;
    }

    em.builder.push_block(merge);
    em.builder.set_current_block(merge);
    Ok(())
}

fn emit_loop(
    em: &mut FunctionEmitter<'_, '_>,
    condition: Option<&Expression>,
    body: &[Statement],
    iterator: Option<&Statement>,
    location: &SourceLocation,
) -> TranslateResult<()> {
    let header = em.builder.create_block("headerBlock");
    let condition_block = em.builder.create_block("conditionBlock");
    let body_block = em.builder.create_block("loop-body");
    let continue_block = em.builder.create_block("continueBlock");
    let merge = em.builder.create_block("after-loop");

    em.builder.build_branch(header).at(location)?;
    em.builder.push_block(header);
    em.builder.set_current_block(header);
    em.builder.current_block_mut().at(location)?.mark_loop(merge, continue_block);
    em.builder.build_branch(condition_block).at(location)?;

    em.builder.push_block(condition_block);
    em.builder.set_current_block(condition_block);
    match condition {
        Some(condition) => {
            let (condition, _) = emit_value(em, condition)?;
            em.builder
                .build_branch_conditional(condition, body_block, merge)
                .at(location)?;
        }
        None => em.builder.build_branch(body_block).at(location)?,
    }

    em.builder.push_block(body_block);
    em.builder.set_current_block(body_block);
    em.push_loop(LoopTargets {
        merge,
        continue_target: continue_block,
    });
    let emitted = emit_statements(em, body);
    em.pop_loop();
    emitted?;
    em.builder.build_branch(continue_block).at(location)?;

    em.builder.push_block(continue_block);
    em.builder.set_current_block(continue_block);
    if let Some(iterator) = iterator {
        emit_statement(em, iterator)?;
    }
    em.builder.build_branch(header).at(location)?;

    em.builder.push_block(merge);
    em.builder.set_current_block(merge);
    Ok(())
}

/// Body of a pre-constructor: stores every member initializer into `this`
pub(crate) fn emit_initializers(em: &mut FunctionEmitter<'_, '_>, class: &ClassNode) -> TranslateResult<()> {
    let (this, owner) = em
        .this()
        .ok_or_else(|| TranslationError::unsupported("pre-constructor without receiver", class.location.clone()))?;
    for variable in &class.variables {
        let Some(index) = em.ctx.field_index(variable.property) else {
            continue;
        };
        let location = &variable.location;
        match (&variable.initial_value, &variable.ty) {
            (Some(initial_value), _) => {
                let (value, _) = emit_value(em, initial_value)?;
                if let Emitted::Pointer { pointer, .. } = em.access_member(this, owner, index, location)? {
                    em.builder.build_store(Operand::Value(pointer), value).at(location)?;
                }
            }
            // Uninitialized class members are default constructed in place
            (None, TypeSpec::Class(id)) => {
                let Some(pre_constructor) = em.ctx.class_info(*id, location)?.pre_constructor else {
                    continue;
                };
                if let Emitted::Pointer { pointer, .. } = em.access_member(this, owner, index, location)? {
                    em.call(pre_constructor, None, vec![Operand::Value(pointer)], location)?;
                }
            }
            (None, _) => {}
        }
    }
    Ok(())
}
