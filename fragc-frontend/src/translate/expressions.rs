//! Expression emission

use super::{conversions, logical, Emitted, FunctionEmitter, IrResultExt, TranslateResult};
use crate::ast::{AccessedMember, Expression, ExpressionKind, MemberAccess};
use fragc_common::{BinaryOperator, FunctionId, Literal, SourceLocation, TranslationError, TypeSpec};
use fragc_ir::{
    BinaryOperatorKey, BinaryResolver, IntrinsicKey, IntrinsicResolver, OpCode, Operand, TypeRef, UnaryOperatorKey,
    UnaryResolver, ValueId,
};

pub(crate) fn emit_expression(em: &mut FunctionEmitter<'_, '_>, expr: &Expression) -> TranslateResult<Emitted> {
    let location = &expr.location;
    match &expr.kind {
        ExpressionKind::Literal(value) => {
            let ty = em.ctx.lower_type(&expr.ty, location)?;
            let constant = em.ctx.library.constant(ty, *value);
            Ok(Emitted::Value {
                operand: Operand::Constant(constant),
                ty,
            })
        }
        ExpressionKind::Local(local) => {
            let (pointer, ty) = em
                .local(*local)
                .ok_or_else(|| TranslationError::unsupported(format!("unknown local {}", local), location.clone()))?;
            Ok(Emitted::Pointer { pointer, ty })
        }
        ExpressionKind::This => {
            let (pointer, ty) = em
                .this()
                .ok_or_else(|| TranslationError::unsupported("'this' used in a static function", location.clone()))?;
            Ok(Emitted::Pointer { pointer, ty })
        }
        ExpressionKind::Binary { op, left, right } => {
            let key = BinaryOperatorKey::new(left.ty.clone(), right.ty.clone(), *op);
            let resolver = find_binary(em, &key, location)?;
            let lhs = emit_value(em, left)?;
            emit_resolved_binary(em, resolver, lhs, right, &expr.ty, location)
        }
        ExpressionKind::Unary { op, operand } => {
            let key = UnaryOperatorKey::new(operand.ty.clone(), *op);
            let UnaryResolver::Instruction(opcode) = em
                .ctx
                .library
                .find_unary_resolver(&key)
                .ok_or_else(|| TranslationError::unsupported(format!("no operator for {}", key), location.clone()))?;
            let (value, _) = emit_value(em, operand)?;
            let ty = em.ctx.lower_type(&expr.ty, location)?;
            let result = em.builder.build_value(opcode, ty, vec![value]).at(location)?;
            Ok(Emitted::Value {
                operand: Operand::Value(result),
                ty,
            })
        }
        ExpressionKind::Cast { operand } => conversions::emit_cast(em, operand, &expr.ty, location),
        ExpressionKind::MemberAccess(access) => emit_member_read(em, access, &expr.ty, location),
        ExpressionKind::Call { access, arguments } => emit_call(em, access, arguments, &expr.ty, location),
        ExpressionKind::Construct { constructor, arguments } => {
            emit_construct(em, &expr.ty, *constructor, arguments, location)
        }
    }
}

fn find_binary(
    em: &FunctionEmitter<'_, '_>,
    key: &BinaryOperatorKey,
    location: &SourceLocation,
) -> TranslateResult<BinaryResolver> {
    em.ctx
        .library
        .find_binary_resolver(key)
        .ok_or_else(|| TranslationError::unsupported(format!("no operator for {}", key), location.clone()))
}

fn emit_resolved_binary(
    em: &mut FunctionEmitter<'_, '_>,
    resolver: BinaryResolver,
    lhs: (Operand, TypeRef),
    right: &Expression,
    result: &TypeSpec,
    location: &SourceLocation,
) -> TranslateResult<Emitted> {
    match resolver {
        BinaryResolver::ShortCircuit(kind) => logical::emit_short_circuit(em, kind, lhs, right, location),
        BinaryResolver::Instruction(opcode) => {
            let (rhs, _) = emit_value(em, right)?;
            let ty = em.ctx.lower_type(result, location)?;
            let value = em.builder.build_value(opcode, ty, vec![lhs.0, rhs]).at(location)?;
            Ok(Emitted::Value {
                operand: Operand::Value(value),
                ty,
            })
        }
    }
}

/// `left op right` for a left operand of type `left_ty` that has already
/// been loaded. Used by compound assignment so the target is evaluated once.
pub(crate) fn emit_binary_with_lhs(
    em: &mut FunctionEmitter<'_, '_>,
    op: BinaryOperator,
    lhs: (Operand, TypeRef),
    left_ty: &TypeSpec,
    right: &Expression,
    location: &SourceLocation,
) -> TranslateResult<(Operand, TypeRef)> {
    let key = BinaryOperatorKey::new(left_ty.clone(), right.ty.clone(), op);
    let resolver = find_binary(em, &key, location)?;
    let emitted = emit_resolved_binary(em, resolver, lhs, right, left_ty, location)?;
    em.load(emitted, location)
}

/// Emits `expr` and loads its value
pub(crate) fn emit_value(em: &mut FunctionEmitter<'_, '_>, expr: &Expression) -> TranslateResult<(Operand, TypeRef)> {
    let emitted = emit_expression(em, expr)?;
    em.load(emitted, &expr.location)
}

/// Storage of the object `access` reads from; `this` when no target is
/// written
pub(crate) fn receiver_pointer(
    em: &mut FunctionEmitter<'_, '_>,
    access: &MemberAccess,
    location: &SourceLocation,
) -> TranslateResult<(ValueId, TypeRef)> {
    match &access.target {
        Some(target) => {
            let emitted = emit_expression(em, target)?;
            em.to_pointer(emitted, location)
        }
        None => em.this().ok_or_else(|| {
            TranslationError::unsupported(format!("'{}' needs a receiver", access.name), location.clone())
        }),
    }
}

fn emit_receiver(em: &mut FunctionEmitter<'_, '_>, access: &MemberAccess, location: &SourceLocation) -> TranslateResult<Operand> {
    let (pointer, _) = receiver_pointer(em, access, location)?;
    Ok(Operand::Value(pointer))
}

fn emit_accessor_call(
    em: &mut FunctionEmitter<'_, '_>,
    access: &MemberAccess,
    accessor: FunctionId,
    mut arguments: Vec<Operand>,
    return_type: Option<TypeRef>,
    location: &SourceLocation,
) -> TranslateResult<Emitted> {
    let function = em.ctx.function(accessor, location)?;
    let receiver = emit_receiver(em, access, location)?;
    arguments.insert(0, receiver);
    em.call(function, return_type, arguments, location)
}

fn emit_member_read(
    em: &mut FunctionEmitter<'_, '_>,
    access: &MemberAccess,
    ty: &TypeSpec,
    location: &SourceLocation,
) -> TranslateResult<Emitted> {
    if let Some(get) = getter_of(em, access) {
        let return_type = em.ctx.lower_type(ty, location)?;
        return emit_accessor_call(em, access, get, Vec::new(), Some(return_type), location);
    }

    match &access.accessed {
        AccessedMember::Property(property) => {
            if let Some(index) = em.ctx.field_index(*property) {
                let (base, owner) = receiver_pointer(em, access, location)?;
                return em.access_member(base, owner, index, location);
            }
            Err(TranslationError::unsupported(
                format!("property '{}' cannot be read", access.name),
                location.clone(),
            ))
        }
        AccessedMember::GetterSetter { .. } => Err(TranslationError::unsupported(
            format!("property '{}' has no getter", access.name),
            location.clone(),
        )),
        AccessedMember::Function(_) | AccessedMember::Intrinsic { .. } => Err(TranslationError::unsupported(
            format!("function '{}' used as a value", access.name),
            location.clone(),
        )),
    }
}

/// The getter to call when `access` is read, if it is an accessor property
pub(crate) fn getter_of(em: &FunctionEmitter<'_, '_>, access: &MemberAccess) -> Option<FunctionId> {
    match &access.accessed {
        AccessedMember::GetterSetter { get, .. } => *get,
        AccessedMember::Property(property) if em.ctx.field_index(*property).is_none() => {
            em.ctx.accessors(*property).and_then(|(get, _)| get)
        }
        _ => None,
    }
}

/// The setter to call when `access` is assigned, if it is an accessor
/// property
pub(crate) fn setter_of(em: &FunctionEmitter<'_, '_>, access: &MemberAccess) -> Option<FunctionId> {
    match &access.accessed {
        AccessedMember::GetterSetter { set, .. } => *set,
        AccessedMember::Property(property) if em.ctx.field_index(*property).is_none() => {
            em.ctx.accessors(*property).and_then(|(_, set)| set)
        }
        _ => None,
    }
}

pub(crate) fn emit_setter_call(
    em: &mut FunctionEmitter<'_, '_>,
    access: &MemberAccess,
    setter: FunctionId,
    value: Operand,
    location: &SourceLocation,
) -> TranslateResult<()> {
    emit_accessor_call(em, access, setter, vec![value], None, location)?;
    Ok(())
}

fn emit_call(
    em: &mut FunctionEmitter<'_, '_>,
    access: &MemberAccess,
    arguments: &[Expression],
    ty: &TypeSpec,
    location: &SourceLocation,
) -> TranslateResult<Emitted> {
    match &access.accessed {
        AccessedMember::Intrinsic { owner } => emit_intrinsic(em, owner, &access.name, arguments, ty, location),
        AccessedMember::Function(id) => {
            let function = em.ctx.function(*id, location)?;
            let mut operands = Vec::with_capacity(arguments.len() + 1);
            if em.ctx.takes_this(*id, function) {
                operands.push(emit_receiver(em, access, location)?);
            }
            for argument in arguments {
                operands.push(emit_value(em, argument)?.0);
            }
            let return_type = if ty.is_void() {
                None
            } else {
                Some(em.ctx.lower_type(ty, location)?)
            };
            em.call(function, return_type, operands, location)
        }
        _ => Err(TranslationError::unsupported(
            format!("'{}' is not callable", access.name),
            location.clone(),
        )),
    }
}

fn emit_intrinsic(
    em: &mut FunctionEmitter<'_, '_>,
    owner: &TypeSpec,
    name: &str,
    arguments: &[Expression],
    ty: &TypeSpec,
    location: &SourceLocation,
) -> TranslateResult<Emitted> {
    let key = IntrinsicKey::new(
        owner.clone(),
        name,
        arguments.iter().map(|argument| argument.ty.clone()).collect(),
    );
    let resolver = em
        .ctx
        .library
        .find_intrinsic_resolver(&key)
        .ok_or_else(|| TranslationError::unsupported(format!("no intrinsic {}", key), location.clone()))?;

    let mut values = Vec::with_capacity(arguments.len());
    for argument in arguments {
        values.push(emit_value(em, argument)?);
    }
    match resolver {
        IntrinsicResolver::Identity => {
            let (operand, ty) = values.into_iter().next().ok_or_else(|| {
                TranslationError::unsupported(format!("intrinsic {} needs an argument", key), location.clone())
            })?;
            Ok(Emitted::Value { operand, ty })
        }
        IntrinsicResolver::Instruction(opcode) => {
            let ty = em.ctx.lower_type(ty, location)?;
            let operands = values.into_iter().map(|(operand, _)| operand).collect();
            let value = em.builder.build_value(opcode, ty, operands).at(location)?;
            Ok(Emitted::Value {
                operand: Operand::Value(value),
                ty,
            })
        }
    }
}

fn emit_construct(
    em: &mut FunctionEmitter<'_, '_>,
    ty: &TypeSpec,
    constructor: Option<FunctionId>,
    arguments: &[Expression],
    location: &SourceLocation,
) -> TranslateResult<Emitted> {
    if let TypeSpec::Class(id) = ty {
        let info = em.ctx.class_info(*id, location)?;
        let pointer_type = em.ctx.library.types.pointer_type(info.ir_type);
        let name = em.ctx.library.types.name(info.ir_type).to_string();
        let instance = em.builder.build_variable(pointer_type, &name).at(location)?;

        let mut operands = vec![Operand::Value(instance)];
        match constructor {
            Some(constructor) => {
                for argument in arguments {
                    operands.push(emit_value(em, argument)?.0);
                }
                let function = em.ctx.function(constructor, location)?;
                em.call(function, None, operands, location)?;
            }
            None => {
                if let Some(pre_constructor) = info.pre_constructor {
                    em.call(pre_constructor, None, operands, location)?;
                }
            }
        }
        return Ok(Emitted::Pointer {
            pointer: instance,
            ty: info.ir_type,
        });
    }

    let result_type = em.ctx.lower_type(ty, location)?;
    let mut values = Vec::with_capacity(arguments.len());
    for argument in arguments {
        values.push(emit_value(em, argument)?);
    }

    let lanes = match ty {
        TypeSpec::Vector { count, .. } => *count as usize,
        _ => 1,
    };
    let operands: Vec<Operand> = match values.as_slice() {
        [] => {
            let zero = match ty {
                TypeSpec::Scalar(kind) | TypeSpec::Vector { scalar: kind, .. } => Literal::zero(*kind),
                _ => {
                    return Err(TranslationError::unsupported(
                        format!("'{}' has no default constructor", ty),
                        location.clone(),
                    ))
                }
            };
            let scalar = em.ctx.lower_type(&TypeSpec::Scalar(zero.scalar_kind()), location)?;
            let constant = em.ctx.library.constant(scalar, zero);
            if lanes == 1 {
                return Ok(Emitted::Value {
                    operand: Operand::Constant(constant),
                    ty: result_type,
                });
            }
            vec![Operand::Constant(constant); lanes]
        }
        [(operand, _)] if matches!(ty, TypeSpec::Scalar(_)) => {
            return Ok(Emitted::Value {
                operand: *operand,
                ty: result_type,
            });
        }
        // A single scalar fills every lane
        [(operand, single)] if lanes > 1 && em.ctx.library.types.base(*single).is_scalar() => vec![*operand; lanes],
        _ => values.iter().map(|(operand, _)| *operand).collect(),
    };

    let value = em
        .builder
        .build_value(OpCode::CompositeConstruct, result_type, operands)
        .at(location)?;
    Ok(Emitted::Value {
        operand: Operand::Value(value),
        ty: result_type,
    })
}
