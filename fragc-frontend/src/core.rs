//! Core library
//!
//! Populates the operator, cast and intrinsic tables every shader library
//! depends on. Entries are generated by iterating the scalar kinds over
//! dimensions 1 through 4.

use fragc_common::{BinaryOperator, Literal, ScalarKind, TypeSpec, UnaryOperator};
use fragc_ir::{
    BinaryOperatorKey, BinaryResolver, CastResolver, IntrinsicKey, IntrinsicResolver, IrError, Library, OpCode,
    ResolverRegistry, ShortCircuit, TypeCastKey, UnaryOperatorKey, UnaryResolver,
};
use log::debug;

pub const CORE_LIBRARY_NAME: &str = "Core";

const DIMENSIONS: std::ops::RangeInclusive<u32> = 1..=4;

/// Builds the translated core library
pub fn build_core_library() -> Result<Library, IrError> {
    let mut library = Library::new(CORE_LIBRARY_NAME);
    register_arithmetic(&mut library.resolvers)?;
    register_comparisons(&mut library.resolvers)?;
    register_logic(&mut library.resolvers)?;
    register_casts(&mut library.resolvers)?;
    register_intrinsics(&mut library.resolvers)?;
    debug!("core library has {} resolvers", library.resolvers.len());
    library.mark_translated();
    Ok(library)
}

fn arithmetic_opcode(kind: ScalarKind, op: BinaryOperator) -> Option<OpCode> {
    use BinaryOperator::*;
    let opcode = match (kind, op) {
        (ScalarKind::Real, Add) => OpCode::FAdd,
        (ScalarKind::Real, Subtract) => OpCode::FSub,
        (ScalarKind::Real, Multiply) => OpCode::FMul,
        (ScalarKind::Real, Divide) => OpCode::FDiv,
        (ScalarKind::Real, Modulo) => OpCode::FMod,
        (ScalarKind::Integer, Add) => OpCode::IAdd,
        (ScalarKind::Integer, Subtract) => OpCode::ISub,
        (ScalarKind::Integer, Multiply) => OpCode::IMul,
        (ScalarKind::Integer, Divide) => OpCode::SDiv,
        (ScalarKind::Integer, Modulo) => OpCode::SMod,
        _ => return None,
    };
    Some(opcode)
}

fn comparison_opcode(kind: ScalarKind, op: BinaryOperator) -> Option<OpCode> {
    use BinaryOperator::*;
    let opcode = match (kind, op) {
        (ScalarKind::Real, Equality) => OpCode::FOrdEqual,
        (ScalarKind::Real, Inequality) => OpCode::FOrdNotEqual,
        (ScalarKind::Real, Less) => OpCode::FOrdLessThan,
        (ScalarKind::Real, LessEqual) => OpCode::FOrdLessThanEqual,
        (ScalarKind::Real, Greater) => OpCode::FOrdGreaterThan,
        (ScalarKind::Real, GreaterEqual) => OpCode::FOrdGreaterThanEqual,
        (ScalarKind::Integer, Equality) => OpCode::IEqual,
        (ScalarKind::Integer, Inequality) => OpCode::INotEqual,
        (ScalarKind::Integer, Less) => OpCode::SLessThan,
        (ScalarKind::Integer, LessEqual) => OpCode::SLessThanEqual,
        (ScalarKind::Integer, Greater) => OpCode::SGreaterThan,
        (ScalarKind::Integer, GreaterEqual) => OpCode::SGreaterThanEqual,
        (ScalarKind::Boolean, Equality) => OpCode::LogicalEqual,
        (ScalarKind::Boolean, Inequality) => OpCode::LogicalNotEqual,
        _ => return None,
    };
    Some(opcode)
}

fn register_arithmetic(resolvers: &mut ResolverRegistry) -> Result<(), IrError> {
    use BinaryOperator::*;
    for kind in [ScalarKind::Integer, ScalarKind::Real] {
        for dimension in DIMENSIONS {
            let ty = TypeSpec::with_dimension(kind, dimension);
            for op in [Add, Subtract, Multiply, Divide, Modulo] {
                if let Some(opcode) = arithmetic_opcode(kind, op) {
                    resolvers.register_binary(
                        BinaryOperatorKey::new(ty.clone(), ty.clone(), op),
                        BinaryResolver::Instruction(opcode),
                    )?;
                }
            }
            let negate = if kind == ScalarKind::Real {
                OpCode::FNegate
            } else {
                OpCode::SNegate
            };
            resolvers.register_unary(
                UnaryOperatorKey::new(ty.clone(), UnaryOperator::Negate),
                UnaryResolver::Instruction(negate),
            )?;
        }
    }

    for dimension in 2..=4 {
        resolvers.register_binary(
            BinaryOperatorKey::new(
                TypeSpec::with_dimension(ScalarKind::Real, dimension),
                TypeSpec::REAL,
                Multiply,
            ),
            BinaryResolver::Instruction(OpCode::VectorTimesScalar),
        )?;
    }
    Ok(())
}

fn register_comparisons(resolvers: &mut ResolverRegistry) -> Result<(), IrError> {
    use BinaryOperator::*;
    for kind in ScalarKind::ALL {
        for dimension in DIMENSIONS {
            let ty = TypeSpec::with_dimension(kind, dimension);
            // Ordering is only defined on scalars
            let ops: &[BinaryOperator] = if dimension == 1 {
                &[Equality, Inequality, Less, LessEqual, Greater, GreaterEqual]
            } else {
                &[Equality, Inequality]
            };
            for op in ops {
                if let Some(opcode) = comparison_opcode(kind, *op) {
                    resolvers.register_binary(
                        BinaryOperatorKey::new(ty.clone(), ty.clone(), *op),
                        BinaryResolver::Instruction(opcode),
                    )?;
                }
            }
        }
    }
    Ok(())
}

fn register_logic(resolvers: &mut ResolverRegistry) -> Result<(), IrError> {
    for dimension in DIMENSIONS {
        resolvers.register_unary(
            UnaryOperatorKey::new(
                TypeSpec::with_dimension(ScalarKind::Boolean, dimension),
                UnaryOperator::LogicalNot,
            ),
            UnaryResolver::Instruction(OpCode::LogicalNot),
        )?;
    }
    resolvers.register_binary(
        BinaryOperatorKey::new(TypeSpec::BOOLEAN, TypeSpec::BOOLEAN, BinaryOperator::LogicalOr),
        BinaryResolver::ShortCircuit(ShortCircuit::Or),
    )?;
    resolvers.register_binary(
        BinaryOperatorKey::new(TypeSpec::BOOLEAN, TypeSpec::BOOLEAN, BinaryOperator::LogicalAnd),
        BinaryResolver::ShortCircuit(ShortCircuit::And),
    )?;
    Ok(())
}

fn register_casts(resolvers: &mut ResolverRegistry) -> Result<(), IrError> {
    let cast = |from: ScalarKind, to: ScalarKind, dimension: u32| {
        TypeCastKey::new(
            TypeSpec::with_dimension(from, dimension),
            TypeSpec::with_dimension(to, dimension),
        )
    };
    for dimension in DIMENSIONS {
        use ScalarKind::*;
        resolvers.register_cast(cast(Real, Integer, dimension), CastResolver::Instruction(OpCode::ConvertFToS))?;
        resolvers.register_cast(cast(Integer, Real, dimension), CastResolver::Instruction(OpCode::ConvertSToF))?;
        for to in [Integer, Real] {
            resolvers.register_cast(
                cast(Boolean, to, dimension),
                CastResolver::FromBool {
                    zero: Literal::zero(to),
                    one: Literal::one(to),
                },
            )?;
        }
        resolvers.register_cast(
            cast(Integer, Boolean, dimension),
            CastResolver::ToBool {
                compare: OpCode::INotEqual,
                zero: Literal::zero(Integer),
            },
        )?;
        resolvers.register_cast(
            cast(Real, Boolean, dimension),
            CastResolver::ToBool {
                compare: OpCode::FOrdNotEqual,
                zero: Literal::zero(Real),
            },
        )?;
    }
    Ok(())
}

fn register_intrinsics(resolvers: &mut ResolverRegistry) -> Result<(), IrError> {
    for dimension in DIMENSIONS {
        let real = TypeSpec::with_dimension(ScalarKind::Real, dimension);
        let integer = TypeSpec::with_dimension(ScalarKind::Integer, dimension);
        let boolean = TypeSpec::with_dimension(ScalarKind::Boolean, dimension);

        resolvers.register_intrinsic(
            IntrinsicKey::new(real.clone(), "Reinterpret", vec![integer.clone()]),
            IntrinsicResolver::Instruction(OpCode::Bitcast),
        )?;
        resolvers.register_intrinsic(
            IntrinsicKey::new(integer, "Reinterpret", vec![real.clone()]),
            IntrinsicResolver::Instruction(OpCode::Bitcast),
        )?;

        for (name, opcode) in [("Any", OpCode::Any), ("All", OpCode::All)] {
            let resolver = if dimension == 1 {
                IntrinsicResolver::Identity
            } else {
                IntrinsicResolver::Instruction(opcode)
            };
            resolvers.register_intrinsic(IntrinsicKey::new(TypeSpec::Math, name, vec![boolean.clone()]), resolver)?;
        }

        if dimension > 1 {
            resolvers.register_intrinsic(
                IntrinsicKey::new(TypeSpec::Math, "Dot", vec![real.clone(), real]),
                IntrinsicResolver::Instruction(OpCode::Dot),
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn core() -> Library {
        build_core_library().unwrap()
    }

    #[test]
    fn test_core_library_is_translated() {
        let library = core();
        assert!(library.is_translated());
        assert!(!library.resolvers.is_empty());
    }

    #[test]
    fn test_comparison_opcodes_by_kind() {
        let library = core();
        let find = |ty: TypeSpec, op| library.find_binary_resolver(&BinaryOperatorKey::new(ty.clone(), ty, op));
        assert_eq!(
            find(TypeSpec::REAL, BinaryOperator::Less),
            Some(BinaryResolver::Instruction(OpCode::FOrdLessThan))
        );
        assert_eq!(
            find(TypeSpec::INTEGER, BinaryOperator::Equality),
            Some(BinaryResolver::Instruction(OpCode::IEqual))
        );
        assert_eq!(
            find(TypeSpec::BOOLEAN, BinaryOperator::Inequality),
            Some(BinaryResolver::Instruction(OpCode::LogicalNotEqual))
        );
        assert_eq!(
            find(TypeSpec::with_dimension(ScalarKind::Real, 3), BinaryOperator::Less),
            None
        );
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        let library = core();
        let key = BinaryOperatorKey::new(TypeSpec::BOOLEAN, TypeSpec::BOOLEAN, BinaryOperator::LogicalOr);
        assert_eq!(
            library.find_binary_resolver(&key),
            Some(BinaryResolver::ShortCircuit(ShortCircuit::Or))
        );
    }

    #[test]
    fn test_bool_casts() {
        let library = core();
        let to_int = TypeCastKey::new(TypeSpec::BOOLEAN, TypeSpec::INTEGER);
        assert_eq!(
            library.find_cast_resolver(&to_int),
            Some(CastResolver::FromBool {
                zero: Literal::Int(0),
                one: Literal::Int(1),
            })
        );
        let from_real = TypeCastKey::new(TypeSpec::with_dimension(ScalarKind::Real, 2), TypeSpec::with_dimension(ScalarKind::Boolean, 2));
        assert_eq!(
            library.find_cast_resolver(&from_real),
            Some(CastResolver::ToBool {
                compare: OpCode::FOrdNotEqual,
                zero: Literal::Real(0.0),
            })
        );
    }

    #[test]
    fn test_any_is_identity_for_scalars() {
        let library = core();
        let scalar = IntrinsicKey::new(TypeSpec::Math, "Any", vec![TypeSpec::BOOLEAN]);
        let vector = IntrinsicKey::new(TypeSpec::Math, "Any", vec![TypeSpec::with_dimension(ScalarKind::Boolean, 4)]);
        assert_eq!(library.find_intrinsic_resolver(&scalar), Some(IntrinsicResolver::Identity));
        assert_eq!(
            library.find_intrinsic_resolver(&vector),
            Some(IntrinsicResolver::Instruction(OpCode::Any))
        );
    }

    #[test]
    fn test_reinterpret_is_bitcast() {
        let library = core();
        let key = IntrinsicKey::new(TypeSpec::INTEGER, "Reinterpret", vec![TypeSpec::REAL]);
        assert_eq!(
            library.find_intrinsic_resolver(&key),
            Some(IntrinsicResolver::Instruction(OpCode::Bitcast))
        );
    }
}
