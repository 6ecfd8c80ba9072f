//! Language types to IR types

use fragc_common::{ScalarKind, TypeSpec};
use fragc_ir::{BaseKind, IrError, TypeRef, TypeRegistry};

fn scalar_type(registry: &mut TypeRegistry, kind: ScalarKind) -> TypeRef {
    let base = match kind {
        ScalarKind::Boolean => BaseKind::Bool,
        ScalarKind::Integer => BaseKind::Int,
        ScalarKind::Real => BaseKind::Float,
    };
    registry.create_or_find_type(kind.name(), base, 1, None)
}

/// Finds or creates the IR type of a builtin. Class types are resolved by
/// the translator, not here.
pub fn lower_builtin_type(registry: &mut TypeRegistry, spec: &TypeSpec) -> Result<TypeRef, IrError> {
    let name = spec
        .builtin_name()
        .ok_or_else(|| IrError::unsupported(format!("'{}' is not a builtin type", spec)))?;

    match spec {
        TypeSpec::Void => Ok(registry.create_or_find_type(&name, BaseKind::Void, 0, None)),
        TypeSpec::Scalar(kind) => Ok(scalar_type(registry, *kind)),
        TypeSpec::Vector { scalar, count } => {
            if !(2..=4).contains(count) {
                return Err(IrError::unsupported(format!("vector of {} components", count)));
            }
            let component = scalar_type(registry, *scalar);
            Ok(registry.create_or_find_type(&name, BaseKind::Vector, *count, Some(component)))
        }
        TypeSpec::Matrix { rows, columns } => {
            let column = lower_builtin_type(
                registry,
                &TypeSpec::Vector {
                    scalar: ScalarKind::Real,
                    count: *rows,
                },
            )?;
            Ok(registry.create_or_find_type(&name, BaseKind::Matrix, *columns, Some(column)))
        }
        TypeSpec::FixedArray { element, length } => {
            let element = lower_builtin_type(registry, element)?;
            Ok(registry.create_or_find_type(&name, BaseKind::FixedArray, *length, Some(element)))
        }
        TypeSpec::Class(_) | TypeSpec::Math => Err(IrError::unsupported(format!("'{}' is not a builtin type", spec))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_types_are_shared() {
        let mut registry = TypeRegistry::new();
        let real3 = lower_builtin_type(&mut registry, &TypeSpec::with_dimension(ScalarKind::Real, 3)).unwrap();
        let again = lower_builtin_type(&mut registry, &TypeSpec::with_dimension(ScalarKind::Real, 3)).unwrap();
        assert_eq!(real3, again);
        assert_eq!(registry.name(real3), "Real3");
        assert_eq!(registry.find_type("Real"), registry.get(real3).component_type);
    }

    #[test]
    fn test_matrix_columns() {
        let mut registry = TypeRegistry::new();
        let matrix = lower_builtin_type(&mut registry, &TypeSpec::Matrix { rows: 4, columns: 4 }).unwrap();
        assert_eq!(registry.name(matrix), "Real4x4");
        assert_eq!(registry.byte_size(matrix).unwrap(), 64);
        assert_eq!(registry.byte_alignment(matrix).unwrap(), 16);
    }

    #[test]
    fn test_math_has_no_type() {
        let mut registry = TypeRegistry::new();
        assert!(lower_builtin_type(&mut registry, &TypeSpec::Math).is_err());
    }
}
