//! Buffer layout queries for ad-hoc structs of builtin types

use fragc_common::{ScalarKind, TypeSpec};
use fragc_frontend::translate::lower_builtin_type;
use fragc_ir::{IrError, TypeRegistry};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error(transparent)]
    Ir(#[from] IrError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberLayout {
    pub name: String,
    pub type_name: String,
    pub offset: u32,
    pub size: u32,
    pub alignment: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructLayout {
    pub members: Vec<MemberLayout>,
    pub size: u32,
    pub alignment: u32,
}

/// Parses `Real`, `Integer3`, `Real4x4` and `Real3[8]` style names
pub fn parse_type_name(name: &str) -> Option<TypeSpec> {
    if let Some(open) = name.find('[') {
        let length = name[open + 1..].strip_suffix(']')?.parse().ok()?;
        let element = parse_type_name(&name[..open])?;
        return Some(TypeSpec::FixedArray {
            element: Box::new(element),
            length,
        });
    }

    let (scalar, rest) = ScalarKind::ALL
        .iter()
        .find_map(|kind| name.strip_prefix(kind.name()).map(|rest| (*kind, rest)))?;
    if rest.is_empty() {
        return Some(TypeSpec::Scalar(scalar));
    }
    if let Some((rows, columns)) = rest.split_once('x') {
        if scalar != ScalarKind::Real {
            return None;
        }
        return Some(TypeSpec::Matrix {
            rows: rows.parse().ok()?,
            columns: columns.parse().ok()?,
        });
    }
    let count: u32 = rest.parse().ok()?;
    (2..=4).contains(&count).then(|| TypeSpec::Vector { scalar, count })
}

/// Lays out `members` as one struct in declaration order
pub fn struct_layout(members: &[(String, String)]) -> Result<StructLayout, LayoutError> {
    let mut registry = TypeRegistry::new();
    let owner = registry.create_struct("Layout");
    for (name, type_name) in members {
        let spec = parse_type_name(type_name).ok_or_else(|| LayoutError::UnknownType(type_name.clone()))?;
        let ty = lower_builtin_type(&mut registry, &spec)?;
        registry.add_member(owner, ty, name)?;
    }

    let mut layouts = Vec::with_capacity(members.len());
    for (index, (name, type_name)) in members.iter().enumerate() {
        let index = index as u32;
        let layout = registry.layout(registry.sub_type(owner, index)?)?;
        layouts.push(MemberLayout {
            name: name.clone(),
            type_name: type_name.clone(),
            offset: registry.member_offset(owner, index)?,
            size: layout.size,
            alignment: layout.alignment,
        });
    }

    let layout = registry.layout(owner)?;
    Ok(StructLayout {
        members: layouts,
        size: layout.size,
        alignment: layout.alignment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn members(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter().map(|(n, t)| (n.to_string(), t.to_string())).collect()
    }

    #[test]
    fn test_parse_type_name() {
        assert_eq!(parse_type_name("Real"), Some(TypeSpec::REAL));
        assert_eq!(
            parse_type_name("Integer3"),
            Some(TypeSpec::with_dimension(ScalarKind::Integer, 3))
        );
        assert_eq!(parse_type_name("Real4x3"), Some(TypeSpec::Matrix { rows: 4, columns: 3 }));
        assert_eq!(
            parse_type_name("Real[2]"),
            Some(TypeSpec::FixedArray {
                element: Box::new(TypeSpec::REAL),
                length: 2
            })
        );
        assert_eq!(parse_type_name("Integer2x2"), None);
        assert_eq!(parse_type_name("Real5"), None);
        assert_eq!(parse_type_name("Vec3"), None);
    }

    #[test]
    fn test_vec3_after_float() {
        let layout = struct_layout(&members(&[("a", "Real"), ("b", "Real3")])).unwrap();
        assert_eq!(layout.members[1].offset, 16);
        assert_eq!(layout.members[1].size, 12);
        assert_eq!(layout.size, 32);
        assert_eq!(layout.alignment, 16);
    }

    #[test]
    fn test_scalar_array_elements_are_padded() {
        let layout = struct_layout(&members(&[("weights", "Real[4]"), ("count", "Integer")])).unwrap();
        assert_eq!(layout.members[0].alignment, 16);
        assert_eq!(layout.members[0].size, 64);
        assert_eq!(layout.members[1].offset, 64);
    }

    #[test]
    fn test_unknown_member_type() {
        assert!(matches!(
            struct_layout(&members(&[("a", "Quaternion")])),
            Err(LayoutError::UnknownType(name)) if name == "Quaternion"
        ));
    }
}
