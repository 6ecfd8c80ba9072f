//! Common types used throughout the compiler
//!
//! Semantic identities assigned by the host front end, the type
//! descriptions the syntax tree uses, and operator tags. These are the
//! interned keys the resolver tables and the cycle detector work with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

macro_rules! semantic_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

semantic_id!(
    /// Identity of a class type
    TypeId, "type#"
);
semantic_id!(
    /// Identity of a function, constructor, accessor or pre-constructor
    FunctionId, "fn#"
);
semantic_id!(
    /// Identity of a member variable (property)
    PropertyId, "prop#"
);
semantic_id!(
    /// Identity of a parameter or local variable within one function
    LocalId, "local#"
);

/// Scalar families of the fragment language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Boolean,
    Integer,
    Real,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 3] = [ScalarKind::Boolean, ScalarKind::Integer, ScalarKind::Real];

    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Boolean => "Boolean",
            ScalarKind::Integer => "Integer",
            ScalarKind::Real => "Real",
        }
    }
}

/// A fragment language type as it appears in the syntax tree.
///
/// Builtin types are described structurally; user classes are referred to by
/// their semantic identity. `Math` is the static owner of free intrinsics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeSpec {
    Void,
    Scalar(ScalarKind),
    Vector { scalar: ScalarKind, count: u32 },
    Matrix { rows: u32, columns: u32 },
    FixedArray { element: Box<TypeSpec>, length: u32 },
    Class(TypeId),
    Math,
}

impl TypeSpec {
    pub const BOOLEAN: TypeSpec = TypeSpec::Scalar(ScalarKind::Boolean);
    pub const INTEGER: TypeSpec = TypeSpec::Scalar(ScalarKind::Integer);
    pub const REAL: TypeSpec = TypeSpec::Scalar(ScalarKind::Real);

    /// Scalar for a dimension of 1, vector otherwise
    pub fn with_dimension(scalar: ScalarKind, dimension: u32) -> TypeSpec {
        if dimension <= 1 {
            TypeSpec::Scalar(scalar)
        } else {
            TypeSpec::Vector { scalar, count: dimension }
        }
    }

    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            TypeSpec::Scalar(kind) | TypeSpec::Vector { scalar: kind, .. } => Some(*kind),
            TypeSpec::Matrix { .. } => Some(ScalarKind::Real),
            _ => None,
        }
    }

    /// Number of scalar lanes for scalars and vectors
    pub fn dimension(&self) -> Option<u32> {
        match self {
            TypeSpec::Scalar(_) => Some(1),
            TypeSpec::Vector { count, .. } => Some(*count),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeSpec::Void)
    }

    pub fn is_boolean(&self) -> bool {
        self.scalar_kind() == Some(ScalarKind::Boolean) && !matches!(self, TypeSpec::Matrix { .. })
    }

    pub fn is_class(&self) -> bool {
        matches!(self, TypeSpec::Class(_))
    }

    /// Registry name for builtin types. Classes are named by their declaration.
    pub fn builtin_name(&self) -> Option<String> {
        match self {
            TypeSpec::Void => Some("Void".to_string()),
            TypeSpec::Scalar(kind) => Some(kind.name().to_string()),
            TypeSpec::Vector { scalar, count } => Some(format!("{}{}", scalar.name(), count)),
            TypeSpec::Matrix { rows, columns } => Some(format!("Real{}x{}", rows, columns)),
            TypeSpec::FixedArray { element, length } => {
                let element = element.builtin_name()?;
                Some(format!("FixedArray[{}, {}]", element, length))
            }
            TypeSpec::Class(_) | TypeSpec::Math => None,
        }
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Class(id) => write!(f, "class {}", id),
            TypeSpec::Math => write!(f, "Math"),
            TypeSpec::FixedArray { element, length } => write!(f, "FixedArray[{}, {}]", element, length),
            other => match other.builtin_name() {
                Some(name) => write!(f, "{}", name),
                None => write!(f, "<unnamed>"),
            },
        }
    }
}

/// Literal values appearing in source and in the IR constant table.
///
/// Equality and hashing of `Real` use the bit pattern so literals can key
/// the constant deduplication map.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Literal {
    Bool(bool),
    Int(i32),
    Real(f32),
}

impl Literal {
    fn key(&self) -> (u8, u32) {
        match self {
            Literal::Bool(b) => (0, *b as u32),
            Literal::Int(i) => (1, *i as u32),
            Literal::Real(r) => (2, r.to_bits()),
        }
    }

    pub fn scalar_kind(&self) -> ScalarKind {
        match self {
            Literal::Bool(_) => ScalarKind::Boolean,
            Literal::Int(_) => ScalarKind::Integer,
            Literal::Real(_) => ScalarKind::Real,
        }
    }

    /// The zero value of a scalar family
    pub fn zero(kind: ScalarKind) -> Literal {
        match kind {
            ScalarKind::Boolean => Literal::Bool(false),
            ScalarKind::Integer => Literal::Int(0),
            ScalarKind::Real => Literal::Real(0.0),
        }
    }

    pub fn one(kind: ScalarKind) -> Literal {
        match kind {
            ScalarKind::Boolean => Literal::Bool(true),
            ScalarKind::Integer => Literal::Int(1),
            ScalarKind::Real => Literal::Real(1.0),
        }
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Real(r) => write!(f, "{:?}", r),
        }
    }
}

/// Binary operators of the fragment language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equality,
    Inequality,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOperator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Equality
                | BinaryOperator::Inequality
                | BinaryOperator::Less
                | BinaryOperator::LessEqual
                | BinaryOperator::Greater
                | BinaryOperator::GreaterEqual
        )
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equality => "==",
            BinaryOperator::Inequality => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::LogicalAnd => "&&",
            BinaryOperator::LogicalOr => "||",
        };
        write!(f, "{}", symbol)
    }
}

/// Unary operators of the fragment language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Negate,
    LogicalNot,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
            UnaryOperator::LogicalNot => write!(f, "!"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_names() {
        assert_eq!(TypeSpec::REAL.builtin_name().as_deref(), Some("Real"));
        assert_eq!(
            TypeSpec::Vector { scalar: ScalarKind::Boolean, count: 3 }.builtin_name().as_deref(),
            Some("Boolean3")
        );
        assert_eq!(TypeSpec::Matrix { rows: 3, columns: 4 }.builtin_name().as_deref(), Some("Real3x4"));
        assert_eq!(TypeSpec::Class(TypeId(2)).builtin_name(), None);
    }

    #[test]
    fn test_with_dimension() {
        assert_eq!(TypeSpec::with_dimension(ScalarKind::Integer, 1), TypeSpec::INTEGER);
        assert_eq!(
            TypeSpec::with_dimension(ScalarKind::Integer, 4),
            TypeSpec::Vector { scalar: ScalarKind::Integer, count: 4 }
        );
    }

    #[test]
    fn test_literal_keys_use_bits() {
        let mut set = HashSet::new();
        set.insert(Literal::Real(0.0));
        set.insert(Literal::Real(-0.0));
        set.insert(Literal::Real(0.0));
        set.insert(Literal::Int(0));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_semantic_id_display() {
        assert_eq!(FunctionId(7).to_string(), "fn#7");
        assert_eq!(PropertyId(1).to_string(), "prop#1");
    }
}
