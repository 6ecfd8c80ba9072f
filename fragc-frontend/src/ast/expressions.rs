//! Expression nodes

use fragc_common::{
    BinaryOperator, FunctionId, Literal, LocalId, PropertyId, ScalarKind, SourceLocation, TypeSpec, UnaryOperator,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub kind: ExpressionKind,
    /// Resolved result type
    pub ty: TypeSpec,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionKind {
    Literal(Literal),
    Local(LocalId),
    This,
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    /// Conversion of `operand` to the expression's type
    Cast { operand: Box<Expression> },
    MemberAccess(MemberAccess),
    Call {
        access: MemberAccess,
        arguments: Vec<Expression>,
    },
    /// `new T(args)` for classes, `Real3(...)` style for builtins.
    /// Classes without a constructor run only their pre-constructor.
    Construct {
        constructor: Option<FunctionId>,
        arguments: Vec<Expression>,
    },
}

/// `target.name`, or a static access when `target` is `None`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberAccess {
    pub target: Option<Box<Expression>>,
    pub name: String,
    pub accessed: AccessedMember,
    #[serde(default)]
    pub io: IoMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AccessedMember {
    Function(FunctionId),
    Property(PropertyId),
    GetterSetter {
        get: Option<FunctionId>,
        set: Option<FunctionId>,
    },
    /// Builtin function resolved through the intrinsic table
    Intrinsic { owner: TypeSpec },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IoMode {
    #[default]
    Read,
    Write,
    ReadWrite,
}

impl Expression {
    pub fn new(kind: ExpressionKind, ty: TypeSpec) -> Self {
        Self {
            kind,
            ty,
            location: SourceLocation::dummy(),
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    pub fn literal(value: Literal) -> Self {
        let ty = TypeSpec::Scalar(value.scalar_kind());
        Self::new(ExpressionKind::Literal(value), ty)
    }

    pub fn boolean(value: bool) -> Self {
        Self::literal(Literal::Bool(value))
    }

    pub fn local(local: LocalId, ty: TypeSpec) -> Self {
        Self::new(ExpressionKind::Local(local), ty)
    }

    pub fn this(ty: TypeSpec) -> Self {
        Self::new(ExpressionKind::This, ty)
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        let ty = if op.is_comparison() || matches!(op, BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr) {
            TypeSpec::with_dimension(ScalarKind::Boolean, left.ty.dimension().unwrap_or(1))
        } else {
            left.ty.clone()
        };
        Self::new(
            ExpressionKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        )
    }

    pub fn unary(op: UnaryOperator, operand: Expression) -> Self {
        let ty = operand.ty.clone();
        Self::new(
            ExpressionKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
        )
    }

    pub fn cast(operand: Expression, ty: TypeSpec) -> Self {
        Self::new(
            ExpressionKind::Cast {
                operand: Box::new(operand),
            },
            ty,
        )
    }

    pub fn call(target: Option<Expression>, name: &str, function: FunctionId, arguments: Vec<Expression>, ty: TypeSpec) -> Self {
        Self::new(
            ExpressionKind::Call {
                access: MemberAccess::new(target, name, AccessedMember::Function(function)),
                arguments,
            },
            ty,
        )
    }

    pub fn intrinsic(owner: TypeSpec, name: &str, arguments: Vec<Expression>, ty: TypeSpec) -> Self {
        Self::new(
            ExpressionKind::Call {
                access: MemberAccess::new(None, name, AccessedMember::Intrinsic { owner }),
                arguments,
            },
            ty,
        )
    }

    pub fn property(target: Expression, name: &str, property: PropertyId, ty: TypeSpec) -> Self {
        Self::new(
            ExpressionKind::MemberAccess(MemberAccess::new(Some(target), name, AccessedMember::Property(property))),
            ty,
        )
    }

    pub fn construct(ty: TypeSpec, constructor: Option<FunctionId>, arguments: Vec<Expression>) -> Self {
        Self::new(ExpressionKind::Construct { constructor, arguments }, ty)
    }

    /// Marks a member access as the target of a write
    pub fn for_write(mut self) -> Self {
        if let ExpressionKind::MemberAccess(access) = &mut self.kind {
            access.io = IoMode::Write;
        }
        self
    }
}

impl MemberAccess {
    pub fn new(target: Option<Expression>, name: &str, accessed: AccessedMember) -> Self {
        Self {
            target: target.map(Box::new),
            name: name.to_string(),
            accessed,
            io: IoMode::Read,
        }
    }
}
