//! Statement nodes

use super::expressions::Expression;
use fragc_common::{BinaryOperator, LocalId, SourceLocation, TypeSpec};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub kind: StatementKind,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatementKind {
    Expression(Expression),
    LocalVariable {
        local: LocalId,
        name: String,
        ty: TypeSpec,
        initial_value: Option<Expression>,
    },
    /// `target = value`, or `target op= value` for compound assignment
    Assign {
        target: Expression,
        op: Option<BinaryOperator>,
        value: Expression,
    },
    Return(Option<Expression>),
    /// `if` / `else if` / `else` chain; only the last part may lack a condition
    If { parts: Vec<IfPart> },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    For {
        initializer: Option<Box<Statement>>,
        condition: Option<Expression>,
        iterator: Option<Box<Statement>>,
        body: Vec<Statement>,
    },
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfPart {
    pub condition: Option<Expression>,
    pub body: Vec<Statement>,
}

impl Statement {
    pub fn new(kind: StatementKind) -> Self {
        Self {
            kind,
            location: SourceLocation::dummy(),
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    pub fn expression(expression: Expression) -> Self {
        let location = expression.location.clone();
        Self::new(StatementKind::Expression(expression)).at(location)
    }

    pub fn ret(value: Option<Expression>) -> Self {
        Self::new(StatementKind::Return(value))
    }

    pub fn local(local: LocalId, name: &str, ty: TypeSpec, initial_value: Option<Expression>) -> Self {
        Self::new(StatementKind::LocalVariable {
            local,
            name: name.to_string(),
            ty,
            initial_value,
        })
    }

    pub fn assign(target: Expression, value: Expression) -> Self {
        Self::new(StatementKind::Assign {
            target: target.for_write(),
            op: None,
            value,
        })
    }

    pub fn compound_assign(target: Expression, op: BinaryOperator, value: Expression) -> Self {
        Self::new(StatementKind::Assign {
            target,
            op: Some(op),
            value,
        })
    }

    pub fn if_else(condition: Expression, then_body: Vec<Statement>, else_body: Option<Vec<Statement>>) -> Self {
        let mut parts = vec![IfPart {
            condition: Some(condition),
            body: then_body,
        }];
        if let Some(body) = else_body {
            parts.push(IfPart { condition: None, body });
        }
        Self::new(StatementKind::If { parts })
    }

    pub fn while_loop(condition: Expression, body: Vec<Statement>) -> Self {
        Self::new(StatementKind::While { condition, body })
    }
}
