//! Syntax tree of a shader fragment
//!
//! The tree is produced by the host front end with every reference already
//! resolved to a semantic identity (`TypeId`, `FunctionId`, `PropertyId`,
//! `LocalId`). Nodes are plain data and never point at each other.

pub mod expressions;
pub mod statements;

pub use expressions::{AccessedMember, Expression, ExpressionKind, IoMode, MemberAccess};
pub use statements::{IfPart, Statement, StatementKind};

use fragc_common::{FunctionId, LocalId, PropertyId, SourceLocation, TypeId, TypeSpec};
use serde::{Deserialize, Serialize};

/// Root of a compiled fragment unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyntaxTree {
    #[serde(default)]
    pub classes: Vec<ClassNode>,
}

impl SyntaxTree {
    pub fn new(classes: Vec<ClassNode>) -> Self {
        Self { classes }
    }

    /// Appends another tree's classes
    pub fn merge(&mut self, other: SyntaxTree) {
        self.classes.extend(other.classes);
    }

    pub fn find_class(&self, id: TypeId) -> Option<&ClassNode> {
        self.classes.iter().find(|class| class.type_id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassNode {
    pub type_id: TypeId,
    pub name: String,
    #[serde(default)]
    pub location: SourceLocation,
    /// Runs the member variable initializers
    #[serde(default)]
    pub pre_constructor: Option<FunctionId>,
    #[serde(default)]
    pub variables: Vec<MemberVariableNode>,
    #[serde(default)]
    pub constructors: Vec<ConstructorNode>,
    #[serde(default)]
    pub functions: Vec<FunctionNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberVariableNode {
    pub property: PropertyId,
    pub name: String,
    pub ty: TypeSpec,
    #[serde(default)]
    pub location: SourceLocation,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub initial_value: Option<Expression>,
    #[serde(default)]
    pub get: Option<FunctionNode>,
    #[serde(default)]
    pub set: Option<FunctionNode>,
}

impl MemberVariableNode {
    /// A stored field rather than a get/set property
    pub fn is_field(&self) -> bool {
        self.get.is_none() && self.set.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterNode {
    pub local: LocalId,
    pub name: String,
    pub ty: TypeSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionNode {
    pub function: FunctionId,
    pub name: String,
    #[serde(default)]
    pub location: SourceLocation,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub parameters: Vec<ParameterNode>,
    #[serde(default = "void_type")]
    pub return_type: TypeSpec,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructorNode {
    pub function: FunctionId,
    #[serde(default)]
    pub location: SourceLocation,
    #[serde(default)]
    pub parameters: Vec<ParameterNode>,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

fn void_type() -> TypeSpec {
    TypeSpec::Void
}

/// Hands out fresh semantic identities, for front ends and tests that
/// assemble trees by hand
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    next_type: u32,
    next_function: u32,
    next_property: u32,
    next_local: u32,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_id(&mut self) -> TypeId {
        self.next_type += 1;
        TypeId(self.next_type)
    }

    pub fn function_id(&mut self) -> FunctionId {
        self.next_function += 1;
        FunctionId(self.next_function)
    }

    pub fn property_id(&mut self) -> PropertyId {
        self.next_property += 1;
        PropertyId(self.next_property)
    }

    pub fn local_id(&mut self) -> LocalId {
        self.next_local += 1;
        LocalId(self.next_local)
    }
}

impl ClassNode {
    pub fn new(type_id: TypeId, name: &str) -> Self {
        Self {
            type_id,
            name: name.to_string(),
            location: SourceLocation::dummy(),
            pre_constructor: None,
            variables: Vec::new(),
            constructors: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    pub fn find_function(&self, id: FunctionId) -> Option<&FunctionNode> {
        self.functions.iter().find(|f| f.function == id)
    }
}

impl FunctionNode {
    pub fn new(function: FunctionId, name: &str, return_type: TypeSpec) -> Self {
        Self {
            function,
            name: name.to_string(),
            location: SourceLocation::dummy(),
            is_static: false,
            parameters: Vec::new(),
            return_type,
            statements: Vec::new(),
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    pub fn with_parameter(mut self, local: LocalId, name: &str, ty: TypeSpec) -> Self {
        self.parameters.push(ParameterNode {
            local,
            name: name.to_string(),
            ty,
        });
        self
    }

    pub fn with_statements(mut self, statements: Vec<Statement>) -> Self {
        self.statements = statements;
        self
    }

    pub fn into_static(mut self) -> Self {
        self.is_static = true;
        self
    }
}

impl MemberVariableNode {
    pub fn new(property: PropertyId, name: &str, ty: TypeSpec) -> Self {
        Self {
            property,
            name: name.to_string(),
            ty,
            location: SourceLocation::dummy(),
            is_static: false,
            initial_value: None,
            get: None,
            set: None,
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    pub fn with_initial_value(mut self, value: Expression) -> Self {
        self.initial_value = Some(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fragc_common::Literal;

    #[test]
    fn test_id_generator() {
        let mut ids = IdGenerator::new();
        assert_eq!(ids.function_id(), FunctionId(1));
        assert_eq!(ids.function_id(), FunctionId(2));
        assert_eq!(ids.type_id(), TypeId(1));
        assert_eq!(ids.property_id(), PropertyId(1));
    }

    #[test]
    fn test_merge_trees() {
        let mut first = SyntaxTree::new(vec![ClassNode::new(TypeId(1), "A")]);
        first.merge(SyntaxTree::new(vec![ClassNode::new(TypeId(2), "B")]));
        assert_eq!(first.classes.len(), 2);
        assert_eq!(first.find_class(TypeId(2)).map(|c| c.name.as_str()), Some("B"));
    }

    #[test]
    fn test_tree_json_round_trip() {
        let class = ClassNode {
            variables: vec![MemberVariableNode::new(PropertyId(1), "Scale", TypeSpec::REAL)
                .with_initial_value(Expression::literal(Literal::Real(2.0)))],
            ..ClassNode::new(TypeId(1), "Material")
        };
        let tree = SyntaxTree::new(vec![class]);
        let json = serde_json::to_string(&tree).unwrap();
        let parsed: SyntaxTree = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{"classes":[{"type_id":3,"name":"Empty","functions":[{"function":1,"name":"Main"}]}]}"#;
        let tree: SyntaxTree = serde_json::from_str(json).unwrap();
        let function = &tree.classes[0].functions[0];
        assert_eq!(function.return_type, TypeSpec::Void);
        assert!(function.statements.is_empty());
        assert_eq!(tree.classes[0].pre_constructor, None);
    }
}
