//! Host interpreter handle used to snapshot member default values
//!
//! After translation the driver default-constructs every class through the
//! host and reads each stored property back. `InitializerHost` is the
//! interpreter the JSON front end hands out: it runs the translated default
//! constructor, or the pre-constructor when there is none, with the IR
//! evaluator.

use fragc_common::{PropertyId, TypeId};
use fragc_ir::eval::{zero_value, DEFAULT_STEP_LIMIT};
use fragc_ir::{EvalError, Evaluator, Library, RuntimeValue};
use log::trace;
use thiserror::Error;

/// Failure raised inside the host interpreter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostException {
    #[error("unknown class {0}")]
    UnknownClass(TypeId),

    #[error("{class} has no readable property {property}")]
    UnknownProperty { class: String, property: PropertyId },

    #[error("constructing {class} failed: {source}")]
    Construction {
        class: String,
        #[source]
        source: EvalError,
    },
}

/// An object created by the host interpreter
#[derive(Debug, Clone, PartialEq)]
pub struct HostObject {
    pub type_id: TypeId,
    pub class_name: String,
    /// Stored fields in struct member order
    pub value: RuntimeValue,
}

/// Interpreter handle returned by a front end alongside its syntax tree
pub trait HostLibrary {
    /// Creates an instance of `ty` the way `new T()` would
    fn default_construct(&mut self, library: &Library, ty: TypeId) -> Result<HostObject, HostException>;

    fn get_property(
        &mut self,
        library: &Library,
        object: &HostObject,
        property: PropertyId,
    ) -> Result<RuntimeValue, HostException>;
}

/// Runs translated constructors to produce default instances
#[derive(Debug, Clone)]
pub struct InitializerHost {
    step_limit: usize,
}

impl Default for InitializerHost {
    fn default() -> Self {
        Self::new()
    }
}

impl InitializerHost {
    pub fn new() -> Self {
        Self {
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    /// Caps the blocks a single construction may execute
    pub fn with_step_limit(mut self, step_limit: usize) -> Self {
        self.step_limit = step_limit;
        self
    }
}

impl HostLibrary for InitializerHost {
    fn default_construct(&mut self, library: &Library, ty: TypeId) -> Result<HostObject, HostException> {
        let meta = library.resolve_type_meta(ty).ok_or(HostException::UnknownClass(ty))?;
        let failed = |source| HostException::Construction {
            class: meta.name.clone(),
            source,
        };

        let (owner, ir_type) = library.find_class_type(ty).ok_or(HostException::UnknownClass(ty))?;

        let mut eval = Evaluator::new(library).with_step_limit(self.step_limit);
        let this = eval.allocate(zero_value(owner, ir_type));
        if let Some(constructor) = meta.default_constructor.or(meta.pre_constructor) {
            eval.call(constructor, vec![this.clone()]).map_err(failed)?;
        }
        let value = eval.read(&this).map_err(failed)?;
        trace!("default {} = {}", meta.name, value);

        Ok(HostObject {
            type_id: ty,
            class_name: meta.name.clone(),
            value,
        })
    }

    fn get_property(
        &mut self,
        library: &Library,
        object: &HostObject,
        property: PropertyId,
    ) -> Result<RuntimeValue, HostException> {
        let unknown = || HostException::UnknownProperty {
            class: object.class_name.clone(),
            property,
        };
        let index = library
            .resolve_type_meta(object.type_id)
            .and_then(|meta| meta.fields.iter().find(|field| field.property == property))
            .and_then(|field| field.member_index)
            .ok_or_else(unknown)?;
        match &object.value {
            RuntimeValue::Composite(fields) => fields.get(index as usize).cloned().ok_or_else(unknown),
            _ => Err(unknown()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fragc_common::{BinaryOperator, ErrorReporter, Literal, ScalarKind, TypeSpec};
    use fragc_frontend::{
        build_core_library, ClassNode, ConstructorNode, Expression, IdGenerator, MemberVariableNode, ShaderTranslator,
        Statement, SyntaxTree, Translator,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn real(value: f32) -> Expression {
        Expression::literal(Literal::Real(value))
    }

    fn translated(tree: &SyntaxTree) -> Library {
        let mut library = Library::new("Host");
        library.set_dependencies(vec![Arc::new(build_core_library().unwrap())]);
        let mut errors = ErrorReporter::new();
        assert!(ShaderTranslator::new().translate(tree, &mut library, &mut errors), "{}", errors.summary());
        library
    }

    #[test]
    fn test_initializers_are_evaluated() {
        let mut ids = IdGenerator::new();
        let ty = ids.type_id();
        let (scale, tint, count) = (ids.property_id(), ids.property_id(), ids.property_id());
        let real3 = TypeSpec::with_dimension(ScalarKind::Real, 3);
        let class = ClassNode {
            variables: vec![
                MemberVariableNode::new(scale, "Scale", TypeSpec::REAL)
                    .with_initial_value(Expression::binary(BinaryOperator::Multiply, real(2.0), real(1.5))),
                MemberVariableNode::new(tint, "Tint", real3.clone())
                    .with_initial_value(Expression::construct(real3, None, vec![real(0.5)])),
                MemberVariableNode::new(count, "Count", TypeSpec::INTEGER),
            ],
            ..ClassNode::new(ty, "Material")
        };
        let library = translated(&SyntaxTree::new(vec![class]));
        let mut host = InitializerHost::new();

        let object = host.default_construct(&library, ty).unwrap();
        assert_eq!(host.get_property(&library, &object, scale).unwrap(), RuntimeValue::Real(3.0));
        assert_eq!(
            host.get_property(&library, &object, tint).unwrap(),
            RuntimeValue::Composite(vec![RuntimeValue::Real(0.5); 3])
        );
        assert_eq!(host.get_property(&library, &object, count).unwrap(), RuntimeValue::Int(0));
    }

    #[test]
    fn test_modulo_default_matches_shader() {
        let mut ids = IdGenerator::new();
        let ty = ids.type_id();
        let rest = ids.property_id();
        let class = ClassNode {
            variables: vec![MemberVariableNode::new(rest, "Rest", TypeSpec::INTEGER).with_initial_value(
                Expression::binary(
                    BinaryOperator::Modulo,
                    Expression::literal(Literal::Int(-7)),
                    Expression::literal(Literal::Int(3)),
                ),
            )],
            ..ClassNode::new(ty, "Wrap")
        };
        let library = translated(&SyntaxTree::new(vec![class]));
        let mut host = InitializerHost::new();

        let object = host.default_construct(&library, ty).unwrap();
        assert_eq!(host.get_property(&library, &object, rest).unwrap(), RuntimeValue::Int(2));
    }

    #[test]
    fn test_default_constructor_runs_after_initializers() {
        // class Gain { var Level: Real = 1.0; constructor() { this.Level = this.Level + 0.5; } }
        let mut ids = IdGenerator::new();
        let ty = ids.type_id();
        let level = ids.property_id();
        let this = || Expression::this(TypeSpec::Class(ty));
        let read = Expression::property(this(), "Level", level, TypeSpec::REAL);
        let class = ClassNode {
            variables: vec![MemberVariableNode::new(level, "Level", TypeSpec::REAL).with_initial_value(real(1.0))],
            constructors: vec![ConstructorNode {
                function: ids.function_id(),
                location: Default::default(),
                parameters: Vec::new(),
                statements: vec![Statement::assign(
                    Expression::property(this(), "Level", level, TypeSpec::REAL),
                    Expression::binary(BinaryOperator::Add, read, real(0.5)),
                )],
            }],
            ..ClassNode::new(ty, "Gain")
        };
        let library = translated(&SyntaxTree::new(vec![class]));
        let mut host = InitializerHost::new();

        let object = host.default_construct(&library, ty).unwrap();
        assert_eq!(host.get_property(&library, &object, level).unwrap(), RuntimeValue::Real(1.5));
    }

    #[test]
    fn test_unknown_property() {
        let mut ids = IdGenerator::new();
        let ty = ids.type_id();
        let class = ClassNode {
            variables: vec![MemberVariableNode::new(ids.property_id(), "A", TypeSpec::INTEGER)],
            ..ClassNode::new(ty, "Plain")
        };
        let library = translated(&SyntaxTree::new(vec![class]));
        let mut host = InitializerHost::new();

        let object = host.default_construct(&library, ty).unwrap();
        let missing = ids.property_id();
        assert_eq!(
            host.get_property(&library, &object, missing),
            Err(HostException::UnknownProperty {
                class: "Plain".to_string(),
                property: missing,
            })
        );
    }

    #[test]
    fn test_unknown_class() {
        let library = Library::new("Empty");
        let mut host = InitializerHost::new();
        assert_eq!(
            host.default_construct(&library, TypeId(4)),
            Err(HostException::UnknownClass(TypeId(4)))
        );
    }
}
