//! Tests for bool conversions and reinterpretation

use fragc_common::{ErrorReporter, FunctionId, ScalarKind, TypeSpec};
use fragc_frontend::{
    build_core_library, ClassNode, Expression, FunctionNode, IdGenerator, Statement, SyntaxTree, ShaderTranslator,
    Translator,
};
use fragc_ir::{Evaluator, Library, OpCode, RuntimeValue};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn translate(functions: Vec<FunctionNode>) -> Library {
    let mut ids = IdGenerator::new();
    let class = ClassNode {
        functions,
        ..ClassNode::new(ids.type_id(), "Conversions")
    };
    let mut library = Library::new("Conversions");
    library.set_dependencies(vec![Arc::new(build_core_library().unwrap())]);
    let mut errors = ErrorReporter::new();
    let ok = ShaderTranslator::new().translate(&SyntaxTree::new(vec![class]), &mut library, &mut errors);
    assert!(ok, "{}", errors.summary());
    library
}

fn call(library: &Library, id: FunctionId, arg: RuntimeValue) -> RuntimeValue {
    let function = library.find_function(id).unwrap();
    Evaluator::new(library).call(function, vec![arg]).unwrap().unwrap()
}

#[test]
fn test_int_bool_int_round_trip() {
    let mut ids = IdGenerator::new();
    let id = ids.function_id();
    let x = ids.local_id();
    let as_bool = Expression::cast(Expression::local(x, TypeSpec::INTEGER), TypeSpec::BOOLEAN);
    let back = Expression::cast(as_bool, TypeSpec::INTEGER);
    let function = FunctionNode::new(id, "RoundTrip", TypeSpec::INTEGER)
        .into_static()
        .with_parameter(x, "x", TypeSpec::INTEGER)
        .with_statements(vec![Statement::ret(Some(back))]);
    let library = translate(vec![function]);

    assert_eq!(call(&library, id, RuntimeValue::Int(0)), RuntimeValue::Int(0));
    assert_eq!(call(&library, id, RuntimeValue::Int(7)), RuntimeValue::Int(1));
    assert_eq!(call(&library, id, RuntimeValue::Int(-3)), RuntimeValue::Int(1));

    let body = library.function(library.find_function(id).unwrap()).unwrap();
    let opcodes: Vec<OpCode> = body.blocks().flat_map(|b| b.ops.iter().map(|op| op.opcode)).collect();
    assert!(opcodes.contains(&OpCode::INotEqual));
    assert!(opcodes.contains(&OpCode::Select));
}

#[test]
fn test_vector_real_to_bool_uses_splat_zero() {
    let mut ids = IdGenerator::new();
    let id = ids.function_id();
    let x = ids.local_id();
    let real3 = TypeSpec::with_dimension(ScalarKind::Real, 3);
    let boolean3 = TypeSpec::with_dimension(ScalarKind::Boolean, 3);

    let splat = Expression::construct(real3, None, vec![Expression::local(x, TypeSpec::REAL)]);
    let any = Expression::intrinsic(
        TypeSpec::Math,
        "Any",
        vec![Expression::cast(splat, boolean3)],
        TypeSpec::BOOLEAN,
    );
    let function = FunctionNode::new(id, "AnyNonZero", TypeSpec::BOOLEAN)
        .into_static()
        .with_parameter(x, "x", TypeSpec::REAL)
        .with_statements(vec![Statement::ret(Some(any))]);
    let library = translate(vec![function]);

    assert_eq!(call(&library, id, RuntimeValue::Real(0.0)), RuntimeValue::Bool(false));
    assert_eq!(call(&library, id, RuntimeValue::Real(2.5)), RuntimeValue::Bool(true));
}

#[test]
fn test_bool_to_real() {
    let mut ids = IdGenerator::new();
    let id = ids.function_id();
    let b = ids.local_id();
    let function = FunctionNode::new(id, "ToReal", TypeSpec::REAL)
        .into_static()
        .with_parameter(b, "b", TypeSpec::BOOLEAN)
        .with_statements(vec![Statement::ret(Some(Expression::cast(
            Expression::local(b, TypeSpec::BOOLEAN),
            TypeSpec::REAL,
        )))]);
    let library = translate(vec![function]);

    assert_eq!(call(&library, id, RuntimeValue::Bool(true)), RuntimeValue::Real(1.0));
    assert_eq!(call(&library, id, RuntimeValue::Bool(false)), RuntimeValue::Real(0.0));
}

#[test]
fn test_reinterpret_is_bitcast() {
    let mut ids = IdGenerator::new();
    let id = ids.function_id();
    let x = ids.local_id();
    let bits = Expression::intrinsic(
        TypeSpec::INTEGER,
        "Reinterpret",
        vec![Expression::local(x, TypeSpec::REAL)],
        TypeSpec::INTEGER,
    );
    let function = FunctionNode::new(id, "Bits", TypeSpec::INTEGER)
        .into_static()
        .with_parameter(x, "x", TypeSpec::REAL)
        .with_statements(vec![Statement::ret(Some(bits))]);
    let library = translate(vec![function]);

    assert_eq!(
        call(&library, id, RuntimeValue::Real(1.0)),
        RuntimeValue::Int(1.0f32.to_bits() as i32)
    );
}
