//! Tests for `||` / `&&` lowering, checked by running the emitted IR

use fragc_common::{BinaryOperator, ErrorReporter, FunctionId, SourceLocation, TypeSpec};
use fragc_frontend::{
    build_core_library, ClassNode, Expression, FunctionNode, IdGenerator, Statement, SyntaxTree, ShaderTranslator,
    Translator,
};
use fragc_ir::{BlockType, Evaluator, FunctionRef, Library, RuntimeValue};
use pretty_assertions::assert_eq;
use std::sync::Arc;

struct Fixture {
    library: Library,
    test: FunctionRef,
    side_effect: FunctionRef,
}

/// `static function Test(a: Boolean): Boolean { return a <op> SideEffect(); }`
fn fixture(op: BinaryOperator) -> Fixture {
    let mut ids = IdGenerator::new();
    let side_effect_id = ids.function_id();
    let test_id = ids.function_id();
    let a = ids.local_id();

    let side_effect = FunctionNode::new(side_effect_id, "SideEffect", TypeSpec::BOOLEAN)
        .into_static()
        .with_statements(vec![Statement::ret(Some(Expression::boolean(true)))]);
    let condition = Expression::binary(
        op,
        Expression::local(a, TypeSpec::BOOLEAN),
        Expression::call(None, "SideEffect", side_effect_id, Vec::new(), TypeSpec::BOOLEAN),
    )
    .at(SourceLocation::new("logic.frag", 3, 12));
    let test = FunctionNode::new(test_id, "Test", TypeSpec::BOOLEAN)
        .into_static()
        .with_parameter(a, "a", TypeSpec::BOOLEAN)
        .with_statements(vec![Statement::ret(Some(condition))]);

    let class = ClassNode {
        functions: vec![side_effect, test],
        ..ClassNode::new(ids.type_id(), "Logic")
    };
    let tree = SyntaxTree::new(vec![class]);

    let mut library = Library::new("Logic");
    library.set_dependencies(vec![Arc::new(build_core_library().unwrap())]);
    let mut errors = ErrorReporter::new();
    assert!(ShaderTranslator::new().translate(&tree, &mut library, &mut errors), "{}", errors.summary());

    let lookup = |id: FunctionId| library.find_function(id).unwrap();
    let (test, side_effect) = (lookup(test_id), lookup(side_effect_id));
    Fixture {
        library,
        test,
        side_effect,
    }
}

fn run(fixture: &Fixture, a: bool) -> (RuntimeValue, Vec<String>, bool) {
    let mut eval = Evaluator::new(&fixture.library);
    let result = eval.call(fixture.test, vec![RuntimeValue::Bool(a)]).unwrap().unwrap();
    (result, eval.executed_block_names(), eval.was_called(fixture.side_effect))
}

#[test]
fn test_or_skips_rhs_when_lhs_true() {
    let fixture = fixture(BinaryOperator::LogicalOr);
    let (result, blocks, called) = run(&fixture, true);
    assert_eq!(result, RuntimeValue::Bool(true));
    assert!(!called);
    assert!(!blocks.contains(&"ifFalse".to_string()));
    assert_eq!(blocks, vec!["entry", "ifTrue", "mergePoint"]);
}

#[test]
fn test_or_evaluates_rhs_when_lhs_false() {
    let fixture = fixture(BinaryOperator::LogicalOr);
    let (result, blocks, called) = run(&fixture, false);
    assert_eq!(result, RuntimeValue::Bool(true));
    assert!(called);
    assert!(blocks.contains(&"ifFalse".to_string()));
}

#[test]
fn test_and_skips_rhs_when_lhs_false() {
    let fixture = fixture(BinaryOperator::LogicalAnd);
    let (result, blocks, called) = run(&fixture, false);
    assert_eq!(result, RuntimeValue::Bool(false));
    assert!(!called);
    assert!(!blocks.contains(&"ifFalse".to_string()));
}

#[test]
fn test_and_evaluates_rhs_when_lhs_true() {
    let fixture = fixture(BinaryOperator::LogicalAnd);
    let (result, _, called) = run(&fixture, true);
    assert_eq!(result, RuntimeValue::Bool(true));
    assert!(called);
}

#[test]
fn test_lowering_shape() {
    let fixture = fixture(BinaryOperator::LogicalOr);
    let test = fixture.library.function(fixture.test).unwrap();
    assert!(test.is_well_formed());

    let entry = test.entry_block().unwrap();
    assert_eq!(entry.block_type, BlockType::Selection);
    let names: Vec<&str> = test.blocks().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["entry", "ifTrue", "ifFalse", "mergePoint"]);
    let merge = test.blocks().last().unwrap().id;
    assert_eq!(entry.merge_point, Some(merge));
    assert!(entry
        .local_variables
        .iter()
        .any(|op| op.debug_name.as_deref() == Some("tempOr")));
}
