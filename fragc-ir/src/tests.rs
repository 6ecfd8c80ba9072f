//! Unit tests for the IR value model

use super::*;
use fragc_common::Literal;
use pretty_assertions::assert_eq;

fn library_with_real() -> (Library, TypeRef, TypeRef) {
    let mut library = Library::new("test");
    let real = library.types.create_or_find_type("Real", BaseKind::Float, 1, None);
    let owner = library.types.create_struct("Foo");
    (library, real, owner)
}

#[test]
fn test_terminators() {
    let terminators = [OpCode::Return, OpCode::ReturnValue, OpCode::Branch, OpCode::BranchConditional];
    for opcode in terminators {
        assert!(opcode.is_terminator(), "{} should terminate a block", opcode);
    }
    for opcode in [OpCode::Store, OpCode::FunctionCall, OpCode::Select, OpCode::Undef] {
        assert!(!opcode.is_terminator());
    }
}

#[test]
fn test_basic_block() {
    let mut block = BasicBlock::new(BlockId(0), "entry");
    assert!(block.is_empty());
    assert!(!block.has_terminator());

    block.add_op(Op::new(OpCode::Undef, Some(ValueId(0)), None, Vec::new()));
    assert!(!block.is_well_formed());

    block.add_op(Op::new(OpCode::Return, None, None, Vec::new()));
    assert!(block.has_terminator());
    assert!(block.is_well_formed());

    block.add_op(Op::new(OpCode::Return, None, None, Vec::new()));
    assert!(!block.is_well_formed());
    assert!(block.truncate_after_terminator());
    assert_eq!(block.ops.len(), 2);
    assert!(block.is_well_formed());
}

#[test]
fn test_create_function_registers_with_owner_and_library() {
    let (mut library, real, owner) = library_with_real();
    let signature = library.types.function_type(real, &[]);
    let function = library.create_function(owner, "Compute", signature);

    assert_eq!(library.types.get(owner).functions(), &[function]);
    assert_eq!(library.functions().count(), 1);
    let created = library.function(function).unwrap();
    assert_eq!(created.name, "Compute");
    assert_eq!(library.types.sub_type(created.function_type, 0).unwrap(), real);
}

#[test]
fn test_builder_places_blocks_in_push_order() {
    let (mut library, _, owner) = library_with_real();
    let void = library.types.create_or_find_type("Void", BaseKind::Void, 0, None);
    let signature = library.types.function_type(void, &[]);
    let function = library.create_function(owner, "Main", signature);

    let mut builder = FunctionBuilder::new(library.function(function).unwrap().shell());
    let entry = builder.create_and_push_block("entry");
    let merge = builder.create_block("merge");
    let side = builder.create_and_push_block("side");
    builder.push_block(merge);

    builder.set_current_block(entry);
    builder.build_branch(side).unwrap();
    builder.set_current_block(side);
    builder.build_branch(merge).unwrap();
    builder.set_current_block(merge);
    builder.build_return(None).unwrap();

    let body = builder.finish();
    let names: Vec<&str> = body.blocks().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["entry", "side", "merge"]);
    assert!(body.is_well_formed());
}

#[test]
fn test_variables_live_in_entry_block() {
    let (mut library, real, owner) = library_with_real();
    let pointer = library.types.pointer_type(real);
    let signature = library.types.function_type(real, &[]);
    let function = library.create_function(owner, "Local", signature);

    let mut builder = FunctionBuilder::new(library.function(function).unwrap().shell());
    let entry = builder.create_and_push_block("entry");
    let body_block = builder.create_and_push_block("body");
    builder.set_current_block(body_block);
    let variable = builder.build_variable(pointer, "x").unwrap();

    let body = builder.finish();
    let entry = body.block(entry).unwrap();
    assert_eq!(entry.local_variables.len(), 1);
    assert_eq!(entry.local_variables[0].result, Some(variable));
    assert!(body.block(body_block).unwrap().ops.is_empty());
}

#[test]
fn test_fix_block_terminators() {
    let (mut library, real, owner) = library_with_real();
    let signature = library.types.function_type(real, &[]);
    let function = library.create_function(owner, "Value", signature);
    let mut body = library.function(function).unwrap().shell();

    let entry = body.allocate_block("entry");
    body.place_block(entry);
    let dead = body.allocate_block("dead");
    body.place_block(dead);
    {
        let block = body.block_mut(entry).unwrap();
        block.add_op(Op::new(OpCode::Branch, None, None, vec![Operand::Block(dead)]));
        block.add_op(Op::new(OpCode::Return, None, None, Vec::new()));
    }

    body.fix_block_terminators(Some(real));
    assert!(body.is_well_formed());
    assert_eq!(body.block(entry).unwrap().ops.len(), 1);
    let dead_ops: Vec<OpCode> = body.block(dead).unwrap().ops.iter().map(|op| op.opcode).collect();
    assert_eq!(dead_ops, vec![OpCode::Undef, OpCode::ReturnValue]);
}

#[test]
fn test_constants_are_deduplicated() {
    let (mut library, real, _) = library_with_real();
    let a = library.constant(real, Literal::Real(1.0));
    let b = library.constant(real, Literal::Real(1.0));
    let c = library.constant(real, Literal::Real(2.0));
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(library.constants().count(), 2);
}

#[test]
fn test_duplicate_resolver_registration_fails() {
    let mut registry = ResolverRegistry::new();
    let key = TypeCastKey::new(fragc_common::TypeSpec::REAL, fragc_common::TypeSpec::INTEGER);
    registry
        .register_cast(key.clone(), CastResolver::Instruction(OpCode::ConvertFToS))
        .unwrap();
    assert!(matches!(
        registry.register_cast(key, CastResolver::Instruction(OpCode::ConvertFToS)),
        Err(IrError::DuplicateResolver(_))
    ));
}

#[test]
fn test_resolver_lookup_searches_dependencies() {
    let mut core = Library::new("core");
    let key = UnaryOperatorKey::new(fragc_common::TypeSpec::REAL, fragc_common::UnaryOperator::Negate);
    core.resolvers
        .register_unary(key.clone(), UnaryResolver::Instruction(OpCode::FNegate))
        .unwrap();
    core.mark_translated();

    let mut user = Library::new("user");
    assert_eq!(user.find_unary_resolver(&key), None);
    user.set_dependencies(vec![std::sync::Arc::new(core)]);
    assert_eq!(user.find_unary_resolver(&key), Some(UnaryResolver::Instruction(OpCode::FNegate)));
}

#[test]
fn test_evaluate_simple_function() {
    let (mut library, real, owner) = library_with_real();
    let signature = library.types.function_type(real, &[real, real]);
    let function = library.create_function(owner, "Add", signature);
    let two = library.constant(real, Literal::Real(2.0));

    let mut builder = FunctionBuilder::new(library.function(function).unwrap().shell());
    let a = builder.add_parameter("a", real);
    let b = builder.add_parameter("b", real);
    let entry = builder.create_and_push_block("entry");
    builder.set_current_block(entry);
    let sum = builder.build_value(OpCode::FAdd, real, vec![a.into(), b.into()]).unwrap();
    let doubled = builder.build_value(OpCode::FMul, real, vec![sum.into(), two.into()]).unwrap();
    builder.build_return(Some(doubled.into())).unwrap();
    library.install_function(function, builder.finish());

    let mut evaluator = Evaluator::new(&library);
    let result = evaluator
        .call(function, vec![RuntimeValue::Real(1.5), RuntimeValue::Real(2.0)])
        .unwrap();
    assert_eq!(result, Some(RuntimeValue::Real(7.0)));
    assert!(evaluator.was_called(function));
}

#[test]
fn test_printer_lists_functions() {
    let (mut library, real, owner) = library_with_real();
    library.types.add_member(owner, real, "Value").unwrap();
    let signature = library.types.function_type(real, &[]);
    library.create_function(owner, "Get", signature);

    let listing = LibraryPrinter::new(&library).to_string();
    assert!(listing.contains("type T1 Foo Struct Value:Real size=16 align=4"));
    assert!(listing.contains("Foo.Get() () : Real"));
}
