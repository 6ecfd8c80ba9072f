//! Syntax tree to IR translation
//!
//! Translation runs in passes over the whole tree:
//! 1. every class becomes a struct type
//! 2. member variables become struct members and every function,
//!    constructor, accessor and pre-constructor gets a signature
//! 3. the cycle detector rejects recursion
//! 4. bodies are emitted, one `FunctionBuilder` per function
//!
//! Signatures exist before any body is emitted, so calls may appear in any
//! order.

mod conversions;
mod expressions;
mod logical;
mod statements;
mod types;

pub use self::types::lower_builtin_type;

use crate::ast::{ClassNode, ParameterNode, Statement, SyntaxTree};
use crate::cycle_detection::detect_cycles;
use fragc_common::{
    ErrorReporter, FunctionId, LocalId, PropertyId, SourceLocation, TranslationError, TypeId, TypeSpec,
};
use fragc_ir::{
    BlockId, FieldMeta, FunctionBuilder, FunctionRef, IrError, Library, OpCode, Operand, TypeMeta, TypeRef, ValueId,
};
use log::{debug, trace};
use std::collections::HashMap;

pub(crate) type TranslateResult<T> = Result<T, TranslationError>;

/// Translates a syntax tree into a library
pub trait Translator {
    /// Emits IR for `tree` into `library`. Failures are reported to
    /// `errors`; returns false if any occurred.
    fn translate(&mut self, tree: &SyntaxTree, library: &mut Library, errors: &mut ErrorReporter) -> bool;
}

pub(crate) trait IrResultExt<T> {
    fn at(self, location: &SourceLocation) -> TranslateResult<T>;
}

impl<T> IrResultExt<T> for Result<T, IrError> {
    fn at(self, location: &SourceLocation) -> TranslateResult<T> {
        self.map_err(|err| err.at(location))
    }
}

/// The shader backend translator
#[derive(Debug, Default)]
pub struct ShaderTranslator;

impl ShaderTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl Translator for ShaderTranslator {
    fn translate(&mut self, tree: &SyntaxTree, library: &mut Library, errors: &mut ErrorReporter) -> bool {
        debug!("translating {} classes into '{}'", tree.classes.len(), library.name);
        let mut ctx = TranslationContext::new(library);

        if let Err(err) = ctx.declare(tree) {
            errors.report_translation_error(&err);
            return false;
        }
        if detect_cycles(tree, errors) {
            return false;
        }
        for class in &tree.classes {
            if let Err(err) = emit_class(&mut ctx, class) {
                errors.report_translation_error(&err);
                if !errors.emit_multiple_errors() {
                    return false;
                }
            }
        }
        if errors.has_errors() {
            return false;
        }

        ctx.library.mark_translated();
        true
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ClassInfo {
    pub ir_type: TypeRef,
    pub pre_constructor: Option<FunctionRef>,
}

#[derive(Debug, Clone, Copy)]
struct Signature {
    takes_this: bool,
}

/// Translation state shared by every function of one library
pub(crate) struct TranslationContext<'l> {
    pub library: &'l mut Library,
    classes: HashMap<TypeId, ClassInfo>,
    fields: HashMap<PropertyId, u32>,
    accessors: HashMap<PropertyId, (Option<FunctionId>, Option<FunctionId>)>,
    signatures: HashMap<FunctionId, Signature>,
}

impl<'l> TranslationContext<'l> {
    fn new(library: &'l mut Library) -> Self {
        Self {
            library,
            classes: HashMap::new(),
            fields: HashMap::new(),
            accessors: HashMap::new(),
            signatures: HashMap::new(),
        }
    }

    fn declare(&mut self, tree: &SyntaxTree) -> TranslateResult<()> {
        for class in &tree.classes {
            let ir_type = self.library.types.create_struct(&class.name);
            self.library.register_class_type(class.type_id, ir_type);
            self.classes.insert(
                class.type_id,
                ClassInfo {
                    ir_type,
                    pre_constructor: None,
                },
            );
        }
        for class in &tree.classes {
            self.declare_members(class)?;
        }
        for class in &tree.classes {
            self.declare_signatures(class)?;
        }
        Ok(())
    }

    fn declare_members(&mut self, class: &ClassNode) -> TranslateResult<()> {
        let owner = self.class_info(class.type_id, &class.location)?.ir_type;
        let mut fields = Vec::new();
        for variable in &class.variables {
            if variable.is_static {
                return Err(TranslationError::unsupported(
                    format!("static member variable '{}.{}'", class.name, variable.name),
                    variable.location.clone(),
                ));
            }
            let ty = self.lower_type(&variable.ty, &variable.location)?;
            let member_index = if variable.is_field() {
                let index = self.library.types.add_member(owner, ty, &variable.name).at(&variable.location)?;
                self.fields.insert(variable.property, index);
                Some(index)
            } else {
                self.accessors.insert(
                    variable.property,
                    (
                        variable.get.as_ref().map(|f| f.function),
                        variable.set.as_ref().map(|f| f.function),
                    ),
                );
                None
            };
            fields.push(FieldMeta {
                name: variable.name.clone(),
                property: variable.property,
                ty,
                member_index,
                default_value: None,
            });
        }
        trace!("class '{}' has {} fields", class.name, fields.len());
        self.library.add_type_meta(TypeMeta {
            type_id: class.type_id,
            name: class.name.clone(),
            ir_type: owner,
            pre_constructor: None,
            default_constructor: None,
            fields,
        });
        Ok(())
    }

    fn declare_signatures(&mut self, class: &ClassNode) -> TranslateResult<()> {
        let owner = self.class_info(class.type_id, &class.location)?.ir_type;
        let this_pointer = self.library.types.pointer_type(owner);
        let void = self.lower_type(&TypeSpec::Void, &class.location)?;

        // Classes whose fields need initializing always get a pre-constructor
        if class.pre_constructor.is_some() || needs_pre_constructor(class) {
            let function_type = self.library.types.function_type(void, &[this_pointer]);
            let function = self.library.create_function(owner, "PreConstructor", function_type);
            if let Some(id) = class.pre_constructor {
                self.library.map_function(id, function);
                self.signatures.insert(id, Signature { takes_this: true });
            }
            if let Some(info) = self.classes.get_mut(&class.type_id) {
                info.pre_constructor = Some(function);
            }
            if let Some(meta) = self.type_meta_mut(class.type_id) {
                meta.pre_constructor = Some(function);
            }
        }

        for constructor in &class.constructors {
            let function = self.declare_function(
                owner,
                "Constructor",
                constructor.function,
                &constructor.parameters,
                &TypeSpec::Void,
                true,
                &constructor.location,
            )?;
            if constructor.parameters.is_empty() {
                if let Some(meta) = self.type_meta_mut(class.type_id) {
                    meta.default_constructor = Some(function);
                }
            }
        }
        for function in &class.functions {
            self.declare_function(
                owner,
                &function.name,
                function.function,
                &function.parameters,
                &function.return_type,
                !function.is_static,
                &function.location,
            )?;
        }
        for variable in &class.variables {
            if let Some(get) = &variable.get {
                let name = format!("Get{}", variable.name);
                self.declare_function(owner, &name, get.function, &get.parameters, &get.return_type, true, &get.location)?;
            }
            if let Some(set) = &variable.set {
                let name = format!("Set{}", variable.name);
                self.declare_function(owner, &name, set.function, &set.parameters, &set.return_type, true, &set.location)?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn declare_function(
        &mut self,
        owner: TypeRef,
        name: &str,
        id: FunctionId,
        parameters: &[ParameterNode],
        return_type: &TypeSpec,
        takes_this: bool,
        location: &SourceLocation,
    ) -> TranslateResult<FunctionRef> {
        let mut parameter_types = Vec::with_capacity(parameters.len() + 1);
        if takes_this {
            parameter_types.push(self.library.types.pointer_type(owner));
        }
        for parameter in parameters {
            parameter_types.push(self.lower_type(&parameter.ty, location)?);
        }
        let return_type = self.lower_type(return_type, location)?;
        let function_type = self.library.types.function_type(return_type, &parameter_types);
        let function = self.library.create_function(owner, name, function_type);
        self.library.map_function(id, function);
        self.signatures.insert(id, Signature { takes_this });
        trace!("declared {} {} as {}", name, id, function);
        Ok(function)
    }

    fn type_meta_mut(&mut self, id: TypeId) -> Option<&mut TypeMeta> {
        self.library.type_meta_mut().iter_mut().find(|meta| meta.type_id == id)
    }

    /// Struct type and pre-constructor of a class, importing it from a
    /// dependency on first use
    pub fn class_info(&mut self, id: TypeId, location: &SourceLocation) -> TranslateResult<ClassInfo> {
        if let Some(info) = self.classes.get(&id) {
            return Ok(*info);
        }
        let dependencies = self.library.dependencies().to_vec();
        for dependency in &dependencies {
            let Some((source, ty)) = dependency.find_class_type(id) else {
                continue;
            };
            let ir_type = self.library.types.import_type(&source.types, ty).at(location)?;
            let pre_constructor = dependency.resolve_type_meta(id).and_then(|meta| meta.pre_constructor);
            debug!("imported class {} as '{}'", id, self.library.types.name(ir_type));
            let info = ClassInfo {
                ir_type,
                pre_constructor,
            };
            self.classes.insert(id, info);
            return Ok(info);
        }
        Err(TranslationError::MissingDependencyType {
            name: id.to_string(),
            location: location.clone(),
        })
    }

    pub fn lower_type(&mut self, spec: &TypeSpec, location: &SourceLocation) -> TranslateResult<TypeRef> {
        match spec {
            TypeSpec::Class(id) => Ok(self.class_info(*id, location)?.ir_type),
            other => lower_builtin_type(&mut self.library.types, other).at(location),
        }
    }

    /// Struct member index of a stored field, here or in a dependency
    pub fn field_index(&self, property: PropertyId) -> Option<u32> {
        if let Some(index) = self.fields.get(&property) {
            return Some(*index);
        }
        self.library.dependencies().iter().find_map(|dependency| {
            dependency
                .type_meta()
                .iter()
                .flat_map(|meta| meta.fields.iter())
                .find(|field| field.property == property)
                .and_then(|field| field.member_index)
        })
    }

    pub fn accessors(&self, property: PropertyId) -> Option<(Option<FunctionId>, Option<FunctionId>)> {
        self.accessors.get(&property).copied()
    }

    pub fn function(&self, id: FunctionId, location: &SourceLocation) -> TranslateResult<FunctionRef> {
        self.library
            .find_function(id)
            .ok_or_else(|| TranslationError::unsupported(format!("call to unknown function {}", id), location.clone()))
    }

    /// Whether a function's first parameter is the receiver
    pub fn takes_this(&self, id: FunctionId, function: FunctionRef) -> bool {
        if let Some(signature) = self.signatures.get(&id) {
            return signature.takes_this;
        }
        self.library
            .resolve_function(function)
            .and_then(|f| f.parameters.first())
            .is_some_and(|p| p.name == "this")
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopTargets {
    pub merge: BlockId,
    pub continue_target: BlockId,
}

/// Result of emitting an expression
#[derive(Debug, Clone, Copy)]
pub(crate) enum Emitted {
    Value { operand: Operand, ty: TypeRef },
    /// Storage holding a value of type `ty`
    Pointer { pointer: ValueId, ty: TypeRef },
    Void,
}

/// Emits the body of one function
pub(crate) struct FunctionEmitter<'c, 'l> {
    pub ctx: &'c mut TranslationContext<'l>,
    pub builder: FunctionBuilder,
    locals: HashMap<LocalId, (ValueId, TypeRef)>,
    this: Option<(ValueId, TypeRef)>,
    loops: Vec<LoopTargets>,
    return_type: Option<TypeRef>,
}

impl<'c, 'l> FunctionEmitter<'c, 'l> {
    fn new(ctx: &'c mut TranslationContext<'l>, function: FunctionRef, location: &SourceLocation) -> TranslateResult<Self> {
        let shell = ctx
            .library
            .function(function)
            .map(|f| f.shell())
            .ok_or(IrError::UnknownFunction(function))
            .at(location)?;
        let return_type = ctx.library.types.sub_type(shell.function_type, 0).at(location)?;
        let return_type = match ctx.library.types.base(return_type) {
            fragc_ir::BaseKind::Void => None,
            _ => Some(return_type),
        };
        Ok(Self {
            ctx,
            builder: FunctionBuilder::new(shell),
            locals: HashMap::new(),
            this: None,
            loops: Vec::new(),
            return_type,
        })
    }

    /// Declares parameters and opens the entry block. Parameters are copied
    /// into entry-block variables so they can be assigned.
    fn begin(&mut self, this: Option<TypeRef>, parameters: &[ParameterNode], location: &SourceLocation) -> TranslateResult<()> {
        let this_param = match this {
            Some(owner) => {
                let pointer = self.ctx.library.types.pointer_type(owner);
                Some((self.builder.add_parameter("this", pointer), owner))
            }
            None => None,
        };
        let mut values = Vec::with_capacity(parameters.len());
        for parameter in parameters {
            let ty = self.ctx.lower_type(&parameter.ty, location)?;
            values.push((parameter, self.builder.add_parameter(&parameter.name, ty), ty));
        }

        let entry = self.builder.create_and_push_block("entry");
        self.builder.set_current_block(entry);
        self.this = this_param;
        for (parameter, value, ty) in values {
            let pointer = self.declare_local(parameter.local, &parameter.name, ty, location)?;
            self.builder.build_store(Operand::Value(pointer), Operand::Value(value)).at(location)?;
        }
        Ok(())
    }

    pub fn declare_local(&mut self, local: LocalId, name: &str, ty: TypeRef, location: &SourceLocation) -> TranslateResult<ValueId> {
        let pointer_type = self.ctx.library.types.pointer_type(ty);
        let pointer = self.builder.build_variable(pointer_type, name).at(location)?;
        self.locals.insert(local, (pointer, ty));
        Ok(pointer)
    }

    pub fn local(&self, local: LocalId) -> Option<(ValueId, TypeRef)> {
        self.locals.get(&local).copied()
    }

    pub fn this(&self) -> Option<(ValueId, TypeRef)> {
        self.this
    }

    pub fn return_type(&self) -> Option<TypeRef> {
        self.return_type
    }

    pub fn push_loop(&mut self, targets: LoopTargets) {
        self.loops.push(targets);
    }

    pub fn pop_loop(&mut self) {
        self.loops.pop();
    }

    pub fn current_loop(&self) -> Option<LoopTargets> {
        self.loops.last().copied()
    }

    /// The value of an emitted expression, loading through pointers
    pub fn load(&mut self, emitted: Emitted, location: &SourceLocation) -> TranslateResult<(Operand, TypeRef)> {
        match emitted {
            Emitted::Value { operand, ty } => Ok((operand, ty)),
            Emitted::Pointer { pointer, ty } => {
                let value = self.builder.build_load(ty, Operand::Value(pointer)).at(location)?;
                Ok((Operand::Value(value), ty))
            }
            Emitted::Void => Err(TranslationError::unsupported("void expression used as a value", location.clone())),
        }
    }

    /// Storage for an emitted expression, spilling values into a temporary
    pub fn to_pointer(&mut self, emitted: Emitted, location: &SourceLocation) -> TranslateResult<(ValueId, TypeRef)> {
        match emitted {
            Emitted::Pointer { pointer, ty } => Ok((pointer, ty)),
            Emitted::Value { operand, ty } => {
                let pointer_type = self.ctx.library.types.pointer_type(ty);
                let temp = self.builder.build_variable(pointer_type, "temp").at(location)?;
                self.builder.build_store(Operand::Value(temp), operand).at(location)?;
                Ok((temp, ty))
            }
            Emitted::Void => Err(TranslationError::unsupported("void expression has no storage", location.clone())),
        }
    }

    /// Calls `function`, returning its result when it has one
    pub fn call(
        &mut self,
        function: FunctionRef,
        return_type: Option<TypeRef>,
        mut arguments: Vec<Operand>,
        location: &SourceLocation,
    ) -> TranslateResult<Emitted> {
        arguments.insert(0, Operand::Function(function));
        let result = self.builder.build(OpCode::FunctionCall, return_type, arguments).at(location)?;
        Ok(match (result, return_type) {
            (Some(value), Some(ty)) => Emitted::Value {
                operand: Operand::Value(value),
                ty,
            },
            _ => Emitted::Void,
        })
    }

    /// Pointer to member `index` of the struct behind `base`
    pub fn access_member(&mut self, base: ValueId, owner: TypeRef, index: u32, location: &SourceLocation) -> TranslateResult<Emitted> {
        let member_type = self.ctx.library.types.sub_type(owner, index).at(location)?;
        let pointer_type = self.ctx.library.types.pointer_type(member_type);
        let integer = self.ctx.lower_type(&TypeSpec::INTEGER, location)?;
        let index = self.ctx.library.constant(integer, fragc_common::Literal::Int(index as i32));
        let pointer = self
            .builder
            .build_value(OpCode::AccessChain, pointer_type, vec![Operand::Value(base), Operand::Constant(index)])
            .at(location)?;
        Ok(Emitted::Pointer {
            pointer,
            ty: member_type,
        })
    }

    fn finish(self, function: FunctionRef, location: &SourceLocation) -> TranslateResult<()> {
        let return_type = self.return_type;
        let mut body = self.builder.finish();
        body.fix_block_terminators(return_type);
        if !body.is_well_formed() {
            return Err(TranslationError::unsupported(
                format!("function '{}' has a malformed block", body.name),
                location.clone(),
            ));
        }
        trace!("emitted '{}': {} blocks, {} ops", body.name, body.block_count(), body.op_count());
        if !self.ctx.library.install_function(function, body) {
            return Err(IrError::UnknownFunction(function).at(location));
        }
        Ok(())
    }
}

fn emit_body(
    ctx: &mut TranslationContext<'_>,
    function_id: FunctionId,
    this: Option<TypeRef>,
    parameters: &[ParameterNode],
    statements: &[Statement],
    location: &SourceLocation,
) -> TranslateResult<()> {
    let function = ctx.function(function_id, location)?;
    let mut emitter = FunctionEmitter::new(ctx, function, location)?;
    emitter.begin(this, parameters, location)?;
    statements::emit_statements(&mut emitter, statements)?;
    emitter.finish(function, location)
}

/// A stored field has an initializer or is itself a class instance
fn needs_pre_constructor(class: &ClassNode) -> bool {
    class
        .variables
        .iter()
        .filter(|variable| variable.is_field())
        .any(|variable| variable.initial_value.is_some() || matches!(variable.ty, TypeSpec::Class(_)))
}

fn emit_class(ctx: &mut TranslationContext<'_>, class: &ClassNode) -> TranslateResult<()> {
    let info = ctx.class_info(class.type_id, &class.location)?;
    let owner = info.ir_type;

    if let Some(function) = info.pre_constructor {
        let mut emitter = FunctionEmitter::new(ctx, function, &class.location)?;
        emitter.begin(Some(owner), &[], &class.location)?;
        statements::emit_initializers(&mut emitter, class)?;
        emitter.finish(function, &class.location)?;
        trace!("emitted pre-constructor {} of '{}'", function, class.name);
    }

    for constructor in &class.constructors {
        let function = ctx.function(constructor.function, &constructor.location)?;
        let mut emitter = FunctionEmitter::new(ctx, function, &constructor.location)?;
        emitter.begin(Some(owner), &constructor.parameters, &constructor.location)?;
        if let Some(pre_constructor) = info.pre_constructor {
            let (this, _) = emitter
                .this()
                .ok_or_else(|| TranslationError::unsupported("constructor without receiver", constructor.location.clone()))?;
            emitter.call(pre_constructor, None, vec![Operand::Value(this)], &constructor.location)?;
        }
        statements::emit_statements(&mut emitter, &constructor.statements)?;
        emitter.finish(function, &constructor.location)?;
    }

    for function in &class.functions {
        let this = (!function.is_static).then_some(owner);
        emit_body(ctx, function.function, this, &function.parameters, &function.statements, &function.location)?;
    }

    for variable in &class.variables {
        for accessor in variable.get.iter().chain(variable.set.iter()) {
            emit_body(ctx, accessor.function, Some(owner), &accessor.parameters, &accessor.statements, &accessor.location)?;
        }
    }
    Ok(())
}
