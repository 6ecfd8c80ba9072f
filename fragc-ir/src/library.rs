//! Library - the unit of translation
//!
//! A library owns everything produced by one compile: its type registry,
//! functions, constants and resolver tables. Dependencies are other,
//! already translated libraries shared by reference.

use crate::eval::RuntimeValue;
use crate::function::IrFunction;
use crate::resolvers::{
    BinaryOperatorKey, BinaryResolver, CastResolver, IntrinsicKey, IntrinsicResolver, ResolverRegistry,
    TypeCastKey, UnaryOperatorKey, UnaryResolver,
};
use crate::types::{TypeRef, TypeRegistry};
use crate::values::{ConstantId, FunctionRef, LibraryId};
use fragc_common::{FunctionId, Literal, PropertyId, TypeId};
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

static NEXT_LIBRARY_ID: AtomicU32 = AtomicU32::new(0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constant {
    pub ty: TypeRef,
    pub value: Literal,
}

/// A property of a translated class
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
    pub name: String,
    pub property: PropertyId,
    pub ty: TypeRef,
    /// Struct member index; `None` for accessor-only properties
    pub member_index: Option<u32>,
    pub default_value: Option<RuntimeValue>,
}

/// Per-class metadata recorded during translation
#[derive(Debug, Clone, PartialEq)]
pub struct TypeMeta {
    pub type_id: TypeId,
    pub name: String,
    pub ir_type: TypeRef,
    /// Runs the member initializers of a fresh instance
    pub pre_constructor: Option<FunctionRef>,
    /// Parameterless constructor written in source
    pub default_constructor: Option<FunctionRef>,
    pub fields: Vec<FieldMeta>,
}

#[derive(Debug)]
pub struct Library {
    id: LibraryId,
    pub name: String,
    pub types: TypeRegistry,
    pub resolvers: ResolverRegistry,
    functions: Vec<IrFunction>,
    constants: Vec<Constant>,
    constant_map: HashMap<(TypeRef, Literal), ConstantId>,
    dependencies: Vec<Arc<Library>>,
    class_types: HashMap<TypeId, TypeRef>,
    function_map: HashMap<FunctionId, FunctionRef>,
    type_meta: Vec<TypeMeta>,
    translated: bool,
}

impl Library {
    pub fn new(name: &str) -> Self {
        let id = LibraryId(NEXT_LIBRARY_ID.fetch_add(1, Ordering::Relaxed));
        debug!("created library '{}' ({})", name, id);
        Self {
            id,
            name: name.to_string(),
            types: TypeRegistry::new(),
            resolvers: ResolverRegistry::new(),
            functions: Vec::new(),
            constants: Vec::new(),
            constant_map: HashMap::new(),
            dependencies: Vec::new(),
            class_types: HashMap::new(),
            function_map: HashMap::new(),
            type_meta: Vec::new(),
            translated: false,
        }
    }

    pub fn id(&self) -> LibraryId {
        self.id
    }

    pub fn is_translated(&self) -> bool {
        self.translated
    }

    pub fn mark_translated(&mut self) {
        self.translated = true;
    }

    pub fn set_dependencies(&mut self, dependencies: Vec<Arc<Library>>) {
        self.dependencies = dependencies;
    }

    pub fn dependencies(&self) -> &[Arc<Library>] {
        &self.dependencies
    }

    /// Allocates a function and registers it with its owning type and this
    /// library's function arena.
    pub fn create_function(&mut self, owner: TypeRef, name: &str, function_type: TypeRef) -> FunctionRef {
        let function = FunctionRef {
            library: self.id,
            index: self.functions.len() as u32,
        };
        self.functions.push(IrFunction::new(name, owner, function_type));
        self.types.add_function(owner, function);
        function
    }

    /// Functions in creation order
    pub fn functions(&self) -> impl Iterator<Item = (FunctionRef, &IrFunction)> {
        let library = self.id;
        self.functions.iter().enumerate().map(move |(i, f)| {
            (
                FunctionRef {
                    library,
                    index: i as u32,
                },
                f,
            )
        })
    }

    pub fn function(&self, function: FunctionRef) -> Option<&IrFunction> {
        if function.library != self.id {
            return None;
        }
        self.functions.get(function.index as usize)
    }

    /// Replaces a function's definition with a finished body
    pub fn install_function(&mut self, function: FunctionRef, body: IrFunction) -> bool {
        if function.library != self.id {
            return false;
        }
        match self.functions.get_mut(function.index as usize) {
            Some(slot) => {
                *slot = body;
                true
            }
            None => false,
        }
    }

    /// Looks a function up here or in any dependency
    pub fn resolve_function(&self, function: FunctionRef) -> Option<&IrFunction> {
        if function.library == self.id {
            return self.function(function);
        }
        self.dependencies.iter().find_map(|dep| dep.resolve_function(function))
    }

    /// Deduplicated constant of the given type
    pub fn constant(&mut self, ty: TypeRef, value: Literal) -> ConstantId {
        if let Some(id) = self.constant_map.get(&(ty, value)) {
            return *id;
        }
        let id = ConstantId(self.constants.len() as u32);
        self.constants.push(Constant { ty, value });
        self.constant_map.insert((ty, value), id);
        id
    }

    pub fn constant_value(&self, id: ConstantId) -> Option<&Constant> {
        self.constants.get(id.0 as usize)
    }

    pub fn constants(&self) -> impl Iterator<Item = (ConstantId, &Constant)> {
        self.constants.iter().enumerate().map(|(i, c)| (ConstantId(i as u32), c))
    }

    pub fn register_class_type(&mut self, id: TypeId, ty: TypeRef) {
        self.class_types.insert(id, ty);
    }

    pub fn class_type(&self, id: TypeId) -> Option<TypeRef> {
        self.class_types.get(&id).copied()
    }

    /// The library that defines a class, and the class's type there
    pub fn find_class_type(&self, id: TypeId) -> Option<(&Library, TypeRef)> {
        if let Some(ty) = self.class_type(id) {
            return Some((self, ty));
        }
        self.dependencies.iter().find_map(|dep| dep.find_class_type(id))
    }

    pub fn map_function(&mut self, id: FunctionId, function: FunctionRef) {
        self.function_map.insert(id, function);
    }

    pub fn find_function(&self, id: FunctionId) -> Option<FunctionRef> {
        self.function_map
            .get(&id)
            .copied()
            .or_else(|| self.dependencies.iter().find_map(|dep| dep.find_function(id)))
    }

    pub fn add_type_meta(&mut self, meta: TypeMeta) {
        self.type_meta.push(meta);
    }

    pub fn type_meta(&self) -> &[TypeMeta] {
        &self.type_meta
    }

    pub fn type_meta_mut(&mut self) -> &mut [TypeMeta] {
        &mut self.type_meta
    }

    pub fn find_type_meta(&self, id: TypeId) -> Option<&TypeMeta> {
        self.type_meta.iter().find(|meta| meta.type_id == id)
    }

    /// Type metadata from this library or any dependency
    pub fn resolve_type_meta(&self, id: TypeId) -> Option<&TypeMeta> {
        self.find_type_meta(id)
            .or_else(|| self.dependencies.iter().find_map(|dep| dep.resolve_type_meta(id)))
    }

    pub fn find_binary_resolver(&self, key: &BinaryOperatorKey) -> Option<BinaryResolver> {
        self.resolvers
            .find_binary(key)
            .or_else(|| self.dependencies.iter().find_map(|dep| dep.find_binary_resolver(key)))
    }

    pub fn find_unary_resolver(&self, key: &UnaryOperatorKey) -> Option<UnaryResolver> {
        self.resolvers
            .find_unary(key)
            .or_else(|| self.dependencies.iter().find_map(|dep| dep.find_unary_resolver(key)))
    }

    pub fn find_cast_resolver(&self, key: &TypeCastKey) -> Option<CastResolver> {
        self.resolvers
            .find_cast(key)
            .or_else(|| self.dependencies.iter().find_map(|dep| dep.find_cast_resolver(key)))
    }

    pub fn find_intrinsic_resolver(&self, key: &IntrinsicKey) -> Option<IntrinsicResolver> {
        self.resolvers
            .find_intrinsic(key)
            .or_else(|| self.dependencies.iter().find_map(|dep| dep.find_intrinsic_resolver(key)))
    }
}
