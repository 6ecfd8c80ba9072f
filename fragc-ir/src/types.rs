//! Type registry and layout engine
//!
//! Types live in an arena owned by the library and are referred to by
//! `TypeRef`. Byte size and alignment follow the uniform-buffer (std140)
//! rules GPUs use, computed lazily and cached per type.

use crate::error::IrError;
use crate::values::FunctionRef;
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Index of a type within one registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeRef(pub u32);

impl TypeRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseKind {
    Void,
    Bool,
    Int,
    Float,
    Vector,
    Matrix,
    Struct,
    FixedArray,
    Pointer,
    Image,
    SampledImage,
    Function,
    Unknown,
}

impl BaseKind {
    pub fn is_scalar(self) -> bool {
        matches!(self, BaseKind::Bool | BaseKind::Int | BaseKind::Float)
    }
}

/// Byte size and alignment of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub size: u32,
    pub alignment: u32,
}

/// A type descriptor.
///
/// `parameters` holds struct members in declaration order, or the return
/// type followed by the parameter types for function types.
#[derive(Debug, Clone)]
pub struct IrType {
    pub name: String,
    pub base: BaseKind,
    /// Lane count for vectors, column count for matrices, length for arrays
    pub components: u32,
    pub component_type: Option<TypeRef>,
    pub dereference_type: Option<TypeRef>,
    parameters: Vec<TypeRef>,
    member_names: Vec<String>,
    member_by_name: HashMap<String, u32>,
    member_by_name_and_type: HashMap<(String, String), u32>,
    pointer_type: Option<TypeRef>,
    functions: Vec<FunctionRef>,
    layout: OnceLock<Layout>,
}

impl IrType {
    fn new(name: &str, base: BaseKind, components: u32, component_type: Option<TypeRef>) -> Self {
        Self {
            name: name.to_string(),
            base,
            components,
            component_type,
            dereference_type: None,
            parameters: Vec::new(),
            member_names: Vec::new(),
            member_by_name: HashMap::new(),
            member_by_name_and_type: HashMap::new(),
            pointer_type: None,
            functions: Vec::new(),
            layout: OnceLock::new(),
        }
    }

    pub fn parameters(&self) -> &[TypeRef] {
        &self.parameters
    }

    pub fn member_names(&self) -> &[String] {
        &self.member_names
    }

    pub fn functions(&self) -> &[FunctionRef] {
        &self.functions
    }

    pub fn is_pointer(&self) -> bool {
        self.base == BaseKind::Pointer
    }
}

/// Rounds `size` up to the next multiple of `alignment`
pub fn size_after_alignment(size: u32, alignment: u32) -> u32 {
    if alignment == 0 {
        return size;
    }
    size + ((alignment - size % alignment) % alignment)
}

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: Vec<IrType>,
    by_name: HashMap<String, TypeRef>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Types in creation order
    pub fn iter(&self) -> impl Iterator<Item = (TypeRef, &IrType)> {
        self.types.iter().enumerate().map(|(i, ty)| (TypeRef(i as u32), ty))
    }

    pub fn get(&self, ty: TypeRef) -> &IrType {
        &self.types[ty.index()]
    }

    pub fn name(&self, ty: TypeRef) -> &str {
        &self.get(ty).name
    }

    pub fn base(&self, ty: TypeRef) -> BaseKind {
        self.get(ty).base
    }

    pub fn find_type(&self, name: &str) -> Option<TypeRef> {
        self.by_name.get(name).copied()
    }

    /// Returns the type registered under `name`, creating it with the given
    /// shape if it does not exist yet.
    pub fn create_or_find_type(
        &mut self,
        name: &str,
        base: BaseKind,
        components: u32,
        component_type: Option<TypeRef>,
    ) -> TypeRef {
        if let Some(existing) = self.find_type(name) {
            return existing;
        }
        let id = TypeRef(self.types.len() as u32);
        trace!("created type {} '{}' ({:?})", id, name, base);
        self.types.push(IrType::new(name, base, components, component_type));
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn create_struct(&mut self, name: &str) -> TypeRef {
        self.create_or_find_type(name, BaseKind::Struct, 0, None)
    }

    pub fn function_type(&mut self, return_type: TypeRef, parameters: &[TypeRef]) -> TypeRef {
        let params: Vec<&str> = parameters.iter().map(|p| self.name(*p)).collect();
        let name = format!("({}) : {}", params.join(", "), self.name(return_type));
        if let Some(existing) = self.find_type(&name) {
            return existing;
        }
        let id = self.create_or_find_type(&name, BaseKind::Function, 0, None);
        let ty = &mut self.types[id.index()];
        ty.parameters.push(return_type);
        ty.parameters.extend_from_slice(parameters);
        id
    }

    /// Pointer to `ty`, created on first request
    pub fn pointer_type(&mut self, ty: TypeRef) -> TypeRef {
        if let Some(pointer) = self.get(ty).pointer_type {
            return pointer;
        }
        let name = format!("ptr<{}>", self.name(ty));
        let pointer = self.create_or_find_type(&name, BaseKind::Pointer, 0, None);
        self.types[pointer.index()].dereference_type = Some(ty);
        self.types[ty.index()].pointer_type = Some(pointer);
        pointer
    }

    /// The pointee of a pointer type, or the type itself
    pub fn value_type(&self, ty: TypeRef) -> TypeRef {
        self.get(ty).dereference_type.unwrap_or(ty)
    }

    /// Appends a struct member and indexes it by name and by (name, type name)
    pub fn add_member(&mut self, owner: TypeRef, member_type: TypeRef, name: &str) -> Result<u32, IrError> {
        if self.base(owner) != BaseKind::Struct {
            return Err(IrError::unsupported(format!(
                "cannot add member '{}' to non-struct type '{}'",
                name,
                self.name(owner)
            )));
        }
        if self.get(owner).member_by_name.contains_key(name) {
            return Err(IrError::DuplicateMember {
                owner: self.name(owner).to_string(),
                member: name.to_string(),
            });
        }
        let type_name = self.name(member_type).to_string();
        let ty = &mut self.types[owner.index()];
        let index = ty.parameters.len() as u32;
        ty.parameters.push(member_type);
        ty.member_names.push(name.to_string());
        ty.member_by_name.insert(name.to_string(), index);
        ty.member_by_name_and_type.insert((name.to_string(), type_name), index);
        ty.layout.take();
        Ok(index)
    }

    pub fn find_member_index(&self, owner: TypeRef, name: &str) -> Option<u32> {
        self.get(owner).member_by_name.get(name).copied()
    }

    pub fn find_member_index_typed(&self, owner: TypeRef, name: &str, type_name: &str) -> Option<u32> {
        self.get(owner)
            .member_by_name_and_type
            .get(&(name.to_string(), type_name.to_string()))
            .copied()
    }

    /// Member type of a struct, or return/parameter type of a function type
    pub fn sub_type(&self, owner: TypeRef, index: u32) -> Result<TypeRef, IrError> {
        let ty = self.get(owner);
        match ty.base {
            BaseKind::Struct | BaseKind::Function => ty.parameters.get(index as usize).copied().ok_or_else(|| {
                IrError::unsupported(format!("sub-type index {} out of range for '{}'", index, ty.name))
            }),
            other => Err(IrError::unsupported(format!(
                "sub-types are only defined for structs and functions, '{}' is {:?}",
                ty.name, other
            ))),
        }
    }

    pub fn sub_type_count(&self, owner: TypeRef) -> usize {
        self.get(owner).parameters.len()
    }

    pub(crate) fn add_function(&mut self, owner: TypeRef, function: FunctionRef) {
        self.types[owner.index()].functions.push(function);
    }

    pub fn byte_size(&self, ty: TypeRef) -> Result<u32, IrError> {
        Ok(self.layout(ty)?.size)
    }

    pub fn byte_alignment(&self, ty: TypeRef) -> Result<u32, IrError> {
        Ok(self.layout(ty)?.alignment)
    }

    pub fn layout(&self, ty: TypeRef) -> Result<Layout, IrError> {
        let descriptor = self.get(ty);
        if let Some(layout) = descriptor.layout.get() {
            return Ok(*layout);
        }
        let layout = self.compute_layout(descriptor)?;
        let _ = descriptor.layout.set(layout);
        Ok(layout)
    }

    fn compute_layout(&self, ty: &IrType) -> Result<Layout, IrError> {
        match ty.base {
            BaseKind::Bool | BaseKind::Int | BaseKind::Float => Ok(Layout { size: 4, alignment: 4 }),
            BaseKind::Vector => {
                let component = self.layout(self.component_of(ty)?)?;
                // vec3 aligns like vec4 but keeps its 12 byte size
                let aligned_count = if ty.components == 3 { 4 } else { ty.components };
                Ok(Layout {
                    size: component.size * ty.components,
                    alignment: component.alignment * aligned_count,
                })
            }
            BaseKind::Matrix => {
                let column = self.component_of(ty)?;
                let scalar = self.component_of(self.get(column))?;
                let alignment = 4 * self.layout(scalar)?.alignment;
                Ok(Layout {
                    size: alignment * ty.components,
                    alignment,
                })
            }
            BaseKind::FixedArray => {
                let element_ref = self.component_of(ty)?;
                let element = self.layout(element_ref)?;
                let element_base = self.base(element_ref);
                let alignment = if element_base.is_scalar() || element_base == BaseKind::Vector {
                    16
                } else {
                    element.alignment
                };
                let stride = size_after_alignment(element.size, alignment);
                Ok(Layout {
                    size: stride * ty.components,
                    alignment,
                })
            }
            BaseKind::Struct => {
                let mut offset = 0;
                let mut alignment = 0;
                for member in &ty.parameters {
                    let member = self.layout(*member)?;
                    offset = size_after_alignment(offset, member.alignment) + member.size;
                    alignment = alignment.max(member.alignment);
                }
                Ok(Layout {
                    size: size_after_alignment(offset, 16),
                    alignment: alignment.max(1),
                })
            }
            other => Err(IrError::unsupported(format!(
                "type '{}' of kind {:?} has no byte layout",
                ty.name, other
            ))),
        }
    }

    /// Byte offset of struct member `index`
    pub fn member_offset(&self, owner: TypeRef, index: u32) -> Result<u32, IrError> {
        let ty = self.get(owner);
        if ty.base != BaseKind::Struct || index as usize >= ty.parameters.len() {
            return Err(IrError::unsupported(format!(
                "no member {} on type '{}'",
                index, ty.name
            )));
        }
        let mut offset = 0;
        for (i, member) in ty.parameters.iter().enumerate() {
            let member = self.layout(*member)?;
            offset = size_after_alignment(offset, member.alignment);
            if i == index as usize {
                break;
            }
            offset += member.size;
        }
        Ok(offset)
    }

    fn component_of(&self, ty: &IrType) -> Result<TypeRef, IrError> {
        ty.component_type
            .ok_or_else(|| IrError::unsupported(format!("type '{}' has no component type", ty.name)))
    }

    /// Copies the shape of `ty` from another registry, reusing any type with
    /// the same name that already exists here.
    pub fn import_type(&mut self, source: &TypeRegistry, ty: TypeRef) -> Result<TypeRef, IrError> {
        let foreign = source.get(ty);
        if let Some(existing) = self.find_type(&foreign.name) {
            return Ok(existing);
        }
        let component = match foreign.component_type {
            Some(component) => Some(self.import_type(source, component)?),
            None => None,
        };
        match foreign.base {
            BaseKind::Pointer => {
                let pointee = foreign
                    .dereference_type
                    .ok_or_else(|| IrError::unsupported(format!("pointer '{}' has no pointee", foreign.name)))?;
                let pointee = self.import_type(source, pointee)?;
                Ok(self.pointer_type(pointee))
            }
            BaseKind::Function => {
                let mut parameters = Vec::with_capacity(foreign.parameters.len());
                for parameter in &foreign.parameters {
                    parameters.push(self.import_type(source, *parameter)?);
                }
                match parameters.split_first() {
                    Some((ret, params)) => Ok(self.function_type(*ret, params)),
                    None => Err(IrError::unsupported(format!("function type '{}' has no return type", foreign.name))),
                }
            }
            BaseKind::Struct => {
                let id = self.create_struct(&foreign.name);
                for (member, name) in foreign.parameters.iter().zip(&foreign.member_names) {
                    let member = self.import_type(source, *member)?;
                    self.add_member(id, member, name)?;
                }
                Ok(id)
            }
            base => Ok(self.create_or_find_type(&foreign.name, base, foreign.components, component)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalars(registry: &mut TypeRegistry) -> (TypeRef, TypeRef, TypeRef) {
        (
            registry.create_or_find_type("Boolean", BaseKind::Bool, 1, None),
            registry.create_or_find_type("Integer", BaseKind::Int, 1, None),
            registry.create_or_find_type("Real", BaseKind::Float, 1, None),
        )
    }

    #[test]
    fn test_create_or_find_is_idempotent() {
        let mut registry = TypeRegistry::new();
        let a = registry.create_or_find_type("Real", BaseKind::Float, 1, None);
        let b = registry.create_or_find_type("Real", BaseKind::Float, 1, None);
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_vector_layouts() {
        let mut registry = TypeRegistry::new();
        let (_, _, real) = scalars(&mut registry);
        let real2 = registry.create_or_find_type("Real2", BaseKind::Vector, 2, Some(real));
        let real3 = registry.create_or_find_type("Real3", BaseKind::Vector, 3, Some(real));
        let real4 = registry.create_or_find_type("Real4", BaseKind::Vector, 4, Some(real));

        assert_eq!(registry.layout(real2).unwrap(), Layout { size: 8, alignment: 8 });
        assert_eq!(registry.layout(real3).unwrap(), Layout { size: 12, alignment: 16 });
        assert_eq!(registry.layout(real4).unwrap(), Layout { size: 16, alignment: 16 });
    }

    #[test]
    fn test_matrix_layout() {
        let mut registry = TypeRegistry::new();
        let (_, _, real) = scalars(&mut registry);
        let real3 = registry.create_or_find_type("Real3", BaseKind::Vector, 3, Some(real));
        let real3x3 = registry.create_or_find_type("Real3x3", BaseKind::Matrix, 3, Some(real3));
        assert_eq!(registry.layout(real3x3).unwrap(), Layout { size: 48, alignment: 16 });
    }

    #[test]
    fn test_array_of_scalars_uses_16_byte_stride() {
        let mut registry = TypeRegistry::new();
        let (_, int, _) = scalars(&mut registry);
        let array = registry.create_or_find_type("FixedArray[Integer, 4]", BaseKind::FixedArray, 4, Some(int));
        assert_eq!(registry.layout(array).unwrap(), Layout { size: 64, alignment: 16 });
    }

    #[test]
    fn test_sub_type_rejects_non_aggregates() {
        let mut registry = TypeRegistry::new();
        let (_, _, real) = scalars(&mut registry);
        assert!(matches!(registry.sub_type(real, 0), Err(IrError::UnsupportedOperation(_))));
    }

    #[test]
    fn test_function_type_sub_type_zero_is_return() {
        let mut registry = TypeRegistry::new();
        let (boolean, int, real) = scalars(&mut registry);
        let func = registry.function_type(real, &[int, boolean]);
        assert_eq!(registry.name(func), "(Integer, Boolean) : Real");
        assert_eq!(registry.sub_type(func, 0).unwrap(), real);
        assert_eq!(registry.sub_type(func, 2).unwrap(), boolean);
        assert_eq!(registry.function_type(real, &[int, boolean]), func);
    }

    #[test]
    fn test_pointer_round_trip() {
        let mut registry = TypeRegistry::new();
        let (_, _, real) = scalars(&mut registry);
        let pointer = registry.pointer_type(real);
        assert!(registry.get(pointer).is_pointer());
        assert_eq!(registry.pointer_type(real), pointer);
        assert_eq!(registry.value_type(pointer), real);
        assert_eq!(registry.value_type(real), real);
        assert!(registry.byte_size(pointer).is_err());
    }

    #[test]
    fn test_add_member_invalidates_cached_layout() {
        let mut registry = TypeRegistry::new();
        let (_, _, real) = scalars(&mut registry);
        let real4 = registry.create_or_find_type("Real4", BaseKind::Vector, 4, Some(real));
        let owner = registry.create_struct("Light");
        registry.add_member(owner, real, "Intensity").unwrap();
        assert_eq!(registry.byte_size(owner).unwrap(), 16);

        registry.add_member(owner, real4, "Color").unwrap();
        assert_eq!(registry.byte_size(owner).unwrap(), 32);
        assert_eq!(registry.member_offset(owner, 1).unwrap(), 16);
    }

    #[test]
    fn test_duplicate_member_is_rejected() {
        let mut registry = TypeRegistry::new();
        let (_, _, real) = scalars(&mut registry);
        let owner = registry.create_struct("Foo");
        registry.add_member(owner, real, "A").unwrap();
        assert!(matches!(
            registry.add_member(owner, real, "A"),
            Err(IrError::DuplicateMember { .. })
        ));
    }

    #[test]
    fn test_import_struct_from_other_registry() {
        let mut source = TypeRegistry::new();
        let (_, _, real) = scalars(&mut source);
        let real3 = source.create_or_find_type("Real3", BaseKind::Vector, 3, Some(real));
        let owner = source.create_struct("Material");
        source.add_member(owner, real, "Roughness").unwrap();
        source.add_member(owner, real3, "Albedo").unwrap();

        let mut target = TypeRegistry::new();
        let imported = target.import_type(&source, owner).unwrap();
        assert_eq!(target.name(imported), "Material");
        assert_eq!(target.find_member_index(imported, "Albedo"), Some(1));
        assert_eq!(target.byte_size(imported).unwrap(), source.byte_size(owner).unwrap());
        assert_eq!(target.import_type(&source, owner).unwrap(), imported);
    }
}
