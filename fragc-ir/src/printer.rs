//! Text listing of a library

use crate::blocks::{BasicBlock, BlockType};
use crate::instructions::Op;
use crate::library::Library;
use crate::types::BaseKind;
use std::fmt;

/// Displays a library as a human readable listing
pub struct LibraryPrinter<'a> {
    library: &'a Library,
}

impl<'a> LibraryPrinter<'a> {
    pub fn new(library: &'a Library) -> Self {
        Self { library }
    }

    fn write_op(&self, f: &mut fmt::Formatter<'_>, op: &Op) -> fmt::Result {
        write!(f, "    ")?;
        if let Some(result) = op.result {
            write!(f, "{} = ", result)?;
        }
        write!(f, "{}", op.opcode)?;
        if let Some(ty) = op.result_type {
            write!(f, " <{}>", self.library.types.name(ty))?;
        }
        for operand in &op.operands {
            write!(f, " {}", operand)?;
        }
        if let Some(name) = &op.debug_name {
            write!(f, "  ; {}", name)?;
        }
        writeln!(f)
    }

    fn write_block(&self, f: &mut fmt::Formatter<'_>, block: &BasicBlock) -> fmt::Result {
        write!(f, "  {} ({}):", block.id, block.name)?;
        match block.block_type {
            BlockType::Direct => {}
            BlockType::Selection => write!(f, " selection")?,
            BlockType::Loop => write!(f, " loop")?,
        }
        if let Some(merge) = block.merge_point {
            write!(f, " merge={}", merge)?;
        }
        if let Some(continue_target) = block.continue_point {
            write!(f, " continue={}", continue_target)?;
        }
        writeln!(f)?;
        for op in block.local_variables.iter().chain(&block.ops) {
            self.write_op(f, op)?;
        }
        Ok(())
    }
}

impl fmt::Display for LibraryPrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let library = self.library;
        writeln!(f, "library {} ({})", library.name, library.id())?;

        for (id, ty) in library.types.iter() {
            write!(f, "type {} {} {:?}", id, ty.name, ty.base)?;
            if ty.base == BaseKind::Struct {
                for (member, name) in ty.parameters().iter().zip(ty.member_names()) {
                    write!(f, " {}:{}", name, library.types.name(*member))?;
                }
            }
            if let Ok(layout) = library.types.layout(id) {
                write!(f, " size={} align={}", layout.size, layout.alignment)?;
            }
            writeln!(f)?;
        }

        for (id, constant) in library.constants() {
            writeln!(f, "const {} <{}> {}", id, library.types.name(constant.ty), constant.value)?;
        }

        for (id, function) in library.functions() {
            let params: Vec<String> = function
                .parameters
                .iter()
                .map(|p| format!("{} {}: {}", p.id, p.name, library.types.name(p.ty)))
                .collect();
            writeln!(
                f,
                "function {} {}.{}({}) {}",
                id,
                library.types.name(function.owner),
                function.name,
                params.join(", "),
                library.types.name(function.function_type)
            )?;
            for block in function.blocks() {
                self.write_block(f, block)?;
            }
        }
        Ok(())
    }
}
