//! Compilation driver
//!
//! A `Project` collects fragment source, runs the host front end over it and
//! translates the resulting syntax tree into a new `Library`. Dependencies
//! are shared, already translated libraries.

use crate::host::HostLibrary;
use fragc_common::{CompilerError, Diagnostic, ErrorReporter};
use fragc_frontend::{SyntaxTree, Translator};
use fragc_ir::{Library, LibraryId, RuntimeValue};
use log::{debug, info};
use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Opaque data attached to a code entry by the caller
pub type UserData = Arc<dyn Any + Send + Sync>;

/// One unit of fragment source
#[derive(Clone)]
pub struct CodeEntry {
    pub code: String,
    pub location: String,
    pub user_data: Option<UserData>,
}

impl fmt::Debug for CodeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeEntry")
            .field("location", &self.location)
            .field("code_len", &self.code.len())
            .field("user_data", &self.user_data.is_some())
            .finish()
    }
}

/// What the host front end produces for one compile
pub struct FrontEndOutput {
    pub tree: SyntaxTree,
    pub host: Box<dyn HostLibrary>,
}

/// The host language front end
pub trait FrontEnd {
    fn compile(&mut self, entries: &[CodeEntry], dependencies: &[Arc<Library>]) -> Result<FrontEndOutput, CompilerError>;
}

pub struct Project {
    name: String,
    entries: Vec<CodeEntry>,
    front_end: Box<dyn FrontEnd>,
    errors: ErrorReporter,
}

impl Project {
    pub fn new(name: &str, front_end: Box<dyn FrontEnd>) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
            front_end,
            errors: ErrorReporter::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[CodeEntry] {
        &self.entries
    }

    /// Diagnostics of the last compile
    pub fn errors(&self) -> &ErrorReporter {
        &self.errors
    }

    pub fn set_emit_multiple_errors(&mut self, emit: bool) {
        self.errors.set_emit_multiple_errors(emit);
    }

    pub fn add_code_from_string(&mut self, code: &str, location: &str, user_data: Option<UserData>) {
        self.entries.push(CodeEntry {
            code: code.to_string(),
            location: location.to_string(),
            user_data,
        });
    }

    pub fn add_code_from_file(&mut self, path: &Path, user_data: Option<UserData>) -> Result<(), CompilerError> {
        let code = std::fs::read_to_string(path).map_err(|err| CompilerError::IoError {
            message: format!("{}: {}", path.display(), err),
        })?;
        self.add_code_from_string(&code, &path.display().to_string(), user_data);
        Ok(())
    }

    /// Compiles every code entry and translates it into a new library.
    ///
    /// On failure nothing is returned and the diagnostics stay readable
    /// through `errors()` until the next compile.
    pub fn compile_and_translate(
        &mut self,
        dependencies: &[Arc<Library>],
        translator: &mut dyn Translator,
    ) -> Result<Arc<Library>, CompilerError> {
        self.errors.clear();
        let dependencies = flatten_dependencies(dependencies)?;
        info!(
            "compiling '{}': {} entries, {} dependencies",
            self.name,
            self.entries.len(),
            dependencies.len()
        );

        let FrontEndOutput { tree, mut host } = match self.front_end.compile(&self.entries, &dependencies) {
            Ok(output) => output,
            Err(err) => {
                self.errors.report(Diagnostic::from(&err));
                return Err(err);
            }
        };

        let mut library = Library::new(&self.name);
        library.set_dependencies(dependencies);
        if !translator.translate(&tree, &mut library, &mut self.errors) {
            debug!("translation of '{}' failed: {}", self.name, self.errors.summary());
            return Err(CompilerError::TranslationFailed {
                library: self.name.clone(),
            });
        }

        collect_default_values(&mut library, host.as_mut())?;
        Ok(Arc::new(library))
    }
}

/// Transitive closure of `roots` in breadth-first order, each library once
pub fn flatten_dependencies(roots: &[Arc<Library>]) -> Result<Vec<Arc<Library>>, CompilerError> {
    let mut visited: HashSet<LibraryId> = HashSet::new();
    let mut queue: VecDeque<Arc<Library>> = roots.iter().cloned().collect();
    let mut flattened = Vec::new();

    while let Some(library) = queue.pop_front() {
        if !visited.insert(library.id()) {
            continue;
        }
        if !library.is_translated() {
            return Err(CompilerError::internal(format!(
                "dependency '{}' has not been translated",
                library.name
            )));
        }
        queue.extend(library.dependencies().iter().cloned());
        flattened.push(library);
    }
    Ok(flattened)
}

/// Snapshots the default value of every stored field by default
/// constructing each class of `library` through the host
fn collect_default_values(library: &mut Library, host: &mut dyn HostLibrary) -> Result<(), CompilerError> {
    let mut snapshots: Vec<(usize, usize, RuntimeValue)> = Vec::new();
    for (meta_index, meta) in library.type_meta().iter().enumerate() {
        let object = host.default_construct(library, meta.type_id).map_err(|err| {
            CompilerError::internal(format!("default construction of '{}' failed: {}", meta.name, err))
        })?;
        for (field_index, field) in meta.fields.iter().enumerate() {
            if field.member_index.is_none() {
                continue;
            }
            let value = host.get_property(library, &object, field.property).map_err(|err| {
                CompilerError::internal(format!("reading default of '{}.{}' failed: {}", meta.name, field.name, err))
            })?;
            snapshots.push((meta_index, field_index, value));
        }
    }

    debug!("collected {} default values", snapshots.len());
    let metas = library.type_meta_mut();
    for (meta_index, field_index, value) in snapshots {
        metas[meta_index].fields[field_index].default_value = Some(value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn translated(name: &str, dependencies: Vec<Arc<Library>>) -> Arc<Library> {
        let mut library = Library::new(name);
        library.set_dependencies(dependencies);
        library.mark_translated();
        Arc::new(library)
    }

    #[test]
    fn test_flatten_is_breadth_first() {
        let c = translated("C", Vec::new());
        let a = translated("A", vec![c.clone()]);
        let b = translated("B", vec![c.clone()]);

        let flattened = flatten_dependencies(&[a, b]).unwrap();
        let names: Vec<&str> = flattened.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_untranslated_dependency() {
        let raw = Arc::new(Library::new("Raw"));
        let top = translated("Top", vec![raw]);
        assert!(matches!(
            flatten_dependencies(&[top]),
            Err(CompilerError::InternalConsistency { .. })
        ));
    }

    #[test]
    fn test_code_entries() {
        struct Unused;
        impl FrontEnd for Unused {
            fn compile(&mut self, _: &[CodeEntry], _: &[Arc<Library>]) -> Result<FrontEndOutput, CompilerError> {
                Err(CompilerError::internal("unused"))
            }
        }

        let mut project = Project::new("Entries", Box::new(Unused));
        project.add_code_from_string("{}", "a.json", Some(Arc::new(7u32)));
        assert_eq!(project.entries().len(), 1);
        assert_eq!(project.entries()[0].location, "a.json");
        let data = project.entries()[0].user_data.clone().unwrap();
        assert_eq!(data.downcast_ref::<u32>(), Some(&7));

        let missing = project.add_code_from_file(Path::new("/nonexistent/fragment.json"), None);
        assert!(matches!(missing, Err(CompilerError::IoError { .. })));
        assert_eq!(project.entries().len(), 1);
    }
}
