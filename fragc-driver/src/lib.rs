//! Shader fragment compiler - Driver
//!
//! Project management around the translator: code entries, dependency
//! flattening, the JSON syntax tree front end and default value collection.

pub mod host;
pub mod json_front_end;
pub mod layout;
pub mod project;

pub use host::{HostException, HostLibrary, HostObject, InitializerHost};
pub use json_front_end::JsonFrontEnd;
pub use layout::{parse_type_name, struct_layout, LayoutError, MemberLayout, StructLayout};
pub use project::{flatten_dependencies, CodeEntry, FrontEnd, FrontEndOutput, Project, UserData};
