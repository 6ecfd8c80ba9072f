//! Shader fragment compiler driver
//!
//! Command line entry point: translates serialized syntax trees into IR and
//! answers buffer layout queries.

use clap::{ArgAction, Parser, Subcommand};
use fragc_driver::{struct_layout, JsonFrontEnd, Project};
use fragc_frontend::{build_core_library, ShaderTranslator};
use fragc_ir::{Library, LibraryPrinter};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "fragc")]
#[command(about = "Shader fragment compiler")]
#[command(version = "0.1.0")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate syntax tree files into one library
    Compile {
        /// Syntax tree files (JSON)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Library name
        #[arg(short, long, default_value = "Fragment")]
        name: String,

        /// Syntax tree file compiled first as its own library (repeatable)
        #[arg(short, long)]
        dependency: Vec<PathBuf>,

        /// Print the translated IR
        #[arg(long)]
        print_ir: bool,

        /// Report every error instead of stopping at the first
        #[arg(long)]
        emit_multiple_errors: bool,

        /// Print diagnostics as JSON
        #[arg(long)]
        json_diagnostics: bool,
    },

    /// Show the buffer layout of a struct built from builtin types
    Layout {
        /// Members as `name:Type` or `Type`, e.g. `color:Real3`
        #[arg(required = true)]
        members: Vec<String>,

        /// Print the layout as JSON
        #[arg(long)]
        json: bool,
    },
}

struct CompileOptions {
    print_ir: bool,
    emit_multiple_errors: bool,
    json_diagnostics: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match cli.command {
        Commands::Compile {
            files,
            name,
            dependency,
            print_ir,
            emit_multiple_errors,
            json_diagnostics,
        } => {
            let options = CompileOptions {
                print_ir,
                emit_multiple_errors,
                json_diagnostics,
            };
            if let Err(e) = compile(&name, &files, &dependency, &options) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Layout { members, json } => {
            if let Err(e) = layout(&members, json) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn compile(
    name: &str,
    files: &[PathBuf],
    dependency_files: &[PathBuf],
    options: &CompileOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut dependencies: Vec<Arc<Library>> = vec![Arc::new(build_core_library()?)];

    for path in dependency_files {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("Dependency");
        let library = compile_library(stem, &[path.clone()], &dependencies, options)?;
        info!("compiled dependency '{}'", library.name);
        dependencies.push(library);
    }

    let library = compile_library(name, files, &dependencies, options)?;
    if options.print_ir {
        print!("{}", LibraryPrinter::new(&library));
    }
    println!(
        "Translated '{}': {} types, {} functions",
        library.name,
        library.types.len(),
        library.functions().count()
    );
    Ok(())
}

fn compile_library(
    name: &str,
    files: &[PathBuf],
    dependencies: &[Arc<Library>],
    options: &CompileOptions,
) -> Result<Arc<Library>, Box<dyn std::error::Error>> {
    let mut project = Project::new(name, Box::new(JsonFrontEnd::new()));
    project.set_emit_multiple_errors(options.emit_multiple_errors);
    for file in files {
        project.add_code_from_file(file, None)?;
    }

    let mut translator = ShaderTranslator::new();
    let result = project.compile_and_translate(dependencies, &mut translator);
    if options.json_diagnostics {
        println!("{}", serde_json::to_string_pretty(project.errors().diagnostics())?);
    } else {
        project.errors().print_diagnostics();
    }
    Ok(result?)
}

fn layout(members: &[String], json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let members: Vec<(String, String)> = members
        .iter()
        .enumerate()
        .map(|(index, member)| match member.split_once(':') {
            Some((name, ty)) => (name.to_string(), ty.to_string()),
            None => (format!("m{}", index), member.clone()),
        })
        .collect();

    let layout = struct_layout(&members)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&layout)?);
        return Ok(());
    }

    for member in &layout.members {
        println!(
            "{:>6}  {:<12} {:<16} size={} align={}",
            member.offset, member.name, member.type_name, member.size, member.alignment
        );
    }
    println!("size={} align={}", layout.size, layout.alignment);
    Ok(())
}
