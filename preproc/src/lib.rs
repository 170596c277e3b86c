//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::path::PathBuf;

use error::{PreProcError, Result};
use process::{Options, Processor};
use report::{Reporter, Verbosity};
use symbols::SymbolTable;

mod cond;
mod directive;
pub mod error;
mod eval;
mod expand;
mod include;
mod lexer;
mod process;
mod report;
mod symbols;
mod version;

/// preproc - C-style conditional/macro preprocessor for text files
///
/// Reads line-oriented source files, interprets `#define`, `#if`-family,
/// `#include`, `#undef`, `#error` and `#echo` directives, expands
/// `$(name)`/`${name}` macro references, and writes the transformed text.
#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Args {
    /// Define a variable: `name[=value]`; several may be given in one
    /// argument separated by commas or semicolons
    #[arg(short = 'D', long)]
    pub define: Vec<String>,

    /// Undefine a variable (comma/semicolon lists accepted)
    #[arg(short = 'U', long)]
    pub undefine: Vec<String>,

    /// Character that starts a directive line
    #[arg(short = 'c', long, default_value_t = '#')]
    pub directive_char: char,

    /// Extension of input files (leading dot added if missing)
    #[arg(short = 'i', long)]
    pub input_ext: Option<String>,

    /// Extension of generated output files
    #[arg(short = 'o', long)]
    pub output_ext: Option<String>,

    /// Explicit output file name; only valid with a single input file
    #[arg(short = 'n', long)]
    pub output: Option<PathBuf>,

    /// Directories to search for included files (comma/semicolon lists)
    #[arg(short = 'P', long)]
    pub include_path: Vec<String>,

    /// Environment variable listing include directories
    #[arg(short = 'E', long, default_value = "INCLUDE")]
    pub include_var: String,

    /// Expand undefined variables as empty strings instead of erroring
    #[arg(short = 'x', long)]
    pub ignore_undefined: bool,

    /// Don't report unknown directives
    #[arg(long)]
    pub ignore_unknown_directives: bool,

    /// Read and write files as strict UTF-8
    #[arg(long)]
    pub utf8: bool,

    /// Report progress; -vv also traces emitted lines, -vvv define detail
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Process files regardless of relative output timestamps
    #[arg(short = 'a', long)]
    pub always: bool,

    /// Treat the file arguments as directories
    #[arg(short = 'r', long)]
    pub directories: bool,

    /// Treat the file arguments as directories and recurse into them
    #[arg(short = 'R', long)]
    pub recursive: bool,

    /// Write progress and diagnostics to this file instead of the console
    #[arg(short = 'L', long)]
    pub log_file: Option<PathBuf>,

    /// Overwrite the log file instead of appending to it
    #[arg(short = 'W', long)]
    pub overwrite_log: bool,

    /// Input files (or directories with -r/-R)
    pub files: Vec<PathBuf>,
}

/// Run one preprocessing invocation.  Returns whether any file had errors.
/// Configuration problems are fatal and reported as `Err` before any file
/// is touched.
pub fn run(args: Args) -> Result<bool> {
    if args.overwrite_log && args.log_file.is_none() {
        return Err(PreProcError::Config(
            "Overwrite option is not applicable for output to console.".to_string(),
        ));
    }
    if args.output.is_some() && (args.directories || args.recursive || args.files.len() > 1) {
        return Err(PreProcError::Config(
            "Setting an output file name only applies to an individual input file.".to_string(),
        ));
    }

    let verbosity = Verbosity::from_count(args.verbose);
    let reporter = match &args.log_file {
        Some(path) => Reporter::with_log_file(path, args.overwrite_log, verbosity)?,
        None => Reporter::new(verbosity),
    };

    let mut table = SymbolTable::from_environment();
    apply_defines(&mut table, &args.define)?;
    apply_undefines(&mut table, &args.undefine, args.ignore_undefined)?;

    let opts = Options {
        directive_char: args.directive_char,
        input_ext: args.input_ext.as_deref().map(dotted),
        output_ext: args.output_ext.as_deref().map(dotted),
        output_file: args.output,
        include_paths: split_list(&args.include_path)
            .into_iter()
            .map(PathBuf::from)
            .collect(),
        include_env_var: args.include_var,
        ignore_undefined: args.ignore_undefined,
        ignore_unknown_directives: args.ignore_unknown_directives,
        utf8: args.utf8,
        always_process: args.always,
        process_as_directory: args.directories || args.recursive,
        recurse_directories: args.recursive,
    };

    let mut processor = Processor::new(opts, table, reporter);
    Ok(processor.run(&args.files))
}

fn dotted(ext: &str) -> String {
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

/// Break a repeatable list option into its comma/semicolon-separated pieces.
fn split_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split([',', ';']))
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

fn apply_defines(table: &mut SymbolTable, defines: &[String]) -> Result<()> {
    for spec in split_list(defines) {
        match spec.split_once('=') {
            Some((name, value)) if symbols::is_valid_name(name) => {
                table.define(name, value);
            }
            None if symbols::is_valid_name(&spec) => {
                table.define(spec.as_str(), "");
            }
            _ => {
                return Err(PreProcError::Config(format!(
                    "Cannot parse Define value: '-D{spec}'\n\tformat should be: -Dvar=value or -Dvar"
                )))
            }
        }
    }
    Ok(())
}

fn apply_undefines(
    table: &mut SymbolTable,
    undefines: &[String],
    ignore_undefined: bool,
) -> Result<()> {
    for name in split_list(undefines) {
        if table.undefine(&name).is_none() && !ignore_undefined {
            return Err(PreProcError::Config(format!(
                "Variable '{name}' is not defined in the current environment."
            )));
        }
    }
    Ok(())
}
