//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::WalkDir;

use crate::cond::CondStack;
use crate::directive::Directive;
use crate::error::{ParseError, PreProcError, Result};
use crate::eval::{Evaluator, ProcessAs};
use crate::expand;
use crate::include::IncludeResolver;
use crate::lexer::{strip_quotes, NAME_PATTERN};
use crate::report::Reporter;
use crate::symbols::SymbolTable;

const DEFAULT_INPUT_EXT: &str = ".rspp";
const DEFAULT_OUTPUT_EXT: &str = ".rs";

/// Width of the `%8d. ` line-number prefix used by the trace output; the
/// expression-error caret is offset by this much.
const TRACE_PREFIX_WIDTH: usize = 10;

static DEFINE_WITH_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^({NAME_PATTERN})\s+(.*)$")).unwrap());
static DEFINE_NAME_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^({NAME_PATTERN})\s*$")).unwrap());

/// Processor configuration, normally assembled from the command line.
#[derive(Debug, Clone)]
pub struct Options {
    pub directive_char: char,
    pub input_ext: Option<String>,
    pub output_ext: Option<String>,
    pub output_file: Option<PathBuf>,
    pub include_paths: Vec<PathBuf>,
    pub include_env_var: String,
    pub ignore_undefined: bool,
    pub ignore_unknown_directives: bool,
    pub utf8: bool,
    pub always_process: bool,
    pub process_as_directory: bool,
    pub recurse_directories: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            directive_char: '#',
            input_ext: None,
            output_ext: None,
            output_file: None,
            include_paths: Vec::new(),
            include_env_var: "INCLUDE".to_string(),
            ignore_undefined: false,
            ignore_unknown_directives: false,
            utf8: false,
            always_process: false,
            process_as_directory: false,
            recurse_directories: false,
        }
    }
}

/// What happened to one input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Processed { errors: bool },
    /// The output already exists and is newer than the input.
    Skipped,
}

enum LineClass {
    /// `#*...`: dropped, not even a blank line in the output.
    Comment,
    /// `##directive`: emitted as `#directive` through the ordinary path.
    Pass(String),
    Directive {
        word: String,
        args: String,
        arg_offset: usize,
    },
    Ordinary,
}

/// The file driver: reads lines, dispatches directives, writes output.
///
/// One instance owns the macro table for a whole run; `#include` re-enters
/// `process_file` recursively with the writer of the including file, while
/// the conditional stack stays local to each activation.
pub struct Processor {
    opts: Options,
    symbols: SymbolTable,
    reporter: Reporter,
    resolver: IncludeResolver,
    comment_pat: Regex,
    pass_pat: Regex,
    cmd_pat: Regex,
    input_ext: Option<String>,
    output_ext: Option<String>,
}

impl Processor {
    pub fn new(opts: Options, symbols: SymbolTable, reporter: Reporter) -> Self {
        let ch = regex::escape(&opts.directive_char.to_string());
        let comment_pat = Regex::new(&format!(r"^\s*{ch}\*.*$")).unwrap();
        let pass_pat = Regex::new(&format!(r"^\s*{ch}({ch}\s*\S+.*)$")).unwrap();
        let cmd_pat = Regex::new(&format!(r"^\s*{ch}\s*(\S+)(.*)$")).unwrap();
        let resolver = IncludeResolver::new(
            opts.include_paths.clone(),
            opts.include_env_var.clone(),
        );
        let input_ext = opts.input_ext.clone();
        let output_ext = opts.output_ext.clone();
        Self {
            opts,
            symbols,
            reporter,
            resolver,
            comment_pat,
            pass_pat,
            cmd_pat,
            input_ext,
            output_ext,
        }
    }

    /// Process every file (or directory) argument.  Returns whether any of
    /// them had errors; one failing file never stops its siblings.
    pub fn run(&mut self, files: &[PathBuf]) -> bool {
        let errors = if self.opts.process_as_directory {
            self.set_default_extensions();
            let mut errors = false;
            for arg in files {
                errors |= self.process_dir(arg);
            }
            errors
        } else {
            self.process_file_specs(files)
        };
        self.reporter.flush();
        errors
    }

    /// Fill in whichever extension defaults the command line left open.  An
    /// input extension is the output one with `pp` appended.
    fn set_default_extensions(&mut self) {
        match (&self.input_ext, &self.output_ext) {
            (None, Some(output)) => self.input_ext = Some(format!("{output}pp")),
            (Some(input), None) => {
                self.output_ext = Some(input.strip_suffix("pp").unwrap_or(input).to_string());
            }
            (None, None) => {
                self.input_ext = Some(DEFAULT_INPUT_EXT.to_string());
                self.output_ext = Some(DEFAULT_OUTPUT_EXT.to_string());
            }
            (Some(_), Some(_)) => {}
        }
    }

    fn process_file_specs(&mut self, files: &[PathBuf]) -> bool {
        let mut errors = false;
        for arg in files {
            // In single-file mode each file's own extension can stand in
            // for an unconfigured input extension.
            let last_input = self.input_ext.clone();
            let last_output = self.output_ext.clone();
            if self.input_ext.is_none() {
                if let Some(ext) = arg.extension() {
                    self.input_ext = Some(format!(".{}", ext.to_string_lossy()));
                }
            }
            self.set_default_extensions();

            match self.process_named_file(arg, None) {
                Ok(ProcessOutcome::Processed { errors: e }) => errors |= e,
                Ok(ProcessOutcome::Skipped) => {}
                Err(error) => {
                    self.reporter.error(format_args!("{error}"));
                    errors = true;
                }
            }

            self.input_ext = last_input;
            self.output_ext = last_output;
        }
        errors
    }

    fn process_dir(&mut self, dir: &Path) -> bool {
        let mut errors = false;
        if !dir.is_dir() {
            return false;
        }
        let input_ext = self.input_ext.clone().unwrap_or_default();
        let max_depth = if self.opts.recurse_directories {
            usize::MAX
        } else {
            1
        };
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name();
        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            if !entry.file_name().to_string_lossy().ends_with(&input_ext) {
                continue;
            }
            match self.process_file(entry.path(), None) {
                Ok(ProcessOutcome::Processed { errors: e }) => errors |= e,
                Ok(ProcessOutcome::Skipped) => {}
                Err(error) => {
                    self.reporter.error(format_args!(
                        "Problem while processing file '{}'!\n\t{}",
                        entry.path().display(),
                        error
                    ));
                    errors = true;
                }
            }
        }
        errors
    }

    /// Process a file named on the command line or in an `#include`; a name
    /// that doesn't exist as given is retried with the input extension.
    fn process_named_file(
        &mut self,
        path: &Path,
        writer: Option<&mut dyn Write>,
    ) -> Result<ProcessOutcome> {
        if path.is_file() {
            return self.process_file(path, writer);
        }
        let mut with_ext = path.as_os_str().to_owned();
        with_ext.push(self.input_ext.as_deref().unwrap_or(""));
        let with_ext = PathBuf::from(with_ext);
        if with_ext.is_file() {
            return self.process_file(&with_ext, writer);
        }
        Err(PreProcError::FileNotFound(path.display().to_string()))
    }

    /// Process one file.  `writer` is `None` for a top-level file (the
    /// output file is created here) and the including file's writer for an
    /// `#include`.  `__FILE__` is saved around the call and restored on
    /// every exit path.
    fn process_file(
        &mut self,
        path: &Path,
        writer: Option<&mut dyn Write>,
    ) -> Result<ProcessOutcome> {
        let name = path.display().to_string();
        let previous_file = self.symbols.set_file_variables(&name);
        let result = self.process_file_guts(path, &name, writer);
        self.symbols.restore_file_variable(previous_file);
        result
    }

    fn process_file_guts(
        &mut self,
        path: &Path,
        name: &str,
        writer: Option<&mut dyn Write>,
    ) -> Result<ProcessOutcome> {
        let bytes = fs::read(path)?;
        let text = self.decode(name, bytes)?;
        let file_type = if self.opts.utf8 { " (UTF-8)" } else { "" };

        if let Some(writer) = writer {
            if self.reporter.verbosity.verbose() {
                self.reporter
                    .info(format_args!("Including file '{name}'{file_type}..."));
            }
            let errors = self.process_lines(&text, name, writer)?;
            return Ok(ProcessOutcome::Processed { errors });
        }

        let out_name = self.output_name(path);
        if out_name == path {
            self.reporter.error(format_args!(
                "Output file name must not be the same as input file name: '{name}'!"
            ));
            return Ok(ProcessOutcome::Processed { errors: true });
        }
        if !self.opts.always_process && output_is_fresh(path, &out_name) {
            if self.reporter.verbosity.verbose() {
                self.reporter.info(format_args!(
                    "Skipping file because output '{}'\n         is newer than input '{name}'.",
                    out_name.display()
                ));
            }
            return Ok(ProcessOutcome::Skipped);
        }
        if self.reporter.verbosity.verbose() {
            self.reporter.info(format_args!(
                "Generating output file '{}'{file_type}\n       from input file '{name}'...",
                out_name.display()
            ));
        }

        let mut out_writer = BufWriter::new(fs::File::create(&out_name)?);
        let errors = self.process_lines(&text, name, &mut out_writer)?;
        out_writer.flush()?;
        Ok(ProcessOutcome::Processed { errors })
    }

    /// The per-line loop shared by top-level files and includes.
    fn process_lines(
        &mut self,
        text: &str,
        name: &str,
        writer: &mut dyn Write,
    ) -> Result<bool> {
        let mut errors = false;
        let mut cond = CondStack::new();
        let mut printed_header = false;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index as u64 + 1;
            let line = raw.strip_suffix('\r').unwrap_or(raw);

            match self.classify_line(line) {
                LineClass::Comment => continue,
                LineClass::Directive {
                    word,
                    args,
                    arg_offset,
                } => {
                    errors |= self.handle_directive(
                        &word,
                        &args,
                        arg_offset,
                        line,
                        line_no,
                        &mut cond,
                        &mut printed_header,
                        writer,
                    );
                }
                LineClass::Pass(passed) => {
                    errors |= self.emit_line(&passed, line_no, &cond, writer)?;
                }
                LineClass::Ordinary => {
                    errors |= self.emit_line(line, line_no, &cond, writer)?;
                }
            }
        }

        if cond.depth() > 0 {
            if cond.depth() == 1 {
                self.reporter.error(format_args!(
                    "Missing one '#endif' before the end of file \"{name}\"!"
                ));
            } else {
                self.reporter.error(format_args!(
                    "Missing {} '#endif' statements before the end of file \"{name}\"!",
                    cond.depth()
                ));
            }
            errors = true;
        }
        if cond.extra_endifs() > 0 {
            if cond.extra_endifs() == 1 {
                self.reporter.error(format_args!(
                    "One too many '#endif' statements before the end of file \"{name}\"!"
                ));
            } else {
                self.reporter.error(format_args!(
                    "{} too many '#endif' statements before the end of file \"{name}\"!",
                    cond.extra_endifs()
                ));
            }
            errors = true;
        }

        Ok(errors)
    }

    fn classify_line(&self, line: &str) -> LineClass {
        if self.comment_pat.is_match(line) {
            return LineClass::Comment;
        }
        if let Some(caps) = self.pass_pat.captures(line) {
            return LineClass::Pass(caps.get(1).unwrap().as_str().to_string());
        }
        if let Some(caps) = self.cmd_pat.captures(line) {
            let word = caps.get(1).unwrap();
            return LineClass::Directive {
                word: word.as_str().to_string(),
                args: caps.get(2).unwrap().as_str().to_string(),
                arg_offset: word.end(),
            };
        }
        LineClass::Ordinary
    }

    /// Write one ordinary (or passed-through) line when output is enabled.
    /// Blank lines keep their line terminator but skip substitution.
    fn emit_line(
        &mut self,
        line: &str,
        line_no: u64,
        cond: &CondStack,
        writer: &mut dyn Write,
    ) -> Result<bool> {
        if !cond.doing_output() {
            return Ok(false);
        }
        if line.trim().is_empty() {
            writeln!(writer)?;
            return Ok(false);
        }
        self.symbols.set_line(line_no);
        let (expanded, had_errors) = self.substitute_checked(line);
        writeln!(writer, "{expanded}")?;
        if cond.depth() > 0 {
            self.reporter.trace_line(line_no, &expanded, false, true);
        }
        Ok(had_errors)
    }

    /// Dispatch one directive line.  Returns whether it produced errors.
    #[allow(clippy::too_many_arguments)]
    fn handle_directive(
        &mut self,
        word: &str,
        args: &str,
        arg_offset: usize,
        line: &str,
        line_no: u64,
        cond: &mut CondStack,
        printed_header: &mut bool,
        writer: &mut dyn Write,
    ) -> bool {
        if self.reporter.verbosity.verbose() && !*printed_header {
            self.reporter.directive_header();
            *printed_header = true;
        }
        self.symbols.set_line(line_no);

        let directive = Directive::classify(word);
        let mut errors = false;
        // Conditions are evaluated (and parse errors shown) before the
        // frame is pushed, so a bad expression still opens a block that a
        // matching #endif will close.
        let mut if_result: Option<(bool, bool)> = None;
        let mut parse_error: Option<ParseError> = None;

        match directive {
            Directive::If | Directive::IfNum | Directive::IfStr | Directive::IfIStr => {
                self.reporter.trace_line(line_no, line, true, false);
                let mode = match directive {
                    Directive::If => ProcessAs::Normal,
                    Directive::IfNum => ProcessAs::Numeric,
                    Directive::IfStr => ProcessAs::ForceString,
                    Directive::IfIStr => ProcessAs::StringInsensitive,
                    _ => unreachable!(),
                };
                let value = match self.eval_condition(args, mode) {
                    Ok(value) => value,
                    Err(error) => {
                        parse_error = Some(error);
                        false
                    }
                };
                if_result = Some((false, value));
            }
            Directive::IfDef | Directive::IfNdef => {
                self.reporter.trace_line(line_no, line, true, false);
                let (name_arg, had) = self.substitute_checked(args.trim());
                errors |= had;
                let defined = self.symbols.contains(&name_arg);
                let value = if directive == Directive::IfDef {
                    defined
                } else {
                    !defined
                };
                if_result = Some((false, value));
            }
            Directive::Else => {
                self.reporter.trace_line(line_no, line, true, false);
                if !cond.handle_else() {
                    self.reporter
                        .error(format_args!("Line {line_no}. #else without preceding #if!"));
                    errors = true;
                }
            }
            Directive::Elif => {
                self.reporter.trace_line(line_no, line, true, false);
                if cond.depth() == 0 {
                    self.reporter.error(format_args!(
                        "Line {line_no}. #{word} without preceding #if!"
                    ));
                    errors = true;
                } else {
                    let value = match self.eval_condition(args, ProcessAs::Normal) {
                        Ok(value) => value,
                        Err(error) => {
                            parse_error = Some(error);
                            false
                        }
                    };
                    if_result = Some((true, value));
                }
            }
            Directive::EndIf => {
                self.reporter.trace_line(line_no, line, true, false);
                if !cond.end_if() {
                    self.reporter.error(format_args!(
                        "Line {line_no}. #endif without preceding #if!"
                    ));
                    errors = true;
                }
            }
            Directive::Define => {
                self.reporter
                    .trace_line(line_no, line, true, cond.doing_output());
                if cond.doing_output() {
                    let (spec, had) = self.substitute_checked(args.trim());
                    errors |= had;
                    if let Some(caps) = DEFINE_WITH_VALUE.captures(&spec) {
                        let var = caps.get(1).unwrap().as_str().to_string();
                        let value = caps.get(2).unwrap().as_str().to_string();
                        if self.reporter.verbosity.is_super() {
                            self.reporter
                                .info(format_args!("Defining '{var}' to '{value}'"));
                        }
                        self.symbols.define(var, value);
                    } else if let Some(caps) = DEFINE_NAME_ONLY.captures(&spec) {
                        let var = caps.get(1).unwrap().as_str().to_string();
                        if self.reporter.verbosity.is_super() {
                            self.reporter.info(format_args!("Defining '{var}'"));
                        }
                        self.symbols.define(var, "");
                    } else {
                        self.reporter.error(format_args!(
                            "Line {line_no}. Wrong syntax for '#define': {spec}\n\tformat should be: #define var value or simply #define var"
                        ));
                        errors = true;
                    }
                }
            }
            Directive::Undef => {
                self.reporter
                    .trace_line(line_no, line, true, cond.doing_output());
                if cond.doing_output() {
                    let (var, had) = self.substitute_checked(args.trim());
                    errors |= had;
                    if self.symbols.undefine(&var).is_some() {
                        if self.reporter.verbosity.is_super() {
                            self.reporter.info(format_args!("Undefining '{var}'"));
                        }
                    } else if !self.opts.ignore_undefined {
                        self.reporter.error(format_args!(
                            "Line {line_no}. Trying to undefine variable '{var}' which is not defined!"
                        ));
                        errors = true;
                    }
                }
            }
            Directive::Include => {
                self.reporter
                    .trace_line(line_no, line, true, cond.doing_output());
                if cond.doing_output() {
                    let (target, had) = self.substitute_checked(args.trim());
                    errors |= had;
                    let target = strip_brackets(&target);
                    if self.process_include(target, writer) {
                        errors = true;
                    }
                }
            }
            Directive::Error => {
                self.reporter
                    .trace_line(line_no, line, true, cond.doing_output());
                if cond.doing_output() {
                    self.reporter.error(format_args!("{}", args.trim()));
                    errors = true;
                }
            }
            Directive::Echo => {
                if self.reporter.verbosity.verbose() {
                    let (message, _) = self.substitute_checked(args.trim());
                    self.reporter.echo(line_no, &message);
                }
            }
            Directive::Unknown => {
                if !self.opts.ignore_unknown_directives {
                    self.reporter.trace_line(line_no, line, true, false);
                    self.reporter.error(format_args!(
                        "Line {line_no}. Unknown directive: '{word}'"
                    ));
                    errors = true;
                }
            }
        }

        if let Some(error) = parse_error {
            let caret_col = error.offset + arg_offset + TRACE_PREFIX_WIDTH;
            self.reporter
                .expression_error(line_no, line, caret_col, &error.message);
            errors = true;
        }
        if let Some((is_elif, value)) = if_result {
            if is_elif {
                cond.begin_elif(value);
            } else {
                cond.begin_if(value);
            }
        }

        errors
    }

    /// Resolve and recursively process an `#include`, sharing the writer.
    fn process_include(&mut self, name: &str, writer: &mut dyn Write) -> bool {
        let input_ext = self.input_ext.clone().unwrap_or_default();
        match self.resolver.resolve(name, &input_ext) {
            Some(path) => match self.process_file(&path, Some(writer)) {
                Ok(ProcessOutcome::Processed { errors }) => errors,
                Ok(ProcessOutcome::Skipped) => false,
                Err(error) => {
                    self.reporter.error(format_args!(
                        "Problem while processing file '{name}'!\n\t{error}"
                    ));
                    true
                }
            },
            None => {
                self.reporter
                    .error(format_args!("Unable to find include file \"{name}\""));
                true
            }
        }
    }

    fn eval_condition(&mut self, args: &str, mode: ProcessAs) -> std::result::Result<bool, ParseError> {
        let mut evaluator = Evaluator::new(&self.symbols, self.opts.ignore_undefined);
        let result = evaluator.evaluate(args, mode);
        let diags = evaluator.take_diagnostics();
        for diag in diags {
            self.reporter.error(format_args!("{diag}"));
        }
        result
    }

    /// Macro-substitute `text`, reporting any undefined references.
    fn substitute_checked(&mut self, text: &str) -> (String, bool) {
        let mut diags = Vec::new();
        let output = expand::substitute(
            &self.symbols,
            text,
            self.opts.ignore_undefined,
            &mut diags,
        );
        let had_errors = !diags.is_empty();
        for diag in diags {
            self.reporter.error(format_args!("{diag}"));
        }
        (output, had_errors)
    }

    fn output_name(&self, input: &Path) -> PathBuf {
        if let Some(explicit) = &self.opts.output_file {
            return explicit.clone();
        }
        let name = input.as_os_str().to_string_lossy();
        if let Some(input_ext) = self.input_ext.as_deref() {
            if !input_ext.is_empty() {
                if let Some(stem) = name.strip_suffix(input_ext) {
                    let output_ext = self.output_ext.as_deref().unwrap_or("");
                    return PathBuf::from(format!("{stem}{output_ext}"));
                }
            }
        }
        input.to_path_buf()
    }

    fn decode(&self, name: &str, bytes: Vec<u8>) -> Result<String> {
        if self.opts.utf8 {
            String::from_utf8(bytes).map_err(|_| PreProcError::InvalidUtf8(name.to_string()))
        } else {
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

fn output_is_fresh(input: &Path, output: &Path) -> bool {
    let Ok(out_meta) = fs::metadata(output) else {
        return false;
    };
    let Ok(in_meta) = fs::metadata(input) else {
        return false;
    };
    match (out_meta.modified(), in_meta.modified()) {
        (Ok(out_time), Ok(in_time)) => out_time > in_time,
        _ => false,
    }
}

/// Strip the `<>`/`[]`/`{}` bracket pair (or quotes) around an `#include`
/// file name.  A lone opening bracket passes through untouched.
fn strip_brackets(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let close = match bytes[0] {
            b'<' => Some(b'>'),
            b'[' => Some(b']'),
            b'{' => Some(b'}'),
            _ => None,
        };
        if let Some(close) = close {
            if bytes[bytes.len() - 1] == close {
                return &value[1..value.len() - 1];
            }
            return value;
        }
    }
    strip_quotes(value)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::report::Verbosity;

    fn processor() -> Processor {
        Processor::new(
            Options::default(),
            SymbolTable::new(),
            Reporter::new(Verbosity::Normal),
        )
    }

    fn run_lines(processor: &mut Processor, input: &str) -> (String, bool) {
        let mut output = Vec::new();
        let errors = processor
            .process_lines(input, "test.rspp", &mut output)
            .unwrap();
        (String::from_utf8(output).unwrap(), errors)
    }

    #[test]
    fn defines_substitute_into_text() {
        let mut p = processor();
        let (output, errors) = run_lines(&mut p, "#define GREETING Hello\n$(GREETING), World!\n");
        assert_eq!(output, "Hello, World!\n");
        assert!(!errors);
    }

    #[test]
    fn else_branch_of_false_condition() {
        let mut p = processor();
        let (output, errors) = run_lines(&mut p, "#if 1 == 2\nA\n#else\nB\n#endif\n");
        assert_eq!(output, "B\n");
        assert!(!errors);
    }

    #[test]
    fn elif_chain_takes_middle_branch() {
        let mut p = processor();
        let input = "#define X 5\n#if X > 10\nbig\n#elif X > 3\nmedium\n#else\nsmall\n#endif\n";
        let (output, errors) = run_lines(&mut p, input);
        assert_eq!(output, "medium\n");
        assert!(!errors);
    }

    #[test]
    fn ifdef_of_undefined_macro() {
        let mut p = processor();
        let input = "#ifdef NOT_DEFINED_ANYWHERE\nyes\n#else\nno\n#endif\n";
        let (output, errors) = run_lines(&mut p, input);
        assert_eq!(output, "no\n");
        assert!(!errors);
    }

    #[test]
    fn lone_endif_is_recoverable() {
        let mut p = processor();
        let (output, errors) = run_lines(&mut p, "before\n#endif\nafter\n");
        assert_eq!(output, "before\nafter\n");
        assert!(errors);
    }

    #[test]
    fn missing_endif_is_reported() {
        let mut p = processor();
        let (output, errors) = run_lines(&mut p, "#if true\nshown\n");
        assert_eq!(output, "shown\n");
        assert!(errors);
    }

    #[test]
    fn nested_blocks_inside_false_branch_stay_hidden() {
        let mut p = processor();
        let input = "#if false\n#if true\nhidden\n#endif\nalso hidden\n#endif\nshown\n";
        let (output, errors) = run_lines(&mut p, input);
        assert_eq!(output, "shown\n");
        assert!(!errors);
    }

    #[test]
    fn comment_lines_disappear() {
        let mut p = processor();
        let (output, _) = run_lines(&mut p, "#* internal note\nkeep\n");
        assert_eq!(output, "keep\n");
    }

    #[test]
    fn pass_through_directives_are_emitted_verbatim() {
        let mut p = processor();
        let (output, errors) = run_lines(&mut p, "##define KEEP 1\n");
        assert_eq!(output, "#define KEEP 1\n");
        assert!(!errors);
    }

    #[test]
    fn define_without_value_is_empty() {
        let mut p = processor();
        let input = "#define FLAG\n#ifdef FLAG\nset[$(FLAG)]\n#endif\n";
        let (output, errors) = run_lines(&mut p, input);
        assert_eq!(output, "set[]\n");
        assert!(!errors);
    }

    #[test]
    fn undef_removes_a_definition() {
        let mut p = processor();
        let input = "#define X 1\n#undef X\n#ifdef X\ndefined\n#else\ngone\n#endif\n";
        let (output, errors) = run_lines(&mut p, input);
        assert_eq!(output, "gone\n");
        assert!(!errors);
    }

    #[test]
    fn undef_of_unknown_variable_is_an_error() {
        let mut p = processor();
        let (_, errors) = run_lines(&mut p, "#undef NO_SUCH_VARIABLE_HERE\n");
        assert!(errors);

        let mut p = Processor::new(
            Options {
                ignore_undefined: true,
                ..Options::default()
            },
            SymbolTable::new(),
            Reporter::new(Verbosity::Normal),
        );
        let (_, errors) = run_lines(&mut p, "#undef NO_SUCH_VARIABLE_HERE\n");
        assert!(!errors);
    }

    #[test]
    fn defines_are_ignored_in_false_branches() {
        let mut p = processor();
        let input = "#if false\n#define X 1\n#endif\n#ifdef X\nset\n#else\nunset\n#endif\n";
        let (output, _) = run_lines(&mut p, input);
        assert_eq!(output, "unset\n");
    }

    #[test]
    fn error_directive_marks_the_file() {
        let mut p = processor();
        let (output, errors) = run_lines(&mut p, "#error something is wrong\nstill here\n");
        assert_eq!(output, "still here\n");
        assert!(errors);
    }

    #[test]
    fn bad_expression_recovers_on_next_line() {
        let mut p = processor();
        let input = "#if @@@\nhidden\n#endif\nshown\n";
        let (output, errors) = run_lines(&mut p, input);
        assert_eq!(output, "shown\n");
        assert!(errors);
    }

    #[test]
    fn unknown_directive_is_reported_unless_ignored() {
        let mut p = processor();
        let (_, errors) = run_lines(&mut p, "#pragma once\n");
        assert!(errors);

        let mut p = Processor::new(
            Options {
                ignore_unknown_directives: true,
                ..Options::default()
            },
            SymbolTable::new(),
            Reporter::new(Verbosity::Normal),
        );
        let (_, errors) = run_lines(&mut p, "#pragma once\n");
        assert!(!errors);
    }

    #[test]
    fn line_variable_tracks_line_numbers() {
        let mut p = processor();
        let (output, _) = run_lines(&mut p, "first\nline $(__LINE__)\n");
        assert_eq!(output, "first\nline 2\n");
    }

    #[test]
    fn blank_lines_keep_their_terminator() {
        let mut p = processor();
        let (output, _) = run_lines(&mut p, "a\n\nb\n");
        assert_eq!(output, "a\n\nb\n");
    }

    #[test]
    fn alternate_directive_char() {
        let mut p = Processor::new(
            Options {
                directive_char: '!',
                ..Options::default()
            },
            SymbolTable::new(),
            Reporter::new(Verbosity::Normal),
        );
        let input = "!if false\nhidden\n!endif\n# not a directive\n";
        let (output, errors) = run_lines(&mut p, input);
        assert_eq!(output, "# not a directive\n");
        assert!(!errors);
    }

    #[test]
    fn output_name_swaps_extension() {
        let mut p = processor();
        p.set_default_extensions();
        assert_eq!(
            p.output_name(Path::new("src/main.rspp")),
            PathBuf::from("src/main.rs")
        );
        // No input extension in the name means no swap, which the driver
        // rejects as same-name output.
        assert_eq!(
            p.output_name(Path::new("src/main.txt")),
            PathBuf::from("src/main.txt")
        );
    }

    #[test]
    fn extension_defaulting() {
        let mut p = processor();
        p.set_default_extensions();
        assert_eq!(p.input_ext.as_deref(), Some(".rspp"));
        assert_eq!(p.output_ext.as_deref(), Some(".rs"));

        let mut p = Processor::new(
            Options {
                output_ext: Some(".txt".to_string()),
                ..Options::default()
            },
            SymbolTable::new(),
            Reporter::new(Verbosity::Normal),
        );
        p.set_default_extensions();
        assert_eq!(p.input_ext.as_deref(), Some(".txtpp"));

        let mut p = Processor::new(
            Options {
                input_ext: Some(".mdpp".to_string()),
                ..Options::default()
            },
            SymbolTable::new(),
            Reporter::new(Verbosity::Normal),
        );
        p.set_default_extensions();
        assert_eq!(p.output_ext.as_deref(), Some(".md"));
    }

    #[test]
    fn strip_brackets_handles_all_pairs() {
        assert_eq!(strip_brackets("<file.h>"), "file.h");
        assert_eq!(strip_brackets("[file.h]"), "file.h");
        assert_eq!(strip_brackets("{file.h}"), "file.h");
        assert_eq!(strip_brackets("\"file.h\""), "file.h");
        assert_eq!(strip_brackets("'file.h'"), "file.h");
        assert_eq!(strip_brackets("file.h"), "file.h");
        assert_eq!(strip_brackets("<file.h"), "<file.h");
    }
}
