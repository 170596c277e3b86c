//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::error::Result;

/// How chatty the progress output is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Normal,
    /// `-v`: per-file progress and every directive line.
    Verbose,
    /// `-vv`: also the lines emitted inside conditional blocks.
    Plus,
    /// `-vvv`: also every define and undefine as it happens.
    Super,
}

impl Verbosity {
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            2 => Verbosity::Plus,
            _ => Verbosity::Super,
        }
    }

    pub fn verbose(self) -> bool {
        self >= Verbosity::Verbose
    }

    pub fn plus(self) -> bool {
        self >= Verbosity::Plus
    }

    pub fn is_super(self) -> bool {
        self >= Verbosity::Super
    }
}

/// Diagnostic and progress stream for a processor run.
///
/// Progress goes to stdout and errors to stderr by default; with a log file
/// configured, both go to the file (opened for append unless overwriting was
/// requested).
pub struct Reporter {
    out: Box<dyn Write>,
    to_file: bool,
    pub verbosity: Verbosity,
}

impl Reporter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            out: Box::new(std::io::stdout()),
            to_file: false,
            verbosity,
        }
    }

    pub fn with_log_file(path: &Path, overwrite: bool, verbosity: Verbosity) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(!overwrite)
            .truncate(overwrite)
            .open(path)?;
        Ok(Self {
            out: Box::new(file),
            to_file: true,
            verbosity,
        })
    }

    /// Progress output; call sites gate on the verbosity level.
    pub fn info(&mut self, message: std::fmt::Arguments) {
        let _ = writeln!(self.out, "{message}");
    }

    /// An error diagnostic.  Never fatal by itself; the driver tracks
    /// whether any were issued per file.
    pub fn error(&mut self, message: std::fmt::Arguments) {
        if self.to_file {
            let _ = writeln!(self.out, "Error: {message}");
        } else {
            eprintln!("Error: {message}");
        }
    }

    /// Trace one source line.  Directive lines print whenever verbose;
    /// ordinary lines print only in plus mode while output is enabled.
    pub fn trace_line(&mut self, line_no: u64, line: &str, directive: bool, doing_output: bool) {
        if !self.verbosity.verbose() {
            return;
        }
        if self.verbosity.plus() && doing_output {
            let _ = writeln!(self.out, "{line_no:8}.+{line}");
        } else if directive {
            let _ = writeln!(self.out, "{line_no:8}. {line}");
        }
    }

    /// The one-time header above the directive trace.
    pub fn directive_header(&mut self) {
        let _ = writeln!(
            self.out,
            "  Line     Directive\n--------- --------------------------------------"
        );
    }

    /// `#echo` output.
    pub fn echo(&mut self, line_no: u64, message: &str) {
        let _ = writeln!(self.out, "{line_no:8}. {message}");
    }

    /// Re-print an offending line and mark the failing column with a caret.
    pub fn expression_error(&mut self, line_no: u64, line: &str, caret_col: usize, message: &str) {
        if !self.verbosity.verbose() {
            let _ = writeln!(self.out, "\n{line_no:8}. {line}");
        }
        let caret = format!("{:caret_col$}^", "");
        if self.to_file {
            let _ = writeln!(self.out, "{caret}\nError in expression: {message}");
        } else {
            let _ = self.out.flush();
            eprintln!("{caret}\nError in expression: {message}");
        }
    }

    pub fn flush(&mut self) {
        let _ = self.out.flush();
    }
}
