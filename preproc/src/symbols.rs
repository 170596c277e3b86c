//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexer::{BOOL_PATTERN, FLOAT_PATTERN, INT_PATTERN, NAME_PATTERN};
use crate::version::VERSION_PATTERN;

pub const DATE_VAR_NAME: &str = "__DATE__";
pub const TIME_VAR_NAME: &str = "__TIME__";
pub const FILE_VAR_NAME: &str = "__FILE__";
pub const LINE_VAR_NAME: &str = "__LINE__";
pub const RUST_VERSION_VAR_NAME: &str = "__RUST_VERSION__";
pub const PP_VERSION_VAR_NAME: &str = "__PP_VERSION__";

/// Build-metadata property files read from the working directory; every
/// key/value pair found becomes a defined variable.
const PROPERTY_FILES: &[&str] = &["build.properties", "build.number", "version.properties"];

static VALID_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{NAME_PATTERN}$")).unwrap());
static CONSTANT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        "^(?:{BOOL_PATTERN}|{VERSION_PATTERN}|{INT_PATTERN}|{FLOAT_PATTERN})$"
    ))
    .unwrap()
});

/// The table of defined macros.
///
/// One instance lives for the whole processor run and is shared (by mutable
/// reference) across recursive `#include` processing; the file driver updates
/// the `__FILE__`/`__LINE__`/`__DATE__`/`__TIME__` entries as it goes.
#[derive(Debug, Default)]
pub struct SymbolTable {
    defines: HashMap<String, String>,
}

/// Whether a value already reads as one of the constant literal forms
/// (boolean, version, integer, float).
pub fn is_constant(value: &str) -> bool {
    CONSTANT.is_match(value)
}

pub fn is_valid_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}

/// Quote a value so it round-trips as a string literal in expressions.
/// Values that are already constants are left alone.
pub fn quote(value: &str) -> String {
    if is_constant(value) {
        value.to_string()
    } else if value.contains('\'') {
        format!("\"{value}\"")
    } else {
        format!("'{value}'")
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table the way a processor run starts out: every environment
    /// variable (auto-quoted unless already a constant), the toolchain and
    /// preprocessor version variables, and everything found in the
    /// build-metadata property files.
    pub fn from_environment() -> Self {
        let mut table = Self::new();
        for (name, value) in std::env::vars() {
            table.defines.insert(name, quote(&value));
        }
        table.defines.insert(
            RUST_VERSION_VAR_NAME.to_string(),
            env!("PREPROC_RUSTC_VERSION").to_string(),
        );
        table.defines.insert(
            PP_VERSION_VAR_NAME.to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        for file in PROPERTY_FILES {
            table.load_property_file(Path::new(file));
        }
        table.set_file_variables("-- none --");
        table
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.defines.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defines.contains_key(name)
    }

    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.defines.insert(name.into(), value.into());
    }

    pub fn undefine(&mut self, name: &str) -> Option<String> {
        self.defines.remove(name)
    }

    pub fn set_line(&mut self, line_no: u64) {
        self.defines
            .insert(LINE_VAR_NAME.to_string(), line_no.to_string());
    }

    /// Reset the date/time variables to now and point `__FILE__` at the file
    /// about to be processed, returning the previous `__FILE__` value so the
    /// caller can restore it when an included file is done.
    pub fn set_file_variables(&mut self, file_name: &str) -> Option<String> {
        let now = chrono::Local::now();
        self.defines.insert(
            DATE_VAR_NAME.to_string(),
            now.format("%Y-%m-%d").to_string(),
        );
        self.defines.insert(
            TIME_VAR_NAME.to_string(),
            now.format("%H:%M:%S%.3f %Z").to_string(),
        );
        self.defines
            .insert(FILE_VAR_NAME.to_string(), file_name.to_string())
    }

    pub fn restore_file_variable(&mut self, previous: Option<String>) {
        match previous {
            Some(value) => {
                self.defines.insert(FILE_VAR_NAME.to_string(), value);
            }
            None => {
                self.defines.remove(FILE_VAR_NAME);
            }
        }
    }

    /// Read a `key=value` properties file and define (quoted) variables for
    /// everything in it.  Missing or unreadable files are simply skipped.
    fn load_property_file(&mut self, path: &Path) {
        let Ok(text) = fs::read_to_string(path) else {
            return;
        };
        for (name, value) in parse_properties(&text) {
            self.defines.insert(name, quote(&value));
        }
    }
}

/// Parse simple `key=value` (or `key: value`) property lines; `#` and `!`
/// start comment lines.
fn parse_properties(text: &str) -> Vec<(String, String)> {
    let mut properties = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let split = line
            .split_once('=')
            .or_else(|| line.split_once(':'));
        if let Some((name, value)) = split {
            let name = name.trim();
            if !name.is_empty() {
                properties.push((name.to_string(), value.trim().to_string()));
            }
        }
    }
    properties
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn constants_are_recognized() {
        for value in ["true", "FALSE", "42", "1.5", "1.2.3", "6.02e23", ".5"] {
            assert!(is_constant(value), "{value} should be a constant");
        }
        for value in ["hello", "1.2.3 beta", "", "a1", "-"] {
            assert!(!is_constant(value), "{value} should not be a constant");
        }
    }

    #[test]
    fn quoting_leaves_constants_alone() {
        assert_eq!(quote("42"), "42");
        assert_eq!(quote("1.2.3"), "1.2.3");
        assert_eq!(quote("hello world"), "'hello world'");
        assert_eq!(quote("it's"), "\"it's\"");
    }

    #[test]
    fn name_validation() {
        assert!(is_valid_name("FOO"));
        assert!(is_valid_name("_x.y2"));
        assert!(!is_valid_name("2FOO"));
        assert!(!is_valid_name("FOO BAR"));
        assert!(!is_valid_name(""));
    }

    #[test]
    fn define_and_undefine() {
        let mut table = SymbolTable::new();
        table.define("A", "1");
        assert_eq!(table.get("A"), Some("1"));
        assert!(table.contains("A"));
        assert_eq!(table.undefine("A"), Some("1".to_string()));
        assert!(!table.contains("A"));
        assert_eq!(table.undefine("A"), None);
    }

    #[test]
    fn file_variable_save_and_restore() {
        let mut table = SymbolTable::new();
        let previous = table.set_file_variables("a.rspp");
        assert_eq!(previous, None);
        assert_eq!(table.get(FILE_VAR_NAME), Some("a.rspp"));
        let previous = table.set_file_variables("inc.rspp");
        assert_eq!(previous.as_deref(), Some("a.rspp"));
        table.restore_file_variable(previous);
        assert_eq!(table.get(FILE_VAR_NAME), Some("a.rspp"));
        assert!(table.contains(DATE_VAR_NAME));
        assert!(table.contains(TIME_VAR_NAME));
    }

    #[test]
    fn property_parsing() {
        let text = "# comment\n! also comment\nbuild.number=42\nname: some tool\n\nbad line\n";
        let properties = parse_properties(text);
        assert_eq!(
            properties,
            vec![
                ("build.number".to_string(), "42".to_string()),
                ("name".to_string(), "some tool".to_string()),
            ]
        );
    }
}
