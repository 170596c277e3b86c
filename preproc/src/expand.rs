//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexer::NAME_PATTERN;
use crate::symbols::SymbolTable;

/// Bound on nested macro expansion.  Values defined in terms of other macros
/// expand recursively; a self-referential definition would otherwise recurse
/// until the stack runs out.
pub const MAX_EXPANSION_DEPTH: usize = 64;

static MACRO_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\$\(({NAME_PATTERN})\)|\$\{{({NAME_PATTERN})\}}"
    ))
    .unwrap()
});

/// Substitute every `$(name)`/`${name}` reference in `input`.
///
/// A defined value is itself substituted recursively before being spliced in,
/// so chains of macros resolve in one call.  An undefined reference is left
/// in place and reported through `diags`, or replaced by the empty string
/// when `ignore_undefined` is set.
pub fn substitute(
    symbols: &SymbolTable,
    input: &str,
    ignore_undefined: bool,
    diags: &mut Vec<String>,
) -> String {
    substitute_depth(symbols, input, ignore_undefined, diags, 0)
}

fn substitute_depth(
    symbols: &SymbolTable,
    input: &str,
    ignore_undefined: bool,
    diags: &mut Vec<String>,
    depth: usize,
) -> String {
    if input.trim().is_empty() {
        return input.to_string();
    }

    let mut output = String::with_capacity(input.len() * 2);
    let mut last = 0;
    for caps in MACRO_REF.captures_iter(input) {
        let whole = caps.get(0).unwrap();
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        output.push_str(&input[last..whole.start()]);
        match symbols.get(name) {
            Some(value) => {
                if depth >= MAX_EXPANSION_DEPTH {
                    diags.push(format!(
                        "Macro \"{name}\" expansion is too deep (circular definition?)"
                    ));
                    output.push_str(whole.as_str());
                } else {
                    let value = value.to_string();
                    output.push_str(&substitute_depth(
                        symbols,
                        &value,
                        ignore_undefined,
                        diags,
                        depth + 1,
                    ));
                }
            }
            None => {
                if !ignore_undefined {
                    diags.push(format!("Macro \"{name}\" not defined!"));
                    output.push_str(whole.as_str());
                }
            }
        }
        last = whole.end();
    }
    output.push_str(&input[last..]);
    output
}

#[cfg(test)]
mod test {
    use super::*;

    fn table(pairs: &[(&str, &str)]) -> SymbolTable {
        let mut table = SymbolTable::new();
        for (name, value) in pairs {
            table.define(*name, *value);
        }
        table
    }

    fn subst(table: &SymbolTable, input: &str) -> (String, Vec<String>) {
        let mut diags = Vec::new();
        let output = substitute(table, input, false, &mut diags);
        (output, diags)
    }

    #[test]
    fn replaces_both_reference_forms() {
        let table = table(&[("A", "1"), ("B", "2")]);
        let (output, diags) = subst(&table, "x $(A) y ${B} z");
        assert_eq!(output, "x 1 y 2 z");
        assert!(diags.is_empty());
    }

    #[test]
    fn resolves_macro_chains() {
        let table = table(&[("A", "$(B)!"), ("B", "${C}"), ("C", "deep")]);
        let (output, diags) = subst(&table, "[$(A)]");
        assert_eq!(output, "[deep!]");
        assert!(diags.is_empty());
    }

    #[test]
    fn substitution_is_confluent_for_acyclic_macros() {
        let table = table(&[("A", "$(B) $(B)"), ("B", "b")]);
        let (once, _) = subst(&table, "$(A)");
        let (twice, _) = subst(&table, &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn undefined_reference_is_reported_and_left_alone() {
        let table = SymbolTable::new();
        let (output, diags) = subst(&table, "a $(NOPE) b");
        assert_eq!(output, "a $(NOPE) b");
        assert_eq!(diags, vec!["Macro \"NOPE\" not defined!".to_string()]);
    }

    #[test]
    fn ignore_undefined_substitutes_empty() {
        let table = SymbolTable::new();
        let mut diags = Vec::new();
        let output = substitute(&table, "a $(NOPE) b", true, &mut diags);
        assert_eq!(output, "a  b");
        assert!(diags.is_empty());
    }

    #[test]
    fn circular_definition_is_bounded() {
        let table = table(&[("A", "$(B)"), ("B", "$(A)")]);
        let (output, diags) = subst(&table, "$(A)");
        assert!(output.contains("$("));
        assert!(!diags.is_empty());
        assert!(diags[0].contains("too deep"));
    }

    #[test]
    fn blank_input_passes_through() {
        let table = SymbolTable::new();
        let (output, diags) = subst(&table, "   ");
        assert_eq!(output, "   ");
        assert!(diags.is_empty());
    }
}
