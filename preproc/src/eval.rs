//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;

use crate::error::ParseError;
use crate::expand;
use crate::lexer::{self, parse_bool, strip_quotes, Operator, Token, TokenKind};
use crate::symbols::SymbolTable;
use crate::version::Version;

/// How operands of an `#if`-family expression are coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessAs {
    /// `#ifnum`: all values must coerce to numbers; anything else errors.
    Numeric,
    /// `#ifstr`: comparisons are always lexicographic.
    ForceString,
    /// `#ifistr`: lexicographic, case-insensitive.
    StringInsensitive,
    /// `#if`: numeric when both operands coerce, string otherwise.
    Normal,
}

/// Budget for splicing macro expansions into the token list of a single
/// expression.  A circular macro chain would otherwise splice forever.
const MAX_SPLICES: usize = 256;

/// A failed numeric extraction.  `NotNumeric` rewinds the cursor and retries
/// the operand with the next coercion (integer, double, version, string);
/// `Hard` is a real syntax error that aborts the expression.
enum NumError {
    NotNumeric,
    Hard(ParseError),
}

type NumResult<T> = Result<T, NumError>;

impl From<ParseError> for NumError {
    fn from(error: ParseError) -> Self {
        NumError::Hard(error)
    }
}

/// Recursive-descent evaluator for directive expressions.
///
/// Grammar, lowest precedence first:
/// `or-term := and-term (OR and-term)*`,
/// `and-term := rel-term (AND rel-term)*`,
/// `rel-term := term rel-op term | other-factor`,
/// with numeric terms handling unary sign and `+ - * / %`.
///
/// `AND`/`OR` short-circuit by value only: once the result is decided the
/// remaining operand is still parsed, in an "eating" mode that tolerates
/// bad numeric operands (the value is discarded) but still requires valid
/// structure.
pub struct Evaluator<'a> {
    symbols: &'a SymbolTable,
    ignore_undefined: bool,
    tokens: Vec<Token>,
    pos: usize,
    expr_len: usize,
    splices: usize,
    diagnostics: Vec<String>,
}

impl<'a> Evaluator<'a> {
    pub fn new(symbols: &'a SymbolTable, ignore_undefined: bool) -> Self {
        Self {
            symbols,
            ignore_undefined,
            tokens: Vec::new(),
            pos: 0,
            expr_len: 0,
            splices: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Evaluate `expr` to a boolean under the given coercion mode.
    pub fn evaluate(&mut self, expr: &str, mode: ProcessAs) -> Result<bool, ParseError> {
        self.tokens = lexer::tokenize(expr, 0)?;
        self.pos = 0;
        self.expr_len = expr.len();
        self.splices = 0;

        let value = self.or_term(mode)?;
        if let Some(token) = self.tokens.get(self.pos) {
            return Err(ParseError::new("Not expecting anything more", token.start));
        }
        Ok(value)
    }

    /// Non-fatal diagnostics (divide by zero, undefined macros inside string
    /// values) collected during evaluation.
    pub fn take_diagnostics(&mut self) -> Vec<String> {
        std::mem::take(&mut self.diagnostics)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Consume the next token if it is the given kind of operator.
    fn take_oper(&mut self, wanted: &[Operator]) -> Option<(Operator, String)> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Oper(op),
                text,
                ..
            }) if wanted.contains(op) => {
                let result = (*op, text.clone());
                self.pos += 1;
                Some(result)
            }
            _ => None,
        }
    }

    fn take_rel_op(&mut self) -> Option<Operator> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Oper(op),
                ..
            }) if op.is_relational() => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    /// `or-term := and-term (OR and-term)*`, short-circuiting once true.
    fn or_term(&mut self, mode: ProcessAs) -> Result<bool, ParseError> {
        let mut value = self.and_term(mode, false)?;
        while let Some((_, text)) = self.take_oper(&[Operator::Or]) {
            if self.pos >= self.tokens.len() {
                return Err(ParseError::new(
                    format!("Expecting an expression after {text}"),
                    self.expr_len,
                ));
            }
            if value {
                self.and_term(mode, true)?;
            } else {
                value = self.and_term(mode, false)?;
            }
        }
        Ok(value)
    }

    /// `and-term := rel-term (AND rel-term)*`, short-circuiting once false.
    fn and_term(&mut self, mode: ProcessAs, eating: bool) -> Result<bool, ParseError> {
        let mut value = self.rel_term(mode, eating)?;
        while let Some((_, text)) = self.take_oper(&[Operator::And]) {
            if self.pos >= self.tokens.len() {
                return Err(ParseError::new(
                    format!("Expecting an expression after {text}"),
                    self.expr_len,
                ));
            }
            if !value || eating {
                self.rel_term(mode, true)?;
            } else {
                value = self.rel_term(mode, false)?;
            }
        }
        Ok(value)
    }

    /// A relational comparison (or bare truth test) with coercion fallback:
    /// integers, then doubles, then versions, then strings, then the other
    /// factors (booleans, `defined()`, parenthesized expressions, `NOT`).
    fn rel_term(&mut self, mode: ProcessAs, eating: bool) -> Result<bool, ParseError> {
        let save = self.pos;

        if matches!(mode, ProcessAs::Numeric | ProcessAs::Normal) {
            match self.int_rel(mode, eating) {
                Ok(value) => return Ok(value),
                Err(NumError::Hard(error)) => return Err(error),
                Err(NumError::NotNumeric) => {}
            }
            self.pos = save;
            match self.dbl_rel(mode, eating) {
                Ok(value) => return Ok(value),
                Err(NumError::Hard(error)) => return Err(error),
                Err(NumError::NotNumeric) => {}
            }
            self.pos = save;
            match self.version_rel(eating) {
                Ok(value) => return Ok(value),
                Err(NumError::Hard(error)) => return Err(error),
                Err(NumError::NotNumeric) => {}
            }
        }

        self.pos = save;
        match self.string_rel(mode, eating) {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(NumError::Hard(error)) => return Err(error),
            Err(NumError::NotNumeric) => {}
        }

        self.pos = save;
        self.other_factor(mode)
    }

    fn int_rel(&mut self, mode: ProcessAs, eating: bool) -> NumResult<bool> {
        let left = self.integer_term(mode, eating)?;
        match self.take_rel_op() {
            Some(op) => {
                let right = self.integer_term(mode, eating)?;
                Ok(rel_result(op, left.cmp(&right)))
            }
            None => Ok(left != 0),
        }
    }

    fn dbl_rel(&mut self, mode: ProcessAs, eating: bool) -> NumResult<bool> {
        let left = self.double_term(mode, eating)?;
        match self.take_rel_op() {
            Some(op) => {
                let right = self.double_term(mode, eating)?;
                Ok(match op {
                    Operator::Equal => left == right,
                    Operator::NotEqual => left != right,
                    Operator::Less => left < right,
                    Operator::LessEqual => left <= right,
                    Operator::Greater => left > right,
                    Operator::GreaterEqual => left >= right,
                    _ => unreachable!("relational operator"),
                })
            }
            None => Ok(left != 0.0),
        }
    }

    fn version_rel(&mut self, eating: bool) -> NumResult<bool> {
        let left = self.version_value(eating)?;
        match self.take_rel_op() {
            Some(op) => {
                let right = self.version_value(eating)?;
                Ok(rel_result(op, left.cmp(&right)))
            }
            // A bare version has no numeric truth value; let the string
            // handling (and its error reporting) deal with it.
            None => Err(NumError::NotNumeric),
        }
    }

    fn string_rel(&mut self, mode: ProcessAs, eating: bool) -> NumResult<Option<bool>> {
        let Some(left) = self.string_factor(false, eating)? else {
            return Ok(None);
        };
        if mode == ProcessAs::Numeric {
            let offset = self
                .tokens
                .get(self.pos.saturating_sub(1))
                .map(|t| t.start)
                .unwrap_or(self.expr_len);
            return Err(NumError::Hard(ParseError::new(
                "#ifnum requires numeric values",
                offset,
            )));
        }
        match self.take_rel_op() {
            Some(op) => {
                let Some(right) = self.string_factor(true, eating)? else {
                    return Err(NumError::Hard(ParseError::new(
                        "Expecting a string value after the relational operator",
                        self.expr_len,
                    )));
                };
                let left = strip_quotes(&left);
                let right = strip_quotes(&right);
                let ordering = if mode == ProcessAs::StringInsensitive {
                    left.to_lowercase().cmp(&right.to_lowercase())
                } else {
                    left.cmp(right)
                };
                Ok(Some(rel_result(op, ordering)))
            }
            None => Err(NumError::Hard(ParseError::new(
                "Expecting a relational operator with a string",
                self.expr_len,
            ))),
        }
    }

    /// `int-term := int-factor ([*/%] int-factor)*`.  Division or modulus by
    /// zero is a diagnostic, not an error; the sub-result becomes zero.
    fn integer_term(&mut self, mode: ProcessAs, eating: bool) -> NumResult<i64> {
        let mut value = self.integer_factor(mode, eating)?;
        while let Some((op, text)) =
            self.take_oper(&[Operator::Multiply, Operator::Divide, Operator::Modulus])
        {
            if self.pos >= self.tokens.len() {
                return Err(NumError::Hard(ParseError::new(
                    format!("Expecting an expression after {text}"),
                    self.expr_len,
                )));
            }
            let right = self.integer_factor(mode, eating)?;
            value = match op {
                Operator::Multiply => value.wrapping_mul(right),
                Operator::Divide => {
                    if right == 0 {
                        self.diagnostics.push("Divide by zero!".to_string());
                        0
                    } else {
                        value.wrapping_div(right)
                    }
                }
                Operator::Modulus => {
                    if right == 0 {
                        self.diagnostics.push(
                            "Modulus value of zero (equivalent to divide by zero)!".to_string(),
                        );
                        0
                    } else {
                        value.wrapping_rem(right)
                    }
                }
                _ => unreachable!(),
            };
        }
        Ok(value)
    }

    /// `int-factor := int-value ([+-] int-value)*`.
    fn integer_factor(&mut self, mode: ProcessAs, eating: bool) -> NumResult<i64> {
        let mut value = self.integer_value(mode, eating)?;
        while let Some((op, text)) = self.take_oper(&[Operator::Add, Operator::Subtract]) {
            if self.pos >= self.tokens.len() {
                return Err(NumError::Hard(ParseError::new(
                    format!("Expecting an expression after {text}"),
                    self.expr_len,
                )));
            }
            let right = self.integer_value(mode, eating)?;
            value = match op {
                Operator::Add => value.wrapping_add(right),
                Operator::Subtract => value.wrapping_sub(right),
                _ => unreachable!(),
            };
        }
        Ok(value)
    }

    fn integer_value(&mut self, mode: ProcessAs, eating: bool) -> NumResult<i64> {
        let (token, sign) = self.signed_operand()?;
        let value = if eating {
            // Only the high-level syntax matters here, not whether the
            // numbers are good or not.
            match token.kind {
                TokenKind::OpenParen => {
                    let inner = self.integer_term(mode, eating)?;
                    self.expect_close_paren_soft()?;
                    inner
                }
                _ => 0,
            }
        } else {
            match token.kind {
                TokenKind::SqString | TokenKind::DqString
                    if matches!(mode, ProcessAs::Numeric | ProcessAs::Normal) =>
                {
                    strip_quotes(&token.text)
                        .parse()
                        .map_err(|_| NumError::NotNumeric)?
                }
                TokenKind::SqString
                | TokenKind::DqString
                | TokenKind::Version(_)
                | TokenKind::Int
                | TokenKind::Float => {
                    token.text.parse().map_err(|_| NumError::NotNumeric)?
                }
                TokenKind::VarRef => {
                    self.splice_var_ref(self.pos - 1)?;
                    self.integer_term(mode, eating)?
                }
                TokenKind::Bool => {
                    if parse_bool(&token.text) {
                        1
                    } else {
                        0
                    }
                }
                TokenKind::OpenParen => {
                    let inner = self.integer_term(mode, eating)?;
                    self.expect_close_paren_soft()?;
                    inner
                }
                _ => return Err(NumError::NotNumeric),
            }
        };
        Ok(sign * value)
    }

    /// The double-precision twin of the integer chain, used when integer
    /// extraction fails (for example on `1.5` or `2e3`).
    fn double_term(&mut self, mode: ProcessAs, eating: bool) -> NumResult<f64> {
        let mut value = self.double_factor(mode, eating)?;
        while let Some((op, text)) =
            self.take_oper(&[Operator::Multiply, Operator::Divide, Operator::Modulus])
        {
            if self.pos >= self.tokens.len() {
                return Err(NumError::Hard(ParseError::new(
                    format!("Expecting an expression after {text}"),
                    self.expr_len,
                )));
            }
            let right = self.double_factor(mode, eating)?;
            value = match op {
                Operator::Multiply => value * right,
                Operator::Divide => {
                    if right == 0.0 {
                        self.diagnostics.push("Divide by zero!".to_string());
                        0.0
                    } else {
                        value / right
                    }
                }
                Operator::Modulus => {
                    if right == 0.0 {
                        self.diagnostics.push(
                            "Modulus value of zero (equivalent to divide by zero)!".to_string(),
                        );
                        0.0
                    } else {
                        value % right
                    }
                }
                _ => unreachable!(),
            };
        }
        Ok(value)
    }

    fn double_factor(&mut self, mode: ProcessAs, eating: bool) -> NumResult<f64> {
        let mut value = self.double_value(mode, eating)?;
        while let Some((op, text)) = self.take_oper(&[Operator::Add, Operator::Subtract]) {
            if self.pos >= self.tokens.len() {
                return Err(NumError::Hard(ParseError::new(
                    format!("Expecting an expression after {text}"),
                    self.expr_len,
                )));
            }
            let right = self.double_value(mode, eating)?;
            value = match op {
                Operator::Add => value + right,
                Operator::Subtract => value - right,
                _ => unreachable!(),
            };
        }
        Ok(value)
    }

    fn double_value(&mut self, mode: ProcessAs, eating: bool) -> NumResult<f64> {
        let (token, sign) = self.signed_operand()?;
        let value = if eating {
            match token.kind {
                TokenKind::OpenParen => {
                    let inner = self.double_term(mode, eating)?;
                    self.expect_close_paren_soft()?;
                    inner
                }
                _ => 0.0,
            }
        } else {
            match token.kind {
                TokenKind::SqString | TokenKind::DqString
                    if matches!(mode, ProcessAs::Numeric | ProcessAs::Normal) =>
                {
                    strip_quotes(&token.text)
                        .parse()
                        .map_err(|_| NumError::NotNumeric)?
                }
                TokenKind::SqString
                | TokenKind::DqString
                | TokenKind::Version(_)
                | TokenKind::Int
                | TokenKind::Float => {
                    token.text.parse().map_err(|_| NumError::NotNumeric)?
                }
                TokenKind::VarRef => {
                    self.splice_var_ref(self.pos - 1)?;
                    self.double_term(mode, eating)?
                }
                TokenKind::Bool => {
                    if parse_bool(&token.text) {
                        1.0
                    } else {
                        0.0
                    }
                }
                TokenKind::OpenParen => {
                    let inner = self.double_term(mode, eating)?;
                    self.expect_close_paren_soft()?;
                    inner
                }
                _ => return Err(NumError::NotNumeric),
            }
        };
        Ok(sign as f64 * value)
    }

    fn version_value(&mut self, eating: bool) -> NumResult<Version> {
        let zero = Version {
            major: 0,
            minor: 0,
            patch: None,
            release: None,
        };
        let Some(token) = self.next_token() else {
            return Err(NumError::NotNumeric);
        };
        if eating {
            return match token.kind {
                TokenKind::OpenParen => {
                    let inner = self.version_value(eating)?;
                    self.expect_close_paren_soft()?;
                    Ok(inner)
                }
                _ => Ok(zero),
            };
        }
        match token.kind {
            TokenKind::Version(version) => Ok(version),
            TokenKind::SqString | TokenKind::DqString => {
                Version::parse_full(strip_quotes(&token.text)).ok_or(NumError::NotNumeric)
            }
            TokenKind::VarRef => {
                self.splice_var_ref(self.pos - 1)?;
                self.version_value(eating)
            }
            TokenKind::OpenParen => {
                let inner = self.version_value(eating)?;
                self.expect_close_paren_soft()?;
                Ok(inner)
            }
            _ => Err(NumError::NotNumeric),
        }
    }

    /// A string operand: quoted strings, version text, numbers when allowed,
    /// macro references, and parenthesized string factors.  Returns `None`
    /// when the current token cannot yield a string, letting the caller fall
    /// back to the other factors.
    fn string_factor(&mut self, allow_numbers: bool, eating: bool) -> NumResult<Option<String>> {
        let Some(token) = self.next_token() else {
            return Ok(None);
        };
        match token.kind {
            TokenKind::SqString | TokenKind::DqString | TokenKind::Version(_) => {
                Ok(Some(self.do_subs(&token.text)))
            }
            TokenKind::Int | TokenKind::Float => {
                if allow_numbers {
                    Ok(Some(self.do_subs(&token.text)))
                } else {
                    Ok(None)
                }
            }
            TokenKind::VarRef => {
                self.splice_var_ref(self.pos - 1)?;
                self.string_factor(allow_numbers, eating)
            }
            TokenKind::OpenParen => {
                if self.pos >= self.tokens.len() {
                    return Err(NumError::NotNumeric);
                }
                let inner = self.string_factor(allow_numbers, eating)?;
                self.expect_close_paren_soft()?;
                Ok(inner)
            }
            _ => {
                self.pos -= 1;
                Ok(None)
            }
        }
    }

    /// Booleans, `defined(name)`, parenthesized sub-expressions, unary `NOT`,
    /// and macro references that expand to any of those.
    fn other_factor(&mut self, mode: ProcessAs) -> Result<bool, ParseError> {
        let Some(token) = self.next_token() else {
            return Err(ParseError::new("Expecting an expression", self.expr_len));
        };
        match token.kind {
            TokenKind::Bool => Ok(parse_bool(&token.text)),
            TokenKind::DefinedFunc => Ok(self.symbols.contains(&token.text)),
            TokenKind::OpenParen => {
                if self.pos >= self.tokens.len() {
                    return Err(ParseError::new(
                        "Expecting an expression after '('",
                        self.expr_len,
                    ));
                }
                let value = self.or_term(mode)?;
                match self.next_token() {
                    Some(Token {
                        kind: TokenKind::CloseParen,
                        ..
                    }) => Ok(value),
                    Some(token) => Err(ParseError::new(
                        "Expecting ')' after expression",
                        token.start,
                    )),
                    None => Err(ParseError::new(
                        "Expecting ')' before end of expression",
                        self.expr_len,
                    )),
                }
            }
            TokenKind::VarRef => {
                match self.splice_var_ref(self.pos - 1) {
                    Ok(()) => {}
                    Err(NumError::Hard(error)) => return Err(error),
                    Err(NumError::NotNumeric) => unreachable!("splice errors are hard"),
                }
                self.other_factor(mode)
            }
            TokenKind::Oper(Operator::Not) => Ok(!self.other_factor(mode)?),
            _ => {
                self.pos -= 1;
                Ok(false)
            }
        }
    }

    /// Consume an optional unary `+`/`-` and the operand token after it.
    fn signed_operand(&mut self) -> NumResult<(Token, i64)> {
        let Some(mut token) = self.next_token() else {
            return Err(NumError::Hard(ParseError::new(
                "Expecting an expression",
                self.expr_len,
            )));
        };
        let mut sign = 1;
        if let TokenKind::Oper(op) = token.kind {
            sign = match op {
                Operator::Add => 1,
                Operator::Subtract => -1,
                _ => return Err(NumError::NotNumeric),
            };
            token = match self.next_token() {
                Some(token) => token,
                None => {
                    return Err(NumError::Hard(ParseError::new(
                        "Expecting a number after the sign",
                        self.expr_len,
                    )))
                }
            };
        }
        Ok((token, sign))
    }

    /// Expect a closing parenthesis; failure is a soft error so the caller
    /// can retry the operand with the next coercion.
    fn expect_close_paren_soft(&mut self) -> NumResult<()> {
        match self.next_token() {
            Some(Token {
                kind: TokenKind::CloseParen,
                ..
            }) => Ok(()),
            _ => Err(NumError::NotNumeric),
        }
    }

    /// Replace the macro reference at `index` with the tokenized form of its
    /// value and rewind the cursor so parsing resumes over the splice.
    fn splice_var_ref(&mut self, index: usize) -> NumResult<()> {
        let token = self.tokens[index].clone();
        let value = match self.symbols.get(&token.text) {
            Some(value) => value.to_string(),
            None => {
                if self.ignore_undefined {
                    String::new()
                } else {
                    return Err(NumError::Hard(ParseError::new(
                        format!("Variable \"{}\" not defined!", token.text),
                        token.start,
                    )));
                }
            }
        };
        if self.splices >= MAX_SPLICES {
            return Err(NumError::Hard(ParseError::new(
                format!(
                    "Macro \"{}\" expansion is too deep (circular definition?)",
                    token.text
                ),
                token.start,
            )));
        }
        self.splices += 1;
        let new_tokens = lexer::tokenize(&value, token.start)?;
        self.tokens.splice(index..=index, new_tokens);
        self.pos = index;
        Ok(())
    }

    fn do_subs(&mut self, text: &str) -> String {
        expand::substitute(
            self.symbols,
            text,
            self.ignore_undefined,
            &mut self.diagnostics,
        )
    }
}

fn rel_result(op: Operator, ordering: Ordering) -> bool {
    match op {
        Operator::Equal => ordering == Ordering::Equal,
        Operator::NotEqual => ordering != Ordering::Equal,
        Operator::Less => ordering == Ordering::Less,
        Operator::LessEqual => ordering != Ordering::Greater,
        Operator::Greater => ordering == Ordering::Greater,
        Operator::GreaterEqual => ordering != Ordering::Less,
        _ => unreachable!("relational operator"),
    }
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

    fn eval(expr: &str) -> bool {
        eval_with(&SymbolTable::new(), expr, ProcessAs::Normal).unwrap()
    }

    fn eval_with(
        symbols: &SymbolTable,
        expr: &str,
        mode: ProcessAs,
    ) -> Result<bool, ParseError> {
        Evaluator::new(symbols, false).evaluate(expr, mode)
    }

    #[test]
    fn integer_comparisons() {
        assert!(!eval("1 == 2"));
        assert!(eval("2 == 2"));
        assert!(eval("1 != 2"));
        assert!(eval("1 < 2"));
        assert!(eval("2 <= 2"));
        assert!(eval("3 > 2"));
        assert!(eval("3 >= 3"));
    }

    #[test]
    fn integer_arithmetic() {
        assert!(eval("1 + 2 == 3"));
        assert!(eval("6 / 2 == 3"));
        assert!(eval("7 % 3 == 1"));
        assert!(eval("-2 + 3 == 1"));
        assert!(eval("(1 + 2) * 3 == 9"));
        assert!(eval("2 * 3 == 6"));
    }

    #[test]
    fn bare_number_is_a_truth_test() {
        assert!(eval("1"));
        assert!(!eval("0"));
        assert!(eval("2 - 1"));
    }

    #[test]
    fn double_fallback() {
        assert!(eval("1.5 > 1.4"));
        assert!(eval("1 / 2 == 0"));
        assert!(eval("3e2 == 300"));
    }

    #[test]
    fn version_comparison_is_component_wise() {
        assert!(eval("1.10.0 > 1.9.9"));
        assert!(eval("1.2.3 == 1.2.3"));
        assert!(eval("1.2 < 1.2.0"));
        assert!(eval("'2.10.4' > '2.9.0'"));
    }

    #[test]
    fn string_comparisons() {
        assert!(eval("'abc' == 'abc'"));
        assert!(eval("'abc' < 'abd'"));
        assert!(!eval("'abc' == 'ABC'"));
        let symbols = SymbolTable::new();
        assert!(eval_with(&symbols, "'abc' == 'ABC'", ProcessAs::StringInsensitive).unwrap());
        // Numbers compare as text under forced-string mode.
        assert!(eval_with(&symbols, "'10' < '9'", ProcessAs::ForceString).unwrap());
    }

    #[test]
    fn numeric_mode_rejects_strings() {
        let symbols = SymbolTable::new();
        let error = eval_with(&symbols, "'abc' == 'abc'", ProcessAs::Numeric).unwrap_err();
        assert!(error.message.contains("requires numeric values"));
        assert!(eval_with(&symbols, "1 + 1 == 2", ProcessAs::Numeric).unwrap());
    }

    #[test]
    fn boolean_operators() {
        assert!(eval("true"));
        assert!(!eval("false"));
        assert!(eval("true && true"));
        assert!(!eval("true && false"));
        assert!(eval("false || true"));
        assert!(eval("NOT false"));
        assert!(eval("!false"));
        assert!(eval("true AND true OR false"));
    }

    #[test]
    fn short_circuit_tolerates_bad_numbers() {
        // The right side is parsed but its values are not validated.
        assert!(!eval("1 == 2 && zzz == 1"));
        assert!(eval("1 == 1 || zzz == 1"));
    }

    #[test]
    fn short_circuit_still_requires_structure() {
        assert!(eval_with(&SymbolTable::new(), "1 == 1 || (1 == 2", ProcessAs::Normal).is_err());
        assert!(eval_with(&SymbolTable::new(), "1 == 1 ||", ProcessAs::Normal).is_err());
    }

    #[test]
    fn division_by_zero_is_a_diagnostic() {
        let symbols = SymbolTable::new();
        let mut evaluator = Evaluator::new(&symbols, false);
        assert!(evaluator.evaluate("1 / 0 == 0", ProcessAs::Normal).unwrap());
        let diags = evaluator.take_diagnostics();
        assert_eq!(diags, vec!["Divide by zero!".to_string()]);

        let mut evaluator = Evaluator::new(&symbols, false);
        assert!(evaluator.evaluate("5 % 0 == 0", ProcessAs::Normal).unwrap());
        assert!(!evaluator.take_diagnostics().is_empty());
    }

    #[test]
    fn defined_function() {
        let symbols = table(&[("FOO", "1")]);
        assert!(eval_with(&symbols, "defined(FOO)", ProcessAs::Normal).unwrap());
        assert!(!eval_with(&symbols, "defined(BAR)", ProcessAs::Normal).unwrap());
        assert!(eval_with(&symbols, "!defined(BAR)", ProcessAs::Normal).unwrap());
        assert!(
            eval_with(&symbols, "defined(FOO) && $(FOO) == 1", ProcessAs::Normal).unwrap()
        );
    }

    #[test]
    fn macro_references_expand_in_place() {
        let symbols = table(&[("X", "5"), ("Y", "X + 1")]);
        assert!(eval_with(&symbols, "$(X) == 5", ProcessAs::Normal).unwrap());
        assert!(eval_with(&symbols, "X == 5", ProcessAs::Normal).unwrap());
        assert!(eval_with(&symbols, "${X} > 3", ProcessAs::Normal).unwrap());
        // Spliced tokens are re-parsed, so a macro can hold part of an
        // expression.
        assert!(eval_with(&symbols, "Y == 6", ProcessAs::Normal).unwrap());
    }

    #[test]
    fn undefined_reference_is_an_error() {
        let symbols = SymbolTable::new();
        let error = eval_with(&symbols, "MISSING_MACRO == 1", ProcessAs::Normal).unwrap_err();
        assert!(error.message.contains("not defined"));

        let mut evaluator = Evaluator::new(&symbols, true);
        // Ignore-undefined expands to nothing; the comparison is then just
        // a bare number.
        assert!(evaluator.evaluate("MISSING_MACRO 1", ProcessAs::Normal).unwrap());
    }

    #[test]
    fn circular_macros_are_bounded() {
        let symbols = table(&[("A", "B"), ("B", "A")]);
        let error = eval_with(&symbols, "A == 1", ProcessAs::Normal).unwrap_err();
        assert!(error.message.contains("too deep"));
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let error = eval_with(&SymbolTable::new(), "1 == 1 5", ProcessAs::Normal).unwrap_err();
        assert_eq!(error.message, "Not expecting anything more");
    }

    #[test]
    fn quoted_numbers_compare_numerically_in_normal_mode() {
        assert!(eval("'5' == 5"));
        assert!(eval("\"10\" > 9"));
    }

    #[test]
    fn parse_error_positions() {
        let error = eval_with(&SymbolTable::new(), "(1 == 1", ProcessAs::Normal).unwrap_err();
        assert_eq!(error.message, "Expecting ')' before end of expression");
        assert_eq!(error.offset, 7);
    }
}
