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

use crate::error::ParseError;
use crate::version::Version;

/// A macro/variable name: `[A-Za-z_][A-Za-z0-9_.]*`.
pub const NAME_PATTERN: &str = r"[A-Za-z_][A-Za-z0-9_.]*";
/// A floating-point constant, optionally in exponential notation.
pub const FLOAT_PATTERN: &str = r"[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?";
/// An integer constant.
pub const INT_PATTERN: &str = r"[0-9]+";
/// The boolean constants.
pub const BOOL_PATTERN: &str = r"(?i:true|false)";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s+").unwrap());
static BOOL_CONST: Lazy<Regex> = Lazy::new(|| Regex::new(&format!("^{BOOL_PATTERN}")).unwrap());
static FLOAT_CONST: Lazy<Regex> = Lazy::new(|| Regex::new(&format!("^{FLOAT_PATTERN}")).unwrap());
static DEFINED_FUNC: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^(?i:defined)\s*\(\s*({NAME_PATTERN})\s*\)")).unwrap());
static MACRO_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^\$\(({NAME_PATTERN})\)")).unwrap());
static MACRO_REF2: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^\$\{{({NAME_PATTERN})\}}")).unwrap());
static WORD_NOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?i:not)").unwrap());
static WORD_AND: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?i:and)").unwrap());
static WORD_OR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?i:or)").unwrap());
static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(&format!("^{NAME_PATTERN}")).unwrap());

/// Expression operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Not,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
}

impl Operator {
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            Operator::Equal
                | Operator::NotEqual
                | Operator::Less
                | Operator::LessEqual
                | Operator::Greater
                | Operator::GreaterEqual
        )
    }
}

/// The kinds of token an expression is made of.  Whitespace is skipped during
/// scanning and never reaches the token list.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A single-quoted string (no embedded quotes, no escapes).
    SqString,
    /// A double-quoted string (no embedded quotes, no escapes).
    DqString,
    /// A version literal such as `1.2.3`.
    Version(Version),
    /// An integer constant.
    Int,
    /// A floating-point constant.
    Float,
    /// `true` or `false`, case-insensitive.
    Bool,
    /// A macro reference: `$(name)`, `${name}`, or a bare identifier inside
    /// an expression.  The token text is the macro name.
    VarRef,
    /// The `defined(name)` function; the token text is the name inside.
    DefinedFunc,
    Oper(Operator),
    OpenParen,
    CloseParen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw matched text for constants and strings (quotes included), or the
    /// referenced name for `VarRef` and `DefinedFunc`.
    pub text: String,
    /// Absolute offset of the token in the directive line.
    pub start: usize,
    pub len: usize,
}

/// Strip one level of matching single or double quotes, if present.
pub fn strip_quotes(value: &str) -> &str {
    let b = value.as_bytes();
    if b.len() >= 2 {
        let matched = (b[0] == b'"' && b[b.len() - 1] == b'"')
            || (b[0] == b'\'' && b[b.len() - 1] == b'\'');
        if matched {
            return &value[1..value.len() - 1];
        }
    }
    value
}

pub fn parse_bool(text: &str) -> bool {
    text.eq_ignore_ascii_case("true")
}

/// Scan a quoted string starting at `pos`.  The string runs to the matching
/// quote, or to the end of input when unterminated.
fn quoted_len(bytes: &[u8], pos: usize, quote: u8) -> usize {
    let mut len = 1;
    while pos + len < bytes.len() {
        if bytes[pos + len] == quote {
            return len + 1;
        }
        len += 1;
    }
    len
}

/// Break an expression into tokens.
///
/// Candidates are tried in priority order at each position: whitespace,
/// boolean, version, float/integer, `defined(name)`, macro reference,
/// operators and punctuation, quoted strings, the word operators
/// `NOT`/`AND`/`OR`, and finally a bare identifier (an implicit macro
/// reference).  The first byte matching none of these is an error.
///
/// `start_offset` is added to every token position (and error position) so
/// that tokens spliced in for a macro reference report the position of the
/// original reference.
pub fn tokenize(input: &str, start_offset: usize) -> Result<Vec<Token>, ParseError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        let rest = &input[pos..];

        if let Some(m) = WHITESPACE.find(rest) {
            pos += m.end();
            continue;
        }

        let (kind, text, len) = if let Some(m) = BOOL_CONST.find(rest) {
            (TokenKind::Bool, m.as_str().to_string(), m.end())
        } else if let Some((version, len)) = Version::parse_prefix(rest) {
            (TokenKind::Version(version), rest[..len].to_string(), len)
        } else if let Some(m) = FLOAT_CONST.find(rest) {
            // The floating-point pattern also matches an integer, so
            // disambiguate here.
            let text = m.as_str();
            let kind = if text.contains(['.', 'e', 'E']) {
                TokenKind::Float
            } else {
                TokenKind::Int
            };
            (kind, text.to_string(), m.end())
        } else if let Some(caps) = DEFINED_FUNC.captures(rest) {
            (
                TokenKind::DefinedFunc,
                caps[1].to_string(),
                caps.get(0).unwrap().end(),
            )
        } else if let Some(caps) = MACRO_REF.captures(rest).or_else(|| MACRO_REF2.captures(rest)) {
            (
                TokenKind::VarRef,
                caps[1].to_string(),
                caps.get(0).unwrap().end(),
            )
        } else {
            let next = bytes.get(pos + 1).copied();
            let oper = |op, len| Some((TokenKind::Oper(op), len));
            let matched = match bytes[pos] {
                b'<' => {
                    if next == Some(b'=') {
                        oper(Operator::LessEqual, 2)
                    } else {
                        oper(Operator::Less, 1)
                    }
                }
                b'>' => {
                    if next == Some(b'=') {
                        oper(Operator::GreaterEqual, 2)
                    } else {
                        oper(Operator::Greater, 1)
                    }
                }
                b'=' if next == Some(b'=') => oper(Operator::Equal, 2),
                b'!' => {
                    if next == Some(b'=') {
                        oper(Operator::NotEqual, 2)
                    } else {
                        oper(Operator::Not, 1)
                    }
                }
                b'&' if next == Some(b'&') => oper(Operator::And, 2),
                b'|' if next == Some(b'|') => oper(Operator::Or, 2),
                b'(' => Some((TokenKind::OpenParen, 1)),
                b')' => Some((TokenKind::CloseParen, 1)),
                b'+' => oper(Operator::Add, 1),
                b'-' => oper(Operator::Subtract, 1),
                b'*' => oper(Operator::Multiply, 1),
                b'/' => oper(Operator::Divide, 1),
                b'%' => oper(Operator::Modulus, 1),
                b'\'' => Some((TokenKind::SqString, quoted_len(bytes, pos, b'\''))),
                b'"' => Some((TokenKind::DqString, quoted_len(bytes, pos, b'"'))),
                _ => {
                    if let Some(m) = WORD_NOT.find(rest) {
                        oper(Operator::Not, m.end())
                    } else if let Some(m) = WORD_AND.find(rest) {
                        oper(Operator::And, m.end())
                    } else if let Some(m) = WORD_OR.find(rest) {
                        oper(Operator::Or, m.end())
                    } else {
                        IDENT
                            .captures(rest)
                            .map(|caps| (TokenKind::VarRef, caps.get(0).unwrap().end()))
                    }
                }
            };
            let Some((kind, len)) = matched else {
                return Err(ParseError::new("Unrecognized input", start_offset + pos));
            };
            (kind, rest[..len].to_string(), len)
        };

        log::trace!("token: {kind:?}, pos={pos}, len={len}, value={text:?}");
        tokens.push(Token {
            kind,
            text,
            start: start_offset + pos,
            len,
        });
        pos += len;
    }

    Ok(tokens)
}
