//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

#[derive(thiserror::Error, Debug)]
pub enum PreProcError {
    #[error("Error processing io: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Config(String),
    #[error("Cannot find file '{0}'!")]
    FileNotFound(String),
    #[error("File '{0}' is not valid UTF-8")]
    InvalidUtf8(String),
}

pub type Result<T> = std::result::Result<T, PreProcError>;

/// A recoverable syntax error in a directive expression.  The offset is
/// relative to the start of the expression text and is used to position the
/// caret in the diagnostic display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}
