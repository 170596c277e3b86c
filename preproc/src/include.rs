//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::path::{Path, PathBuf};

/// Locates files named by `#include` directives.
///
/// The search runs three tiers in order: the name as given (relative to the
/// current directory or absolute), each configured include directory, and
/// each directory listed in the include environment variable (entries
/// separated by `,` or `;`).  Within every tier, a name without an extension
/// is retried with the input extension appended.  The first existing regular
/// file wins.
pub struct IncludeResolver {
    include_paths: Vec<PathBuf>,
    include_env_var: String,
}

impl IncludeResolver {
    pub fn new(include_paths: Vec<PathBuf>, include_env_var: String) -> Self {
        Self {
            include_paths,
            include_env_var,
        }
    }

    pub fn resolve(&self, name: &str, input_ext: &str) -> Option<PathBuf> {
        if let Some(found) = try_candidate(PathBuf::from(name), input_ext) {
            return Some(found);
        }
        for dir in &self.include_paths {
            if let Some(found) = try_candidate(dir.join(name), input_ext) {
                return Some(found);
            }
        }
        if let Ok(env_paths) = std::env::var(&self.include_env_var) {
            for dir in env_paths.split([',', ';']).filter(|p| !p.is_empty()) {
                if let Some(found) = try_candidate(Path::new(dir).join(name), input_ext) {
                    return Some(found);
                }
            }
        }
        None
    }
}

fn try_candidate(path: PathBuf, input_ext: &str) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path);
    }
    if path.extension().is_none() && !input_ext.is_empty() {
        let mut with_ext = path.into_os_string();
        with_ext.push(input_ext);
        let with_ext = PathBuf::from(with_ext);
        if with_ext.is_file() {
            return Some(with_ext);
        }
    }
    None
}
