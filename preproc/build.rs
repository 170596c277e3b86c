//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::process::Command;

/// Capture the toolchain version for the `__RUST_VERSION__` predefined
/// variable.  `rustc --version` prints `rustc X.Y.Z (...)`; the middle
/// token is what we want.
fn main() {
    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .and_then(|text| text.split_whitespace().nth(1).map(str::to_string))
        .unwrap_or_else(|| "0.0.0".to_string());
    println!("cargo:rustc-env=PREPROC_RUSTC_VERSION={version}");
    println!("cargo:rerun-if-changed=build.rs");
}
