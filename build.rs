// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-env-changed=GUIDED_FILTER_VERSION");

    // Packagers can pin the version string
    let version = std::env::var("GUIDED_FILTER_VERSION").unwrap_or_else(|_| describe_version());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Crate version with the short commit hash appended when building from git,
/// e.g. "0.1.0+3f2a9c1". Outside a checkout this is just the crate version.
fn describe_version() -> String {
    let pkg_version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());

    match git(&["rev-parse", "--short", "HEAD"]) {
        Some(hash) if git(&["status", "--porcelain"]).is_some_and(|s| !s.is_empty()) => {
            format!("{}+{}-dirty", pkg_version, hash)
        }
        Some(hash) => format!("{}+{}", pkg_version, hash),
        None => pkg_version,
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}
