// build.rs

use std::env;
use std::process::Command;

fn git_short_sha() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

// Reproducible builds set SOURCE_DATE_EPOCH; without it the date stays unknown.
fn build_date() -> Option<String> {
    let epoch: i64 = env::var("SOURCE_DATE_EPOCH").ok()?.trim().parse().ok()?;
    chrono::DateTime::from_timestamp(epoch, 0).map(|d| d.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-env-changed=HEAPCHECK_COMMIT");
    println!("cargo:rerun-if-env-changed=HEAPCHECK_BUILD_DATE");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

    let commit = env::var("HEAPCHECK_COMMIT").ok().or_else(git_short_sha);
    if let Some(commit) = commit {
        println!("cargo:rustc-env=HEAPCHECK_COMMIT={}", commit);
    }

    let date = env::var("HEAPCHECK_BUILD_DATE").ok().or_else(build_date);
    if let Some(date) = date {
        println!("cargo:rustc-env=HEAPCHECK_BUILD_DATE={}", date);
    }
}
