use std::process::Command;

const SHA_VAR: &str = "HSYNC_GIT_SHA";

/// Commit reported by `/health`. Builds without a checkout (container images,
/// source tarballs) can pass it in through the environment instead.
fn git_sha() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

fn main() {
    let sha = std::env::var(SHA_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(git_sha)
        .unwrap_or_else(|| "unknown".into());
    println!("cargo:rustc-env={SHA_VAR}={sha}");

    println!("cargo:rerun-if-env-changed={SHA_VAR}");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/index");
}
