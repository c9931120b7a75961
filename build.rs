fn main() {
    // Inject the Git commit hash for the READY banner.
    // Usage: env!("GIT_HASH")
    if let Ok(output) = std::process::Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
    {
        let git_hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !git_hash.is_empty() {
            println!("cargo:rustc-env=GIT_HASH={}", git_hash);
        } else {
            println!("cargo:rustc-env=GIT_HASH=unknown");
        }
    } else {
        println!("cargo:rustc-env=GIT_HASH=unknown");
    }

    // Don't rebuild on every repository change
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
}
