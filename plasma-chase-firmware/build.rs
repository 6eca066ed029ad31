use std::env;
use std::process::Command;

fn main() {
    embuild::espidf::sysenv::output();

    // Expose full git version (e.g. "v0.1.0" or "v0.1.0-3-gabcdef")
    let git_version = Command::new("git")
        .args(["describe", "--tags", "--always"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .unwrap_or_else(|| env::var("CARGO_PKG_VERSION").unwrap());
    println!("cargo:rustc-env=GIT_VERSION={}", git_version.trim());
    // Rebuild when HEAD moves or tags change
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/refs/tags");

    // Default Wi-Fi credentials are baked in from the build environment
    println!("cargo:rerun-if-env-changed=PLASMA_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=PLASMA_WIFI_PASSWORD");
}
