//! Build script for ipopt-bridge-sys.
//!
//! Does nothing unless the `link` feature is enabled. When it is, links
//! against IPOPT with the following priority:
//! 1. A prefix named by `IPOPT_DIR` (expects `lib/` and `include/coin-or/`)
//! 2. System IPOPT via pkg-config
//!
//! # Installing IPOPT
//!
//! - Ubuntu: sudo apt install coinor-libipopt-dev
//! - macOS: brew install ipopt

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=IPOPT_DIR");

    // Declarations only; nothing references the symbols without `link`.
    if env::var_os("CARGO_FEATURE_LINK").is_none() {
        return;
    }

    if let Some(prefix) = env::var_os("IPOPT_DIR").map(PathBuf::from) {
        if try_prefix(&prefix) {
            return;
        }
        println!(
            "cargo:warning=IPOPT_DIR={} does not contain libipopt, trying pkg-config",
            prefix.display()
        );
    }

    if try_system_ipopt() {
        return;
    }

    panic!(
        "IPOPT not found!\n\n\
         Options to install IPOPT:\n\
         1. Install system package:\n\
            - Ubuntu: sudo apt install coinor-libipopt-dev\n\
            - macOS: brew install ipopt\n\
         2. Point IPOPT_DIR at an install prefix containing lib/libipopt.*\n"
    );
}

/// Try to link against an explicit install prefix.
fn try_prefix(prefix: &Path) -> bool {
    let lib_dir = prefix.join("lib");
    let include_dir = prefix.join("include/coin-or");

    let has_shared = lib_dir.join("libipopt.so").exists() || lib_dir.join("libipopt.dylib").exists();
    let has_static = lib_dir.join("libipopt.a").exists();

    if !has_shared && !has_static {
        return false;
    }

    if !include_dir.join("IpStdCInterface.h").exists() {
        println!("cargo:warning=IPOPT library found but IpStdCInterface.h missing under {}", include_dir.display());
    }

    println!("cargo:rustc-link-search=native={}", lib_dir.display());

    if has_shared {
        println!("cargo:rustc-link-lib=ipopt");
        // -rpath takes a directory, not a file
        println!("cargo:rustc-link-arg=-Wl,-rpath,{}", lib_dir.display());
    } else {
        println!("cargo:rustc-link-lib=static=ipopt");
        emit_static_deps(&lib_dir);
    }

    true
}

/// Emit additional link flags for a static IPOPT build.
fn emit_static_deps(lib_dir: &Path) {
    if lib_dir.join("libcoinmumps.a").exists() {
        println!("cargo:rustc-link-lib=static=coinmumps");
    }
    if lib_dir.join("libcoinmetis.a").exists() {
        println!("cargo:rustc-link-lib=static=coinmetis");
    }

    println!("cargo:rustc-link-lib=lapack");
    println!("cargo:rustc-link-lib=blas");
    println!("cargo:rustc-link-lib=gfortran");
    println!("cargo:rustc-link-lib=m");
    println!("cargo:rustc-link-lib=dl");

    #[cfg(target_os = "linux")]
    println!("cargo:rustc-link-lib=stdc++");
    #[cfg(target_os = "macos")]
    println!("cargo:rustc-link-lib=c++");
}

/// Try to link against system IPOPT via pkg-config.
fn try_system_ipopt() -> bool {
    let output = Command::new("pkg-config").args(["--libs", "ipopt"]).output();

    let output = match output {
        Ok(o) if o.status.success() => o,
        _ => return false,
    };

    let flags = String::from_utf8_lossy(&output.stdout);
    println!("cargo:warning=Using system IPOPT via pkg-config");

    for flag in flags.split_whitespace() {
        if let Some(lib) = flag.strip_prefix("-l") {
            println!("cargo:rustc-link-lib={}", lib);
        } else if let Some(path) = flag.strip_prefix("-L") {
            println!("cargo:rustc-link-search=native={}", path);
        }
    }

    true
}
