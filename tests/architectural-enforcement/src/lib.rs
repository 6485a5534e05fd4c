//! Architectural enforcement integration tests.
//!
//! These tests scan the workspace's own source tree rather than exercising
//! any one crate's behaviour, catching violations of section 5's
//! single-threaded-cooperative-runtime model that a normal unit test
//! wouldn't see: a blocking sleep in library code would stall the whole
//! async runtime, and an uncontrolled `process::exit` would skip every
//! adapter's graceful `disconnect()`.

use std::path::Path;

use walkdir::WalkDir;

fn workspace_root() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(Path::parent)
        .expect("tests/architectural-enforcement is two levels under the workspace root")
        .to_path_buf()
}

fn crate_source_files() -> Vec<std::path::PathBuf> {
    WalkDir::new(workspace_root().join("crates"))
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|entry| entry.path().to_path_buf())
        .collect()
}

/// No library source file blocks the runtime thread with a synchronous
/// sleep; every dwell/backoff/poll delay goes through `tokio::time`.
#[test]
fn no_blocking_sleep_in_crate_sources() {
    for path in crate_source_files() {
        let contents = std::fs::read_to_string(&path).unwrap_or_default();
        assert!(
            !contents.contains("thread::sleep"),
            "{} blocks the async runtime with a synchronous sleep; use tokio::time::sleep instead",
            path.display(),
        );
    }
}

/// Only the daemon binary may terminate the process directly; library
/// crates must return errors so the caller can run its own shutdown path
/// (adapter `disconnect()`, persona `stop()`, …) first.
#[test]
fn process_exit_is_confined_to_the_daemon_binary() {
    for path in crate_source_files() {
        if path.ends_with("chatrt-daemon/src/main.rs") {
            continue;
        }
        let contents = std::fs::read_to_string(&path).unwrap_or_default();
        assert!(
            !contents.contains("process::exit"),
            "{} calls process::exit outside the daemon binary, skipping graceful shutdown",
            path.display(),
        );
    }
}

/// Every crate's `lib.rs` carries the same clippy posture, keeping the
/// workspace's lint strictness uniform rather than crate-by-crate.
#[test]
fn every_library_crate_enables_pedantic_lints() {
    let crates_dir = workspace_root().join("crates");
    let crate_dirs = std::fs::read_dir(&crates_dir).expect("crates/ directory exists");
    for entry in crate_dirs.filter_map(Result::ok) {
        let lib_rs = entry.path().join("src/lib.rs");
        if !lib_rs.exists() {
            // Binary-only crates (chatrt-daemon) have no lib.rs to check.
            continue;
        }
        let contents = std::fs::read_to_string(&lib_rs).unwrap_or_default();
        assert!(
            contents.contains("clippy::pedantic"),
            "{} is missing the workspace's #![warn(clippy::pedantic)] convention",
            lib_rs.display(),
        );
    }
}
