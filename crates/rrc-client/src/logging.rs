//! Tracing subscriber setup for applications embedding the client.
//!
//! Log levels follow these conventions:
//! - ERROR: a user callback panicked
//! - WARN: rejected transfers, digest or decode failures, send failures
//! - INFO: session lifecycle (connected, welcome received, closed)
//! - DEBUG: handshake progress, dropped frames, expectation bookkeeping
//! - TRACE: envelope bytes and handshake state transitions

use tracing_subscriber::EnvFilter;

fn filter_or(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install a plain-text subscriber filtered by `RUST_LOG` (default `info`).
pub fn init() {
    tracing_subscriber::fmt().with_env_filter(filter_or("info")).init();
}

/// Install a JSON subscriber filtered by `RUST_LOG` (default `info`).
pub fn init_json() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter_or("info"))
        .init();
}

/// Pick plain or JSON output from `RUST_LOG_FORMAT`.
pub fn init_from_env() {
    match std::env::var("RUST_LOG_FORMAT").as_deref() {
        Ok("json") => init_json(),
        _ => init(),
    }
}

/// Subscriber for tests. Safe to call more than once.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_or("rrc_client=debug,rrc_core=debug"))
        .with_test_writer()
        .try_init();
}
