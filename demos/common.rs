//! Shared utilities for the demo binaries.
//!
//! Provides common functionality used across all demos:
//! - Command-line argument parsing
//! - Logging initialization

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use tracing_subscriber::EnvFilter;

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments for demos.
#[derive(Debug, Clone)]
pub struct Args {
    pub debug: bool,
    pub offline: bool,
    pub rest: Vec<String>,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse() -> Self {
        let mut debug = false;
        let mut offline = false;
        let mut rest = Vec::new();

        for arg in std::env::args().skip(1) {
            match arg.as_str() {
                "--debug" => debug = true,
                "--offline" => offline = true,
                _ => rest.push(arg),
            }
        }

        Self {
            debug,
            offline,
            rest,
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
pub fn init_logging(debug: bool) {
    let filter = if debug { "relink=debug" } else { "relink=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}
