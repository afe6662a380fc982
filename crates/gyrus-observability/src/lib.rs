// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # gyrus-observability
//!
//! Unified logging setup for the gyrus crates, with per-crate debug flag
//! support. Library crates only emit `tracing` events with an explicit
//! `target:` naming the crate; binaries and tests decide where they go by
//! calling one of the `init_*` functions here.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Known gyrus crate names (also the `tracing` targets they log under)
pub const KNOWN_CRATES: &[&str] = &[
    "gyrus",
    "gyrus-graph",
    "gyrus-runtime",
    "gyrus-config",
];
