//! gvmship daemon library.
//!
//! Exposes the daemon's building blocks for integration testing.
//! In production, `gvmship-daemon` is used as a binary (main.rs).

pub mod allowlist;
pub mod cli;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;
pub mod queue;
pub mod server;
