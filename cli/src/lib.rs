//! Host-side pieces of the `gemlink` binary.
//!
//! # Design
//! The binary stays a thin argument-parsing shell; everything it runs lives
//! here so the integration tests can drive it against the fake server:
//! - [`tcp`]: a ring-notification [`Transport`](gemlink_core::Transport)
//!   over plain TCP.
//! - [`config`]: `gemlink.toml` loading.
//! - [`bench`]: the latency benchmark and its report.

pub mod bench;
pub mod config;
pub mod tcp;

pub use config::Config;
pub use tcp::TcpTransport;
