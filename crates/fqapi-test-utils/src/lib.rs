#![deny(unsafe_code)]

//! Shared test utilities for the fqapi workspace.
//!
//! Provides mock daemons listening on temporary UNIX sockets, config
//! builders, and tracing helpers so that individual crate tests stay
//! concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! fqapi-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod daemon;
pub mod tracing_setup;
