//! rmac library crate: everything behind the `rmac` binary.
//!
//! # Architecture
//!
//! ```text
//! rmac (this crate)
//!   ├── domain/           AppConfig schema and defaults
//!   ├── application/      record / play commands
//!   └── infrastructure/   config file, tracing setup, status sink
//!         ↓
//! rmac-recorder   rmac-player
//!         ↓           ↓
//!          rmac-core
//! ```
//!
//! Keeping the commands in a library lets the integration tests in `tests/`
//! run them against the mock input source and recording injector.

pub mod application;
pub mod domain;
pub mod infrastructure;
