//! Logging utilities.
//!
//! Everything in the engine logs through the `log` facade; this module only wires
//! up `env_logger` as the backend for binaries.

mod init;

pub use init::{init_logging, LoggingConfig};
