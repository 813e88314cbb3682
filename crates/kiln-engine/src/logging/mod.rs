//! Logging setup.
//!
//! Everything logs through the `log` facade; `init_logging` installs
//! `env_logger` once, optionally mirroring every record into a file.

mod init;

pub use init::{init_logging, LoggingConfig};
