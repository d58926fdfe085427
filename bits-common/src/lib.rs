//! Shared code for the instrument command client workspace.
//!
//! Holds the pieces both the client library and the `bitsctl` binary need:
//! logging setup, typed `BITS_*` environment parsing, and command-line
//! rendering for log output.

pub mod config;
pub mod logging;
pub mod util;

pub use config::{ConfigSource, EnvError, EnvParser, Sourced};
pub use logging::{LogConfig, LogFormat, LoggingGuards, init_logging};
pub use util::render_command_line;
