//! Client for a line-oriented instrument-control binary.
//!
//! [`BitsClient`] turns collection operations (start, stop, export, markers,
//! metrics) into invocations of the form
//! `<binary> --port <port> <tokens...>`, each bounded by a timeout. The
//! process boundary sits behind [`CommandRunner`], so tests use
//! [`mock::MockRunner`] instead of a real binary.

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod metrics;
pub mod mock;
pub mod monsoon;
pub mod runner;
pub mod timestamp;

pub use client::{BitsClient, DEFAULT_SAMPLING_RATE, EXPORT_SUFFIX, ServiceEndpoint};
pub use command::{CommandBuilder, MonsoonCommand, ONE_YEAR_SECS, VIRTUAL_METRICS_FILE};
pub use config::{MonsoonConfig, MonsoonKind, ServiceConfig, ServiceConfigBuilder, Timeouts};
pub use error::{BitsError, ErrorKind, Result};
pub use metrics::{ChannelMetrics, MetricsReport};
pub use monsoon::convert_csv_to_monsoon;
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};
pub use timestamp::{Timestamp, normalize, now_nanos};
