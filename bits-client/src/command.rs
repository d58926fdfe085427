//! Argument vectors for each instrument operation.
//!
//! Builders are pure: they return the operation-specific tokens only. The
//! client prepends `--port <port>` and hands the result to a runner.
//! Optional tokens are omitted entirely rather than passed with an empty
//! value, since the instrument binary treats a blank argument as a value.

use crate::config::ServiceConfig;
use std::path::Path;

/// Duration passed to `--time` so a collection runs until stopped.
pub const ONE_YEAR_SECS: u64 = 365 * 24 * 60 * 60;

/// Name given to `--vm_file` when a virtual metrics file is configured.
pub const VIRTUAL_METRICS_FILE: &str = "default";

/// Collector name used for the Monsoon passthrough commands.
pub const MONSOON_COLLECTOR: &str = "Monsoon";

/// Hardware-level commands forwarded to the Monsoon collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonsoonCommand {
    Acquire,
    Release,
    UsbConnect,
    UsbDisconnect,
}

impl MonsoonCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Acquire => "acquire_monsoon",
            Self::Release => "release_monsoon",
            Self::UsbConnect => "usb_connect",
            Self::UsbDisconnect => "usb_disconnect",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CommandBuilder<'a> {
    config: &'a ServiceConfig,
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl<'a> CommandBuilder<'a> {
    pub fn new(config: &'a ServiceConfig) -> Self {
        Self { config }
    }

    fn named(collection_name: &str) -> Vec<String> {
        vec!["--name".to_string(), collection_name.to_string()]
    }

    fn push_vm_file(&self, args: &mut Vec<String>) {
        if self.config.has_virtual_metrics_file() {
            args.push("--vm_file".to_string());
            args.push(VIRTUAL_METRICS_FILE.to_string());
        }
    }

    pub fn build_start(&self, collection_name: &str, sampling_rate: u32) -> Vec<String> {
        let mut args = Self::named(collection_name);
        args.extend([
            "--non_blocking".to_string(),
            "--time".to_string(),
            ONE_YEAR_SECS.to_string(),
            "--default_sampling_rate".to_string(),
            sampling_rate.to_string(),
        ]);
        if self.config.has_kibbles() {
            args.push("--disk_space_saver".to_string());
        }
        args
    }

    pub fn build_stop(&self, collection_name: &str) -> Vec<String> {
        let mut args = Self::named(collection_name);
        args.push("--stop".to_string());
        args
    }

    pub fn build_export(&self, collection_name: &str, destination: &Path) -> Vec<String> {
        let mut args = Self::named(collection_name);
        args.extend([
            "--ignore_gaps".to_string(),
            "--export".to_string(),
            "--export_path".to_string(),
            path_arg(destination),
        ]);
        args
    }

    pub fn build_export_csv<S: AsRef<str>>(
        &self,
        channels: &[S],
        collection_name: &str,
        destination: &Path,
    ) -> Vec<String> {
        let channel_filter = channels
            .iter()
            .map(|c| c.as_ref())
            .collect::<Vec<&str>>()
            .join(",");
        let mut args = Self::named(collection_name);
        args.extend([
            "--ignore_gaps".to_string(),
            "--csv_rawtimestamps".to_string(),
            "--channels".to_string(),
            channel_filter,
            "--export".to_string(),
            "--export_path".to_string(),
            path_arg(destination),
        ]);
        self.push_vm_file(&mut args);
        args
    }

    /// One marker per call, so a failure mid-batch leaves a clean prefix
    /// applied.
    pub fn build_add_marker(&self, collection_name: &str, timestamp_ns: i64, text: &str) -> Vec<String> {
        let mut args = Self::named(collection_name);
        args.extend([
            "--log_ts".to_string(),
            timestamp_ns.to_string(),
            "--log".to_string(),
            text.to_string(),
        ]);
        args
    }

    pub fn build_get_metrics(
        &self,
        collection_name: &str,
        start_ns: Option<i64>,
        end_ns: Option<i64>,
        output_path: &Path,
    ) -> Vec<String> {
        let mut args = Self::named(collection_name);
        args.extend([
            "--ignore_gaps".to_string(),
            "--aggregates_yaml_path".to_string(),
            path_arg(output_path),
        ]);
        if let Some(start) = start_ns {
            args.push("--abs_start_time".to_string());
            args.push(start.to_string());
        }
        if let Some(end) = end_ns {
            args.push("--abs_stop_time".to_string());
            args.push(end.to_string());
        }
        self.push_vm_file(&mut args);
        args
    }

    pub fn build_list_devices(&self) -> Vec<String> {
        vec!["--list".to_string(), "devices".to_string()]
    }

    pub fn build_monsoon(&self, command: MonsoonCommand) -> Vec<String> {
        vec![
            "--collector".to_string(),
            MONSOON_COLLECTOR.to_string(),
            "--collector_cmd".to_string(),
            command.as_str().to_string(),
        ]
    }
}
