//! The instrument client.
//!
//! Every operation is one or more blocking invocations of
//! `<binary> --port <port> <tokens...>`. Nothing is cached between calls;
//! the instrument owns all collection state.

use crate::command::{CommandBuilder, MonsoonCommand};
use crate::config::{ServiceConfig, Timeouts};
use crate::error::{BitsError, Result};
use crate::metrics::MetricsReport;
use crate::monsoon::convert_csv_to_monsoon;
use crate::runner::{CommandRunner, ProcessRunner};
use crate::timestamp::{Timestamp, normalize};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Required ending of every `.7z.bits` export destination.
pub const EXPORT_SUFFIX: &str = ".7z.bits";

/// Sampling rate used when the caller has no preference.
pub const DEFAULT_SAMPLING_RATE: u32 = 1000;

/// Where the instrument service listens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceEndpoint {
    port: u16,
}

impl ServiceEndpoint {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Synchronous client for the instrument-control binary.
///
/// Not internally synchronized: callers issuing concurrent operations must
/// order them themselves. Errors are never retried or swallowed.
#[derive(Debug)]
pub struct BitsClient<R = ProcessRunner> {
    binary: PathBuf,
    endpoint: ServiceEndpoint,
    config: Arc<ServiceConfig>,
    timeouts: Timeouts,
    runner: R,
}

impl BitsClient<ProcessRunner> {
    pub fn new(
        binary: impl Into<PathBuf>,
        endpoint: ServiceEndpoint,
        config: impl Into<Arc<ServiceConfig>>,
    ) -> Self {
        Self::with_runner(binary, endpoint, config, ProcessRunner::new())
    }
}

impl<R: CommandRunner> BitsClient<R> {
    pub fn with_runner(
        binary: impl Into<PathBuf>,
        endpoint: ServiceEndpoint,
        config: impl Into<Arc<ServiceConfig>>,
        runner: R,
    ) -> Self {
        Self {
            binary: binary.into(),
            endpoint,
            config: config.into(),
            timeouts: Timeouts::default(),
            runner,
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn endpoint(&self) -> ServiceEndpoint {
        self.endpoint
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn builder(&self) -> CommandBuilder<'_> {
        CommandBuilder::new(&self.config)
    }

    /// Run the binary with `--port <port>` followed by `args`.
    ///
    /// Returns the merged stdout/stderr text. A non-zero exit is logged and
    /// otherwise ignored.
    pub fn run_command(&self, args: &[String], timeout: Duration) -> Result<String> {
        let mut full = Vec::with_capacity(args.len() + 2);
        full.push("--port".to_string());
        full.push(self.endpoint.port.to_string());
        full.extend_from_slice(args);

        let out = self.runner.run(&self.binary, &full, timeout)?;
        if !out.success() {
            warn!(
                binary = %self.binary.display(),
                exit_code = ?out.exit_code,
                output = %out.output.trim_end(),
                "instrument command exited unsuccessfully"
            );
        }
        Ok(out.output)
    }

    pub fn start_collection(&self, collection_name: &str, sampling_rate: u32) -> Result<()> {
        info!(collection = collection_name, sampling_rate, "starting collection");
        let args = self.builder().build_start(collection_name, sampling_rate);
        self.run_command(&args, self.timeouts.command)?;
        Ok(())
    }

    pub fn stop_collection(&self, collection_name: &str) -> Result<()> {
        info!(collection = collection_name, "stopping collection");
        let args = self.builder().build_stop(collection_name);
        self.run_command(&args, self.timeouts.command)?;
        Ok(())
    }

    /// Export the raw collection archive. `destination` must end with
    /// [`EXPORT_SUFFIX`]; otherwise nothing is spawned.
    pub fn export(&self, collection_name: &str, destination: &Path) -> Result<()> {
        if !destination.to_string_lossy().ends_with(EXPORT_SUFFIX) {
            return Err(BitsError::InvalidExportPath {
                path: destination.to_path_buf(),
                required_suffix: EXPORT_SUFFIX,
            });
        }
        info!(collection = collection_name, destination = %destination.display(), "exporting collection");
        let args = self.builder().build_export(collection_name, destination);
        self.run_command(&args, self.timeouts.export)?;
        Ok(())
    }

    /// Have the instrument write the selected channels to `destination` as CSV.
    pub fn export_as_csv<S: AsRef<str>>(
        &self,
        channels: &[S],
        collection_name: &str,
        destination: &Path,
    ) -> Result<()> {
        info!(
            collection = collection_name,
            channels = channels.len(),
            destination = %destination.display(),
            "exporting collection as csv"
        );
        let args = self.builder().build_export_csv(channels, collection_name, destination);
        self.run_command(&args, self.timeouts.export)?;
        Ok(())
    }

    /// Write markers in ascending timestamp order, one call per marker.
    ///
    /// All timestamps are normalized before the first call, so an invalid one
    /// anywhere in the batch means nothing is written. Markers with equal
    /// timestamps keep their input order. If a call fails, the markers before
    /// it have been applied and the rest have not.
    pub fn add_markers<T, S, I>(&self, collection_name: &str, markers: I) -> Result<()>
    where
        T: Into<Timestamp>,
        S: AsRef<str>,
        I: IntoIterator<Item = (T, S)>,
    {
        let mut normalized = markers
            .into_iter()
            .map(|(ts, text)| Ok((normalize(ts)?, text)))
            .collect::<Result<Vec<_>>>()?;
        normalized.sort_by_key(|(ts, _)| *ts);

        debug!(collection = collection_name, count = normalized.len(), "adding markers");
        let builder = self.builder();
        for (timestamp_ns, text) in &normalized {
            let args = builder.build_add_marker(collection_name, *timestamp_ns, text.as_ref());
            self.run_command(&args, self.timeouts.command)?;
        }
        Ok(())
    }

    /// Fetch aggregate metrics, optionally bounded in time.
    ///
    /// The instrument writes its dump to a temporary file which is removed
    /// when this returns, whether or not parsing succeeded.
    pub fn get_metrics(
        &self,
        collection_name: &str,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<MetricsReport> {
        let start_ns = start.map(normalize).transpose()?;
        let end_ns = end.map(normalize).transpose()?;

        let dump = tempfile::Builder::new()
            .prefix("bits_metrics")
            .suffix(".yaml")
            .tempfile()?;
        let args = self
            .builder()
            .build_get_metrics(collection_name, start_ns, end_ns, dump.path());
        self.run_command(&args, self.timeouts.command)?;

        let text = fs::read_to_string(dump.path())?;
        MetricsReport::from_yaml_str(&text).map_err(|source| BitsError::MetricsParse {
            path: dump.path().to_path_buf(),
            source,
        })
    }

    /// Raw device listing, exactly as the binary printed it.
    pub fn list_devices(&self) -> Result<String> {
        let args = self.builder().build_list_devices();
        self.run_command(&args, self.timeouts.command)
    }

    pub fn list_channels(&self, collection_name: &str) -> Result<BTreeSet<String>> {
        Ok(self.get_metrics(collection_name, None, None)?.channel_names())
    }

    /// Export one channel and rewrite it as Monsoon text at `destination`.
    /// Returns the number of samples written.
    pub fn export_as_monsoon_format(
        &self,
        destination: &Path,
        collection_name: &str,
        channel_pattern: &str,
    ) -> Result<usize> {
        let csv_file = tempfile::Builder::new()
            .prefix("bits_csv_")
            .suffix(".csv")
            .tempfile()?;
        self.export_as_csv(&[channel_pattern], collection_name, csv_file.path())?;

        let input = BufReader::new(File::open(csv_file.path())?);
        let output = BufWriter::new(File::create(destination)?);
        let samples = convert_csv_to_monsoon(input, output)?;
        info!(
            collection = collection_name,
            destination = %destination.display(),
            samples,
            "wrote monsoon file"
        );
        Ok(samples)
    }

    fn monsoon(&self, command: MonsoonCommand) -> Result<String> {
        debug!(command = command.as_str(), "monsoon hardware command");
        let args = self.builder().build_monsoon(command);
        self.run_command(&args, self.timeouts.hardware)
    }

    pub fn acquire_monsoon(&self) -> Result<String> {
        self.monsoon(MonsoonCommand::Acquire)
    }

    pub fn release_monsoon(&self) -> Result<String> {
        self.monsoon(MonsoonCommand::Release)
    }

    pub fn connect_usb(&self) -> Result<String> {
        self.monsoon(MonsoonCommand::UsbConnect)
    }

    pub fn disconnect_usb(&self) -> Result<String> {
        self.monsoon(MonsoonCommand::UsbDisconnect)
    }
}
