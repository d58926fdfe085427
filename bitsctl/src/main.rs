//! bitsctl: operate an instrument service from the shell.

use anyhow::{Context, Result};
use bits_client::{
    BitsClient, DEFAULT_SAMPLING_RATE, MetricsReport, ServiceConfig, ServiceEndpoint, Timestamp,
    Timeouts,
};
use bits_common::{LogConfig, init_logging};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Parser, Debug)]
#[command(name = "bitsctl")]
#[command(author, version, about = "Control a BITS instrument service from the command line")]
struct Cli {
    /// Instrument client binary to invoke
    #[arg(long, env = "BITS_CLIENT_BINARY", default_value = "bits_client")]
    binary: PathBuf,

    /// Port the instrument service listens on
    #[arg(long, env = "BITS_SERVICE_PORT")]
    port: u16,

    /// Service configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Select the virtual metrics file on exports and metric queries
    #[arg(long)]
    vm_file: bool,

    /// Run collections in disk-space-saving mode
    #[arg(long)]
    kibbles: bool,

    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the instrument's device listing
    ListDevices,

    /// Start a named collection
    Start {
        name: String,

        #[arg(long, default_value_t = DEFAULT_SAMPLING_RATE)]
        sampling_rate: u32,
    },

    /// Stop a named collection
    Stop { name: String },

    /// Export a collection archive (destination must end in .7z.bits)
    Export { name: String, dest: PathBuf },

    /// Export selected channels as CSV
    ExportCsv {
        name: String,
        dest: PathBuf,

        /// Channel to include (repeatable)
        #[arg(long = "channel", required = true)]
        channels: Vec<String>,
    },

    /// Add timestamped markers to a collection
    Markers {
        name: String,

        /// Marker as TS=TEXT; TS is nanoseconds or an RFC 3339 time (repeatable)
        #[arg(long = "marker", value_parser = parse_marker, required = true)]
        markers: Vec<(Timestamp, String)>,
    },

    /// Print aggregate metrics
    Metrics {
        name: String,

        #[arg(long)]
        start: Option<Timestamp>,

        #[arg(long)]
        end: Option<Timestamp>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },

    /// List channel names present in a collection
    Channels { name: String },

    /// Export one channel in Monsoon text format
    MonsoonExport {
        name: String,
        pattern: String,
        dest: PathBuf,
    },

    /// Monsoon hardware passthrough
    Monsoon {
        #[arg(value_enum)]
        action: MonsoonAction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MonsoonAction {
    Acquire,
    Release,
    UsbConnect,
    UsbDisconnect,
}

fn parse_marker(raw: &str) -> Result<(Timestamp, String), String> {
    let (ts, text) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TS=TEXT, got '{raw}'"))?;
    let ts = ts.trim().parse::<Timestamp>().map_err(|e| e.to_string())?;
    Ok((ts, text.to_string()))
}

fn service_config(cli: &Cli) -> Result<ServiceConfig> {
    let base = match &cli.config {
        Some(path) => ServiceConfig::load(path)
            .with_context(|| format!("loading service config {}", path.display()))?,
        None => ServiceConfig::default(),
    };
    if !cli.vm_file && !cli.kibbles {
        return Ok(base);
    }
    let mut builder = base.to_builder();
    if cli.vm_file {
        builder = builder.virtual_metrics_file(true);
    }
    if cli.kibbles {
        builder = builder.kibbles(true);
    }
    Ok(builder.build()?)
}

fn render_metrics(report: &MetricsReport, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Yaml => serde_yaml_ng::to_string(report)?,
    })
}

fn run(cli: Cli) -> Result<()> {
    let config = service_config(&cli)?;
    let (timeouts, env_errors) = Timeouts::from_env();
    for err in &env_errors {
        warn!("ignoring timeout override: {err}");
    }
    debug!(?timeouts, binary = %cli.binary.display(), port = cli.port, "client configured");

    let client = BitsClient::new(&cli.binary, ServiceEndpoint::new(cli.port), config)
        .with_timeouts(timeouts);

    match cli.command {
        Commands::ListDevices => {
            print!("{}", client.list_devices().context("listing devices")?);
        }
        Commands::Start { name, sampling_rate } => {
            client
                .start_collection(&name, sampling_rate)
                .with_context(|| format!("starting collection {name}"))?;
        }
        Commands::Stop { name } => {
            client
                .stop_collection(&name)
                .with_context(|| format!("stopping collection {name}"))?;
        }
        Commands::Export { name, dest } => {
            client
                .export(&name, &dest)
                .with_context(|| format!("exporting collection {name}"))?;
        }
        Commands::ExportCsv { name, dest, channels } => {
            client
                .export_as_csv(&channels, &name, &dest)
                .with_context(|| format!("exporting collection {name} as csv"))?;
        }
        Commands::Markers { name, markers } => {
            let count = markers.len();
            client
                .add_markers(&name, markers)
                .with_context(|| format!("adding markers to {name}"))?;
            println!("added {count} marker(s) to {name}");
        }
        Commands::Metrics {
            name,
            start,
            end,
            format,
        } => {
            let report = client
                .get_metrics(&name, start, end)
                .with_context(|| format!("fetching metrics for {name}"))?;
            print!("{}", render_metrics(&report, format)?);
        }
        Commands::Channels { name } => {
            let channels = client
                .list_channels(&name)
                .with_context(|| format!("listing channels of {name}"))?;
            for channel in channels {
                println!("{channel}");
            }
        }
        Commands::MonsoonExport { name, pattern, dest } => {
            let samples = client
                .export_as_monsoon_format(&dest, &name, &pattern)
                .with_context(|| format!("exporting {name} in monsoon format"))?;
            println!("wrote {samples} sample(s) to {}", dest.display());
        }
        Commands::Monsoon { action } => {
            let output = match action {
                MonsoonAction::Acquire => client.acquire_monsoon(),
                MonsoonAction::Release => client.release_monsoon(),
                MonsoonAction::UsbConnect => client.connect_usb(),
                MonsoonAction::UsbDisconnect => client.disconnect_usb(),
            }
            .with_context(|| format!("monsoon {action:?}"))?;
            print!("{output}");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = init_logging(&log_config)?;

    run(cli)
}
