//! Service configuration and client settings.
//!
//! [`ServiceConfig`] describes which optional capabilities the instrument
//! service was started with. It is validated once, when built, and is
//! read-only afterwards. [`Timeouts`] holds the per-class subprocess
//! deadlines the client applies.

use crate::error::{BitsError, Result};
use bits_common::config::{EnvError, EnvParser};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Which Monsoon power monitor model backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonsoonKind {
    /// High-voltage power monitor.
    Hv,
    /// Low-voltage power monitor.
    Lv,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonsoonConfig {
    pub kind: MonsoonKind,
    pub serial: String,
}

/// Capability flags the command builder consults.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    has_virtual_metrics_file: bool,
    has_kibbles: bool,
    collectors_enabled: bool,
    monsoon: Option<MonsoonConfig>,
    settings: BTreeMap<String, serde_json::Value>,
}

impl ServiceConfig {
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// A virtual metrics file is configured; exports and metric queries
    /// select it with `--vm_file`.
    pub fn has_virtual_metrics_file(&self) -> bool {
        self.has_virtual_metrics_file
    }

    /// Kibble collectors are present, so collections can run in
    /// disk-space-saving mode.
    pub fn has_kibbles(&self) -> bool {
        self.has_kibbles
    }

    pub fn collectors_enabled(&self) -> bool {
        self.collectors_enabled
    }

    pub fn monsoon(&self) -> Option<&MonsoonConfig> {
        self.monsoon.as_ref()
    }

    /// Opaque settings carried for the service, untouched by the client.
    pub fn settings(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.settings
    }

    /// A builder seeded with this configuration, for deriving variants.
    pub fn to_builder(&self) -> ServiceConfigBuilder {
        let (hvpm_serial, lvpm_serial) = match &self.monsoon {
            Some(MonsoonConfig { kind: MonsoonKind::Hv, serial }) => (Some(serial.clone()), None),
            Some(MonsoonConfig { kind: MonsoonKind::Lv, serial }) => (None, Some(serial.clone())),
            None => (None, None),
        };
        ServiceConfigBuilder {
            has_virtual_metrics_file: self.has_virtual_metrics_file,
            has_kibbles: self.has_kibbles,
            collectors_enabled: self.collectors_enabled,
            hvpm_serial,
            lvpm_serial,
            settings: self.settings.clone(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ServiceConfigFile =
            toml::from_str(text).map_err(|e| BitsError::InvalidConfig(e.to_string()))?;
        file.into_builder()?.build()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|err| match err {
            BitsError::InvalidConfig(msg) => {
                BitsError::InvalidConfig(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            has_virtual_metrics_file: false,
            has_kibbles: false,
            collectors_enabled: true,
            monsoon: None,
            settings: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfigBuilder {
    has_virtual_metrics_file: bool,
    has_kibbles: bool,
    collectors_enabled: bool,
    hvpm_serial: Option<String>,
    lvpm_serial: Option<String>,
    settings: BTreeMap<String, serde_json::Value>,
}

impl Default for ServiceConfigBuilder {
    fn default() -> Self {
        Self {
            has_virtual_metrics_file: false,
            has_kibbles: false,
            collectors_enabled: true,
            hvpm_serial: None,
            lvpm_serial: None,
            settings: BTreeMap::new(),
        }
    }
}

impl ServiceConfigBuilder {
    pub fn virtual_metrics_file(mut self, enabled: bool) -> Self {
        self.has_virtual_metrics_file = enabled;
        self
    }

    pub fn kibbles(mut self, enabled: bool) -> Self {
        self.has_kibbles = enabled;
        self
    }

    pub fn collectors_enabled(mut self, enabled: bool) -> Self {
        self.collectors_enabled = enabled;
        self
    }

    pub fn hvpm_serial(mut self, serial: impl Into<String>) -> Self {
        self.hvpm_serial = Some(serial.into());
        self
    }

    pub fn lvpm_serial(mut self, serial: impl Into<String>) -> Self {
        self.lvpm_serial = Some(serial.into());
        self
    }

    pub fn setting(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    pub fn build(self) -> Result<ServiceConfig> {
        let monsoon = match (self.hvpm_serial, self.lvpm_serial) {
            (Some(_), Some(_)) => {
                return Err(BitsError::InvalidConfig(
                    "both an HV and an LV monsoon serial are set; a service drives one monitor"
                        .to_string(),
                ));
            }
            (Some(serial), None) => Some(MonsoonConfig {
                kind: MonsoonKind::Hv,
                serial,
            }),
            (None, Some(serial)) => Some(MonsoonConfig {
                kind: MonsoonKind::Lv,
                serial,
            }),
            (None, None) => None,
        };

        if let Some(monsoon) = &monsoon {
            if monsoon.serial.trim().is_empty() {
                return Err(BitsError::InvalidConfig("monsoon serial is empty".to_string()));
            }
            if !self.collectors_enabled {
                return Err(BitsError::InvalidConfig(
                    "monsoon-backed configuration requires collectors to be enabled".to_string(),
                ));
            }
        }

        Ok(ServiceConfig {
            has_virtual_metrics_file: self.has_virtual_metrics_file,
            has_kibbles: self.has_kibbles,
            collectors_enabled: self.collectors_enabled,
            monsoon,
            settings: self.settings,
        })
    }
}

/// On-disk TOML shape.
///
/// ```toml
/// virtual_metrics_file = true
/// kibbles = false
///
/// [[monsoon]]
/// kind = "hv"
/// serial = "12345"
///
/// [settings]
/// device = "default_device"
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServiceConfigFile {
    #[serde(default)]
    virtual_metrics_file: bool,
    #[serde(default)]
    kibbles: bool,
    #[serde(default = "default_true")]
    collectors_enabled: bool,
    #[serde(default)]
    monsoon: Vec<MonsoonEntry>,
    #[serde(default)]
    settings: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MonsoonEntry {
    kind: MonsoonKind,
    serial: String,
}

fn default_true() -> bool {
    true
}

impl ServiceConfigFile {
    fn into_builder(self) -> Result<ServiceConfigBuilder> {
        let mut builder = ServiceConfig::builder()
            .virtual_metrics_file(self.virtual_metrics_file)
            .kibbles(self.kibbles)
            .collectors_enabled(self.collectors_enabled);
        for entry in self.monsoon {
            let slot = match entry.kind {
                MonsoonKind::Hv => &mut builder.hvpm_serial,
                MonsoonKind::Lv => &mut builder.lvpm_serial,
            };
            if slot.replace(entry.serial).is_some() {
                return Err(BitsError::InvalidConfig(format!(
                    "monsoon kind {:?} declared more than once",
                    entry.kind
                )));
            }
        }
        builder.settings = self.settings;
        Ok(builder)
    }
}

/// Subprocess deadlines, grouped by how heavy the command is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Ordinary commands: start, stop, markers, metrics, listing.
    pub command: Duration,
    /// `.7z.bits` and CSV exports.
    pub export: Duration,
    /// Monsoon acquisition and USB passthrough helpers.
    pub hardware: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command: Duration::from_secs(60),
            export: Duration::from_secs(600),
            hardware: Duration::from_secs(10),
        }
    }
}

impl Timeouts {
    /// Read overrides from `BITS_COMMAND_TIMEOUT_SECS`,
    /// `BITS_EXPORT_TIMEOUT_SECS` and `BITS_HARDWARE_TIMEOUT_SECS`.
    ///
    /// Bad values keep their defaults and are returned for reporting.
    pub fn from_env() -> (Self, Vec<EnvError>) {
        let defaults = Self::default();
        let mut parser = EnvParser::new();
        let command = parser.get_u64_range("COMMAND_TIMEOUT_SECS", defaults.command.as_secs(), 1, 86_400);
        let export = parser.get_u64_range("EXPORT_TIMEOUT_SECS", defaults.export.as_secs(), 1, 86_400);
        let hardware = parser.get_u64_range("HARDWARE_TIMEOUT_SECS", defaults.hardware.as_secs(), 1, 3_600);
        let timeouts = Self {
            command: Duration::from_secs(command.value),
            export: Duration::from_secs(export.value),
            hardware: Duration::from_secs(hardware.value),
        };
        (timeouts, parser.take_errors())
    }
}
