//! Configuration file support for vincal.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (VINCAL_*)
//! 3. Explicit config file (--config PATH)
//! 4. Local config file (./vincal.toml)
//! 5. Global config file (~/.config/vincal/config.toml)

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vincal::port::{DEFAULT_BAUD_RATE, DEFAULT_SETTLE, DEFAULT_TIMEOUT};
use vincal::{BoardId, SerialConfig};

/// Local configuration file name.
pub const LOCAL_CONFIG: &str = "vincal.toml";

/// Default directory for CSV logs.
pub const DEFAULT_OUTPUT_DIR: &str = "tests";

/// Default CSV file name prefix.
pub const DEFAULT_PREFIX: &str = "sarq";

/// Default firmware sketch.
pub const DEFAULT_FIRMWARE: &str = "adc_for_calib.ino";

/// Default firmware extension used when listing candidates.
pub const DEFAULT_EXTENSION: &str = "ino";

/// Default board FQBN for arduino-cli.
pub const DEFAULT_FQBN: &str = "esp32:esp32:esp32";

/// Serial link configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerialSection {
    /// Preferred serial port (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: Option<String>,
    /// Baud rate.
    pub baud: Option<u32>,
    /// Read timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Delay after opening the port, in milliseconds.
    pub settle_ms: Option<u64>,
}

/// CSV log configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSection {
    /// Directory for the CSV logs.
    pub dir: Option<PathBuf>,
    /// File name prefix.
    pub prefix: Option<String>,
}

/// Firmware patch and upload configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirmwareSection {
    /// Sketch containing `calibrateVIN`.
    pub path: Option<PathBuf>,
    /// Extension of candidate sketches.
    pub extension: Option<String>,
    /// Compile and upload after patching.
    pub upload: Option<bool>,
    /// Fully qualified board name passed to arduino-cli.
    pub fqbn: Option<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Serial link.
    #[serde(default)]
    pub serial: SerialSection,
    /// CSV logs.
    #[serde(default)]
    pub output: OutputSection,
    /// Firmware.
    #[serde(default)]
    pub firmware: FirmwareSection,
}

impl Config {
    /// Load configuration from the global and local files, then `explicit` if given.
    pub fn load(explicit: Option<&Path>) -> Self {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG)) {
            debug!("Loaded local config from {LOCAL_CONFIG}");
            config.merge(local_config);
        }

        if let Some(path) = explicit {
            config.merge(Self::load_from_path(path));
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "vincal").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one; set values in `other` win.
    fn merge(&mut self, other: Self) {
        if other.serial.port.is_some() {
            self.serial.port = other.serial.port;
        }
        if other.serial.baud.is_some() {
            self.serial.baud = other.serial.baud;
        }
        if other.serial.timeout_ms.is_some() {
            self.serial.timeout_ms = other.serial.timeout_ms;
        }
        if other.serial.settle_ms.is_some() {
            self.serial.settle_ms = other.serial.settle_ms;
        }

        if other.output.dir.is_some() {
            self.output.dir = other.output.dir;
        }
        if other.output.prefix.is_some() {
            self.output.prefix = other.output.prefix;
        }

        if other.firmware.path.is_some() {
            self.firmware.path = other.firmware.path;
        }
        if other.firmware.extension.is_some() {
            self.firmware.extension = other.firmware.extension;
        }
        if other.firmware.upload.is_some() {
            self.firmware.upload = other.firmware.upload;
        }
        if other.firmware.fqbn.is_some() {
            self.firmware.fqbn = other.firmware.fqbn;
        }
    }
}

/// Values from the command line and environment that override the files.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--port` / `VINCAL_PORT`.
    pub port: Option<String>,
    /// `--board` / `VINCAL_BOARD`.
    pub board: Option<BoardId>,
    /// `--firmware` / `VINCAL_FIRMWARE`.
    pub firmware: Option<PathBuf>,
    /// `--output-dir`.
    pub output_dir: Option<PathBuf>,
    /// `--upload`.
    pub upload: bool,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Serial port, if known without asking.
    pub port: Option<String>,
    /// Board identifier, if known without asking.
    pub board: Option<BoardId>,
    /// Baud rate.
    pub baud: u32,
    /// Read timeout.
    pub timeout: Duration,
    /// Delay after open.
    pub settle: Duration,
    /// Directory for CSV logs.
    pub output_dir: PathBuf,
    /// CSV file name prefix.
    pub prefix: String,
    /// Sketch to patch.
    pub firmware: PathBuf,
    /// Extension of candidate sketches.
    pub extension: String,
    /// Compile and upload after patching.
    pub upload: bool,
    /// arduino-cli board name.
    pub fqbn: String,
}

impl Settings {
    /// Combine a loaded config with command-line overrides.
    pub fn resolve(config: Config, overrides: Overrides) -> Self {
        Self {
            port: overrides
                .port
                .or(config.serial.port),
            board: overrides.board,
            baud: config
                .serial
                .baud
                .unwrap_or(DEFAULT_BAUD_RATE),
            timeout: config
                .serial
                .timeout_ms
                .map_or(DEFAULT_TIMEOUT, Duration::from_millis),
            settle: config
                .serial
                .settle_ms
                .map_or(DEFAULT_SETTLE, Duration::from_millis),
            output_dir: overrides
                .output_dir
                .or(config.output.dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            prefix: config
                .output
                .prefix
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            firmware: overrides
                .firmware
                .or(config.firmware.path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FIRMWARE)),
            extension: config
                .firmware
                .extension
                .unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
            upload: overrides.upload
                || config
                    .firmware
                    .upload
                    .unwrap_or(false),
            fqbn: config
                .firmware
                .fqbn
                .unwrap_or_else(|| DEFAULT_FQBN.to_string()),
        }
    }

    /// Serial configuration for `port_name`.
    pub fn serial_config(&self, port_name: &str) -> SerialConfig {
        SerialConfig::new(port_name)
            .with_baud_rate(self.baud)
            .with_timeout(self.timeout)
            .with_settle(self.settle)
    }
}
