//! Configuration file support
//!
//! Loads server configuration from TOML files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{EngineConfig, OutputConfig, PcmFormat, ServerConfig};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: ServerSettings,
    /// Engine settings
    pub engine: EngineSettings,
    /// Output encoder settings
    pub output: Option<OutputSettings>,
    /// Watchdog settings
    pub watchdog: Option<WatchdogSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
    /// Persisted source map
    pub registry_path: Option<PathBuf>,
    /// Locator injected at startup
    pub default_source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// ffmpeg executable
    pub ffmpeg_path: Option<PathBuf>,
    /// ffmpeg `-loglevel`
    pub ffmpeg_log_level: Option<String>,
    /// Named pipe location
    pub fifo_path: PathBuf,
    /// Default fade window in seconds
    pub crossfade_secs: Option<f64>,
    /// Seek the outgoing source when crossfading
    pub seek_alignment: Option<bool>,
    /// Probe timeout in seconds
    pub probe_timeout_secs: Option<f64>,
    /// Probe timeout for high-latency schemes
    pub extended_probe_timeout_secs: Option<f64>,
    /// Schemes that get the extended timeout
    pub extended_probe_schemes: Option<Vec<String>>,
    /// ffmpeg input format for capture devices
    pub device_format: Option<String>,
    /// Prefixes marking device locators
    pub device_prefixes: Option<Vec<String>>,
    /// Devices exempt from probing
    pub trusted_devices: Option<Vec<String>>,
    /// Graceful termination wait in seconds
    pub terminate_timeout_secs: Option<f64>,
    /// Conduit sample rate
    pub sample_rate: Option<u32>,
    /// Conduit channel count
    pub channels: Option<u16>,
    /// Input thread queue size
    pub thread_queue_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Destination for the encoded stream
    pub sink: String,
    /// Encoder name
    pub codec: Option<String>,
    /// Encoder bitrate
    pub bitrate: Option<String>,
    /// Container format
    pub format: Option<String>,
    /// Advertised content type
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogSettings {
    /// Seconds between conduit checks
    pub interval_secs: f64,
    /// Idle seconds that count as a stall
    pub idle_timeout_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
    /// Process diagnostic log file
    pub process_log_path: Option<PathBuf>,
    /// Rotation threshold for the process log
    pub process_log_max_bytes: Option<u64>,
    /// Rotated generations kept
    pub process_log_keep: Option<usize>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let engine = EngineConfig::default();
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8000,
                cors_enabled: Some(true),
                registry_path: Some(PathBuf::from("sources.json")),
                default_source: None,
            },
            engine: EngineSettings {
                ffmpeg_path: Some(engine.ffmpeg_path),
                ffmpeg_log_level: Some(engine.ffmpeg_log_level),
                fifo_path: engine.fifo_path,
                crossfade_secs: Some(engine.crossfade_secs),
                seek_alignment: Some(engine.seek_alignment),
                probe_timeout_secs: Some(engine.probe_timeout_secs),
                extended_probe_timeout_secs: Some(engine.extended_probe_timeout_secs),
                extended_probe_schemes: Some(engine.extended_probe_schemes),
                device_format: Some(engine.device_format),
                device_prefixes: Some(engine.device_prefixes),
                trusted_devices: Some(engine.trusted_devices),
                terminate_timeout_secs: Some(engine.terminate_timeout_secs),
                sample_rate: Some(engine.pcm.sample_rate),
                channels: Some(engine.pcm.channels),
                thread_queue_size: Some(engine.thread_queue_size),
            },
            output: Some(OutputSettings {
                sink: engine.output.sink,
                codec: Some(engine.output.codec),
                bitrate: Some(engine.output.bitrate),
                format: Some(engine.output.format),
                content_type: Some(engine.output.content_type),
            }),
            watchdog: Some(WatchdogSettings {
                interval_secs: engine.watchdog_interval_secs,
                idle_timeout_secs: engine.fifo_idle_timeout_secs,
            }),
            logging: Some(LoggingSettings {
                level: "info".to_string(),
                format: Some("pretty".to_string()),
                process_log_path: Some(engine.process_log_path),
                process_log_max_bytes: Some(engine.process_log_max_bytes),
                process_log_keep: Some(engine.process_log_keep),
            }),
        }
    }

    /// Convert to ServerConfig
    pub fn into_server_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        let d = defaults.engine;
        let e = self.engine;

        let output = match self.output {
            Some(o) => OutputConfig {
                sink: o.sink,
                codec: o.codec.unwrap_or(d.output.codec),
                bitrate: o.bitrate.unwrap_or(d.output.bitrate),
                format: o.format.unwrap_or(d.output.format),
                content_type: o.content_type.unwrap_or(d.output.content_type),
            },
            None => d.output,
        };

        let (watchdog_interval_secs, fifo_idle_timeout_secs) = self
            .watchdog
            .map(|w| (w.interval_secs, w.idle_timeout_secs))
            .unwrap_or((d.watchdog_interval_secs, d.fifo_idle_timeout_secs));

        let logging = self.logging.as_ref();

        ServerConfig {
            host: self.server.host,
            port: self.server.port,
            cors_enabled: self.server.cors_enabled.unwrap_or(true),
            log_level: logging
                .map(|l| l.level.clone())
                .unwrap_or(defaults.log_level),
            log_format: logging
                .and_then(|l| l.format.clone())
                .unwrap_or(defaults.log_format),
            registry_path: self.server.registry_path.unwrap_or(defaults.registry_path),
            default_source: self.server.default_source,
            engine: EngineConfig {
                ffmpeg_path: e.ffmpeg_path.unwrap_or(d.ffmpeg_path),
                ffmpeg_log_level: e.ffmpeg_log_level.unwrap_or(d.ffmpeg_log_level),
                fifo_path: e.fifo_path,
                output,
                pcm: PcmFormat {
                    sample_rate: e.sample_rate.unwrap_or(d.pcm.sample_rate),
                    channels: e.channels.unwrap_or(d.pcm.channels),
                },
                thread_queue_size: e.thread_queue_size.unwrap_or(d.thread_queue_size),
                crossfade_secs: e.crossfade_secs.unwrap_or(d.crossfade_secs),
                seek_alignment: e.seek_alignment.unwrap_or(d.seek_alignment),
                probe_timeout_secs: e.probe_timeout_secs.unwrap_or(d.probe_timeout_secs),
                extended_probe_timeout_secs: e
                    .extended_probe_timeout_secs
                    .unwrap_or(d.extended_probe_timeout_secs),
                extended_probe_schemes: e
                    .extended_probe_schemes
                    .unwrap_or(d.extended_probe_schemes),
                device_format: e.device_format.unwrap_or(d.device_format),
                device_prefixes: e.device_prefixes.unwrap_or(d.device_prefixes),
                trusted_devices: e.trusted_devices.unwrap_or(d.trusted_devices),
                terminate_timeout_secs: e
                    .terminate_timeout_secs
                    .unwrap_or(d.terminate_timeout_secs),
                watchdog_interval_secs,
                fifo_idle_timeout_secs,
                process_log_path: logging
                    .and_then(|l| l.process_log_path.clone())
                    .unwrap_or(d.process_log_path),
                process_log_max_bytes: logging
                    .and_then(|l| l.process_log_max_bytes)
                    .unwrap_or(d.process_log_max_bytes),
                process_log_keep: logging
                    .and_then(|l| l.process_log_keep)
                    .unwrap_or(d.process_log_keep),
            },
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}
