//! Server and engine configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Raw PCM format carried by the conduit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Channel count
    pub channels: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
        }
    }
}

/// Output encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Destination handed to the output process (file path or broadcast URL)
    pub sink: String,

    /// Audio encoder name
    pub codec: String,

    /// Encoder bitrate, in ffmpeg notation
    pub bitrate: String,

    /// Container format
    pub format: String,

    /// Content type advertised to HTTP sinks
    pub content_type: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sink: "output.mp3".to_string(),
            codec: "libmp3lame".to_string(),
            bitrate: "192k".to_string(),
            format: "mp3".to_string(),
            content_type: "audio/mpeg".to_string(),
        }
    }
}

/// Stream engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path of the ffmpeg executable
    pub ffmpeg_path: PathBuf,

    /// `-loglevel` passed to every ffmpeg process
    pub ffmpeg_log_level: String,

    /// Named pipe between writers and the output process
    pub fifo_path: PathBuf,

    /// Output encoder settings
    pub output: OutputConfig,

    /// Conduit PCM format
    pub pcm: PcmFormat,

    /// `-thread_queue_size` for every input
    pub thread_queue_size: u32,

    /// Fade window used when the caller does not pass one
    pub crossfade_secs: f64,

    /// Seek a seekable outgoing source to its elapsed play time when crossfading
    pub seek_alignment: bool,

    /// Probe timeout for ordinary locators
    pub probe_timeout_secs: f64,

    /// Probe timeout for high-latency transports
    pub extended_probe_timeout_secs: f64,

    /// URL schemes that get the extended probe timeout
    pub extended_probe_schemes: Vec<String>,

    /// ffmpeg input format for capture devices
    pub device_format: String,

    /// Locator prefixes that denote capture devices
    pub device_prefixes: Vec<String>,

    /// Device locators that are never probed
    pub trusted_devices: Vec<String>,

    /// Graceful wait after SIGTERM before SIGKILL
    pub terminate_timeout_secs: f64,

    /// Seconds between watchdog ticks
    pub watchdog_interval_secs: f64,

    /// Conduit idle time that counts as a stall
    pub fifo_idle_timeout_secs: f64,

    /// File receiving the diagnostic output of every spawned process
    pub process_log_path: PathBuf,

    /// Size at which the process log is rotated
    pub process_log_max_bytes: u64,

    /// Rotated process log generations to keep
    pub process_log_keep: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffmpeg_log_level: "info".to_string(),
            fifo_path: PathBuf::from("/tmp/input_pipe"),
            output: OutputConfig::default(),
            pcm: PcmFormat::default(),
            thread_queue_size: 512,
            crossfade_secs: 2.0,
            seek_alignment: true,
            probe_timeout_secs: 5.0,
            extended_probe_timeout_secs: 7.5,
            extended_probe_schemes: vec![
                "rtmp".to_string(),
                "rtmps".to_string(),
                "rtsp".to_string(),
                "srt".to_string(),
            ],
            device_format: "alsa".to_string(),
            device_prefixes: vec!["hw:".to_string(), "plughw:".to_string()],
            trusted_devices: vec!["hw:CARD=CODEC".to_string()],
            terminate_timeout_secs: 2.0,
            watchdog_interval_secs: 60.0,
            fifo_idle_timeout_secs: 15.0,
            process_log_path: PathBuf::from("ffmpeg.log"),
            process_log_max_bytes: 10 * 1024 * 1024,
            process_log_keep: 3,
        }
    }
}

impl EngineConfig {
    pub fn probe_timeout(&self) -> Duration {
        secs(self.probe_timeout_secs)
    }

    pub fn extended_probe_timeout(&self) -> Duration {
        secs(self.extended_probe_timeout_secs)
    }

    pub fn terminate_timeout(&self) -> Duration {
        secs(self.terminate_timeout_secs)
    }

    pub fn watchdog_interval(&self) -> Duration {
        secs(self.watchdog_interval_secs)
    }

    pub fn fifo_idle_timeout(&self) -> Duration {
        secs(self.fifo_idle_timeout_secs)
    }

    /// Fade window for a request, falling back to the configured default
    /// when the caller passes nothing usable.
    pub fn fade_window(&self, requested: Option<f64>) -> Duration {
        match requested {
            Some(d) if d.is_finite() && d > 0.0 => secs(d),
            _ => secs(self.crossfade_secs),
        }
    }
}

/// Negative and non-finite values collapse to zero instead of panicking.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format (pretty, json)
    pub log_format: String,

    /// JSON file holding the name -> locator map
    pub registry_path: PathBuf,

    /// Locator injected when the engine starts
    pub default_source: Option<String>,

    /// Engine configuration
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_enabled: true,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            registry_path: PathBuf::from("sources.json"),
            default_source: None,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.engine.fifo_path, PathBuf::from("/tmp/input_pipe"));
        assert_eq!(config.engine.pcm.sample_rate, 44100);
        assert_eq!(config.engine.watchdog_interval(), Duration::from_secs(60));
        assert_eq!(config.engine.fifo_idle_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_fade_window_fallback() {
        let engine = EngineConfig::default();
        assert_eq!(engine.fade_window(None), Duration::from_secs(2));
        assert_eq!(engine.fade_window(Some(0.0)), Duration::from_secs(2));
        assert_eq!(engine.fade_window(Some(f64::NAN)), Duration::from_secs(2));
        assert_eq!(engine.fade_window(Some(3.5)), Duration::from_millis(3500));
    }

    #[test]
    fn test_negative_durations_clamp() {
        let engine = EngineConfig {
            terminate_timeout_secs: -1.0,
            ..Default::default()
        };
        assert_eq!(engine.terminate_timeout(), Duration::ZERO);
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.socket_addr(), "127.0.0.1:8080");
    }
}
