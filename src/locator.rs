//! Locator classification
//!
//! A locator is an opaque string naming an audio source. The class decides
//! which input flags the transcoder gets and how the source is validated.

use std::path::Path;
use std::time::Duration;

use crate::config::EngineConfig;

/// Extensions treated as finite files even when the path does not exist yet
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "aac", "m4a", "opus"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    /// Finite local file, looped so it never runs dry
    File,
    /// Network stream, paced at real time
    Network,
    /// Capture device, read with device framing
    Device,
}

impl LocatorKind {
    /// Classify a locator against the engine configuration
    pub fn classify(locator: &str, config: &EngineConfig) -> Self {
        if is_trusted_device(locator, config)
            || config
                .device_prefixes
                .iter()
                .any(|prefix| locator.starts_with(prefix.as_str()))
        {
            return LocatorKind::Device;
        }

        if Path::new(locator).is_file() {
            return LocatorKind::File;
        }

        if scheme(locator).is_none() && has_audio_extension(locator) {
            return LocatorKind::File;
        }

        LocatorKind::Network
    }

    /// Only files can be seeked to an elapsed position
    pub fn is_seekable(self) -> bool {
        matches!(self, LocatorKind::File)
    }
}

/// Devices listed as trusted are never probed; opening a live capture
/// device twice can knock it over.
pub fn is_trusted_device(locator: &str, config: &EngineConfig) -> bool {
    config.trusted_devices.iter().any(|d| d == locator)
}

/// Probe timeout for a locator
pub fn probe_timeout(locator: &str, config: &EngineConfig) -> Duration {
    match scheme(locator) {
        Some(s)
            if config
                .extended_probe_schemes
                .iter()
                .any(|e| e.eq_ignore_ascii_case(s)) =>
        {
            config.extended_probe_timeout()
        }
        _ => config.probe_timeout(),
    }
}

/// URL scheme, if the locator has one
pub fn scheme(locator: &str) -> Option<&str> {
    let (scheme, _) = locator.split_once("://")?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

fn has_audio_extension(locator: &str) -> bool {
    Path::new(locator)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_device() {
        let config = EngineConfig::default();
        assert_eq!(LocatorKind::classify("hw:CARD=CODEC", &config), LocatorKind::Device);
        assert_eq!(LocatorKind::classify("plughw:1,0", &config), LocatorKind::Device);
    }

    #[test]
    fn test_classify_file() {
        let config = EngineConfig::default();
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().to_string();

        assert_eq!(LocatorKind::classify(&path, &config), LocatorKind::File);
        assert_eq!(LocatorKind::classify("radio.mp3", &config), LocatorKind::File);
        assert_eq!(LocatorKind::classify("music/Track.FLAC", &config), LocatorKind::File);
    }

    #[test]
    fn test_classify_network() {
        let config = EngineConfig::default();
        assert_eq!(
            LocatorKind::classify("http://stream.example/live", &config),
            LocatorKind::Network
        );
        assert_eq!(
            LocatorKind::classify("http://stream.example/live.mp3", &config),
            LocatorKind::Network
        );
        assert_eq!(
            LocatorKind::classify("rtmp://ingest.example/app/key", &config),
            LocatorKind::Network
        );
    }

    #[test]
    fn test_trusted_device() {
        let config = EngineConfig::default();
        assert!(is_trusted_device("hw:CARD=CODEC", &config));
        assert!(!is_trusted_device("hw:CARD=USB", &config));
    }

    #[test]
    fn test_probe_timeout_extended_for_rtmp() {
        let config = EngineConfig::default();
        assert_eq!(probe_timeout("radio.mp3", &config), Duration::from_secs(5));
        assert_eq!(
            probe_timeout("http://stream.example/live", &config),
            Duration::from_secs(5)
        );
        assert_eq!(
            probe_timeout("RTMP://ingest.example/app", &config),
            Duration::from_millis(7500)
        );
    }

    #[test]
    fn test_scheme() {
        assert_eq!(scheme("http://a/b"), Some("http"));
        assert_eq!(scheme("bad://url"), Some("bad"));
        assert_eq!(scheme("/var/music/a.mp3"), None);
        assert_eq!(scheme("weird path://x"), None);
    }
}
