//! ffmpeg argument sets for each process role
//!
//! Every writer produces raw `s16le` PCM in the conduit format so the output
//! process can read the pipe without ever renegotiating.

use std::path::Path;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::locator::{self, LocatorKind};

/// Inputs of a dual-source crossfade
#[derive(Debug, Clone)]
pub struct CrossfadePlan<'a> {
    pub from: &'a str,
    pub from_kind: LocatorKind,
    pub to: &'a str,
    pub to_kind: LocatorKind,
    pub fade: Duration,
    /// Position to resume the outgoing source at
    pub seek: Option<Duration>,
}

pub struct ArgBuilder<'a> {
    config: &'a EngineConfig,
}

impl<'a> ArgBuilder<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Input options chosen by locator class
    pub fn input_args(&self, kind: LocatorKind) -> Vec<String> {
        match kind {
            LocatorKind::File => strings(&["-stream_loop", "-1"]),
            LocatorKind::Network => strings(&["-re"]),
            LocatorKind::Device => self.device_framing(),
        }
    }

    /// Decode one second of `locator` into the null muxer
    pub fn probe(&self, locator: &str, kind: LocatorKind) -> Vec<String> {
        let mut args = self.common();
        args.extend(strings(&["-t", "1"]));
        args.extend(self.queue());
        if kind == LocatorKind::Device {
            args.extend(self.device_framing());
        }
        args.extend(strings(&["-i", locator, "-vn", "-f", "null", "-"]));
        args
    }

    /// Single-source writer into the conduit
    pub fn passthrough(&self, locator: &str, kind: LocatorKind, fifo: &Path) -> Vec<String> {
        let mut args = self.common();
        args.extend(self.queue());
        args.extend(self.input_args(kind));
        args.extend(strings(&["-i", locator, "-vn"]));
        args.extend(self.pcm_output(fifo));
        args
    }

    /// Dual-input writer that fades `from` out while fading `to` in
    pub fn crossfade(&self, plan: &CrossfadePlan<'_>, fifo: &Path) -> Vec<String> {
        let fade = format!("{:.3}", plan.fade.as_secs_f64());

        let mut args = self.common();
        args.extend(self.queue());
        if let Some(seek) = plan.seek {
            args.push("-ss".to_string());
            args.push(format!("{:.3}", seek.as_secs_f64()));
        }
        args.extend(self.input_args(plan.from_kind));
        args.extend(strings(&["-i", plan.from]));

        args.extend(self.queue());
        args.extend(self.input_args(plan.to_kind));
        args.extend(strings(&["-i", plan.to]));

        args.push("-filter_complex".to_string());
        args.push(format!(
            "[0:a]atrim=0:{fade},afade=t=out:st=0:d={fade}[a0];\
             [1:a]afade=t=in:st=0:d={fade}[a1];\
             [a0][a1]amix=inputs=2:duration=longest:dropout_transition={fade}[aout]"
        ));
        args.extend(strings(&["-map", "[aout]"]));
        args.extend(self.pcm_output(fifo));
        args
    }

    /// Long-lived encoder reading the conduit and publishing to the sink
    pub fn output(&self, fifo: &Path) -> Vec<String> {
        let pcm = &self.config.pcm;
        let out = &self.config.output;

        let mut args = self.common();
        args.extend(self.queue());
        args.extend(strings(&[
            "-f",
            "s16le",
            "-ar",
            &pcm.sample_rate.to_string(),
            "-ac",
            &pcm.channels.to_string(),
            "-fflags",
            "+genpts",
            "-i",
            &fifo.to_string_lossy(),
            "-c:a",
            &out.codec,
            "-b:a",
            &out.bitrate,
            "-f",
            &out.format,
        ]));
        // Only protocol outputs understand a content type.
        if locator::scheme(&out.sink).is_some() {
            args.extend(strings(&["-content_type", &out.content_type]));
        }
        args.extend(strings(&["-y", &out.sink]));
        args
    }

    fn common(&self) -> Vec<String> {
        strings(&["-hide_banner", "-loglevel", &self.config.ffmpeg_log_level])
    }

    fn queue(&self) -> Vec<String> {
        strings(&["-thread_queue_size", &self.config.thread_queue_size.to_string()])
    }

    fn device_framing(&self) -> Vec<String> {
        strings(&["-f", &self.config.device_format, "-fflags", "+genpts"])
    }

    fn pcm_output(&self, fifo: &Path) -> Vec<String> {
        let pcm = &self.config.pcm;
        strings(&[
            "-ac",
            &pcm.channels.to_string(),
            "-ar",
            &pcm.sample_rate.to_string(),
            "-c:a",
            "pcm_s16le",
            "-f",
            "s16le",
            "-y",
            &fifo.to_string_lossy(),
        ])
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn position(args: &[String], needle: &str) -> usize {
        args.iter()
            .position(|a| a == needle)
            .unwrap_or_else(|| panic!("{} missing from {:?}", needle, args))
    }

    #[test]
    fn test_input_args_by_kind() {
        let config = EngineConfig::default();
        let builder = ArgBuilder::new(&config);

        assert_eq!(builder.input_args(LocatorKind::File), vec!["-stream_loop", "-1"]);
        assert_eq!(builder.input_args(LocatorKind::Network), vec!["-re"]);
        assert_eq!(
            builder.input_args(LocatorKind::Device),
            vec!["-f", "alsa", "-fflags", "+genpts"]
        );
    }

    #[test]
    fn test_passthrough_writes_pcm_to_fifo() {
        let config = EngineConfig::default();
        let builder = ArgBuilder::new(&config);
        let fifo = PathBuf::from("/tmp/input_pipe");

        let args = builder.passthrough("radio.mp3", LocatorKind::File, &fifo);

        assert!(position(&args, "-stream_loop") < position(&args, "-i"));
        assert!(!args.contains(&"-re".to_string()));
        assert_eq!(args[position(&args, "-i") + 1], "radio.mp3");
        assert_eq!(args[position(&args, "-c:a") + 1], "pcm_s16le");
        assert_eq!(args.last().unwrap(), "/tmp/input_pipe");
    }

    #[test]
    fn test_probe_skips_pacing() {
        let config = EngineConfig::default();
        let builder = ArgBuilder::new(&config);

        let args = builder.probe("http://stream.example/live", LocatorKind::Network);
        assert!(!args.contains(&"-re".to_string()));
        assert_eq!(&args[args.len() - 3..], &["-f", "null", "-"]);

        let args = builder.probe("hw:CARD=USB", LocatorKind::Device);
        assert_eq!(args[position(&args, "-f") + 1], "alsa");
    }

    #[test]
    fn test_crossfade_filter_graph() {
        let config = EngineConfig::default();
        let builder = ArgBuilder::new(&config);
        let fifo = PathBuf::from("/tmp/input_pipe");
        let plan = CrossfadePlan {
            from: "radio.mp3",
            from_kind: LocatorKind::File,
            to: "http://stream.example/live",
            to_kind: LocatorKind::Network,
            fade: Duration::from_secs(2),
            seek: Some(Duration::from_millis(12_345)),
        };

        let args = builder.crossfade(&plan, &fifo);

        let inputs: Vec<usize> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-i")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(inputs.len(), 2);
        assert_eq!(args[inputs[0] + 1], "radio.mp3");
        assert_eq!(args[inputs[1] + 1], "http://stream.example/live");

        // Seek applies to the outgoing input only.
        let ss = position(&args, "-ss");
        assert_eq!(args[ss + 1], "12.345");
        assert!(ss < inputs[0]);

        // The incoming network source is paced, the outgoing file loops.
        let re = position(&args, "-re");
        assert!(re > inputs[0] && re < inputs[1]);
        assert!(position(&args, "-stream_loop") < inputs[0]);

        let graph = &args[position(&args, "-filter_complex") + 1];
        assert!(graph.contains("[0:a]atrim=0:2.000,afade=t=out:st=0:d=2.000[a0]"));
        assert!(graph.contains("[1:a]afade=t=in:st=0:d=2.000[a1]"));
        assert!(graph.contains("amix=inputs=2:duration=longest:dropout_transition=2.000"));
        assert_eq!(args[position(&args, "-map") + 1], "[aout]");
        assert_eq!(args.last().unwrap(), "/tmp/input_pipe");
    }

    #[test]
    fn test_output_reads_fifo() {
        let mut config = EngineConfig::default();
        let fifo = PathBuf::from("/tmp/input_pipe");

        let args = ArgBuilder::new(&config).output(&fifo);
        assert_eq!(args[position(&args, "-i") + 1], "/tmp/input_pipe");
        assert_eq!(args[position(&args, "-c:a") + 1], "libmp3lame");
        assert!(!args.contains(&"-content_type".to_string()));
        assert_eq!(args.last().unwrap(), "output.mp3");

        config.output.sink = "icecast://source:pw@localhost:8000/live".to_string();
        let args = ArgBuilder::new(&config).output(&fifo);
        assert_eq!(args[position(&args, "-content_type") + 1], "audio/mpeg");
    }
}
