//! Spawning and stopping external transcoder processes
//!
//! Each child runs in its own process group so that a termination signal also
//! reaches anything it forked. Termination is SIGTERM, a bounded wait, then
//! SIGKILL; it never blocks indefinitely.

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::fmt;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};

use crate::config::EngineConfig;
use crate::error::{EngineError, ValidationFailure};

use super::log::ProcessLog;

/// What a spawned process is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    /// Single-source writer into the conduit
    Writer,
    /// Dual-source crossfade writer into the conduit
    Crossfade,
    /// Persistent encoder reading the conduit
    Output,
    /// Short decode probe used for validation
    Probe,
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessRole::Writer => "writer",
            ProcessRole::Crossfade => "crossfade",
            ProcessRole::Output => "output",
            ProcessRole::Probe => "probe",
        };
        f.write_str(name)
    }
}

/// A running child tracked by the engine
#[derive(Debug)]
pub struct ManagedProcess {
    role: ProcessRole,
    label: String,
    pid: Option<u32>,
    started_at: Instant,
    child: Child,
}

impl ManagedProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Time since spawn
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Poll without blocking; reaps the child if it has exited
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

/// How a process ended when asked to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    AlreadyExited,
    Graceful,
    Forced,
}

#[derive(Debug)]
pub struct ProcessSupervisor {
    program: PathBuf,
    log: ProcessLog,
    terminate_timeout: Duration,
}

impl ProcessSupervisor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            program: config.ffmpeg_path.clone(),
            log: ProcessLog::new(
                &config.process_log_path,
                config.process_log_max_bytes,
                config.process_log_keep,
            ),
            terminate_timeout: config.terminate_timeout(),
        }
    }

    pub fn log(&self) -> &ProcessLog {
        &self.log
    }

    /// Start a long-lived process for `role`
    pub fn spawn(
        &self,
        role: ProcessRole,
        label: &str,
        args: &[String],
    ) -> Result<ManagedProcess, EngineError> {
        self.launch(role, label, args)
            .map_err(|source| EngineError::Spawn { role, source })
    }

    /// Run a probe to completion within `timeout`. Success is a zero exit.
    pub async fn probe(
        &self,
        label: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<(), ValidationFailure> {
        let mut process = self
            .launch(ProcessRole::Probe, label, args)
            .map_err(ValidationFailure::Launch)?;

        match tokio::time::timeout(timeout, process.child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(ValidationFailure::ExitStatus(
                status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| status.to_string()),
            )),
            Ok(Err(e)) => Err(ValidationFailure::Launch(e)),
            Err(_) => {
                signal_group(&process, Signal::SIGKILL);
                let _ = process.child.kill().await;
                Err(ValidationFailure::TimedOut(timeout))
            }
        }
    }

    /// Stop a process: SIGTERM to its group, bounded wait, then SIGKILL
    pub async fn terminate(&self, mut process: ManagedProcess) -> Termination {
        let role = process.role;
        if !process.is_running() {
            tracing::debug!(%role, pid = ?process.pid, "process already exited");
            return Termination::AlreadyExited;
        }

        tracing::info!(
            %role,
            pid = ?process.pid,
            label = %process.label,
            uptime_secs = process.uptime().as_secs_f64(),
            "Stopping process"
        );
        signal_group(&process, Signal::SIGTERM);

        if tokio::time::timeout(self.terminate_timeout, process.child.wait())
            .await
            .is_ok()
        {
            tracing::info!(%role, pid = ?process.pid, "process stopped");
            return Termination::Graceful;
        }

        tracing::error!(
            %role,
            pid = ?process.pid,
            timeout = ?self.terminate_timeout,
            "process did not terminate in time, killing it"
        );
        signal_group(&process, Signal::SIGKILL);
        let _ = process.child.start_kill();
        if tokio::time::timeout(self.terminate_timeout, process.child.wait())
            .await
            .is_err()
        {
            tracing::error!(%role, pid = ?process.pid, "process still alive after SIGKILL");
        }
        Termination::Forced
    }

    fn launch(&self, role: ProcessRole, label: &str, args: &[String]) -> io::Result<ManagedProcess> {
        let banner = format!("{} {}", role, label);
        let (stdout, stderr) = match self.log.attach(&banner) {
            Ok(handles) => handles,
            Err(e) => {
                tracing::warn!(
                    path = %self.log.path().display(),
                    error = %e,
                    "process log unavailable, discarding child output"
                );
                (Stdio::null(), Stdio::null())
            }
        };

        let mut std_cmd = std::process::Command::new(&self.program);
        std_cmd
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .process_group(0);

        let mut cmd = Command::from(std_cmd);
        cmd.kill_on_drop(true);

        let child = cmd.spawn()?;
        let pid = child.id();
        tracing::debug!(%role, ?pid, label, "spawned {}", self.program.display());

        Ok(ManagedProcess {
            role,
            label: label.to_string(),
            pid,
            started_at: Instant::now(),
            child,
        })
    }
}

/// The child leads its own group, so its pid is the group id.
fn signal_group(process: &ManagedProcess, signal: Signal) {
    let Some(pid) = process.pid else {
        return;
    };
    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(errno) = killpg(Pid::from_raw(raw), signal) {
        tracing::debug!(pid, ?signal, %errno, "killpg failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supervisor(program: &str, dir: &std::path::Path, terminate_secs: f64) -> ProcessSupervisor {
        let config = EngineConfig {
            ffmpeg_path: PathBuf::from(program),
            process_log_path: dir.join("ffmpeg.log"),
            terminate_timeout_secs: terminate_secs,
            ..Default::default()
        };
        ProcessSupervisor::new(&config)
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_terminate_running_process_gracefully() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor("sleep", dir.path(), 2.0);

        let mut process = sup.spawn(ProcessRole::Writer, "sleeper", &args(&["30"])).unwrap();
        assert!(process.pid().is_some());
        assert!(process.is_running());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(process.uptime() >= Duration::from_millis(50));

        assert_eq!(sup.terminate(process).await, Termination::Graceful);
    }

    #[tokio::test]
    async fn test_terminate_escalates_to_kill() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor("sh", dir.path(), 0.3);

        let process = sup
            .spawn(
                ProcessRole::Writer,
                "stubborn",
                &args(&["-c", "trap '' TERM; while true; do sleep 1; done"]),
            )
            .unwrap();
        // Give the shell time to install its trap.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        assert_eq!(sup.terminate(process).await, Termination::Forced);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_terminate_exited_process() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor("true", dir.path(), 1.0);

        let process = sup.spawn(ProcessRole::Writer, "done", &[]).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(sup.terminate(process).await, Termination::AlreadyExited);
    }

    #[tokio::test]
    async fn test_probe_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor("sh", dir.path(), 1.0);
        let timeout = Duration::from_millis(500);

        assert!(sup.probe("ok", &args(&["-c", "exit 0"]), timeout).await.is_ok());

        let failed = sup.probe("fail", &args(&["-c", "exit 3"]), timeout).await;
        assert!(matches!(failed, Err(ValidationFailure::ExitStatus(code)) if code == "3"));

        let hung = sup.probe("hang", &args(&["-c", "sleep 10"]), timeout).await;
        assert!(matches!(hung, Err(ValidationFailure::TimedOut(_))));
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor("/nonexistent/ffmpeg", dir.path(), 1.0);

        let err = sup.spawn(ProcessRole::Output, "missing", &[]).unwrap_err();
        assert!(matches!(err, EngineError::Spawn { role: ProcessRole::Output, .. }));

        let probe = sup.probe("missing", &[], Duration::from_secs(1)).await;
        assert!(matches!(probe, Err(ValidationFailure::Launch(_))));
    }

    #[tokio::test]
    async fn test_child_output_lands_in_log() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor("sh", dir.path(), 1.0);

        sup.probe("echo", &args(&["-c", "echo probing >&2"]), Duration::from_secs(2))
            .await
            .unwrap();

        let lines = sup.log().tail(20).unwrap();
        assert!(lines.iter().any(|l| l.starts_with("=== probe echo ")));
        assert!(lines.iter().any(|l| l == "probing"));
    }
}
