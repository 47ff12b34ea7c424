//! Named pipe between writer processes and the output process
//!
//! The engine keeps one read/write descriptor on the pipe for as long as the
//! pipe exists. With that descriptor open the reader never sees end-of-stream
//! while one writer is being replaced by the next.

use nix::sys::stat::Mode;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[derive(Debug)]
pub struct FifoConduit {
    path: PathBuf,
    keepalive: Option<File>,
}

impl FifoConduit {
    /// Create the pipe at `path`, replacing whatever stale pipe is there
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let mut conduit = Self {
            path: path.into(),
            keepalive: None,
        };
        conduit.make()?;
        Ok(conduit)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the keep-alive descriptor is currently held
    pub fn is_held_open(&self) -> bool {
        self.keepalive.is_some()
    }

    /// Unlink and remake the pipe. A wedged pipe is never reused.
    pub fn recreate(&mut self) -> io::Result<()> {
        self.keepalive = None;
        self.make()
    }

    /// Time since the pipe was last written to, `None` if it is gone
    pub fn idle_for(&self) -> Option<Duration> {
        let modified = std::fs::metadata(&self.path).ok()?.modified().ok()?;
        Some(
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO),
        )
    }

    /// Release the descriptor and unlink the pipe. Safe to call repeatedly.
    pub fn remove(&mut self) -> io::Result<()> {
        self.keepalive = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "FIFO removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn make(&mut self) -> io::Result<()> {
        match std::fs::symlink_metadata(&self.path) {
            Ok(meta) if meta.is_dir() => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} is a directory", self.path.display()),
                ));
            }
            Ok(_) => std::fs::remove_file(&self.path)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        nix::unistd::mkfifo(
            &self.path,
            Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IWGRP,
        )
        .map_err(io::Error::from)?;

        // O_RDWR on a FIFO never blocks on Linux and counts as both ends.
        let fd = OpenOptions::new().read(true).write(true).open(&self.path)?;
        self.keepalive = Some(fd);

        tracing::info!(path = %self.path.display(), "FIFO ready");
        Ok(())
    }
}

/// True if `path` exists and is a named pipe
pub fn is_fifo(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|m| m.file_type().is_fifo())
        .unwrap_or(false)
}
