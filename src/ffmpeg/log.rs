//! Rotating diagnostic sink for spawned processes
//!
//! Every child gets its stdout and stderr appended to one file, preceded by a
//! banner naming the process and the local time it was started.

use parking_lot::Mutex;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

#[derive(Debug)]
pub struct ProcessLog {
    path: PathBuf,
    max_bytes: u64,
    keep: usize,
    /// Serializes rotation and banner writes
    lock: Mutex<()>,
}

impl ProcessLog {
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64, keep: usize) -> Self {
        Self {
            path: path.into(),
            max_bytes,
            keep,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a `=== label timestamp ===` line
    pub fn banner(&self, label: &str) -> io::Result<()> {
        let _guard = self.lock.lock();
        self.rotate_if_needed()?;
        let mut file = self.open_append()?;
        write_banner(&mut file, label)
    }

    /// Write a banner and hand back stdout/stderr handles for a child
    pub fn attach(&self, label: &str) -> io::Result<(Stdio, Stdio)> {
        let _guard = self.lock.lock();
        self.rotate_if_needed()?;
        let mut file = self.open_append()?;
        write_banner(&mut file, label)?;
        let stderr = file.try_clone()?;
        Ok((Stdio::from(file), Stdio::from(stderr)))
    }

    /// Rotate if the file has outgrown its limit. Writes from long-lived
    /// children never pass through `attach`, so this also runs periodically.
    pub fn maintain(&self) -> io::Result<()> {
        let _guard = self.lock.lock();
        self.rotate_if_needed()
    }

    /// Last `lines` lines of the current log file
    pub fn tail(&self, lines: usize) -> io::Result<Vec<String>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let text = String::from_utf8_lossy(&bytes);
        let mut tail: Vec<String> = text.lines().rev().take(lines).map(String::from).collect();
        tail.reverse();
        Ok(tail)
    }

    fn open_append(&self) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(&self.path)
    }

    fn rotate_if_needed(&self) -> io::Result<()> {
        let size = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        if size < self.max_bytes {
            return Ok(());
        }

        for generation in (1..self.keep).rev() {
            let from = self.generation_path(generation);
            if from.exists() {
                std::fs::rename(&from, self.generation_path(generation + 1))?;
            }
        }
        if self.keep > 0 {
            std::fs::copy(&self.path, self.generation_path(1))?;
        }

        // Copy then truncate: running children hold the file open in append
        // mode and carry on at the new end.
        OpenOptions::new().write(true).open(&self.path)?.set_len(0)?;
        tracing::debug!(path = %self.path.display(), size, "process log rotated");
        Ok(())
    }

    fn generation_path(&self, generation: usize) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{}", generation));
        PathBuf::from(name)
    }
}

fn write_banner(file: &mut File, label: &str) -> io::Result<()> {
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    write!(file, "\n=== {} {} ===\n\n", label, now)
}
