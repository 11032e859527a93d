//! Single-owner guard for a base directory.
//!
//! Only one relay process may own the persisted queue under a base
//! directory at a time. The owner holds an exclusive OS lock on the pid
//! file for as long as it lives; the lock goes away with the process, so a
//! crashed owner never leaves the directory wedged.

use crate::{CoreError, CoreResult, Paths};
use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Exclusive ownership of a base directory. Released on drop.
pub struct InstanceLock {
    path: PathBuf,
    // Holds the OS lock; closing the descriptor releases it.
    _file: RwLock<File>,
}

impl InstanceLock {
    /// Take ownership of `paths`' base directory and record our pid.
    ///
    /// Fails with [`CoreError::AlreadyRunning`] while another instance
    /// holds the lock.
    pub fn acquire(paths: &Paths) -> CoreResult<Self> {
        paths.ensure_dirs()?;
        let path = paths.pid_file();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let mut lock = RwLock::new(file);

        match lock.try_write() {
            Ok(mut guard) => {
                let pid = std::process::id();
                guard.set_len(0)?;
                guard.write_all(pid.to_string().as_bytes())?;
                guard.sync_all()?;
                // Keep the lock past the guard; it is released when `_file` closes.
                std::mem::forget(guard);
                info!(pid, path = %path.display(), "Acquired relay instance lock");
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                let pid = read_pid(&path);
                debug!(path = %path.display(), owner = ?pid, "Relay instance lock is held");
                return Err(CoreError::AlreadyRunning {
                    pid,
                    base_dir: paths.base_dir().clone(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self { path, _file: lock })
    }

    /// Whether some process currently owns `paths`' base directory.
    pub fn is_held(paths: &Paths) -> CoreResult<bool> {
        let path = paths.pid_file();
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let mut lock = RwLock::new(file);
        let held = match lock.try_write() {
            Ok(_guard) => false,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => true,
            Err(e) => return Err(e.into()),
        };
        Ok(held)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Pid recorded by the current owner, if readable.
fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}
