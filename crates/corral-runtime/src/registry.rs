//! Shared pid registry: a flat file of fixed-width records behind a
//! cross-process lock.
//!
//! Every public operation runs its whole body inside one exclusive
//! `flock` critical section and releases it on every exit path. The lock
//! serializes single calls only — a read followed by a separate remove is
//! *not* atomic, and callers that chain calls must tolerate interleaved
//! writers.
//!
//! Removal is swap-remove: the last record overwrites the removed slot
//! and the file shrinks by one record. O(1), but record positions are not
//! stable handles across removals.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use corral_common::constants;
use corral_common::error::{CorralError, Result};
use nix::fcntl::{Flock, FlockArg};

/// Width of one registry record in bytes: a host-endian 32-bit pid.
pub const RECORD_WIDTH: u64 = 4;

/// Handle to the registry file. Cheap to construct; every operation
/// opens, locks, and releases on its own.
#[derive(Debug, Clone)]
pub struct Registry {
    data_path: PathBuf,
    lock_path: PathBuf,
}

impl Registry {
    /// Opens the registry at the runtime's default location.
    #[must_use]
    pub fn open_default() -> Self {
        Self::open(constants::registry_path())
    }

    /// Opens a registry backed by the given file. The lock lives on a
    /// dedicated sibling inode so the data file itself is never used for
    /// locking.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let data_path = path.into();
        let lock_path = data_path.with_extension("lock");
        Self {
            data_path,
            lock_path,
        }
    }

    /// Appends a pid unconditionally.
    ///
    /// # Errors
    ///
    /// Returns an error on lock or I/O failure, or when the file is
    /// corrupt.
    pub fn push(&self, pid: i32) -> Result<()> {
        self.with_lock(|reg| {
            let _ = reg.record_count()?;
            let end = reg
                .file
                .seek(SeekFrom::End(0))
                .map_err(|e| reg.io_error(e))?;
            debug_assert_eq!(end % RECORD_WIDTH, 0);
            reg.file
                .write_all(&pid.to_ne_bytes())
                .map_err(|e| reg.io_error(e))?;
            reg.file.flush().map_err(|e| reg.io_error(e))
        })
    }

    /// Number of records currently stored.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::CorruptRegistry`] when the file size is not
    /// a whole number of records; the count is never rounded.
    pub fn count(&self) -> Result<u64> {
        self.with_lock(|reg| reg.record_count())
    }

    /// Reads the pid at a position, or `None` past the end.
    ///
    /// # Errors
    ///
    /// Returns an error on lock or I/O failure, or when the file is
    /// corrupt.
    pub fn get(&self, index: u64) -> Result<Option<i32>> {
        self.with_lock(|reg| {
            let count = reg.record_count()?;
            if index >= count {
                return Ok(None);
            }
            reg.read_record(index).map(Some)
        })
    }

    /// Swap-removes the first record matching `pid`, scanning linearly.
    /// Reports whether a record was found; an absent pid leaves the file
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns an error on lock or I/O failure, or when the file is
    /// corrupt.
    pub fn remove_by_pid(&self, pid: i32) -> Result<bool> {
        self.with_lock(|reg| {
            let count = reg.record_count()?;
            for index in 0..count {
                if reg.read_record(index)? == pid {
                    return reg.swap_remove(index, count);
                }
            }
            Ok(false)
        })
    }

    /// Swap-removes the record at a position. Reports whether the
    /// position existed.
    ///
    /// # Errors
    ///
    /// Returns an error on lock or I/O failure, or when the file is
    /// corrupt.
    pub fn remove_by_index(&self, index: u64) -> Result<bool> {
        self.with_lock(|reg| {
            let count = reg.record_count()?;
            reg.swap_remove(index, count)
        })
    }

    /// Runs `op` with the registry file open and exclusively locked. The
    /// guard is released when the closure returns, on success and failure
    /// alike.
    fn with_lock<T>(&self, op: impl FnOnce(&mut Locked) -> Result<T>) -> Result<T> {
        if let Some(parent) = self.data_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| CorralError::io(parent, e))?;
            }
        }
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| CorralError::io(&self.lock_path, e))?;
        let _guard = Flock::lock(lock_file, FlockArg::LockExclusive)
            .map_err(|(_, errno)| CorralError::syscall("flock", errno))?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.data_path)
            .map_err(|e| CorralError::io(&self.data_path, e))?;
        let mut locked = Locked {
            file,
            data_path: &self.data_path,
        };
        op(&mut locked)
    }
}

/// Registry file opened under the lock.
struct Locked<'a> {
    file: File,
    data_path: &'a PathBuf,
}

impl Locked<'_> {
    fn io_error(&self, source: std::io::Error) -> CorralError {
        CorralError::io(self.data_path, source)
    }

    fn record_count(&mut self) -> Result<u64> {
        let size = self
            .file
            .metadata()
            .map_err(|e| self.io_error(e))?
            .len();
        if size % RECORD_WIDTH != 0 {
            return Err(CorralError::CorruptRegistry {
                path: self.data_path.clone(),
                size,
            });
        }
        Ok(size / RECORD_WIDTH)
    }

    fn read_record(&mut self, index: u64) -> Result<i32> {
        let _ = self
            .file
            .seek(SeekFrom::Start(index * RECORD_WIDTH))
            .map_err(|e| self.io_error(e))?;
        let mut buf = [0u8; RECORD_WIDTH as usize];
        self.file
            .read_exact(&mut buf)
            .map_err(|e| self.io_error(e))?;
        Ok(i32::from_ne_bytes(buf))
    }

    fn write_record(&mut self, index: u64, pid: i32) -> Result<()> {
        let _ = self
            .file
            .seek(SeekFrom::Start(index * RECORD_WIDTH))
            .map_err(|e| self.io_error(e))?;
        self.file
            .write_all(&pid.to_ne_bytes())
            .map_err(|e| self.io_error(e))
    }

    fn swap_remove(&mut self, index: u64, count: u64) -> Result<bool> {
        if index >= count {
            return Ok(false);
        }
        let last = self.read_record(count - 1)?;
        self.write_record(index, last)?;
        self.file
            .set_len((count - 1) * RECORD_WIDTH)
            .map_err(|e| self.io_error(e))?;
        self.file.flush().map_err(|e| self.io_error(e))?;
        Ok(true)
    }
}
