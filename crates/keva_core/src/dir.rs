//! Database directory management.
//!
//! File system layout:
//!
//! ```text
//! <db_path>/
//! ├─ CATALOG           # Store registry (key policies, surrogate counters)
//! ├─ LOCK              # Advisory lock for single-process access
//! ├─ wal.log           # Write-ahead log
//! └─ records.log       # Append-only record log
//! ```
//!
//! The LOCK file ensures only one process opens the database at a time. The
//! CATALOG file is written atomically (temp file, rename, directory fsync).

use crate::catalog::Catalog;
use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const CATALOG_FILE: &str = "CATALOG";
const CATALOG_TEMP: &str = "CATALOG.tmp";
const LOCK_FILE: &str = "LOCK";
const WAL_FILE: &str = "wal.log";
const LOG_FILE: &str = "records.log";
/// Temporary file used while rewriting the record log during compaction.
const LOG_TEMP: &str = "records.log.tmp";

/// Manages the database directory structure and file locking.
///
/// Holds the directory's exclusive lock for its lifetime; only one
/// `DatabaseDir` can exist per directory at a time.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens or creates a database directory and acquires its lock.
    ///
    /// # Errors
    ///
    /// Fails if the directory is missing and `create_if_missing` is false,
    /// if another process holds the lock ([`CoreError::DatabaseLocked`]), or
    /// on I/O errors.
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the WAL file.
    #[must_use]
    pub fn wal_path(&self) -> PathBuf {
        self.path.join(WAL_FILE)
    }

    /// Returns the path to the record log file.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Returns the path used while rewriting the record log.
    #[must_use]
    pub fn log_temp_path(&self) -> PathBuf {
        self.path.join(LOG_TEMP)
    }

    /// Returns the path to the CATALOG file.
    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.path.join(CATALOG_FILE)
    }

    /// Checks if this is a new (empty) database directory.
    #[must_use]
    pub fn is_new_database(&self) -> bool {
        !self.catalog_path().exists() && !self.wal_path().exists()
    }

    /// Removes leftovers of an interrupted log rewrite, if any.
    pub fn remove_stale_log_temp(&self) -> CoreResult<()> {
        let temp = self.log_temp_path();
        if temp.exists() {
            fs::remove_file(&temp)?;
            self.sync_directory()?;
        }
        Ok(())
    }

    /// Replaces the record log with its rewritten temp file.
    ///
    /// The temp file must already be synced; the rename plus directory fsync
    /// makes the swap atomic with respect to crashes.
    pub fn swap_log_temp(&self) -> CoreResult<()> {
        fs::rename(self.log_temp_path(), self.log_path())?;
        self.sync_directory()
    }

    /// Loads the catalog from disk.
    ///
    /// Returns `None` if the catalog file doesn't exist (new database).
    pub fn load_catalog(&self) -> CoreResult<Option<Catalog>> {
        let path = self.catalog_path();
        if !path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        if data.is_empty() {
            return Ok(None);
        }

        Ok(Some(Catalog::decode(&data)?))
    }

    /// Saves the catalog to disk atomically.
    ///
    /// Write-then-rename: the encoded catalog goes to a temp file, is synced,
    /// renamed over CATALOG, and the directory is fsynced so the rename is
    /// durable.
    pub fn save_catalog(&self, catalog: &Catalog) -> CoreResult<()> {
        let temp_path = self.path.join(CATALOG_TEMP);

        let data = catalog.encode();
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.catalog_path())?;
        self.sync_directory()
    }

    /// Fsyncs the directory so file creation/rename/removal is durable.
    ///
    /// Windows NTFS journals metadata, so the explicit fsync is Unix-only.
    #[cfg(unix)]
    fn sync_directory(&self) -> CoreResult<()> {
        let dir = File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> CoreResult<()> {
        Ok(())
    }
}
