// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filesystem operations for the bridge's persisted state.
//!
//! Everything lives under one data directory. JSON documents are written
//! atomically (temp file + rename) so a crash never leaves a half-written
//! `connected_sites.json` behind.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use super::StoragePaths;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage not initialized")]
    NotInitialized,

    /// Health check read back something other than what it wrote.
    #[error("Data directory is not round-tripping writes")]
    Corrupted,

    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(e.to_string()),
            _ => StorageError::Io(e),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Handle on the data directory. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FileStorage {
    paths: StoragePaths,
    initialized: bool,
}

impl FileStorage {
    /// Nothing touches the disk until [`FileStorage::initialize`].
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            initialized: false,
        }
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Create the `state/`, `accounts/` and `audit/` trees. Idempotent.
    pub fn initialize(&mut self) -> StorageResult<()> {
        for dir in [
            self.paths.state_dir(),
            self.paths.accounts_dir(),
            self.paths.audit_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        self.initialized = true;
        Ok(())
    }

    fn ready(&self) -> StorageResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(StorageError::NotInitialized)
        }
    }

    /// Ready check plus parent-directory creation for a write to `path`.
    fn prepare_write(&self, path: &Path) -> StorageResult<()> {
        self.ready()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Round-trip a scratch file through the data directory.
    pub fn health_check(&self) -> StorageResult<()> {
        self.ready()?;

        let scratch = self.paths.root().join(".health");
        let token = uuid::Uuid::new_v4().to_string();
        fs::write(&scratch, &token)?;
        let echoed = fs::read_to_string(&scratch);
        fs::remove_file(&scratch)?;

        if echoed? == token {
            Ok(())
        } else {
            Err(StorageError::Corrupted)
        }
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> StorageResult<T> {
        self.ready()?;
        let reader = BufReader::new(File::open(path.as_ref())?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn write_json<T: Serialize>(&self, path: impl AsRef<Path>, value: &T) -> StorageResult<()> {
        let path = path.as_ref();
        self.prepare_write(path)?;

        let staged = path.with_extension("tmp");
        let mut writer = BufWriter::new(File::create(&staged)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        drop(writer);

        fs::rename(&staged, path)?;
        Ok(())
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    /// Sorted names of the subdirectories of `dir`; empty when `dir` is missing.
    pub fn list_dirs(&self, dir: impl AsRef<Path>) -> StorageResult<Vec<String>> {
        self.ready()?;
        let entries = match fs::read_dir(dir.as_ref()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn create_dir(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        self.ready()?;
        fs::create_dir_all(path.as_ref())?;
        Ok(())
    }

    /// Replace the file at `path` with `data` (key material).
    pub fn write_raw(&self, path: impl AsRef<Path>, data: &[u8]) -> StorageResult<()> {
        let path = path.as_ref();
        self.prepare_write(path)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Append to `path`, creating it on first use (JSONL logs).
    pub fn append_raw(&self, path: impl AsRef<Path>, data: &[u8]) -> StorageResult<()> {
        let path = path.as_ref();
        self.prepare_write(path)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(data)?;
        Ok(())
    }

    pub fn read_raw(&self, path: impl AsRef<Path>) -> StorageResult<Vec<u8>> {
        self.ready()?;
        Ok(fs::read(path.as_ref())?)
    }
}

#[cfg(test)]
pub(crate) fn test_storage() -> (tempfile::TempDir, FileStorage) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let mut storage = FileStorage::new(StoragePaths::new(dir.path()));
    storage.initialize().expect("initialize test storage");
    (dir, storage)
}
