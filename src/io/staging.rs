// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Temporary export staging and relocation

use crate::error::{PipelineError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A finished container at its temporary, session-scoped path.
///
/// Valid until it is relocated or the owning session is torn down.
#[derive(Debug)]
pub struct ExportedFile {
    path: PathBuf,
}

impl ExportedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Owns the session-scoped staging directory for finished exports.
///
/// Hands out a fresh path per export, persists fully-assembled bytes in one
/// step (a failed write never leaves a truncated container behind), cleans
/// up stale files, and relocates the finished container to the destination
/// chosen by the sink. Dropping the staging removes the directory and
/// everything still in it.
pub struct ExportStaging {
    dir: TempDir,
    next_index: u64,
}

impl ExportStaging {
    pub fn new() -> Result<Self> {
        let dir = TempDir::with_prefix("polyscan-")
            .map_err(|e| PipelineError::export_failed(format!("failed to create staging directory: {e}")))?;
        Ok(Self { dir, next_index: 0 })
    }

    /// Write a finished container to a fresh staging path
    pub fn persist(&mut self, bytes: &[u8]) -> Result<ExportedFile> {
        self.next_index += 1;
        let path = self.dir.path().join(format!("scan-{}.glb", self.next_index));

        if let Err(e) = fs::write(&path, bytes) {
            let _ = fs::remove_file(&path);
            return Err(PipelineError::export_failed(format!(
                "failed to write container to {}: {e}",
                path.display()
            )));
        }

        log::debug!("staged export at {}", path.display());
        Ok(ExportedFile { path })
    }

    /// Remove staged files other than `keep`; returns how many were removed
    pub fn cleanup_stale(&self, keep: Option<&Path>) -> usize {
        let Ok(entries) = fs::read_dir(self.dir.path()) else {
            return 0;
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if keep == Some(path.as_path()) {
                continue;
            }
            if fs::remove_file(&path).is_ok() {
                log::debug!("removed stale export {}", path.display());
                removed += 1;
            }
        }
        removed
    }

    /// Hand the finished container to the relocation sink.
    ///
    /// Tries a rename first and falls back to copy-and-remove across
    /// filesystems. On failure the temporary file is retained for retry.
    pub fn relocate(&self, file: &ExportedFile, destination: &Path) -> Result<PathBuf> {
        if fs::rename(file.path(), destination).is_ok() {
            return Ok(destination.to_path_buf());
        }

        if let Err(e) = fs::copy(file.path(), destination) {
            let _ = fs::remove_file(destination);
            return Err(PipelineError::relocation_failed(format!(
                "failed to move export to {}: {e}",
                destination.display()
            )));
        }
        if let Err(e) = fs::remove_file(file.path()) {
            log::warn!(
                "relocated export but left a stale copy at {}: {e}",
                file.path().display()
            );
        }
        Ok(destination.to_path_buf())
    }
}
