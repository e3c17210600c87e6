// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-request scratch space
//!
//! Every request gets its own upload directory and run-output directory,
//! both named after a fresh request id. They are created on entry and
//! removed on exit: explicitly via [`RequestWorkspace::release`] on the
//! success path, and by `Drop` on every other path.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

/// Scoped directories owned by one request
#[derive(Debug)]
pub struct RequestWorkspace {
    request_id: Uuid,
    upload_dir: Option<TempDir>,
    run_dir: Option<TempDir>,
}

impl RequestWorkspace {
    /// Create `<upload_root>/<id>/` and `<runs_root>/<id>/` for a new request id
    ///
    /// The roots themselves are created if missing and are never removed.
    pub fn acquire(upload_root: &Path, runs_root: &Path) -> io::Result<Self> {
        Self::acquire_with_id(Uuid::new_v4(), upload_root, runs_root)
    }

    pub fn acquire_with_id(request_id: Uuid, upload_root: &Path, runs_root: &Path) -> io::Result<Self> {
        let upload_dir = scoped_dir(upload_root, &request_id)?;
        let run_dir = scoped_dir(runs_root, &request_id)?;

        debug!(request_id = %request_id, "Workspace acquired");

        Ok(Self {
            request_id,
            upload_dir: Some(upload_dir),
            run_dir: Some(run_dir),
        })
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Scratch directory for the uploaded file
    pub fn upload_dir(&self) -> &Path {
        self.upload_dir
            .as_ref()
            .map(TempDir::path)
            .unwrap_or_else(|| Path::new(""))
    }

    /// Directory the annotated output is written into
    pub fn run_dir(&self) -> &Path {
        self.run_dir
            .as_ref()
            .map(TempDir::path)
            .unwrap_or_else(|| Path::new(""))
    }

    /// Internal path for the uploaded bytes; never derived from client input
    pub fn input_path(&self, extension: &str) -> PathBuf {
        self.upload_dir().join(format!("input.{}", extension))
    }

    /// Remove both directories, reporting the first failure
    ///
    /// Both removals are attempted even if the first fails.
    pub fn release(mut self) -> io::Result<()> {
        let upload = self.upload_dir.take().map(TempDir::close).unwrap_or(Ok(()));
        let run = self.run_dir.take().map(TempDir::close).unwrap_or(Ok(()));

        debug!(request_id = %self.request_id, "Workspace released");
        upload.and(run)
    }
}

impl Drop for RequestWorkspace {
    fn drop(&mut self) {
        for dir in [self.upload_dir.take(), self.run_dir.take()].into_iter().flatten() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(
                    request_id = %self.request_id,
                    "Failed to remove scratch directory {}: {}",
                    path.display(),
                    e
                );
            }
        }
    }
}

fn scoped_dir(root: &Path, request_id: &Uuid) -> io::Result<TempDir> {
    std::fs::create_dir_all(root)?;
    tempfile::Builder::new()
        .prefix(&request_id.to_string())
        .rand_bytes(0)
        .tempdir_in(root)
}
