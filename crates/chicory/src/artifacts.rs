//! Debug artifacts
//!
//! Every analyze or scroll run gets its own timestamped directory under
//! `<data_local_dir>/chicory/debug` holding the numbered scroll captures and
//! the raw reasoning response. Saving is best effort: failures are logged
//! and never abort a run.

use chrono::Local;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default artifact root: `<data_local_dir>/chicory/debug`.
pub fn default_artifacts_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("chicory")
        .join("debug")
}

fn sanitize(label: &str) -> String {
    label
        .replace("::", "_")
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    enabled: bool,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            root: root.into(),
            enabled,
        }
    }

    pub fn disabled() -> Self {
        Self::new(default_artifacts_dir(), false)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Create a fresh run directory named `YYYYMMDD_HHMMSS_<label>`.
    ///
    /// When the directory cannot be created the returned run silently
    /// discards everything saved to it.
    pub fn start_run(&self, label: &str) -> ArtifactRun {
        if !self.enabled {
            return ArtifactRun { dir: None };
        }

        let base = format!(
            "{}_{}",
            Local::now().format("%Y%m%d_%H%M%S"),
            sanitize(label)
        );
        let mut dir = self.root.join(&base);
        let mut n = 1;
        while dir.exists() {
            dir = self.root.join(format!("{base}_{n}"));
            n += 1;
        }

        match fs::create_dir_all(&dir) {
            Ok(()) => {
                info!("[artifacts] Saving run artifacts to {}", dir.display());
                ArtifactRun { dir: Some(dir) }
            }
            Err(e) => {
                warn!(
                    "[artifacts] Failed to create {}: {}; artifacts disabled for this run",
                    dir.display(),
                    e
                );
                ArtifactRun { dir: None }
            }
        }
    }
}

/// Directory of a single run.
#[derive(Debug, Clone)]
pub struct ArtifactRun {
    dir: Option<PathBuf>,
}

impl ArtifactRun {
    /// A run that keeps nothing.
    pub fn discard() -> Self {
        Self { dir: None }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Write raw bytes; returns the saved path.
    pub fn save_bytes(&self, filename: &str, bytes: &[u8]) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let path = dir.join(filename);
        match fs::write(&path, bytes) {
            Ok(()) => {
                debug!(
                    "[artifacts] Saved {} ({}KB)",
                    filename,
                    bytes.len() / 1024
                );
                Some(path)
            }
            Err(e) => {
                warn!("[artifacts] Failed to save {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn save_png(&self, filename: &str, png: &[u8]) -> Option<PathBuf> {
        self.save_bytes(filename, png)
    }

    /// Write a value as pretty-printed JSON.
    pub fn save_json<T: Serialize>(&self, filename: &str, value: &T) -> Option<PathBuf> {
        self.dir.as_ref()?;
        match serde_json::to_vec_pretty(value) {
            Ok(bytes) => self.save_bytes(filename, &bytes),
            Err(e) => {
                warn!("[artifacts] Failed to serialize {}: {}", filename, e);
                None
            }
        }
    }
}
