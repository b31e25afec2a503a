//! Ownership of the current audio artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::object_url::{ArtifactHandle, ObjectUrls};
use super::playback::Playback;
use crate::audio::wav;

/// Base name of downloaded files.
const DOWNLOAD_BASE_NAME: &str = "utterify";

/// Holds the single current artifact and feeds it to playback and downloads.
pub struct OutputSink {
    urls: ObjectUrls,
    current: Option<ArtifactHandle>,
    playback: Arc<dyn Playback>,
    download_dir: PathBuf,
}

impl OutputSink {
    pub fn new(playback: Arc<dyn Playback>, download_dir: impl Into<PathBuf>) -> Self {
        Self { urls: ObjectUrls::new(), current: None, playback, download_dir: download_dir.into() }
    }

    /// Install a freshly generated artifact and start playing it.
    ///
    /// The previous handle is revoked before the new one is created, so the
    /// sink never holds two live handles.
    pub fn on_artifact(&mut self, payload: Vec<u8>) -> ArtifactHandle {
        if let Some(previous) = self.current.take() {
            self.playback.stop();
            self.urls.revoke(&previous);
            debug!("Revoked {}", previous);
        }

        let handle = self.urls.create(payload);
        info!("🔊 New artifact {} ({} bytes)", handle, handle.len());

        if let Some(bytes) = self.urls.resolve(&handle) {
            self.playback.play(&handle, bytes);
        }

        self.current = Some(handle.clone());
        handle
    }

    /// Prepare a download of the current artifact, if there is one.
    pub fn on_download_requested(&self) -> Option<Download> {
        let handle = self.current.as_ref()?;
        let payload = self.urls.resolve(handle)?;
        Some(Download {
            payload,
            dir: self.download_dir.clone(),
            file_name: format!("{}.{}", DOWNLOAD_BASE_NAME, wav::EXTENSION),
        })
    }

    pub fn current(&self) -> Option<&ArtifactHandle> {
        self.current.as_ref()
    }

    pub fn live_handles(&self) -> usize {
        self.urls.live_count()
    }
}

impl Drop for OutputSink {
    fn drop(&mut self) {
        if let Some(handle) = self.current.take() {
            self.urls.revoke(&handle);
        }
    }
}

/// A pending user-triggered save of an artifact.
#[derive(Debug)]
pub struct Download {
    payload: Arc<[u8]>,
    dir: PathBuf,
    file_name: String,
}

impl Download {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Write the payload into the download directory and return the path used.
    ///
    /// An existing file is never overwritten; `utterify (1).wav`,
    /// `utterify (2).wav`, ... are tried in turn.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or written.
    pub fn save(self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = free_path(&self.dir, &self.file_name);
        std::fs::write(&path, &self.payload).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("💾 Saved {} ({} bytes)", path.display(), self.payload.len());
        Ok(path)
    }
}

fn free_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{}", ext)),
        None => (file_name, String::new()),
    };

    (1u32..)
        .map(|n| dir.join(format!("{} ({}){}", stem, n, ext)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}
