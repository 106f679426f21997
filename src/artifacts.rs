//! Transient WAV artifacts produced by the synthesis stage.
//!
//! Every synthesized utterance is written to disk so the playback sink
//! and any external inspector can reach it. Names are content-addressed
//! by a hash of the text, and a periodic sweep removes artifacts older
//! than the retention window.

use crate::config::ArtifactConfig;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const ARTIFACT_PREFIX: &str = "tts_";
const ARTIFACT_EXT: &str = "wav";

/// Directory of transient TTS artifacts with retention-based cleanup.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    retention: Duration,
}

impl ArtifactStore {
    /// Open (creating if needed) the artifact directory.
    ///
    /// When the config names no directory, a `mascotte/tts` directory
    /// under the user cache dir is used, falling back to the system
    /// temp dir when no cache dir exists.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    pub fn open(config: &ArtifactConfig) -> Result<Self> {
        let dir = config.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("mascotte")
                .join("tts")
        });
        fs::create_dir_all(&dir)
            .map_err(|e| Error::Config(format!("cannot create artifact dir {}: {e}", dir.display())))?;
        Ok(Self {
            dir,
            retention: Duration::from_secs(config.retention_secs),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact path for `text`: `tts_<hash>.wav`, stable per text so a
    /// repeated utterance overwrites rather than accumulates.
    #[must_use]
    pub fn path_for(&self, text: &str) -> PathBuf {
        let hex = blake3::hash(text.as_bytes()).to_hex();
        let short = &hex[..16];
        self.dir
            .join(format!("{ARTIFACT_PREFIX}{short}.{ARTIFACT_EXT}"))
    }

    /// Delete artifacts older than the retention window.
    ///
    /// Only files matching the artifact naming scheme are touched.
    /// Returns the number of files removed; individual removal failures
    /// are logged and skipped.
    pub fn sweep_expired(&self) -> usize {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("artifact sweep cannot read {}: {e}", self.dir.display());
                return 0;
            }
        };
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !is_artifact(&path) {
                continue;
            }
            let expired = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| t.elapsed().ok())
                .is_some_and(|age| age > self.retention);
            if expired {
                match fs::remove_file(&path) {
                    Ok(()) => {
                        debug!("removed expired artifact {}", path.display());
                        removed += 1;
                    }
                    Err(e) => warn!("cannot remove {}: {e}", path.display()),
                }
            }
        }
        removed
    }
}

fn is_artifact(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.starts_with(ARTIFACT_PREFIX) && path.extension().is_some_and(|e| e == ARTIFACT_EXT)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn store_in(dir: &Path, retention_secs: u64) -> ArtifactStore {
        ArtifactStore::open(&ArtifactConfig {
            dir: Some(dir.to_path_buf()),
            retention_secs,
        })
        .unwrap()
    }

    #[test]
    fn path_is_stable_per_text() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path(), 900);
        let a = store.path_for("hello there");
        let b = store.path_for("hello there");
        let c = store.path_for("different text");
        assert_eq!(a, b);
        assert_ne!(a, c);
        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("tts_"));
        assert!(name.ends_with(".wav"));
    }

    #[test]
    fn sweep_removes_only_expired_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        // zero retention: everything already written is expired
        let store = store_in(tmp.path(), 0);
        let expired = store.path_for("old");
        fs::write(&expired, b"riff").unwrap();
        let unrelated = tmp.path().join("keep.txt");
        fs::write(&unrelated, b"notes").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let removed = store.sweep_expired();
        assert_eq!(removed, 1);
        assert!(!expired.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn sweep_keeps_fresh_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path(), 900);
        let fresh = store.path_for("new");
        fs::write(&fresh, b"riff").unwrap();
        assert_eq!(store.sweep_expired(), 0);
        assert!(fresh.exists());
    }

    #[test]
    fn open_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        let store = store_in(&nested, 900);
        assert!(store.dir().is_dir());
    }
}
