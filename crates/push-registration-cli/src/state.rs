//! JSON file holding handshake state between runs.

use anyhow::{Context, Result};
use push_registration::HandshakeState;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored state. A missing file yields an empty state.
    pub async fn load(&self) -> Result<HandshakeState> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("Invalid state file {}", self.path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No state file at {}", self.path.display());
                Ok(HandshakeState::default())
            }
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        }
    }

    /// Replace the stored state atomically.
    pub async fn save(&self, state: &HandshakeState) -> Result<()> {
        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("tmp");

        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Saved handshake state to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use push_registration::CheckinRecord;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_loads_empty_state() {
        let dir = TempDir::new().unwrap();
        let file = StateFile::new(dir.path().join("state.json"));

        assert_eq!(file.load().await.unwrap(), HandshakeState::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let file = StateFile::new(dir.path().join("state.json"));
        let state = HandshakeState {
            checkin: Some(CheckinRecord {
                device_id: 4242,
                secret_token: 99,
                version: "v1".into(),
                digest: "dg".into(),
                timestamp: Some(1_700_000_000_000),
            }),
            installation: None,
            push_token: Some("push-1".into()),
        };

        file.save(&state).await.unwrap();
        assert_eq!(file.load().await.unwrap(), state);
        assert!(!dir.path().join("state.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"not json").unwrap();

        assert!(StateFile::new(path).load().await.is_err());
    }
}
