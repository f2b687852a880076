//! Per-session directory for generated audio.
//!
//! Tracks land in `{output_dir}/{session_id}/`. The merged file is written to
//! a temp name and renamed into place, so a reader never sees a partial
//! merge. After a successful merge the intermediate tracks are removed.

use errors::ToolError;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct ArtifactWorkspace {
    dir: PathBuf,
    merged_file_name: String,
    tracks: Mutex<Vec<String>>,
    merged: Mutex<Option<PathBuf>>
}

impl ArtifactWorkspace {
    pub fn new(output_dir: impl AsRef<Path>, session_id: &str, merged_file_name: &str) -> Self {
        Self {
            dir: output_dir.as_ref().join(session_id),
            merged_file_name: merged_file_name.to_string(),
            tracks: Mutex::new(Vec::new()),
            merged: Mutex::new(None)
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File names of the tracks written so far, in generation order.
    pub fn tracks(&self) -> Vec<String> {
        self.tracks.lock().clone()
    }

    pub fn merged(&self) -> Option<PathBuf> {
        self.merged.lock().clone()
    }

    /// Normalises a model-supplied file name: no directories, `.wav` suffix.
    pub fn track_file_name(file_name: &str) -> Result<String, ToolError> {
        let trimmed = file_name.trim();
        if trimmed.is_empty() {
            return Err(ToolError::invalid_input("file_name", "must not be empty"));
        }
        if trimmed.contains(['/', '\\']) || trimmed == "." || trimmed == ".." {
            return Err(ToolError::invalid_input(
                "file_name",
                "must be a bare file name"
            ));
        }
        if trimmed.ends_with(".wav") {
            Ok(trimmed.to_string())
        } else {
            Ok(format!("{trimmed}.wav"))
        }
    }

    pub async fn write_track(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ToolError> {
        let path = self.dir.join(file_name);
        let artifact = |e: std::io::Error| ToolError::Artifact {
            tool: "generate_music".to_string(),
            reason: format!("{}: {e}", path.display())
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(artifact)?;
        tokio::fs::write(&path, bytes).await.map_err(artifact)?;

        let mut tracks = self.tracks.lock();
        if !tracks.iter().any(|t| t == file_name) {
            tracks.push(file_name.to_string());
        }
        debug!(path = %path.display(), bytes = bytes.len(), "track written");
        Ok(path)
    }

    /// Fails when `file_names` leaves out any track generated so far; a
    /// merge always carries every layer.
    pub fn ensure_covers(&self, file_names: &[String]) -> Result<(), ToolError> {
        let named = file_names
            .iter()
            .map(|n| Self::track_file_name(n))
            .collect::<Result<Vec<_>, _>>()?;
        let omitted: Vec<String> = self
            .tracks
            .lock()
            .iter()
            .filter(|t| !named.contains(t))
            .cloned()
            .collect();
        if omitted.is_empty() {
            Ok(())
        } else {
            Err(ToolError::IncompleteMerge { omitted })
        }
    }

    /// Reads every input, failing on the first one that is absent.
    pub async fn read_inputs(&self, file_names: &[String]) -> Result<Vec<Vec<u8>>, ToolError> {
        let mut inputs = Vec::with_capacity(file_names.len());
        for name in file_names {
            let name = Self::track_file_name(name)?;
            let path = self.dir.join(&name);
            match tokio::fs::read(&path).await {
                Ok(bytes) => inputs.push(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(ToolError::MergeInputMissing { file: name });
                }
                Err(e) => {
                    return Err(ToolError::Artifact {
                        tool: "overlay_audio_files".to_string(),
                        reason: format!("{}: {e}", path.display())
                    });
                }
            }
        }
        Ok(inputs)
    }

    /// Writes the merged output once and removes the intermediate tracks.
    pub async fn write_merged(&self, bytes: &[u8]) -> Result<PathBuf, ToolError> {
        let path = self.dir.join(&self.merged_file_name);
        let tmp = self.dir.join(format!(".{}.partial", self.merged_file_name));
        let artifact = |e: std::io::Error| ToolError::Artifact {
            tool: "overlay_audio_files".to_string(),
            reason: format!("{}: {e}", path.display())
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(artifact)?;
        tokio::fs::write(&tmp, bytes).await.map_err(artifact)?;
        tokio::fs::rename(&tmp, &path).await.map_err(artifact)?;
        *self.merged.lock() = Some(path.clone());

        self.remove_tracks().await;
        info!(path = %path.display(), "merged soundscape written");
        Ok(path)
    }

    async fn remove_tracks(&self) {
        let names = std::mem::take(&mut *self.tracks.lock());
        for name in names {
            let path = self.dir.join(&name);
            if let Err(e) = tokio::fs::remove_file(&path).await
                && e.kind() != std::io::ErrorKind::NotFound
            {
                warn!(path = %path.display(), error = %e, "failed to remove track file");
            }
        }
    }

    /// Removes everything an aborted session left behind.
    ///
    /// Without a recorded merge the whole session directory goes, including
    /// files a dropped write finished after the tool call was abandoned.
    /// With one, only the tracks and the merge temp file are removed.
    pub async fn discard_partial(&self) {
        if self.merged().is_none() {
            self.tracks.lock().clear();
            match tokio::fs::remove_dir_all(&self.dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(dir = %self.dir.display(), error = %e, "failed to remove session directory")
            }
        } else {
            self.remove_tracks().await;
            let tmp = self.dir.join(format!(".{}.partial", self.merged_file_name));
            if let Err(e) = tokio::fs::remove_file(&tmp).await
                && e.kind() != std::io::ErrorKind::NotFound
            {
                warn!(path = %tmp.display(), error = %e, "failed to remove merge temp file");
            }
        }
        debug!(dir = %self.dir.display(), "partial artifacts discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_file_name_normalisation() {
        assert_eq!(
            ArtifactWorkspace::track_file_name("rain").unwrap(),
            "rain.wav"
        );
        assert_eq!(
            ArtifactWorkspace::track_file_name("rain.wav").unwrap(),
            "rain.wav"
        );
        assert!(ArtifactWorkspace::track_file_name("../etc/passwd").is_err());
        assert!(ArtifactWorkspace::track_file_name("  ").is_err());
    }

    #[tokio::test]
    async fn test_merge_removes_tracks() {
        let root = tempfile::tempdir().unwrap();
        let workspace = ArtifactWorkspace::new(root.path(), "s1", "combined_audio.wav");
        workspace.write_track("a.wav", b"aaa").await.unwrap();
        workspace.write_track("b.wav", b"bbb").await.unwrap();

        let inputs = workspace
            .read_inputs(&["a.wav".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(inputs, vec![b"aaa".to_vec(), b"bbb".to_vec()]);

        let merged = workspace.write_merged(b"mix").await.unwrap();
        assert!(merged.ends_with("s1/combined_audio.wav"));
        assert!(!workspace.dir().join("a.wav").exists());
        assert!(!workspace.dir().join("b.wav").exists());
        assert!(workspace.tracks().is_empty());
    }

    #[tokio::test]
    async fn test_missing_input_names_the_file() {
        let root = tempfile::tempdir().unwrap();
        let workspace = ArtifactWorkspace::new(root.path(), "s1", "combined_audio.wav");
        workspace.write_track("a.wav", b"aaa").await.unwrap();

        let err = workspace
            .read_inputs(&["a.wav".to_string(), "ghost.wav".to_string()])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ToolError::MergeInputMissing {
                file: "ghost.wav".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_discard_partial_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let workspace = ArtifactWorkspace::new(root.path(), "s1", "combined_audio.wav");
        workspace.write_track("a.wav", b"aaa").await.unwrap();
        workspace.discard_partial().await;
        assert!(!workspace.dir().exists());
    }

    #[tokio::test]
    async fn test_discard_partial_removes_unrecorded_files() {
        let root = tempfile::tempdir().unwrap();
        let workspace = ArtifactWorkspace::new(root.path(), "s1", "combined_audio.wav");
        workspace.write_track("a.wav", b"aaa").await.unwrap();
        // a write that completed after its tool call was dropped
        tokio::fs::write(workspace.dir().join("late.wav"), b"late")
            .await
            .unwrap();
        tokio::fs::write(workspace.dir().join(".combined_audio.wav.partial"), b"mix")
            .await
            .unwrap();

        workspace.discard_partial().await;
        assert!(!workspace.dir().exists());
        assert!(workspace.tracks().is_empty());
    }

    #[tokio::test]
    async fn test_discard_partial_on_missing_dir_is_quiet() {
        let root = tempfile::tempdir().unwrap();
        let workspace = ArtifactWorkspace::new(root.path(), "never-written", "combined_audio.wav");
        workspace.discard_partial().await;
        assert!(!workspace.dir().exists());
    }

    #[tokio::test]
    async fn test_merge_must_cover_every_track() {
        let root = tempfile::tempdir().unwrap();
        let workspace = ArtifactWorkspace::new(root.path(), "s1", "combined_audio.wav");
        for name in ["a.wav", "b.wav", "c.wav"] {
            workspace.write_track(name, b"x").await.unwrap();
        }

        let err = workspace.ensure_covers(&["a".to_string()]).unwrap_err();
        assert_eq!(
            err,
            ToolError::IncompleteMerge {
                omitted: vec!["b.wav".to_string(), "c.wav".to_string()]
            }
        );
        workspace
            .ensure_covers(&["c.wav".to_string(), "a".to_string(), "b".to_string()])
            .unwrap();
    }
}
