use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{Result, DubmuxError};

fn default_speaker() -> String {
    "SPEAKER_00".to_string()
}

/// One timed line of the translated transcript produced upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub start: f64,
    pub end: f64,
    /// Source-language text
    #[serde(default)]
    pub text: String,
    /// Target-language text shown in subtitles
    #[serde(default)]
    pub translation: String,
    #[serde(default = "default_speaker")]
    pub speaker: String,
}

impl TranscriptEntry {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Load a translated transcript (JSON array of entries).
///
/// Entries whose end does not come after their start are dropped with a
/// warning instead of failing the whole file.
pub async fn load_transcript<P: AsRef<Path>>(path: P) -> Result<Vec<TranscriptEntry>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DubmuxError::FileNotFound(path.display().to_string()));
    }

    let content = fs::read_to_string(path).await?;
    let entries: Vec<TranscriptEntry> = serde_json::from_str(&content)?;
    let total = entries.len();

    let entries: Vec<TranscriptEntry> = entries
        .into_iter()
        .filter(|entry| {
            let valid = entry.end > entry.start;
            if !valid {
                warn!(
                    "Dropping transcript entry with non-positive duration ({:.3} -> {:.3})",
                    entry.start, entry.end
                );
            }
            valid
        })
        .collect();

    debug!("Loaded {}/{} transcript entries from {}", entries.len(), total, path.display());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_transcript_defaults_speaker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("translation.json");
        std::fs::write(
            &path,
            r#"[{"start": 0.0, "end": 5.0, "text": "Hello, world.", "translation": "你好，世界。"}]"#,
        )
        .unwrap();

        let entries = load_transcript(&path).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].speaker, "SPEAKER_00");
        assert_eq!(entries[0].translation, "你好，世界。");
        assert_eq!(entries[0].duration(), 5.0);
    }

    #[tokio::test]
    async fn test_load_transcript_drops_inverted_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("translation.json");
        std::fs::write(
            &path,
            r#"[
                {"start": 0.0, "end": 2.0, "text": "a", "translation": "甲", "speaker": "SPEAKER_01"},
                {"start": 3.0, "end": 3.0, "text": "b", "translation": "乙"}
            ]"#,
        )
        .unwrap();

        let entries = load_transcript(&path).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].speaker, "SPEAKER_01");
    }

    #[tokio::test]
    async fn test_load_transcript_missing_file() {
        let result = load_transcript("/nonexistent/translation.json").await;
        assert!(matches!(result, Err(DubmuxError::FileNotFound(_))));
    }
}
