//! File names shared by every unit folder, and a presence report per stage.

use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Downloaded source video; its presence marks a unit folder
pub const SOURCE_VIDEO: &str = "download.mp4";
/// Audio track extracted from the source video
pub const SOURCE_AUDIO: &str = "audio.wav";
pub const VOCALS: &str = "audio_vocals.wav";
pub const INSTRUMENTS: &str = "audio_instruments.wav";
/// Speech recognition output
pub const TRANSCRIPT: &str = "transcript.json";
/// Translated transcript consumed by synthesis
pub const TRANSLATION: &str = "translation.json";
pub const TTS_AUDIO: &str = "audio_tts.wav";
/// Dubbed audio track consumed by synthesis
pub const DUBBED_AUDIO: &str = "audio_combined.wav";
pub const SUBTITLES: &str = "subtitles.srt";
/// Final synthesized video
pub const OUTPUT_VIDEO: &str = "video.mp4";

const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mkv", "mov"];

/// Paths of the artifacts inside one unit folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderLayout {
    root: PathBuf,
}

impl FolderLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_video(&self) -> PathBuf {
        self.root.join(SOURCE_VIDEO)
    }

    pub fn source_audio(&self) -> PathBuf {
        self.root.join(SOURCE_AUDIO)
    }

    pub fn vocals(&self) -> PathBuf {
        self.root.join(VOCALS)
    }

    pub fn instruments(&self) -> PathBuf {
        self.root.join(INSTRUMENTS)
    }

    pub fn translation(&self) -> PathBuf {
        self.root.join(TRANSLATION)
    }

    pub fn dubbed_audio(&self) -> PathBuf {
        self.root.join(DUBBED_AUDIO)
    }

    pub fn subtitles(&self) -> PathBuf {
        self.root.join(SUBTITLES)
    }

    pub fn output_video(&self) -> PathBuf {
        self.root.join(OUTPUT_VIDEO)
    }

    pub fn is_unit(&self) -> bool {
        self.source_video().is_file()
    }

    /// Upstream artifacts synthesis needs; absent ones mean "not ready yet"
    pub fn missing_synthesis_inputs(&self) -> Vec<&'static str> {
        [(TRANSLATION, self.translation()), (DUBBED_AUDIO, self.dubbed_audio())]
            .into_iter()
            .filter(|(_, path)| !path.is_file())
            .map(|(name, _)| name)
            .collect()
    }
}

/// Which stage artifacts exist anywhere under a folder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FolderStatus {
    pub has_video: bool,
    pub has_audio: bool,
    pub has_vocals: bool,
    pub has_transcript: bool,
    pub has_translation: bool,
    pub has_tts: bool,
    pub has_combined: bool,
    pub has_output: bool,
}

impl FolderStatus {
    pub fn scan<P: AsRef<Path>>(folder: P) -> Self {
        let mut status = Self::default();

        for entry in WalkDir::new(folder).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            let is_video = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false);

            status.has_video |= is_video;
            match name.as_ref() {
                SOURCE_AUDIO => status.has_audio = true,
                VOCALS => status.has_vocals = true,
                TRANSCRIPT => status.has_transcript = true,
                TRANSLATION => status.has_translation = true,
                TTS_AUDIO => status.has_tts = true,
                DUBBED_AUDIO => status.has_combined = true,
                OUTPUT_VIDEO => status.has_output = true,
                _ => {}
            }
        }

        status
    }

    /// (label, present) pairs in pipeline order
    pub fn stages(&self) -> [(&'static str, bool); 8] {
        [
            ("video", self.has_video),
            ("audio", self.has_audio),
            ("vocals", self.has_vocals),
            ("transcript", self.has_transcript),
            ("translation", self.has_translation),
            ("tts", self.has_tts),
            ("combined", self.has_combined),
            ("output", self.has_output),
        ]
    }
}
