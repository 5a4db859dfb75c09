use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, DubmuxError};
use crate::media::Resolution;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    #[serde(default)]
    pub separation: SeparationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary
    pub probe_path: String,
    /// Encoder thread count passed as `-threads`
    pub threads: u32,
    /// Upper bound for a single encode invocation; unset means wait forever
    pub timeout_secs: Option<u64>,
    /// Directory for scoped scratch space (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Burn subtitles into the final video
    pub subtitles: bool,
    /// Playback speed-up factor applied to video and audio
    pub speed_up: f64,
    /// Output frame rate
    pub fps: u32,
    /// Output resolution label, e.g. "1080p"
    pub resolution: String,
    /// Optional background music mixed under the dubbed audio
    pub bgm_path: Option<PathBuf>,
    /// Gain applied to the background music
    pub bgm_volume: f64,
    /// Gain applied to the dubbed audio when mixing
    pub video_volume: f64,
    /// Optional watermark image overlaid bottom-right
    pub watermark_path: Option<PathBuf>,
    /// Maximum characters per subtitle line
    pub max_line_chars: usize,
    /// Font family used when burning subtitles
    pub font_name: String,
    /// Directory containing the subtitle font
    pub fonts_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Characters that may end a subtitle cue
    pub punctuation: String,
    /// Characters a sentence must accumulate before a split is allowed
    pub min_sentence_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    /// Path to the demucs binary
    pub binary_path: String,
    /// Separation model name
    pub model_name: String,
    /// Device: "auto", "cpu" or "cuda"
    pub device: String,
    /// Number of random shifts for equivariant stabilization
    pub shifts: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            probe_path: "ffprobe".to_string(),
            threads: 2,
            timeout_secs: None,
            temp_dir: None,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            subtitles: true,
            speed_up: 1.0,
            fps: 30,
            resolution: "1080p".to_string(),
            bgm_path: None,
            bgm_volume: 0.5,
            video_volume: 1.0,
            watermark_path: None,
            max_line_chars: 30,
            font_name: "SimHei".to_string(),
            fonts_dir: None,
        }
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            punctuation: "，；：。？！\n”".to_string(),
            min_sentence_chars: 5,
        }
    }
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            binary_path: "demucs".to_string(),
            model_name: "htdemucs_ft".to_string(),
            device: "auto".to_string(),
            shifts: 5,
        }
    }
}

impl SynthesisConfig {
    /// Reject option combinations that would only fail later inside ffmpeg
    pub fn validate(&self) -> Result<()> {
        if !(self.speed_up.is_finite() && self.speed_up > 0.0) {
            return Err(DubmuxError::Config(format!(
                "speed_up must be positive, got {}",
                self.speed_up
            )));
        }
        if self.fps == 0 {
            return Err(DubmuxError::Config("fps must be positive".to_string()));
        }
        if self.bgm_volume < 0.0 || self.video_volume < 0.0 {
            return Err(DubmuxError::Config("volumes must not be negative".to_string()));
        }
        if self.max_line_chars == 0 {
            return Err(DubmuxError::Config("max_line_chars must be positive".to_string()));
        }
        self.resolution.parse::<Resolution>()?;
        Ok(())
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DubmuxError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| DubmuxError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DubmuxError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| DubmuxError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [synthesis]
            speed_up = 1.25
            subtitles = false
            "#,
        )
        .unwrap();

        assert_eq!(config.synthesis.speed_up, 1.25);
        assert!(!config.synthesis.subtitles);
        assert_eq!(config.synthesis.fps, 30);
        assert_eq!(config.media.binary_path, "ffmpeg");
        assert_eq!(config.segmenter.min_sentence_chars, 5);
        assert_eq!(config.separation.model_name, "htdemucs_ft");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.synthesis.bgm_path = Some(PathBuf::from("music/bgm.mp3"));
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.synthesis.bgm_path, Some(PathBuf::from("music/bgm.mp3")));
        assert_eq!(loaded.segmenter.punctuation, config.segmenter.punctuation);
    }

    #[test]
    fn test_validate_rejects_bad_speed() {
        let mut synthesis = SynthesisConfig::default();
        assert!(synthesis.validate().is_ok());

        synthesis.speed_up = 0.0;
        assert!(synthesis.validate().is_err());

        synthesis.speed_up = -1.0;
        assert!(synthesis.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_resolution() {
        let synthesis = SynthesisConfig {
            resolution: "hd".to_string(),
            ..SynthesisConfig::default()
        };
        assert!(synthesis.validate().is_err());
    }
}
