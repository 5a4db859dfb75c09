use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, DubmuxError};
use super::commands::{escape_filter_path, MediaCommand, MediaCommandBuilder};
use super::geometry::{FontMetrics, VideoGeometry};

/// Re-time the source video, mux the dubbed audio and optionally watermark
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedMuxStage {
    pub source_video: PathBuf,
    pub dubbed_audio: PathBuf,
    pub watermark: Option<PathBuf>,
    pub speed_up: f64,
    pub fps: u32,
    pub geometry: VideoGeometry,
    pub output: PathBuf,
}

/// Mix background music under the current artifact's audio
#[derive(Debug, Clone, PartialEq)]
pub struct BgmMixStage {
    pub video: PathBuf,
    pub bgm: PathBuf,
    pub bgm_volume: f64,
    pub video_volume: f64,
    pub output: PathBuf,
}

/// Burn an SRT track into the video frames
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleBurnStage {
    pub video: PathBuf,
    pub subtitles: PathBuf,
    pub style: SubtitleStyle,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleStyle {
    pub font_name: String,
    pub font_size: u32,
    pub outline: u32,
    pub fonts_dir: Option<PathBuf>,
}

impl SubtitleStyle {
    pub fn new<S: Into<String>>(font_name: S, metrics: FontMetrics, fonts_dir: Option<PathBuf>) -> Self {
        Self {
            font_name: font_name.into(),
            font_size: metrics.font_size,
            outline: metrics.outline,
            fonts_dir,
        }
    }

    /// ASS override style: white fill, black outline
    pub fn force_style(&self) -> String {
        format!(
            "FontName={},FontSize={},PrimaryColour=&HFFFFFF,OutlineColour=&H000000,Outline={},WrapStyle=2",
            self.font_name, self.font_size, self.outline
        )
    }
}

impl SubtitleBurnStage {
    pub fn filter(&self) -> String {
        let mut filter = format!("subtitles={}", escape_filter_path(&self.subtitles));
        if let Some(fonts_dir) = &self.style.fonts_dir {
            filter.push_str(&format!(":fontsdir={}", escape_filter_path(fonts_dir)));
        }
        filter.push_str(&format!(":force_style='{}'", self.style.force_style()));
        filter
    }
}

/// One external encode invocation: input files, filter description, output file
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeStage {
    SpeedAndMux(SpeedMuxStage),
    BgmMix(BgmMixStage),
    SubtitleBurn(SubtitleBurnStage),
}

impl EncodeStage {
    pub fn name(&self) -> &'static str {
        match self {
            EncodeStage::SpeedAndMux(_) => "speed-and-mux",
            EncodeStage::BgmMix(_) => "bgm-mix",
            EncodeStage::SubtitleBurn(_) => "subtitle-burn",
        }
    }

    /// Files the stage reads
    pub fn inputs(&self) -> Vec<&Path> {
        match self {
            EncodeStage::SpeedAndMux(s) => {
                let mut inputs = vec![s.source_video.as_path(), s.dubbed_audio.as_path()];
                if let Some(watermark) = &s.watermark {
                    inputs.push(watermark.as_path());
                }
                inputs
            }
            EncodeStage::BgmMix(s) => vec![s.video.as_path(), s.bgm.as_path()],
            EncodeStage::SubtitleBurn(s) => {
                let mut inputs = vec![s.video.as_path(), s.subtitles.as_path()];
                if let Some(fonts_dir) = &s.style.fonts_dir {
                    inputs.push(fonts_dir.as_path());
                }
                inputs
            }
        }
    }

    pub fn output(&self) -> &Path {
        match self {
            EncodeStage::SpeedAndMux(s) => &s.output,
            EncodeStage::BgmMix(s) => &s.output,
            EncodeStage::SubtitleBurn(s) => &s.output,
        }
    }

    /// Check referenced files before handing them to the encoder, which
    /// would otherwise fail with an opaque message
    pub fn validate(&self) -> Result<()> {
        for input in self.inputs() {
            if !input.exists() {
                return Err(DubmuxError::FileNotFound(format!(
                    "{} (input of {})",
                    input.display(),
                    self.name()
                )));
            }
        }

        if let Some(parent) = self.output().parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(DubmuxError::FileNotFound(format!(
                    "{} (output directory of {})",
                    parent.display(),
                    self.name()
                )));
            }
        }

        if let EncodeStage::SpeedAndMux(s) = self {
            if !(s.speed_up.is_finite() && s.speed_up > 0.0) {
                return Err(DubmuxError::Config(format!("invalid speed factor {}", s.speed_up)));
            }
        }
        Ok(())
    }

    pub fn build(&self, builder: &MediaCommandBuilder) -> MediaCommand {
        match self {
            EncodeStage::SpeedAndMux(s) => builder.speed_and_mux(s),
            EncodeStage::BgmMix(s) => builder.mix_bgm(s),
            EncodeStage::SubtitleBurn(s) => builder.burn_subtitles(s),
        }
    }
}

impl fmt::Display for EncodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.name(), self.output().display())
    }
}
