//! Per-folder synthesis: subtitle track, speed change and mux, optional
//! background music, optional subtitle burn-in.
//!
//! Speed/mux and background music are essential: if either fails the run
//! fails and any earlier `video.mp4` is left untouched. Subtitle burn-in is
//! cosmetic: a failure is logged and the un-subtitled video is kept.

use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::SynthesisConfig;
use crate::error::{Result, DubmuxError};
use crate::layout::FolderLayout;
use crate::media::{
    BgmMixStage, EncodeStage, MediaProcessorTrait, Resolution, SpeedMuxStage, SubtitleBurnStage,
    SubtitleStyle, VideoGeometry,
};
use crate::subtitle::{write_srt, SegmentationPolicy};
use crate::transcript::load_transcript;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisState {
    NotStarted,
    SpeedAndMux,
    BgmMix,
    SubtitleBurn,
    Done,
    Failed,
}

impl fmt::Display for SynthesisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SynthesisState::NotStarted => "not started",
            SynthesisState::SpeedAndMux => "speed and mux",
            SynthesisState::BgmMix => "bgm mix",
            SynthesisState::SubtitleBurn => "subtitle burn",
            SynthesisState::Done => "done",
            SynthesisState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Options fixed for the duration of one run
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOptions {
    pub subtitles: bool,
    pub speed_up: f64,
    pub fps: u32,
    pub resolution: Resolution,
    pub bgm_path: Option<PathBuf>,
    pub bgm_volume: f64,
    pub video_volume: f64,
    pub watermark_path: Option<PathBuf>,
    pub max_line_chars: usize,
    pub font_name: String,
    pub fonts_dir: Option<PathBuf>,
}

impl SynthesisOptions {
    pub fn from_config(config: &SynthesisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            subtitles: config.subtitles,
            speed_up: config.speed_up,
            fps: config.fps,
            resolution: config.resolution.parse()?,
            bgm_path: config.bgm_path.clone(),
            bgm_volume: config.bgm_volume,
            video_volume: config.video_volume,
            watermark_path: config.watermark_path.clone(),
            max_line_chars: config.max_line_chars,
            font_name: config.font_name.clone(),
            fonts_dir: config.fonts_dir.clone(),
        })
    }
}

/// One folder's worth of synthesis inputs and outputs
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    pub folder: PathBuf,
    pub source_video: PathBuf,
    pub dubbed_audio: PathBuf,
    pub transcript: PathBuf,
    pub subtitles: PathBuf,
    pub output: PathBuf,
    pub options: SynthesisOptions,
}

impl PipelineRun {
    pub fn for_folder(layout: &FolderLayout, options: SynthesisOptions) -> Self {
        Self {
            folder: layout.root().to_path_buf(),
            source_video: layout.source_video(),
            dubbed_audio: layout.dubbed_audio(),
            transcript: layout.translation(),
            subtitles: layout.subtitles(),
            output: layout.output_video(),
            options,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisReport {
    pub output: PathBuf,
    pub state: SynthesisState,
    pub geometry: VideoGeometry,
    pub cue_count: usize,
    pub bgm_mixed: bool,
    pub subtitles_burned: bool,
}

pub struct Synthesizer<'a> {
    media: &'a dyn MediaProcessorTrait,
    segmenter: &'a dyn SegmentationPolicy,
    temp_root: Option<PathBuf>,
}

impl<'a> Synthesizer<'a> {
    pub fn new(media: &'a dyn MediaProcessorTrait, segmenter: &'a dyn SegmentationPolicy) -> Self {
        Self {
            media,
            segmenter,
            temp_root: None,
        }
    }

    /// Place subtitle burn scratch directories under `root` instead of the system temp dir
    pub fn with_temp_root(mut self, root: Option<PathBuf>) -> Self {
        self.temp_root = root;
        self
    }

    pub async fn synthesize(&self, run: &PipelineRun) -> Result<SynthesisReport> {
        let options = &run.options;
        info!("Synthesizing video in {}", run.folder.display());

        let entries = load_transcript(&run.transcript).await?;
        let cues = self.segmenter.segment(&entries);
        write_srt(&cues, &run.subtitles, options.speed_up, options.max_line_chars).await?;

        let source = self.media.probe_dimensions(&run.source_video).await?;
        let geometry = source.resolve(options.resolution);
        info!(
            "Resolved output size {} from source {}x{}",
            geometry.size_arg(),
            source.width,
            source.height
        );

        let mut state = SynthesisState::NotStarted;
        let artifact = match self.run_essential_stages(run, geometry, &mut state).await {
            Ok(artifact) => artifact,
            Err(e) => {
                let failed_during = state;
                state = SynthesisState::Failed;
                error!("Synthesis {} during {}: {}", state, failed_during, e);
                return Err(e);
            }
        };
        publish(artifact, &run.output)?;

        let mut subtitles_burned = false;
        if options.subtitles {
            state = SynthesisState::SubtitleBurn;
            match self.burn_subtitles(run, geometry).await {
                Ok(()) => subtitles_burned = true,
                Err(e) => warn!("{} failed, keeping video without subtitles: {}", state, e),
            }
        }

        state = SynthesisState::Done;
        info!("Synthesis {} for {}", state, run.output.display());

        Ok(SynthesisReport {
            output: run.output.clone(),
            state,
            geometry,
            cue_count: cues.len(),
            bgm_mixed: options.bgm_path.is_some(),
            subtitles_burned,
        })
    }

    async fn run_essential_stages(
        &self,
        run: &PipelineRun,
        geometry: VideoGeometry,
        state: &mut SynthesisState,
    ) -> Result<NamedTempFile> {
        let options = &run.options;

        *state = SynthesisState::SpeedAndMux;
        let muxed = scratch_file(&run.folder)?;
        self.media
            .run_stage(&EncodeStage::SpeedAndMux(SpeedMuxStage {
                source_video: run.source_video.clone(),
                dubbed_audio: run.dubbed_audio.clone(),
                watermark: options.watermark_path.clone(),
                speed_up: options.speed_up,
                fps: options.fps,
                geometry,
                output: muxed.path().to_path_buf(),
            }))
            .await?;

        let mut artifact = muxed;

        if let Some(bgm) = &options.bgm_path {
            *state = SynthesisState::BgmMix;
            let mixed = scratch_file(&run.folder)?;
            self.media
                .run_stage(&EncodeStage::BgmMix(BgmMixStage {
                    video: artifact.path().to_path_buf(),
                    bgm: bgm.clone(),
                    bgm_volume: options.bgm_volume,
                    video_volume: options.video_volume,
                    output: mixed.path().to_path_buf(),
                }))
                .await?;
            // dropping the previous artifact deletes it
            artifact = mixed;
        }

        Ok(artifact)
    }

    /// Burn subtitles using private copies inside a scratch directory that
    /// is removed however this returns.
    async fn burn_subtitles(&self, run: &PipelineRun, geometry: VideoGeometry) -> Result<()> {
        let scratch = self.scratch_dir()?;
        let video = scratch.path().join(format!("video_{}.mp4", Uuid::new_v4().simple()));
        let subtitles = scratch.path().join(format!("subtitles_{}.srt", Uuid::new_v4().simple()));
        let burned = scratch.path().join(format!("burned_{}.mp4", Uuid::new_v4().simple()));

        tokio::fs::copy(&run.output, &video).await?;
        tokio::fs::copy(&run.subtitles, &subtitles).await?;

        let options = &run.options;
        self.media
            .run_stage(&EncodeStage::SubtitleBurn(SubtitleBurnStage {
                video,
                subtitles,
                style: SubtitleStyle::new(
                    options.font_name.clone(),
                    geometry.font_metrics(),
                    options.fonts_dir.clone(),
                ),
                output: burned.clone(),
            }))
            .await?;

        if !burned.is_file() {
            return Err(DubmuxError::Media(format!(
                "subtitle burn produced no output at {}",
                burned.display()
            )));
        }

        let staged = scratch_file(&run.folder)?;
        tokio::fs::copy(&burned, staged.path()).await?;
        publish(staged, &run.output)?;

        info!("Subtitles burned into {}", run.output.display());
        Ok(())
    }

    fn scratch_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("dubmux-burn-");
        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

/// Temp file beside the final artifact so publishing is a same-filesystem rename
fn scratch_file(folder: &Path) -> Result<NamedTempFile> {
    let file = tempfile::Builder::new()
        .prefix(".dubmux-")
        .suffix(".mp4")
        .tempfile_in(folder)?;
    Ok(file)
}

/// Atomically replace `target` with the temp file
fn publish(artifact: NamedTempFile, target: &Path) -> Result<()> {
    artifact.persist(target).map_err(|e| DubmuxError::Io(e.error))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(target, std::fs::Permissions::from_mode(0o644))?;
    }
    Ok(())
}
