use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{info, debug};

use crate::config::MediaConfig;
use crate::error::{Result, DubmuxError};
use super::{EncodeStage, MediaProcessorTrait, MediaCommandBuilder, VideoGeometry, parse_probe_output};

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    encoder: MediaCommandBuilder,
    prober: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    /// Create a new media processor implementation
    pub fn new(config: MediaConfig) -> Self {
        let timeout = config.timeout_secs.map(Duration::from_secs);
        let encoder = MediaCommandBuilder::new(&config.binary_path)
            .with_threads(config.threads)
            .with_timeout(timeout);
        let prober = MediaCommandBuilder::new(&config.probe_path).with_timeout(timeout);

        Self { encoder, prober }
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn probe_dimensions(&self, video_path: &Path) -> Result<VideoGeometry> {
        if !video_path.exists() {
            return Err(DubmuxError::Probe(format!(
                "source video not found: {}",
                video_path.display()
            )));
        }

        let stdout = self
            .prober
            .probe_dimensions(video_path)
            .capture()
            .await
            .map_err(|e| DubmuxError::Probe(format!("{}: {}", video_path.display(), e)))?;

        let geometry = parse_probe_output(&stdout)?;
        debug!("Probed {}: {}x{}", video_path.display(), geometry.width, geometry.height);
        Ok(geometry)
    }

    async fn run_stage(&self, stage: &EncodeStage) -> Result<()> {
        stage.validate()?;
        info!("Running stage {}", stage);

        stage.build(&self.encoder).execute().await?;

        if !stage.output().exists() {
            return Err(DubmuxError::Media(format!(
                "{} reported success but wrote no output",
                stage.name()
            )));
        }

        info!("Stage {} completed", stage.name());
        Ok(())
    }

    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        if !video_path.exists() {
            return Err(DubmuxError::FileNotFound(video_path.display().to_string()));
        }
        info!("Extracting audio from {} to {}", video_path.display(), audio_path.display());

        let command = self.encoder.extract_audio(video_path, audio_path);
        command.execute().await?;

        info!("Audio extraction completed");
        Ok(())
    }

    async fn check_availability(&self) -> Result<()> {
        for builder in [&self.encoder, &self.prober] {
            builder
                .version_check()
                .execute()
                .await
                .map_err(|e| DubmuxError::Media(format!("Media tool not available: {}", e)))?;
        }
        info!("Media processor is available");
        Ok(())
    }

    async fn get_version_info(&self) -> Result<String> {
        debug!("Getting media processor version information");

        let version_info = self.encoder.version_check().capture().await?;
        // Extract the first line which typically contains the version
        let first_line = version_info.lines().next().unwrap_or("Unknown version");
        Ok(first_line.to_string())
    }
}
