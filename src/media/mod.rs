// Modular media processing architecture
//
// This module provides a clean abstraction over media processing operations:
// - Processor: ffmpeg/ffprobe backed implementation
// - Commands: Command builders and abstractions
// - Stages: typed encode invocations (inputs, filter, output)
// - Geometry: probe results and output size/font resolution

pub mod commands;
pub mod geometry;
pub mod processor;
pub mod stages;

use async_trait::async_trait;
use std::path::Path;

pub use commands::*;
pub use geometry::*;
pub use processor::*;
pub use stages::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Main trait for media processing operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Read the pixel dimensions of the first video stream
    async fn probe_dimensions(&self, video_path: &Path) -> Result<VideoGeometry>;

    /// Validate and run one encode stage, blocking until the tool exits
    async fn run_stage(&self, stage: &EncodeStage) -> Result<()>;

    /// Extract audio from video
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()>;

    /// Check if media processor is available
    async fn check_availability(&self) -> Result<()>;

    /// Get media processor version information
    async fn get_version_info(&self) -> Result<String>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config))
    }
}
