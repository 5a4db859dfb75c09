use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Result, DubmuxError};
use crate::layout::{FolderLayout, FolderStatus};
use crate::media::{MediaProcessorFactory, MediaProcessorTrait, Resolution, VideoGeometry};
use crate::separation::{separate_folder, SeparationOutcome, SeparatorCache, SeparatorKey, SeparatorLoader};
use crate::subtitle::{write_srt, PunctuationSegmenter, SegmentationPolicy};
use crate::synthesis::{PipelineRun, SynthesisOptions, SynthesisReport, Synthesizer};
use crate::transcript::load_transcript;

/// What happened to one unit folder during a batch
#[derive(Debug, Clone, PartialEq)]
pub enum FolderOutcome {
    Synthesized(SynthesisReport),
    Separated(SeparationOutcome),
    /// Upstream artifacts not produced yet
    Skipped { missing: Vec<&'static str> },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FolderResult {
    pub folder: PathBuf,
    /// Folder path relative to the batch root, for display
    pub relative: PathBuf,
    pub outcome: FolderOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub message: String,
    pub last_output: Option<PathBuf>,
    pub results: Vec<FolderResult>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, FolderOutcome::Synthesized(_) | FolderOutcome::Separated(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, FolderOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, FolderOutcome::Failed { .. }))
            .count()
    }
}

pub struct Workflow {
    config: Config,
    media: Box<dyn MediaProcessorTrait>,
    segmenter: Box<dyn SegmentationPolicy>,
    separators: SeparatorCache,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        config.synthesis.validate()?;
        let media = MediaProcessorFactory::create_processor(config.media.clone());
        Ok(Self::with_processor(config, media))
    }

    /// Build a workflow around an existing media processor
    pub fn with_processor(config: Config, media: Box<dyn MediaProcessorTrait>) -> Self {
        let segmenter = Box::new(PunctuationSegmenter::from_config(&config.segmenter));
        let timeout = config.media.timeout_secs.map(Duration::from_secs);
        let separators = SeparatorCache::new(
            SeparatorLoader::new(config.separation.binary_path.clone(), timeout)
                .with_temp_root(config.media.temp_dir.clone()),
        );

        Self {
            config,
            media,
            segmenter,
            separators,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fail early when ffmpeg/ffprobe cannot be run
    pub async fn check_tools(&self) -> Result<String> {
        self.media.check_availability().await?;
        self.media.get_version_info().await
    }

    /// Synthesize every ready unit folder under `root`.
    ///
    /// Folders missing upstream artifacts are skipped; a failing folder is
    /// recorded and the walk moves on.
    pub async fn synthesize_all<P: AsRef<Path>>(
        &self,
        root: P,
        options: &SynthesisOptions,
    ) -> Result<BatchSummary> {
        let root = root.as_ref();
        info!("Synthesizing videos under {}", root.display());

        let mut options = options.clone();
        if let Some(watermark) = &options.watermark_path {
            if !watermark.is_file() {
                warn!("Watermark {} not found, continuing without it", watermark.display());
                options.watermark_path = None;
            }
        }

        let units = find_units(root)?;
        info!("Found {} unit folders", units.len());

        let mut results = Vec::with_capacity(units.len());
        let mut last_output = None;

        for folder in units {
            let layout = FolderLayout::new(&folder);
            let missing = layout.missing_synthesis_inputs();
            let outcome = if !missing.is_empty() {
                debug!("Skipping {}: missing {}", folder.display(), missing.join(", "));
                FolderOutcome::Skipped { missing }
            } else {
                match self.synthesize_folder(&folder, &options).await {
                    Ok(report) => {
                        info!("Synthesized {}", report.output.display());
                        last_output = Some(report.output.clone());
                        FolderOutcome::Synthesized(report)
                    }
                    Err(e) => {
                        warn!("Failed to synthesize {}: {}", folder.display(), e);
                        FolderOutcome::Failed { error: e.to_string() }
                    }
                }
            };
            results.push(folder_result(root, folder, outcome));
        }

        let mut summary = BatchSummary {
            message: String::new(),
            last_output,
            results,
        };
        summary.message = format!(
            "Synthesized all videos under {} ({} done, {} not ready, {} failed)",
            root.display(),
            summary.succeeded(),
            summary.skipped(),
            summary.failed()
        );
        Ok(summary)
    }

    /// Synthesize one unit folder
    pub async fn synthesize_folder<P: AsRef<Path>>(
        &self,
        folder: P,
        options: &SynthesisOptions,
    ) -> Result<SynthesisReport> {
        let layout = FolderLayout::new(folder);
        let run = PipelineRun::for_folder(&layout, options.clone());

        Synthesizer::new(self.media.as_ref(), self.segmenter.as_ref())
            .with_temp_root(self.config.media.temp_dir.clone())
            .synthesize(&run)
            .await
    }

    /// Separate vocals from accompaniment in every unit folder under `root`.
    ///
    /// The separator stays loaded across folders. The first failure
    /// releases it and aborts the walk.
    pub async fn separate_all<P: AsRef<Path>>(&self, root: P) -> Result<BatchSummary> {
        let root = root.as_ref();
        let key = SeparatorKey::from_config(&self.config.separation);
        info!("Separating audio under {} with model {}", root.display(), key.model_name);

        let mut results = Vec::new();
        for folder in find_units(root)? {
            match separate_folder(self.media.as_ref(), &self.separators, &key, &folder).await {
                Ok(outcome) => results.push(folder_result(root, folder, FolderOutcome::Separated(outcome))),
                Err(e) => {
                    error!("Separation failed for {}: {}", folder.display(), e);
                    self.separators.release().await;
                    return Err(e);
                }
            }
        }

        let last_output = results.iter().rev().find_map(|r| match &r.outcome {
            FolderOutcome::Separated(
                SeparationOutcome::Separated { vocals, .. }
                | SeparationOutcome::AlreadySeparated { vocals, .. },
            ) => Some(vocals.clone()),
            _ => None,
        });

        Ok(BatchSummary {
            message: format!("Separated all audio under {} ({} folders)", root.display(), results.len()),
            last_output,
            results,
        })
    }

    /// Drop the loaded separator, if any
    pub async fn release_separator(&self) {
        self.separators.release().await;
    }

    /// Stage artifact presence for every unit folder under `root`
    pub fn status<P: AsRef<Path>>(&self, root: P) -> Result<Vec<(PathBuf, FolderStatus)>> {
        let root = root.as_ref();
        Ok(find_units(root)?
            .into_iter()
            .map(|folder| {
                let status = FolderStatus::scan(&folder);
                (relative_to(root, &folder), status)
            })
            .collect())
    }

    /// Probe a video and the geometry it would be encoded at
    pub async fn probe<P: AsRef<Path>>(
        &self,
        video: P,
        resolution: Resolution,
    ) -> Result<(VideoGeometry, VideoGeometry)> {
        let source = self.media.probe_dimensions(video.as_ref()).await?;
        Ok((source, source.resolve(resolution)))
    }

    /// Segment a transcript and write it as SRT; returns the cue count
    pub async fn generate_subtitles<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        transcript: P,
        output: Q,
        speed_up: f64,
    ) -> Result<usize> {
        let entries = load_transcript(transcript).await?;
        let cues = self.segmenter.segment(&entries);
        write_srt(&cues, output, speed_up, self.config.synthesis.max_line_chars).await?;
        Ok(cues.len())
    }
}

/// Unit folders under `root`, in file-name order
fn find_units(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(DubmuxError::FileNotFound(root.display().to_string()));
    }

    Ok(WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .filter(|dir| FolderLayout::new(dir).is_unit())
        .collect())
}

fn relative_to(root: &Path, folder: &Path) -> PathBuf {
    pathdiff::diff_paths(folder, root).unwrap_or_else(|| folder.to_path_buf())
}

fn folder_result(root: &Path, folder: PathBuf, outcome: FolderOutcome) -> FolderResult {
    FolderResult {
        relative: relative_to(root, &folder),
        folder,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaProcessorTrait;

    fn write(path: &Path, contents: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_find_units_sorted_and_nested() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("b/download.mp4"), b"v");
        write(&dir.path().join("a/x/download.mp4"), b"v");
        write(&dir.path().join("c/notes.txt"), b"n");

        let units = find_units(dir.path()).unwrap();
        let relative: Vec<_> = units.iter().map(|u| relative_to(dir.path(), u)).collect();
        assert_eq!(relative, vec![PathBuf::from("a/x"), PathBuf::from("b")]);
    }

    #[test]
    fn test_find_units_missing_root() {
        let result = find_units(Path::new("/nonexistent/dubmux-root"));
        assert!(matches!(result, Err(DubmuxError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_not_ready_folder_never_reaches_media() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("ep1/download.mp4"), b"v");
        write(&dir.path().join("ep1/translation.json"), b"[]");

        let mut media = MockMediaProcessorTrait::new();
        media.expect_probe_dimensions().never();
        media.expect_run_stage().never();
        let workflow = Workflow::with_processor(Config::default(), Box::new(media));
        let options = SynthesisOptions::from_config(&Config::default().synthesis).unwrap();

        let summary = workflow.synthesize_all(dir.path(), &options).await.unwrap();
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.last_output, None);
        assert_eq!(
            summary.results[0].outcome,
            FolderOutcome::Skipped { missing: vec!["audio_combined.wav"] }
        );
    }

    #[tokio::test]
    async fn test_probe_resolves_geometry() {
        let mut media = MockMediaProcessorTrait::new();
        media
            .expect_probe_dimensions()
            .returning(|_| VideoGeometry::new(1280, 720));
        let workflow = Workflow::with_processor(Config::default(), Box::new(media));

        let (source, target) = workflow
            .probe("download.mp4", "1080p".parse().unwrap())
            .await
            .unwrap();
        assert_eq!((source.width, source.height), (1280, 720));
        assert_eq!((target.width, target.height), (1920, 1080));
    }

    #[tokio::test]
    async fn test_generate_subtitles() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = dir.path().join("translation.json");
        write(
            &transcript,
            br#"[{"start": 0.0, "end": 3.0, "text": "hi", "translation": "hello world"}]"#,
        );

        let workflow = Workflow::with_processor(Config::default(), Box::new(MockMediaProcessorTrait::new()));
        let output = dir.path().join("subtitles.srt");
        let count = workflow.generate_subtitles(&transcript, &output, 1.0).await.unwrap();

        assert_eq!(count, 1);
        let srt = std::fs::read_to_string(&output).unwrap();
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:03,000\n"));
    }

    #[tokio::test]
    async fn test_separator_loader_gets_media_temp_dir() {
        let mut config = Config::default();
        config.media.temp_dir = Some(PathBuf::from("/var/tmp/dubmux"));
        let workflow = Workflow::with_processor(config, Box::new(MockMediaProcessorTrait::new()));

        assert_eq!(
            workflow.separators.loader().temp_root(),
            Some(Path::new("/var/tmp/dubmux"))
        );
    }

    #[tokio::test]
    async fn test_separate_all_aborts_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a/download.mp4"), b"v");
        write(&dir.path().join("a/audio.wav"), b"pcm");
        write(&dir.path().join("b/download.mp4"), b"v");

        let mut config = Config::default();
        config.separation.binary_path = "/nonexistent/demucs".to_string();
        let mut media = MockMediaProcessorTrait::new();
        // folder b is never reached
        media.expect_extract_audio().never();
        let workflow = Workflow::with_processor(config, Box::new(media));

        let result = workflow.separate_all(dir.path()).await;
        assert!(matches!(result, Err(DubmuxError::Separation(_))));
        assert!(!workflow.separators.is_loaded().await);
    }
}
