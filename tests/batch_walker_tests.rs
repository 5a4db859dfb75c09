use assert_fs::prelude::*;
use assert_fs::TempDir;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_test::assert_ok;

use dubmux::config::Config;
use dubmux::error::{DubmuxError, Result};
use dubmux::media::{EncodeStage, MediaProcessorTrait, VideoGeometry};
use dubmux::synthesis::{SynthesisOptions, SynthesisState};
use dubmux::workflow::{FolderOutcome, Workflow};

const TRANSLATION: &str = r#"[
  {"start": 0.0, "end": 4.0, "text": "Hello there.", "translation": "你好，今天天气很好。"},
  {"start": 4.0, "end": 6.0, "text": "Bye.", "translation": "再见。"}
]"#;

/// Writes a marker file per stage instead of encoding
#[derive(Default)]
struct FakeMedia {
    fail_burn: bool,
    stages: Arc<Mutex<Vec<EncodeStage>>>,
}

impl FakeMedia {
    fn failing_burn() -> Self {
        Self {
            fail_burn: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl MediaProcessorTrait for FakeMedia {
    async fn probe_dimensions(&self, video_path: &Path) -> Result<VideoGeometry> {
        if video_path.to_string_lossy().contains("corrupt") {
            return Err(DubmuxError::Probe("no video stream".to_string()));
        }
        VideoGeometry::new(1280, 720)
    }

    async fn run_stage(&self, stage: &EncodeStage) -> Result<()> {
        self.stages.lock().unwrap().push(stage.clone());
        let marker = match stage {
            EncodeStage::SpeedAndMux(_) => "muxed",
            EncodeStage::BgmMix(_) => "mixed",
            EncodeStage::SubtitleBurn(_) if self.fail_burn => {
                return Err(DubmuxError::Media("libass missing".to_string()));
            }
            EncodeStage::SubtitleBurn(_) => "burned",
        };
        std::fs::write(stage.output(), marker)?;
        Ok(())
    }

    async fn extract_audio(&self, _video_path: &Path, audio_path: &Path) -> Result<()> {
        std::fs::write(audio_path, "pcm")?;
        Ok(())
    }

    async fn check_availability(&self) -> Result<()> {
        Ok(())
    }

    async fn get_version_info(&self) -> Result<String> {
        Ok("fake media 1.0".to_string())
    }
}

fn ready_unit(root: &TempDir, name: &str) -> PathBuf {
    let unit = root.child(name);
    unit.create_dir_all().unwrap();
    unit.child("download.mp4").write_binary(b"source").unwrap();
    unit.child("audio_combined.wav").write_binary(b"dubbed").unwrap();
    unit.child("translation.json").write_str(TRANSLATION).unwrap();
    unit.path().to_path_buf()
}

fn default_options() -> SynthesisOptions {
    SynthesisOptions::from_config(&Config::default().synthesis).unwrap()
}

fn leftover_scratch_files(folder: &Path) -> Vec<String> {
    std::fs::read_dir(folder)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with(".dubmux-"))
        .collect()
}

#[tokio::test]
async fn synthesizes_ready_folders_and_reports_the_rest() {
    let root = TempDir::new().unwrap();
    let ready = ready_unit(&root, "ep1");
    let corrupt = ready_unit(&root, "ep3-corrupt");

    let not_ready = root.child("ep2");
    not_ready.create_dir_all().unwrap();
    not_ready.child("download.mp4").write_binary(b"source").unwrap();
    not_ready.child("translation.json").write_str(TRANSLATION).unwrap();

    let stray = root.child("notes");
    stray.create_dir_all().unwrap();
    stray.child("readme.txt").write_str("not a unit").unwrap();

    let workflow = Workflow::with_processor(Config::default(), Box::new(FakeMedia::default()));
    let summary = assert_ok!(workflow.synthesize_all(root.path(), &default_options()).await);

    assert_eq!(summary.results.len(), 3);
    assert_eq!((summary.succeeded(), summary.skipped(), summary.failed()), (1, 1, 1));
    assert!(summary.message.starts_with("Synthesized all videos under"));
    assert_eq!(summary.last_output, Some(ready.join("video.mp4")));

    match &summary.results[0].outcome {
        FolderOutcome::Synthesized(report) => {
            assert_eq!(report.state, SynthesisState::Done);
            assert_eq!((report.geometry.width, report.geometry.height), (1920, 1080));
            assert_eq!(report.cue_count, 2);
            assert!(report.subtitles_burned);
            assert!(!report.bgm_mixed);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(std::fs::read_to_string(ready.join("video.mp4")).unwrap(), "burned");
    assert!(ready.join("subtitles.srt").is_file());

    assert_eq!(summary.results[1].relative, PathBuf::from("ep2"));
    assert_eq!(
        summary.results[1].outcome,
        FolderOutcome::Skipped { missing: vec!["audio_combined.wav"] }
    );
    assert!(!not_ready.child("video.mp4").path().exists());

    assert!(matches!(summary.results[2].outcome, FolderOutcome::Failed { .. }));
    assert!(!corrupt.join("video.mp4").exists());
}

#[tokio::test]
async fn burn_failure_keeps_the_unsubtitled_video() {
    let root = TempDir::new().unwrap();
    let unit = ready_unit(&root, "ep1");

    let workflow = Workflow::with_processor(Config::default(), Box::new(FakeMedia::failing_burn()));
    let summary = assert_ok!(workflow.synthesize_all(root.path(), &default_options()).await);

    match &summary.results[0].outcome {
        FolderOutcome::Synthesized(report) => assert!(!report.subtitles_burned),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(std::fs::read_to_string(unit.join("video.mp4")).unwrap(), "muxed");
    assert!(leftover_scratch_files(&unit).is_empty());
}

#[tokio::test]
async fn bgm_mix_produces_the_final_video() {
    let root = TempDir::new().unwrap();
    let unit = ready_unit(&root, "ep1");
    let bgm = root.child("bgm.mp3");
    bgm.write_binary(b"music").unwrap();

    let mut options = default_options();
    options.subtitles = false;
    options.bgm_path = Some(bgm.path().to_path_buf());

    let media = FakeMedia::default();
    let workflow = Workflow::with_processor(Config::default(), Box::new(media));
    let summary = assert_ok!(workflow.synthesize_all(root.path(), &options).await);

    match &summary.results[0].outcome {
        FolderOutcome::Synthesized(report) => {
            assert!(report.bgm_mixed);
            assert!(!report.subtitles_burned);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(std::fs::read_to_string(unit.join("video.mp4")).unwrap(), "mixed");
    assert!(leftover_scratch_files(&unit).is_empty());
}

#[tokio::test]
async fn speed_mux_stage_gets_options_and_resolved_size() {
    let root = TempDir::new().unwrap();
    ready_unit(&root, "ep1");

    let mut options = default_options();
    options.subtitles = false;
    options.speed_up = 1.25;
    options.fps = 25;
    options.watermark_path = Some(root.path().join("missing-logo.png"));

    let media = FakeMedia::default();
    let stages = Arc::clone(&media.stages);
    let workflow = Workflow::with_processor(Config::default(), Box::new(media));
    assert_ok!(workflow.synthesize_all(root.path(), &options).await);

    let stages = stages.lock().unwrap();
    assert_eq!(stages.len(), 1);
    match &stages[0] {
        EncodeStage::SpeedAndMux(stage) => {
            assert_eq!(stage.watermark, None);
            assert_eq!(stage.speed_up, 1.25);
            assert_eq!(stage.fps, 25);
            assert_eq!((stage.geometry.width, stage.geometry.height), (1920, 1080));
        }
        other => panic!("unexpected stage {:?}", other),
    }
}

#[tokio::test]
async fn status_lists_unit_folders_relative_to_root() {
    let root = TempDir::new().unwrap();
    let unit = ready_unit(&root, "season1/ep1");
    std::fs::write(unit.join("audio_vocals.wav"), "v").unwrap();

    let workflow = Workflow::with_processor(Config::default(), Box::new(FakeMedia::default()));
    let statuses = assert_ok!(workflow.status(root.path()));

    assert_eq!(statuses.len(), 1);
    let (relative, status) = &statuses[0];
    assert_eq!(relative, &PathBuf::from("season1/ep1"));
    assert!(status.has_video && status.has_vocals && status.has_translation && status.has_combined);
    assert!(!status.has_output);
}
