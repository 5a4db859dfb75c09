use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, info};

use crate::config::SeparationConfig;
use crate::error::{Result, DubmuxError};
use crate::layout::FolderLayout;
use crate::media::{MediaCommand, MediaProcessorTrait};
use crate::resource::{ResourceCache, ResourceLoader};

/// Parameters a loaded separator is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeparatorKey {
    pub model_name: String,
    pub device: String,
    pub shifts: u32,
}

impl SeparatorKey {
    pub fn from_config(config: &SeparationConfig) -> Self {
        Self {
            model_name: config.model_name.clone(),
            device: config.device.clone(),
            shifts: config.shifts,
        }
    }
}

/// A ready-to-use demucs separator
#[derive(Debug)]
pub struct Separator {
    binary_path: String,
    key: SeparatorKey,
    timeout: Option<Duration>,
    temp_root: Option<PathBuf>,
}

impl Separator {
    pub fn key(&self) -> &SeparatorKey {
        &self.key
    }

    /// Two-stem separation command writing `<out_dir>/<model>/<stem>/{vocals,no_vocals}.wav`
    pub fn command(&self, audio_path: &Path, out_dir: &Path) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.binary_path, "Audio separation")
            .timeout(self.timeout)
            .arg("-n")
            .arg(&self.key.model_name)
            .arg("--two-stems=vocals")
            .arg("--shifts")
            .arg(self.key.shifts.to_string());

        // demucs picks cuda when available if no device is given
        if self.key.device != "auto" {
            cmd = cmd.arg("-d").arg(&self.key.device);
        }

        cmd.arg("-o")
            .arg(out_dir.to_string_lossy().to_string())
            .output(audio_path)
    }

    pub async fn separate(&self, audio_path: &Path, vocals: &Path, instruments: &Path) -> Result<()> {
        let stem = audio_path
            .file_stem()
            .ok_or_else(|| DubmuxError::Separation(format!("invalid audio path {}", audio_path.display())))?
            .to_os_string();

        let scratch = self.scratch_dir()?;
        self.command(audio_path, scratch.path())
            .execute()
            .await
            .map_err(|e| DubmuxError::Separation(e.to_string()))?;

        let stems = scratch.path().join(&self.key.model_name).join(stem);
        move_file(&stems.join("vocals.wav"), vocals).await?;
        move_file(&stems.join("no_vocals.wav"), instruments).await?;
        Ok(())
    }

    /// Scratch directory for raw stems, under `media.temp_dir` when set
    fn scratch_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("dubmux-separate-");
        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

/// Rename, falling back to copy when the scratch dir is on another filesystem
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if !from.is_file() {
        return Err(DubmuxError::Separation(format!(
            "separator did not produce {}",
            from.display()
        )));
    }
    if fs::rename(from, to).await.is_err() {
        fs::copy(from, to).await?;
        fs::remove_file(from).await?;
    }
    Ok(())
}

pub struct SeparatorLoader {
    binary_path: String,
    timeout: Option<Duration>,
    temp_root: Option<PathBuf>,
}

impl SeparatorLoader {
    pub fn new<S: Into<String>>(binary_path: S, timeout: Option<Duration>) -> Self {
        Self {
            binary_path: binary_path.into(),
            timeout,
            temp_root: None,
        }
    }

    /// Place separator scratch directories under `root` instead of the system temp dir
    pub fn with_temp_root(mut self, root: Option<PathBuf>) -> Self {
        self.temp_root = root;
        self
    }

    pub fn temp_root(&self) -> Option<&Path> {
        self.temp_root.as_deref()
    }
}

#[async_trait]
impl ResourceLoader for SeparatorLoader {
    type Key = SeparatorKey;
    type Handle = Separator;

    async fn load(&self, key: &SeparatorKey) -> Result<Separator> {
        MediaCommand::new(&self.binary_path, "Separator availability check")
            .timeout(self.timeout)
            .arg("--help")
            .execute()
            .await
            .map_err(|e| DubmuxError::Separation(format!("separator unavailable: {}", e)))?;

        Ok(Separator {
            binary_path: self.binary_path.clone(),
            key: key.clone(),
            timeout: self.timeout,
            temp_root: self.temp_root.clone(),
        })
    }

    fn teardown(&self, handle: Arc<Separator>) {
        debug!("Separator for model {} released", handle.key.model_name);
    }
}

pub type SeparatorCache = ResourceCache<SeparatorLoader>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeparationOutcome {
    /// No source video in the folder
    NoSource,
    /// Stems were already on disk
    AlreadySeparated { vocals: PathBuf, instruments: PathBuf },
    Separated { vocals: PathBuf, instruments: PathBuf },
}

/// Split one unit folder's audio into vocals and accompaniment.
///
/// Extracts `audio.wav` first when needed. A separator failure releases the
/// cached separator before the error is returned.
pub async fn separate_folder(
    media: &dyn MediaProcessorTrait,
    cache: &SeparatorCache,
    key: &SeparatorKey,
    folder: &Path,
) -> Result<SeparationOutcome> {
    let layout = FolderLayout::new(folder);
    if !layout.is_unit() {
        return Ok(SeparationOutcome::NoSource);
    }

    let vocals = layout.vocals();
    let instruments = layout.instruments();
    if vocals.is_file() && instruments.is_file() {
        info!("Audio already separated: {}", folder.display());
        return Ok(SeparationOutcome::AlreadySeparated { vocals, instruments });
    }

    let audio = layout.source_audio();
    if !audio.is_file() {
        media.extract_audio(&layout.source_video(), &audio).await?;
    }

    info!("Separating audio: {}", folder.display());
    cache
        .with_resource(key, |separator| {
            let (audio, vocals, instruments) = (&audio, &vocals, &instruments);
            async move { separator.separate(audio, vocals, instruments).await }
        })
        .await?;

    info!("Saved stems {} and {}", vocals.display(), instruments.display());
    Ok(SeparationOutcome::Separated { vocals, instruments })
}
