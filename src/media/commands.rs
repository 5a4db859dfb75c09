use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, DubmuxError};
use super::stages::{BgmMixStage, SpeedMuxStage, SubtitleBurnStage};

/// Lines of stderr kept in error messages; ffmpeg prints its whole banner first
const STDERR_TAIL_LINES: usize = 20;

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
    pub timeout: Option<Duration>,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
            timeout: None,
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Bound how long the command may run
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Set video codec
    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Copy video stream
    pub fn copy_video(self) -> Self {
        self.video_codec("copy")
    }

    /// Copy audio stream
    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    /// Set audio sample rate
    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    /// Set audio channels
    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    /// Add video filter
    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Add a filter graph
    pub fn filter_complex<S: Into<String>>(self, graph: S) -> Self {
        self.arg("-filter_complex").arg(graph)
    }

    /// Select a stream or filter output for the output file
    pub fn map<S: Into<String>>(self, stream: S) -> Self {
        self.arg("-map").arg(stream)
    }

    /// Set output frame rate
    pub fn frame_rate(self, fps: u32) -> Self {
        self.arg("-r").arg(fps.to_string())
    }

    /// Set output frame size
    pub fn size(self, width: u32, height: u32) -> Self {
        self.arg("-s").arg(format!("{}x{}", width, height))
    }

    /// Limit encoder threads
    pub fn threads(self, threads: u32) -> Self {
        self.arg("-threads").arg(threads.to_string())
    }

    /// Execute the command
    pub async fn execute(&self) -> Result<()> {
        self.run().await.map(|_| ())
    }

    /// Execute the command and return its stdout
    pub async fn capture(&self) -> Result<String> {
        let output = self.run().await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn run(&self) -> Result<Output> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| DubmuxError::Timeout(self.description.clone(), limit))?,
            None => cmd.output().await,
        }
        .map_err(|e| DubmuxError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DubmuxError::Media(format!(
                "{} failed ({}): {}",
                self.description,
                output.status,
                stderr_tail(&stderr)
            )));
        }

        Ok(output)
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let skip = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[skip..].join("\n")
}

/// Chain `atempo` filters so each factor stays within the 0.5..=2.0 range
/// older ffmpeg builds accept.
pub fn atempo_chain(speed: f64) -> String {
    let mut remaining = speed;
    let mut chain: Vec<String> = Vec::new();

    while remaining > 2.0 + 1e-6 {
        chain.push("atempo=2.0".to_string());
        remaining /= 2.0;
    }
    while remaining < 0.5 - 1e-6 {
        chain.push("atempo=0.5".to_string());
        remaining /= 0.5;
    }
    chain.push(format!("atempo={}", remaining));

    chain.join(",")
}

/// Escape a path for use as a filter option value
pub fn escape_filter_path<P: AsRef<Path>>(path: P) -> String {
    let raw = path.as_ref().to_string_lossy().replace('\\', "/");
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, ':' | '\'' | ',' | '[' | ']' | ';') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Builder for common media processing operations
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    binary_path: String,
    threads: u32,
    timeout: Option<Duration>,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
            threads: 2,
            timeout: None,
        }
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command<S: Into<String>>(&self, description: S) -> MediaCommand {
        MediaCommand::new(&self.binary_path, description).timeout(self.timeout)
    }

    /// Build the speed change + dubbed audio mux (+ watermark) command
    pub fn speed_and_mux(&self, stage: &SpeedMuxStage) -> MediaCommand {
        let video_speed = format!("setpts=PTS/{}", stage.speed_up);
        let audio_speed = atempo_chain(stage.speed_up);

        let mut cmd = self
            .command("Speed change and audio mux")
            .overwrite()
            .input(&stage.source_video)
            .input(&stage.dubbed_audio);

        let graph = match &stage.watermark {
            Some(watermark) => {
                cmd = cmd.input(watermark);
                format!(
                    "[0:v]{}[vs];[2:v]scale=iw*0.15:ih*0.15[wm];[vs][wm]overlay=W-w-10:H-h-10[v];[1:a]{}[a]",
                    video_speed, audio_speed
                )
            }
            None => format!("[0:v]{}[v];[1:a]{}[a]", video_speed, audio_speed),
        };

        cmd.filter_complex(graph)
            .map("[v]")
            .map("[a]")
            .frame_rate(stage.fps)
            .size(stage.geometry.width, stage.geometry.height)
            .video_codec("libx264")
            .audio_codec("aac")
            .threads(self.threads)
            .output(&stage.output)
    }

    /// Build the background music mix command
    pub fn mix_bgm(&self, stage: &BgmMixStage) -> MediaCommand {
        self.command("Background music mix")
            .overwrite()
            .input(&stage.video)
            .input(&stage.bgm)
            .filter_complex(format!(
                "[0:a]volume={}[v0];[1:a]volume={}[v1];[v0][v1]amix=inputs=2:duration=first[a]",
                stage.video_volume, stage.bgm_volume
            ))
            .map("0:v")
            .map("[a]")
            .copy_video()
            .audio_codec("aac")
            .threads(self.threads)
            .output(&stage.output)
    }

    /// Build subtitle burn-in command
    pub fn burn_subtitles(&self, stage: &SubtitleBurnStage) -> MediaCommand {
        self.command("Subtitle burn-in")
            .overwrite()
            .input(&stage.video)
            .video_filter(stage.filter())
            .video_codec("libx264")
            .copy_audio()
            .threads(self.threads)
            .output(&stage.output)
    }

    /// Build audio extraction command (stereo 44.1kHz PCM for separation)
    pub fn extract_audio<P: AsRef<Path>>(&self, video_path: P, audio_path: P) -> MediaCommand {
        self.command("Audio extraction")
            .overwrite()
            .input(video_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(44100)
            .audio_channels(2)
            .output(audio_path)
    }

    /// Build ffprobe dimension query; the builder must point at ffprobe
    pub fn probe_dimensions<P: AsRef<Path>>(&self, video_path: P) -> MediaCommand {
        self.command("Video probe")
            .args(["-v", "error", "-select_streams", "v:0"])
            .args(["-show_entries", "stream=width,height", "-of", "json"])
            .output(video_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        self.command("Version check").arg("-version")
    }
}
