use std::path::Path;
use tokio::fs;
use tracing::info;

use crate::error::{Result, DubmuxError};
use super::SubtitleCue;

const MILLIS_EPSILON: f64 = 1e-6;

/// Render cues as an SRT document on the sped-up timeline.
///
/// Cue times are divided by `speed_up` so the subtitles follow the output
/// video rather than the source.
pub fn render_srt(cues: &[SubtitleCue], speed_up: f64, max_line_chars: usize) -> Result<String> {
    if !(speed_up.is_finite() && speed_up > 0.0) {
        return Err(DubmuxError::Subtitle(format!("invalid speed factor {}", speed_up)));
    }
    if max_line_chars == 0 {
        return Err(DubmuxError::Subtitle("max_line_chars must be positive".to_string()));
    }

    let mut srt_content = String::new();

    for (index, cue) in cues.iter().enumerate() {
        let start_time = format_srt_time(cue.start / speed_up);
        let end_time = format_srt_time(cue.end / speed_up);

        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            start_time,
            end_time,
            wrap_text(cue.text.trim(), max_line_chars)
        ));
    }

    Ok(srt_content)
}

/// Generate SRT subtitle file from cues
pub async fn write_srt<P: AsRef<Path>>(
    cues: &[SubtitleCue],
    output_path: P,
    speed_up: f64,
    max_line_chars: usize,
) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating SRT file: {} ({} cues)", output_path.display(), cues.len());

    let srt_content = render_srt(cues, speed_up, max_line_chars)?;
    fs::write(output_path, srt_content).await?;

    info!("SRT file generated successfully");
    Ok(())
}

/// Break text into evenly sized lines of at most `max_line_chars` characters.
///
/// No word-boundary awareness; the last line takes whatever remains.
pub fn wrap_text(text: &str, max_line_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let line_count = len / (max_line_chars + 1) + 1;
    let per_line = ((len as f64 / line_count as f64).round() as usize).min(max_line_chars);

    (0..line_count)
        .map(|i| {
            let start = (i * per_line).min(len);
            let end = if i + 1 == line_count {
                len
            } else {
                ((i + 1) * per_line).min(len)
            };
            chars[start..end].iter().collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format time in seconds to SRT time format (HH:MM:SS,mmm).
///
/// Sub-millisecond remainders are truncated; the nudge keeps values like
/// 1.001 from landing a millisecond early after float multiplication.
pub fn format_srt_time(seconds: f64) -> String {
    let total_milliseconds = (seconds.max(0.0) * 1000.0 + MILLIS_EPSILON).floor() as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}
