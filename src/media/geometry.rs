use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, DubmuxError};

/// Requested output size, named by a single edge length ("1080p")
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    edge: u32,
}

impl Resolution {
    pub fn new(edge: u32) -> Result<Self> {
        if edge == 0 {
            return Err(DubmuxError::Config("resolution must be positive".to_string()));
        }
        Ok(Self { edge })
    }

    pub fn edge(&self) -> u32 {
        self.edge
    }
}

impl FromStr for Resolution {
    type Err = DubmuxError;

    fn from_str(label: &str) -> Result<Self> {
        let trimmed = label.trim();
        let digits = trimmed
            .strip_suffix('p')
            .or_else(|| trimmed.strip_suffix('P'))
            .unwrap_or(trimmed);

        let edge = digits.parse::<u32>().map_err(|_| {
            DubmuxError::Config(format!("Invalid resolution '{}', expected e.g. 1080p", label))
        })?;
        Self::new(edge)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.edge)
    }
}

/// Pixel dimensions of a video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoGeometry {
    pub width: u32,
    pub height: u32,
}

/// Subtitle font size and outline derived from output width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontMetrics {
    pub font_size: u32,
    pub outline: u32,
}

impl VideoGeometry {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(DubmuxError::Probe(format!("degenerate video size {}x{}", width, height)));
        }
        Ok(Self { width, height })
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Scale to the requested resolution, keeping the aspect ratio.
    ///
    /// The label names the height of landscape video and the width of
    /// portrait video. Both edges are rounded down to even numbers since
    /// yuv420p encoders reject odd sizes.
    pub fn resolve(&self, resolution: Resolution) -> VideoGeometry {
        let aspect = self.aspect_ratio();
        let edge = resolution.edge();

        let (width, height) = if aspect < 1.0 {
            (edge, (edge as f64 / aspect) as u32)
        } else {
            ((edge as f64 * aspect) as u32, edge)
        };

        VideoGeometry {
            width: floor_even(width).max(2),
            height: floor_even(height).max(2),
        }
    }

    pub fn font_metrics(&self) -> FontMetrics {
        let font_size = self.width / 128;
        let outline = (font_size as f64 / 8.0).round() as u32;
        FontMetrics { font_size, outline }
    }

    /// `WxH` as used by ffmpeg's `-s`
    pub fn size_arg(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

fn floor_even(value: u32) -> u32 {
    value - value % 2
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

/// Parse `ffprobe -show_entries stream=width,height -of json` output
pub fn parse_probe_output(json: &str) -> Result<VideoGeometry> {
    let output: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| DubmuxError::Probe(format!("unreadable ffprobe output: {}", e)))?;

    let stream = output
        .streams
        .first()
        .ok_or_else(|| DubmuxError::Probe("no video stream found".to_string()))?;

    match (stream.width, stream.height) {
        (Some(width), Some(height)) => VideoGeometry::new(width, height),
        _ => Err(DubmuxError::Probe("video stream has no dimensions".to_string())),
    }
}
