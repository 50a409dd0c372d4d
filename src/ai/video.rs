//! Video frame sampling via ffprobe/ffmpeg
//!
//! Videos are classified through a single still: the frame range is sampled
//! at [`SAMPLE_FRAMES`] evenly spaced indices and the index-middle sample is
//! extracted. Using the middle of the sample list (rather than the middle of
//! the timeline) keeps the choice a pure function of the frame count.

use crate::error::ClassifyError;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;

/// Number of evenly spaced sample positions across a video
pub const SAMPLE_FRAMES: u64 = 5;

/// Frame count and rate of a video's first video stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProbe {
    pub frame_count: u64,
    pub fps: f64,
}

impl VideoProbe {
    pub fn duration_secs(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }
}

/// `i * frame_count / samples` for `i` in `0..samples`
pub fn sample_frame_indices(frame_count: u64, samples: u64) -> Vec<u64> {
    if frame_count == 0 || samples == 0 {
        return Vec::new();
    }
    (0..samples).map(|i| i * frame_count / samples).collect()
}

/// The index-middle entry of a sample list
pub fn central_sample(indices: &[u64]) -> Option<u64> {
    indices.get(indices.len() / 2).copied()
}

/// Source of video metadata and still frames
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<VideoProbe, ClassifyError>;

    /// Encoded image bytes for frame `index`
    async fn extract_frame(
        &self,
        path: &Path,
        probe: &VideoProbe,
        index: u64,
    ) -> Result<Vec<u8>, ClassifyError>;
}

/// [`FrameSource`] backed by the `ffprobe` and `ffmpeg` binaries on `PATH`
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegFrames;

#[async_trait]
impl FrameSource for FfmpegFrames {
    async fn probe(&self, path: &Path) -> Result<VideoProbe, ClassifyError> {
        probe_video(path).await
    }

    async fn extract_frame(
        &self,
        path: &Path,
        probe: &VideoProbe,
        index: u64,
    ) -> Result<Vec<u8>, ClassifyError> {
        extract_frame(path, frame_timestamp(probe, index)).await
    }
}

/// Seconds from the start of the video to frame `index`
pub fn frame_timestamp(probe: &VideoProbe, index: u64) -> f64 {
    if probe.fps > 0.0 {
        index as f64 / probe.fps
    } else {
        0.0
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeStream {
    nb_frames: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

/// Parse `ffprobe -of json` stream and format output
///
/// Containers such as MKV and WebM omit `nb_frames` and the stream duration;
/// the count is then derived from the container duration and frame rate.
pub fn parse_probe_output(json: &str) -> Result<VideoProbe, ClassifyError> {
    let output: ProbeOutput =
        serde_json::from_str(json).map_err(|e| ClassifyError::Video(e.to_string()))?;
    let container_duration = output.format.and_then(|f| f.duration);
    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| ClassifyError::Video("no video stream".to_string()))?;

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .ok_or_else(|| ClassifyError::Video("unknown frame rate".to_string()))?;

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
        .or_else(|| {
            [stream.duration.as_deref(), container_duration.as_deref()]
                .into_iter()
                .flatten()
                .filter_map(|d| d.trim().parse::<f64>().ok())
                .find(|secs| secs.is_finite() && *secs > 0.0)
                .map(|secs| (secs * fps).round() as u64)
        })
        .filter(|n| *n > 0)
        .ok_or_else(|| ClassifyError::Video("unknown frame count".to_string()))?;

    Ok(VideoProbe { frame_count, fps })
}

/// `"30000/1001"` or `"25"` -> frames per second
fn parse_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Run ffprobe against the first video stream
pub async fn probe_video(path: &Path) -> Result<VideoProbe, ClassifyError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=nb_frames,r_frame_rate,avg_frame_rate,duration:format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ClassifyError::Video(format!("failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(ClassifyError::Video(format!(
            "ffprobe failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Extract the frame at `seconds` as JPEG bytes
///
/// Seeks on the input before decoding, so only the frames around the target
/// are decoded. The frame is written into a private temp directory that is
/// removed when this function returns, on every path.
pub async fn extract_frame(path: &Path, seconds: f64) -> Result<Vec<u8>, ClassifyError> {
    let scratch = tempfile::Builder::new()
        .prefix("asset-namer-frame")
        .tempdir()?;
    let frame_path = scratch.path().join("frame.jpg");
    let seek = format!("{:.3}", seconds.max(0.0));

    let output = Command::new("ffmpeg")
        .args(["-v", "error", "-y", "-ss", seek.as_str(), "-i"])
        .arg(path)
        .args(["-frames:v", "1"])
        .arg(&frame_path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ClassifyError::Video(format!("failed to run ffmpeg: {}", e)))?;

    if !output.status.success() {
        return Err(ClassifyError::Video(format!(
            "ffmpeg failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let data = tokio::fs::read(&frame_path).await?;
    if data.is_empty() {
        return Err(ClassifyError::Video(format!("no frame at {:.3}s", seconds)));
    }

    Ok(data)
}
