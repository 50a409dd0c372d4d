//! Content classification with filename fallback
//!
//! [`MediaAnalyzer`] turns a media file into an [`AnalysisResult`]. Stills go
//! straight to the vision backend; videos are probed and one sampled frame is
//! described instead. Any failure on the way (decode, ffmpeg, HTTP, timeout,
//! unparseable answer) is logged and replaced by the fallback analysis, so
//! classification itself never fails.

use super::client::{OpenAiVisionClient, VisionBackend, VisionClientConfig};
use super::utils::parse_analysis_response;
use super::video::{central_sample, sample_frame_indices, FfmpegFrames, FrameSource, SAMPLE_FRAMES};
use super::vision::{load_image_for_vision, prepare_on_blocking_pool};
use crate::config::AiSettings;
use crate::error::ClassifyError;
use crate::models::{AnalysisResult, MediaFile, MediaKind};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Placeholder key shipped in sample `.env` files
const PLACEHOLDER_API_KEY: &str = "your-api-key-here";

/// Produces a semantic description of a media file
///
/// Implementations must always return a populated result and must be safe to
/// call from several workers at once.
#[async_trait]
pub trait ContentClassifier: Send + Sync {
    async fn classify(&self, file: &MediaFile) -> AnalysisResult;
}

/// Vision-backed classifier
pub struct MediaAnalyzer {
    /// `None` runs offline: every file gets the fallback analysis
    backend: Option<Arc<dyn VisionBackend>>,
    frames: Arc<dyn FrameSource>,
    timeout: Duration,
    video_samples: u64,
}

impl MediaAnalyzer {
    pub fn new(backend: Arc<dyn VisionBackend>) -> Self {
        Self {
            backend: Some(backend),
            frames: Arc::new(FfmpegFrames),
            timeout: AiSettings::default().timeout(),
            video_samples: SAMPLE_FRAMES,
        }
    }

    pub fn offline() -> Self {
        Self {
            backend: None,
            frames: Arc::new(FfmpegFrames),
            timeout: AiSettings::default().timeout(),
            video_samples: SAMPLE_FRAMES,
        }
    }

    /// Build an OpenAI-backed analyzer, or an offline one when no usable key is given
    pub fn from_settings(
        api_key: Option<&str>,
        settings: &AiSettings,
    ) -> Result<Self, ClassifyError> {
        let key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty() && *k != PLACEHOLDER_API_KEY);

        let analyzer = match key {
            Some(key) => {
                let client = OpenAiVisionClient::new(VisionClientConfig::from_settings(key, settings))?;
                Self::new(Arc::new(client))
            }
            None => {
                warn!("No API key configured, using filename-based analysis only");
                Self::offline()
            }
        };

        Ok(analyzer.with_timeout(settings.timeout()))
    }

    /// Replace the ffprobe/ffmpeg frame source
    pub fn with_frame_source(mut self, frames: Arc<dyn FrameSource>) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_online(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn analyze_image(&self, path: &Path) -> AnalysisResult {
        self.analyze(path, false).await
    }

    pub async fn analyze_video(&self, path: &Path) -> AnalysisResult {
        self.analyze(path, true).await
    }

    async fn analyze(&self, path: &Path, is_video: bool) -> AnalysisResult {
        let Some(backend) = self.backend.as_deref() else {
            debug!(path = %path.display(), "Offline, using fallback analysis");
            return AnalysisResult::fallback(path, is_video);
        };

        let attempt = async {
            if is_video {
                self.try_analyze_video(backend, path).await
            } else {
                self.try_analyze_image(backend, path).await
            }
        };

        let outcome = match tokio::time::timeout(self.timeout, attempt).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClassifyError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Classification failed, using filename fallback"
                );
                AnalysisResult::fallback(path, is_video)
            }
        }
    }

    async fn try_analyze_image(
        &self,
        backend: &dyn VisionBackend,
        path: &Path,
    ) -> Result<AnalysisResult, ClassifyError> {
        let jpeg = load_image_for_vision(path).await?;
        describe(backend, &jpeg).await
    }

    async fn try_analyze_video(
        &self,
        backend: &dyn VisionBackend,
        path: &Path,
    ) -> Result<AnalysisResult, ClassifyError> {
        let probe = self.frames.probe(path).await?;
        let indices = sample_frame_indices(probe.frame_count, self.video_samples);
        let index = central_sample(&indices)
            .ok_or_else(|| ClassifyError::Video("video has no frames".to_string()))?;

        debug!(
            path = %path.display(),
            frame = index,
            frames = probe.frame_count,
            "Sampling video frame"
        );

        let frame = self.frames.extract_frame(path, &probe, index).await?;
        let jpeg = prepare_on_blocking_pool(frame).await?;

        let mut result = describe(backend, &jpeg).await?;
        result.is_video = true;
        result.duration_secs = Some(probe.duration_secs());
        Ok(result)
    }
}

async fn describe(backend: &dyn VisionBackend, jpeg: &[u8]) -> Result<AnalysisResult, ClassifyError> {
    let content = backend.describe_image(jpeg).await?;
    parse_analysis_response(&content).ok_or(ClassifyError::EmptyDescription)
}

#[async_trait]
impl ContentClassifier for MediaAnalyzer {
    async fn classify(&self, file: &MediaFile) -> AnalysisResult {
        match file.kind {
            MediaKind::Image => self.analyze_image(&file.path).await,
            MediaKind::Video => self.analyze_video(&file.path).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::video::VideoProbe;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CannedBackend {
        reply: String,
        calls: AtomicUsize,
    }

    impl CannedBackend {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl VisionBackend for CannedBackend {
        async fn describe_image(&self, jpeg: &[u8]) -> Result<String, ClassifyError> {
            assert!(jpeg.starts_with(&[0xFF, 0xD8]));
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl VisionBackend for FailingBackend {
        async fn describe_image(&self, _jpeg: &[u8]) -> Result<String, ClassifyError> {
            Err(ClassifyError::Status {
                status: 503,
                body: "unavailable".to_string(),
            })
        }
    }

    struct SlowBackend;

    #[async_trait]
    impl VisionBackend for SlowBackend {
        async fn describe_image(&self, _jpeg: &[u8]) -> Result<String, ClassifyError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(r#"{"description": "too late"}"#.to_string())
        }
    }

    /// 300 frames at 25 fps; hands back a small PNG for any index
    struct StubFrames {
        requested: AtomicU64,
    }

    #[async_trait]
    impl FrameSource for StubFrames {
        async fn probe(&self, _path: &Path) -> Result<VideoProbe, ClassifyError> {
            Ok(VideoProbe {
                frame_count: 300,
                fps: 25.0,
            })
        }

        async fn extract_frame(
            &self,
            _path: &Path,
            _probe: &VideoProbe,
            index: u64,
        ) -> Result<Vec<u8>, ClassifyError> {
            self.requested.store(index, Ordering::SeqCst);
            let mut cursor = Cursor::new(Vec::new());
            DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, image::Rgb([0, 0, 255])))
                .write_to(&mut cursor, ImageFormat::Png)
                .unwrap();
            Ok(cursor.into_inner())
        }
    }

    fn write_png(dir: &Path, name: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, image::Rgb([10, 200, 30])))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    #[tokio::test]
    async fn test_structured_reply_is_used() {
        let dir = TempDir::new().unwrap();
        let path = write_png(dir.path(), "IMG_0001.png");
        let backend = CannedBackend::new(
            r#"```json
{"description": "sunset beach", "scene_type": "landscape", "subjects": ["sea"]}
```"#,
        );
        let analyzer = MediaAnalyzer::new(backend.clone());

        let result = analyzer.analyze_image(&path).await;
        assert!(result.analyzed);
        assert_eq!(result.description, "sunset beach");
        assert_eq!(result.scene_type, "landscape");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_free_text_reply_uses_heuristic() {
        let dir = TempDir::new().unwrap();
        let path = write_png(dir.path(), "shot.png");
        let analyzer = MediaAnalyzer::new(CannedBackend::new("A green square on nothing at all"));

        let result = analyzer.analyze_image(&path).await;
        assert!(result.analyzed);
        assert_eq!(result.description, "a_green_square_on_nothing");
    }

    #[tokio::test]
    async fn test_backend_failure_falls_back_to_stem() {
        let dir = TempDir::new().unwrap();
        let path = write_png(dir.path(), "IMG_0042.png");
        let analyzer = MediaAnalyzer::new(Arc::new(FailingBackend));

        let result = analyzer.analyze_image(&path).await;
        assert!(!result.analyzed);
        assert_eq!(result.description, "IMG_0042");
        assert_eq!(result.scene_type, "image");
    }

    #[tokio::test]
    async fn test_unreadable_image_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not really a jpeg").unwrap();
        let backend = CannedBackend::new(r#"{"description": "never asked"}"#);
        let analyzer = MediaAnalyzer::new(backend.clone());

        let result = analyzer.analyze_image(&path).await;
        assert!(!result.analyzed);
        assert_eq!(result.description, "broken");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unusable_reply_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = write_png(dir.path(), "quiet.png");
        let analyzer = MediaAnalyzer::new(CannedBackend::new("?!"));

        let result = analyzer.analyze_image(&path).await;
        assert!(!result.analyzed);
        assert_eq!(result.description, "quiet");
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let dir = TempDir::new().unwrap();
        let path = write_png(dir.path(), "slow.png");
        let analyzer =
            MediaAnalyzer::new(Arc::new(SlowBackend)).with_timeout(Duration::from_millis(100));

        let started = std::time::Instant::now();
        let result = analyzer.analyze_image(&path).await;
        assert!(!result.analyzed);
        assert_eq!(result.description, "slow");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_offline_analyzer_never_calls_out() {
        let dir = TempDir::new().unwrap();
        let path = write_png(dir.path(), "offline.png");
        let analyzer = MediaAnalyzer::offline();
        assert!(!analyzer.is_online());

        let result = analyzer.analyze_image(&path).await;
        assert!(!result.analyzed);
        assert_eq!(result.description, "offline");
    }

    #[tokio::test]
    async fn test_broken_video_falls_back_as_video() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"no frames here").unwrap();
        let analyzer = MediaAnalyzer::new(CannedBackend::new(r#"{"description": "x"}"#));

        let result = analyzer.analyze_video(&path).await;
        assert!(!result.analyzed);
        assert!(result.is_video);
        assert_eq!(result.scene_type, "video");
        assert_eq!(result.description, "clip");
    }

    #[tokio::test]
    async fn test_video_is_described_from_middle_sample() {
        let frames = Arc::new(StubFrames {
            requested: AtomicU64::new(u64::MAX),
        });
        let backend = CannedBackend::new(r#"{"description": "city timelapse", "scene_type": "b-roll"}"#);
        let analyzer = MediaAnalyzer::new(backend.clone()).with_frame_source(frames.clone());

        let result = analyzer.analyze_video(Path::new("/footage/clip.mp4")).await;

        assert!(result.analyzed);
        assert!(result.is_video);
        assert_eq!(result.description, "city timelapse");
        assert_eq!(result.duration_secs, Some(12.0));
        // Samples are 0, 60, 120, 180, 240
        assert_eq!(frames.requested.load(Ordering::SeqCst), 120);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_placeholder_key_means_offline() {
        let settings = AiSettings::default();
        assert!(!MediaAnalyzer::from_settings(None, &settings).unwrap().is_online());
        assert!(!MediaAnalyzer::from_settings(Some("  "), &settings).unwrap().is_online());
        assert!(!MediaAnalyzer::from_settings(Some(PLACEHOLDER_API_KEY), &settings)
            .unwrap()
            .is_online());
        assert!(MediaAnalyzer::from_settings(Some("sk-real"), &settings)
            .unwrap()
            .is_online());
    }
}
