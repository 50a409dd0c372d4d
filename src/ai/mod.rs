pub mod analyzer;
pub mod client;
pub mod prompts;
pub mod utils;
pub mod video;
pub mod vision;

pub use analyzer::{ContentClassifier, MediaAnalyzer};
pub use client::{OpenAiVisionClient, VisionBackend, VisionClientConfig};
pub use video::{FfmpegFrames, FrameSource, VideoProbe};
