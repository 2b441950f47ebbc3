//! ProxyForge Media - FFmpeg integration for asset resolution and transcoding
//!
//! This crate handles:
//! - Media file probing
//! - Filesystem-backed asset loading
//! - Encoding profiles for proxy media
//! - Transcode jobs and the FFmpeg engine that runs them

pub mod error;
pub mod ffmpeg;
pub mod loader;
pub mod probe;
pub mod profile;
pub mod transcode;

pub use error::{MediaError, MediaResult};
pub use ffmpeg::FfmpegEngine;
pub use loader::FileAssetLoader;
pub use probe::MediaProbe;
pub use profile::{AudioCodec, Container, EncodingProfile, VideoCodec};
pub use transcode::{
    JobControl, JobId, JobOutcome, JobReport, Pipeline, TranscodeEngine, TranscodeJob,
    TranscodeRequest,
};

/// Initialize the media subsystem (call once at startup).
pub fn init() {
    tracing::info!("ProxyForge Media initialized");
}
