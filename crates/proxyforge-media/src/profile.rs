//! Encoding profiles describing proxy target formats.

use serde::{Deserialize, Serialize};
use std::path::Path;

// ── Codecs and containers ───────────────────────────────────────

/// Video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    H264,
    ProResProxy,
    Mjpeg,
    Vp9,
}

impl VideoCodec {
    /// FFmpeg encoder name.
    pub fn ffmpeg_encoder(self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::ProResProxy => "prores_ks",
            Self::Mjpeg => "mjpeg",
            Self::Vp9 => "libvpx-vp9",
        }
    }
}

/// Audio codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCodec {
    Aac,
    Pcm,
    Opus,
}

impl AudioCodec {
    /// FFmpeg encoder name.
    pub fn ffmpeg_encoder(self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Pcm => "pcm_s16le",
            Self::Opus => "libopus",
        }
    }
}

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Container {
    Mp4,
    Mov,
    Matroska,
    Webm,
}

impl Container {
    /// FFmpeg muxer name. Passed explicitly because in-progress outputs carry
    /// a suffix FFmpeg cannot guess a format from.
    pub fn ffmpeg_format(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::Matroska => "matroska",
            Self::Webm => "webm",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::Matroska => "mkv",
            Self::Webm => "webm",
        }
    }
}

// ── Profile ─────────────────────────────────────────────────────

/// Target format used when transcoding an original into a proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingProfile {
    /// Profile name, unique within a project's catalogue.
    pub name: String,
    pub container: Container,
    pub video_codec: VideoCodec,
    /// `None` drops the audio streams.
    pub audio_codec: Option<AudioCodec>,
    /// Output height in pixels; width follows the source aspect ratio.
    pub height: Option<u32>,
    /// CRF value for H.264/VP9 (lower = better).
    pub crf: Option<u32>,
    /// Bitrate in kbps (overrides CRF if set).
    pub video_bitrate: Option<u32>,
    /// Audio bitrate in kbps.
    pub audio_bitrate: u32,
}

impl EncodingProfile {
    /// Lightweight H.264 proxy at 540p.
    pub fn h264_proxy() -> Self {
        Self {
            name: "h264-proxy".into(),
            container: Container::Mp4,
            video_codec: VideoCodec::H264,
            audio_codec: Some(AudioCodec::Aac),
            height: Some(540),
            crf: Some(28),
            video_bitrate: None,
            audio_bitrate: 128,
        }
    }

    /// ProRes 422 Proxy for intra-frame scrubbing.
    pub fn prores_proxy() -> Self {
        Self {
            name: "prores-proxy".into(),
            container: Container::Mov,
            video_codec: VideoCodec::ProResProxy,
            audio_codec: Some(AudioCodec::Pcm),
            height: Some(720),
            crf: None,
            video_bitrate: None,
            audio_bitrate: 1536,
        }
    }

    /// Motion JPEG, cheap to decode on any machine.
    pub fn mjpeg_proxy() -> Self {
        Self {
            name: "mjpeg-proxy".into(),
            container: Container::Matroska,
            video_codec: VideoCodec::Mjpeg,
            audio_codec: Some(AudioCodec::Pcm),
            height: Some(540),
            crf: None,
            video_bitrate: Some(8000),
            audio_bitrate: 1536,
        }
    }

    /// Build the FFmpeg command arguments transcoding `input` into `output`.
    pub fn ffmpeg_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-nostdin".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            input.to_string_lossy().into_owned(),
        ];

        args.extend_from_slice(&["-c:v".into(), self.video_codec.ffmpeg_encoder().into()]);

        if let Some(height) = self.height {
            // -2 keeps the width even, which most encoders require
            args.extend_from_slice(&["-vf".into(), format!("scale=-2:{height}")]);
        }
        if let Some(crf) = self.crf {
            args.extend_from_slice(&["-crf".into(), crf.to_string()]);
        }
        if let Some(bitrate) = self.video_bitrate {
            args.extend_from_slice(&["-b:v".into(), format!("{}k", bitrate)]);
        }

        match self.video_codec {
            VideoCodec::H264 => {
                args.extend_from_slice(&["-preset".into(), "veryfast".into()]);
                args.extend_from_slice(&["-pix_fmt".into(), "yuv420p".into()]);
            }
            VideoCodec::ProResProxy => {
                args.extend_from_slice(&["-profile:v".into(), "0".into()]);
            }
            VideoCodec::Mjpeg | VideoCodec::Vp9 => {}
        }

        match self.audio_codec {
            Some(codec) => {
                args.extend_from_slice(&["-c:a".into(), codec.ffmpeg_encoder().into()]);
                if codec != AudioCodec::Pcm {
                    args.extend_from_slice(&["-b:a".into(), format!("{}k", self.audio_bitrate)]);
                }
            }
            None => args.push("-an".into()),
        }

        args.extend_from_slice(&["-f".into(), self.container.ffmpeg_format().into()]);
        args.push(output.to_string_lossy().into_owned());

        args
    }
}

impl Default for EncodingProfile {
    fn default() -> Self {
        Self::h264_proxy()
    }
}
