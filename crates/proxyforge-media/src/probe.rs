//! Media file probing to get metadata without a decode.

use proxyforge_core::AssetMetadata;
use std::path::Path;

use crate::error::{MediaError, MediaResult};

const VIDEO_CONTAINERS: &[&str] = &[
    "mp4", "mov", "mkv", "webm", "avi", "mxf", "m4v", "mts", "ts", "proxy",
];
const AUDIO_ONLY: &[&str] = &["wav", "mp3", "flac", "ogg", "m4a", "aac", "opus"];
const STILLS: &[&str] = &["png", "jpg", "jpeg", "tiff", "bmp", "webp"];

/// What could be learned about a media file cheaply.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaProbe {
    pub path: String,
    pub size_bytes: u64,
    /// Container guessed from the file extension.
    pub format: Option<String>,
    pub has_video: bool,
    pub has_audio: bool,
}

impl MediaProbe {
    /// Probe a media file.
    ///
    /// A missing path yields [`MediaError::Io`] with `NotFound` kind.
    pub fn probe<P: AsRef<Path>>(path: P) -> MediaResult<Self> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path)?;
        if !meta.is_file() {
            return Err(MediaError::Unsupported(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }

        let format = container_of(path);
        let (has_video, has_audio) = match format.as_deref() {
            Some(ext) if AUDIO_ONLY.contains(&ext) => (false, true),
            Some(ext) if STILLS.contains(&ext) => (true, false),
            Some(ext) if VIDEO_CONTAINERS.contains(&ext) => (true, true),
            // unknown extension, let the decoder decide later
            _ => (true, true),
        };

        Ok(Self {
            path: path.to_string_lossy().into_owned(),
            size_bytes: meta.len(),
            format,
            has_video,
            has_audio,
        })
    }

    pub fn into_metadata(self) -> AssetMetadata {
        AssetMetadata {
            container: self.format,
            size_bytes: Some(self.size_bytes),
            duration: None,
            has_video: self.has_video,
            has_audio: self.has_audio,
        }
    }
}

/// Proxies are named `<original>.proxy`, so look through that suffix first.
fn container_of(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
    let name = name
        .strip_suffix(proxyforge_core::PROXY_SUFFIX)
        .unwrap_or(name.as_str());
    let ext = Path::new(name).extension()?.to_string_lossy().into_owned();
    Some(ext)
}
