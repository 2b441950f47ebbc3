//! Asset identity and kind tags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Capability classification of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// A clip backed by a media file, addressed by URI.
    UriClip,
    /// A single stream of a media file.
    UriSource,
    /// Generated title text.
    TitleClip,
    /// Generated test pattern.
    TestClip,
    Effect,
    Transition,
    Timeline,
    /// Project document reader/writer.
    Formatter,
}

impl AssetKind {
    /// Whether assets of this kind are backed by a file and can be proxied.
    pub fn is_file_backed(self) -> bool {
        matches!(self, Self::UriClip | Self::UriSource)
    }

    /// Whether assets of this kind can be placed on a layer.
    pub fn is_clip(self) -> bool {
        matches!(self, Self::UriClip | Self::TitleClip | Self::TestClip)
    }

    /// Stable name, used in logs and project documents.
    pub fn name(self) -> &'static str {
        match self {
            Self::UriClip => "uri-clip",
            Self::UriSource => "uri-source",
            Self::TitleClip => "title-clip",
            Self::TestClip => "test-clip",
            Self::Effect => "effect",
            Self::Transition => "transition",
            Self::Timeline => "timeline",
            Self::Formatter => "formatter",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Predicate over asset kinds used by lookups and listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindFilter {
    /// Every kind matches.
    #[default]
    Any,
    /// Exactly one kind.
    Only(AssetKind),
    /// Kinds backed by a media file.
    FileBacked,
    /// Kinds that can be placed on a layer.
    Clips,
}

impl KindFilter {
    pub fn matches(self, kind: AssetKind) -> bool {
        match self {
            Self::Any => true,
            Self::Only(expected) => expected == kind,
            Self::FileBacked => kind.is_file_backed(),
            Self::Clips => kind.is_clip(),
        }
    }
}

impl From<AssetKind> for KindFilter {
    fn from(kind: AssetKind) -> Self {
        Self::Only(kind)
    }
}

/// Lifecycle state of an asset id inside a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetState {
    Loading,
    Loaded,
    Errored,
    /// Registered as a proxy of another asset.
    Proxy,
}

/// Facts gathered while resolving an asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    /// Container format guessed from the resource.
    pub container: Option<String>,
    /// Size of the backing file.
    pub size_bytes: Option<u64>,
    pub duration: Option<Duration>,
    pub has_video: bool,
    pub has_audio: bool,
}

/// A uniquely identified resource handle of a given kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    id: String,
    kind: AssetKind,
    /// Id this asset is redirected to (relocation or proxy).
    proxy: Option<String>,
    /// Id of the original asset, when this asset is a proxy.
    parent: Option<String>,
    /// Resolution results.
    pub metadata: AssetMetadata,
}

impl Asset {
    /// Create an asset handle with no metadata.
    pub fn new(id: impl Into<String>, kind: AssetKind) -> Self {
        Self {
            id: id.into(),
            kind,
            proxy: None,
            parent: None,
            metadata: AssetMetadata::default(),
        }
    }

    /// Attach resolution metadata.
    pub fn with_metadata(mut self, metadata: AssetMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    /// Redirect this asset to `new_id`.
    ///
    /// Returns false when `new_id` is empty or names the asset itself.
    pub fn set_proxy(&mut self, new_id: impl Into<String>) -> bool {
        let new_id = new_id.into();
        if new_id.is_empty() || new_id == self.id {
            return false;
        }
        self.proxy = Some(new_id);
        true
    }

    /// Id this asset is redirected to, if any.
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Mark this asset as a proxy of `parent`.
    pub fn set_parent(&mut self, parent: &Asset) {
        self.parent = Some(parent.id.clone());
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_proxy(&self) -> bool {
        self.parent.is_some()
    }
}
