//! The asset capability contract.
//!
//! Projects never construct assets themselves. They issue an [`AssetRequest`]
//! through an [`AssetLoader`] and receive the outcome later through the
//! [`Completion`] they handed over. Loaders may complete inline, on a worker
//! pool, or much later; callers must not assume any completion order.

use std::fmt;

use crate::asset::{Asset, AssetKind};
use crate::error::{AssetError, AssetResult};

/// A request to resolve `id` as an asset of `kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub id: String,
    pub kind: AssetKind,
}

impl AssetRequest {
    pub fn new(id: impl Into<String>, kind: AssetKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

type Deliver = Box<dyn FnOnce(AssetRequest, AssetResult<Asset>) + Send>;

/// One-shot completion for an [`AssetRequest`].
///
/// Consumed on use, so a request is answered exactly once.
pub struct Completion {
    request: AssetRequest,
    deliver: Deliver,
}

impl Completion {
    /// Wrap a delivery callback for `request`.
    pub fn new(
        request: AssetRequest,
        deliver: impl FnOnce(AssetRequest, AssetResult<Asset>) + Send + 'static,
    ) -> Self {
        Self {
            request,
            deliver: Box::new(deliver),
        }
    }

    /// The request being answered.
    pub fn request(&self) -> &AssetRequest {
        &self.request
    }

    /// Deliver the outcome.
    pub fn complete(self, result: AssetResult<Asset>) {
        (self.deliver)(self.request, result);
    }

    pub fn succeed(self, asset: Asset) {
        self.complete(Ok(asset));
    }

    pub fn fail(self, error: AssetError) {
        self.complete(Err(error));
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// Answer of an asset asked to propose a replacement id after a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdUpdate {
    /// The asset kind cannot be relocated; the failure is final.
    Unsupported,
    /// The asset can be relocated but does not know where; ask observers.
    Ask,
    /// The asset found its resource under a new id.
    Relocated(String),
}

/// Resolves asset requests for a project.
pub trait AssetLoader: Send + Sync {
    /// Start resolving `completion.request()`.
    fn request(&self, completion: Completion);

    /// Ask whether `asset`, which failed with `error`, can be given a new id.
    fn request_id_update(&self, asset: &Asset, error: &AssetError) -> IdUpdate {
        if asset.kind().is_file_backed() && error.is_missing_resource() {
            IdUpdate::Ask
        } else {
            IdUpdate::Unsupported
        }
    }

    /// Record that `old_id` was confirmed to live at `new_id`.
    fn note_relocation(&self, _old_id: &str, _new_id: &str) {}

    /// Forget anything cached for `id`; its content changed on disk.
    fn needs_reload(&self, _kind: AssetKind, _id: &str) {}
}
