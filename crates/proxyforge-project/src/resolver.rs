//! Recovery protocol for assets whose request failed.
//!
//! A failing asset first gets a chance to propose a new id itself. If it
//! cannot, observers are asked for a replacement URI. A candidate redirects
//! the asset and the caller re-requests it under the new id; without one the
//! asset settles as errored. Each original id is resolved at most once: if the
//! re-request fails too, the original is finalized as errored directly.

use proxyforge_core::{Asset, AssetError, AssetLoader, IdUpdate};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::registry::AssetRegistry;
use crate::signals::Signals;

/// A re-request waiting for its completion.
#[derive(Debug, Clone)]
pub struct Retry {
    /// The failed asset, redirected to the new id.
    pub original: Asset,
    /// The new id was already requested on its own; the retry rides on
    /// that request.
    pub shared: bool,
}

#[derive(Debug, Default)]
pub struct MissingResourceResolver {
    /// Re-requests in flight, keyed by new id.
    retries: HashMap<String, Retry>,
}

impl MissingResourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the protocol for `asset`, which failed with `error`.
    ///
    /// Returns the id to re-request under, or `None` once the asset has been
    /// marked errored.
    pub fn resolve(
        &mut self,
        registry: &AssetRegistry,
        loader: &dyn AssetLoader,
        signals: &Signals,
        asset: &Asset,
        error: &AssetError,
    ) -> Option<String> {
        let candidate = match loader.request_id_update(asset, error) {
            IdUpdate::Relocated(new_id) => {
                debug!(asset = %asset.id(), new_id = %new_id, "Asset relocated itself");
                Some(new_id)
            }
            IdUpdate::Ask => signals.query_missing_resource(error, asset),
            IdUpdate::Unsupported => None,
        };

        let Some(new_id) = candidate else {
            registry.mark_errored(asset, error);
            return None;
        };

        if !registry.set_loading_proxy(asset.id(), &new_id) {
            let rejected = AssetError::InvalidReplacementUri(new_id);
            debug!(asset = %asset.id(), error = %rejected, "Replacement rejected");
            registry.mark_errored(asset, error);
            return None;
        }

        let mut original = registry
            .forget_loading(asset.id())
            .unwrap_or_else(|| asset.clone());
        original.set_proxy(new_id.as_str());
        info!(asset = %asset.id(), new_id = %new_id, "Re-requesting missing asset");
        self.retries.insert(
            new_id.clone(),
            Retry {
                original,
                shared: false,
            },
        );
        Some(new_id)
    }

    /// Whether `id` is a re-request issued by [`Self::resolve`].
    pub fn is_retry(&self, id: &str) -> bool {
        self.retries.contains_key(id)
    }

    /// Mark the retry for `new_id` as waiting on a request it did not issue.
    pub fn share(&mut self, new_id: &str) -> bool {
        match self.retries.get_mut(new_id) {
            Some(retry) => {
                retry.shared = true;
                true
            }
            None => false,
        }
    }

    /// Close the retry for `new_id`.
    pub fn settle(&mut self, new_id: &str) -> Option<Retry> {
        self.retries.remove(new_id)
    }

    pub fn pending_retries(&self) -> usize {
        self.retries.len()
    }
}
