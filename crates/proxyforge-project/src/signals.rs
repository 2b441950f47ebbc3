//! Observer registry for project events.
//!
//! Handlers are called in registration order. The handler list is copied
//! before dispatch, so a handler may subscribe or unsubscribe others without
//! deadlocking; such changes take effect from the next event.

use parking_lot::RwLock;
use proxyforge_core::{uri, Asset, AssetError, AssetKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};
use uuid::Uuid;

/// Notifications emitted by a project.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectEvent {
    AssetAdded(Asset),
    AssetRemoved(Asset),
    /// An asset settled as errored. Sent once per id.
    ErrorLoadingAsset {
        error: AssetError,
        id: String,
        kind: AssetKind,
    },
    /// A timeline finished loading and all of its assets settled.
    Loaded { timeline: Uuid },
    ProxiesCreationStarted,
    ProxiesCreationPaused,
    ProxiesCreationCancelled,
    ProxiesCreated,
    /// Generating the proxy of `asset_id` failed; the batch continues.
    ProxyFailed { asset_id: String, error: String },
}

/// Handle returned by subscriptions, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type EventHandler = Arc<dyn Fn(&ProjectEvent) + Send + Sync>;
type MissingResourceHandler = Arc<dyn Fn(&AssetError, &Asset) -> Option<String> + Send + Sync>;

#[derive(Default)]
pub struct Signals {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(SubscriptionId, EventHandler)>>,
    missing_resource: RwLock<Vec<(SubscriptionId, MissingResourceHandler)>>,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register an event observer.
    pub fn subscribe(&self, handler: impl Fn(&ProjectEvent) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_id();
        self.handlers.write().push((id, Arc::new(handler)));
        id
    }

    /// Register an answerer for missing-resource queries.
    ///
    /// The handler gets the failure and the asset, and may return a
    /// replacement URI.
    pub fn connect_missing_resource(
        &self,
        handler: impl Fn(&AssetError, &Asset) -> Option<String> + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.missing_resource.write().push((id, Arc::new(handler)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        self.handlers.write().retain(|(sid, _)| {
            let keep = *sid != id;
            removed |= !keep;
            keep
        });
        self.missing_resource.write().retain(|(sid, _)| {
            let keep = *sid != id;
            removed |= !keep;
            keep
        });
        removed
    }

    pub fn emit(&self, event: ProjectEvent) {
        let handlers: Vec<EventHandler> =
            self.handlers.read().iter().map(|(_, h)| Arc::clone(h)).collect();
        trace!(?event, observers = handlers.len(), "Emitting project event");
        for handler in handlers {
            handler(&event);
        }
    }

    /// Poll missing-resource answerers in registration order.
    ///
    /// The first syntactically valid URI other than the asset's own id wins.
    pub fn query_missing_resource(&self, error: &AssetError, asset: &Asset) -> Option<String> {
        let handlers: Vec<MissingResourceHandler> = self
            .missing_resource
            .read()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();

        for handler in handlers {
            let Some(candidate) = handler(error, asset) else {
                continue;
            };
            if uri::is_valid_uri(&candidate) && candidate != asset.id() {
                return Some(candidate);
            }
            let rejected = AssetError::InvalidReplacementUri(candidate);
            warn!(asset = %asset.id(), error = %rejected, "Ignoring replacement");
        }
        None
    }
}

impl std::fmt::Debug for Signals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signals")
            .field("handlers", &self.handlers.read().len())
            .field("missing_resource", &self.missing_resource.read().len())
            .finish()
    }
}
