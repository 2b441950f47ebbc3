//! Authoritative store of asset identity and state.
//!
//! Every id lives in at most one of four sets: `loading`, `loaded`,
//! `errored` or `proxies`. Loaded assets keep their insertion order, which is
//! the order listings and proxy queues see them in.

use crossbeam_channel::Sender;
use parking_lot::RwLock;
use proxyforge_core::{
    Asset, AssetError, AssetKind, AssetLoader, AssetRequest, AssetState, Completion, KindFilter,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ProjectError, ProjectResult};
use crate::message::ProjectMessage;
use crate::signals::{ProjectEvent, Signals};

#[derive(Debug, Default)]
struct RegistryState {
    loading: HashMap<String, Asset>,
    loaded: HashMap<String, Asset>,
    /// Insertion order of `loaded`.
    order: Vec<String>,
    errored: HashMap<String, Asset>,
    /// Keyed by proxy id; the parent is on the asset.
    proxies: HashMap<String, Asset>,
}

impl RegistryState {
    fn state_of(&self, id: &str) -> Option<AssetState> {
        if self.loading.contains_key(id) {
            Some(AssetState::Loading)
        } else if self.loaded.contains_key(id) {
            Some(AssetState::Loaded)
        } else if self.errored.contains_key(id) {
            Some(AssetState::Errored)
        } else if self.proxies.contains_key(id) {
            Some(AssetState::Proxy)
        } else {
            None
        }
    }
}

pub struct AssetRegistry {
    state: RwLock<RegistryState>,
    loader: Arc<dyn AssetLoader>,
    signals: Arc<Signals>,
    sender: Sender<ProjectMessage>,
}

impl AssetRegistry {
    pub(crate) fn new(
        loader: Arc<dyn AssetLoader>,
        signals: Arc<Signals>,
        sender: Sender<ProjectMessage>,
    ) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            loader,
            signals,
            sender,
        }
    }

    /// Request `id` as an asset of `kind`.
    ///
    /// Returns false, without issuing a request, if the id is already known.
    pub fn create(&self, id: &str, kind: AssetKind) -> bool {
        {
            let mut state = self.state.write();
            if state.state_of(id).is_some() {
                debug!(asset = %id, "Asset already known, not requesting again");
                return false;
            }
            state.loading.insert(id.to_string(), Asset::new(id, kind));
        }

        debug!(asset = %id, kind = %kind, "Requesting asset");
        let sender = self.sender.clone();
        self.loader.request(Completion::new(
            AssetRequest::new(id, kind),
            move |request, result| {
                let _ = sender.send(ProjectMessage::AssetLoaded { request, result });
            },
        ));
        true
    }

    /// Store a resolved asset.
    ///
    /// Returns false if its id is already loaded.
    pub fn add(&self, asset: Asset) -> bool {
        {
            let mut state = self.state.write();
            if state.loaded.contains_key(asset.id()) {
                return false;
            }
            state.loading.remove(asset.id());
            state.errored.remove(asset.id());
            state.order.push(asset.id().to_string());
            state.loaded.insert(asset.id().to_string(), asset.clone());
        }
        debug!(asset = %asset.id(), "Asset added");
        self.signals.emit(ProjectEvent::AssetAdded(asset));
        true
    }

    /// Remove a loaded asset. Returns whether removal occurred.
    pub fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.state.write();
            let removed = state.loaded.remove(id);
            if removed.is_some() {
                state.order.retain(|o| o != id);
            }
            removed
        };
        match removed {
            Some(asset) => {
                debug!(asset = %id, "Asset removed");
                self.signals.emit(ProjectEvent::AssetRemoved(asset));
                true
            }
            None => false,
        }
    }

    /// A loaded asset whose kind matches `filter`.
    pub fn get(&self, id: &str, filter: impl Into<KindFilter>) -> Option<Asset> {
        let filter = filter.into();
        self.state
            .read()
            .loaded
            .get(id)
            .filter(|a| filter.matches(a.kind()))
            .cloned()
    }

    /// Loaded assets matching `filter`, in insertion order.
    pub fn list(&self, filter: impl Into<KindFilter>) -> Vec<Asset> {
        let filter = filter.into();
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.loaded.get(id))
            .filter(|a| filter.matches(a.kind()))
            .cloned()
            .collect()
    }

    /// Settle `asset` as errored and notify observers.
    ///
    /// Returns false, without notifying, if the id already errored.
    pub fn mark_errored(&self, asset: &Asset, error: &AssetError) -> bool {
        {
            let mut state = self.state.write();
            state.loading.remove(asset.id());
            if state.errored.contains_key(asset.id()) {
                debug!(asset = %asset.id(), "Asset failed again");
                return false;
            }
            state.errored.insert(asset.id().to_string(), asset.clone());
        }
        debug!(asset = %asset.id(), error = %error, "Asset errored");
        self.signals.emit(ProjectEvent::ErrorLoadingAsset {
            error: error.clone(),
            id: asset.id().to_string(),
            kind: asset.kind(),
        });
        true
    }

    /// Drop `id` from `loading` without settling it.
    pub fn forget_loading(&self, id: &str) -> Option<Asset> {
        self.state.write().loading.remove(id)
    }

    /// Redirect a loading asset to `new_id`.
    pub fn set_loading_proxy(&self, id: &str, new_id: &str) -> bool {
        self.state
            .write()
            .loading
            .get_mut(id)
            .is_some_and(|a| a.set_proxy(new_id))
    }

    pub fn loading(&self, id: &str) -> Option<Asset> {
        self.state.read().loading.get(id).cloned()
    }

    pub fn loading_assets(&self) -> Vec<Asset> {
        self.state.read().loading.values().cloned().collect()
    }

    pub fn is_loading_any(&self) -> bool {
        !self.state.read().loading.is_empty()
    }

    pub fn errored_ids(&self) -> Vec<String> {
        self.state.read().errored.keys().cloned().collect()
    }

    /// Register `proxy` as the proxy of the loaded asset `parent_id`.
    ///
    /// Replaces a previous proxy of the same parent.
    pub fn add_proxy(&self, parent_id: &str, mut proxy: Asset) -> ProjectResult<Asset> {
        let mut state = self.state.write();
        let Some(parent) = state.loaded.get_mut(parent_id) else {
            return Err(ProjectError::ParentNotLoaded(parent_id.to_string()));
        };
        if !parent.set_proxy(proxy.id()) {
            return Err(ProjectError::InvalidUri(proxy.id().to_string()));
        }
        proxy.set_parent(parent);

        if matches!(
            state.state_of(proxy.id()),
            Some(AssetState::Loaded | AssetState::Loading | AssetState::Errored)
        ) {
            debug!(proxy = %proxy.id(), "Proxy id was known as a plain asset, reclassifying");
            state.loading.remove(proxy.id());
            state.errored.remove(proxy.id());
            if state.loaded.remove(proxy.id()).is_some() {
                let id = proxy.id().to_string();
                state.order.retain(|o| *o != id);
            }
        }
        state
            .proxies
            .retain(|_, p| p.parent() != Some(parent_id) || p.id() == proxy.id());
        state.proxies.insert(proxy.id().to_string(), proxy.clone());
        debug!(parent = %parent_id, proxy = %proxy.id(), "Proxy registered");
        Ok(proxy)
    }

    /// The registered proxy of `parent_id`.
    pub fn proxy_for(&self, parent_id: &str) -> Option<Asset> {
        self.state
            .read()
            .proxies
            .values()
            .find(|p| p.parent() == Some(parent_id))
            .cloned()
    }

    /// Registered proxies whose kind matches `filter`.
    pub fn list_proxies(&self, filter: impl Into<KindFilter>) -> Vec<Asset> {
        let filter = filter.into();
        self.state
            .read()
            .proxies
            .values()
            .filter(|p| filter.matches(p.kind()))
            .cloned()
            .collect()
    }

    pub fn state_of(&self, id: &str) -> Option<AssetState> {
        self.state.read().state_of(id)
    }
}

impl std::fmt::Debug for AssetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("AssetRegistry")
            .field("loading", &state.loading.len())
            .field("loaded", &state.loaded.len())
            .field("errored", &state.errored.len())
            .field("proxies", &state.proxies.len())
            .finish()
    }
}
