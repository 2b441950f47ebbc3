//! Filesystem-backed asset loader.
//!
//! Generated kinds (titles, effects, timelines, ...) resolve immediately.
//! File-backed kinds are probed on the rayon pool and their completion is
//! delivered from a worker thread.

use parking_lot::RwLock;
use proxyforge_core::{
    uri, Asset, AssetError, AssetKind, AssetLoader, Completion, IdUpdate,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::MediaError;
use crate::probe::MediaProbe;

/// Resolves assets against the local filesystem and caches the results.
#[derive(Debug, Default)]
pub struct FileAssetLoader {
    cache: Arc<RwLock<HashMap<String, Asset>>>,
    /// Directory pairs `(old, new)` learned from confirmed relocations.
    relocations: RwLock<Vec<(String, String)>>,
}

impl FileAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached resolutions.
    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }

    /// Guess where `id` lives now based on earlier relocations.
    fn relocated_candidate(&self, id: &str) -> Option<String> {
        let relocations = self.relocations.read();
        relocations.iter().rev().find_map(|(old_dir, new_dir)| {
            let rest = id.strip_prefix(old_dir.as_str())?;
            let candidate = format!("{new_dir}{rest}");
            let exists = uri::file_uri_to_path(&candidate).is_some_and(|p| p.is_file());
            exists.then_some(candidate)
        })
    }
}

fn resolve(id: &str, kind: AssetKind) -> Result<Asset, AssetError> {
    let path = uri::file_uri_to_path(id)
        .ok_or_else(|| AssetError::request_failed(id, "only local file URIs are supported"))?;

    match MediaProbe::probe(&path) {
        Ok(probe) => Ok(Asset::new(id, kind).with_metadata(probe.into_metadata())),
        Err(MediaError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AssetError::NotFound { uri: id.to_string() })
        }
        Err(e) => Err(AssetError::request_failed(id, e.to_string())),
    }
}

impl AssetLoader for FileAssetLoader {
    fn request(&self, completion: Completion) {
        let request = completion.request().clone();

        if !request.kind.is_file_backed() {
            trace!(id = %request.id, kind = %request.kind, "Resolved generated asset");
            completion.succeed(Asset::new(request.id, request.kind));
            return;
        }

        if let Some(asset) = self.cache.read().get(&request.id) {
            if asset.kind() == request.kind {
                trace!(id = %request.id, "Asset cache hit");
                completion.succeed(asset.clone());
                return;
            }
        }

        let cache = Arc::clone(&self.cache);
        rayon::spawn(move || {
            let result = resolve(&request.id, request.kind);
            match &result {
                Ok(asset) => {
                    cache.write().insert(request.id.clone(), asset.clone());
                }
                Err(e) => debug!(id = %request.id, error = %e, "Asset resolution failed"),
            }
            completion.complete(result);
        });
    }

    fn request_id_update(&self, asset: &Asset, error: &AssetError) -> IdUpdate {
        if !asset.kind().is_file_backed() || !error.is_missing_resource() {
            return IdUpdate::Unsupported;
        }
        match self.relocated_candidate(asset.id()) {
            Some(candidate) => {
                debug!(id = %asset.id(), candidate = %candidate, "Found asset through earlier relocation");
                IdUpdate::Relocated(candidate)
            }
            None => IdUpdate::Ask,
        }
    }

    fn note_relocation(&self, old_id: &str, new_id: &str) {
        if uri::basename(old_id) != uri::basename(new_id) {
            return;
        }
        let pair = (
            uri::directory(old_id).to_string(),
            uri::directory(new_id).to_string(),
        );
        if pair.0.is_empty() || pair.0 == pair.1 {
            return;
        }
        let mut relocations = self.relocations.write();
        if !relocations.contains(&pair) {
            debug!(from = %pair.0, to = %pair.1, "Remembering relocated directory");
            relocations.push(pair);
        }
    }

    fn needs_reload(&self, _kind: AssetKind, id: &str) {
        if self.cache.write().remove(id).is_some() {
            trace!(id = %id, "Dropped cached asset");
        }
    }
}
