//! The project facade.
//!
//! A [`Project`] owns the registry, resolver and proxy orchestrator and runs
//! them on the thread that owns the project. Loaders and transcode jobs report
//! back through a message channel; nothing changes until the owner calls
//! [`Project::dispatch_pending`] or [`Project::wait_idle`].

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use proxyforge_core::{uri, Asset, AssetKind, AssetLoader, AssetRequest, AssetResult, AssetState, KindFilter};
use proxyforge_media::{EncodingProfile, FfmpegEngine, FileAssetLoader, JobId, TranscodeEngine};
use proxyforge_timeline::{Formatter, SharedTimeline, Timeline, TimelineError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::bindings::TimelineBindings;
use crate::error::{ProjectError, ProjectResult};
use crate::message::ProjectMessage;
use crate::proxy::{self, ProxyContext, ProxyFailure, ProxyOrchestrator, ProxyState, StartOutcome};
use crate::registry::AssetRegistry;
use crate::resolver::MissingResourceResolver;
use crate::settings::ProjectSettings;
use crate::signals::{ProjectEvent, Signals, SubscriptionId};

/// Numbers anonymous projects. Restarts from zero with the process.
static ANONYMOUS_PROJECTS: AtomicU32 = AtomicU32::new(0);

macro_rules! proxy_cx {
    ($project:ident) => {
        ProxyContext {
            registry: &$project.registry,
            loader: &$project.loader,
            engine: &$project.engine,
            signals: &$project.signals,
            bindings: &$project.bindings,
            settings: &$project.settings,
            overrides: &$project.overrides,
            sender: &$project.sender,
        }
    };
}

pub struct Project {
    id: String,
    uri: Option<String>,
    settings: ProjectSettings,
    loader: Arc<dyn AssetLoader>,
    engine: Arc<dyn TranscodeEngine>,
    signals: Arc<Signals>,
    registry: AssetRegistry,
    resolver: MissingResourceResolver,
    orchestrator: ProxyOrchestrator,
    bindings: TimelineBindings,
    /// Per-asset proxy profiles.
    overrides: HashMap<String, EncodingProfile>,
    /// Catalogue of known profiles, most recently added first.
    profiles: Vec<EncodingProfile>,
    timelines: Vec<SharedTimeline>,
    /// Loaded timelines waiting for their assets to settle.
    pending_loaded: Vec<SharedTimeline>,
    sender: Sender<ProjectMessage>,
    receiver: Receiver<ProjectMessage>,
}

impl Project {
    /// Create a project resolving files from disk and transcoding with the
    /// `ffmpeg` found on `PATH`.
    pub fn new(uri: Option<&str>) -> Self {
        Self::with_backends(
            uri,
            Arc::new(FileAssetLoader::new()),
            Arc::new(FfmpegEngine::with_binary("ffmpeg")),
        )
    }

    pub fn with_backends(
        uri: Option<&str>,
        loader: Arc<dyn AssetLoader>,
        engine: Arc<dyn TranscodeEngine>,
    ) -> Self {
        let uri = uri.map(uri::to_uri).filter(|u| {
            let valid = uri::is_valid_uri(u);
            if !valid {
                warn!(uri = %u, "Ignoring invalid project URI");
            }
            valid
        });
        let id = match &uri {
            Some(uri) => uri.clone(),
            None => format!(
                "project-{}",
                ANONYMOUS_PROJECTS.fetch_add(1, Ordering::Relaxed)
            ),
        };

        let signals = Arc::new(Signals::new());
        let (sender, receiver) = unbounded();
        let registry = AssetRegistry::new(Arc::clone(&loader), Arc::clone(&signals), sender.clone());

        debug!(project = %id, "Project created");
        Self {
            id,
            uri,
            settings: ProjectSettings::default(),
            loader,
            engine,
            signals,
            registry,
            resolver: MissingResourceResolver::new(),
            orchestrator: ProxyOrchestrator::new(),
            bindings: TimelineBindings::new(),
            overrides: HashMap::new(),
            profiles: Vec::new(),
            timelines: Vec::new(),
            pending_loaded: Vec::new(),
            sender,
            receiver,
        }
    }

    pub fn with_settings(mut self, settings: ProjectSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Set the project URI. It can only be set once.
    pub fn set_uri(&mut self, location: &str) -> ProjectResult<()> {
        if let Some(current) = &self.uri {
            warn!(project = %self.id, uri = %current, "Project URI already set");
            return Err(ProjectError::UriAlreadySet(current.clone()));
        }
        let location = uri::to_uri(location);
        if !uri::is_valid_uri(&location) {
            warn!(uri = %location, "Invalid project URI");
            return Err(ProjectError::InvalidUri(location));
        }
        self.uri = Some(location);
        Ok(())
    }

    pub fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    /// Set the project-wide proxy profile.
    pub fn set_proxy_profile(&mut self, profile: Option<EncodingProfile>) {
        self.settings.proxy_profile = profile;
    }

    /// Override the proxy profile of one asset.
    pub fn set_asset_proxy_profile(&mut self, asset_id: &str, profile: Option<EncodingProfile>) {
        match profile {
            Some(profile) => {
                self.overrides.insert(asset_id.to_string(), profile);
            }
            None => {
                self.overrides.remove(asset_id);
            }
        }
    }

    /// Profile proxies of `asset_id` are made with: its override, else the
    /// project-wide profile.
    pub fn proxy_profile_for(&self, asset_id: &str) -> Option<&EncodingProfile> {
        proxy::profile_for(&self.overrides, &self.settings, asset_id)
    }

    pub fn set_proxies_location(&mut self, location: Option<&str>) -> ProjectResult<()> {
        self.settings.set_proxies_location(location)
    }

    // ── Observers ───────────────────────────────────────────────────

    pub fn subscribe(&self, handler: impl Fn(&ProjectEvent) + Send + Sync + 'static) -> SubscriptionId {
        self.signals.subscribe(handler)
    }

    pub fn connect_missing_resource(
        &self,
        handler: impl Fn(&proxyforge_core::AssetError, &Asset) -> Option<String> + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.signals.connect_missing_resource(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.signals.unsubscribe(id)
    }

    // ── Assets ──────────────────────────────────────────────────────

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// Request an asset. Returns false if the id is already known.
    pub fn create_asset(&self, id: &str, kind: AssetKind) -> bool {
        self.registry.create(id, kind)
    }

    pub fn add_asset(&self, asset: Asset) -> bool {
        self.registry.add(asset)
    }

    pub fn remove_asset(&self, id: &str) -> bool {
        self.registry.remove(id)
    }

    pub fn get_asset(&self, id: &str, filter: impl Into<KindFilter>) -> Option<Asset> {
        self.registry.get(id, filter)
    }

    pub fn list_assets(&self, filter: impl Into<KindFilter>) -> Vec<Asset> {
        self.registry.list(filter)
    }

    pub fn list_proxies(&self, filter: impl Into<KindFilter>) -> Vec<Asset> {
        self.registry.list_proxies(filter)
    }

    pub fn proxy_for(&self, parent_id: &str) -> Option<Asset> {
        self.registry.proxy_for(parent_id)
    }

    pub fn loading_assets(&self) -> Vec<Asset> {
        self.registry.loading_assets()
    }

    pub fn asset_state(&self, id: &str) -> Option<AssetState> {
        self.registry.state_of(id)
    }

    // ── Encoding profiles ───────────────────────────────────────────

    /// Add a profile to the catalogue, replacing one with the same name.
    ///
    /// Returns true if a profile was replaced.
    pub fn add_encoding_profile(&mut self, profile: EncodingProfile) -> bool {
        match self.profiles.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => {
                *existing = profile;
                true
            }
            None => {
                self.profiles.insert(0, profile);
                false
            }
        }
    }

    pub fn list_encoding_profiles(&self) -> &[EncodingProfile] {
        &self.profiles
    }

    // ── Documents ───────────────────────────────────────────────────

    fn claim(&self, timeline: &mut Timeline) -> ProjectResult<()> {
        match timeline.project() {
            Some(owner) if owner != self.id => {
                Err(TimelineError::NotOwned(owner.to_string()).into())
            }
            _ => {
                timeline.set_project(Some(self.id.clone()));
                Ok(())
            }
        }
    }

    /// Load the project document into `timeline`.
    ///
    /// Every referenced asset is requested; [`ProjectEvent::Loaded`] follows
    /// once none of them is loading anymore. A project without URI loads an
    /// empty timeline.
    pub fn load(&mut self, timeline: &SharedTimeline, formatter: &dyn Formatter) -> ProjectResult<()> {
        let references: Vec<AssetRequest> = {
            let mut tl = timeline.write();
            self.claim(&mut tl)?;
            match &self.uri {
                Some(uri) => formatter.load(&mut tl, uri)?,
                None => Vec::new(),
            }
        };

        info!(project = %self.id, assets = references.len(), "Loading project");
        for reference in references {
            self.registry.create(&reference.id, reference.kind);
        }

        if !self.timelines.iter().any(|t| Arc::ptr_eq(t, timeline)) {
            self.timelines.push(Arc::clone(timeline));
        }
        self.pending_loaded.push(Arc::clone(timeline));
        Ok(())
    }

    /// Save `timeline` to `location`. An anonymous project adopts the location.
    pub fn save(
        &mut self,
        timeline: &SharedTimeline,
        location: &str,
        formatter: &dyn Formatter,
        overwrite: bool,
    ) -> ProjectResult<()> {
        let location = uri::to_uri(location);
        if !uri::is_valid_uri(&location) {
            return Err(ProjectError::InvalidUri(location));
        }
        {
            let mut tl = timeline.write();
            self.claim(&mut tl)?;
            formatter.save(&tl, &location, overwrite)?;
        }
        info!(project = %self.id, uri = %location, "Project saved");
        if self.uri.is_none() {
            self.uri = Some(location);
        }
        Ok(())
    }

    // ── Proxies ─────────────────────────────────────────────────────

    /// Opt a timeline in or out of proxy substitution.
    pub fn use_proxies_for_timeline(&mut self, timeline: &SharedTimeline, enabled: bool) -> bool {
        self.bindings.set(timeline, enabled)
    }

    pub fn start_proxy_creation(&mut self) -> StartOutcome {
        let cx = proxy_cx!(self);
        self.orchestrator.start(&cx)
    }

    pub fn pause_proxy_creation(&mut self) -> ProjectResult<()> {
        let cx = proxy_cx!(self);
        self.orchestrator.pause(&cx)
    }

    pub fn cancel_proxy_creation(&mut self) -> ProjectResult<()> {
        let cx = proxy_cx!(self);
        self.orchestrator.cancel(&cx)
    }

    /// Transcode a proxy of one asset outside bulk creation.
    pub fn request_proxy_for(&mut self, asset_id: &str) -> ProjectResult<JobId> {
        let cx = proxy_cx!(self);
        self.orchestrator.request_proxy_for(&cx, asset_id)
    }

    pub fn proxy_state(&self) -> ProxyState {
        self.orchestrator.state()
    }

    pub fn proxy_errors(&self) -> &[ProxyFailure] {
        self.orchestrator.failures()
    }

    pub fn active_job(&self) -> Option<JobId> {
        self.orchestrator.active_job()
    }

    // ── Message loop ────────────────────────────────────────────────

    /// Handle every completion received so far without blocking.
    ///
    /// Returns the number of messages handled.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.receiver.try_recv() {
            self.handle(message);
            handled += 1;
        }
        self.settle();
        handled
    }

    /// Whether no request, probe or job is outstanding.
    pub fn is_idle(&self) -> bool {
        self.receiver.is_empty()
            && self.pending_loaded.is_empty()
            && !self.registry.is_loading_any()
            && !self.orchestrator.is_busy()
    }

    /// Handle completions until the project is idle or `timeout` elapses.
    ///
    /// Returns whether the project became idle.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.dispatch_pending();
            if self.is_idle() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.receiver.recv_timeout(remaining) {
                Ok(message) => self.handle(message),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return self.is_idle(),
            }
        }
    }

    fn handle(&mut self, message: ProjectMessage) {
        match message {
            ProjectMessage::AssetLoaded { request, result } => self.on_asset_loaded(request, result),
            ProjectMessage::ProxyProbed { token, result } => {
                let cx = proxy_cx!(self);
                self.orchestrator.handle_probe(&cx, token, result);
            }
            ProjectMessage::JobFinished(report) => {
                let cx = proxy_cx!(self);
                self.orchestrator.handle_job(&cx, report);
            }
        }
    }

    fn on_asset_loaded(&mut self, request: AssetRequest, result: AssetResult<Asset>) {
        let Some(pending) = self.registry.loading(&request.id) else {
            debug!(asset = %request.id, "Dropping completion of an asset no longer loading");
            return;
        };

        match result {
            Ok(asset) => {
                if let Some(retry) = self.resolver.settle(&request.id) {
                    self.relocated(&retry.original, asset.id());
                }
                if !self.registry.add(asset) {
                    self.registry.forget_loading(&request.id);
                }
            }
            Err(error) => {
                if let Some(retry) = self.resolver.settle(&request.id) {
                    // the replacement failed too, no second resolution
                    self.registry.mark_errored(&retry.original, &error);
                    if !retry.shared {
                        self.registry.forget_loading(&request.id);
                        return;
                    }
                    // requested on its own as well, so it gets its own pass
                }

                let Some(new_id) = self.resolver.resolve(
                    &self.registry,
                    self.loader.as_ref(),
                    &self.signals,
                    &pending,
                    &error,
                ) else {
                    return;
                };

                if !self.registry.create(&new_id, pending.kind()) {
                    self.replacement_known(&new_id, &error);
                }
            }
        }
    }

    /// The replacement id was already known, so no request was issued.
    fn replacement_known(&mut self, new_id: &str, error: &proxyforge_core::AssetError) {
        match self.registry.state_of(new_id) {
            // settles through the request already in flight
            Some(AssetState::Loading) => {
                self.resolver.share(new_id);
            }
            Some(AssetState::Loaded) => {
                if let Some(retry) = self.resolver.settle(new_id) {
                    self.relocated(&retry.original, new_id);
                }
            }
            _ => {
                if let Some(retry) = self.resolver.settle(new_id) {
                    self.registry.mark_errored(&retry.original, error);
                }
            }
        }
    }

    fn relocated(&self, original: &Asset, new_id: &str) {
        info!(asset = %original.id(), new_id = %new_id, "Missing asset relocated");
        self.loader.note_relocation(original.id(), new_id);
        for timeline in &self.timelines {
            let mut timeline = timeline.write();
            if timeline.rebind_asset(original.id(), new_id) > 0 {
                timeline.commit();
            }
        }
    }

    fn settle(&mut self) {
        if self.registry.is_loading_any() {
            return;
        }

        if !self.pending_loaded.is_empty() {
            for timeline in std::mem::take(&mut self.pending_loaded) {
                let id = {
                    let mut timeline = timeline.write();
                    timeline.commit();
                    timeline.id
                };
                info!(project = %self.id, timeline = %id, "Project loaded");
                self.signals.emit(ProjectEvent::Loaded { timeline: id });
            }
            if self.orchestrator.state() == ProxyState::Idle && self.settings.proxy_profile.is_some() {
                self.start_proxy_creation();
            }
        }

        if self.orchestrator.is_deferred() {
            self.start_proxy_creation();
        }
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("id", &self.id)
            .field("uri", &self.uri)
            .field("registry", &self.registry)
            .field("proxy_state", &self.orchestrator.state())
            .finish_non_exhaustive()
    }
}
