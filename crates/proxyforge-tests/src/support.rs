//! Scripted collaborators shared by the integration tests.

use parking_lot::Mutex;
use proxyforge_core::{uri, Asset, AssetError, AssetKind, AssetLoader, AssetRequest, AssetResult, Completion};
use proxyforge_media::{
    EncodingProfile, JobControl, MediaError, MediaResult, Pipeline, TranscodeEngine, TranscodeRequest,
};
use proxyforge_project::{Project, ProjectEvent, ProjectSettings};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const TIMEOUT: Duration = Duration::from_secs(10);

// ── Loader ─────────────────────────────────────────────────────

/// Resolves ids that were declared or exist on disk; everything else is
/// missing. Completions are delivered inline unless held.
#[derive(Default)]
pub struct ManualLoader {
    known: Mutex<HashSet<String>>,
    hold: AtomicBool,
    pending: Mutex<Vec<Completion>>,
    requests: Mutex<Vec<AssetRequest>>,
    reloads: Mutex<Vec<String>>,
}

impl ManualLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `id` resolvable without a backing file.
    pub fn declare(&self, id: &str) {
        self.known.lock().insert(id.to_string());
    }

    /// Queue completions instead of delivering them inline.
    pub fn hold(&self, hold: bool) {
        self.hold.store(hold, Ordering::SeqCst);
    }

    /// Deliver the held completion of `id`, if any.
    pub fn release(&self, id: &str) -> bool {
        let completion = {
            let mut pending = self.pending.lock();
            let index = pending.iter().position(|c| c.request().id == id);
            index.map(|i| pending.remove(i))
        };
        match completion {
            Some(completion) => {
                let result = self.resolve(completion.request());
                completion.complete(result);
                true
            }
            None => false,
        }
    }

    pub fn requests_for(&self, id: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.id == id).count()
    }

    pub fn reloads(&self) -> Vec<String> {
        self.reloads.lock().clone()
    }

    fn resolve(&self, request: &AssetRequest) -> AssetResult<Asset> {
        let on_disk = uri::file_uri_to_path(&request.id).is_some_and(|p| p.is_file());
        if on_disk || self.known.lock().contains(&request.id) {
            Ok(Asset::new(request.id.as_str(), request.kind))
        } else {
            Err(AssetError::NotFound {
                uri: request.id.clone(),
            })
        }
    }
}

impl AssetLoader for ManualLoader {
    fn request(&self, completion: Completion) {
        self.requests.lock().push(completion.request().clone());
        if self.hold.load(Ordering::SeqCst) {
            self.pending.lock().push(completion);
            return;
        }
        let result = self.resolve(completion.request());
        completion.complete(result);
    }

    fn needs_reload(&self, _kind: AssetKind, id: &str) {
        self.reloads.lock().push(id.to_string());
    }
}

// ── Engine ─────────────────────────────────────────────────────

#[derive(Default)]
struct EngineState {
    launches: Mutex<Vec<TranscodeRequest>>,
    refuse: Mutex<HashSet<String>>,
    fail: Mutex<HashSet<String>>,
    blocked: Mutex<HashSet<String>>,
    saw_pause: AtomicBool,
    /// Time a cancelled pipeline takes to shut down.
    teardown: Mutex<Duration>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

/// Pretends to transcode by writing the in-progress file.
#[derive(Default)]
pub struct ScriptedEngine {
    state: Arc<EngineState>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail to launch for `source`.
    pub fn refuse(&self, source: &str) {
        self.state.refuse.lock().insert(source.to_string());
    }

    /// Launch for `source` but fail while running.
    pub fn fail(&self, source: &str) {
        self.state.fail.lock().insert(source.to_string());
    }

    /// Keep the pipeline for `source` running until released or cancelled.
    pub fn block(&self, source: &str) {
        self.state.blocked.lock().insert(source.to_string());
    }

    pub fn unblock(&self, source: &str) {
        self.state.blocked.lock().remove(source);
    }

    pub fn launches(&self) -> Vec<TranscodeRequest> {
        self.state.launches.lock().clone()
    }

    pub fn launched_sources(&self) -> Vec<String> {
        self.launches().into_iter().map(|r| r.source_uri).collect()
    }

    pub fn saw_pause(&self) -> bool {
        self.state.saw_pause.load(Ordering::SeqCst)
    }

    /// Make cancelled pipelines linger for `delay` before returning.
    pub fn teardown(&self, delay: Duration) {
        *self.state.teardown.lock() = delay;
    }

    /// Most pipelines ever running at the same time.
    pub fn peak_running(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }
}

/// Counts a pipeline as running while alive.
struct Running<'a>(&'a EngineState);

impl<'a> Running<'a> {
    fn enter(state: &'a EngineState) -> Self {
        let now = state.running.fetch_add(1, Ordering::SeqCst) + 1;
        state.peak.fetch_max(now, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.running.fetch_sub(1, Ordering::SeqCst);
    }
}

struct ScriptedPipeline {
    state: Arc<EngineState>,
    request: TranscodeRequest,
}

impl Pipeline for ScriptedPipeline {
    fn run(&mut self, control: &JobControl) -> MediaResult<()> {
        let _running = Running::enter(&self.state);
        let source = self.request.source_uri.as_str();
        let output = uri::file_uri_to_path(&self.request.in_progress_uri())
            .ok_or_else(|| MediaError::Unsupported("non-file output".into()))?;
        std::fs::write(&output, b"partial")?;
        while self.state.blocked.lock().contains(source) && !control.is_cancelled() {
            if control.is_paused() {
                self.state.saw_pause.store(true, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        if control.is_cancelled() {
            let delay = *self.state.teardown.lock();
            std::thread::sleep(delay);
            return Err(MediaError::Cancelled);
        }
        if self.state.fail.lock().contains(source) {
            return Err(MediaError::Pipeline(format!("cannot decode {source}")));
        }
        std::fs::write(output, b"proxy")?;
        Ok(())
    }
}

impl TranscodeEngine for ScriptedEngine {
    fn launch(&self, request: &TranscodeRequest) -> MediaResult<Box<dyn Pipeline>> {
        if self.state.refuse.lock().contains(&request.source_uri) {
            return Err(MediaError::Pipeline("no decoder".into()));
        }
        self.state.launches.lock().push(request.clone());
        Ok(Box::new(ScriptedPipeline {
            state: Arc::clone(&self.state),
            request: request.clone(),
        }))
    }
}

// ── Project helpers ────────────────────────────────────────────

/// Records every project event.
#[derive(Clone, Default)]
pub struct Events(Arc<Mutex<Vec<ProjectEvent>>>);

impl Events {
    pub fn attach(project: &Project) -> Self {
        let events = Self::default();
        let sink = Arc::clone(&events.0);
        project.subscribe(move |e| sink.lock().push(e.clone()));
        events
    }

    pub fn count(&self, pred: impl Fn(&ProjectEvent) -> bool) -> usize {
        self.0.lock().iter().filter(|e| pred(e)).count()
    }

    pub fn snapshot(&self) -> Vec<ProjectEvent> {
        self.0.lock().clone()
    }

    /// Index of the first matching event.
    pub fn position(&self, pred: impl Fn(&ProjectEvent) -> bool) -> Option<usize> {
        self.0.lock().iter().position(|e| pred(e))
    }
}

pub fn project_with(
    loader: &Arc<ManualLoader>,
    engine: &Arc<ScriptedEngine>,
    profile: Option<EncodingProfile>,
) -> Project {
    Project::with_backends(None, loader.clone(), engine.clone()).with_settings(ProjectSettings {
        proxy_profile: profile,
        ..Default::default()
    })
}

/// Create empty media files and return their URIs.
pub fn media_files(dir: &Path, names: &[&str]) -> Vec<String> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            std::fs::write(&path, b"media").expect("failed to write media file");
            uri::path_to_file_uri(&path)
        })
        .collect()
}

/// Dispatch until `done` holds or the timeout expires.
pub fn pump_until(project: &mut Project, done: impl Fn(&Project) -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        project.dispatch_pending();
        if done(project) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

/// Create `ids` as clips and wait until they are loaded.
pub fn import(project: &mut Project, ids: &[String]) {
    for id in ids {
        assert!(project.create_asset(id, AssetKind::UriClip));
    }
    assert!(project.wait_idle(TIMEOUT));
}
