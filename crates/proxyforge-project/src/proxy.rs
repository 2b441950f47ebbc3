//! Sequential proxy generation.
//!
//! The orchestrator snapshots the loaded file-backed assets when bulk creation
//! starts and visits each of them exactly once, in that order. A step first
//! tries to resolve an existing proxy at the derived output URI; only if that
//! fails is a transcode job started, and its output is resolved once the job
//! finishes. At most one job runs per project, whether it belongs to the bulk
//! queue or to a single-asset request.
//!
//! All completions arrive as [`ProjectMessage`]s, so every transition here
//! happens on the project's thread.

use crossbeam_channel::Sender;
use proxyforge_core::{
    Asset, AssetKind, AssetLoader, AssetRequest, AssetResult, Completion, KindFilter,
};
use proxyforge_media::{
    EncodingProfile, JobId, JobOutcome, JobReport, TranscodeEngine, TranscodeJob, TranscodeRequest,
};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::bindings::TimelineBindings;
use crate::error::{ProjectError, ProjectResult};
use crate::message::ProjectMessage;
use crate::registry::AssetRegistry;
use crate::settings::ProjectSettings;
use crate::signals::{ProjectEvent, Signals};

/// Where bulk proxy creation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyState {
    #[default]
    Idle,
    Started,
    /// Working on one queued asset.
    Stepping,
    /// The active transcode is held.
    Paused,
    Cancelled,
    /// Every queued asset was visited.
    Created,
}

impl fmt::Display for ProxyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Started => "started",
            Self::Stepping => "stepping",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
            Self::Created => "created",
        };
        f.write_str(name)
    }
}

/// Result of asking bulk creation to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyStarted,
    /// A paused run continues.
    Resumed,
    /// No project-wide profile is configured; nothing happens.
    NoProfile,
    /// Assets are still loading or a single-asset job runs; creation starts
    /// once they settle.
    Deferred,
}

/// A proxy that could not be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyFailure {
    pub asset_id: String,
    pub error: String,
}

/// Project state the orchestrator works against.
pub(crate) struct ProxyContext<'a> {
    pub registry: &'a AssetRegistry,
    pub loader: &'a Arc<dyn AssetLoader>,
    pub engine: &'a Arc<dyn TranscodeEngine>,
    pub signals: &'a Signals,
    pub bindings: &'a TimelineBindings,
    pub settings: &'a ProjectSettings,
    /// Per-asset profile overrides.
    pub overrides: &'a HashMap<String, EncodingProfile>,
    pub sender: &'a Sender<ProjectMessage>,
}

/// The override of `asset_id`, else the project-wide profile.
pub(crate) fn profile_for<'a>(
    overrides: &'a HashMap<String, EncodingProfile>,
    settings: &'a ProjectSettings,
    asset_id: &str,
) -> Option<&'a EncodingProfile> {
    overrides.get(asset_id).or(settings.proxy_profile.as_ref())
}

impl ProxyContext<'_> {
    fn profile_for(&self, asset_id: &str) -> Option<EncodingProfile> {
        profile_for(self.overrides, self.settings, asset_id).cloned()
    }

    /// Resolve `uri` through the loader; the result comes back tagged with `token`.
    fn probe(&self, token: u64, uri: &str, kind: AssetKind) {
        trace!(uri = %uri, token, "Resolving proxy output");
        let sender = self.sender.clone();
        self.loader.request(Completion::new(
            AssetRequest::new(uri, kind),
            move |_, result| {
                let _ = sender.send(ProjectMessage::ProxyProbed { token, result });
            },
        ));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Looking for an existing proxy.
    Probing,
    Transcoding,
    /// Resolving freshly transcoded output.
    Verifying,
}

#[derive(Debug)]
struct Step {
    asset_id: String,
    kind: AssetKind,
    output_uri: String,
    phase: Phase,
    /// Matches the probe this step waits for.
    token: u64,
    job: Option<TranscodeJob>,
}

impl Step {
    fn job_id(&self) -> Option<JobId> {
        self.job.as_ref().map(TranscodeJob::id)
    }
}

#[derive(Debug, Default)]
pub struct ProxyOrchestrator {
    state: ProxyState,
    queue: VecDeque<String>,
    current: Option<Step>,
    /// Single-asset request, outside the bulk queue.
    manual: Option<Step>,
    /// Cancelled jobs whose final report has not arrived yet.
    draining: Vec<TranscodeJob>,
    deferred: bool,
    next_token: u64,
    failures: Vec<ProxyFailure>,
}

impl ProxyOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ProxyState {
        self.state
    }

    pub fn failures(&self) -> &[ProxyFailure] {
        &self.failures
    }

    /// Whether a bulk start waits for loading or another job to end.
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Whether any step, job or probe is outstanding.
    pub fn is_busy(&self) -> bool {
        self.current.is_some() || self.manual.is_some() || !self.draining.is_empty()
    }

    /// Ids still queued, current step excluded.
    pub fn queued(&self) -> Vec<String> {
        self.queue.iter().cloned().collect()
    }

    pub fn active_job(&self) -> Option<JobId> {
        self.current
            .as_ref()
            .and_then(Step::job_id)
            .or_else(|| self.manual.as_ref().and_then(Step::job_id))
    }

    /// A single-asset step runs, or a cancelled job has not wound down yet.
    fn has_job_in_flight(&self) -> bool {
        self.manual.is_some() || !self.draining.is_empty()
    }

    fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    pub(crate) fn start(&mut self, cx: &ProxyContext<'_>) -> StartOutcome {
        match self.state {
            ProxyState::Started | ProxyState::Stepping | ProxyState::Created => {
                debug!(state = %self.state, "Proxy creation already started");
                StartOutcome::AlreadyStarted
            }
            ProxyState::Paused => {
                self.resume(cx);
                StartOutcome::Resumed
            }
            ProxyState::Idle | ProxyState::Cancelled => {
                if cx.settings.proxy_profile.is_none() {
                    debug!("No project-wide proxy profile, not creating proxies");
                    return StartOutcome::NoProfile;
                }
                if cx.registry.is_loading_any() || self.has_job_in_flight() {
                    debug!("Deferring proxy creation");
                    self.deferred = true;
                    return StartOutcome::Deferred;
                }
                self.deferred = false;

                let suffix = cx.settings.proxy_suffix.as_str();
                self.queue = cx
                    .registry
                    .list(KindFilter::FileBacked)
                    .into_iter()
                    .filter(|a| !a.is_proxy() && !a.id().ends_with(suffix))
                    .map(|a| a.id().to_string())
                    .collect();
                self.state = ProxyState::Started;

                info!(assets = self.queue.len(), "Proxy creation started");
                cx.signals.emit(ProjectEvent::ProxiesCreationStarted);
                self.advance(cx);
                StartOutcome::Started
            }
        }
    }

    fn resume(&mut self, cx: &ProxyContext<'_>) {
        if let Some(job) = self.current.as_ref().and_then(|s| s.job.as_ref()) {
            job.resume();
        }
        self.state = ProxyState::Stepping;
        info!("Proxy creation resumed");
        // Steps that finished while paused left nothing to resume.
        if self.current.is_none() {
            self.advance(cx);
        }
    }

    /// Hold the active transcode.
    pub(crate) fn pause(&mut self, cx: &ProxyContext<'_>) -> ProjectResult<()> {
        if self.state != ProxyState::Stepping {
            return Err(ProjectError::InvalidState {
                operation: "pause",
                state: self.state,
            });
        }
        let job = self
            .current
            .as_ref()
            .and_then(|s| s.job.as_ref())
            .ok_or(ProjectError::NoActiveJob)?;
        job.pause();
        self.state = ProxyState::Paused;
        info!(job = %job.id(), "Proxy creation paused");
        cx.signals.emit(ProjectEvent::ProxiesCreationPaused);
        Ok(())
    }

    /// Stop bulk creation. Registered proxies stay.
    pub(crate) fn cancel(&mut self, cx: &ProxyContext<'_>) -> ProjectResult<()> {
        if !matches!(
            self.state,
            ProxyState::Started | ProxyState::Stepping | ProxyState::Paused
        ) {
            return Err(ProjectError::InvalidState {
                operation: "cancel",
                state: self.state,
            });
        }

        let dropped = self.queue.len();
        self.queue.clear();
        if let Some(mut step) = self.current.take() {
            if let Some(mut job) = step.job.take() {
                job.resume();
                job.cancel();
                self.draining.push(job);
            }
        }
        self.state = ProxyState::Cancelled;
        self.deferred = false;

        info!(dropped, "Proxy creation cancelled");
        cx.signals.emit(ProjectEvent::ProxiesCreationCancelled);
        Ok(())
    }

    /// Transcode a proxy of one loaded asset outside the bulk queue.
    ///
    /// Uses the asset's profile override, falling back to the project-wide
    /// profile.
    pub(crate) fn request_proxy_for(
        &mut self,
        cx: &ProxyContext<'_>,
        asset_id: &str,
    ) -> ProjectResult<JobId> {
        let bulk_running = matches!(
            self.state,
            ProxyState::Started | ProxyState::Stepping | ProxyState::Paused
        );
        if bulk_running || self.has_job_in_flight() {
            return Err(ProjectError::JobActive);
        }
        let asset = cx
            .registry
            .get(asset_id, KindFilter::FileBacked)
            .ok_or_else(|| ProjectError::UnknownAsset(asset_id.to_string()))?;

        let mut step = Step {
            asset_id: asset.id().to_string(),
            kind: asset.kind(),
            output_uri: cx.settings.proxy_uri_for(asset.id()),
            phase: Phase::Transcoding,
            token: self.next_token(),
            job: None,
        };
        launch(cx, &mut step)?;

        let job = step.job_id().ok_or(ProjectError::NoActiveJob)?;
        info!(asset = %asset_id, job = %job, "Proxy requested");
        self.manual = Some(step);
        Ok(job)
    }

    /// Pop queued assets until one needs work, or finish.
    fn advance(&mut self, cx: &ProxyContext<'_>) {
        while matches!(self.state, ProxyState::Started | ProxyState::Stepping) {
            let Some(asset_id) = self.queue.pop_front() else {
                self.finish(cx);
                return;
            };
            let Some(asset) = cx.registry.get(&asset_id, KindFilter::FileBacked) else {
                debug!(asset = %asset_id, "Asset gone before its proxy step");
                continue;
            };
            self.state = ProxyState::Stepping;

            if let Some(proxy) = cx.registry.proxy_for(&asset_id) {
                debug!(asset = %asset_id, proxy = %proxy.id(), "Proxy already registered");
                cx.bindings.substitute(&asset_id, proxy.id());
                continue;
            }

            let output_uri = cx.settings.proxy_uri_for(&asset_id);
            let token = self.next_token();
            debug!(asset = %asset_id, output = %output_uri, "Proxy step");
            cx.probe(token, &output_uri, asset.kind());
            self.current = Some(Step {
                asset_id,
                kind: asset.kind(),
                output_uri,
                phase: Phase::Probing,
                token,
                job: None,
            });
            return;
        }
    }

    fn finish(&mut self, cx: &ProxyContext<'_>) {
        self.state = ProxyState::Created;
        self.current = None;
        info!(failed = self.failures.len(), "Proxies created");
        cx.signals.emit(ProjectEvent::ProxiesCreated);
    }

    pub(crate) fn handle_probe(
        &mut self,
        cx: &ProxyContext<'_>,
        token: u64,
        result: AssetResult<Asset>,
    ) {
        if self.current.as_ref().is_some_and(|s| s.token == token) {
            let Some(mut step) = self.current.take() else {
                return;
            };
            if self.continue_step(cx, &mut step, result) {
                self.current = Some(step);
            } else {
                self.advance(cx);
            }
        } else if self.manual.as_ref().is_some_and(|s| s.token == token) {
            let Some(mut step) = self.manual.take() else {
                return;
            };
            if self.continue_step(cx, &mut step, result) {
                self.manual = Some(step);
            }
        } else {
            trace!(token, "Ignoring stale proxy probe");
        }
    }

    pub(crate) fn handle_job(&mut self, cx: &ProxyContext<'_>, report: JobReport) {
        if let Some(index) = self.draining.iter().position(|j| j.id() == report.job) {
            self.draining.remove(index);
            debug!(job = %report.job, "Cancelled job wound down");
            return;
        }

        let bulk = self.current.as_ref().and_then(Step::job_id) == Some(report.job);
        let manual = self.manual.as_ref().and_then(Step::job_id) == Some(report.job);
        let step = if bulk {
            self.current.take()
        } else if manual {
            self.manual.take()
        } else {
            trace!(job = %report.job, "Ignoring report of unknown job");
            return;
        };
        let Some(mut step) = step else {
            return;
        };
        step.job = None;
        if bulk && self.state == ProxyState::Paused {
            self.state = ProxyState::Stepping;
        }

        let pending = match report.outcome {
            JobOutcome::Completed { output_uri } => {
                cx.loader.needs_reload(step.kind, &output_uri);
                step.phase = Phase::Verifying;
                step.token = self.next_token();
                cx.probe(step.token, &output_uri, step.kind);
                true
            }
            JobOutcome::Failed(error) => {
                self.record_failure(cx, &step.asset_id, error.to_string());
                false
            }
        };

        match (pending, bulk) {
            (true, true) => self.current = Some(step),
            (true, false) => self.manual = Some(step),
            (false, true) => self.advance(cx),
            (false, false) => {}
        }
    }

    /// Returns true while the step still waits for something.
    fn continue_step(
        &mut self,
        cx: &ProxyContext<'_>,
        step: &mut Step,
        result: AssetResult<Asset>,
    ) -> bool {
        match result {
            Ok(proxy) => {
                self.register(cx, step, proxy);
                false
            }
            Err(e) if step.phase == Phase::Probing => {
                debug!(asset = %step.asset_id, reason = %e, "No usable proxy yet, transcoding");
                match launch(cx, step) {
                    Ok(()) => true,
                    Err(err) => {
                        self.record_failure(cx, &step.asset_id, err.to_string());
                        false
                    }
                }
            }
            Err(e) => {
                self.record_failure(
                    cx,
                    &step.asset_id,
                    format!("transcoded proxy cannot be loaded: {e}"),
                );
                false
            }
        }
    }

    fn register(&mut self, cx: &ProxyContext<'_>, step: &Step, proxy: Asset) {
        match cx.registry.add_proxy(&step.asset_id, proxy) {
            Ok(proxy) => {
                let clips = cx.bindings.substitute(&step.asset_id, proxy.id());
                info!(asset = %step.asset_id, proxy = %proxy.id(), clips, "Proxy ready");
            }
            Err(e) => self.record_failure(cx, &step.asset_id, e.to_string()),
        }
    }

    fn record_failure(&mut self, cx: &ProxyContext<'_>, asset_id: &str, error: String) {
        warn!(asset = %asset_id, error = %error, "Proxy creation failed");
        self.failures.push(ProxyFailure {
            asset_id: asset_id.to_string(),
            error: error.clone(),
        });
        cx.signals.emit(ProjectEvent::ProxyFailed {
            asset_id: asset_id.to_string(),
            error,
        });
    }
}

/// Start the transcode job of `step`.
fn launch(cx: &ProxyContext<'_>, step: &mut Step) -> ProjectResult<()> {
    let profile = cx
        .profile_for(&step.asset_id)
        .ok_or_else(|| ProjectError::NoProxyProfile(step.asset_id.clone()))?;
    let request = TranscodeRequest::new(step.asset_id.as_str(), step.output_uri.as_str(), profile)
        .with_part_suffix(cx.settings.part_suffix.as_str());

    let sender = cx.sender.clone();
    let job = TranscodeJob::start(Arc::clone(cx.engine), request, move |report| {
        let _ = sender.send(ProjectMessage::JobFinished(report));
    })?;

    debug!(asset = %step.asset_id, job = %job.id(), "Proxy transcode launched");
    step.phase = Phase::Transcoding;
    step.job = Some(job);
    Ok(())
}
