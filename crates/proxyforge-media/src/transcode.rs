//! Transcode jobs: one run of source → decode → encode → sink.
//!
//! A [`TranscodeEngine`] builds the actual pipeline; this module owns the job
//! lifecycle around it. The pipeline runs on a dedicated worker thread and the
//! outcome is reported exactly once through the callback given to
//! [`TranscodeJob::start`]. On success the in-progress suffix is stripped from
//! the output before the report is sent.

use proxyforge_core::{uri, PART_SUFFIX};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::profile::EncodingProfile;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a transcode job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Cooperative control flags shared between a job handle and its pipeline.
#[derive(Debug, Default)]
pub struct JobControl {
    cancelled: AtomicBool,
    paused: AtomicBool,
}

impl JobControl {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }
}

/// What to transcode, where to, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeRequest {
    pub source_uri: String,
    /// URI the output carries once the job succeeded.
    pub output_uri: String,
    /// Appended to `output_uri` while encoding. Empty writes in place.
    pub part_suffix: String,
    pub profile: EncodingProfile,
}

impl TranscodeRequest {
    pub fn new(
        source_uri: impl Into<String>,
        output_uri: impl Into<String>,
        profile: EncodingProfile,
    ) -> Self {
        Self {
            source_uri: source_uri.into(),
            output_uri: output_uri.into(),
            part_suffix: PART_SUFFIX.to_string(),
            profile,
        }
    }

    pub fn with_part_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.part_suffix = suffix.into();
        self
    }

    /// Sink URI while the pipeline runs.
    pub fn in_progress_uri(&self) -> String {
        format!("{}{}", self.output_uri, self.part_suffix)
    }
}

/// A running pipeline.
pub trait Pipeline: Send {
    /// Block until the pipeline reaches end of stream.
    ///
    /// Implementations poll `control`: they must return promptly once it is
    /// cancelled and should hold processing while it is paused.
    fn run(&mut self, control: &JobControl) -> MediaResult<()>;
}

/// Builds pipelines for transcode requests.
pub trait TranscodeEngine: Send + Sync {
    /// Build a pipeline for `request` and bring it to a running state.
    fn launch(&self, request: &TranscodeRequest) -> MediaResult<Box<dyn Pipeline>>;

    /// Called once `uri` holds freshly written content.
    fn content_changed(&self, _uri: &str) {}
}

/// How a job ended.
#[derive(Debug)]
pub enum JobOutcome {
    Completed { output_uri: String },
    Failed(MediaError),
}

/// Final report of a job, delivered exactly once.
#[derive(Debug)]
pub struct JobReport {
    pub job: JobId,
    pub source_uri: String,
    pub outcome: JobOutcome,
}

/// Handle on one transcode run.
///
/// Dropping the handle cancels a job that is still running.
pub struct TranscodeJob {
    id: JobId,
    request: TranscodeRequest,
    control: Arc<JobControl>,
    cancel_requested: bool,
    worker: Option<JoinHandle<()>>,
}

impl TranscodeJob {
    /// Build and start a pipeline for `request`.
    ///
    /// Fails immediately, without calling `report`, when the pipeline cannot
    /// reach a running state. Otherwise `report` is called exactly once from
    /// the worker thread.
    pub fn start(
        engine: Arc<dyn TranscodeEngine>,
        request: TranscodeRequest,
        report: impl FnOnce(JobReport) + Send + 'static,
    ) -> MediaResult<Self> {
        let id = JobId(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed));

        prepare_output(&request)?;
        let pipeline = match engine.launch(&request) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                warn!(job = %id, source = %request.source_uri, error = %e, "Pipeline failed to start");
                discard_partial(&request);
                return Err(e);
            }
        };

        info!(job = %id, source = %request.source_uri, output = %request.in_progress_uri(), "Transcode started");

        let control = Arc::new(JobControl::default());
        let worker = {
            let control = Arc::clone(&control);
            let request = request.clone();
            thread::Builder::new()
                .name(format!("transcode-{}", id.0))
                .spawn(move || {
                    let outcome = drive(pipeline, &request, &control, engine.as_ref());
                    report(JobReport {
                        job: id,
                        source_uri: request.source_uri,
                        outcome,
                    });
                })
        };

        let worker = match worker {
            Ok(worker) => worker,
            Err(e) => {
                discard_partial(&request);
                return Err(MediaError::Pipeline(format!(
                    "Failed to spawn transcode worker: {e}"
                )));
            }
        };

        Ok(Self {
            id,
            request,
            control,
            cancel_requested: false,
            worker: Some(worker),
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn request(&self) -> &TranscodeRequest {
        &self.request
    }

    /// Stop the pipeline. The report then carries [`MediaError::Cancelled`].
    ///
    /// Returns false if cancellation was already requested.
    pub fn cancel(&mut self) -> bool {
        if self.cancel_requested {
            return false;
        }
        self.cancel_requested = true;
        self.control.cancelled.store(true, Ordering::Release);
        debug!(job = %self.id, "Transcode cancel requested");
        true
    }

    /// Hold the pipeline without tearing it down. Returns false if already paused.
    pub fn pause(&self) -> bool {
        !self.control.paused.swap(true, Ordering::AcqRel)
    }

    /// Returns false if the job was not paused.
    pub fn resume(&self) -> bool {
        self.control.paused.swap(false, Ordering::AcqRel)
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for TranscodeJob {
    fn drop(&mut self) {
        if !self.is_finished() {
            self.control.cancelled.store(true, Ordering::Release);
        }
    }
}

impl fmt::Debug for TranscodeJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscodeJob")
            .field("id", &self.id)
            .field("request", &self.request)
            .field("paused", &self.is_paused())
            .finish()
    }
}

fn drive(
    mut pipeline: Box<dyn Pipeline>,
    request: &TranscodeRequest,
    control: &JobControl,
    engine: &dyn TranscodeEngine,
) -> JobOutcome {
    let result = pipeline.run(control);
    drop(pipeline);

    if control.is_cancelled() {
        discard_partial(request);
        return JobOutcome::Failed(MediaError::Cancelled);
    }

    match result.and_then(|()| finalize_output(request)) {
        Ok(output_uri) => {
            engine.content_changed(&output_uri);
            info!(output = %output_uri, "Transcode finished");
            JobOutcome::Completed { output_uri }
        }
        Err(e) => {
            warn!(source = %request.source_uri, error = %e, "Transcode failed");
            discard_partial(request);
            JobOutcome::Failed(e)
        }
    }
}

/// Strip the in-progress suffix by renaming the output file.
fn finalize_output(request: &TranscodeRequest) -> MediaResult<String> {
    if request.part_suffix.is_empty() {
        return Ok(request.output_uri.clone());
    }

    let (Some(from), Some(to)) = (
        uri::file_uri_to_path(&request.in_progress_uri()),
        uri::file_uri_to_path(&request.output_uri),
    ) else {
        return Err(MediaError::Unsupported(format!(
            "cannot rename non-file output {}",
            request.output_uri
        )));
    };

    // Try rename first (same filesystem), fall back to copy+remove.
    if std::fs::rename(&from, &to).is_err() {
        std::fs::copy(&from, &to)?;
        let _ = std::fs::remove_file(&from);
    }
    debug!(from = %from.display(), to = %to.display(), "Renamed finished output");

    Ok(request.output_uri.clone())
}

fn prepare_output(request: &TranscodeRequest) -> MediaResult<()> {
    if let Some(parent) = uri::file_uri_to_path(&request.output_uri)
        .as_deref()
        .and_then(Path::parent)
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn discard_partial(request: &TranscodeRequest) {
    if request.part_suffix.is_empty() {
        return;
    }
    if let Some(path) = uri::file_uri_to_path(&request.in_progress_uri()) {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                debug!(path = %path.display(), error = %e, "Could not remove partial output");
            }
        }
    }
}
