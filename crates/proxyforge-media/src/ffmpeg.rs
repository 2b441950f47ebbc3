//! FFmpeg-backed transcode engine.
//!
//! Each pipeline is one `ffmpeg` child process. Pausing stops the process with
//! `SIGSTOP` and resumes it with `SIGCONT`, so the encoder keeps its state.

use proxyforge_core::uri;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::transcode::{JobControl, Pipeline, TranscodeEngine, TranscodeRequest};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs transcodes through an external `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    binary: PathBuf,
}

impl FfmpegEngine {
    /// Locate `ffmpeg` on `PATH`.
    pub fn detect() -> MediaResult<Self> {
        let binary = which::which("ffmpeg")
            .map_err(|e| MediaError::Unsupported(format!("ffmpeg not found: {e}")))?;
        debug!(binary = %binary.display(), "Found ffmpeg");
        Ok(Self { binary })
    }

    /// Use an explicit `ffmpeg` binary.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl TranscodeEngine for FfmpegEngine {
    fn launch(&self, request: &TranscodeRequest) -> MediaResult<Box<dyn Pipeline>> {
        let input = local_path(&request.source_uri)?;
        let output = local_path(&request.in_progress_uri())?;

        let args = request.profile.ffmpeg_args(&input, &output);
        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MediaError::Pipeline(format!("Failed to spawn ffmpeg: {e}")))?;

        debug!(pid = child.id(), profile = %request.profile.name, "ffmpeg started");

        Ok(Box::new(FfmpegPipeline {
            child: Some(child),
            stopped: false,
        }))
    }
}

fn local_path(location: &str) -> MediaResult<PathBuf> {
    uri::file_uri_to_path(location)
        .ok_or_else(|| MediaError::Pipeline(format!("Not a local file: {location}")))
}

struct FfmpegPipeline {
    child: Option<Child>,
    /// Whether the child is currently stopped by a signal.
    stopped: bool,
}

impl Pipeline for FfmpegPipeline {
    fn run(&mut self, control: &JobControl) -> MediaResult<()> {
        loop {
            let child = self.child.as_mut().ok_or(MediaError::NotRunning)?;
            let pid = child.id();

            if control.is_cancelled() {
                if self.stopped {
                    let _ = signal_child(pid, false);
                }
                let _ = child.kill();
                let _ = child.wait();
                self.child = None;
                return Err(MediaError::Cancelled);
            }

            let paused = control.is_paused();
            if paused != self.stopped {
                match signal_child(pid, paused) {
                    Ok(()) => self.stopped = paused,
                    Err(e) => warn!(pid, error = %e, "Could not change ffmpeg run state"),
                }
            }

            if let Some(status) = child.try_wait()? {
                self.child = None;
                if status.success() {
                    return Ok(());
                }
                return Err(MediaError::Pipeline(format!(
                    "ffmpeg exited with status: {status}"
                )));
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Drop for FfmpegPipeline {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(unix)]
fn signal_child(pid: u32, stop: bool) -> MediaResult<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let signal = if stop { Signal::SIGSTOP } else { Signal::SIGCONT };
    kill(Pid::from_raw(pid as i32), signal)
        .map_err(|e| MediaError::Pipeline(format!("Failed to send {signal}: {e}")))
}

#[cfg(not(unix))]
fn signal_child(_pid: u32, _stop: bool) -> MediaResult<()> {
    Err(MediaError::Unsupported(
        "pausing ffmpeg is only supported on unix".into(),
    ))
}
