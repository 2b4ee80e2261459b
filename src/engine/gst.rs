//! `gst-launch-1.0` pipeline engine
//!
//! Runs one GStreamer pipeline per session as a child process and reads the
//! fragmented MP4 it writes to stdout.
//!
//! ```text
//!   camera:    v4l2src ! queue ─┐
//!   streaming: udpsrc ! rtp ────┴─► videoconvert ! videoscale ! x264enc ! qtmux ! fdsink fd=1
//! ```

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::Mutex;

use super::{EngineError, MediaEngine, Pipeline, PipelineRequest};
use crate::session::SessionId;

/// Configuration for [`GstLaunchEngine`]
#[derive(Debug, Clone)]
pub struct GstLaunchConfig {
    /// Path of the launcher binary
    pub program: PathBuf,

    /// V4L2 device for camera pipelines (None = v4l2src default)
    pub video_device: Option<String>,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    /// How long a freshly launched pipeline must survive to count as started
    pub startup_grace: Duration,
}

impl Default for GstLaunchConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("gst-launch-1.0"),
            video_device: None,
            width: 320,
            height: 240,
            startup_grace: Duration::from_millis(300),
        }
    }
}

impl GstLaunchConfig {
    /// Set the launcher binary
    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Set the camera device
    pub fn video_device(mut self, device: impl Into<String>) -> Self {
        self.video_device = Some(device.into());
        self
    }

    /// Set the startup grace period
    pub fn startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }
}

/// Media engine backed by `gst-launch-1.0` child processes
#[derive(Debug, Clone, Default)]
pub struct GstLaunchEngine {
    config: GstLaunchConfig,
}

impl GstLaunchEngine {
    /// Create an engine with the given configuration
    pub fn new(config: GstLaunchConfig) -> Self {
        Self { config }
    }

    /// Get the engine configuration
    pub fn config(&self) -> &GstLaunchConfig {
        &self.config
    }

    /// Build the launcher arguments for a request
    pub fn pipeline_args(&self, request: &PipelineRequest) -> Result<Vec<String>, EngineError> {
        let mut args: Vec<String> = vec!["-q".into()];

        match request.kind.as_str() {
            "camera" => {
                args.push("v4l2src".into());
                args.push("io-mode=2".into());
                if let Some(ref device) = self.config.video_device {
                    args.push(format!("device={}", device));
                }
                args.extend(
                    ["!", "queue", "max-size-time=0", "max-size-bytes=0", "max-size-buffers=16"]
                        .map(String::from),
                );
            }
            "streaming" => {
                // RTP/H.264 arrives on a UDP port derived from the session ID
                args.push("udpsrc".into());
                args.push(format!("port={}", udp_port(request.session_id)));
                args.push(
                    "caps=application/x-rtp,media=video,clock-rate=90000,encoding-name=H264,payload=96"
                        .into(),
                );
                args.extend(
                    ["!", "rtpjitterbuffer", "latency=2000", "!", "rtph264depay", "!", "decodebin"]
                        .map(String::from),
                );
            }
            other => return Err(EngineError::UnsupportedKind(other.to_string())),
        }

        args.extend(["!", "videoconvert", "!", "videoscale", "!"].map(String::from));
        args.push(format!(
            "video/x-raw,width={},height={}",
            self.config.width, self.config.height
        ));
        args.extend(
            [
                "!",
                "x264enc",
                "threads=1",
                "cabac=false",
                "tune=zerolatency",
                "!",
                "video/x-h264,profile=constrained-baseline",
                "!",
                "qtmux",
                "streamable=true",
                "fragment-duration=100",
                "!",
                "fdsink",
                "fd=1",
            ]
            .map(String::from),
        );

        Ok(args)
    }
}

fn udp_port(session_id: SessionId) -> u16 {
    // Session IDs start well above the privileged range; wrap into it anyway
    (session_id % 64_511) as u16 + 1024
}

impl MediaEngine for GstLaunchEngine {
    type Pipeline = GstPipeline;

    async fn start(&self, request: &PipelineRequest) -> Result<GstPipeline, EngineError> {
        let args = self.pipeline_args(request)?;

        tracing::debug!(
            session_id = request.session_id,
            program = %self.config.program.display(),
            args = %args.join(" "),
            "Launching pipeline"
        );

        let mut child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(EngineError::Spawn)?;

        tokio::time::sleep(self.config.startup_grace).await;

        match child.try_wait() {
            Ok(Some(status)) => return Err(EngineError::Exited(status.code())),
            Ok(None) => {}
            Err(e) => return Err(EngineError::Failed(e.to_string())),
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Failed("pipeline stdout not captured".into()))?;

        tracing::info!(
            session_id = request.session_id,
            kind = %request.kind,
            pid = child.id().unwrap_or(0),
            "Pipeline started"
        );

        Ok(GstPipeline {
            session_id: request.session_id,
            child: Mutex::new(Some(child)),
            stdout: Mutex::new(stdout),
        })
    }
}

/// A running `gst-launch-1.0` process
#[derive(Debug)]
pub struct GstPipeline {
    session_id: SessionId,
    child: Mutex<Option<Child>>,
    stdout: Mutex<ChildStdout>,
}

impl Pipeline for GstPipeline {
    async fn read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut stdout = self.stdout.lock().await;
        stdout.read(buf).await
    }

    async fn destroy(&self) {
        let child = self.child.lock().await.take();

        if let Some(mut child) = child {
            if let Err(e) = child.kill().await {
                tracing::warn!(session_id = self.session_id, error = %e, "Failed to kill pipeline");
            } else {
                tracing::info!(session_id = self.session_id, "Pipeline destroyed");
            }
        }
    }
}
