//! Stream transformation engine
//!
//! Resolves a track reference to a raw provider stream and, on demand, wires
//! that stream into an external transcoder subprocess to apply a filter graph
//! or start playback at an offset. Filter parameters and seek offsets cannot
//! be changed on a live transcoder, so every transform spawns a fresh process
//! with a freshly built argument vector; the provider stream is stateful and
//! cannot be rewound, so it is re-fetched alongside each transform.
//!
//! At most one source-to-process pipe is connected at a time. Replacing the
//! active transform severs the old feeder before anything new is wired up;
//! the superseded process keeps its already-buffered input, flushes, and
//! exits on its own. It is reaped by a background wait and never force-killed.

use crate::config::{Config, SelectionConfig, TranscoderConfig};
use crate::error::{Error, Result};
use crate::provider::{self, AudioStream, MediaProvider};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

/// Audio filters applied through the transcoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Bassboost,
    Nightcore,
}

impl FilterKind {
    /// Transcoder filter-graph argument pair for this filter
    pub fn graph(self) -> [&'static str; 2] {
        match self {
            FilterKind::Bassboost => ["-filter:a", "bass=g=15"],
            FilterKind::Nightcore => ["-filter:a", "atempo=1.06,asetrate=44100*1.25"],
        }
    }

    /// Parse a user-supplied filter name. Unknown names mean "no filter".
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bassboost" => Some(FilterKind::Bassboost),
            "nightcore" => Some(FilterKind::Nightcore),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FilterKind::Bassboost => "bassboost",
            FilterKind::Nightcore => "nightcore",
        }
    }
}

/// What the transcoder is asked to do with the raw stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TranscodeSpec {
    Filter(FilterKind),
    Seek(Duration),
}

/// Build the full transcoder argument vector for one invocation.
///
/// Always constructs a fresh vector from the immutable config: read raw bytes
/// from stdin, emit the fixed output profile on stdout, with the filter graph
/// inserted before the output target or the start offset ahead of the input.
pub fn transcode_args(config: &TranscoderConfig, spec: &TranscodeSpec) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();

    if let TranscodeSpec::Seek(offset) = spec {
        args.push("-ss".to_string());
        args.push(seek_arg(*offset));
    }

    let sample_rate = config.sample_rate.to_string();
    let channels = config.channels.to_string();
    args.extend(
        [
            "-i",
            "-",
            "-f",
            config.container.as_str(),
            "-y",
            "-ar",
            sample_rate.as_str(),
            "-ac",
            channels.as_str(),
        ]
        .map(String::from),
    );

    if let TranscodeSpec::Filter(filter) = spec {
        args.extend(filter.graph().map(String::from));
    }

    args.push("pipe:1".to_string());
    args
}

/// Seconds as the transcoder expects them: whole offsets without a fraction,
/// fractional offsets with one.
fn seek_arg(offset: Duration) -> String {
    let secs = offset.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{}", secs as u64)
    } else {
        format!("{}", secs)
    }
}

/// A spawned transcoder's standard input and output pipes
pub struct TranscodeChild {
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
    pub stdout: AudioStream,
}

/// Spawns transcoder processes; the process lifecycle beyond the pipes is the
/// implementation's concern
pub trait Transcoder: Send + Sync {
    fn spawn(&self, args: &[String]) -> Result<TranscodeChild>;
}

/// Production transcoder backed by an ffmpeg executable
pub struct FfmpegTranscoder {
    bin: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(config: &TranscoderConfig) -> Self {
        Self {
            bin: config.bin.clone(),
        }
    }
}

impl Transcoder for FfmpegTranscoder {
    fn spawn(&self, args: &[String]) -> Result<TranscodeChild> {
        debug!(bin = %self.bin.display(), ?args, "spawning transcoder");

        let mut child = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::Transcoder(format!("failed to spawn {}: {}", self.bin.display(), e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Transcoder("transcoder stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Transcoder("transcoder stdout not captured".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "minstrel::transcoder", "{}", line);
                }
            });
        }

        // Reap in the background. A superseded process is left to flush its
        // remaining input and exit on its own.
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!(%status, "transcoder exited"),
                Err(error) => debug!(%error, "failed to reap transcoder"),
            }
        });

        Ok(TranscodeChild {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
        })
    }
}

/// The active source-to-transcoder pipe
struct ActivePipeline {
    feeder: JoinHandle<()>,
}

/// Produces decodable streams for tracks, honoring the active filter or a
/// seek offset, and owns the subprocess pipe lifecycle
pub struct StreamTransformer {
    media: Arc<dyn MediaProvider>,
    transcoder: Arc<dyn Transcoder>,
    transcode: TranscoderConfig,
    selection: SelectionConfig,
    active: Option<ActivePipeline>,
}

impl StreamTransformer {
    pub fn new(
        media: Arc<dyn MediaProvider>,
        transcoder: Arc<dyn Transcoder>,
        config: &Config,
    ) -> Self {
        Self {
            media,
            transcoder,
            transcode: config.transcoder.clone(),
            selection: config.selection.clone(),
            active: None,
        }
    }

    /// Resolve a reference to its raw provider stream.
    ///
    /// Severs any previously wired pipe first so a stale source can never
    /// feed a live or dying process.
    pub async fn fetch_raw(&mut self, reference: &str) -> Result<AudioStream> {
        if !provider::is_supported_reference(reference) {
            return Err(Error::UnsupportedReference(reference.to_string()));
        }
        self.detach();

        let formats = self.media.formats(reference).await?;
        let format = provider::choose_format(&formats, &self.selection)
            .ok_or_else(|| Error::NoPlayableFormat(reference.to_string()))?;
        debug!(reference, itag = format.itag, container = %format.container, "format selected");

        self.media.open(format).await
    }

    /// Resolve a fresh raw stream and pipe it through the transcoder with the
    /// given filter graph.
    pub async fn apply_filter(&mut self, reference: &str, filter: FilterKind) -> Result<AudioStream> {
        self.transform(reference, TranscodeSpec::Filter(filter)).await
    }

    /// Resolve a fresh raw stream and pipe it through the transcoder starting
    /// at the given offset.
    pub async fn seek_to(&mut self, reference: &str, offset: Duration) -> Result<AudioStream> {
        self.transform(reference, TranscodeSpec::Seek(offset)).await
    }

    /// Sever the active source-to-transcoder pipe, if any. The superseded
    /// process is not killed; it drains what it already has and exits.
    pub fn detach(&mut self) {
        if let Some(pipeline) = self.active.take() {
            pipeline.feeder.abort();
            debug!("detached previous transform pipeline");
        }
    }

    async fn transform(&mut self, reference: &str, spec: TranscodeSpec) -> Result<AudioStream> {
        let mut raw = self.fetch_raw(reference).await?;

        let args = transcode_args(&self.transcode, &spec);
        let child = self.transcoder.spawn(&args)?;

        let mut stdin = child.stdin;
        let feeder = tokio::spawn(async move {
            // A closed transcoder input (process exited, or its output was
            // dropped) surfaces as a write error; either way the source is
            // abandoned and its resources released with it.
            match tokio::io::copy(&mut raw, &mut stdin).await {
                Ok(bytes) => debug!(bytes, "source stream fully piped into transcoder"),
                Err(error) => debug!(%error, "transcoder input closed before source ended"),
            }
            let _ = stdin.shutdown().await;
        });

        self.active = Some(ActivePipeline { feeder });
        Ok(child.stdout)
    }
}

impl Drop for StreamTransformer {
    fn drop(&mut self) {
        self.detach();
    }
}
