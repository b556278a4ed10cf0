use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::{parse_batch_output, parse_stream_line, AnalyzerOutput, StreamEvent};
use super::Analyzer;
use crate::config::AnalyzerConfig;
use crate::error::{AnalyzerError, AnalyzerResult};
use crate::modes::{Mode, Surface};

/// Upper bound on stderr text retained from a streaming analyzer.
const MAX_STDERR_BYTES: usize = 64 * 1024;

/// Analyzer backed by external interpreter processes.
#[derive(Debug, Clone)]
pub struct ProcessAnalyzer {
    config: AnalyzerConfig,
    channel_capacity: usize,
}

impl ProcessAnalyzer {
    /// Create a gateway; `channel_capacity` bounds the streaming event channel.
    pub fn new(config: AnalyzerConfig, channel_capacity: usize) -> Self {
        Self {
            config,
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Script that serves a surface.
    pub fn script_for(&self, surface: Surface) -> &Path {
        match surface {
            Surface::Segmentation => &self.config.scripts.segmentation,
            Surface::Performance => &self.config.scripts.performance,
            Surface::Content => &self.config.scripts.content,
        }
    }

    fn ensure_allowed(&self) -> AnalyzerResult<()> {
        if self.config.interpreter_allowed() {
            Ok(())
        } else {
            Err(AnalyzerError::ProcessSpawnFailure {
                command: self.config.interpreter.display().to_string(),
                message: "executable is not in the allow-list".to_string(),
            })
        }
    }
}

#[async_trait]
impl Analyzer for ProcessAnalyzer {
    async fn invoke(&self, mode: Mode, input: Option<PathBuf>) -> AnalyzerResult<AnalyzerOutput> {
        let input = input.ok_or(AnalyzerError::NoInput)?;
        if !tokio::fs::try_exists(&input).await.unwrap_or(false) {
            return Err(AnalyzerError::InputMissing { path: input });
        }
        self.ensure_allowed()?;

        let invocation = ProcessInvocation::new(
            &self.config.interpreter,
            vec![
                self.script_for(mode.surface()).as_os_str().to_owned(),
                input.as_os_str().to_owned(),
                OsString::from(mode.as_str()),
            ],
        )
        .with_input(input);

        let start = Instant::now();
        let finished = invocation
            .run(Duration::from_millis(self.config.timeout_ms))
            .await?;

        info!(
            mode = %mode,
            surface = %mode.surface(),
            status = ?finished.exit_code(),
            latency_ms = start.elapsed().as_millis(),
            "Analyzer process finished"
        );

        finished.into_output()
    }

    async fn invoke_streaming(
        &self,
        message: String,
        context: Option<Value>,
    ) -> AnalyzerResult<ChatProcess> {
        self.ensure_allowed()?;

        let mut args = vec![
            self.config.scripts.chat.as_os_str().to_owned(),
            OsString::from(message),
        ];
        if let Some(context) = context {
            args.push(OsString::from(context.to_string()));
        }

        let invocation = ProcessInvocation::new(&self.config.interpreter, args);
        let mut child = invocation.spawn()?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => (out, err),
            _ => {
                let _ = child.start_kill();
                return Err(AnalyzerError::ProcessSpawnFailure {
                    command: invocation.command_display(),
                    message: "failed to capture analyzer output streams".to_string(),
                });
            }
        };

        let pid = child.id();
        debug!(pid = ?pid, "Streaming analyzer started");

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let reader = tokio::spawn(read_stream_events(stdout, tx));
        let stderr = tokio::spawn(drain_stderr(stderr));

        Ok(ChatProcess {
            events: rx,
            child: Some(child),
            reader: Some(reader),
            stderr: Some(stderr),
            scripted_exit: None,
        })
    }
}

/// A single external process run.
///
/// Holds the argv and, once run, the captured buffers and exit status.
/// Owned by the gateway for the duration of one call.
#[derive(Debug)]
pub struct ProcessInvocation {
    command: PathBuf,
    arguments: Vec<OsString>,
    input_path: Option<PathBuf>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    status: Option<ExitStatus>,
}

impl ProcessInvocation {
    /// Describe a run of `command` with the given argument vector.
    pub fn new(command: impl Into<PathBuf>, arguments: Vec<OsString>) -> Self {
        Self {
            command: command.into(),
            arguments,
            input_path: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            status: None,
        }
    }

    /// Record the input file this run works on.
    pub fn with_input(mut self, input: PathBuf) -> Self {
        self.input_path = Some(input);
        self
    }

    /// Input file this run works on, if any.
    pub fn input_path(&self) -> Option<&Path> {
        self.input_path.as_deref()
    }

    /// Exit code once finished; `None` before the run or when killed by a signal.
    pub fn exit_code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }

    fn command_display(&self) -> String {
        self.command.display().to_string()
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Start the process with piped output. The child is killed when dropped.
    pub fn spawn(&self) -> AnalyzerResult<Child> {
        self.build_command()
            .spawn()
            .map_err(|e| AnalyzerError::ProcessSpawnFailure {
                command: self.command_display(),
                message: if e.kind() == std::io::ErrorKind::NotFound {
                    "executable not found".to_string()
                } else {
                    e.to_string()
                },
            })
    }

    /// Run to completion, capturing stdout and stderr concurrently.
    ///
    /// On timeout the in-flight child is dropped, which kills it.
    pub async fn run(mut self, timeout: Duration) -> AnalyzerResult<Self> {
        let child = self.spawn()?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(AnalyzerError::ProcessFailure {
                    status: -1,
                    stderr: format!("failed to collect analyzer output: {}", e),
                })
            }
            Err(_) => {
                warn!(
                    command = %self.command_display(),
                    timeout_ms = timeout.as_millis(),
                    "Analyzer timed out; process killed"
                );
                return Err(AnalyzerError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        };

        self.stdout = output.stdout;
        self.stderr = output.stderr;
        self.status = Some(output.status);
        Ok(self)
    }

    /// Convert a finished run into the analyzer's structured output.
    pub fn into_output(self) -> AnalyzerResult<AnalyzerOutput> {
        let stderr = String::from_utf8_lossy(&self.stderr).trim().to_string();
        if !stderr.is_empty() {
            warn!(
                command = %self.command_display(),
                input = ?self.input_path,
                stderr = %stderr,
                "Analyzer wrote to stderr"
            );
        }

        match self.status {
            Some(status) if status.success() => parse_batch_output(&self.stdout),
            Some(status) => Err(AnalyzerError::ProcessFailure {
                status: status.code().unwrap_or(-1),
                stderr,
            }),
            None => Err(AnalyzerError::ProcessFailure { status: -1, stderr }),
        }
    }
}

/// A running (or replayed) streaming analyzer.
///
/// Events arrive through a bounded channel fed by a reader task, so a slow
/// consumer stalls only this process. The child is killed on drop.
#[derive(Debug)]
pub struct ChatProcess {
    events: mpsc::Receiver<StreamEvent>,
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
    stderr: Option<JoinHandle<String>>,
    scripted_exit: Option<i32>,
}

impl ChatProcess {
    /// Event source without a backing process, replaying `events` and then
    /// reporting `exit_code`.
    pub fn from_events(events: Vec<StreamEvent>, exit_code: i32) -> Self {
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            // capacity covers every event
            let _ = tx.try_send(event);
        }
        Self {
            events: rx,
            child: None,
            reader: None,
            stderr: None,
            scripted_exit: Some(exit_code),
        }
    }

    /// OS process id, if a live process backs this stream.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    /// Next event; `None` once stdout is closed and drained.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Wait for the process to exit and return its exit code.
    ///
    /// Returns retained stderr alongside. A signal-terminated process
    /// reports `None`.
    pub async fn wait(&mut self) -> (Option<i32>, String) {
        let code = match self.child.as_mut() {
            Some(child) => match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(error = %e, "Failed to wait for streaming analyzer");
                    None
                }
            },
            None => self.scripted_exit,
        };
        let stderr = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        (code, stderr)
    }

    /// Kill the process and release its streams.
    pub async fn terminate(&mut self) {
        self.events.close();
        if let Some(child) = self.child.as_mut() {
            if let Err(e) = child.kill().await {
                debug!(error = %e, "Streaming analyzer already exited");
            }
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(stderr) = self.stderr.take() {
            stderr.abort();
        }
    }
}

/// Read one `\n`-terminated line into `buf`, without the terminator.
///
/// Returns `Ok(false)` at EOF. Bytes need not be valid UTF-8.
async fn read_raw_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(false);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(true)
}

/// Parse stdout lines into events until EOF, a terminal marker, or the
/// receiver goes away.
async fn read_stream_events(stdout: ChildStdout, tx: mpsc::Sender<StreamEvent>) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    loop {
        match read_raw_line(&mut reader, &mut buf).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read analyzer stdout");
                break;
            }
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                warn!(
                    error = %e,
                    line = %String::from_utf8_lossy(&buf),
                    "Skipping analyzer event that is not UTF-8"
                );
                continue;
            }
        };

        let events = match parse_stream_line(line) {
            Ok(events) => events,
            Err(reason) => {
                warn!(reason = %reason, "Skipping malformed analyzer event");
                continue;
            }
        };

        for event in events {
            let terminal = event == StreamEvent::Done;
            if tx.send(event).await.is_err() {
                // receiver dropped
                return;
            }
            if terminal {
                return;
            }
        }
    }
}

/// Log stderr lines as they arrive and retain a bounded copy.
async fn drain_stderr(stderr: ChildStderr) -> String {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    let mut retained = String::new();

    loop {
        match read_raw_line(&mut reader, &mut buf).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                debug!(error = %e, "Failed to read analyzer stderr");
                break;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        if line.trim().is_empty() {
            continue;
        }
        debug!(stderr = %line, "Streaming analyzer stderr");
        if retained.len() + line.len() < MAX_STDERR_BYTES {
            retained.push_str(&line);
            retained.push('\n');
        }
    }

    retained
}
