//! Chat token streaming with mid-stream degradation.
//!
//! A session relays tokens from a streaming analyzer. When the analyzer
//! cannot start, or closes without producing a single token, the session
//! switches to a paced stream of the canned fallback reply instead. Every
//! session that is not cancelled ends with exactly one terminal token.
//!
//! ```text
//! Starting ──► Streaming ──► Done
//!     │                       ▲
//!     └──── spawn failure ────┘ (fallback tokens)
//! ```

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analyzer::{ChatProcess, StreamEvent};
use crate::config::StreamingConfig;
use crate::error::AnalyzerResult;

/// How long a process that sent its terminal marker may take to exit.
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// One unit of streamed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatToken {
    pub text: String,
    pub done: bool,
}

impl ChatToken {
    /// A content token.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
        }
    }

    /// The terminal marker.
    pub fn terminal() -> Self {
        Self {
            text: String::new(),
            done: true,
        }
    }
}

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Streaming,
    Done,
}

/// Which path produced a session's tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Every token came from the analyzer.
    Analyzer,
    /// The analyzer produced nothing; tokens came from the canned reply.
    Fallback,
    /// The analyzer failed after partial output.
    Truncated,
    /// The caller went away before the session finished.
    Cancelled,
}

/// How a session ended and how many content tokens it delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionOutcome {
    pub outcome: OutcomeKind,
    pub tokens: usize,
}

impl SessionOutcome {
    fn new(outcome: OutcomeKind, tokens: usize) -> Self {
        Self { outcome, tokens }
    }
}

/// Caller's half of a running session.
///
/// Dropping it, or calling [`ChatStream::cancel`], stops the session and
/// kills any backing process.
#[derive(Debug)]
pub struct ChatStream {
    session_id: Uuid,
    tokens: mpsc::Receiver<ChatToken>,
    handle: JoinHandle<SessionOutcome>,
}

impl ChatStream {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Next token; `None` after the terminal token or on cancellation.
    pub async fn next(&mut self) -> Option<ChatToken> {
        self.tokens.recv().await
    }

    /// Stop receiving. The session notices and shuts down.
    pub fn cancel(&mut self) {
        self.tokens.close();
    }

    /// Handle that aborts the session task outright.
    pub fn abort_handle(&self) -> AbortHandle {
        self.handle.abort_handle()
    }

    /// Wait for the session task to finish.
    ///
    /// Tokens must be drained (or the stream cancelled) first, otherwise a
    /// session blocked on a full channel never completes.
    pub async fn outcome(self) -> SessionOutcome {
        let Self { tokens, handle, .. } = self;
        // keep the receiver alive so a finishing session is not seen as cancelled
        let outcome = handle.await;
        drop(tokens);
        match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(error = %e, "Chat session task did not complete");
                SessionOutcome::new(OutcomeKind::Cancelled, 0)
            }
        }
    }

    /// Drain every remaining token, then wait for the outcome.
    pub async fn collect(mut self) -> (Vec<ChatToken>, SessionOutcome) {
        let mut tokens = Vec::new();
        while let Some(token) = self.next().await {
            tokens.push(token);
        }
        (tokens, self.outcome().await)
    }
}

/// Starts chat sessions on their own tasks.
#[derive(Debug, Clone)]
pub struct ChatDispatcher {
    pacing: Duration,
    capacity: usize,
}

impl ChatDispatcher {
    pub fn new(config: &StreamingConfig) -> Self {
        Self {
            pacing: Duration::from_millis(config.fallback_pacing_ms.max(1)),
            capacity: config.channel_capacity.max(1),
        }
    }

    /// Start a session over `source`, degrading to `fallback_text` when needed.
    pub fn start(&self, source: AnalyzerResult<ChatProcess>, fallback_text: String) -> ChatStream {
        let session_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.capacity);
        let session = Session {
            sink: TokenSink::new(tx),
            state: SessionState::Starting,
            pacing: self.pacing,
        };

        let span = info_span!("chat_session", session_id = %session_id);
        let handle = tokio::spawn(session.run(source, fallback_text).instrument(span));

        ChatStream {
            session_id,
            tokens: rx,
            handle,
        }
    }
}

/// One-shot terminal guard in front of the token channel.
struct TokenSink {
    tx: mpsc::Sender<ChatToken>,
    sent: usize,
    finished: bool,
}

impl TokenSink {
    fn new(tx: mpsc::Sender<ChatToken>) -> Self {
        Self {
            tx,
            sent: 0,
            finished: false,
        }
    }

    /// Send a content token. Returns false if the caller is gone.
    async fn token(&mut self, text: String) -> bool {
        if self.finished {
            return false;
        }
        if self.tx.send(ChatToken::text(text)).await.is_err() {
            return false;
        }
        self.sent += 1;
        true
    }

    /// Send the terminal token. Only the first call sends.
    async fn finish(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.finished = true;
        self.tx.send(ChatToken::terminal()).await.is_ok()
    }

    async fn closed(&self) {
        self.tx.closed().await
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

enum StreamEnd {
    Marker,
    Eof,
    Cancelled,
}

struct Session {
    sink: TokenSink,
    state: SessionState,
    pacing: Duration,
}

impl Session {
    async fn run(mut self, source: AnalyzerResult<ChatProcess>, fallback_text: String) -> SessionOutcome {
        let mut process = match source {
            Ok(process) => process,
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Chat analyzer unavailable, streaming fallback");
                return self.fallback(&fallback_text).await;
            }
        };

        self.state = SessionState::Streaming;
        debug!(pid = ?process.pid(), "Relaying analyzer tokens");

        let end = self.relay(&mut process).await;
        if let StreamEnd::Cancelled = end {
            process.terminate().await;
            return self.cancelled();
        }

        if self.sink.sent == 0 {
            process.terminate().await;
            info!("Chat analyzer produced no tokens, streaming fallback");
            return self.fallback(&fallback_text).await;
        }

        let outcome = match end {
            StreamEnd::Marker => {
                if !self.sink.finish().await {
                    process.terminate().await;
                    return self.cancelled();
                }
                match tokio::time::timeout(EXIT_GRACE, process.wait()).await {
                    Ok((code, stderr)) => log_exit(code, &stderr),
                    Err(_) => {
                        debug!("Chat analyzer slow to exit after terminal marker");
                        process.terminate().await;
                    }
                }
                OutcomeKind::Analyzer
            }
            _ => {
                let kind = match tokio::time::timeout(EXIT_GRACE, process.wait()).await {
                    Ok((Some(0), stderr)) => {
                        log_exit(Some(0), &stderr);
                        OutcomeKind::Analyzer
                    }
                    Ok((code, stderr)) => {
                        log_exit(code, &stderr);
                        OutcomeKind::Truncated
                    }
                    Err(_) => {
                        process.terminate().await;
                        OutcomeKind::Truncated
                    }
                };
                if !self.sink.finish().await {
                    return self.cancelled();
                }
                kind
            }
        };

        self.done(outcome)
    }

    async fn relay(&mut self, process: &mut ChatProcess) -> StreamEnd {
        loop {
            tokio::select! {
                biased;
                _ = self.sink.closed() => return StreamEnd::Cancelled,
                event = process.next_event() => match event {
                    Some(StreamEvent::Token(text)) => {
                        if !self.sink.token(text).await {
                            return StreamEnd::Cancelled;
                        }
                    }
                    Some(StreamEvent::Done) => return StreamEnd::Marker,
                    None => return StreamEnd::Eof,
                },
            }
        }
    }

    async fn fallback(&mut self, text: &str) -> SessionOutcome {
        self.state = SessionState::Streaming;
        let mut interval = tokio::time::interval(self.pacing);

        for (i, word) in text.split_whitespace().enumerate() {
            tokio::select! {
                biased;
                _ = self.sink.closed() => return self.cancelled(),
                _ = interval.tick() => {}
            }
            let token = if i == 0 {
                word.to_string()
            } else {
                format!(" {}", word)
            };
            if !self.sink.token(token).await {
                return self.cancelled();
            }
        }

        if !self.sink.finish().await {
            return self.cancelled();
        }
        self.done(OutcomeKind::Fallback)
    }

    fn cancelled(&mut self) -> SessionOutcome {
        info!(
            state = ?self.state,
            tokens = self.sink.sent,
            closed = self.sink.is_closed(),
            "Chat session cancelled"
        );
        self.state = SessionState::Done;
        SessionOutcome::new(OutcomeKind::Cancelled, self.sink.sent)
    }

    fn done(&mut self, outcome: OutcomeKind) -> SessionOutcome {
        self.state = SessionState::Done;
        info!(outcome = ?outcome, tokens = self.sink.sent, "Chat session finished");
        SessionOutcome::new(outcome, self.sink.sent)
    }
}

fn log_exit(code: Option<i32>, stderr: &str) {
    if !stderr.trim().is_empty() {
        warn!(status = ?code, stderr = %stderr.trim(), "Chat analyzer wrote to stderr");
    } else {
        debug!(status = ?code, "Chat analyzer exited");
    }
}
