use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kubelog_types::{ContainerRef, LogLine, StreamMessage};

use crate::source::LogSource;
use crate::splitter::LineSplitter;

/// Lines of history a follow session is seeded with
pub const DEFAULT_STREAM_TAIL_LINES: i64 = 100;

/// How a session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The source closed normally (pod stopped or container restarted)
    SourceEnded,
    /// The source could not be opened; one error message was pushed
    SourceUnavailable,
    /// The source failed after opening; one error message was pushed
    SourceFailed,
    /// The push channel went away
    PeerClosed,
    /// The channel owner cancelled the session
    Cancelled,
}

/// Opens follow sessions against a log source
#[derive(Clone)]
pub struct StreamRelay {
    source: Arc<dyn LogSource>,
    default_tail: i64,
}

impl StreamRelay {
    pub fn new(source: Arc<dyn LogSource>) -> Self {
        Self {
            source,
            default_tail: DEFAULT_STREAM_TAIL_LINES,
        }
    }

    pub fn with_default_tail(mut self, tail_lines: i64) -> Self {
        self.default_tail = tail_lines;
        self
    }

    /// Create the session for one push channel
    pub fn session(&self, target: ContainerRef, tail_lines: Option<i64>) -> StreamSession {
        StreamSession {
            source: Arc::clone(&self.source),
            target,
            tail_lines: tail_lines.unwrap_or(self.default_tail),
            splitter: LineSplitter::new(),
        }
    }
}

/// Server-side state bound to exactly one push channel
pub struct StreamSession {
    source: Arc<dyn LogSource>,
    target: ContainerRef,
    tail_lines: i64,
    splitter: LineSplitter,
}

impl StreamSession {
    pub fn target(&self) -> &ContainerRef {
        &self.target
    }

    /// Pull lines from the source and push them to `tx` until the source
    /// ends, the source fails, `tx` closes, or `cancel` fires.
    ///
    /// The source handle is dropped before this returns on every path.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<StreamMessage>,
        cancel: CancellationToken,
    ) -> RelayOutcome {
        debug!(container = %self.target, tail_lines = self.tail_lines, "opening log source");

        let opened = tokio::select! {
            _ = cancel.cancelled() => return RelayOutcome::Cancelled,
            _ = tx.closed() => return RelayOutcome::PeerClosed,
            opened = self.source.open(&self.target, self.tail_lines) => opened,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                warn!(container = %self.target, "{}", e);
                let _ = push(&tx, &cancel, StreamMessage::error(e.to_string())).await;
                return RelayOutcome::SourceUnavailable;
            }
        };

        let outcome = 'relay: loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break RelayOutcome::Cancelled,
                _ = tx.closed() => break RelayOutcome::PeerClosed,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    for text in self.splitter.push(&chunk) {
                        let msg = StreamMessage::Line(LogLine::new(text));
                        if let Err(outcome) = push(&tx, &cancel, msg).await {
                            break 'relay outcome;
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(container = %self.target, "{}", e);
                    let _ = push(&tx, &cancel, StreamMessage::error(e.to_string())).await;
                    break RelayOutcome::SourceFailed;
                }
                None => {
                    info!(container = %self.target, "log source ended");
                    break RelayOutcome::SourceEnded;
                }
            }
        };

        drop(stream);

        let discarded = self.splitter.finish();
        if discarded > 0 {
            debug!(container = %self.target, bytes = discarded, "discarded unterminated line");
        }
        debug!(container = %self.target, ?outcome, "session finished");

        outcome
    }
}

async fn push(
    tx: &mpsc::Sender<StreamMessage>,
    cancel: &CancellationToken,
    msg: StreamMessage,
) -> Result<(), RelayOutcome> {
    tokio::select! {
        _ = cancel.cancelled() => Err(RelayOutcome::Cancelled),
        sent = tx.send(msg) => sent.map_err(|_| RelayOutcome::PeerClosed),
    }
}
