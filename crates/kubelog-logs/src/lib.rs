//! Log processing for kubelog
//!
//! This crate turns a raw, possibly endless log byte stream into discrete
//! timestamped messages and relays them to a single push channel. It also
//! holds the bounded buffer a viewer renders from.

mod buffer;
mod relay;
mod source;
mod splitter;

pub use buffer::LogBuffer;
pub use relay::{DEFAULT_STREAM_TAIL_LINES, RelayOutcome, StreamRelay, StreamSession};
pub use source::{KubeLogSource, LogByteStream, LogSource, SourceError};
pub use splitter::LineSplitter;

// Re-export types used in our public API
pub use kubelog_types::{ContainerRef, LogLine, StreamMessage, ViewLine};
