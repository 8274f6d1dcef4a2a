//! Shared types for kubelog
//!
//! This crate contains data structures used across multiple kubelog crates:
//! the identities of streamable containers, the wire messages pushed over a
//! log channel, and the lines a viewer renders.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ratatui::style::Color;
use serde::{Deserialize, Serialize};

// ============================================================================
// Kubernetes Resource Types
// ============================================================================

/// Identifies a single streamable container
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRef {
    pub namespace: String,
    pub pod_name: String,
    pub container_name: String,
}

impl ContainerRef {
    pub fn new(
        namespace: impl Into<String>,
        pod_name: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod_name: pod_name.into(),
            container_name: container_name.into(),
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.namespace, self.pod_name, self.container_name
        )
    }
}

/// One entry of the container directory
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    pub pod_name: String,
    pub container_name: String,
    pub namespace: String,
    pub id: String,
}

impl ContainerInfo {
    pub fn new(namespace: String, pod_name: String, container_name: String) -> Self {
        let id = format!("{}/{}", pod_name, container_name);
        Self {
            pod_name,
            container_name,
            namespace,
            id,
        }
    }

    /// The reference used to open a log channel for this container
    pub fn to_ref(&self) -> ContainerRef {
        ContainerRef::new(&self.namespace, &self.pod_name, &self.container_name)
    }

    /// Case-insensitive match against pod or container name
    pub fn matches(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        let needle = needle.to_lowercase();
        self.pod_name.to_lowercase().contains(&needle)
            || self.container_name.to_lowercase().contains(&needle)
    }
}

/// Body of `GET /api/containers`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerList {
    pub namespace: String,
    pub containers: Vec<ContainerInfo>,
}

/// Body of `GET /api/logs/{pod}/{container}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailResponse {
    pub pod: String,
    pub container: String,
    pub logs: String,
}

/// Body of `GET /version`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub name: String,
    pub version: String,
}

// ============================================================================
// Stream Types
// ============================================================================

/// One decoded log record.
///
/// `observed_at` is the relay's wall-clock time of receipt, not a timestamp
/// reported by the container runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    #[serde(rename = "timestamp")]
    pub observed_at: DateTime<Utc>,

    #[serde(rename = "log")]
    pub text: String,
}

impl LogLine {
    /// Create a line observed now
    pub fn new(text: impl Into<String>) -> Self {
        Self::at(text, Utc::now())
    }

    pub fn at(text: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            observed_at,
            text: text.into(),
        }
    }
}

/// The unit pushed to a client over a log channel.
///
/// Serializes as `{"timestamp": ..., "log": ...}` for a line and
/// `{"error": ...}` for a failure; a message never carries both.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamMessage {
    Line(LogLine),
    Error { error: String },
}

impl StreamMessage {
    pub fn line(text: impl Into<String>) -> Self {
        Self::Line(LogLine::new(text))
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::Error { error: text.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

// ============================================================================
// Viewer Types
// ============================================================================

/// Advisory notices the viewer interleaves with log content
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusNotice {
    /// A channel opened again after a reconnect
    Reconnected,
    /// The channel dropped and another attempt is scheduled
    RetryScheduled {
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    },
    /// All attempts are spent
    Exhausted,
    /// Follows `Exhausted`: how to get going again
    ReselectHint,
}

impl StatusNotice {
    pub fn text(&self) -> String {
        match self {
            Self::Reconnected => "--- Reconnected to log stream ---".to_string(),
            Self::RetryScheduled {
                attempt,
                max_attempts,
                delay,
            } => format!(
                "--- Connection lost. Reconnecting in {}... (attempt {}/{}) ---",
                format_delay(*delay),
                attempt,
                max_attempts
            ),
            Self::Exhausted => {
                "--- Connection lost. Maximum reconnection attempts reached. ---".to_string()
            }
            Self::ReselectHint => "--- Select the container again to reconnect. ---".to_string(),
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Reconnected => Color::Green,
            Self::RetryScheduled { .. } => Color::Yellow,
            Self::Exhausted => Color::Red,
            Self::ReselectHint => Color::DarkGray,
        }
    }
}

fn format_delay(delay: Duration) -> String {
    if delay.subsec_millis() == 0 {
        format!("{}s", delay.as_secs())
    } else {
        format!("{:.1}s", delay.as_secs_f64())
    }
}

/// A line in the viewer's log pane
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewLine {
    Log(LogLine),
    Error(String),
    Status(StatusNotice),
}

impl ViewLine {
    pub fn text(&self) -> String {
        match self {
            Self::Log(line) => line.text.clone(),
            Self::Error(message) => format!("ERROR: {}", message),
            Self::Status(notice) => notice.text(),
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Log(_) => Color::White,
            Self::Error(_) => Color::Red,
            Self::Status(notice) => notice.color(),
        }
    }

    /// Only actual log content carries a timestamp
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Log(line) => Some(line.observed_at),
            _ => None,
        }
    }

    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log(_))
    }
}

impl From<StreamMessage> for ViewLine {
    fn from(msg: StreamMessage) -> Self {
        match msg {
            StreamMessage::Line(line) => Self::Log(line),
            StreamMessage::Error { error } => Self::Error(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_line_message_shape() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let msg = StreamMessage::Line(LogLine::at("hello", at));
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(value["log"], "hello");
        assert_eq!(value["timestamp"], "2024-05-01T12:30:00Z");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_error_message_shape() {
        let msg = StreamMessage::error("boom");
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(value, serde_json::json!({ "error": "boom" }));
    }

    #[test]
    fn test_parse_wire_messages() {
        let line = StreamMessage::from_json(r#"{"timestamp":"2024-05-01T12:30:00Z","log":"x"}"#)
            .unwrap();
        assert!(matches!(line, StreamMessage::Line(ref l) if l.text == "x"));

        let error = StreamMessage::from_json(r#"{"error":"gone"}"#).unwrap();
        assert!(error.is_error());
    }

    #[test]
    fn test_container_info_wire_names() {
        let info = ContainerInfo::new("ns".into(), "web-7d9".into(), "nginx".into());
        let value = serde_json::to_value(&info).unwrap();

        assert_eq!(value["podName"], "web-7d9");
        assert_eq!(value["containerName"], "nginx");
        assert_eq!(value["namespace"], "ns");
        assert_eq!(value["id"], "web-7d9/nginx");
    }

    #[test]
    fn test_container_info_matches() {
        let info = ContainerInfo::new("ns".into(), "Web-7d9".into(), "nginx".into());
        assert!(info.matches(""));
        assert!(info.matches("web"));
        assert!(info.matches("NGINX"));
        assert!(!info.matches("redis"));
    }

    #[test]
    fn test_retry_notice_text() {
        let notice = StatusNotice::RetryScheduled {
            attempt: 2,
            max_attempts: 5,
            delay: Duration::from_secs(4),
        };
        assert_eq!(
            notice.text(),
            "--- Connection lost. Reconnecting in 4s... (attempt 2/5) ---"
        );
    }

    #[test]
    fn test_view_line_styles_differ() {
        let log = ViewLine::Log(LogLine::new("x"));
        let status = ViewLine::Status(StatusNotice::Reconnected);
        let error = ViewLine::from(StreamMessage::error("x"));

        assert_ne!(log.color(), status.color());
        assert_eq!(error.text(), "ERROR: x");
        assert!(log.timestamp().is_some());
        assert!(status.timestamp().is_none());
    }
}
