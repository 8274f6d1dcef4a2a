use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

use kubelog_types::ViewLine;

/// Thread-safe ring buffer of rendered lines
#[derive(Clone)]
pub struct LogBuffer {
    /// Internal storage
    inner: Arc<RwLock<Ring>>,

    /// Maximum capacity
    capacity: usize,
}

struct Ring {
    entries: VecDeque<ViewLine>,

    /// Entries that are log content rather than notices
    log_lines: usize,
}

impl LogBuffer {
    /// Create a new log buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(RwLock::new(Ring {
                entries: VecDeque::with_capacity(capacity),
                log_lines: 0,
            })),
            capacity,
        }
    }

    /// Push a new line, evicting the oldest if at capacity
    pub fn push(&self, line: ViewLine) {
        let mut ring = self.inner.write();
        if ring.entries.len() >= self.capacity
            && let Some(evicted) = ring.entries.pop_front()
            && evicted.is_log()
        {
            ring.log_lines -= 1;
        }
        if line.is_log() {
            ring.log_lines += 1;
        }
        ring.entries.push_back(line);
    }

    /// Total line count, notices included
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Count of actual log content lines
    pub fn log_count(&self) -> usize {
        self.inner.read().log_lines
    }

    pub fn clear(&self) {
        let mut ring = self.inner.write();
        ring.entries.clear();
        ring.log_lines = 0;
    }

    /// Get lines in a range (for virtual scrolling)
    pub fn range(&self, start: usize, count: usize) -> Vec<ViewLine> {
        let ring = self.inner.read();
        ring.entries.iter().skip(start).take(count).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubelog_types::{LogLine, StatusNotice};

    fn log(text: &str) -> ViewLine {
        ViewLine::Log(LogLine::new(text))
    }

    #[test]
    fn test_evicts_oldest_at_capacity() {
        let buffer = LogBuffer::new(2);
        buffer.push(log("a"));
        buffer.push(log("b"));
        buffer.push(log("c"));

        let texts: Vec<String> = buffer.range(0, 10).iter().map(ViewLine::text).collect();
        assert_eq!(texts, vec!["b", "c"]);
    }

    #[test]
    fn test_log_count_excludes_notices() {
        let buffer = LogBuffer::new(10);
        buffer.push(log("a"));
        buffer.push(ViewLine::Status(StatusNotice::Reconnected));
        buffer.push(ViewLine::Error("boom".into()));

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.log_count(), 1);
    }

    #[test]
    fn test_log_count_follows_eviction_and_clear() {
        let buffer = LogBuffer::new(3);
        buffer.push(log("a"));
        buffer.push(ViewLine::Status(StatusNotice::Reconnected));
        buffer.push(log("b"));
        assert_eq!(buffer.log_count(), 2);

        // Evicts "a"
        buffer.push(ViewLine::Error("boom".into()));
        assert_eq!(buffer.log_count(), 1);

        // Evicts the notice
        buffer.push(log("c"));
        assert_eq!(buffer.log_count(), 2);

        buffer.clear();
        assert_eq!(buffer.log_count(), 0);
        buffer.push(log("d"));
        assert_eq!(buffer.log_count(), 1);
    }

    #[test]
    fn test_range_and_clear() {
        let buffer = LogBuffer::new(10);
        for t in ["a", "b", "c", "d"] {
            buffer.push(log(t));
        }

        let texts: Vec<String> = buffer.range(1, 2).iter().map(ViewLine::text).collect();
        assert_eq!(texts, vec!["b", "c"]);

        buffer.clear();
        assert!(buffer.is_empty());
    }
}
