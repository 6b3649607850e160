//! Bounded ring of recent tool calls plus per-tool counters.
//!
//! Feeds the dashboard. Appends happen on every dispatch; reads happen
//! on the dashboard's refresh cadence, so a plain mutex is plenty.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
pub struct CallLogEntry {
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    pub args_summary: String,
    pub duration_ms: u64,
    pub outcome: String,
}

#[derive(Debug, Default)]
struct LogInner {
    ring: VecDeque<CallLogEntry>,
    counters: HashMap<String, u64>,
    total: u64,
}

#[derive(Debug)]
pub struct CallLog {
    inner: Mutex<LogInner>,
    capacity: usize,
}

impl CallLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LogInner::default()),
            capacity,
        }
    }

    pub fn record(
        &self,
        tool: impl Into<String>,
        args_summary: String,
        duration: Duration,
        outcome: impl Into<String>,
    ) {
        let tool = tool.into();
        let entry = CallLogEntry {
            timestamp: Utc::now(),
            tool: tool.clone(),
            args_summary,
            duration_ms: duration.as_millis() as u64,
            outcome: outcome.into(),
        };
        let mut inner = self.inner.lock().expect("call log mutex");
        if inner.ring.len() == self.capacity {
            inner.ring.pop_front();
        }
        inner.ring.push_back(entry);
        *inner.counters.entry(tool).or_insert(0) += 1;
        inner.total += 1;
    }

    /// Most recent entries, newest last. Returns a copy.
    pub fn recent(&self, n: usize) -> Vec<CallLogEntry> {
        let inner = self.inner.lock().expect("call log mutex");
        inner.ring.iter().rev().take(n).rev().cloned().collect()
    }

    /// Top tools by call count, descending.
    pub fn top_tools(&self, n: usize) -> Vec<(String, u64)> {
        let inner = self.inner.lock().expect("call log mutex");
        let mut counts: Vec<(String, u64)> =
            inner.counters.iter().map(|(k, v)| (k.clone(), *v)).collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts.truncate(n);
        counts
    }

    pub fn total_calls(&self) -> u64 {
        self.inner.lock().expect("call log mutex").total
    }
}

impl Default for CallLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Compact one-line rendering of tool arguments for the log.
pub fn summarize_args(args: &Value, max_chars: usize) -> String {
    let mut text = match args {
        Value::Null => String::from("{}"),
        other => other.to_string(),
    };
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        text = format!("{}…", cut);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ring_is_bounded() {
        let log = CallLog::with_capacity(3);
        for i in 0..10 {
            log.record(format!("tool_{}", i % 2), "{}".into(), Duration::from_millis(1), "ok");
        }
        assert_eq!(log.recent(100).len(), 3);
        assert_eq!(log.total_calls(), 10);
    }

    #[test]
    fn counters_rank_by_volume() {
        let log = CallLog::new();
        for _ in 0..3 {
            log.record("set_tempo", "{}".into(), Duration::ZERO, "ok");
        }
        log.record("list_tracks", "{}".into(), Duration::ZERO, "ok");
        let top = log.top_tools(2);
        assert_eq!(top[0], ("set_tempo".to_string(), 3));
        assert_eq!(top[1], ("list_tracks".to_string(), 1));
    }

    #[test]
    fn summary_truncates() {
        let args = json!({ "notes": "x".repeat(500) });
        let s = summarize_args(&args, 40);
        assert!(s.chars().count() <= 41);
        assert!(s.ends_with('…'));
    }
}
