//! Request activity log.
//!
//! Console diagnostics go through `tracing`; this is the durable record of
//! chat requests: one JSON line per lifecycle step, with the most recent
//! entries also kept in memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::translate::event::UsageMetadata;
use crate::vendor::Vendor;

const MAX_LOG_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub component: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<Vendor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl LogEntry {
    pub fn new(level: LogLevel, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            component: component.into(),
            message: message.into(),
            request_id: None,
            vendor: None,
            usage: None,
            context: None,
        }
    }

    pub fn for_request(mut self, request_id: impl Into<String>, vendor: Option<Vendor>) -> Self {
        self.request_id = Some(request_id.into());
        self.vendor = vendor;
        self
    }

    pub fn with_usage(mut self, usage: UsageMetadata) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_context(mut self, ctx: serde_json::Value) -> Self {
        self.context = Some(ctx);
        self
    }
}

/// Ring buffer of recent entries, mirrored to an append-only JSONL file.
pub struct Logger {
    entries: VecDeque<LogEntry>,
    writer: Option<BufWriter<File>>,
}

impl Logger {
    pub fn new(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file_path = file_path.as_ref();

        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut entries = VecDeque::with_capacity(MAX_LOG_ENTRIES);

        if file_path.exists() {
            let reader = BufReader::new(File::open(file_path)?);
            for line in reader.lines().map_while(std::result::Result::ok) {
                if let Ok(entry) = serde_json::from_str::<LogEntry>(&line) {
                    if entries.len() >= MAX_LOG_ENTRIES {
                        entries.pop_front();
                    }
                    entries.push_back(entry);
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        Ok(Self {
            entries,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// A logger that keeps entries in memory only.
    pub fn in_memory() -> Self {
        Self {
            entries: VecDeque::new(),
            writer: None,
        }
    }

    pub fn log(&mut self, entry: LogEntry) {
        if let Some(ref mut writer) = self.writer {
            if let Ok(json) = serde_json::to_string(&entry) {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
        if self.entries.len() >= MAX_LOG_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }
}

#[derive(Clone)]
pub struct SharedLogger(Arc<Mutex<Logger>>);

impl SharedLogger {
    pub fn new(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self(Arc::new(Mutex::new(Logger::new(file_path)?))))
    }

    pub fn in_memory() -> Self {
        Self(Arc::new(Mutex::new(Logger::in_memory())))
    }

    pub fn log(&self, entry: LogEntry) {
        if let Ok(mut logger) = self.0.lock() {
            logger.log(entry);
        }
    }

    pub fn info(&self, component: impl Into<String>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Info, component, message));
    }

    pub fn warn(&self, component: impl Into<String>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Warn, component, message));
    }

    pub fn error(&self, component: impl Into<String>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Error, component, message));
    }

    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.0.lock().map(|l| l.recent(limit)).unwrap_or_default()
    }

    /// Entries recorded for one request, oldest first.
    pub fn for_request(&self, request_id: &str) -> Vec<LogEntry> {
        let mut entries: Vec<_> = self
            .recent(MAX_LOG_ENTRIES)
            .into_iter()
            .filter(|e| e.request_id.as_deref() == Some(request_id))
            .collect();
        entries.reverse();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("relay.jsonl");

        {
            let logger = SharedLogger::new(&path).unwrap();
            logger.info("startup", "hello");
            logger.log(
                LogEntry::new(LogLevel::Info, "chat", "stream finished")
                    .for_request("req-1", Some(Vendor::Gemini))
                    .with_usage(UsageMetadata {
                        input_tokens: 3,
                        ..UsageMetadata::default()
                    }),
            );
        }

        let reopened = SharedLogger::new(&path).unwrap();
        let recent = reopened.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "stream finished");
        assert_eq!(recent[0].vendor, Some(Vendor::Gemini));
        assert_eq!(recent[0].usage.map(|u| u.input_tokens), Some(3));
    }

    #[test]
    fn test_for_request_filters_in_order() {
        let logger = SharedLogger::in_memory();
        logger.log(LogEntry::new(LogLevel::Info, "chat", "a").for_request("r1", None));
        logger.log(LogEntry::new(LogLevel::Info, "chat", "other").for_request("r2", None));
        logger.log(LogEntry::new(LogLevel::Error, "chat", "b").for_request("r1", None));

        let messages: Vec<_> = logger
            .for_request("r1")
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(messages, vec!["a", "b"]);
    }

    #[test]
    fn test_ring_buffer_is_bounded() {
        let mut logger = Logger::in_memory();
        for i in 0..(MAX_LOG_ENTRIES + 5) {
            logger.log(LogEntry::new(LogLevel::Debug, "t", i.to_string()));
        }
        assert_eq!(logger.recent(usize::MAX).len(), MAX_LOG_ENTRIES);
        assert_eq!(logger.recent(1)[0].message, (MAX_LOG_ENTRIES + 4).to_string());
    }
}
