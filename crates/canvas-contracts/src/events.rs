use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Append-only writer for the session's `events.jsonl`.
///
/// - default fields are `type`, `session_id`, `ts`
/// - caller payload is merged last and can override defaults
/// - one compact JSON object per line
///
/// A disabled writer still builds the event object but never touches disk.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: Option<PathBuf>,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: Some(path.into()),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: None,
                session_id: String::new(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            event.insert(key, value);
        }

        let Some(path) = self.inner.path.as_ref() else {
            return Ok(Value::Object(event));
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }
}

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;

    use super::*;

    #[test]
    fn emit_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        let mut payload = EventPayload::new();
        payload.insert("prompt".to_string(), Value::String("a red fox".to_string()));
        let emitted = writer.emit("run_started", payload)?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        let parsed: Value = serde_json::from_str(line)?;

        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], Value::String("run_started".to_string()));
        assert_eq!(
            parsed["session_id"],
            Value::String("session-123".to_string())
        );
        assert_eq!(parsed["prompt"], Value::String("a red fox".to_string()));

        let ts = parsed["ts"].as_str().unwrap_or("");
        DateTime::parse_from_rfc3339(ts)?;
        Ok(())
    }

    #[test]
    fn emit_appends_lines() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        writer.emit("one", EventPayload::new())?;
        writer.emit("two", EventPayload::new())?;

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: Value = serde_json::from_str(lines[1])?;
        assert_eq!(second["type"], Value::String("two".to_string()));
        Ok(())
    }

    #[test]
    fn disabled_writer_returns_event_without_io() -> anyhow::Result<()> {
        let writer = EventWriter::disabled();
        let emitted = writer.emit("run_failed", EventPayload::new())?;
        assert!(writer.path().is_none());
        assert_eq!(emitted["type"], Value::String("run_failed".to_string()));
        Ok(())
    }
}
