//! Lifecycle sinks wired by the binary: console lines on stderr and an optional JSONL event log.
use super::*;

use std::{fs::File, path::PathBuf};

/// Prints one human-readable line per lifecycle record to stderr.
pub(crate) struct ConsoleLifecycleSink;

impl LifecycleSink for ConsoleLifecycleSink {
    fn record(&self, record: &LifecycleRecord) {
        eprintln!("{}", render_lifecycle_line(record));
    }
}

pub(crate) struct FanoutLifecycleSink {
    sinks: Vec<Arc<dyn LifecycleSink>>,
}

impl FanoutLifecycleSink {
    pub(crate) fn new(sinks: Vec<Arc<dyn LifecycleSink>>) -> Self {
        Self { sinks }
    }
}

impl LifecycleSink for FanoutLifecycleSink {
    fn record(&self, record: &LifecycleRecord) {
        for sink in &self.sinks {
            sink.record(record);
        }
    }
}

#[derive(Clone)]
/// Appends lifecycle records and turn failures as timestamped JSON lines.
pub(crate) struct JsonlEventLog {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl JsonlEventLog {
    pub(crate) fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create event log directory {}", parent.display())
                })?;
            }
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open event log {}", path.display()))?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn log_record(&self, record: &LifecycleRecord) -> Result<()> {
        let payload = serde_json::to_value(record).context("failed to encode lifecycle record")?;
        self.append(payload)
    }

    pub(crate) fn log_turn_error(&self, session_id: &str, error: &AssistantError) -> Result<()> {
        let mut payload = format_error(error);
        payload["session_id"] = Value::String(session_id.to_string());
        self.append(payload)
    }

    fn append(&self, mut payload: Value) -> Result<()> {
        if let Value::Object(fields) = &mut payload {
            fields.insert(
                "timestamp".to_string(),
                Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        let line = serde_json::to_string(&payload).context("failed to encode event log line")?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("event log lock is poisoned"))?;
        writeln!(file, "{line}").context("failed to write event log line")?;
        file.flush().context("failed to flush event log")?;
        Ok(())
    }
}

impl LifecycleSink for JsonlEventLog {
    fn record(&self, record: &LifecycleRecord) {
        if let Err(error) = self.log_record(record) {
            tracing::warn!(path = %self.path().display(), error = %error, "event log write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use concierge_agent_core::AgentError;
    use concierge_orchestrator::{
        LifecycleAction, LifecycleRecord, LifecycleSink, MemoryLifecycleSink,
    };
    use serde_json::Value;
    use tempfile::tempdir;

    use super::{FanoutLifecycleSink, JsonlEventLog};
    use crate::AssistantError;

    fn read_lines(path: &std::path::Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .expect("read log")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect()
    }

    #[test]
    fn event_log_appends_timestamped_records_and_errors() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("logs/events.jsonl");
        let log = JsonlEventLog::open(path.clone()).expect("open");
        assert_eq!(log.path(), path.as_path());

        log.record(&LifecycleRecord::new(
            "Foodie Agent",
            LifecycleAction::Handoff {
                to_agent: "Planner Agent".to_string(),
            },
        ));
        log.log_turn_error(
            "family",
            &AssistantError::from(AgentError::MaxTurnsExceeded(5)),
        )
        .expect("log error");

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["agent"], "Foodie Agent");
        assert_eq!(lines[0]["action"], "handoff");
        assert_eq!(lines[0]["to_agent"], "Planner Agent");
        assert!(lines[0]["timestamp"].is_string());
        assert_eq!(lines[1]["session_id"], "family");
        assert_eq!(lines[1]["error_type"], "AgentError");

        let reopened = JsonlEventLog::open(path.clone()).expect("reopen");
        reopened.record(&LifecycleRecord::new("Culinary Agent", LifecycleAction::Complete));
        assert_eq!(read_lines(&path).len(), 3);
    }

    #[test]
    fn fanout_forwards_to_every_sink() {
        let first = Arc::new(MemoryLifecycleSink::new());
        let second = Arc::new(MemoryLifecycleSink::new());
        let sinks: Vec<Arc<dyn LifecycleSink>> = vec![first.clone(), second.clone()];
        let fanout = FanoutLifecycleSink::new(sinks);
        fanout.record(&LifecycleRecord::new(
            "Planner Agent",
            LifecycleAction::AgentStart,
        ));
        assert_eq!(first.records().len(), 1);
        assert_eq!(second.records(), first.records());
    }
}
