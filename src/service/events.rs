//! Auditable event sink.

use std::fmt;
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Join,
    Part,
    Chat,
    Command,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::Join => "join",
            EventKind::Part => "part",
            EventKind::Chat => "chat",
            EventKind::Command => "command",
        })
    }
}

/// Fire-and-forget event recording.
///
/// Implementations swallow their own failures; protocol processing never waits on
/// or aborts because of the event log.
pub trait EventLog: Send + Sync {
    fn record_event(&self, session_id: i64, kind: EventKind, detail: &str);
}

/// Writes events to the `tracing` output under the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventLog;

impl EventLog for TracingEventLog {
    fn record_event(&self, session_id: i64, kind: EventKind, detail: &str) {
        info!(target: "audit", session_id, kind = %kind, "{detail}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub session_id: i64,
    pub kind: EventKind,
    pub detail: String,
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: Mutex<Vec<RecordedEvent>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }
}

impl EventLog for MemoryEventLog {
    fn record_event(&self, session_id: i64, kind: EventKind, detail: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push(RecordedEvent {
                session_id,
                kind,
                detail: detail.to_string(),
            });
        }
    }
}
