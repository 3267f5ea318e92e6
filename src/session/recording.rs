use std::collections::VecDeque;

use super::*;

/// Side channel that sees every command the RPC client sends and every raw
/// reply it gets back.
///
/// Installed on an [`RpcClient`](crate::rpc::RpcClient); callbacks run inline on
/// the caller's task and must not block.
pub trait CommandObserver: Send + Sync {
    /// Called before the command is handed to the session manager.
    fn command_sent(&self, device: &Device, command: &str);

    /// Called with the raw reply, before any envelope is removed.
    fn response_received(&self, device: &Device, command: &str, response: &[u8]);

    /// Called when the session manager returned an error.
    fn command_failed(&self, _device: &Device, _command: &str, _error: &ConnectError) {}
}

/// Observer writing `debug!` records through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl CommandObserver for LogObserver {
    fn command_sent(&self, device: &Device, command: &str) {
        debug!("Running command on {}: {}", device.host, command);
    }

    fn response_received(&self, device: &Device, _command: &str, response: &[u8]) {
        debug!(
            "Output for {}: {}",
            device.host,
            String::from_utf8_lossy(response)
        );
    }

    fn command_failed(&self, device: &Device, command: &str, error: &ConnectError) {
        debug!("Command on {} failed: {}: {}", device.host, command, error);
    }
}

/// Session recording granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub enum SessionRecordLevel {
    /// Disable recording.
    Off,
    /// Record commands and reply sizes only.
    KeyEventsOnly,
    /// Also keep reply content.
    #[default]
    Full,
}

/// A single recorded session event.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionRecordEntry {
    pub ts_ms: u128,
    pub event: SessionEvent,
}

/// Supported recorded event types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    CommandSent {
        host: String,
        command: String,
    },
    ResponseReceived {
        host: String,
        command: String,
        bytes: usize,
        #[serde(default)]
        content: Option<String>,
    },
    CommandFailed {
        host: String,
        command: String,
        error: String,
    },
}

/// In-memory recorder. Clones share the same log.
///
/// Unbounded by default; a long-lived client should use
/// [`SessionRecorder::with_capacity`] or call [`SessionRecorder::clear`].
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    level: SessionRecordLevel,
    capacity: Option<usize>,
    entries: Arc<std::sync::Mutex<VecDeque<SessionRecordEntry>>>,
}

impl SessionRecorder {
    /// Create a recorder with the given level.
    pub fn new(level: SessionRecordLevel) -> Self {
        Self {
            level,
            capacity: None,
            entries: Arc::new(std::sync::Mutex::new(VecDeque::new())),
        }
    }

    /// Create a recorder keeping only the newest `capacity` records.
    pub fn with_capacity(level: SessionRecordLevel, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new(level)
        }
    }

    /// Current recording level.
    pub fn level(&self) -> SessionRecordLevel {
        self.level
    }

    /// Record an event unless recording is off.
    pub fn record_event(&self, event: SessionEvent) {
        if self.level == SessionRecordLevel::Off {
            return;
        }
        // A poisoned log only loses this entry.
        if let Ok(mut guard) = self.entries.lock() {
            if let Some(capacity) = self.capacity {
                if capacity == 0 {
                    return;
                }
                while guard.len() >= capacity {
                    guard.pop_front();
                }
            }
            guard.push_back(SessionRecordEntry {
                ts_ms: now_ms(),
                event,
            });
        }
    }

    /// Snapshot all records.
    pub fn entries(&self) -> Vec<SessionRecordEntry> {
        self.entries
            .lock()
            .map(|guard| guard.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove all records.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.clear();
        }
    }

    /// Export records as JSON Lines.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for entry in self.entries() {
            out.push_str(&serde_json::to_string(&entry)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Build a full-level recorder from JSON Lines.
    pub fn from_jsonl(jsonl: &str) -> Result<Self, serde_json::Error> {
        let recorder = Self::new(SessionRecordLevel::Full);
        let mut entries = VecDeque::new();
        for line in jsonl.lines().map(str::trim).filter(|line| !line.is_empty()) {
            entries.push_back(serde_json::from_str::<SessionRecordEntry>(line)?);
        }
        if let Ok(mut guard) = recorder.entries.lock() {
            *guard = entries;
        }
        Ok(recorder)
    }
}

impl CommandObserver for SessionRecorder {
    fn command_sent(&self, device: &Device, command: &str) {
        self.record_event(SessionEvent::CommandSent {
            host: device.host.clone(),
            command: command.to_string(),
        });
    }

    fn response_received(&self, device: &Device, command: &str, response: &[u8]) {
        let content = (self.level == SessionRecordLevel::Full)
            .then(|| String::from_utf8_lossy(response).to_string());
        self.record_event(SessionEvent::ResponseReceived {
            host: device.host.clone(),
            command: command.to_string(),
            bytes: response.len(),
            content,
        });
    }

    fn command_failed(&self, device: &Device, command: &str, error: &ConnectError) {
        self.record_event(SessionEvent::CommandFailed {
            host: device.host.clone(),
            command: command.to_string(),
            error: error.to_string(),
        });
    }
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
