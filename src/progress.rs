use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::broadcast;

/// Progress of one file's translation job.
///
/// The wire payload keeps the `{percentage, status}` shape the browser
/// expects: `Completed` is always percentage 100 and carries the download
/// filename, `Failed` is percentage 0 and carries the message.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress { percentage: u8, status: String },
    Completed { filename: String, status: String },
    Failed { message: String },
}

impl ProgressEvent {
    pub fn percentage(&self) -> u8 {
        match self {
            ProgressEvent::Progress { percentage, .. } => *percentage,
            ProgressEvent::Completed { .. } => 100,
            ProgressEvent::Failed { .. } => 0,
        }
    }

    pub fn status_text(&self) -> &str {
        match self {
            ProgressEvent::Progress { status, .. } => status,
            ProgressEvent::Completed { status, .. } => status,
            ProgressEvent::Failed { message } => message,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Progress { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub file_id: String,
    pub event: ProgressEvent,
}

impl ProgressUpdate {
    /// The `file_progress` frame sent to every connected WebSocket client.
    pub fn to_message(&self) -> Value {
        let mut msg = json!({
            "type": "file_progress",
            "file_id": self.file_id,
            "percentage": self.event.percentage(),
            "status": self.event.status_text(),
        });
        if let ProgressEvent::Completed { filename, .. } = &self.event {
            msg["download_filename"] = json!(filename);
        }
        msg
    }
}

/// Per-job emitter. Percentages are clamped to be non-decreasing so a
/// job's event stream is monotonic regardless of phase arithmetic.
pub struct ProgressSender {
    file_id: String,
    tx: broadcast::Sender<ProgressUpdate>,
    last: AtomicU8,
}

impl ProgressSender {
    pub fn new(tx: broadcast::Sender<ProgressUpdate>, file_id: String) -> Self {
        Self {
            file_id,
            tx,
            last: AtomicU8::new(0),
        }
    }

    pub fn progress(&self, percentage: u8, status: impl Into<String>) {
        let floor = self.last.load(Ordering::Relaxed);
        let percentage = percentage.clamp(floor, 99);
        self.last.store(percentage, Ordering::Relaxed);
        self.emit(ProgressEvent::Progress {
            percentage,
            status: status.into(),
        });
    }

    pub fn completed(&self, filename: String) {
        self.last.store(100, Ordering::Relaxed);
        self.emit(ProgressEvent::Completed {
            filename,
            status: "Translation completed".to_string(),
        });
    }

    pub fn failed(&self, message: String) {
        self.emit(ProgressEvent::Failed { message });
    }

    fn emit(&self, event: ProgressEvent) {
        // No subscribers is fine; jobs run whether or not a browser watches.
        let _ = self.tx.send(ProgressUpdate {
            file_id: self.file_id.clone(),
            event,
        });
    }
}
