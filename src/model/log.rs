use serde::{Deserialize, Serialize};

/// Severity of a run log line, numerically aligned with `slog` levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowLogLevel {
    Debug = -4,
    Info = 0,
    Warn = 4,
    Error = 8,
}

/// A log line emitted by a node during a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowLogModel {
    #[serde(default)]
    pub id: String,
    pub workflow_ref: String,
    pub run_ref: String,
    pub node_id: String,
    pub node_name: String,
    /// milliseconds since the epoch
    pub timestamp: i64,
    pub level: i32,
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub created: String,
}

impl WorkflowLogModel {
    pub fn is_error(&self) -> bool {
        self.level >= WorkflowLogLevel::Error as i32
    }

    /// Error-level messages joined by newlines.
    pub fn error_string(logs: &[WorkflowLogModel]) -> String {
        logs.iter().filter(|log| log.is_error()).map(|log| log.message.as_str()).collect::<Vec<_>>().join("\n").trim().to_string()
    }
}
