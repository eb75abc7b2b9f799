use serde::{Deserialize, Serialize};

use crate::model::WorkflowTrigger;

/// Status of a workflow run as reported by the backend.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowRunStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl WorkflowRunStatus {
    /// No further status updates follow.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkflowRunStatus::Pending | WorkflowRunStatus::Running)
    }
}

/// One execution of a workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRunModel {
    #[serde(default)]
    pub id: String,
    pub workflow_ref: String,
    #[serde(default)]
    pub status: WorkflowRunStatus,
    #[serde(default)]
    pub trigger: WorkflowTrigger,
    #[serde(default)]
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
}
