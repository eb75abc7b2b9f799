use serde::{Deserialize, Serialize};

use crate::{
    CertflowError, Result,
    model::{WorkflowNode, WorkflowRunStatus},
};

/// How a workflow gets started.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowTrigger {
    #[default]
    Manual,
    /// Older records stored this as `auto`.
    #[serde(alias = "auto")]
    #[strum(to_string = "scheduled", serialize = "auto")]
    Scheduled,
}

/// Persisted workflow envelope.
///
/// `content` is the last released graph, `draft` the graph being edited.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowModel {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub trigger: WorkflowTrigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<WorkflowNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<WorkflowNode>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub has_draft: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_status: Option<WorkflowRunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_time: Option<String>,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
}

impl WorkflowModel {
    pub fn from_json(s: &str) -> Result<Self> {
        let workflow = serde_json::from_str::<WorkflowModel>(s);
        match workflow {
            Ok(v) => Ok(v),
            Err(e) => Err(CertflowError::Workflow(format!("{}", e))),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Whether a graph has ever been released.
    pub fn is_released(&self) -> bool {
        self.content.is_some()
    }

    /// Unreleased edits exist.
    pub fn has_changes(&self) -> bool {
        self.has_draft || self.draft != self.content
    }
}
