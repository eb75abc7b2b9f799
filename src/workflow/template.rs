use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    model::{NodeConfig, NodeType, WorkflowModel, WorkflowNode, WorkflowTrigger},
    utils,
    workflow::{NewNodeOptions, new_node},
};

/// Start node config key holding the trigger kind.
pub const EXECUTION_METHOD_KEY: &str = "executionMethod";
/// Start node config key holding the cron expression.
pub const CRONTAB_KEY: &str = "crontab";

/// Prebuilt graph appended after the start node of a new workflow.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowTemplate {
    /// apply -> deploy -> notify
    Standard,
}

#[derive(Debug, Clone, Default)]
pub struct InitWorkflowOptions {
    pub template: Option<WorkflowTemplate>,
}

/// How the start node says the workflow is triggered.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteMethod {
    #[serde(rename = "type")]
    pub kind: String,
    pub schedule: String,
}

impl ExecuteMethod {
    /// Trigger matching `kind`; unknown values fall back to manual.
    pub fn trigger(&self) -> WorkflowTrigger {
        self.kind.parse().unwrap_or_default()
    }

    /// Cron expression, when there is one.
    pub fn cron(&self) -> Option<String> {
        (!self.schedule.is_empty()).then(|| self.schedule.clone())
    }
}

/// Reads the execute method off a start node; empty for anything else.
pub fn get_execute_method(node: &WorkflowNode) -> ExecuteMethod {
    if node.node_type != NodeType::Start {
        return ExecuteMethod::default();
    }

    ExecuteMethod {
        kind: node.config_str(EXECUTION_METHOD_KEY).unwrap_or_default().to_string(),
        schedule: node.config_str(CRONTAB_KEY).unwrap_or_default().to_string(),
    }
}

/// Creates a new, unreleased workflow envelope around a fresh graph.
pub fn init_workflow(options: InitWorkflowOptions) -> WorkflowModel {
    let mut root = new_node(NodeType::Start, NewNodeOptions::default());
    let mut config = NodeConfig::new();
    config.insert(EXECUTION_METHOD_KEY.to_string(), json!(WorkflowTrigger::Manual.as_ref()));
    root.config = Some(config);

    if let Some(WorkflowTemplate::Standard) = options.template {
        let mut deploy = new_node(NodeType::Deploy, NewNodeOptions::default());
        deploy.next = Some(Box::new(new_node(NodeType::Notify, NewNodeOptions::default())));
        let mut apply = new_node(NodeType::Apply, NewNodeOptions::default());
        apply.next = Some(Box::new(deploy));
        root.next = Some(Box::new(apply));
    }

    let method = get_execute_method(&root);
    let now = utils::time::now_rfc3339();
    WorkflowModel {
        name: format!("MyWorkflow-{}", utils::time::compact_local()),
        trigger: method.trigger(),
        trigger_cron: method.cron(),
        draft: Some(root),
        has_draft: true,
        enabled: false,
        created: now.clone(),
        updated: now,
        ..Default::default()
    }
}
