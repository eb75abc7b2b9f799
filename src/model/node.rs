use serde::{Deserialize, Serialize};

/// node id
pub type NodeId = String;

/// Free-form node configuration, shaped by the node type.
pub type NodeConfig = serde_json::Map<String, serde_json::Value>;

/// Kind of a workflow step.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeType {
    Start,
    End,
    Branch,
    Condition,
    Apply,
    Upload,
    Monitor,
    Deploy,
    Notify,
    Custom,
    ExecuteResultBranch,
    ExecuteSuccess,
    ExecuteFailure,
}

impl NodeType {
    /// Label used for freshly created nodes.
    pub fn default_name(&self) -> &'static str {
        match self {
            NodeType::Start => "Start",
            NodeType::End => "End",
            NodeType::Branch => "Branch",
            NodeType::Condition => "Condition",
            NodeType::Apply => "Apply",
            NodeType::Upload => "Upload",
            NodeType::Monitor => "Monitor",
            NodeType::Deploy => "Deploy",
            NodeType::Notify => "Notify",
            NodeType::Custom => "Custom",
            NodeType::ExecuteResultBranch => "Execute Result",
            NodeType::ExecuteSuccess => "If the previous node succeeded",
            NodeType::ExecuteFailure => "If the previous node failed",
        }
    }

    /// Owns `branches` instead of a plain successor chain.
    pub fn is_fan_out(&self) -> bool {
        matches!(self, NodeType::Branch | NodeType::ExecuteResultBranch)
    }

    /// Edited through the branch operations rather than the node ones.
    pub fn is_branch_like(&self) -> bool {
        self.is_fan_out() || self.is_branch_member()
    }

    /// Only ever appears as the head of a branch.
    pub fn is_branch_member(&self) -> bool {
        matches!(self, NodeType::Condition | NodeType::ExecuteSuccess | NodeType::ExecuteFailure)
    }

    pub fn is_unduplicatable(&self) -> bool {
        matches!(
            self,
            NodeType::Start
                | NodeType::End
                | NodeType::Branch
                | NodeType::ExecuteResultBranch
                | NodeType::ExecuteSuccess
                | NodeType::ExecuteFailure
        )
    }

    pub fn is_unremovable(&self) -> bool {
        matches!(self, NodeType::Start | NodeType::End)
    }

    /// Produces a success/failure outcome that an execute-result branch can follow.
    pub fn has_execute_result(&self) -> bool {
        matches!(self, NodeType::Apply | NodeType::Upload | NodeType::Monitor | NodeType::Deploy | NodeType::Notify)
    }
}

/// Reference from an input port to another node's output port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WorkflowNodeIOValueSelector {
    pub id: NodeId,
    pub name: String,
}

/// Input or output port of a node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNodeIO {
    pub name: String,
    #[serde(rename = "type")]
    pub io_type: String,
    pub required: bool,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_selector: Option<WorkflowNodeIOValueSelector>,
}

impl WorkflowNodeIO {
    pub fn new(
        name: &str,
        io_type: &str,
        required: bool,
        label: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            io_type: io_type.to_string(),
            required,
            label: label.to_string(),
            value: None,
            value_selector: None,
        }
    }
}

/// One step of a workflow graph.
///
/// A step either continues through `next`, or, for fan-out kinds, splits into
/// `branches`; a fan-out step's `next` is where the branches merge again.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowNode {
    pub id: NodeId,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<NodeConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Vec<WorkflowNodeIO>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Vec<WorkflowNodeIO>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Box<WorkflowNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<WorkflowNode>>,
    #[serde(default)]
    pub validated: bool,
}

impl WorkflowNode {
    /// A bare node with no config, ports or links.
    pub fn bare(
        id: impl Into<NodeId>,
        name: impl Into<String>,
        node_type: NodeType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type,
            config: None,
            input: None,
            output: None,
            next: None,
            branches: None,
            validated: false,
        }
    }

    /// Reads a string value from `config`.
    pub fn config_str(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.config.as_ref().and_then(|c| c.get(key)).and_then(|v| v.as_str())
    }

    /// Iterates this node and its `next` successors, without entering branches.
    pub fn chain(&self) -> Chain<'_> {
        Chain {
            current: Some(self),
        }
    }

    /// Last node of the `next` chain starting here.
    pub fn tail_mut(&mut self) -> &mut WorkflowNode {
        match self.next {
            Some(ref mut next) => next.tail_mut(),
            None => self,
        }
    }

    /// Whether `id` is this node or anywhere below it (branches included).
    pub fn contains(
        &self,
        id: &str,
    ) -> bool {
        self.chain().any(|node| {
            node.id == id || node.branches.as_ref().is_some_and(|branches| branches.iter().any(|b| b.contains(id)))
        })
    }
}

/// Iterator over a `next` chain.
pub struct Chain<'a> {
    current: Option<&'a WorkflowNode>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a WorkflowNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        self.current = node.next.as_deref();
        Some(node)
    }
}

/// Partial update for a node, matched by `id`.
///
/// Only fields that are `Some` are merged; the node kind and its links are never touched.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<NodeConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Vec<WorkflowNodeIO>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Vec<WorkflowNodeIO>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated: Option<bool>,
}

impl NodePatch {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn config(
        mut self,
        config: NodeConfig,
    ) -> Self {
        self.config = Some(config);
        self
    }

    pub fn input(
        mut self,
        input: Vec<WorkflowNodeIO>,
    ) -> Self {
        self.input = Some(input);
        self
    }

    pub fn output(
        mut self,
        output: Vec<WorkflowNodeIO>,
    ) -> Self {
        self.output = Some(output);
        self
    }

    pub fn validated(
        mut self,
        validated: bool,
    ) -> Self {
        self.validated = Some(validated);
        self
    }

    pub(crate) fn apply(
        &self,
        node: &mut WorkflowNode,
    ) {
        if let Some(name) = &self.name {
            node.name = name.clone();
        }
        if let Some(config) = &self.config {
            node.config = Some(config.clone());
        }
        if let Some(input) = &self.input {
            node.input = Some(input.clone());
        }
        if let Some(output) = &self.output {
            node.output = Some(output.clone());
        }
        if let Some(validated) = self.validated {
            node.validated = validated;
        }
    }
}

impl From<&WorkflowNode> for NodePatch {
    fn from(node: &WorkflowNode) -> Self {
        Self {
            id: node.id.clone(),
            name: Some(node.name.clone()),
            config: node.config.clone(),
            input: node.input.clone(),
            output: node.output.clone(),
            validated: Some(node.validated),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_node_type_serde_names() {
        assert_eq!(serde_json::to_value(NodeType::ExecuteResultBranch).unwrap(), json!("execute_result_branch"));
        assert_eq!(NodeType::from_str("deploy").unwrap(), NodeType::Deploy);
        assert_eq!(NodeType::Condition.as_ref(), "condition");
    }

    #[test]
    fn test_node_type_capabilities() {
        assert!(NodeType::Branch.is_fan_out());
        assert!(NodeType::ExecuteResultBranch.is_fan_out());
        assert!(!NodeType::Condition.is_fan_out());
        assert!(NodeType::Condition.is_branch_like());
        assert!(NodeType::Start.is_unremovable());
        assert!(!NodeType::Deploy.is_unremovable());
        assert!(NodeType::Branch.is_unduplicatable());
        assert!(!NodeType::Condition.is_unduplicatable());
        assert!(NodeType::Notify.has_execute_result());
        assert!(!NodeType::Branch.has_execute_result());
    }

    #[test]
    fn test_node_deserialize_minimal() {
        let node: WorkflowNode = serde_json::from_value(json!({
            "id": "a",
            "name": "Apply",
            "type": "apply",
            "output": [{ "name": "certificate", "type": "certificate", "required": true, "label": "Certificate" }],
            "next": { "id": "b", "name": "Deploy", "type": "deploy", "validated": true }
        }))
        .unwrap();
        assert!(!node.validated);
        assert_eq!(node.output.as_ref().unwrap()[0].io_type, "certificate");
        assert_eq!(node.next.as_ref().unwrap().id, "b");
        assert!(node.next.as_ref().unwrap().validated);
    }

    #[test]
    fn test_chain_and_contains() {
        let mut root = WorkflowNode::bare("s", "Start", NodeType::Start);
        let mut branch = WorkflowNode::bare("b", "Branch", NodeType::Branch);
        branch.branches = Some(vec![
            WorkflowNode::bare("c1", "Condition 1", NodeType::Condition),
            WorkflowNode::bare("c2", "Condition 2", NodeType::Condition),
        ]);
        root.next = Some(Box::new(branch));

        let ids: Vec<&str> = root.chain().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["s", "b"]);
        assert!(root.contains("c2"));
        assert!(!root.contains("x"));
        assert_eq!(root.tail_mut().id, "b");
    }

    #[test]
    fn test_patch_merges_only_set_fields() {
        let mut node = WorkflowNode::bare("a", "Apply", NodeType::Apply);
        node.validated = true;
        NodePatch::new("a").name("Issue").apply(&mut node);
        assert_eq!(node.name, "Issue");
        assert!(node.validated);
        assert_eq!(node.node_type, NodeType::Apply);
    }
}
