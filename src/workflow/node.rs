//! Node construction: fresh nodes with kind defaults, and deep clones with new ids.

use std::collections::HashMap;

use crate::{
    model::{NodeConfig, NodeId, NodeType, WorkflowNode, WorkflowNodeIO},
    utils,
};

/// Suffix appended to the names of duplicated nodes and workflows.
pub const COPY_SUFFIX: &str = "-copy";

#[derive(Debug, Clone, Copy, Default)]
pub struct NewNodeOptions {
    /// 0-based position when the node is created as a branch member.
    pub branch_index: Option<usize>,
}

impl NewNodeOptions {
    pub fn branch(index: usize) -> Self {
        Self {
            branch_index: Some(index),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CloneNodeOptions {
    pub with_copy_suffix: bool,
}

fn certificate_port() -> WorkflowNodeIO {
    WorkflowNodeIO::new("certificate", "certificate", true, "Certificate")
}

fn default_inputs(node_type: NodeType) -> Option<Vec<WorkflowNodeIO>> {
    match node_type {
        NodeType::Deploy => Some(vec![certificate_port()]),
        NodeType::Apply | NodeType::Upload | NodeType::Monitor => Some(vec![]),
        _ => None,
    }
}

fn default_outputs(node_type: NodeType) -> Option<Vec<WorkflowNodeIO>> {
    match node_type {
        NodeType::Apply | NodeType::Upload | NodeType::Monitor => Some(vec![certificate_port()]),
        NodeType::Deploy => Some(vec![]),
        _ => None,
    }
}

/// Allocates a node of `node_type` with a fresh id and the kind's defaults.
///
/// Fan-out kinds come with their initial branches: two conditions for
/// [`NodeType::Branch`], a success and a failure branch for
/// [`NodeType::ExecuteResultBranch`].
pub fn new_node(
    node_type: NodeType,
    options: NewNodeOptions,
) -> WorkflowNode {
    let name = match options.branch_index {
        Some(index) => format!("{} {}", node_type.default_name(), index + 1),
        None => node_type.default_name().to_string(),
    };

    let mut node = WorkflowNode::bare(utils::shortid(), name, node_type);

    match node_type {
        NodeType::Apply | NodeType::Upload | NodeType::Monitor | NodeType::Deploy => {
            node.config = Some(NodeConfig::new());
            node.input = default_inputs(node_type);
            node.output = default_outputs(node_type);
        }
        NodeType::Condition | NodeType::ExecuteSuccess | NodeType::ExecuteFailure | NodeType::End => {
            node.validated = true;
        }
        NodeType::Branch => {
            node.branches = Some(vec![
                new_node(NodeType::Condition, NewNodeOptions::branch(0)),
                new_node(NodeType::Condition, NewNodeOptions::branch(1)),
            ]);
        }
        NodeType::ExecuteResultBranch => {
            node.branches = Some(vec![
                new_node(NodeType::ExecuteSuccess, NewNodeOptions::default()),
                new_node(NodeType::ExecuteFailure, NewNodeOptions::default()),
            ]);
        }
        NodeType::Start | NodeType::Notify | NodeType::Custom => {}
    }

    node
}

/// Deep-copies `node` and everything below it, giving every copy a fresh id.
///
/// Input selectors that point at nodes inside the copied subtree are rewired to
/// the copies; selectors pointing outside keep their target.
pub fn clone_node(
    node: &WorkflowNode,
    options: CloneNodeOptions,
) -> WorkflowNode {
    let mut copy = node.clone();
    let mut ids = HashMap::new();
    reassign_ids(&mut copy, &mut ids);
    remap_selectors(&mut copy, &ids);

    if options.with_copy_suffix {
        copy.name = format!("{}{}", copy.name, COPY_SUFFIX);
    }
    copy
}

fn reassign_ids(
    node: &mut WorkflowNode,
    ids: &mut HashMap<NodeId, NodeId>,
) {
    let fresh = utils::shortid();
    ids.insert(std::mem::replace(&mut node.id, fresh.clone()), fresh);

    if let Some(branches) = node.branches.as_mut() {
        for branch in branches.iter_mut() {
            reassign_ids(branch, ids);
        }
    }
    if let Some(next) = node.next.as_deref_mut() {
        reassign_ids(next, ids);
    }
}

fn remap_selectors(
    node: &mut WorkflowNode,
    ids: &HashMap<NodeId, NodeId>,
) {
    for selector in node.input.iter_mut().flatten().filter_map(|port| port.value_selector.as_mut()) {
        if let Some(id) = ids.get(&selector.id) {
            selector.id = id.clone();
        }
    }

    if let Some(branches) = node.branches.as_mut() {
        for branch in branches.iter_mut() {
            remap_selectors(branch, ids);
        }
    }
    if let Some(next) = node.next.as_deref_mut() {
        remap_selectors(next, ids);
    }
}
