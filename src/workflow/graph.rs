//! Traversal and mutation of a workflow graph.
//!
//! A graph is the `start` node and everything reachable from it: each node
//! continues through `next`, and fan-out nodes additionally hold `branches`,
//! each of which is itself a chain. Every mutator here takes the graph by
//! reference and returns a new, owned graph; the input is left untouched.
//!
//! Lookups walk depth first: a node is tested first, then every branch of a
//! fan-out node in order, then `next`. The first match wins.

use tracing::debug;

use crate::{
    CertflowError, Result,
    model::{NodeId, NodePatch, NodeType, WorkflowNode},
    workflow::{CloneNodeOptions, NewNodeOptions, clone_node, new_node},
};

/// Visits nodes depth first until `f` reports it is done.
fn walk_mut<F>(
    node: &mut WorkflowNode,
    f: &mut F,
) -> bool
where
    F: FnMut(&mut WorkflowNode) -> bool,
{
    if f(node) {
        return true;
    }

    if node.node_type.is_fan_out() {
        for branch in node.branches.iter_mut().flatten() {
            if walk_mut(branch, f) {
                return true;
            }
        }
    }

    match node.next.as_deref_mut() {
        Some(next) => walk_mut(next, f),
        None => false,
    }
}

fn not_found(id: &str) -> CertflowError {
    CertflowError::NodeNotFound(id.to_string())
}

fn collect_ids(
    node: &WorkflowNode,
    ids: &mut Vec<NodeId>,
) {
    for current in node.chain() {
        ids.push(current.id.clone());
        for branch in current.branches.iter().flatten() {
            collect_ids(branch, ids);
        }
    }
}

/// Finds the node with `id` anywhere in the graph.
pub fn find_node<'a>(
    graph: &'a WorkflowNode,
    id: &str,
) -> Option<&'a WorkflowNode> {
    for current in graph.chain() {
        if current.id == id {
            return Some(current);
        }
        if current.node_type.is_fan_out() {
            for branch in current.branches.iter().flatten() {
                if let Some(found) = find_node(branch, id) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// Number of nodes reachable from `graph`, nested branches included.
pub fn count_nodes(graph: &WorkflowNode) -> usize {
    graph.chain().map(|current| 1 + current.branches.iter().flatten().map(count_nodes).sum::<usize>()).sum()
}

/// Shallow-merges `patch` onto the node whose id is `patch.id`.
pub fn update_node(
    graph: &WorkflowNode,
    patch: &NodePatch,
) -> Result<WorkflowNode> {
    let mut graph = graph.clone();
    let found = walk_mut(&mut graph, &mut |node| {
        if node.id != patch.id {
            return false;
        }
        patch.apply(node);
        true
    });

    if !found {
        return Err(not_found(&patch.id));
    }
    debug!("workflow::update_node({})", patch.id);
    Ok(graph)
}

/// Inserts `node` right after the node with id `pre_id`.
///
/// Whatever followed `pre_id` continues after the new node. For a fan-out
/// node it continues after the first branch instead, so the other branches
/// start out as dead ends.
pub fn add_node(
    graph: &WorkflowNode,
    pre_id: &str,
    node: WorkflowNode,
) -> Result<WorkflowNode> {
    match node.node_type {
        NodeType::Start => return Err(CertflowError::Graph("a workflow has exactly one start node".to_string())),
        NodeType::End if contains_type(graph, NodeType::End) => {
            return Err(CertflowError::Graph("a workflow has at most one end node".to_string()));
        }
        t if t.is_branch_member() => {
            return Err(CertflowError::Graph(format!("'{}' nodes only exist as branches", t)));
        }
        _ => {}
    }

    let mut new_ids = Vec::new();
    collect_ids(&node, &mut new_ids);
    if let Some(id) = new_ids.iter().find(|id| graph.contains(id)) {
        return Err(CertflowError::Graph(format!("node id '{}' already exists", id)));
    }

    let node_id = node.id.clone();
    let mut graph = graph.clone();
    let mut pending = Some(node);
    let mut outcome = Err(not_found(pre_id));

    walk_mut(&mut graph, &mut |current| {
        if current.id != pre_id {
            return false;
        }
        let Some(mut target) = pending.take() else {
            return true;
        };

        if target.node_type == NodeType::ExecuteResultBranch && !current.node_type.has_execute_result() {
            outcome = Err(CertflowError::Graph(format!("'{}' nodes have no execute result to branch on", current.node_type)));
            return true;
        }

        let rest = current.next.take();
        match target.branches.as_mut().and_then(|branches| branches.first_mut()) {
            Some(first) if target.node_type.is_fan_out() => first.tail_mut().next = rest,
            _ => target.next = rest,
        }
        current.next = Some(Box::new(target));
        outcome = Ok(());
        true
    });

    outcome?;
    debug!("workflow::add_node({} after {})", node_id, pre_id);
    Ok(graph)
}

/// Appends one more condition to the branch node `branch_id`.
pub fn add_branch(
    graph: &WorkflowNode,
    branch_id: &str,
) -> Result<WorkflowNode> {
    let mut graph = graph.clone();
    let mut outcome = Err(not_found(branch_id));

    walk_mut(&mut graph, &mut |node| {
        if node.id != branch_id {
            return false;
        }
        outcome = if node.node_type == NodeType::Branch {
            let branches = node.branches.get_or_insert_with(Vec::new);
            branches.push(new_node(NodeType::Condition, NewNodeOptions::branch(branches.len())));
            Ok(())
        } else {
            Err(CertflowError::Graph(format!("cannot add a branch to a '{}' node", node.node_type)))
        };
        true
    });

    outcome?;
    debug!("workflow::add_branch({})", branch_id);
    Ok(graph)
}

/// Splices the node `target_id` out of its chain.
///
/// Removing a fan-out node drops all of its branches; whatever followed it
/// stays linked.
pub fn remove_node(
    graph: &WorkflowNode,
    target_id: &str,
) -> Result<WorkflowNode> {
    if graph.id == target_id {
        return Err(CertflowError::Graph(format!("'{}' nodes cannot be removed", graph.node_type)));
    }

    let mut graph = graph.clone();
    let mut outcome = Err(not_found(target_id));

    walk_mut(&mut graph, &mut |node| {
        let Some(next) = node.next.as_deref_mut() else {
            return false;
        };
        if next.id != target_id {
            return false;
        }
        if next.node_type.is_unremovable() {
            outcome = Err(CertflowError::Graph(format!("'{}' nodes cannot be removed", next.node_type)));
            return true;
        }
        let rest = next.next.take();
        node.next = rest;
        outcome = Ok(());
        true
    });

    if matches!(outcome, Err(CertflowError::NodeNotFound(_))) && graph.contains(target_id) {
        return Err(CertflowError::Graph(format!("node '{}' heads a branch, remove the branch instead", target_id)));
    }
    outcome?;
    debug!("workflow::remove_node({})", target_id);
    Ok(graph)
}

/// Removes `branches[index]` from the fan-out node `branch_id`.
///
/// When a single branch would remain, the fan-out node itself goes away: the
/// surviving branch takes its place in the parent chain and its tail links to
/// whatever followed the fan-out node.
pub fn remove_branch(
    graph: &WorkflowNode,
    branch_id: &str,
    index: usize,
) -> Result<WorkflowNode> {
    if graph.id == branch_id {
        return Err(CertflowError::Graph(format!("'{}' has no parent to collapse into", branch_id)));
    }

    let mut graph = graph.clone();
    let mut outcome = Err(not_found(branch_id));

    walk_mut(&mut graph, &mut |parent| {
        if !parent.next.as_ref().is_some_and(|next| next.id == branch_id) {
            return false;
        }
        outcome = detach_branch(parent, index);
        true
    });

    outcome?;
    debug!("workflow::remove_branch({}, {})", branch_id, index);
    Ok(graph)
}

fn detach_branch(
    parent: &mut WorkflowNode,
    index: usize,
) -> Result<()> {
    let Some(fan_out) = parent.next.as_deref_mut() else {
        return Err(CertflowError::Graph("missing branch node".to_string()));
    };
    if !fan_out.node_type.is_fan_out() {
        return Err(CertflowError::Graph(format!("'{}' nodes have no branches", fan_out.node_type)));
    }

    let branches = fan_out.branches.get_or_insert_with(Vec::new);
    if index >= branches.len() {
        return Err(CertflowError::Graph(format!("branch index {} out of range ({} branches)", index, branches.len())));
    }
    branches.remove(index);
    if branches.len() > 1 {
        return Ok(());
    }

    let survivor = branches.pop();
    let rest = fan_out.next.take();
    parent.next = match survivor {
        Some(mut survivor) => {
            survivor.tail_mut().next = rest;
            Some(Box::new(survivor))
        }
        None => rest,
    };
    Ok(())
}

/// Inserts a copy of node `node_id` right after it.
pub fn duplicate_node(
    graph: &WorkflowNode,
    node_id: &str,
) -> Result<WorkflowNode> {
    let mut graph = graph.clone();
    let mut outcome = Err(not_found(node_id));

    walk_mut(&mut graph, &mut |node| {
        if node.id != node_id {
            return false;
        }
        if node.node_type.is_unduplicatable() || node.node_type.is_branch_member() {
            outcome = Err(CertflowError::Graph(format!("'{}' nodes cannot be duplicated", node.node_type)));
            return true;
        }

        let rest = node.next.take();
        let mut copy = clone_node(
            node,
            CloneNodeOptions {
                with_copy_suffix: true,
            },
        );
        copy.next = rest;
        node.next = Some(Box::new(copy));
        outcome = Ok(());
        true
    });

    outcome?;
    debug!("workflow::duplicate_node({})", node_id);
    Ok(graph)
}

/// Inserts a deep copy of `branches[index]` of branch node `branch_id` right after it.
pub fn duplicate_branch(
    graph: &WorkflowNode,
    branch_id: &str,
    index: usize,
) -> Result<WorkflowNode> {
    let mut graph = graph.clone();
    let mut outcome = Err(not_found(branch_id));

    walk_mut(&mut graph, &mut |node| {
        if node.id != branch_id {
            return false;
        }
        if node.node_type != NodeType::Branch {
            outcome = Err(CertflowError::Graph(format!("branches of '{}' nodes cannot be duplicated", node.node_type)));
            return true;
        }

        let branches = node.branches.get_or_insert_with(Vec::new);
        outcome = match branches.get(index) {
            Some(branch) => {
                let copy = clone_node(
                    branch,
                    CloneNodeOptions {
                        with_copy_suffix: true,
                    },
                );
                branches.insert(index + 1, copy);
                Ok(())
            }
            None => Err(CertflowError::Graph(format!("branch index {} out of range ({} branches)", index, branches.len()))),
        };
        true
    });

    outcome?;
    debug!("workflow::duplicate_branch({}, {})", branch_id, index);
    Ok(graph)
}

/// Nodes before `target_id` that output ports of `port_type`, in document order.
///
/// A node inside one branch never sees what a sibling branch produces. Each
/// returned node is a detached copy whose `output` only holds matching ports.
pub fn get_workflow_output_before_id(
    graph: &WorkflowNode,
    target_id: &str,
    port_type: &str,
) -> Vec<WorkflowNode> {
    let mut output = Vec::new();
    collect_outputs(Some(graph), target_id, port_type, &mut output);
    output
}

fn collect_outputs(
    mut current: Option<&WorkflowNode>,
    target_id: &str,
    port_type: &str,
    output: &mut Vec<WorkflowNode>,
) -> bool {
    while let Some(node) = current {
        if node.id == target_id {
            return true;
        }

        if node.node_type.is_fan_out() {
            let mark = output.len();
            for branch in node.branches.iter().flatten() {
                if collect_outputs(Some(branch), target_id, port_type, output) {
                    return true;
                }
                output.truncate(mark);
            }
        } else if let Some(ports) = node.output.as_ref().filter(|ports| ports.iter().any(|io| io.io_type == port_type)) {
            let mut copy = WorkflowNode::bare(node.id.clone(), node.name.clone(), node.node_type);
            copy.config = node.config.clone();
            copy.input = node.input.clone();
            copy.output = Some(ports.iter().filter(|io| io.io_type == port_type).cloned().collect());
            copy.validated = node.validated;
            output.push(copy);
        }

        current = node.next.as_deref();
    }
    false
}

/// Every non-fan-out node is validated, in every branch at every depth.
pub fn is_all_nodes_validated(graph: &WorkflowNode) -> bool {
    graph.chain().all(|node| {
        if node.node_type.is_fan_out() {
            node.branches.iter().flatten().all(is_all_nodes_validated)
        } else {
            node.validated
        }
    })
}

fn contains_type(
    graph: &WorkflowNode,
    node_type: NodeType,
) -> bool {
    graph
        .chain()
        .any(|node| node.node_type == node_type || node.branches.iter().flatten().any(|b| contains_type(b, node_type)))
}
