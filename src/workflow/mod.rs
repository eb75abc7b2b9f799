mod graph;
mod node;
mod template;

pub use graph::{
    add_branch, add_node, count_nodes, duplicate_branch, duplicate_node, find_node, get_workflow_output_before_id,
    is_all_nodes_validated, remove_branch, remove_node, update_node,
};
pub use node::{COPY_SUFFIX, CloneNodeOptions, NewNodeOptions, clone_node, new_node};
pub use template::{
    CRONTAB_KEY, EXECUTION_METHOD_KEY, ExecuteMethod, InitWorkflowOptions, WorkflowTemplate, get_execute_method, init_workflow,
};
