use certflow::{
    ConsoleBuilder, InitWorkflowOptions, NodePatch, NodeType, WorkflowEditor, WorkflowRunStatus, WorkflowTemplate, WorkflowTrigger,
    init_workflow,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("certflow=debug"))).init();

    let console = ConsoleBuilder::new().async_worker_thread_number(2).build().unwrap();
    console.launch();

    let mut editor = WorkflowEditor::new(init_workflow(InitWorkflowOptions {
        template: Some(WorkflowTemplate::Standard),
    }));

    // the branch takes over deploy -> notify on its first condition
    let apply = editor.draft().unwrap().next.as_ref().unwrap().id.clone();
    let branch = editor.add_node(&apply, NodeType::Branch).unwrap();
    let conditions: Vec<String> = certflow::find_node(editor.draft().unwrap(), &branch)
        .and_then(|n| n.branches.as_ref())
        .map(|branches| branches.iter().map(|c| c.id.clone()).collect())
        .unwrap_or_default();
    if let Some(second) = conditions.last() {
        editor.add_node(second, NodeType::Deploy).unwrap();
    }

    let ids: Vec<String> = collect_ids(editor.draft().unwrap());
    for id in ids {
        editor.update_node(&NodePatch::new(id).validated(true)).unwrap();
    }
    editor.release().unwrap();
    println!("Workflow graph: {}", serde_json::to_string_pretty(editor.draft().unwrap()).unwrap());

    let workflow = console.save_editor(&mut editor).unwrap();
    let workflow = console.set_workflow_enabled(&workflow.id, true).unwrap();
    println!("Workflow '{}' enabled: {}", workflow.name, workflow.enabled);

    let run = console.start_run(&workflow.id, WorkflowTrigger::Manual).unwrap();
    let watch = console
        .watch_run(&run.id, |run| {
            println!("Run {} is {}", run.id, run.status);
        })
        .unwrap();

    console.update_run_status(&run.id, WorkflowRunStatus::Running, None).unwrap();
    console.update_run_status(&run.id, WorkflowRunStatus::Succeeded, None).unwrap();

    while !watch.is_finished() {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    println!("Statistics: {:#?}", console.statistics().unwrap());
    console.shutdown();
}

fn collect_ids(node: &certflow::WorkflowNode) -> Vec<String> {
    let mut ids = Vec::new();
    for n in node.chain() {
        ids.push(n.id.clone());
        for branch in n.branches.iter().flatten() {
            ids.extend(collect_ids(branch));
        }
    }
    ids
}
