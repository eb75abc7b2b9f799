//! Editing session over one workflow envelope.
//!
//! [`WorkflowEditor`] owns a [`WorkflowModel`] and applies the graph mutators to
//! its draft. The released `content` only changes on [`WorkflowEditor::release`].

use tracing::debug;

use crate::{
    CertflowError, Result,
    model::{NodeId, NodePatch, NodeType, WorkflowModel, WorkflowNode, WorkflowTrigger},
    utils::text::{is_valid_crontab, sanitize_node_name},
    workflow::{self, InitWorkflowOptions, NewNodeOptions, get_execute_method, init_workflow, is_all_nodes_validated, new_node},
};

#[derive(Debug, Clone)]
pub struct WorkflowEditor {
    model: WorkflowModel,
}

impl WorkflowEditor {
    /// Starts editing `model`.
    ///
    /// Without a draft the editor starts from the released content, or from a
    /// fresh start node when nothing was ever released.
    pub fn new(mut model: WorkflowModel) -> Self {
        if model.draft.is_none() {
            model.draft = model.content.clone().or_else(|| init_workflow(InitWorkflowOptions::default()).draft);
        }
        Self {
            model,
        }
    }

    pub fn model(&self) -> &WorkflowModel {
        &self.model
    }

    pub fn into_model(self) -> WorkflowModel {
        self.model
    }

    pub fn draft(&self) -> Option<&WorkflowNode> {
        self.model.draft.as_ref()
    }

    pub fn has_changes(&self) -> bool {
        self.model.has_changes()
    }

    /// Adopts the stored envelope after a save, keeping the assigned id and stamps.
    pub(crate) fn replace_model(
        &mut self,
        model: WorkflowModel,
    ) {
        self.model = model;
    }

    fn edit<F>(
        &mut self,
        op: &str,
        target: &str,
        f: F,
    ) -> Result<()>
    where
        F: FnOnce(&WorkflowNode) -> Result<WorkflowNode>,
    {
        let draft = self
            .model
            .draft
            .as_ref()
            .ok_or_else(|| CertflowError::Workflow(format!("workflow '{}' has no draft", self.model.id)))?;
        let draft = f(draft)?;

        let method = get_execute_method(&draft);
        self.model.trigger = method.trigger();
        self.model.trigger_cron = method.cron();
        self.model.draft = Some(draft);
        self.model.has_draft = true;

        debug!("editor::{}({}) on workflow '{}'", op, target, self.model.id);
        Ok(())
    }

    /// Creates a node of `node_type` after `pre_id` and returns its id.
    pub fn add_node(
        &mut self,
        pre_id: &str,
        node_type: NodeType,
    ) -> Result<NodeId> {
        let node = new_node(node_type, NewNodeOptions::default());
        let id = node.id.clone();
        self.edit("add_node", pre_id, |draft| workflow::add_node(draft, pre_id, node))?;
        Ok(id)
    }

    pub fn add_branch(
        &mut self,
        branch_id: &str,
    ) -> Result<()> {
        self.edit("add_branch", branch_id, |draft| workflow::add_branch(draft, branch_id))
    }

    pub fn remove_node(
        &mut self,
        node_id: &str,
    ) -> Result<()> {
        self.edit("remove_node", node_id, |draft| workflow::remove_node(draft, node_id))
    }

    pub fn remove_branch(
        &mut self,
        branch_id: &str,
        index: usize,
    ) -> Result<()> {
        self.edit("remove_branch", branch_id, |draft| workflow::remove_branch(draft, branch_id, index))
    }

    pub fn duplicate_node(
        &mut self,
        node_id: &str,
    ) -> Result<()> {
        self.edit("duplicate_node", node_id, |draft| workflow::duplicate_node(draft, node_id))
    }

    pub fn duplicate_branch(
        &mut self,
        branch_id: &str,
        index: usize,
    ) -> Result<()> {
        self.edit("duplicate_branch", branch_id, |draft| workflow::duplicate_branch(draft, branch_id, index))
    }

    pub fn update_node(
        &mut self,
        patch: &NodePatch,
    ) -> Result<()> {
        self.edit("update_node", &patch.id, |draft| workflow::update_node(draft, patch))
    }

    /// Renames a node. A name that is empty after sanitizing leaves the node as is.
    pub fn rename_node(
        &mut self,
        node_id: &str,
        name: &str,
    ) -> Result<()> {
        let Some(name) = sanitize_node_name(name) else {
            return Ok(());
        };
        self.update_node(&NodePatch::new(node_id).name(name))
    }

    /// Publishes the draft as the workflow's content.
    pub fn release(&mut self) -> Result<()> {
        let Some(draft) = self.model.draft.as_ref() else {
            return Err(CertflowError::Workflow(format!("workflow '{}' has no draft", self.model.id)));
        };
        if !is_all_nodes_validated(draft) {
            return Err(CertflowError::Workflow("workflow has uncompleted nodes".to_string()));
        }

        self.model.content = Some(draft.clone());
        self.model.has_draft = false;
        debug!("editor::release() on workflow '{}'", self.model.id);
        Ok(())
    }

    /// Throws the draft away and goes back to the released content.
    pub fn discard(&mut self) -> Result<()> {
        let Some(content) = self.model.content.as_ref() else {
            return Err(CertflowError::Workflow("workflow has never been released".to_string()));
        };

        let method = get_execute_method(content);
        self.model.trigger = method.trigger();
        self.model.trigger_cron = method.cron();
        self.model.draft = Some(content.clone());
        self.model.has_draft = false;
        debug!("editor::discard() on workflow '{}'", self.model.id);
        Ok(())
    }

    pub fn set_enabled(
        &mut self,
        enabled: bool,
    ) -> Result<()> {
        if enabled {
            check_enable(&self.model)?;
        }
        self.model.enabled = enabled;
        debug!("editor::set_enabled({}) on workflow '{}'", enabled, self.model.id);
        Ok(())
    }
}

/// Enabling needs fully validated released content, and a usable crontab for
/// scheduled workflows.
pub(crate) fn check_enable(model: &WorkflowModel) -> Result<()> {
    let Some(content) = model.content.as_ref() else {
        return Err(CertflowError::Workflow("workflow has never been released".to_string()));
    };
    if !is_all_nodes_validated(content) {
        return Err(CertflowError::Workflow("workflow has uncompleted nodes".to_string()));
    }

    let method = get_execute_method(content);
    if method.trigger() == WorkflowTrigger::Scheduled && !is_valid_crontab(&method.schedule) {
        return Err(CertflowError::Workflow(format!("invalid crontab '{}'", method.schedule)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        model::NodeConfig,
        workflow::{CRONTAB_KEY, EXECUTION_METHOD_KEY, WorkflowTemplate, count_nodes, find_node},
    };

    fn editor() -> WorkflowEditor {
        WorkflowEditor::new(WorkflowModel {
            id: "wf1".to_string(),
            name: "renew".to_string(),
            ..Default::default()
        })
    }

    fn root_id(editor: &WorkflowEditor) -> String {
        editor.draft().unwrap().id.clone()
    }

    fn validate_all(editor: &mut WorkflowEditor) {
        let mut ids = Vec::new();
        collect(editor.draft().unwrap(), &mut ids);
        for id in ids {
            editor.update_node(&NodePatch::new(id).validated(true)).unwrap();
        }
    }

    fn collect(
        node: &WorkflowNode,
        ids: &mut Vec<String>,
    ) {
        for n in node.chain() {
            if !n.node_type.is_fan_out() {
                ids.push(n.id.clone());
            }
            for branch in n.branches.iter().flatten() {
                collect(branch, ids);
            }
        }
    }

    #[test]
    fn test_new_editor_creates_root() {
        let editor = editor();
        let root = editor.draft().unwrap();
        assert_eq!(root.node_type, NodeType::Start);
        assert!(!editor.model().has_draft);
    }

    #[test]
    fn test_new_editor_uses_released_content() {
        let mut model = init_workflow(InitWorkflowOptions {
            template: Some(WorkflowTemplate::Standard),
        });
        model.content = model.draft.take();
        model.has_draft = false;

        let editor = WorkflowEditor::new(model.clone());
        assert_eq!(editor.draft(), model.content.as_ref());
        assert!(!editor.has_changes());
    }

    #[test]
    fn test_add_node_marks_draft() {
        let mut editor = editor();
        let root = root_id(&editor);
        let id = editor.add_node(&root, NodeType::Apply).unwrap();

        assert!(editor.model().has_draft);
        assert!(editor.has_changes());
        let draft = editor.draft().unwrap();
        assert_eq!(draft.next.as_ref().unwrap().id, id);
        assert_eq!(count_nodes(draft), 2);
    }

    #[test]
    fn test_failed_edit_leaves_draft() {
        let mut editor = editor();
        let before = editor.draft().cloned();
        assert!(editor.remove_node("ghost").is_err());
        assert!(editor.add_node("ghost", NodeType::Deploy).is_err());
        assert_eq!(editor.draft().cloned(), before);
        assert!(!editor.model().has_draft);
    }

    #[test]
    fn test_branch_operations() {
        let mut editor = editor();
        let root = root_id(&editor);
        let branch_id = editor.add_node(&root, NodeType::Branch).unwrap();

        editor.add_branch(&branch_id).unwrap();
        editor.duplicate_branch(&branch_id, 0).unwrap();
        let branches = find_node(editor.draft().unwrap(), &branch_id).unwrap().branches.clone().unwrap();
        assert_eq!(branches.len(), 4);
        assert_eq!(branches[1].name, "Condition 1-copy");

        editor.remove_branch(&branch_id, 3).unwrap();
        editor.remove_branch(&branch_id, 2).unwrap();
        editor.remove_branch(&branch_id, 1).unwrap();
        assert!(find_node(editor.draft().unwrap(), &branch_id).is_none());
        assert_eq!(count_nodes(editor.draft().unwrap()), 2);
    }

    #[test]
    fn test_duplicate_and_remove_node() {
        let mut editor = editor();
        let root = root_id(&editor);
        let id = editor.add_node(&root, NodeType::Notify).unwrap();
        editor.duplicate_node(&id).unwrap();
        assert_eq!(count_nodes(editor.draft().unwrap()), 3);

        editor.remove_node(&id).unwrap();
        let draft = editor.draft().unwrap();
        assert_eq!(count_nodes(draft), 2);
        assert_eq!(draft.next.as_ref().unwrap().name, "Notify-copy");
    }

    #[test]
    fn test_rename_node_sanitizes() {
        let mut editor = editor();
        let root = root_id(&editor);
        let id = editor.add_node(&root, NodeType::Deploy).unwrap();

        editor.rename_node(&id, "  to\r\n CDN ").unwrap();
        assert_eq!(find_node(editor.draft().unwrap(), &id).unwrap().name, "to CDN");

        editor.rename_node(&id, " \n ").unwrap();
        assert_eq!(find_node(editor.draft().unwrap(), &id).unwrap().name, "to CDN");
    }

    #[test]
    fn test_trigger_mirrors_start_config() {
        let mut editor = editor();
        let root = root_id(&editor);
        let mut config = NodeConfig::new();
        config.insert(EXECUTION_METHOD_KEY.to_string(), json!("scheduled"));
        config.insert(CRONTAB_KEY.to_string(), json!("0 0 * * *"));
        editor.update_node(&NodePatch::new(root).config(config)).unwrap();

        assert_eq!(editor.model().trigger, WorkflowTrigger::Scheduled);
        assert_eq!(editor.model().trigger_cron.as_deref(), Some("0 0 * * *"));
    }

    #[test]
    fn test_release_requires_validated_nodes() {
        let mut editor = editor();
        let root = root_id(&editor);
        editor.add_node(&root, NodeType::Apply).unwrap();

        let err = editor.release().unwrap_err();
        assert!(err.to_string().contains("uncompleted"));
        assert!(editor.model().content.is_none());

        validate_all(&mut editor);
        editor.release().unwrap();
        assert!(editor.model().is_released());
        assert!(!editor.has_changes());
    }

    #[test]
    fn test_discard() {
        let mut editor = editor();
        assert!(editor.discard().is_err());

        validate_all(&mut editor);
        editor.release().unwrap();
        let root = root_id(&editor);
        editor.add_node(&root, NodeType::Notify).unwrap();
        assert!(editor.has_changes());

        editor.discard().unwrap();
        assert!(!editor.has_changes());
        assert_eq!(count_nodes(editor.draft().unwrap()), 1);
    }

    #[test]
    fn test_set_enabled() {
        let mut editor = editor();
        assert!(editor.set_enabled(true).is_err());
        editor.set_enabled(false).unwrap();

        validate_all(&mut editor);
        editor.release().unwrap();
        editor.set_enabled(true).unwrap();
        assert!(editor.model().enabled);

        let mut config = NodeConfig::new();
        config.insert(EXECUTION_METHOD_KEY.to_string(), json!("scheduled"));
        config.insert(CRONTAB_KEY.to_string(), json!("every day"));
        let root = root_id(&editor);
        editor.update_node(&NodePatch::new(root).config(config)).unwrap();
        editor.release().unwrap();
        assert!(editor.set_enabled(true).is_err());
    }
}
