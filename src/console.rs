//! Console - the main entry point for Certflow.
//!
//! The console owns the repository, the realtime channel and the caches, and
//! exposes every workflow, run, log, access, certificate and settings
//! operation. Each successful write is published on the channel as a
//! [`RecordEvent`].

mod watcher;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

use crate::{
    CertflowError, Config, Result, StoreType,
    common::{MemCache, Shutdown},
    editor::{WorkflowEditor, check_enable},
    events::{RecordAction, RecordEvent},
    model::{
        AccessModel, CertificateModel, CertificateState, SettingsModel, SettingsName, WorkflowLogModel, WorkflowModel, WorkflowRunModel,
        WorkflowRunStatus, WorkflowTrigger,
    },
    runtime::{Channel, SubscribeOptions, Subscription},
    store::{
        DbCollectionIden, DbStore, MemStore, PageData, Store, StoreIden,
        query::{Expr, Query},
    },
    utils,
    workflow::{COPY_SUFFIX, CloneNodeOptions, InitWorkflowOptions, clone_node, get_execute_method, init_workflow},
};

pub use watcher::{RunWatch, RunWatchSet};
use watcher::glob_literal;

const ACCESSES_CACHE_KEY: &str = "accesses";

/// Filters for [`Console::list_workflows`].
#[derive(Debug, Clone, Default)]
pub struct WorkflowListQuery {
    /// case-insensitive match on name or description
    pub keyword: Option<String>,
    pub enabled: Option<bool>,
    /// defaults to `-created`
    pub sort: Option<String>,
    /// 1-based
    pub page: usize,
    /// defaults to `list.default_page_size`, 0 lists everything
    pub page_size: Option<usize>,
}

/// Filters for [`Console::list_runs`].
#[derive(Debug, Clone, Default)]
pub struct RunListQuery {
    pub workflow_id: Option<String>,
    pub status: Option<WorkflowRunStatus>,
    /// only runs that have (or have not) ended
    pub finished: Option<bool>,
    pub page: usize,
    pub page_size: Option<usize>,
}

/// Filters for [`Console::list_certificates`].
#[derive(Debug, Clone, Default)]
pub struct CertificateListQuery {
    /// case-insensitive match on the subject alternative names
    pub keyword: Option<String>,
    pub state: Option<CertificateState>,
    pub page: usize,
    pub page_size: Option<usize>,
}

/// Dashboard counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub certificate_total: usize,
    pub certificate_expire_soon: usize,
    pub certificate_expired: usize,
    pub workflow_total: usize,
    pub workflow_enabled: usize,
}

/// A stored record with an id and creation/update stamps.
trait Record: DbCollectionIden + Serialize + Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn set_id(
        &mut self,
        id: String,
    );
    fn created(&self) -> &str;
    fn stamp(
        &mut self,
        created: String,
        updated: String,
    );
}

/// A record that is hidden by a `deleted` marker instead of being removed.
trait SoftDelete: Record {
    fn mark_deleted(
        &mut self,
        stamp: String,
    );
}

macro_rules! impl_record {
    ($($model:ty), +) => {
        $(
            impl Record for $model {
                fn id(&self) -> &str {
                    &self.id
                }

                fn set_id(&mut self, id: String) {
                    self.id = id;
                }

                fn created(&self) -> &str {
                    &self.created
                }

                fn stamp(&mut self, created: String, updated: String) {
                    self.created = created;
                    self.updated = updated;
                }
            }
        )+
    };
}

impl_record!(AccessModel, CertificateModel, SettingsModel, WorkflowModel, WorkflowRunModel);

impl SoftDelete for AccessModel {
    fn mark_deleted(
        &mut self,
        stamp: String,
    ) {
        self.deleted = Some(stamp);
    }
}

impl SoftDelete for CertificateModel {
    fn mark_deleted(
        &mut self,
        stamp: String,
    ) {
        self.deleted = Some(stamp);
    }
}

fn rejected(
    op: &str,
    err: CertflowError,
) -> CertflowError {
    warn!("console::{} rejected: {}", op, err);
    err
}

/// Slices an in-memory result list the way collection queries page.
fn paginate<T>(
    rows: Vec<T>,
    page: usize,
    page_size: usize,
) -> PageData<T> {
    let count = rows.len();
    if page_size == 0 {
        return PageData {
            count,
            page_num: 1,
            page_count: usize::from(count > 0),
            page_size,
            rows,
        };
    }

    let page_num = page.max(1);
    PageData {
        count,
        page_num,
        page_count: count.div_ceil(page_size),
        page_size,
        rows: rows.into_iter().skip((page_num - 1).saturating_mul(page_size)).take(page_size).collect(),
    }
}

/// The certificate workflow console.
///
/// # Example
///
/// ```rust,ignore
/// let console = ConsoleBuilder::new().build()?;
/// console.launch();
///
/// let mut editor = WorkflowEditor::new(init_workflow(InitWorkflowOptions::default()));
/// // ... edit, validate and release
/// let workflow = console.save_editor(&mut editor)?;
/// let run = console.start_run(&workflow.id, WorkflowTrigger::Manual)?;
///
/// console.shutdown();
/// ```
pub struct Console {
    config: Config,
    /// Realtime channel for record events.
    channel: Arc<Channel>,
    /// Repository for every collection.
    store: Arc<Store>,
    /// Cached non-deleted accesses.
    accesses: MemCache<String, Vec<AccessModel>>,

    running: Arc<AtomicBool>,
    runtime: Arc<Runtime>,
    shutdown: Arc<Shutdown>,
}

impl Console {
    /// Creates a console with its own tokio runtime.
    pub fn new_with_config(config: Config) -> Result<Self> {
        let runtime = Builder::new_multi_thread().worker_threads(config.async_worker_thread_number.into()).enable_all().build()?;
        Self::with_runtime(config, Arc::new(runtime))
    }

    pub(crate) fn with_runtime(
        config: Config,
        runtime: Arc<Runtime>,
    ) -> Result<Self> {
        let store = Store::new();
        let db: Box<dyn DbStore> = match config.store.store_type {
            StoreType::Mem => Box::new(MemStore::new()),
        };
        db.init(&store);

        let channel = Channel::new(runtime.clone(), &config.channel)?;

        Ok(Self {
            accesses: MemCache::new(config.list.accesses_cache_size),
            config,
            channel: Arc::new(channel),
            store: Arc::new(store),
            running: Arc::new(AtomicBool::new(false)),
            runtime,
            shutdown: Arc::new(Shutdown::new()),
        })
    }

    /// Starts serving operations. A console that was shut down stays down.
    pub fn launch(&self) {
        if self.shutdown.is_shutdown() {
            warn!("console::launch() after shutdown is ignored");
            return;
        }
        if self.running.swap(true, Ordering::Relaxed) {
            return;
        }
        info!("console launched with {:?} store", self.config.store.store_type);
    }

    /// Stops the console and ends every subscription and run watch.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }

        self.shutdown.shutdown();
        self.channel.shutdown();
        self.accesses.clear();
        info!("console shut down");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn ensure_running(&self) -> Result<()> {
        if !self.is_running() {
            return Err(CertflowError::Console("console is not running".to_string()));
        }
        Ok(())
    }

    fn page_size(
        &self,
        page_size: Option<usize>,
    ) -> usize {
        page_size.unwrap_or(self.config.list.default_page_size)
    }

    fn publish<T: Serialize>(
        &self,
        collection: StoreIden,
        action: RecordAction,
        id: &str,
        record: &T,
    ) {
        match RecordEvent::new(collection, action, id, record) {
            Ok(e) => self.channel.publish(e),
            Err(err) => warn!("console::publish({}, {}) failed: {}", collection.as_ref(), id, err),
        }
    }

    /// Creates the record, or replaces it keeping its creation stamp.
    fn upsert<T: Record>(
        &self,
        record: &T,
    ) -> Result<T> {
        let collection = self.store.collection::<T>()?;
        let mut record = record.clone();
        if record.id().is_empty() {
            record.set_id(utils::longid());
        }

        let now = utils::time::now_rfc3339();
        let created = if collection.exists(record.id())? {
            collection.find(record.id())?.created().to_string()
        } else if record.created().is_empty() {
            now.clone()
        } else {
            record.created().to_string()
        };
        record.stamp(created, now);
        let action = if self.store.save(record.id(), &record)? { RecordAction::Create } else { RecordAction::Update };

        debug!("console::upsert({}, {}) {}", T::iden().as_ref(), record.id(), action);
        self.publish(T::iden(), action, record.id(), &record);
        Ok(record)
    }

    fn remove<T: Record>(
        &self,
        id: &str,
    ) -> Result<T> {
        let collection = self.store.collection::<T>()?;
        let record = collection.find(id)?;
        collection.delete(id)?;
        self.publish(T::iden(), RecordAction::Delete, id, &record);
        Ok(record)
    }

    fn soft_remove<T: SoftDelete>(
        &self,
        ids: &[String],
    ) -> Result<()> {
        let collection = self.store.collection::<T>()?;
        // every id must resolve before anything is marked
        let records = ids.iter().map(|id| collection.find(id)).collect::<Result<Vec<_>>>()?;

        let stamp = utils::time::deleted_stamp();
        for mut record in records {
            record.mark_deleted(stamp.clone());
            collection.update(&record)?;
            self.publish(T::iden(), RecordAction::Delete, record.id(), &record);
        }
        Ok(())
    }

    /// Listens for record events matching `options`.
    pub fn subscribe(
        &self,
        options: SubscribeOptions,
    ) -> Result<Subscription> {
        self.ensure_running()?;
        self.channel.subscribe(options)
    }

    // ---- workflows ----

    /// Creates or updates a workflow, assigning its id and stamps.
    pub fn save_workflow(
        &self,
        workflow: &WorkflowModel,
    ) -> Result<WorkflowModel> {
        self.ensure_running()?;
        self.upsert(workflow)
    }

    pub fn get_workflow(
        &self,
        id: &str,
    ) -> Result<WorkflowModel> {
        self.ensure_running()?;
        self.store.workflows()?.find(id)
    }

    pub fn list_workflows(
        &self,
        query: &WorkflowListQuery,
    ) -> Result<PageData<WorkflowModel>> {
        self.ensure_running()?;
        let mut q = Query::new();
        if let Some(keyword) = query.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
            q = q.filter(Expr::any(vec![Expr::like("name", keyword.trim()), Expr::like("description", keyword.trim())]));
        }
        if let Some(enabled) = query.enabled {
            q = q.filter(Expr::eq("enabled", enabled));
        }
        let q = q.sort(query.sort.as_deref().unwrap_or("-created")).page(query.page, self.page_size(query.page_size));
        self.store.workflows()?.query(&q)
    }

    /// Deletes a workflow together with its runs and their logs.
    pub fn remove_workflow(
        &self,
        id: &str,
    ) -> Result<()> {
        self.ensure_running()?;
        self.remove::<WorkflowModel>(id)?;

        let by_workflow = Query::new().filter(Expr::eq("workflowRef", id));
        for run in self.store.runs()?.query(&by_workflow)?.rows {
            self.remove::<WorkflowRunModel>(&run.id)?;
        }
        let logs = self.store.logs()?;
        for log in logs.query(&by_workflow)?.rows {
            logs.delete(&log.id)?;
        }
        info!("workflow '{}' removed", id);
        Ok(())
    }

    /// Copies a workflow into a new, disabled, unreleased one.
    ///
    /// The copy's draft is a fresh-id clone of the released content, else of
    /// the draft, else a new start node.
    pub fn duplicate_workflow(
        &self,
        id: &str,
    ) -> Result<WorkflowModel> {
        self.ensure_running()?;
        let source = self.store.workflows()?.find(id)?;

        let graph = source
            .content
            .as_ref()
            .or(source.draft.as_ref())
            .map(|graph| clone_node(graph, CloneNodeOptions::default()))
            .or_else(|| init_workflow(InitWorkflowOptions::default()).draft);
        let method = graph.as_ref().map(get_execute_method).unwrap_or_default();

        let copy = WorkflowModel {
            name: format!("{}{}", source.name, COPY_SUFFIX),
            description: source.description.clone(),
            trigger: method.trigger(),
            trigger_cron: method.cron(),
            draft: graph,
            has_draft: true,
            enabled: false,
            ..Default::default()
        };
        self.upsert(&copy)
    }

    pub fn set_workflow_enabled(
        &self,
        id: &str,
        enabled: bool,
    ) -> Result<WorkflowModel> {
        self.ensure_running()?;
        let mut workflow = self.store.workflows()?.find(id)?;
        if enabled {
            check_enable(&workflow).map_err(|e| rejected("set_workflow_enabled", e))?;
        }
        workflow.enabled = enabled;
        self.upsert(&workflow)
    }

    /// Starts an editing session over a stored workflow.
    pub fn open_editor(
        &self,
        id: &str,
    ) -> Result<WorkflowEditor> {
        Ok(WorkflowEditor::new(self.get_workflow(id)?))
    }

    /// Saves the editor's envelope and hands the stored copy back to the editor,
    /// so later saves update the same record.
    pub fn save_editor(
        &self,
        editor: &mut WorkflowEditor,
    ) -> Result<WorkflowModel> {
        let saved = self.save_workflow(editor.model())?;
        editor.replace_model(saved.clone());
        Ok(saved)
    }

    // ---- runs ----

    /// Queues a run of a released workflow.
    pub fn start_run(
        &self,
        workflow_id: &str,
        trigger: WorkflowTrigger,
    ) -> Result<WorkflowRunModel> {
        self.ensure_running()?;
        let mut workflow = self.store.workflows()?.find(workflow_id)?;
        if !workflow.is_released() {
            return Err(rejected("start_run", CertflowError::Workflow(format!("workflow '{}' has never been released", workflow_id))));
        }
        if workflow.last_run_status.is_some_and(|status| !status.is_terminal()) {
            return Err(rejected("start_run", CertflowError::Workflow(format!("workflow '{}' is already running", workflow_id))));
        }

        let run = self.upsert(&WorkflowRunModel {
            workflow_ref: workflow.id.clone(),
            status: WorkflowRunStatus::Pending,
            trigger,
            started_at: utils::time::now_rfc3339(),
            ..Default::default()
        })?;

        workflow.last_run_id = Some(run.id.clone());
        workflow.last_run_status = Some(run.status);
        workflow.last_run_time = Some(run.started_at.clone());
        self.upsert(&workflow)?;

        info!("run '{}' of workflow '{}' started ({})", run.id, workflow_id, trigger);
        Ok(run)
    }

    /// Records a status change pushed by the executor.
    pub fn update_run_status(
        &self,
        run_id: &str,
        status: WorkflowRunStatus,
        error: Option<&str>,
    ) -> Result<WorkflowRunModel> {
        self.ensure_running()?;
        let mut run = self.store.runs()?.find(run_id)?;
        if run.status.is_terminal() {
            return Err(rejected("update_run_status", CertflowError::Workflow(format!("run '{}' already {}", run_id, run.status))));
        }

        run.status = status;
        if status.is_terminal() {
            run.ended_at = Some(utils::time::now_rfc3339());
        }
        if let Some(error) = error {
            run.error = Some(error.to_string());
        }
        let run = self.upsert(&run)?;

        let workflows = self.store.workflows()?;
        if workflows.exists(&run.workflow_ref)? {
            let mut workflow = workflows.find(&run.workflow_ref)?;
            if workflow.last_run_id.as_deref() == Some(run.id.as_str()) {
                workflow.last_run_status = Some(run.status);
                self.upsert(&workflow)?;
            }
        }
        Ok(run)
    }

    /// Cancels a pending or running run.
    pub fn cancel_run(
        &self,
        run_id: &str,
    ) -> Result<WorkflowRunModel> {
        self.ensure_running()?;
        let run = self.store.runs()?.find(run_id)?;
        if !matches!(run.status, WorkflowRunStatus::Pending | WorkflowRunStatus::Running) {
            return Err(rejected("cancel_run", CertflowError::Workflow(format!("run '{}' is {} and cannot be canceled", run_id, run.status))));
        }
        self.update_run_status(run_id, WorkflowRunStatus::Canceled, None)
    }

    pub fn get_run(
        &self,
        run_id: &str,
    ) -> Result<WorkflowRunModel> {
        self.ensure_running()?;
        self.store.runs()?.find(run_id)
    }

    pub fn list_runs(
        &self,
        query: &RunListQuery,
    ) -> Result<PageData<WorkflowRunModel>> {
        self.ensure_running()?;
        let mut q = Query::new();
        if let Some(workflow_id) = query.workflow_id.as_deref() {
            q = q.filter(Expr::eq("workflowRef", workflow_id));
        }
        if let Some(status) = query.status {
            q = q.filter(Expr::eq("status", status.to_string()));
        }
        match query.finished {
            Some(true) => q = q.filter(Expr::not_null("endedAt")),
            Some(false) => q = q.filter(Expr::is_null("endedAt")),
            None => {}
        }
        let q = q.sort("-created").page(query.page, self.page_size(query.page_size));
        self.store.runs()?.query(&q)
    }

    /// Deletes a run and its logs.
    pub fn remove_run(
        &self,
        run_id: &str,
    ) -> Result<()> {
        self.ensure_running()?;
        self.remove::<WorkflowRunModel>(run_id)?;

        let logs = self.store.logs()?;
        for log in logs.query(&Query::new().filter(Expr::eq("runRef", run_id)))?.rows {
            logs.delete(&log.id)?;
        }
        Ok(())
    }

    /// Calls `callback` with the run as stored now, then on every update, until
    /// it reaches a terminal status. A run that already ended is delivered once.
    pub fn watch_run<F>(
        &self,
        run_id: &str,
        callback: F,
    ) -> Result<RunWatch>
    where
        F: FnMut(&WorkflowRunModel) + Send + 'static,
    {
        self.ensure_running()?;
        let runs = self.store.runs()?;
        runs.find(run_id)?;

        // subscribe before reading the snapshot so no update falls in between
        let subscription = self.channel.subscribe(SubscribeOptions::new(StoreIden::WorkflowRun, &glob_literal(run_id)))?;
        let snapshot = runs.find(run_id)?;
        debug!("console::watch_run({}) from {}", run_id, snapshot.status);
        Ok(RunWatch::spawn(&self.runtime, snapshot, subscription, callback))
    }

    // ---- logs ----

    pub fn append_log(
        &self,
        log: &WorkflowLogModel,
    ) -> Result<WorkflowLogModel> {
        self.ensure_running()?;
        let run = self.store.runs()?.find(&log.run_ref)?;

        let mut log = log.clone();
        if log.id.is_empty() {
            log.id = utils::longid();
        }
        if log.workflow_ref.is_empty() {
            log.workflow_ref = run.workflow_ref;
        }
        if log.timestamp == 0 {
            log.timestamp = utils::time::time_millis();
        }
        log.created = utils::time::now_rfc3339();

        self.store.logs()?.create(&log)?;
        self.publish(StoreIden::WorkflowLogs, RecordAction::Create, &log.id, &log);
        Ok(log)
    }

    /// Logs of a run, oldest first.
    pub fn list_logs(
        &self,
        run_id: &str,
    ) -> Result<Vec<WorkflowLogModel>> {
        self.ensure_running()?;
        let q = Query::new().filter(Expr::eq("runRef", run_id)).sort("timestamp").page(1, 0);
        Ok(self.store.logs()?.query(&q)?.rows)
    }

    // ---- accesses ----

    pub fn save_access(
        &self,
        access: &AccessModel,
    ) -> Result<AccessModel> {
        self.ensure_running()?;
        let access = self.upsert(access)?;
        self.invalidate_accesses();
        Ok(access)
    }

    fn invalidate_accesses(&self) {
        self.accesses.remove(&ACCESSES_CACHE_KEY.to_string());
    }

    /// Every non-deleted access, newest first.
    pub fn list_accesses(&self) -> Result<Vec<AccessModel>> {
        self.ensure_running()?;
        let key = ACCESSES_CACHE_KEY.to_string();
        if let Some(accesses) = self.accesses.get(&key) {
            return Ok(accesses);
        }

        let q = Query::new().filter(Expr::is_null("deleted")).sort("-created").page(1, 0);
        let accesses = self.store.accesses()?.query(&q)?.rows;
        self.accesses.set(key, accesses.clone());
        Ok(accesses)
    }

    pub fn remove_accesses(
        &self,
        ids: &[String],
    ) -> Result<()> {
        self.ensure_running()?;
        let removed = self.soft_remove::<AccessModel>(ids);
        self.invalidate_accesses();
        removed
    }

    // ---- certificates ----

    pub fn save_certificate(
        &self,
        certificate: &CertificateModel,
    ) -> Result<CertificateModel> {
        self.ensure_running()?;
        self.upsert(certificate)
    }

    pub fn list_certificates(
        &self,
        query: &CertificateListQuery,
    ) -> Result<PageData<CertificateModel>> {
        self.ensure_running()?;
        let mut q = Query::new().filter(Expr::is_null("deleted"));
        if let Some(keyword) = query.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
            q = q.filter(Expr::like("subjectAltNames", keyword.trim()));
        }
        let q = q.sort("-created");
        let page_size = self.page_size(query.page_size);
        let certificates = self.store.certificates()?;

        match query.state {
            None => certificates.query(&q.page(query.page, page_size)),
            Some(state) => {
                let now = chrono::Utc::now();
                let soon = self.config.certificate.expire_soon_days;
                let rows = certificates.query(&q.page(1, 0))?.rows.into_iter().filter(|c| c.state(now, soon) == Some(state)).collect();
                Ok(paginate(rows, query.page, page_size))
            }
        }
    }

    pub fn remove_certificates(
        &self,
        ids: &[String],
    ) -> Result<()> {
        self.ensure_running()?;
        self.soft_remove::<CertificateModel>(ids)
    }

    pub fn statistics(&self) -> Result<Statistics> {
        self.ensure_running()?;
        let now = chrono::Utc::now();
        let soon = self.config.certificate.expire_soon_days;

        let certificates = self.store.certificates()?.query(&Query::new().filter(Expr::is_null("deleted")).page(1, 0))?.rows;
        let workflows = self.store.workflows()?.query(&Query::new().page(1, 0))?.rows;

        Ok(Statistics {
            certificate_total: certificates.len(),
            certificate_expire_soon: certificates.iter().filter(|c| c.state(now, soon) == Some(CertificateState::ExpireSoon)).count(),
            certificate_expired: certificates.iter().filter(|c| c.state(now, soon) == Some(CertificateState::Expired)).count(),
            workflow_total: workflows.len(),
            workflow_enabled: workflows.iter().filter(|w| w.enabled).count(),
        })
    }

    // ---- settings ----

    /// The settings record called `name`, or an empty one when none is stored.
    pub fn get_settings(
        &self,
        name: SettingsName,
    ) -> Result<SettingsModel> {
        self.ensure_running()?;
        let name: &str = name.as_ref();
        let q = Query::new().filter(Expr::eq("name", name)).page(1, 1);
        let stored = self.store.settings()?.query(&q)?.rows.into_iter().next();
        Ok(stored.unwrap_or_else(|| SettingsModel {
            name: name.to_string(),
            content: json!({}),
            ..Default::default()
        }))
    }

    /// Replaces the content of the settings record called `name`.
    pub fn save_settings(
        &self,
        name: SettingsName,
        content: JsonValue,
    ) -> Result<SettingsModel> {
        let mut settings = self.get_settings(name)?;
        settings.content = content;
        self.upsert(&settings)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use chrono::{SecondsFormat, Utc};

    use super::*;
    use crate::{
        ConsoleBuilder,
        model::{NodePatch, NodeType, NotifyTemplatesContent, WorkflowLogLevel},
    };

    const WAIT: Duration = Duration::from_secs(2);

    fn console() -> Console {
        let console = ConsoleBuilder::new().async_worker_thread_number(1).build().unwrap();
        console.launch();
        console
    }

    /// A saved workflow whose start node is released.
    fn released(console: &Console) -> WorkflowModel {
        let mut editor = WorkflowEditor::new(init_workflow(InitWorkflowOptions::default()));
        let root = editor.draft().unwrap().id.clone();
        editor.update_node(&NodePatch::new(root).validated(true)).unwrap();
        editor.release().unwrap();
        console.save_editor(&mut editor).unwrap()
    }

    fn certificate(
        name: &str,
        days: i64,
    ) -> CertificateModel {
        let not_after = Utc::now() + chrono::Duration::days(days) + chrono::Duration::hours(1);
        CertificateModel {
            subject_alt_names: name.to_string(),
            validity_not_after: not_after.to_rfc3339_opts(SecondsFormat::Secs, true),
            ..Default::default()
        }
    }

    fn wait_until(f: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < WAIT {
            if f() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        f()
    }

    #[test]
    fn test_console_lifecycle() {
        let console = ConsoleBuilder::new().async_worker_thread_number(1).build().unwrap();
        assert!(console.list_workflows(&WorkflowListQuery::default()).is_err());

        console.launch();
        console.launch();
        assert!(console.is_running());
        assert!(console.list_workflows(&WorkflowListQuery::default()).is_ok());

        console.shutdown();
        console.shutdown();
        assert!(!console.is_running());

        console.launch();
        assert!(!console.is_running());
    }

    #[test]
    fn test_save_and_list_workflows() {
        let console = console();
        let saved = console
            .save_workflow(&WorkflowModel {
                name: "Renew example.com".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert!(!saved.id.is_empty());
        assert!(!saved.created.is_empty());

        let mut again = saved.clone();
        again.description = "weekly".to_string();
        let again = console.save_workflow(&again).unwrap();
        assert_eq!(again.created, saved.created);
        assert_eq!(console.get_workflow(&saved.id).unwrap().description, "weekly");

        for i in 0..3 {
            console
                .save_workflow(&WorkflowModel {
                    name: format!("upload {}", i),
                    enabled: i == 0,
                    ..Default::default()
                })
                .unwrap();
        }

        let by_keyword = console
            .list_workflows(&WorkflowListQuery {
                keyword: Some("EXAMPLE".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_keyword.count, 1);

        let enabled = console
            .list_workflows(&WorkflowListQuery {
                enabled: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(enabled.count, 1);

        let paged = console
            .list_workflows(&WorkflowListQuery {
                page: 2,
                page_size: Some(3),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(paged.count, 4);
        assert_eq!(paged.page_count, 2);
        assert_eq!(paged.rows.len(), 1);
    }

    #[test]
    fn test_duplicate_workflow() {
        let console = console();
        let source = released(&console);
        let copy = console.duplicate_workflow(&source.id).unwrap();

        assert_ne!(copy.id, source.id);
        assert_eq!(copy.name, format!("{}-copy", source.name));
        assert!(copy.has_draft);
        assert!(!copy.enabled);
        assert!(copy.content.is_none());
        let draft = copy.draft.unwrap();
        assert_eq!(draft.node_type, NodeType::Start);
        assert_ne!(draft.id, source.content.unwrap().id);
    }

    #[test]
    fn test_set_workflow_enabled() {
        let console = console();
        let draft_only = console.save_workflow(&init_workflow(InitWorkflowOptions::default())).unwrap();
        assert!(console.set_workflow_enabled(&draft_only.id, true).is_err());
        assert!(console.set_workflow_enabled(&draft_only.id, false).is_ok());

        let workflow = released(&console);
        assert!(console.set_workflow_enabled(&workflow.id, true).unwrap().enabled);
    }

    #[test]
    fn test_editor_round_trip() {
        let console = console();
        let workflow = console.save_workflow(&init_workflow(InitWorkflowOptions::default())).unwrap();

        let mut editor = console.open_editor(&workflow.id).unwrap();
        let root = editor.draft().unwrap().id.clone();
        let apply = editor.add_node(&root, NodeType::Apply).unwrap();
        let saved = console.save_editor(&mut editor).unwrap();

        assert_eq!(saved.id, workflow.id);
        assert_eq!(saved.draft.unwrap().next.unwrap().id, apply);
    }

    #[test]
    fn test_save_editor_keeps_one_record() {
        let console = console();
        let mut editor = WorkflowEditor::new(init_workflow(InitWorkflowOptions::default()));
        let first = console.save_editor(&mut editor).unwrap();
        assert_eq!(editor.model().id, first.id);
        assert_eq!(editor.model().created, first.created);

        let root = editor.draft().unwrap().id.clone();
        editor.rename_node(&root, "Kick off").unwrap();
        let second = console.save_editor(&mut editor).unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.created, first.created);
        assert_eq!(second.draft.unwrap().name, "Kick off");
        assert_eq!(console.list_workflows(&WorkflowListQuery::default()).unwrap().count, 1);
    }

    #[test]
    fn test_paginate_huge_page() {
        let page = paginate(vec![1, 2, 3], usize::MAX, 2);
        assert_eq!(page.count, 3);
        assert_eq!(page.page_count, 2);
        assert!(page.rows.is_empty());
        assert_eq!(paginate(vec![1, 2, 3], 2, 2).rows, vec![3]);
    }

    #[test]
    fn test_run_lifecycle() {
        let console = console();
        let unreleased = console.save_workflow(&init_workflow(InitWorkflowOptions::default())).unwrap();
        assert!(console.start_run(&unreleased.id, WorkflowTrigger::Manual).is_err());

        let workflow = released(&console);
        let run = console.start_run(&workflow.id, WorkflowTrigger::Manual).unwrap();
        assert_eq!(run.status, WorkflowRunStatus::Pending);
        assert!(console.start_run(&workflow.id, WorkflowTrigger::Manual).is_err());

        let stamped = console.get_workflow(&workflow.id).unwrap();
        assert_eq!(stamped.last_run_id.as_deref(), Some(run.id.as_str()));
        assert_eq!(stamped.last_run_status, Some(WorkflowRunStatus::Pending));

        console.update_run_status(&run.id, WorkflowRunStatus::Running, None).unwrap();
        let failed = console.update_run_status(&run.id, WorkflowRunStatus::Failed, Some("dns timeout")).unwrap();
        assert!(failed.ended_at.is_some());
        assert_eq!(failed.error.as_deref(), Some("dns timeout"));
        assert_eq!(console.get_workflow(&workflow.id).unwrap().last_run_status, Some(WorkflowRunStatus::Failed));

        assert!(console.update_run_status(&run.id, WorkflowRunStatus::Running, None).is_err());
        assert!(console.cancel_run(&run.id).is_err());

        let second = console.start_run(&workflow.id, WorkflowTrigger::Scheduled).unwrap();
        let canceled = console.cancel_run(&second.id).unwrap();
        assert_eq!(canceled.status, WorkflowRunStatus::Canceled);

        let runs = console
            .list_runs(&RunListQuery {
                workflow_id: Some(workflow.id.clone()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(runs.count, 2);

        let canceled_runs = console
            .list_runs(&RunListQuery {
                status: Some(WorkflowRunStatus::Canceled),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(canceled_runs.rows.len(), 1);
        assert_eq!(canceled_runs.rows[0].id, second.id);

        let open_runs = console
            .list_runs(&RunListQuery {
                finished: Some(false),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(open_runs.count, 0);
    }

    #[test]
    fn test_remove_workflow_cascades() {
        let console = console();
        let workflow = released(&console);
        let run = console.start_run(&workflow.id, WorkflowTrigger::Manual).unwrap();
        console
            .append_log(&WorkflowLogModel {
                run_ref: run.id.clone(),
                message: "issuing".to_string(),
                ..Default::default()
            })
            .unwrap();

        console.remove_workflow(&workflow.id).unwrap();
        assert!(console.get_workflow(&workflow.id).is_err());
        assert!(console.get_run(&run.id).is_err());
        assert!(console.list_logs(&run.id).unwrap().is_empty());
        assert!(console.remove_workflow(&workflow.id).is_err());
    }

    #[test]
    fn test_logs_ordered_and_error_string() {
        let console = console();
        let workflow = released(&console);
        let run = console.start_run(&workflow.id, WorkflowTrigger::Manual).unwrap();

        for (timestamp, level, message) in
            [(30, WorkflowLogLevel::Error, "deploy failed"), (10, WorkflowLogLevel::Info, "start"), (20, WorkflowLogLevel::Error, "retry failed")]
        {
            console
                .append_log(&WorkflowLogModel {
                    run_ref: run.id.clone(),
                    timestamp,
                    level: level as i32,
                    message: message.to_string(),
                    ..Default::default()
                })
                .unwrap();
        }

        let logs = console.list_logs(&run.id).unwrap();
        assert_eq!(logs.iter().map(|l| l.timestamp).collect::<Vec<_>>(), vec![10, 20, 30]);
        assert_eq!(logs[0].workflow_ref, workflow.id);
        assert_eq!(WorkflowLogModel::error_string(&logs), "retry failed\ndeploy failed");

        assert!(
            console
                .append_log(&WorkflowLogModel {
                    run_ref: "missing".to_string(),
                    ..Default::default()
                })
                .is_err()
        );
    }

    #[test]
    fn test_watch_run_until_terminal() {
        let console = console();
        let workflow = released(&console);
        let run = console.start_run(&workflow.id, WorkflowTrigger::Manual).unwrap();

        let (tx, rx) = flume::unbounded();
        let watch = console
            .watch_run(&run.id, move |run| {
                let _ = tx.send(run.status);
            })
            .unwrap();

        console.update_run_status(&run.id, WorkflowRunStatus::Running, None).unwrap();
        console.update_run_status(&run.id, WorkflowRunStatus::Succeeded, None).unwrap();

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), WorkflowRunStatus::Pending);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), WorkflowRunStatus::Running);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), WorkflowRunStatus::Succeeded);
        assert!(wait_until(|| watch.is_finished()));
        assert!(console.watch_run("missing", |_| {}).is_err());
    }

    #[test]
    fn test_watch_run_already_ended() {
        let console = console();
        let workflow = released(&console);
        let run = console.start_run(&workflow.id, WorkflowTrigger::Manual).unwrap();
        console.update_run_status(&run.id, WorkflowRunStatus::Succeeded, None).unwrap();

        let (tx, rx) = flume::unbounded();
        let watch = console
            .watch_run(&run.id, move |run| {
                let _ = tx.send(run.status);
            })
            .unwrap();

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), WorkflowRunStatus::Succeeded);
        assert!(wait_until(|| watch.is_finished()));
        assert!(wait_until(|| rx.is_disconnected()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_watch_run_stops_on_drop() {
        let console = console();
        let workflow = released(&console);
        let run = console.start_run(&workflow.id, WorkflowTrigger::Manual).unwrap();

        let (tx, rx) = flume::unbounded();
        let watch = console
            .watch_run(&run.id, move |run| {
                let _ = tx.send(run.status);
            })
            .unwrap();
        drop(watch);

        // the callback owns the only sender; it is gone once the task ends
        let start = Instant::now();
        while !rx.is_disconnected() && start.elapsed() < WAIT {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(rx.is_disconnected());
        // at most the starting snapshot got through
        assert!(rx.drain().count() <= 1);
        console.update_run_status(&run.id, WorkflowRunStatus::Running, None).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_run_watch_set_keeps_one_per_run() {
        let console = console();
        let workflow = released(&console);
        let run = console.start_run(&workflow.id, WorkflowTrigger::Manual).unwrap();
        let watches = RunWatchSet::new();

        let (first_tx, first_rx) = flume::unbounded();
        watches
            .insert(
                console
                    .watch_run(&run.id, move |run| {
                        let _ = first_tx.send(run.status);
                    })
                    .unwrap(),
            )
            .unwrap();
        let (second_tx, second_rx) = flume::unbounded();
        watches
            .insert(
                console
                    .watch_run(&run.id, move |run| {
                        let _ = second_tx.send(run.status);
                    })
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(watches.len(), 1);
        assert!(watches.contains(&run.id));

        assert!(wait_until(|| first_rx.is_disconnected()));
        console.update_run_status(&run.id, WorkflowRunStatus::Succeeded, None).unwrap();
        assert_eq!(second_rx.recv_timeout(WAIT).unwrap(), WorkflowRunStatus::Pending);
        assert_eq!(second_rx.recv_timeout(WAIT).unwrap(), WorkflowRunStatus::Succeeded);
        assert!(wait_until(|| watches.is_empty()));
        assert!(!watches.remove("missing"));
    }

    #[test]
    fn test_accesses_cache_and_soft_delete() {
        let console = console();
        let first = console
            .save_access(&AccessModel {
                name: "aliyun".to_string(),
                provider: "aliyun".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(console.list_accesses().unwrap().len(), 1);

        let second = console
            .save_access(&AccessModel {
                name: "cloudflare".to_string(),
                provider: "cloudflare".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(console.list_accesses().unwrap().len(), 2);

        console.remove_accesses(std::slice::from_ref(&first.id)).unwrap();
        let left = console.list_accesses().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, second.id);

        let stored = console.store.accesses().unwrap().find(&first.id).unwrap();
        assert_eq!(stored.deleted.as_deref().map(str::len), Some(19));
        assert!(console.remove_accesses(&["missing".to_string()]).is_err());

        // a batch with an unknown id marks nothing
        assert!(console.remove_accesses(&[second.id.clone(), "missing".to_string()]).is_err());
        assert_eq!(console.list_accesses().unwrap().len(), 1);
        assert!(console.store.accesses().unwrap().find(&second.id).unwrap().deleted.is_none());
    }

    #[test]
    fn test_certificates_and_statistics() {
        let console = console();
        let healthy = console.save_certificate(&certificate("healthy.example.com", 60)).unwrap();
        console.save_certificate(&certificate("soon.example.com", 5)).unwrap();
        console.save_certificate(&certificate("old.example.com", -3)).unwrap();
        let removed = console.save_certificate(&certificate("gone.example.com", -3)).unwrap();
        console.remove_certificates(&[removed.id.clone()]).unwrap();

        let all = console.list_certificates(&CertificateListQuery::default()).unwrap();
        assert_eq!(all.count, 3);

        let soon = console
            .list_certificates(&CertificateListQuery {
                state: Some(CertificateState::ExpireSoon),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(soon.rows.len(), 1);
        assert_eq!(soon.rows[0].subject_alt_names, "soon.example.com");

        let by_keyword = console
            .list_certificates(&CertificateListQuery {
                keyword: Some("HEALTHY".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_keyword.rows[0].id, healthy.id);

        released(&console);
        let workflow = released(&console);
        console.set_workflow_enabled(&workflow.id, true).unwrap();

        let stats = console.statistics().unwrap();
        assert_eq!(
            stats,
            Statistics {
                certificate_total: 3,
                certificate_expire_soon: 1,
                certificate_expired: 1,
                workflow_total: 2,
                workflow_enabled: 1,
            }
        );
    }

    #[test]
    fn test_settings_upsert_by_name() {
        let console = console();
        let empty = console.get_settings(SettingsName::NotifyTemplates).unwrap();
        assert!(empty.id.is_empty());
        assert_eq!(empty.content, json!({}));

        let first = console
            .save_settings(SettingsName::NotifyTemplates, json!({ "notifyTemplates": [{ "subject": "s", "message": "m" }] }))
            .unwrap();
        let second = console
            .save_settings(SettingsName::NotifyTemplates, json!({ "notifyTemplates": [{ "subject": "s2", "message": "m2" }] }))
            .unwrap();
        assert_eq!(first.id, second.id);

        let stored = console.get_settings(SettingsName::NotifyTemplates).unwrap();
        let content: NotifyTemplatesContent = stored.content_as().unwrap();
        assert_eq!(content.notify_templates[0].subject, "s2");
        assert!(console.get_settings(SettingsName::Persistence).unwrap().id.is_empty());
    }

    #[test]
    fn test_writes_are_published() {
        let console = console();
        let sub = console.subscribe(SubscribeOptions::with_collection(StoreIden::Workflow)).unwrap();
        let saved = console
            .save_workflow(&WorkflowModel {
                name: "w".to_string(),
                ..Default::default()
            })
            .unwrap();
        console.remove_workflow(&saved.id).unwrap();

        let created = sub.recv_timeout(WAIT).unwrap();
        assert_eq!(created.action, RecordAction::Create);
        assert_eq!(created.id, saved.id);
        let deleted = sub.recv_timeout(WAIT).unwrap();
        assert_eq!(deleted.action, RecordAction::Delete);

        console.shutdown();
        assert!(console.subscribe(SubscribeOptions::default()).is_err());
    }
}
