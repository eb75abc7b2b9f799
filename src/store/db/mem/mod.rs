mod collect;
mod r#impl;

use std::{collections::HashMap, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;

use crate::{
    Result,
    model::{AccessModel, CertificateModel, SettingsModel, WorkflowLogModel, WorkflowModel, WorkflowRunModel},
    store::{DbCollection, DbStore, Store, StoreIden},
};
pub use collect::Collect;

#[derive(Debug, Clone)]
pub struct MemStore {
    accesses: Arc<Collect<AccessModel>>,
    certificates: Arc<Collect<CertificateModel>>,
    settings: Arc<Collect<SettingsModel>>,
    workflows: Arc<Collect<WorkflowModel>>,
    runs: Arc<Collect<WorkflowRunModel>>,
    logs: Arc<Collect<WorkflowLogModel>>,
}

trait DbDocument: Serialize + DeserializeOwned {
    fn id(&self) -> &str;
    fn doc(&self) -> Result<HashMap<String, JsonValue>>;
}

impl DbStore for MemStore {
    fn init(
        &self,
        s: &Store,
    ) {
        s.register(self.accesses());
        s.register(self.certificates());
        s.register(self.settings());
        s.register(self.workflows());
        s.register(self.runs());
        s.register(self.logs());
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            accesses: Arc::new(Collect::new(StoreIden::Access)),
            certificates: Arc::new(Collect::new(StoreIden::Certificate)),
            settings: Arc::new(Collect::new(StoreIden::Settings)),
            workflows: Arc::new(Collect::new(StoreIden::Workflow)),
            runs: Arc::new(Collect::new(StoreIden::WorkflowRun)),
            logs: Arc::new(Collect::new(StoreIden::WorkflowLogs)),
        }
    }

    pub fn accesses(&self) -> Arc<dyn DbCollection<Item = AccessModel> + Send + Sync> {
        self.accesses.clone()
    }

    pub fn certificates(&self) -> Arc<dyn DbCollection<Item = CertificateModel> + Send + Sync> {
        self.certificates.clone()
    }

    pub fn settings(&self) -> Arc<dyn DbCollection<Item = SettingsModel> + Send + Sync> {
        self.settings.clone()
    }

    pub fn workflows(&self) -> Arc<dyn DbCollection<Item = WorkflowModel> + Send + Sync> {
        self.workflows.clone()
    }

    pub fn runs(&self) -> Arc<dyn DbCollection<Item = WorkflowRunModel> + Send + Sync> {
        self.runs.clone()
    }

    pub fn logs(&self) -> Arc<dyn DbCollection<Item = WorkflowLogModel> + Send + Sync> {
        self.logs.clone()
    }
}
