use crate::{
    model::{AccessModel, CertificateModel, SettingsModel, WorkflowLogModel, WorkflowModel, WorkflowRunModel},
    store::{DbCollectionIden, StoreIden},
};

impl DbCollectionIden for AccessModel {
    fn iden() -> StoreIden {
        StoreIden::Access
    }
}

impl DbCollectionIden for CertificateModel {
    fn iden() -> StoreIden {
        StoreIden::Certificate
    }
}

impl DbCollectionIden for SettingsModel {
    fn iden() -> StoreIden {
        StoreIden::Settings
    }
}

impl DbCollectionIden for WorkflowModel {
    fn iden() -> StoreIden {
        StoreIden::Workflow
    }
}

impl DbCollectionIden for WorkflowRunModel {
    fn iden() -> StoreIden {
        StoreIden::WorkflowRun
    }
}

impl DbCollectionIden for WorkflowLogModel {
    fn iden() -> StoreIden {
        StoreIden::WorkflowLogs
    }
}
