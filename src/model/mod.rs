mod access;
mod certificate;
mod log;
mod node;
mod run;
mod settings;
mod workflow;

pub use access::AccessModel;
pub use certificate::{CertificateModel, CertificateSource, CertificateState};
pub use log::{WorkflowLogLevel, WorkflowLogModel};
pub use node::{Chain, NodeConfig, NodeId, NodePatch, NodeType, WorkflowNode, WorkflowNodeIO, WorkflowNodeIOValueSelector};
pub use run::{WorkflowRunModel, WorkflowRunStatus};
pub use settings::{NotifyTemplate, NotifyTemplatesContent, PersistenceContent, SettingsModel, SettingsName};
pub use workflow::{WorkflowModel, WorkflowTrigger};
