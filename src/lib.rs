//! # Certflow
//!
//! Certflow is the workflow core of a certificate automation console. It keeps
//! the tree-shaped workflow graphs that describe how certificates are applied
//! for, deployed and announced, and the records around them.
//!
//! ## Core Features
//!
//! - **Workflow Graph Editing**: Insert, remove, duplicate and validate nodes and branches of a workflow tree
//! - **Draft / Release Model**: Edit a draft while the released content stays untouched
//! - **Record Repository**: Workflows, runs, logs, certificates, accesses and settings with paged queries
//! - **Realtime Channel**: Every write is published as a record event; watch runs until they finish
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use certflow::{ConsoleBuilder, InitWorkflowOptions, NodeType, WorkflowEditor, WorkflowTrigger, init_workflow};
//!
//! let console = ConsoleBuilder::new().build()?;
//! console.launch();
//!
//! let mut editor = WorkflowEditor::new(init_workflow(InitWorkflowOptions::default()));
//! let root = editor.draft().unwrap().id.clone();
//! editor.add_node(&root, NodeType::Apply)?;
//! // ... validate every node
//! editor.release()?;
//!
//! let workflow = console.save_editor(&mut editor)?;
//! let run = console.start_run(&workflow.id, WorkflowTrigger::Manual)?;
//! let watch = console.watch_run(&run.id, |run| println!("{}", run.status))?;
//! ```

mod builder;
mod common;
mod config;
mod console;
mod editor;
mod error;
mod events;
mod model;
mod runtime;
mod store;
mod utils;
mod workflow;

use std::sync::{Arc, RwLock};

pub use builder::ConsoleBuilder;
pub use config::{CertificateConfig, ChannelConfig, Config, ListConfig, StoreConfig, StoreType};
pub use console::{CertificateListQuery, Console, RunListQuery, RunWatch, RunWatchSet, Statistics, WorkflowListQuery};
pub use editor::WorkflowEditor;
pub use error::CertflowError;
pub use events::{Event, RecordAction, RecordEvent};
pub use model::*;
pub use runtime::{SubscribeOptions, Subscription};
pub use store::{PageData, StoreIden};
pub use utils::text::{NODE_NAME_MAX_LEN, is_valid_crontab, sanitize_node_name};
pub use workflow::*;

/// Result type alias for Certflow operations.
pub type Result<T> = std::result::Result<T, CertflowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
