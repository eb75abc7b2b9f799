use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::{Config, Console, Result};

#[derive(Default)]
pub struct ConsoleBuilder {
    config: Config,
    rt: Option<Arc<Runtime>>,
}

impl ConsoleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn async_worker_thread_number(
        mut self,
        n: u16,
    ) -> Self {
        self.config.async_worker_thread_number = n;
        self
    }

    /// Runs the console's background tasks on an existing runtime.
    pub fn runtime(
        mut self,
        runtime: Arc<Runtime>,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    pub fn build(&self) -> Result<Console> {
        self.config.validate()?;
        match &self.rt {
            Some(runtime) => Console::with_runtime(self.config.clone(), runtime.clone()),
            None => Console::new_with_config(self.config.clone()),
        }
    }
}
