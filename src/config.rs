use std::{fs, path::Path};

use serde::Deserialize;

use crate::{CertflowError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// store config
    pub store: StoreConfig,
    /// realtime channel config
    pub channel: ChannelConfig,
    /// list defaults
    pub list: ListConfig,
    /// certificate validity thresholds
    pub certificate: CertificateConfig,
    /// number of async worker threads, range [1, 32768), defaults to 4
    pub async_worker_thread_number: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// store type
    pub store_type: StoreType,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    #[default]
    Mem,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// capacity of the record event broadcast queue
    pub event_queue_size: usize,
    /// capacity of each subscription's delivery queue
    pub subscription_queue_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    /// page size used when a list query does not set one
    pub default_page_size: usize,
    /// capacity of the accesses list cache
    pub accesses_cache_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CertificateConfig {
    /// certificates with fewer days left are reported as expiring soon
    pub expire_soon_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            channel: ChannelConfig::default(),
            list: ListConfig::default(),
            certificate: CertificateConfig::default(),
            async_worker_thread_number: 4,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            event_queue_size: 2048,
            subscription_queue_size: 256,
        }
    }
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            accesses_cache_size: 16,
        }
    }
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            expire_soon_days: 20,
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())
            .map_err(|e| CertflowError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.async_worker_thread_number == 0 || self.async_worker_thread_number >= 32768 {
            return Err(CertflowError::Config(format!(
                "async_worker_thread_number must be in [1, 32768), got {}",
                self.async_worker_thread_number
            )));
        }
        if self.channel.event_queue_size == 0 || self.channel.subscription_queue_size == 0 {
            return Err(CertflowError::Config("channel queue sizes must be positive".to_string()));
        }
        Ok(())
    }
}
