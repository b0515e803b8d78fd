//! Configuration for the HERA core module

use crate::domain::registry::SmartCodePolicy;
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Scalar settings that may be overridden from the environment
const ENV_KEYS: &[&str] = &[
    "batch_chunk_size",
    "default_page_limit",
    "max_page_limit",
    "strict_workflow_validation",
];

/// HERA core configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Maximum number of ids per underlying lookup in batch reads
    #[serde(default = "default_batch_chunk_size")]
    pub batch_chunk_size: usize,

    /// Page size used when a request asks for limit 0
    #[serde(default = "default_page_limit")]
    pub default_page_limit: u64,

    /// Upper bound for any requested page size
    #[serde(default = "default_max_page_limit")]
    pub max_page_limit: u64,

    /// Reject loaded workflow templates with zero or several initial stages
    /// or with transitions to undefined statuses
    #[serde(default = "default_true")]
    pub strict_workflow_validation: bool,

    /// Smart code policies keyed by prefix
    #[serde(default)]
    pub policies: HashMap<String, SmartCodePolicy>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_chunk_size: default_batch_chunk_size(),
            default_page_limit: default_page_limit(),
            max_page_limit: default_max_page_limit(),
            strict_workflow_validation: true,
            policies: HashMap::new(),
        }
    }
}

impl Config {
    /// Load from a YAML file overlaid with `HERA_`-prefixed environment variables.
    ///
    /// Only the known scalar settings are read from the environment; other
    /// `HERA_*` variables belong to the host process.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config = Figment::new()
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("HERA_").only(ENV_KEYS))
            .extract()?;
        Ok(config)
    }

    /// Clamp a requested page size to the configured bounds
    pub fn page_limit(&self, requested: u64) -> u64 {
        match requested {
            0 => self.default_page_limit,
            n => n.min(self.max_page_limit),
        }
    }
}

fn default_batch_chunk_size() -> usize {
    100
}

fn default_page_limit() -> u64 {
    50
}

fn default_max_page_limit() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}
