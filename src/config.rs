//! Indexer configuration loaded from YAML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration. Command-line flags override what is loaded here.

use std::{collections::BTreeMap, fs, path::Path, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    format::{DEFAULT_SAMPLE_ROWS, ProfileOptions},
    io_utils::DEFAULT_SAMPLE_BYTES,
    morphline::MorphlineResources,
    rdbms::QueryServerConfig,
    template::TemplateLookup,
    workspace::{DEFAULT_WORKSPACE_ROOT, JobSettings},
};

pub const DEFAULT_LIBS_PATH: &str = "/tmp/smart_indexer_lib";
pub const DEFAULT_ZK_ENSEMBLE: &str = "localhost:2181/solr";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Directory searched for templates before the bundled copies.
    pub templates_path: Option<PathBuf>,
    /// Library path for the indexing job; grok dictionaries live beneath it.
    pub libs_path: String,
    pub zk_ensemble: String,
    pub sample_bytes: u64,
    pub sample_rows: usize,
    /// Parent of job workspaces; `$USER` expands to the submitting user.
    pub workspace_root: String,
    pub security_enabled: bool,
    pub query_servers: BTreeMap<String, QueryServerConfig>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            templates_path: None,
            libs_path: DEFAULT_LIBS_PATH.to_string(),
            zk_ensemble: DEFAULT_ZK_ENSEMBLE.to_string(),
            sample_bytes: DEFAULT_SAMPLE_BYTES,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            workspace_root: DEFAULT_WORKSPACE_ROOT.to_string(),
            security_enabled: false,
            query_servers: BTreeMap::new(),
        }
    }
}

impl IndexerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Reading configuration {path:?}"))?;
        Self::from_yaml(&raw).with_context(|| format!("Parsing configuration {path:?}"))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when given, else the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if !(1..=DEFAULT_SAMPLE_BYTES).contains(&self.sample_bytes) {
            return Err(anyhow!(
                "sample_bytes must be between 1 and {DEFAULT_SAMPLE_BYTES}, got {}",
                self.sample_bytes
            ));
        }
        if !(1..=DEFAULT_SAMPLE_ROWS).contains(&self.sample_rows) {
            return Err(anyhow!(
                "sample_rows must be between 1 and {DEFAULT_SAMPLE_ROWS}, got {}",
                self.sample_rows
            ));
        }
        Ok(())
    }

    pub fn profile_options(&self) -> ProfileOptions {
        ProfileOptions {
            sample_bytes: self.sample_bytes,
            sample_rows: self.sample_rows,
        }
    }

    pub fn template_lookup(&self) -> TemplateLookup {
        TemplateLookup::new(self.templates_path.iter().cloned())
    }

    pub fn morphline_resources(&self) -> MorphlineResources {
        MorphlineResources {
            libs_path: self.libs_path.clone(),
            zk_host: self.zk_ensemble.clone(),
        }
    }

    pub fn job_settings(&self, dryrun: bool) -> JobSettings {
        JobSettings {
            zk_host: self.zk_ensemble.clone(),
            libs_path: self.libs_path.clone(),
            workspace_root: self.workspace_root.clone(),
            security_enabled: self.security_enabled,
            dryrun,
        }
    }

    pub fn query_server(&self, name: &str) -> Result<&QueryServerConfig> {
        self.query_servers
            .get(name)
            .ok_or_else(|| anyhow!("No query server named '{name}' is configured"))
    }
}
