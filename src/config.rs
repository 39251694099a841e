// Scan configuration
//
// Loaded once at startup from TOML (or built from defaults) and shared
// read-only with every component. The closed key set mirrors what the CLI
// accepts; unknown keys are rejected so typos fail loudly.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::{
    DEFAULT_MAX_FILE_SIZE, ENV_MULTIPLIER_MOCK, ENV_MULTIPLIER_PRODUCTION, ENV_MULTIPLIER_TEST,
    QUEUE_CAPACITY_PER_WORKER, RISK_THRESHOLD_CRITICAL, RISK_THRESHOLD_HIGH,
    RISK_THRESHOLD_MEDIUM,
};

/// Per-rule tuning from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleOverride {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub base_confidence: Option<f64>,
}

fn default_true() -> bool {
    true
}

/// Risk bucket lower bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            critical: RISK_THRESHOLD_CRITICAL,
            high: RISK_THRESHOLD_HIGH,
            medium: RISK_THRESHOLD_MEDIUM,
            low: 0.0,
        }
    }
}

/// Likelihood multipliers per environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvMultipliers {
    pub production: f64,
    pub test: f64,
    pub mock: f64,
}

impl Default for EnvMultipliers {
    fn default() -> Self {
        Self {
            production: ENV_MULTIPLIER_PRODUCTION,
            test: ENV_MULTIPLIER_TEST,
            mock: ENV_MULTIPLIER_MOCK,
        }
    }
}

/// Everything the scan core accepts from the outside.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Worker count; 0 means available hardware parallelism.
    pub workers: usize,

    /// Job queue capacity; 0 means 10 per worker.
    pub queue_size: usize,

    pub max_file_size_bytes: usize,

    /// Empty means every discovered file.
    pub include_globs: Vec<String>,

    pub exclude_globs: Vec<String>,

    pub rules_overrides: HashMap<String, RuleOverride>,

    /// Overrides the built-in known-bank BSB prefix set when non-empty.
    pub bank_bsb_prefixes: BTreeSet<String>,

    pub risk_thresholds: RiskThresholds,

    pub env_multipliers: EnvMultipliers,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_size: 0,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE,
            include_globs: Vec::new(),
            exclude_globs: vec![
                ".git/**".to_string(),
                "node_modules/**".to_string(),
                "target/**".to_string(),
                "vendor/**".to_string(),
                "*.min.js".to_string(),
            ],
            rules_overrides: HashMap::new(),
            bank_bsb_prefixes: BTreeSet::new(),
            risk_thresholds: RiskThresholds::default(),
            env_multipliers: EnvMultipliers::default(),
        }
    }
}

impl ScanConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: ScanConfig =
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        info!(path = %path.display(), "loaded scan configuration");
        Ok(config)
    }

    /// Load from `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            Some(p) => anyhow::bail!("config file not found: {}", p.display()),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("serializing config")?;
        std::fs::write(path, raw).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Default location under the user's config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("pi-scanner").join("config.toml"))
    }

    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            num_cpus::get().max(1)
        }
    }

    pub fn effective_queue_size(&self) -> usize {
        if self.queue_size > 0 {
            self.queue_size
        } else {
            QUEUE_CAPACITY_PER_WORKER * self.effective_workers()
        }
    }
}
