//! Cluster configuration: hardware power draw, data-center PUE and the
//! settings for the scheduler and carbon intensity collaborators.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV_VAR: &str = "CARBON_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "Missing CARBON_CONFIG path. Set the CARBON_CONFIG environment variable \
         or use --config_path to point at the cluster config file"
    )]
    MissingPath,

    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    FileRead(std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    ParseYaml(serde_yaml::Error),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CpuConfig {
    pub per_core_power_watts: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GpuConfig {
    pub per_gpu_power_watts: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemoryConfig {
    pub per_gb_power_watts: f64,
}

/// A group of nodes sharing hardware, matched by node-label prefix.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PartitionConfig {
    pub name: String,
    pub cpu_type: String,
    pub per_core_power_watts: f64,
    #[serde(default)]
    pub gpu_type: Option<String>,
    #[serde(default)]
    pub per_gpu_power_watts: f64,
    pub node_prefixes: Vec<String>,
}

impl PartitionConfig {
    pub fn matches(&self, node: &str) -> bool {
        self.node_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && node.starts_with(prefix.as_str()))
    }
}

/// Fixed job used in place of a scheduler query, for testing and offline runs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DummyJob {
    pub start_time: DateTime<Utc>,
    /// CPU time in core-hours
    pub cpu_time: f64,
    /// Allocated memory in GB
    pub memory_usage: f64,
    /// Wall-clock runtime in hours
    pub run_time: f64,
    pub ngpus: u32,
    pub node: String,
    pub cpu_type: String,
    #[serde(default)]
    pub gpu_type: Option<String>,
    #[serde(default = "default_memory_type")]
    pub mem_type: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub job_command: String,
    pub node_command: String,
    pub timeout_secs: u64,
    /// Exit codes the job query uses to signal an unknown job ID
    pub unknown_job_exit_codes: Vec<i32>,
    /// Exit codes the job query uses to signal an illegally formed job ID
    pub malformed_job_exit_codes: Vec<i32>,
    /// Memory category assumed for nodes, the inventory has no memory typing
    pub memory_type: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            job_command: "qstat".to_string(),
            node_command: "qmgr".to_string(),
            timeout_secs: 10,
            unknown_job_exit_codes: vec![153],
            malformed_job_exit_codes: vec![2],
            memory_type: default_memory_type(),
        }
    }
}

impl SchedulerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IntensityConfig {
    pub base_url: String,
    /// Regional grid identifier. `None` queries the national figures.
    pub region_id: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for IntensityConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.carbonintensity.org.uk".to_string(),
            // London
            region_id: Some(13),
            timeout_secs: 30,
        }
    }
}

impl IntensityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ComparisonsConfig {
    pub travel_path: Option<PathBuf>,
    pub food_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClusterConfig {
    pub cluster_name: String,
    /// Power usage effectiveness of the hosting data center
    pub pue: f64,
    #[serde(default)]
    pub cpus: HashMap<String, CpuConfig>,
    #[serde(default)]
    pub gpus: HashMap<String, GpuConfig>,
    #[serde(default)]
    pub memory: HashMap<String, MemoryConfig>,
    #[serde(default)]
    pub partitions: Vec<PartitionConfig>,
    #[serde(default)]
    pub dummy_job: Option<DummyJob>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub intensity: IntensityConfig,
    #[serde(default)]
    pub comparisons: ComparisonsConfig,
}

fn default_memory_type() -> String {
    "common".to_string()
}

impl ClusterConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(ConfigError::FileRead)?;
        let config = Self::from_yaml(&content)?;
        log::debug!("Loaded cluster config '{}' from {}", config.cluster_name, path.display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: ClusterConfig = serde_yaml::from_str(content).map_err(ConfigError::ParseYaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pue.is_nan() || self.pue <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "pue must be positive, got {}",
                self.pue
            )));
        }

        let watts = self
            .cpus
            .iter()
            .map(|(name, c)| (name, c.per_core_power_watts))
            .chain(self.gpus.iter().map(|(name, g)| (name, g.per_gpu_power_watts)))
            .chain(self.memory.iter().map(|(name, m)| (name, m.per_gb_power_watts)))
            .chain(
                self.partitions
                    .iter()
                    .flat_map(|p| [(&p.name, p.per_core_power_watts), (&p.name, p.per_gpu_power_watts)]),
            );
        for (name, value) in watts {
            non_negative(&format!("power draw of '{name}'"), value)?;
        }

        if let Some(dummy) = &self.dummy_job {
            non_negative("dummy_job.cpu_time", dummy.cpu_time)?;
            non_negative("dummy_job.memory_usage", dummy.memory_usage)?;
            non_negative("dummy_job.run_time", dummy.run_time)?;
        }

        if self.scheduler.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "scheduler.timeout_secs must be positive".to_string(),
            ));
        }
        if self.intensity.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "intensity.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The partition owning `node`, if any partition prefix matches.
    pub fn partition_for(&self, node: &str) -> Option<&PartitionConfig> {
        self.partitions.iter().find(|p| p.matches(node))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(format!(
            "{field} must be non-negative, got {value}"
        )))
    }
}
