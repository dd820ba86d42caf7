//! Node hardware and its power draw, resolved from the cluster config either
//! directly, through a partition or through the scheduler node inventory.

use log::{debug, info};

use crate::config::{ClusterConfig, PartitionConfig};
use crate::error::{CarbonError, HardwareKind, Result};
use crate::scheduler::SchedulerClient;

const CPU_TYPE_KEY: &str = "resources_available.cpu_type";
const GPU_TYPE_KEY: &str = "resources_available.gpu_type";

#[derive(Debug, Clone, PartialEq)]
pub struct NodePowerProfile {
    pub name: String,
    pub cpu_type: String,
    /// `None` when the node has no GPU
    pub gpu_type: Option<String>,
    pub mem_type: String,
    pub per_core_power_watts: f64,
    /// Always 0.0 when `gpu_type` is `None`
    pub per_gpu_power_watts: f64,
    pub per_gb_power_watts: f64,
}

impl NodePowerProfile {
    pub fn new(
        name: impl Into<String>,
        cpu_type: impl Into<String>,
        gpu_type: Option<String>,
        mem_type: impl Into<String>,
        per_core_power_watts: f64,
        per_gpu_power_watts: f64,
        per_gb_power_watts: f64,
    ) -> Self {
        let per_gpu_power_watts = if gpu_type.is_some() {
            per_gpu_power_watts
        } else {
            0.0
        };
        Self {
            name: name.into(),
            cpu_type: cpu_type.into(),
            gpu_type,
            mem_type: mem_type.into(),
            per_core_power_watts,
            per_gpu_power_watts,
            per_gb_power_watts,
        }
    }

    /// Looks every hardware type up in the cluster config.
    pub fn from_config(
        name: &str,
        cpu_type: &str,
        gpu_type: Option<&str>,
        mem_type: &str,
        config: &ClusterConfig,
    ) -> Result<Self> {
        let per_core = cpu_power(config, cpu_type)?;
        let per_gpu = match gpu_type {
            Some(gpu_type) => gpu_power(config, gpu_type)?,
            None => 0.0,
        };
        let per_gb = memory_power(config, mem_type)?;

        Ok(Self::new(
            name,
            cpu_type,
            gpu_type.map(str::to_string),
            mem_type,
            per_core,
            per_gpu,
            per_gb,
        ))
    }

    /// Builds the profile of a node belonging to `partition`.
    pub fn from_partition(
        name: &str,
        partition: &PartitionConfig,
        config: &ClusterConfig,
    ) -> Result<Self> {
        let mem_type = &config.scheduler.memory_type;
        Ok(Self::new(
            name,
            partition.cpu_type.as_str(),
            partition.gpu_type.clone(),
            mem_type.as_str(),
            partition.per_core_power_watts,
            partition.per_gpu_power_watts,
            memory_power(config, mem_type)?,
        ))
    }

    /// Queries the scheduler node inventory for the node's CPU and GPU types.
    pub async fn from_scheduler(
        scheduler: &dyn SchedulerClient,
        name: &str,
        config: &ClusterConfig,
    ) -> Result<Self> {
        let output = scheduler.node_detail(name).await?;
        if !output.success() {
            return Err(CarbonError::HardwareQueryFailure(format!(
                "'{}' exited with {:?} for node {name}: {}",
                config.scheduler.node_command,
                output.exit_code,
                output.stderr.trim()
            )));
        }

        let inventory = NodeInventory::parse(&output.stdout);
        let cpu_type = inventory.cpu_type.ok_or_else(|| {
            CarbonError::HardwareQueryFailure(format!("could not determine cpu_type for node {name}"))
        })?;
        debug!(
            "Node {name} reports cpu_type={cpu_type} gpu_type={:?}",
            inventory.gpu_type
        );

        Self::from_config(
            name,
            &cpu_type,
            inventory.gpu_type.as_deref(),
            &config.scheduler.memory_type,
            config,
        )
    }

    /// Picks the resolution strategy for a live job's node.
    pub async fn resolve(
        scheduler: &dyn SchedulerClient,
        name: &str,
        config: &ClusterConfig,
    ) -> Result<Self> {
        if let Some(partition) = config.partition_for(name) {
            info!("Node {name} matched partition {}", partition.name);
            return Self::from_partition(name, partition, config);
        }
        Self::from_scheduler(scheduler, name, config).await
    }
}

/// Hardware attributes advertised by the scheduler for one node.
#[derive(Debug, Default, PartialEq)]
pub struct NodeInventory {
    pub cpu_type: Option<String>,
    pub gpu_type: Option<String>,
}

impl NodeInventory {
    pub fn parse(listing: &str) -> Self {
        let mut inventory = Self::default();
        for line in listing.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            if key.contains(CPU_TYPE_KEY) && !value.is_empty() {
                inventory.cpu_type = Some(value.to_string());
            } else if key.contains(GPU_TYPE_KEY) {
                inventory.gpu_type = match value {
                    "" => None,
                    v if v.eq_ignore_ascii_case("none") => None,
                    v => Some(v.to_string()),
                };
            }
        }
        inventory
    }
}

fn unknown(kind: HardwareKind, name: &str) -> CarbonError {
    CarbonError::UnknownHardwareType {
        kind,
        name: name.to_string(),
    }
}

fn cpu_power(config: &ClusterConfig, cpu_type: &str) -> Result<f64> {
    config
        .cpus
        .get(cpu_type)
        .map(|c| c.per_core_power_watts)
        .ok_or_else(|| unknown(HardwareKind::Cpu, cpu_type))
}

fn gpu_power(config: &ClusterConfig, gpu_type: &str) -> Result<f64> {
    config
        .gpus
        .get(gpu_type)
        .map(|g| g.per_gpu_power_watts)
        .ok_or_else(|| unknown(HardwareKind::Gpu, gpu_type))
}

fn memory_power(config: &ClusterConfig, mem_type: &str) -> Result<f64> {
    config
        .memory
        .get(mem_type)
        .map(|m| m.per_gb_power_watts)
        .ok_or_else(|| unknown(HardwareKind::Memory, mem_type))
}
