use crate::job::JobResourceUsage;
use crate::node::NodePowerProfile;

/// Power draw of a node's components plus the data-center overhead.
///
/// CPU draw scales with the core-hours actually consumed, GPU and memory
/// draw scale with wall-clock runtime since allocated devices draw power for
/// the whole job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyModel {
    pub cpu_power: f64,
    pub gpu_power: f64,
    pub mem_power: f64,
    pub pue: f64,
}

impl EnergyModel {
    pub fn new(cpu_power: f64, gpu_power: f64, mem_power: f64, pue: f64) -> Self {
        Self {
            cpu_power,
            gpu_power,
            mem_power,
            pue,
        }
    }

    pub fn for_node(node: &NodePowerProfile, pue: f64) -> Self {
        Self::new(
            node.per_core_power_watts,
            node.per_gpu_power_watts,
            node.per_gb_power_watts,
            pue,
        )
    }

    /// Energy consumed in kWh.
    pub fn calculate(&self, cpuhours: f64, runtime: f64, mem: f64, ngpus: u32) -> f64 {
        let cpu = self.cpu_power * cpuhours;
        let gpu = if ngpus == 0 {
            0.0
        } else {
            self.gpu_power * ngpus as f64 * runtime
        };
        let memory = self.mem_power * mem * runtime;
        (cpu + gpu + memory) * self.pue / 1000.0
    }

    pub fn calculate_for(&self, job: &JobResourceUsage) -> f64 {
        self.calculate(job.cputime, job.runtime, job.memory, job.ngpus)
    }
}
