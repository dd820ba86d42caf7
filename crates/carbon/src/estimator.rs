use log::info;
use std::sync::Arc;

use crate::config::ClusterConfig;
use crate::energy::EnergyModel;
use crate::error::Result;
use crate::intensity::IntensityProvider;
use crate::job::JobResourceUsage;
use crate::node::NodePowerProfile;
use crate::scheduler::SchedulerClient;

#[derive(Debug, Clone, PartialEq)]
pub struct EmissionsResult {
    pub node: NodePowerProfile,
    /// Energy consumed in kWh
    pub energy_consumed: f64,
    pub job: JobResourceUsage,
    /// Grid carbon intensity at job start in gCO2e/kWh
    pub carbon_intensity: f64,
    /// Estimated emissions in gCO2e
    pub emissions: f64,
}

pub struct EmissionsEstimator {
    config: Arc<ClusterConfig>,
    scheduler: Arc<dyn SchedulerClient>,
    intensity: Arc<dyn IntensityProvider>,
}

impl EmissionsEstimator {
    pub fn new(
        config: Arc<ClusterConfig>,
        scheduler: Arc<dyn SchedulerClient>,
        intensity: Arc<dyn IntensityProvider>,
    ) -> Self {
        Self {
            config,
            scheduler,
            intensity,
        }
    }

    /// Resolves the job and its node, either from the dummy job or the scheduler.
    async fn resolve(&self, job_id: &str) -> Result<(JobResourceUsage, NodePowerProfile)> {
        if let Some(dummy) = &self.config.dummy_job {
            info!("Using dummy job from cluster config for {job_id}");
            let job = JobResourceUsage::from_dummy(job_id, dummy);
            let node = NodePowerProfile::from_config(
                &dummy.node,
                &dummy.cpu_type,
                dummy.gpu_type.as_deref(),
                &dummy.mem_type,
                &self.config,
            )?;
            return Ok((job, node));
        }

        let job = JobResourceUsage::from_scheduler(
            self.scheduler.as_ref(),
            &self.config.scheduler,
            job_id,
        )
        .await?;
        let node = NodePowerProfile::resolve(self.scheduler.as_ref(), &job.node, &self.config).await?;
        Ok((job, node))
    }

    pub async fn estimate(&self, job_id: &str) -> Result<EmissionsResult> {
        let (job, node) = self.resolve(job_id).await?;

        let energy_consumed = EnergyModel::for_node(&node, self.config.pue).calculate_for(&job);
        let carbon_intensity = self.intensity.intensity_at(job.start_time).await?;
        let emissions = energy_consumed * carbon_intensity;
        info!(
            "Job {}: {energy_consumed:.4} kWh at {carbon_intensity} gCO2e/kWh",
            job.id
        );

        Ok(EmissionsResult {
            node,
            energy_consumed,
            job,
            carbon_intensity,
            emissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CarbonError, HardwareKind};
    use crate::scheduler::CommandOutput;
    use crate::tests::helper::{job_detail_json, node_listing, ok_output, FixedIntensity, StaticScheduler};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};

    const CONFIG: &str = r#"
cluster_name: test
pue: 1.5
cpus:
  icelake: {per_core_power_watts: 10.0}
gpus:
  A100: {per_gpu_power_watts: 200.0}
memory:
  common: {per_gb_power_watts: 2.0}
"#;

    const DUMMY: &str = r#"
dummy_job:
  start_time: 2025-08-21T10:00:00Z
  cpu_time: 2.0
  memory_usage: 16.0
  run_time: 2.0
  ngpus: 1
  node: node01
  cpu_type: icelake
  gpu_type: A100
  mem_type: common
"#;

    struct FailingIntensity;

    #[async_trait]
    impl IntensityProvider for FailingIntensity {
        async fn intensity_at(&self, _time: DateTime<Utc>) -> Result<f64> {
            Err(CarbonError::IntensityFetchFailure("503 Service Unavailable".to_string()))
        }
    }

    fn estimator(
        yaml: &str,
        scheduler: Arc<StaticScheduler>,
        intensity: Arc<dyn IntensityProvider>,
    ) -> EmissionsEstimator {
        let config = ClusterConfig::from_yaml(yaml).unwrap();
        EmissionsEstimator::new(Arc::new(config), scheduler, intensity)
    }

    #[tokio::test]
    async fn test_dummy_job_end_to_end() {
        let scheduler = Arc::new(StaticScheduler::default());
        let estimator = estimator(
            &format!("{CONFIG}{DUMMY}"),
            scheduler.clone(),
            Arc::new(FixedIntensity(120.0)),
        );

        let result = estimator.estimate("12345").await.unwrap();
        assert!((result.energy_consumed - 0.153).abs() < 1e-9);
        assert!((result.emissions - 18.36).abs() < 1e-9);
        assert_eq!(result.carbon_intensity, 120.0);
        assert_eq!(result.job.id, "12345");
        assert_eq!(
            result.job.start_time,
            Utc.with_ymd_and_hms(2025, 8, 21, 10, 0, 0).unwrap()
        );
        assert_eq!(result.node.per_gpu_power_watts, 200.0);
        assert_eq!(scheduler.job_queries(), 0);
        assert_eq!(scheduler.node_queries(), 0);
    }

    #[tokio::test]
    async fn test_scheduler_job_end_to_end() {
        let scheduler = Arc::new(
            StaticScheduler::with_job(ok_output(&job_detail_json(
                "F",
                "cx3-1-1/0*8",
                "16gb",
                Some(1),
            )))
            .with_node(ok_output(&node_listing("cx3-1-1", "icelake", Some("A100")))),
        );
        let estimator = estimator(CONFIG, scheduler.clone(), Arc::new(FixedIntensity(100.0)));

        let result = estimator.estimate("1234.pbs-7").await.unwrap();
        // cput 15.5h, 1 GPU and 16GB for 2h
        let expected = (10.0 * 15.5 + 200.0 * 2.0 + 2.0 * 16.0 * 2.0) * 1.5 / 1000.0;
        assert!((result.energy_consumed - expected).abs() < 1e-9);
        assert!((result.emissions - expected * 100.0).abs() < 1e-9);
        assert_eq!(result.node.name, "cx3-1-1");
        assert_eq!(scheduler.job_queries(), 1);
        assert_eq!(scheduler.node_queries(), 1);
    }

    #[tokio::test]
    async fn test_job_errors_propagate_unchanged() {
        let scheduler = Arc::new(StaticScheduler::with_job(CommandOutput {
            exit_code: Some(153),
            stderr: "qstat: Unknown Job Id 99.pbs-7".to_string(),
            ..Default::default()
        }));
        let estimator = estimator(CONFIG, scheduler, Arc::new(FixedIntensity(100.0)));
        assert_eq!(
            estimator.estimate("99").await,
            Err(CarbonError::UnknownIdentifier("99".to_string()))
        );
    }

    #[tokio::test]
    async fn test_node_errors_propagate_unchanged() {
        let scheduler = Arc::new(
            StaticScheduler::with_job(ok_output(&job_detail_json("F", "cx3-1-1/0", "16gb", None)))
                .with_node(ok_output(&node_listing("cx3-1-1", "sapphirerapids", None))),
        );
        let estimator = estimator(CONFIG, scheduler, Arc::new(FixedIntensity(100.0)));
        assert_eq!(
            estimator.estimate("1234").await,
            Err(CarbonError::UnknownHardwareType {
                kind: HardwareKind::Cpu,
                name: "sapphirerapids".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_intensity_errors_propagate_unchanged() {
        let scheduler = Arc::new(StaticScheduler::default());
        let estimator = estimator(&format!("{CONFIG}{DUMMY}"), scheduler, Arc::new(FailingIntensity));
        assert!(matches!(
            estimator.estimate("1").await,
            Err(CarbonError::IntensityFetchFailure(_))
        ));
    }
}
