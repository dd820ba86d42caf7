use clap::Parser;
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;

use crate::comparisons::{ComparisonKind, ComparisonTable};
use crate::config::{ClusterConfig, ConfigError, CONFIG_ENV_VAR};
use crate::console::Console;
use crate::estimator::EmissionsEstimator;
use crate::intensity::CarbonIntensityClient;
use crate::report;
use crate::scheduler::PbsClient;

/// Estimate and display the carbon emissions of a compute job.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The job identifier to analyze
    pub job_id: String,

    /// Enables verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Compare the carbon emissions of the compute job with other activities
    #[arg(long)]
    pub compare: bool,

    /// Path to the cluster configuration file
    #[arg(long = "config_path", env = CONFIG_ENV_VAR)]
    pub config_path: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long)]
    pub log_level: Option<String>,
}

impl Cli {
    pub fn config(&self) -> Result<ClusterConfig, ConfigError> {
        let path = self.config_path.as_deref().ok_or(ConfigError::MissingPath)?;
        ClusterConfig::load(path)
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let config = Arc::new(self.config()?);

        let scheduler = Arc::new(PbsClient::new(config.scheduler.clone()));
        let intensity = Arc::new(CarbonIntensityClient::new(config.intensity.clone())?);
        let estimator = EmissionsEstimator::new(config.clone(), scheduler, intensity);

        let result = estimator.estimate(&self.job_id).await?;
        debug!("Estimate for {}: {result:?}", self.job_id);

        if self.verbose {
            report::print_details(&config, &result);
        }
        report::print_summary(&result);

        if self.compare {
            let sources = [
                (ComparisonKind::Travel, config.comparisons.travel_path.as_deref()),
                (ComparisonKind::Food, config.comparisons.food_path.as_deref()),
            ];
            for (kind, path) in sources {
                match ComparisonTable::load(kind, path) {
                    Ok(table) => report::print_comparisons(&table, result.emissions),
                    Err(e) => Console::error(&format!("{e:#}")),
                }
            }
        }

        Ok(())
    }
}
