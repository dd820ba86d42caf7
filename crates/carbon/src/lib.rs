mod cli;
pub mod comparisons;
pub mod config;
mod console;
pub mod energy;
pub mod error;
pub mod estimator;
pub mod intensity;
pub mod job;
pub mod node;
mod report;
pub mod scheduler;
pub mod utils;


pub use cli::Cli;
pub use config::ClusterConfig;
pub use console::Console;
pub use energy::EnergyModel;
pub use error::{CarbonError, Result};
pub use estimator::{EmissionsEstimator, EmissionsResult};
pub use intensity::{CarbonIntensityClient, IntensityProvider};
pub use job::JobResourceUsage;
pub use node::NodePowerProfile;
pub use scheduler::{PbsClient, SchedulerClient};
pub use utils::logging::{effective_level, setup_logging};
