use async_trait::async_trait;
use log::debug;
use tokio::process::Command;

use crate::config::SchedulerConfig;
use crate::error::{CarbonError, Result};

/// Raw result of a scheduler command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// The only I/O seam towards the batch scheduler.
///
/// Implementations return `Err` only when the command could not be run to
/// completion (spawn failure, timeout). A command that ran and exited
/// non-zero is an `Ok` output for the caller to classify.
#[async_trait]
pub trait SchedulerClient: Send + Sync {
    /// Full job detail as JSON (`qstat -xfF json <id>`).
    async fn job_detail(&self, job_id: &str) -> Result<CommandOutput>;

    /// Node inventory listing (`qmgr -c "list node <label>"`).
    async fn node_detail(&self, node: &str) -> Result<CommandOutput>;
}

pub struct PbsClient {
    config: SchedulerConfig,
}

impl PbsClient {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    async fn run(&self, program: &str, args: &[String]) -> std::result::Result<CommandOutput, String> {
        debug!("Running scheduler command: {program} {}", args.join(" "));
        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.config.timeout(), child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(format!("failed to execute '{program}': {e}")),
            Err(_) => {
                return Err(format!(
                    "'{program}' timed out after {}s",
                    self.config.timeout_secs
                ))
            }
        };

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl SchedulerClient for PbsClient {
    async fn job_detail(&self, job_id: &str) -> Result<CommandOutput> {
        let args = ["-xfF", "json", job_id].map(String::from);
        self.run(&self.config.job_command, &args)
            .await
            .map_err(CarbonError::DataFetchFailure)
    }

    async fn node_detail(&self, node: &str) -> Result<CommandOutput> {
        let args = ["-c".to_string(), format!("list node {node}")];
        self.run(&self.config.node_command, &args)
            .await
            .map_err(CarbonError::HardwareQueryFailure)
    }
}
