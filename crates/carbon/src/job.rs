//! Job resource accounting: validating job identifiers, querying the
//! scheduler and normalising its JSON job record.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

use crate::config::{DummyJob, SchedulerConfig};
use crate::error::{CarbonError, Result};
use crate::scheduler::SchedulerClient;
use crate::utils::time::hours;

/// `stime` format of the job-detail query, e.g. `Thu Aug 21 10:00:00 2025`.
const STIME_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

#[derive(Debug, Clone, PartialEq)]
pub struct JobResourceUsage {
    pub id: String,
    pub start_time: DateTime<Utc>,
    /// Wall-clock runtime in hours
    pub runtime: f64,
    /// CPU time in core-hours
    pub cputime: f64,
    pub ngpus: u32,
    /// Allocated memory in GB
    pub memory: f64,
    pub node: String,
    pub ncpus: Option<u32>,
    pub cpu_percent: Option<f64>,
}

impl JobResourceUsage {
    pub fn from_dummy(id: &str, dummy: &DummyJob) -> Self {
        Self {
            id: id.to_string(),
            start_time: dummy.start_time,
            runtime: dummy.run_time,
            cputime: dummy.cpu_time,
            ngpus: dummy.ngpus,
            memory: dummy.memory_usage,
            node: dummy.node.clone(),
            ncpus: None,
            cpu_percent: None,
        }
    }

    /// Resolves `raw_id` against the scheduler.
    pub async fn from_scheduler(
        scheduler: &dyn SchedulerClient,
        config: &SchedulerConfig,
        raw_id: &str,
    ) -> Result<Self> {
        let id = normalize_job_id(raw_id)?;

        let output = scheduler.job_detail(&id).await?;
        if !output.success() {
            return Err(match output.exit_code {
                Some(code) if config.unknown_job_exit_codes.contains(&code) => {
                    CarbonError::UnknownIdentifier(id)
                }
                Some(code) if config.malformed_job_exit_codes.contains(&code) => {
                    CarbonError::MalformedIdentifier(id)
                }
                Some(code) => CarbonError::DataFetchFailure(format!(
                    "'{}' exited with code {code}: {}",
                    config.job_command,
                    output.stderr.trim()
                )),
                None => CarbonError::DataFetchFailure(format!(
                    "'{}' was terminated by a signal",
                    config.job_command
                )),
            });
        }

        parse_job_detail(&id, &output.stdout)
    }

    pub fn gpu_hours(&self) -> f64 {
        self.ngpus as f64 * self.runtime
    }

    pub fn memory_hours(&self) -> f64 {
        self.memory * self.runtime
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Begun,
    Exiting,
    Finished,
    Held,
    Moved,
    Queued,
    Running,
    Suspended,
    Transit,
    Waiting,
    Expired,
    Other(String),
}

impl JobState {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "B" => JobState::Begun,
            "E" => JobState::Exiting,
            "F" => JobState::Finished,
            "H" => JobState::Held,
            "M" => JobState::Moved,
            "Q" => JobState::Queued,
            "R" => JobState::Running,
            "S" => JobState::Suspended,
            "T" => JobState::Transit,
            "W" => JobState::Waiting,
            "X" => JobState::Expired,
            other => JobState::Other(other.to_string()),
        }
    }

    /// Emissions are only meaningful once a job has consumed resources.
    pub fn is_calculable(&self) -> bool {
        matches!(self, JobState::Running | JobState::Finished)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Begun => "begun",
            JobState::Exiting => "exiting",
            JobState::Finished => "finished",
            JobState::Held => "held",
            JobState::Moved => "moved",
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Suspended => "suspended",
            JobState::Transit => "in transit",
            JobState::Waiting => "waiting",
            JobState::Expired => "expired",
            JobState::Other(code) => return write!(f, "unknown ({code})"),
        };
        write!(f, "{name}")
    }
}

/// Strips any server suffix and checks the identifier shape.
///
/// Accepts `1234` and `1234[5]`. The array wildcard `1234[]` is rejected as
/// an unsupported job type, anything else as malformed.
pub fn normalize_job_id(raw: &str) -> Result<String> {
    let id = raw.trim().split('.').next().unwrap_or_default();

    let array = Regex::new(r"^[0-9]+\[\]$")
        .map_err(|e| CarbonError::MalformedIdentifier(format!("{raw}: {e}")))?;
    if array.is_match(id) {
        return Err(CarbonError::UnsupportedJobType {
            id: id.to_string(),
            kind: "array".to_string(),
        });
    }

    let single = Regex::new(r"^[0-9]+(\[[0-9]+\])?$")
        .map_err(|e| CarbonError::MalformedIdentifier(format!("{raw}: {e}")))?;
    if !single.is_match(id) {
        return Err(CarbonError::MalformedIdentifier(raw.to_string()));
    }

    Ok(id.to_string())
}

/// Parses an allocated-memory value such as `64gb` into GB.
pub fn parse_memory_gb(value: &str) -> Result<f64> {
    let value = value.trim();
    let re = Regex::new(r"^([0-9]+(?:\.[0-9]+)?)gb$")
        .map_err(|e| CarbonError::DataParseFailure(e.to_string()))?;
    let caps = re
        .captures(value)
        .ok_or_else(|| CarbonError::UnsupportedMemoryFormat(value.to_string()))?;
    caps[1]
        .parse::<f64>()
        .map_err(|e| CarbonError::DataParseFailure(format!("invalid memory '{value}': {e}")))
}

/// Parses a scheduler `stime`, interpreted in the scheduler's local time.
pub fn parse_start_time(stime: &str) -> Result<DateTime<Utc>> {
    let normalized = stime.split_whitespace().collect::<Vec<_>>().join(" ");
    let naive = NaiveDateTime::parse_from_str(&normalized, STIME_FORMAT)
        .map_err(|e| CarbonError::DataParseFailure(format!("invalid start time '{stime}': {e}")))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| {
            CarbonError::DataParseFailure(format!("start time '{stime}' does not exist locally"))
        })
}

#[derive(Debug, Deserialize)]
struct JobDetailResponse {
    #[serde(rename = "Jobs", default)]
    jobs: HashMap<String, JobDetail>,
}

#[derive(Debug, Deserialize)]
struct JobDetail {
    job_state: String,
    stime: Option<String>,
    exec_host: Option<String>,
    resources_used: Option<ResourcesUsed>,
    #[serde(rename = "Resource_List")]
    resource_list: Option<ResourceList>,
}

#[derive(Debug, Deserialize)]
struct ResourcesUsed {
    walltime: Option<String>,
    cput: Option<String>,
    cpupercent: Option<f64>,
    ncpus: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ResourceList {
    mem: Option<String>,
    ngpus: Option<u32>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| CarbonError::DataParseFailure(format!("missing field '{field}'")))
}

/// Turns the job-detail JSON for `id` into a usage record.
pub fn parse_job_detail(id: &str, stdout: &str) -> Result<JobResourceUsage> {
    if stdout.trim().is_empty() {
        return Err(CarbonError::DataParseFailure(format!(
            "no job data returned for ID {id}"
        )));
    }

    let response: JobDetailResponse = serde_json::from_str(stdout)
        .map_err(|e| CarbonError::DataParseFailure(e.to_string()))?;

    let mut entries = response.jobs.into_iter();
    let (internal_id, detail) = match (entries.next(), entries.len()) {
        (Some(entry), 0) => entry,
        (None, _) => {
            return Err(CarbonError::DataParseFailure(format!(
                "no job data found for ID {id}"
            )))
        }
        (Some(_), rest) => {
            warn!("Job query for {id} returned {} job entries", rest + 1);
            return Err(CarbonError::AmbiguousJobRecord {
                id: id.to_string(),
                count: rest + 1,
            });
        }
    };
    debug!("Parsing job entry {internal_id}");

    let state = JobState::from_code(&detail.job_state);
    if !state.is_calculable() {
        return Err(CarbonError::InvalidJobState {
            id: id.to_string(),
            state: state.to_string(),
        });
    }
    if state == JobState::Running {
        warn!("Job {id} is still running, the estimate only covers resources used so far");
    }

    let exec_host = required(detail.exec_host, "exec_host")?;
    let node = exec_host
        .split(['+', '/'])
        .next()
        .map(str::trim)
        .filter(|node| !node.is_empty())
        .ok_or_else(|| {
            CarbonError::DataParseFailure(format!("invalid exec_host '{exec_host}'"))
        })?
        .to_string();

    let used = required(detail.resources_used, "resources_used")?;
    let runtime = hours(&required(used.walltime, "resources_used.walltime")?)?;
    let cputime = hours(&required(used.cput, "resources_used.cput")?)?;

    let resource_list = required(detail.resource_list, "Resource_List")?;
    let memory = parse_memory_gb(&required(resource_list.mem, "Resource_List.mem")?)?;

    let start_time = parse_start_time(&required(detail.stime, "stime")?)?;

    Ok(JobResourceUsage {
        id: id.to_string(),
        start_time,
        runtime,
        cputime,
        ngpus: resource_list.ngpus.unwrap_or(0),
        memory,
        node,
        ncpus: used.ncpus,
        cpu_percent: used.cpupercent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::CommandOutput;
    use crate::tests::helper::{job_detail_json, StaticScheduler};

    #[test]
    fn test_job_id_format() {
        assert_eq!(normalize_job_id("123").unwrap(), "123");
        assert_eq!(normalize_job_id("123[4]").unwrap(), "123[4]");
        assert_eq!(normalize_job_id("123.pbs-7").unwrap(), "123");
        assert_eq!(normalize_job_id("123[4].pbs-7").unwrap(), "123[4]");
    }

    #[test]
    fn test_malformed_and_array_ids_are_distinct() {
        assert!(matches!(
            normalize_job_id("abc"),
            Err(CarbonError::MalformedIdentifier(_))
        ));
        assert!(matches!(
            normalize_job_id("12a"),
            Err(CarbonError::MalformedIdentifier(_))
        ));
        assert!(matches!(
            normalize_job_id(""),
            Err(CarbonError::MalformedIdentifier(_))
        ));
        assert!(matches!(
            normalize_job_id("123[]"),
            Err(CarbonError::UnsupportedJobType { .. })
        ));
    }

    #[test]
    fn test_non_ascii_digits_are_malformed() {
        for id in ["١٢٣", "１２３", "123[٤]", "١٢٣[]"] {
            assert_eq!(
                normalize_job_id(id),
                Err(CarbonError::MalformedIdentifier(id.to_string()))
            );
        }
    }

    #[test]
    fn test_memory_format() {
        assert_eq!(parse_memory_gb("64gb").unwrap(), 64.0);
        assert_eq!(parse_memory_gb("7.5gb").unwrap(), 7.5);
        for unsupported in ["64kb", "64", "64mb", "gb", "٦٤gb", "６４gb"] {
            assert_eq!(
                parse_memory_gb(unsupported),
                Err(CarbonError::UnsupportedMemoryFormat(unsupported.to_string()))
            );
        }
    }

    #[test]
    fn test_start_time() {
        let expected = Local
            .with_ymd_and_hms(2025, 8, 1, 9, 5, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_start_time("Fri Aug  1 09:05:00 2025").unwrap(), expected);
        assert_eq!(parse_start_time("Fri Aug 01 09:05:00 2025").unwrap(), expected);
        assert!(parse_start_time("2025-08-01 09:05").is_err());
    }

    #[test]
    fn test_job_state_codes() {
        assert!(JobState::from_code("R").is_calculable());
        assert!(JobState::from_code("F").is_calculable());
        assert!(!JobState::from_code("Q").is_calculable());
        assert!(!JobState::from_code("H").is_calculable());
        assert_eq!(JobState::from_code("Z"), JobState::Other("Z".to_string()));
    }

    #[test]
    fn test_parse_finished_job() {
        let json = job_detail_json("F", "cx3-4-12/0*8+cx3-4-13/0*8", "64gb", Some(2));
        let job = parse_job_detail("1234", &json).unwrap();
        assert_eq!(job.id, "1234");
        assert_eq!(job.node, "cx3-4-12");
        assert_eq!(job.runtime, 2.0);
        assert_eq!(job.cputime, 15.5);
        assert_eq!(job.memory, 64.0);
        assert_eq!(job.ngpus, 2);
        assert_eq!(job.ncpus, Some(8));
        assert_eq!(job.cpu_percent, Some(775.0));
        assert_eq!(job.start_time, parse_start_time("Thu Aug 21 10:00:00 2025").unwrap());
    }

    #[test]
    fn test_missing_ngpus_means_no_gpus() {
        let json = job_detail_json("R", "node01/0", "16gb", None);
        let job = parse_job_detail("1234", &json).unwrap();
        assert_eq!(job.ngpus, 0);
    }

    #[test]
    fn test_queued_job_is_invalid_state() {
        let json = r#"{"Jobs": {"1234.pbs": {"job_state": "Q"}}}"#;
        assert_eq!(
            parse_job_detail("1234", json),
            Err(CarbonError::InvalidJobState {
                id: "1234".to_string(),
                state: "queued".to_string(),
            })
        );
    }

    #[test]
    fn test_unparseable_outputs() {
        for output in ["", "   \n", "not json", r#"{"Jobs": {}}"#, r#"{"timestamp": 1}"#] {
            assert!(matches!(
                parse_job_detail("1234", output),
                Err(CarbonError::DataParseFailure(_))
            ));
        }
    }

    #[test]
    fn test_missing_required_field() {
        let json = r#"{"Jobs": {"1234.pbs": {"job_state": "F", "exec_host": "node01/0"}}}"#;
        let err = parse_job_detail("1234", json).unwrap_err();
        assert_eq!(
            err,
            CarbonError::DataParseFailure("missing field 'resources_used'".to_string())
        );
    }

    #[test]
    fn test_unsupported_memory_in_record() {
        let json = job_detail_json("F", "node01/0", "65536mb", Some(0));
        assert_eq!(
            parse_job_detail("1234", &json),
            Err(CarbonError::UnsupportedMemoryFormat("65536mb".to_string()))
        );
    }

    #[test]
    fn test_multiple_entries_are_ambiguous() {
        let json = r#"{"Jobs": {"1.a": {"job_state": "F"}, "1.b": {"job_state": "F"}}}"#;
        assert_eq!(
            parse_job_detail("1", json),
            Err(CarbonError::AmbiguousJobRecord {
                id: "1".to_string(),
                count: 2,
            })
        );
    }

    #[tokio::test]
    async fn test_exit_codes_are_classified() {
        let config = SchedulerConfig::default();
        let cases = [
            (153, CarbonError::UnknownIdentifier("99".to_string())),
            (2, CarbonError::MalformedIdentifier("99".to_string())),
        ];
        for (code, expected) in cases {
            let scheduler = StaticScheduler::with_job(CommandOutput {
                exit_code: Some(code),
                ..Default::default()
            });
            let result = JobResourceUsage::from_scheduler(&scheduler, &config, "99").await;
            assert_eq!(result, Err(expected));
        }

        let scheduler = StaticScheduler::with_job(CommandOutput {
            exit_code: Some(1),
            stderr: "qstat: cannot connect to server".to_string(),
            ..Default::default()
        });
        let result = JobResourceUsage::from_scheduler(&scheduler, &config, "99").await;
        assert!(matches!(result, Err(CarbonError::DataFetchFailure(_))));
    }

    #[tokio::test]
    async fn test_invalid_id_skips_scheduler() {
        let scheduler = StaticScheduler::with_job(CommandOutput::default());
        let config = SchedulerConfig::default();
        let result = JobResourceUsage::from_scheduler(&scheduler, &config, "123[]").await;
        assert!(matches!(result, Err(CarbonError::UnsupportedJobType { .. })));
        assert_eq!(scheduler.job_queries(), 0);

        let result = JobResourceUsage::from_scheduler(&scheduler, &config, "١٢٣").await;
        assert!(matches!(result, Err(CarbonError::MalformedIdentifier(_))));
        assert_eq!(scheduler.job_queries(), 0);
    }

    #[tokio::test]
    async fn test_from_scheduler_success() {
        let scheduler = StaticScheduler::with_job(CommandOutput {
            exit_code: Some(0),
            stdout: job_detail_json("F", "node07/1*4", "16gb", Some(1)),
            stderr: String::new(),
        });
        let config = SchedulerConfig::default();
        let job = JobResourceUsage::from_scheduler(&scheduler, &config, "42.pbs")
            .await
            .unwrap();
        assert_eq!(job.id, "42");
        assert_eq!(job.node, "node07");
        assert_eq!(scheduler.job_queries(), 1);
    }
}
