use std::fmt;
use thiserror::Error;

/// Result type alias for carbon estimation operations
pub type Result<T> = std::result::Result<T, CarbonError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareKind {
    Cpu,
    Gpu,
    Memory,
}

impl fmt::Display for HardwareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareKind::Cpu => write!(f, "CPU"),
            HardwareKind::Gpu => write!(f, "GPU"),
            HardwareKind::Memory => write!(f, "Memory"),
        }
    }
}

/// Errors that can occur while estimating the emissions of a job
#[derive(Debug, Error, PartialEq)]
pub enum CarbonError {
    /// Job identifier is not `digits` or `digits[digits]`
    #[error("Malformed job ID '{0}'")]
    MalformedIdentifier(String),

    #[error("Unsupported job type: {kind} job '{id}'")]
    UnsupportedJobType { id: String, kind: String },

    /// Scheduler reports no job with this identifier
    #[error("Unknown job ID '{0}'")]
    UnknownIdentifier(String),

    #[error("Job '{id}' is in state '{state}', expected running or finished")]
    InvalidJobState { id: String, state: String },

    #[error("Failed to fetch job data: {0}")]
    DataFetchFailure(String),

    #[error("Failed to parse job data: {0}")]
    DataParseFailure(String),

    #[error("Unsupported memory format '{0}', expected a value in gb")]
    UnsupportedMemoryFormat(String),

    /// More than one job entry came back for a single identifier
    #[error("Job query for '{id}' returned {count} entries, expected exactly one")]
    AmbiguousJobRecord { id: String, count: usize },

    #[error("{kind} type '{name}' not found in cluster config")]
    UnknownHardwareType { kind: HardwareKind, name: String },

    #[error("Failed to query node hardware: {0}")]
    HardwareQueryFailure(String),

    #[error("Failed to fetch carbon intensity data: {0}")]
    IntensityFetchFailure(String),
}

impl CarbonError {
    /// Actionable follow-up shown to the user alongside the error message.
    pub fn hint(&self) -> &'static str {
        match self {
            CarbonError::MalformedIdentifier(_) => {
                "Job IDs are numeric, optionally with an array index, e.g. 1234 or 1234[5]."
            }
            CarbonError::UnsupportedJobType { .. } => {
                "Handling of array jobs is not currently implemented. Query a single subjob, e.g. 1234[5]."
            }
            CarbonError::UnknownIdentifier(_) => "Please check the job ID.",
            CarbonError::InvalidJobState { .. } => {
                "Emissions can only be estimated for running or finished jobs."
            }
            CarbonError::DataFetchFailure(_) | CarbonError::HardwareQueryFailure(_) => {
                "Check that the scheduler commands are available and responsive on this host."
            }
            CarbonError::DataParseFailure(_) | CarbonError::AmbiguousJobRecord { .. } => {
                "The scheduler returned unexpected output. Please report this job ID."
            }
            CarbonError::UnsupportedMemoryFormat(_) => {
                "Only memory requests expressed in gb are supported."
            }
            CarbonError::UnknownHardwareType { .. } => {
                "Add the missing hardware type and its power draw to the cluster config."
            }
            CarbonError::IntensityFetchFailure(_) => {
                "The carbon intensity service may be unavailable. Try again later."
            }
        }
    }
}
