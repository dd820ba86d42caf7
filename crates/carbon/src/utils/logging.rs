use log::LevelFilter;

pub fn parse_level(level: &str) -> anyhow::Result<LevelFilter> {
    match level.to_ascii_lowercase().as_str() {
        "off" => Ok(LevelFilter::Off),
        "error" => Ok(LevelFilter::Error),
        "warn" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        _ => anyhow::bail!("invalid log level: {level}"),
    }
}

/// Picks the effective level: an explicit `--log-level` wins, otherwise
/// verbose runs log at info and quiet runs only surface warnings.
pub fn effective_level(log_level: Option<&str>, verbose: bool) -> anyhow::Result<LevelFilter> {
    match log_level {
        Some(level) => parse_level(level),
        None if verbose => Ok(LevelFilter::Info),
        None => Ok(LevelFilter::Warn),
    }
}

pub fn setup_logging(level: LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("hyper", LevelFilter::Warn)
        .filter_module("hyper_util", LevelFilter::Warn)
        .format_timestamp(None)
        .format_target(false)
        .init();
}
