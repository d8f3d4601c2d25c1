use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs go to stderr so command output stays clean.
pub(crate) fn init(filter: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(filter)
        .or_else(|_| EnvFilter::try_new(crate::config::DEFAULT_LOG_FILTER))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;
    Ok(())
}
