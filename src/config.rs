use anyhow::{Context, Result};
use std::path::PathBuf;

pub(crate) const ENV_DB: &str = "SVCCAT_DB";
pub(crate) const ENV_SUPPLIER_ACCOUNT: &str = "SVCCAT_SUPPLIER_ACCOUNT";
pub(crate) const ENV_LOG: &str = "SVCCAT_LOG";
pub(crate) const ENV_REQUEST_ID: &str = "SVCCAT_REQUEST_ID";

pub(crate) const DEFAULT_SUPPLIER_ACCOUNT: &str = "0";
pub(crate) const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Config {
    pub db_path: PathBuf,
    pub supplier_account: String,
    pub log_filter: String,
    /// Caller-supplied request id, for correlating with an outer system's logs.
    pub request_id: Option<String>,
}

impl Config {
    pub(crate) fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    /// Build from an arbitrary variable source; unset keys fall back to defaults.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = match lookup(ENV_DB) {
            Some(path) => PathBuf::from(shellexpand(&path)),
            None => default_db_path()?,
        };
        Ok(Self {
            db_path,
            supplier_account: lookup(ENV_SUPPLIER_ACCOUNT)
                .unwrap_or_else(|| DEFAULT_SUPPLIER_ACCOUNT.to_string()),
            log_filter: lookup(ENV_LOG).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            request_id: lookup(ENV_REQUEST_ID),
        })
    }
}

fn default_db_path() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "svccat", "svccat")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.join("svccat.db"))
}

pub(crate) fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        format!("{home}/{rest}")
    } else {
        path.to_string()
    }
}
