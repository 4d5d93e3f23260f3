use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const APP_NAME: &str = "ppt";
pub const MANIFEST_FILE_NAME: &str = "ppt.json";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 600;

/// Runtime settings: defaults overridden by `PPT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub manifest_path: PathBuf,
    pub install_dir: PathBuf,
    pub http_timeout: Duration,
    pub github_token: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let manifest_path = match env_var("PPT_MANIFEST_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_manifest_path()?,
        };

        let install_dir = match env_var("PPT_INSTALL_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_install_dir()?,
        };

        let http_timeout = parse_http_timeout(env_var("PPT_HTTP_TIMEOUT_SECS").as_deref())?;

        let settings = Settings {
            manifest_path,
            install_dir,
            http_timeout,
            github_token: env_var("GITHUB_TOKEN"),
        };
        tracing::debug!("Manifest path: {}", settings.manifest_path.display());
        tracing::debug!("Install directory: {}", settings.install_dir.display());
        Ok(settings)
    }
}

fn parse_http_timeout(value: Option<&str>) -> Result<Duration> {
    match value {
        Some(secs) => {
            let secs = secs
                .trim()
                .parse::<u64>()
                .map_err(|_| anyhow!("PPT_HTTP_TIMEOUT_SECS must be a number of seconds, got '{}'", secs))?;
            Ok(Duration::from_secs(secs))
        }
        None => Ok(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn default_manifest_path() -> Result<PathBuf> {
    let path = dirs::data_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?
        .join(APP_NAME)
        .join(MANIFEST_FILE_NAME);
    Ok(path)
}

pub fn default_install_dir() -> Result<PathBuf> {
    let path = dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not determine home directory"))?
        .join(".local")
        .join("bin");
    Ok(path)
}
