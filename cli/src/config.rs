use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

const CONFIG_FILE_NAME: &str = "config.toml";
const ENV_CONFIG_PATH: &str = "CADENZA_CONFIG_PATH";
const ENV_WORKER_URL: &str = "CADENZA_WORKER_URL";
const ENV_OUTPUT_DIR: &str = "CADENZA_OUTPUT_DIR";
const ENV_TIMEOUT_SECS: &str = "CADENZA_TIMEOUT_SECS";
const ENV_MAX_ATTEMPTS: &str = "CADENZA_MAX_ATTEMPTS";

#[derive(Debug, Clone)]
pub struct AppConfig {
    worker_url: Option<String>,
    output_dir: PathBuf,
    request_timeout_secs: u64,
    max_attempts: u32,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = Self::default_config_path() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create config directory {}", parent.display())
                })?;
            }
        }

        if let Some(path) = config_file_override()? {
            if path.exists() {
                let partial = read_partial(&path)?;
                config.apply_partial(partial);
            }
        } else {
            let path = Self::default_config_path()?;
            if path.exists() {
                let partial = read_partial(&path)?;
                config.apply_partial(partial);
            }
        }

        config.apply_env()?;
        Ok(config)
    }

    pub fn worker_url(&self) -> Option<&str> {
        self.worker_url.as_deref()
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com", "Cadenza", "Cadenza")
            .ok_or_else(|| anyhow!("unable to determine config directory"))?;
        Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    fn apply_partial(&mut self, partial: PartialConfig) {
        if let Some(url) = partial.worker_url {
            self.worker_url = Some(url);
        }
        if let Some(dir) = partial.output_dir {
            self.output_dir = dir;
        }
        if let Some(secs) = partial.request_timeout_secs {
            self.request_timeout_secs = secs;
        }
        if let Some(attempts) = partial.max_attempts {
            self.max_attempts = attempts;
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = env::var(ENV_WORKER_URL) {
            if value.trim().is_empty() {
                self.worker_url = None;
            } else {
                self.worker_url = Some(value);
            }
        }
        if let Ok(value) = env::var(ENV_OUTPUT_DIR) {
            if !value.trim().is_empty() {
                self.output_dir = PathBuf::from(value);
            }
        }
        if let Ok(value) = env::var(ENV_TIMEOUT_SECS) {
            if !value.trim().is_empty() {
                let parsed = value
                    .parse::<u64>()
                    .context("CADENZA_TIMEOUT_SECS must be a positive integer")?;
                self.request_timeout_secs = parsed;
            }
        }
        if let Ok(value) = env::var(ENV_MAX_ATTEMPTS) {
            if !value.trim().is_empty() {
                let parsed = value
                    .parse::<u32>()
                    .context("CADENZA_MAX_ATTEMPTS must be a positive integer")?;
                self.max_attempts = parsed.max(1);
            }
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            worker_url: None,
            output_dir: default_output_dir(),
            request_timeout_secs: 120,
            max_attempts: 2,
        }
    }
}

fn config_file_override() -> Result<Option<PathBuf>> {
    if let Some(value) = env::var_os(ENV_CONFIG_PATH) {
        if value.is_empty() {
            return Ok(None);
        }
        let path = PathBuf::from(value);
        if path.is_file() {
            return Ok(Some(path));
        }
        if path.ends_with(CONFIG_FILE_NAME) {
            return Ok(Some(path));
        }
        if path.is_dir() {
            return Ok(Some(path.join(CONFIG_FILE_NAME)));
        }
        return Ok(Some(path));
    }
    Ok(None)
}

fn read_partial(path: &Path) -> Result<PartialConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let partial: PartialConfig =
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(partial)
}

fn default_output_dir() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .map(|home| home.join("Music").join("Cadenza"))
        .unwrap_or_else(|| PathBuf::from("./output"))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PartialConfig {
    worker_url: Option<String>,
    output_dir: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
    max_attempts: Option<u32>,
}
