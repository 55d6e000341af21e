//! Configuration resolution for the dispatcher.
//!
//! Resolution order (lowest to highest):
//! 1. Built-in defaults (the static submission policy)
//! 2. Global settings file (~/.config/tractrun/settings.json)
//! 3. Environment variables
//! 4. CLI arguments (applied by the binary, highest priority)
//!
//! The resolved [`Config`] is built once at startup and handed to the
//! dispatch loop; nothing here is re-read after that.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the per-subject runner script, installed next to the
/// dispatcher binary.
pub const RUNNER_SCRIPT_NAME: &str = "tractrun-subject.sh";

/// Complete dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory holding per-subject data; job logs go to
    /// `<subjects_dir>/_logs`.
    pub subjects_dir: PathBuf,
    #[serde(default)]
    pub slurm: SlurmConfig,
}

impl Default for Config {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            subjects_dir: cwd.join("fs"),
            slurm: SlurmConfig::default(),
        }
    }
}

/// Submission policy passed to sbatch. One fixed policy per dispatcher
/// invocation; there are no per-subject overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlurmConfig {
    pub partition: String,
    pub nodes: u32,
    pub ntasks: u32,
    /// Memory limit in sbatch syntax, e.g. "60G".
    pub mem: String,
    /// Request whole nodes.
    pub exclusive: bool,
    /// Nodes to keep jobs off, e.g. flaky or reserved hosts.
    pub exclude: Vec<String>,
}

impl Default for SlurmConfig {
    fn default() -> Self {
        Self {
            partition: "defq".to_string(),
            nodes: 1,
            ntasks: 16,
            mem: "60G".to_string(),
            exclusive: true,
            exclude: vec!["node17".to_string(), "node18".to_string()],
        }
    }
}

impl Config {
    /// Directory the scheduler writes per-subject stdout/stderr files to.
    pub fn logs_dir(&self) -> PathBuf {
        self.subjects_dir.join("_logs")
    }
}

/// Partial overlay read from a settings file. Absent fields keep the
/// value from the layer below.
#[derive(Debug, Default, Deserialize)]
struct Settings {
    subjects_dir: Option<PathBuf>,
    slurm: Option<SlurmConfig>,
}

/// Load configuration with hierarchical resolution.
pub fn load_config() -> Result<Config> {
    let mut config = Config::default();

    if let Some(path) = global_settings_path() {
        if path.exists() {
            tracing::debug!("loading settings from {}", path.display());
            let settings = load_settings_file(&path)?;
            merge_settings(&mut config, settings);
        }
    }

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Path of the global settings file, if a config directory exists for
/// this platform.
pub fn global_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tractrun").join("settings.json"))
}

/// Resolve the per-subject runner script next to the dispatcher
/// executable, independent of the caller's working directory.
pub fn runner_script() -> Result<PathBuf> {
    let exe = std::env::current_exe()
        .map_err(|e| Error::Config(format!("cannot locate dispatcher executable: {e}")))?;
    let dir = exe
        .parent()
        .ok_or_else(|| Error::Config("dispatcher executable has no parent directory".into()))?;
    Ok(dir.join(RUNNER_SCRIPT_NAME))
}

fn load_settings_file(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read settings file {}: {}",
            path.display(),
            e
        ))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse settings file {}: {}",
            path.display(),
            e
        ))
    })
}

fn merge_settings(base: &mut Config, overlay: Settings) {
    if let Some(dir) = overlay.subjects_dir {
        base.subjects_dir = dir;
    }
    if let Some(slurm) = overlay.slurm {
        base.slurm = slurm;
    }
}

fn apply_env_overrides(config: &mut Config) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

/// Apply environment-style overrides from an injectable lookup, so the
/// override rules are testable without mutating the process environment.
fn apply_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("SUBJECTS_DIR") {
        if !val.is_empty() {
            config.subjects_dir = PathBuf::from(val);
        }
    }
    if let Some(val) = lookup("TRACTRUN_PARTITION") {
        config.slurm.partition = val;
    }
    if let Some(val) = lookup("TRACTRUN_NTASKS") {
        // Unparsable counts keep the configured value.
        if let Ok(n) = val.parse() {
            config.slurm.ntasks = n;
        }
    }
    if let Some(val) = lookup("TRACTRUN_MEM") {
        config.slurm.mem = val;
    }
    if let Some(val) = lookup("TRACTRUN_EXCLUDE") {
        config.slurm.exclude = val
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
}
