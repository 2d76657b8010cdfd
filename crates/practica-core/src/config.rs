//! Engine configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::planner::ShortfallPolicy;
use crate::sampler::ExclusionPolicy;

/// Top-level practica configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticaConfig {
    /// SQLite database file.
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// Minutes of inactivity after which an in-progress session reads as abandoned.
    #[serde(default = "default_staleness_minutes")]
    pub staleness_minutes: i64,
    /// Default handling of pools too small for the requested count.
    #[serde(default)]
    pub shortfall_policy: ShortfallPolicy,
    /// History bias applied by the sampler.
    #[serde(default)]
    pub sampling: ExclusionPolicy,
}

fn default_database() -> PathBuf {
    PathBuf::from("./practica.db")
}
fn default_staleness_minutes() -> i64 {
    60 * 24 * 7
}

impl Default for PracticaConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            staleness_minutes: default_staleness_minutes(),
            shortfall_policy: ShortfallPolicy::default(),
            sampling: ExclusionPolicy::default(),
        }
    }
}

impl PracticaConfig {
    pub fn staleness(&self) -> Duration {
        Duration::minutes(self.staleness_minutes)
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order without a path:
/// 1. `practica.toml` in the current directory
/// 2. `~/.config/practica/config.toml`
///
/// Environment variable overrides: `PRACTICA_DATABASE`, `PRACTICA_STALENESS_MINUTES`.
pub fn load_config_from(path: Option<&Path>) -> Result<PracticaConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("practica.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => PracticaConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Apply `PRACTICA_*` overrides read through `lookup`, then re-validate.
fn apply_env_overrides(
    config: &mut PracticaConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(db) = lookup("PRACTICA_DATABASE") {
        config.database = PathBuf::from(db);
    }
    if let Some(minutes) = lookup("PRACTICA_STALENESS_MINUTES") {
        config.staleness_minutes = minutes
            .trim()
            .parse()
            .with_context(|| format!("invalid PRACTICA_STALENESS_MINUTES: {minutes}"))?;
    }
    validate(config)
}

/// Parse a TOML config string, resolving `${VAR}` references in the database path.
pub fn parse_config_str(content: &str) -> Result<PracticaConfig> {
    let mut config: PracticaConfig = toml::from_str(content)?;
    config.database = PathBuf::from(resolve_env_vars(&config.database.to_string_lossy()));
    validate(&config)?;
    Ok(config)
}

fn validate(config: &PracticaConfig) -> Result<()> {
    anyhow::ensure!(
        config.staleness_minutes > 0,
        "staleness_minutes must be positive"
    );
    if let ExclusionPolicy::PreferWeak { threshold } = config.sampling {
        anyhow::ensure!(
            (0.0..=1.0).contains(&threshold),
            "sampling threshold must be between 0.0 and 1.0"
        );
    }
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("practica"))
}
