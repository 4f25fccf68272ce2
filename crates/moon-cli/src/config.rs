use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use moon_core::{DEFAULT_BURST_TIMEOUT, EngineConfig, Location, Scope};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "moon.toml";

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub location: LocationSection,
    pub engine: EngineSection,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LocationSection {
    pub latitude: f64,
    pub longitude: f64,
    pub utc_offset_minutes: i32,
}

impl Default for LocationSection {
    fn default() -> Self {
        let loc = Location::default();
        Self {
            latitude: loc.latitude,
            longitude: loc.longitude,
            utc_offset_minutes: loc.utc_offset_minutes,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    /// 0 = one worker per hardware thread.
    pub workers: usize,
    /// 0 disables the burst deadline.
    pub burst_timeout_secs: u64,
    pub scope: Scope,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            workers: 0,
            burst_timeout_secs: DEFAULT_BURST_TIMEOUT.as_secs(),
            scope: Scope::default(),
        }
    }
}

impl Config {
    /// `explicit` must exist. Otherwise `<data_dir>/moon.toml` is used when
    /// present, and built-in defaults when not.
    pub fn load(explicit: Option<&Path>, data_dir: &Path) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = data_dir.join(CONFIG_FILE);
                if !fallback.exists() {
                    tracing::debug!("no config file, using defaults");
                    return Ok(Self::default());
                }
                fallback
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn location(&self) -> Location {
        Location::new(
            self.location.latitude,
            self.location.longitude,
            self.location.utc_offset_minutes,
        )
    }

    pub fn engine_config(&self) -> EngineConfig {
        let timeout = match self.engine.burst_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        EngineConfig::default()
            .with_workers(self.engine.workers)
            .with_burst_timeout(timeout)
    }
}

/// `$MOON_DATA_DIR`, else `~/.moon-calendar`.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("MOON_DATA_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var_os("HOME").unwrap_or_else(|| ".".into());
    PathBuf::from(home).join(".moon-calendar")
}
