use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rangefix_core::{ChannelId, SmoothingMode};
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_OUTPUT: &str = "rangefix_data.json";
/// Source path meaning standard input.
pub const STDIN_SOURCE: &str = "-";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported config version {0}")]
    UnsupportedVersion(u32),
    #[error("more than one channel reads stdin")]
    MultipleStdin,
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ─── Raw input ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MonitorConfigInput {
    pub version: u32,
    pub smoothing: Option<SmoothingMode>,
    pub output: Option<String>,
    pub duration_s: Option<u64>,
    pub channels: Vec<ChannelConfigInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChannelConfigInput {
    pub id: String,
    pub source: String,
}

// ─── Resolved ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourcePath {
    Stdin,
    File(PathBuf),
}

impl std::fmt::Display for SourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourcePath::Stdin => write!(f, "<stdin>"),
            SourcePath::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub id: ChannelId,
    pub source: SourcePath,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub version: u32,
    pub smoothing: SmoothingMode,
    pub output: PathBuf,
    /// `None` runs until every source ends or the user interrupts.
    pub duration: Option<Duration>,
    pub channels: Vec<ChannelConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            smoothing: SmoothingMode::default(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            duration: None,
            channels: Vec::new(),
        }
    }
}

impl MonitorConfigInput {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn resolve(self) -> Result<MonitorConfig, ConfigError> {
        let version = if self.version == 0 {
            CONFIG_VERSION
        } else {
            self.version
        };
        if version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(version));
        }

        let output = self
            .output
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_OUTPUT), PathBuf::from);

        let mut seen = HashSet::new();
        let mut channels = Vec::new();
        for channel in self.channels {
            let id = channel.id.trim();
            let source = channel.source.trim();
            if id.is_empty() || source.is_empty() {
                continue;
            }
            if !seen.insert(id.to_string()) {
                continue;
            }
            let source = if source == STDIN_SOURCE {
                SourcePath::Stdin
            } else {
                SourcePath::File(PathBuf::from(source))
            };
            channels.push(ChannelConfig {
                id: ChannelId::new(id),
                source,
            });
        }
        if channels.iter().filter(|c| c.source == SourcePath::Stdin).count() > 1 {
            return Err(ConfigError::MultipleStdin);
        }

        Ok(MonitorConfig {
            version,
            smoothing: self.smoothing.unwrap_or_default(),
            output,
            duration: self
                .duration_s
                .filter(|s| *s > 0)
                .map(Duration::from_secs),
            channels,
        })
    }
}

impl MonitorConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        MonitorConfigInput::from_toml_str(input)?.resolve()
    }
}

/// Parse a `ID=PATH` channel argument.
pub fn parse_channel_arg(arg: &str) -> Result<ChannelConfigInput, String> {
    let (id, source) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected ID=PATH, got {arg:?}"))?;
    if id.trim().is_empty() || source.trim().is_empty() {
        return Err(format!("empty channel id or path in {arg:?}"));
    }
    Ok(ChannelConfigInput {
        id: id.trim().to_string(),
        source: source.trim().to_string(),
    })
}
