use crate::cli::CliArgs;
use crate::dispatch::Deadlines;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_REFRESH_MS: u64 = 2_000;
const MIN_REFRESH_MS: u64 = 500;
const DEFAULT_LOG_TAIL: usize = 200;

/// Effective settings after merging the config file and CLI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub source: Option<PathBuf>,
    pub refresh_interval: Duration,
    pub log_tail: usize,
    pub docker_bin: String,
    pub docker_host: Option<String>,
    pub deadlines: Deadlines,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct WharfConfigFile {
    #[serde(default, alias = "refresh")]
    refresh_ms: Option<u64>,
    #[serde(default, alias = "tail")]
    log_tail_lines: Option<usize>,
    #[serde(default)]
    docker_bin: Option<String>,
    #[serde(default, alias = "host")]
    docker_host: Option<String>,
    #[serde(default)]
    timeouts: TimeoutSpec,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct TimeoutSpec {
    #[serde(default, alias = "short")]
    short_secs: Option<u64>,
    #[serde(default, alias = "medium")]
    medium_secs: Option<u64>,
    #[serde(default, alias = "long")]
    long_secs: Option<u64>,
}

impl Settings {
    pub fn load(args: &CliArgs) -> Result<Self> {
        let path = args.config.clone().or_else(discover_config_path);
        let file = match &path {
            Some(path) => read_config(path)?,
            None => WharfConfigFile::default(),
        };
        Ok(Self::merge(file, args, path))
    }

    fn merge(file: WharfConfigFile, args: &CliArgs, source: Option<PathBuf>) -> Self {
        let defaults = Deadlines::default();
        let secs = |value: Option<u64>, fallback: Duration| {
            value.map_or(fallback, |secs| Duration::from_secs(secs.max(1)))
        };
        let refresh_ms = args
            .refresh_ms
            .or(file.refresh_ms)
            .unwrap_or(DEFAULT_REFRESH_MS)
            .max(MIN_REFRESH_MS);

        Self {
            source,
            refresh_interval: Duration::from_millis(refresh_ms),
            log_tail: args
                .tail
                .or(file.log_tail_lines)
                .unwrap_or(DEFAULT_LOG_TAIL)
                .max(1),
            docker_bin: args
                .docker_bin
                .clone()
                .or(file.docker_bin)
                .filter(|bin| !bin.trim().is_empty())
                .unwrap_or_else(|| "docker".to_string()),
            docker_host: args
                .host
                .clone()
                .or(file.docker_host)
                .filter(|host| !host.trim().is_empty()),
            deadlines: Deadlines {
                short: secs(file.timeouts.short_secs, defaults.short),
                medium: secs(file.timeouts.medium_secs, defaults.medium),
                long: secs(file.timeouts.long_secs, defaults.long),
            },
        }
    }
}

fn read_config(path: &Path) -> Result<WharfConfigFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}

fn parse_config(raw: &str) -> Result<WharfConfigFile> {
    if raw.trim().is_empty() {
        return Ok(WharfConfigFile::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("WHARF_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [PathBuf::from("wharf.yaml"), PathBuf::from(".wharf.yaml")];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let candidate = PathBuf::from(home).join(".config/wharf/config.yaml");
        if candidate.exists() {
            return Some(candidate);
        }
    }

    None
}
