use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ThreadloomConfig {
    pub api_port: u16,
    /// Prefix for continuation URLs handed out in holes. Empty means relative.
    pub public_url: String,
    pub paths: ThreadloomPaths,
    pub threading: ThreadingConfig,
}

impl ThreadloomConfig {
    pub fn from_env() -> Result<Self> {
        let paths = ThreadloomPaths::discover()?;
        let api_port = env::var("THREADLOOM_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        let public_url = env::var("THREADLOOM_PUBLIC_URL")
            .map(|raw| raw.trim().trim_end_matches('/').to_string())
            .unwrap_or_default();
        Ok(Self {
            api_port,
            public_url,
            paths,
            threading: ThreadingConfig::from_env(),
        })
    }

    pub fn new(api_port: u16, paths: ThreadloomPaths, threading: ThreadingConfig) -> Self {
        Self {
            api_port,
            public_url: String::new(),
            paths,
            threading,
        }
    }
}

/// Threading defaults. `enabled` and `max_depth` can be overridden at runtime
/// through the settings table.
#[derive(Debug, Clone)]
pub struct ThreadingConfig {
    pub enabled: bool,
    pub max_depth: Option<u32>,
    pub default_limit: usize,
    pub max_limit: usize,
    pub collapse_child_limit: usize,
    pub collapse_child_depth: usize,
    /// Deepest level, relative to the requested scope, a single response
    /// nests. Anything below becomes a hole, focus path included.
    pub max_nesting: usize,
    pub trending_gravity: f64,
}

impl Default for ThreadingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_depth: None,
            default_limit: 30,
            max_limit: 100,
            collapse_child_limit: 3,
            collapse_child_depth: 3,
            max_nesting: 32,
            trending_gravity: 1.5,
        }
    }
}

impl ThreadingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // Threading stays on unless explicitly disabled
        let enabled = env::var("THREADLOOM_THREADING_ENABLED")
            .ok()
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(defaults.enabled);

        let max_depth = env::var("THREADLOOM_MAX_DEPTH")
            .ok()
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|depth| *depth > 0);

        Self {
            enabled,
            max_depth,
            default_limit: parse_env("THREADLOOM_DEFAULT_LIMIT").unwrap_or(defaults.default_limit),
            max_limit: parse_env("THREADLOOM_MAX_LIMIT").unwrap_or(defaults.max_limit),
            collapse_child_limit: parse_env("THREADLOOM_COLLAPSE_CHILD_LIMIT")
                .unwrap_or(defaults.collapse_child_limit),
            collapse_child_depth: parse_env("THREADLOOM_COLLAPSE_CHILD_DEPTH")
                .unwrap_or(defaults.collapse_child_depth),
            max_nesting: parse_env::<usize>("THREADLOOM_MAX_NESTING")
                .filter(|nesting| *nesting > 0)
                .unwrap_or(defaults.max_nesting),
            trending_gravity: parse_env("THREADLOOM_TRENDING_GRAVITY")
                .unwrap_or(defaults.trending_gravity),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|raw| raw.trim().parse().ok())
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ThreadloomPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl ThreadloomPaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("threadloom.db");
        let logs_dir = base.join("logs");

        Ok(Self {
            base,
            data_dir,
            db_path,
            logs_dir,
        })
    }
}
