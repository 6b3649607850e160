//! Configuration loading.
//!
//! Load order (later wins):
//! 1. Compiled defaults
//! 2. `/etc/stagehand/config.toml`
//! 3. `~/.config/stagehand/config.toml`
//! 4. `./stagehand.toml` (or the `--config` path)
//! 5. Environment variables
//!
//! Everything here binds to loopback; ports are the only knobs most
//! installs ever touch.

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid value for {var}: {message}")]
    Env { var: String, message: String },
}

/// Where config values came from, for `--show-config`.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub files: Vec<PathBuf>,
    pub env_overrides: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PortsConfig {
    /// DAW TCP command port.
    pub tcp: u16,
    /// DAW UDP real-time port.
    pub udp_rt: u16,
    /// OSC bridge outbound port.
    pub osc_send: u16,
    /// OSC bridge inbound port.
    pub osc_recv: u16,
    /// Singleton sentinel port.
    pub sentinel: u16,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            tcp: 9001,
            udp_rt: 9002,
            osc_send: 9004,
            osc_recv: 9005,
            sentinel: 9010,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Off by default; the dashboard is read-only telemetry.
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8090,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathsConfig {
    /// Directory for the persisted catalog and effect-chain templates.
    pub catalog_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let catalog_dir = directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/stagehand"))
            .unwrap_or_else(|| PathBuf::from(".stagehand"));
        Self { catalog_dir }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Log verbosity (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub ports: PortsConfig,
    pub dashboard: DashboardConfig,
    pub paths: PathsConfig,
    pub telemetry: TelemetryConfig,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    pub fn load_with_sources_from(
        cli_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = Config::default();

        for path in discover_config_files(cli_path) {
            let file = load_file(&path)?;
            file.apply(&mut config);
            sources.files.push(path);
        }

        apply_env_overrides(&mut config, &mut sources)?;
        Ok((config, sources))
    }

    pub fn to_toml(&self) -> String {
        let mut out = String::new();
        out.push_str("# stagehand configuration\n\n");
        out.push_str("[ports]\n");
        out.push_str(&format!("tcp = {}\n", self.ports.tcp));
        out.push_str(&format!("udp_rt = {}\n", self.ports.udp_rt));
        out.push_str(&format!("osc_send = {}\n", self.ports.osc_send));
        out.push_str(&format!("osc_recv = {}\n", self.ports.osc_recv));
        out.push_str(&format!("sentinel = {}\n", self.ports.sentinel));
        out.push_str("\n[dashboard]\n");
        out.push_str(&format!("enabled = {}\n", self.dashboard.enabled));
        out.push_str(&format!("port = {}\n", self.dashboard.port));
        out.push_str("\n[paths]\n");
        out.push_str(&format!("catalog_dir = \"{}\"\n", self.paths.catalog_dir.display()));
        out.push_str("\n[telemetry]\n");
        out.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));
        out
    }
}

/// Partial view of one config file; absent fields leave the running
/// config untouched.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    ports: PortsFile,
    #[serde(default)]
    dashboard: DashboardFile,
    #[serde(default)]
    paths: PathsFile,
    #[serde(default)]
    telemetry: TelemetryFile,
}

#[derive(Debug, Default, Deserialize)]
struct PortsFile {
    tcp: Option<u16>,
    udp_rt: Option<u16>,
    osc_send: Option<u16>,
    osc_recv: Option<u16>,
    sentinel: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct DashboardFile {
    enabled: Option<bool>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct PathsFile {
    catalog_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TelemetryFile {
    log_level: Option<String>,
}

impl ConfigFile {
    fn apply(self, config: &mut Config) {
        if let Some(v) = self.ports.tcp {
            config.ports.tcp = v;
        }
        if let Some(v) = self.ports.udp_rt {
            config.ports.udp_rt = v;
        }
        if let Some(v) = self.ports.osc_send {
            config.ports.osc_send = v;
        }
        if let Some(v) = self.ports.osc_recv {
            config.ports.osc_recv = v;
        }
        if let Some(v) = self.ports.sentinel {
            config.ports.sentinel = v;
        }
        if let Some(v) = self.dashboard.enabled {
            config.dashboard.enabled = v;
        }
        if let Some(v) = self.dashboard.port {
            config.dashboard.port = v;
        }
        if let Some(v) = self.paths.catalog_dir {
            config.paths.catalog_dir = expand_path(&v);
        }
        if let Some(v) = self.telemetry.log_level {
            config.telemetry.log_level = v;
        }
    }
}

fn discover_config_files(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/stagehand/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(dirs) = directories::BaseDirs::new() {
        let user = dirs.config_dir().join("stagehand/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("stagehand.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

fn load_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn apply_env_overrides(
    config: &mut Config,
    sources: &mut ConfigSources,
) -> Result<(), ConfigError> {
    read_port("TCP_PORT", &mut config.ports.tcp, sources)?;
    read_port("UDP_RT_PORT", &mut config.ports.udp_rt, sources)?;
    read_port("OSC_SEND_PORT", &mut config.ports.osc_send, sources)?;
    read_port("OSC_RECV_PORT", &mut config.ports.osc_recv, sources)?;
    read_port("SENTINEL_PORT", &mut config.ports.sentinel, sources)?;
    read_port("DASHBOARD_PORT", &mut config.dashboard.port, sources)?;

    if let Ok(raw) = env::var("DASHBOARD_ENABLED") {
        config.dashboard.enabled = matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        sources.env_overrides.push("DASHBOARD_ENABLED".to_string());
    }
    if let Ok(raw) = env::var("CATALOG_DIR") {
        config.paths.catalog_dir = expand_path(&raw);
        sources.env_overrides.push("CATALOG_DIR".to_string());
    }
    if let Ok(raw) = env::var("LOG_LEVEL") {
        config.telemetry.log_level = raw;
        sources.env_overrides.push("LOG_LEVEL".to_string());
    }
    Ok(())
}

fn read_port(var: &str, slot: &mut u16, sources: &mut ConfigSources) -> Result<(), ConfigError> {
    if let Ok(raw) = env::var(var) {
        *slot = raw.parse().map_err(|_| ConfigError::Env {
            var: var.to_string(),
            message: format!("'{}' is not a port number", raw),
        })?;
        sources.env_overrides.push(var.to_string());
    }
    Ok(())
}

fn expand_path(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_loopback_friendly() {
        let config = Config::default();
        assert_eq!(config.ports.tcp, 9001);
        assert_eq!(config.ports.sentinel, 9010);
        assert!(!config.dashboard.enabled);
    }

    #[test]
    fn file_overlay_is_partial() {
        let file: ConfigFile = toml::from_str(
            r#"
            [ports]
            tcp = 19001

            [dashboard]
            enabled = true
            "#,
        )
        .unwrap();
        let mut config = Config::default();
        file.apply(&mut config);
        assert_eq!(config.ports.tcp, 19001);
        assert_eq!(config.ports.udp_rt, 9002); // untouched
        assert!(config.dashboard.enabled);
        assert_eq!(config.dashboard.port, 8090); // untouched
    }

    #[test]
    fn to_toml_shows_every_section() {
        let rendered = Config::default().to_toml();
        assert!(rendered.contains("[ports]"));
        assert!(rendered.contains("[dashboard]"));
        assert!(rendered.contains("[paths]"));
        assert!(rendered.contains("[telemetry]"));
    }
}
