use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::BackoffPolicy;

pub const LOCAL_CONFIG_FILE: &str = ".lv-config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LvConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// [server] section configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// WebSocket endpoint of the watch server
    #[serde(default = "default_url")]
    pub url: String,
}

/// [reconnect] section: exponential backoff bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_floor_ms")]
    pub floor_ms: u64,
    #[serde(default = "default_ceiling_ms")]
    pub ceiling_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_tab_width")]
    pub tab_width: u8,
    #[serde(default = "default_true")]
    pub line_numbers: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// tracing filter directive, e.g. "info" or "lview=debug"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file; defaults to `<cache dir>/lv/lv.log`
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_url() -> String {
    "ws://127.0.0.1:3000/ws".to_string()
}

fn default_floor_ms() -> u64 {
    1_000
}

fn default_ceiling_ms() -> u64 {
    30_000
}

fn default_tab_width() -> u8 {
    4
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { url: default_url() }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            floor_ms: default_floor_ms(),
            ceiling_ms: default_ceiling_ms(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            tab_width: default_tab_width(),
            line_numbers: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl ReconnectConfig {
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            floor: Duration::from_millis(self.floor_ms),
            ceiling: Duration::from_millis(self.ceiling_ms),
        }
    }
}

impl LogConfig {
    /// Where log output goes, None when no cache dir can be determined
    pub fn path(&self) -> Option<PathBuf> {
        self.file
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join("lv").join("lv.log")))
    }
}

/// Load config by merging global defaults with per-directory overrides.
/// Priority: `.lv-config.toml` in `dir` > global `~/.config/lv/config.toml` > built-in defaults.
/// Merging is deep: individual fields within sections (e.g. `[reconnect]`) override independently.
pub fn load_config(dir: &Path) -> LvConfig {
    let global_path = dirs::config_dir().map(|d| d.join("lv").join("config.toml"));
    load_from(global_path.as_deref(), &dir.join(LOCAL_CONFIG_FILE))
}

fn load_from(global_path: Option<&Path>, local_path: &Path) -> LvConfig {
    let global_table = global_path.and_then(read_table);
    let local_table = read_table(local_path);

    let merged = match (global_table, local_table) {
        (Some(mut global), Some(local)) => {
            deep_merge(&mut global, local);
            toml::Value::Table(global)
        }
        (Some(global), None) => toml::Value::Table(global),
        (None, Some(local)) => toml::Value::Table(local),
        (None, None) => return LvConfig::default(),
    };

    match merged.try_into() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "invalid config, using defaults");
            LvConfig::default()
        }
    }
}

fn read_table(path: &Path) -> Option<toml::Table> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<toml::Table>(&content) {
        Ok(table) => Some(table),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Recursively merge `overlay` into `base`. Overlay values win; nested tables are merged recursively.
fn deep_merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn defaults_when_no_files() {
        let dir = TempDir::new().unwrap();
        let config = load_from(None, &dir.path().join(LOCAL_CONFIG_FILE));
        assert_eq!(config, LvConfig::default());
        assert_eq!(config.reconnect.policy(), BackoffPolicy::default());
        assert_eq!(config.display.tab_width, 4);
    }

    #[test]
    fn local_overrides_global_field_by_field() {
        let dir = TempDir::new().unwrap();
        let global = write(
            &dir,
            "global.toml",
            "[server]\nurl = \"ws://global:1/ws\"\n[reconnect]\nfloor_ms = 250\nceiling_ms = 4000\n",
        );
        let local = write(&dir, LOCAL_CONFIG_FILE, "[reconnect]\nceiling_ms = 8000\n");

        let config = load_from(Some(&global), &local);
        assert_eq!(config.server.url, "ws://global:1/ws");
        assert_eq!(config.reconnect.floor_ms, 250);
        assert_eq!(config.reconnect.ceiling_ms, 8000);
        assert_eq!(
            config.reconnect.policy(),
            BackoffPolicy {
                floor: Duration::from_millis(250),
                ceiling: Duration::from_millis(8000),
            }
        );
    }

    #[test]
    fn zero_floor_from_file_still_delays_reconnects() {
        let dir = TempDir::new().unwrap();
        let local = write(&dir, LOCAL_CONFIG_FILE, "[reconnect]\nfloor_ms = 0\n");
        let config = load_from(None, &local);
        assert_eq!(config.reconnect.floor_ms, 0);

        let mut backoff = crate::connection::Backoff::new(config.reconnect.policy());
        assert_eq!(backoff.next_delay(), Duration::from_millis(1));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2));
    }

    #[test]
    fn local_only() {
        let dir = TempDir::new().unwrap();
        let local = write(&dir, LOCAL_CONFIG_FILE, "[display]\nline_numbers = false\n");
        let config = load_from(Some(&dir.path().join("missing.toml")), &local);
        assert!(!config.display.line_numbers);
        assert_eq!(config.display.tab_width, 4);
    }

    #[test]
    fn invalid_files_fall_back() {
        let dir = TempDir::new().unwrap();
        let broken = write(&dir, "global.toml", "[server\nurl=");
        let wrong_type = write(&dir, LOCAL_CONFIG_FILE, "[reconnect]\nfloor_ms = \"soon\"\n");
        assert_eq!(load_from(Some(&broken), &dir.path().join("none")), LvConfig::default());
        assert_eq!(load_from(None, &wrong_type), LvConfig::default());
    }

    #[test]
    fn load_config_reads_dir() {
        let dir = TempDir::new().unwrap();
        write(&dir, LOCAL_CONFIG_FILE, "[log]\nlevel = \"debug\"\nfile = \"/tmp/x.log\"\n");
        let config = load_config(dir.path());
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.path(), Some(PathBuf::from("/tmp/x.log")));
    }

    #[test]
    fn deep_merge_replaces_non_tables() {
        let mut base: toml::Table = toml::from_str("a = 1\n[t]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Table = toml::from_str("a = 2\n[t]\ny = 3\n").unwrap();
        deep_merge(&mut base, overlay);
        assert_eq!(base["a"].as_integer(), Some(2));
        assert_eq!(base["t"]["x"].as_integer(), Some(1));
        assert_eq!(base["t"]["y"].as_integer(), Some(3));
    }
}
