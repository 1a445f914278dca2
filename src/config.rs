use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::net::WatchSettings;
use crate::session::KnownNetwork;

/// Runtime configuration: a TOML file in the user config dir, with
/// `LECTOR_*` environment overrides on top. Every field has a default so
/// a missing file just runs with the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan_interval_secs: u64,
    pub backoff_secs: u64,
    pub probe_host: String,
    pub probe_attempts: u32,
    pub probe_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub connect_wait_secs: u64,
    pub verify_poll_ms: u64,
    pub qr_debounce_secs: u64,
    pub wifi_prefix: String,
    pub session_file: PathBuf,
    pub networks_file: PathBuf,
    pub camera_source: Option<PathBuf>,
    pub speech_command: Option<String>,
    pub known_networks: HashMap<String, KnownNetwork>,
}

impl Default for Config {
    fn default() -> Self {
        let data = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lector");
        Self {
            scan_interval_secs: 3,
            backoff_secs: 60,
            probe_host: "8.8.8.8".to_string(),
            probe_attempts: 1,
            probe_timeout_secs: 1,
            connect_timeout_secs: 20,
            connect_wait_secs: 8,
            verify_poll_ms: 600,
            qr_debounce_secs: 6,
            wifi_prefix: "WIFI:".to_string(),
            session_file: data.join("session.json"),
            networks_file: data.join("session_networks.json"),
            camera_source: None,
            speech_command: None,
            known_networks: HashMap::new(),
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lector")
            .join("config.toml")
    }

    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = path.unwrap_or_else(Self::default_path);
        let mut config = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&raw).with_context(|| format!("invalid config at {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn watch_settings(&self) -> WatchSettings {
        WatchSettings {
            backoff_secs: self.backoff_secs as i64,
            connect_wait: Duration::from_secs(self.connect_wait_secs),
            verify_poll: Duration::from_millis(self.verify_poll_ms),
            qr_debounce_secs: self.qr_debounce_secs as i64,
        }
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_u64("LECTOR_SCAN_INTERVAL_SECS") {
            self.scan_interval_secs = v;
        }
        if let Some(v) = env_u64("LECTOR_BACKOFF_SECS") {
            self.backoff_secs = v;
        }
        if let Some(v) = env_u64("LECTOR_PROBE_TIMEOUT_SECS") {
            self.probe_timeout_secs = v;
        }
        if let Some(v) = env_str("LECTOR_PROBE_HOST") {
            self.probe_host = v;
        }
        if let Some(v) = env_str("LECTOR_WIFI_PREFIX") {
            self.wifi_prefix = v;
        }
        if let Some(v) = env_str("LECTOR_SESSION_FILE") {
            self.session_file = v.into();
        }
        if let Some(v) = env_str("LECTOR_NETWORKS_FILE") {
            self.networks_file = v.into();
        }
        if let Some(v) = env_str("LECTOR_CAMERA_SOURCE") {
            self.camera_source = Some(v.into());
        }
        if let Some(v) = env_str("LECTOR_SPEECH_COMMAND") {
            self.speech_command = Some(v);
        }
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wifi::Security;

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str("backoff_secs = 120\n").unwrap();
        assert_eq!(config.backoff_secs, 120);
        assert_eq!(config.scan_interval_secs, 3);
        assert_eq!(config.probe_host, "8.8.8.8");
        assert_eq!(config.wifi_prefix, "WIFI:");
    }

    #[test]
    fn known_networks_table_parses() {
        let raw = r#"
            [known_networks.HomeNet]
            password = "hunter22"
            security = "wpa2"

            [known_networks.CafeGuest]
            security = "open"
        "#;
        let config: Config = toml::from_str(raw).unwrap();

        let home = &config.known_networks["HomeNet"];
        assert_eq!(home.password.as_deref(), Some("hunter22"));
        assert_eq!(home.security, Security::Wpa2);

        let cafe = &config.known_networks["CafeGuest"];
        assert_eq!(cafe.password, None);
        assert_eq!(cafe.security, Security::Open);
    }

    #[test]
    fn watch_settings_map_over() {
        let config = Config {
            backoff_secs: 90,
            connect_wait_secs: 5,
            verify_poll_ms: 250,
            ..Config::default()
        };
        let settings = config.watch_settings();
        assert_eq!(settings.backoff_secs, 90);
        assert_eq!(settings.connect_wait, Duration::from_secs(5));
        assert_eq!(settings.verify_poll, Duration::from_millis(250));
    }
}
