use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::wifi::Security;

/// Age reported for networks that were never attempted. Large enough to
/// pass any sane backoff window, small enough to add without overflow.
pub const NEVER_ATTEMPTED_SECS: i64 = 1_000_000_000;

/// State persisted on every line-index change in the offline mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub mode: String,
    pub line_index: usize,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            mode: "Offline".to_string(),
            line_index: 0,
        }
    }
}

/// Stored credentials for a network the device may autoconnect to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownNetwork {
    pub password: Option<String>,
    #[serde(default)]
    pub security: Security,
}

/// Session persistence plus the known-network/attempt sidecar.
///
/// Failures are best-effort by contract: writes log a warning and the
/// in-memory state stays authoritative for the current run.
pub trait SessionStore: Send + Sync {
    fn save_state(&self, state: &SessionState);
    fn load_state(&self, default: SessionState) -> SessionState;

    fn known_networks(&self) -> HashMap<String, KnownNetwork>;
    fn set_known_networks(&self, known: HashMap<String, KnownNetwork>);

    /// Record a connect attempt. `ts` defaults to now; records are
    /// monotonic and never removed.
    fn mark_connect_attempt(&self, ssid: &str, ts: Option<i64>);

    /// Seconds since the last attempt, [`NEVER_ATTEMPTED_SECS`] if none.
    fn last_attempt_age(&self, ssid: &str) -> i64;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct NetworksFile {
    #[serde(default)]
    known: HashMap<String, KnownNetwork>,
    #[serde(default)]
    last_attempt: HashMap<String, i64>,
}

/// JSON-file store: one file for the session state, a sidecar for
/// networks and attempt records. The single guard makes every
/// load-mutate-persist on the sidecar one critical section, which is what
/// keeps attempt recording atomic across the watch tick and the capture
/// path.
pub struct JsonSessionStore {
    state_path: PathBuf,
    net_path: PathBuf,
    guard: Mutex<()>,
}

impl JsonSessionStore {
    pub fn new(state_path: PathBuf, net_path: PathBuf) -> Self {
        for path in [&state_path, &net_path] {
            if let Some(parent) = path.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    log::warn!("could not create {}: {e}", parent.display());
                }
            }
        }
        Self {
            state_path,
            net_path,
            guard: Mutex::new(()),
        }
    }

    fn load_net(&self) -> NetworksFile {
        match fs::read_to_string(&self.net_path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("corrupt networks file {}: {e}", self.net_path.display());
                NetworksFile::default()
            }),
            Err(_) => NetworksFile::default(),
        }
    }

    fn save_net(&self, file: &NetworksFile) {
        match serde_json::to_string_pretty(file) {
            Ok(raw) => {
                if let Err(e) = fs::write(&self.net_path, raw) {
                    log::warn!("could not write {}: {e}", self.net_path.display());
                }
            }
            Err(e) => log::warn!("could not encode networks file: {e}"),
        }
    }
}

impl SessionStore for JsonSessionStore {
    fn save_state(&self, state: &SessionState) {
        let _guard = self.guard.lock().unwrap();
        match serde_json::to_string_pretty(state) {
            Ok(raw) => {
                if let Err(e) = fs::write(&self.state_path, raw) {
                    log::warn!("could not write {}: {e}", self.state_path.display());
                }
            }
            Err(e) => log::warn!("could not encode session state: {e}"),
        }
    }

    fn load_state(&self, default: SessionState) -> SessionState {
        let _guard = self.guard.lock().unwrap();
        match fs::read_to_string(&self.state_path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("corrupt session file {}: {e}", self.state_path.display());
                default
            }),
            Err(_) => default,
        }
    }

    fn known_networks(&self) -> HashMap<String, KnownNetwork> {
        let _guard = self.guard.lock().unwrap();
        self.load_net().known
    }

    fn set_known_networks(&self, known: HashMap<String, KnownNetwork>) {
        let _guard = self.guard.lock().unwrap();
        let mut file = self.load_net();
        file.known = known;
        self.save_net(&file);
    }

    fn mark_connect_attempt(&self, ssid: &str, ts: Option<i64>) {
        let _guard = self.guard.lock().unwrap();
        let mut file = self.load_net();
        file.last_attempt
            .insert(ssid.to_string(), ts.unwrap_or_else(|| Utc::now().timestamp()));
        self.save_net(&file);
    }

    fn last_attempt_age(&self, ssid: &str) -> i64 {
        let _guard = self.guard.lock().unwrap();
        match self.load_net().last_attempt.get(ssid) {
            Some(&ts) if ts > 0 => (Utc::now().timestamp() - ts).max(0),
            _ => NEVER_ATTEMPTED_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, JsonSessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(
            dir.path().join("session.json"),
            dir.path().join("session_networks.json"),
        );
        (dir, store)
    }

    #[test]
    fn state_round_trips() {
        let (_dir, store) = store();
        store.save_state(&SessionState {
            mode: "Offline".into(),
            line_index: 4,
        });
        let loaded = store.load_state(SessionState::default());
        assert_eq!(loaded.line_index, 4);
        assert_eq!(loaded.mode, "Offline");
    }

    #[test]
    fn missing_state_returns_default() {
        let (_dir, store) = store();
        let loaded = store.load_state(SessionState::default());
        assert_eq!(loaded.line_index, 0);
    }

    #[test]
    fn known_networks_round_trip() {
        let (_dir, store) = store();
        let mut known = HashMap::new();
        known.insert(
            "HomeNet".to_string(),
            KnownNetwork {
                password: Some("hunter22".into()),
                security: Security::Wpa2,
            },
        );
        store.set_known_networks(known.clone());
        assert_eq!(store.known_networks(), known);
    }

    #[test]
    fn attempt_age_starts_infinite_and_shrinks() {
        let (_dir, store) = store();
        assert_eq!(store.last_attempt_age("HomeNet"), NEVER_ATTEMPTED_SECS);

        store.mark_connect_attempt("HomeNet", None);
        assert!(store.last_attempt_age("HomeNet") < 5);

        let old = Utc::now().timestamp() - 90;
        store.mark_connect_attempt("HomeNet", Some(old));
        let age = store.last_attempt_age("HomeNet");
        assert!((89..=92).contains(&age), "age was {age}");
    }

    #[test]
    fn attempts_survive_known_network_updates() {
        let (_dir, store) = store();
        store.mark_connect_attempt("HomeNet", Some(Utc::now().timestamp() - 30));
        store.set_known_networks(HashMap::new());
        assert!(store.last_attempt_age("HomeNet") < NEVER_ATTEMPTED_SECS);
    }
}
