use std::time::Duration;

use async_trait::async_trait;

/// Pure connectivity queries. Failures never propagate: a probe that
/// errors reports offline/empty/none and logs a warning.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    /// Reachability check against the configured host.
    async fn is_online(&self) -> bool;

    /// Visible SSIDs, de-duplicated, in first-seen order. Empty on any
    /// enumeration error.
    async fn scan(&self) -> Vec<String>;

    /// SSID of the currently associated network, if any.
    async fn active_ssid(&self) -> Option<String>;
}

const SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// Production probe backed by `ping` and `nmcli`.
pub struct NmcliProbe {
    host: String,
    attempts: u32,
    timeout: Duration,
}

impl NmcliProbe {
    pub fn new(host: impl Into<String>, attempts: u32, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            attempts: attempts.max(1),
            timeout,
        }
    }
}

#[async_trait]
impl NetworkProbe for NmcliProbe {
    async fn is_online(&self) -> bool {
        let count = self.attempts.to_string();
        let wait = self.timeout.as_secs().max(1).to_string();
        let limit = self.timeout * self.attempts + Duration::from_millis(500);

        match super::run("ping", &["-c", &count, "-W", &wait, &self.host], limit).await {
            Ok(out) => {
                log::debug!("ping rc={}", out.code);
                out.status_ok
            }
            Err(e) => {
                log::warn!("ping failed: {e:#}");
                false
            }
        }
    }

    async fn scan(&self) -> Vec<String> {
        let args = ["-t", "-f", "SSID", "dev", "wifi", "list"];
        match super::run("nmcli", &args, SCAN_TIMEOUT).await {
            Ok(out) if out.status_ok => dedup_ssids(&out.stdout),
            Ok(out) => {
                log::warn!("nmcli scan rc={}", out.code);
                Vec::new()
            }
            Err(e) => {
                log::warn!("nmcli scan failed: {e:#}");
                Vec::new()
            }
        }
    }

    async fn active_ssid(&self) -> Option<String> {
        let args = ["-t", "-f", "ACTIVE,SSID", "dev", "wifi"];
        match super::run("nmcli", &args, SCAN_TIMEOUT).await {
            Ok(out) if out.status_ok => parse_active_ssid(&out.stdout),
            Ok(_) => None,
            Err(e) => {
                log::warn!("nmcli active query failed: {e:#}");
                None
            }
        }
    }
}

fn dedup_ssids(raw: &str) -> Vec<String> {
    let mut ssids: Vec<String> = Vec::new();
    for line in raw.lines() {
        let ssid = line.trim();
        if ssid.is_empty() || ssids.iter().any(|s| s == ssid) {
            continue;
        }
        ssids.push(ssid.to_string());
    }
    ssids
}

fn parse_active_ssid(raw: &str) -> Option<String> {
    for line in raw.lines() {
        let mut parts = line.splitn(2, ':');
        if parts.next() == Some("yes") {
            return parts
                .next()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
        }
    }
    None
}
