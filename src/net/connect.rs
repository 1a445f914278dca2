use std::time::Duration;

use async_trait::async_trait;

const PASSWORD_MASK: &str = "********";

/// Result of one connect attempt. The diagnostic is safe to log and to
/// attach to events: the password is never part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub ok: bool,
    pub exit_code: i32,
    pub diagnostic: String,
}

/// One bounded OS-level connect attempt. Retry and backoff policy live in
/// the orchestrator, never here.
#[async_trait]
pub trait ConnectExecutor: Send + Sync {
    async fn connect(&self, ssid: &str, password: Option<&str>, hidden: bool) -> ConnectOutcome;
}

/// Joins networks with `nmcli dev wifi connect`.
pub struct NmcliConnector {
    timeout: Duration,
}

impl NmcliConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ConnectExecutor for NmcliConnector {
    async fn connect(&self, ssid: &str, password: Option<&str>, hidden: bool) -> ConnectOutcome {
        let mut args = vec!["dev", "wifi", "connect", ssid];
        if let Some(pwd) = password {
            args.push("password");
            args.push(pwd);
        }
        if hidden {
            args.push("hidden");
            args.push("yes");
        }

        match super::run("nmcli", &args, self.timeout).await {
            Ok(out) => {
                let diagnostic = redact(last_nonempty_line(&out.stderr, &out.stdout), password);
                if !out.status_ok {
                    log::info!("nmcli connect failed ssid={ssid} rc={}", out.code);
                }
                ConnectOutcome {
                    ok: out.status_ok,
                    exit_code: out.code,
                    diagnostic,
                }
            }
            Err(e) => ConnectOutcome {
                ok: false,
                exit_code: -1,
                diagnostic: redact(format!("{e:#}"), password),
            },
        }
    }
}

/// Last non-empty line of stderr, falling back to stdout.
fn last_nonempty_line(stderr: &str, stdout: &str) -> String {
    let source = if stderr.trim().is_empty() { stdout } else { stderr };
    source
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .to_string()
}

fn redact(text: String, password: Option<&str>) -> String {
    match password {
        Some(pwd) if !pwd.is_empty() => text.replace(pwd, PASSWORD_MASK),
        _ => text,
    }
}
