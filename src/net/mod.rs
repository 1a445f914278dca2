// OS-level network plumbing: probes, connect attempts and the
// connectivity orchestrator. Every external command is bounded by an
// explicit timeout so a hung process can never stall the watch loop.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Command;

pub mod connect;
pub mod orchestrator;
pub mod probe;

pub use connect::{ConnectExecutor, ConnectOutcome, NmcliConnector};
pub use orchestrator::{ConnectivityState, Orchestrator, QrOutcome, WatchSettings};
pub use probe::{NetworkProbe, NmcliProbe};

pub(crate) struct CmdOutput {
    pub status_ok: bool,
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

pub(crate) async fn run(program: &str, args: &[&str], limit: Duration) -> Result<CmdOutput> {
    let output = tokio::time::timeout(limit, Command::new(program).args(args).output())
        .await
        .with_context(|| format!("{program} timed out after {limit:?}"))?
        .with_context(|| format!("failed to run {program}"))?;

    Ok(CmdOutput {
        status_ok: output.status.success(),
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}
