//! Supervision of the single agent subprocess.

use crate::config::AgentCommandConfig;
use crate::error::RunnerError;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use voxgate_types::Secrets;

/// Owns at most one running agent process.
///
/// All operations serialize on an internal lock, so concurrent `start` calls
/// never spawn two processes.
#[derive(Debug)]
pub struct AgentRunner {
    config: AgentCommandConfig,
    child: Mutex<Option<Child>>,
}

impl AgentRunner {
    pub fn new(config: AgentCommandConfig) -> Self {
        Self {
            config,
            child: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &AgentCommandConfig {
        &self.config
    }

    /// Starts the agent with `secrets` in its environment.
    ///
    /// Returns `false` without touching the process if it is already running.
    pub async fn start(&self, secrets: &Secrets) -> Result<bool, RunnerError> {
        let mut slot = self.child.lock().await;
        if let Some(child) = slot.as_mut() {
            if child.try_wait()?.is_none() {
                tracing::debug!(pid = ?child.id(), "agent already running");
                return Ok(false);
            }
        }

        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }
        for (provider, key) in secrets.expose() {
            command.env(secret_env_var(provider), key);
        }

        let child = command.spawn().map_err(|e| RunnerError::Spawn {
            program: self.config.program.clone(),
            source: e,
        })?;
        tracing::info!(
            pid = ?child.id(),
            program = %self.config.program,
            providers = ?secrets,
            "agent process started"
        );
        *slot = Some(child);
        Ok(true)
    }

    /// Stops the agent. Returns `false` if it was not running.
    ///
    /// The process gets SIGINT and `stop_timeout` to exit on its own before
    /// it is killed.
    pub async fn stop(&self) -> Result<bool, RunnerError> {
        let mut slot = self.child.lock().await;
        let Some(mut child) = slot.take() else {
            return Ok(false);
        };
        if child.try_wait()?.is_some() {
            return Ok(false);
        }

        if interrupt(&child) {
            match tokio::time::timeout(self.config.stop_timeout(), child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::info!(%status, "agent process stopped");
                    return Ok(true);
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => tracing::warn!(
                    timeout_secs = self.config.stop_timeout_secs,
                    "agent process ignored SIGINT, killing"
                ),
            }
        }

        child.kill().await?;
        tracing::info!("agent process killed");
        Ok(true)
    }

    pub async fn running(&self) -> bool {
        let mut slot = self.child.lock().await;
        match slot.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

/// Sends SIGINT to the child. Returns `false` if no signal was delivered.
#[cfg(unix)]
fn interrupt(child: &Child) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return false;
    };
    #[allow(clippy::cast_possible_wrap)]
    let target = Pid::from_raw(pid as i32);
    match kill(target, Signal::SIGINT) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(pid, "failed to interrupt agent process: {}", e);
            false
        }
    }
}

#[cfg(not(unix))]
fn interrupt(_child: &Child) -> bool {
    false
}

/// Environment variable carrying a provider's key: `cerebrasKey` becomes
/// `CEREBRAS_API_KEY`, `elevenLabsKey` becomes `ELEVEN_LABS_API_KEY`.
pub fn secret_env_var(provider: &str) -> String {
    let stem = provider.strip_suffix("Key").unwrap_or(provider);
    let mut name = String::with_capacity(stem.len() + 8);
    for (i, c) in stem.chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            name.push('_');
        }
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_uppercase());
        } else {
            name.push('_');
        }
    }
    name.push_str("_API_KEY");
    name
}
