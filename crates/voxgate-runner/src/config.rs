use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The agent process to supervise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCommandConfig {
    /// Executable to run.
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the process. Defaults to the server's own.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// How long `stop` waits for the process to exit after SIGINT before
    /// killing it.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

fn default_stop_timeout_secs() -> u64 {
    10
}

impl AgentCommandConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}
