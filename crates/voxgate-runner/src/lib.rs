//! Backend that runs the AI agent as a local subprocess.
//!
//! The edge proxies `POST /api/agent/start` here. Keys supplied by the
//! browser reach the agent only through its environment.

pub mod config;
pub mod error;
pub mod routes;
pub mod runner;

pub use config::AgentCommandConfig;
pub use error::RunnerError;
pub use routes::routes;
pub use runner::{secret_env_var, AgentRunner};
