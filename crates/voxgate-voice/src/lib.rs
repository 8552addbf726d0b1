//! LiveKit integration for the voxgate edge.
//!
//! The browser never sees the LiveKit API key or secret. Instead the edge
//! mints a short-lived join token for a `(room, identity)` pair and hands it
//! back together with the media server URL the browser should dial.

pub mod config;
pub mod error;
pub mod service;

pub use config::{LiveKitConfig, DEV_LIVEKIT_API_KEY, DEV_LIVEKIT_API_SECRET, DEV_LIVEKIT_URL};
pub use error::VoiceError;
pub use service::TokenService;
