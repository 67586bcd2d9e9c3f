//! Client for a tweet chart parsing service.
//!
//! A [`SessionGate`] validates and persists the LlamaCloud API key; a
//! [`ParseOrchestrator`] sends one parse request at a time once the key is
//! valid. [`TweetChartClient`] wires both to an HTTP [`ParserBackend`].

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod render;
pub mod session;
pub mod storage;
pub mod tweet_url;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{HttpBackend, ParserBackend};
pub use client::TweetChartClient;
pub use config::Config;
pub use error::{ClientError, StorageError};
pub use models::{ParseTier, ParseTweetRequest, ParseTweetResponse};
pub use orchestrator::{ParseForm, ParseOrchestrator, ParseState};
pub use session::{Credential, KeyStatus, SessionGate, SessionState};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use tweet_url::TweetUrl;
