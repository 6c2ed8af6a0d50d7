//! Query-orchestration pipeline: cached, classified, specialist-routed
//! answers with attributed sources and progress streaming.
//!
//! The entry point is [`pipeline::Pipeline`]. Collaborators (text generation,
//! search, finance quotes, durable memory) are trait objects, so tests and
//! alternate deployments swap them without touching the pipeline.

pub mod agents;
pub mod analytics;
pub mod backends;
pub mod cache;
pub mod classifier;
pub mod completion;
pub mod config;
pub mod discovery;
pub mod error;
pub mod memory;
pub mod personalize;
pub mod pipeline;
pub mod proactive;
pub mod progress;
pub mod streams;
pub mod synthesis;
pub mod tools;
pub mod types;
pub mod vector_memory;

pub use config::{load_config, load_config_from_env, Config};
pub use error::AgentError;
pub use pipeline::Pipeline;
pub use progress::{ProgressEvent, ProgressReceiver, ProgressSender};
pub use types::{Query, ResponsePayload};
