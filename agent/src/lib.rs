//! Chat agent core library
//!
//! Provides the building blocks for multi-agent systems:
//! - Model backends speaking the OpenAI-compatible chat API
//! - A `ChatAgent` with a tool-calling loop and prunable memory
//! - Toolkits: browser bridge, human console, task planning,
//!   inter-agent messaging, and user status messages

pub mod agent;
pub mod error;
pub mod model;
pub mod toolkit;

pub use agent::{AgentEvent, ChatAgent};
pub use error::AgentError;
pub use model::{ChatMessage, ChatModel, ModelBackend, ModelConfig, ModelFactory, ModelPlatform};
pub use toolkit::{Tool, Toolkit};
