//! Tool and toolkit abstractions
//!
//! A `Tool` is a single callable the model may invoke; a `Toolkit` bundles
//! related tools that share backing state (a browser session, a mailbox
//! hub). Agents receive flat `Vec<Arc<dyn Tool>>` lists.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::ToolSpec;

pub mod browser;
pub mod communication;
pub mod human;
pub mod message_integration;
pub mod planning;

pub use browser::{BrowserToolkit, BrowserToolkitConfig, SnapshotTruncator};
pub use communication::AgentCommunicationToolkit;
pub use human::HumanToolkit;
pub use message_integration::{send_message_to_user_tool, MessageHandler, ToolkitMessageIntegration};
pub use planning::TaskPlanningToolkit;

/// A callable exposed to the model
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name, as presented to the model
    fn name(&self) -> &str;

    /// Human/model-readable description
    fn description(&self) -> &str;

    /// JSON schema for the arguments object
    fn parameters(&self) -> serde_json::Value;

    /// Execute the tool
    async fn call(&self, args: serde_json::Value) -> Result<serde_json::Value>;

    /// Wire representation for the chat API
    fn spec(&self) -> ToolSpec {
        ToolSpec::function(self.name(), self.description(), self.parameters())
    }
}

/// A bundle of tools sharing state
pub trait Toolkit: Send + Sync {
    fn get_tools(&self) -> Vec<Arc<dyn Tool>>;
}

type ToolFuture = Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>;
type ToolHandler = Arc<dyn Fn(serde_json::Value) -> ToolFuture + Send + Sync>;

/// Adapter building a `Tool` from a name, schema, and async closure.
/// Toolkits use this to expose methods on shared state as tools.
#[derive(Clone)]
pub struct FnTool {
    name: String,
    description: String,
    parameters: serde_json::Value,
    handler: ToolHandler,
}

impl FnTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        handler: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> ToolFuture + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(handler),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> serde_json::Value {
        self.parameters.clone()
    }

    async fn call(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        (self.handler)(args).await
    }
}

/// Pull a required string argument out of a tool arguments object
pub(crate) fn require_str(args: &serde_json::Value, key: &str, tool: &str) -> Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| crate::error::AgentError::InvalidArguments {
            name: tool.to_string(),
            message: format!("missing required string field '{}'", key),
        })
}
