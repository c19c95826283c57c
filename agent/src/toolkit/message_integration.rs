//! User status messages and toolkit wrapping
//!
//! `send_message_to_user` is the one-way progress channel from agents to
//! the person running the workforce. `ToolkitMessageIntegration` wraps any
//! toolkit so that every tool invocation first announces itself through the
//! same channel before executing.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use crate::error::Result;
use crate::toolkit::{FnTool, Tool, Toolkit};

/// Receives (title, description, attachment) status triples
pub type MessageHandler = Arc<dyn Fn(&str, &str, &str) + Send + Sync>;

/// Handler that prints the tidy three-part message to stdout and logs it
pub fn console_message_handler() -> MessageHandler {
    Arc::new(|title, description, attachment| {
        println!("\nAgent Message:\n{} \n{}\n", title, description);
        if !attachment.is_empty() {
            println!("{}", attachment);
        }
        tracing::info!(%title, %description, %attachment, "Agent message to user");
    })
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SendMessageArgs {
    /// Short title of the message
    message_title: String,
    /// One-sentence description
    message_description: String,
    /// Optional attachment: a file path or a url
    #[serde(default)]
    message_attachment: Option<String>,
}

/// Build the `send_message_to_user` tool over a handler
pub fn send_message_to_user_tool(handler: MessageHandler) -> Arc<dyn Tool> {
    let schema =
        serde_json::to_value(schemars::schema_for!(SendMessageArgs)).unwrap_or_else(|_| json!({}));

    Arc::new(FnTool::new(
        "send_message_to_user",
        "Send a tidy one-way status message to the user: a short title, a one-sentence \
         description, and an optional attachment (file path or url). Use it to announce what \
         you are about to do, report results, or state decisions. It does not expect a reply.",
        schema,
        move |args| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let args: SendMessageArgs = serde_json::from_value(args).map_err(|e| {
                    crate::error::AgentError::InvalidArguments {
                        name: "send_message_to_user".to_string(),
                        message: e.to_string(),
                    }
                })?;
                let attachment = args.message_attachment.unwrap_or_default();
                handler(&args.message_title, &args.message_description, &attachment);
                Ok(json!(format!(
                    "Message successfully sent to user: '{} {} {}'",
                    args.message_title, args.message_description, attachment
                )))
            })
        },
    ))
}

/// Wraps toolkits so each tool call announces itself to the user first
#[derive(Clone)]
pub struct ToolkitMessageIntegration {
    handler: MessageHandler,
}

impl ToolkitMessageIntegration {
    pub fn new(handler: MessageHandler) -> Self {
        Self { handler }
    }

    /// Wrap every tool of a toolkit. The returned toolkit delegates to the
    /// originals unchanged after emitting the status message.
    pub fn register_toolkits<T: Toolkit>(&self, toolkit: T) -> WrappedToolkit {
        let tools = toolkit
            .get_tools()
            .into_iter()
            .map(|tool| {
                Arc::new(AnnouncingTool {
                    inner: tool,
                    handler: Arc::clone(&self.handler),
                }) as Arc<dyn Tool>
            })
            .collect();
        WrappedToolkit { tools }
    }
}

/// A toolkit whose tools have been wrapped with user announcements
pub struct WrappedToolkit {
    tools: Vec<Arc<dyn Tool>>,
}

impl Toolkit for WrappedToolkit {
    fn get_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.clone()
    }
}

struct AnnouncingTool {
    inner: Arc<dyn Tool>,
    handler: MessageHandler,
}

#[async_trait]
impl Tool for AnnouncingTool {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters(&self) -> serde_json::Value {
        self.inner.parameters()
    }

    async fn call(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let summary = summarize_args(&args);
        (self.handler)(
            &format!("Calling {}", self.inner.name()),
            &summary,
            "",
        );
        self.inner.call(args).await
    }
}

/// One-line argument summary for announcements, truncated for readability
fn summarize_args(args: &serde_json::Value) -> String {
    let text = args.to_string();
    if text.chars().count() > 120 {
        let head: String = text.chars().take(120).collect();
        format!("{}...", head)
    } else {
        text
    }
}
