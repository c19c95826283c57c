//! Agent events for real-time visibility
//!
//! Emitted during the tool-calling loop so that CLIs or orchestrators can
//! watch progress without polling. Senders are optional; without one,
//! events are discarded.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted by a `ChatAgent` during `step`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A step started processing a user message
    ProcessingStart { message: String },

    /// A tool call is about to execute
    ToolStart {
        name: String,
        arguments: serde_json::Value,
    },

    /// A tool call finished
    ToolComplete {
        name: String,
        result: String,
        #[serde(with = "duration_millis")]
        duration: Duration,
        is_error: bool,
    },

    /// A loop iteration began
    Iteration { number: usize },

    /// The final answer is ready
    ResponseComplete {
        content: String,
        iterations: usize,
        #[serde(with = "duration_millis")]
        total_duration: Duration,
    },

    /// Something went wrong
    Error { message: String },
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

pub type EventSender = mpsc::UnboundedSender<AgentEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<AgentEvent>;

/// Create a new event channel
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Optional event sender with typed helpers
#[derive(Clone, Default)]
pub struct AgentEventSender {
    sender: Option<EventSender>,
}

impl AgentEventSender {
    pub fn new(sender: EventSender) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub fn none() -> Self {
        Self { sender: None }
    }

    pub fn is_active(&self) -> bool {
        self.sender.is_some()
    }

    /// Send errors are ignored; the receiver may have dropped
    pub fn send(&self, event: AgentEvent) {
        if let Some(ref sender) = self.sender {
            let _ = sender.send(event);
        }
    }

    pub fn processing_start(&self, message: &str) {
        self.send(AgentEvent::ProcessingStart {
            message: message.to_string(),
        });
    }

    pub fn tool_start(&self, name: &str, arguments: &serde_json::Value) {
        self.send(AgentEvent::ToolStart {
            name: name.to_string(),
            arguments: arguments.clone(),
        });
    }

    pub fn tool_complete(&self, name: &str, result: &str, duration: Duration, is_error: bool) {
        self.send(AgentEvent::ToolComplete {
            name: name.to_string(),
            result: result.to_string(),
            duration,
            is_error,
        });
    }

    pub fn iteration(&self, number: usize) {
        self.send(AgentEvent::Iteration { number });
    }

    pub fn response_complete(&self, content: &str, iterations: usize, total_duration: Duration) {
        self.send(AgentEvent::ResponseComplete {
            content: content.to_string(),
            iterations,
            total_duration,
        });
    }

    pub fn error(&self, message: &str) {
        self.send(AgentEvent::Error {
            message: message.to_string(),
        });
    }
}
