//! Inter-agent messaging hub
//!
//! Registered agents exchange messages through per-agent mailboxes. The
//! history cap bounds each mailbox; the oldest messages are dropped first.
//! Tools are caller-agnostic (sender passes its own id) so one tool set can
//! be added to every agent in a team.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AgentError, Result};
use crate::toolkit::{require_str, FnTool, Tool, Toolkit};

/// A message between two agents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub from: String,
    pub to: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct HubState {
    mailboxes: HashMap<String, VecDeque<AgentMessage>>,
}

/// Messaging hub toolkit
#[derive(Clone)]
pub struct AgentCommunicationToolkit {
    state: Arc<Mutex<HubState>>,
    max_message_history: usize,
}

impl AgentCommunicationToolkit {
    pub fn new(max_message_history: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState::default())),
            max_message_history,
        }
    }

    /// Create a mailbox for an agent. Re-registering an id keeps the
    /// existing mailbox and warns.
    pub fn register_agent(&self, agent_id: impl Into<String>) {
        let agent_id = agent_id.into();
        let mut state = self.state.lock().expect("hub lock");
        if state.mailboxes.contains_key(&agent_id) {
            tracing::warn!(agent = %agent_id, "Agent already registered with message hub");
            return;
        }
        tracing::info!(agent = %agent_id, "Agent registered with message hub");
        state.mailboxes.insert(agent_id, VecDeque::new());
    }

    /// Registered agent ids, sorted
    pub fn agent_ids(&self) -> Vec<String> {
        let state = self.state.lock().expect("hub lock");
        let mut ids: Vec<String> = state.mailboxes.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn deliver(&self, from: &str, to: &str, content: &str) -> Result<()> {
        let mut state = self.state.lock().expect("hub lock");
        if !state.mailboxes.contains_key(from) {
            return Err(AgentError::UnknownAgent(from.to_string()));
        }
        let mailbox = state
            .mailboxes
            .get_mut(to)
            .ok_or_else(|| AgentError::UnknownAgent(to.to_string()))?;

        mailbox.push_back(AgentMessage {
            from: from.to_string(),
            to: to.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        });
        while mailbox.len() > self.max_message_history {
            mailbox.pop_front();
        }
        Ok(())
    }

    fn drain(&self, agent_id: &str) -> Result<Vec<AgentMessage>> {
        let mut state = self.state.lock().expect("hub lock");
        let mailbox = state
            .mailboxes
            .get_mut(agent_id)
            .ok_or_else(|| AgentError::UnknownAgent(agent_id.to_string()))?;
        Ok(mailbox.drain(..).collect())
    }

    fn send_message_tool(&self) -> Arc<dyn Tool> {
        let hub = self.clone();
        Arc::new(FnTool::new(
            "send_message",
            "Send a message to another agent on the team. Pass your own agent id as 'from'.",
            json!({
                "type": "object",
                "properties": {
                    "from": {"type": "string", "description": "Your agent id"},
                    "to": {"type": "string", "description": "Receiving agent id"},
                    "content": {"type": "string", "description": "Message content"}
                },
                "required": ["from", "to", "content"],
            }),
            move |args| {
                let hub = hub.clone();
                Box::pin(async move {
                    let from = require_str(&args, "from", "send_message")?;
                    let to = require_str(&args, "to", "send_message")?;
                    let content = require_str(&args, "content", "send_message")?;
                    hub.deliver(&from, &to, &content)?;
                    Ok(json!(format!("Message delivered to '{}'.", to)))
                })
            },
        ))
    }

    fn check_messages_tool(&self) -> Arc<dyn Tool> {
        let hub = self.clone();
        Arc::new(FnTool::new(
            "check_messages",
            "Read and clear your mailbox. Pass your own agent id.",
            json!({
                "type": "object",
                "properties": {
                    "agent_id": {"type": "string", "description": "Your agent id"}
                },
                "required": ["agent_id"],
            }),
            move |args| {
                let hub = hub.clone();
                Box::pin(async move {
                    let agent_id = require_str(&args, "agent_id", "check_messages")?;
                    let messages = hub.drain(&agent_id)?;
                    Ok(serde_json::to_value(messages)?)
                })
            },
        ))
    }

    fn list_agents_tool(&self) -> Arc<dyn Tool> {
        let hub = self.clone();
        Arc::new(FnTool::new(
            "list_agents",
            "List the agent ids registered with the message hub.",
            json!({"type": "object", "properties": {}}),
            move |_args| {
                let hub = hub.clone();
                Box::pin(async move { Ok(json!(hub.agent_ids())) })
            },
        ))
    }
}

impl Toolkit for AgentCommunicationToolkit {
    fn get_tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![
            self.send_message_tool(),
            self.check_messages_tool(),
            self.list_agents_tool(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_list() {
        let hub = AgentCommunicationToolkit::new(10);
        hub.register_agent("Search_Agent");
        hub.register_agent("Task_Planner");
        assert_eq!(hub.agent_ids(), ["Search_Agent", "Task_Planner"]);
    }

    #[test]
    fn test_deliver_and_drain() {
        let hub = AgentCommunicationToolkit::new(10);
        hub.register_agent("a");
        hub.register_agent("b");

        hub.deliver("a", "b", "plan ready").unwrap();
        let messages = hub.drain("b").unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].from, "a");
        assert_eq!(messages[0].content, "plan ready");

        // Drained mailbox is empty
        assert!(hub.drain("b").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_recipient() {
        let hub = AgentCommunicationToolkit::new(10);
        hub.register_agent("a");
        assert!(matches!(
            hub.deliver("a", "ghost", "hi"),
            Err(AgentError::UnknownAgent(_))
        ));
    }

    #[test]
    fn test_history_cap_drops_oldest() {
        let hub = AgentCommunicationToolkit::new(3);
        hub.register_agent("a");
        hub.register_agent("b");

        for i in 0..5 {
            hub.deliver("a", "b", &format!("msg {}", i)).unwrap();
        }
        let messages = hub.drain("b").unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "msg 2");
        assert_eq!(messages[2].content, "msg 4");
    }

    #[tokio::test]
    async fn test_tools_end_to_end() {
        let hub = AgentCommunicationToolkit::new(10);
        hub.register_agent("a");
        hub.register_agent("b");
        let tools = hub.get_tools();
        assert_eq!(tools.len(), 3);

        let send = &tools[0];
        send.call(json!({"from": "a", "to": "b", "content": "hello"}))
            .await
            .unwrap();

        let check = &tools[1];
        let inbox = check.call(json!({"agent_id": "b"})).await.unwrap();
        assert_eq!(inbox.as_array().unwrap().len(), 1);
    }
}
