//! The chat agent and its tool-calling loop
//!
//! One `step` runs: user message in, model call, execute any requested
//! tools, feed results back, repeat until the model answers without tool
//! calls. Memory between steps can prune tool traffic, and browser
//! snapshots are truncated as they age out of the current iteration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::model::{ChatMessage, ChatModel, ToolSpec};
use crate::toolkit::{SnapshotTruncator, Tool};

pub mod events;
pub use events::{event_channel, AgentEvent, AgentEventSender, EventReceiver, EventSender};

/// Maximum model calls per step, guarding against tool-calling loops
const MAX_TOOL_ITERATIONS: usize = 10;

/// A chat-capable agent with tools and prunable memory
pub struct ChatAgent {
    agent_id: String,
    role_name: String,
    system_message: Option<String>,
    model: Box<dyn ChatModel>,
    tools: Vec<Arc<dyn Tool>>,
    memory: Vec<ChatMessage>,
    prune_tool_calls_from_memory: bool,
    snapshot_truncator: Option<SnapshotTruncator>,
    event_sender: AgentEventSender,
}

impl ChatAgent {
    pub fn new(role_name: impl Into<String>, model: impl ChatModel + 'static) -> Self {
        Self {
            agent_id: Uuid::new_v4().to_string()[..8].to_string(),
            role_name: role_name.into(),
            system_message: None,
            model: Box::new(model),
            tools: Vec::new(),
            memory: Vec::new(),
            prune_tool_calls_from_memory: false,
            snapshot_truncator: None,
            event_sender: AgentEventSender::none(),
        }
    }

    pub fn with_system_message(mut self, content: impl Into<String>) -> Self {
        self.system_message = Some(content.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        for tool in tools {
            self.add_tool(tool);
        }
        self
    }

    /// Drop tool calls and results from memory once a step completes,
    /// keeping only user/assistant turns
    pub fn with_prune_tool_calls(mut self, prune: bool) -> Self {
        self.prune_tool_calls_from_memory = prune;
        self
    }

    /// Truncate aged browser snapshots in context and memory
    pub fn with_snapshot_truncator(mut self, truncator: SnapshotTruncator) -> Self {
        self.snapshot_truncator = Some(truncator);
        self
    }

    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.event_sender = AgentEventSender::new(sender);
        self
    }

    /// Register a tool after construction. A tool with a duplicate name
    /// replaces the existing one.
    pub fn add_tool(&mut self, tool: Arc<dyn Tool>) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            tracing::warn!(tool = tool.name(), "Replacing existing tool");
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn role_name(&self) -> &str {
        &self.role_name
    }

    pub fn model_name(&self) -> &str {
        self.model.model()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Registered tools, in registration order
    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn clear_memory(&mut self) {
        self.memory.clear();
    }

    /// Number of messages currently held in memory
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    /// Process one user message, running tool calls until the model
    /// produces a final answer.
    pub async fn step(&mut self, user_message: &str) -> Result<String> {
        let total_start = Instant::now();
        self.event_sender.processing_start(user_message);

        let tool_specs: Vec<ToolSpec> = self.tools.iter().map(|t| t.spec()).collect();
        let tool_index: HashMap<String, Arc<dyn Tool>> = self
            .tools
            .iter()
            .map(|t| (t.name().to_string(), Arc::clone(t)))
            .collect();

        let mut messages: Vec<ChatMessage> = Vec::new();
        if let Some(ref system) = self.system_message {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.extend(self.memory.clone());
        messages.push(ChatMessage::user(user_message));

        // Index of the first message produced by this step; everything from
        // here on is the transcript we may record into memory.
        let transcript_start = messages.len() - 1;

        // Which tool produced each call id, for snapshot truncation
        let mut call_tools: HashMap<String, String> = HashMap::new();

        let mut iterations = 0;
        loop {
            iterations += 1;
            if iterations > MAX_TOOL_ITERATIONS {
                let error_msg = format!(
                    "Agent '{}' reached maximum tool iterations ({}) without completing",
                    self.role_name, MAX_TOOL_ITERATIONS
                );
                tracing::warn!("{}", error_msg);
                self.event_sender.error(&error_msg);
                self.record_transcript(&messages[transcript_start..], &call_tools, Some(&error_msg));
                return Ok(error_msg);
            }
            self.event_sender.iteration(iterations);
            tracing::debug!(agent = %self.role_name, iteration = iterations, "Agent iteration");

            let completion = self.model.chat(messages.clone(), tool_specs.clone()).await?;
            let assistant = completion.message().clone();

            let tool_calls = assistant.tool_calls.clone().unwrap_or_default();
            if tool_calls.is_empty() {
                let total_duration = total_start.elapsed();
                tracing::info!(
                    agent = %self.role_name,
                    iterations,
                    elapsed_ms = total_duration.as_millis() as u64,
                    "Agent produced final answer"
                );
                self.event_sender
                    .response_complete(&assistant.content, iterations, total_duration);

                messages.push(ChatMessage::assistant(assistant.content.clone()));
                self.record_transcript(&messages[transcript_start..], &call_tools, None);
                return Ok(assistant.content);
            }

            tracing::info!(
                agent = %self.role_name,
                count = tool_calls.len(),
                "Agent requested tool calls"
            );

            // Older snapshots lose detail before new ones arrive; the
            // newest tool result always enters context untruncated.
            self.truncate_aged_snapshots(&mut messages, &call_tools);
            messages.push(assistant.clone());

            for call in &tool_calls {
                let name = call.function.name.clone();
                call_tools.insert(call.id.clone(), name.clone());

                let args = match call.function.parsed_arguments() {
                    Ok(v) => v,
                    Err(e) => {
                        let message = format!("Invalid arguments for tool '{}': {}", name, e);
                        tracing::warn!("{}", message);
                        messages.push(ChatMessage::tool(call.id.clone(), message));
                        continue;
                    }
                };

                self.event_sender.tool_start(&name, &args);
                let tool_start = Instant::now();

                let (content, is_error) = match tool_index.get(&name) {
                    Some(tool) => match tool.call(args).await {
                        Ok(result) => (value_to_content(&result), false),
                        Err(e) => (format!("Error calling tool {}: {}", name, e), true),
                    },
                    None => (
                        format!("Error: {}", AgentError::ToolNotFound(name.clone())),
                        true,
                    ),
                };

                let elapsed = tool_start.elapsed();
                self.event_sender
                    .tool_complete(&name, &content, elapsed, is_error);
                tracing::debug!(
                    tool = %name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    is_error,
                    "Tool call finished"
                );

                messages.push(ChatMessage::tool(call.id.clone(), content));
            }
        }
    }

    /// Truncate snapshot content in tool messages already in context
    fn truncate_aged_snapshots(
        &self,
        messages: &mut [ChatMessage],
        call_tools: &HashMap<String, String>,
    ) {
        let Some(ref truncator) = self.snapshot_truncator else {
            return;
        };
        for message in messages.iter_mut().filter(|m| m.role == "tool") {
            let Some(tool_name) = message
                .tool_call_id
                .as_ref()
                .and_then(|id| call_tools.get(id))
            else {
                continue;
            };
            let value = serde_json::Value::String(message.content.clone());
            if let serde_json::Value::String(truncated) = truncator.truncate_result(&value, tool_name)
            {
                message.content = truncated;
            }
        }
    }

    /// Record this step's transcript into memory, pruning tool traffic
    /// when configured.
    fn record_transcript(
        &mut self,
        transcript: &[ChatMessage],
        call_tools: &HashMap<String, String>,
        forced_answer: Option<&str>,
    ) {
        if self.prune_tool_calls_from_memory {
            // Keep the user message and the final assistant answer only
            if let Some(user) = transcript.first() {
                self.memory.push(user.clone());
            }
            let answer = forced_answer
                .map(|s| s.to_string())
                .or_else(|| {
                    transcript
                        .iter()
                        .rev()
                        .find(|m| m.role == "assistant" && m.tool_calls.is_none())
                        .map(|m| m.content.clone())
                })
                .unwrap_or_default();
            self.memory.push(ChatMessage::assistant(answer));
            return;
        }

        let mut recorded: Vec<ChatMessage> = transcript.to_vec();
        self.truncate_aged_snapshots(&mut recorded, call_tools);
        self.memory.extend(recorded);
    }
}

/// Render a tool result value as message content
fn value_to_content(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::model::{
        ChatCompletion, Choice, FunctionCall, ModelConfig, ModelFactory, ModelPlatform, ToolCall,
    };
    use crate::toolkit::FnTool;

    fn test_agent() -> ChatAgent {
        let model = ModelFactory::create(ModelConfig::new(ModelPlatform::Ollama, "test-model"))
            .expect("valid default config");
        ChatAgent::new("Test Agent", model)
    }

    /// Replays canned assistant messages; once the script runs out, every
    /// further call requests another echo tool round.
    struct ScriptedModel {
        replies: Mutex<VecDeque<ChatMessage>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<ChatMessage>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let model = Self {
                replies: Mutex::new(replies.into()),
                calls: Arc::clone(&calls),
            };
            (model, calls)
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn chat(
            &self,
            _messages: Vec<ChatMessage>,
            _tools: Vec<ToolSpec>,
        ) -> Result<ChatCompletion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let message = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| tool_call_message("echo", r#"{"text":"again"}"#));
            Ok(ChatCompletion {
                choices: vec![Choice {
                    message,
                    finish_reason: None,
                }],
            })
        }
    }

    fn tool_call_message(tool: &str, arguments: &str) -> ChatMessage {
        let mut message = ChatMessage::assistant("");
        message.tool_calls = Some(vec![ToolCall {
            id: format!("call_{}", tool),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: tool.to_string(),
                arguments: arguments.to_string(),
            },
        }]);
        message
    }

    fn echo_tool() -> Arc<dyn Tool> {
        Arc::new(FnTool::new(
            "echo",
            "Echo the arguments back",
            json!({"type": "object", "properties": {"text": {"type": "string"}}}),
            |args| Box::pin(async move { Ok(args) }),
        ))
    }

    #[tokio::test]
    async fn test_step_runs_one_tool_round_trip() {
        let (model, calls) = ScriptedModel::new(vec![
            tool_call_message("echo", r#"{"text":"hi"}"#),
            ChatMessage::assistant("The echo said hi."),
        ]);
        let mut agent = ChatAgent::new("Test Agent", model);
        agent.add_tool(echo_tool());

        let answer = agent.step("say hi").await.unwrap();

        assert_eq!(answer, "The echo said hi.");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // Unpruned memory: user, tool-call turn, tool result, final answer
        assert_eq!(agent.memory_len(), 4);
        assert!(agent
            .memory
            .iter()
            .any(|m| m.role == "tool" && m.content.contains("hi")));
    }

    #[tokio::test]
    async fn test_step_stops_at_max_tool_iterations() {
        // Empty script: the model requests a tool call on every round
        let (model, calls) = ScriptedModel::new(vec![]);
        let mut agent = ChatAgent::new("Test Agent", model);
        agent.add_tool(echo_tool());

        let answer = agent.step("loop forever").await.unwrap();

        assert!(answer.contains("maximum tool iterations"));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_TOOL_ITERATIONS);
    }

    #[tokio::test]
    async fn test_step_reports_unknown_tool_to_model() {
        let (model, _) = ScriptedModel::new(vec![
            tool_call_message("nonexistent", "{}"),
            ChatMessage::assistant("done"),
        ]);
        let mut agent = ChatAgent::new("Test Agent", model);

        let answer = agent.step("call something missing").await.unwrap();

        assert_eq!(answer, "done");
        assert!(agent
            .memory
            .iter()
            .any(|m| m.role == "tool" && m.content.contains("not found")));
    }

    #[test]
    fn test_agent_id_is_short_uuid() {
        let agent = test_agent();
        assert_eq!(agent.agent_id().len(), 8);
    }

    #[test]
    fn test_add_tool_replaces_duplicates() {
        use crate::toolkit::planning::TaskPlanningToolkit;
        let mut agent = test_agent();
        let toolkit = TaskPlanningToolkit::new();
        agent.add_tool(toolkit.decompose_task());
        agent.add_tool(toolkit.decompose_task());
        assert_eq!(agent.tool_names(), ["decompose_task"]);
    }

    #[test]
    fn test_pruned_transcript_keeps_final_turns_only() {
        let mut agent = test_agent().with_prune_tool_calls(true);

        let mut assistant_with_calls = ChatMessage::assistant("");
        assistant_with_calls.tool_calls = Some(vec![]);
        let transcript = vec![
            ChatMessage::user("find a recipe"),
            assistant_with_calls,
            ChatMessage::tool("call_1", "- link [ref=1]"),
            ChatMessage::assistant("Here is the recipe."),
        ];

        agent.record_transcript(&transcript, &HashMap::new(), None);
        assert_eq!(agent.memory_len(), 2);
        assert_eq!(agent.memory[0].role, "user");
        assert_eq!(agent.memory[1].content, "Here is the recipe.");
    }

    #[test]
    fn test_unpruned_transcript_truncates_snapshots() {
        let truncator = SnapshotTruncator::new(2);
        let mut agent = test_agent().with_snapshot_truncator(truncator);

        let long_snapshot = (0..20)
            .map(|i| format!("- link \"Recipe {}\" [ref={}]", i, i))
            .collect::<Vec<_>>()
            .join("\n");
        let transcript = vec![
            ChatMessage::user("search"),
            ChatMessage::tool("call_1", long_snapshot),
            ChatMessage::assistant("done"),
        ];
        let call_tools =
            HashMap::from([("call_1".to_string(), "browser_visit_page".to_string())]);

        agent.record_transcript(&transcript, &call_tools, None);
        assert_eq!(agent.memory_len(), 3);
        assert!(agent.memory[1].content.contains("truncated"));
    }

    #[test]
    fn test_value_to_content() {
        assert_eq!(value_to_content(&serde_json::json!("plain")), "plain");
        assert_eq!(value_to_content(&serde_json::json!({"a": 1})), "{\"a\":1}");
    }
}
