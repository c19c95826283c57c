//! Workers
//!
//! A worker is anything that can take a task and produce a textual result.
//! `SingleAgentWorker` wraps one chat agent; the engine only sees the
//! trait, which is also the seam tests use to substitute fakes.

use async_trait::async_trait;

use agent::ChatAgent;

use crate::error::Result;
use crate::task::Task;

/// Something that can process tasks
#[async_trait]
pub trait Worker: Send {
    /// What this worker is good at, used for assignment
    fn description(&self) -> &str;

    /// Process one task. `context` carries results of earlier sub-tasks
    /// when the workforce shares memory; empty otherwise.
    async fn process(&mut self, task: &Task, context: &str) -> Result<String>;

    /// Release resources (browser sessions etc.) at shutdown
    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A worker backed by one chat agent
pub struct SingleAgentWorker {
    description: String,
    agent: ChatAgent,
}

impl SingleAgentWorker {
    pub fn new(description: impl Into<String>, agent: ChatAgent) -> Self {
        Self {
            description: description.into(),
            agent,
        }
    }

    pub fn agent(&self) -> &ChatAgent {
        &self.agent
    }

    /// Format the task (and optional shared context) into one prompt
    fn task_prompt(task: &Task, context: &str) -> String {
        let mut prompt = format!(
            "You have been assigned sub-task {}:\n\n{}\n",
            task.id, task.content
        );
        if !context.is_empty() {
            prompt.push_str(&format!(
                "\nResults from earlier sub-tasks:\n{}\n",
                context
            ));
        }
        prompt.push_str("\nComplete the sub-task and report your findings in detail.");
        prompt
    }
}

#[async_trait]
impl Worker for SingleAgentWorker {
    fn description(&self) -> &str {
        &self.description
    }

    async fn process(&mut self, task: &Task, context: &str) -> Result<String> {
        let prompt = Self::task_prompt(task, context);
        tracing::info!(
            worker = %self.agent.role_name(),
            task = %task.id,
            "Worker processing task"
        );
        let output = self.agent.step(&prompt).await?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_prompt_includes_id_and_content() {
        let task = Task::new("Search for lasagna", "0.1");
        let prompt = SingleAgentWorker::task_prompt(&task, "");
        assert!(prompt.contains("0.1"));
        assert!(prompt.contains("Search for lasagna"));
        assert!(!prompt.contains("earlier sub-tasks"));
    }

    #[test]
    fn test_task_prompt_with_shared_context() {
        let task = Task::new("Summarize", "0.2");
        let prompt = SingleAgentWorker::task_prompt(&task, "[0.1] found 3 recipes");
        assert!(prompt.contains("earlier sub-tasks"));
        assert!(prompt.contains("found 3 recipes"));
    }
}
