//! Task planning toolkit
//!
//! Gives a planning agent structured decompose/replan operations. The tools
//! do no model calls themselves; the agent supplies the sub-task contents
//! and gets back the canonical structured list with dotted ids.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AgentError, Result};
use crate::toolkit::{FnTool, Tool, Toolkit};

#[derive(Debug, Deserialize, JsonSchema)]
struct DecomposeArgs {
    /// The full content of the task being decomposed
    original_task_content: String,
    /// Ordered contents of the sub-tasks, one entry per sub-task
    sub_task_contents: Vec<String>,
    /// Id of the task being decomposed (defaults to "0")
    #[serde(default)]
    parent_task_id: Option<String>,
}

/// Planning toolkit: `decompose_task` and `replan_tasks`
#[derive(Debug, Clone, Default)]
pub struct TaskPlanningToolkit;

impl TaskPlanningToolkit {
    pub fn new() -> Self {
        Self
    }

    fn schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(DecomposeArgs)).unwrap_or_else(|_| json!({}))
    }

    fn build_sub_tasks(args: serde_json::Value, tool: &str, replanned: bool) -> Result<serde_json::Value> {
        let args: DecomposeArgs =
            serde_json::from_value(args).map_err(|e| AgentError::InvalidArguments {
                name: tool.to_string(),
                message: e.to_string(),
            })?;

        if args.sub_task_contents.is_empty() {
            return Err(AgentError::InvalidArguments {
                name: tool.to_string(),
                message: "sub_task_contents must not be empty".to_string(),
            });
        }

        let parent_id = args.parent_task_id.unwrap_or_else(|| "0".to_string());
        let sub_tasks: Vec<serde_json::Value> = args
            .sub_task_contents
            .iter()
            .enumerate()
            .map(|(i, content)| {
                json!({
                    "id": format!("{}.{}", parent_id, i),
                    "content": content,
                    "state": "open",
                })
            })
            .collect();

        tracing::info!(
            tool,
            parent = %parent_id,
            count = sub_tasks.len(),
            "Task plan produced"
        );

        Ok(json!({
            "original_task_content": args.original_task_content,
            "sub_tasks": sub_tasks,
            "replanned": replanned,
        }))
    }

    pub fn decompose_task(&self) -> Arc<dyn Tool> {
        Arc::new(FnTool::new(
            "decompose_task",
            "Break a task into ordered, manageable sub-tasks. Pass the original task content \
             and one entry per sub-task; returns the structured sub-task list.",
            Self::schema(),
            |args| Box::pin(async move { Self::build_sub_tasks(args, "decompose_task", false) }),
        ))
    }

    pub fn replan_tasks(&self) -> Arc<dyn Tool> {
        Arc::new(FnTool::new(
            "replan_tasks",
            "Replace a failed plan with a new approach. Same shape as decompose_task; the \
             returned sub-tasks supersede the previous decomposition.",
            Self::schema(),
            |args| Box::pin(async move { Self::build_sub_tasks(args, "replan_tasks", true) }),
        ))
    }
}

impl Toolkit for TaskPlanningToolkit {
    fn get_tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![self.decompose_task(), self.replan_tasks()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_decompose_assigns_dotted_ids() {
        let toolkit = TaskPlanningToolkit::new();
        let tool = toolkit.decompose_task();

        let out = tool
            .call(json!({
                "original_task_content": "Find a lasagna recipe",
                "sub_task_contents": ["Open the site", "Search for lasagna", "Check ratings"],
            }))
            .await
            .unwrap();

        let subs = out["sub_tasks"].as_array().unwrap();
        assert_eq!(subs.len(), 3);
        assert_eq!(subs[0]["id"], "0.0");
        assert_eq!(subs[2]["id"], "0.2");
        assert_eq!(out["replanned"], false);
    }

    #[tokio::test]
    async fn test_replan_marks_output() {
        let toolkit = TaskPlanningToolkit::new();
        let out = toolkit
            .replan_tasks()
            .call(json!({
                "original_task_content": "Find a recipe",
                "sub_task_contents": ["Try a different search term"],
                "parent_task_id": "0.1",
            }))
            .await
            .unwrap();

        assert_eq!(out["replanned"], true);
        assert_eq!(out["sub_tasks"][0]["id"], "0.1.0");
    }

    #[tokio::test]
    async fn test_empty_plan_rejected() {
        let toolkit = TaskPlanningToolkit::new();
        let result = toolkit
            .decompose_task()
            .call(json!({
                "original_task_content": "Find a recipe",
                "sub_task_contents": [],
            }))
            .await;
        assert!(matches!(result, Err(AgentError::InvalidArguments { .. })));
    }
}
