//! Task primitives
//!
//! A task is a unit of work flowing through the workforce. The root task
//! is what the caller submits; decomposition produces sub-tasks with
//! dotted ids (`0.0`, `0.1`, ...) under it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Open,
    Assigned,
    Running,
    Done,
    Failed,
}

impl TaskState {
    /// Glyph used in log tree rendering
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Open => "○",
            Self::Assigned => "◌",
            Self::Running => "◐",
            Self::Done => "✔",
            Self::Failed => "✘",
        }
    }
}

/// A unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub content: String,
    pub state: TaskState,
    /// Final output once the task reaches Done
    pub result: Option<String>,
    /// How many times execution has failed so far
    pub failure_count: u32,
    pub parent_id: Option<String>,
    pub subtask_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(content: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            state: TaskState::Open,
            result: None,
            failure_count: 0,
            parent_id: None,
            subtask_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Create the `index`-th sub-task of `parent` and link it
    pub fn subtask(parent: &mut Task, index: usize, content: impl Into<String>) -> Self {
        let id = format!("{}.{}", parent.id, index);
        parent.subtask_ids.push(id.clone());
        Self {
            parent_id: Some(parent.id.clone()),
            ..Self::new(content, id)
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, TaskState::Done | TaskState::Failed)
    }
}

/// Extract sub-task contents from a planner reply.
///
/// Accepts numbered lists (`1.`, `2)`) and bullets (`-`, `*`); anything
/// else is ignored. Returns the items in order.
pub fn parse_sub_tasks(reply: &str) -> Vec<String> {
    let mut items = Vec::new();

    for line in reply.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let item = if let Some(rest) = trimmed.strip_prefix("- ") {
            Some(rest)
        } else if let Some(rest) = trimmed.strip_prefix("* ") {
            Some(rest)
        } else {
            numbered_item(trimmed)
        };

        if let Some(content) = item {
            let content = content.trim();
            if !content.is_empty() {
                items.push(content.to_string());
            }
        }
    }

    items
}

/// Match `N. content` or `N) content`
fn numbered_item(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtask_ids_are_dotted() {
        let mut root = Task::new("Find a recipe", "0");
        let sub0 = Task::subtask(&mut root, 0, "Open the site");
        let sub1 = Task::subtask(&mut root, 1, "Search");

        assert_eq!(sub0.id, "0.0");
        assert_eq!(sub1.id, "0.1");
        assert_eq!(root.subtask_ids, ["0.0", "0.1"]);
        assert_eq!(sub0.parent_id.as_deref(), Some("0"));
    }

    #[test]
    fn test_parse_numbered_list() {
        let reply = "Here is my plan:\n\n1. Visit allrecipes.com\n2. Search for vegetarian lasagna\n3) Check ratings and reviews\n\nGood luck!";
        let items = parse_sub_tasks(reply);
        assert_eq!(
            items,
            [
                "Visit allrecipes.com",
                "Search for vegetarian lasagna",
                "Check ratings and reviews"
            ]
        );
    }

    #[test]
    fn test_parse_bulleted_list() {
        let reply = "- open the page\n* type the query\nnot a list item";
        let items = parse_sub_tasks(reply);
        assert_eq!(items, ["open the page", "type the query"]);
    }

    #[test]
    fn test_parse_empty_reply() {
        assert!(parse_sub_tasks("I cannot plan this.").is_empty());
    }

    #[test]
    fn test_task_serialization() {
        let task = Task::new("Find a recipe", "0");
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"state\":\"open\""));
    }
}
