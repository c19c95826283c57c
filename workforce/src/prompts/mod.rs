//! System and planning prompts
//!
//! Prompt builders for the demo agents and for the engine's coordinator
//! role (decomposition and replanning).

use std::path::Path;

/// System message for a browsing search agent.
///
/// Grounds the agent in its working directory, the current date, and the
/// rules it must follow while driving the browser.
pub fn search_agent_system_message(working_dir: &Path) -> String {
    format!(
        r#"You are a helpful assistant that can search the web, extract webpage content, simulate browser actions, and provide relevant information to solve the given task.

### Core Rules

1. Before using any browser tool, briefly state what you are about to do and why.
2. Prefer reading the page snapshot over taking screenshots; only request a screenshot when layout matters.
3. When a page offers a search box, use it instead of guessing URLs.
4. Verify extracted facts (ratings, review counts, serving sizes) against the page text before reporting them.
5. If a page fails to load or a step fails twice, report the failure honestly instead of inventing content.
6. When you need clarification that only a human can give, use the ask_human_via_console tool.
7. Report your final findings in plain text with the key facts listed explicitly.

### Environment

- Working directory: `{}` (save any downloaded files here)
- Today's date: {}
- Platform: {}
"#,
        working_dir.display(),
        chrono::Local::now().format("%Y-%m-%d"),
        std::env::consts::OS,
    )
}

/// System message for the planning agent that coordinates the workforce
pub fn planner_system_message() -> String {
    "You are a task planning specialist. You break large goals into small, \
     concrete, independently verifiable steps, and you revise plans when a \
     step fails. Keep plans short: every step must move the goal forward, \
     and no step should require capabilities the workers do not have."
        .to_string()
}

/// Ask the planner to decompose a task into sub-tasks.
///
/// The reply is parsed with [`crate::task::parse_sub_tasks`], so the
/// prompt pins the output to a numbered list.
pub fn decompose_prompt(task_content: &str, worker_descriptions: &[String]) -> String {
    let workers = if worker_descriptions.is_empty() {
        "  (none registered yet)".to_string()
    } else {
        worker_descriptions
            .iter()
            .map(|d| format!("  - {}", d))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"Decompose the following task into sub-tasks that the available workers can execute one at a time, in order.

Task:
{}

Available workers:
{}

Respond with ONLY a numbered list of sub-tasks, one per line, like:
1. First sub-task
2. Second sub-task

Each sub-task must be a single concrete action with a verifiable outcome. Use as few sub-tasks as the task allows."#,
        task_content, workers
    )
}

/// Ask the planner to rewrite one failed sub-task
pub fn replan_prompt(task_content: &str, error: &str) -> String {
    format!(
        r#"The following sub-task failed and needs to be rewritten.

Sub-task:
{}

Failure:
{}

Rewrite the sub-task so a worker can succeed where the previous attempt failed. Respond with ONLY the rewritten sub-task text on a single line, no numbering and no commentary."#,
        task_content, error
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_search_agent_message_mentions_working_dir() {
        let msg = search_agent_system_message(&PathBuf::from("/tmp/working_dir"));
        assert!(msg.contains("/tmp/working_dir"));
        assert!(msg.contains("ask_human_via_console"));
    }

    #[test]
    fn test_decompose_prompt_lists_workers() {
        let prompt = decompose_prompt(
            "Find a recipe",
            &["Search Agent: browses the web".to_string()],
        );
        assert!(prompt.contains("Find a recipe"));
        assert!(prompt.contains("- Search Agent: browses the web"));
        assert!(prompt.contains("numbered list"));
    }

    #[test]
    fn test_replan_prompt_includes_error() {
        let prompt = replan_prompt("Open the site", "navigation timed out");
        assert!(prompt.contains("Open the site"));
        assert!(prompt.contains("navigation timed out"));
    }
}
