//! Human-in-the-loop console toolkit
//!
//! Lets an agent escalate to the person at the terminal: print a question,
//! block on one line of input, hand the answer back to the model. Used for
//! CAPTCHAs, logins, and anything else the agent cannot do alone.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use serde_json::json;

use crate::error::{AgentError, Result};
use crate::toolkit::{require_str, FnTool, Tool, Toolkit};

/// Console escalation toolkit
#[derive(Debug, Clone, Default)]
pub struct HumanToolkit;

impl HumanToolkit {
    pub fn new() -> Self {
        Self
    }

    /// The `ask_human_via_console` tool as a standalone handle, matching
    /// how callers register it next to other toolkits' tools.
    pub fn ask_human_via_console(&self) -> Arc<dyn Tool> {
        Arc::new(FnTool::new(
            "ask_human_via_console",
            "Ask the human user a question on the console and wait for their typed reply. \
             Use this when you are stuck, e.g. on verification challenges like CAPTCHAs or logins.",
            json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "The question to put to the user"
                    }
                },
                "required": ["question"],
            }),
            |args| {
                Box::pin(async move {
                    let question = require_str(&args, "question", "ask_human_via_console")?;
                    let answer = ask_on_console(question).await?;
                    Ok(json!(answer))
                })
            },
        ))
    }
}

impl Toolkit for HumanToolkit {
    fn get_tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![self.ask_human_via_console()]
    }
}

/// Prompt on stdout and read one line from stdin. Console I/O is blocking,
/// so it runs on the blocking pool to keep the runtime free.
async fn ask_on_console(question: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        println!("\n{}", "─".repeat(60));
        println!("  AGENT QUESTION");
        println!("{}\n", "─".repeat(60));
        println!("{}\n", question);
        print!("Your answer: ");
        stdout.flush()?;

        let mut answer = String::new();
        stdin.lock().read_line(&mut answer)?;
        Ok(answer.trim().to_string())
    })
    .await
    .map_err(|e| AgentError::ToolFailed {
        name: "ask_human_via_console".to_string(),
        message: e.to_string(),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::Toolkit;

    #[test]
    fn test_toolkit_exposes_single_tool() {
        let toolkit = HumanToolkit::new();
        let tools = toolkit.get_tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "ask_human_via_console");
    }

    #[test]
    fn test_question_is_required() {
        let toolkit = HumanToolkit::new();
        let schema = toolkit.get_tools()[0].parameters();
        assert_eq!(schema["required"][0], "question");
    }
}
