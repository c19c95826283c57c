//! Snapshot truncation for browser tool results
//!
//! Page snapshots are large and browser-heavy conversations accumulate one
//! per tool call. The truncator shortens snapshots *as they are recorded
//! into agent memory*; the current snapshot handed to the model on the
//! in-flight request is never touched.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// Tools whose results carry page snapshots
pub const SNAPSHOT_TOOLS: &[&str] = &[
    "browser_open",
    "browser_visit_page",
    "browser_back",
    "browser_forward",
    "browser_refresh",
    "browser_click",
    "browser_type",
    "browser_enter",
    "browser_press_key",
    "browser_get_page_snapshot",
    "browser_get_som_screenshot",
    "browser_wait",
];

const DEFAULT_MAX_LINES: usize = 10;
const DEFAULT_TRUNCATION_MESSAGE: &str =
    "... [snapshot truncated to {lines} lines for context history] ...";

fn ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[ref=\d+\]").expect("valid regex"))
}

/// Truncates browser snapshots in recorded tool results
#[derive(Debug, Clone)]
pub struct SnapshotTruncator {
    max_snapshot_lines: usize,
    truncation_message: String,
    enabled_for_tools: HashSet<String>,
}

impl Default for SnapshotTruncator {
    fn default() -> Self {
        Self {
            max_snapshot_lines: DEFAULT_MAX_LINES,
            truncation_message: DEFAULT_TRUNCATION_MESSAGE.to_string(),
            enabled_for_tools: SNAPSHOT_TOOLS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SnapshotTruncator {
    pub fn new(max_snapshot_lines: usize) -> Self {
        Self {
            max_snapshot_lines,
            ..Default::default()
        }
    }

    /// Restrict truncation to an explicit tool list
    pub fn with_enabled_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled_for_tools = tools.into_iter().map(|s| s.into()).collect();
        self
    }

    pub fn with_truncation_message(mut self, message: impl Into<String>) -> Self {
        self.truncation_message = message.into();
        self
    }

    /// Keep the first `max_snapshot_lines` lines and append the marker.
    /// Content that already fits is returned unchanged.
    pub fn truncate_snapshot(&self, content: &str) -> String {
        let lines: Vec<&str> = content.split('\n').collect();
        if lines.len() <= self.max_snapshot_lines {
            return content.to_string();
        }

        let mut kept: Vec<&str> = lines[..self.max_snapshot_lines].to_vec();
        let marker = self
            .truncation_message
            .replace("{lines}", &self.max_snapshot_lines.to_string());
        kept.push(&marker);
        kept.join("\n")
    }

    /// Whether a string result looks like a page snapshot
    pub fn is_snapshot_result(&self, result: &str) -> bool {
        ref_pattern().is_match(result)
    }

    /// Truncate a tool result when the tool is enabled and the result is
    /// snapshot-shaped: either a bare string containing element refs, or an
    /// object with a `snapshot` key.
    pub fn truncate_result(&self, result: &serde_json::Value, tool_name: &str) -> serde_json::Value {
        if !self.enabled_for_tools.contains(tool_name) {
            return result.clone();
        }

        match result {
            serde_json::Value::String(s) if self.is_snapshot_result(s) => {
                serde_json::Value::String(self.truncate_snapshot(s))
            }
            serde_json::Value::Object(map) if map.contains_key("snapshot") => {
                let mut truncated = map.clone();
                if let Some(serde_json::Value::String(s)) = map.get("snapshot") {
                    truncated.insert(
                        "snapshot".to_string(),
                        serde_json::Value::String(self.truncate_snapshot(s)),
                    );
                }
                serde_json::Value::Object(truncated)
            }
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_of(lines: usize) -> String {
        (0..lines)
            .map(|i| format!("- link \"Item {}\" [ref={}]", i, i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_short_snapshot_untouched() {
        let truncator = SnapshotTruncator::default();
        let content = snapshot_of(5);
        assert_eq!(truncator.truncate_snapshot(&content), content);
    }

    #[test]
    fn test_long_snapshot_truncated() {
        let truncator = SnapshotTruncator::new(10);
        let content = snapshot_of(50);
        let truncated = truncator.truncate_snapshot(&content);

        let lines: Vec<&str> = truncated.split('\n').collect();
        assert_eq!(lines.len(), 11); // 10 kept + marker
        assert!(lines[10].contains("truncated to 10 lines"));
        assert!(lines[0].contains("[ref=0]"));
    }

    #[test]
    fn test_snapshot_detection() {
        let truncator = SnapshotTruncator::default();
        assert!(truncator.is_snapshot_result("- button \"Search\" [ref=12]"));
        assert!(!truncator.is_snapshot_result("Message sent to user"));
    }

    #[test]
    fn test_truncate_result_respects_tool_list() {
        let truncator = SnapshotTruncator::new(2);
        let snapshot = serde_json::Value::String(snapshot_of(10));

        // Enabled tool: truncated
        let out = truncator.truncate_result(&snapshot, "browser_click");
        assert!(out.as_str().unwrap().contains("truncated"));

        // Non-browser tool: untouched even with ref markers
        let out = truncator.truncate_result(&snapshot, "ask_human_via_console");
        assert_eq!(out, snapshot);
    }

    #[test]
    fn test_truncate_object_snapshot_key() {
        let truncator = SnapshotTruncator::new(3);
        let result = serde_json::json!({
            "status": "ok",
            "snapshot": snapshot_of(10),
        });

        let out = truncator.truncate_result(&result, "browser_visit_page");
        assert_eq!(out["status"], "ok");
        assert!(out["snapshot"].as_str().unwrap().contains("truncated"));
    }
}
