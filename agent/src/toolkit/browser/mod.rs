//! Hybrid browser toolkit
//!
//! Exposes browser automation as agent tools. Page state lives in a bridge
//! child process (see `bridge`); snapshots returned to the agent list
//! interactive elements as `[ref=N]` markers that click/type tools accept.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::error::{AgentError, Result};
use crate::toolkit::{require_str, FnTool, Tool, Toolkit};

pub mod bridge;
mod snapshot;

pub use bridge::{BridgeCommand, BrowserBridge, DEFAULT_ACTION_TIMEOUT, DEFAULT_STARTUP_TIMEOUT};
pub use snapshot::{SnapshotTruncator, SNAPSHOT_TOOLS};

/// Every tool this toolkit can expose
pub const ALL_TOOLS: &[&str] = &[
    "browser_open",
    "browser_close",
    "browser_visit_page",
    "browser_back",
    "browser_forward",
    "browser_refresh",
    "browser_click",
    "browser_type",
    "browser_enter",
    "browser_press_key",
    "browser_switch_tab",
    "browser_get_page_snapshot",
    "browser_get_som_screenshot",
    "browser_wait",
];

/// Basic navigation subset enabled when the config lists none
pub const DEFAULT_TOOLS: &[&str] = &[
    "browser_open",
    "browser_close",
    "browser_visit_page",
    "browser_back",
    "browser_forward",
    "browser_click",
    "browser_type",
    "browser_enter",
    "browser_switch_tab",
];

/// Browser session configuration
#[derive(Debug, Clone)]
pub struct BrowserToolkitConfig {
    pub headless: bool,
    /// Identifies this session in bridge logs; one bridge per session
    pub session_id: String,
    /// Tool subset to expose; empty means `DEFAULT_TOOLS`
    pub enabled_tools: Vec<String>,
    pub stealth: bool,
    /// Limit snapshots to the visible viewport
    pub viewport_limit: bool,
    pub browser_log_to_file: bool,
    /// Directory for browser profile and logs
    pub cache_dir: Option<PathBuf>,
    /// Page opened by `browser_open` when no url is given
    pub default_start_url: String,
    pub bridge_command: BridgeCommand,
}

impl Default for BrowserToolkitConfig {
    fn default() -> Self {
        Self {
            headless: true,
            session_id: "default".to_string(),
            enabled_tools: Vec::new(),
            stealth: false,
            viewport_limit: false,
            browser_log_to_file: false,
            cache_dir: None,
            default_start_url: "about:blank".to_string(),
            bridge_command: BridgeCommand::default(),
        }
    }
}

impl BrowserToolkitConfig {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_enabled_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled_tools = tools.into_iter().map(|s| s.into()).collect();
        self
    }

    pub fn with_stealth(mut self, stealth: bool) -> Self {
        self.stealth = stealth;
        self
    }

    pub fn with_viewport_limit(mut self, viewport_limit: bool) -> Self {
        self.viewport_limit = viewport_limit;
        self
    }

    pub fn with_log_to_file(mut self, log_to_file: bool) -> Self {
        self.browser_log_to_file = log_to_file;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_default_start_url(mut self, url: impl Into<String>) -> Self {
        self.default_start_url = url.into();
        self
    }

    pub fn with_bridge_command(mut self, command: BridgeCommand) -> Self {
        self.bridge_command = command;
        self
    }
}

struct BrowserSession {
    config: BrowserToolkitConfig,
    bridge: Mutex<Option<BrowserBridge>>,
}

impl BrowserSession {
    fn init_params(&self) -> Value {
        json!({
            "session_id": self.config.session_id,
            "headless": self.config.headless,
            "stealth": self.config.stealth,
            "viewport_limit": self.config.viewport_limit,
            "log_to_file": self.config.browser_log_to_file,
            "cache_dir": self.config.cache_dir.as_ref().map(|p| p.display().to_string()),
        })
    }

    /// Run an action, spawning the bridge on first use
    async fn request(&self, action: &str, params: Value) -> Result<Value> {
        let mut guard = self.bridge.lock().await;
        if guard.is_none() {
            let bridge = BrowserBridge::spawn(
                &self.config.bridge_command,
                self.init_params(),
                DEFAULT_STARTUP_TIMEOUT,
                DEFAULT_ACTION_TIMEOUT,
            )
            .await?;
            tracing::info!(session = %self.config.session_id, "Browser bridge started");
            *guard = Some(bridge);
        }

        let bridge = guard.as_mut().expect("bridge just initialized");
        bridge.request(action, &params).await
    }

    async fn close(&self) -> Result<Value> {
        let mut guard = self.bridge.lock().await;
        match guard.take() {
            Some(bridge) => {
                bridge.shutdown().await?;
                tracing::info!(session = %self.config.session_id, "Browser bridge closed");
                Ok(json!("Browser session closed."))
            }
            None => Ok(json!("Browser session was not open.")),
        }
    }
}

/// Browser automation toolkit backed by a bridge process
pub struct BrowserToolkit {
    session: Arc<BrowserSession>,
    enabled: Vec<String>,
}

impl BrowserToolkit {
    /// Build the toolkit, validating the enabled-tool subset
    pub fn new(config: BrowserToolkitConfig) -> Result<Self> {
        let enabled: Vec<String> = if config.enabled_tools.is_empty() {
            DEFAULT_TOOLS.iter().map(|s| s.to_string()).collect()
        } else {
            config.enabled_tools.clone()
        };

        for name in &enabled {
            if !ALL_TOOLS.contains(&name.as_str()) {
                return Err(AgentError::ToolNotFound(name.clone()));
            }
        }

        Ok(Self {
            session: Arc::new(BrowserSession {
                config,
                bridge: Mutex::new(None),
            }),
            enabled,
        })
    }

    /// Names of the tools this instance exposes
    pub fn enabled_tools(&self) -> &[String] {
        &self.enabled
    }

    fn make_tool(&self, name: &str) -> Arc<dyn Tool> {
        let session = Arc::clone(&self.session);
        let (description, parameters) = tool_definition(name);

        match name {
            "browser_open" => Arc::new(FnTool::new(name, description, parameters, move |args| {
                let session = Arc::clone(&session);
                Box::pin(async move {
                    let url = args
                        .get("url")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| session.config.default_start_url.clone());
                    session.request("visit_page", json!({ "url": url })).await
                })
            })),
            "browser_close" => Arc::new(FnTool::new(name, description, parameters, move |_args| {
                let session = Arc::clone(&session);
                Box::pin(async move { session.close().await })
            })),
            "browser_visit_page" => {
                Arc::new(FnTool::new(name, description, parameters, move |args| {
                    let session = Arc::clone(&session);
                    Box::pin(async move {
                        let url = require_str(&args, "url", "browser_visit_page")?;
                        session.request("visit_page", json!({ "url": url })).await
                    })
                }))
            }
            "browser_click" => Arc::new(FnTool::new(name, description, parameters, move |args| {
                let session = Arc::clone(&session);
                Box::pin(async move {
                    let element_ref = require_str(&args, "ref", "browser_click")?;
                    session.request("click", json!({ "ref": element_ref })).await
                })
            })),
            "browser_type" => Arc::new(FnTool::new(name, description, parameters, move |args| {
                let session = Arc::clone(&session);
                Box::pin(async move {
                    let element_ref = require_str(&args, "ref", "browser_type")?;
                    let text = require_str(&args, "text", "browser_type")?;
                    session
                        .request("type", json!({ "ref": element_ref, "text": text }))
                        .await
                })
            })),
            "browser_press_key" => {
                Arc::new(FnTool::new(name, description, parameters, move |args| {
                    let session = Arc::clone(&session);
                    Box::pin(async move {
                        let key = require_str(&args, "key", "browser_press_key")?;
                        session.request("press_key", json!({ "key": key })).await
                    })
                }))
            }
            "browser_switch_tab" => {
                Arc::new(FnTool::new(name, description, parameters, move |args| {
                    let session = Arc::clone(&session);
                    Box::pin(async move {
                        let tab_id = require_str(&args, "tab_id", "browser_switch_tab")?;
                        session.request("switch_tab", json!({ "tab_id": tab_id })).await
                    })
                }))
            }
            "browser_wait" => Arc::new(FnTool::new(name, description, parameters, move |args| {
                let session = Arc::clone(&session);
                Box::pin(async move {
                    let seconds = args.get("seconds").and_then(|v| v.as_f64()).unwrap_or(1.0);
                    session.request("wait", json!({ "seconds": seconds })).await
                })
            })),
            // Parameterless navigation and snapshot actions
            other => {
                let action = other.trim_start_matches("browser_").to_string();
                Arc::new(FnTool::new(name, description, parameters, move |_args| {
                    let session = Arc::clone(&session);
                    let action = action.clone();
                    Box::pin(async move { session.request(&action, json!({})).await })
                }))
            }
        }
    }
}

impl Toolkit for BrowserToolkit {
    fn get_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.enabled.iter().map(|name| self.make_tool(name)).collect()
    }
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Description and argument schema per tool name
fn tool_definition(name: &str) -> (&'static str, Value) {
    match name {
        "browser_open" => (
            "Open the browser at the configured start page (or the given url) and return a page snapshot.",
            object_schema(json!({"url": {"type": "string", "description": "Optional url to open instead of the start page"}}), &[]),
        ),
        "browser_close" => (
            "Close the browser session and release its resources.",
            object_schema(json!({}), &[]),
        ),
        "browser_visit_page" => (
            "Navigate the current tab to a url and return a snapshot of visible interactive elements.",
            object_schema(json!({"url": {"type": "string", "description": "Absolute url to visit"}}), &["url"]),
        ),
        "browser_back" => (
            "Go back one page in history and return a snapshot.",
            object_schema(json!({}), &[]),
        ),
        "browser_forward" => (
            "Go forward one page in history and return a snapshot.",
            object_schema(json!({}), &[]),
        ),
        "browser_refresh" => (
            "Reload the current page and return a snapshot.",
            object_schema(json!({}), &[]),
        ),
        "browser_click" => (
            "Click the element with the given snapshot ref and return the resulting snapshot.",
            object_schema(json!({"ref": {"type": "string", "description": "Element ref from the latest snapshot, e.g. \"12\""}}), &["ref"]),
        ),
        "browser_type" => (
            "Type text into the element with the given snapshot ref.",
            object_schema(json!({
                "ref": {"type": "string", "description": "Element ref from the latest snapshot"},
                "text": {"type": "string", "description": "Text to type"}
            }), &["ref", "text"]),
        ),
        "browser_enter" => (
            "Press Enter in the focused element, submitting forms or confirming a search.",
            object_schema(json!({}), &[]),
        ),
        "browser_press_key" => (
            "Press a single key (e.g. \"Escape\", \"Tab\") in the current page.",
            object_schema(json!({"key": {"type": "string", "description": "Key name"}}), &["key"]),
        ),
        "browser_switch_tab" => (
            "Switch to another open tab by id.",
            object_schema(json!({"tab_id": {"type": "string", "description": "Tab id from a snapshot"}}), &["tab_id"]),
        ),
        "browser_get_page_snapshot" => (
            "Return a fresh textual snapshot of the current page's interactive elements.",
            object_schema(json!({}), &[]),
        ),
        "browser_get_som_screenshot" => (
            "Take a set-of-marks screenshot for visual layout analysis. Heavy; use only when text snapshots are not enough.",
            object_schema(json!({}), &[]),
        ),
        "browser_wait" => (
            "Wait for the page to settle before the next action.",
            object_schema(json!({"seconds": {"type": "number", "description": "Seconds to wait (default 1)"}}), &[]),
        ),
        other => unreachable!("unknown browser tool '{}'", other),
    }
}
