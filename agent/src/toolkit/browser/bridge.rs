//! Browser bridge process client
//!
//! The toolkit does not drive a browser itself; it spawns a bridge child
//! process and speaks newline-delimited JSON over its stdio:
//!
//!   -> {"id": 1, "action": "visit_page", "params": {"url": "..."}}
//!   <- {"id": 1, "ok": true, "result": {"snapshot": "..."}}
//!
//! Spawn + init are wrapped in a startup timeout, each action in an action
//! timeout. Unlike a spawn-per-call client, one child lives for the whole
//! browser session so tabs and cookies persist between tool calls.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::{AgentError, Result};

/// Default startup timeout for spawning and initializing the bridge
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default per-action timeout
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Command used when the config does not name one
pub const DEFAULT_BRIDGE_COMMAND: &str = "eigent-browser-bridge";

/// How to launch the bridge process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeCommand {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Default for BridgeCommand {
    fn default() -> Self {
        Self {
            command: DEFAULT_BRIDGE_COMMAND.to_string(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    action: &'a str,
    params: &'a Value,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// A live bridge session
pub struct BrowserBridge {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
    action_timeout: Duration,
}

impl BrowserBridge {
    /// Spawn the bridge and send the `init` action with the session
    /// parameters. The whole handshake is bounded by `startup_timeout`.
    pub async fn spawn(
        command: &BridgeCommand,
        init_params: Value,
        startup_timeout: Duration,
        action_timeout: Duration,
    ) -> Result<Self> {
        tracing::debug!(command = %command.command, "Spawning browser bridge");

        let mut cmd = Command::new(&command.command);
        if !command.args.is_empty() {
            cmd.args(&command.args);
        }
        for (key, value) in &command.env {
            let expanded = shellexpand::env(value).unwrap_or_else(|_| value.clone().into());
            cmd.env(key, expanded.as_ref());
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            AgentError::Bridge(format!("failed to spawn '{}': {}", command.command, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentError::Bridge("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Bridge("bridge stdout unavailable".into()))?;

        let mut bridge = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 1,
            action_timeout,
        };

        tokio::time::timeout(startup_timeout, bridge.request_inner("init", &init_params))
            .await
            .map_err(|_| AgentError::BridgeStartupTimeout(startup_timeout))??;

        Ok(bridge)
    }

    /// Run one action against the bridge, bounded by the action timeout
    pub async fn request(&mut self, action: &str, params: &Value) -> Result<Value> {
        let timeout = self.action_timeout;
        tokio::time::timeout(timeout, self.request_inner(action, params))
            .await
            .map_err(|_| AgentError::BridgeActionTimeout {
                action: action.to_string(),
                timeout,
            })?
    }

    async fn request_inner(&mut self, action: &str, params: &Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let request = BridgeRequest { id, action, params };
        let mut line = serde_json::to_string(&request)?;
        line.push('\n');

        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AgentError::Bridge(format!("write failed: {}", e)))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| AgentError::Bridge(format!("flush failed: {}", e)))?;

        // Read until the matching id; the bridge may interleave log lines
        // that are not valid JSON, which we skip.
        let mut buf = String::new();
        loop {
            buf.clear();
            let n = self
                .stdout
                .read_line(&mut buf)
                .await
                .map_err(|e| AgentError::Bridge(format!("read failed: {}", e)))?;
            if n == 0 {
                return Err(AgentError::Bridge("bridge process closed stdout".into()));
            }

            let response: BridgeResponse = match serde_json::from_str(buf.trim()) {
                Ok(r) => r,
                Err(_) => continue,
            };
            if response.id != id {
                tracing::warn!(
                    expected = id,
                    got = response.id,
                    "Out-of-order bridge response dropped"
                );
                continue;
            }

            return if response.ok {
                Ok(response.result)
            } else {
                Err(AgentError::Bridge(
                    response.error.unwrap_or_else(|| "unknown bridge error".into()),
                ))
            };
        }
    }

    /// Ask the bridge to close the browser, then reap the child
    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self.request("close", &Value::Null).await;
        let _ = self.child.kill().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let params = serde_json::json!({"url": "https://example.com"});
        let request = BridgeRequest {
            id: 7,
            action: "visit_page",
            params: &params,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"id\":7"));
        assert!(json.contains("\"action\":\"visit_page\""));
    }

    #[test]
    fn test_response_parsing() {
        let ok: BridgeResponse =
            serde_json::from_str(r#"{"id":1,"ok":true,"result":{"snapshot":"- link [ref=1]"}}"#)
                .unwrap();
        assert!(ok.ok);
        assert_eq!(ok.result["snapshot"], "- link [ref=1]");

        let err: BridgeResponse =
            serde_json::from_str(r#"{"id":2,"ok":false,"error":"no such ref"}"#).unwrap();
        assert!(!err.ok);
        assert_eq!(err.error.as_deref(), Some("no such ref"));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_bridge_error() {
        let command = BridgeCommand {
            command: "/nonexistent/bridge-binary".to_string(),
            ..Default::default()
        };
        let result = BrowserBridge::spawn(
            &command,
            serde_json::json!({}),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(AgentError::Bridge(_))));
    }
}
