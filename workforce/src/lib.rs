//! Multi-agent workforce orchestration
//!
//! This crate provides:
//! - Task primitives with decomposition into dotted sub-task ids
//! - Workers wrapping chat agents
//! - The `Workforce` engine: decompose, assign, execute with timeouts,
//!   replan on failure
//! - A run logger exposing a log tree, KPIs, and JSON dumps
//!
//! # Example
//!
//! ```rust,ignore
//! use workforce::{Task, Workforce, WorkforceConfig};
//!
//! let mut workforce = Workforce::new("A workforce", Box::new(planner), WorkforceConfig::default());
//! workforce.add_single_agent_worker("Search Agent: expert web researcher", search_agent);
//!
//! let task = Task::new("Find a vegetarian lasagna recipe", "0");
//! let result = workforce.process_task_async(task).await?;
//! println!("{}", workforce.log_tree());
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod logger;
pub mod prompts;
pub mod task;
pub mod worker;

pub use config::{working_directory, WorkforceFileConfig};
pub use engine::{Planner, Workforce, WorkforceConfig};
pub use error::WorkforceError;
pub use logger::{WorkforceEvent, WorkforceLogger};
pub use task::{Task, TaskState};
pub use worker::{SingleAgentWorker, Worker};

/// Re-export commonly used types from the agent crate
pub use agent::{AgentError, ChatAgent, ModelConfig, ModelFactory, ModelPlatform};
