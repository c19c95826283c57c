//! Workforce engine
//!
//! Coordinates a run: decompose the submitted task into sub-tasks via the
//! planner, assign each sub-task to the best-matching worker, execute with
//! a per-task timeout, replan failed sub-tasks up to a retry limit, and
//! compose the final result.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use agent::ChatAgent;

use crate::error::{Result, WorkforceError};
use crate::logger::{WorkforceEvent, WorkforceLogger};
use crate::prompts;
use crate::task::{parse_sub_tasks, Task, TaskState};
use crate::worker::{SingleAgentWorker, Worker};

// ============================================================================
// Planner
// ============================================================================

/// Produces and revises plans for the engine.
///
/// The engine only talks to this trait; production uses a planning chat
/// agent, tests use scripted planners.
#[async_trait]
pub trait Planner: Send {
    /// Break a task into an ordered list of sub-task contents
    async fn decompose(&mut self, task: &Task, worker_descriptions: &[String])
        -> Result<Vec<String>>;

    /// Rewrite one failed sub-task so the next attempt can succeed
    async fn replan(&mut self, task: &Task, error: &str) -> Result<String>;
}

#[async_trait]
impl Planner for ChatAgent {
    async fn decompose(
        &mut self,
        task: &Task,
        worker_descriptions: &[String],
    ) -> Result<Vec<String>> {
        let prompt = prompts::decompose_prompt(&task.content, worker_descriptions);
        let reply = self.step(&prompt).await?;
        Ok(parse_sub_tasks(&reply))
    }

    async fn replan(&mut self, task: &Task, error: &str) -> Result<String> {
        let prompt = prompts::replan_prompt(&task.content, error);
        let reply = self.step(&prompt).await?;
        let rewritten = reply
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("")
            .to_string();
        if rewritten.is_empty() {
            return Err(WorkforceError::Decomposition(
                "planner returned an empty replan".to_string(),
            ));
        }
        Ok(rewritten)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Runtime knobs for a workforce
#[derive(Debug, Clone)]
pub struct WorkforceConfig {
    /// How long shutdown waits for each worker to release resources
    pub graceful_shutdown_timeout: Duration,

    /// Wall-clock limit for one sub-task execution
    pub task_timeout: Duration,

    /// Pass results of earlier sub-tasks as context to later ones
    pub share_memory: bool,

    /// How many times a failing sub-task is replanned before giving up
    pub max_task_retries: u32,
}

impl Default for WorkforceConfig {
    fn default() -> Self {
        Self {
            graceful_shutdown_timeout: Duration::from_secs(15),
            task_timeout: Duration::from_secs(900),
            share_memory: false,
            max_task_retries: 3,
        }
    }
}

impl WorkforceConfig {
    pub fn with_graceful_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_shutdown_timeout = timeout;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_share_memory(mut self, share: bool) -> Self {
        self.share_memory = share;
        self
    }

    pub fn with_max_task_retries(mut self, retries: u32) -> Self {
        self.max_task_retries = retries;
        self
    }
}

// ============================================================================
// Engine
// ============================================================================

/// A team of workers coordinated by a planner
pub struct Workforce {
    description: String,
    planner: Box<dyn Planner>,
    workers: Vec<Box<dyn Worker>>,
    config: WorkforceConfig,
    logger: WorkforceLogger,
}

impl Workforce {
    pub fn new(
        description: impl Into<String>,
        planner: Box<dyn Planner>,
        config: WorkforceConfig,
    ) -> Self {
        let description = description.into();
        Self {
            logger: WorkforceLogger::new(&description),
            description,
            planner,
            workers: Vec::new(),
            config,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Register a worker. The first sentence of its description drives
    /// sub-task assignment.
    pub fn add_worker(&mut self, worker: Box<dyn Worker>) -> &mut Self {
        self.logger.record(WorkforceEvent::WorkerCreated {
            worker: worker_name(worker.description()),
            description: worker.description().to_string(),
        });
        self.workers.push(worker);
        self
    }

    /// Convenience wrapper for the common single-agent case
    pub fn add_single_agent_worker(
        &mut self,
        description: impl Into<String>,
        agent: ChatAgent,
    ) -> &mut Self {
        self.add_worker(Box::new(SingleAgentWorker::new(description, agent)))
    }

    /// Run one task end to end.
    ///
    /// Decomposes the task, executes each sub-task in order (with replan
    /// retries on failure), and returns the composed result. A sub-task
    /// that exhausts its retries is marked failed and the run continues;
    /// the root task succeeds if at least one sub-task does.
    pub async fn process_task_async(&mut self, mut task: Task) -> Result<String> {
        if self.workers.is_empty() {
            return Err(WorkforceError::NoWorkers);
        }

        tracing::info!(task = %task.id, "Workforce processing task");
        self.logger.record(WorkforceEvent::TaskCreated {
            task_id: task.id.clone(),
            content: task.content.clone(),
        });

        let mut sub_tasks = self.decompose_task(&mut task).await;
        let descriptions: Vec<String> = self
            .workers
            .iter()
            .map(|w| w.description().to_string())
            .collect();

        let mut completed: Vec<(String, String)> = Vec::new();

        for sub_task in &mut sub_tasks {
            let worker_idx = select_worker(&descriptions, &sub_task.content);
            let worker_label = worker_name(&descriptions[worker_idx]);

            self.logger.record(WorkforceEvent::TaskAssigned {
                task_id: sub_task.id.clone(),
                worker: worker_label.clone(),
            });
            sub_task.state = TaskState::Assigned;

            self.execute_with_retries(sub_task, worker_idx, &worker_label, &mut completed)
                .await;
        }

        let final_result = compose_result(&sub_tasks);
        let succeeded = sub_tasks.iter().any(|t| t.state == TaskState::Done);

        if succeeded {
            task.state = TaskState::Done;
            task.result = Some(final_result.clone());
            self.logger.record(WorkforceEvent::TaskCompleted {
                task_id: task.id.clone(),
                worker: self.description.clone(),
                duration_ms: elapsed_ms(&task),
            });
        } else {
            task.state = TaskState::Failed;
            self.logger.record(WorkforceEvent::TaskFailed {
                task_id: task.id.clone(),
                worker: self.description.clone(),
                error: "all sub-tasks failed".to_string(),
                failure_count: task.failure_count,
            });
        }

        Ok(final_result)
    }

    /// Decompose via the planner, falling back to a single sub-task
    /// carrying the original content when planning fails or yields
    /// nothing usable.
    async fn decompose_task(&mut self, task: &mut Task) -> Vec<Task> {
        let descriptions: Vec<String> = self
            .workers
            .iter()
            .map(|w| w.description().to_string())
            .collect();

        let contents = match self.planner.decompose(task, &descriptions).await {
            Ok(items) if !items.is_empty() => items,
            Ok(_) => {
                tracing::warn!(task = %task.id, "Planner produced no sub-tasks, executing as-is");
                vec![task.content.clone()]
            }
            Err(e) => {
                tracing::warn!(task = %task.id, error = %e, "Decomposition failed, executing as-is");
                vec![task.content.clone()]
            }
        };

        let sub_tasks: Vec<Task> = contents
            .into_iter()
            .enumerate()
            .map(|(i, content)| Task::subtask(task, i, content))
            .collect();

        for sub_task in &sub_tasks {
            self.logger.record(WorkforceEvent::TaskCreated {
                task_id: sub_task.id.clone(),
                content: sub_task.content.clone(),
            });
        }
        self.logger.record(WorkforceEvent::TaskDecomposed {
            parent_id: task.id.clone(),
            sub_task_ids: sub_tasks.iter().map(|t| t.id.clone()).collect(),
        });

        sub_tasks
    }

    async fn execute_with_retries(
        &mut self,
        sub_task: &mut Task,
        worker_idx: usize,
        worker_label: &str,
        completed: &mut Vec<(String, String)>,
    ) {
        loop {
            self.logger.record(WorkforceEvent::TaskStarted {
                task_id: sub_task.id.clone(),
                worker: worker_label.to_string(),
            });
            sub_task.state = TaskState::Running;

            let context = if self.config.share_memory {
                shared_context(completed)
            } else {
                String::new()
            };

            let started = Instant::now();
            let worker = &mut self.workers[worker_idx];
            let outcome =
                tokio::time::timeout(self.config.task_timeout, worker.process(sub_task, &context))
                    .await;

            let error = match outcome {
                Ok(Ok(result)) => {
                    sub_task.state = TaskState::Done;
                    sub_task.result = Some(result.clone());
                    self.logger.record(WorkforceEvent::TaskCompleted {
                        task_id: sub_task.id.clone(),
                        worker: worker_label.to_string(),
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                    completed.push((sub_task.id.clone(), result));
                    return;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => WorkforceError::TaskTimeout {
                    task_id: sub_task.id.clone(),
                    seconds: self.config.task_timeout.as_secs(),
                }
                .to_string(),
            };

            sub_task.failure_count += 1;
            tracing::warn!(
                task = %sub_task.id,
                failure_count = sub_task.failure_count,
                error = %error,
                "Sub-task failed"
            );
            self.logger.record(WorkforceEvent::TaskFailed {
                task_id: sub_task.id.clone(),
                worker: worker_label.to_string(),
                error: error.clone(),
                failure_count: sub_task.failure_count,
            });

            if sub_task.failure_count > self.config.max_task_retries {
                sub_task.state = TaskState::Failed;
                return;
            }

            match self.planner.replan(sub_task, &error).await {
                Ok(new_content) => {
                    sub_task.content = new_content.clone();
                    sub_task.state = TaskState::Open;
                    self.logger.record(WorkforceEvent::TaskReplanned {
                        task_id: sub_task.id.clone(),
                        new_content,
                    });
                }
                Err(e) => {
                    tracing::warn!(task = %sub_task.id, error = %e, "Replan failed, retrying as-is");
                    sub_task.state = TaskState::Open;
                }
            }
        }
    }

    /// Shut down all workers, each bounded by the graceful timeout
    pub async fn shutdown(&mut self) {
        for worker in &mut self.workers {
            let name = worker_name(worker.description());
            match tokio::time::timeout(self.config.graceful_shutdown_timeout, worker.shutdown())
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(worker = %name, error = %e, "Worker shutdown failed"),
                Err(_) => tracing::warn!(worker = %name, "Worker shutdown timed out"),
            }
        }
    }

    pub fn log_tree(&self) -> String {
        self.logger.log_tree()
    }

    pub fn kpis(&self) -> std::collections::BTreeMap<String, serde_json::Value> {
        self.logger.kpis()
    }

    pub fn dump_logs(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        self.logger.dump_to_file(path)
    }

    pub fn logger(&self) -> &WorkforceLogger {
        &self.logger
    }
}

/// The name part of a `Name: details` worker description
fn worker_name(description: &str) -> String {
    description
        .split(':')
        .next()
        .unwrap_or(description)
        .trim()
        .to_string()
}

/// Pick the worker whose description shares the most words with the task.
/// Falls back to the first worker when nothing overlaps.
fn select_worker(descriptions: &[String], task_content: &str) -> usize {
    if descriptions.len() == 1 {
        return 0;
    }

    let task_words: Vec<String> = words(task_content);
    let mut best = 0;
    let mut best_score = 0usize;

    for (i, description) in descriptions.iter().enumerate() {
        let desc_words = words(description);
        let score = task_words
            .iter()
            .filter(|w| desc_words.contains(w))
            .count();
        if score > best_score {
            best = i;
            best_score = score;
        }
    }
    best
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(|w| w.to_lowercase())
        .collect()
}

fn shared_context(completed: &[(String, String)]) -> String {
    completed
        .iter()
        .map(|(id, result)| format!("[{}] {}", id, result))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join sub-task results into the final answer, noting failures
fn compose_result(sub_tasks: &[Task]) -> String {
    sub_tasks
        .iter()
        .map(|t| match (&t.state, &t.result) {
            (TaskState::Done, Some(result)) => format!("[{}] {}", t.id, result),
            _ => format!("[{}] (failed: {})", t.id, t.content),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn elapsed_ms(task: &Task) -> u64 {
    (chrono::Utc::now() - task.created_at)
        .num_milliseconds()
        .max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedPlanner {
        sub_tasks: Vec<String>,
        replans: Vec<String>,
    }

    #[async_trait]
    impl Planner for ScriptedPlanner {
        async fn decompose(&mut self, _task: &Task, _workers: &[String]) -> Result<Vec<String>> {
            Ok(self.sub_tasks.clone())
        }

        async fn replan(&mut self, _task: &Task, _error: &str) -> Result<String> {
            self.replans
                .pop()
                .ok_or_else(|| WorkforceError::Decomposition("out of replans".to_string()))
        }
    }

    /// Fails the first `failures` calls, then succeeds
    struct FlakyWorker {
        description: String,
        failures: u32,
        calls: u32,
    }

    #[async_trait]
    impl Worker for FlakyWorker {
        fn description(&self) -> &str {
            &self.description
        }

        async fn process(&mut self, task: &Task, _context: &str) -> Result<String> {
            self.calls += 1;
            if self.calls <= self.failures {
                return Err(WorkforceError::Decomposition("boom".to_string()));
            }
            Ok(format!("done: {}", task.content))
        }
    }

    fn workforce_with(planner: ScriptedPlanner, worker: FlakyWorker) -> Workforce {
        let mut wf = Workforce::new(
            "A workforce",
            Box::new(planner),
            WorkforceConfig::default().with_max_task_retries(2),
        );
        wf.add_worker(Box::new(worker));
        wf
    }

    #[tokio::test]
    async fn test_happy_path_composes_results() {
        let planner = ScriptedPlanner {
            sub_tasks: vec!["open the site".into(), "search".into()],
            replans: vec![],
        };
        let worker = FlakyWorker {
            description: "Search Agent: an expert web researcher".into(),
            failures: 0,
            calls: 0,
        };
        let mut wf = workforce_with(planner, worker);

        let result = wf
            .process_task_async(Task::new("Find a recipe", "0"))
            .await
            .unwrap();

        assert!(result.contains("[0.0] done: open the site"));
        assert!(result.contains("[0.1] done: search"));
        assert_eq!(wf.kpis()["completed_sub_tasks"], 2);
        assert_eq!(wf.kpis()["success_rate"], "100.0%");
    }

    #[tokio::test]
    async fn test_replan_then_succeed() {
        let planner = ScriptedPlanner {
            sub_tasks: vec!["open the site".into()],
            replans: vec!["open the site with a different browser".into()],
        };
        let worker = FlakyWorker {
            description: "Search Agent: browses".into(),
            failures: 1,
            calls: 0,
        };
        let mut wf = workforce_with(planner, worker);

        let result = wf
            .process_task_async(Task::new("Find a recipe", "0"))
            .await
            .unwrap();

        assert!(result.contains("different browser"));
        assert_eq!(wf.kpis()["replanned_sub_tasks"], 1);
        assert_eq!(wf.kpis()["completed_sub_tasks"], 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_marks_failed_and_continues() {
        let planner = ScriptedPlanner {
            sub_tasks: vec!["impossible step".into(), "easy step".into()],
            replans: vec!["try again".into(); 5],
        };
        let worker = FlakyWorker {
            description: "Search Agent: browses".into(),
            // First sub-task burns 1 + 2 retries, second succeeds on call 4
            failures: 3,
            calls: 0,
        };
        let mut wf = workforce_with(planner, worker);

        let result = wf
            .process_task_async(Task::new("Find a recipe", "0"))
            .await
            .unwrap();

        assert!(result.contains("[0.0] (failed:"));
        assert!(result.contains("[0.1] done:"));
        assert_eq!(wf.kpis()["failed_sub_tasks"], 1);
        assert_eq!(wf.kpis()["completed_sub_tasks"], 1);
    }

    #[tokio::test]
    async fn test_no_workers_is_an_error() {
        let planner = ScriptedPlanner {
            sub_tasks: vec![],
            replans: vec![],
        };
        let mut wf = Workforce::new("A workforce", Box::new(planner), WorkforceConfig::default());

        let err = wf
            .process_task_async(Task::new("anything", "0"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkforceError::NoWorkers));
    }

    #[test]
    fn test_select_worker_by_overlap() {
        let descriptions = vec![
            "Search Agent: browses websites and extracts information".to_string(),
            "Code Agent: writes and reviews source code".to_string(),
        ];
        assert_eq!(select_worker(&descriptions, "browse the recipe websites"), 0);
        assert_eq!(select_worker(&descriptions, "reviews the source code"), 1);
        // No overlap falls back to the first worker
        assert_eq!(select_worker(&descriptions, "xyz"), 0);
    }

    #[test]
    fn test_worker_name_strips_details() {
        assert_eq!(worker_name("Search Agent: an expert"), "Search Agent");
        assert_eq!(worker_name("plain"), "plain");
    }
}
