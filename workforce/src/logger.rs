//! Workforce run logging
//!
//! Records every lifecycle event of a run, maintains per-task records, and
//! exposes three read surfaces: an indented log tree, a KPI map, and a
//! pretty-JSON dump for offline inspection.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkforceError};
use crate::task::TaskState;

/// A lifecycle event inside a workforce run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkforceEvent {
    WorkerCreated {
        worker: String,
        description: String,
    },
    TaskCreated {
        task_id: String,
        content: String,
    },
    TaskDecomposed {
        parent_id: String,
        sub_task_ids: Vec<String>,
    },
    TaskAssigned {
        task_id: String,
        worker: String,
    },
    TaskStarted {
        task_id: String,
        worker: String,
    },
    TaskCompleted {
        task_id: String,
        worker: String,
        duration_ms: u64,
    },
    TaskFailed {
        task_id: String,
        worker: String,
        error: String,
        failure_count: u32,
    },
    TaskReplanned {
        task_id: String,
        new_content: String,
    },
}

/// An event with its wall-clock timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: WorkforceEvent,
}

/// Per-task record maintained from the event stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub content: String,
    pub state: TaskState,
    pub worker: Option<String>,
    pub duration_ms: Option<u64>,
    pub failure_count: u32,
    pub replanned: bool,
}

/// Collects events and renders the run's log tree, KPIs, and JSON dump
#[derive(Debug, Default)]
pub struct WorkforceLogger {
    description: String,
    events: Vec<LoggedEvent>,
    tasks: BTreeMap<String, TaskRecord>,
    workers: Vec<String>,
}

impl WorkforceLogger {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    /// Record an event and fold it into the per-task records
    pub fn record(&mut self, event: WorkforceEvent) {
        self.apply(&event);
        self.events.push(LoggedEvent {
            timestamp: Utc::now(),
            event,
        });
    }

    fn apply(&mut self, event: &WorkforceEvent) {
        match event {
            WorkforceEvent::WorkerCreated { worker, .. } => {
                self.workers.push(worker.clone());
            }
            WorkforceEvent::TaskCreated { task_id, content } => {
                self.tasks.insert(
                    task_id.clone(),
                    TaskRecord {
                        id: task_id.clone(),
                        content: content.clone(),
                        state: TaskState::Open,
                        worker: None,
                        duration_ms: None,
                        failure_count: 0,
                        replanned: false,
                    },
                );
            }
            WorkforceEvent::TaskDecomposed { .. } => {}
            WorkforceEvent::TaskAssigned { task_id, worker } => {
                if let Some(record) = self.tasks.get_mut(task_id) {
                    record.state = TaskState::Assigned;
                    record.worker = Some(worker.clone());
                }
            }
            WorkforceEvent::TaskStarted { task_id, .. } => {
                if let Some(record) = self.tasks.get_mut(task_id) {
                    record.state = TaskState::Running;
                }
            }
            WorkforceEvent::TaskCompleted {
                task_id,
                duration_ms,
                ..
            } => {
                if let Some(record) = self.tasks.get_mut(task_id) {
                    record.state = TaskState::Done;
                    record.duration_ms = Some(*duration_ms);
                }
            }
            WorkforceEvent::TaskFailed {
                task_id,
                failure_count,
                ..
            } => {
                if let Some(record) = self.tasks.get_mut(task_id) {
                    record.state = TaskState::Failed;
                    record.failure_count = *failure_count;
                }
            }
            WorkforceEvent::TaskReplanned {
                task_id,
                new_content,
            } => {
                if let Some(record) = self.tasks.get_mut(task_id) {
                    record.content = new_content.clone();
                    record.replanned = true;
                    record.state = TaskState::Open;
                }
            }
        }
    }

    /// Render the run as an indented task tree with state glyphs.
    ///
    /// Root tasks (no dot in the id) come first; sub-tasks are indented
    /// under their parent in id order.
    pub fn log_tree(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Workforce: {}\n", self.description));

        for record in self.tasks.values().filter(|r| !r.id.contains('.')) {
            self.render_subtree(record, 0, &mut out);
        }
        out
    }

    fn render_subtree(&self, record: &TaskRecord, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth + 1);
        let mut line = format!(
            "{}{} [{}] {}",
            indent,
            record.state.glyph(),
            record.id,
            summarize(&record.content)
        );
        if let Some(ref worker) = record.worker {
            line.push_str(&format!(" (worker: {})", worker));
        }
        if let Some(ms) = record.duration_ms {
            line.push_str(&format!(" [{}ms]", ms));
        }
        if record.replanned {
            line.push_str(" [replanned]");
        }
        out.push_str(&line);
        out.push('\n');

        let child_prefix = format!("{}.", record.id);
        let mut children: Vec<&TaskRecord> = self
            .tasks
            .values()
            .filter(|r| r.id.starts_with(&child_prefix) && !r.id[child_prefix.len()..].contains('.'))
            .collect();
        // Map order is lexicographic, which puts "0.10" before "0.2"
        children.sort_by_key(|r| child_index(&r.id));
        for child in children {
            self.render_subtree(child, depth + 1, out);
        }
    }

    /// Aggregate performance counters for the run
    pub fn kpis(&self) -> BTreeMap<String, serde_json::Value> {
        let sub_tasks: Vec<&TaskRecord> =
            self.tasks.values().filter(|r| r.id.contains('.')).collect();

        let total = sub_tasks.len() as u64;
        let completed = sub_tasks
            .iter()
            .filter(|r| r.state == TaskState::Done)
            .count() as u64;
        let failed = sub_tasks
            .iter()
            .filter(|r| r.state == TaskState::Failed)
            .count() as u64;
        let replanned = sub_tasks.iter().filter(|r| r.replanned).count() as u64;

        let durations: Vec<u64> = sub_tasks.iter().filter_map(|r| r.duration_ms).collect();
        let total_duration_ms: u64 = durations.iter().sum();
        let avg_task_duration_ms = if durations.is_empty() {
            0
        } else {
            total_duration_ms / durations.len() as u64
        };

        let success_rate = if total == 0 {
            100.0
        } else {
            (completed as f64 / total as f64) * 100.0
        };

        let mut kpis: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        kpis.insert("total_sub_tasks".into(), total.into());
        kpis.insert("completed_sub_tasks".into(), completed.into());
        kpis.insert("failed_sub_tasks".into(), failed.into());
        kpis.insert("replanned_sub_tasks".into(), replanned.into());
        kpis.insert(
            "success_rate".into(),
            serde_json::json!(format!("{:.1}%", success_rate)),
        );
        kpis.insert("total_duration_ms".into(), total_duration_ms.into());
        kpis.insert("avg_task_duration_ms".into(), avg_task_duration_ms.into());
        kpis.insert("worker_count".into(), (self.workers.len() as u64).into());

        for worker in &self.workers {
            let handled = sub_tasks
                .iter()
                .filter(|r| r.worker.as_deref() == Some(worker))
                .count() as u64;
            kpis.insert(format!("worker.{}.tasks_handled", worker), handled.into());
        }

        kpis
    }

    /// Write the full run log as pretty JSON
    pub fn dump_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let dump = serde_json::json!({
            "workforce": self.description,
            "generated_at": Utc::now(),
            "events": self.events,
            "tasks": self.tasks,
            "kpis": self.kpis(),
        });

        let content = serde_json::to_string_pretty(&dump)?;
        std::fs::write(path.as_ref(), content).map_err(|e| {
            WorkforceError::LogDump(format!("{}: {}", path.as_ref().display(), e))
        })?;
        tracing::info!(path = %path.as_ref().display(), "Workforce logs dumped");
        Ok(())
    }

    pub fn events(&self) -> &[LoggedEvent] {
        &self.events
    }
}

/// Numeric position of a sub-task within its parent
fn child_index(id: &str) -> u64 {
    id.rsplit('.')
        .next()
        .and_then(|segment| segment.parse().ok())
        .unwrap_or(u64::MAX)
}

/// First line, capped for tree display
fn summarize(content: &str) -> String {
    let first_line = content.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let mut summary: String = first_line.trim().chars().take(80).collect();
    if first_line.trim().chars().count() > 80 {
        summary.push_str("...");
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_run() -> WorkforceLogger {
        let mut logger = WorkforceLogger::new("A workforce");
        logger.record(WorkforceEvent::WorkerCreated {
            worker: "Search Agent".into(),
            description: "expert web researcher".into(),
        });
        logger.record(WorkforceEvent::TaskCreated {
            task_id: "0".into(),
            content: "Find a vegetarian lasagna recipe".into(),
        });
        logger.record(WorkforceEvent::TaskCreated {
            task_id: "0.0".into(),
            content: "Open allrecipes.com".into(),
        });
        logger.record(WorkforceEvent::TaskCreated {
            task_id: "0.1".into(),
            content: "Search for vegetarian lasagna".into(),
        });
        logger.record(WorkforceEvent::TaskDecomposed {
            parent_id: "0".into(),
            sub_task_ids: vec!["0.0".into(), "0.1".into()],
        });
        logger.record(WorkforceEvent::TaskAssigned {
            task_id: "0.0".into(),
            worker: "Search Agent".into(),
        });
        logger.record(WorkforceEvent::TaskStarted {
            task_id: "0.0".into(),
            worker: "Search Agent".into(),
        });
        logger.record(WorkforceEvent::TaskCompleted {
            task_id: "0.0".into(),
            worker: "Search Agent".into(),
            duration_ms: 1200,
        });
        logger.record(WorkforceEvent::TaskAssigned {
            task_id: "0.1".into(),
            worker: "Search Agent".into(),
        });
        logger.record(WorkforceEvent::TaskFailed {
            task_id: "0.1".into(),
            worker: "Search Agent".into(),
            error: "timeout".into(),
            failure_count: 1,
        });
        logger
    }

    #[test]
    fn test_log_tree_shape() {
        let logger = sample_run();
        let tree = logger.log_tree();

        assert!(tree.starts_with("Workforce: A workforce"));
        // Sub-tasks are indented under the root
        let root_line = tree.lines().find(|l| l.contains("[0]")).unwrap();
        let sub_line = tree.lines().find(|l| l.contains("[0.0]")).unwrap();
        assert!(sub_line.chars().take_while(|c| *c == ' ').count()
            > root_line.chars().take_while(|c| *c == ' ').count());
        assert!(sub_line.contains("✔"));
        assert!(sub_line.contains("1200ms"));
        assert!(tree.lines().any(|l| l.contains("[0.1]") && l.contains("✘")));
    }

    #[test]
    fn test_kpis() {
        let logger = sample_run();
        let kpis = logger.kpis();

        assert_eq!(kpis["total_sub_tasks"], 2);
        assert_eq!(kpis["completed_sub_tasks"], 1);
        assert_eq!(kpis["failed_sub_tasks"], 1);
        assert_eq!(kpis["success_rate"], "50.0%");
        assert_eq!(kpis["worker_count"], 1);
        assert_eq!(kpis["worker.Search Agent.tasks_handled"], 2);
    }

    #[test]
    fn test_replan_resets_task() {
        let mut logger = sample_run();
        logger.record(WorkforceEvent::TaskReplanned {
            task_id: "0.1".into(),
            new_content: "Try a different search term".into(),
        });

        let tree = logger.log_tree();
        let line = tree.lines().find(|l| l.contains("[0.1]")).unwrap();
        assert!(line.contains("different search term"));
        assert!(line.contains("[replanned]"));
        assert_eq!(logger.kpis()["replanned_sub_tasks"], 1);
    }

    #[test]
    fn test_log_tree_orders_children_numerically() {
        let mut logger = WorkforceLogger::new("A workforce");
        logger.record(WorkforceEvent::TaskCreated {
            task_id: "0".into(),
            content: "root".into(),
        });
        for i in 0..12 {
            logger.record(WorkforceEvent::TaskCreated {
                task_id: format!("0.{}", i),
                content: format!("step {}", i),
            });
        }

        let tree = logger.log_tree();
        let position = |needle: &str| tree.find(needle).unwrap();
        assert!(position("[0.2]") < position("[0.10]"));
        assert!(position("[0.10]") < position("[0.11]"));
    }

    #[test]
    fn test_dump_to_file() {
        let logger = sample_run();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_logs.json");

        logger.dump_to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["workforce"], "A workforce");
        assert_eq!(
            parsed["events"].as_array().unwrap().len(),
            logger.events().len()
        );
        assert!(parsed["tasks"]["0.0"]["duration_ms"].is_number());
    }
}
