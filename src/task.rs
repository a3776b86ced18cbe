//! Background entry point: runs are queued and executed one at a time.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::pipeline::{RunReport, VideoPipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutcome {
    pub id: Uuid,
    pub status: TaskStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RunReport>,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task queue is closed")]
    Closed,
}

struct TaskMessage {
    id: Uuid,
    root_id: String,
    reply: oneshot::Sender<TaskOutcome>,
}

/// A submitted run.
#[derive(Debug)]
pub struct TaskHandle {
    pub id: Uuid,
    receiver: oneshot::Receiver<TaskOutcome>,
}

impl TaskHandle {
    /// Waits for the run to finish.
    pub async fn wait(self) -> TaskOutcome {
        match self.receiver.await {
            Ok(outcome) => outcome,
            Err(_) => TaskOutcome {
                id: self.id,
                status: TaskStatus::Error,
                message: "worker stopped before the task completed".to_string(),
                report: None,
            },
        }
    }
}

/// Sending side of the queue. Dropping every clone stops the worker once it drains.
#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::Sender<TaskMessage>,
}

impl TaskQueue {
    /// Spawns the worker on the current runtime.
    pub fn start(pipeline: Arc<VideoPipeline>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(pipeline, receiver));
        (Self { sender }, worker)
    }

    /// Queues a recursive run over `root_id`.
    pub async fn submit(&self, root_id: impl Into<String>) -> Result<TaskHandle, TaskError> {
        let id = Uuid::new_v4();
        let (reply, receiver) = oneshot::channel();
        let message = TaskMessage { id, root_id: root_id.into(), reply };

        self.sender.send(message).await.map_err(|_| TaskError::Closed)?;
        Ok(TaskHandle { id, receiver })
    }
}

async fn run_worker(pipeline: Arc<VideoPipeline>, mut receiver: mpsc::Receiver<TaskMessage>) {
    info!("task worker started");
    while let Some(message) = receiver.recv().await {
        let span = tracing::info_span!("task", task_id = %message.id, root_id = %message.root_id);
        let job = {
            let pipeline = pipeline.clone();
            let (id, root_id) = (message.id, message.root_id.clone());
            tokio::spawn(async move { execute(&pipeline, id, &root_id).await }.instrument(span))
        };

        let outcome = match job.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let reason = if e.is_panic() {
                    format!("unexpected panic: {}", panic_message(e.into_panic()))
                } else {
                    "task was cancelled".to_string()
                };
                error!(task_id = %message.id, error = %reason, "task aborted");
                TaskOutcome { id: message.id, status: TaskStatus::Error, message: reason, report: None }
            }
        };
        if message.reply.send(outcome).is_err() {
            info!(task_id = %message.id, "task submitter went away before completion");
        }
    }
    info!("task worker stopped: channel closed");
}

async fn execute(pipeline: &VideoPipeline, id: Uuid, root_id: &str) -> TaskOutcome {
    match pipeline.run_recursive(root_id).await {
        Ok(report) => TaskOutcome {
            id,
            status: TaskStatus::Success,
            message: format!(
                "processed {} actionable folder(s) of {} visited: {} uploaded, {} skipped, {} failed",
                report.summary.actionable,
                report.summary.folders_visited,
                report.uploaded(),
                report.skipped(),
                report.failed()
            ),
            report: Some(report),
        },
        Err(e) => {
            error!(error = %e, "task failed");
            TaskOutcome { id, status: TaskStatus::Error, message: e.to_string(), report: None }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload.downcast_ref::<&str>().map_or_else(|| "unknown cause".to_string(), |m| m.to_string()),
    }
}
