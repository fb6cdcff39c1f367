//! Scheduler - runs many tasks on a bounded worker pool
//!
//! Tasks are seeded into a shared FIFO queue together with their position.
//! Each worker owns a client, pulls tasks with a short timeout so it can
//! notice cancellation, runs a [`TransferEngine`] and posts the outcome on
//! the completion channel. The collector writes outcomes back by position,
//! so the result vector always mirrors the submission order.

use crate::client::build_client;
use crate::engine::TransferEngine;
use crate::error::SteadygetError;
use crate::progress::{ProgressBoard, ProgressSink, TaskSink};
use crate::task::{Destination, DownloadTask};
use crate::validator::{MultipartEtagValidator, Validator};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use steadyget_types::{DownloadOutcome, EngineConfig, ProgressMode};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// How long a worker waits on the queue before re-checking the running flag
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

type TaskQueue = Arc<Mutex<mpsc::UnboundedReceiver<(usize, DownloadTask)>>>;

/// Traffic on the completion channel
pub(crate) enum Completion {
    /// Informational line (message mode)
    Message { task_id: usize, line: String },
    /// Terminal outcome for the task at `index`
    Finished { index: usize, outcome: DownloadOutcome },
}

/// Cooperative stop switch shared with the workers
#[derive(Debug, Clone)]
pub struct CancelHandle {
    running: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Let in-flight tasks finish, start no new ones
    pub fn cancel(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("Cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        !self.running.load(Ordering::Acquire)
    }
}

/// Runs an ordered list of tasks under bounded concurrency
pub struct Scheduler {
    tasks: Vec<DownloadTask>,
    config: Arc<EngineConfig>,
    validator: Arc<dyn Validator>,
    observer: Option<Arc<dyn ProgressSink>>,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(tasks: Vec<DownloadTask>, config: EngineConfig) -> Self {
        Self {
            tasks,
            config: Arc::new(config),
            validator: Arc::new(MultipartEtagValidator),
            observer: None,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Build tasks from `(url, destination, label)` triples, numbered in order
    pub fn from_entries<I, U, P, L>(entries: I, config: EngineConfig) -> Self
    where
        I: IntoIterator<Item = (U, P, L)>,
        U: Into<String>,
        P: Into<PathBuf>,
        L: Into<String>,
    {
        let tasks = entries
            .into_iter()
            .enumerate()
            .map(|(id, (url, path, label))| {
                DownloadTask::new(id, url, Destination::Path(path.into()), label)
            })
            .collect();
        Self::new(tasks, config)
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// Receive every progress event and message line
    pub fn with_observer(mut self, observer: Arc<dyn ProgressSink>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            running: self.running.clone(),
        }
    }

    pub fn tasks(&self) -> &[DownloadTask] {
        &self.tasks
    }

    /// Run every task to a terminal outcome, or until cancelled.
    ///
    /// Returns one outcome per task in submission order; tasks that were
    /// never started stay "not attempted". Errors only when the run cannot
    /// start at all.
    pub async fn run(&self) -> Result<Vec<DownloadOutcome>, SteadygetError> {
        self.config
            .check()
            .map_err(SteadygetError::InvalidConfig)?;

        let task_count = self.tasks.len();
        let worker_count = self.config.worker_count.min(task_count.max(1));

        // One client per worker, built up front so a bad config fails fast
        let clients = (0..worker_count)
            .map(|_| build_client(&self.config))
            .collect::<Result<Vec<_>, _>>()?;

        info!("Running {} tasks on {} workers", task_count, worker_count);

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        for (index, task) in self.tasks.iter().cloned().enumerate() {
            let _ = queue_tx.send((index, task));
        }
        drop(queue_tx);
        let queue: TaskQueue = Arc::new(Mutex::new(queue_rx));

        let board = match self.config.progress_mode {
            ProgressMode::Aggregated => Some(Arc::new(ProgressBoard::new(task_count, worker_count))),
            _ => None,
        };

        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();
        for (index, client) in clients.into_iter().enumerate() {
            let worker = Worker {
                index,
                client,
                queue: queue.clone(),
                tx: done_tx.clone(),
                running: self.running.clone(),
                config: self.config.clone(),
                validator: self.validator.clone(),
                observer: self.observer.clone(),
                board: board.clone(),
            };
            workers.spawn(worker.run());
        }
        // The channel closes once every worker is gone
        drop(done_tx);

        let mut results: Vec<DownloadOutcome> = self
            .tasks
            .iter()
            .map(|task| DownloadOutcome::not_attempted(task.id))
            .collect();
        let mut finished = 0;

        while finished < task_count {
            match done_rx.recv().await {
                Some(Completion::Finished { index, outcome }) => {
                    results[index] = outcome;
                    finished += 1;
                    if let Some(board) = &board {
                        board.task_finished();
                    }
                }
                Some(Completion::Message { task_id, line }) => match &self.observer {
                    Some(observer) => observer.on_message(task_id, &line),
                    None => println!("{}", line),
                },
                None => break,
            }
        }

        if finished < task_count {
            warn!("Run stopped with {}/{} tasks finished", finished, task_count);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Worker task panicked: {}", e);
            }
        }

        if let Some(board) = &board {
            board.finish();
        }

        info!("Run complete: {}/{} tasks finished", finished, task_count);
        Ok(results)
    }
}

/// Everything one worker needs, moved into its task
struct Worker {
    index: usize,
    client: Client,
    queue: TaskQueue,
    tx: mpsc::UnboundedSender<Completion>,
    running: Arc<AtomicBool>,
    config: Arc<EngineConfig>,
    validator: Arc<dyn Validator>,
    observer: Option<Arc<dyn ProgressSink>>,
    board: Option<Arc<ProgressBoard>>,
}

impl Worker {
    async fn run(self) {
        debug!("Worker {} started", self.index);

        while self.running.load(Ordering::Acquire) {
            let next = timeout(DEQUEUE_TIMEOUT, async {
                self.queue.lock().await.recv().await
            })
            .await;

            let (index, task) = match next {
                Err(_) => continue,
                Ok(None) => break,
                Ok(Some(item)) => item,
            };

            let bar = self
                .board
                .as_ref()
                .and_then(|board| board.worker_bar(self.index, &task.label));
            let sink = TaskSink::new(
                self.config.progress_mode,
                &task.label,
                bar,
                &self.tx,
                self.observer.clone(),
            );

            let outcome = TransferEngine::new(task, self.config.clone(), self.client.clone())
                .with_validator(self.validator.clone())
                .with_sink(Arc::new(sink))
                .run()
                .await;

            if self.tx.send(Completion::Finished { index, outcome }).is_err() {
                break;
            }
        }

        debug!("Worker {} stopped", self.index);
    }
}
