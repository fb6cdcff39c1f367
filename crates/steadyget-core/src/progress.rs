//! Progress reporting
//!
//! Engines push a [`ProgressEvent`] on every state change. What happens
//! with it depends on the scheduler's [`ProgressMode`]: per-worker bars,
//! one-line messages routed through the collector, or nothing. An
//! optional observer sees every event regardless of mode.

use crate::engine::STATUS_MOVING_FILE;
use crate::scheduler::Completion;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_lot::Mutex;
use std::sync::Arc;
use steadyget_types::{ProgressEvent, ProgressMode};
use tokio::sync::mpsc;

/// Consumer of transfer progress
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);

    /// A human-readable status line (message mode only)
    fn on_message(&self, _task_id: usize, _line: &str) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

// ============================================================================
// Aggregated board
// ============================================================================

/// One bar per worker plus a bar counting finished tasks
pub struct ProgressBoard {
    multi: MultiProgress,
    overall: ProgressBar,
    workers: Vec<ProgressBar>,
}

impl ProgressBoard {
    pub fn new(task_count: usize, worker_count: usize) -> Self {
        Self::with_target(task_count, worker_count, ProgressDrawTarget::stderr())
    }

    /// A board that renders nowhere
    pub fn hidden(task_count: usize, worker_count: usize) -> Self {
        Self::with_target(task_count, worker_count, ProgressDrawTarget::hidden())
    }

    fn with_target(task_count: usize, worker_count: usize, target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);

        let overall = multi.add(ProgressBar::new(task_count as u64));
        overall.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.green/white}] {pos}/{len} files")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░  "),
        );

        let workers = (0..worker_count)
            .map(|_| {
                let pb = multi.add(ProgressBar::new(0));
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} {prefix:20!} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("█▓▒░  "),
                );
                pb
            })
            .collect();

        Self {
            multi,
            overall,
            workers,
        }
    }

    /// Bar owned by worker `index`, reset for a new task
    pub fn worker_bar(&self, index: usize, label: &str) -> Option<ProgressBar> {
        let pb = self.workers.get(index)?.clone();
        pb.reset();
        pb.set_length(0);
        pb.set_prefix(label.to_string());
        pb.set_message(String::new());
        Some(pb)
    }

    pub fn task_finished(&self) {
        self.overall.inc(1);
    }

    pub fn finish(&self) {
        for pb in &self.workers {
            pb.finish_and_clear();
        }
        self.overall.finish();
        let _ = self.multi.clear();
    }
}

// ============================================================================
// Per-task sinks
// ============================================================================

/// Drives one worker bar
struct BarSink {
    bar: ProgressBar,
    last_status: Mutex<String>,
}

impl ProgressSink for BarSink {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Some(total) = event.bytes_total {
            self.bar.set_length(total);
        }
        self.bar.set_position(event.bytes_downloaded);

        let mut last = self.last_status.lock();
        if *last != event.status_text {
            *last = event.status_text.clone();
            self.bar.set_message(event.status_text.clone());
        }
    }
}

/// Turns status changes into collector messages
struct MessageSink {
    label: String,
    last_status: Mutex<String>,
    tx: mpsc::UnboundedSender<Completion>,
}

impl ProgressSink for MessageSink {
    fn on_progress(&self, event: &ProgressEvent) {
        let mut last = self.last_status.lock();
        if *last == event.status_text {
            return;
        }
        *last = event.status_text.clone();

        if event.status_text != STATUS_MOVING_FILE {
            let _ = self.tx.send(Completion::Message {
                task_id: event.task_id,
                line: format!("{}: {}", self.label, event.status_text),
            });
        }
    }
}

/// Sink handed to one engine: the mode-specific sink plus the observer
pub(crate) struct TaskSink {
    inner: Option<Box<dyn ProgressSink>>,
    observer: Option<Arc<dyn ProgressSink>>,
}

impl TaskSink {
    pub(crate) fn new(
        mode: ProgressMode,
        label: &str,
        bar: Option<ProgressBar>,
        tx: &mpsc::UnboundedSender<Completion>,
        observer: Option<Arc<dyn ProgressSink>>,
    ) -> Self {
        let inner: Option<Box<dyn ProgressSink>> = match mode {
            ProgressMode::Aggregated => bar.map(|bar| {
                Box::new(BarSink {
                    bar,
                    last_status: Mutex::new(String::new()),
                }) as Box<dyn ProgressSink>
            }),
            ProgressMode::Messages => Some(Box::new(MessageSink {
                label: label.to_string(),
                last_status: Mutex::new(String::new()),
                tx: tx.clone(),
            })),
            ProgressMode::Silent => None,
        };

        Self { inner, observer }
    }
}

impl ProgressSink for TaskSink {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Some(inner) = &self.inner {
            inner.on_progress(event);
        }
        if let Some(observer) = &self.observer {
            observer.on_progress(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steadyget_types::TransferStatus;

    fn event(task_id: usize, text: &str) -> ProgressEvent {
        ProgressEvent {
            task_id,
            status: TransferStatus::Running,
            bytes_downloaded: 10,
            bytes_total: Some(100),
            status_text: text.to_string(),
        }
    }

    #[test]
    fn test_message_sink_reports_transitions_only() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = TaskSink::new(ProgressMode::Messages, "file #1", None, &tx, None);

        sink.on_progress(&event(1, "Downloading"));
        sink.on_progress(&event(1, "Downloading"));
        sink.on_progress(&event(1, STATUS_MOVING_FILE));
        sink.on_progress(&event(1, "Done"));

        let mut lines = Vec::new();
        while let Ok(Completion::Message { line, .. }) = rx.try_recv() {
            lines.push(line);
        }
        assert_eq!(lines, vec!["file #1: Downloading", "file #1: Done"]);
    }

    #[test]
    fn test_silent_sink_still_feeds_observer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let observer: Arc<dyn ProgressSink> = Arc::new(move |e: &ProgressEvent| {
            seen_clone.lock().push(e.bytes_downloaded);
        });

        let sink = TaskSink::new(ProgressMode::Silent, "x", None, &tx, Some(observer));
        sink.on_progress(&event(0, "Downloading"));

        assert_eq!(*seen.lock(), vec![10]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_board_tracks_worker_bars() {
        let board = ProgressBoard::hidden(3, 2);
        let bar = board.worker_bar(1, "file #2").unwrap();
        assert_eq!(bar.position(), 0);
        assert!(board.worker_bar(2, "missing").is_none());

        let (tx, _rx) = mpsc::unbounded_channel();
        let sink = TaskSink::new(ProgressMode::Aggregated, "file #2", Some(bar.clone()), &tx, None);
        sink.on_progress(&event(1, "Downloading"));
        assert_eq!(bar.position(), 10);
        assert_eq!(bar.length(), Some(100));
    }
}
