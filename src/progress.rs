//! Progress and status events for batch and stitch runs.
//!
//! Both workflows run on a background task and report back through an
//! unbounded `tokio::sync::mpsc` channel of [`ProgressEvent`]s. Events are
//! sent in the order the work produces them; delivery is asynchronous, so a
//! receiver may observe them some time after the corresponding step finished.
//!
//! # Example
//!
//! ```rust
//! use pantheon_ocr::progress::{ProgressEvent, ProgressReporter};
//!
//! let (reporter, mut rx) = ProgressReporter::channel();
//! reporter.progress(25, "Converted scan_01.png");
//! drop(reporter);
//!
//! let first = rx.try_recv().unwrap();
//! assert_eq!(first, ProgressEvent::Progress { percent: 25, message: "Converted scan_01.png".into() });
//! ```

use crate::error::PantheonError;
use serde::Serialize;
use std::future::Future;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// One notification from a running workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProgressEvent {
    /// Overall completion moved to `percent` (0–100).
    Progress { percent: u8, message: String },
    /// Informational status line.
    Status(String),
    /// A unit (item, record, image) failed and was skipped.
    Warning(String),
}

/// The four sub-steps every batch item goes through, each worth a quarter of
/// the item's share of the progress range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Normalize,
    Encode,
    Submit,
    Persist,
}

impl Stage {
    /// 1-based position within the item.
    pub fn ordinal(self) -> usize {
        match self {
            Stage::Normalize => 1,
            Stage::Encode => 2,
            Stage::Submit => 3,
            Stage::Persist => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Normalize => "Converted",
            Stage::Encode => "Encoded",
            Stage::Submit => "OCR received for",
            Stage::Persist => "OCR data saved for",
        }
    }
}

const STAGES_PER_ITEM: usize = 4;

/// Sending half of a progress channel.
///
/// Cheap to clone. Sending never fails: once the receiver is gone events are
/// dropped, because a caller that stops listening must not stop the work.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressReporter {
    /// A connected reporter and the receiver for its events.
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A reporter that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, event: ProgressEvent) {
        if let Some(ref tx) = self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn progress(&self, percent: u8, message: impl Into<String>) {
        self.send(ProgressEvent::Progress {
            percent: percent.min(100),
            message: message.into(),
        });
    }

    pub fn status(&self, message: impl Into<String>) {
        self.send(ProgressEvent::Status(message.into()));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.send(ProgressEvent::Warning(message.into()));
    }
}

/// Progress state owned by one batch run.
///
/// Every item owns an equal share of 0–100 and each [`Stage`] a quarter of
/// that share. Reported values never decrease.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    total: usize,
    last: u8,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self { total, last: 0 }
    }

    /// Percentage once `stage` of item `index` (0-based) has completed.
    pub fn after_stage(&mut self, index: usize, stage: Stage) -> u8 {
        let steps_done = index * STAGES_PER_ITEM + stage.ordinal();
        self.advance(steps_done, self.total * STAGES_PER_ITEM)
    }

    /// Percentage at the end of item `index`, however it ended.
    pub fn item_done(&mut self, index: usize) -> u8 {
        self.advance(index + 1, self.total)
    }

    /// Force completion.
    pub fn finish(&mut self) -> u8 {
        self.last = 100;
        self.last
    }

    pub fn current(&self) -> u8 {
        self.last
    }

    fn advance(&mut self, done: usize, out_of: usize) -> u8 {
        let pct = if out_of == 0 {
            100
        } else {
            (done.min(out_of) * 100 / out_of) as u8
        };
        self.last = self.last.max(pct);
        self.last
    }
}

/// Progress events as a `Stream`.
pub type ProgressStream = UnboundedReceiverStream<ProgressEvent>;

/// A workflow running on a background task plus the receiving end of its
/// progress channel.
///
/// Drain [`WorkflowHandle::events`] until it yields `None` (the task has
/// finished and dropped its reporter), then call [`WorkflowHandle::finish`].
#[derive(Debug)]
pub struct WorkflowHandle<T> {
    pub events: UnboundedReceiver<ProgressEvent>,
    task: JoinHandle<Result<T, PantheonError>>,
}

impl<T: Send + 'static> WorkflowHandle<T> {
    /// Spawn `work` on the tokio runtime with a fresh reporter.
    pub fn spawn<F, Fut>(work: F) -> Self
    where
        F: FnOnce(ProgressReporter) -> Fut,
        Fut: Future<Output = Result<T, PantheonError>> + Send + 'static,
    {
        let (reporter, events) = ProgressReporter::channel();
        let task = tokio::spawn(work(reporter));
        Self { events, task }
    }

    /// Wait for the workflow's result. Pending events are discarded.
    pub async fn finish(self) -> Result<T, PantheonError> {
        join(self.task).await
    }

    /// Split into an event stream and the task's join handle.
    pub fn into_parts(self) -> (ProgressStream, JoinHandle<Result<T, PantheonError>>) {
        (UnboundedReceiverStream::new(self.events), self.task)
    }
}

/// Await a workflow task, mapping a panic or cancellation to
/// [`PantheonError::Internal`].
pub async fn join<T>(task: JoinHandle<Result<T, PantheonError>>) -> Result<T, PantheonError> {
    task.await
        .map_err(|e| PantheonError::Internal(format!("workflow task failed: {e}")))?
}
