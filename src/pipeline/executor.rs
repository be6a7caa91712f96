//! Batch executor: runs one pipeline over many documents concurrently.
//!
//! Documents are pulled lazily from the caller's iterator by a dedicated
//! `rayon` pool, each one is pushed through a shared [`Pipeline`], and the
//! results come back through a bounded `crossbeam-channel` as an ordinary
//! [`Iterator`] ([`BatchResults`]).
//!
//! - A document that fails (or panics inside a stage) yields a failed
//!   [`ResultItem`]; the rest of the batch is unaffected unless
//!   [`FailurePolicy::Halt`] is selected.
//! - [`ResultOrder::Submission`] replays results in input order;
//!   [`ResultOrder::Completion`] yields them as they finish. In submission
//!   order a worker does not start a document more than `queue_capacity`
//!   positions ahead of the next one to be yielded, so a slow document
//!   holds back at most that many finished results.
//! - Dropping [`BatchResults`] early cancels documents not yet started.
//! - `workers == Some(1)` skips the pool entirely and runs each document in
//!   the calling thread when [`BatchResults::next`] is called.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use rayon::iter::{ParallelBridge, ParallelIterator};
use serde::{Deserialize, Serialize};

use super::runner::Pipeline;
use crate::errors::PipelineError;
use crate::types::{Document, ResultItem};

/// Stage name reported when a stage panics.
const PANIC_STAGE: &str = "pipeline";

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

// ─── Configuration ──────────────────────────────────────────────────────────

/// What to do with the rest of a batch after a document fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Report the failure and keep going.
    #[default]
    Isolate,
    /// Yield the first failure, then stop.
    Halt,
}

/// Order in which [`BatchResults`] yields items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrder {
    /// Same order as the input documents.
    #[default]
    Submission,
    /// Whichever document finishes first.
    Completion,
}

/// Batch executor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Worker threads; `None` uses one per CPU, `Some(1)` runs in the
    /// calling thread.
    pub workers: Option<usize>,
    pub failure_policy: FailurePolicy,
    pub order: ResultOrder,
    /// Capacity of the result channel between workers and the consumer.
    ///
    /// With [`ResultOrder::Submission`] this is also the run-ahead window:
    /// document `i` is not started until document `i - queue_capacity` has
    /// been yielded, which bounds the reorder buffer to `queue_capacity`
    /// items.
    pub queue_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: None,
            failure_policy: FailurePolicy::Isolate,
            order: ResultOrder::Submission,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ExecutorConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_order(mut self, order: ResultOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    fn is_sequential(&self) -> bool {
        self.workers == Some(1)
    }
}

// ─── Executor ───────────────────────────────────────────────────────────────

/// Runs a [`Pipeline`] over batches of [`Document`]s.
#[derive(Debug)]
pub struct BatchExecutor {
    pipeline: Pipeline,
    config: ExecutorConfig,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl BatchExecutor {
    /// Executor with the default configuration.
    pub fn new(pipeline: Pipeline) -> Result<Self, PipelineError> {
        Self::with_config(pipeline, ExecutorConfig::default())
    }

    pub fn with_config(pipeline: Pipeline, config: ExecutorConfig) -> Result<Self, PipelineError> {
        if config.workers == Some(0) {
            return Err(PipelineError::Configuration(
                "executor workers must be greater than 0".to_string(),
            ));
        }
        if config.queue_capacity == 0 {
            return Err(PipelineError::Configuration(
                "executor queue_capacity must be greater than 0".to_string(),
            ));
        }

        let pool = if config.is_sequential() {
            None
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.workers.unwrap_or(0))
                .thread_name(|i| format!("textnorm-worker-{i}"))
                .build()
                .map_err(|e| {
                    PipelineError::Configuration(format!("failed to start worker pool: {e}"))
                })?;
            Some(Arc::new(pool))
        };

        Ok(Self {
            pipeline,
            config,
            pool,
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Process a single document in the calling thread.
    pub fn process_one(&self, doc: Document) -> ResultItem {
        run_isolated(&self.pipeline, doc)
    }

    /// Start processing `docs` and return the lazy result stream.
    ///
    /// Exactly one [`ResultItem`] is yielded per document unless the batch
    /// halts or the stream is dropped early.
    pub fn process<I>(&self, docs: I) -> BatchResults
    where
        I: IntoIterator<Item = Document>,
        I::IntoIter: Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        tracing::debug!(
            workers = ?self.config.workers,
            order = ?self.config.order,
            failure_policy = ?self.config.failure_policy,
            "batch started"
        );

        let source = match &self.pool {
            None => Source::Sequential {
                docs: Box::new(docs.into_iter()),
                pipeline: self.pipeline.clone(),
            },
            Some(pool) => {
                let (tx, rx) = crossbeam_channel::bounded(self.config.queue_capacity);
                let pipeline = self.pipeline.clone();
                let flag = Arc::clone(&cancel);
                let docs = docs.into_iter();
                let released = Arc::new(AtomicUsize::new(0));
                let window = match self.config.order {
                    ResultOrder::Submission => Some(self.config.queue_capacity),
                    ResultOrder::Completion => None,
                };
                let gate = Arc::clone(&released);

                pool.spawn(move || {
                    // Err stops pulling documents: cancelled, or the receiver is gone.
                    let _ = docs.enumerate().par_bridge().try_for_each_with(
                        tx,
                        |tx, (idx, doc)| {
                            if let Some(window) = window {
                                wait_for_window(idx, window, &gate, &flag);
                            }
                            if flag.load(Ordering::Relaxed) {
                                return Err(());
                            }
                            let item = run_isolated(&pipeline, doc);
                            tx.send((idx, item)).map_err(|_| ())
                        },
                    );
                });

                Source::Parallel {
                    rx,
                    order: self.config.order,
                    pending: BTreeMap::new(),
                    next: 0,
                    released,
                }
            }
        };

        BatchResults {
            source,
            policy: self.config.failure_policy,
            cancel,
            halted: false,
            done: false,
        }
    }
}

/// Block until document `idx` is within `window` of the next position the
/// consumer will yield, or the batch is cancelled.
///
/// Documents are pulled in index order, so the document at the released
/// position is already running and the wait always ends.
fn wait_for_window(idx: usize, window: usize, released: &AtomicUsize, cancel: &AtomicBool) {
    while idx >= released.load(Ordering::Acquire).saturating_add(window) {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        std::thread::yield_now();
    }
}

/// Run one document, converting a stage panic into a failed item.
fn run_isolated(pipeline: &Pipeline, doc: Document) -> ResultItem {
    let id = doc.id.clone();
    let item = match panic::catch_unwind(AssertUnwindSafe(|| pipeline.run_document(doc))) {
        Ok(item) => item,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "stage panicked".to_string());
            ResultItem::failure(id, PipelineError::processing(PANIC_STAGE, reason))
        }
    };

    if let Some(err) = item.error() {
        tracing::debug!(id = %item.id, code = %err.code(), error = %err, "document failed");
    }
    item
}

// ─── Results ────────────────────────────────────────────────────────────────

enum Source {
    Sequential {
        docs: Box<dyn Iterator<Item = Document> + Send>,
        pipeline: Pipeline,
    },
    Parallel {
        rx: Receiver<(usize, ResultItem)>,
        order: ResultOrder,
        /// Reorder buffer for [`ResultOrder::Submission`].
        pending: BTreeMap<usize, ResultItem>,
        next: usize,
        /// `next`, published to workers waiting on the run-ahead window.
        released: Arc<AtomicUsize>,
    },
}

impl Source {
    fn next_item(&mut self) -> Option<ResultItem> {
        match self {
            Source::Sequential { docs, pipeline } => docs.next().map(|doc| run_isolated(pipeline, doc)),
            Source::Parallel { rx, order: ResultOrder::Completion, .. } => {
                rx.recv().ok().map(|(_, item)| item)
            }
            Source::Parallel {
                rx,
                order: ResultOrder::Submission,
                pending,
                next,
                released,
            } => loop {
                if let Some(item) = pending.remove(&*next) {
                    *next += 1;
                    released.store(*next, Ordering::Release);
                    return Some(item);
                }
                match rx.recv() {
                    Ok((idx, item)) => {
                        pending.insert(idx, item);
                    }
                    // Workers are gone; flush whatever is buffered.
                    Err(_) => return pending.pop_first().map(|(_, item)| item),
                }
            },
        }
    }
}

/// Lazy stream of [`ResultItem`]s for one batch.
///
/// Dropping the stream cancels documents that have not started yet.
pub struct BatchResults {
    source: Source,
    policy: FailurePolicy,
    cancel: Arc<AtomicBool>,
    halted: bool,
    done: bool,
}

impl BatchResults {
    /// `true` once a failure stopped the batch under [`FailurePolicy::Halt`].
    pub fn halted(&self) -> bool {
        self.halted
    }

    fn stop(&mut self) {
        self.done = true;
        self.cancel.store(true, Ordering::Relaxed);
    }
}

impl Iterator for BatchResults {
    type Item = ResultItem;

    fn next(&mut self) -> Option<ResultItem> {
        if self.done {
            return None;
        }

        let Some(item) = self.source.next_item() else {
            self.done = true;
            return None;
        };

        if self.policy == FailurePolicy::Halt && !item.is_ok() {
            tracing::warn!(id = %item.id, "batch halted after document failure");
            self.halted = true;
            self.stop();
        }
        Some(item)
    }
}

impl Drop for BatchResults {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

impl fmt::Debug for BatchResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.source {
            Source::Sequential { .. } => "sequential",
            Source::Parallel { .. } => "parallel",
        };
        f.debug_struct("BatchResults")
            .field("mode", &mode)
            .field("policy", &self.policy)
            .field("halted", &self.halted)
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::artifacts::{Shape, StageValue};
    use crate::pipeline::traits::Stage;
    use crate::stages::{ToLowerCase, Tokenizer};
    use std::sync::atomic::AtomicUsize;

    /// Panics on any document containing the token "boom".
    #[derive(Debug)]
    struct Explosive;

    impl Stage for Explosive {
        fn name(&self) -> &'static str {
            "explosive"
        }
        fn input_shape(&self) -> Shape {
            Shape::TokenSequence
        }
        fn output_shape(&self) -> Shape {
            Shape::TokenSequence
        }
        fn apply(&self, input: StageValue) -> Result<StageValue, PipelineError> {
            if input.as_tokens().is_some_and(|t| t.iter().any(|w| w == "boom")) {
                panic!("boom token");
            }
            Ok(input)
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::builder()
            .stage(Tokenizer::new().with_max_tokens(3))
            .stage(ToLowerCase::new())
            .build()
            .unwrap()
    }

    fn docs(n: usize) -> Vec<Document> {
        (0..n)
            .map(|i| Document::new(format!("d{i}"), format!("Word{i} Other")))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let cfg = ExecutorConfig::default();
        assert_eq!(cfg.workers, None);
        assert_eq!(cfg.failure_policy, FailurePolicy::Isolate);
        assert_eq!(cfg.order, ResultOrder::Submission);
        assert_eq!(cfg.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let cfg: ExecutorConfig = serde_json::from_str(r#"{ "failure_policy": "halt" }"#).unwrap();
        assert_eq!(cfg.failure_policy, FailurePolicy::Halt);
        assert_eq!(cfg.order, ResultOrder::Submission);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = BatchExecutor::with_config(pipeline(), ExecutorConfig::default().with_workers(0))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(BatchExecutor::with_config(
            pipeline(),
            ExecutorConfig::default().with_queue_capacity(0)
        )
        .is_err());
    }

    #[test]
    fn test_submission_order_parallel() {
        let exec =
            BatchExecutor::with_config(pipeline(), ExecutorConfig::default().with_workers(4))
                .unwrap();
        let ids: Vec<_> = exec.process(docs(100)).map(|r| r.id).collect();
        let expected: Vec<_> = (0..100).map(|i| format!("d{i}")).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_completion_order_yields_everything() {
        let exec = BatchExecutor::with_config(
            pipeline(),
            ExecutorConfig::default()
                .with_workers(3)
                .with_order(ResultOrder::Completion),
        )
        .unwrap();
        let mut ids: Vec<_> = exec.process(docs(50)).map(|r| r.id).collect();
        ids.sort();
        let mut expected: Vec<_> = (0..50).map(|i| format!("d{i}")).collect();
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_sequential_is_lazy() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let source = (0..10).map(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            Document::new(format!("d{i}"), "a b")
        });

        let exec =
            BatchExecutor::with_config(pipeline(), ExecutorConfig::default().with_workers(1))
                .unwrap();
        let mut results = exec.process(source);
        assert_eq!(pulled.load(Ordering::SeqCst), 0);
        assert_eq!(results.next().unwrap().id, "d0");
        assert_eq!(pulled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_is_isolated() {
        let exec =
            BatchExecutor::with_config(pipeline(), ExecutorConfig::default().with_workers(2))
                .unwrap();
        let batch = vec![
            Document::new("ok1", "a b"),
            Document::new("bad", "a b c d"),
            Document::new("ok2", "c"),
        ];
        let results: Vec<_> = exec.process(batch).collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1].error(),
            Some(PipelineError::Processing { stage: "tokenizer", .. })
        ));
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_panic_becomes_processing_failure() {
        let pipeline = Pipeline::builder()
            .stage(Tokenizer::new())
            .stage(Explosive)
            .build()
            .unwrap();
        for workers in [1, 2] {
            let exec =
                BatchExecutor::with_config(pipeline.clone(), ExecutorConfig::default().with_workers(workers))
                    .unwrap();
            let results: Vec<_> = exec
                .process(vec![
                    Document::new("a", "fine"),
                    Document::new("b", "boom"),
                    Document::new("c", "fine too"),
                ])
                .collect();
            assert_eq!(results.len(), 3);
            match results[1].error() {
                Some(PipelineError::Processing { reason, .. }) => assert!(reason.contains("boom")),
                other => panic!("unexpected {other:?}"),
            }
            assert!(results[2].is_ok());
        }
    }

    #[test]
    fn test_halt_stops_after_first_failure() {
        for workers in [1, 4] {
            let exec = BatchExecutor::with_config(
                pipeline(),
                ExecutorConfig::default()
                    .with_workers(workers)
                    .with_failure_policy(FailurePolicy::Halt),
            )
            .unwrap();
            let batch = vec![
                Document::new("d0", "a"),
                Document::new("d1", "a b c d"),
                Document::new("d2", "a"),
                Document::new("d3", "a b c d e"),
            ];
            let mut results = exec.process(batch);
            let items: Vec<_> = results.by_ref().collect();
            let ids: Vec<_> = items.iter().map(|r| r.id.as_str()).collect();
            assert_eq!(ids, vec!["d0", "d1"]);
            assert!(results.halted());
            assert!(results.next().is_none());
        }
    }

    #[test]
    fn test_dropping_results_cancels_unbounded_input() {
        let exec = BatchExecutor::with_config(
            pipeline(),
            ExecutorConfig::default()
                .with_workers(2)
                .with_queue_capacity(1),
        )
        .unwrap();
        let endless = (0usize..).map(|i| Document::new(format!("d{i}"), "a"));
        let first: Vec<_> = exec.process(endless).take(5).map(|r| r.id).collect();
        assert_eq!(first, vec!["d0", "d1", "d2", "d3", "d4"]);
    }

    /// Sleeps on the token "slow"; counts every document it sees.
    #[derive(Debug)]
    struct Slow {
        started: Arc<AtomicUsize>,
    }

    impl Stage for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }
        fn input_shape(&self) -> Shape {
            Shape::TokenSequence
        }
        fn output_shape(&self) -> Shape {
            Shape::TokenSequence
        }
        fn apply(&self, input: StageValue) -> Result<StageValue, PipelineError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            if input.as_tokens().is_some_and(|t| t.iter().any(|w| w == "slow")) {
                std::thread::sleep(std::time::Duration::from_millis(200));
            }
            Ok(input)
        }
    }

    #[test]
    fn test_slow_head_document_bounds_run_ahead() {
        let started = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::builder()
            .stage(Tokenizer::new())
            .stage(Slow {
                started: Arc::clone(&started),
            })
            .build()
            .unwrap();
        let exec = BatchExecutor::with_config(
            pipeline,
            ExecutorConfig::default()
                .with_workers(4)
                .with_queue_capacity(4),
        )
        .unwrap();

        let batch = std::iter::once(Document::new("d0", "slow"))
            .chain((1..1000).map(|i| Document::new(format!("d{i}"), "fast")));
        let mut results = exec.process(batch);
        let first = results.next().unwrap();
        assert_eq!(first.id, "d0");
        // While d0 sleeps only documents 1..4 may start.
        assert!(started.load(Ordering::SeqCst) <= 5);

        let rest: Vec<_> = results.map(|r| r.id).collect();
        assert_eq!(rest.len(), 999);
        assert_eq!(rest.last().map(String::as_str), Some("d999"));
    }

    #[test]
    fn test_wait_for_window_returns_on_cancel() {
        let released = AtomicUsize::new(0);
        let cancel = AtomicBool::new(true);
        wait_for_window(100, 4, &released, &cancel);
        let cancel = AtomicBool::new(false);
        released.store(97, Ordering::SeqCst);
        wait_for_window(100, 4, &released, &cancel);
    }

    #[test]
    fn test_process_one() {
        let exec = BatchExecutor::new(pipeline()).unwrap();
        let item = exec.process_one(Document::new("x", "Hello"));
        assert_eq!(item.tokens().unwrap(), ["hello"]);
    }
}
