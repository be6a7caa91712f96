//! Pipeline observer: hooks at stage boundaries.
//!
//! Observers receive notifications at stage boundaries without coupling to
//! stage logic. Pass [`NoopObserver`] for zero-overhead execution, or
//! [`StageTimingObserver`] to collect a [`StageReport`] per stage.

use std::time::{Duration, Instant};

/// Callbacks fired by [`Pipeline::run_observed`](super::runner::Pipeline::run_observed).
///
/// All methods default to no-ops; implement only what you need.
pub trait PipelineObserver {
    fn on_stage_start(&mut self, _stage: &'static str) {}

    fn on_stage_end(&mut self, _stage: &'static str, _report: &StageReport) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Measurements for one stage execution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageReport {
    elapsed: Duration,
    items: Option<usize>,
    failed: bool,
}

impl StageReport {
    pub fn new(elapsed: Duration) -> Self {
        Self {
            elapsed,
            items: None,
            failed: false,
        }
    }

    /// Number of items (tokens, fields) in the value the stage produced.
    pub fn with_items(mut self, items: usize) -> Self {
        self.items = Some(items);
        self
    }

    pub fn failed(mut self) -> Self {
        self.failed = true;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn items(&self) -> Option<usize> {
        self.items
    }

    pub fn is_failure(&self) -> bool {
        self.failed
    }
}

/// Wall-clock timer started at a stage boundary.
#[derive(Debug, Clone, Copy)]
pub struct StageClock(Instant);

impl StageClock {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// Collects `(stage, report)` pairs in execution order.
#[derive(Debug, Clone, Default)]
pub struct StageTimingObserver {
    reports: Vec<(&'static str, StageReport)>,
}

impl StageTimingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> &[(&'static str, StageReport)] {
        &self.reports
    }

    pub fn total(&self) -> Duration {
        self.reports.iter().map(|(_, r)| r.elapsed()).sum()
    }

    pub fn clear(&mut self) {
        self.reports.clear();
    }
}

impl PipelineObserver for StageTimingObserver {
    fn on_stage_end(&mut self, stage: &'static str, report: &StageReport) {
        self.reports.push((stage, *report));
    }
}
