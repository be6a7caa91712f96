//! Pipeline composition and execution
//!
//! Stages are linked by [`runner::PipelineBuilder`], checked by the
//! [`validation`] engine, described declaratively by [`spec::PipelineSpec`]
//! and run over batches by [`executor::BatchExecutor`].

pub mod artifacts;
pub mod executor;
pub mod observer;
pub mod runner;
pub mod spec;
pub mod traits;
pub mod validation;
