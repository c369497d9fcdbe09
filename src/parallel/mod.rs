//! Worker pool and run-wide cancellation
//!
//! Rounds of tool invocations are fanned out over crossbeam scoped threads.
//! Work items travel through a bounded work channel and results come back
//! through a result channel drained by a single collector, so the caller's
//! result table only ever has one writer.

pub mod cancel;
pub mod processor;

pub use cancel::CancelHandle;
pub use processor::{ParallelConfig, ParallelProcessor, WorkerPanic};
