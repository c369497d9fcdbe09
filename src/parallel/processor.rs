use crossbeam::channel::{Receiver, Sender, bounded};
use thiserror::Error;
use tracing::trace;

/// Configuration for parallel processing
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Maximum number of worker threads (0 = one per work item)
    pub max_workers: usize,
    /// Channel buffer size multiplier (buffer = workers * multiplier)
    pub channel_buffer_multiplier: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_workers: 0,
            channel_buffer_multiplier: 2,
        }
    }
}

impl ParallelConfig {
    pub fn with_max_workers(max_workers: usize) -> Self {
        Self {
            max_workers,
            ..Self::default()
        }
    }
}

/// A worker thread panicked; the round's results are incomplete
#[derive(Debug, Error)]
#[error("a worker thread panicked during parallel processing")]
pub struct WorkerPanic;

/// Runs a closure over work items on a bounded pool of scoped threads
#[derive(Debug, Clone, Default)]
pub struct ParallelProcessor {
    config: ParallelConfig,
}

impl ParallelProcessor {
    pub fn new(config: ParallelConfig) -> Self {
        Self { config }
    }

    /// Worker count for `work_count` items, never more than the items
    pub fn calculate_workers(&self, work_count: usize) -> usize {
        let workers = if self.config.max_workers == 0 {
            work_count
        } else {
            self.config.max_workers.min(work_count)
        };
        workers.max(1)
    }

    /// Process every item and return the results in input order
    ///
    /// Returns only after every worker has joined.
    pub fn process<T, R, F>(&self, work_items: Vec<T>, worker_fn: F) -> Result<Vec<R>, WorkerPanic>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        let work_count = work_items.len();
        if work_count == 0 {
            return Ok(Vec::new());
        }

        let workers = self.calculate_workers(work_count);
        let buffer = workers * self.config.channel_buffer_multiplier.max(1);
        trace!(work_count, workers, "starting parallel round");

        let (work_tx, work_rx): (Sender<(usize, T)>, Receiver<(usize, T)>) = bounded(buffer);
        let (result_tx, result_rx): (Sender<(usize, R)>, Receiver<(usize, R)>) = bounded(buffer);

        let worker_fn = &worker_fn;
        let mut indexed = crossbeam::thread::scope(|s| {
            for _ in 0..workers {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                s.spawn(move |_| {
                    while let Ok((index, item)) = work_rx.recv() {
                        if result_tx.send((index, worker_fn(item))).is_err() {
                            break;
                        }
                    }
                });
            }

            s.spawn(move |_| {
                for (index, item) in work_items.into_iter().enumerate() {
                    if work_tx.send((index, item)).is_err() {
                        break;
                    }
                }
            });

            // Only the workers may keep the channels open
            drop(work_rx);
            drop(result_tx);

            let mut collected = Vec::with_capacity(work_count);
            while let Ok(result) = result_rx.recv() {
                collected.push(result);
            }
            collected
        })
        .map_err(|_| WorkerPanic)?;

        if indexed.len() != work_count {
            return Err(WorkerPanic);
        }

        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, result)| result).collect())
    }
}
