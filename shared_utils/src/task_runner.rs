//! Bounded-concurrency task runner
//!
//! Every batch stage goes through [`TaskRunner::run`]: a dedicated rayon pool
//! sized to the stage's limit guarantees that no more than `limit` operations
//! are in flight, and a worker blocked on a filesystem call or a child process
//! only occupies its own slot.
//!
//! Failure handling is chosen per call:
//! - [`ErrorPolicy::Recover`] attempts every item and hands each failure to
//!   the handler.
//! - [`ErrorPolicy::Abort`] stops scheduling new items after the first
//!   failure, lets already-started operations settle, then returns that error.

use crate::progress::create_progress_bar;
use anyhow::{anyhow, Result};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// What to do when an operation fails.
pub enum ErrorPolicy<'a, T> {
    /// First failure aborts the stage.
    Abort,
    /// Every failure is reported to the handler and the stage keeps going.
    Recover(&'a (dyn Fn(&T, &anyhow::Error) + Sync)),
}

#[derive(Debug, Clone)]
pub struct TaskRunner {
    limit: usize,
    show_progress: bool,
}

impl TaskRunner {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `operation` over `items` with at most `limit` in flight.
    ///
    /// Non-empty results (`Ok(Some(_))`) are collected in completion order.
    /// `Ok(None)` means the item produced nothing worth keeping.
    pub fn run<T, R, F>(
        &self,
        label: &str,
        items: &[T],
        policy: ErrorPolicy<'_, T>,
        operation: F,
    ) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> Result<Option<R>> + Sync,
    {
        if items.is_empty() {
            debug!(stage = label, "No items, skipping stage");
            return Ok(Vec::new());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.limit)
            .thread_name({
                let label = label.to_string();
                move |i| format!("{}-{}", label, i)
            })
            .build()
            .map_err(|e| anyhow!("Failed to create thread pool for '{}': {}", label, e))?;

        let pb = create_progress_bar(items.len() as u64, label, self.show_progress);
        let results = Mutex::new(Vec::with_capacity(items.len()));
        let first_error: Mutex<Option<anyhow::Error>> = Mutex::new(None);
        let aborted = AtomicBool::new(false);
        let failed = AtomicUsize::new(0);

        pool.install(|| {
            items.par_iter().for_each(|item| {
                if aborted.load(Ordering::Acquire) {
                    return;
                }

                match operation(item) {
                    Ok(Some(result)) => {
                        results
                            .lock()
                            .unwrap_or_else(|p| p.into_inner())
                            .push(result);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        match &policy {
                            ErrorPolicy::Recover(handler) => handler(item, &e),
                            ErrorPolicy::Abort => {
                                aborted.store(true, Ordering::Release);
                                let mut slot = first_error.lock().unwrap_or_else(|p| p.into_inner());
                                if slot.is_none() {
                                    *slot = Some(e);
                                }
                            }
                        }
                    }
                }
                pb.inc(1);
            });
        });

        pb.finish_and_clear();

        let failed = failed.load(Ordering::Relaxed);
        if let Some(e) = first_error.into_inner().unwrap_or_else(|p| p.into_inner()) {
            warn!(stage = label, failed, "Stage aborted");
            return Err(e.context(format!("stage '{}' aborted", label)));
        }

        let results = results.into_inner().unwrap_or_else(|p| p.into_inner());
        info!(
            stage = label,
            total = items.len(),
            produced = results.len(),
            failed,
            "Stage complete"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_empty_input_is_noop() {
        let runner = TaskRunner::new(4);
        let calls = AtomicUsize::new(0);
        let out: Vec<u32> = runner
            .run("empty", &[] as &[u32], ErrorPolicy::Abort, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Some(1))
            })
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_recover_attempts_every_item() {
        let runner = TaskRunner::new(4);
        let items: Vec<u32> = (0..10).collect();
        let attempted = AtomicUsize::new(0);
        let failures = Mutex::new(Vec::new());
        let handler = |item: &u32, _e: &anyhow::Error| failures.lock().unwrap().push(*item);

        let mut out = runner
            .run("recover", &items, ErrorPolicy::Recover(&handler), |&i| {
                attempted.fetch_add(1, Ordering::SeqCst);
                if i == 3 {
                    anyhow::bail!("item {} failed", i);
                }
                Ok(Some(i * 10))
            })
            .unwrap();

        out.sort_unstable();
        assert_eq!(attempted.load(Ordering::SeqCst), 10);
        assert_eq!(out.len(), 9);
        assert!(!out.contains(&30));
        assert_eq!(*failures.lock().unwrap(), vec![3]);
    }

    #[test]
    fn test_none_results_are_dropped() {
        let runner = TaskRunner::new(2);
        let items: Vec<u32> = (0..6).collect();
        let out = runner
            .run("filter", &items, ErrorPolicy::Abort, |&i| {
                Ok(if i % 2 == 0 { Some(i) } else { None })
            })
            .unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_abort_surfaces_first_error() {
        let runner = TaskRunner::new(2);
        let items: Vec<u32> = (0..50).collect();
        let result = runner.run("abort", &items, ErrorPolicy::Abort, |&i| {
            if i == 0 {
                anyhow::bail!("boom");
            }
            std::thread::sleep(Duration::from_millis(2));
            Ok(Some(i))
        });
        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("boom"));
    }

    #[test]
    fn test_in_flight_never_exceeds_limit() {
        let limit = 3;
        let runner = TaskRunner::new(limit);
        let items: Vec<u32> = (0..24).collect();
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        runner
            .run("bounded", &items, ErrorPolicy::Abort, |_| {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(5));
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(Some(()))
            })
            .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= limit);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        assert_eq!(TaskRunner::new(0).limit(), 1);
    }
}
