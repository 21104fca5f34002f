//! Scoped worker pool for batch model fitting.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};

/// Overrides [`WorkerCount::All`] when set to a positive integer.
pub const WORKERS_ENV: &str = "CREDITLAB_WORKERS";

/// How many worker threads a grid search may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerCount {
    /// Available parallelism, or `CREDITLAB_WORKERS` when set.
    #[default]
    All,
    Fixed(NonZeroUsize),
}

impl WorkerCount {
    /// `0` means [`WorkerCount::All`].
    pub fn from_config(workers: usize) -> Self {
        NonZeroUsize::new(workers).map_or(Self::All, Self::Fixed)
    }

    /// Threads to spawn for `tasks` queued tasks (never more than the task count).
    pub fn resolve(&self, tasks: usize) -> usize {
        let wanted = match self {
            Self::Fixed(n) => n.get(),
            Self::All => env_worker_override().unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            }),
        };
        wanted.min(tasks).max(1)
    }
}

fn env_worker_override() -> Option<usize> {
    let value = std::env::var(WORKERS_ENV).ok()?;
    value.trim().parse::<usize>().ok().filter(|&parsed| parsed >= 1)
}

/// Run `work` over every task on `workers` threads.
///
/// Results come back in task order regardless of scheduling. A panicking task
/// yields an `Err` with the panic message and the worker moves on.
pub fn run_tasks<T, R, F>(tasks: Vec<T>, workers: usize, work: F) -> Vec<Result<R, String>>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let total = tasks.len();
    if total == 0 {
        return Vec::new();
    }
    let worker_count = workers.clamp(1, total);
    let queue = Arc::new(Mutex::new(tasks.into_iter().enumerate().collect::<VecDeque<_>>()));
    let (tx, rx) = channel();
    let work = &work;

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            scope.spawn(move || {
                loop {
                    let next = {
                        let mut guard = match queue.lock() {
                            Ok(guard) => guard,
                            Err(_) => return,
                        };
                        guard.pop_front()
                    };
                    let Some((index, task)) = next else {
                        break;
                    };
                    let outcome = catch_unwind(AssertUnwindSafe(|| work(task)))
                        .map_err(panic_to_string);
                    if tx.send((index, outcome)).is_err() {
                        return;
                    }
                }
            });
        }
        drop(tx);
    });

    let mut slots: Vec<Option<Result<R, String>>> = (0..total).map(|_| None).collect();
    for (index, outcome) in rx {
        slots[index] = Some(outcome);
    }
    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err("task was not run".to_string())))
        .collect()
}

fn panic_to_string(payload: Box<dyn std::any::Any + Send>) -> String {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown panic payload".to_string()
    };
    format!("Worker panicked: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_keep_task_order() {
        let tasks: Vec<u64> = (0..50).collect();
        let results = run_tasks(tasks, 4, |n| {
            if n % 7 == 0 {
                std::thread::yield_now();
            }
            n * n
        });
        let values: Vec<u64> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, (0..50u64).map(|n| n * n).collect::<Vec<_>>());
    }

    #[test]
    fn panics_become_errors() {
        let results = run_tasks(vec![1, 2, 3], 2, |n| {
            if n == 2 {
                panic!("bad task {n}");
            }
            n
        });
        assert_eq!(results[0], Ok(1));
        assert!(results[1].as_ref().unwrap_err().contains("bad task 2"));
        assert_eq!(results[2], Ok(3));
    }

    #[test]
    fn worker_count_is_capped_by_tasks() {
        let fixed = WorkerCount::Fixed(NonZeroUsize::new(8).unwrap());
        assert_eq!(fixed.resolve(3), 3);
        assert_eq!(fixed.resolve(20), 8);
        assert_eq!(WorkerCount::from_config(0), WorkerCount::All);
        assert!(WorkerCount::All.resolve(1) == 1);
        assert!(run_tasks(Vec::<u8>::new(), 4, |n| n).is_empty());
    }
}
