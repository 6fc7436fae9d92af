//! Bounded task fan-out with progress reporting.

use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Progress callback, called with a fraction in `[0, 1]`.
pub type ProgressFn<'a> = dyn Fn(f64) + Send + Sync + 'a;

/// Progress callback that ignores every report.
pub fn no_progress(_: f64) {}

/// Build a fixed-size worker pool. `None` uses one thread per core.
pub fn worker_pool(threads: Option<usize>) -> Result<ThreadPool, ThreadPoolBuildError> {
    let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("lithochrome-worker-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n.max(1));
    }
    builder.build()
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Run `work` over `tasks` on `pool`.
///
/// Results keep the order of `tasks`. After each task the completed count is
/// mapped into `span` and reported from the finishing thread. A task that
/// panics is logged and yields `None`; the others still run.
pub fn run_tasks<T, R, F>(
    pool: &ThreadPool,
    tasks: &[T],
    work: F,
    progress: &ProgressFn<'_>,
    span: Range<f64>,
) -> Vec<Option<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let total = tasks.len();
    let done = AtomicUsize::new(0);
    pool.install(|| {
        tasks
            .par_iter()
            .enumerate()
            .map(|(i, task)| {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(task)));
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                progress(span.start + (span.end - span.start) * finished as f64 / total as f64);
                match outcome {
                    Ok(r) => Some(r),
                    Err(payload) => {
                        log::error!("task {i} failed: {}", panic_message(payload.as_ref()));
                        None
                    }
                }
            })
            .collect()
    })
}
