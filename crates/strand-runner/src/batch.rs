use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use strand_core::constants::DEFAULT_AUTOSUBMIT_BATCH_COUNT;
use tracing::{debug, warn};

use crate::context::ExecutionContext;

/// Admission control for multi-dataset runs: at most `max_active` contexts
/// run at once; the rest queue until a slot opens.
#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    pub max_active: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        BatchSettings {
            max_active: DEFAULT_AUTOSUBMIT_BATCH_COUNT,
        }
    }
}

impl BatchSettings {
    pub fn sequential() -> Self {
        BatchSettings { max_active: 1 }
    }

    pub fn with_max_active(max_active: usize) -> Self {
        BatchSettings {
            max_active: max_active.max(1),
        }
    }
}

/// Runs each context on its own thread, reaping finished workers and
/// admitting queued ones until everything ran. Contexts come back in their
/// original order, carrying whatever jobs the run recorded on them.
pub fn run_batch(
    contexts: Vec<ExecutionContext>,
    settings: BatchSettings,
    run: Arc<dyn Fn(ExecutionContext) -> ExecutionContext + Send + Sync>,
) -> Vec<ExecutionContext> {
    let total = contexts.len();
    let mut waiting: VecDeque<(usize, ExecutionContext)> =
        contexts.into_iter().enumerate().collect();
    let mut finished: Vec<Option<ExecutionContext>> = (0..total).map(|_| None).collect();
    let mut active: Vec<(usize, thread::JoinHandle<ExecutionContext>)> = Vec::new();

    loop {
        let mut i = 0;
        while i < active.len() {
            if active[i].1.is_finished() {
                let (index, handle) = active.swap_remove(i);
                match handle.join() {
                    Ok(context) => finished[index] = Some(context),
                    Err(_) => warn!("A dataset worker panicked; its results are lost"),
                }
            } else {
                i += 1;
            }
        }

        while active.len() < settings.max_active {
            let Some((index, context)) = waiting.pop_front() else {
                break;
            };
            debug!(
                "Starting dataset '{}' ({} of max {} active)",
                context.dataset_id(),
                active.len() + 1,
                settings.max_active
            );
            let run = Arc::clone(&run);
            active.push((index, thread::spawn(move || run(context))));
        }

        if active.is_empty() && waiting.is_empty() {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }

    finished.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextOverrides;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use strand_core::settings::Settings;

    fn context(dataset: &str) -> ExecutionContext {
        let settings = Settings::parse("backend = \"direct\"\n").unwrap();
        ExecutionContext::build(
            dataset,
            &settings,
            "STRAND_JOB_ID",
            "STRAND_QUEUE",
            &BTreeMap::new(),
            &BTreeMap::new(),
            &BTreeMap::new(),
            &ContextOverrides::default(),
        )
    }

    #[test]
    fn test_results_keep_input_order() {
        let contexts: Vec<ExecutionContext> =
            ["a", "b", "c", "d", "e"].iter().map(|d| context(d)).collect();
        let results = run_batch(
            contexts,
            BatchSettings::with_max_active(2),
            Arc::new(|ctx| ctx),
        );
        let ids: Vec<&str> = results.iter().map(|c| c.dataset_id()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_admission_never_exceeds_max_active() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(Mutex::new(0usize));

        let contexts: Vec<ExecutionContext> =
            (0..8).map(|i| context(&format!("pid_{i}"))).collect();

        let active_in_run = Arc::clone(&active);
        let peak_in_run = Arc::clone(&peak);
        let results = run_batch(
            contexts,
            BatchSettings::with_max_active(3),
            Arc::new(move |ctx| {
                let now = active_in_run.fetch_add(1, Ordering::SeqCst) + 1;
                {
                    let mut peak = peak_in_run.lock().unwrap();
                    *peak = (*peak).max(now);
                }
                std::thread::sleep(std::time::Duration::from_millis(20));
                active_in_run.fetch_sub(1, Ordering::SeqCst);
                ctx
            }),
        );

        assert_eq!(results.len(), 8);
        let peak = *peak.lock().unwrap();
        assert!(peak <= 3, "saw {peak} concurrent datasets");
        assert!(peak >= 2, "admission never overlapped");
    }

    #[test]
    fn test_sequential_batch_runs_everything() {
        let contexts = vec![context("a"), context("b")];
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_in_run = Arc::clone(&counter);
        let results = run_batch(
            contexts,
            BatchSettings::sequential(),
            Arc::new(move |ctx| {
                counter_in_run.fetch_add(1, Ordering::SeqCst);
                ctx
            }),
        );
        assert_eq!(results.len(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
