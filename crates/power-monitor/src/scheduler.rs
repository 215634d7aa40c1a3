use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Work run on every tick of a repeating timer.
pub type RepeatTask = Box<dyn FnMut() + Send + 'static>;

/// Shortest period a scheduler will run a task at.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Host loop that runs repeating timers.
///
/// Tasks share one loop and must return quickly. The first run happens one `interval` after
/// registration; there is no way to cancel a single task.
pub trait Scheduler {
    fn on_repeat(&mut self, interval: Duration, task: RepeatTask);
}

struct Timer {
    interval: Duration,
    next_due: Duration,
    task: RepeatTask,
}

/// Scheduler driven by a virtual clock; nothing runs until [`advance`](Self::advance).
#[derive(Default)]
pub struct ManualScheduler {
    now: Duration,
    timers: Vec<Timer>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Move the clock forward, running every tick that falls due in time order. Returns the
    /// number of ticks run.
    pub fn advance(&mut self, by: Duration) -> usize {
        let target = self.now + by;
        let mut fired = 0;
        loop {
            let next = self
                .timers
                .iter()
                .enumerate()
                .filter(|(_, t)| t.next_due <= target)
                .min_by_key(|(i, t)| (t.next_due, *i))
                .map(|(i, _)| i);
            let Some(i) = next else { break };
            let timer = &mut self.timers[i];
            self.now = timer.next_due;
            (timer.task)();
            timer.next_due += timer.interval;
            fired += 1;
        }
        self.now = target;
        fired
    }
}

impl Scheduler for ManualScheduler {
    fn on_repeat(&mut self, interval: Duration, task: RepeatTask) {
        let interval = interval.max(MIN_INTERVAL);
        self.timers.push(Timer {
            interval,
            next_due: self.now + interval,
            task,
        });
    }
}

/// Runs each repeating task as a tokio task driven by [`tokio::time::interval`].
///
/// Must be used from inside a runtime. On a `current_thread` runtime every tick shares the
/// one loop, which is the intended setup. Late ticks are skipped rather than bunched up.
/// Dropping the scheduler aborts its tasks.
#[derive(Default)]
pub struct TokioScheduler {
    handles: Vec<JoinHandle<()>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_count(&self) -> usize {
        self.handles.len()
    }

    /// Abort every task started by this scheduler.
    pub fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Scheduler for TokioScheduler {
    fn on_repeat(&mut self, interval: Duration, mut task: RepeatTask) {
        let period = interval.max(MIN_INTERVAL);
        let start = Instant::now() + period;
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                task();
            }
        });
        self.handles.push(handle);
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn counter() -> (Arc<AtomicUsize>, RepeatTask) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let task: RepeatTask = Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, task)
    }

    #[test]
    fn test_manual_first_tick_after_one_interval() {
        let mut sched = ManualScheduler::new();
        let (count, task) = counter();
        sched.on_repeat(Duration::from_millis(100), task);

        assert_eq!(sched.advance(Duration::from_millis(99)), 0);
        assert_eq!(sched.advance(Duration::from_millis(1)), 1);
        assert_eq!(sched.advance(Duration::from_millis(1_000)), 10);
        assert_eq!(count.load(Ordering::SeqCst), 11);
        assert_eq!(sched.now(), Duration::from_millis(1_100));
    }

    #[test]
    fn test_manual_runs_ticks_in_time_order() {
        let mut sched = ManualScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for (name, ms) in [("slow", 300u64), ("fast", 100)] {
            let order = order.clone();
            sched.on_repeat(
                Duration::from_millis(ms),
                Box::new(move || order.lock().unwrap().push(name)),
            );
        }
        sched.advance(Duration::from_millis(300));
        assert_eq!(*order.lock().unwrap(), vec!["fast", "fast", "slow", "fast"]);
        assert_eq!(sched.timer_count(), 2);
    }

    #[test]
    fn test_manual_zero_interval_is_clamped() {
        let mut sched = ManualScheduler::new();
        let (count, task) = counter();
        sched.on_repeat(Duration::ZERO, task);
        assert_eq!(sched.advance(Duration::from_millis(5)), 5);
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_ticks_on_interval() {
        let mut sched = TokioScheduler::new();
        let (count, task) = counter();
        sched.on_repeat(Duration::from_millis(500), task);
        assert_eq!(sched.task_count(), 1);

        time::sleep(Duration::from_millis(499)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_millis(1_002)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        sched.shutdown();
        time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
