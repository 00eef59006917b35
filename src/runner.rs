//! A cooperative fixed-interval task runner.
//!
//! Every task runs to completion on the caller's thread. When a pass comes
//! late, due tasks run late; a task that fell several periods behind catches
//! up one run per pass instead of skipping or merging ticks.
use anyhow::Context;
use core::time::Duration;
use std::time::Instant;

pub const MAX_TASKS: usize = 8;

/// Upper bound on how long [`Runner::run`] sleeps between passes, so the
/// idle task (and with it the watchdog) gets a turn even when every task has
/// a long period.
const IDLE_SLICE: Duration = Duration::from_millis(10);

/// Supplies the time since startup.
pub trait Clock {
    fn uptime(&self) -> Duration;
}

/// [`Clock`] backed by [`Instant`].
#[derive(Copy, Clone, Debug)]
pub struct MonotonicClock {
    started: Instant,
}

pub type Callback<C> = fn(&mut C, Duration);

pub struct Task<C> {
    name: &'static str,
    period: Duration,
    next_due: Duration,
    enabled: bool,
    runs: u64,
    callback: Callback<C>,
}

pub struct Runner<C, const N: usize = MAX_TASKS> {
    tasks: heapless::Vec<Task<C>, N>,
}

// === impl MonotonicClock ===

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

// === impl Task ===

impl<C> Task<C> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl<C> core::fmt::Debug for Task<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("next_due", &self.next_due)
            .field("enabled", &self.enabled)
            .field("runs", &self.runs)
            .finish()
    }
}

// === impl Runner ===

impl<C, const N: usize> Runner<C, N> {
    pub const fn new() -> Self {
        Self {
            tasks: heapless::Vec::new(),
        }
    }

    /// Registers a disabled task. Tasks run in registration order within a
    /// pass.
    pub fn add_task(
        &mut self,
        name: &'static str,
        period: Duration,
        callback: Callback<C>,
    ) -> anyhow::Result<()> {
        anyhow::ensure!(!period.is_zero(), "task {name} has a zero period");
        self.tasks
            .push(Task {
                name,
                period,
                next_due: Duration::ZERO,
                enabled: false,
                runs: 0,
                callback,
            })
            .map_err(|_| anyhow::anyhow!("runner is full ({N} tasks)"))
            .with_context(|| format!("failed to add task {name}"))?;
        log::debug!(target: "envstation::runner", "added task {name} every {period:?}");
        Ok(())
    }

    /// Enables every task and makes it due at `now`.
    pub fn enable_all(&mut self, now: Duration) {
        for task in self.tasks.iter_mut() {
            task.enabled = true;
            task.next_due = now;
        }
    }

    /// Runs every task that is due at `now`, at most once each. Returns the
    /// number of task invocations.
    pub fn execute(&mut self, ctx: &mut C, now: Duration) -> usize {
        let mut ran = 0;
        for task in self.tasks.iter_mut() {
            if !task.enabled || now < task.next_due {
                continue;
            }

            (task.callback)(ctx, now);
            task.runs += 1;
            task.next_due += task.period;
            ran += 1;
        }
        ran
    }

    /// The earliest time a task becomes due, if any are enabled.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.tasks
            .iter()
            .filter(|task| task.enabled)
            .map(|task| task.next_due)
            .min()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task<C>> + '_ {
        self.tasks.iter()
    }

    /// Enables all tasks and runs them forever, sleeping between passes.
    pub fn run(&mut self, ctx: &mut C, clock: &impl Clock) -> ! {
        self.enable_all(clock.uptime());
        for task in self.tasks.iter() {
            log::info!(
                target: "envstation::runner",
                "running {} every {:?}",
                task.name,
                task.period
            );
        }

        loop {
            let now = clock.uptime();
            self.execute(ctx, now);

            let idle = self
                .next_deadline()
                .map(|deadline| deadline.saturating_sub(clock.uptime()))
                .unwrap_or(IDLE_SLICE)
                .min(IDLE_SLICE);
            // always yield, even when something is already due, so we don't
            // get killed by the doggy timer
            std::thread::sleep(idle.max(Duration::from_millis(1)));
        }
    }
}

impl<C, const N: usize> Default for Runner<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, const N: usize> core::fmt::Debug for Runner<C, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.tasks.iter()).finish()
    }
}
