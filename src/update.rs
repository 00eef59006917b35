//! Remote firmware update lifecycle.
//!
//! The update transport (whatever receives the image and writes it to flash)
//! reports its progress as [`UpdateEvent`]s. The station drains them on its
//! own thread and hands each one to the matching [`UpdateHooks`] slot.
use std::{fmt, sync::mpsc};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdateKind {
    Firmware,
    Filesystem,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdateError {
    Auth,
    Begin,
    Connect,
    Receive,
    End,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdateEvent {
    Start(UpdateKind),
    Progress { done: usize, total: usize },
    End,
    Error(UpdateError),
}

/// The handlers invoked for each kind of [`UpdateEvent`].
#[derive(Copy, Clone, Debug)]
pub struct UpdateHooks {
    pub on_start: fn(UpdateKind),
    pub on_progress: fn(usize, usize),
    pub on_end: fn(),
    pub on_error: fn(UpdateError),
}

#[derive(Debug)]
pub struct UpdateMonitor {
    events: mpsc::Receiver<UpdateEvent>,
    hooks: UpdateHooks,
}

/// Percentage of `total` that `done` represents, clamped to 100.
pub fn percent(done: usize, total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    (done.saturating_mul(100) / total).min(100)
}

// === impl UpdateKind ===

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Firmware => f.write_str("sketch"),
            Self::Filesystem => f.write_str("filesystem"),
        }
    }
}

// === impl UpdateError ===

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth => f.write_str("Auth Failed"),
            Self::Begin => f.write_str("Begin Failed"),
            Self::Connect => f.write_str("Connect Failed"),
            Self::Receive => f.write_str("Receive Failed"),
            Self::End => f.write_str("End Failed"),
        }
    }
}

// === impl UpdateHooks ===

impl UpdateHooks {
    /// Hooks that only log.
    pub const LOG: Self = Self {
        on_start: |kind| log::info!(target: "envstation::update", "Start updating {kind}"),
        on_progress: |done, total| {
            log::info!(target: "envstation::update", "Progress: {}%", percent(done, total))
        },
        on_end: || log::info!(target: "envstation::update", "End"),
        on_error: |error| log::error!(target: "envstation::update", "Error[{error:?}]: {error}"),
    };

    pub fn dispatch(&self, event: UpdateEvent) {
        match event {
            UpdateEvent::Start(kind) => (self.on_start)(kind),
            UpdateEvent::Progress { done, total } => (self.on_progress)(done, total),
            UpdateEvent::End => (self.on_end)(),
            UpdateEvent::Error(error) => (self.on_error)(error),
        }
    }
}

impl Default for UpdateHooks {
    fn default() -> Self {
        Self::LOG
    }
}

// === impl UpdateMonitor ===

impl UpdateMonitor {
    pub fn new(events: mpsc::Receiver<UpdateEvent>, hooks: UpdateHooks) -> Self {
        Self { events, hooks }
    }

    /// Dispatches every event reported since the last poll.
    pub fn poll(&mut self) -> usize {
        let mut dispatched = 0;
        while let Ok(event) = self.events.try_recv() {
            self.hooks.dispatch(event);
            dispatched += 1;
        }
        dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static SEEN: Mutex<Vec<String>> = Mutex::new(Vec::new());

    fn recording_hooks() -> UpdateHooks {
        UpdateHooks {
            on_start: |kind| SEEN.lock().unwrap().push(format!("start {kind}")),
            on_progress: |done, total| {
                SEEN.lock()
                    .unwrap()
                    .push(format!("progress {}", percent(done, total)))
            },
            on_end: || SEEN.lock().unwrap().push("end".to_owned()),
            on_error: |error| SEEN.lock().unwrap().push(format!("error {error}")),
        }
    }

    #[test]
    fn percent_never_divides_by_zero() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(10, 0), 0);
        assert_eq!(percent(50, 99), 50);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(200, 100), 100);
    }

    #[test]
    fn monitor_dispatches_in_order() {
        let (tx, rx) = mpsc::channel();
        let mut monitor = UpdateMonitor::new(rx, recording_hooks());
        assert_eq!(monitor.poll(), 0);

        tx.send(UpdateEvent::Start(UpdateKind::Firmware)).unwrap();
        tx.send(UpdateEvent::Progress { done: 512, total: 1024 }).unwrap();
        tx.send(UpdateEvent::Error(UpdateError::Receive)).unwrap();
        tx.send(UpdateEvent::End).unwrap();
        assert_eq!(monitor.poll(), 4);

        assert_eq!(
            *SEEN.lock().unwrap(),
            ["start sketch", "progress 50", "error Receive Failed", "end"]
        );
    }

    #[test]
    fn log_hooks_accept_every_event() {
        let hooks = UpdateHooks::default();
        hooks.dispatch(UpdateEvent::Start(UpdateKind::Filesystem));
        hooks.dispatch(UpdateEvent::Progress { done: 1, total: 0 });
        hooks.dispatch(UpdateEvent::Error(UpdateError::Auth));
        hooks.dispatch(UpdateEvent::End);
    }
}
