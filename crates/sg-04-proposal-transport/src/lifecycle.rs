//! Process lifecycle: the start gate and the exit flag.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::error;

/// Shared start gate and cancellation flag.
///
/// Threads block on [`Lifecycle::wait_for_start`] until the enclosing node
/// has wired every subsystem, so no traffic is handled half-initialized.
/// [`Lifecycle::request_exit`] is the sole cancellation channel; long loops
/// re-check it after every blocking call and condvar wake.
#[derive(Debug, Default)]
pub struct Lifecycle {
    exit_requested: AtomicBool,
    started: Mutex<bool>,
    start_cond: Condvar,
}

impl Lifecycle {
    /// A lifecycle that has neither started nor been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether shutdown has been requested.
    pub fn exit_requested(&self) -> bool {
        self.exit_requested.load(Ordering::SeqCst)
    }

    /// Request shutdown and wake anyone still at the start gate.
    pub fn request_exit(&self) {
        self.exit_requested.store(true, Ordering::SeqCst);
        let _guard = self.started.lock();
        self.start_cond.notify_all();
    }

    /// Open the start gate.
    pub fn signal_start(&self) {
        let mut started = self.started.lock();
        *started = true;
        self.start_cond.notify_all();
    }

    /// Block until the start gate opens or shutdown is requested.
    pub fn wait_for_start(&self) {
        let mut started = self.started.lock();
        while !*started && !self.exit_requested() {
            self.start_cond.wait(&mut started);
        }
    }

    /// Unrecoverable-invariant path: log and bring the node down.
    pub fn exit_on_fatal_error(&self, reason: &str) {
        error!(reason, "fatal error, requesting node shutdown");
        self.request_exit();
    }
}
