// Run Controller - run phase plus the pause/cancel signals

use crate::domain::RunPhase;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Signals {
    pause: bool,
    cancel: bool,
}

/// Owns the run phase and the cooperative pause/cancel flags
///
/// The drain loop observes the flags at its suspension points; callers
/// only ever set them.
pub struct RunController {
    phase: watch::Sender<RunPhase>,
    signals: watch::Sender<Signals>,
}

impl Default for RunController {
    fn default() -> Self {
        Self::new()
    }
}

impl RunController {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(RunPhase::Idle);
        let (signals, _) = watch::channel(Signals::default());
        Self { phase, signals }
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }

    /// Receiver for phase changes
    pub fn subscribe(&self) -> watch::Receiver<RunPhase> {
        self.phase.subscribe()
    }

    pub(crate) fn set_phase(&self, phase: RunPhase) {
        self.phase.send_replace(phase);
    }

    /// Back to idle with both flags cleared
    pub(crate) fn reset(&self) {
        self.signals.send_replace(Signals::default());
        self.phase.send_replace(RunPhase::Idle);
    }

    /// Request a pause; refused once the run is over
    pub fn request_pause(&self) -> bool {
        if self.phase().is_terminal() {
            return false;
        }
        self.signals.send_if_modified(|s| {
            let changed = !s.pause;
            s.pause = true;
            changed
        });
        true
    }

    /// Clear a pause request; false when no pause was requested or the run is over
    pub fn request_resume(&self) -> bool {
        if self.phase().is_terminal() {
            return false;
        }
        self.signals.send_if_modified(|s| {
            let changed = s.pause;
            s.pause = false;
            changed
        })
    }

    /// Request cancellation; refused once the run is over
    pub fn request_cancel(&self) -> bool {
        if self.phase().is_terminal() {
            return false;
        }
        self.signals.send_if_modified(|s| {
            let changed = !s.cancel;
            s.cancel = true;
            changed
        });
        true
    }

    pub fn is_pause_requested(&self) -> bool {
        self.signals.borrow().pause
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.signals.borrow().cancel
    }

    pub fn is_interrupt_requested(&self) -> bool {
        let signals = *self.signals.borrow();
        signals.pause || signals.cancel
    }

    /// Resolves once a pause or cancel has been requested
    pub(crate) async fn interrupted(&self) {
        let mut rx = self.signals.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|s| s.pause || s.cancel).await;
    }

    /// Sleep for `duration` unless interrupted; true when the full delay elapsed
    pub(crate) async fn sleep_unless_interrupted(&self, duration: Duration) -> bool {
        if self.is_interrupt_requested() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        tokio::select! {
            _ = sleep(duration) => true,
            _ = self.interrupted() => false,
        }
    }

    /// Paused wait: polls on `poll_interval` and wakes early on any signal change.
    /// Returns once the pause is lifted or cancellation is requested.
    pub(crate) async fn wait_until_resumed(&self, poll_interval: Duration) {
        let mut rx = self.signals.subscribe();
        loop {
            let signals = *rx.borrow_and_update();
            if signals.cancel || !signals.pause {
                return;
            }
            tokio::select! {
                _ = sleep(poll_interval) => {},
                _ = rx.changed() => {},
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_flags_and_reset() {
        let controller = RunController::new();
        assert_eq!(controller.phase(), RunPhase::Idle);
        assert!(!controller.is_interrupt_requested());

        assert!(controller.request_pause());
        assert!(controller.is_pause_requested());
        assert!(controller.request_resume());
        assert!(!controller.request_resume());

        assert!(controller.request_cancel());
        assert!(controller.is_cancel_requested());

        controller.reset();
        assert!(!controller.is_interrupt_requested());
    }

    #[test]
    fn test_requests_refused_after_terminal_phase() {
        let controller = RunController::new();
        controller.set_phase(RunPhase::Cancelled);
        assert!(!controller.request_pause());
        assert!(!controller.request_cancel());
        assert!(!controller.is_interrupt_requested());
    }

    #[test]
    fn test_interrupted_wakes_on_pause() {
        let controller = RunController::new();
        let mut waiter = task::spawn(controller.interrupted());
        assert_pending!(waiter.poll());

        controller.request_pause();
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_resumed_returns_on_cancel() {
        let controller = RunController::new();
        controller.request_pause();

        let mut waiter = task::spawn(controller.wait_until_resumed(Duration::from_secs(3600)));
        assert_pending!(waiter.poll());

        controller.request_cancel();
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_unless_interrupted() {
        let controller = RunController::new();
        assert!(
            controller
                .sleep_unless_interrupted(Duration::from_millis(500))
                .await
        );

        controller.request_pause();
        assert!(
            !controller
                .sleep_unless_interrupted(Duration::from_millis(500))
                .await
        );
    }
}
