//! Short-lived visual effects.
//!
//! Every effect is a small state machine driven by one background task:
//!
//! ```text
//! Entering --fade_in--> Visible --exit_at--> Exiting --fade_out--> Removed
//! ```
//!
//! The task is owned by the [`Effect`] handle. Cancelling it, or dropping the last
//! clone of the handle, stops the task and leaves no timer behind.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use crate::Result;
use crate::error::Error;

/// Longest delay an effect schedules. Later deadlines are treated as this far out.
pub const MAX_SPAN: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Lifecycle phase of an effect.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum EffectPhase {
    /// Fading in
    Entering,
    /// Fully shown
    Visible,
    /// Fading out
    Exiting,
    /// Gone; the renderer should forget the effect
    Removed,
}

impl EffectPhase {
    /// Whether the effect can still be postponed with [`Effect::hold_for`].
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Entering | Self::Visible)
    }
}

/// Timing of an effect.
///
/// `exit_at` is measured from the moment the effect is spawned, so it should be at
/// least `fade_in`.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    pub fade_in: Duration,
    pub exit_at: Duration,
    pub fade_out: Duration,
}

impl Timeline {
    #[must_use]
    pub const fn new(fade_in: Duration, exit_at: Duration, fade_out: Duration) -> Self {
        Self {
            fade_in,
            exit_at,
            fade_out,
        }
    }

    /// Total time from spawn to removal, absent any interference.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.exit_at.max(self.fade_in).saturating_add(self.fade_out)
    }
}

/// Unique, time-ordered identifier of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EffectId(Uuid);

impl EffectId {
    fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

struct Shared {
    phase_tx: watch::Sender<EffectPhase>,
    deadline_tx: watch::Sender<Instant>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

/// Handle to a running effect. Cheap to clone.
#[derive(Clone)]
pub struct Effect {
    id: EffectId,
    timeline: Timeline,
    shared: Arc<Shared>,
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("timeline", &self.timeline)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl Effect {
    /// Spawn the effect's task. Fails outside a Tokio runtime.
    pub fn spawn(timeline: Timeline) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::validation(format!("a Tokio runtime is required: {e}")))?;

        let start = Instant::now();
        let (phase_tx, _) = watch::channel(EffectPhase::Entering);
        let (deadline_tx, deadline_rx) = watch::channel(after(start, timeline.exit_at));
        let cancel = CancellationToken::new();

        let shared = Arc::new(Shared {
            phase_tx,
            deadline_tx,
            cancel: cancel.clone(),
            _guard: cancel.clone().drop_guard(),
        });

        runtime.spawn(drive(
            start,
            timeline,
            Arc::downgrade(&shared),
            deadline_rx,
            cancel,
        ));

        Ok(Self {
            id: EffectId::new(),
            timeline,
            shared,
        })
    }

    #[must_use]
    pub const fn id(&self) -> EffectId {
        self.id
    }

    #[must_use]
    pub const fn timeline(&self) -> Timeline {
        self.timeline
    }

    #[must_use]
    pub fn phase(&self) -> EffectPhase {
        *self.shared.phase_tx.borrow()
    }

    /// Subscribe to phase changes.
    #[must_use]
    pub fn phase_receiver(&self) -> watch::Receiver<EffectPhase> {
        self.shared.phase_tx.subscribe()
    }

    /// Move the exit deadline to `duration` from now.
    ///
    /// Has no effect once the effect is exiting.
    pub fn hold_for(&self, duration: Duration) {
        self.shared.deadline_tx.send_replace(after(Instant::now(), duration));
    }

    /// Start exiting as soon as the effect is fully shown.
    pub fn dismiss(&self) {
        self.shared.deadline_tx.send_replace(Instant::now());
    }

    /// Remove the effect immediately and stop its task.
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
        self.shared.phase_tx.send_replace(EffectPhase::Removed);
    }

    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.phase() == EffectPhase::Removed
    }

    /// Wait until the effect reaches [`EffectPhase::Removed`].
    pub async fn removed(&self) {
        let mut phase = self.phase_receiver();
        _ = phase
            .wait_for(|phase| *phase == EffectPhase::Removed)
            .await;
    }
}

fn after(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay.min(MAX_SPAN)).unwrap_or(from)
}

async fn drive(
    start: Instant,
    timeline: Timeline,
    shared: std::sync::Weak<Shared>,
    mut deadline_rx: watch::Receiver<Instant>,
    cancel: CancellationToken,
) {
    let set_phase = |phase: EffectPhase| {
        if let Some(shared) = shared.upgrade() {
            shared.phase_tx.send_replace(phase);
        }
    };

    tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        () = sleep_until(after(start, timeline.fade_in)) => {}
    }
    set_phase(EffectPhase::Visible);

    loop {
        let deadline = *deadline_rx.borrow_and_update();
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            changed = deadline_rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            () = sleep_until(deadline) => break,
        }
    }
    set_phase(EffectPhase::Exiting);

    tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        () = sleep_until(after(Instant::now(), timeline.fade_out)) => {}
    }
    set_phase(EffectPhase::Removed);
}

#[cfg(test)]
mod tests {
    use tokio::time::sleep;

    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn timeline() -> Timeline {
        Timeline::new(ms(500), ms(5000), ms(1000))
    }

    #[test]
    fn spawn_outside_runtime_fails() {
        Effect::spawn(timeline()).unwrap_err();
    }

    #[test]
    fn phase_names() {
        assert_eq!(EffectPhase::Entering.to_string(), "entering");
        assert_eq!(EffectPhase::Removed.to_string(), "removed");
        assert_eq!(timeline().total(), ms(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn walks_each_phase_on_time() {
        let effect = Effect::spawn(timeline()).unwrap();
        assert_eq!(effect.phase(), EffectPhase::Entering);

        sleep(ms(499)).await;
        assert_eq!(effect.phase(), EffectPhase::Entering);

        sleep(ms(2)).await;
        assert_eq!(effect.phase(), EffectPhase::Visible);

        sleep(ms(4498)).await;
        assert_eq!(effect.phase(), EffectPhase::Visible);

        sleep(ms(2)).await;
        assert_eq!(effect.phase(), EffectPhase::Exiting);

        sleep(ms(1000)).await;
        assert_eq!(effect.phase(), EffectPhase::Removed);
    }

    #[tokio::test(start_paused = true)]
    async fn hold_for_postpones_exit() {
        let effect = Effect::spawn(timeline()).unwrap();

        sleep(ms(4000)).await;
        effect.hold_for(ms(3000));

        sleep(ms(2999)).await;
        assert_eq!(effect.phase(), EffectPhase::Visible);

        sleep(ms(2)).await;
        assert_eq!(effect.phase(), EffectPhase::Exiting);
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_exits_after_fade_in() {
        let effect = Effect::spawn(timeline()).unwrap();
        effect.dismiss();

        sleep(ms(501)).await;
        assert_eq!(effect.phase(), EffectPhase::Exiting);

        effect.removed().await;
        assert!(effect.is_removed());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_removes_immediately() {
        let effect = Effect::spawn(timeline()).unwrap();
        let mut phases = effect.phase_receiver();

        effect.cancel();
        assert_eq!(effect.phase(), EffectPhase::Removed);

        sleep(ms(10_000)).await;
        assert_eq!(*phases.borrow_and_update(), EffectPhase::Removed);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_task() {
        let effect = Effect::spawn(timeline()).unwrap();
        let mut phases = effect.phase_receiver();
        drop(effect);

        // The sender lives in the dropped handle, so the channel closes.
        phases.changed().await.unwrap_err();
    }

    #[tokio::test(start_paused = true)]
    async fn huge_deadlines_are_capped() {
        let forever = Timeline::new(ms(10), Duration::MAX, Duration::MAX);
        assert_eq!(forever.total(), Duration::MAX);

        let effect = Effect::spawn(forever).unwrap();
        effect.hold_for(Duration::MAX);

        sleep(ms(20)).await;
        assert_eq!(effect.phase(), EffectPhase::Visible);

        effect.dismiss();
        sleep(ms(1)).await;
        assert_eq!(effect.phase(), EffectPhase::Exiting);

        sleep(MAX_SPAN).await;
        assert_eq!(effect.phase(), EffectPhase::Removed);
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let a = Effect::spawn(timeline()).unwrap();
        let b = Effect::spawn(timeline()).unwrap();

        assert_ne!(a.id(), b.id());
    }
}
