/// Session timers: one-shot and repeating countdowns in seconds.
///
/// Driven from the frame step (`advance(dt)`), never from another
/// thread, so firing is always between two consistent world states.
/// Fired timers are returned to the caller, which applies their effect
/// before anything else in the tick reads the world.
///
/// Delivery countdown is single-active: `restart` cancels any pending
/// instance of the same kind before scheduling a new one.

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TimerKind {
    /// Carried sample must reach a barrel before this fires.
    DeliveryCountdown,
    /// Delay between exit reached and next level generated.
    LevelTransition,
    /// Toggles exit visibility once active.
    ExitBlink,
    /// How long the final score stays up before level 1 starts.
    GameOverHold,
    /// Enemy contact ignored while pending (after a respawn).
    RespawnGrace,
}

#[derive(Clone, Debug)]
struct Timer {
    kind: TimerKind,
    remaining: f32,
    /// Some = repeating with this period.
    period: Option<f32>,
}

#[derive(Clone, Debug, Default)]
pub struct Timers {
    timers: Vec<Timer>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, kind: TimerKind, seconds: f32) {
        self.push(kind, seconds, None);
    }

    pub fn schedule_repeating(&mut self, kind: TimerKind, period: f32) {
        self.push(kind, period, Some(period.max(f32::EPSILON)));
    }

    /// Cancel every pending timer of `kind`, then schedule a fresh one.
    pub fn restart(&mut self, kind: TimerKind, seconds: f32) {
        self.cancel_kind(kind);
        self.schedule(kind, seconds);
    }

    fn push(&mut self, kind: TimerKind, seconds: f32, period: Option<f32>) {
        self.timers.push(Timer { kind, remaining: seconds.max(0.0), period });
    }

    pub fn cancel_kind(&mut self, kind: TimerKind) {
        self.timers.retain(|t| t.kind != kind);
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.timers.iter().any(|t| t.kind == kind)
    }

    /// Seconds left on the soonest timer of `kind`.
    pub fn remaining(&self, kind: TimerKind) -> Option<f32> {
        self.timers.iter()
            .filter(|t| t.kind == kind)
            .map(|t| t.remaining)
            .reduce(f32::min)
    }

    /// Advance all timers by `dt`. Returns the kinds that fired, in
    /// scheduling order. A repeating timer fires at most once per call.
    pub fn advance(&mut self, dt: f32) -> Vec<TimerKind> {
        let mut fired = Vec::new();
        self.timers.retain_mut(|t| {
            t.remaining -= dt;
            if t.remaining > 0.0 { return true; }
            fired.push(t.kind);
            match t.period {
                Some(p) => {
                    t.remaining += p;
                    if t.remaining <= 0.0 { t.remaining = p; }
                    true
                }
                None => false,
            }
        });
        fired
    }
}
