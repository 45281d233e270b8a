/// Keyboard input tracker.
///
/// Feeds a `DirectionLatch` so that:
///   - Movement is continuous while a direction key is held
///   - Releasing a key only stops movement if it was the held direction
///   - Block placement, reset, pause and quit are edge-triggered
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't support it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::domain::entity::{DirectionLatch, FrameInput};
use crate::domain::grid::Dir;

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum KeyAction {
    Move(Dir),
    PlaceBlock,
    Reset,
    Pause,
    Quit,
}

/// Fixed key bindings: arrows/WASD move, Space/E place, R resets,
/// P/F1 pause, Esc/Q quit.
pub fn map_key(code: KeyCode) -> Option<KeyAction> {
    let action = match code {
        KeyCode::Up | KeyCode::Char('w') | KeyCode::Char('W') => KeyAction::Move(Dir::Up),
        KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('S') => KeyAction::Move(Dir::Down),
        KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => KeyAction::Move(Dir::Left),
        KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => KeyAction::Move(Dir::Right),
        KeyCode::Char(' ') | KeyCode::Char('e') | KeyCode::Char('E') => KeyAction::PlaceBlock,
        KeyCode::Char('r') | KeyCode::Char('R') => KeyAction::Reset,
        KeyCode::Char('p') | KeyCode::Char('P') | KeyCode::F(1) => KeyAction::Pause,
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => KeyAction::Quit,
        _ => return None,
    };
    Some(action)
}

/// Everything the main loop needs from one frame of input.
#[derive(Clone, Copy, Debug, Default)]
pub struct Controls {
    pub frame: FrameInput,
    pub reset: bool,
    pub pause: bool,
    pub quit: bool,
}

pub struct InputState {
    latch: DirectionLatch,

    /// Timestamp of last Press/Repeat event for each held direction.
    last_active: HashMap<Dir, Instant>,

    /// Edge-triggered actions collected since the last `take_controls`.
    pending: Controls,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            latch: DirectionLatch::default(),
            last_active: HashMap::with_capacity(4),
            pending: Controls::default(),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events and return this frame's controls.
    /// Call this once per frame, before the simulation tick.
    pub fn drain_events(&mut self) -> Controls {
        // Read all available events without blocking
        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.apply_key(key, Instant::now());
            }
        }
        self.take_controls(Instant::now())
    }

    pub fn apply_key(&mut self, key: KeyEvent, now: Instant) {
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        {
            self.pending.quit = true;
            return;
        }
        let Some(action) = map_key(key.code) else { return };

        match (key.kind, action) {
            (KeyEventKind::Release, KeyAction::Move(dir)) if self.honor_release => {
                self.last_active.remove(&dir);
                self.latch.release(dir);
            }
            // Without enhancement, releases are inferred from the timeout.
            (KeyEventKind::Release, _) => {}
            (_, KeyAction::Move(dir)) => {
                let fresh = !self.last_active.contains_key(&dir);
                self.last_active.insert(dir, now);
                // Only a fresh press latches; repeats of an older key
                // never take the direction back.
                if fresh { self.latch.press(dir); }
            }
            (KeyEventKind::Repeat, _) => {}
            (_, KeyAction::PlaceBlock) => self.pending.frame.place_block = true,
            (_, KeyAction::Reset) => self.pending.reset = true,
            (_, KeyAction::Pause) => self.pending.pause = true,
            (_, KeyAction::Quit) => self.pending.quit = true,
        }
    }

    /// Expire timed-out keys and hand over the frame's controls.
    /// Releasing the held direction stops movement even if another
    /// direction key is still down; that key moves again on its next press.
    pub fn take_controls(&mut self, now: Instant) -> Controls {
        let expired: Vec<Dir> = self.last_active.iter()
            .filter(|(_, t)| now.duration_since(**t) >= HOLD_TIMEOUT)
            .map(|(d, _)| *d)
            .collect();
        for dir in expired {
            self.last_active.remove(&dir);
            self.latch.release(dir);
        }

        let mut controls = std::mem::take(&mut self.pending);
        controls.frame.movement = self.latch.current();
        controls
    }

    /// Forget held keys (focus loss, pause, level change).
    pub fn clear(&mut self) {
        self.latch.clear();
        self.last_active.clear();
    }
}
