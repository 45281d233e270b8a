/// WorldState: the complete snapshot of a running session.
///
/// ## Ownership
///
/// The session is the only writer of lives, score, inventory, level
/// index and the delivery counters. Movement code mutates movers only;
/// rules code reads.
///
/// ## Delivery accounting
///
///   - `plutonium_total` = samples the level still expects
///   - `delivered`       = samples dropped into barrels
///   - remaining         = total - delivered
///
/// A sample lost to the countdown (or to a life loss while carried) is
/// gone for good, so it leaves `plutonium_total`. The exit activates the
/// moment remaining hits zero.

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::{GameConfig, MovementConfig, SessionConfig};
use crate::domain::entity::{Barrel, Enemy, EntityHandle, Exit, Item, Player};
use crate::domain::grid::{Cell, Dir, Grid};
use crate::sim::level::LevelGenerator;
use super::ports::HudSink;
use super::timer::{TimerKind, Timers};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    LevelActive,
    /// Exit reached; next level generated when the delay fires.
    LevelTransition,
    /// Final score on screen; level 1 starts when the hold fires.
    GameOver,
}

pub struct WorldState {
    // ── Level layout ──
    pub grid: Grid,
    pub wall_handles: Vec<EntityHandle>,
    pub start: Cell,

    // ── Entities ──
    pub player: Player,
    pub enemies: Vec<Enemy>,
    pub items: Vec<Item>,
    pub barrels: Vec<Barrel>,
    pub exit: Option<Exit>,

    // ── Delivery tracking ──
    pub plutonium_total: u32,
    pub delivered: u32,

    // ── Meta ──
    pub phase: Phase,
    pub score: u32,
    pub level: u32,
    pub paused: bool,
    /// Guards against completing the same level twice.
    pub level_complete: bool,

    // ── Scheduling ──
    pub timers: Timers,
    /// Enemy-pair id -> seconds until it may separate again.
    pub separation_cooldowns: HashMap<(usize, usize), f32>,
    /// Last direction reported as blocked; edge-triggers `MoveBlocked`.
    pub blocked_dir: Dir,

    // ── Tuning ──
    pub movement: MovementConfig,
    pub session: SessionConfig,
    pub generator: LevelGenerator,

    // ── Randomness ──
    /// Session seed; per-level seeds derive from it.
    pub seed: u64,
    /// Runtime randomness (enemy turns, search order).
    pub rng: ChaCha8Rng,

    // ── UI ──
    pub message: String,
}

// ── Construction ──

impl WorldState {
    pub fn new(config: &GameConfig, seed: u64) -> Self {
        let generator = LevelGenerator::new(config.level.generator, config.level.gen_params());
        let start = generator.start_cell();
        let s = &config.session;
        WorldState {
            grid: Grid::new(0, 0),
            wall_handles: vec![],
            start,
            player: Player::new(start, config.movement.player_speed, s.lives, s.start_blocks),
            enemies: vec![],
            items: vec![],
            barrels: vec![],
            exit: None,
            plutonium_total: 0,
            delivered: 0,
            phase: Phase::LevelActive,
            score: 0,
            level: 1,
            paused: false,
            level_complete: false,
            timers: Timers::new(),
            separation_cooldowns: HashMap::new(),
            blocked_dir: Dir::None,
            movement: config.movement.clone(),
            session: s.clone(),
            generator,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            message: String::new(),
        }
    }

    pub fn plutonium_remaining(&self) -> u32 {
        self.plutonium_total.saturating_sub(self.delivered)
    }

    /// Whole seconds left to deliver, rounded up. `None` when not carrying.
    pub fn delivery_seconds_left(&self) -> Option<u32> {
        if !self.player.carrying { return None; }
        self.timers.remaining(TimerKind::DeliveryCountdown)
            .map(|s| s.max(0.0).ceil() as u32)
    }

    pub fn exit_active(&self) -> bool {
        self.exit.as_ref().is_some_and(|e| e.active)
    }

    pub fn set_message(&mut self, msg: &str, hud: &mut dyn HudSink) {
        self.message = msg.to_string();
        hud.show_message(msg);
    }

    /// Push every displayed value to the HUD.
    pub fn publish_hud(&self, hud: &mut dyn HudSink) {
        hud.update_timer(self.delivery_seconds_left());
        hud.update_plutonium_remaining(self.plutonium_remaining());
        hud.update_lives(self.player.lives);
        hud.update_blocks(self.player.blocks);
        hud.update_score(self.score);
        hud.update_level(self.level);
    }
}
