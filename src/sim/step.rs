/// The step function: advances the session by one frame.
///
/// Processing order:
///   1. Timers (delivery countdown, transition, exit blink, game-over hold)
///   2. Facing update + block placement
///   3. Player movement (block in the way is collected instead)
///   4. Enemy movement (sequential: earlier claims block later enemies)
///   5. Enemy-enemy separation
///   6. Enemy-player contact (at most one life per tick)
///   7. Pickup / delivery / exit rules
///   8. Scene + HUD sync
///
/// Nothing past step 1 runs unless the phase is `LevelActive`; nothing at
/// all runs while paused. No function here returns an error to the loop:
/// rejected actions become events, odd entities are logged and dropped.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::domain::ai;
use crate::domain::entity::{Barrel, Enemy, Exit, FrameInput, Item, ItemKind, Mover};
use crate::domain::grid::{world_coord, Cell, Dir};
use crate::domain::motion::{self, Arrival, FieldView};
use crate::domain::rules::{self, PlaceError, PlacementView};
use super::event::GameEvent;
use super::level::GeneratedLevel;
use super::ports::{EntityKind, HudSink, RenderSurface};
use super::timer::TimerKind;
use super::world::{Phase, WorldState};

/// Longest frame the simulation accepts; longer stalls are clamped.
const MAX_DT: f32 = 0.1;

/// Height above ground for movers in world units.
const MOVER_HEIGHT: f32 = 0.5;

fn secs(ms: u64) -> f32 {
    ms as f32 / 1000.0
}

/// Per-level seed derived from the session seed.
pub fn level_seed(session_seed: u64, level: u32) -> u64 {
    session_seed ^ (level as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(
    world: &mut WorldState,
    input: FrameInput,
    dt: f32,
    surface: &mut dyn RenderSurface,
    hud: &mut dyn HudSink,
) -> Vec<GameEvent> {
    let mut events: Vec<GameEvent> = Vec::new();
    if world.paused { return events; }

    let dt = dt.clamp(0.0, MAX_DT);

    resolve_timers(world, dt, surface, hud, &mut events);
    if world.phase != Phase::LevelActive {
        world.publish_hud(hud);
        return events;
    }

    if !input.movement.is_none() { world.player.facing = input.movement; }
    if input.place_block {
        match place_block(world, surface, hud, &mut events) {
            Ok(cell) => debug!(x = cell.x, z = cell.z, "block placed"),
            Err(e) => debug!(error = %e, "block placement rejected"),
        }
    }

    resolve_player_movement(world, input.movement, dt, surface, &mut events);
    drop_malformed_enemies(world, surface);
    resolve_enemy_movement(world, dt);
    resolve_separation(world, dt, &mut events);
    if !resolve_enemy_collision(world, surface, hud, &mut events) {
        resolve_pickups(world, surface, hud, &mut events);
    }

    sync_positions(world, surface);
    world.publish_hud(hud);
    events
}

// ══════════════════════════════════════════════════════════════
// Session lifecycle
// ══════════════════════════════════════════════════════════════

pub fn start_session(
    world: &mut WorldState,
    surface: &mut dyn RenderSurface,
    hud: &mut dyn HudSink,
) -> Vec<GameEvent> {
    let mut events = Vec::new();
    info!(seed = world.seed, variant = world.generator.curve.name(), "session started");
    load_level(world, 1, surface, hud, &mut events);
    events
}

/// Full reset to level 1. Takes precedence over a pending transition
/// or game-over hold: all timers are dropped first.
pub fn reset_game(
    world: &mut WorldState,
    surface: &mut dyn RenderSurface,
    hud: &mut dyn HudSink,
) -> Vec<GameEvent> {
    let mut events = Vec::new();
    info!(level = world.level, score = world.score, "session reset");
    world.timers.clear();
    reset_session_values(world);
    load_level(world, 1, surface, hud, &mut events);
    events
}

pub fn toggle_pause(world: &mut WorldState, hud: &mut dyn HudSink) {
    world.paused = !world.paused;
    let msg = if world.paused { "PAUSED (P to resume)" } else { "" };
    world.set_message(msg, hud);
}

fn reset_session_values(world: &mut WorldState) {
    world.player.lives = world.session.lives;
    world.player.blocks = world.session.start_blocks;
    world.player.carrying = false;
    world.player.facing = Dir::Right;
    world.score = 0;
    world.level = 1;
    world.paused = false;
}

/// Generate level `level` from its derived seed and install it.
pub fn load_level(
    world: &mut WorldState,
    level: u32,
    surface: &mut dyn RenderSurface,
    hud: &mut dyn HudSink,
    events: &mut Vec<GameEvent>,
) {
    let seed = level_seed(world.seed, level);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let generated = world.generator.generate(level, &mut rng);
    info!(
        level,
        variant = world.generator.curve.name(),
        seed,
        walls = generated.grid.wall_count(),
        enemies = generated.enemies.len(),
        plutonium = generated.plutonium.len(),
        blocks = generated.blocks.len(),
        skipped = generated.skipped,
        "level generated"
    );
    install_level(world, level, generated, &mut rng, surface, hud, events);
    events.push(GameEvent::LevelGenerated { level, seed });
}

/// Tear down the current level and build entities for `lvl`.
/// Lives, inventory and score carry over.
pub fn install_level<R: Rng + ?Sized>(
    world: &mut WorldState,
    level: u32,
    lvl: GeneratedLevel,
    rng: &mut R,
    surface: &mut dyn RenderSurface,
    hud: &mut dyn HudSink,
    events: &mut Vec<GameEvent>,
) {
    clear_level(world, surface);

    world.wall_handles = lvl.grid.walls()
        .map(|c| surface.spawn_entity(EntityKind::Wall, c))
        .collect();
    world.grid = lvl.grid;
    world.start = lvl.start;

    world.barrels = lvl.barrels.iter()
        .map(|&c| Barrel { cell: c, handle: surface.spawn_entity(EntityKind::Barrel, c) })
        .collect();

    for &c in &lvl.plutonium {
        let mut item = Item::new(ItemKind::Plutonium, c);
        item.handle = surface.spawn_entity(EntityKind::Plutonium, c);
        world.items.push(item);
    }
    for &c in &lvl.blocks {
        let mut item = Item::new(ItemKind::Block, c);
        item.handle = surface.spawn_entity(EntityKind::Block, c);
        world.items.push(item);
    }

    world.exit = lvl.exit.map(|c| {
        let mut exit = Exit::new(c);
        exit.handle = surface.spawn_entity(EntityKind::Exit, c);
        surface.set_entity_visible(exit.handle, false);
        exit
    });

    let (min, variation) = (world.movement.enemy_speed_min, world.movement.enemy_speed_variation);
    for (id, &c) in lvl.enemies.iter().enumerate() {
        let speed = min + rng.gen::<f32>() * variation;
        let mut enemy = Enemy::new(id, c, speed);
        enemy.handle = surface.spawn_entity(EntityKind::Enemy, c);
        world.enemies.push(enemy);
    }

    world.player.mover.teleport(world.start);
    world.player.mover.speed = world.movement.player_speed;
    world.player.carrying = false;
    world.player.handle = surface.spawn_entity(EntityKind::Player, world.start);

    world.level = level;
    world.phase = Phase::LevelActive;
    world.level_complete = false;
    world.plutonium_total = lvl.plutonium.len() as u32;
    world.delivered = 0;
    world.timers.clear();
    world.separation_cooldowns.clear();
    world.blocked_dir = Dir::None;

    sync_positions(world, surface);
    world.set_message(&format!("Level {level}"), hud);
    activate_exit_if_done(world, surface, hud, events);
    world.publish_hud(hud);
}

fn clear_level(world: &mut WorldState, surface: &mut dyn RenderSurface) {
    for h in world.wall_handles.drain(..) {
        surface.remove_entity(h);
    }
    for item in world.items.drain(..) {
        if !item.collected { surface.remove_entity(item.handle); }
    }
    for b in world.barrels.drain(..) {
        surface.remove_entity(b.handle);
    }
    for e in world.enemies.drain(..) {
        surface.remove_entity(e.handle);
    }
    if let Some(exit) = world.exit.take() {
        surface.remove_entity(exit.handle);
    }
    surface.remove_entity(world.player.handle);
}

// ══════════════════════════════════════════════════════════════
// Timers
// ══════════════════════════════════════════════════════════════

fn resolve_timers(
    world: &mut WorldState,
    dt: f32,
    surface: &mut dyn RenderSurface,
    hud: &mut dyn HudSink,
    events: &mut Vec<GameEvent>,
) {
    for kind in world.timers.advance(dt) {
        match kind {
            TimerKind::DeliveryCountdown => {
                if world.phase != Phase::LevelActive || !world.player.carrying { continue; }
                debug!(level = world.level, "delivery countdown expired");
                events.push(GameEvent::SampleLost);
                lose_life(world, surface, hud, events);
            }
            TimerKind::LevelTransition => {
                if world.phase != Phase::LevelTransition { continue; }
                let next = world.level + 1;
                load_level(world, next, surface, hud, events);
            }
            TimerKind::ExitBlink => {
                if let Some(exit) = world.exit.as_mut() {
                    if exit.active {
                        exit.visible = !exit.visible;
                        surface.set_entity_visible(exit.handle, exit.visible);
                    }
                }
            }
            TimerKind::GameOverHold => {
                if world.phase != Phase::GameOver { continue; }
                load_level(world, 1, surface, hud, events);
            }
            TimerKind::RespawnGrace => debug!("respawn grace over"),
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Player movement
// ══════════════════════════════════════════════════════════════

fn resolve_player_movement(
    world: &mut WorldState,
    intent: Dir,
    dt: f32,
    surface: &mut dyn RenderSurface,
    events: &mut Vec<GameEvent>,
) {
    if intent.is_none() { world.blocked_dir = Dir::None; }

    if world.player.mover.is_idle() {
        if !intent.is_none() {
            try_player_step(world, intent, None, surface, events);
        }
        return;
    }

    // Still held on arrival: continue without an idle frame.
    let Some(arrival) = motion::advance(&mut world.player.mover, dt) else { return };
    if !intent.is_none() {
        try_player_step(world, intent, Some(arrival), surface, events);
    }
}

fn try_player_step(
    world: &mut WorldState,
    dir: Dir,
    arrival: Option<Arrival>,
    surface: &mut dyn RenderSurface,
    events: &mut Vec<GameEvent>,
) -> bool {
    let dest = world.player.cell().step(dir);

    // Block ahead: pick it up, move next tick.
    if let Some(idx) = world.items.iter().position(|it| it.is_block_at(dest)) {
        collect_block(world, idx, surface, events);
        return false;
    }

    let view = FieldView::for_player(&world.grid, &world.items, &world.enemies);
    let moved = match &arrival {
        Some(a) => motion::chain(&mut world.player.mover, a, dir, &view),
        None => motion::try_begin(&mut world.player.mover, dir, &view),
    };

    if moved {
        world.blocked_dir = Dir::None;
        events.push(GameEvent::PlayerMoved { to: dest });
    } else if world.blocked_dir != dir {
        world.blocked_dir = dir;
        events.push(GameEvent::MoveBlocked { at: dest });
    }
    moved
}

fn collect_block(world: &mut WorldState, idx: usize, surface: &mut dyn RenderSurface, events: &mut Vec<GameEvent>) {
    let item = &mut world.items[idx];
    item.collected = true;
    surface.remove_entity(item.handle);
    let (cell, placed) = (item.cell, item.placed);
    if placed { world.items.remove(idx); }
    world.player.blocks += 1;
    events.push(GameEvent::BlockCollected { x: cell.x, z: cell.z });
}

// ══════════════════════════════════════════════════════════════
// Enemy movement
// ══════════════════════════════════════════════════════════════

/// Enemies whose cell left the grid can't be reasoned about; drop them
/// instead of stalling the frame.
fn drop_malformed_enemies(world: &mut WorldState, surface: &mut dyn RenderSurface) {
    let grid = &world.grid;
    world.enemies.retain(|e| {
        let ok = grid.in_bounds(e.mover.cell)
            && e.mover.target.map_or(true, |t| grid.in_bounds(t))
            && e.mover.speed.is_finite();
        if !ok {
            warn!(id = e.id, x = e.mover.cell.x, z = e.mover.cell.z, "malformed enemy skipped");
            surface.remove_entity(e.handle);
        }
        ok
    });
}

fn resolve_enemy_movement(world: &mut WorldState, dt: f32) {
    let turn_chance = world.movement.turn_chance;

    for i in 0..world.enemies.len() {
        let arrival = motion::advance(&mut world.enemies[i].mover, dt);
        if arrival.is_some() { world.enemies[i].just_arrived = true; }
        if !world.enemies[i].mover.is_idle() { continue; }

        let dir = {
            let view = FieldView::for_enemy(&world.grid, &world.items, &world.enemies, i);
            let e = &world.enemies[i];
            ai::choose_direction(&e.mover, &view, &mut world.rng, turn_chance, e.just_arrived)
        };

        let enemy = &mut world.enemies[i];
        enemy.just_arrived = false;
        if dir.is_none() { continue; }
        enemy.mover.begin_step(dir);
        if let Some(a) = arrival {
            motion::carry_overshoot(&mut enemy.mover, &a);
        }
    }
}

fn resolve_separation(world: &mut WorldState, dt: f32, events: &mut Vec<GameEvent>) {
    ai::tick_cooldowns(&mut world.separation_cooldowns, dt);
    let params = world.movement.separation();
    let pairs = ai::separate(&mut world.enemies, &mut world.separation_cooldowns, &params, &mut world.rng);
    for (a, b) in pairs {
        events.push(GameEvent::EnemiesSeparated { a, b });
    }
}

// ══════════════════════════════════════════════════════════════
// Contact / life loss
// ══════════════════════════════════════════════════════════════

/// Returns true if the player lost a life this tick.
fn resolve_enemy_collision(
    world: &mut WorldState,
    surface: &mut dyn RenderSurface,
    hud: &mut dyn HudSink,
    events: &mut Vec<GameEvent>,
) -> bool {
    if world.timers.is_pending(TimerKind::RespawnGrace) { return false; }
    let pc = world.player.cell();
    let mut hit = false;
    for e in &world.enemies {
        if rules::enemy_hits_player(&e.mover, pc) {
            events.push(GameEvent::EnemyHitPlayer { id: e.id });
            hit = true;
        }
    }
    // Any number of simultaneous hits costs one life.
    if hit { lose_life(world, surface, hud, events); }
    hit
}

fn lose_life(
    world: &mut WorldState,
    surface: &mut dyn RenderSurface,
    hud: &mut dyn HudSink,
    events: &mut Vec<GameEvent>,
) {
    world.player.lives = world.player.lives.saturating_sub(1);
    events.push(GameEvent::LifeLost { lives_left: world.player.lives });
    debug!(lives = world.player.lives, carrying = world.player.carrying, "life lost");

    if world.player.carrying {
        world.player.carrying = false;
        world.plutonium_total = world.plutonium_total.saturating_sub(1);
    }
    world.timers.cancel_kind(TimerKind::DeliveryCountdown);

    if world.player.lives == 0 {
        game_over(world, hud, events);
        return;
    }

    world.player.mover.teleport(world.start);
    world.blocked_dir = Dir::None;
    world.timers.restart(TimerKind::RespawnGrace, secs(world.session.respawn_grace_ms));
    let msg = match world.player.lives {
        1 => "Ouch! Last life".to_string(),
        n => format!("Ouch! {n} lives left"),
    };
    world.set_message(&msg, hud);
    activate_exit_if_done(world, surface, hud, events);
}

fn game_over(world: &mut WorldState, hud: &mut dyn HudSink, events: &mut Vec<GameEvent>) {
    let final_score = world.score;
    info!(score = final_score, level = world.level, "game over");
    events.push(GameEvent::GameOver { score: final_score });
    world.set_message(&format!("GAME OVER - final score {final_score}"), hud);

    world.timers.clear();
    reset_session_values(world);
    world.phase = Phase::GameOver;
    world.timers.schedule(TimerKind::GameOverHold, secs(world.session.game_over_hold_ms));
}

// ══════════════════════════════════════════════════════════════
// Pickup / delivery / exit
// ══════════════════════════════════════════════════════════════

fn resolve_pickups(
    world: &mut WorldState,
    surface: &mut dyn RenderSurface,
    hud: &mut dyn HudSink,
    events: &mut Vec<GameEvent>,
) {
    let pc = world.player.cell();

    // One sample at a time; others stay put while carrying.
    if !world.player.carrying {
        let sample = world.items.iter_mut()
            .find(|it| it.kind == ItemKind::Plutonium && !it.collected && it.cell == pc);
        if let Some(item) = sample {
            item.collected = true;
            surface.remove_entity(item.handle);
            world.player.carrying = true;
            world.timers.restart(TimerKind::DeliveryCountdown, world.session.delivery_seconds as f32);
            events.push(GameEvent::ItemCollected { x: pc.x, z: pc.z });
            world.set_message("Sample collected! Get it to a barrel", hud);
        }
    }

    if world.player.carrying && world.barrels.iter().any(|b| b.cell == pc) {
        world.player.carrying = false;
        world.timers.cancel_kind(TimerKind::DeliveryCountdown);
        world.delivered += 1;
        world.score += world.session.delivery_reward;
        events.push(GameEvent::ItemDelivered { x: pc.x, z: pc.z });
        debug!(delivered = world.delivered, remaining = world.plutonium_remaining(), "sample delivered");
        world.set_message(&format!("Delivered! +{}", world.session.delivery_reward), hud);
        activate_exit_if_done(world, surface, hud, events);
    }

    let on_open_exit = world.exit_active() && world.exit.as_ref().is_some_and(|e| e.cell == pc);
    if on_open_exit && !world.level_complete {
        complete_level(world, surface, hud, events);
    }
}

fn activate_exit_if_done(
    world: &mut WorldState,
    surface: &mut dyn RenderSurface,
    hud: &mut dyn HudSink,
    events: &mut Vec<GameEvent>,
) {
    if world.plutonium_remaining() > 0 { return; }
    let Some(exit) = world.exit.as_mut() else { return };
    if exit.active { return; }

    exit.active = true;
    exit.visible = true;
    surface.set_entity_visible(exit.handle, true);
    world.timers.schedule_repeating(TimerKind::ExitBlink, secs(world.session.exit_blink_ms));
    events.push(GameEvent::ExitActivated);
    world.set_message("All samples secured. Exit open!", hud);
}

fn complete_level(
    world: &mut WorldState,
    surface: &mut dyn RenderSurface,
    hud: &mut dyn HudSink,
    events: &mut Vec<GameEvent>,
) {
    world.level_complete = true;
    world.phase = Phase::LevelTransition;
    world.score += world.session.level_bonus;

    world.timers.clear();
    world.timers.schedule(TimerKind::LevelTransition, secs(world.session.transition_delay_ms));
    if let Some(exit) = world.exit.as_mut() {
        exit.visible = true;
        surface.set_entity_visible(exit.handle, true);
    }

    info!(level = world.level, score = world.score, "level complete");
    events.push(GameEvent::LevelComplete { level: world.level });
    let msg = format!("Level {} complete! +{}", world.level, world.session.level_bonus);
    world.set_message(&msg, hud);
}

// ══════════════════════════════════════════════════════════════
// Block placement
// ══════════════════════════════════════════════════════════════

/// Place a block along the player's facing. On rejection nothing in the
/// session changes; the caller gets the reason and a `PlacementRejected`.
pub fn place_block(
    world: &mut WorldState,
    surface: &mut dyn RenderSurface,
    hud: &mut dyn HudSink,
    events: &mut Vec<GameEvent>,
) -> Result<Cell, PlaceError> {
    let view = PlacementView {
        grid: &world.grid,
        items: &world.items,
        enemies: &world.enemies,
        barrels: &world.barrels,
        exit: world.exit.as_ref(),
        player: &world.player.mover,
    };
    let checked = rules::check_placement(&view, world.player.blocks, world.player.cell(), world.player.facing);

    match checked {
        Ok(target) => {
            world.player.blocks -= 1;
            let mut block = Item::new(ItemKind::Block, target);
            block.placed = true;
            block.handle = surface.spawn_entity(EntityKind::Block, target);
            world.items.push(block);
            events.push(GameEvent::BlockPlaced { x: target.x, z: target.z });
            Ok(target)
        }
        Err(e) => {
            events.push(GameEvent::PlacementRejected);
            world.set_message(&format!("Can't place block: {e}"), hud);
            Err(e)
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Scene sync
// ══════════════════════════════════════════════════════════════

fn sync_positions(world: &WorldState, surface: &mut dyn RenderSurface) {
    let cs = world.movement.cell_size;
    let mut put = |handle, mover: &Mover| {
        let (x, z) = mover.position();
        surface.set_entity_position(handle, world_coord(x, cs), MOVER_HEIGHT, world_coord(z, cs));
    };
    put(world.player.handle, &world.player.mover);
    for e in &world.enemies {
        put(e.handle, &e.mover);
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::domain::grid::Grid;
    use crate::sim::event::dispatch_audio;
    use crate::sim::ports::recording::{RecordingAudio, RecordingHud, RecordingSurface};

    const DT: f32 = 1.0 / 60.0;

    /// `#` wall, `@` start, `*` start with a sample under it, `P` sample,
    /// `B` block, `U` barrel, `X` exit, `E` enemy; anything else open.
    fn layout(rows: &[&str]) -> GeneratedLevel {
        let mut grid = Grid::new(rows[0].len(), rows.len());
        let mut lvl = GeneratedLevel {
            grid: Grid::new(0, 0),
            start: Cell::new(1, 1),
            exit: None,
            barrels: vec![],
            plutonium: vec![],
            blocks: vec![],
            enemies: vec![],
            skipped: 0,
        };
        for (z, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let c = Cell::new(x as i32, z as i32);
                match ch {
                    '#' => grid.set_wall(c, true),
                    '@' => lvl.start = c,
                    '*' => {
                        lvl.start = c;
                        lvl.plutonium.push(c);
                    }
                    'P' => lvl.plutonium.push(c),
                    'B' => lvl.blocks.push(c),
                    'U' => lvl.barrels.push(c),
                    'X' => lvl.exit = Some(c),
                    'E' => lvl.enemies.push(c),
                    _ => {}
                }
            }
        }
        lvl.grid = grid;
        lvl
    }

    /// Bordered open room.
    fn room(width: usize, height: usize, start: Cell) -> GeneratedLevel {
        let mut grid = Grid::new(width, height);
        for c in grid.cells().collect::<Vec<_>>() {
            if grid.is_border(c) { grid.set_wall(c, true); }
        }
        GeneratedLevel {
            grid,
            start,
            exit: None,
            barrels: vec![],
            plutonium: vec![],
            blocks: vec![],
            enemies: vec![],
            skipped: 0,
        }
    }

    struct Harness {
        world: WorldState,
        surface: RecordingSurface,
        hud: RecordingHud,
    }

    impl Harness {
        fn new(rows: &[&str]) -> Self {
            Self::from_level(layout(rows))
        }

        fn from_level(lvl: GeneratedLevel) -> Self {
            let mut h = Harness {
                world: WorldState::new(&GameConfig::default(), 99),
                surface: RecordingSurface::default(),
                hud: RecordingHud::default(),
            };
            let mut rng = ChaCha8Rng::seed_from_u64(1);
            let mut events = vec![];
            install_level(&mut h.world, 1, lvl, &mut rng, &mut h.surface, &mut h.hud, &mut events);
            h
        }

        fn tick(&mut self, movement: Dir, dt: f32) -> Vec<GameEvent> {
            let input = FrameInput { movement, place_block: false };
            step(&mut self.world, input, dt, &mut self.surface, &mut self.hud)
        }

        fn run(&mut self, movement: Dir, seconds: f32, dt: f32) -> Vec<GameEvent> {
            let n = (seconds / dt).round() as usize;
            let mut all = vec![];
            for _ in 0..n {
                all.extend(self.tick(movement, dt));
            }
            all
        }

        fn place(&mut self) -> Result<Cell, PlaceError> {
            let mut events = vec![];
            place_block(&mut self.world, &mut self.surface, &mut self.hud, &mut events)
        }
    }

    fn count(events: &[GameEvent], pred: impl Fn(&GameEvent) -> bool) -> usize {
        events.iter().filter(|e| pred(e)).count()
    }

    // ── Block placement ──

    #[test]
    fn placement_stacks_outward_along_facing() {
        let mut h = Harness::from_level(room(16, 14, Cell::new(10, 10)));
        h.world.player.blocks = 5;
        h.world.player.facing = Dir::Right;

        assert_eq!(h.place(), Ok(Cell::new(11, 10)));
        assert_eq!(h.world.player.blocks, 4);
        assert_eq!(h.surface.cells_of(EntityKind::Block), vec![Cell::new(11, 10)]);

        assert_eq!(h.place(), Ok(Cell::new(12, 10)));
        assert_eq!(h.world.player.blocks, 3);
    }

    #[test]
    fn placement_with_empty_inventory_changes_nothing() {
        let mut h = Harness::from_level(room(12, 10, Cell::new(5, 5)));
        h.world.player.blocks = 0;
        let mut events = vec![];
        let got = place_block(&mut h.world, &mut h.surface, &mut h.hud, &mut events);
        assert_eq!(got, Err(PlaceError::EmptyInventory));
        assert_eq!(events, vec![GameEvent::PlacementRejected]);
        assert_eq!(h.surface.count(EntityKind::Block), 0);
        assert!(h.world.items.is_empty());
    }

    #[test]
    fn placement_input_goes_through_step() {
        let mut h = Harness::from_level(room(12, 10, Cell::new(5, 5)));
        let input = FrameInput { movement: Dir::None, place_block: true };
        let events = step(&mut h.world, input, DT, &mut h.surface, &mut h.hud);
        assert!(events.contains(&GameEvent::BlockPlaced { x: 6, z: 5 }));
        assert_eq!(h.hud.blocks, 4);
    }

    #[test]
    fn player_collects_block_instead_of_moving() {
        let mut h = Harness::new(&[
            "#######",
            "#@B   #",
            "#######",
        ]);
        let blocks = h.world.player.blocks;
        let events = h.tick(Dir::Right, DT);
        assert!(events.contains(&GameEvent::BlockCollected { x: 2, z: 1 }));
        assert_eq!(h.world.player.blocks, blocks + 1);
        assert!(h.world.player.mover.is_idle());
        assert_eq!(h.world.player.cell(), Cell::new(1, 1));

        let events = h.tick(Dir::Right, DT);
        assert!(events.contains(&GameEvent::PlayerMoved { to: Cell::new(2, 1) }));
    }

    #[test]
    fn placed_block_picked_back_up_is_removed() {
        let mut h = Harness::from_level(room(12, 10, Cell::new(5, 5)));
        h.world.player.facing = Dir::Right;
        assert!(h.place().is_ok());
        assert_eq!(h.world.items.len(), 1);
        h.tick(Dir::Right, DT);
        assert!(h.world.items.is_empty());
        assert_eq!(h.world.player.blocks, 5);
    }

    // ── Movement ──

    #[test]
    fn held_direction_chains_steps() {
        let mut h = Harness::new(&[
            "##########",
            "#@       #",
            "##########",
        ]);
        let mut idle_frames = 0;
        for _ in 0..24 {
            h.tick(Dir::Right, DT);
            if h.world.player.mover.is_idle() { idle_frames += 1; }
        }
        // 6 cells/s for 0.4s
        assert_eq!(h.world.player.cell(), Cell::new(3, 1));
        assert_eq!(idle_frames, 0);
    }

    #[test]
    fn blocked_move_reports_once_per_direction() {
        let mut h = Harness::new(&[
            "#####",
            "#@  #",
            "#####",
        ]);
        let events = h.run(Dir::Left, 0.2, DT);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::MoveBlocked { .. })), 1);
        assert_eq!(h.world.player.cell(), Cell::new(1, 1));
        assert_eq!(h.world.player.facing, Dir::Left);
    }

    #[test]
    fn walking_into_wall_plays_bump_once() {
        let mut h = Harness::new(&[
            "#####",
            "#@  #",
            "#####",
        ]);
        let mut audio = RecordingAudio::default();
        for _ in 0..12 {
            let events = h.tick(Dir::Left, DT);
            dispatch_audio(&events, &mut audio);
        }
        assert_eq!(audio.calls, vec!["blocked"]);

        // letting go re-arms the cue
        h.tick(Dir::None, DT);
        let events = h.tick(Dir::Left, DT);
        dispatch_audio(&events, &mut audio);
        assert_eq!(audio.calls, vec!["blocked", "blocked"]);
    }

    #[test]
    fn malformed_enemy_is_dropped_without_stalling() {
        let mut h = Harness::from_level(room(12, 10, Cell::new(5, 5)));
        h.world.enemies.push(Enemy::new(7, Cell::new(-3, 40), 2.0));
        h.tick(Dir::Right, DT);
        assert!(h.world.enemies.is_empty());
        assert!(!h.world.player.mover.is_idle());
    }

    // ── Delivery countdown ──

    #[test]
    fn countdown_expiry_drops_sample_and_costs_one_life() {
        let mut h = Harness::new(&[
            "#########",
            "#   *   #",
            "#  P    #",
            "#########",
        ]);
        let events = h.tick(Dir::None, DT);
        assert!(events.contains(&GameEvent::ItemCollected { x: 4, z: 1 }));
        assert!(h.world.player.carrying);
        assert_eq!(h.world.delivery_seconds_left(), Some(20));

        h.run(Dir::None, 19.5, 0.1);
        assert!(h.world.player.carrying);
        assert_eq!(h.world.player.lives, 3);

        let events = h.run(Dir::None, 1.0, 0.1);
        assert!(!h.world.player.carrying);
        assert_eq!(h.world.player.lives, 2);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::LifeLost { .. })), 1);
        assert!(events.contains(&GameEvent::SampleLost));
        assert_eq!(h.hud.timer, None);
        // the lost sample no longer counts toward the exit
        assert_eq!(h.world.plutonium_remaining(), 1);
    }

    #[test]
    fn pause_freezes_countdown() {
        let mut h = Harness::new(&[
            "#######",
            "#  *  #",
            "#######",
        ]);
        h.tick(Dir::None, DT);
        let before = h.world.timers.remaining(TimerKind::DeliveryCountdown);
        toggle_pause(&mut h.world, &mut h.hud);
        assert!(h.run(Dir::Right, 30.0, 0.1).is_empty());
        assert_eq!(h.world.timers.remaining(TimerKind::DeliveryCountdown), before);
        assert_eq!(h.world.player.lives, 3);
        toggle_pause(&mut h.world, &mut h.hud);
        assert!(!h.world.paused);
    }

    #[test]
    fn second_sample_ignored_while_carrying() {
        let mut h = Harness::new(&[
            "#######",
            "#  *P #",
            "#######",
        ]);
        h.tick(Dir::None, DT);
        let events = h.run(Dir::Right, 0.3, DT);
        assert_eq!(h.world.player.cell(), Cell::new(4, 1));
        assert_eq!(count(&events, |e| matches!(e, GameEvent::ItemCollected { .. })), 0);
        assert_eq!(h.world.items.iter().filter(|i| !i.collected).count(), 1);
    }

    // ── Delivery / exit sequencing ──

    #[test]
    fn last_delivery_opens_exit_and_scores() {
        let mut h = Harness::new(&[
            "#######",
            "#X *U #",
            "#######",
        ]);
        h.tick(Dir::None, DT);
        assert_eq!(h.world.plutonium_remaining(), 1);
        assert!(!h.world.exit_active());

        let mut delivered = false;
        for _ in 0..60 {
            let events = h.tick(Dir::Right, DT);
            if events.contains(&GameEvent::ItemDelivered { x: 4, z: 1 }) {
                assert!(events.contains(&GameEvent::ExitActivated));
                delivered = true;
                break;
            }
        }
        assert!(delivered);
        assert_eq!(h.world.plutonium_remaining(), 0);
        assert_eq!(h.world.score, 100);
        assert!(!h.world.player.carrying);
        let exit = h.world.exit.as_ref().expect("level has an exit");
        assert!(exit.active && exit.visible);
        assert!(h.surface.entities[exit.handle].visible);
        assert_eq!(h.hud.remaining, 0);
    }

    #[test]
    fn inactive_exit_does_not_complete_level() {
        let mut h = Harness::new(&[
            "########",
            "#X@   P#",
            "########",
        ]);
        let events = h.run(Dir::Left, 0.5, DT);
        assert_eq!(h.world.player.cell(), Cell::new(1, 1));
        assert_eq!(count(&events, |e| matches!(e, GameEvent::LevelComplete { .. })), 0);
        assert_eq!(h.world.phase, Phase::LevelActive);
    }

    #[test]
    fn level_without_samples_opens_exit_at_once() {
        let h = Harness::new(&[
            "######",
            "#@  X#",
            "######",
        ]);
        assert!(h.world.exit_active());
    }

    #[test]
    fn exit_completes_once_then_next_level_loads() {
        let mut h = Harness::new(&[
            "#######",
            "#X*U  #",
            "#######",
        ]);
        h.tick(Dir::None, DT);
        h.run(Dir::Right, 0.2, DT);
        assert!(h.world.exit_active());

        let events = h.run(Dir::Left, 1.0, DT);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::LevelComplete { .. })), 1);
        assert_eq!(h.world.phase, Phase::LevelTransition);
        assert!(h.world.level_complete);
        assert_eq!(h.world.score, 100 + 500);

        // standing on the exit during the delay changes nothing
        let events = h.run(Dir::None, 1.0, 0.1);
        assert!(events.is_empty());

        let events = h.run(Dir::None, 1.0, 0.1);
        assert!(events.iter().any(|e| matches!(e, GameEvent::LevelGenerated { level: 2, .. })));
        assert_eq!(h.world.level, 2);
        assert_eq!(h.world.phase, Phase::LevelActive);
        assert!(!h.world.level_complete);
        assert_eq!(h.surface.count(EntityKind::Exit), 1);
        assert_eq!(h.surface.count(EntityKind::Player), 1);
        assert_eq!(h.world.score, 600);
    }

    #[test]
    fn reset_during_transition_wins() {
        let mut h = Harness::new(&[
            "######",
            "#X@  #",
            "######",
        ]);
        h.run(Dir::Left, 0.3, DT);
        assert_eq!(h.world.phase, Phase::LevelTransition);

        reset_game(&mut h.world, &mut h.surface, &mut h.hud);
        assert_eq!(h.world.level, 1);
        assert_eq!(h.world.score, 0);
        assert_eq!(h.world.phase, Phase::LevelActive);
        assert!(!h.world.timers.is_pending(TimerKind::LevelTransition));
        // the cancelled transition never fires
        h.run(Dir::None, 3.0, 0.1);
        assert_eq!(h.world.level, 1);
    }

    // ── Enemy contact ──

    #[test]
    fn simultaneous_hits_cost_one_life() {
        let mut h = Harness::new(&[
            "#######",
            "#     #",
            "#  @  #",
            "#     #",
            "#######",
        ]);
        let pc = h.world.player.cell();
        let mut a = Enemy::new(0, pc, 2.0);
        a.handle = h.surface.spawn_entity(EntityKind::Enemy, pc);
        let mut b = Enemy::new(1, pc.step(Dir::Right), 2.0);
        b.mover.begin_step(Dir::Left);
        h.world.enemies = vec![a, b];

        let events = h.tick(Dir::None, DT);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::EnemyHitPlayer { .. })), 2);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::LifeLost { .. })), 1);
        assert_eq!(h.world.player.lives, 2);
    }

    #[test]
    fn enemy_on_start_cell_is_ignored_during_respawn_grace() {
        let mut h = Harness::new(&[
            "###",
            "#@#",
            "###",
        ]);
        let pc = h.world.player.cell();
        h.world.enemies.push(Enemy::new(0, pc, 2.0));

        h.tick(Dir::None, DT);
        assert_eq!(h.world.player.lives, 2);
        assert!(h.world.timers.is_pending(TimerKind::RespawnGrace));

        // enemy is walled in on the start cell the whole time
        let events = h.run(Dir::None, 0.9, DT);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::LifeLost { .. })), 0);
        assert_eq!(h.world.player.lives, 2);

        let events = h.run(Dir::None, 0.2, DT);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::LifeLost { .. })), 1);
        assert_eq!(h.world.player.lives, 1);
    }

    #[test]
    fn life_lost_while_carrying_loses_the_sample() {
        let mut h = Harness::new(&[
            "#########",
            "#   *   #",
            "#     P #",
            "#########",
        ]);
        h.tick(Dir::None, DT);
        assert!(h.world.player.carrying);
        let pc = h.world.player.cell();
        h.world.enemies.push(Enemy::new(0, pc, 2.0));
        h.tick(Dir::None, DT);
        assert!(!h.world.player.carrying);
        assert_eq!(h.world.plutonium_total, 1);
        assert!(!h.world.timers.is_pending(TimerKind::DeliveryCountdown));
    }

    #[test]
    fn last_life_ends_game_and_restarts_level_one() {
        let mut h = Harness::new(&[
            "#######",
            "#  @  #",
            "#######",
        ]);
        h.world.player.lives = 1;
        h.world.score = 250;
        let pc = h.world.player.cell();
        h.world.enemies.push(Enemy::new(0, pc, 2.0));

        let events = h.tick(Dir::None, DT);
        assert!(events.contains(&GameEvent::GameOver { score: 250 }));
        assert_eq!(h.world.phase, Phase::GameOver);
        assert_eq!(h.world.player.lives, 3);
        assert_eq!(h.world.score, 0);
        assert_eq!(h.world.player.blocks, 5);
        assert!(h.hud.messages.iter().any(|m| m.contains("final score 250")));

        h.run(Dir::None, 2.6, 0.1);
        assert_eq!(h.world.phase, Phase::LevelActive);
        assert_eq!(h.world.level, 1);
        assert!(h.surface.count(EntityKind::Wall) > 0);
    }

    // ── Generated sessions ──

    #[test]
    fn same_seed_same_first_level() {
        let cfg = GameConfig::default();
        let mut a = WorldState::new(&cfg, 1234);
        let mut b = WorldState::new(&cfg, 1234);
        let (mut sa, mut sb) = (RecordingSurface::default(), RecordingSurface::default());
        let (mut ha, mut hb) = (RecordingHud::default(), RecordingHud::default());
        start_session(&mut a, &mut sa, &mut ha);
        start_session(&mut b, &mut sb, &mut hb);
        assert_eq!(sa.cells_of(EntityKind::Wall), sb.cells_of(EntityKind::Wall));
        assert_eq!(sa.cells_of(EntityKind::Enemy), sb.cells_of(EntityKind::Enemy));
    }

    #[test]
    fn enemy_speeds_sampled_from_range() {
        let cfg = GameConfig::default();
        let mut w = WorldState::new(&cfg, 5);
        let mut s = RecordingSurface::default();
        let mut hud = RecordingHud::default();
        let mut events = vec![];
        load_level(&mut w, 6, &mut s, &mut hud, &mut events);
        let (min, var) = (cfg.movement.enemy_speed_min, cfg.movement.enemy_speed_variation);
        assert!(!w.enemies.is_empty());
        assert!(w.enemies.iter().all(|e| e.mover.speed >= min && e.mover.speed <= min + var));
        assert_eq!(hud.level, 6);
    }

    #[test]
    fn long_session_never_breaks_occupancy() {
        let cfg = GameConfig::default();
        let mut w = WorldState::new(&cfg, 31);
        let mut s = RecordingSurface::default();
        let mut hud = RecordingHud::default();
        let mut events = vec![];
        load_level(&mut w, 5, &mut s, &mut hud, &mut events);
        w.player.lives = 1000;

        for _ in 0..1200 {
            step(&mut w, FrameInput::default(), DT, &mut s, &mut hud);
            for (i, a) in w.enemies.iter().enumerate() {
                assert!(!w.grid.is_wall(a.mover.cell));
                for b in w.enemies.iter().skip(i + 1) {
                    for c in a.mover.occupied_cells() {
                        assert!(!b.mover.occupies(c), "enemies {} and {} share {:?}", a.id, b.id, c);
                    }
                }
            }
        }
    }
}
