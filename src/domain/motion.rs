/// Movement layer: occupancy queries and cell-to-cell stepping.
///
/// ## Occupancy
///
/// A cell is occupied for a mover if it is:
///   - a wall (out of bounds counts as wall)
///   - an uncollected block
///   - in another enemy's occupied set (current cell, plus destination
///     while in transit)
///
/// The player never blocks enemies and enemies never block the player;
/// overlap between them is a collision event, resolved by the session.
///
/// ## Stepping
///
/// `Idle -> Moving` needs a direction and a free destination.
/// `Moving -> Idle` happens when progress reaches 1 (within epsilon);
/// the canonical cell snaps to the target at that instant.

use super::entity::{Enemy, Item, Mover, STEP_EPSILON};
use super::grid::{Cell, Dir, Grid};

/// The occupancy contract. The querying entity's own cells are excluded.
pub trait Occupancy {
    fn is_position_occupied(&self, cell: Cell) -> bool;
}

/// Occupancy seen by one mover on the current playfield.
pub struct FieldView<'a> {
    pub grid: &'a Grid,
    pub items: &'a [Item],
    pub enemies: &'a [Enemy],
    /// Index of the querying enemy, excluded from its own query.
    pub skip_enemy: Option<usize>,
    /// Enemies block enemies; for the player they don't.
    pub enemies_block: bool,
}

impl<'a> FieldView<'a> {
    /// View for enemy `idx`.
    pub fn for_enemy(grid: &'a Grid, items: &'a [Item], enemies: &'a [Enemy], idx: usize) -> Self {
        FieldView { grid, items, enemies, skip_enemy: Some(idx), enemies_block: true }
    }

    /// View for the player. Blocks still count here; the session collects
    /// them before ever asking whether the cell is free.
    pub fn for_player(grid: &'a Grid, items: &'a [Item], enemies: &'a [Enemy]) -> Self {
        FieldView { grid, items, enemies, skip_enemy: None, enemies_block: false }
    }

    pub fn has_block(&self, cell: Cell) -> bool {
        self.items.iter().any(|it| it.is_block_at(cell))
    }

    pub fn has_enemy(&self, cell: Cell) -> bool {
        self.enemies.iter().enumerate().any(|(i, e)| {
            Some(i) != self.skip_enemy && e.mover.occupies(cell)
        })
    }
}

impl Occupancy for FieldView<'_> {
    fn is_position_occupied(&self, cell: Cell) -> bool {
        if self.grid.is_wall(cell) { return true; }
        if self.has_block(cell) { return true; }
        self.enemies_block && self.has_enemy(cell)
    }
}

/// Result of a mover reaching its target cell.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Arrival {
    pub cell: Cell,
    pub dir: Dir,
    /// Progress beyond the target, in cell fractions. Lets a chained
    /// step continue without a visible hitch.
    pub overshoot: f32,
}

/// Try `Idle -> Moving`. Blocked or already-moving requests change nothing.
pub fn try_begin(mover: &mut Mover, dir: Dir, occ: &impl Occupancy) -> bool {
    if dir.is_none() || !mover.is_idle() { return false; }
    let dest = mover.cell.step(dir);
    if occ.is_position_occupied(dest) { return false; }
    mover.begin_step(dir);
    true
}

/// Advance interpolation by `speed * dt`. Returns the arrival, if any.
pub fn advance(mover: &mut Mover, dt: f32) -> Option<Arrival> {
    if mover.is_idle() { return None; }
    mover.progress += mover.speed * dt;
    if mover.progress + STEP_EPSILON < 1.0 { return None; }

    let overshoot = (mover.progress - 1.0).max(0.0);
    let dir = mover.dir;
    mover.complete_step();
    Some(Arrival { cell: mover.cell, dir, overshoot })
}

/// Start a follow-on step right after an arrival, carrying the overshoot
/// when travel continues in the same direction.
pub fn chain(mover: &mut Mover, arrival: &Arrival, dir: Dir, occ: &impl Occupancy) -> bool {
    if !try_begin(mover, dir, occ) { return false; }
    carry_overshoot(mover, arrival);
    true
}

/// Hand the leftover progress of `arrival` to a step that was just begun
/// in the same direction.
pub fn carry_overshoot(mover: &mut Mover, arrival: &Arrival) {
    if mover.is_idle() || mover.dir != arrival.dir { return; }
    mover.progress = arrival.overshoot.min(1.0 - 2.0 * STEP_EPSILON);
}
