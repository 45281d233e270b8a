/// Placement and contact rules.
///
/// Pure functions over a read-only view of the playfield. These encode
/// "what is legal" without performing the action.
///
/// ## Block Placement Truth Table
///
/// Target = first cell along `facing` from the player that does not hold
/// an uncollected block (so repeated placements stack outward).
///
/// ┌──────────────────────────────┬─────────┬──────────────────┐
/// │ Condition (priority order)    │ Allow?  │ Error            │
/// ├──────────────────────────────┼─────────┼──────────────────┤
/// │ inventory == 0                │ DENY    │ EmptyInventory   │
/// │ facing == None                │ DENY    │ OutOfBounds      │
/// │ target not interior           │ DENY    │ OutOfBounds      │
/// │ target is wall                │ DENY    │ Occupied         │
/// │ target holds any live item    │ DENY    │ Occupied         │
/// │ target is a barrel            │ DENY    │ Occupied         │
/// │ target is the exit cell       │ DENY    │ Occupied         │
/// │ target in an enemy's cells    │ DENY    │ Occupied         │
/// │ target in the player's cells  │ DENY    │ Occupied         │
/// │ Otherwise                     │ ALLOW   │                  │
/// └──────────────────────────────┴─────────┴──────────────────┘
///
/// Stricter than movement occupancy: samples and barrels don't block
/// movement but do block placement.
///
/// ## Contact
///
/// ┌──────────────────────────────────────────┬───────────┐
/// │ Condition                                 │ Collision │
/// ├──────────────────────────────────────────┼───────────┤
/// │ enemy cell == player cell                 │ YES       │
/// │ enemy target == player cell               │ YES       │
/// │ Otherwise                                 │ NO        │
/// └──────────────────────────────────────────┴───────────┘

use thiserror::Error;

use super::entity::{Barrel, Enemy, Exit, Item, Mover};
use super::grid::{Cell, Dir, Grid};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PlaceError {
    #[error("no blocks in inventory")]
    EmptyInventory,
    #[error("cell ({x}, {z}) is occupied")]
    Occupied { x: i32, z: i32 },
    #[error("cell ({x}, {z}) is outside the play area")]
    OutOfBounds { x: i32, z: i32 },
}

/// Everything a placement can collide with.
pub struct PlacementView<'a> {
    pub grid: &'a Grid,
    pub items: &'a [Item],
    pub enemies: &'a [Enemy],
    pub barrels: &'a [Barrel],
    pub exit: Option<&'a Exit>,
    pub player: &'a Mover,
}

impl PlacementView<'_> {
    fn has_block(&self, cell: Cell) -> bool {
        self.items.iter().any(|it| it.is_block_at(cell))
    }

    /// Any entity at all on `cell`.
    pub fn is_taken(&self, cell: Cell) -> bool {
        if self.grid.is_wall(cell) { return true; }
        if self.items.iter().any(|it| !it.collected && it.cell == cell) { return true; }
        if self.barrels.iter().any(|b| b.cell == cell) { return true; }
        if self.exit.is_some_and(|e| e.cell == cell) { return true; }
        if self.enemies.iter().any(|e| e.mover.occupies(cell)) { return true; }
        self.player.occupies(cell)
    }
}

// ── Placement ──

/// First cell along `facing` past any run of blocks. `None` if facing is unset.
pub fn placement_target(view: &PlacementView, origin: Cell, facing: Dir) -> Option<Cell> {
    if facing.is_none() { return None; }
    let mut cell = origin.step(facing);
    while view.grid.in_bounds(cell) && view.has_block(cell) {
        cell = cell.step(facing);
    }
    Some(cell)
}

/// Check a placement. See truth table above. Returns the target cell.
pub fn check_placement(
    view: &PlacementView,
    inventory: u32,
    origin: Cell,
    facing: Dir,
) -> Result<Cell, PlaceError> {
    if inventory == 0 { return Err(PlaceError::EmptyInventory); }
    let target = placement_target(view, origin, facing)
        .ok_or(PlaceError::OutOfBounds { x: origin.x, z: origin.z })?;
    if !view.grid.is_interior(target) {
        return Err(PlaceError::OutOfBounds { x: target.x, z: target.z });
    }
    if view.is_taken(target) {
        return Err(PlaceError::Occupied { x: target.x, z: target.z });
    }
    Ok(target)
}

// ── Contact ──

/// Enemy/player contact predicate. Reports only; the session reacts.
pub fn enemy_hits_player(enemy: &Mover, player_cell: Cell) -> bool {
    enemy.occupies(player_cell)
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
