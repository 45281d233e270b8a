/// Entities: Player, Enemy, Item (sample or block), Barrel, Exit.
///
/// Player and Enemy share one movement capability, `Mover`. A mover is
/// either idle on one cell or in transit between two adjacent cells; in
/// transit it occupies both so nobody else can claim the destination.

use slotmap::new_key_type;

use super::grid::{Cell, Dir};

new_key_type! {
    /// Opaque id handed out by the rendering surface for a spawned entity.
    pub struct EntityHandle;
}

/// Completion tolerance for a step, in cell fractions.
pub const STEP_EPSILON: f32 = 1e-4;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MoveState {
    Idle,
    Moving,
}

/// Shared movement state for player and enemies.
#[derive(Clone, Debug)]
pub struct Mover {
    /// Canonical cell. While moving this is the cell being left.
    pub cell: Cell,
    /// Destination while moving.
    pub target: Option<Cell>,
    /// 0.0 at `cell`, 1.0 at `target`.
    pub progress: f32,
    pub dir: Dir,
    /// Cells per second.
    pub speed: f32,
}

impl Mover {
    pub fn new(cell: Cell, speed: f32) -> Self {
        Mover { cell, target: None, progress: 0.0, dir: Dir::None, speed }
    }

    pub fn state(&self) -> MoveState {
        if self.target.is_some() { MoveState::Moving } else { MoveState::Idle }
    }

    pub fn is_idle(&self) -> bool {
        self.state() == MoveState::Idle
    }

    /// True if `cell` is in this mover's occupied set.
    pub fn occupies(&self, cell: Cell) -> bool {
        self.occupied_cells().any(|c| c == cell)
    }

    /// One cell when idle, two adjacent cells in transit.
    pub fn occupied_cells(&self) -> impl Iterator<Item = Cell> {
        std::iter::once(self.cell).chain(self.target)
    }

    /// Interpolated position in (fractional) grid coordinates.
    pub fn position(&self) -> (f32, f32) {
        match self.target {
            Some(t) => {
                let p = self.progress;
                (
                    self.cell.x as f32 + (t.x - self.cell.x) as f32 * p,
                    self.cell.z as f32 + (t.z - self.cell.z) as f32 * p,
                )
            }
            None => (self.cell.x as f32, self.cell.z as f32),
        }
    }

    /// Commit to a step. Callers check occupancy first (see `motion`).
    pub fn begin_step(&mut self, dir: Dir) {
        self.dir = dir;
        self.target = Some(self.cell.step(dir));
        self.progress = 0.0;
    }

    /// Land exactly on the target: no residual offset, one occupied cell.
    pub fn complete_step(&mut self) {
        if let Some(t) = self.target.take() {
            self.cell = t;
        }
        self.progress = 0.0;
    }

    /// Turn around mid-step. Same two cells stay occupied, same position.
    pub fn reverse(&mut self) {
        if let Some(t) = self.target {
            self.target = Some(self.cell);
            self.cell = t;
            self.progress = 1.0 - self.progress;
            self.dir = self.dir.opposite();
        }
    }

    /// Instant relocation (life loss, level load). Not a movement step.
    pub fn teleport(&mut self, cell: Cell) {
        self.cell = cell;
        self.target = None;
        self.progress = 0.0;
        self.dir = Dir::None;
    }
}

#[derive(Clone, Debug)]
pub struct Player {
    pub mover: Mover,
    /// Last non-zero intent; survives idle frames. Aims block placement.
    pub facing: Dir,
    pub lives: u32,
    pub blocks: u32,
    pub carrying: bool,
    pub handle: EntityHandle,
}

impl Player {
    pub fn new(cell: Cell, speed: f32, lives: u32, blocks: u32) -> Self {
        Player {
            mover: Mover::new(cell, speed),
            facing: Dir::Right,
            lives,
            blocks,
            carrying: false,
            handle: EntityHandle::default(),
        }
    }

    pub fn cell(&self) -> Cell {
        self.mover.cell
    }
}

#[derive(Clone, Debug)]
pub struct Enemy {
    pub id: usize,
    pub mover: Mover,
    /// Set on arrival; the next direction pick may roll a random turn.
    pub just_arrived: bool,
    pub handle: EntityHandle,
}

impl Enemy {
    /// `speed` is sampled once by the caller and never changes.
    pub fn new(id: usize, cell: Cell, speed: f32) -> Self {
        Enemy {
            id,
            mover: Mover::new(cell, speed),
            just_arrived: false,
            handle: EntityHandle::default(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ItemKind {
    /// Radioactive sample; must be carried to a barrel.
    Plutonium,
    /// Material block; obstacle for enemies, inventory for the player.
    Block,
}

#[derive(Clone, Debug)]
pub struct Item {
    pub kind: ItemKind,
    pub cell: Cell,
    pub collected: bool,
    /// Placed by the player rather than generated.
    pub placed: bool,
    pub handle: EntityHandle,
}

impl Item {
    pub fn new(kind: ItemKind, cell: Cell) -> Self {
        Item { kind, cell, collected: false, placed: false, handle: EntityHandle::default() }
    }

    pub fn is_block_at(&self, cell: Cell) -> bool {
        self.kind == ItemKind::Block && !self.collected && self.cell == cell
    }
}

/// Drop-point for carried samples.
#[derive(Clone, Debug)]
pub struct Barrel {
    pub cell: Cell,
    pub handle: EntityHandle,
}

#[derive(Clone, Debug)]
pub struct Exit {
    pub cell: Cell,
    pub active: bool,
    pub visible: bool,
    pub handle: EntityHandle,
}

impl Exit {
    pub fn new(cell: Cell) -> Self {
        Exit { cell, active: false, visible: false, handle: EntityHandle::default() }
    }
}

/// Held-direction intent from the input source.
///
/// Releasing a key only clears the intent when it matches the held
/// direction, so overlapping presses on two axes don't fight.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectionLatch {
    held: Dir,
}

impl DirectionLatch {
    pub fn press(&mut self, dir: Dir) {
        if !dir.is_none() { self.held = dir; }
    }

    pub fn release(&mut self, dir: Dir) {
        if self.held == dir { self.held = Dir::None; }
    }

    pub fn clear(&mut self) {
        self.held = Dir::None;
    }

    pub fn current(&self) -> Dir {
        self.held
    }
}

/// Frame input: movement is continuous (held), placement is edge-triggered.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameInput {
    pub movement: Dir,
    pub place_block: bool,
}
