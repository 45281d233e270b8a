/// Procedural level generator.
///
/// ## Pipeline
///   1. Border: every boundary cell is a wall.
///   2. Interior walls: each interior cell (except the start) becomes a
///      wall with probability `ratio`. Every provisional wall is checked
///      with a flood fill from the start; if any open cell became
///      unreachable the wall is discarded.
///   3. Exit: the open cell farthest (BFS steps) from the start.
///   4. Entities: barrels, plutonium, material blocks, then enemies, each
///      at a uniformly random free open cell. Bounded retries; an entity
///      that finds no cell is skipped with a warning.
///
/// Invariant: after step 2 every open interior cell is reachable from the
/// start cell through 4-neighbour moves. Nothing later adds walls.
///
/// ## Variants
///
/// `Classic` and `Steep` ("generator 2") share the pipeline and differ
/// only in their difficulty curves.

use std::collections::{HashSet, VecDeque};

use rand::Rng;
use tracing::{debug, warn};

use crate::domain::grid::{Cell, Grid};

/// Smallest width/height the generator accepts.
pub const MIN_DIMENSION: usize = 10;

// ══════════════════════════════════════════════════════════════
// Difficulty curves
// ══════════════════════════════════════════════════════════════

/// Level index (1-based) to generation parameters.
pub trait DifficultyCurve {
    fn wall_ratio(&self, level: u32) -> f64;
    fn enemy_count(&self, level: u32) -> usize;
    fn plutonium_count(&self, level: u32) -> usize;
    fn barrel_count(&self, level: u32) -> usize;
    fn block_count(&self, level: u32) -> usize;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GeneratorVariant {
    Classic,
    Steep,
}

impl GeneratorVariant {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "classic" | "1" => Some(GeneratorVariant::Classic),
            "steep" | "2" | "generator2" => Some(GeneratorVariant::Steep),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GeneratorVariant::Classic => "classic",
            GeneratorVariant::Steep => "steep",
        }
    }
}

/// `round(base * growth^(level-1))`, capped.
fn geometric(base: f64, growth: f64, level: u32, cap: usize) -> usize {
    let n = base * growth.powi(level.saturating_sub(1) as i32);
    (n.round() as usize).min(cap)
}

impl DifficultyCurve for GeneratorVariant {
    fn wall_ratio(&self, level: u32) -> f64 {
        let l = level.saturating_sub(1) as f64;
        match self {
            GeneratorVariant::Classic => (0.28 - 0.015 * l).max(0.10),
            GeneratorVariant::Steep => (0.35 * 0.88f64.powf(l)).max(0.06),
        }
    }

    fn enemy_count(&self, level: u32) -> usize {
        match self {
            GeneratorVariant::Classic => geometric(2.0, 1.25, level, 24),
            GeneratorVariant::Steep => geometric(2.0, 1.5, level, 32),
        }
    }

    fn plutonium_count(&self, level: u32) -> usize {
        match self {
            GeneratorVariant::Classic => geometric(3.0, 1.2, level, 20),
            GeneratorVariant::Steep => geometric(2.0, 1.35, level, 24),
        }
    }

    fn barrel_count(&self, _level: u32) -> usize {
        2
    }

    fn block_count(&self, _level: u32) -> usize {
        match self {
            GeneratorVariant::Classic => 3,
            GeneratorVariant::Steep => 2,
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Generator
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct GenParams {
    pub width: usize,
    pub height: usize,
    /// Random draws per entity before it is skipped.
    pub placement_attempts: u32,
    /// Manhattan radius around the start kept free of enemies.
    pub safe_radius: u32,
    /// Replaces the curve's wall ratio when set.
    pub wall_ratio_override: Option<f64>,
}

impl Default for GenParams {
    fn default() -> Self {
        GenParams {
            width: 24,
            height: 16,
            placement_attempts: 100,
            safe_radius: 2,
            wall_ratio_override: None,
        }
    }
}

/// Output of one generation run. Cells only; the session builds entities.
#[derive(Clone, Debug)]
pub struct GeneratedLevel {
    pub grid: Grid,
    pub start: Cell,
    pub exit: Option<Cell>,
    pub barrels: Vec<Cell>,
    pub plutonium: Vec<Cell>,
    pub blocks: Vec<Cell>,
    pub enemies: Vec<Cell>,
    /// Entities dropped because no free cell was found.
    pub skipped: usize,
}

#[derive(Clone, Debug)]
pub struct LevelGenerator<C: DifficultyCurve = GeneratorVariant> {
    pub curve: C,
    pub params: GenParams,
}

impl<C: DifficultyCurve> LevelGenerator<C> {
    pub fn new(curve: C, mut params: GenParams) -> Self {
        params.width = params.width.max(MIN_DIMENSION);
        params.height = params.height.max(MIN_DIMENSION);
        LevelGenerator { curve, params }
    }

    pub fn start_cell(&self) -> Cell {
        Cell::new((self.params.width / 2) as i32, (self.params.height / 2) as i32)
    }

    /// Generate level `level` (1-based; 0 is treated as 1).
    pub fn generate<R: Rng + ?Sized>(&self, level: u32, rng: &mut R) -> GeneratedLevel {
        let level = level.max(1);
        let start = self.start_cell();
        let ratio = self.params.wall_ratio_override
            .unwrap_or_else(|| self.curve.wall_ratio(level))
            .clamp(0.0, 1.0);

        let mut grid = Grid::new(self.params.width, self.params.height);
        build_border(&mut grid);
        let discarded = place_interior_walls(&mut grid, start, ratio, rng);
        debug!(level, ratio, discarded, "interior walls placed");

        let mut taken: HashSet<Cell> = HashSet::new();
        taken.insert(start);

        let exit = farthest_cell(&grid, start);
        if let Some(e) = exit { taken.insert(e); }

        let open: Vec<Cell> = grid.open_cells().collect();
        let attempts = self.params.placement_attempts;
        let mut skipped = 0;

        let mut place = |kind: &str, count: usize, taken: &mut HashSet<Cell>, rng: &mut R,
                         accept: &dyn Fn(Cell) -> bool| {
            let mut cells = Vec::with_capacity(count);
            for n in 0..count {
                match pick_free_cell(&open, taken, attempts, rng, accept) {
                    Some(c) => {
                        taken.insert(c);
                        cells.push(c);
                    }
                    None => {
                        warn!(kind, index = n, attempts, "no free cell found, entity skipped");
                        skipped += 1;
                    }
                }
            }
            cells
        };

        let anywhere = |_: Cell| true;
        let safe_radius = self.params.safe_radius;
        let outside_safe_zone = move |c: Cell| c.manhattan(start) > safe_radius;

        let barrels = place("barrel", self.curve.barrel_count(level), &mut taken, rng, &anywhere);
        let plutonium = place("plutonium", self.curve.plutonium_count(level), &mut taken, rng, &anywhere);
        let blocks = place("block", self.curve.block_count(level), &mut taken, rng, &anywhere);
        let enemies = place("enemy", self.curve.enemy_count(level), &mut taken, rng, &outside_safe_zone);

        GeneratedLevel { grid, start, exit, barrels, plutonium, blocks, enemies, skipped }
    }
}

// ── Pipeline steps ──

fn build_border(grid: &mut Grid) {
    let border: Vec<Cell> = grid.cells().filter(|c| grid.is_border(*c)).collect();
    for c in border {
        grid.set_wall(c, true);
    }
}

/// Returns the number of provisional walls discarded for connectivity.
fn place_interior_walls<R: Rng + ?Sized>(grid: &mut Grid, start: Cell, ratio: f64, rng: &mut R) -> usize {
    let candidates: Vec<Cell> = grid.cells().filter(|c| grid.is_interior(*c)).collect();
    let mut discarded = 0;
    for c in candidates {
        if c == start { continue; }
        if !rng.gen_bool(ratio) { continue; }
        grid.set_wall(c, true);
        if !is_accessible(grid, start) {
            grid.set_wall(c, false);
            discarded += 1;
        }
    }
    discarded
}

fn pick_free_cell<R: Rng + ?Sized>(
    open: &[Cell],
    taken: &HashSet<Cell>,
    attempts: u32,
    rng: &mut R,
    accept: &dyn Fn(Cell) -> bool,
) -> Option<Cell> {
    if open.is_empty() { return None; }
    for _ in 0..attempts {
        let c = open[rng.gen_range(0..open.len())];
        if !taken.contains(&c) && accept(c) {
            return Some(c);
        }
    }
    None
}

// ══════════════════════════════════════════════════════════════
// Connectivity
// ══════════════════════════════════════════════════════════════

fn is_open(grid: &Grid, c: Cell) -> bool {
    grid.is_interior(c) && !grid.is_wall(c)
}

/// BFS step distance from `start` to every open interior cell, indexed by
/// `Grid::index`. Unreachable or blocked cells are `None`.
pub fn distances(grid: &Grid, start: Cell) -> Vec<Option<u32>> {
    let mut dist = vec![None; grid.width() * grid.height()];
    if !is_open(grid, start) { return dist; }

    let mut queue = VecDeque::new();
    dist[grid.index(start)] = Some(0);
    queue.push_back(start);

    while let Some(c) = queue.pop_front() {
        let d = dist[grid.index(c)].unwrap_or(0);
        for n in c.neighbors() {
            if !is_open(grid, n) { continue; }
            let i = grid.index(n);
            if dist[i].is_some() { continue; }
            dist[i] = Some(d + 1);
            queue.push_back(n);
        }
    }
    dist
}

/// True iff every open interior cell is reachable from `start`.
pub fn is_accessible(grid: &Grid, start: Cell) -> bool {
    let dist = distances(grid, start);
    let reached = dist.iter().filter(|d| d.is_some()).count();
    reached == grid.open_cells().count()
}

/// Farthest reachable open cell from `start` (first found on ties).
fn farthest_cell(grid: &Grid, start: Cell) -> Option<Cell> {
    let dist = distances(grid, start);
    let mut best: Option<(u32, Cell)> = None;
    for c in grid.open_cells() {
        if c == start { continue; }
        if let Some(d) = dist[grid.index(c)] {
            if best.map_or(true, |(bd, _)| d > bd) {
                best = Some((d, c));
            }
        }
    }
    best.map(|(_, c)| c)
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
