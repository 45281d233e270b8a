/// Grid primitives: cells, axis directions, and the wall raster.
///
/// Coordinates are `(x, z)` on the ground plane. `z` grows toward the
/// bottom of the screen. A `Cell` is a plain value; nothing owns it.
///
/// Wall semantics are centralized here so the generator, the movement
/// layer and the renderer all agree on what "blocked" means.

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct Cell {
    pub x: i32,
    pub z: i32,
}

impl Cell {
    pub const fn new(x: i32, z: i32) -> Self {
        Cell { x, z }
    }

    /// The neighbouring cell one step in `dir`. `Dir::None` returns self.
    pub fn step(self, dir: Dir) -> Cell {
        self.offset(dir, 1)
    }

    pub fn offset(self, dir: Dir, n: i32) -> Cell {
        let (dx, dz) = dir.delta();
        Cell { x: self.x + dx * n, z: self.z + dz * n }
    }

    pub fn manhattan(self, other: Cell) -> u32 {
        self.x.abs_diff(other.x) + self.z.abs_diff(other.z)
    }

    /// 4-neighbourhood in `Dir::AXES` order.
    pub fn neighbors(self) -> [Cell; 4] {
        Dir::AXES.map(|d| self.step(d))
    }
}

/// Movement direction: one of the four axis-aligned unit vectors, or none.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Dir {
    #[default]
    None,
    Up,
    Right,
    Down,
    Left,
}

impl Dir {
    pub const AXES: [Dir; 4] = [Dir::Up, Dir::Right, Dir::Down, Dir::Left];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Dir::None => (0, 0),
            Dir::Up => (0, -1),
            Dir::Right => (1, 0),
            Dir::Down => (0, 1),
            Dir::Left => (-1, 0),
        }
    }

    pub fn opposite(self) -> Dir {
        match self {
            Dir::None => Dir::None,
            Dir::Up => Dir::Down,
            Dir::Right => Dir::Left,
            Dir::Down => Dir::Up,
            Dir::Left => Dir::Right,
        }
    }

    pub fn is_none(self) -> bool {
        self == Dir::None
    }
}

/// Boolean wall raster. Out-of-bounds reads count as wall.
#[derive(Clone, Debug)]
pub struct Grid {
    width: usize,
    height: usize,
    walls: Vec<bool>,
}

impl Grid {
    /// A fully open grid of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Grid { width, height, walls: vec![false; width * height] }
    }

    pub fn width(&self) -> usize { self.width }
    pub fn height(&self) -> usize { self.height }

    #[inline]
    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.z >= 0
            && (cell.x as usize) < self.width
            && (cell.z as usize) < self.height
    }

    pub fn is_border(&self, cell: Cell) -> bool {
        self.in_bounds(cell)
            && (cell.x == 0 || cell.z == 0
                || cell.x as usize == self.width - 1
                || cell.z as usize == self.height - 1)
    }

    /// Interior = in bounds and not on the border ring.
    pub fn is_interior(&self, cell: Cell) -> bool {
        self.in_bounds(cell) && !self.is_border(cell)
    }

    #[inline]
    pub fn is_wall(&self, cell: Cell) -> bool {
        if !self.in_bounds(cell) { return true; }
        self.walls[self.index(cell)]
    }

    pub fn set_wall(&mut self, cell: Cell, wall: bool) {
        if self.in_bounds(cell) {
            let i = self.index(cell);
            self.walls[i] = wall;
        }
    }

    pub fn wall_count(&self) -> usize {
        self.walls.iter().filter(|w| **w).count()
    }

    pub fn walls(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells().filter(|c| self.is_wall(*c))
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.height as i32)
            .flat_map(move |z| (0..self.width as i32).map(move |x| Cell::new(x, z)))
    }

    /// Interior cells that are not walls: the playable area.
    pub fn open_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells().filter(|c| self.is_interior(*c) && !self.is_wall(*c))
    }

    #[inline]
    pub fn index(&self, cell: Cell) -> usize {
        cell.z as usize * self.width + cell.x as usize
    }
}

/// Grid coordinate (possibly fractional) to world units at the cell centre.
#[inline]
pub fn world_coord(grid_coord: f32, cell_size: f32) -> f32 {
    grid_coord * cell_size + cell_size / 2.0
}
