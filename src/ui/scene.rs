/// Terminal-side scene graph.
///
/// The session drives this through `RenderSurface`; the renderer only
/// reads it. Positions arrive in world units and are mapped back to
/// fractional grid coordinates for drawing.

use slotmap::SlotMap;

use crate::domain::grid::Cell;
use crate::sim::ports::{EntityHandle, EntityKind, RenderSurface};

#[derive(Clone, Copy, Debug)]
pub struct Sprite {
    pub kind: EntityKind,
    /// Fractional grid position.
    pub gx: f32,
    pub gz: f32,
    pub visible: bool,
}

impl Sprite {
    /// Nearest grid cell to the sprite's current position.
    pub fn cell(&self) -> Cell {
        Cell::new(self.gx.round() as i32, self.gz.round() as i32)
    }
}

pub struct TerminalScene {
    sprites: SlotMap<EntityHandle, Sprite>,
    cell_size: f32,
}

impl TerminalScene {
    pub fn new(cell_size: f32) -> Self {
        TerminalScene { sprites: SlotMap::with_key(), cell_size: cell_size.max(f32::EPSILON) }
    }

    /// Visible sprites in draw order: floor features first, movers on top.
    pub fn draw_list(&self) -> Vec<Sprite> {
        let mut list: Vec<Sprite> = self.sprites.values().filter(|s| s.visible).copied().collect();
        list.sort_by_key(|s| layer(s.kind));
        list
    }
}

fn layer(kind: EntityKind) -> u8 {
    match kind {
        EntityKind::Wall => 0,
        EntityKind::Exit => 1,
        EntityKind::Barrel => 2,
        EntityKind::Plutonium | EntityKind::Block => 3,
        EntityKind::Enemy => 4,
        EntityKind::Player => 5,
    }
}

impl RenderSurface for TerminalScene {
    fn spawn_entity(&mut self, kind: EntityKind, cell: Cell) -> EntityHandle {
        self.sprites.insert(Sprite { kind, gx: cell.x as f32, gz: cell.z as f32, visible: true })
    }

    fn set_entity_position(&mut self, handle: EntityHandle, x: f32, _y: f32, z: f32) {
        let cs = self.cell_size;
        if let Some(s) = self.sprites.get_mut(handle) {
            s.gx = x / cs - 0.5;
            s.gz = z / cs - 0.5;
        }
    }

    fn set_entity_visible(&mut self, handle: EntityHandle, visible: bool) {
        if let Some(s) = self.sprites.get_mut(handle) {
            s.visible = visible;
        }
    }

    fn remove_entity(&mut self, handle: EntityHandle) {
        self.sprites.remove(handle);
    }
}
