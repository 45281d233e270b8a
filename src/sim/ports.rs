/// Boundary traits between the session and its presentation.
///
/// The session only talks to these; the terminal front-end in `ui`
/// implements them, and tests use the recording doubles below.

use crate::domain::grid::Cell;

pub use crate::domain::entity::EntityHandle;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EntityKind {
    Wall,
    Player,
    Enemy,
    Plutonium,
    Block,
    Barrel,
    Exit,
}

/// Scene the session spawns entities into. Positions are world units
/// (`grid * cell_size + cell_size / 2`); `y` is height above ground.
/// Unknown handles are ignored.
pub trait RenderSurface {
    fn spawn_entity(&mut self, kind: EntityKind, cell: Cell) -> EntityHandle;
    fn set_entity_position(&mut self, handle: EntityHandle, x: f32, y: f32, z: f32);
    fn set_entity_visible(&mut self, handle: EntityHandle, visible: bool);
    fn remove_entity(&mut self, handle: EntityHandle);
}

/// Fire-and-forget sound triggers.
pub trait AudioSink {
    fn on_player_move(&mut self) {}
    fn on_collect_item(&mut self) {}
    fn on_deliver_item(&mut self) {}
    fn on_enemy_collision(&mut self) {}
    fn on_life_lost(&mut self) {}
    fn on_level_complete(&mut self) {}
    fn on_game_over(&mut self) {}
    fn on_placement_rejected(&mut self) {}
    fn on_move_blocked(&mut self) {}
}

/// Numeric/string display updates.
pub trait HudSink {
    /// Whole seconds left on the delivery countdown; `None` hides it.
    fn update_timer(&mut self, seconds: Option<u32>);
    fn update_plutonium_remaining(&mut self, n: u32);
    fn update_lives(&mut self, n: u32);
    fn update_blocks(&mut self, n: u32);
    fn update_score(&mut self, n: u32);
    fn update_level(&mut self, n: u32);
    fn show_message(&mut self, text: &str);
}

// ══════════════════════════════════════════════════════════════
// Recording doubles
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
pub mod recording {
    use slotmap::SlotMap;

    use super::*;

    #[derive(Clone, Debug)]
    pub struct Spawned {
        pub kind: EntityKind,
        pub cell: Cell,
        pub pos: (f32, f32, f32),
        pub visible: bool,
    }

    #[derive(Default)]
    pub struct RecordingSurface {
        pub entities: SlotMap<EntityHandle, Spawned>,
        pub removed: usize,
    }

    impl RecordingSurface {
        pub fn count(&self, kind: EntityKind) -> usize {
            self.entities.values().filter(|e| e.kind == kind).count()
        }

        pub fn cells_of(&self, kind: EntityKind) -> Vec<Cell> {
            let mut cells: Vec<Cell> = self.entities.values()
                .filter(|e| e.kind == kind)
                .map(|e| e.cell)
                .collect();
            cells.sort();
            cells
        }
    }

    impl RenderSurface for RecordingSurface {
        fn spawn_entity(&mut self, kind: EntityKind, cell: Cell) -> EntityHandle {
            self.entities.insert(Spawned { kind, cell, pos: (0.0, 0.0, 0.0), visible: true })
        }

        fn set_entity_position(&mut self, handle: EntityHandle, x: f32, y: f32, z: f32) {
            if let Some(e) = self.entities.get_mut(handle) {
                e.pos = (x, y, z);
            }
        }

        fn set_entity_visible(&mut self, handle: EntityHandle, visible: bool) {
            if let Some(e) = self.entities.get_mut(handle) {
                e.visible = visible;
            }
        }

        fn remove_entity(&mut self, handle: EntityHandle) {
            if self.entities.remove(handle).is_some() {
                self.removed += 1;
            }
        }
    }

    #[derive(Default, Debug)]
    pub struct RecordingHud {
        pub timer: Option<u32>,
        pub remaining: u32,
        pub lives: u32,
        pub blocks: u32,
        pub score: u32,
        pub level: u32,
        pub messages: Vec<String>,
    }

    impl HudSink for RecordingHud {
        fn update_timer(&mut self, seconds: Option<u32>) { self.timer = seconds; }
        fn update_plutonium_remaining(&mut self, n: u32) { self.remaining = n; }
        fn update_lives(&mut self, n: u32) { self.lives = n; }
        fn update_blocks(&mut self, n: u32) { self.blocks = n; }
        fn update_score(&mut self, n: u32) { self.score = n; }
        fn update_level(&mut self, n: u32) { self.level = n; }
        fn show_message(&mut self, text: &str) { self.messages.push(text.to_string()); }
    }

    #[derive(Default, Debug)]
    pub struct RecordingAudio {
        pub calls: Vec<&'static str>,
    }

    impl AudioSink for RecordingAudio {
        fn on_player_move(&mut self) { self.calls.push("move"); }
        fn on_collect_item(&mut self) { self.calls.push("collect"); }
        fn on_deliver_item(&mut self) { self.calls.push("deliver"); }
        fn on_enemy_collision(&mut self) { self.calls.push("collision"); }
        fn on_life_lost(&mut self) { self.calls.push("life_lost"); }
        fn on_level_complete(&mut self) { self.calls.push("level_complete"); }
        fn on_game_over(&mut self) { self.calls.push("game_over"); }
        fn on_placement_rejected(&mut self) { self.calls.push("rejected"); }
        fn on_move_blocked(&mut self) { self.calls.push("blocked"); }
    }
}
