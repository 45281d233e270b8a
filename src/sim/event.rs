/// Events emitted during a simulation step.
/// The presentation layer consumes these for sound and messages.

use crate::domain::grid::Cell;
use super::ports::AudioSink;

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    PlayerMoved { to: Cell },
    /// Intent pointed at a wall or out of bounds (edge-triggered).
    MoveBlocked { at: Cell },
    ItemCollected { x: i32, z: i32 },
    BlockCollected { x: i32, z: i32 },
    BlockPlaced { x: i32, z: i32 },
    PlacementRejected,
    ItemDelivered { x: i32, z: i32 },
    /// Countdown ran out; the carried sample is gone.
    SampleLost,
    ExitActivated,
    EnemyHitPlayer { id: usize },
    EnemiesSeparated { a: usize, b: usize },
    LifeLost { lives_left: u32 },
    LevelComplete { level: u32 },
    LevelGenerated { level: u32, seed: u64 },
    GameOver { score: u32 },
}

/// Forward events to the sound sink.
pub fn dispatch_audio(events: &[GameEvent], audio: &mut dyn AudioSink) {
    for ev in events {
        match ev {
            GameEvent::PlayerMoved { .. } => audio.on_player_move(),
            GameEvent::ItemCollected { .. } | GameEvent::BlockCollected { .. } => audio.on_collect_item(),
            GameEvent::ItemDelivered { .. } => audio.on_deliver_item(),
            GameEvent::EnemyHitPlayer { .. } => audio.on_enemy_collision(),
            GameEvent::LifeLost { .. } => audio.on_life_lost(),
            GameEvent::LevelComplete { .. } => audio.on_level_complete(),
            GameEvent::GameOver { .. } => audio.on_game_over(),
            GameEvent::PlacementRejected => audio.on_placement_rejected(),
            GameEvent::MoveBlocked { .. } => audio.on_move_blocked(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ports::recording::RecordingAudio;

    #[test]
    fn events_map_to_named_triggers() {
        let mut audio = RecordingAudio::default();
        dispatch_audio(&[
            GameEvent::ItemCollected { x: 1, z: 1 },
            GameEvent::EnemiesSeparated { a: 0, b: 1 },
            GameEvent::EnemyHitPlayer { id: 0 },
            GameEvent::LifeLost { lives_left: 2 },
            GameEvent::PlacementRejected,
            GameEvent::MoveBlocked { at: Cell::new(0, 1) },
        ], &mut audio);
        assert_eq!(audio.calls, vec!["collect", "collision", "life_lost", "rejected", "blocked"]);
    }
}
