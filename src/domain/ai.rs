/// Enemy AI: direction resolution and enemy-enemy separation.
///
/// Direction resolution runs whenever an enemy is idle:
///   1. On the tick it arrives in a cell, roll `turn_chance` for a random
///      turn among the currently free directions.
///   2. Otherwise keep the current heading while its destination is free.
///   3. Otherwise try the other three axes in shuffled order.
///   4. Nothing free: stay idle this tick.
///
/// Separation is a post-hoc pass after all enemies advanced. The
/// occupancy contract already stops two enemies from claiming one cell,
/// but interpolation still lets them slide shoulder to shoulder; pairs
/// within `radius` get steered apart, at most once per `cooldown`.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;

use super::entity::{Enemy, Mover, STEP_EPSILON};
use super::grid::Dir;
use super::motion::Occupancy;

#[derive(Clone, Copy, Debug)]
pub struct SeparationParams {
    /// Trigger distance, in cells (world distance / cell size).
    pub radius: f32,
    /// Seconds before the same pair may trigger again.
    pub cooldown: f32,
    /// Step fraction pulled back when an enemy is turned around.
    pub nudge: f32,
}

// ── Direction resolution ──

pub fn choose_direction<R: Rng + ?Sized>(
    mover: &Mover,
    occ: &impl Occupancy,
    rng: &mut R,
    turn_chance: f64,
    just_arrived: bool,
) -> Dir {
    let current = mover.dir;
    let free = |d: Dir| !occ.is_position_occupied(mover.cell.step(d));

    if just_arrived && turn_chance > 0.0 && rng.gen_bool(turn_chance.min(1.0)) {
        let options: Vec<Dir> = Dir::AXES.into_iter()
            .filter(|&d| d != current && free(d))
            .collect();
        if let Some(&d) = options.choose(rng) {
            return d;
        }
    }

    if !current.is_none() && free(current) {
        return current;
    }

    let mut rest: Vec<Dir> = Dir::AXES.into_iter().filter(|&d| d != current).collect();
    rest.shuffle(rng);
    rest.into_iter().find(|&d| free(d)).unwrap_or(Dir::None)
}

// ── Separation ──

/// Pair key, order-independent.
fn pair_key(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

/// Count down pair cooldowns; expired entries are dropped.
pub fn tick_cooldowns(cooldowns: &mut HashMap<(usize, usize), f32>, dt: f32) {
    cooldowns.retain(|_, left| {
        *left -= dt;
        *left > 0.0
    });
}

/// Steer apart every enemy pair closer than `params.radius`.
/// Returns the ids of the pairs that were separated this tick.
pub fn separate<R: Rng + ?Sized>(
    enemies: &mut [Enemy],
    cooldowns: &mut HashMap<(usize, usize), f32>,
    params: &SeparationParams,
    rng: &mut R,
) -> Vec<(usize, usize)> {
    let mut separated = Vec::new();
    let n = enemies.len();

    for i in 0..n {
        for j in (i + 1)..n {
            let key = pair_key(enemies[i].id, enemies[j].id);
            if cooldowns.contains_key(&key) { continue; }

            let (ax, az) = enemies[i].mover.position();
            let (bx, bz) = enemies[j].mover.position();
            let (dx, dz) = (ax - bx, az - bz);
            if (dx * dx + dz * dz).sqrt() > params.radius + STEP_EPSILON { continue; }

            let away_i = if dx == 0.0 && dz == 0.0 {
                *Dir::AXES.choose(rng).unwrap_or(&Dir::Up)
            } else if dx.abs() >= dz.abs() {
                if dx > 0.0 { Dir::Right } else { Dir::Left }
            } else if dz > 0.0 {
                Dir::Down
            } else {
                Dir::Up
            };

            steer_away(&mut enemies[i].mover, away_i, params.nudge);
            steer_away(&mut enemies[j].mover, away_i.opposite(), params.nudge);
            cooldowns.insert(key, params.cooldown);
            separated.push(key);
        }
    }

    separated
}

/// Heading toward the other enemy: turn around and pull back a little.
/// Idle: prefer `away` for the next direction pick. A step already
/// heading elsewhere is left to finish.
fn steer_away(mover: &mut Mover, away: Dir, nudge: f32) {
    if mover.is_idle() {
        mover.dir = away;
    } else if mover.dir == away.opposite() {
        mover.reverse();
        mover.progress = (mover.progress + nudge).min(1.0 - 2.0 * STEP_EPSILON);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grid::{Cell, Grid};
    use crate::domain::motion::{try_begin, FieldView};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn walled(width: usize, height: usize) -> Grid {
        let mut g = Grid::new(width, height);
        for c in g.cells().collect::<Vec<_>>() {
            if g.is_border(c) { g.set_wall(c, true); }
        }
        g
    }

    fn params() -> SeparationParams {
        SeparationParams { radius: 1.0, cooldown: 0.5, nudge: 0.15 }
    }

    #[test]
    fn keeps_heading_when_free() {
        let g = walled(8, 8);
        let enemies = vec![Enemy::new(0, Cell::new(3, 3), 1.0)];
        let mut m = enemies[0].mover.clone();
        m.dir = Dir::Left;
        let view = FieldView::for_enemy(&g, &[], &enemies, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(choose_direction(&m, &view, &mut rng, 0.0, false), Dir::Left);
        }
    }

    #[test]
    fn picks_other_axis_when_blocked() {
        let mut g = walled(8, 8);
        g.set_wall(Cell::new(2, 3), true);
        let enemies = vec![Enemy::new(0, Cell::new(3, 3), 1.0)];
        let mut m = enemies[0].mover.clone();
        m.dir = Dir::Left;
        let view = FieldView::for_enemy(&g, &[], &enemies, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let d = choose_direction(&m, &view, &mut rng, 0.0, false);
        assert!(matches!(d, Dir::Up | Dir::Right | Dir::Down));
    }

    #[test]
    fn boxed_in_enemy_stays_idle() {
        let g = walled(3, 3); // single open cell at (1,1)
        let enemies = vec![Enemy::new(0, Cell::new(1, 1), 1.0)];
        let view = FieldView::for_enemy(&g, &[], &enemies, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let d = choose_direction(&enemies[0].mover, &view, &mut rng, 1.0, true);
        assert_eq!(d, Dir::None);
    }

    #[test]
    fn random_turn_respects_occupancy() {
        // corridor: only Left/Right are open around (3,2)
        let mut g = walled(7, 5);
        for x in 1..6 {
            g.set_wall(Cell::new(x, 1), true);
            g.set_wall(Cell::new(x, 3), true);
        }
        let enemies = vec![Enemy::new(0, Cell::new(3, 2), 1.0)];
        let mut m = enemies[0].mover.clone();
        m.dir = Dir::Right;
        let view = FieldView::for_enemy(&g, &[], &enemies, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..50 {
            let d = choose_direction(&m, &view, &mut rng, 1.0, true);
            assert!(matches!(d, Dir::Left | Dir::Right));
        }
    }

    #[test]
    fn second_enemy_rejects_cell_claimed_by_first() {
        // Two enemies facing the same cell (3,2) from opposite sides.
        let mut g = walled(7, 5);
        for x in 1..6 {
            g.set_wall(Cell::new(x, 1), true);
        }
        let mut enemies = vec![
            Enemy::new(0, Cell::new(2, 2), 1.0),
            Enemy::new(1, Cell::new(4, 2), 1.0),
        ];
        enemies[0].mover.dir = Dir::Right;
        enemies[1].mover.dir = Dir::Left;

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let d0 = {
            let view = FieldView::for_enemy(&g, &[], &enemies, 0);
            choose_direction(&enemies[0].mover, &view, &mut rng, 0.0, false)
        };
        assert_eq!(d0, Dir::Right);
        {
            let view = FieldView::for_enemy(&g, &[], &enemies, 0);
            let mut m = enemies[0].mover.clone();
            assert!(try_begin(&mut m, d0, &view));
            enemies[0].mover = m;
        }

        let view = FieldView::for_enemy(&g, &[], &enemies, 1);
        let d1 = choose_direction(&enemies[1].mover, &view, &mut rng, 0.0, false);
        assert_ne!(d1, Dir::Left, "claimed cell must be rejected");
        assert!(matches!(d1, Dir::Right | Dir::Down));
    }

    #[test]
    fn second_enemy_idles_when_claimed_cell_is_only_exit() {
        // dead-end pocket: (4,2) can only go left into (3,2)
        let mut g = walled(6, 5);
        for x in 1..5 {
            g.set_wall(Cell::new(x, 1), true);
            g.set_wall(Cell::new(x, 3), true);
        }
        let mut enemies = vec![
            Enemy::new(0, Cell::new(2, 2), 1.0),
            Enemy::new(1, Cell::new(4, 2), 1.0),
        ];
        enemies[0].mover.begin_step(Dir::Right);
        enemies[1].mover.dir = Dir::Left;
        let view = FieldView::for_enemy(&g, &[], &enemies, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        assert_eq!(choose_direction(&enemies[1].mover, &view, &mut rng, 0.0, false), Dir::None);
    }

    #[test]
    fn adjacent_pair_is_steered_apart_once_per_cooldown() {
        let mut enemies = vec![
            Enemy::new(0, Cell::new(2, 2), 1.0),
            Enemy::new(1, Cell::new(3, 2), 1.0),
        ];
        let mut cooldowns = HashMap::new();
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        let hits = separate(&mut enemies, &mut cooldowns, &params(), &mut rng);
        assert_eq!(hits, vec![(0, 1)]);
        assert_eq!(enemies[0].mover.dir, Dir::Left);
        assert_eq!(enemies[1].mover.dir, Dir::Right);

        let again = separate(&mut enemies, &mut cooldowns, &params(), &mut rng);
        assert!(again.is_empty(), "cooldown suppresses repeats");

        tick_cooldowns(&mut cooldowns, 0.6);
        assert!(cooldowns.is_empty());
        let later = separate(&mut enemies, &mut cooldowns, &params(), &mut rng);
        assert_eq!(later.len(), 1);
    }

    #[test]
    fn enemy_heading_into_neighbour_turns_around() {
        let mut enemies = vec![
            Enemy::new(0, Cell::new(2, 2), 1.0),
            Enemy::new(1, Cell::new(4, 2), 1.0),
        ];
        enemies[0].mover.begin_step(Dir::Right); // toward (3,2)
        enemies[0].mover.progress = 0.5;
        let mut cooldowns = HashMap::new();
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        let hits = separate(&mut enemies, &mut cooldowns, &params(), &mut rng);
        assert_eq!(hits.len(), 1);
        let m = &enemies[0].mover;
        assert_eq!(m.dir, Dir::Left);
        assert_eq!(m.target, Some(Cell::new(2, 2)));
        let (x, _) = m.position();
        assert!(x < 2.5, "nudged back toward its origin, got {x}");
    }

    #[test]
    fn distant_enemies_are_left_alone() {
        let mut enemies = vec![
            Enemy::new(0, Cell::new(1, 1), 1.0),
            Enemy::new(1, Cell::new(5, 5), 1.0),
        ];
        let mut cooldowns = HashMap::new();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        assert!(separate(&mut enemies, &mut cooldowns, &params(), &mut rng).is_empty());
    }
}
