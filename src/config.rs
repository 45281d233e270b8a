/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory, then the CWD,
/// then `~/.local/share/plutonium-run`. Missing file, unreadable file or
/// parse error falls back to defaults; the problem is kept in
/// `load_warnings` and logged once the subscriber is up (the log file
/// path itself comes from this config).

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::domain::ai::SeparationParams;
use crate::sim::level::{GenParams, GeneratorVariant};

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub speed: SpeedConfig,
    pub movement: MovementConfig,
    pub session: SessionConfig,
    pub level: LevelConfig,
    pub gamepad: GamepadConfig,
    pub log: LogConfig,
    /// Problems met while loading; logged after `init_logging`.
    pub load_warnings: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct SpeedConfig {
    pub frame_ms: u64,
}

#[derive(Clone, Debug)]
pub struct MovementConfig {
    pub player_speed: f32,          // cells per second
    pub enemy_speed_min: f32,
    pub enemy_speed_variation: f32, // enemy speed drawn from [min, min + variation]
    pub turn_chance: f64,           // random turn roll on entering a cell
    pub separation_radius: f32,     // in cells
    pub separation_cooldown_ms: u64,
    pub separation_nudge: f32,
    pub cell_size: f32,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub lives: u32,
    pub start_blocks: u32,
    pub delivery_seconds: u32,
    pub delivery_reward: u32,
    pub level_bonus: u32,
    pub transition_delay_ms: u64,
    pub game_over_hold_ms: u64,
    pub exit_blink_ms: u64,
    /// Contact with enemies is ignored this long after a respawn.
    pub respawn_grace_ms: u64,
}

#[derive(Clone, Debug)]
pub struct LevelConfig {
    pub generator: GeneratorVariant,
    pub width: usize,
    pub height: usize,
    pub seed: Option<u64>,
    pub placement_attempts: u32,
    pub safe_radius: u32,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub place_block: Vec<String>,
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
    pub restart: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct LogConfig {
    pub log_file: PathBuf,
    pub log_level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", .path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse {}: {source}", .path.display())]
    Parse { path: PathBuf, source: toml::de::Error },
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    speed: TomlSpeed,
    #[serde(default)]
    movement: TomlMovement,
    #[serde(default)]
    session: TomlSession,
    #[serde(default)]
    level: TomlLevel,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlSpeed {
    #[serde(default = "default_frame_ms")]
    frame_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlMovement {
    #[serde(default = "default_player_speed")]
    player_speed: f32,
    #[serde(default = "default_enemy_speed_min")]
    enemy_speed_min: f32,
    #[serde(default = "default_enemy_speed_variation")]
    enemy_speed_variation: f32,
    #[serde(default = "default_turn_chance")]
    turn_chance: f64,
    #[serde(default = "default_separation_radius")]
    separation_radius: f32,
    #[serde(default = "default_separation_cooldown")]
    separation_cooldown_ms: u64,
    #[serde(default = "default_separation_nudge")]
    separation_nudge: f32,
    #[serde(default = "default_cell_size")]
    cell_size: f32,
}

#[derive(Deserialize, Debug)]
struct TomlSession {
    #[serde(default = "default_lives")]
    lives: u32,
    #[serde(default = "default_start_blocks")]
    start_blocks: u32,
    #[serde(default = "default_delivery_seconds")]
    delivery_seconds: u32,
    #[serde(default = "default_delivery_reward")]
    delivery_reward: u32,
    #[serde(default = "default_level_bonus")]
    level_bonus: u32,
    #[serde(default = "default_transition_delay")]
    transition_delay_ms: u64,
    #[serde(default = "default_game_over_hold")]
    game_over_hold_ms: u64,
    #[serde(default = "default_exit_blink")]
    exit_blink_ms: u64,
    #[serde(default = "default_respawn_grace")]
    respawn_grace_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlLevel {
    #[serde(default = "default_generator")]
    generator: String,
    #[serde(default = "default_width")]
    width: usize,
    #[serde(default = "default_height")]
    height: usize,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default = "default_placement_attempts")]
    placement_attempts: u32,
    #[serde(default = "default_safe_radius")]
    safe_radius: u32,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_place_block")]
    place_block: Vec<String>,
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_cancel")]
    cancel: Vec<String>,
    #[serde(default = "default_restart")]
    restart: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_log_file")]
    log_file: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

// ── Defaults ──

fn default_frame_ms() -> u64 { 16 }

fn default_player_speed() -> f32 { 6.0 }
fn default_enemy_speed_min() -> f32 { 2.0 }
fn default_enemy_speed_variation() -> f32 { 1.5 }
fn default_turn_chance() -> f64 { 0.15 }
fn default_separation_radius() -> f32 { 1.0 }
fn default_separation_cooldown() -> u64 { 600 }
fn default_separation_nudge() -> f32 { 0.15 }
fn default_cell_size() -> f32 { 2.0 }

fn default_lives() -> u32 { 3 }
fn default_start_blocks() -> u32 { 5 }
fn default_delivery_seconds() -> u32 { 20 }
fn default_delivery_reward() -> u32 { 100 }
fn default_level_bonus() -> u32 { 500 }
fn default_transition_delay() -> u64 { 1500 }
fn default_game_over_hold() -> u64 { 2500 }
fn default_exit_blink() -> u64 { 400 }
fn default_respawn_grace() -> u64 { 1000 }

fn default_generator() -> String { "classic".into() }
fn default_width() -> usize { 24 }
fn default_height() -> usize { 16 }
fn default_placement_attempts() -> u32 { 100 }
fn default_safe_radius() -> u32 { 2 }

fn default_place_block() -> Vec<String> { vec!["A".into(), "B".into(), "X".into(), "Y".into()] }
fn default_confirm() -> Vec<String> { vec!["Start".into()] }
fn default_cancel() -> Vec<String> { vec!["Select".into()] }
fn default_restart() -> Vec<String> { vec!["L1".into()] }

fn default_log_file() -> String { "plutonium-run.log".into() }
fn default_log_level() -> String { "info".into() }

impl Default for TomlSpeed {
    fn default() -> Self {
        TomlSpeed { frame_ms: default_frame_ms() }
    }
}

impl Default for TomlMovement {
    fn default() -> Self {
        TomlMovement {
            player_speed: default_player_speed(),
            enemy_speed_min: default_enemy_speed_min(),
            enemy_speed_variation: default_enemy_speed_variation(),
            turn_chance: default_turn_chance(),
            separation_radius: default_separation_radius(),
            separation_cooldown_ms: default_separation_cooldown(),
            separation_nudge: default_separation_nudge(),
            cell_size: default_cell_size(),
        }
    }
}

impl Default for TomlSession {
    fn default() -> Self {
        TomlSession {
            lives: default_lives(),
            start_blocks: default_start_blocks(),
            delivery_seconds: default_delivery_seconds(),
            delivery_reward: default_delivery_reward(),
            level_bonus: default_level_bonus(),
            transition_delay_ms: default_transition_delay(),
            game_over_hold_ms: default_game_over_hold(),
            exit_blink_ms: default_exit_blink(),
            respawn_grace_ms: default_respawn_grace(),
        }
    }
}

impl Default for TomlLevel {
    fn default() -> Self {
        TomlLevel {
            generator: default_generator(),
            width: default_width(),
            height: default_height(),
            seed: None,
            placement_attempts: default_placement_attempts(),
            safe_radius: default_safe_radius(),
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            place_block: default_place_block(),
            confirm: default_confirm(),
            cancel: default_cancel(),
            restart: default_restart(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            log_file: default_log_file(),
            log_level: default_log_level(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::from_toml(TomlConfig::default(), &[])
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`, falling back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let mut warnings = Vec::new();
        let toml_cfg = match find_config(&search_dirs) {
            Some(path) => read_config(&path).unwrap_or_else(|e| {
                warnings.push(format!("{e}; using default settings"));
                TomlConfig::default()
            }),
            None => TomlConfig::default(),
        };
        let mut cfg = GameConfig::from_toml(toml_cfg, &search_dirs);
        warnings.append(&mut cfg.load_warnings);
        cfg.load_warnings = warnings;
        cfg
    }

    #[cfg(test)]
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        let toml_cfg = toml::from_str::<TomlConfig>(text)?;
        Ok(GameConfig::from_toml(toml_cfg, &[]))
    }

    fn from_toml(t: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let mut warnings = Vec::new();

        let generator = GeneratorVariant::from_name(&t.level.generator).unwrap_or_else(|| {
            warnings.push(format!("unknown generator {:?}; using classic", t.level.generator));
            GeneratorVariant::Classic
        });

        let log_file = PathBuf::from(&t.general.log_file);
        let log_file = if log_file.is_absolute() {
            log_file
        } else {
            search_dirs.first().map(|d| d.join(&log_file)).unwrap_or(log_file)
        };

        let m = t.movement;
        GameConfig {
            speed: SpeedConfig { frame_ms: t.speed.frame_ms.max(1) },
            movement: MovementConfig {
                player_speed: m.player_speed.max(0.1),
                enemy_speed_min: m.enemy_speed_min.max(0.1),
                enemy_speed_variation: m.enemy_speed_variation.max(0.0),
                turn_chance: m.turn_chance.clamp(0.0, 1.0),
                separation_radius: m.separation_radius.max(0.0),
                separation_cooldown_ms: m.separation_cooldown_ms,
                separation_nudge: m.separation_nudge.clamp(0.0, 0.9),
                cell_size: if m.cell_size > 0.0 { m.cell_size } else { default_cell_size() },
            },
            session: SessionConfig {
                lives: t.session.lives.max(1),
                start_blocks: t.session.start_blocks,
                delivery_seconds: t.session.delivery_seconds.max(1),
                delivery_reward: t.session.delivery_reward,
                level_bonus: t.session.level_bonus,
                transition_delay_ms: t.session.transition_delay_ms,
                game_over_hold_ms: t.session.game_over_hold_ms,
                exit_blink_ms: t.session.exit_blink_ms.max(50),
                respawn_grace_ms: t.session.respawn_grace_ms,
            },
            level: LevelConfig {
                generator,
                width: t.level.width,
                height: t.level.height,
                seed: t.level.seed,
                placement_attempts: t.level.placement_attempts.max(1),
                safe_radius: t.level.safe_radius,
            },
            gamepad: GamepadConfig {
                place_block: t.gamepad.place_block,
                confirm: t.gamepad.confirm,
                cancel: t.gamepad.cancel,
                restart: t.gamepad.restart,
            },
            log: LogConfig {
                log_file,
                log_level: t.general.log_level,
            },
            load_warnings: warnings,
        }
    }
}

impl MovementConfig {
    pub fn separation(&self) -> SeparationParams {
        SeparationParams {
            radius: self.separation_radius,
            cooldown: self.separation_cooldown_ms as f32 / 1000.0,
            nudge: self.separation_nudge,
        }
    }
}

impl LevelConfig {
    pub fn gen_params(&self) -> GenParams {
        GenParams {
            width: self.width,
            height: self.height,
            placement_attempts: self.placement_attempts,
            safe_radius: self.safe_radius,
            wall_ratio_override: None,
        }
    }
}

/// Candidate directories to search: exe dir + CWD + data home (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let data = PathBuf::from(&home).join(".local/share/plutonium-run");
        if data.is_dir() && !dirs.iter().any(|d| d == &data) {
            dirs.push(data);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

fn find_config(search_dirs: &[PathBuf]) -> Option<PathBuf> {
    search_dirs.iter()
        .map(|d| d.join("config.toml"))
        .find(|p| p.exists())
}

fn read_config(path: &Path) -> Result<TomlConfig, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    toml::from_str::<TomlConfig>(&text)
        .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

// ── Logging ──

/// Install the tracing subscriber writing to the configured log file.
/// The terminal is in raw mode, so nothing goes to stderr. Returns false
/// (logging disabled) if the file can't be created.
pub fn init_logging(log: &LogConfig) -> bool {
    let file = match File::create(&log.log_file) {
        Ok(f) => f,
        Err(_) => return false,
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_target(false)
        .with_ansi(false)
        .compact()
        .try_init()
        .is_ok()
}
