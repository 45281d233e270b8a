/// Entry point and frame loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::error::Error;
use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags};
use crossterm::{execute, terminal};
use tracing::{error, info, warn};

use config::GameConfig;
use sim::event::dispatch_audio;
use sim::ports::AudioSink;
use sim::step;
use sim::world::WorldState;
use ui::gamepad::{GamepadState, PadAction};
use ui::hud::Hud;
use ui::input::{Controls, InputState};
use ui::renderer::Renderer;
use ui::scene::TerminalScene;
use ui::sound::SoundEngine;

/// Used when no audio device could be opened.
struct Silent;

impl AudioSink for Silent {}

fn main() {
    let config = GameConfig::load();
    let logging = config::init_logging(&config.log);
    for w in &config.load_warnings {
        warn!("{w}");
    }

    let seed = config.level.seed.unwrap_or_else(rand::random);
    info!(seed, generator = config.level.generator.name(), "plutonium run starting");

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }
    let honor_release = enable_key_release();

    let result = game_loop(&config, seed, &mut renderer, honor_release);

    if honor_release {
        let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
    }
    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    match result {
        Ok(score) => {
            info!(score, "session ended");
            println!();
            println!("Thanks for playing Plutonium Run!");
            println!("Final Score: {score}");
        }
        Err(e) => {
            error!(error = %e, "game loop failed");
            eprintln!("Game error: {e}");
        }
    }
    if !logging {
        eprintln!("(log file {} could not be opened)", config.log.log_file.display());
    }
}

/// Ask the terminal for key release events; falls back to hold timeouts.
fn enable_key_release() -> bool {
    if !matches!(terminal::supports_keyboard_enhancement(), Ok(true)) { return false; }
    execute!(io::stdout(), PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)).is_ok()
}

fn game_loop(
    config: &GameConfig,
    seed: u64,
    renderer: &mut Renderer,
    honor_release: bool,
) -> Result<u32, Box<dyn Error>> {
    let mut world = WorldState::new(config, seed);
    let mut scene = TerminalScene::new(config.movement.cell_size);
    let mut hud = Hud::new();
    let mut audio: Box<dyn AudioSink> = match SoundEngine::new() {
        Some(engine) => Box::new(engine),
        None => Box::new(Silent),
    };

    let mut kb = InputState::new();
    kb.honor_release = honor_release;
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    if gp.connected { info!("gamepad detected"); }

    let events = step::start_session(&mut world, &mut scene, &mut hud);
    dispatch_audio(&events, audio.as_mut());

    let frame_time = Duration::from_millis(config.speed.frame_ms.max(1));
    let mut last = Instant::now();

    loop {
        let mut controls = kb.drain_events();
        gp.update();
        merge_gamepad(&mut controls, &gp);

        if controls.quit { break; }
        if controls.pause {
            step::toggle_pause(&mut world, &mut hud);
            kb.clear();
        }
        if controls.reset {
            let events = step::reset_game(&mut world, &mut scene, &mut hud);
            dispatch_audio(&events, audio.as_mut());
        }

        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32();
        last = now;

        let events = step::step(&mut world, controls.frame, dt, &mut scene, &mut hud);
        dispatch_audio(&events, audio.as_mut());
        hud.tick();

        renderer.render(&scene, &hud, (world.grid.width(), world.grid.height()), world.paused)?;

        let spent = now.elapsed();
        if spent < frame_time {
            std::thread::sleep(frame_time - spent);
        }
    }

    Ok(world.score)
}

/// Gamepad fills in whatever the keyboard left unset this frame.
fn merge_gamepad(controls: &mut Controls, gp: &GamepadState) {
    if controls.frame.movement.is_none() {
        controls.frame.movement = gp.movement();
    }
    controls.frame.place_block |= gp.pressed(PadAction::PlaceBlock);
    controls.pause |= gp.pressed(PadAction::Pause);
    controls.quit |= gp.pressed(PadAction::Quit);
    controls.reset |= gp.pressed(PadAction::Reset);
}
