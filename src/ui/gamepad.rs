/// Gamepad input via gilrs.
///
/// A pad contributes one movement direction (D-pad first, left stick
/// otherwise) and the actions whose buttons went down since the last
/// `update`. Bindings come from the `[gamepad]` config table; defaults:
///   face buttons → place block, Start → pause, Select → quit, L1 → reset.

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};

use tracing::warn;

use crate::config::GamepadConfig;
use crate::domain::grid::Dir;

/// Stick travel below this on both axes reads as centred.
const STICK_DEADZONE: f32 = 0.25;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PadAction {
    PlaceBlock,
    Pause,
    Quit,
    Reset,
}

/// Buttons a binding may name. D-pad buttons are movement only.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum PadButton {
    South,
    East,
    West,
    North,
    L1,
    R1,
    L2,
    R2,
    Start,
    Select,
}

impl PadButton {
    /// Case-insensitive; accepts Xbox letters, positional names and
    /// shoulder aliases.
    fn parse(name: &str) -> Option<PadButton> {
        let b = match name.to_ascii_uppercase().as_str() {
            "A" | "SOUTH" => PadButton::South,
            "B" | "EAST" => PadButton::East,
            "X" | "WEST" => PadButton::West,
            "Y" | "NORTH" => PadButton::North,
            "L1" | "LB" => PadButton::L1,
            "R1" | "RB" => PadButton::R1,
            "L2" | "LT" => PadButton::L2,
            "R2" | "RT" => PadButton::R2,
            "START" => PadButton::Start,
            "SELECT" | "BACK" => PadButton::Select,
            _ => return None,
        };
        Some(b)
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<PadButton> {
        let b = match btn {
            Button::South => PadButton::South,
            Button::East => PadButton::East,
            Button::West => PadButton::West,
            Button::North => PadButton::North,
            Button::LeftTrigger => PadButton::L1,
            Button::RightTrigger => PadButton::R1,
            Button::LeftTrigger2 => PadButton::L2,
            Button::RightTrigger2 => PadButton::R2,
            Button::Start => PadButton::Start,
            Button::Select => PadButton::Select,
            _ => return None,
        };
        Some(b)
    }
}

#[cfg(feature = "gamepad")]
fn dpad_dir(btn: Button) -> Option<Dir> {
    match btn {
        Button::DPadUp => Some(Dir::Up),
        Button::DPadDown => Some(Dir::Down),
        Button::DPadLeft => Some(Dir::Left),
        Button::DPadRight => Some(Dir::Right),
        _ => None,
    }
}

/// Stick position to a direction; the dominant axis wins. Positive y is up.
fn stick_dir(x: f32, y: f32) -> Dir {
    if x.abs() < STICK_DEADZONE && y.abs() < STICK_DEADZONE {
        Dir::None
    } else if y.abs() >= x.abs() {
        if y > 0.0 { Dir::Up } else { Dir::Down }
    } else if x > 0.0 {
        Dir::Right
    } else {
        Dir::Left
    }
}

fn default_bindings() -> Vec<(PadButton, PadAction)> {
    vec![
        (PadButton::South, PadAction::PlaceBlock),
        (PadButton::East, PadAction::PlaceBlock),
        (PadButton::West, PadAction::PlaceBlock),
        (PadButton::North, PadAction::PlaceBlock),
        (PadButton::Start, PadAction::Pause),
        (PadButton::Select, PadAction::Quit),
        (PadButton::L1, PadAction::Reset),
    ]
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,
    bindings: Vec<(PadButton, PadAction)>,
    /// Most recently pressed D-pad direction still held.
    dpad: Dir,
    stick: (f32, f32),
    /// Actions triggered since the last `update`.
    pressed: Vec<PadAction>,
    pub connected: bool,
}

impl GamepadState {
    pub fn new() -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs, connected) = match Gilrs::new() {
            Ok(g) => {
                let any = g.gamepads().next().is_some();
                (Some(g), any)
            }
            Err(e) => {
                warn!(error = %e, "gamepad support unavailable");
                (None, false)
            }
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs,
            bindings: default_bindings(),
            dpad: Dir::None,
            stick: (0.0, 0.0),
            pressed: Vec::new(),
            connected,
        }
    }

    /// Rebind actions from config. Unknown names are logged and skipped;
    /// an action whose list has no valid name keeps its defaults.
    pub fn load_button_config(&mut self, cfg: &GamepadConfig) {
        let lists = [
            (&cfg.place_block, PadAction::PlaceBlock),
            (&cfg.confirm, PadAction::Pause),
            (&cfg.cancel, PadAction::Quit),
            (&cfg.restart, PadAction::Reset),
        ];
        for (names, action) in lists {
            let buttons: Vec<PadButton> = names.iter()
                .filter_map(|name| {
                    let b = PadButton::parse(name);
                    if b.is_none() { warn!(button = %name, "unknown gamepad button name"); }
                    b
                })
                .collect();
            if buttons.is_empty() { continue; }
            self.bindings.retain(|&(_, a)| a != action);
            self.bindings.extend(buttons.into_iter().map(|b| (b, action)));
        }
    }

    /// Start a new frame and drain pending gilrs events.
    pub fn update(&mut self) {
        self.pressed.clear();

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let Some(gilrs) = self.gilrs.as_mut() else { return };
        let events: Vec<EventType> = std::iter::from_fn(|| gilrs.next_event())
            .map(|ev| ev.event)
            .collect();

        for event in events {
            match event {
                EventType::ButtonPressed(btn, _) => {
                    self.connected = true;
                    match dpad_dir(btn) {
                        Some(dir) => self.dpad = dir,
                        None => {
                            if let Some(b) = PadButton::from_gilrs(btn) { self.trigger(b); }
                        }
                    }
                }
                EventType::ButtonReleased(btn, _) => {
                    if dpad_dir(btn) == Some(self.dpad) { self.dpad = Dir::None; }
                }
                EventType::AxisChanged(Axis::LeftStickX, v, _) => self.stick.0 = v,
                EventType::AxisChanged(Axis::LeftStickY, v, _) => self.stick.1 = v,
                EventType::Connected => {
                    tracing::debug!("gamepad connected");
                    self.connected = true;
                }
                EventType::Disconnected => {
                    tracing::debug!("gamepad disconnected");
                    self.connected = false;
                    self.dpad = Dir::None;
                    self.stick = (0.0, 0.0);
                }
                _ => {}
            }
        }
    }

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn trigger(&mut self, button: PadButton) {
        for &(b, action) in &self.bindings {
            if b == button && !self.pressed.contains(&action) {
                self.pressed.push(action);
            }
        }
    }

    pub fn pressed(&self, action: PadAction) -> bool {
        self.pressed.contains(&action)
    }

    /// Held movement direction; the D-pad overrides the stick.
    pub fn movement(&self) -> Dir {
        if self.dpad.is_none() { stick_dir(self.stick.0, self.stick.1) } else { self.dpad }
    }
}
