pub mod scene;
pub mod hud;
pub mod renderer;
pub mod input;
pub mod gamepad;
pub mod sound;
