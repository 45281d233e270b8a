/// HUD state for the terminal front-end.
///
/// Holds the last values the session pushed; the renderer formats them.
/// Messages fade after a fixed number of frames.

use crate::sim::ports::HudSink;

/// Frames a message stays on screen (about 2.5s at 60fps).
const MESSAGE_FRAMES: u32 = 150;

#[derive(Default, Debug)]
pub struct Hud {
    pub timer: Option<u32>,
    pub remaining: u32,
    pub lives: u32,
    pub blocks: u32,
    pub score: u32,
    pub level: u32,
    message: String,
    message_frames: u32,
}

impl Hud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the message fade by one frame.
    pub fn tick(&mut self) {
        if self.message_frames > 0 {
            self.message_frames -= 1;
            if self.message_frames == 0 { self.message.clear(); }
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Top status line.
    pub fn status_line(&self) -> String {
        let mut line = format!(
            "LEVEL {:<3} SCORE {:<7} LIVES {}  BLOCKS {:<3} PLUTONIUM {:<3}",
            self.level, self.score, self.lives, self.blocks, self.remaining,
        );
        if let Some(t) = self.timer {
            line.push_str(&format!(" DELIVER IN {t:>2}s"));
        }
        line
    }

    /// Countdown is urgent in its last five seconds.
    pub fn timer_urgent(&self) -> bool {
        self.timer.is_some_and(|t| t <= 5)
    }
}

impl HudSink for Hud {
    fn update_timer(&mut self, seconds: Option<u32>) { self.timer = seconds; }
    fn update_plutonium_remaining(&mut self, n: u32) { self.remaining = n; }
    fn update_lives(&mut self, n: u32) { self.lives = n; }
    fn update_blocks(&mut self, n: u32) { self.blocks = n; }
    fn update_score(&mut self, n: u32) { self.score = n; }
    fn update_level(&mut self, n: u32) { self.level = n; }

    fn show_message(&mut self, text: &str) {
        self.message = text.to_string();
        // empty text clears immediately
        self.message_frames = if text.is_empty() { 0 } else { MESSAGE_FRAMES };
    }
}
