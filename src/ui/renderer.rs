/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Glyph)
///   2. Compare each glyph with `back` buffer (previous frame)
///   3. Only emit terminal commands for glyphs that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// This eliminates flicker caused by full-screen redraws.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::sim::ports::EntityKind;
use super::hud::Hud;
use super::scene::TerminalScene;

// ── Glyph: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Glyph {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Glyph {
    /// Explicit dark background for every terminal cell, so the gaps
    /// between rows match the cell color on VTE terminals.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Glyph = Glyph { ch: ' ', fg: Color::White, bg: Glyph::BASE_BG };

    /// Sentinel used to invalidate the back buffer.
    const INVALID: Glyph = Glyph { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = if bg == Color::Reset { Self::BASE_BG } else { bg };
        Glyph { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Glyphs ──

struct FrameBuffer {
    width: usize,
    height: usize,
    glyphs: Vec<Glyph>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, glyphs: vec![Glyph::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.glyphs = vec![Glyph::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.glyphs.fill(Glyph::BLANK);
    }

    fn invalidate(&mut self) {
        self.glyphs.fill(Glyph::INVALID);
    }

    fn set(&mut self, x: usize, y: usize, g: Glyph) {
        if x < self.width && y < self.height {
            self.glyphs[y * self.width + x] = g;
        }
    }

    fn get(&self, x: usize, y: usize) -> Glyph {
        if x < self.width && y < self.height {
            self.glyphs[y * self.width + x]
        } else {
            Glyph::BLANK
        }
    }

    /// Write a string at (x, y). Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Glyph::new(ch, fg, bg));
        }
    }

    #[cfg(test)]
    fn row_text(&self, y: usize) -> String {
        (0..self.width).map(|x| self.get(x, y).ch).collect()
    }
}

// ── Sprite look ──

/// Each grid cell is two terminal columns wide.
const CELL_W: usize = 2;

/// Vertical offsets
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

fn sprite_look(kind: EntityKind) -> ([char; 2], Color, Color) {
    match kind {
        EntityKind::Wall      => (['▓', '▓'], Color::Rgb { r: 110, g: 110, b: 130 }, Color::Rgb { r: 60, g: 60, b: 75 }),
        EntityKind::Player    => (['◖', '◗'], Color::Rgb { r: 255, g: 230, b: 80 }, Color::Reset),
        EntityKind::Enemy     => (['▲', '▲'], Color::Rgb { r: 255, g: 70, b: 70 }, Color::Reset),
        EntityKind::Plutonium => (['◆', ' '], Color::Rgb { r: 80, g: 255, b: 120 }, Color::Reset),
        EntityKind::Block     => (['[', ']'], Color::Rgb { r: 230, g: 150, b: 60 }, Color::Rgb { r: 70, g: 45, b: 20 }),
        EntityKind::Barrel    => (['(', ')'], Color::Rgb { r: 90, g: 200, b: 255 }, Color::Reset),
        EntityKind::Exit      => (['>', '>'], Color::Rgb { r: 220, g: 120, b: 255 }, Color::Rgb { r: 50, g: 20, b: 70 }),
    }
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    frame: u64,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            frame: 0,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Glyph::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame.
        self.back.invalidate();
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(self.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    pub fn render(
        &mut self,
        scene: &TerminalScene,
        hud: &Hud,
        grid_size: (usize, usize),
        paused: bool,
    ) -> io::Result<()> {
        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.invalidate();
            queue!(self.writer, SetBackgroundColor(Glyph::BASE_BG), Clear(ClearType::All))?;
        }

        self.frame = self.frame.wrapping_add(1);
        self.front.clear();
        compose(&mut self.front, scene, hud, grid_size, paused, self.frame);

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed glyphs ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Glyph::BASE_BG;
        // Where the cursor sits after the last print.
        let mut cursor_at: Option<(usize, usize)> = None;

        // Explicit base colors; ResetColor would fall back to the
        // terminal's own default and show seams.
        queue!(self.writer, SetForegroundColor(last_fg), SetBackgroundColor(last_bg))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let g = self.front.get(x, y);
                if g == self.back.get(x, y) { continue; }

                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if g.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(g.fg))?;
                    last_fg = g.fg;
                }
                if g.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(g.bg))?;
                    last_bg = g.bg;
                }
                queue!(self.writer, Print(g.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }
}

// ── Compose: build front buffer content ──

fn compose(
    buf: &mut FrameBuffer,
    scene: &TerminalScene,
    hud: &Hud,
    (grid_w, grid_h): (usize, usize),
    paused: bool,
    frame: u64,
) {
    compose_hud(buf, hud);
    compose_map(buf, scene, grid_w, grid_h);

    let below = MAP_ROW + grid_h + 1;
    buf.put_str(2, below, hud.message(), Color::Rgb { r: 255, g: 220, b: 50 }, Color::Reset);
    buf.put_str(
        2, below + 1,
        "Arrows/WASD move  Space/E place block  P pause  R reset  Q quit",
        Color::DarkGrey, Color::Reset,
    );

    if paused { compose_pause_overlay(buf, grid_w, grid_h, frame); }
}

fn compose_hud(buf: &mut FrameBuffer, hud: &Hud) {
    let line = hud.status_line();
    let fg = if hud.timer_urgent() { Color::Rgb { r: 255, g: 90, b: 90 } } else { Color::White };
    buf.put_str(2, HUD_ROW, &line, fg, Color::Reset);
}

fn compose_map(buf: &mut FrameBuffer, scene: &TerminalScene, grid_w: usize, grid_h: usize) {
    for sprite in scene.draw_list() {
        let c = sprite.cell();
        if c.x < 0 || c.z < 0 { continue; }
        let (gx, gz) = (c.x as usize, c.z as usize);
        if gx >= grid_w || gz >= grid_h { continue; }

        let (chars, fg, bg) = sprite_look(sprite.kind);
        let col = 2 + gx * CELL_W;
        let row = MAP_ROW + gz;
        for (i, ch) in chars.iter().enumerate() {
            // keep floor colour under movers
            let under = buf.get(col + i, row).bg;
            let bg = if bg == Color::Reset { under } else { bg };
            buf.set(col + i, row, Glyph::new(*ch, fg, bg));
        }
    }
}

fn compose_pause_overlay(buf: &mut FrameBuffer, grid_w: usize, grid_h: usize, frame: u64) {
    let dim = Color::Rgb { r: 40, g: 40, b: 40 };
    let hdr = Color::Rgb { r: 255, g: 220, b: 50 };
    let map_cols = grid_w * CELL_W;
    let box_w = 26;
    let box_h = 5;
    let box_x = 2 + map_cols.saturating_sub(box_w) / 2;
    let box_y = MAP_ROW + grid_h.saturating_sub(box_h) / 2;

    for y in box_y..box_y + box_h {
        for x in box_x..box_x + box_w {
            buf.set(x, y, Glyph::new(' ', Color::Reset, dim));
        }
    }
    let blink = (frame / 30) % 2 == 0;
    let label = if blink { "▶  PAUSED  ◀" } else { "   PAUSED   " };
    buf.put_str(box_x + (box_w - 12) / 2, box_y + 1, label, hdr, dim);
    buf.put_str(box_x + 2, box_y + 3, "P resume   Q quit", Color::Rgb { r: 180, g: 180, b: 180 }, dim);
}
