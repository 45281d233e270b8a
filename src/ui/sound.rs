/// Sound engine: procedural 8-bit style sound effects via rodio.
///
/// All sounds are generated as in-memory WAV buffers at init time.
/// Playback is fire-and-forget (non-blocking) via rodio's Sink.
///
/// Compile with `--no-default-features` or without "sound" feature
/// to disable audio entirely (the stub SoundEngine does nothing).

#[cfg_attr(not(feature = "sound"), allow(dead_code))]
mod wave {
    use std::f32::consts::TAU;

    pub const SAMPLE_RATE: u32 = 22050;

    /// One segment of a sound: a (possibly sliding) tone mixed with noise.
    #[derive(Clone, Copy, Debug)]
    pub struct Tone {
        pub from_hz: f32,
        pub to_hz: f32,
        pub secs: f32,
        /// 0 = pure tone, 1 = pure noise.
        pub noise: f32,
        /// Weight of the 3rd harmonic, for a squarer timbre.
        pub bite: f32,
        pub volume: f32,
    }

    pub const fn tone(hz: f32, secs: f32, volume: f32) -> Tone {
        Tone { from_hz: hz, to_hz: hz, secs, noise: 0.0, bite: 0.3, volume }
    }

    pub const fn slide(from_hz: f32, to_hz: f32, secs: f32, volume: f32) -> Tone {
        Tone { from_hz, to_hz, secs, noise: 0.0, bite: 0.0, volume }
    }

    // ════════════════════════════════════════════════════════════
    //  Sound table
    // ════════════════════════════════════════════════════════════

    /// Footstep: faint low tick.
    pub const STEP: &[Tone] = &[Tone { from_hz: 180.0, to_hz: 120.0, secs: 0.025, noise: 0.5, bite: 0.0, volume: 0.08 }];

    /// Pickup: quick ascending arpeggio C6 E6 G6.
    pub const COLLECT: &[Tone] = &[tone(1047.0, 0.045, 0.25), tone(1319.0, 0.045, 0.25), tone(1568.0, 0.045, 0.25)];

    /// Barrel delivery: two-note chime G5 C6.
    pub const DELIVER: &[Tone] = &[tone(784.0, 0.08, 0.3), tone(1047.0, 0.18, 0.3)];

    /// Enemy contact: harsh noise burst.
    pub const COLLISION: &[Tone] = &[Tone { from_hz: 500.0, to_hz: 150.0, secs: 0.12, noise: 0.7, bite: 0.0, volume: 0.3 }];

    /// Life lost: descending A4 F#4 Eb4 C4.
    pub const LIFE_LOST: &[Tone] = &[tone(440.0, 0.12, 0.3), tone(370.0, 0.12, 0.3), tone(311.0, 0.12, 0.3), tone(261.0, 0.2, 0.3)];

    /// Level complete: fanfare C5 E5 G5 C6 with a held top note.
    pub const LEVEL_COMPLETE: &[Tone] = &[
        tone(523.0, 0.1, 0.3), tone(659.0, 0.1, 0.3), tone(784.0, 0.1, 0.3), tone(1047.0, 0.35, 0.3),
    ];

    /// Game over: slow slide into the floor.
    pub const GAME_OVER: &[Tone] = &[slide(330.0, 220.0, 0.3, 0.3), slide(220.0, 110.0, 0.6, 0.3)];

    /// Rejected placement: short low buzz.
    pub const REJECTED: &[Tone] = &[Tone { from_hz: 110.0, to_hz: 110.0, secs: 0.09, noise: 0.1, bite: 0.9, volume: 0.2 }];

    /// Walked into a wall: dull thud.
    pub const BUMP: &[Tone] = &[Tone { from_hz: 90.0, to_hz: 60.0, secs: 0.05, noise: 0.3, bite: 0.6, volume: 0.2 }];

    // ════════════════════════════════════════════════════════════
    //  Synthesis
    // ════════════════════════════════════════════════════════════

    /// Render a tone sequence to mono f32 samples.
    pub fn synth(tones: &[Tone]) -> Vec<f32> {
        let mut out = Vec::new();
        let mut lcg: u32 = 12345;
        for t in tones {
            let n = (SAMPLE_RATE as f32 * t.secs) as usize;
            let mut phase = 0.0_f32;
            for i in 0..n {
                let k = i as f32 / n.max(1) as f32;
                let hz = t.from_hz + (t.to_hz - t.from_hz) * k;
                phase += hz / SAMPLE_RATE as f32;
                let wave = (phase * TAU).sin() * (1.0 - t.bite) + (phase * 3.0 * TAU).sin() * t.bite;
                lcg = lcg.wrapping_mul(1_103_515_245).wrapping_add(12345);
                let noise = (lcg as f32 / u32::MAX as f32) * 2.0 - 1.0;
                let env = (1.0 - k).powf(0.6);
                out.push((wave * (1.0 - t.noise) + noise * t.noise) * env * t.volume);
            }
        }
        out
    }

    /// Wrap f32 samples into a 16-bit mono PCM WAV buffer.
    pub fn make_wav(samples: &[f32]) -> Vec<u8> {
        let data_size = samples.len() as u32 * 2;
        let mut buf = Vec::with_capacity(44 + data_size as usize);

        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_size).to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&1u16.to_le_bytes()); // mono
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&16u16.to_le_bytes());

        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());
        for &s in samples {
            let val = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
            buf.extend_from_slice(&val.to_le_bytes());
        }
        buf
    }
}

#[cfg(feature = "sound")]
mod inner {
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink};
    use tracing::{debug, warn};

    use super::wave::*;
    use crate::sim::ports::AudioSink;

    /// Pre-generated WAV buffers for each sound effect.
    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        step: Arc<Vec<u8>>,
        collect: Arc<Vec<u8>>,
        deliver: Arc<Vec<u8>>,
        collision: Arc<Vec<u8>>,
        life_lost: Arc<Vec<u8>>,
        level_complete: Arc<Vec<u8>>,
        game_over: Arc<Vec<u8>>,
        rejected: Arc<Vec<u8>>,
        bump: Arc<Vec<u8>>,
    }

    impl SoundEngine {
        /// `None` when no output device is available.
        pub fn new() -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "no audio output, sound disabled");
                    return None;
                }
            };
            let bake = |tones: &[Tone]| Arc::new(make_wav(&synth(tones)));
            debug!("sound buffers generated");

            Some(SoundEngine {
                _stream: stream,
                handle,
                step: bake(STEP),
                collect: bake(COLLECT),
                deliver: bake(DELIVER),
                collision: bake(COLLISION),
                life_lost: bake(LIFE_LOST),
                level_complete: bake(LEVEL_COMPLETE),
                game_over: bake(GAME_OVER),
                rejected: bake(REJECTED),
                bump: bake(BUMP),
            })
        }

        fn play(&self, buf: &Arc<Vec<u8>>) {
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf.as_ref().clone());
                if let Ok(src) = rodio::Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach(); // fire-and-forget
                }
            }
        }
    }

    impl AudioSink for SoundEngine {
        fn on_player_move(&mut self) { self.play(&self.step); }
        fn on_collect_item(&mut self) { self.play(&self.collect); }
        fn on_deliver_item(&mut self) { self.play(&self.deliver); }
        fn on_enemy_collision(&mut self) { self.play(&self.collision); }
        fn on_life_lost(&mut self) { self.play(&self.life_lost); }
        fn on_level_complete(&mut self) { self.play(&self.level_complete); }
        fn on_game_over(&mut self) { self.play(&self.game_over); }
        fn on_placement_rejected(&mut self) { self.play(&self.rejected); }
        fn on_move_blocked(&mut self) { self.play(&self.bump); }
    }
}

// ════════════════════════════════════════════════════════════
//  Public API: every trigger is a no-op when sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
}

#[cfg(not(feature = "sound"))]
impl crate::sim::ports::AudioSink for SoundEngine {}
