//! Notes, the connect/disconnect chimes and the daily melody.

pub const MAX_VOLUME: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Note {
    A3,
    B3,
    C4,
    D4,
    E4,
    F4,
    G4,
    A4,
    B4,
    C5,
    D5,
    G5,
}

impl Note {
    pub fn frequency_hz(self) -> u16 {
        match self {
            Self::A3 => 220,
            Self::B3 => 247,
            Self::C4 => 262,
            Self::D4 => 294,
            Self::E4 => 330,
            Self::F4 => 349,
            Self::G4 => 392,
            Self::A4 => 440,
            Self::B4 => 494,
            Self::C5 => 523,
            Self::D5 => 587,
            Self::G5 => 784,
        }
    }
}

/// Canon in C: eight arpeggiated chords of four notes.
pub const MELODY: [Note; 32] = [
    // C
    Note::C4,
    Note::E4,
    Note::A4,
    Note::C5,
    // G
    Note::B3,
    Note::D4,
    Note::A4,
    Note::B4,
    // Am
    Note::A3,
    Note::E4,
    Note::A4,
    Note::C5,
    // Em
    Note::B3,
    Note::E4,
    Note::G4,
    Note::B4,
    // F
    Note::C4,
    Note::F4,
    Note::A4,
    Note::C5,
    // C
    Note::C4,
    Note::E4,
    Note::A4,
    Note::C5,
    // F
    Note::C4,
    Note::F4,
    Note::A4,
    Note::C5,
    // G
    Note::D4,
    Note::G4,
    Note::B4,
    Note::D5,
];

/// Melody note for a playback cursor; the melody loops.
pub fn melody_note(cursor: usize) -> Note {
    MELODY[cursor % MELODY.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chime {
    Connect,
    Disconnect,
}

impl Chime {
    pub fn notes(self) -> [Note; 2] {
        match self {
            Self::Connect => [Note::C5, Note::G5],
            Self::Disconnect => [Note::G5, Note::C5],
        }
    }
}

/// A note played as a decaying envelope.
///
/// Volume starts at [`MAX_VOLUME`] and drops by `slope` every `sample_ms`,
/// stopping once it would fall to `MAX_VOLUME - (duration_ms / sample_ms) * slope`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pluck {
    pub note: Note,
    pub duration_ms: u32,
    pub slope: u8,
    pub sample_ms: u32,
}

impl Pluck {
    /// `(volume, sample_ms)` pairs to feed the tone output in order.
    pub fn samples(&self) -> impl Iterator<Item = (u8, u32)> {
        let sample_ms = self.sample_ms;
        let slope = self.slope as i64;
        let floor = if sample_ms == 0 || slope == 0 {
            MAX_VOLUME as i64
        } else {
            MAX_VOLUME as i64 - (self.duration_ms / sample_ms) as i64 * slope
        };

        (0i64..)
            .map(move |step| MAX_VOLUME as i64 - step * slope)
            .take_while(move |volume| *volume > floor && *volume >= 0)
            .map(move |volume| (volume as u8, sample_ms))
    }
}
