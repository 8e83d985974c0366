//! Equal-temperament note math: frequency, MIDI number, note name and cents.
//!
//! Everything here is pure and stateless. Tuning reference is A4 = 440 Hz = MIDI 69.

use serde::{Deserialize, Serialize};

use crate::error::NoteError;

/// Reference pitch for A4.
pub const A4_FREQUENCY: f32 = 440.0;

/// MIDI number of A4.
pub const A4_MIDI: i32 = 69;

/// Chromatic note names starting at C. Sharps only.
const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Semitone offset of each natural note letter above C.
const LETTER_OFFSETS: [(char, i32); 7] = [
    ('C', 0),
    ('D', 2),
    ('E', 4),
    ('F', 5),
    ('G', 7),
    ('A', 9),
    ('B', 11),
];

/// The natural letters of a C-major scale, in ascending order.
const C_MAJOR_LETTERS: [&str; 7] = ["C", "D", "E", "F", "G", "A", "B"];

/// Everything a display needs to know about a detected frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteInfo {
    /// Nearest note name (e.g. "A4"), or None when there is no pitch.
    pub note: Option<String>,
    /// The detected frequency in Hz (0.0 when there is no pitch).
    pub frequency: f32,
    /// Exact frequency of the nearest note.
    pub target_frequency: f32,
    /// Deviation from the nearest note, in cents.
    pub cents: f32,
    /// Nearest MIDI number.
    pub midi: i32,
}

/// Result of comparing a frequency against a target note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteMatch {
    pub is_match: bool,
    /// Signed distance from the exact target pitch. Positive = sharp.
    pub cents: f32,
    pub target_midi: i32,
    pub target_frequency: f32,
}

/// Fractional MIDI number of a frequency. Returns 0.0 for non-positive input.
pub fn frequency_to_midi(frequency: f32) -> f32 {
    if frequency <= 0.0 || !frequency.is_finite() {
        return 0.0;
    }
    12.0 * (frequency / A4_FREQUENCY).log2() + A4_MIDI as f32
}

/// Frequency of a (possibly fractional) MIDI number.
pub fn midi_to_frequency(midi: f32) -> f32 {
    A4_FREQUENCY * 2f32.powf((midi - A4_MIDI as f32) / 12.0)
}

/// Name of the note nearest to a MIDI number, e.g. 60.2 -> "C4".
pub fn midi_to_note_name(midi: f32) -> String {
    let rounded = midi.round() as i32;
    let octave = rounded.div_euclid(12) - 1;
    let index = rounded.rem_euclid(12) as usize;
    format!("{}{}", NOTE_NAMES[index], octave)
}

/// Parse a note name like "C4", "F#3" or "C-1" into its MIDI number.
///
/// Accepts exactly `[A-G]#?-?\d+`. Flats are not accepted.
pub fn note_name_to_midi(name: &str) -> Result<i32, NoteError> {
    let invalid = || NoteError::InvalidName(name.to_string());

    let mut chars = name.chars();
    let letter = chars.next().ok_or_else(invalid)?;
    let offset = LETTER_OFFSETS
        .iter()
        .find(|(l, _)| *l == letter)
        .map(|(_, o)| *o)
        .ok_or_else(invalid)?;

    let rest = chars.as_str();
    let (sharp, rest) = match rest.strip_prefix('#') {
        Some(r) => (1, r),
        None => (0, rest),
    };
    let (negative, digits) = match rest.strip_prefix('-') {
        Some(d) => (true, d),
        None => (false, rest),
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let octave: i32 = digits.parse().map_err(|_| invalid())?;
    let octave = if negative { -octave } else { octave };

    let midi = (octave + 1)
        .checked_mul(12)
        .and_then(|base| base.checked_add(offset + sharp))
        .ok_or_else(|| NoteError::OutOfRange {
            name: name.to_string(),
        })?;

    Ok(midi)
}

/// Frequency of a named note.
pub fn note_name_to_frequency(name: &str) -> Result<f32, NoteError> {
    note_name_to_midi(name).map(|m| midi_to_frequency(m as f32))
}

/// Distance from the nearest semitone, in cents (-50..+50).
pub fn cent_deviation(frequency: f32) -> f32 {
    let midi = frequency_to_midi(frequency);
    (midi - midi.round()) * 100.0
}

/// Compare a frequency with an exact target note.
///
/// Cents are measured against the target itself, not the nearest semitone,
/// so a note a full semitone away reports about ±100 cents.
pub fn check_note_match(
    frequency: f32,
    target_note: &str,
    tolerance_cents: f32,
) -> Result<NoteMatch, NoteError> {
    let target_midi = note_name_to_midi(target_note)?;
    let cents = if frequency > 0.0 {
        (frequency_to_midi(frequency) - target_midi as f32) * 100.0
    } else {
        f32::INFINITY
    };

    Ok(NoteMatch {
        is_match: cents.abs() <= tolerance_cents,
        cents,
        target_midi,
        target_frequency: midi_to_frequency(target_midi as f32),
    })
}

/// The eight notes of an ascending C-major scale: C..B of `octave`, then C of `octave + 1`.
pub fn c_major_scale(octave: i32) -> Vec<String> {
    C_MAJOR_LETTERS
        .iter()
        .map(|letter| format!("{letter}{octave}"))
        .chain(std::iter::once(format!("C{}", octave + 1)))
        .collect()
}

/// Shift a note name by a number of semitones.
pub fn transpose(note: &str, semitones: i32) -> Result<String, NoteError> {
    let midi = note_name_to_midi(note)? + semitones;
    if !(0..=127).contains(&midi) {
        return Err(NoteError::OutOfRange {
            name: note.to_string(),
        });
    }
    Ok(midi_to_note_name(midi as f32))
}

/// Describe a detected frequency relative to its nearest note.
pub fn note_info(frequency: Option<f32>) -> NoteInfo {
    match frequency.filter(|f| *f > 0.0) {
        Some(f) => {
            let midi_float = frequency_to_midi(f);
            let midi = midi_float.round() as i32;
            NoteInfo {
                note: Some(midi_to_note_name(midi_float)),
                frequency: f,
                target_frequency: midi_to_frequency(midi as f32),
                cents: (midi_float - midi as f32) * 100.0,
                midi,
            }
        }
        None => NoteInfo {
            note: None,
            frequency: 0.0,
            target_frequency: 0.0,
            cents: 0.0,
            midi: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_is_midi_69() {
        assert!((frequency_to_midi(440.0) - 69.0).abs() < 1e-4);
        assert!((midi_to_frequency(69.0) - 440.0).abs() < 1e-3);
    }

    #[test]
    fn non_positive_frequency_is_midi_zero() {
        assert_eq!(frequency_to_midi(0.0), 0.0);
        assert_eq!(frequency_to_midi(-12.0), 0.0);
    }

    #[test]
    fn middle_c() {
        assert_eq!(midi_to_note_name(60.0), "C4");
        assert_eq!(note_name_to_midi("C4").unwrap(), 60);
        assert!((note_name_to_frequency("C4").unwrap() - 261.63).abs() < 0.01);
    }

    #[test]
    fn note_name_rounds_fractional_midi() {
        assert_eq!(midi_to_note_name(60.4), "C4");
        assert_eq!(midi_to_note_name(60.6), "C#4");
    }

    #[test]
    fn negative_octave_names() {
        assert_eq!(midi_to_note_name(0.0), "C-1");
        assert_eq!(note_name_to_midi("C-1").unwrap(), 0);
        assert_eq!(note_name_to_midi("B-1").unwrap(), 11);
    }

    #[test]
    fn midi_name_round_trip() {
        for m in 0..=127 {
            let name = midi_to_note_name(m as f32);
            assert_eq!(note_name_to_midi(&name).unwrap(), m, "round trip failed for {name}");
        }
    }

    #[test]
    fn frequency_round_trip() {
        let mut f = 20.0_f32;
        while f < 4200.0 {
            let back = midi_to_frequency(frequency_to_midi(f));
            assert!((back - f).abs() < 1e-2, "{f} came back as {back}");
            f *= 1.037;
        }
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in ["", "H4", "c4", "C", "C#", "Cb4", "C##4", "C4.5", "C 4", "#4", "C-"] {
            assert_eq!(
                note_name_to_midi(bad),
                Err(NoteError::InvalidName(bad.to_string())),
                "'{bad}' should be rejected"
            );
        }
    }

    #[test]
    fn sharps_parse() {
        assert_eq!(note_name_to_midi("F#3").unwrap(), 54);
        assert_eq!(note_name_to_midi("A#4").unwrap(), 70);
    }

    #[test]
    fn cent_deviation_is_relative_to_nearest_semitone() {
        assert!(cent_deviation(440.0).abs() < 0.01);
        // 25 cents sharp of A4
        let sharp = 440.0 * 2f32.powf(25.0 / 1200.0);
        assert!((cent_deviation(sharp) - 25.0).abs() < 0.05);
        // 40 cents flat of A4
        let flat = 440.0 * 2f32.powf(-40.0 / 1200.0);
        assert!((cent_deviation(flat) + 40.0).abs() < 0.05);
    }

    #[test]
    fn note_match_uses_exact_target() {
        let result = check_note_match(440.0, "A4", 25.0).unwrap();
        assert!(result.is_match);
        assert!(result.cents.abs() < 0.01);
        assert_eq!(result.target_midi, 69);

        // A#4 is 100 cents above A4, far outside tolerance
        let result = check_note_match(midi_to_frequency(70.0), "A4", 25.0).unwrap();
        assert!(!result.is_match);
        assert!((result.cents - 100.0).abs() < 0.05);
    }

    #[test]
    fn note_match_tolerance_is_inclusive() {
        let f = 440.0 * 2f32.powf(24.9 / 1200.0);
        assert!(check_note_match(f, "A4", 25.0).unwrap().is_match);
        let f = 440.0 * 2f32.powf(25.5 / 1200.0);
        assert!(!check_note_match(f, "A4", 25.0).unwrap().is_match);
    }

    #[test]
    fn note_match_bad_target_is_an_error() {
        assert!(check_note_match(440.0, "X9", 25.0).is_err());
    }

    #[test]
    fn note_match_without_frequency_never_matches() {
        assert!(!check_note_match(0.0, "A4", 1000.0).unwrap().is_match);
    }

    #[test]
    fn c_major_scale_octave_4() {
        assert_eq!(
            c_major_scale(4),
            vec!["C4", "D4", "E4", "F4", "G4", "A4", "B4", "C5"]
        );
    }

    #[test]
    fn c_major_scale_has_major_intervals() {
        let midis: Vec<i32> = c_major_scale(3)
            .iter()
            .map(|n| note_name_to_midi(n).unwrap())
            .collect();
        let steps: Vec<i32> = midis.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(steps, vec![2, 2, 1, 2, 2, 2, 1]);
    }

    #[test]
    fn transpose_moves_by_semitones() {
        assert_eq!(transpose("C4", 1).unwrap(), "C#4");
        assert_eq!(transpose("C4", -1).unwrap(), "B3");
        assert!(transpose("G9", 1).is_err());
    }

    #[test]
    fn note_info_for_detected_pitch() {
        let info = note_info(Some(442.0));
        assert_eq!(info.note.as_deref(), Some("A4"));
        assert_eq!(info.midi, 69);
        assert!((info.target_frequency - 440.0).abs() < 1e-3);
        assert!(info.cents > 7.0 && info.cents < 8.5);
    }

    #[test]
    fn note_info_without_pitch() {
        let info = note_info(None);
        assert!(info.note.is_none());
        assert_eq!(info.frequency, 0.0);
    }
}
