use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::snapshot::field_or;

/// Accuracy tier of a completed note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Perfect,
    Great,
    Ok,
    Miss,
}

impl Tier {
    /// Tier for an average deviation. Boundaries are inclusive.
    pub fn from_cents(average_cents: f32) -> Self {
        let cents = average_cents.abs();
        if cents <= 10.0 {
            Tier::Perfect
        } else if cents <= 25.0 {
            Tier::Great
        } else if cents <= 50.0 {
            Tier::Ok
        } else {
            Tier::Miss
        }
    }

    pub fn points(&self) -> u32 {
        match self {
            Tier::Perfect => 100,
            Tier::Great => 75,
            Tier::Ok => 50,
            Tier::Miss => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Perfect => "PERFECT",
            Tier::Great => "GREAT",
            Tier::Ok => "OK",
            Tier::Miss => "MISS",
        }
    }
}

/// Letter grade for a whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(total: u32) -> Self {
        match total {
            700.. => Grade::S,
            600..=699 => Grade::A,
            500..=599 => Grade::B,
            400..=499 => Grade::C,
            300..=399 => Grade::D,
            _ => Grade::F,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bonus for the current combo length.
pub fn combo_bonus(combo: u32) -> u32 {
    match combo {
        0..=1 => 0,
        2..=3 => 5,
        4..=5 => 10,
        6..=7 => 15,
        _ => 20,
    }
}

/// Bonus for hitting a note quickly.
pub fn time_bonus(time_to_hit_ms: u64) -> u32 {
    if time_to_hit_ms < 2000 {
        10
    } else if time_to_hit_ms < 3000 {
        5
    } else {
        0
    }
}

/// Scored result of one note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteScore {
    pub tier: Tier,
    pub points: u32,
    pub combo_bonus: u32,
    pub time_bonus: u32,
    pub total_points: u32,
    /// Combo after this note.
    pub combo: u32,
    pub average_cents: f32,
    pub time_to_hit_ms: u64,
    pub success: bool,
}

/// Summary numbers for display and storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub total_score: u32,
    pub grade: Grade,
    pub notes: usize,
    /// Share of notes that were not a miss, 0..100.
    pub accuracy_percent: f32,
    /// Mean absolute cents over non-miss notes.
    pub average_cents: Option<f32>,
    pub max_combo: u32,
    pub perfect: u32,
    pub great: u32,
    pub ok: u32,
    pub miss: u32,
}

/// Running score for one session. One `add_note` call per completed or missed note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreBoard {
    pub notes: Vec<NoteScore>,
    pub current_combo: u32,
    pub max_combo: u32,
    pub total_score: u32,
    pub perfect_count: u32,
    pub great_count: u32,
    pub ok_count: u32,
    pub miss_count: u32,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score one note and fold it into the running totals.
    ///
    /// `success = false` is always a miss. The combo only grows on PERFECT;
    /// anything else resets it. The time bonus depends only on `time_to_hit_ms`.
    pub fn add_note(&mut self, average_cents: f32, time_to_hit_ms: u64, success: bool) -> NoteScore {
        let tier = if success {
            Tier::from_cents(average_cents)
        } else {
            Tier::Miss
        };

        if tier == Tier::Perfect {
            self.current_combo += 1;
            self.max_combo = self.max_combo.max(self.current_combo);
        } else {
            self.current_combo = 0;
        }

        match tier {
            Tier::Perfect => self.perfect_count += 1,
            Tier::Great => self.great_count += 1,
            Tier::Ok => self.ok_count += 1,
            Tier::Miss => self.miss_count += 1,
        }

        let points = tier.points();
        let combo_bonus = combo_bonus(self.current_combo);
        let time_bonus = time_bonus(time_to_hit_ms);
        let total_points = points + combo_bonus + time_bonus;
        self.total_score += total_points;

        let score = NoteScore {
            tier,
            points,
            combo_bonus,
            time_bonus,
            total_points,
            combo: self.current_combo,
            average_cents,
            time_to_hit_ms,
            success,
        };
        self.notes.push(score.clone());
        score
    }

    pub fn grade(&self) -> Grade {
        Grade::from_score(self.total_score)
    }

    pub fn stats(&self) -> ScoreStats {
        let hits: Vec<&NoteScore> = self.notes.iter().filter(|n| n.tier != Tier::Miss).collect();
        let accuracy_percent = if self.notes.is_empty() {
            0.0
        } else {
            hits.len() as f32 / self.notes.len() as f32 * 100.0
        };
        let average_cents = if hits.is_empty() {
            None
        } else {
            Some(hits.iter().map(|n| n.average_cents.abs()).sum::<f32>() / hits.len() as f32)
        };

        ScoreStats {
            total_score: self.total_score,
            grade: self.grade(),
            notes: self.notes.len(),
            accuracy_percent,
            average_cents,
            max_combo: self.max_combo,
            perfect: self.perfect_count,
            great: self.great_count,
            ok: self.ok_count,
            miss: self.miss_count,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Rebuild from saved state one field at a time. Unreadable note entries are skipped.
    pub fn restore(value: &Value) -> Self {
        let notes = value
            .get("notes")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| serde_json::from_value::<NoteScore>(e.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        let current_combo = field_or(value, "current_combo", 0);

        Self {
            notes,
            current_combo,
            max_combo: field_or(value, "max_combo", current_combo).max(current_combo),
            total_score: field_or(value, "total_score", 0),
            perfect_count: field_or(value, "perfect_count", 0),
            great_count: field_or(value, "great_count", 0),
            ok_count: field_or(value, "ok_count", 0),
            miss_count: field_or(value, "miss_count", 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries_are_inclusive() {
        let mut board = ScoreBoard::new();
        assert_eq!(board.add_note(10.0, 5000, true).tier, Tier::Perfect);
        assert_eq!(board.add_note(25.0, 5000, true).tier, Tier::Great);
        assert_eq!(board.add_note(50.0, 5000, true).tier, Tier::Ok);
        assert_eq!(board.add_note(51.0, 5000, true).tier, Tier::Miss);
        assert_eq!(board.add_note(-10.0, 5000, true).tier, Tier::Perfect);
    }

    #[test]
    fn failure_is_always_a_miss() {
        let mut board = ScoreBoard::new();
        let score = board.add_note(0.0, 5000, false);
        assert_eq!(score.tier, Tier::Miss);
        assert_eq!(score.total_points, 0);
        assert_eq!(board.miss_count, 1);
    }

    #[test]
    fn quick_miss_still_earns_time_bonus() {
        let mut board = ScoreBoard::new();
        let score = board.add_note(80.0, 1000, true);
        assert_eq!(score.tier, Tier::Miss);
        assert_eq!(score.points, 0);
        assert_eq!(score.time_bonus, 10);
        assert_eq!(score.total_points, 10);
        assert_eq!(board.total_score, 10);

        let slow = board.add_note(0.0, 2500, false);
        assert_eq!(slow.time_bonus, 5);
        assert_eq!(board.total_score, 15);
    }

    #[test]
    fn consecutive_perfects_build_combo() {
        let mut board = ScoreBoard::new();
        for expected in 1..=5 {
            assert_eq!(board.add_note(2.0, 5000, true).combo, expected);
        }
        assert_eq!(board.max_combo, 5);
    }

    #[test]
    fn any_lesser_tier_resets_combo() {
        for cents in [20.0, 40.0, 80.0] {
            let mut board = ScoreBoard::new();
            board.add_note(0.0, 5000, true);
            board.add_note(0.0, 5000, true);
            let score = board.add_note(cents, 5000, true);
            assert_eq!(score.combo, 0, "{cents} cents should reset the combo");
            assert_eq!(board.current_combo, 0);
            assert_eq!(board.max_combo, 2);
        }
    }

    #[test]
    fn restore_keeps_good_fields() {
        let mut board = ScoreBoard::new();
        board.add_note(0.0, 1500, true);
        board.add_note(20.0, 2500, true);
        let mut saved = serde_json::to_value(&board).unwrap();
        saved["max_combo"] = serde_json::json!("three");
        saved["notes"][1] = serde_json::json!({"tier": "SUPERB"});

        let restored = ScoreBoard::restore(&saved);
        assert_eq!(restored.total_score, board.total_score);
        assert_eq!(restored.perfect_count, 1);
        assert_eq!(restored.great_count, 1);
        assert_eq!(restored.max_combo, 0);
        assert_eq!(restored.notes, vec![board.notes[0].clone()]);

        let empty = ScoreBoard::restore(&Value::Null);
        assert_eq!(empty, ScoreBoard::default());
    }

    #[test]
    fn combo_bonus_steps() {
        assert_eq!(combo_bonus(0), 0);
        assert_eq!(combo_bonus(1), 0);
        assert_eq!(combo_bonus(2), 5);
        assert_eq!(combo_bonus(3), 5);
        assert_eq!(combo_bonus(4), 10);
        assert_eq!(combo_bonus(6), 15);
        assert_eq!(combo_bonus(7), 15);
        assert_eq!(combo_bonus(8), 20);
        assert_eq!(combo_bonus(40), 20);
    }

    #[test]
    fn time_bonus_steps() {
        assert_eq!(time_bonus(1999), 10);
        assert_eq!(time_bonus(2000), 5);
        assert_eq!(time_bonus(2999), 5);
        assert_eq!(time_bonus(3000), 0);
    }

    #[test]
    fn note_total_adds_all_parts() {
        let mut board = ScoreBoard::new();
        board.add_note(0.0, 5000, true);
        let score = board.add_note(0.0, 1500, true);
        assert_eq!(score.points, 100);
        assert_eq!(score.combo_bonus, 5);
        assert_eq!(score.time_bonus, 10);
        assert_eq!(score.total_points, 115);
        assert_eq!(board.total_score, 100 + 115);
    }

    #[test]
    fn perfect_run_of_eight_grades_s() {
        let mut board = ScoreBoard::new();
        for _ in 0..8 {
            board.add_note(1.0, 1600, true);
        }
        // 8 x (100 + 10) + combo bonuses 0+5+5+10+10+15+15+20
        assert_eq!(board.total_score, 880 + 80);
        assert_eq!(board.grade(), Grade::S);
    }

    #[test]
    fn grade_thresholds() {
        assert_eq!(Grade::from_score(700), Grade::S);
        assert_eq!(Grade::from_score(699), Grade::A);
        assert_eq!(Grade::from_score(600), Grade::A);
        assert_eq!(Grade::from_score(500), Grade::B);
        assert_eq!(Grade::from_score(400), Grade::C);
        assert_eq!(Grade::from_score(300), Grade::D);
        assert_eq!(Grade::from_score(299), Grade::F);
        assert_eq!(Grade::from_score(0), Grade::F);
    }

    #[test]
    fn stats_exclude_misses_from_average_cents() {
        let mut board = ScoreBoard::new();
        board.add_note(-20.0, 5000, true);
        board.add_note(10.0, 5000, true);
        board.add_note(0.0, 5000, false);

        let stats = board.stats();
        assert_eq!(stats.notes, 3);
        assert!((stats.accuracy_percent - 66.666).abs() < 0.01);
        assert!((stats.average_cents.unwrap() - 15.0).abs() < 1e-4);
        assert_eq!(stats.great, 1);
        assert_eq!(stats.perfect, 1);
        assert_eq!(stats.miss, 1);
    }

    #[test]
    fn empty_stats() {
        let stats = ScoreBoard::new().stats();
        assert_eq!(stats.accuracy_percent, 0.0);
        assert!(stats.average_cents.is_none());
        assert_eq!(stats.grade, Grade::F);
    }

    #[test]
    fn reset_clears_history() {
        let mut board = ScoreBoard::new();
        board.add_note(0.0, 100, true);
        board.reset();
        assert_eq!(board, ScoreBoard::default());
    }

    #[test]
    fn partial_json_restores_with_defaults() {
        let board: ScoreBoard = serde_json::from_str(r#"{"total_score": 250, "max_combo": 3}"#).unwrap();
        assert_eq!(board.total_score, 250);
        assert_eq!(board.max_combo, 3);
        assert!(board.notes.is_empty());
    }
}
