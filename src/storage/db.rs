use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;

use super::records::{CalibrationRecord, ChallengeRecord};

/// Checkpoint slot for an in-progress scale challenge.
pub const CHALLENGE_CHECKPOINT: &str = "challenge";

/// Open (or create) the SQLite database at the configured path.
pub fn open_db() -> Result<Connection> {
    open_db_at(&crate::paths::db_path())
}

pub fn open_db_at(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("Failed to set database pragmas")?;

    init_schema(&conn)?;
    Ok(conn)
}

/// Create tables if they don't exist. Idempotent.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS calibrations (
            id INTEGER PRIMARY KEY,
            recorded_at TEXT NOT NULL,
            voice_type TEXT NOT NULL,
            recommended_octave INTEGER NOT NULL,
            data TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS challenge_results (
            id INTEGER PRIMARY KEY,
            finished_at TEXT NOT NULL,
            difficulty TEXT NOT NULL,
            outcome TEXT NOT NULL,
            total_score INTEGER NOT NULL,
            data TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS checkpoints (
            kind TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            saved_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .context("Failed to initialize database schema")?;

    Ok(())
}

pub fn save_calibration(conn: &Connection, record: &CalibrationRecord) -> Result<i64> {
    let json = serde_json::to_string(record).context("Failed to serialize calibration")?;
    conn.execute(
        "INSERT INTO calibrations (recorded_at, voice_type, recommended_octave, data)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            record.recorded_at,
            record.result.voice_type.as_str(),
            record.result.recommended_octave,
            json,
        ],
    )
    .context("Failed to save calibration")?;
    Ok(conn.last_insert_rowid())
}

/// Most recent calibration, if any.
pub fn latest_calibration(conn: &Connection) -> Result<Option<CalibrationRecord>> {
    let json: Option<String> = conn
        .query_row(
            "SELECT data FROM calibrations ORDER BY id DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to query calibrations")?;

    json.map(|j| serde_json::from_str(&j).context("Failed to parse stored calibration"))
        .transpose()
}

pub fn save_challenge_result(conn: &Connection, record: &ChallengeRecord) -> Result<i64> {
    let json = serde_json::to_string(record).context("Failed to serialize challenge result")?;
    conn.execute(
        "INSERT INTO challenge_results (finished_at, difficulty, outcome, total_score, data)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            record.finished_at,
            record.difficulty.as_str(),
            record.outcome.as_str(),
            record.stats.total_score,
            json,
        ],
    )
    .context("Failed to save challenge result")?;
    Ok(conn.last_insert_rowid())
}

/// Latest `limit` challenge results, newest first. Unreadable rows are skipped.
pub fn recent_challenge_results(conn: &Connection, limit: usize) -> Result<Vec<ChallengeRecord>> {
    let mut stmt = conn
        .prepare("SELECT data FROM challenge_results ORDER BY id DESC LIMIT ?1")
        .context("Failed to prepare history query")?;

    let records = stmt
        .query_map([limit as i64], |row| row.get::<_, String>(0))
        .context("Failed to list challenge results")?
        .filter_map(|r| r.ok())
        .filter_map(|json| match serde_json::from_str(&json) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable challenge result");
                None
            }
        })
        .collect();

    Ok(records)
}

/// Best total score ever recorded for a difficulty.
pub fn best_score(conn: &Connection, difficulty: &str) -> Result<Option<u32>> {
    conn.query_row(
        "SELECT MAX(total_score) FROM challenge_results WHERE difficulty = ?1",
        [difficulty],
        |row| row.get(0),
    )
    .context("Failed to query best score")
}

/// Write (or replace) the checkpoint stored under `kind`.
pub fn save_checkpoint(conn: &Connection, kind: &str, data: &Value) -> Result<()> {
    conn.execute(
        "INSERT INTO checkpoints (kind, data) VALUES (?1, ?2)
         ON CONFLICT(kind) DO UPDATE SET
            data = ?2,
            saved_at = datetime('now')",
        rusqlite::params![kind, data.to_string()],
    )
    .with_context(|| format!("Failed to save {kind} checkpoint"))?;
    Ok(())
}

/// Read a checkpoint. A corrupt blob is treated as absent.
pub fn load_checkpoint(conn: &Connection, kind: &str) -> Result<Option<Value>> {
    let json: Option<String> = conn
        .query_row("SELECT data FROM checkpoints WHERE kind = ?1", [kind], |row| {
            row.get(0)
        })
        .optional()
        .with_context(|| format!("Failed to load {kind} checkpoint"))?;

    Ok(json.and_then(|j| match serde_json::from_str(&j) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(kind, error = %e, "discarding corrupt checkpoint");
            None
        }
    }))
}

pub fn clear_checkpoint(conn: &Connection, kind: &str) -> Result<()> {
    conn.execute("DELETE FROM checkpoints WHERE kind = ?1", [kind])
        .with_context(|| format!("Failed to clear {kind} checkpoint"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{CalibrationResult, VoiceType};
    use crate::game::{ChallengeConfig, Difficulty, ScaleChallenge, ScoreBoard};
    use crate::storage::records::ChallengeOutcome;
    use serde_json::json;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn calibration(voice_type: VoiceType) -> CalibrationRecord {
        CalibrationRecord {
            recorded_at: "2026-03-01T10:00:00+00:00".into(),
            result: CalibrationResult {
                lowest_note: "A2".into(),
                highest_note: "E4".into(),
                lowest_midi: 45,
                highest_midi: 64,
                recommended_octave: 3,
                voice_type,
            },
        }
    }

    fn challenge_record(total: u32, difficulty: Difficulty) -> ChallengeRecord {
        let mut board = ScoreBoard::new();
        board.total_score = total;
        let challenge = ScaleChallenge::new(ChallengeConfig {
            octave: 4,
            difficulty,
        })
        .unwrap();
        ChallengeRecord::from_run(&challenge, &board, 0)
    }

    #[test]
    fn schema_creation_idempotent() {
        let conn = test_db();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn latest_calibration_wins() {
        let conn = test_db();
        assert!(latest_calibration(&conn).unwrap().is_none());

        save_calibration(&conn, &calibration(VoiceType::Bass)).unwrap();
        save_calibration(&conn, &calibration(VoiceType::Baritone)).unwrap();

        let latest = latest_calibration(&conn).unwrap().unwrap();
        assert_eq!(latest.result.voice_type, VoiceType::Baritone);
        assert_eq!(latest.result.lowest_note, "A2");
    }

    #[test]
    fn history_is_newest_first_and_limited() {
        let conn = test_db();
        for total in [100, 200, 300] {
            save_challenge_result(&conn, &challenge_record(total, Difficulty::Normal)).unwrap();
        }
        let recent = recent_challenge_results(&conn, 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].stats.total_score, 300);
        assert_eq!(recent[1].stats.total_score, 200);
        assert_eq!(recent[0].outcome, ChallengeOutcome::Abandoned);
    }

    #[test]
    fn best_score_per_difficulty() {
        let conn = test_db();
        assert_eq!(best_score(&conn, "hard").unwrap(), None);
        save_challenge_result(&conn, &challenge_record(450, Difficulty::Hard)).unwrap();
        save_challenge_result(&conn, &challenge_record(900, Difficulty::Normal)).unwrap();
        assert_eq!(best_score(&conn, "hard").unwrap(), Some(450));
    }

    #[test]
    fn checkpoint_upsert_and_clear() {
        let conn = test_db();
        assert!(load_checkpoint(&conn, CHALLENGE_CHECKPOINT).unwrap().is_none());

        save_checkpoint(&conn, CHALLENGE_CHECKPOINT, &json!({"index": 1})).unwrap();
        save_checkpoint(&conn, CHALLENGE_CHECKPOINT, &json!({"index": 2})).unwrap();
        let loaded = load_checkpoint(&conn, CHALLENGE_CHECKPOINT).unwrap().unwrap();
        assert_eq!(loaded["index"], 2);

        clear_checkpoint(&conn, CHALLENGE_CHECKPOINT).unwrap();
        assert!(load_checkpoint(&conn, CHALLENGE_CHECKPOINT).unwrap().is_none());
    }

    #[test]
    fn corrupt_checkpoint_reads_as_absent() {
        let conn = test_db();
        conn.execute(
            "INSERT INTO checkpoints (kind, data) VALUES ('challenge', '{not json')",
            [],
        )
        .unwrap();
        assert!(load_checkpoint(&conn, CHALLENGE_CHECKPOINT).unwrap().is_none());
    }

    #[test]
    fn open_db_at_creates_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("test.db");
        let conn = open_db_at(&path).unwrap();
        save_checkpoint(&conn, "x", &json!(1)).unwrap();
        assert!(path.exists());
    }
}
