use anyhow::Result;
use serde_json::Value;

use super::db;
use super::records::{CalibrationRecord, ChallengeRecord};

/// Save a calibration to the default database.
pub fn save_calibration(record: &CalibrationRecord) -> Result<()> {
    let conn = db::open_db()?;
    db::save_calibration(&conn, record)?;
    Ok(())
}

/// Most recent calibration, if the user has ever calibrated.
pub fn latest_calibration() -> Result<Option<CalibrationRecord>> {
    let conn = db::open_db()?;
    db::latest_calibration(&conn)
}

/// Record a finished challenge and drop its checkpoint.
pub fn finish_challenge(record: &ChallengeRecord) -> Result<()> {
    let conn = db::open_db()?;
    db::save_challenge_result(&conn, record)?;
    db::clear_checkpoint(&conn, db::CHALLENGE_CHECKPOINT)
}

pub fn recent_challenges(limit: usize) -> Result<Vec<ChallengeRecord>> {
    let conn = db::open_db()?;
    db::recent_challenge_results(&conn, limit)
}

pub fn best_score(difficulty: &str) -> Result<Option<u32>> {
    let conn = db::open_db()?;
    db::best_score(&conn, difficulty)
}

pub fn save_challenge_checkpoint(data: &Value) -> Result<()> {
    let conn = db::open_db()?;
    db::save_checkpoint(&conn, db::CHALLENGE_CHECKPOINT, data)
}

pub fn load_challenge_checkpoint() -> Result<Option<Value>> {
    let conn = db::open_db()?;
    db::load_checkpoint(&conn, db::CHALLENGE_CHECKPOINT)
}
