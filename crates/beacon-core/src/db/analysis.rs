//! Anomaly detection audit records

use rusqlite::params;

use super::{format_datetime, parse_datetime, Database};
use crate::detect::DetectionResult;
use crate::error::Result;
use crate::models::AnalysisRecord;
use crate::store::AnalysisLog;

/// `analysis_type` for detection runs
pub const ANOMALY_ANALYSIS: &str = "anomaly_detection";

impl Database {
    pub fn record_anomaly_analysis(&self, result: &DetectionResult) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO analysis_records
                (user_id, analysis_type, window_start, window_end, threshold, score, payload)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                result.user_id,
                ANOMALY_ANALYSIS,
                format_datetime(result.window_start),
                format_datetime(result.window_end),
                result.threshold,
                result.score,
                serde_json::to_string(&result.anomalies)?,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Newest first
    pub fn list_analysis_records(&self, user_id: i64, limit: i64) -> Result<Vec<AnalysisRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, analysis_type, window_start, window_end, threshold, score, payload, created_at
            FROM analysis_records
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )?;

        let records = stmt
            .query_map(params![user_id, limit], |row| {
                let window_start: String = row.get(3)?;
                let window_end: String = row.get(4)?;
                let payload: String = row.get(7)?;
                let created_at: String = row.get(8)?;
                Ok(AnalysisRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    analysis_type: row.get(2)?,
                    window_start: parse_datetime(&window_start),
                    window_end: parse_datetime(&window_end),
                    threshold: row.get(5)?,
                    score: row.get(6)?,
                    payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
                    created_at: parse_datetime(&created_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

impl AnalysisLog for Database {
    fn record_analysis(&self, result: &DetectionResult) -> Result<i64> {
        self.record_anomaly_analysis(result)
    }
}
