//! SQLite persistence for assessments and the export outbox.
//!
//! Assessments are soft-retained: created on submission, updated only by
//! the narrative report step, never deleted in normal flow. The outbox
//! holds pending CRM deliveries so they survive process restarts.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::valuation::{DriverGrades, FollowUpIntent, Grade, Tier};

/// Stored assessment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    /// Assessment ID (UUID)
    pub id: String,
    /// Product tier
    pub tier: Tier,
    /// Company name
    pub company_name: String,
    /// NAICS industry code (paid tiers)
    pub naics_code: Option<String>,
    /// Founding year
    pub founded_year: Option<i32>,
    /// Contact first name
    pub first_name: String,
    /// Contact last name
    pub last_name: String,
    /// Contact email (CRM-facing identity)
    pub email: String,
    /// The ten value-driver grades
    pub grades: DriverGrades,
    /// Base EBITDA from the normalizer
    pub base_ebitda: f64,
    /// Adjusted EBITDA after owner add-backs
    pub adjusted_ebitda: f64,
    /// Selected mid multiple
    pub valuation_multiple: f64,
    /// Conservative estimate
    pub low_estimate: f64,
    /// Market estimate
    pub mid_estimate: f64,
    /// Optimistic estimate
    pub high_estimate: f64,
    /// Overall letter score
    pub overall_score: Grade,
    /// Narrative summary (filled asynchronously by the report step)
    pub narrative: Option<String>,
    /// Follow-up intent
    pub follow_up: FollowUpIntent,
    /// Session the submission arrived under
    pub session_id: String,
    /// Client idempotency key, when provided
    pub idempotency_key: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Outbox delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportStatus {
    /// Waiting for dispatch (or retry on a later pass)
    Pending,
    /// Delivered to the CRM
    Delivered,
    /// Gave up: fatal rejection or attempt budget exhausted
    Failed,
}

impl ExportStatus {
    pub fn to_db_string(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "delivered" => Some(Self::Delivered),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Queued CRM export record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord {
    /// Export ID (UUID)
    pub id: String,
    /// Assessment this export belongs to
    pub assessment_id: String,
    /// Contact payload captured at enqueue time
    pub payload: serde_json::Value,
    /// Delivery status
    pub status: ExportStatus,
    /// Delivery attempts made so far
    pub attempts: u32,
    /// Last delivery error (if any)
    pub last_error: Option<String>,
    /// Enqueue timestamp
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

/// SQLite store for assessments and the export outbox.
pub struct AssessmentStore {
    conn: Arc<Mutex<Connection>>,
}

impl AssessmentStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data dir {:?}", parent))?;
        }

        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", path.as_ref()))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.init_schema()?;

        info!(path = ?path.as_ref(), "Assessment store opened");
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.init_schema()?;

        debug!("In-memory assessment store created");
        Ok(store)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS assessments (
                id TEXT PRIMARY KEY,
                tier TEXT NOT NULL,
                company_name TEXT NOT NULL,
                naics_code TEXT,
                founded_year INTEGER,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL,
                grades TEXT NOT NULL,
                base_ebitda REAL NOT NULL,
                adjusted_ebitda REAL NOT NULL,
                valuation_multiple REAL NOT NULL,
                low_estimate REAL NOT NULL,
                mid_estimate REAL NOT NULL,
                high_estimate REAL NOT NULL,
                overall_score TEXT NOT NULL,
                narrative TEXT,
                follow_up TEXT NOT NULL,
                session_id TEXT NOT NULL,
                idempotency_key TEXT UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS export_outbox (
                id TEXT PRIMARY KEY,
                assessment_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                status TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (assessment_id) REFERENCES assessments(id)
            );

            CREATE INDEX IF NOT EXISTS idx_assessments_created ON assessments(created_at);
            CREATE INDEX IF NOT EXISTS idx_assessments_email ON assessments(email);
            CREATE INDEX IF NOT EXISTS idx_outbox_status ON export_outbox(status);
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    // ========================================================================
    // Assessment Operations
    // ========================================================================

    /// Insert an assessment, deduplicating on the idempotency key.
    ///
    /// When the key matches a previously stored record, that record is
    /// returned and the flag is false. Submissions without a key are
    /// always accepted as fresh records.
    pub fn insert(&self, assessment: &Assessment) -> Result<(Assessment, bool)> {
        let conn = self.conn.lock().unwrap();

        if let Some(key) = &assessment.idempotency_key {
            let existing = conn
                .query_row(
                    &format!("SELECT {ASSESSMENT_COLUMNS} FROM assessments WHERE idempotency_key = ?1"),
                    params![key],
                    row_to_assessment,
                )
                .optional()?;

            if let Some(existing) = existing {
                debug!(
                    assessment_id = %existing.id,
                    idempotency_key = %key,
                    "Duplicate submission collapsed onto stored assessment"
                );
                return Ok((existing, false));
            }
        }

        conn.execute(
            r#"
            INSERT INTO assessments (
                id, tier, company_name, naics_code, founded_year,
                first_name, last_name, email, grades,
                base_ebitda, adjusted_ebitda, valuation_multiple,
                low_estimate, mid_estimate, high_estimate, overall_score,
                narrative, follow_up, session_id, idempotency_key,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)
            "#,
            params![
                assessment.id,
                assessment.tier.as_str(),
                assessment.company_name,
                assessment.naics_code,
                assessment.founded_year,
                assessment.first_name,
                assessment.last_name,
                assessment.email,
                serde_json::to_string(&assessment.grades)?,
                assessment.base_ebitda,
                assessment.adjusted_ebitda,
                assessment.valuation_multiple,
                assessment.low_estimate,
                assessment.mid_estimate,
                assessment.high_estimate,
                assessment.overall_score.letter(),
                assessment.narrative,
                assessment.follow_up.as_str(),
                assessment.session_id,
                assessment.idempotency_key,
                assessment.created_at.to_rfc3339(),
                assessment.updated_at.to_rfc3339(),
            ],
        )?;

        debug!(assessment_id = %assessment.id, tier = %assessment.tier, "Assessment stored");
        Ok((assessment.clone(), true))
    }

    /// Get an assessment by ID.
    pub fn get(&self, id: &str) -> Result<Option<Assessment>> {
        let conn = self.conn.lock().unwrap();

        let result = conn
            .query_row(
                &format!("SELECT {ASSESSMENT_COLUMNS} FROM assessments WHERE id = ?1"),
                params![id],
                row_to_assessment,
            )
            .optional()?;

        Ok(result)
    }

    /// Most recent assessments, newest first.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<Assessment>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(&format!(
            "SELECT {ASSESSMENT_COLUMNS} FROM assessments ORDER BY created_at DESC LIMIT ?1"
        ))?;

        let rows = stmt.query_map(params![limit as i64], row_to_assessment)?;
        let mut assessments = Vec::new();
        for row in rows {
            assessments.push(row?);
        }

        Ok(assessments)
    }

    /// Total stored assessments.
    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM assessments", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Write the narrative produced by the report step.
    pub fn set_narrative(&self, id: &str, narrative: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE assessments SET narrative = ?1, updated_at = ?2 WHERE id = ?3",
            params![narrative, Utc::now().to_rfc3339(), id],
        )?;

        debug!(assessment_id = %id, "Narrative written");
        Ok(())
    }

    // ========================================================================
    // Export Outbox Operations
    // ========================================================================

    /// Queue a CRM export for an assessment.
    pub fn enqueue_export(&self, assessment_id: &str, payload: &serde_json::Value) -> Result<ExportRecord> {
        let conn = self.conn.lock().unwrap();

        let now = Utc::now();
        let record = ExportRecord {
            id: uuid::Uuid::new_v4().to_string(),
            assessment_id: assessment_id.to_string(),
            payload: payload.clone(),
            status: ExportStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            r#"
            INSERT INTO export_outbox (id, assessment_id, payload, status, attempts, last_error, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.id,
                record.assessment_id,
                serde_json::to_string(&record.payload)?,
                record.status.to_db_string(),
                record.attempts,
                record.last_error,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;

        debug!(export_id = %record.id, assessment_id = %assessment_id, "Export queued");
        Ok(record)
    }

    /// Pending exports, oldest first.
    pub fn pending_exports(&self, limit: usize) -> Result<Vec<ExportRecord>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            r#"
            SELECT id, assessment_id, payload, status, attempts, last_error, created_at, updated_at
            FROM export_outbox
            WHERE status = 'pending'
            ORDER BY created_at ASC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64], row_to_export)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(records)
    }

    /// Number of exports still waiting for delivery.
    pub fn export_queue_depth(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM export_outbox WHERE status = 'pending'",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Record the outcome of a delivery pass for one export.
    pub fn update_export(
        &self,
        id: &str,
        status: ExportStatus,
        attempts: u32,
        last_error: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            UPDATE export_outbox
            SET status = ?1, attempts = ?2, last_error = ?3, updated_at = ?4
            WHERE id = ?5
            "#,
            params![
                status.to_db_string(),
                attempts,
                last_error,
                Utc::now().to_rfc3339(),
                id,
            ],
        )?;

        Ok(())
    }

    /// Get one export record by ID.
    pub fn get_export(&self, id: &str) -> Result<Option<ExportRecord>> {
        let conn = self.conn.lock().unwrap();

        let result = conn
            .query_row(
                r#"
                SELECT id, assessment_id, payload, status, attempts, last_error, created_at, updated_at
                FROM export_outbox WHERE id = ?1
                "#,
                params![id],
                row_to_export,
            )
            .optional()?;

        Ok(result)
    }
}

const ASSESSMENT_COLUMNS: &str = "id, tier, company_name, naics_code, founded_year, \
     first_name, last_name, email, grades, \
     base_ebitda, adjusted_ebitda, valuation_multiple, \
     low_estimate, mid_estimate, high_estimate, overall_score, \
     narrative, follow_up, session_id, idempotency_key, \
     created_at, updated_at";

fn row_to_assessment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Assessment> {
    let tier_str: String = row.get(1)?;
    let grades_json: String = row.get(8)?;
    let score_str: String = row.get(15)?;
    let follow_up_str: String = row.get(17)?;
    let created_str: String = row.get(20)?;
    let updated_str: String = row.get(21)?;

    Ok(Assessment {
        id: row.get(0)?,
        tier: Tier::from_db_string(&tier_str),
        company_name: row.get(2)?,
        naics_code: row.get(3)?,
        founded_year: row.get(4)?,
        first_name: row.get(5)?,
        last_name: row.get(6)?,
        email: row.get(7)?,
        grades: serde_json::from_str(&grades_json).unwrap_or_default(),
        base_ebitda: row.get(9)?,
        adjusted_ebitda: row.get(10)?,
        valuation_multiple: row.get(11)?,
        low_estimate: row.get(12)?,
        mid_estimate: row.get(13)?,
        high_estimate: row.get(14)?,
        overall_score: Grade::parse_lenient(&score_str),
        narrative: row.get(16)?,
        follow_up: FollowUpIntent::from_db_string(&follow_up_str),
        session_id: row.get(18)?,
        idempotency_key: row.get(19)?,
        created_at: parse_timestamp(&created_str),
        updated_at: parse_timestamp(&updated_str),
    })
}

fn row_to_export(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExportRecord> {
    let payload_json: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    let created_str: String = row.get(6)?;
    let updated_str: String = row.get(7)?;

    Ok(ExportRecord {
        id: row.get(0)?,
        assessment_id: row.get(1)?,
        payload: serde_json::from_str(&payload_json).unwrap_or(serde_json::Value::Null),
        status: ExportStatus::from_db_string(&status_str).unwrap_or(ExportStatus::Pending),
        attempts: row.get(4)?,
        last_error: row.get(5)?,
        created_at: parse_timestamp(&created_str),
        updated_at: parse_timestamp(&updated_str),
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_assessment(idempotency_key: Option<&str>) -> Assessment {
        let now = Utc::now();
        Assessment {
            id: uuid::Uuid::new_v4().to_string(),
            tier: Tier::Free,
            company_name: "Riverside Plumbing Co".into(),
            naics_code: None,
            founded_year: Some(2009),
            first_name: "Dana".into(),
            last_name: "Whitfield".into(),
            email: "dana@riversideplumbing.example".into(),
            grades: DriverGrades::default(),
            base_ebitda: 135_000.0,
            adjusted_ebitda: 185_000.0,
            valuation_multiple: 3.5,
            low_estimate: 462_500.0,
            mid_estimate: 647_500.0,
            high_estimate: 832_500.0,
            overall_score: Grade::C,
            narrative: None,
            follow_up: FollowUpIntent::Exploring,
            session_id: "sess-1".into(),
            idempotency_key: idempotency_key.map(String::from),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = AssessmentStore::in_memory().unwrap();
        let assessment = sample_assessment(None);

        let (stored, created) = store.insert(&assessment).unwrap();
        assert!(created);
        assert_eq!(stored.id, assessment.id);

        let fetched = store.get(&assessment.id).unwrap().unwrap();
        assert_eq!(fetched.company_name, "Riverside Plumbing Co");
        assert_eq!(fetched.adjusted_ebitda, 185_000.0);
        assert_eq!(fetched.overall_score, Grade::C);
        assert!(fetched.narrative.is_none());
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = AssessmentStore::in_memory().unwrap();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_idempotency_key_collapses_duplicates() {
        let store = AssessmentStore::in_memory().unwrap();

        let first = sample_assessment(Some("submit-abc"));
        let (stored_first, created) = store.insert(&first).unwrap();
        assert!(created);

        let mut second = sample_assessment(Some("submit-abc"));
        second.company_name = "Different Name LLC".into();
        let (stored_second, created) = store.insert(&second).unwrap();
        assert!(!created);
        assert_eq!(stored_second.id, stored_first.id);
        assert_eq!(stored_second.company_name, "Riverside Plumbing Co");

        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_no_key_accepts_duplicates() {
        // Documents the legacy double-click behavior when the client
        // sends no idempotency key.
        let store = AssessmentStore::in_memory().unwrap();

        let (_, created1) = store.insert(&sample_assessment(None)).unwrap();
        let (_, created2) = store.insert(&sample_assessment(None)).unwrap();
        assert!(created1);
        assert!(created2);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_set_narrative() {
        let store = AssessmentStore::in_memory().unwrap();
        let assessment = sample_assessment(None);
        store.insert(&assessment).unwrap();

        store
            .set_narrative(&assessment.id, "A solid C-grade business.")
            .unwrap();

        let fetched = store.get(&assessment.id).unwrap().unwrap();
        assert_eq!(fetched.narrative.as_deref(), Some("A solid C-grade business."));
        assert!(fetched.updated_at >= fetched.created_at);
    }

    #[test]
    fn test_list_recent_newest_first() {
        let store = AssessmentStore::in_memory().unwrap();

        let mut older = sample_assessment(None);
        older.created_at = Utc::now() - chrono::Duration::hours(2);
        let newer = sample_assessment(None);

        store.insert(&older).unwrap();
        store.insert(&newer).unwrap();

        let listed = store.list_recent(10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);

        assert_eq!(store.list_recent(1).unwrap().len(), 1);
    }

    #[test]
    fn test_export_outbox_lifecycle() {
        let store = AssessmentStore::in_memory().unwrap();
        let assessment = sample_assessment(None);
        store.insert(&assessment).unwrap();

        let payload = serde_json::json!({ "email": assessment.email });
        let record = store.enqueue_export(&assessment.id, &payload).unwrap();
        assert_eq!(record.status, ExportStatus::Pending);
        assert_eq!(store.export_queue_depth().unwrap(), 1);

        let pending = store.pending_exports(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, record.id);

        store
            .update_export(&record.id, ExportStatus::Delivered, 1, None)
            .unwrap();
        assert_eq!(store.export_queue_depth().unwrap(), 0);

        let updated = store.get_export(&record.id).unwrap().unwrap();
        assert_eq!(updated.status, ExportStatus::Delivered);
        assert_eq!(updated.attempts, 1);
    }

    #[test]
    fn test_failed_export_retains_error() {
        let store = AssessmentStore::in_memory().unwrap();
        let assessment = sample_assessment(None);
        store.insert(&assessment).unwrap();

        let record = store
            .enqueue_export(&assessment.id, &serde_json::json!({}))
            .unwrap();
        store
            .update_export(&record.id, ExportStatus::Failed, 5, Some("HTTP 422: bad contact"))
            .unwrap();

        let failed = store.get_export(&record.id).unwrap().unwrap();
        assert_eq!(failed.status, ExportStatus::Failed);
        assert_eq!(failed.last_error.as_deref(), Some("HTTP 422: bad contact"));
        assert_eq!(store.export_queue_depth().unwrap(), 0);
    }

    #[test]
    fn test_open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("assessments.db");

        let store = AssessmentStore::open(&path).unwrap();
        store.insert(&sample_assessment(None)).unwrap();
        drop(store);

        // Reopen and verify durability
        let store = AssessmentStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
