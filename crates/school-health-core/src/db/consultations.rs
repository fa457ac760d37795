//! Consultation database operations.

use chrono::{Datelike, NaiveDateTime};
use rusqlite::{params, OptionalExtension, Row};

use super::{constraint_aware, Database, DbError, DbResult};
use crate::models::{Consultation, ConsultationStatus};

/// Storage format for consultation times; sorts lexically.
pub const SLOT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Outside four-digit years chrono writes a sign (`+10190-...`) and the text no
// longer sorts with the rest.
const EARLIEST_SLOT_TIME: &str = "0000-01-01 00:00:00";
const LATEST_SLOT_TIME: &str = "9999-12-31 23:59:59";

/// True when `t` can be stored and compared as [`SLOT_TIME_FORMAT`] text.
pub fn is_storable_slot_time(t: &NaiveDateTime) -> bool {
    (0..=9999).contains(&t.year())
}

fn slot_time(t: &NaiveDateTime) -> DbResult<String> {
    if !is_storable_slot_time(t) {
        return Err(DbError::Constraint(format!(
            "consultation time {} is outside the storable range",
            t
        )));
    }
    Ok(t.format(SLOT_TIME_FORMAT).to_string())
}

/// Query bound for a window edge, clamped to the storable range.
fn window_bound(t: &NaiveDateTime) -> String {
    match t.year() {
        y if y < 0 => EARLIEST_SLOT_TIME.to_string(),
        y if y > 9999 => LATEST_SLOT_TIME.to_string(),
        _ => t.format(SLOT_TIME_FORMAT).to_string(),
    }
}

const CONSULTATION_COLUMNS: &str = "consultation_id, nurse_id, parent_id, student_id, reason, \
                                    starts_at, duration_minutes, status, notes, created_at, updated_at";

impl Database {
    /// Insert a consultation without any overlap check.
    ///
    /// Use [`crate::scheduling::Scheduler::schedule`] to book a slot.
    pub fn insert_consultation(&self, consultation: &Consultation) -> DbResult<()> {
        let starts_at = slot_time(&consultation.starts_at)?;
        let ends_at = consultation
            .ends_at()
            .ok_or_else(|| {
                DbError::Constraint(format!(
                    "consultation {} ends past the calendar",
                    consultation.consultation_id
                ))
            })
            .and_then(|end| slot_time(&end))?;

        self.conn
            .execute(
                r#"
                INSERT INTO consultations (
                    consultation_id, nurse_id, parent_id, student_id, reason,
                    starts_at, ends_at, duration_minutes, status, notes,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                params![
                    consultation.consultation_id,
                    consultation.nurse_id,
                    consultation.parent_id,
                    consultation.student_id,
                    consultation.reason,
                    starts_at,
                    ends_at,
                    consultation.duration_minutes,
                    consultation.status.as_str(),
                    consultation.notes,
                    consultation.created_at,
                    consultation.updated_at,
                ],
            )
            .map_err(constraint_aware)?;
        Ok(())
    }

    /// Get a consultation by ID.
    pub fn get_consultation(&self, consultation_id: &str) -> DbResult<Option<Consultation>> {
        let sql = format!(
            "SELECT {} FROM consultations WHERE consultation_id = ?",
            CONSULTATION_COLUMNS
        );
        self.conn
            .query_row(&sql, [consultation_id], read_consultation_row)
            .optional()?
            .map(Consultation::try_from)
            .transpose()
    }

    /// Non-cancelled consultations involving the nurse or the parent that touch
    /// `[from, until)`.
    pub fn list_active_consultations_between(
        &self,
        nurse_id: &str,
        parent_id: &str,
        from: NaiveDateTime,
        until: NaiveDateTime,
    ) -> DbResult<Vec<Consultation>> {
        let sql = format!(
            r#"
            SELECT {} FROM consultations
            WHERE (nurse_id = ?1 OR parent_id = ?2)
              AND status != 'cancelled'
              AND starts_at < ?4
              AND ends_at > ?3
            ORDER BY starts_at
            "#,
            CONSULTATION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                nurse_id,
                parent_id,
                window_bound(&from),
                window_bound(&until),
            ],
            read_consultation_row,
        )?;

        let mut consultations = Vec::new();
        for row in rows {
            consultations.push(row?.try_into()?);
        }
        Ok(consultations)
    }

    /// List a nurse's consultations in start order.
    pub fn list_consultations_for_nurse(&self, nurse_id: &str) -> DbResult<Vec<Consultation>> {
        let sql = format!(
            "SELECT {} FROM consultations WHERE nurse_id = ? ORDER BY starts_at",
            CONSULTATION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([nurse_id], read_consultation_row)?;

        let mut consultations = Vec::new();
        for row in rows {
            consultations.push(row?.try_into()?);
        }
        Ok(consultations)
    }

    /// Mark a scheduled consultation as held.
    pub fn complete_consultation(
        &self,
        consultation_id: &str,
        notes: Option<String>,
    ) -> DbResult<Consultation> {
        let tx = self.begin_immediate()?;
        let mut consultation = self
            .get_consultation(consultation_id)?
            .ok_or_else(|| DbError::NotFound(format!("consultation {}", consultation_id)))?;
        consultation.complete(notes)?;
        self.store_consultation_status(&consultation)?;
        tx.commit()?;
        Ok(consultation)
    }

    /// Cancel a scheduled consultation, freeing its slot.
    pub fn cancel_consultation(&self, consultation_id: &str) -> DbResult<Consultation> {
        let tx = self.begin_immediate()?;
        let mut consultation = self
            .get_consultation(consultation_id)?
            .ok_or_else(|| DbError::NotFound(format!("consultation {}", consultation_id)))?;
        consultation.cancel()?;
        self.store_consultation_status(&consultation)?;
        tx.commit()?;
        Ok(consultation)
    }

    /// Write a status change made to a consultation read while it was scheduled.
    fn store_consultation_status(&self, consultation: &Consultation) -> DbResult<()> {
        let changed = self.conn.execute(
            r#"
            UPDATE consultations SET status = ?2, notes = ?3, updated_at = ?4
            WHERE consultation_id = ?1 AND status = 'scheduled'
            "#,
            params![
                consultation.consultation_id,
                consultation.status.as_str(),
                consultation.notes,
                consultation.updated_at,
            ],
        )?;
        if changed != 1 {
            return Err(DbError::Conflict(format!(
                "consultation {} is no longer scheduled",
                consultation.consultation_id
            )));
        }
        Ok(())
    }
}

/// Intermediate row struct for database mapping.
struct ConsultationRow {
    consultation_id: String,
    nurse_id: String,
    parent_id: String,
    student_id: String,
    reason: String,
    starts_at: String,
    duration_minutes: u32,
    status: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

fn read_consultation_row(row: &Row<'_>) -> rusqlite::Result<ConsultationRow> {
    Ok(ConsultationRow {
        consultation_id: row.get(0)?,
        nurse_id: row.get(1)?,
        parent_id: row.get(2)?,
        student_id: row.get(3)?,
        reason: row.get(4)?,
        starts_at: row.get(5)?,
        duration_minutes: row.get(6)?,
        status: row.get(7)?,
        notes: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

impl TryFrom<ConsultationRow> for Consultation {
    type Error = DbError;

    fn try_from(row: ConsultationRow) -> Result<Self, Self::Error> {
        let starts_at = NaiveDateTime::parse_from_str(&row.starts_at, SLOT_TIME_FORMAT)
            .map_err(|e| DbError::Constraint(format!("Bad starts_at {:?}: {}", row.starts_at, e)))?;
        let status = ConsultationStatus::parse(&row.status).ok_or_else(|| {
            DbError::Constraint(format!("Unknown consultation status: {}", row.status))
        })?;

        Ok(Consultation {
            consultation_id: row.consultation_id,
            nurse_id: row.nurse_id,
            parent_id: row.parent_id,
            student_id: row.student_id,
            reason: row.reason,
            starts_at,
            duration_minutes: row.duration_minutes,
            status,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
