//! Consultation overlap checking.
//!
//! Two consultations conflict when they share the nurse or the parent, neither is
//! cancelled, and their slots `[start, end + buffer)` intersect. Back-to-back slots
//! (one ends exactly when the next starts) do not conflict when the buffer is zero.

use chrono::{Duration, NaiveDateTime};
use thiserror::Error;

use crate::db::{self, Database, DbError};
use crate::models::{Consultation, MAX_CONSULTATION_MINUTES};

/// Scheduling errors.
#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Consultation overlaps existing booking(s): {}", .conflicting_ids.join(", "))]
    Conflict { conflicting_ids: Vec<String> },

    #[error("Invalid consultation: {0}")]
    InvalidSlot(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

pub type SchedulingResult<T> = Result<T, SchedulingError>;

/// Slot occupied by `consultation`, including the trailing buffer. Saturates at
/// the end of the calendar.
fn occupied_until(consultation: &Consultation, buffer_minutes: u32) -> NaiveDateTime {
    consultation
        .ends_at()
        .and_then(|end| end.checked_add_signed(Duration::minutes(i64::from(buffer_minutes))))
        .unwrap_or(NaiveDateTime::MAX)
}

fn shares_participant(a: &Consultation, b: &Consultation) -> bool {
    a.nurse_id == b.nurse_id || a.parent_id == b.parent_id
}

/// True when `a` and `b` cannot both be held.
pub fn overlaps(a: &Consultation, b: &Consultation, buffer_minutes: u32) -> bool {
    if a.consultation_id == b.consultation_id || !a.occupies_slot() || !b.occupies_slot() {
        return false;
    }
    if !shares_participant(a, b) {
        return false;
    }
    a.starts_at < occupied_until(b, buffer_minutes) && b.starts_at < occupied_until(a, buffer_minutes)
}

/// All consultations in `existing` that conflict with `candidate`.
pub fn find_conflicts<'c>(
    candidate: &Consultation,
    existing: &'c [Consultation],
    buffer_minutes: u32,
) -> Vec<&'c Consultation> {
    existing
        .iter()
        .filter(|other| overlaps(candidate, other, buffer_minutes))
        .collect()
}

/// Fail with [`SchedulingError::Conflict`] if `candidate` overlaps anything.
pub fn ensure_no_overlap(
    candidate: &Consultation,
    existing: &[Consultation],
    buffer_minutes: u32,
) -> SchedulingResult<()> {
    validate_slot(candidate)?;
    let conflicts = find_conflicts(candidate, existing, buffer_minutes);
    if conflicts.is_empty() {
        return Ok(());
    }
    Err(SchedulingError::Conflict {
        conflicting_ids: conflicts
            .into_iter()
            .map(|c| c.consultation_id.clone())
            .collect(),
    })
}

fn validate_slot(candidate: &Consultation) -> SchedulingResult<()> {
    if candidate.duration_minutes == 0 {
        return Err(SchedulingError::InvalidSlot(
            "duration must be at least one minute".into(),
        ));
    }
    if candidate.duration_minutes > MAX_CONSULTATION_MINUTES {
        return Err(SchedulingError::InvalidSlot(format!(
            "duration must not exceed {} minutes",
            MAX_CONSULTATION_MINUTES
        )));
    }
    let in_range = candidate
        .ends_at()
        .map_or(false, |end| {
            db::is_storable_slot_time(&candidate.starts_at) && db::is_storable_slot_time(&end)
        });
    if !in_range {
        return Err(out_of_range());
    }
    if candidate.nurse_id.trim().is_empty() || candidate.parent_id.trim().is_empty() {
        return Err(SchedulingError::InvalidSlot(
            "nurse and parent are required".into(),
        ));
    }
    Ok(())
}

fn out_of_range() -> SchedulingError {
    SchedulingError::InvalidSlot("slot falls outside the supported calendar range".into())
}

/// Books consultations against the store.
pub struct Scheduler<'a> {
    db: &'a Database,
    buffer_minutes: u32,
}

impl<'a> Scheduler<'a> {
    /// Create a scheduler with no buffer between consultations.
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            buffer_minutes: 0,
        }
    }

    /// Require `buffer_minutes` free after each consultation.
    pub fn with_buffer(mut self, buffer_minutes: u32) -> Self {
        self.buffer_minutes = buffer_minutes;
        self
    }

    /// Check for overlaps and insert, atomically.
    #[tracing::instrument(
        name = "scheduler.schedule",
        skip_all,
        fields(nurse_id = %consultation.nurse_id, starts_at = %consultation.starts_at),
        err
    )]
    pub fn schedule(&self, consultation: &Consultation) -> SchedulingResult<()> {
        validate_slot(consultation)?;
        let buffer = Duration::minutes(i64::from(self.buffer_minutes));

        let from = consultation
            .starts_at
            .checked_sub_signed(buffer)
            .ok_or_else(out_of_range)?;
        let until = consultation
            .ends_at()
            .and_then(|end| end.checked_add_signed(buffer))
            .ok_or_else(out_of_range)?;

        let tx = self.db.begin_immediate()?;
        let nearby = self.db.list_active_consultations_between(
            &consultation.nurse_id,
            &consultation.parent_id,
            from,
            until,
        )?;
        ensure_no_overlap(consultation, &nearby, self.buffer_minutes)?;

        self.db.insert_consultation(consultation)?;
        tx.commit().map_err(DbError::from)?;

        tracing::info!(consultation_id = %consultation.consultation_id, "consultation scheduled");
        Ok(())
    }
}
