//! Nurse–parent consultation models.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::StatusTransitionError;

/// Longest slot a consultation may book.
pub const MAX_CONSULTATION_MINUTES: u32 = 24 * 60;

/// Consultation status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConsultationStatus {
    /// Booked, not yet held
    Scheduled,
    /// Held
    Completed,
    /// Called off; frees the slot
    Cancelled,
}

impl ConsultationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Scheduled => "scheduled",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(ConsultationStatus::Scheduled),
            "completed" => Some(ConsultationStatus::Completed),
            "cancelled" => Some(ConsultationStatus::Cancelled),
            _ => None,
        }
    }
}

/// A consultation between a nurse and a parent about a student.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Consultation {
    pub consultation_id: String,
    pub nurse_id: String,
    pub parent_id: String,
    pub student_id: String,
    pub reason: String,
    /// Local school time
    pub starts_at: NaiveDateTime,
    pub duration_minutes: u32,
    pub status: ConsultationStatus,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Consultation {
    /// Create a new scheduled consultation.
    pub fn new(
        nurse_id: String,
        parent_id: String,
        student_id: String,
        reason: String,
        starts_at: NaiveDateTime,
        duration_minutes: u32,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            consultation_id: uuid::Uuid::new_v4().to_string(),
            nurse_id,
            parent_id,
            student_id,
            reason,
            starts_at,
            duration_minutes,
            status: ConsultationStatus::Scheduled,
            notes: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// End of the slot (exclusive); `None` past the end of the calendar.
    pub fn ends_at(&self) -> Option<NaiveDateTime> {
        self.starts_at
            .checked_add_signed(Duration::minutes(i64::from(self.duration_minutes)))
    }

    /// Cancelled consultations never block a slot.
    pub fn occupies_slot(&self) -> bool {
        self.status != ConsultationStatus::Cancelled
    }

    /// Mark as held.
    pub fn complete(&mut self, notes: Option<String>) -> Result<(), StatusTransitionError> {
        self.transition(ConsultationStatus::Completed)?;
        if notes.is_some() {
            self.notes = notes;
        }
        Ok(())
    }

    /// Call off the consultation.
    pub fn cancel(&mut self) -> Result<(), StatusTransitionError> {
        self.transition(ConsultationStatus::Cancelled)
    }

    fn transition(&mut self, to: ConsultationStatus) -> Result<(), StatusTransitionError> {
        if self.status != ConsultationStatus::Scheduled {
            return Err(StatusTransitionError {
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }
        self.status = to;
        self.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(())
    }
}
