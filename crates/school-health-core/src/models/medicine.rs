//! Medicine request models.

use serde::{Deserialize, Serialize};

use super::StatusTransitionError;

/// Review state of a medicine request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequestStatus {
    /// Submitted by a parent, awaiting the nurse
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

/// A parent's request for the school nurse to give a student medicine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicineRequest {
    pub request_id: String,
    pub student_id: String,
    pub parent_id: String,
    pub medicine_name: String,
    /// e.g. "5 mL", "1 tablet"
    pub dosage: String,
    /// Free text, e.g. "after lunch for 5 days"
    pub schedule: String,
    pub reason: Option<String>,
    pub status: RequestStatus,
    /// Nurse who approved/rejected
    pub reviewed_by: Option<String>,
    pub review_note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl MedicineRequest {
    /// Create a new pending request.
    pub fn new(
        student_id: String,
        parent_id: String,
        medicine_name: String,
        dosage: String,
        schedule: String,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            student_id,
            parent_id,
            medicine_name,
            dosage,
            schedule,
            reason: None,
            status: RequestStatus::Pending,
            reviewed_by: None,
            review_note: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Approve or reject. Only pending requests can be reviewed.
    pub fn review(
        &mut self,
        reviewer_id: &str,
        approve: bool,
        note: Option<String>,
    ) -> Result<(), StatusTransitionError> {
        let to = if approve {
            RequestStatus::Approved
        } else {
            RequestStatus::Rejected
        };
        if self.status != RequestStatus::Pending {
            return Err(StatusTransitionError {
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }

        self.status = to;
        self.reviewed_by = Some(reviewer_id.to_string());
        self.review_note = note;
        self.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> MedicineRequest {
        MedicineRequest::new(
            "student-1".into(),
            "parent-1".into(),
            "Paracetamol".into(),
            "250 mg".into(),
            "after lunch".into(),
        )
    }

    #[test]
    fn test_new_request_is_pending() {
        let r = request();
        assert_eq!(r.status, RequestStatus::Pending);
        assert!(r.reviewed_by.is_none());
    }

    #[test]
    fn test_approve() {
        let mut r = request();
        r.review("nurse-1", true, None).unwrap();
        assert_eq!(r.status, RequestStatus::Approved);
        assert_eq!(r.reviewed_by.as_deref(), Some("nurse-1"));
    }

    #[test]
    fn test_cannot_review_twice() {
        let mut r = request();
        r.review("nurse-1", false, Some("Missing prescription".into()))
            .unwrap();
        assert_eq!(r.status, RequestStatus::Rejected);

        let err = r.review("nurse-2", true, None).unwrap_err();
        assert_eq!(err.from, "rejected");
        assert_eq!(err.to, "approved");
        assert_eq!(r.reviewed_by.as_deref(), Some("nurse-1"));
    }
}
