//! School Health Core Library
//!
//! Local store and business rules behind the school health app used by nurses,
//! parents and admins.
//!
//! # Architecture
//!
//! ```text
//!   Admin enrolls student                Parent / Nurse
//!            │                                  │
//!   ┌────────▼─────────┐          ┌─────────────┼──────────────┐
//!   │ Username         │          ▼             ▼              ▼
//!   │ generator        │    Consultation   Medicine       Campaign
//!   │ surname+initials │    scheduler      request        status
//!   │ +ddMMyy (+_n)    │    (overlap       review         changes
//!   └────────┬─────────┘     check)
//!            │                  │             │              │
//!            └──────────────────┴──────┬──────┴──────────────┘
//!                                      ▼
//!                          SQLite (users.username UNIQUE)
//! ```
//!
//! # Modules
//!
//! - [`username`]: Deterministic unique-username generation
//! - [`enrollment`]: Student account creation (generate + insert in one transaction)
//! - [`scheduling`]: Consultation overlap checking
//! - [`db`]: SQLite database layer
//! - [`models`]: Domain types (UserAccount, Consultation, MedicineRequest, HealthCampaign)
//! - [`config`]: Runtime configuration

pub mod config;
pub mod db;
pub mod enrollment;
pub mod models;
pub mod scheduling;
pub mod username;

// Re-export commonly used types
pub use config::CoreConfig;
pub use db::Database;
pub use enrollment::Enrollment;
pub use models::{
    CampaignKind, CampaignStatus, Consultation, ConsultationStatus, HealthCampaign,
    MedicineRequest, NewStudent, RequestStatus, Role, UserAccount,
};
pub use scheduling::Scheduler;
pub use username::{base_username, generate_unique_username, UsernameLookup};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum SchoolHealthError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid status change: {0}")]
    InvalidTransition(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for SchoolHealthError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => SchoolHealthError::NotFound(what),
            db::DbError::InvalidTransition(t) => SchoolHealthError::InvalidTransition(t.to_string()),
            db::DbError::Conflict(msg) => SchoolHealthError::Conflict(msg),
            other => SchoolHealthError::DatabaseError(other.to_string()),
        }
    }
}

impl From<username::UsernameError> for SchoolHealthError {
    fn from(e: username::UsernameError) -> Self {
        match e {
            username::UsernameError::InvalidInput(msg) => SchoolHealthError::InvalidInput(msg),
        }
    }
}

impl From<username::GenerateError<db::DbError>> for SchoolHealthError {
    fn from(e: username::GenerateError<db::DbError>) -> Self {
        match e {
            username::GenerateError::InvalidInput(e) => e.into(),
            username::GenerateError::Lookup(e) => e.into(),
        }
    }
}

impl From<enrollment::EnrollmentError> for SchoolHealthError {
    fn from(e: enrollment::EnrollmentError) -> Self {
        match e {
            enrollment::EnrollmentError::InvalidInput(msg) => SchoolHealthError::InvalidInput(msg),
            enrollment::EnrollmentError::Database(e) => e.into(),
            other => SchoolHealthError::Conflict(other.to_string()),
        }
    }
}

impl From<scheduling::SchedulingError> for SchoolHealthError {
    fn from(e: scheduling::SchedulingError) -> Self {
        match e {
            scheduling::SchedulingError::Database(e) => e.into(),
            scheduling::SchedulingError::InvalidSlot(msg) => SchoolHealthError::InvalidInput(msg),
            conflict => SchoolHealthError::Conflict(conflict.to_string()),
        }
    }
}

impl From<config::ConfigError> for SchoolHealthError {
    fn from(e: config::ConfigError) -> Self {
        SchoolHealthError::ConfigError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for SchoolHealthError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        SchoolHealthError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path with default settings.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<SchoolHealthCore>, SchoolHealthError> {
    let db = Database::open(&path)?;
    Ok(SchoolHealthCore::wrap(db, CoreConfig::default()))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<SchoolHealthCore>, SchoolHealthError> {
    let db = Database::open_in_memory()?;
    Ok(SchoolHealthCore::wrap(db, CoreConfig::default()))
}

/// Open using a JSON [`CoreConfig`]; no `database_path` means in-memory.
#[uniffi::export]
pub fn open_database_with_config(
    config_json: String,
) -> Result<Arc<SchoolHealthCore>, SchoolHealthError> {
    let config = CoreConfig::from_json(&config_json)?;
    let db = match &config.database_path {
        Some(path) => Database::open(path)?,
        None => Database::open_in_memory()?,
    };
    Ok(SchoolHealthCore::wrap(db, config))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct SchoolHealthCore {
    db: Arc<Mutex<Database>>,
    config: CoreConfig,
}

impl SchoolHealthCore {
    fn wrap(db: Database, config: CoreConfig) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            config,
        })
    }
}

#[uniffi::export]
impl SchoolHealthCore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Preview the username a student would receive right now.
    pub fn generate_username(
        &self,
        first_name: String,
        last_name: String,
        date_of_birth: String,
    ) -> Result<String, SchoolHealthError> {
        let db = self.db.lock()?;
        let username = username::generate_unique_username_from_str(
            &first_name,
            &last_name,
            &date_of_birth,
            &*db,
        )?;
        Ok(username)
    }

    /// Enroll a student, assigning a unique username.
    pub fn create_student_account(
        &self,
        student: FfiNewStudent,
    ) -> Result<FfiAccount, SchoolHealthError> {
        let db = self.db.lock()?;
        let account = Enrollment::with_config(&db, &self.config).enroll_student(&student.into())?;
        Ok(account.into())
    }

    /// Get an account by exact username.
    pub fn get_account_by_username(
        &self,
        username: String,
    ) -> Result<Option<FfiAccount>, SchoolHealthError> {
        let db = self.db.lock()?;
        let account = db.get_account_by_username(&username)?;
        Ok(account.map(|a| a.into()))
    }

    /// List students linked to a parent.
    pub fn list_children(&self, parent_id: String) -> Result<Vec<FfiAccount>, SchoolHealthError> {
        let db = self.db.lock()?;
        let children = db.list_children_of_parent(&parent_id)?;
        Ok(children.into_iter().map(|a| a.into()).collect())
    }

    // =========================================================================
    // Consultation Operations
    // =========================================================================

    /// Book a consultation; fails with `Conflict` on overlap.
    pub fn schedule_consultation(
        &self,
        request: FfiConsultationRequest,
    ) -> Result<FfiConsultation, SchoolHealthError> {
        let starts_at = parse_slot_time(&request.starts_at)?;
        let consultation = Consultation::new(
            request.nurse_id,
            request.parent_id,
            request.student_id,
            request.reason,
            starts_at,
            request.duration_minutes,
        );

        let db = self.db.lock()?;
        Scheduler::new(&db)
            .with_buffer(self.config.consultation_buffer_minutes)
            .schedule(&consultation)?;
        Ok(consultation.into())
    }

    /// Cancel a scheduled consultation.
    pub fn cancel_consultation(
        &self,
        consultation_id: String,
    ) -> Result<FfiConsultation, SchoolHealthError> {
        let db = self.db.lock()?;
        Ok(db.cancel_consultation(&consultation_id)?.into())
    }

    /// Mark a consultation as held.
    pub fn complete_consultation(
        &self,
        consultation_id: String,
        notes: Option<String>,
    ) -> Result<FfiConsultation, SchoolHealthError> {
        let db = self.db.lock()?;
        Ok(db.complete_consultation(&consultation_id, notes)?.into())
    }

    // =========================================================================
    // Medicine Request Operations
    // =========================================================================

    /// Submit a medicine request (starts pending).
    pub fn submit_medicine_request(
        &self,
        input: FfiMedicineRequestInput,
    ) -> Result<FfiMedicineRequest, SchoolHealthError> {
        if input.medicine_name.trim().is_empty() || input.dosage.trim().is_empty() {
            return Err(SchoolHealthError::InvalidInput(
                "medicine name and dosage are required".into(),
            ));
        }
        let mut request = MedicineRequest::new(
            input.student_id,
            input.parent_id,
            input.medicine_name,
            input.dosage,
            input.schedule,
        );
        request.reason = input.reason;

        let db = self.db.lock()?;
        db.insert_medicine_request(&request)?;
        Ok(request.into())
    }

    /// Approve or reject a pending request.
    pub fn review_medicine_request(
        &self,
        request_id: String,
        reviewer_id: String,
        approve: bool,
        note: Option<String>,
    ) -> Result<FfiMedicineRequest, SchoolHealthError> {
        let db = self.db.lock()?;
        let request = db.review_medicine_request(&request_id, &reviewer_id, approve, note)?;
        Ok(request.into())
    }

    /// Requests awaiting a nurse.
    pub fn list_pending_medicine_requests(
        &self,
    ) -> Result<Vec<FfiMedicineRequest>, SchoolHealthError> {
        let db = self.db.lock()?;
        let requests = db.list_pending_medicine_requests()?;
        Ok(requests.into_iter().map(|r| r.into()).collect())
    }

    // =========================================================================
    // Campaign Operations
    // =========================================================================

    /// Create a scheduled campaign. `kind` is "vaccination" or "health_check".
    pub fn create_campaign(
        &self,
        title: String,
        kind: String,
        scheduled_date: String,
        description: Option<String>,
    ) -> Result<FfiCampaign, SchoolHealthError> {
        let kind = CampaignKind::parse(&kind)
            .ok_or_else(|| SchoolHealthError::InvalidInput(format!("Unknown campaign kind: {}", kind)))?;
        chrono::NaiveDate::parse_from_str(&scheduled_date, "%Y-%m-%d")
            .map_err(|_| SchoolHealthError::InvalidInput(format!("Bad date: {}", scheduled_date)))?;

        let mut campaign = HealthCampaign::new(title, kind, scheduled_date);
        campaign.description = description;

        let db = self.db.lock()?;
        db.insert_campaign(&campaign)?;
        Ok(campaign.into())
    }

    /// Complete or cancel a campaign. `status` is "completed" or "cancelled".
    pub fn transition_campaign(
        &self,
        campaign_id: String,
        status: String,
    ) -> Result<FfiCampaign, SchoolHealthError> {
        let status = CampaignStatus::parse(&status)
            .ok_or_else(|| SchoolHealthError::InvalidInput(format!("Unknown status: {}", status)))?;
        let db = self.db.lock()?;
        Ok(db.transition_campaign(&campaign_id, status)?.into())
    }
}

/// Accepts `YYYY-MM-DDTHH:MM[:SS]` or `YYYY-MM-DD HH:MM[:SS]`.
fn parse_slot_time(input: &str) -> Result<NaiveDateTime, SchoolHealthError> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    let trimmed = input.trim();
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| SchoolHealthError::InvalidInput(format!("Bad start time: {}", input)))
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe student enrollment input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewStudent {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub class_name: Option<String>,
    pub parent_id: Option<String>,
}

impl From<FfiNewStudent> for NewStudent {
    fn from(s: FfiNewStudent) -> Self {
        NewStudent {
            first_name: s.first_name,
            last_name: s.last_name,
            date_of_birth: s.date_of_birth,
            class_name: s.class_name,
            parent_id: s.parent_id,
        }
    }
}

/// FFI-safe account.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAccount {
    pub user_id: String,
    pub username: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<String>,
    pub class_name: Option<String>,
    pub parent_id: Option<String>,
    pub active: bool,
}

impl From<UserAccount> for FfiAccount {
    fn from(a: UserAccount) -> Self {
        Self {
            user_id: a.user_id,
            username: a.username,
            role: a.role.as_str().to_string(),
            first_name: a.first_name,
            last_name: a.last_name,
            date_of_birth: a.date_of_birth,
            class_name: a.class_name,
            parent_id: a.parent_id,
            active: a.active,
        }
    }
}

/// FFI-safe consultation booking request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConsultationRequest {
    pub nurse_id: String,
    pub parent_id: String,
    pub student_id: String,
    pub reason: String,
    pub starts_at: String,
    pub duration_minutes: u32,
}

/// FFI-safe consultation.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConsultation {
    pub consultation_id: String,
    pub nurse_id: String,
    pub parent_id: String,
    pub student_id: String,
    pub reason: String,
    pub starts_at: String,
    pub ends_at: String,
    pub status: String,
    pub notes: Option<String>,
}

impl From<Consultation> for FfiConsultation {
    fn from(c: Consultation) -> Self {
        Self {
            starts_at: c.starts_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            ends_at: c
                .ends_at()
                .map(|end| end.format("%Y-%m-%dT%H:%M:%S").to_string())
                .unwrap_or_default(),
            status: c.status.as_str().to_string(),
            consultation_id: c.consultation_id,
            nurse_id: c.nurse_id,
            parent_id: c.parent_id,
            student_id: c.student_id,
            reason: c.reason,
            notes: c.notes,
        }
    }
}

/// FFI-safe medicine request input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicineRequestInput {
    pub student_id: String,
    pub parent_id: String,
    pub medicine_name: String,
    pub dosage: String,
    pub schedule: String,
    pub reason: Option<String>,
}

/// FFI-safe medicine request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicineRequest {
    pub request_id: String,
    pub student_id: String,
    pub parent_id: String,
    pub medicine_name: String,
    pub dosage: String,
    pub schedule: String,
    pub reason: Option<String>,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub review_note: Option<String>,
}

impl From<MedicineRequest> for FfiMedicineRequest {
    fn from(r: MedicineRequest) -> Self {
        Self {
            request_id: r.request_id,
            student_id: r.student_id,
            parent_id: r.parent_id,
            medicine_name: r.medicine_name,
            dosage: r.dosage,
            schedule: r.schedule,
            reason: r.reason,
            status: r.status.as_str().to_string(),
            reviewed_by: r.reviewed_by,
            review_note: r.review_note,
        }
    }
}

/// FFI-safe campaign.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCampaign {
    pub campaign_id: String,
    pub title: String,
    pub kind: String,
    pub description: Option<String>,
    pub scheduled_date: String,
    pub status: String,
}

impl From<HealthCampaign> for FfiCampaign {
    fn from(c: HealthCampaign) -> Self {
        Self {
            campaign_id: c.campaign_id,
            title: c.title,
            kind: c.kind.as_str().to_string(),
            description: c.description,
            scheduled_date: c.scheduled_date,
            status: c.status.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffi_enroll_and_lookup() {
        let core = open_database_in_memory().unwrap();
        let preview = core
            .generate_username("Phuc Tan".into(), "Nguyen".into(), "2001-05-25".into())
            .unwrap();
        assert_eq!(preview, "nguyenpt250501");

        let account = core
            .create_student_account(FfiNewStudent {
                first_name: "Phuc Tan".into(),
                last_name: "Nguyen".into(),
                date_of_birth: "2001-05-25".into(),
                class_name: None,
                parent_id: None,
            })
            .unwrap();
        assert_eq!(account.username, "nguyenpt250501");
        assert_eq!(account.role, "student");

        let preview = core
            .generate_username("Phuc Tan".into(), "Nguyen".into(), "2001-05-25".into())
            .unwrap();
        assert_eq!(preview, "nguyenpt250501_1");

        assert!(core
            .get_account_by_username("nguyenpt250501".into())
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_ffi_invalid_input_maps_to_invalid_input() {
        let core = open_database_in_memory().unwrap();
        let err = core
            .generate_username(" ".into(), "Nguyen".into(), "2001-05-25".into())
            .unwrap_err();
        assert!(matches!(err, SchoolHealthError::InvalidInput(_)));

        let err = core
            .generate_username("An".into(), "Nguyen".into(), "soon".into())
            .unwrap_err();
        assert!(matches!(err, SchoolHealthError::InvalidInput(_)));
    }

    #[test]
    fn test_ffi_campaign_flow() {
        let core = open_database_in_memory().unwrap();
        let campaign = core
            .create_campaign("Flu".into(), "vaccination".into(), "2024-10-15".into(), None)
            .unwrap();
        assert_eq!(campaign.status, "scheduled");

        let done = core
            .transition_campaign(campaign.campaign_id.clone(), "completed".into())
            .unwrap();
        assert_eq!(done.status, "completed");

        let err = core
            .transition_campaign(campaign.campaign_id, "cancelled".into())
            .unwrap_err();
        assert!(matches!(err, SchoolHealthError::InvalidTransition(_)));

        assert!(matches!(
            core.create_campaign("X".into(), "dental".into(), "2024-10-15".into(), None),
            Err(SchoolHealthError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_open_with_config() {
        let core = open_database_with_config(r#"{"consultation_buffer_minutes": 5}"#.into()).unwrap();
        assert_eq!(core.config.consultation_buffer_minutes, 5);
        assert!(open_database_with_config("{not json".into()).is_err());
    }

    #[test]
    fn test_parse_slot_time() {
        assert!(parse_slot_time("2024-09-16T09:00").is_ok());
        assert!(parse_slot_time("2024-09-16 09:00:00").is_ok());
        assert!(parse_slot_time("9am").is_err());
    }
}
