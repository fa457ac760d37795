//! Medicine request database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{constraint_aware, Database, DbError, DbResult};
use crate::models::{MedicineRequest, RequestStatus};

const REQUEST_COLUMNS: &str = "request_id, student_id, parent_id, medicine_name, dosage, schedule, \
                               reason, status, reviewed_by, review_note, created_at, updated_at";

impl Database {
    /// Insert a new medicine request.
    #[tracing::instrument(name = "medicine_requests.insert", skip_all, fields(student_id = %request.student_id), err)]
    pub fn insert_medicine_request(&self, request: &MedicineRequest) -> DbResult<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO medicine_requests (
                    request_id, student_id, parent_id, medicine_name, dosage, schedule,
                    reason, status, reviewed_by, review_note, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                params![
                    request.request_id,
                    request.student_id,
                    request.parent_id,
                    request.medicine_name,
                    request.dosage,
                    request.schedule,
                    request.reason,
                    request.status.as_str(),
                    request.reviewed_by,
                    request.review_note,
                    request.created_at,
                    request.updated_at,
                ],
            )
            .map_err(constraint_aware)?;
        Ok(())
    }

    /// Get a medicine request by ID.
    pub fn get_medicine_request(&self, request_id: &str) -> DbResult<Option<MedicineRequest>> {
        let sql = format!(
            "SELECT {} FROM medicine_requests WHERE request_id = ?",
            REQUEST_COLUMNS
        );
        self.conn
            .query_row(&sql, [request_id], read_request_row)
            .optional()?
            .map(MedicineRequest::try_from)
            .transpose()
    }

    /// Pending requests, oldest first.
    pub fn list_pending_medicine_requests(&self) -> DbResult<Vec<MedicineRequest>> {
        let sql = format!(
            "SELECT {} FROM medicine_requests WHERE status = 'pending' ORDER BY created_at",
            REQUEST_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], read_request_row)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?.try_into()?);
        }
        Ok(requests)
    }

    /// Approve or reject a pending request.
    #[tracing::instrument(name = "medicine_requests.review", skip(self, note), err)]
    pub fn review_medicine_request(
        &self,
        request_id: &str,
        reviewer_id: &str,
        approve: bool,
        note: Option<String>,
    ) -> DbResult<MedicineRequest> {
        let tx = self.begin_immediate()?;
        let mut request = self
            .get_medicine_request(request_id)?
            .ok_or_else(|| DbError::NotFound(format!("medicine request {}", request_id)))?;
        request.review(reviewer_id, approve, note)?;
        self.store_review(&request)?;
        tx.commit()?;
        Ok(request)
    }

    /// Write a review made to a request read while it was pending.
    fn store_review(&self, request: &MedicineRequest) -> DbResult<()> {
        let changed = self
            .conn
            .execute(
                r#"
                UPDATE medicine_requests SET
                    status = ?2,
                    reviewed_by = ?3,
                    review_note = ?4,
                    updated_at = ?5
                WHERE request_id = ?1 AND status = 'pending'
                "#,
                params![
                    request.request_id,
                    request.status.as_str(),
                    request.reviewed_by,
                    request.review_note,
                    request.updated_at,
                ],
            )
            .map_err(constraint_aware)?;
        if changed != 1 {
            return Err(DbError::Conflict(format!(
                "medicine request {} is no longer pending",
                request.request_id
            )));
        }
        Ok(())
    }
}

/// Intermediate row struct for database mapping.
struct RequestRow {
    request_id: String,
    student_id: String,
    parent_id: String,
    medicine_name: String,
    dosage: String,
    schedule: String,
    reason: Option<String>,
    status: String,
    reviewed_by: Option<String>,
    review_note: Option<String>,
    created_at: String,
    updated_at: String,
}

fn read_request_row(row: &Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        request_id: row.get(0)?,
        student_id: row.get(1)?,
        parent_id: row.get(2)?,
        medicine_name: row.get(3)?,
        dosage: row.get(4)?,
        schedule: row.get(5)?,
        reason: row.get(6)?,
        status: row.get(7)?,
        reviewed_by: row.get(8)?,
        review_note: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl TryFrom<RequestRow> for MedicineRequest {
    type Error = DbError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        let status = RequestStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown request status: {}", row.status)))?;

        Ok(MedicineRequest {
            request_id: row.request_id,
            student_id: row.student_id,
            parent_id: row.parent_id,
            medicine_name: row.medicine_name,
            dosage: row.dosage,
            schedule: row.schedule,
            reason: row.reason,
            status,
            reviewed_by: row.reviewed_by,
            review_note: row.review_note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
