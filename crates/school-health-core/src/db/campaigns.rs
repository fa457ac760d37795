//! Health campaign database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{CampaignKind, CampaignStatus, HealthCampaign};

const CAMPAIGN_COLUMNS: &str =
    "campaign_id, title, kind, description, scheduled_date, status, created_at, updated_at";

impl Database {
    /// Insert a new campaign.
    pub fn insert_campaign(&self, campaign: &HealthCampaign) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO health_campaigns (
                campaign_id, title, kind, description, scheduled_date,
                status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                campaign.campaign_id,
                campaign.title,
                campaign.kind.as_str(),
                campaign.description,
                campaign.scheduled_date,
                campaign.status.as_str(),
                campaign.created_at,
                campaign.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a campaign by ID.
    pub fn get_campaign(&self, campaign_id: &str) -> DbResult<Option<HealthCampaign>> {
        let sql = format!(
            "SELECT {} FROM health_campaigns WHERE campaign_id = ?",
            CAMPAIGN_COLUMNS
        );
        self.conn
            .query_row(&sql, [campaign_id], read_campaign_row)
            .optional()?
            .map(HealthCampaign::try_from)
            .transpose()
    }

    /// List campaigns by status, earliest date first.
    pub fn list_campaigns_by_status(&self, status: CampaignStatus) -> DbResult<Vec<HealthCampaign>> {
        let sql = format!(
            "SELECT {} FROM health_campaigns WHERE status = ? ORDER BY scheduled_date",
            CAMPAIGN_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([status.as_str()], read_campaign_row)?;

        let mut campaigns = Vec::new();
        for row in rows {
            campaigns.push(row?.try_into()?);
        }
        Ok(campaigns)
    }

    /// Complete or cancel a scheduled campaign.
    pub fn transition_campaign(
        &self,
        campaign_id: &str,
        to: CampaignStatus,
    ) -> DbResult<HealthCampaign> {
        let tx = self.begin_immediate()?;
        let mut campaign = self
            .get_campaign(campaign_id)?
            .ok_or_else(|| DbError::NotFound(format!("campaign {}", campaign_id)))?;
        campaign.transition(to)?;
        self.store_campaign_status(&campaign)?;
        tx.commit()?;

        tracing::info!(campaign_id = %campaign.campaign_id, status = campaign.status.as_str(), "campaign status changed");
        Ok(campaign)
    }

    /// Write a status change made to a campaign read while it was scheduled.
    fn store_campaign_status(&self, campaign: &HealthCampaign) -> DbResult<()> {
        let changed = self.conn.execute(
            r#"
            UPDATE health_campaigns SET status = ?2, updated_at = ?3
            WHERE campaign_id = ?1 AND status = 'scheduled'
            "#,
            params![campaign.campaign_id, campaign.status.as_str(), campaign.updated_at],
        )?;
        if changed != 1 {
            return Err(DbError::Conflict(format!(
                "campaign {} is no longer scheduled",
                campaign.campaign_id
            )));
        }
        Ok(())
    }
}

/// Intermediate row struct for database mapping.
struct CampaignRow {
    campaign_id: String,
    title: String,
    kind: String,
    description: Option<String>,
    scheduled_date: String,
    status: String,
    created_at: String,
    updated_at: String,
}

fn read_campaign_row(row: &Row<'_>) -> rusqlite::Result<CampaignRow> {
    Ok(CampaignRow {
        campaign_id: row.get(0)?,
        title: row.get(1)?,
        kind: row.get(2)?,
        description: row.get(3)?,
        scheduled_date: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl TryFrom<CampaignRow> for HealthCampaign {
    type Error = DbError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        let kind = CampaignKind::parse(&row.kind)
            .ok_or_else(|| DbError::Constraint(format!("Unknown campaign kind: {}", row.kind)))?;
        let status = CampaignStatus::parse(&row.status).ok_or_else(|| {
            DbError::Constraint(format!("Unknown campaign status: {}", row.status))
        })?;

        Ok(HealthCampaign {
            campaign_id: row.campaign_id,
            title: row.title,
            kind,
            description: row.description,
            scheduled_date: row.scheduled_date,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
