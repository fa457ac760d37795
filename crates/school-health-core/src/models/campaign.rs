//! Vaccination and health-check campaign models.

use serde::{Deserialize, Serialize};

use super::StatusTransitionError;

/// What the campaign does.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CampaignKind {
    Vaccination,
    HealthCheck,
}

impl CampaignKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignKind::Vaccination => "vaccination",
            CampaignKind::HealthCheck => "health_check",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "vaccination" => Some(CampaignKind::Vaccination),
            "health_check" => Some(CampaignKind::HealthCheck),
            _ => None,
        }
    }
}

/// Campaign lifecycle: Scheduled → Completed | Cancelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CampaignStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(CampaignStatus::Scheduled),
            "completed" => Some(CampaignStatus::Completed),
            "cancelled" => Some(CampaignStatus::Cancelled),
            _ => None,
        }
    }
}

/// A school-wide vaccination or health-check campaign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthCampaign {
    pub campaign_id: String,
    pub title: String,
    pub kind: CampaignKind,
    pub description: Option<String>,
    /// ISO date (YYYY-MM-DD)
    pub scheduled_date: String,
    pub status: CampaignStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl HealthCampaign {
    /// Create a new scheduled campaign.
    pub fn new(title: String, kind: CampaignKind, scheduled_date: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            campaign_id: uuid::Uuid::new_v4().to_string(),
            title,
            kind,
            description: None,
            scheduled_date,
            status: CampaignStatus::Scheduled,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Move to `to`. Only scheduled campaigns can change state.
    pub fn transition(&mut self, to: CampaignStatus) -> Result<(), StatusTransitionError> {
        if self.status != CampaignStatus::Scheduled || to == CampaignStatus::Scheduled {
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
