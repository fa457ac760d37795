//! User account models.

use serde::{Deserialize, Serialize};

/// Account role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Nurse,
    Parent,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Nurse => "nurse",
            Role::Parent => "parent",
            Role::Student => "student",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "nurse" => Some(Role::Nurse),
            "parent" => Some(Role::Parent),
            "student" => Some(Role::Student),
            _ => None,
        }
    }
}

/// A login account. The username is fixed once the account exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserAccount {
    /// UUID, generated locally
    pub user_id: String,
    /// Unique login handle
    pub username: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    /// ISO date (YYYY-MM-DD); staff accounts may omit it
    pub date_of_birth: Option<String>,
    /// Class/homeroom, students only
    pub class_name: Option<String>,
    /// Parent account linked to a student
    pub parent_id: Option<String>,
    pub active: bool,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl UserAccount {
    /// Create a new active account.
    pub fn new(username: String, role: Role, first_name: String, last_name: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            user_id: uuid::Uuid::new_v4().to_string(),
            username,
            role,
            first_name,
            last_name,
            date_of_birth: None,
            class_name: None,
            parent_id: None,
            active: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Display name in family-name-first order ("Nguyen Phuc Tan").
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name.trim(), self.first_name.trim())
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }
}

/// Input for enrolling a new student.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewStudent {
    /// Given name(s), space separated
    pub first_name: String,
    /// Family name(s), space separated; the last token is the surname
    pub last_name: String,
    /// Birth date as text (YYYY-MM-DD or RFC 3339)
    pub date_of_birth: String,
    pub class_name: Option<String>,
    pub parent_id: Option<String>,
}
