//! SQLite schema definition.

/// Complete database schema for the school health store.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Accounts
-- ============================================================================

CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,               -- final authority on uniqueness
    role TEXT NOT NULL CHECK (role IN ('admin', 'nurse', 'parent', 'student')),
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    date_of_birth TEXT,                          -- YYYY-MM-DD
    class_name TEXT,
    parent_id TEXT REFERENCES users(user_id),
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
CREATE INDEX IF NOT EXISTS idx_users_parent ON users(parent_id);

-- Usernames are immutable once assigned
CREATE TRIGGER IF NOT EXISTS users_username_immutable BEFORE UPDATE OF username ON users
WHEN new.username <> old.username
BEGIN
    SELECT RAISE(ABORT, 'Usernames cannot be changed');
END;

-- ============================================================================
-- Consultations
-- ============================================================================

CREATE TABLE IF NOT EXISTS consultations (
    consultation_id TEXT PRIMARY KEY,
    nurse_id TEXT NOT NULL REFERENCES users(user_id),
    parent_id TEXT NOT NULL REFERENCES users(user_id),
    student_id TEXT NOT NULL REFERENCES users(user_id),
    reason TEXT NOT NULL,
    starts_at TEXT NOT NULL,                     -- YYYY-MM-DD HH:MM:SS, school local time
    ends_at TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL CHECK (duration_minutes > 0),
    status TEXT NOT NULL DEFAULT 'scheduled',    -- scheduled, completed, cancelled
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_consultations_nurse ON consultations(nurse_id, starts_at);
CREATE INDEX IF NOT EXISTS idx_consultations_parent ON consultations(parent_id, starts_at);

-- ============================================================================
-- Medicine Requests
-- ============================================================================

CREATE TABLE IF NOT EXISTS medicine_requests (
    request_id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL REFERENCES users(user_id),
    parent_id TEXT NOT NULL REFERENCES users(user_id),
    medicine_name TEXT NOT NULL,
    dosage TEXT NOT NULL,
    schedule TEXT NOT NULL,
    reason TEXT,
    status TEXT NOT NULL DEFAULT 'pending',      -- pending, approved, rejected
    reviewed_by TEXT REFERENCES users(user_id),
    review_note TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_medicine_requests_status ON medicine_requests(status);
CREATE INDEX IF NOT EXISTS idx_medicine_requests_student ON medicine_requests(student_id);

-- ============================================================================
-- Health Campaigns
-- ============================================================================

CREATE TABLE IF NOT EXISTS health_campaigns (
    campaign_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('vaccination', 'health_check')),
    description TEXT,
    scheduled_date TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'scheduled',    -- scheduled, completed, cancelled
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_campaigns_status ON health_campaigns(status, scheduled_date);
"#;
