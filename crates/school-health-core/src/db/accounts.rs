//! Account database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{constraint_aware, Database, DbError, DbResult};
use crate::models::{Role, UserAccount};
use crate::username::UsernameLookup;

const ACCOUNT_COLUMNS: &str = "user_id, username, role, first_name, last_name, date_of_birth, \
                               class_name, parent_id, active, created_at, updated_at";

impl Database {
    /// Insert a new account.
    ///
    /// A taken username surfaces as [`DbError::Constraint`]; see
    /// [`DbError::is_username_conflict`].
    #[tracing::instrument(name = "accounts.insert", skip_all, fields(username = %account.username), err)]
    pub fn insert_account(&self, account: &UserAccount) -> DbResult<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO users (
                    user_id, username, role, first_name, last_name, date_of_birth,
                    class_name, parent_id, active, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    account.user_id,
                    account.username,
                    account.role.as_str(),
                    account.first_name,
                    account.last_name,
                    account.date_of_birth,
                    account.class_name,
                    account.parent_id,
                    account.active,
                    account.created_at,
                    account.updated_at,
                ],
            )
            .map_err(constraint_aware)?;
        Ok(())
    }

    /// Get an account by ID.
    pub fn get_account(&self, user_id: &str) -> DbResult<Option<UserAccount>> {
        let sql = format!("SELECT {} FROM users WHERE user_id = ?", ACCOUNT_COLUMNS);
        self.conn
            .query_row(&sql, [user_id], read_account_row)
            .optional()?
            .map(UserAccount::try_from)
            .transpose()
    }

    /// Get an account by exact username.
    pub fn get_account_by_username(&self, username: &str) -> DbResult<Option<UserAccount>> {
        let sql = format!("SELECT {} FROM users WHERE username = ?", ACCOUNT_COLUMNS);
        self.conn
            .query_row(&sql, [username], read_account_row)
            .optional()?
            .map(UserAccount::try_from)
            .transpose()
    }

    /// Check whether a username is already taken (exact match).
    pub fn username_exists(&self, username: &str) -> DbResult<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM users WHERE username = ?", [username], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// List accounts with a role, ordered by family name then given name.
    pub fn list_accounts_by_role(&self, role: Role) -> DbResult<Vec<UserAccount>> {
        let sql = format!(
            "SELECT {} FROM users WHERE role = ? ORDER BY last_name, first_name",
            ACCOUNT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([role.as_str()], read_account_row)?;

        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row?.try_into()?);
        }
        Ok(accounts)
    }

    /// List the students linked to a parent account.
    pub fn list_children_of_parent(&self, parent_id: &str) -> DbResult<Vec<UserAccount>> {
        let sql = format!(
            "SELECT {} FROM users WHERE parent_id = ? AND role = 'student' ORDER BY first_name",
            ACCOUNT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([parent_id], read_account_row)?;

        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row?.try_into()?);
        }
        Ok(accounts)
    }

    /// Activate or deactivate an account. Returns false if no such account.
    pub fn set_account_active(&self, user_id: &str, active: bool) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE users SET active = ?, updated_at = datetime('now') WHERE user_id = ?",
            params![active, user_id],
        )?;
        Ok(rows_affected > 0)
    }
}

impl UsernameLookup for Database {
    type Error = DbError;

    fn exists(&self, candidate: &str) -> Result<bool, Self::Error> {
        self.username_exists(candidate)
    }
}

/// Intermediate row struct for database mapping.
struct AccountRow {
    user_id: String,
    username: String,
    role: String,
    first_name: String,
    last_name: String,
    date_of_birth: Option<String>,
    class_name: Option<String>,
    parent_id: Option<String>,
    active: bool,
    created_at: String,
    updated_at: String,
}

fn read_account_row(row: &Row<'_>) -> rusqlite::Result<AccountRow> {
    Ok(AccountRow {
        user_id: row.get(0)?,
        username: row.get(1)?,
        role: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        date_of_birth: row.get(5)?,
        class_name: row.get(6)?,
        parent_id: row.get(7)?,
        active: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

impl TryFrom<AccountRow> for UserAccount {
    type Error = DbError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| DbError::Constraint(format!("Unknown role: {}", row.role)))?;

        Ok(UserAccount {
            user_id: row.user_id,
            username: row.username,
            role,
            first_name: row.first_name,
            last_name: row.last_name,
            date_of_birth: row.date_of_birth,
            class_name: row.class_name,
            parent_id: row.parent_id,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn student(username: &str, first: &str, last: &str) -> UserAccount {
        let mut account = UserAccount::new(username.into(), Role::Student, first.into(), last.into());
        account.date_of_birth = Some("2012-03-09".into());
        account
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let mut account = student("vanta090312", "An", "Tran Van");
        account.class_name = Some("6A".into());
        db.insert_account(&account).unwrap();

        let retrieved = db.get_account(&account.user_id).unwrap().unwrap();
        assert_eq!(retrieved, account);

        let by_username = db.get_account_by_username("vanta090312").unwrap().unwrap();
        assert_eq!(by_username.user_id, account.user_id);
    }

    #[test]
    fn test_username_exists() {
        let db = setup_db();
        db.insert_account(&student("nguyenpt250501", "Phuc Tan", "Nguyen"))
            .unwrap();

        assert!(db.username_exists("nguyenpt250501").unwrap());
        assert!(!db.username_exists("nguyenpt250501_1").unwrap());
        assert!(!db.username_exists("NGUYENPT250501").unwrap());

        // Same check through the lookup trait
        assert!(db.exists("nguyenpt250501").unwrap());
    }

    #[test]
    fn test_duplicate_username_is_constraint() {
        let db = setup_db();
        db.insert_account(&student("nguyenpt250501", "Phuc Tan", "Nguyen"))
            .unwrap();

        let err = db
            .insert_account(&student("nguyenpt250501", "Phuc Tan", "Nguyen"))
            .unwrap_err();
        assert!(err.is_username_conflict(), "unexpected error: {err}");
    }

    #[test]
    fn test_unknown_parent_is_constraint_but_not_username_conflict() {
        let db = setup_db();
        let mut account = student("vanta090312", "An", "Tran Van");
        account.parent_id = Some("no-such-parent".into());

        let err = db.insert_account(&account).unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
        assert!(!err.is_username_conflict());
    }

    #[test]
    fn test_username_cannot_change() {
        let db = setup_db();
        let account = student("vanta090312", "An", "Tran Van");
        db.insert_account(&account).unwrap();

        let result = db.conn().execute(
            "UPDATE users SET username = 'renamed' WHERE user_id = ?",
            [&account.user_id],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_list_children_of_parent() {
        let db = setup_db();
        let parent = UserAccount::new("parent01".into(), Role::Parent, "Lan".into(), "Pham".into());
        db.insert_account(&parent).unwrap();

        let mut child = student("phamb010115", "Binh", "Pham");
        child.parent_id = Some(parent.user_id.clone());
        db.insert_account(&child).unwrap();
        db.insert_account(&student("vanta090312", "An", "Tran Van"))
            .unwrap();

        let children = db.list_children_of_parent(&parent.user_id).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].username, "phamb010115");

        let students = db.list_accounts_by_role(Role::Student).unwrap();
        assert_eq!(students.len(), 2);
    }

    #[test]
    fn test_set_account_active() {
        let db = setup_db();
        let account = student("vanta090312", "An", "Tran Van");
        db.insert_account(&account).unwrap();

        assert!(db.set_account_active(&account.user_id, false).unwrap());
        assert!(!db.get_account(&account.user_id).unwrap().unwrap().active);
        assert!(!db.set_account_active("missing", false).unwrap());
    }
}
