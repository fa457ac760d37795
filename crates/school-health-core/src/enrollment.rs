//! Student enrollment: generate a username and create the account.
//!
//! Generation and insert run inside one `BEGIN IMMEDIATE` transaction. The
//! `users.username` UNIQUE constraint is still the final word: if an insert
//! collides anyway (another process on the same file), the whole attempt is
//! rolled back and retried with a fresh lookup, up to the configured limit.

use thiserror::Error;

use crate::config::CoreConfig;
use crate::db::{Database, DbError};
use crate::models::{NewStudent, Role, UserAccount};
use crate::username::{self, GenerateError, UsernameError, UsernameLookup};

/// Enrollment errors.
#[derive(Error, Debug)]
pub enum EnrollmentError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Could not reserve a unique username after {attempts} attempt(s)")]
    AttemptsExhausted { attempts: u32 },

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<UsernameError> for EnrollmentError {
    fn from(e: UsernameError) -> Self {
        match e {
            UsernameError::InvalidInput(msg) => EnrollmentError::InvalidInput(msg),
        }
    }
}

impl From<GenerateError<DbError>> for EnrollmentError {
    fn from(e: GenerateError<DbError>) -> Self {
        match e {
            GenerateError::InvalidInput(e) => e.into(),
            GenerateError::Lookup(e) => EnrollmentError::Database(e),
        }
    }
}

pub type EnrollmentResult<T> = Result<T, EnrollmentError>;

/// Creates student accounts.
pub struct Enrollment<'a> {
    db: &'a Database,
    max_attempts: u32,
}

impl<'a> Enrollment<'a> {
    /// Create an enrollment workflow with default settings.
    pub fn new(db: &'a Database) -> Self {
        Self::with_config(db, &CoreConfig::default())
    }

    /// Create an enrollment workflow using `config`.
    pub fn with_config(db: &'a Database, config: &CoreConfig) -> Self {
        Self {
            db,
            max_attempts: config.max_enrollment_attempts.max(1),
        }
    }

    /// Enroll a student and return the stored account.
    #[tracing::instrument(name = "enrollment.enroll_student", skip_all, err)]
    pub fn enroll_student(&self, student: &NewStudent) -> EnrollmentResult<UserAccount> {
        self.enroll_with_lookup(student, self.db)
    }

    /// Enroll using `lookup` to pick candidates. The insert still goes through
    /// the store, whose UNIQUE constraint has the last word.
    pub(crate) fn enroll_with_lookup<L>(
        &self,
        student: &NewStudent,
        lookup: &L,
    ) -> EnrollmentResult<UserAccount>
    where
        L: UsernameLookup<Error = DbError> + ?Sized,
    {
        let date_of_birth = username::parse_birth_date(&student.date_of_birth)?;
        // Fail on bad names before touching the store
        username::NameParts::parse(&student.first_name, &student.last_name)?;

        if let Some(parent_id) = &student.parent_id {
            self.verify_parent(parent_id)?;
        }

        for attempt in 1..=self.max_attempts {
            let tx = self.db.begin_immediate()?;
            let username = username::generate_unique_username(
                &student.first_name,
                &student.last_name,
                date_of_birth,
                lookup,
            )?;

            let mut account = UserAccount::new(
                username,
                Role::Student,
                normalize_name(&student.first_name),
                normalize_name(&student.last_name),
            );
            account.date_of_birth = Some(date_of_birth.format("%Y-%m-%d").to_string());
            account.class_name = student
                .class_name
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            account.parent_id = student.parent_id.clone();

            match self.db.insert_account(&account) {
                Ok(()) => {
                    tx.commit().map_err(DbError::from)?;
                    tracing::info!(user_id = %account.user_id, username = %account.username, "student enrolled");
                    return Ok(account);
                }
                Err(e) if e.is_username_conflict() => {
                    tracing::warn!(username = %account.username, attempt, "username taken at insert, retrying");
                    drop(tx);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EnrollmentError::AttemptsExhausted {
            attempts: self.max_attempts,
        })
    }

    fn verify_parent(&self, parent_id: &str) -> EnrollmentResult<()> {
        match self.db.get_account(parent_id)? {
            Some(parent) if parent.role == Role::Parent => Ok(()),
            Some(_) => Err(EnrollmentError::InvalidInput(format!(
                "account {} is not a parent",
                parent_id
            ))),
            None => Err(EnrollmentError::InvalidInput(format!(
                "parent {} does not exist",
                parent_id
            ))),
        }
    }
}

/// Collapse runs of whitespace in a stored name.
fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Buffer that collects formatted log lines.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture_subscriber(logs: CapturedLogs) -> impl tracing::Subscriber + Send + Sync {
        tracing_subscriber::fmt()
            .with_writer(logs)
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish()
    }

    fn new_student(first: &str, last: &str, dob: &str) -> NewStudent {
        NewStudent {
            first_name: first.into(),
            last_name: last.into(),
            date_of_birth: dob.into(),
            class_name: Some(" 6A ".into()),
            parent_id: None,
        }
    }

    #[test]
    fn test_enroll_generates_username() {
        let db = Database::open_in_memory().unwrap();
        let account = Enrollment::new(&db)
            .enroll_student(&new_student("Phuc  Tan", "Nguyen", "2001-05-25"))
            .unwrap();

        assert_eq!(account.username, "nguyenpt250501");
        assert_eq!(account.first_name, "Phuc Tan");
        assert_eq!(account.class_name.as_deref(), Some("6A"));
        assert_eq!(account.date_of_birth.as_deref(), Some("2001-05-25"));
        assert!(db.username_exists("nguyenpt250501").unwrap());
    }

    #[test]
    fn test_enroll_twins_get_suffix() {
        let db = Database::open_in_memory().unwrap();
        let enrollment = Enrollment::new(&db);

        let first = enrollment
            .enroll_student(&new_student("Phuc Tan", "Nguyen", "2001-05-25"))
            .unwrap();
        let second = enrollment
            .enroll_student(&new_student("Phuong Thao", "Nguyen", "2001-05-25"))
            .unwrap();

        assert_eq!(first.username, "nguyenpt250501");
        assert_eq!(second.username, "nguyenpt250501_1");
    }

    #[test]
    fn test_invalid_names_rejected_without_writes() {
        let db = Database::open_in_memory().unwrap();
        let err = Enrollment::new(&db)
            .enroll_student(&new_student("  ", "Nguyen", "2001-05-25"))
            .unwrap_err();
        assert!(matches!(err, EnrollmentError::InvalidInput(_)));
        assert!(db.list_accounts_by_role(Role::Student).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_date_rejected() {
        let db = Database::open_in_memory().unwrap();
        let err = Enrollment::new(&db)
            .enroll_student(&new_student("An", "Tran Van", "31/12/2010"))
            .unwrap_err();
        assert!(matches!(err, EnrollmentError::InvalidInput(_)));
    }

    #[test]
    fn test_parent_must_exist_and_be_parent() {
        let db = Database::open_in_memory().unwrap();
        let nurse = UserAccount::new("nurse01".into(), Role::Nurse, "Hoa".into(), "Le".into());
        db.insert_account(&nurse).unwrap();

        let mut student = new_student("An", "Tran Van", "2010-01-01");
        student.parent_id = Some("ghost".into());
        assert!(matches!(
            Enrollment::new(&db).enroll_student(&student),
            Err(EnrollmentError::InvalidInput(_))
        ));

        student.parent_id = Some(nurse.user_id.clone());
        assert!(matches!(
            Enrollment::new(&db).enroll_student(&student),
            Err(EnrollmentError::InvalidInput(_))
        ));

        let parent = UserAccount::new("parent01".into(), Role::Parent, "Mai".into(), "Tran".into());
        db.insert_account(&parent).unwrap();
        student.parent_id = Some(parent.user_id.clone());
        let account = Enrollment::new(&db).enroll_student(&student).unwrap();
        assert_eq!(account.username, "vanta010110");
        assert_eq!(account.parent_id, Some(parent.user_id));
    }

    #[test]
    fn test_with_config_clamps_attempts() {
        let db = Database::open_in_memory().unwrap();
        let config = CoreConfig {
            max_enrollment_attempts: 0,
            ..CoreConfig::default()
        };
        let enrollment = Enrollment::with_config(&db, &config);
        assert_eq!(enrollment.max_attempts, 1);
    }

    #[test]
    fn test_enroll_emits_span_and_event() {
        let db = Database::open_in_memory().unwrap();
        let logs = CapturedLogs::default();

        tracing::subscriber::with_default(capture_subscriber(logs.clone()), || {
            Enrollment::new(&db)
                .enroll_student(&new_student("Phuc Tan", "Nguyen", "2001-05-25"))
                .unwrap();
        });

        let output = logs.contents();
        assert!(output.contains("enrollment.enroll_student"), "{}", output);
        assert!(output.contains("student enrolled"), "{}", output);
        assert!(output.contains("username=nguyenpt250501"), "{}", output);
    }

    #[test]
    fn test_stale_lookup_conflict_is_retried() {
        let db = Database::open_in_memory().unwrap();
        let enrollment = Enrollment::new(&db);
        enrollment
            .enroll_student(&new_student("Phuc Tan", "Nguyen", "2001-05-25"))
            .unwrap();

        // The first check misses the stored name; later checks see the store
        let stale_once = Cell::new(true);
        let lookup = username::lookup_fn(|candidate: &str| {
            if stale_once.replace(false) {
                return Ok(false);
            }
            db.username_exists(candidate)
        });

        let logs = CapturedLogs::default();
        let account = tracing::subscriber::with_default(capture_subscriber(logs.clone()), || {
            enrollment.enroll_with_lookup(&new_student("Phuong Thao", "Nguyen", "2001-05-25"), &lookup)
        })
        .unwrap();

        assert_eq!(account.username, "nguyenpt250501_1");
        assert_eq!(logs.contents().matches("username taken at insert, retrying").count(), 1);
        assert_eq!(db.list_accounts_by_role(Role::Student).unwrap().len(), 2);
    }

    #[test]
    fn test_attempts_exhausted_after_repeated_conflicts() {
        let db = Database::open_in_memory().unwrap();
        Enrollment::new(&db)
            .enroll_student(&new_student("Phuc Tan", "Nguyen", "2001-05-25"))
            .unwrap();

        let config = CoreConfig {
            max_enrollment_attempts: 2,
            ..CoreConfig::default()
        };
        let always_free = username::lookup_fn(|_: &str| Ok::<bool, DbError>(false));

        let logs = CapturedLogs::default();
        let err = tracing::subscriber::with_default(capture_subscriber(logs.clone()), || {
            Enrollment::with_config(&db, &config)
                .enroll_with_lookup(&new_student("Phuong Thao", "Nguyen", "2001-05-25"), &always_free)
        })
        .unwrap_err();

        assert!(matches!(err, EnrollmentError::AttemptsExhausted { attempts: 2 }));
        assert_eq!(logs.contents().matches("username taken at insert, retrying").count(), 2);
        assert_eq!(db.list_accounts_by_role(Role::Student).unwrap().len(), 1);
    }
}
