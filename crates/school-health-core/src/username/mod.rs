//! Student username generation.
//!
//! Pipeline: NameParts → base candidate (`surname + initials + ddMMyy`) → collision suffix
//!
//! The generator only reads from a [`UsernameLookup`]; it never reserves or persists
//! the username it returns. The store's `UNIQUE` constraint stays the final authority.

mod generator;
mod lookup;

pub use generator::*;
pub use lookup::*;

use thiserror::Error;

/// Input validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsernameError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type UsernameResult<T> = Result<T, UsernameError>;

/// Errors from [`generate_unique_username`].
///
/// Lookup failures are passed through untouched so the caller can decide
/// whether the whole account-creation attempt is worth retrying.
#[derive(Error, Debug)]
pub enum GenerateError<E> {
    #[error(transparent)]
    InvalidInput(#[from] UsernameError),

    #[error("Username lookup failed")]
    Lookup(#[source] E),
}

impl<E> GenerateError<E> {
    /// True when the failure came from the input rather than the store.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, GenerateError::InvalidInput(_))
    }
}
