//! Domain models for the school health system.

mod account;
mod campaign;
mod consultation;
mod medicine;

pub use account::*;
pub use campaign::*;
pub use consultation::*;
pub use medicine::*;

use thiserror::Error;

/// Rejected status change, e.g. approving an already rejected request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot move from '{from}' to '{to}'")]
pub struct StatusTransitionError {
    pub from: &'static str,
    pub to: &'static str,
}
