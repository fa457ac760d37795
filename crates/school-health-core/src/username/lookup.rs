//! Username existence checks.

use std::collections::{BTreeSet, HashSet};
use std::convert::Infallible;

/// Exact-match lookup against the set of usernames already taken.
pub trait UsernameLookup {
    type Error;

    /// Returns `true` when `candidate` is already in use.
    fn exists(&self, candidate: &str) -> Result<bool, Self::Error>;
}

impl<T: UsernameLookup + ?Sized> UsernameLookup for &T {
    type Error = T::Error;

    fn exists(&self, candidate: &str) -> Result<bool, Self::Error> {
        (**self).exists(candidate)
    }
}

impl UsernameLookup for HashSet<String> {
    type Error = Infallible;

    fn exists(&self, candidate: &str) -> Result<bool, Self::Error> {
        Ok(self.contains(candidate))
    }
}

impl UsernameLookup for BTreeSet<String> {
    type Error = Infallible;

    fn exists(&self, candidate: &str) -> Result<bool, Self::Error> {
        Ok(self.contains(candidate))
    }
}

/// Adapter turning a closure into a [`UsernameLookup`].
pub struct FnLookup<F>(F);

/// Wrap a closure as a lookup, e.g. to call a remote user service.
pub fn lookup_fn<F, E>(f: F) -> FnLookup<F>
where
    F: Fn(&str) -> Result<bool, E>,
{
    FnLookup(f)
}

impl<F, E> UsernameLookup for FnLookup<F>
where
    F: Fn(&str) -> Result<bool, E>,
{
    type Error = E;

    fn exists(&self, candidate: &str) -> Result<bool, Self::Error> {
        (self.0)(candidate)
    }
}
