//! Deterministic username generator.
//!
//! `surname + initials + ddMMyy`, all lower-case, no separators. Vietnamese names put
//! the family name first, so the *last* token of the last-name field is the surname
//! and every other token contributes an initial:
//!
//! ```text
//! first = "Phuc Tan", last = "Nguyen",   2001-05-25 → nguyen + pt + 250501
//! first = "An",       last = "Tran Van", 2010-01-01 → van    + ta + 010110
//! ```
//!
//! Collisions append `_1`, `_2`, … and the first free candidate wins.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use super::{GenerateError, UsernameError, UsernameLookup, UsernameResult};

/// A name split into its surname and the tokens that supply initials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameParts<'a> {
    /// Rightmost token of the last name
    pub surname: &'a str,
    /// Remaining last-name tokens, then all first-name tokens
    pub initials_source: Vec<&'a str>,
}

impl<'a> NameParts<'a> {
    /// Split first and last name into tokens.
    ///
    /// Both fields must contain at least one non-whitespace token.
    pub fn parse(first_name: &'a str, last_name: &'a str) -> UsernameResult<Self> {
        let mut initials_source: Vec<&str> = last_name.split_whitespace().collect();
        let surname = initials_source
            .pop()
            .ok_or_else(|| UsernameError::InvalidInput("last name is empty".into()))?;

        let first_len = initials_source.len();
        initials_source.extend(first_name.split_whitespace());
        if initials_source.len() == first_len {
            return Err(UsernameError::InvalidInput("first name is empty".into()));
        }

        Ok(Self {
            surname,
            initials_source,
        })
    }

    /// First character of every initials-source token, lower-cased.
    pub fn initials(&self) -> String {
        self.initials_source
            .iter()
            .filter_map(|token| token.chars().next())
            .flat_map(char::to_lowercase)
            .collect()
    }
}

/// Format a birth date as `ddMMyy` using the date's own calendar fields.
pub fn date_suffix(date_of_birth: NaiveDate) -> String {
    format!(
        "{:02}{:02}{:02}",
        date_of_birth.day(),
        date_of_birth.month(),
        date_of_birth.year().rem_euclid(100)
    )
}

/// Build the candidate before any collision suffix is applied.
pub fn base_username(
    first_name: &str,
    last_name: &str,
    date_of_birth: NaiveDate,
) -> UsernameResult<String> {
    let parts = NameParts::parse(first_name, last_name)?;
    Ok(format!(
        "{}{}{}",
        parts.surname.to_lowercase(),
        parts.initials(),
        date_suffix(date_of_birth)
    ))
}

/// Append the collision counter to a base candidate.
pub fn suffixed_username(base: &str, counter: u64) -> String {
    format!("{}_{}", base, counter)
}

/// Generate a username that `lookup` reports as free.
///
/// Candidates are checked strictly in order (`base`, `base_1`, `base_2`, …) and the
/// first free one is returned. Lookup errors are returned as
/// [`GenerateError::Lookup`] without retrying.
pub fn generate_unique_username<L>(
    first_name: &str,
    last_name: &str,
    date_of_birth: NaiveDate,
    lookup: &L,
) -> Result<String, GenerateError<L::Error>>
where
    L: UsernameLookup + ?Sized,
{
    let base = base_username(first_name, last_name, date_of_birth)?;

    let mut candidate = base.clone();
    let mut counter: u64 = 0;
    loop {
        if !lookup.exists(&candidate).map_err(GenerateError::Lookup)? {
            if counter > 0 {
                tracing::debug!(base = %base, username = %candidate, collisions = counter, "resolved username collision");
            }
            return Ok(candidate);
        }
        counter += 1;
        candidate = suffixed_username(&base, counter);
    }
}

/// Same as [`generate_unique_username`] but with a textual birth date.
pub fn generate_unique_username_from_str<L>(
    first_name: &str,
    last_name: &str,
    date_of_birth: &str,
    lookup: &L,
) -> Result<String, GenerateError<L::Error>>
where
    L: UsernameLookup + ?Sized,
{
    let date = parse_birth_date(date_of_birth)?;
    generate_unique_username(first_name, last_name, date, lookup)
}

/// Parse a birth date from `YYYY-MM-DD`, an RFC 3339 timestamp, or a naive
/// `YYYY-MM-DDTHH:MM:SS` timestamp.
///
/// Timestamps keep the calendar date as written; no timezone conversion is applied.
/// Future and very old dates are accepted.
pub fn parse_birth_date(input: &str) -> UsernameResult<NaiveDate> {
    let trimmed = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp.date_naive());
    }
    if let Ok(timestamp) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(timestamp.date());
    }

    Err(UsernameError::InvalidInput(format!(
        "unparseable date of birth: {:?}",
        input
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::convert::Infallible;

    use crate::username::lookup_fn;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn taken(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_name_parts_simple() {
        let parts = NameParts::parse("Phuc Tan", "Nguyen").unwrap();
        assert_eq!(parts.surname, "Nguyen");
        assert_eq!(parts.initials_source, vec!["Phuc", "Tan"]);
        assert_eq!(parts.initials(), "pt");
    }

    #[test]
    fn test_name_parts_compound_last_name() {
        let parts = NameParts::parse("An", "Tran Van").unwrap();
        assert_eq!(parts.surname, "Van");
        assert_eq!(parts.initials_source, vec!["Tran", "An"]);
        assert_eq!(parts.initials(), "ta");
    }

    #[test]
    fn test_name_parts_collapses_extra_whitespace() {
        let parts = NameParts::parse("  Thi   Mai ", " Le\tHoang ").unwrap();
        assert_eq!(parts.surname, "Hoang");
        assert_eq!(parts.initials(), "ltm");
    }

    #[test]
    fn test_blank_names_rejected() {
        assert!(matches!(
            NameParts::parse("   ", "Nguyen"),
            Err(UsernameError::InvalidInput(_))
        ));
        assert!(matches!(
            NameParts::parse("An", "\t "),
            Err(UsernameError::InvalidInput(_))
        ));
        assert!(matches!(
            NameParts::parse("", ""),
            Err(UsernameError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_date_suffix_zero_pads() {
        assert_eq!(date_suffix(date(2001, 5, 25)), "250501");
        assert_eq!(date_suffix(date(2010, 1, 1)), "010110");
        assert_eq!(date_suffix(date(2000, 12, 31)), "311200");
        assert_eq!(date_suffix(date(1800, 1, 1)), "010100");
    }

    #[test]
    fn test_base_username() {
        assert_eq!(
            base_username("Phuc Tan", "Nguyen", date(2001, 5, 25)).unwrap(),
            "nguyenpt250501"
        );
        assert_eq!(
            base_username("An", "Tran Van", date(2012, 3, 9)).unwrap(),
            "vanta090312"
        );
    }

    #[test]
    fn test_base_username_keeps_diacritics() {
        assert_eq!(
            base_username("Ánh Dương", "Nguyễn", date(2015, 7, 4)).unwrap(),
            "nguyễnád040715"
        );
    }

    #[test]
    fn test_no_collision_returns_base() {
        let username =
            generate_unique_username("Phuc Tan", "Nguyen", date(2001, 5, 25), &taken(&[]))
                .unwrap();
        assert_eq!(username, "nguyenpt250501");
    }

    #[test]
    fn test_collision_appends_counter() {
        let existing = taken(&["nguyenpt250501"]);
        let username =
            generate_unique_username("Phuc Tan", "Nguyen", date(2001, 5, 25), &existing).unwrap();
        assert_eq!(username, "nguyenpt250501_1");

        let existing = taken(&["nguyenpt250501", "nguyenpt250501_1", "nguyenpt250501_2"]);
        let username =
            generate_unique_username("Phuc Tan", "Nguyen", date(2001, 5, 25), &existing).unwrap();
        assert_eq!(username, "nguyenpt250501_3");
    }

    #[test]
    fn test_first_free_counter_wins() {
        // _2 taken but _1 free: no gaps are skipped
        let existing = taken(&["nguyenpt250501", "nguyenpt250501_2"]);
        let username =
            generate_unique_username("Phuc Tan", "Nguyen", date(2001, 5, 25), &existing).unwrap();
        assert_eq!(username, "nguyenpt250501_1");
    }

    #[test]
    fn test_checks_are_sequential() {
        let seen = std::cell::RefCell::new(Vec::new());
        let lookup = lookup_fn(|candidate: &str| -> Result<bool, Infallible> {
            seen.borrow_mut().push(candidate.to_string());
            Ok(seen.borrow().len() < 3)
        });

        let username = generate_unique_username("An", "Tran Van", date(2010, 1, 1), &lookup).unwrap();
        assert_eq!(username, "vanta010110_2");
        assert_eq!(
            seen.borrow().as_slice(),
            ["vanta010110", "vanta010110_1", "vanta010110_2"]
        );
    }

    #[test]
    fn test_lookup_error_propagates() {
        let calls = Cell::new(0);
        let lookup = lookup_fn(|_: &str| {
            calls.set(calls.get() + 1);
            Err::<bool, _>("connection refused")
        });

        let result = generate_unique_username("An", "Tran Van", date(2010, 1, 1), &lookup);
        assert!(matches!(result, Err(GenerateError::Lookup("connection refused"))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_invalid_input_skips_lookup() {
        let lookup = lookup_fn(|_: &str| -> Result<bool, Infallible> {
            panic!("lookup must not be consulted for invalid input")
        });

        let result = generate_unique_username(" ", "Nguyen", date(2001, 5, 25), &lookup);
        assert!(result.unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_parse_birth_date_formats() {
        assert_eq!(parse_birth_date("2001-05-25").unwrap(), date(2001, 5, 25));
        assert_eq!(
            parse_birth_date("2001-05-25T00:00:00.000Z").unwrap(),
            date(2001, 5, 25)
        );
        assert_eq!(
            parse_birth_date("2001-05-25T23:30:00+07:00").unwrap(),
            date(2001, 5, 25)
        );
        assert_eq!(
            parse_birth_date("2001-05-25T08:15:00").unwrap(),
            date(2001, 5, 25)
        );
        assert_eq!(parse_birth_date(" 2001-05-25 ").unwrap(), date(2001, 5, 25));
    }

    #[test]
    fn test_parse_birth_date_is_permissive_about_range() {
        assert_eq!(parse_birth_date("1800-01-01").unwrap(), date(1800, 1, 1));
        assert_eq!(parse_birth_date("2999-12-31").unwrap(), date(2999, 12, 31));
    }

    #[test]
    fn test_parse_birth_date_rejects_garbage() {
        for input in ["", "not a date", "2001-13-01", "2001-02-30", "25/05/2001"] {
            assert!(
                matches!(parse_birth_date(input), Err(UsernameError::InvalidInput(_))),
                "expected rejection for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_generate_from_str() {
        let username = generate_unique_username_from_str(
            "Phuc Tan",
            "Nguyen",
            "2001-05-25",
            &taken(&["nguyenpt250501"]),
        )
        .unwrap();
        assert_eq!(username, "nguyenpt250501_1");

        let err = generate_unique_username_from_str("Phuc Tan", "Nguyen", "yesterday", &taken(&[]))
            .unwrap_err();
        assert!(err.is_invalid_input());
    }
}
