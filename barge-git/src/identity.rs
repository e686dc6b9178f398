//! Author, committer and tagger identities.

use std::fmt;

use chrono::{DateTime, FixedOffset};

/// A name and email pair as it appears in commit and tag headers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// An identity bound to a point in time, as fed to `commit-tree` and
/// written into tag objects.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Signature {
    pub identity: Identity,
    pub when: DateTime<FixedOffset>,
}

impl Signature {
    pub fn new(identity: Identity, when: DateTime<FixedOffset>) -> Self {
        Self { identity, when }
    }

    /// Git's raw date format: `<unix seconds> <utc offset>`.
    pub fn git_date(&self) -> String {
        format!("{} {}", self.when.timestamp(), self.when.format("%z"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_date_uses_raw_format() {
        let when = DateTime::parse_from_rfc3339("2024-03-01T12:00:00+02:00").unwrap();
        let sig = Signature::new(Identity::new("Jo", "jo@example.com"), when);
        assert_eq!(sig.git_date(), "1709287200 +0200");
    }

    #[test]
    fn identity_display() {
        let id = Identity::new("Jo", "jo@example.com");
        assert_eq!(id.to_string(), "Jo <jo@example.com>");
    }
}
