//! Content hash value type with explicit sentinel states.
//!
//! Reference plumbing distinguishes three shapes of a hash:
//!
//! - a real object id,
//! - the all-zero id ("nil"), git's way of saying "no object": the old
//!   value of a reference that does not exist yet, or the new value of
//!   a deletion,
//! - no value at all ("empty"): the caller has not supplied or resolved
//!   one yet.
//!
//! [`Sha`] keeps the last two apart, which a plain hex string cannot.

use std::fmt;
use std::str::FromStr;

use gix_hash::ObjectId;

use crate::error::Error;

/// A content hash, possibly unset, possibly the all-zero nil value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sha(Option<ObjectId>);

impl Sha {
    /// The unset value: not yet known or intentionally not supplied.
    pub const EMPTY: Sha = Sha(None);

    /// The all-zero id: "no object here".
    pub fn nil() -> Self {
        Sha(Some(ObjectId::null(gix_hash::Kind::Sha1)))
    }

    /// Parse a hex digest. The all-zero digest parses to the nil value.
    pub fn from_hex(hex: &str) -> Result<Self, Error> {
        let id = ObjectId::from_hex(hex.trim().as_bytes())
            .map_err(|err| Error::invalid_argument(format!("invalid object id {hex:?}: {err}")))?;
        Ok(Sha(Some(id)))
    }

    pub fn is_empty(self) -> bool {
        self.0.is_none()
    }

    pub fn is_nil(self) -> bool {
        matches!(self.0, Some(id) if id.is_null())
    }

    /// True for a real object id, neither empty nor nil.
    pub fn is_value(self) -> bool {
        matches!(self.0, Some(id) if !id.is_null())
    }

    pub fn id(self) -> Option<ObjectId> {
        self.0
    }
}

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => id.fmt(f),
            None => Ok(()),
        }
    }
}

impl FromStr for Sha {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sha::from_hex(s)
    }
}

impl From<ObjectId> for Sha {
    fn from(id: ObjectId) -> Self {
        Sha(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "2d5a1e1b58b15e89d4d732252debaf550acc6e2a";

    #[test]
    fn sentinels_are_distinct() {
        assert!(Sha::EMPTY.is_empty());
        assert!(!Sha::EMPTY.is_nil());
        assert!(!Sha::EMPTY.is_value());

        assert!(Sha::nil().is_nil());
        assert!(!Sha::nil().is_empty());
        assert!(!Sha::nil().is_value());

        assert_ne!(Sha::EMPTY, Sha::nil());
    }

    #[test]
    fn real_value_is_neither_sentinel() {
        let sha = Sha::from_hex(SAMPLE).unwrap();
        assert!(sha.is_value());
        assert!(!sha.is_empty());
        assert!(!sha.is_nil());
        assert_ne!(sha, Sha::nil());
        assert_eq!(sha.to_string(), SAMPLE);
    }

    #[test]
    fn all_zero_digest_parses_to_nil() {
        let sha = Sha::from_hex(&"0".repeat(40)).unwrap();
        assert!(sha.is_nil());
        assert_eq!(sha, Sha::nil());
    }

    #[test]
    fn invalid_hex_is_rejected() {
        assert!(Sha::from_hex("not-a-sha").is_err());
        assert!(Sha::from_hex("abc123").is_err());
    }

    #[test]
    fn empty_displays_as_nothing() {
        assert_eq!(Sha::EMPTY.to_string(), "");
        assert_eq!(Sha::nil().to_string(), "0".repeat(40));
    }
}
