//! Stdin line codec for the out-of-process hook contract.
//!
//! `pre-receive` and `post-receive` hooks receive one line per updated
//! reference on standard input, in the exact form
//! `<old-sha> <new-sha> <ref-name>\n`. A malformed line is a hard parse
//! failure: a hook must never guess at partial input.

use bstr::ByteSlice;

use super::ReferenceUpdate;
use crate::error::Error;
use crate::sha::Sha;

/// Encode reference updates as hook stdin lines.
///
/// Values that were never resolved encode as the all-zero id, matching
/// what git itself feeds its hooks.
pub fn encode(ref_updates: &[ReferenceUpdate]) -> Vec<u8> {
    let mut out = Vec::new();
    for update in ref_updates {
        let old = if update.old.is_empty() { Sha::nil() } else { update.old };
        let new = if update.new.is_empty() { Sha::nil() } else { update.new };
        out.extend_from_slice(format!("{} {} {}\n", old, new, update.ref_name).as_bytes());
    }
    out
}

/// Decode hook stdin lines back into reference updates.
pub fn decode(input: &[u8]) -> Result<Vec<ReferenceUpdate>, Error> {
    let mut updates = Vec::new();
    for line in input.lines() {
        if line.is_empty() {
            continue;
        }
        let line = line.to_str().map_err(|_| {
            Error::invalid_argument("hook input line is not valid UTF-8".to_string())
        })?;
        let tokens: Vec<&str> = line.split(' ').collect();
        let &[old, new, ref_name] = tokens.as_slice() else {
            return Err(Error::invalid_argument(format!(
                "malformed hook input line {line:?}: expected `<old-sha> <new-sha> <ref-name>`"
            )));
        };
        if ref_name.is_empty() {
            return Err(Error::invalid_argument(format!(
                "malformed hook input line {line:?}: empty reference name"
            )));
        }
        updates.push(ReferenceUpdate {
            ref_name: ref_name.to_string(),
            old: Sha::from_hex(old)?,
            new: Sha::from_hex(new)?,
        });
    }
    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const A: &str = "2d5a1e1b58b15e89d4d732252debaf550acc6e2a";
    const B: &str = "66ac20e9a1d9e45bfa8c6ad00e0b9a609f8ca8fa";

    #[test]
    fn encodes_one_line_per_update() {
        let updates = vec![
            ReferenceUpdate {
                ref_name: "refs/heads/main".to_string(),
                old: Sha::from_hex(A).unwrap(),
                new: Sha::from_hex(B).unwrap(),
            },
            ReferenceUpdate {
                ref_name: "refs/tags/v1".to_string(),
                old: Sha::nil(),
                new: Sha::from_hex(A).unwrap(),
            },
        ];
        let encoded = encode(&updates);
        assert_eq!(
            String::from_utf8(encoded).unwrap(),
            format!("{A} {B} refs/heads/main\n{} {A} refs/tags/v1\n", "0".repeat(40))
        );
    }

    #[test]
    fn empty_values_encode_as_nil() {
        let updates = vec![ReferenceUpdate {
            ref_name: "refs/heads/main".to_string(),
            old: Sha::EMPTY,
            new: Sha::from_hex(A).unwrap(),
        }];
        let encoded = String::from_utf8(encode(&updates)).unwrap();
        assert!(encoded.starts_with(&"0".repeat(40)));
    }

    #[test]
    fn roundtrip() {
        let updates = vec![ReferenceUpdate {
            ref_name: "refs/heads/main".to_string(),
            old: Sha::from_hex(A).unwrap(),
            new: Sha::nil(),
        }];
        let decoded = decode(&encode(&updates)).unwrap();
        assert_eq!(decoded, updates);
    }

    #[test]
    fn malformed_line_is_a_hard_failure() {
        assert!(decode(format!("{A} {B}\n").as_bytes()).is_err());
        assert!(decode(format!("{A} {B} refs/heads/main extra\n").as_bytes()).is_err());
        assert!(decode(b"one two three\n").is_err());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let decoded = decode(format!("\n{A} {B} refs/heads/main\n\n").as_bytes()).unwrap();
        assert_eq!(decoded.len(), 1);
    }
}
