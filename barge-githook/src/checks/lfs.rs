//! LFS pointer verification.
//!
//! A push may introduce LFS pointer files whose actual objects were
//! never uploaded; referencing them would break every later checkout.
//! The check parses candidate blobs as pointers and verifies each
//! object id against the LFS store.
//!
//! Pointer format per the git-lfs specification:
//!
//! ```text
//! version https://git-lfs.github.com/spec/v1
//! oid sha256:<64 hex digits>
//! size <bytes>
//! ```

use std::path::Path;

use barge_git::hook::{Environment, ReferenceUpdate};
use barge_git::{repo, Error, Sha};

use super::Violations;

/// Pointer files are tiny; larger blobs cannot be pointers.
pub const POINTER_MAX_SIZE: u64 = 1024;

const VERSION_LINE: &str = "version https://git-lfs.github.com/spec/v1";
const OID_PREFIX: &str = "oid sha256:";
const SIZE_PREFIX: &str = "size ";

/// A parsed LFS pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pointer {
    /// The sha256 object id, lower-case hex.
    pub oid: String,
    pub size: u64,
}

/// Parse blob content as an LFS pointer; `None` when it is not one.
pub fn parse_pointer(content: &[u8]) -> Option<Pointer> {
    let text = std::str::from_utf8(content).ok()?;
    let mut lines = text.lines();

    if lines.next()?.trim_end() != VERSION_LINE {
        return None;
    }

    let mut oid = None;
    let mut size = None;
    for line in lines {
        if let Some(rest) = line.strip_prefix(OID_PREFIX) {
            let rest = rest.trim_end();
            if rest.len() != 64 || !rest.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            oid = Some(rest.to_ascii_lowercase());
        } else if let Some(rest) = line.strip_prefix(SIZE_PREFIX) {
            size = rest.trim_end().parse().ok();
        }
    }

    Some(Pointer {
        oid: oid?,
        size: size?,
    })
}

/// Lookup into the LFS object store.
pub trait LfsStore {
    /// Return the subset of `oids` that exist in the store.
    fn find_many(&self, repo_id: i64, oids: &[String]) -> Result<Vec<String>, Error>;
}

pub fn run(
    store: &dyn LfsStore,
    repo_id: i64,
    repo_path: &Path,
    environment: &Environment,
    updates: &[ReferenceUpdate],
    violations: &mut Violations,
) -> Result<(), Error> {
    let heads: Vec<Sha> = updates
        .iter()
        .filter(|update| update.new.is_value())
        .map(|update| update.new)
        .collect();
    if heads.is_empty() {
        return Ok(());
    }

    let alternates = &environment.alternate_object_dirs;
    let mut pointer_oids = Vec::new();
    for object in repo::list_new_objects(repo_path, alternates, &heads)? {
        if object.kind != repo::ObjectKind::Blob || object.size > POINTER_MAX_SIZE {
            continue;
        }
        let content = repo::read_blob(repo_path, alternates, object.sha)?;
        if let Some(pointer) = parse_pointer(&content) {
            pointer_oids.push(pointer.oid);
        }
    }
    if pointer_oids.is_empty() {
        return Ok(());
    }
    pointer_oids.sort();
    pointer_oids.dedup();

    let existing = store.find_many(repo_id, &pointer_oids)?;
    violations.missing_lfs_objects = pointer_oids
        .into_iter()
        .filter(|oid| !existing.contains(oid))
        .collect();

    tracing::debug!(
        missing = violations.missing_lfs_objects.len(),
        "checked push for unknown LFS objects"
    );
    Ok(())
}
