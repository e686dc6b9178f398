//! Oversized file detection.
//!
//! Walks the objects a push makes newly reachable and flags blobs over
//! the per-repository size limit. The number of reported offenders is
//! capped while the true total keeps counting.

use std::path::Path;

use barge_git::hook::{Environment, ReferenceUpdate};
use barge_git::{repo, Error, Sha};

use super::{Violations, MAX_REPORTED};

/// One blob over the limit.
#[derive(Debug, Clone, Copy)]
pub struct OversizeFile {
    pub sha: Sha,
    pub size: u64,
}

/// A limit of zero disables the check.
pub fn run(
    repo_path: &Path,
    environment: &Environment,
    updates: &[ReferenceUpdate],
    limit: u64,
    violations: &mut Violations,
) -> Result<(), Error> {
    if limit == 0 {
        return Ok(());
    }

    let heads: Vec<Sha> = updates
        .iter()
        .filter(|update| update.new.is_value())
        .map(|update| update.new)
        .collect();
    if heads.is_empty() {
        return Ok(());
    }

    let objects = repo::list_new_objects(repo_path, &environment.alternate_object_dirs, &heads)?;
    for object in objects {
        if object.kind != repo::ObjectKind::Blob || object.size <= limit {
            continue;
        }
        violations.oversize_total += 1;
        if violations.oversize_files.len() < MAX_REPORTED {
            violations.oversize_files.push(OversizeFile {
                sha: object.sha,
                size: object.size,
            });
        }
    }

    tracing::debug!(
        limit,
        total = violations.oversize_total,
        "checked push for oversized files"
    );
    Ok(())
}
