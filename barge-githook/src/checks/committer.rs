//! Committer identity verification.
//!
//! Every new commit of a push must carry the authenticated principal's
//! email as committer. The base for "new" follows the shared
//! resolution chain; in an empty repository every commit reachable from
//! the new value is inspected.

use std::collections::HashSet;
use std::path::Path;

use barge_git::hook::{Environment, ReferenceUpdate};
use barge_git::{repo, Error, Sha};

use crate::base;

use super::{Violations, MAX_REPORTED};

/// One commit whose committer email does not match the principal.
#[derive(Debug, Clone)]
pub struct Mismatch {
    pub commit_sha: Sha,
    pub committer_email: String,
}

pub fn run(
    repo_path: &Path,
    environment: &Environment,
    updates: &[ReferenceUpdate],
    default_branch_ref: &str,
    principal_email: &str,
    violations: &mut Violations,
) -> Result<(), Error> {
    let mut seen: HashSet<Sha> = HashSet::new();

    for update in updates {
        if !update.new.is_value() {
            continue;
        }
        let base = base::resolve(repo_path, default_branch_ref, updates, update)?;
        let commits = repo::read_commits(
            repo_path,
            &environment.alternate_object_dirs,
            base,
            update.new,
        )?;

        for commit in commits {
            if !seen.insert(commit.sha) {
                continue;
            }
            if commit.committer.identity.email == principal_email {
                continue;
            }
            violations.committer_mismatch_total += 1;
            if violations.committer_mismatches.len() < MAX_REPORTED {
                violations.committer_mismatches.push(Mismatch {
                    commit_sha: commit.sha,
                    committer_email: commit.committer.identity.email,
                });
            }
        }
    }

    tracing::debug!(
        principal = principal_email,
        total = violations.committer_mismatch_total,
        "checked push for committer mismatches"
    );
    Ok(())
}
