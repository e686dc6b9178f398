//! Secret scanning boundary and result collection.
//!
//! The scanner itself lives outside this crate; the check resolves the
//! revision range per pushed ref, invokes the scanner over it, and
//! collects the findings across all refs so they are reported together.
//! A scan that finds nothing is still visible to the user - the
//! controller appends a positive message either way.

use std::path::Path;

use barge_git::hook::ReferenceUpdate;
use barge_git::{Error, Sha};

use crate::base;

use super::Violations;

/// A single detection reported by the scanner.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Finding {
    /// Path of the file the secret was found in.
    pub path: String,
    /// 1-based line within the file.
    pub line: u64,
    /// Identifier of the rule that matched.
    pub rule: String,
    /// Commit the finding was introduced in.
    pub commit_sha: Sha,
    /// Author of that commit.
    pub author: String,
}

/// Content scanner over a commit range.
///
/// `base_rev` of `None` means an unbounded scan of everything reachable
/// from `rev` (empty repository degradation).
pub trait SecretScanner {
    fn scan(
        &self,
        repo_path: &Path,
        base_rev: Option<Sha>,
        rev: Sha,
    ) -> Result<Vec<Finding>, Error>;
}

pub fn run(
    scanner: &dyn SecretScanner,
    repo_path: &Path,
    updates: &[ReferenceUpdate],
    default_branch_ref: &str,
    violations: &mut Violations,
) -> Result<(), Error> {
    for update in updates {
        if !update.new.is_value() {
            continue;
        }
        let base = base::resolve(repo_path, default_branch_ref, updates, update)?;
        let findings = scanner.scan(repo_path, base, update.new)?;
        violations.secrets.extend(findings);
    }

    tracing::debug!(total = violations.secrets.len(), "scanned push for secrets");
    Ok(())
}
