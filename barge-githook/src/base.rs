//! Shared base-revision resolution for commit-range checks.
//!
//! The committer-identity and secret-scanning checks both need a base
//! revision to diff a pushed ref against. The fallback chain: the ref
//! update's own old value; the old value of a default-branch update in
//! the same push; the default branch's current tip; and in an empty
//! repository, no base at all - the caller then degrades to inspecting
//! everything reachable from the new value.

use std::path::Path;

use barge_git::hook::ReferenceUpdate;
use barge_git::{repo, Error, Sha};

/// Resolve the base revision for checking `update`, without touching
/// the repository.
pub fn resolve_from_push(
    default_branch_ref: &str,
    all_updates: &[ReferenceUpdate],
    update: &ReferenceUpdate,
) -> Option<Sha> {
    if update.old.is_value() {
        return Some(update.old);
    }
    all_updates
        .iter()
        .find(|other| other.ref_name == default_branch_ref && other.old.is_value())
        .map(|other| other.old)
}

/// Resolve the base revision for checking `update`, falling back to the
/// repository's default branch tip. `None` means an empty repository.
pub fn resolve(
    repo_path: &Path,
    default_branch_ref: &str,
    all_updates: &[ReferenceUpdate],
    update: &ReferenceUpdate,
) -> Result<Option<Sha>, Error> {
    if let Some(base) = resolve_from_push(default_branch_ref, all_updates, update) {
        return Ok(Some(base));
    }
    match repo::resolve_ref(repo_path, default_branch_ref) {
        Ok(tip) => Ok(Some(tip)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "2d5a1e1b58b15e89d4d732252debaf550acc6e2a";
    const B: &str = "66ac20e9a1d9e45bfa8c6ad00e0b9a609f8ca8fa";

    fn update(ref_name: &str, old: Sha, new: Sha) -> ReferenceUpdate {
        ReferenceUpdate {
            ref_name: ref_name.to_string(),
            old,
            new,
        }
    }

    #[test]
    fn own_old_value_wins() {
        let a = Sha::from_hex(A).unwrap();
        let b = Sha::from_hex(B).unwrap();
        let u = update("refs/heads/feature", a, b);
        assert_eq!(resolve_from_push("refs/heads/main", &[u.clone()], &u), Some(a));
    }

    #[test]
    fn falls_back_to_default_branch_update_in_same_push() {
        let a = Sha::from_hex(A).unwrap();
        let b = Sha::from_hex(B).unwrap();
        let new_branch = update("refs/heads/feature", Sha::nil(), b);
        let main = update("refs/heads/main", a, b);
        let all = vec![new_branch.clone(), main];
        assert_eq!(
            resolve_from_push("refs/heads/main", &all, &new_branch),
            Some(a)
        );
    }

    #[test]
    fn no_base_in_push_yields_none() {
        let b = Sha::from_hex(B).unwrap();
        let new_branch = update("refs/heads/feature", Sha::nil(), b);
        let all = vec![new_branch.clone()];
        assert_eq!(resolve_from_push("refs/heads/main", &all, &new_branch), None);
    }
}
