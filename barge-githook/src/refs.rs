//! Reference classification, grouping and force-push detection.

use std::path::{Path, PathBuf};

use barge_git::hook::ReferenceUpdate;
use barge_git::{repo, Error};

pub use barge_git::repo::{BRANCH_PREFIX, TAG_PREFIX};

/// What kind of reference an update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Branch,
    Tag,
    Other,
}

/// Classify a full reference name and strip its prefix.
pub fn classify(ref_name: &str) -> (RefKind, &str) {
    if let Some(name) = ref_name.strip_prefix(BRANCH_PREFIX) {
        (RefKind::Branch, name)
    } else if let Some(name) = ref_name.strip_prefix(TAG_PREFIX) {
        (RefKind::Tag, name)
    } else {
        (RefKind::Other, ref_name)
    }
}

/// Names grouped by what happened to them.
#[derive(Debug, Clone, Default)]
pub struct Changes {
    pub created: Vec<String>,
    pub deleted: Vec<String>,
    pub updated: Vec<String>,
    pub forced: Vec<String>,
}

impl Changes {
    fn add(&mut self, update: &ReferenceUpdate, name: &str, forced: bool) {
        if update.old.is_nil() {
            self.created.push(name.to_string());
        } else if update.new.is_nil() {
            self.deleted.push(name.to_string());
        } else if forced {
            self.forced.push(name.to_string());
        } else {
            self.updated.push(name.to_string());
        }
    }
}

/// One push's reference updates, grouped by kind and action.
#[derive(Debug, Clone, Default)]
pub struct ChangedRefs {
    pub branches: Changes,
    pub tags: Changes,
    pub other: Changes,
}

impl ChangedRefs {
    /// `forced` must hold one flag per update, in the same order.
    pub fn group(ref_updates: &[ReferenceUpdate], forced: &[bool]) -> Self {
        let mut changed = ChangedRefs::default();
        for (index, update) in ref_updates.iter().enumerate() {
            let forced = forced.get(index).copied().unwrap_or(false);
            match classify(&update.ref_name) {
                (RefKind::Branch, name) => changed.branches.add(update, name, forced),
                (RefKind::Tag, name) => changed.tags.add(update, name, forced),
                (RefKind::Other, name) => changed.other.add(update, name, false),
            }
        }
        changed
    }
}

/// Whether an update rewrites history.
///
/// Creations and deletions are never forced. A branch update is forced
/// when the old value is not an ancestor of the new one. Tag value
/// moves are always forced: tags have no fast-forward concept.
pub fn is_force_push(
    repo_path: &Path,
    alternates: &[PathBuf],
    update: &ReferenceUpdate,
) -> Result<bool, Error> {
    if update.old.is_nil() || update.new.is_nil() {
        return Ok(false);
    }
    if classify(&update.ref_name).0 == RefKind::Tag {
        return Ok(true);
    }
    Ok(!repo::is_ancestor(
        repo_path, alternates, update.old, update.new,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use barge_git::Sha;

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
    fn classification_strips_prefixes() {
        assert_eq!(classify("refs/heads/main"), (RefKind::Branch, "main"));
        assert_eq!(classify("refs/tags/v1.0"), (RefKind::Tag, "v1.0"));
        assert_eq!(
            classify("refs/pull/1/head"),
            (RefKind::Other, "refs/pull/1/head")
        );
    }

    #[test]
    fn grouping_by_action() {
        let a = Sha::from_hex(A).unwrap();
        let b = Sha::from_hex(B).unwrap();
        let updates = vec![
            update("refs/heads/new", Sha::nil(), a),
            update("refs/heads/gone", a, Sha::nil()),
            update("refs/heads/moved", a, b),
            update("refs/heads/rewritten", a, b),
            update("refs/tags/v1", Sha::nil(), a),
            update("refs/pull/1/head", a, b),
        ];
        let forced = [false, false, false, true, false, true];
        let changed = ChangedRefs::group(&updates, &forced);

        assert_eq!(changed.branches.created, vec!["new"]);
        assert_eq!(changed.branches.deleted, vec!["gone"]);
        assert_eq!(changed.branches.updated, vec!["moved"]);
        assert_eq!(changed.branches.forced, vec!["rewritten"]);
        assert_eq!(changed.tags.created, vec!["v1"]);
        // non-branch, non-tag refs never count as forced
        assert_eq!(changed.other.updated, vec!["refs/pull/1/head"]);
        assert!(changed.other.forced.is_empty());
    }
}
