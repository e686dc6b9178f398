//! Tree-level merge strategies.
//!
//! All three strategies are built from the same two primitives of the
//! staged write area: `merge-tree` to combine trees and detect
//! conflicts, and `commit-tree` to seal a result. Nothing here touches
//! the target repository; produced commits stay in the staging area
//! until a reference updater moves them.

use crate::error::Error;
use crate::identity::Signature;
use crate::sha::Sha;
use crate::sharedrepo::SharedRepo;

/// Inputs shared by all merge strategies.
#[derive(Debug)]
pub struct Params<'a> {
    pub author: &'a Signature,
    pub committer: &'a Signature,
    pub message: &'a str,
    pub merge_base: Sha,
    pub target: Sha,
    pub source: Sha,
}

/// Outcome of a merge attempt.
///
/// Exactly one of the two holds: either `conflicts` is non-empty and no
/// commit was produced (`merge_sha` is unset), or `merge_sha` is a real
/// commit id and `conflicts` is empty.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub merge_sha: Sha,
    pub conflicts: Vec<String>,
}

impl MergeOutcome {
    pub fn is_conflicted(&self) -> bool {
        !self.conflicts.is_empty()
    }

    fn conflicted(conflicts: Vec<String>) -> Self {
        Self {
            merge_sha: Sha::EMPTY,
            conflicts,
        }
    }

    fn clean(merge_sha: Sha) -> Self {
        Self {
            merge_sha,
            conflicts: Vec::new(),
        }
    }
}

/// Named merge strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Merge,
    Squash,
    Rebase,
}

impl Strategy {
    pub fn apply(self, shared: &SharedRepo, params: &Params<'_>) -> Result<MergeOutcome, Error> {
        match self {
            Strategy::Merge => merge(shared, params),
            Strategy::Squash => squash(shared, params),
            Strategy::Rebase => rebase(shared, params),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Merge => "merge",
            Strategy::Squash => "squash",
            Strategy::Rebase => "rebase",
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(Strategy::Merge),
            "squash" => Ok(Strategy::Squash),
            "rebase" => Ok(Strategy::Rebase),
            other => Err(Error::invalid_argument(format!(
                "unsupported merge strategy {other:?}"
            ))),
        }
    }
}

/// A true merge: the combined tree committed with both histories as
/// parents, `[target, source]` in that order.
pub fn merge(shared: &SharedRepo, params: &Params<'_>) -> Result<MergeOutcome, Error> {
    let (tree, conflicts) = shared.merge_tree(params.merge_base, params.target, params.source)?;
    if !conflicts.is_empty() {
        return Ok(MergeOutcome::conflicted(conflicts));
    }
    let sha = shared.commit_tree(
        params.author,
        params.committer,
        tree,
        params.message,
        &[params.target, params.source],
    )?;
    Ok(MergeOutcome::clean(sha))
}

/// Like [`merge`], but the result carries only `target` as parent:
/// identical content, flattened history.
pub fn squash(shared: &SharedRepo, params: &Params<'_>) -> Result<MergeOutcome, Error> {
    let (tree, conflicts) = shared.merge_tree(params.merge_base, params.target, params.source)?;
    if !conflicts.is_empty() {
        return Ok(MergeOutcome::conflicted(conflicts));
    }
    let sha = shared.commit_tree(
        params.author,
        params.committer,
        tree,
        params.message,
        &[params.target],
    )?;
    Ok(MergeOutcome::clean(sha))
}

/// Replay the commits unique to `source` on top of `target`, one by
/// one.
///
/// Each replayed commit keeps its original author and message but takes
/// the supplied committer identity: standard rebase semantics of
/// rewriting, not re-authoring. An empty commit range produces `target`
/// with zero iterations.
pub fn rebase(shared: &SharedRepo, params: &Params<'_>) -> Result<MergeOutcome, Error> {
    let commits = shared.commits_for_rebase(params.target, params.source)?;

    let mut last = params.target;
    for commit_sha in commits {
        let commit = shared.read_commit(commit_sha)?;
        let base = commit.parents.first().copied().unwrap_or(Sha::EMPTY);

        let (tree, step_conflicts) = shared.merge_tree(base, last, commit_sha)?;
        if !step_conflicts.is_empty() {
            // An individual replay step does not necessarily conflict
            // on the same paths as the net change; report the direct
            // base-to-source conflicts instead.
            let (_, conflicts) =
                shared.merge_tree(params.merge_base, params.target, params.source)?;
            let conflicts = if conflicts.is_empty() { step_conflicts } else { conflicts };
            return Ok(MergeOutcome::conflicted(conflicts));
        }

        last = shared.commit_tree(&commit.author, params.committer, tree, &commit.message, &[last])?;
        tracing::debug!(original = %commit.sha, replayed = %last, "replayed commit");
    }

    Ok(MergeOutcome::clean(last))
}

/// Detect the conflicting paths of merging `source` onto `target`
/// without producing a commit.
pub fn find_conflicts(
    shared: &SharedRepo,
    merge_base: Sha,
    target: Sha,
    source: Sha,
) -> Result<Vec<String>, Error> {
    let (_, conflicts) = shared.merge_tree(merge_base, target, source)?;
    Ok(conflicts)
}
