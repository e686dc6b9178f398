//! The merge operation, in checking and mutating form.

use std::path::PathBuf;

use super::Service;
use crate::error::Error;
use crate::hook::{HookClient, RefUpdater};
use crate::identity::Signature;
use crate::merge::{self, Params, Strategy};
use crate::repo;
use crate::sha::Sha;
use crate::sharedrepo::{self, SharedRepo};

/// Parameters for merging one branch (or commit) into another.
#[derive(Debug, Clone)]
pub struct MergeParams {
    pub repo_path: PathBuf,

    /// Destination branch name; ignored when `base_sha` is set.
    pub base_branch: String,
    pub base_sha: Sha,

    /// Source branch name; ignored when `head_sha` is set.
    pub head_branch: String,
    pub head_sha: Sha,

    /// When set, the source branch must still be at this value at merge
    /// time. This guards the source; git's compare-and-swap on the
    /// destination ref guards the destination.
    pub head_expected_sha: Sha,

    pub message: String,
    pub author: Option<Signature>,
    pub committer: Signature,

    /// Full name of the reference to update with the produced commit,
    /// e.g. `refs/heads/main` or an internal pull-request ref. `None`
    /// turns the call into a read-only merge check.
    pub ref_name: Option<String>,

    pub strategy: Strategy,
}

impl MergeParams {
    fn validate(&self) -> Result<(), Error> {
        if self.base_branch.is_empty() && !self.base_sha.is_value() {
            return Err(Error::invalid_argument(
                "either base branch or base SHA is mandatory",
            ));
        }
        if self.head_branch.is_empty() && !self.head_sha.is_value() {
            return Err(Error::invalid_argument(
                "either head branch or head SHA is mandatory",
            ));
        }
        if !self.base_branch.is_empty() && self.base_branch == self.head_branch {
            return Err(Error::invalid_argument(
                "source and target branch are the same",
            ));
        }
        if let Some(ref_name) = &self.ref_name {
            if ref_name.is_empty() {
                return Err(Error::invalid_argument("ref name must not be empty"));
            }
        }
        Ok(())
    }
}

/// Result of a merge call.
///
/// Non-empty `conflict_files` means no commit was produced and
/// `merge_sha` is unset; the statistics describe the attempted merge
/// either way.
#[derive(Debug, Clone, Default)]
pub struct MergeOutput {
    pub base_sha: Sha,
    pub head_sha: Sha,
    pub merge_base_sha: Sha,
    pub merge_sha: Sha,
    pub commit_count: usize,
    pub changed_file_count: usize,
    pub additions: usize,
    pub deletions: usize,
    pub conflict_files: Vec<String>,
}

impl<C: HookClient> Service<C> {
    /// Merge `head` into `base` using the requested strategy, or - when
    /// no destination ref is supplied - answer "can this be merged"
    /// without writing anything to the target repository.
    pub fn merge(&self, params: &MergeParams) -> Result<MergeOutput, Error> {
        params.validate()?;

        let base_sha = if params.base_sha.is_value() {
            params.base_sha
        } else {
            let ref_name = format!("{}{}", repo::BRANCH_PREFIX, params.base_branch);
            repo::resolve_ref(&params.repo_path, &ref_name)?
        };

        let head_sha = if params.head_sha.is_value() {
            params.head_sha
        } else {
            let ref_name = format!("{}{}", repo::BRANCH_PREFIX, params.head_branch);
            let resolved = repo::resolve_ref(&params.repo_path, &ref_name)?;
            if params.head_expected_sha.is_value() && params.head_expected_sha != resolved {
                return Err(Error::precondition_failed(format!(
                    "head branch {:?} is at {resolved} which does not match expected {}",
                    params.head_branch, params.head_expected_sha
                )));
            }
            resolved
        };

        if base_sha == head_sha {
            return Err(Error::invalid_argument(
                "source and target are the same commit",
            ));
        }

        let merge_base_sha = repo::merge_base(&params.repo_path, &[], base_sha, head_sha)?;
        if head_sha == merge_base_sha {
            return Err(Error::invalid_argument(
                "head branch does not contain any new commits",
            ));
        }

        let stat = repo::diff_short_stat(&params.repo_path, &[], base_sha, head_sha)?;
        let commit_count =
            repo::commit_count(&params.repo_path, &[], Some(base_sha), head_sha)?;

        let mut output = MergeOutput {
            base_sha,
            head_sha,
            merge_base_sha,
            merge_sha: Sha::EMPTY,
            commit_count,
            changed_file_count: stat.files,
            additions: stat.additions,
            deletions: stat.deletions,
            conflict_files: Vec::new(),
        };

        let Some(ref_name) = &params.ref_name else {
            output.conflict_files =
                self.check_conflicts(&params.repo_path, merge_base_sha, base_sha, head_sha)?;
            return Ok(output);
        };

        // the destination's old value is fixed before entering the
        // staging area; a concurrent move surfaces as Conflict later
        let old = match repo::resolve_ref(&params.repo_path, ref_name) {
            Ok(value) => value,
            Err(err) if err.is_not_found() => Sha::nil(),
            Err(err) => return Err(err),
        };

        let author = params.author.as_ref().unwrap_or(&params.committer);
        let mut updater = RefUpdater::new(self.hooks(), &params.repo_path, ref_name.as_str())?;
        let mut outcome = merge::MergeOutcome::default();
        sharedrepo::run(
            &mut updater,
            self.staging_root(),
            &params.repo_path,
            |shared, updater| {
                outcome = params.strategy.apply(
                    shared,
                    &Params {
                        author,
                        committer: &params.committer,
                        message: &params.message,
                        merge_base: merge_base_sha,
                        target: base_sha,
                        source: head_sha,
                    },
                )?;
                if outcome.is_conflicted() {
                    // nothing to update; conflicts are reported as data
                    return Ok(());
                }
                updater.init(old, outcome.merge_sha)
            },
        )?;

        output.merge_sha = outcome.merge_sha;
        output.conflict_files = outcome.conflicts;
        Ok(output)
    }

    fn check_conflicts(
        &self,
        repo_path: &std::path::Path,
        merge_base: Sha,
        target: Sha,
        source: Sha,
    ) -> Result<Vec<String>, Error> {
        let mut shared = SharedRepo::new(self.staging_root(), repo_path)?;
        let result = (|| {
            shared.init(&[])?;
            merge::find_conflicts(&shared, merge_base, target, source)
        })();
        shared.close();
        result
    }
}
