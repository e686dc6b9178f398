//! Reverting a commit on a branch.
//!
//! A revert is a tree merge run backwards: merging the commit's parent
//! onto the branch tip with the commit itself as merge base yields the
//! tip's tree minus the commit's changes.

use std::path::PathBuf;

use super::Service;
use crate::error::Error;
use crate::hook::{HookClient, RefUpdater};
use crate::identity::Signature;
use crate::repo;
use crate::sha::Sha;
use crate::sharedrepo;

#[derive(Debug, Clone)]
pub struct RevertParams {
    pub repo_path: PathBuf,
    /// Branch name without the `refs/heads/` prefix.
    pub branch_name: String,
    /// The commit whose changes are undone.
    pub commit_sha: Sha,
    pub message: String,
    pub author: Option<Signature>,
    pub committer: Signature,
}

#[derive(Debug, Clone, Default)]
pub struct RevertOutput {
    /// The produced revert commit; unset when conflicts were found.
    pub revert_sha: Sha,
    pub conflict_files: Vec<String>,
}

impl<C: HookClient> Service<C> {
    pub fn revert(&self, params: &RevertParams) -> Result<RevertOutput, Error> {
        if params.branch_name.is_empty() {
            return Err(Error::invalid_argument("branch name must not be empty"));
        }
        if !params.commit_sha.is_value() {
            return Err(Error::invalid_argument("commit SHA is mandatory"));
        }
        let ref_name = format!("{}{}", repo::BRANCH_PREFIX, params.branch_name);

        let tip = repo::resolve_ref(&params.repo_path, &ref_name).map_err(|err| {
            if err.is_not_found() {
                Error::not_found(format!("branch {:?} not found", params.branch_name))
            } else {
                err
            }
        })?;

        let commit = repo::read_commit(&params.repo_path, &[], &params.commit_sha.to_string())?;
        let &[parent] = commit.parents.as_slice() else {
            return Err(Error::invalid_argument(
                "only commits with exactly one parent can be reverted",
            ));
        };

        let author = params.author.as_ref().unwrap_or(&params.committer);
        let mut updater = RefUpdater::new(self.hooks(), &params.repo_path, ref_name.as_str())?;
        let mut output = RevertOutput::default();
        sharedrepo::run(
            &mut updater,
            self.staging_root(),
            &params.repo_path,
            |shared, updater| {
                let (tree, conflicts) = shared.merge_tree(params.commit_sha, tip, parent)?;
                if !conflicts.is_empty() {
                    output.conflict_files = conflicts;
                    return Ok(());
                }
                output.revert_sha = shared.commit_tree(
                    author,
                    &params.committer,
                    tree,
                    &params.message,
                    &[tip],
                )?;
                updater.init(tip, output.revert_sha)
            },
        )?;

        Ok(output)
    }
}
