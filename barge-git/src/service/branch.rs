//! Branch creation and deletion.

use std::path::PathBuf;

use super::Service;
use crate::error::Error;
use crate::hook::{HookClient, RefUpdater};
use crate::repo;
use crate::sha::Sha;

#[derive(Debug, Clone)]
pub struct CreateBranchParams {
    pub repo_path: PathBuf,
    /// Branch name without the `refs/heads/` prefix.
    pub branch_name: String,
    /// Revision the new branch should point at.
    pub target: String,
}

#[derive(Debug, Clone)]
pub struct DeleteBranchParams {
    pub repo_path: PathBuf,
    pub branch_name: String,
    /// When set, the branch must still be at this value.
    pub expected_sha: Sha,
}

/// A branch as returned from create.
#[derive(Debug, Clone)]
pub struct Branch {
    pub name: String,
    pub sha: Sha,
}

fn validate_branch_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::invalid_argument("branch name must not be empty"));
    }
    if name.starts_with("refs/") {
        return Err(Error::invalid_argument(
            "branch name must not carry a refs/ prefix",
        ));
    }
    Ok(())
}

impl<C: HookClient> Service<C> {
    /// Create a branch pointing at an existing revision.
    ///
    /// The branch must not exist; the updater's nil old value makes git
    /// itself reject a concurrent creation.
    pub fn create_branch(&self, params: &CreateBranchParams) -> Result<Branch, Error> {
        validate_branch_name(&params.branch_name)?;
        let ref_name = format!("{}{}", repo::BRANCH_PREFIX, params.branch_name);

        let target = repo::rev_parse(&params.repo_path, &[], &params.target).map_err(|err| {
            if err.is_not_found() {
                Error::not_found(format!("target revision {:?} not found", params.target))
            } else {
                err
            }
        })?;

        match repo::resolve_ref(&params.repo_path, &ref_name) {
            Ok(_) => {
                return Err(Error::conflict(format!(
                    "branch {:?} already exists",
                    params.branch_name
                )))
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        let mut updater = RefUpdater::new(self.hooks(), &params.repo_path, ref_name.as_str())?;
        updater.run(Sha::nil(), target, &[])?;

        Ok(Branch {
            name: params.branch_name.clone(),
            sha: target,
        })
    }

    /// Delete a branch, compare-and-swapped against its current value.
    pub fn delete_branch(&self, params: &DeleteBranchParams) -> Result<(), Error> {
        validate_branch_name(&params.branch_name)?;
        let ref_name = format!("{}{}", repo::BRANCH_PREFIX, params.branch_name);

        let current = repo::resolve_ref(&params.repo_path, &ref_name).map_err(|err| {
            if err.is_not_found() {
                Error::not_found(format!("branch {:?} not found", params.branch_name))
            } else {
                err
            }
        })?;

        if params.expected_sha.is_value() && params.expected_sha != current {
            return Err(Error::precondition_failed(format!(
                "branch {:?} is at {current} which does not match expected {}",
                params.branch_name, params.expected_sha
            )));
        }

        let mut updater = RefUpdater::new(self.hooks(), &params.repo_path, ref_name.as_str())?;
        updater.run(current, Sha::nil(), &[])
    }
}
