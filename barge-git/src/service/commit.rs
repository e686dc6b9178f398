//! Committing file changes to a branch.

use std::path::PathBuf;

use super::Service;
use crate::error::Error;
use crate::hook::{HookClient, RefUpdater};
use crate::identity::Signature;
use crate::repo;
use crate::sha::Sha;
use crate::sharedrepo::{self, FILE_MODE};

/// One staged change within a file commit.
#[derive(Debug, Clone)]
pub enum FileAction {
    Create {
        path: String,
        payload: Vec<u8>,
    },
    Update {
        path: String,
        payload: Vec<u8>,
        /// When set, the file must still be at this blob.
        expected_sha: Sha,
    },
    Delete {
        path: String,
    },
    Move {
        path: String,
        new_path: String,
        /// Replacement content; `None` moves the blob as-is.
        payload: Option<Vec<u8>>,
        expected_sha: Sha,
    },
}

#[derive(Debug, Clone)]
pub struct CommitFilesParams {
    pub repo_path: PathBuf,
    /// Branch name without the `refs/heads/` prefix. Created on the fly
    /// in an empty repository.
    pub branch_name: String,
    pub message: String,
    pub author: Signature,
    pub committer: Signature,
    pub actions: Vec<FileAction>,
}

#[derive(Debug, Clone)]
pub struct CommitFilesOutput {
    pub commit_sha: Sha,
}

impl<C: HookClient> Service<C> {
    /// Apply file actions on top of a branch tip and commit the result.
    ///
    /// The whole tree is built in a staged write area; the branch moves
    /// only after the pre-receive gate has seen the new commit.
    pub fn commit_files(&self, params: &CommitFilesParams) -> Result<CommitFilesOutput, Error> {
        if params.branch_name.is_empty() {
            return Err(Error::invalid_argument("branch name must not be empty"));
        }
        if params.actions.is_empty() {
            return Err(Error::invalid_argument(
                "at least one file action is required",
            ));
        }
        let ref_name = format!("{}{}", repo::BRANCH_PREFIX, params.branch_name);

        // nil means the branch does not exist yet (new branch or empty
        // repository) and the commit is created without a parent
        let old = match repo::resolve_ref(&params.repo_path, &ref_name) {
            Ok(value) => value,
            Err(err) if err.is_not_found() => Sha::nil(),
            Err(err) => return Err(err),
        };

        let mut updater = RefUpdater::new(self.hooks(), &params.repo_path, ref_name.as_str())?;
        let mut commit_sha = Sha::EMPTY;
        sharedrepo::run(
            &mut updater,
            self.staging_root(),
            &params.repo_path,
            |shared, updater| {
                let parent = if old.is_nil() { Sha::EMPTY } else { old };
                if parent.is_empty() {
                    shared.clear_index()?;
                } else {
                    shared.set_index(parent)?;
                }

                for action in &params.actions {
                    apply_action(shared, parent, action)?;
                }

                let tree = shared.write_tree()?;
                let parents: Vec<Sha> = parent.is_value().then_some(parent).into_iter().collect();
                commit_sha = shared.commit_tree(
                    &params.author,
                    &params.committer,
                    tree,
                    &params.message,
                    &parents,
                )?;
                updater.init(old, commit_sha)
            },
        )?;

        Ok(CommitFilesOutput { commit_sha })
    }
}

fn apply_action(
    shared: &sharedrepo::SharedRepo,
    parent: Sha,
    action: &FileAction,
) -> Result<(), Error> {
    match action {
        FileAction::Create { path, payload } => {
            shared.create_file(parent, path, FILE_MODE, payload)?;
        }
        FileAction::Update {
            path,
            payload,
            expected_sha,
        } => {
            shared.update_file(parent, path, *expected_sha, FILE_MODE, payload)?;
        }
        FileAction::Delete { path } => {
            shared.delete_file(path)?;
        }
        FileAction::Move {
            path,
            new_path,
            payload,
            expected_sha,
        } => {
            shared.move_file(
                parent,
                path,
                *expected_sha,
                FILE_MODE,
                new_path,
                payload.as_deref(),
            )?;
        }
    }
    Ok(())
}
