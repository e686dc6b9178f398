//! The write operations callers invoke.
//!
//! Every operation here follows the same shape: resolve what exists,
//! stage new objects in a [`SharedRepo`](crate::sharedrepo::SharedRepo)
//! when any are needed, then drive the change through the
//! [`RefUpdater`](crate::hook::RefUpdater) so the pre-receive gate,
//! the compare-and-swap write and the post-receive notification happen
//! in order on every path.

mod branch;
mod commit;
mod merge;
mod refs;
mod revert;
mod tag;

pub use branch::{Branch, CreateBranchParams, DeleteBranchParams};
pub use commit::{CommitFilesOutput, CommitFilesParams, FileAction};
pub use merge::{MergeOutput, MergeParams};
pub use refs::UpdateRefParams;
pub use revert::{RevertOutput, RevertParams};
pub use tag::{CreateTagParams, DeleteTagParams, Tag};

use std::path::PathBuf;

use crate::hook::HookClient;

/// Entry point for all mutating operations against bare repositories.
pub struct Service<C> {
    staging_root: PathBuf,
    hooks: C,
}

impl<C: HookClient> Service<C> {
    /// `staging_root` is where staged write areas are created; it is
    /// shared across operations and should live on the same filesystem
    /// as the repositories so object migration can rename instead of
    /// copy.
    pub fn new(staging_root: impl Into<PathBuf>, hooks: C) -> Self {
        Self {
            staging_root: staging_root.into(),
            hooks,
        }
    }

    pub(crate) fn staging_root(&self) -> &PathBuf {
        &self.staging_root
    }

    pub(crate) fn hooks(&self) -> &(dyn HookClient + '_) {
        &self.hooks
    }
}
