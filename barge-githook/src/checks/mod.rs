//! Policy checks evaluated during pre-receive.
//!
//! Each check is independent: it receives the pushed reference updates
//! plus the environment (so it can see staged objects through the
//! alternate directories) and records what it found in the shared
//! [`Violations`] set. A check *finding* something is a normal result;
//! only a failure to *run* a check is an error and aborts the push.
//! Composition of the findings into the single output error happens in
//! the controller, in a fixed priority order.

pub mod committer;
pub mod lfs;
pub mod secrets;
pub mod size;

/// Upper bound on individually reported offenders per category; the
/// true totals are tracked alongside.
pub const MAX_REPORTED: usize = 10;

/// What the checks found during one pre-receive pass.
#[derive(Debug, Clone, Default)]
pub struct Violations {
    pub default_branch_deleted: bool,

    pub secrets: Vec<secrets::Finding>,

    /// Reported offenders, capped at [`MAX_REPORTED`].
    pub oversize_files: Vec<size::OversizeFile>,
    /// True number of oversized blobs.
    pub oversize_total: usize,

    pub committer_mismatches: Vec<committer::Mismatch>,
    pub committer_mismatch_total: usize,

    pub missing_lfs_objects: Vec<String>,
}

impl Violations {
    pub fn any(&self) -> bool {
        self.default_branch_deleted
            || !self.secrets.is_empty()
            || self.oversize_total > 0
            || self.committer_mismatch_total > 0
            || !self.missing_lfs_objects.is_empty()
    }
}
