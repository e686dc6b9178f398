//! Generic reference updates.

use std::path::PathBuf;

use super::Service;
use crate::error::Error;
use crate::hook::{HookClient, RefUpdater};
use crate::sha::Sha;

/// Parameters for a raw reference update.
///
/// `old` empty means "resolve the current value"; `new` empty or nil
/// means deletion.
#[derive(Debug, Clone)]
pub struct UpdateRefParams {
    pub repo_path: PathBuf,
    pub ref_name: String,
    pub old: Sha,
    pub new: Sha,
}

impl<C: HookClient> Service<C> {
    /// Apply one reference update, gated by the hooks.
    pub fn update_ref(&self, params: &UpdateRefParams) -> Result<(), Error> {
        let mut updater = RefUpdater::new(self.hooks(), &params.repo_path, params.ref_name.as_str())?;
        updater.run(params.old, params.new, &[])
    }
}
