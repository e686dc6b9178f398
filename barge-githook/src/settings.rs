//! Per-repository settings boundary.
//!
//! The pipeline only ever reads four toggles per push; where they are
//! stored is someone else's concern. Implementations of
//! [`SettingsStore`] answer `get(repo, key, default)` lookups; the
//! controller snapshots them once per push into [`PushSettings`].

use std::collections::HashMap;

use barge_git::Error;

/// Keys of the per-repository toggles the pipeline consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    SecretScanningEnabled,
    FileSizeLimit,
    PrincipalCommitterMatch,
    GitLfsEnabled,
}

impl Key {
    pub fn as_str(self) -> &'static str {
        match self {
            Key::SecretScanningEnabled => "secret_scanning_enabled",
            Key::FileSizeLimit => "file_size_limit",
            Key::PrincipalCommitterMatch => "principal_committer_match",
            Key::GitLfsEnabled => "git_lfs_enabled",
        }
    }
}

pub const DEFAULT_SECRET_SCANNING_ENABLED: bool = false;
/// A limit of zero disables the oversize-file check.
pub const DEFAULT_FILE_SIZE_LIMIT: u64 = 0;
pub const DEFAULT_PRINCIPAL_COMMITTER_MATCH: bool = false;
pub const DEFAULT_GIT_LFS_ENABLED: bool = true;

/// Read access to per-repository settings.
pub trait SettingsStore {
    fn get_bool(&self, repo_id: i64, key: Key, default: bool) -> Result<bool, Error>;

    fn get_u64(&self, repo_id: i64, key: Key, default: u64) -> Result<u64, Error>;
}

/// Snapshot of the toggles for one push.
#[derive(Debug, Clone, Copy)]
pub struct PushSettings {
    pub secret_scanning_enabled: bool,
    pub file_size_limit: u64,
    pub principal_committer_match: bool,
    pub git_lfs_enabled: bool,
}

impl PushSettings {
    pub fn load(store: &dyn SettingsStore, repo_id: i64) -> Result<Self, Error> {
        Ok(Self {
            secret_scanning_enabled: store.get_bool(
                repo_id,
                Key::SecretScanningEnabled,
                DEFAULT_SECRET_SCANNING_ENABLED,
            )?,
            file_size_limit: store.get_u64(
                repo_id,
                Key::FileSizeLimit,
                DEFAULT_FILE_SIZE_LIMIT,
            )?,
            principal_committer_match: store.get_bool(
                repo_id,
                Key::PrincipalCommitterMatch,
                DEFAULT_PRINCIPAL_COMMITTER_MATCH,
            )?,
            git_lfs_enabled: store.get_bool(
                repo_id,
                Key::GitLfsEnabled,
                DEFAULT_GIT_LFS_ENABLED,
            )?,
        })
    }
}

/// In-memory store for tests and single-node deployments.
#[derive(Debug, Default, Clone)]
pub struct StaticSettings {
    bools: HashMap<(i64, Key), bool>,
    numbers: HashMap<(i64, Key), u64>,
}

impl StaticSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bool(mut self, repo_id: i64, key: Key, value: bool) -> Self {
        self.bools.insert((repo_id, key), value);
        self
    }

    pub fn set_u64(mut self, repo_id: i64, key: Key, value: u64) -> Self {
        self.numbers.insert((repo_id, key), value);
        self
    }
}

impl SettingsStore for StaticSettings {
    fn get_bool(&self, repo_id: i64, key: Key, default: bool) -> Result<bool, Error> {
        Ok(self.bools.get(&(repo_id, key)).copied().unwrap_or(default))
    }

    fn get_u64(&self, repo_id: i64, key: Key, default: u64) -> Result<u64, Error> {
        Ok(self.numbers.get(&(repo_id, key)).copied().unwrap_or(default))
    }
}
