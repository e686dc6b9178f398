//! Hook payloads, the client abstraction and the reference updater.
//!
//! Three hook points gate and observe every reference mutation:
//!
//! - `pre-receive`: runs once with all reference updates before
//!   anything changes, and is the only point that can veto.
//! - `update`: runs per reference before that one reference changes.
//! - `post-receive`: runs once after all references changed; it is a
//!   notification point, not a gate.
//!
//! [`HookClient`] abstracts over in-process implementations and
//! out-of-process hook scripts (see [`external`]); the
//! [`updater::RefUpdater`] state machine drives the mutation sequence
//! around these calls.

pub mod env;
pub mod external;
pub mod stdin;
pub mod updater;

pub use external::{ScriptHookConfig, ScriptHooks};
pub use updater::RefUpdater;

use std::path::PathBuf;

use crate::error::Error;
use crate::sha::Sha;

/// One atomic change to one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReferenceUpdate {
    /// Full reference name, e.g. `refs/heads/main`.
    pub ref_name: String,
    /// The expected current value; nil if the reference does not exist.
    pub old: Sha,
    /// The desired value; nil deletes the reference.
    pub new: Sha,
}

/// Staged object directories that must be visible to git subprocesses
/// during the hook window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Environment {
    pub alternate_object_dirs: Vec<PathBuf>,
}

/// Result of a hook invocation.
///
/// `messages` are advisory and always shown to the user regardless of
/// outcome. A non-`None` `error` vetoes the operation; it is the single
/// channel by which any check can reject a push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Output {
    pub messages: Vec<String>,
    pub error: Option<String>,
}

impl Output {
    pub fn is_vetoed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PreReceiveInput {
    pub ref_updates: Vec<ReferenceUpdate>,
    pub environment: Environment,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UpdateInput {
    pub ref_update: ReferenceUpdate,
    pub environment: Environment,
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PostReceiveInput {
    pub ref_updates: Vec<ReferenceUpdate>,
    pub environment: Environment,
}

/// Client for the three hook callbacks.
///
/// Implementations may call straight into the hosting application or
/// spawn the repository's server-side hook scripts. A returned `Err`
/// means the hook could not be invoked; a veto is a normal `Ok` result
/// with [`Output::error`] set.
pub trait HookClient {
    fn pre_receive(&self, input: PreReceiveInput) -> Result<Output, Error>;

    fn update(&self, input: UpdateInput) -> Result<Output, Error>;

    fn post_receive(&self, input: PostReceiveInput) -> Result<Output, Error>;
}

/// Client that allows everything; for repositories without hooks and
/// for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl HookClient for NoopHooks {
    fn pre_receive(&self, _input: PreReceiveInput) -> Result<Output, Error> {
        Ok(Output::default())
    }

    fn update(&self, _input: UpdateInput) -> Result<Output, Error> {
        Ok(Output::default())
    }

    fn post_receive(&self, _input: PostReceiveInput) -> Result<Output, Error> {
        Ok(Output::default())
    }
}
