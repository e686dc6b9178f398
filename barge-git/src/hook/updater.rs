//! The reference-update state machine.
//!
//! Sequencing is the point: resolve the old value, fix the new value,
//! run the pre-receive gate, perform git's own compare-and-swap
//! reference write, then notify post-receive. Each transition may be
//! entered exactly once and only from its required source state;
//! calling a step out of order is a programming error and fails
//! immediately without retry.
//!
//! The split into separate calls exists for callers that build the new
//! object graph between `init` and `pre` (merges, file commits, tag
//! objects): they get old-value resolution for free while the
//! gate-then-write-then-notify ordering stays impossible to skip.

use std::path::{Path, PathBuf};

use super::{
    Environment, HookClient, PostReceiveInput, PreReceiveInput, ReferenceUpdate,
};
use crate::command::Command;
use crate::error::Error;
use crate::repo;
use crate::sha::Sha;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    InitOld,
    InitNew,
    Pre,
    Update,
    Post,
    Done,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::InitOld => "init-old",
            State::InitNew => "init-new",
            State::Pre => "pre",
            State::Update => "update",
            State::Post => "post",
            State::Done => "done",
        }
    }
}

/// One-shot driver for a single reference mutation.
///
/// Constructed per mutation, never reused and never shared. Once a step
/// fails the machine is stuck; the caller must discard it together with
/// anything it staged.
pub struct RefUpdater<'a> {
    hooks: &'a dyn HookClient,
    repo_path: PathBuf,
    ref_name: String,
    old: Sha,
    new: Sha,
    state: State,
    messages: Vec<String>,
}

impl<'a> RefUpdater<'a> {
    pub fn new(
        hooks: &'a dyn HookClient,
        repo_path: impl Into<PathBuf>,
        ref_name: impl Into<String>,
    ) -> Result<Self, Error> {
        let ref_name = ref_name.into();
        if ref_name.is_empty() {
            return Err(Error::invalid_argument("reference name must not be empty"));
        }
        Ok(Self {
            hooks,
            repo_path: repo_path.into(),
            ref_name,
            old: Sha::EMPTY,
            new: Sha::EMPTY,
            state: State::InitOld,
            messages: Vec::new(),
        })
    }

    pub fn ref_name(&self) -> &str {
        &self.ref_name
    }

    pub fn old(&self) -> Sha {
        self.old
    }

    pub fn new_value(&self) -> Sha {
        self.new
    }

    /// Advisory messages collected from hook output so far.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// True once both the old and the new value have been fixed.
    pub fn is_initialized(&self) -> bool {
        !matches!(self.state, State::InitOld | State::InitNew)
    }

    fn expect_state(&self, want: State, transition: &str) -> Result<(), Error> {
        if self.state != want {
            return Err(Error::internal(format!(
                "reference updater for {:?} received {transition} in state {:?}, expected {:?}",
                self.ref_name,
                self.state.name(),
                want.name(),
            )));
        }
        Ok(())
    }

    /// Fix the expected old value.
    ///
    /// An empty value is resolved by reading the reference from the
    /// repository; a reference that does not exist resolves to nil.
    pub fn init_old(&mut self, old: Sha) -> Result<(), Error> {
        self.expect_state(State::InitOld, "init_old")?;
        let resolved = if old.is_empty() {
            match repo::resolve_ref(&self.repo_path, &self.ref_name) {
                Ok(value) => value,
                Err(err) if err.is_not_found() => Sha::nil(),
                Err(err) => return Err(err),
            }
        } else {
            old
        };
        tracing::debug!(ref_name = %self.ref_name, old = %resolved, "resolved old reference value");
        self.old = resolved;
        self.state = State::InitNew;
        Ok(())
    }

    /// Fix the desired new value. An empty value means deletion.
    pub fn init_new(&mut self, new: Sha) -> Result<(), Error> {
        self.expect_state(State::InitNew, "init_new")?;
        self.new = if new.is_empty() { Sha::nil() } else { new };
        tracing::debug!(ref_name = %self.ref_name, new = %self.new, "fixed new reference value");
        self.state = State::Pre;
        Ok(())
    }

    /// Convenience for `init_old` followed by `init_new`.
    pub fn init(&mut self, old: Sha, new: Sha) -> Result<(), Error> {
        self.init_old(old)?;
        self.init_new(new)
    }

    /// Run the pre-receive gate.
    ///
    /// `alternate_dirs` makes staged-but-not-yet-moved objects visible
    /// to the hook. A veto fails with `PreconditionFailed` and the
    /// machine does not advance: the caller must treat this as terminal
    /// and discard everything staged.
    pub fn pre(&mut self, alternate_dirs: &[PathBuf]) -> Result<(), Error> {
        self.expect_state(State::Pre, "pre")?;
        if self.old.is_empty() && self.new.is_nil() {
            return Err(Error::not_found(format!(
                "reference {:?} not found",
                self.ref_name
            )));
        }
        if self.old.is_nil() && self.new.is_nil() {
            return Err(Error::invalid_argument(format!(
                "reference {:?} does not exist, nothing to delete",
                self.ref_name
            )));
        }

        let input = PreReceiveInput {
            ref_updates: vec![self.reference_update()],
            environment: Environment {
                alternate_object_dirs: alternate_dirs.to_vec(),
            },
        };
        let output = self.hooks.pre_receive(input)?;
        self.messages.extend(output.messages);
        if let Some(message) = output.error {
            return Err(Error::precondition_failed(message));
        }
        self.state = State::Update;
        Ok(())
    }

    /// Perform the native reference write.
    ///
    /// Both the old and the new value are handed to `update-ref`, so
    /// git itself enforces compare-and-swap: if the reference moved
    /// since the old value was resolved, the write fails as `Conflict`.
    pub fn update_ref(&mut self) -> Result<(), Error> {
        self.expect_state(State::Update, "update_ref")?;

        let mut cmd = if self.new.is_nil() {
            Command::new("update-ref").flag("-d").arg(&*self.ref_name)
        } else {
            Command::new("update-ref")
                .arg(&*self.ref_name)
                .arg(self.new.to_string())
        };
        if !self.old.is_empty() {
            cmd = cmd.arg(self.old.to_string());
        }

        if let Err(err) = cmd.run(&self.repo_path) {
            let stderr = err.stderr();
            if stderr.contains("already exists")
                || stderr.contains("but expected")
                || stderr.contains("cannot lock ref")
            {
                return Err(Error::conflict(format!(
                    "reference {:?} changed concurrently: {stderr}",
                    self.ref_name
                )));
            }
            if stderr.contains("unable to resolve reference") {
                return Err(Error::not_found(format!(
                    "reference {:?} not found",
                    self.ref_name
                )));
            }
            return Err(Error::git(
                format!("failed to update reference {:?}", self.ref_name),
                err,
            ));
        }

        tracing::debug!(
            ref_name = %self.ref_name,
            old = %self.old,
            new = %self.new,
            "updated reference"
        );
        self.state = State::Post;
        Ok(())
    }

    /// Notify post-receive.
    ///
    /// A hook-reported error is returned, but the already-committed
    /// reference update is never rolled back: by now the mutation is
    /// visible and post-receive is a notification point, not a gate.
    pub fn post(&mut self, alternate_dirs: &[PathBuf]) -> Result<(), Error> {
        self.expect_state(State::Post, "post")?;
        let input = PostReceiveInput {
            ref_updates: vec![self.reference_update()],
            environment: Environment {
                alternate_object_dirs: alternate_dirs.to_vec(),
            },
        };
        let output = self.hooks.post_receive(input)?;
        self.messages.extend(output.messages);
        self.state = State::Done;
        if let Some(message) = output.error {
            return Err(Error::internal(format!(
                "post-receive hook failed: {message}"
            )));
        }
        Ok(())
    }

    /// Drive the full sequence, stopping at the first failure.
    pub fn run(&mut self, old: Sha, new: Sha, alternate_dirs: &[PathBuf]) -> Result<(), Error> {
        self.init(old, new)?;
        self.pre(alternate_dirs)?;
        self.update_ref()?;
        self.post(alternate_dirs)
    }

    fn reference_update(&self) -> ReferenceUpdate {
        ReferenceUpdate {
            ref_name: self.ref_name.clone(),
            old: self.old,
            new: self.new,
        }
    }
}
