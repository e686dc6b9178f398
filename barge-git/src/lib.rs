/*!
Server-side git mutation engine.

This crate implements the write path of a git hosting service: every
reference mutation (push, branch, tag, merge, revert, file commit) is
driven through a staged write area and a gated reference updater, so
nothing becomes visible in the target repository before the pre-receive
gate has passed, and the reference write itself rides on git's native
compare-and-swap.

Building blocks, leaf first:

- [`sha::Sha`]: content hash with explicit "unset" and "nil" sentinels.
- [`command`]: builder for git plumbing subprocess invocations.
- [`repo`]: read-side plumbing against a bare repository.
- [`hook`]: hook payloads, the client abstraction, the out-of-process
  contract and the reference-update state machine.
- [`sharedrepo`]: the staged write area, a temporary alternates-linked
  object store.
- [`merge`]: merge, squash and rebase built on the tree-merge primitive.
- [`service`]: the write operations callers invoke.

All work is subprocess- and filesystem-bound, so the crate performs
plain blocking I/O and leaves scheduling to the caller. Consistency
across concurrent requests is delegated to git's reference
compare-and-swap: a losing writer observes `Conflict`, never a silent
overwrite.
*/

#![forbid(unsafe_code)]

pub mod command;
pub mod error;
pub mod hook;
pub mod identity;
pub mod merge;
pub mod repo;
pub mod service;
pub mod sha;
pub mod sharedrepo;

pub use error::{Error, Kind};
pub use identity::{Identity, Signature};
pub use sha::Sha;
