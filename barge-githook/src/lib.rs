/*!
Push-acceptance pipeline.

The application-side half of the hook contract: a [`Controller`] serves
the three hook points of `barge-git`'s reference updater. During
pre-receive it groups the pushed reference updates, guards the default
branch, and runs the policy checks - secret scanning, oversized files,
committer identity, LFS object presence - each of which can veto the
push through the single shared output error. After post-receive it
reports reference events and pull-request suggestions as independent
best-effort side effects.

Veto composition is deterministic: when several checks find violations
in the same pass, the output error is composed in a fixed priority
order (default-branch deletion, secrets, file size, committer mismatch,
LFS) rather than whichever check happened to run last. Messages from
every evaluated check are always appended, so the user sees full
context even on success.

The [`registry::HookRegistry`] is built explicitly by the composition
root and handed to whatever transport dispatches hook invocations;
there is no ambient global registration.
*/

#![forbid(unsafe_code)]

pub mod base;
pub mod checks;
pub mod controller;
pub mod refs;
pub mod registry;
pub mod settings;

pub use controller::{Controller, InProcessHooks, Principal, Repo};
pub use registry::{HookKind, HookRegistry, Invocation};

pub use barge_git::{Error, Kind};
