//! Error taxonomy for the mutation pipeline.
//!
//! Every fallible operation in this crate returns [`Error`]. The
//! [`Kind`] classification is the stable programmatic surface: callers
//! branch on it to tell user-level failures (bad input, lost races,
//! vetoed pushes) apart from internal faults (subprocess or filesystem
//! failures).

use crate::command::CommandError;

/// Stable high-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A reference or object that was asked for does not exist.
    NotFound,
    /// A compare-and-swap reference write lost a race, or a reference
    /// that must not exist already does.
    Conflict,
    /// Caller-supplied values are structurally wrong.
    InvalidArgument,
    /// The pre-receive gate vetoed the operation, or an expected-SHA
    /// guard did not match.
    PreconditionFailed,
    /// Subprocess failures, filesystem failures, parse faults and
    /// programming errors. Not retried automatically.
    Internal,
}

/// Error type for all operations provided by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    PreconditionFailed(String),

    /// A git subprocess failed; carries the operation context.
    #[error("{context}: {source}")]
    Git {
        context: String,
        #[source]
        source: CommandError,
    },

    /// A filesystem operation failed; carries the operation context.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Fast classification helper returning the stable error kind.
    pub fn kind(&self) -> Kind {
        match self {
            Error::NotFound(_) => Kind::NotFound,
            Error::Conflict(_) => Kind::Conflict,
            Error::InvalidArgument(_) => Kind::InvalidArgument,
            Error::PreconditionFailed(_) => Kind::PreconditionFailed,
            Error::Git { .. } | Error::Io { .. } | Error::Internal(_) => Kind::Internal,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Error::Conflict(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Error::PreconditionFailed(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }

    pub fn git(context: impl Into<String>, source: CommandError) -> Self {
        Error::Git {
            context: context.into(),
            source,
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == Kind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == Kind::Conflict
    }
}
