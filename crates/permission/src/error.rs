//! Permission error types.

use thiserror::Error;

/// Permission errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A plugin, feature, id or permission value was malformed.
    ///
    /// Always a caller bug; never retried.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The permission tables could not be created.
    #[error("failed to create permission tables: {0}")]
    Init(#[source] storage::Error),

    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] storage::Error),

    /// The service was used before `init`.
    #[error("permission store is not initialized")]
    Uninitialized,

    /// `init` was called on an initialized service.
    #[error("permission store is already initialized")]
    AlreadyInitialized,

    /// A management command was malformed or refused.
    #[error("{0}")]
    Command(String),
}

pub type Result<T> = std::result::Result<T, Error>;
