use thiserror::Error;

/// Errors that can stop the controller from opening.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Session(#[from] crate::session::SessionError),

    #[error(transparent)]
    Storage(#[from] crate::storage::StorageError),
}

pub type Result<T> = std::result::Result<T, Error>;
