use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("call failed: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("no book in response to {0}")]
    MissingBook(&'static str),
}
