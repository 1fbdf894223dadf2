use crate::request::RequestError;
use crate::resolver::NotFound;
use sheets::SheetsError;
use thiserror::Error;

/// Errors that can end the handling of a single response.
#[derive(Error, Debug)]
pub enum ResponseError {
    /// Bad or missing query parameters. Always shown to the caller.
    #[error("{0}")]
    Validation(#[from] RequestError),

    /// Missing or malformed credentials.
    #[error("configuration error: {0}")]
    Configuration(SheetsError),

    /// Header, identifier column or row not found.
    #[error("{0}")]
    NotFound(#[from] NotFound),

    /// The store returned no rows at all.
    #[error("Empty sheet")]
    EmptyData,

    /// Network or API failure while reading or writing.
    #[error("transport error: {0}")]
    Transport(SheetsError),
}

impl From<SheetsError> for ResponseError {
    fn from(err: SheetsError) -> Self {
        if err.is_configuration() {
            ResponseError::Configuration(err)
        } else {
            ResponseError::Transport(err)
        }
    }
}

impl ResponseError {
    /// Failures caused by the environment rather than by the data in the sheet.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ResponseError::Configuration(_) | ResponseError::Transport(_)
        )
    }
}

/// Errors that stop the service itself.
#[derive(Error, Debug)]
pub enum ResponderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ValidationError),

    #[error("could not create sheets client: {0}")]
    Sheets(#[from] SheetsError),
}
