use std::error::Error as StdError;
use std::io;

use crate::retry::Transient;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network-level failure worth retrying (refused, reset, timed out).
    #[error("connection failed: {0}")]
    Connection(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("malformed feed: {0}")]
    Feed(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if is_connectivity_failure(&err) {
            Error::Connection(err)
        } else {
            Error::Http(err)
        }
    }
}

impl Transient for Error {
    fn is_transient(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

fn is_connectivity_failure(err: &reqwest::Error) -> bool {
    if err.is_connect() || err.is_timeout() {
        return true;
    }

    // A reset or hang-up mid-exchange surfaces as a plain request/body error
    // wrapping the io or hyper error
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() || hyper_err.is_closed() || hyper_err.is_canceled() {
                return true;
            }
        }
        source = cause.source();
    }
    false
}
