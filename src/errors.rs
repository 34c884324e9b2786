use crate::query;
use std::{io, net::SocketAddr, path::PathBuf};

/// Reasons a buffered request is rejected.
///
/// None of these produce a response: the connection that carried the request
/// is closed silently.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum ErrorKind {
    #[error("invalid method")]
    InvalidMethod,
    #[error("invalid request target")]
    InvalidUrl,
    #[error("invalid query string: {0}")]
    Query(#[from] query::Error),
    #[error("invalid or unsupported HTTP version")]
    InvalidVersion,

    #[error("invalid header line")]
    InvalidHeader,
    #[error("too many headers")]
    TooManyHeaders,
    #[error("invalid Content-Length")]
    InvalidContentLength,
    #[error("declared body does not fit the request buffer")]
    BodyTooLarge,

    #[error("request head is not valid UTF-8")]
    InvalidEncoding,
    #[error("request exceeds the buffer limit")]
    RequestTooLarge,
}

/// Errors returned by the server control and registration API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("could not resolve `{0}`")]
    Resolve(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("readiness wait failed: {0}")]
    Poll(#[source] io::Error),

    #[error("server has not been started")]
    NotStarted,

    #[error("server is already started")]
    AlreadyStarted,

    #[error("static directory {path:?} is not readable: {source}")]
    StaticDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
