use std::io;
use thiserror::Error;

use crate::infrastructure::protocol::WireError;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Failures surfaced by producer and consumer operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("bootstrap broker list is empty")]
    EmptyBootstrapList,

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] WireError),

    /// The broker answered with an in-band error frame; the payload is the
    /// broker's message, lossily decoded for display.
    #[error("broker error: {0}")]
    Broker(String),

    /// The broker answered with a frame that is valid on the wire but wrong
    /// for the request that was sent.
    #[error("unexpected {actual} response to a {expected} request")]
    UnexpectedResponse {
        expected: &'static str,
        actual: &'static str,
    },
}
