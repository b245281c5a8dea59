//! Error types for relay operations

use std::io;

/// Errors surfaced to callers of the relay API
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The listener could not attach to the channel's port
    #[error("failed to bind relay listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Check whether an error is an ordinary peer disconnect.
///
/// Walks the source chain looking for a connection reset, a broken pipe, or a
/// body cut short by the peer closing the connection. These are expected on a
/// live relay and are not reported as failures.
pub fn is_disconnect(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);

    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        if let Some(hyper_err) = err.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() {
                return true;
            }
        }
        current = err.source();
    }

    false
}
