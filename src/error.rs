//! Error taxonomy for the bus session client.
//!
//! Only the connection error (and, since we fail fast, a failed name
//! request) is fatal; everything else degrades to a logged diagnostic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    /// The session bus is unreachable. Fatal: the process exits 1.
    #[error("failed to connect to the session bus: {0}")]
    Connection(#[source] zbus::Error),

    /// The RequestName call itself failed (not a reply code we disliked).
    #[error("could not request name {name}: {source}")]
    NameRequest {
        name: String,
        #[source]
        source: zbus::Error,
    },

    /// The ReleaseName call itself failed.
    #[error("could not release name {name}: {source}")]
    Release {
        name: String,
        #[source]
        source: zbus::Error,
    },

    /// The daemon replied with a code outside the documented enumeration.
    #[error("unexpected bus reply code {0}")]
    UnknownReplyCode(u32),
}
