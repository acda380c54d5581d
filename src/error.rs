use thiserror::Error;

/// Errors that can occur on the in-process transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Operation attempted on a channel whose pair has been closed
    #[error("channel already closed")]
    ChannelClosed,

    /// Connection accepted by a server that has already stopped
    #[error("server already closed: {0}")]
    ServerClosed(String),

    /// Address does not carry the scheme required by the transport
    #[error("address should start with \"{expected}://\", got {address}")]
    AddressSchemeMismatch {
        /// Scheme the transport accepts.
        expected: String,
        /// Offending address.
        address: String,
    },

    /// Address is not of the form `<scheme>://<token>`
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// No live server is registered at the destination address
    #[error("no server registered at {0}; it needs to be created before connecting")]
    ServerNotFound(String),

    /// A server exists at the destination address but has been stopped
    #[error("connection refused: server at {0} is stopped")]
    ConnectionRefused(String),

    /// Server creation got configuration keys the transport does not understand
    #[error("unexpected configuration: {0}")]
    UnexpectedConfiguration(String),

    /// No transport is registered for the address scheme
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, Error>;
