//! In-process transport for actor-style messaging runtimes
//!
//! This library lets endpoints that live in the same process talk through the
//! same connect / send / receive / close interface a network transport
//! offers, so routing and actor-dispatch code never needs to know whether a
//! peer is local. It handles the paired-queue channel, the address registry,
//! connection establishment, and close/cancellation propagation across both
//! ends of a connection.
//!

// Import all sub modules once...
mod macros;

mod connection_id;
mod domain;
mod error;
mod transport;
mod transport_factory;

pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

// Re-export main types
pub use connection_id::ConnectionId;
pub use error::{Error, Result};

pub use transport::{
    //
    AddressRegistry,
    LocalChannel,
    LocalClient,
    LocalServer,
    DEFAULT_LOCAL_ADDRESS,
    LOCAL_SCHEME,
};

pub use transport_factory::{
    //
    ClientConstructor,
    ServerConstructor,
    TransportFactory,
    TransportFactoryBuilder,
};

// --- public re-exports
pub use domain::{
    //
    channel_handler,
    Address,
    BoxFuture,
    Channel,
    ChannelHandler,
    ChannelInfo,
    ChannelPtr,
    ChannelType,
    Client,
    ClientPtr,
    Server,
    ServerConfig,
    ServerPtr,
};

// Token type handed to connection handlers.
pub use tokio_util::sync::CancellationToken;
