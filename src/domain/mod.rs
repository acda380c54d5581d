//! Domain layer public interface.
//!
//! This module defines abstractions that are independent of any concrete
//! transport: addresses, the channel/server/client contracts, and server
//! configuration.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod address;
mod server_config;
mod transport;

// --- Domain re-exports ---

pub use address::Address;

pub use server_config::ServerConfig;

pub use transport::{
    //
    channel_handler,
    BoxFuture,
    Channel,
    ChannelHandler,
    ChannelInfo,
    ChannelPtr,
    ChannelType,
    Client,
    ClientPtr,
    Server,
    ServerPtr,
};
