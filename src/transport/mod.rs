//! Transport implementations.
//!
//! This module provides concrete implementations of the domain-level
//! `Channel`, `Server` and `Client` traits. Each transport is reached
//! through the constructor functions it installs in a
//! [`TransportFactory`](crate::TransportFactory).
//!
//! Domain code must not depend on transport-specific types.

mod local;

pub use local::{
    //
    AddressRegistry,
    LocalChannel,
    LocalClient,
    LocalServer,
    DEFAULT_LOCAL_ADDRESS,
    LOCAL_SCHEME,
};
