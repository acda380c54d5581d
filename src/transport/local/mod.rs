// src/transport/local/mod.rs

//! In-process transport implementation.
//!
//! This module implements the domain-level [`Channel`](crate::Channel),
//! [`Server`](crate::Server) and [`Client`](crate::Client) contracts without
//! sockets. Servers register in an [`AddressRegistry`]; a client connecting
//! to an address gets one end of a fresh pair of unbounded queues, and the
//! server's handler runs on the other end in a background accept task.
//!
//! ## Semantics
//!
//! - Messages are passed as in-memory values, never serialized.
//! - For a fixed direction, delivery order is send order.
//! - Closing either endpoint closes both, immediately.
//! - A reader waiting on an empty queue wakes up as soon as the pair closes.
//! - Stopping a server cancels every accept task it is running and closes
//!   every channel it accepted.
//!
//! ## Non-Goals
//!
//! - Cross-process delivery
//! - Flow control: queues are unbounded

mod channel;
mod client;
mod registry;
mod server;

use std::sync::{Mutex, MutexGuard};

pub use channel::LocalChannel;
pub use client::LocalClient;
pub use registry::AddressRegistry;
pub use server::LocalServer;

/// Scheme of every local transport address.
pub const LOCAL_SCHEME: &str = "local";

/// Address a local server binds when its config names none.
pub const DEFAULT_LOCAL_ADDRESS: &str = "local://0";

/// Acquire mutex guard, ignoring poisoning
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
