// src/domain/transport.rs

//! Transport domain abstractions.
//!
//! This module defines the interface the messaging runtime uses to talk to
//! any transport: a [`Channel`] carrying messages between two endpoints, a
//! [`Server`] accepting channels at an address, and a [`Client`] that
//! connects to one. Routing and actor-dispatch code is written against these
//! traits only, so it does not care whether the peer lives in the same
//! process or across a socket.
//!
//! Concrete implementations live under `src/transport/`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{Address, Result};

/// Boxed, sendable future used by type-erased handlers and constructors.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Kind of link a channel runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    /// Both endpoints live in the same process.
    Local,
    /// Endpoints live in different processes on the same host.
    Ipc,
    /// Endpoints live on different hosts.
    Remote,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        let name = match self {
            ChannelType::Local => "local",
            ChannelType::Ipc => "ipc",
            ChannelType::Remote => "remote",
        };
        f.write_str(name)
    }
}

/// Summary of a channel used for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Link kind.
    pub channel_type: ChannelType,
    /// Address of the endpoint this channel belongs to, if known.
    pub local_address: Option<Address>,
    /// Address of the peer endpoint, if known.
    pub dest_address: Option<Address>,
}

impl fmt::Display for ChannelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        let show = |address: &Option<Address>| {
            address
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        write!(
            f,
            "{} channel {} -> {}",
            self.channel_type,
            show(&self.local_address),
            show(&self.dest_address)
        )
    }
}

/// Bidirectional, message-oriented pipe between two endpoints.
///
/// For a fixed direction, messages arrive in the order they were sent.
/// Closing either endpoint closes the pair; after that `send` and `recv`
/// fail with [`Error::ChannelClosed`](crate::Error::ChannelClosed).
#[async_trait::async_trait]
pub trait Channel<M>: Send + Sync
where
    M: Send + 'static,
{
    // ---
    /// Kind of link this channel runs over.
    fn channel_type(&self) -> ChannelType;

    /// Address of this endpoint, if known.
    fn local_address(&self) -> Option<&Address>;

    /// Address of the peer endpoint, if known.
    fn dest_address(&self) -> Option<&Address>;

    /// Send a message to the peer endpoint.
    async fn send(&self, message: M) -> Result<()>;

    /// Receive the next message from the peer endpoint.
    ///
    /// Returns `Ok(None)` when the channel closes while waiting: nothing more
    /// will ever arrive.
    async fn recv(&self) -> Result<Option<M>>;

    /// Close the channel. Closing twice is not an error.
    async fn close(&self) -> Result<()>;

    /// Whether the channel (either endpoint) has been closed.
    fn is_closed(&self) -> bool;

    /// Diagnostic summary of this endpoint.
    fn info(&self) -> ChannelInfo {
        ChannelInfo {
            channel_type: self.channel_type(),
            local_address: self.local_address().cloned(),
            dest_address: self.dest_address().cloned(),
        }
    }
}

/// Shared channel pointer handed to connection handlers.
pub type ChannelPtr<M> = Arc<dyn Channel<M>>;

/// Address-bound acceptor of channels.
#[async_trait::async_trait]
pub trait Server<M>: Send + Sync
where
    M: Send + 'static,
{
    // ---
    /// Address the server is bound to.
    fn address(&self) -> &Address;

    /// Kind of channel this server accepts.
    fn channel_type(&self) -> ChannelType;

    /// Begin accepting connections.
    async fn start(&self) -> Result<()>;

    /// Wait until the server stops, or until `timeout` elapses.
    ///
    /// Elapsing the timeout is not an error; the call simply returns.
    async fn join(&self, timeout: Option<Duration>);

    /// Stop the server. Stopping twice is not an error.
    async fn stop(&self) -> Result<()>;

    /// Whether the server has been stopped.
    fn is_stopped(&self) -> bool;
}

/// Shared server pointer.
pub type ServerPtr<M> = Arc<dyn Server<M>>;

/// Initiator of a connection, owning one endpoint of a channel pair.
#[async_trait::async_trait]
pub trait Client<M>: Send + Sync
where
    M: Send + 'static,
{
    // ---
    /// Address the client connected from, if given.
    fn local_address(&self) -> Option<&Address>;

    /// Address the client connected to.
    fn dest_address(&self) -> &Address;

    /// The client's endpoint of the channel pair.
    fn channel(&self) -> ChannelPtr<M>;

    /// Send a message over the client's channel.
    async fn send(&self, message: M) -> Result<()> {
        self.channel().send(message).await
    }

    /// Receive a message from the client's channel.
    async fn recv(&self) -> Result<Option<M>> {
        self.channel().recv().await
    }

    /// Close the connection. Closing twice is not an error.
    async fn close(&self) -> Result<()>;

    /// Whether the client's channel has been closed.
    fn is_closed(&self) -> bool {
        self.channel().is_closed()
    }
}

/// Owned client pointer.
pub type ClientPtr<M> = Box<dyn Client<M>>;

/// Type-erased connection handler.
///
/// Invoked once per accepted connection with the server-side channel and the
/// cancellation token of the accept task running it. The token fires when the
/// server stops or the client closes; handlers that need to clean up should
/// watch it (or the channel's closed state) themselves.
pub type ChannelHandler<M> =
    Arc<dyn Fn(ChannelPtr<M>, CancellationToken) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Wrap an async function into a [`ChannelHandler`].
///
/// ```
/// use mom_local::{channel_handler, Channel, ChannelHandler, ChannelPtr};
///
/// let echo: ChannelHandler<String> = channel_handler(|channel: ChannelPtr<String>, _cancel| async move {
///     while let Some(message) = channel.recv().await? {
///         channel.send(message).await?;
///     }
///     Ok(())
/// });
/// ```
pub fn channel_handler<M, F, Fut>(handler: F) -> ChannelHandler<M>
where
    M: Send + 'static,
    F: Fn(ChannelPtr<M>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    // ---
    Arc::new(move |channel: ChannelPtr<M>, cancel: CancellationToken| {
        let fut = handler(channel, cancel);
        Box::pin(fut) as BoxFuture<'static, Result<()>>
    })
}
