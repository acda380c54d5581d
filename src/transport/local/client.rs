// src/transport/local/client.rs

//! Local client: connects to a [`LocalServer`](crate::LocalServer) in the same process.

use std::sync::{Arc, Mutex};

use super::registry::{AddressRegistry, Resolved};
use super::server::AcceptTask;
use super::{lock_ignore_poison, LocalChannel, LOCAL_SCHEME};

#[allow(unused_imports)]
use crate::{
    // ---
    log_debug,
    Address,
    Channel,
    ChannelPtr,
    Client,
    ConnectionId,
    Error,
    Result,
};

/// Client end of an in-process connection.
///
/// Owns the client-side channel endpoint and the accept task its connection
/// started on the server. Closing the client closes the channel pair and
/// cancels that task.
///
/// # Example
///
/// ```
/// use mom_local::{
///     channel_handler, AddressRegistry, Channel, ChannelPtr, Client, LocalClient, LocalServer, ServerConfig,
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> mom_local::Result<()> {
/// let registry = AddressRegistry::<String>::new();
///
/// let echo = channel_handler(|channel: ChannelPtr<String>, _cancel| async move {
///     while let Some(message) = channel.recv().await? {
///         channel.send(message).await?;
///     }
///     Ok(())
/// });
/// LocalServer::create(&registry, ServerConfig::new(echo).with_address("local://echo")).await?;
///
/// let client = LocalClient::connect(&registry, "local://echo", None).await?;
/// client.send("ping".to_string()).await?;
/// assert_eq!(client.recv().await?, Some("ping".to_string()));
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct LocalClient<M> {
    // ---
    local_address: Option<Address>,
    dest_address: Address,
    channel: Arc<LocalChannel<M>>,
    task: Mutex<Option<AcceptTask>>,
}

impl<M> LocalClient<M>
where
    M: Send + 'static,
{
    /// Connect to the server registered at `dest_address`.
    ///
    /// Builds a fresh channel pair, starts an accept task running the
    /// server's handler on the server side, and returns a client wrapping the
    /// client side.
    ///
    /// # Errors
    ///
    /// - [`Error::AddressSchemeMismatch`] if `dest_address` is not `local://`
    /// - [`Error::ServerNotFound`] if no live server is registered there
    /// - [`Error::ConnectionRefused`] if the server there has been stopped
    pub async fn connect(
        registry: &AddressRegistry<M>,
        dest_address: impl Into<Address>,
        local_address: Option<Address>,
    ) -> Result<Self> {
        // ---
        let dest_address = dest_address.into();
        dest_address.require_scheme(LOCAL_SCHEME)?;

        let server = match registry.resolve(&dest_address) {
            Resolved::Active(server) => server,
            Resolved::Stopped => return Err(Error::ConnectionRefused(dest_address.to_string())),
            Resolved::Missing => return Err(Error::ServerNotFound(dest_address.to_string())),
        };

        let connection_id = ConnectionId::generate();
        let (client_channel, server_channel) =
            LocalChannel::pair(connection_id, local_address.clone(), dest_address.clone());

        log_debug!(
            "{}: connecting to {dest_address}",
            client_channel.connection_id()
        );

        let task = server.spawn_accept_task(server_channel);

        Ok(Self {
            local_address,
            dest_address,
            channel: client_channel,
            task: Mutex::new(Some(task)),
        })
    }

    /// Identifier of this connection, shared with the server side.
    pub fn connection_id(&self) -> &ConnectionId {
        self.channel.connection_id()
    }
}

#[async_trait::async_trait]
impl<M> Client<M> for LocalClient<M>
where
    M: Send + 'static,
{
    // ---
    fn local_address(&self) -> Option<&Address> {
        self.local_address.as_ref()
    }

    fn dest_address(&self) -> &Address {
        &self.dest_address
    }

    fn channel(&self) -> ChannelPtr<M> {
        self.channel.clone()
    }

    async fn send(&self, message: M) -> Result<()> {
        self.channel.send(message).await
    }

    async fn recv(&self) -> Result<Option<M>> {
        self.channel.recv().await
    }

    /// Close the channel pair, then cancel the accept task if it is still
    /// running.
    async fn close(&self) -> Result<()> {
        // ---
        self.channel.close().await?;

        let task = lock_ignore_poison(&self.task).take();
        if let Some(task) = task {
            if task.cancel() {
                log_debug!("{}: cancelled accept task", self.connection_id());
            }
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}
