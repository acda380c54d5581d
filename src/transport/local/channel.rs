// src/transport/local/channel.rs

//! Paired in-process channel.
//!
//! A connection is one pair of unbounded queues plus one shared closed flag.
//! Two [`LocalChannel`] endpoints share them with crossed roles: what one
//! endpoint sends, the other receives.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::{
    // ---
    Address,
    Channel,
    ChannelType,
    ConnectionId,
    Error,
    Result,
};

/// One endpoint of an in-process channel pair.
///
/// `send` never waits: the outbound queue is unbounded. `recv` waits for the
/// next inbound message but also watches the shared closed flag, so a reader
/// parked on an empty queue wakes up as soon as either endpoint closes and
/// sees a clean end-of-stream (`Ok(None)`).
pub struct LocalChannel<M> {
    // ---
    connection_id: ConnectionId,
    inbound: Mutex<mpsc::UnboundedReceiver<M>>,
    outbound: mpsc::UnboundedSender<M>,
    closed: CancellationToken,
    local_address: Option<Address>,
    dest_address: Option<Address>,
}

impl<M> LocalChannel<M>
where
    M: Send + 'static,
{
    /// Build a crossed pair of endpoints sharing one closed flag.
    ///
    /// Returns `(client_side, server_side)`. The client side carries
    /// `client_address` as its local address and `server_address` as its
    /// destination; the server side carries only `client_address`, as its
    /// destination.
    pub(crate) fn pair(
        connection_id: ConnectionId,
        client_address: Option<Address>,
        server_address: Address,
    ) -> (Arc<Self>, Arc<Self>) {
        // ---
        let (to_client, client_inbox) = mpsc::unbounded_channel();
        let (to_server, server_inbox) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();

        let client_side = LocalChannel {
            connection_id: connection_id.clone(),
            inbound: Mutex::new(client_inbox),
            outbound: to_server,
            closed: closed.clone(),
            local_address: client_address.clone(),
            dest_address: Some(server_address),
        };

        let server_side = LocalChannel {
            connection_id,
            inbound: Mutex::new(server_inbox),
            outbound: to_client,
            closed,
            local_address: None,
            dest_address: client_address,
        };

        (Arc::new(client_side), Arc::new(server_side))
    }

    /// Identifier shared by both endpoints of the pair.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Set the shared closed flag. Never waits.
    pub(crate) fn close_now(&self) {
        if !self.closed.is_cancelled() {
            crate::log_debug!("{}: closing {}", self.connection_id, self.info());
        }
        self.closed.cancel();
    }
}

#[async_trait::async_trait]
impl<M> Channel<M> for LocalChannel<M>
where
    M: Send + 'static,
{
    // ---
    fn channel_type(&self) -> ChannelType {
        ChannelType::Local
    }

    fn local_address(&self) -> Option<&Address> {
        self.local_address.as_ref()
    }

    fn dest_address(&self) -> Option<&Address> {
        self.dest_address.as_ref()
    }

    /// Put the message directly onto the peer's inbound queue.
    ///
    /// Fails with [`Error::ChannelClosed`] once the pair is closed, or when
    /// the peer endpoint has been dropped and nothing can read the message.
    async fn send(&self, message: M) -> Result<()> {
        // ---
        if self.closed.is_cancelled() {
            return Err(Error::ChannelClosed);
        }
        self.outbound
            .send(message)
            .map_err(|_| Error::ChannelClosed)
    }

    /// Take the next message off the inbound queue.
    ///
    /// Fails with [`Error::ChannelClosed`] if the pair was already closed when
    /// called. A close that lands while waiting resolves to `Ok(None)`, as
    /// does the peer endpoint being dropped.
    async fn recv(&self) -> Result<Option<M>> {
        // ---
        if self.closed.is_cancelled() {
            return Err(Error::ChannelClosed);
        }

        let mut inbound = tokio::select! {
            guard = self.inbound.lock() => guard,
            _ = self.closed.cancelled() => return Ok(None),
        };

        tokio::select! {
            biased;
            message = inbound.recv() => Ok(message),
            _ = self.closed.cancelled() => Ok(None),
        }
    }

    async fn close(&self) -> Result<()> {
        self.close_now();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn pair() -> (Arc<LocalChannel<u32>>, Arc<LocalChannel<u32>>) {
        LocalChannel::pair(
            ConnectionId::generate(),
            Some(Address::from("local://client")),
            Address::from("local://server"),
        )
    }

    #[tokio::test]
    async fn endpoints_are_crossed() {
        // ---
        let (client, server) = pair();

        client.send(1).await.unwrap();
        server.send(2).await.unwrap();

        assert_eq!(server.recv().await.unwrap(), Some(1));
        assert_eq!(client.recv().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn preserves_send_order() {
        // ---
        let (client, server) = pair();

        for n in 0..100 {
            client.send(n).await.unwrap();
        }
        for n in 0..100 {
            assert_eq!(server.recv().await.unwrap(), Some(n));
        }
    }

    #[tokio::test]
    async fn close_is_shared_and_idempotent() {
        // ---
        let (client, server) = pair();

        server.close().await.unwrap();
        server.close().await.unwrap();

        assert!(client.is_closed());
        assert!(server.is_closed());
        assert_eq!(client.send(1).await, Err(Error::ChannelClosed));
        assert_eq!(server.send(1).await, Err(Error::ChannelClosed));
        assert_eq!(client.recv().await, Err(Error::ChannelClosed));
    }

    #[tokio::test]
    async fn blocked_recv_wakes_on_close() {
        // ---
        let (client, server) = pair();

        let reader = tokio::spawn({
            let server = server.clone();
            async move { server.recv().await }
        });

        // Let the reader park on the empty queue.
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.close().await.unwrap();

        let result = timeout(Duration::from_secs(1), reader)
            .await
            .expect("reader did not wake up on close")
            .expect("reader task panicked");
        assert_eq!(result, Ok(None));
    }

    #[tokio::test]
    async fn dropped_peer_ends_the_stream() {
        // ---
        let (client, server) = pair();

        client.send(7).await.unwrap();
        drop(client);

        assert_eq!(server.recv().await.unwrap(), Some(7));
        assert_eq!(server.recv().await.unwrap(), None);
        assert_eq!(server.send(8).await, Err(Error::ChannelClosed));
    }

    #[test]
    fn info_reports_crossed_addresses() {
        // ---
        let (client, server) = pair();

        assert_eq!(client.info().local_address, Some(Address::from("local://client")));
        assert_eq!(client.info().dest_address, Some(Address::from("local://server")));
        assert_eq!(server.info().local_address, None);
        assert_eq!(server.info().dest_address, Some(Address::from("local://client")));
        assert_eq!(client.connection_id(), server.connection_id());
    }
}
