// src/transport/local/server.rs

//! Local server: accepts in-process connections at an address.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::registry::AddressRegistry;
use super::{lock_ignore_poison, LocalChannel, DEFAULT_LOCAL_ADDRESS, LOCAL_SCHEME};

#[allow(unused_imports)]
use crate::{
    // ---
    log_debug,
    log_error,
    log_info,
    log_warn,
    Address,
    Channel,
    ChannelHandler,
    ChannelPtr,
    ChannelType,
    ConnectionId,
    Error,
    Result,
    Server,
    ServerConfig,
};

/// State shared by every handle to one local server.
///
/// The registry refers to this through a `Weak`; clients and accept tasks
/// hold it strongly through [`LocalServer`].
pub(crate) struct ServerInner<M> {
    // ---
    address: Address,
    handler: ChannelHandler<M>,
    shutdown: CancellationToken,
    registry: Weak<AddressRegistry<M>>,

    // In-flight accept tasks, keyed by connection. Each entry is removed by
    // the task itself when it finishes or is cancelled.
    tasks: Mutex<HashMap<ConnectionId, CancellationToken>>,

    // Accepted channels, observed without being kept alive.
    channels: Mutex<Vec<Weak<LocalChannel<M>>>>,
}

impl<M> ServerInner<M> {
    pub(crate) fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl<M> Drop for ServerInner<M> {
    fn drop(&mut self) {
        // ---
        if let Some(registry) = self.registry.upgrade() {
            registry.forget(&self.address);
        }
    }
}

/// In-process server bound to a `local://` address.
///
/// There is no listening socket: a connection is accepted the moment a
/// [`LocalClient`](crate::LocalClient) connects, by spawning an accept task
/// that runs the connection handler on the server side of a fresh channel
/// pair.
///
/// The server moves from active to stopped exactly once. A stopped server
/// accepts nothing, is removed from its registry, and has cancelled every
/// accept task and closed every channel it had accepted.
///
/// Cloning a `LocalServer` yields another handle to the same server.
pub struct LocalServer<M> {
    inner: Arc<ServerInner<M>>,
}

impl<M> Clone for LocalServer<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Handle to one accept task, held by the client that triggered it.
pub(crate) struct AcceptTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl AcceptTask {
    /// Cancel the task unless it already finished.
    pub(crate) fn cancel(&self) -> bool {
        // ---
        if self.handle.is_finished() {
            return false;
        }
        self.cancel.cancel();
        true
    }
}

/// Removes an accept task from its server's task set when dropped, which
/// happens when the task finishes or is cancelled.
///
/// Also holds the server-side channel for as long as the task runs, so
/// `stop` can still reach it when the handler has let its pointer go.
struct TaskGuard<M> {
    server: Weak<ServerInner<M>>,
    connection_id: ConnectionId,
    _channel: Arc<LocalChannel<M>>,
}

impl<M> Drop for TaskGuard<M> {
    fn drop(&mut self) {
        // ---
        if let Some(server) = self.server.upgrade() {
            lock_ignore_poison(&server.tasks).remove(&self.connection_id);
        }
    }
}

impl<M> LocalServer<M>
where
    M: Send + 'static,
{
    pub(crate) fn from_inner(inner: Arc<ServerInner<M>>) -> Self {
        Self { inner }
    }

    /// Create the server for `config`, or return the one already serving the
    /// address.
    ///
    /// The address defaults to [`DEFAULT_LOCAL_ADDRESS`]. If a live,
    /// non-stopped server is already registered there, it is returned
    /// unchanged and `config.handler` is dropped. Otherwise a new server is
    /// built and registered.
    ///
    /// # Errors
    ///
    /// - [`Error::AddressSchemeMismatch`] if the address is not `local://`
    /// - [`Error::UnexpectedConfiguration`] if `config.options` is not empty;
    ///   the local transport takes no options
    pub async fn create(
        registry: &Arc<AddressRegistry<M>>,
        config: ServerConfig<M>,
    ) -> Result<Self> {
        // ---
        let address = config.address_or(DEFAULT_LOCAL_ADDRESS);
        address.require_scheme(LOCAL_SCHEME)?;

        if let Some(keys) = config.unexpected_keys() {
            return Err(Error::UnexpectedConfiguration(format!(
                "creating local server at {address} got unexpected options: {keys}"
            )));
        }

        let (server, created) = registry.get_or_register(&address, || {
            Arc::new(ServerInner {
                address: address.clone(),
                handler: config.handler,
                shutdown: CancellationToken::new(),
                registry: Arc::downgrade(registry),
                tasks: Mutex::new(HashMap::new()),
                channels: Mutex::new(Vec::new()),
            })
        });

        if created {
            log_info!("{address}: local server created");
        } else {
            log_debug!("{address}: reusing existing local server");
        }

        Ok(server)
    }

    /// Whether `self` and `other` are handles to the same server.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of accept tasks still running.
    pub fn active_connections(&self) -> usize {
        lock_ignore_poison(&self.inner.tasks).len()
    }

    /// Accept one connection: track the channel and run the handler on it
    /// until the handler returns.
    ///
    /// `cancel` is handed to the handler so it can observe shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServerClosed`] if the server has been stopped, or
    /// whatever the handler returns.
    pub async fn on_connected(
        &self,
        channel: Arc<LocalChannel<M>>,
        cancel: CancellationToken,
    ) -> Result<()> {
        // ---
        if self.inner.is_stopped() {
            return Err(Error::ServerClosed(self.inner.address.to_string()));
        }

        {
            let mut channels = lock_ignore_poison(&self.inner.channels);
            channels.retain(|c| c.strong_count() > 0);
            channels.push(Arc::downgrade(&channel));
        }

        log_debug!(
            "{}: accepted connection {}",
            self.inner.address,
            channel.connection_id()
        );

        let channel: ChannelPtr<M> = channel;
        (self.inner.handler)(channel, cancel).await
    }

    /// Spawn the accept task for the server side of a new connection.
    ///
    /// The task is tracked in the server's task set until it finishes or is
    /// cancelled. Its cancellation token is a child of the server's shutdown
    /// token; once the token fires, the handler future is dropped the next
    /// time it waits.
    pub(crate) fn spawn_accept_task(&self, channel: Arc<LocalChannel<M>>) -> AcceptTask {
        // ---
        let connection_id = channel.connection_id().clone();
        let cancel = self.inner.shutdown.child_token();

        lock_ignore_poison(&self.inner.tasks).insert(connection_id.clone(), cancel.clone());

        let guard = TaskGuard {
            server: Arc::downgrade(&self.inner),
            connection_id,
            _channel: channel.clone(),
        };
        let server = self.clone();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            // ---
            let _guard = guard;
            let _info = channel.info();
            let _connection_id = channel.connection_id().clone();

            // The handler is polled first so that whatever woke it (a close,
            // say) is seen before the cancellation drops it at its next wait.
            tokio::select! {
                biased;
                result = server.on_connected(channel, task_cancel.clone()) => match result {
                    Ok(()) => {}
                    Err(_err @ (Error::ChannelClosed | Error::ServerClosed(_))) => {
                        log_warn!("{_connection_id}: connection handler stopped: {_err}");
                    }
                    Err(_err) => {
                        log_error!("{_connection_id}: connection handler failed: {_err}");
                    }
                },
                _ = task_cancel.cancelled() => {
                    log_debug!("{_connection_id}: accept task cancelled");
                }
            }

            log_info!("{_connection_id}: channel exit: {_info}");
        });

        AcceptTask { cancel, handle }
    }

    fn stop_now(&self) {
        // ---
        let first_stop = !self.inner.is_stopped();
        self.inner.shutdown.cancel();

        if let Some(registry) = self.inner.registry.upgrade() {
            registry.unregister(&self.inner.address, &self.inner);
        }

        let tasks: Vec<CancellationToken> = lock_ignore_poison(&self.inner.tasks)
            .values()
            .cloned()
            .collect();
        for task in &tasks {
            task.cancel();
        }

        let channels: Vec<Arc<LocalChannel<M>>> = lock_ignore_poison(&self.inner.channels)
            .drain(..)
            .filter_map(|c| c.upgrade())
            .collect();
        for channel in &channels {
            channel.close_now();
        }

        if first_stop {
            log_info!(
                "{}: local server stopped ({} accept tasks cancelled, {} channels closed)",
                self.inner.address,
                tasks.len(),
                channels.len()
            );
        }
    }
}

#[async_trait::async_trait]
impl<M> Server<M> for LocalServer<M>
where
    M: Send + 'static,
{
    // ---
    fn address(&self) -> &Address {
        &self.inner.address
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Local
    }

    /// Nothing to do: connections are accepted when clients connect.
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn join(&self, timeout: Option<Duration>) {
        // ---
        let stopped = self.inner.shutdown.cancelled();
        match timeout {
            Some(timeout) => {
                let _ = tokio::time::timeout(timeout, stopped).await;
            }
            None => stopped.await,
        }
    }

    /// Cancel every accept task and close every accepted channel.
    ///
    /// Accept tasks are cancelled outright; their handlers stop at the next
    /// point where they wait.
    async fn stop(&self) -> Result<()> {
        self.stop_now();
        Ok(())
    }

    fn is_stopped(&self) -> bool {
        self.inner.is_stopped()
    }
}
