// src/transport/local/registry.rs

//! Address registry for local servers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, TryLockError, Weak};

use super::lock_ignore_poison;
use super::server::{LocalServer, ServerInner};
use crate::Address;

/// What the registry knows about one address.
enum Entry<M> {
    /// A server registered here; it may since have been dropped by its owners.
    Registered(Weak<ServerInner<M>>),
    /// The server registered here was stopped and unregistered. Kept only
    /// while the stopped server is still referenced somewhere.
    Stopped(Weak<ServerInner<M>>),
}

impl<M> Entry<M> {
    fn is_dead(&self) -> bool {
        match self {
            Entry::Registered(server) | Entry::Stopped(server) => server.strong_count() == 0,
        }
    }
}

/// Outcome of resolving an address for a connection.
pub(crate) enum Resolved<M> {
    Active(LocalServer<M>),
    Stopped,
    Missing,
}

/// Process-scoped map from address to live [`LocalServer`].
///
/// Entries are non-owning: the registry never keeps a server alive on its own.
/// Once every owner has dropped a server, lookups at its address find nothing,
/// whether or not it was stopped, and its entry is pruned. Stopping a server
/// unregisters it right away; while the stopped server is still referenced,
/// connections to its address are refused rather than reported missing, until
/// a new server is created there.
///
/// A registry is created once and handed to every server and client that
/// should see each other. Servers in different registries are isolated, which
/// is what parallel tests want.
///
/// ```
/// use mom_local::AddressRegistry;
///
/// let registry = AddressRegistry::<String>::new();
/// assert!(registry.is_empty());
/// ```
pub struct AddressRegistry<M> {
    // ---
    entries: Mutex<HashMap<Address, Entry<M>>>,
}

impl<M> AddressRegistry<M>
where
    M: Send + 'static,
{
    /// Create a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Active server registered at `address`.
    pub fn lookup(&self, address: &Address) -> Option<LocalServer<M>> {
        match self.resolve(address) {
            Resolved::Active(server) => Some(server),
            Resolved::Stopped | Resolved::Missing => None,
        }
    }

    /// Addresses of every active server, sorted.
    pub fn addresses(&self) -> Vec<Address> {
        // ---
        let entries = lock_ignore_poison(&self.entries);
        let mut addresses: Vec<Address> = entries
            .iter()
            .filter(|(_, entry)| Self::is_active(entry))
            .map(|(address, _)| address.clone())
            .collect();
        addresses.sort();
        addresses
    }

    /// Number of active servers.
    pub fn len(&self) -> usize {
        let entries = lock_ignore_poison(&self.entries);
        entries.values().filter(|entry| Self::is_active(entry)).count()
    }

    /// Whether no active server is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn resolve(&self, address: &Address) -> Resolved<M> {
        // ---
        let mut entries = lock_ignore_poison(&self.entries);
        let resolved = match entries.get(address) {
            Some(Entry::Registered(server)) => match server.upgrade() {
                Some(server) if server.is_stopped() => Resolved::Stopped,
                Some(server) => Resolved::Active(LocalServer::from_inner(server)),
                None => Resolved::Missing,
            },
            Some(Entry::Stopped(server)) if server.strong_count() > 0 => Resolved::Stopped,
            Some(Entry::Stopped(_)) => Resolved::Missing,
            None => Resolved::Missing,
        };
        if matches!(resolved, Resolved::Missing) {
            entries.remove(address);
        }
        resolved
    }

    /// Return the active server at `address`, or register the one built by
    /// `make`.
    ///
    /// Lookup and insert happen under one lock, so two concurrent creators
    /// always agree on the canonical server. The flag is `true` when `make`
    /// ran.
    pub(crate) fn get_or_register<F>(&self, address: &Address, make: F) -> (LocalServer<M>, bool)
    where
        F: FnOnce() -> Arc<ServerInner<M>>,
    {
        // ---
        let mut entries = lock_ignore_poison(&self.entries);

        if let Some(Entry::Registered(existing)) = entries.get(address) {
            if let Some(existing) = existing.upgrade() {
                if !existing.is_stopped() {
                    return (LocalServer::from_inner(existing), false);
                }
            }
        }

        entries.retain(|_, entry| !entry.is_dead());

        let inner = make();
        entries.insert(address.clone(), Entry::Registered(Arc::downgrade(&inner)));
        (LocalServer::from_inner(inner), true)
    }

    /// Mark `address` as stopped if its entry still refers to `server`.
    ///
    /// A newer server registered at the same address is left alone.
    pub(crate) fn unregister(&self, address: &Address, server: &Arc<ServerInner<M>>) -> bool {
        // ---
        let mut entries = lock_ignore_poison(&self.entries);
        let current = match entries.get(address) {
            Some(Entry::Registered(entry)) => Weak::ptr_eq(entry, &Arc::downgrade(server)),
            _ => false,
        };
        if current {
            entries.insert(address.clone(), Entry::Stopped(Arc::downgrade(server)));
        }
        entries.retain(|_, entry| !entry.is_dead());
        current
    }

    fn is_active(entry: &Entry<M>) -> bool {
        // ---
        match entry {
            Entry::Registered(server) => server
                .upgrade()
                .is_some_and(|server| !server.is_stopped()),
            Entry::Stopped(_) => false,
        }
    }
}

impl<M> AddressRegistry<M> {
    /// Drop the entry at `address` if its server is gone.
    ///
    /// Called while a server is being dropped. Skipped when the lock is busy,
    /// since the drop may happen under it; the next prune picks it up.
    pub(crate) fn forget(&self, address: &Address) {
        // ---
        let mut entries = match self.entries.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return,
        };
        if entries.get(address).is_some_and(Entry::is_dead) {
            entries.remove(address);
        }
    }
}

impl<M> Default for AddressRegistry<M> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{channel_handler, LocalClient, Server, ServerConfig};

    fn config(address: &str) -> ServerConfig<u32> {
        ServerConfig::new(channel_handler(|_channel, _cancel| async { Ok(()) }))
            .with_address(address)
    }

    fn entry_count(registry: &AddressRegistry<u32>) -> usize {
        lock_ignore_poison(&registry.entries).len()
    }

    #[tokio::test]
    async fn stopped_and_dropped_servers_leave_no_entries() {
        // ---
        let registry = AddressRegistry::<u32>::new();

        for n in 0..100 {
            let server = LocalServer::create(&registry, config(&format!("local://s{n}")))
                .await
                .unwrap();
            server.stop().await.unwrap();
        }

        assert_eq!(entry_count(&registry), 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn stopped_server_is_refused_until_dropped() {
        // ---
        let registry = AddressRegistry::<u32>::new();
        let server = LocalServer::create(&registry, config("local://gone"))
            .await
            .unwrap();
        server.stop().await.unwrap();

        let err = LocalClient::connect(&registry, "local://gone", None)
            .await
            .err()
            .unwrap();
        assert_eq!(err, crate::Error::ConnectionRefused("local://gone".into()));

        drop(server);

        let err = LocalClient::connect(&registry, "local://gone", None)
            .await
            .err()
            .unwrap();
        assert_eq!(err, crate::Error::ServerNotFound("local://gone".into()));
        assert_eq!(entry_count(&registry), 0);
    }

    #[tokio::test]
    async fn unregister_leaves_a_newer_server_alone() {
        // ---
        let registry = AddressRegistry::<u32>::new();
        let old = LocalServer::create(&registry, config("local://x")).await.unwrap();
        old.stop().await.unwrap();
        let new = LocalServer::create(&registry, config("local://x")).await.unwrap();

        old.stop().await.unwrap();

        let found = registry.lookup(&Address::from("local://x")).unwrap();
        assert!(found.ptr_eq(&new));
    }
}
