//! Scheme-keyed transport factory.
//!
//! The messaging runtime builds one [`TransportFactory`] at startup, listing
//! every transport it can use by address scheme. After that, creating a
//! server or connecting a client only needs an address: the factory picks
//! the transport from the scheme.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    // ---
    log_debug,
    log_warn,
    Address,
    AddressRegistry,
    BoxFuture,
    ClientPtr,
    Error,
    LocalClient,
    LocalServer,
    Result,
    ServerConfig,
    ServerPtr,
    DEFAULT_LOCAL_ADDRESS,
    LOCAL_SCHEME,
};

/// Constructor creating (or reusing) the server described by a config.
pub type ServerConstructor<M> =
    Arc<dyn Fn(ServerConfig<M>) -> BoxFuture<'static, Result<ServerPtr<M>>> + Send + Sync>;

/// Constructor connecting a client to `(dest_address, local_address)`.
pub type ClientConstructor<M> = Arc<
    dyn Fn(Address, Option<Address>) -> BoxFuture<'static, Result<ClientPtr<M>>> + Send + Sync,
>;

struct SchemeEntry<M> {
    create_server: ServerConstructor<M>,
    connect: ClientConstructor<M>,
}

impl<M> Clone for SchemeEntry<M> {
    fn clone(&self) -> Self {
        Self {
            create_server: self.create_server.clone(),
            connect: self.connect.clone(),
        }
    }
}

/// Builder for a [`TransportFactory`].
///
/// # Example
///
/// ```
/// use mom_local::{AddressRegistry, TransportFactory};
///
/// let registry = AddressRegistry::<String>::new();
/// let factory = TransportFactory::builder()
///     .with_local(registry)
///     .build()
///     .expect("local scheme is registered");
///
/// assert_eq!(factory.schemes(), vec!["local"]);
/// ```
pub struct TransportFactoryBuilder<M> {
    schemes: HashMap<String, SchemeEntry<M>>,
    default_address: Option<Address>,
}

impl<M> TransportFactoryBuilder<M>
where
    M: Send + 'static,
{
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            schemes: HashMap::new(),
            default_address: None,
        }
    }

    /// Install the in-process transport under the `local` scheme, backed by
    /// `registry`.
    pub fn with_local(self, registry: Arc<AddressRegistry<M>>) -> Self {
        // ---
        let server_registry = registry.clone();
        let create_server = Arc::new(
            move |config: ServerConfig<M>| -> BoxFuture<'static, Result<ServerPtr<M>>> {
                let registry = server_registry.clone();
                Box::pin(async move {
                    let server = LocalServer::create(&registry, config).await?;
                    Ok(Arc::new(server) as ServerPtr<M>)
                })
            },
        );

        let connect = Arc::new(
            move |dest: Address, local: Option<Address>| -> BoxFuture<'static, Result<ClientPtr<M>>> {
                let registry = registry.clone();
                Box::pin(async move {
                    let client = LocalClient::connect(&registry, dest, local).await?;
                    Ok(Box::new(client) as ClientPtr<M>)
                })
            },
        );

        self.register(LOCAL_SCHEME, create_server, connect)
    }

    /// Install a transport under `scheme`.
    ///
    /// Schemes are case-insensitive. Registering a scheme twice replaces the
    /// earlier constructors.
    pub fn register(
        mut self,
        scheme: impl Into<String>,
        create_server: ServerConstructor<M>,
        connect: ClientConstructor<M>,
    ) -> Self {
        // ---
        let scheme = scheme.into().to_ascii_lowercase();
        let entry = SchemeEntry {
            create_server,
            connect,
        };
        if self.schemes.insert(scheme.clone(), entry).is_some() {
            log_warn!("transport for scheme {scheme} registered twice; keeping the last one");
        }
        self
    }

    /// Address used by [`TransportFactory::create_server`] when a config
    /// names none. Defaults to [`DEFAULT_LOCAL_ADDRESS`].
    pub fn default_address(mut self, address: impl Into<Address>) -> Self {
        self.default_address = Some(address.into());
        self
    }

    /// Build the factory (consumes self).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidAddress`] if the default address has no scheme
    /// - [`Error::UnsupportedScheme`] if no transport is registered for the
    ///   default address's scheme
    pub fn build(self) -> Result<TransportFactory<M>> {
        // ---
        let default_address = self
            .default_address
            .unwrap_or_else(|| Address::from(DEFAULT_LOCAL_ADDRESS));

        let scheme = default_address.require_any_scheme()?.to_ascii_lowercase();
        if !self.schemes.contains_key(&scheme) {
            return Err(Error::UnsupportedScheme(scheme));
        }

        Ok(TransportFactory {
            schemes: self.schemes,
            default_address,
        })
    }
}

impl<M> Default for TransportFactoryBuilder<M>
where
    M: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable table mapping address schemes to transport constructors.
pub struct TransportFactory<M> {
    schemes: HashMap<String, SchemeEntry<M>>,
    default_address: Address,
}

impl<M> Clone for TransportFactory<M> {
    fn clone(&self) -> Self {
        Self {
            schemes: self.schemes.clone(),
            default_address: self.default_address.clone(),
        }
    }
}

impl<M> TransportFactory<M>
where
    M: Send + 'static,
{
    /// Start building a factory.
    pub fn builder() -> TransportFactoryBuilder<M> {
        TransportFactoryBuilder::new()
    }

    /// Factory with only the in-process transport installed.
    pub fn local(registry: Arc<AddressRegistry<M>>) -> Self {
        // ---
        let builder = TransportFactoryBuilder::new().with_local(registry);
        TransportFactory {
            schemes: builder.schemes,
            default_address: Address::from(DEFAULT_LOCAL_ADDRESS),
        }
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.schemes.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    /// Whether a transport is registered for `scheme`.
    pub fn supports(&self, scheme: &str) -> bool {
        self.schemes.contains_key(&scheme.to_ascii_lowercase())
    }

    /// Create the server described by `config` with the transport matching
    /// its address scheme.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAddress`] or [`Error::UnsupportedScheme`] if no
    /// transport matches, otherwise whatever the transport returns.
    pub async fn create_server(&self, config: ServerConfig<M>) -> Result<ServerPtr<M>> {
        // ---
        let address = config
            .address
            .clone()
            .unwrap_or_else(|| self.default_address.clone());
        let entry = self.entry(&address)?;

        log_debug!("creating server at {address}");

        (entry.create_server)(config.with_address(address)).await
    }

    /// Connect to `dest_address` with the transport matching its scheme.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAddress`] or [`Error::UnsupportedScheme`] if no
    /// transport matches, otherwise whatever the transport returns.
    pub async fn connect(
        &self,
        dest_address: impl Into<Address>,
        local_address: Option<Address>,
    ) -> Result<ClientPtr<M>> {
        // ---
        let dest_address = dest_address.into();
        let entry = self.entry(&dest_address)?;

        log_debug!("connecting to {dest_address}");

        (entry.connect)(dest_address, local_address).await
    }

    fn entry(&self, address: &Address) -> Result<&SchemeEntry<M>> {
        // ---
        let scheme = address.require_any_scheme()?.to_ascii_lowercase();
        self.schemes
            .get(&scheme)
            .ok_or(Error::UnsupportedScheme(scheme))
    }
}
