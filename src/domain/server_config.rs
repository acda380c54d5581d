//! Transport-agnostic server configuration.
//!
//! This type carries only what every transport needs to bind a server: an
//! address and a connection handler. Anything transport-specific travels in
//! the free-form `options` map, and each transport decides which keys it
//! understands. Unknown keys are rejected at creation time.

use std::fmt;

use serde_json::{Map, Value};

use crate::{Address, ChannelHandler};

/// Configuration for creating a server.
///
/// # Example
///
/// ```
/// use mom_local::{channel_handler, ServerConfig};
///
/// let config: ServerConfig<String> = ServerConfig::new(channel_handler(|_channel, _cancel| async { Ok(()) }))
///     .with_address("local://worker-1");
///
/// assert_eq!(config.address.as_ref().map(|a| a.as_str()), Some("local://worker-1"));
/// ```
pub struct ServerConfig<M> {
    // ---
    /// Address to bind.
    ///
    /// If `None`, the transport's default address is used.
    pub address: Option<Address>,

    /// Handler invoked for every accepted connection.
    pub handler: ChannelHandler<M>,

    /// Transport-specific options, as found in the runtime's communication
    /// config section.
    pub options: Map<String, Value>,
}

impl<M> ServerConfig<M> {
    /// Create a config with the given handler, the default address, and no
    /// options.
    pub fn new(handler: ChannelHandler<M>) -> Self {
        Self {
            address: None,
            handler,
            options: Map::new(),
        }
    }

    /// Set the address to bind.
    pub fn with_address(mut self, address: impl Into<Address>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Add a transport-specific option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Merge a whole options section into the options.
    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options.extend(options);
        self
    }

    /// The configured address, or `default` when none was set.
    pub fn address_or(&self, default: &str) -> Address {
        self.address
            .clone()
            .unwrap_or_else(|| Address::from(default))
    }

    /// Comma-separated option keys, or `None` when there are no options.
    pub(crate) fn unexpected_keys(&self) -> Option<String> {
        // ---
        if self.options.is_empty() {
            return None;
        }
        let keys: Vec<&str> = self.options.keys().map(String::as_str).collect();
        Some(keys.join(","))
    }
}

impl<M> Clone for ServerConfig<M> {
    fn clone(&self) -> Self {
        Self {
            address: self.address.clone(),
            handler: self.handler.clone(),
            options: self.options.clone(),
        }
    }
}

impl<M> fmt::Debug for ServerConfig<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("address", &self.address)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::channel_handler;
    use serde_json::json;

    fn noop() -> ChannelHandler<()> {
        channel_handler(|_channel, _cancel| async { Ok(()) })
    }

    #[test]
    fn defaults_to_no_address_and_no_options() {
        let config = ServerConfig::new(noop());
        assert!(config.address.is_none());
        assert_eq!(config.unexpected_keys(), None);
        assert_eq!(config.address_or("local://0").as_str(), "local://0");
    }

    #[test]
    fn explicit_address_wins_over_default() {
        let config = ServerConfig::new(noop()).with_address("local://A");
        assert_eq!(config.address_or("local://0").as_str(), "local://A");
    }

    #[test]
    fn lists_option_keys() {
        // ---
        let mut section = Map::new();
        section.insert("backlog".to_string(), json!(16));

        let config = ServerConfig::new(noop())
            .with_option("compression", "gzip")
            .with_options(section);

        // serde_json::Map keeps keys sorted
        assert_eq!(
            config.unexpected_keys().as_deref(),
            Some("backlog,compression")
        );
    }

    #[test]
    fn later_options_replace_earlier_ones() {
        // ---
        let mut section = Map::new();
        section.insert("compression".to_string(), json!("zlib"));

        let config = ServerConfig::new(noop())
            .with_option("compression", "gzip")
            .with_options(section);

        assert_eq!(config.options.len(), 1);
        assert_eq!(config.options["compression"], json!("zlib"));
    }
}
