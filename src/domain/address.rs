// src/domain/address.rs

//! Scheme-qualified transport addresses.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Separator between the scheme and the token of an address.
const SCHEME_SEPARATOR: &str = "://";

/// A transport address of the form `"<scheme>://<token>"`.
///
/// Within one process, an address identifies at most one live server. The
/// scheme selects the transport (see [`TransportFactory`](crate::TransportFactory));
/// the token is opaque to everything but that transport.
///
/// Addresses are immutable and cheap to clone.
///
/// ```
/// use mom_local::Address;
///
/// let address = Address::from("local://worker-1");
/// assert_eq!(address.scheme(), Some("local"));
/// assert_eq!(address.token(), Some("worker-1"));
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub Arc<str>);

impl Address {
    // ---
    /// Borrow the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scheme part of the address, or `None` when there is no `://` separator
    /// or the scheme is empty.
    pub fn scheme(&self) -> Option<&str> {
        // ---
        match self.0.split_once(SCHEME_SEPARATOR) {
            Some((scheme, _)) if !scheme.is_empty() => Some(scheme),
            _ => None,
        }
    }

    /// Everything after the `://` separator.
    pub fn token(&self) -> Option<&str> {
        self.scheme()
            .map(|scheme| &self.0[scheme.len() + SCHEME_SEPARATOR.len()..])
    }

    /// Scheme part of the address, failing with [`Error::InvalidAddress`]
    /// when the address has none.
    pub fn require_any_scheme(&self) -> Result<&str> {
        self.scheme()
            .ok_or_else(|| Error::InvalidAddress(self.0.to_string()))
    }

    /// Check that the address uses `expected` as its scheme.
    ///
    /// Schemes compare case-insensitively. An address without a scheme never
    /// matches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AddressSchemeMismatch`] when the scheme differs or is
    /// missing.
    pub fn require_scheme(&self, expected: &str) -> Result<()> {
        // ---
        match self.scheme() {
            Some(scheme) if scheme.eq_ignore_ascii_case(expected) => Ok(()),
            _ => Err(Error::AddressSchemeMismatch {
                expected: expected.to_string(),
                address: self.0.to_string(),
            }),
        }
    }
}

impl<T> From<T> for Address
where
    T: Into<Arc<str>>,
{
    fn from(value: T) -> Self {
        Address(value.into())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn splits_scheme_and_token() {
        let address = Address::from("local://A");
        assert_eq!(address.scheme(), Some("local"));
        assert_eq!(address.token(), Some("A"));
    }

    #[test]
    fn empty_token_is_allowed() {
        let address = Address::from("local://");
        assert_eq!(address.scheme(), Some("local"));
        assert_eq!(address.token(), Some(""));
    }

    #[test]
    fn missing_separator_has_no_scheme() {
        let address = Address::from("local:A");
        assert_eq!(address.scheme(), None);
        assert_eq!(
            address.require_any_scheme(),
            Err(Error::InvalidAddress("local:A".into()))
        );
    }

    #[test]
    fn require_scheme_ignores_case() {
        assert!(Address::from("LOCAL://x").require_scheme("local").is_ok());
    }

    #[test]
    fn require_scheme_rejects_other_schemes() {
        let err = Address::from("tcp://127.0.0.1:80")
            .require_scheme("local")
            .unwrap_err();
        assert_eq!(
            err,
            Error::AddressSchemeMismatch {
                expected: "local".into(),
                address: "tcp://127.0.0.1:80".into(),
            }
        );
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Address::from("local://0")).unwrap();
        assert_eq!(json, "\"local://0\"");
    }
}
