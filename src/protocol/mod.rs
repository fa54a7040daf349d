//! # ACME JWS implementation and ACME request types.
//!
//! Most ACME requests are authenticated as a JWS, signed by the
//! account key. This module provides the implementation of that
//! protocol, the classification of error responses, and a [`Client`]
//! type which tracks the correct Nonce through a series of requests.
#![deny(unsafe_code)]
#![deny(missing_docs)]

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

pub mod base64;
pub mod client;
pub mod directory;
pub mod errors;
pub mod jose;
pub mod request;
pub mod response;
pub mod transport;

pub use base64::Base64JSON;
pub use client::{AcmeClient, Client, ClientBuilder};
pub use directory::Directory;
pub use errors::AcmeError;
pub use jose::{Nonce, Payload, SignedEnvelope};
pub use transport::{Transport, TransportError};

#[doc(no_inline)]
pub use request::Request;
#[doc(no_inline)]
pub use response::{Response, ResponseBody};
use serde::{Deserialize, Serialize};

/// Universal Resource Locator which provides
/// a [`std::fmt::Debug`] implementation which prints the
/// full URL (rather than the parsed parts) for compactness.
///
/// This tries to be a drop-in replacement for [`url::Url`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Url(url::Url);

impl Url {
    /// Underlying string representation of the URL.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Just the path component of the URL.
    pub fn path(&self) -> &str {
        self.0.path()
    }

    /// Just the host component of the URL.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl Deref for Url {
    type Target = url::Url;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<url::Url> for Url {
    fn from(value: url::Url) -> Self {
        Url(value)
    }
}

impl From<Url> for url::Url {
    fn from(value: Url) -> Self {
        value.0
    }
}

impl AsRef<str> for Url {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Url").field(&self.0.as_str()).finish()
    }
}

impl FromStr for Url {
    type Err = url::ParseError;

    fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
        s.parse().map(Url)
    }
}

#[cfg(test)]
#[path = "../../tests/common/http_example.rs"]
mod http_example;

#[cfg(test)]
pub(crate) mod test {

    #[allow(missing_docs)]
    #[macro_export]
    macro_rules! example {
        ($name:tt) => {
            include_str!(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/tests/fixtures/",
                $name
            ))
        };
    }

    #[allow(missing_docs)]
    #[macro_export]
    macro_rules! response {
        ($name:tt) => {
            $crate::protocol::test::parse($crate::example!($name))
        };
    }

    pub(crate) use super::http_example::parse_http_response_example as parse;
}
