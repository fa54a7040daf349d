//! HTTP requests which adhere to RFC 8555
//!
//! RFC 8555 requires that most ACME HTTP requests (other than to the
//! directory endpoint and the new-nonce endpoint) be authenticated with a
//! JWS token using the flattened JSON format.
//!
//! For example, a request to create a new account might look like:
//! ```text
//! POST /acme/new-account HTTP/1.1
//! Host: example.com
//! Content-Type: application/jose+json
//!
//! {
//!   "protected": base64url({
//!     "alg": "ES256",
//!     "jwk": {...
//!     },
//!     "nonce": "6S8IqOGY7eL2lsGoTZYifg",
//!     "url": "https://example.com/acme/new-account"
//!   }),
//!   "payload": base64url({
//!     "termsOfServiceAgreed": true,
//!     "contact": [
//!       "mailto:cert-admin@example.org",
//!       "mailto:admin@example.org"
//!     ]
//!   }),
//!   "signature": "RZPOnYoPs1PhjszF...-nh6X1qtOFPB519I"
//! }
//! ```

use http::{HeaderMap, HeaderValue};
use serde::Serialize;

use super::jose::{self, AccountKeyIdentifier, Nonce, Payload, SignedEnvelope};
use super::AcmeError;
use super::Url;
use crate::key::AccountKey;

/// Content type of a JWS request body.
pub const CONTENT_JOSE: &str = "application/jose+json";

/// How the account key is identified in the protected header.
///
/// Requests from an account which is already registered with the ACME provider
/// carry the account URL as the `kid`. Before that, the public key itself is
/// embedded as a `jwk`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// Embed the account's public key.
    Jwk,

    /// Identify the account by the URL the ACME provider assigned it.
    Identified(AccountKeyIdentifier),
}

impl From<AccountKeyIdentifier> for Key {
    fn from(value: AccountKeyIdentifier) -> Self {
        Key::Identified(value)
    }
}

impl From<Option<AccountKeyIdentifier>> for Key {
    fn from(value: Option<AccountKeyIdentifier>) -> Self {
        match value {
            Some(identifier) => Key::Identified(identifier),
            None => Key::Jwk,
        }
    }
}

/// The HTTP request method in use with this ACME request.
#[derive(Debug, Clone)]
pub enum Method<P> {
    /// A plain, unauthenticated `GET` (the directory, or a certificate download).
    Get,

    /// A plain `HEAD`, used for fetching a fresh nonce.
    Head,

    /// A JWS-signed `POST`. With [`Payload::Empty`], this is a POST-as-GET.
    Post {
        /// The key identification mode.
        key: Key,

        /// The request body.
        payload: Payload<P>,
    },
}

/// A request which follows the RFC 8555 protocol for HTTP with JWS authentication
///
/// This structure contains all of the materials *except* the anti-replay
/// [nonce][Nonce] which are required to create an appropriate HTTP request. The
/// [nonce][Nonce] is left out of this object so that if the [`super::Client`]
/// encounters a bad [nonce][Nonce], it can re-sign the same request with a new
/// [nonce][Nonce] value without having to re-build the request object.
#[derive(Debug, Clone)]
pub struct Request<P> {
    method: Method<P>,
    url: Url,
    headers: HeaderMap,
}

impl<P> Request<P> {
    fn new(method: Method<P>, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Default::default(),
        }
    }

    /// Create a signed `POST` request with a given payload.
    ///
    /// The payload must implement [`serde::Serialize`] and will be serialized to
    /// JSON and included in the JWS which is sent to the ACME server.
    pub fn post<K>(payload: P, url: Url, key: K) -> Self
    where
        K: Into<Key>,
    {
        Self::signed(url, key, Payload::Json(payload))
    }

    /// Create a signed `POST` request with an explicit [`Payload`].
    pub fn signed<K>(url: Url, key: K, payload: Payload<P>) -> Self
    where
        K: Into<Key>,
    {
        Self::new(
            Method::Post {
                key: key.into(),
                payload,
            },
            url,
        )
    }

    /// The method and body of this request.
    pub fn method(&self) -> &Method<P> {
        &self.method
    }

    /// The target URL of this request.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether this request carries a JWS, and so consumes a nonce.
    pub fn is_signed(&self) -> bool {
        matches!(self.method, Method::Post { .. })
    }

    /// Mutable reference to the headers to be sent by this request.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Inspect the headers to be sent with this request.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl Request<()> {
    /// Create a plain `GET` request, which is not signed.
    pub fn get(url: Url) -> Self {
        Self::new(Method::Get, url)
    }

    /// Create a plain `HEAD` request, which is not signed.
    pub fn head(url: Url) -> Self {
        Self::new(Method::Head, url)
    }

    /// Create a `POST-as-GET` request with an empty payload.
    ///
    /// When making an authenticated `GET` request to an ACME server, the client
    /// sends a `POST` request, with a JWS body where the payload is the empty
    /// string. This is signed in the same way that a `POST` request is signed.
    pub fn post_as_get<K>(url: Url, key: K) -> Self
    where
        K: Into<Key>,
    {
        Self::signed(url, key, Payload::Empty)
    }
}

impl<P> Request<P>
where
    P: Serialize,
{
    /// Build the JWS envelope for this request, or `None` for unsigned requests.
    pub fn envelope(
        &self,
        key: &AccountKey,
        nonce: Option<Nonce>,
    ) -> Result<Option<SignedEnvelope>, AcmeError> {
        match &self.method {
            Method::Get | Method::Head => Ok(None),
            Method::Post {
                key: Key::Jwk,
                payload,
            } => jose::sign_with_jwk(key, &self.url, nonce, payload).map(Some),
            Method::Post {
                key: Key::Identified(identifier),
                payload,
            } => jose::sign_with_kid(key, &self.url, identifier, nonce, payload).map(Some),
        }
    }

    /// Sign and finalize this request so that it can be sent over HTTP.
    ///
    /// Normally, this method is not necessary - the [`crate::protocol::Client`]
    /// provides [`crate::protocol::Client::request`] for sending [`Request`] objects.
    pub fn sign(
        &self,
        key: &AccountKey,
        nonce: Option<Nonce>,
    ) -> Result<http::Request<Vec<u8>>, AcmeError> {
        let envelope = self.envelope(key, nonce)?;

        let method = match &self.method {
            Method::Get => http::Method::GET,
            Method::Head => http::Method::HEAD,
            Method::Post { .. } => http::Method::POST,
        };

        let body = match &envelope {
            Some(envelope) => envelope.to_body()?,
            None => Vec::new(),
        };

        let mut request = http::Request::builder()
            .method(method)
            .uri(self.url.as_str())
            .body(body)
            .map_err(|error| AcmeError::Transport(error.into()))?;

        *request.headers_mut() = self.headers.clone();
        if envelope.is_some() {
            request.headers_mut().insert(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static(CONTENT_JOSE),
            );
        }

        Ok(request)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn url() -> Url {
        "https://letsencrypt.test/new-orderz".parse().unwrap()
    }

    #[test]
    fn request_has_headers() {
        let key = crate::key!("ec-p256");
        let identifier = AccountKeyIdentifier::from(
            "https://letsencrypt.test/account/foo-bar"
                .parse::<Url>()
                .unwrap(),
        );

        let mut request = Request::post_as_get(url(), identifier);
        request
            .headers_mut()
            .insert("X-Foo", "bar".parse().unwrap());

        let signed = request.sign(&key, Some("foo".into())).unwrap();
        assert_eq!(signed.method(), http::Method::POST);
        assert_eq!(signed.headers().get("X-Foo").unwrap(), "bar");
        assert_eq!(
            signed.headers().get("Content-Type").unwrap(),
            "application/jose+json"
        );

        let envelope: SignedEnvelope = serde_json::from_slice(signed.body()).unwrap();
        assert_eq!(envelope.payload, "");
        assert_eq!(envelope.protected_header().unwrap()["nonce"], "foo");
    }

    #[test]
    fn plain_get_is_unsigned() {
        let key = crate::key!("ec-p256");
        let request = Request::get(url());
        assert!(!request.is_signed());

        let signed = request.sign(&key, None).unwrap();
        assert_eq!(signed.method(), http::Method::GET);
        assert!(signed.body().is_empty());
        assert!(signed.headers().get("Content-Type").is_none());
    }

    #[test]
    fn post_carries_json_payload() {
        let key = crate::key!("ec-p256");
        let request = Request::post(json!({"status": "ready"}), url(), Key::Jwk);
        let envelope = request
            .envelope(&key, Some("n".into()))
            .unwrap()
            .unwrap();
        assert_eq!(envelope.payload_bytes().unwrap(), br#"{"status":"ready"}"#);
        assert!(envelope.protected_header().unwrap().get("jwk").is_some());
    }
}
