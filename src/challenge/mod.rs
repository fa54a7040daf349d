//! # ACME Challenges
//!
//! Challenges prove control over an identifier before an ACME provider will
//! issue a certificate for it. This module provides:
//!
//! - [`AuthorizationChallenge`], the challenge as seen by solvers and validators.
//! - [`Solver`], which publishes (and later retracts) the proof for one kind of
//!   challenge, optionally batching several challenges together.
//! - [`Validator`], which independently checks that the proof is observable
//!   before the ACME provider is asked to verify it.
//! - [`ChallengeRegistry`], which dispatches each challenge to the solver
//!   registered for its [`ChallengeKind`].
//!
//! Solvers for HTTP-01 live in [`http`], and solvers for DNS-01 in [`dns`].

use std::fmt;
use std::sync::Arc;

use ::http::HeaderValue;
use serde::{ser, Deserialize, Serialize};

use crate::key::AccountKey;
use crate::protocol::request::Key;
use crate::protocol::transport::Transport;
use crate::protocol::{AcmeError, Request, Url};

pub mod dns;
pub mod http;
mod registry;
mod solver;
mod validator;

pub use self::registry::{ChallengeRegistry, Validation};
pub use self::solver::Solver;
pub use self::validator::Validator;

/// The different kinds of ACME challenges.
///
/// Challenge types without a dedicated variant are kept by name in
/// [`ChallengeKind::Other`], so provider-specific solvers can still be registered
/// for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[non_exhaustive]
pub enum ChallengeKind {
    /// The HTTP-01 challenge.
    Http01,

    /// The DNS-01 challenge.
    Dns01,

    /// The TLS-ALPN-01 challenge.
    TlsAlpn01,

    /// Any other challenge, by its `type` name.
    Other(String),
}

impl ChallengeKind {
    /// The name of the challenge type, as used in the `type` field.
    pub fn name(&self) -> &str {
        match self {
            ChallengeKind::Http01 => "http-01",
            ChallengeKind::Dns01 => "dns-01",
            ChallengeKind::TlsAlpn01 => "tls-alpn-01",
            ChallengeKind::Other(name) => name,
        }
    }
}

impl From<String> for ChallengeKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "http-01" => ChallengeKind::Http01,
            "dns-01" => ChallengeKind::Dns01,
            "tls-alpn-01" => ChallengeKind::TlsAlpn01,
            _ => ChallengeKind::Other(value),
        }
    }
}

impl From<&str> for ChallengeKind {
    fn from(value: &str) -> Self {
        value.to_owned().into()
    }
}

impl From<ChallengeKind> for String {
    fn from(value: ChallengeKind) -> Self {
        value.name().to_owned()
    }
}

impl fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State of the ACME challenge.
///
/// Status transitions are driven by the ACME provider, and only observed here.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    /// This challenge has not been submitted.
    #[default]
    Pending,

    /// The client has indicated that this challenge is ready to be validated, but
    /// the server has not yet validated it.
    Processing,

    /// The server has validated this challenge.
    Valid,

    /// The server has validated this challenge, but the validation failed.
    Invalid,
}

/// The challenge authorization token, which combines the provided token
/// with the thumbprint of the account signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAuthorization(String);

impl KeyAuthorization {
    /// Build the key authorization for a token and an account key.
    pub fn new(token: &str, key: &AccountKey) -> KeyAuthorization {
        let thumb = key.as_jwk().thumbprint();
        KeyAuthorization(format!("{token}.{thumb}"))
    }
}

impl AsRef<str> for KeyAuthorization {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<KeyAuthorization> for String {
    fn from(value: KeyAuthorization) -> Self {
        value.0
    }
}

/// A challenge for one domain of an authorization.
///
/// The payload is the key authorization (`token.thumbprint`) which the solver
/// publishes, directly for HTTP-01 or as a digest for DNS-01.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationChallenge {
    domain: String,
    #[serde(rename = "type")]
    kind: ChallengeKind,
    url: Url,
    token: String,
    payload: String,
    #[serde(default)]
    status: ChallengeStatus,
}

impl AuthorizationChallenge {
    /// Create a challenge from its parts, with a payload computed elsewhere.
    pub fn new(
        domain: impl Into<String>,
        kind: impl Into<ChallengeKind>,
        url: Url,
        token: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            kind: kind.into(),
            url,
            token: token.into(),
            payload: payload.into(),
            status: ChallengeStatus::Pending,
        }
    }

    /// Create a challenge, computing the payload as the key authorization for `key`.
    pub fn with_key(
        domain: impl Into<String>,
        kind: impl Into<ChallengeKind>,
        url: Url,
        token: impl Into<String>,
        key: &AccountKey,
    ) -> Self {
        let token = token.into();
        let payload = KeyAuthorization::new(&token, key);
        Self::new(domain, kind, url, token, payload)
    }

    /// Record the status reported by the ACME provider.
    pub fn with_status(mut self, status: ChallengeStatus) -> Self {
        self.status = status;
        self
    }

    /// The domain being authorized.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The kind of challenge - HTTP-01, DNS-01, etc.
    pub fn kind(&self) -> &ChallengeKind {
        &self.kind
    }

    /// The URL of the challenge, which can be used to get updates, or to indicate
    /// that the challenge is ready for validation by the ACME provider.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The token provided by the ACME provider.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The key authorization to publish.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// The last observed status.
    pub fn status(&self) -> ChallengeStatus {
        self.status
    }

    /// Has the provider validated this challenge and found it to be valid?
    pub fn is_valid(&self) -> bool {
        matches!(self.status, ChallengeStatus::Valid)
    }

    /// The request which tells the ACME provider that this challenge is ready to be
    /// verified. Its payload is the empty object `{}`.
    pub fn ready_request<K>(&self, key: K) -> Request<ChallengeReadyRequest>
    where
        K: Into<Key>,
    {
        Request::post(ChallengeReadyRequest, self.url.clone(), key)
    }
}

/// An empty request to indicate that the challenge is ready to be validated.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChallengeReadyRequest;

impl ser::Serialize for ChallengeReadyRequest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let map = serializer.serialize_map(Some(0))?;
        map.end()
    }
}

/// Send a request to a non-ACME HTTP API, treating any non-2xx status as
/// [`AcmeError::Http`].
pub(crate) async fn send(
    transport: &Arc<dyn Transport>,
    method: ::http::Method,
    url: &Url,
    headers: &[(&'static str, &str)],
    body: Option<Vec<u8>>,
) -> Result<::http::Response<Vec<u8>>, AcmeError> {
    let mut builder = ::http::Request::builder().method(method).uri(url.as_str());
    for (name, value) in headers {
        let value = HeaderValue::from_str(value)
            .map_err(|error| AcmeError::Transport(::http::Error::from(error).into()))?;
        builder = builder.header(*name, value);
    }
    if body.is_some() {
        builder = builder.header(::http::header::CONTENT_TYPE, "application/json");
    }

    let request = builder
        .body(body.unwrap_or_default())
        .map_err(|error| AcmeError::Transport(error.into()))?;

    let response = transport.send(request).await?;
    if !response.status().is_success() {
        return Err(AcmeError::Http {
            status: response.status(),
            body: String::from_utf8_lossy(response.body()).into_owned(),
        });
    }

    Ok(response)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kind_names_roundtrip() {
        assert_eq!(ChallengeKind::from("dns-01"), ChallengeKind::Dns01);
        assert_eq!(ChallengeKind::from("http-01").name(), "http-01");
        assert_eq!(
            ChallengeKind::from("gandi-01"),
            ChallengeKind::Other("gandi-01".into())
        );
        assert_eq!(
            serde_json::to_string(&ChallengeKind::TlsAlpn01).unwrap(),
            "\"tls-alpn-01\""
        );
    }

    #[test]
    fn key_authorization_uses_thumbprint() {
        let key = crate::key!("ec-p256");
        let challenge = AuthorizationChallenge::with_key(
            "example.org",
            ChallengeKind::Http01,
            "https://example.com/acme/chall/prV_B7yEyA4".parse().unwrap(),
            "DGyRejmCefe7v4NfDGDKfA",
            &key,
        );
        assert_eq!(
            challenge.payload(),
            format!("DGyRejmCefe7v4NfDGDKfA.{}", key.as_jwk().thumbprint())
        );
        assert_eq!(challenge.status(), ChallengeStatus::Pending);
    }

    #[test]
    fn ready_request_has_empty_object_payload() {
        let key = crate::key!("ec-p256");
        let challenge = AuthorizationChallenge::new(
            "example.org",
            "http-01",
            "https://example.com/acme/chall/prV_B7yEyA4".parse().unwrap(),
            "token",
            "token.thumb",
        );
        let envelope = challenge
            .ready_request(Key::Jwk)
            .envelope(&key, Some("n".into()))
            .unwrap()
            .unwrap();
        assert_eq!(envelope.payload_bytes().unwrap(), b"{}");
    }
}
