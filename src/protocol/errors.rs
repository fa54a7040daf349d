//! Errors which occur when working with an ACME Protocol
//!
//! ACME providers report failures as RFC 7807 problem documents. [`classify`]
//! turns a failed response into exactly one [`AcmeError`], picking a
//! distinguished variant for the problem types callers commonly need to branch
//! on, and falling back to [`AcmeError::Server`] (which keeps the raw `type`
//! string) for everything else.

use http::{HeaderValue, StatusCode};
use thiserror::Error;

use super::transport::TransportError;
use crate::key::KeyError;

pub use self::acme::{AcmeErrorCode, AcmeErrorDocument};

/// Unified error type for errors arising from the ACME protocol.
#[derive(Debug, Error)]
pub enum AcmeError {
    /// The underlying transport failed to send the request or receive the response.
    #[error("An error occured during the network request: {0}")]
    Transport(#[from] TransportError),

    /// The response was expected to be JSON, but could not be parsed.
    #[error("Expected a JSON response: {source}")]
    ExpectedJson {
        /// The raw response body.
        body: String,

        /// The JSON parsing error.
        #[source]
        source: serde_json::Error,
    },

    /// The ACME provider indicated that an invalid nonce was used.
    #[error("The ACME service rejected the nonce: {0}")]
    BadNonce(#[source] AcmeErrorDocument),

    /// The ACME provider is rate limiting this client.
    #[error("Rate limited by the ACME service: {0}")]
    RateLimited(#[source] AcmeErrorDocument),

    /// The client lacks authorization for the requested action.
    #[error("Unauthorized by the ACME service: {0}")]
    Unauthorized(#[source] AcmeErrorDocument),

    /// The request was malformed.
    #[error("Malformed request: {0}")]
    Malformed(#[source] AcmeErrorDocument),

    /// Validation of an identifier failed (CAA, DNS, connection, TLS, incorrect
    /// response or a rejected identifier).
    #[error("Identifier validation failed: {0}")]
    ValidationFailed(#[source] AcmeErrorDocument),

    /// The ACME provider returned any other problem document.
    #[error("An error occured with the ACME service: {0}")]
    Server(#[source] AcmeErrorDocument),

    /// A non-ACME HTTP API (e.g. a DNS provider) returned an error status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// Response status.
        status: StatusCode,

        /// Response body, decoded lossily as UTF-8.
        body: String,
    },

    /// The account key is of a type which can't sign ACME requests.
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// An error occured while loading or using the account key.
    #[error("An error occured with the account key: {0}")]
    Key(#[source] KeyError),

    /// The signing algorithm encountered an error.
    #[error("An error occured while signing the JWS token: {0}")]
    Signing(#[source] signature::Error),

    /// An error was encountered while trying to deserialize a JSON payload.
    #[error("An error occured deserializing JSON: {0}")]
    JsonDeserialize(#[source] serde_json::Error),

    /// An error was encountered while trying to serialize the JSON payload of the request.
    #[error("An error occured serializing JSON: {0}")]
    JsonSerialize(#[source] serde_json::Error),

    /// A value was not valid base64url.
    #[error("Invalid base64url data: {0}")]
    Base64(base64ct::Error),

    /// A URL could not be parsed.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The nonce header returned was not valid.
    #[error("The nonce header returned was not valid: {0:?}")]
    InvalidNonce(Option<HeaderValue>),

    /// No nonce was available, and no new-nonce URL is configured.
    #[error("No Nonce header was returned with the request")]
    MissingNonce,

    /// No solver is registered for this challenge type.
    #[error("{0} is not a known challenge type")]
    UnknownChallenge(String),
}

impl AcmeError {
    /// Constructor for a deserialization error.
    pub fn de(error: serde_json::Error) -> Self {
        AcmeError::JsonDeserialize(error)
    }

    /// Constructor for a serialization error.
    pub fn ser(error: serde_json::Error) -> Self {
        AcmeError::JsonSerialize(error)
    }

    /// Constructor for a base64 decoding error.
    pub fn base64(error: base64ct::Error) -> Self {
        AcmeError::Base64(error)
    }

    /// The problem document, if this error came from the ACME provider.
    pub fn document(&self) -> Option<&AcmeErrorDocument> {
        match self {
            AcmeError::BadNonce(doc)
            | AcmeError::RateLimited(doc)
            | AcmeError::Unauthorized(doc)
            | AcmeError::Malformed(doc)
            | AcmeError::ValidationFailed(doc)
            | AcmeError::Server(doc) => Some(doc),
            _ => None,
        }
    }

    /// Whether this is a stale nonce error, which should be retried with a fresh nonce.
    pub fn is_bad_nonce(&self) -> bool {
        matches!(self, AcmeError::BadNonce(_))
    }
}

impl From<KeyError> for AcmeError {
    fn from(error: KeyError) -> Self {
        match error {
            KeyError::UnsupportedKeyType(kind) => AcmeError::UnsupportedKeyType(kind),
            KeyError::Signing(error) => AcmeError::Signing(error),
            error => AcmeError::Key(error),
        }
    }
}

impl From<AcmeErrorDocument> for AcmeError {
    fn from(document: AcmeErrorDocument) -> Self {
        match document.kind() {
            AcmeErrorCode::BadNonce => AcmeError::BadNonce(document),
            AcmeErrorCode::RateLimited => AcmeError::RateLimited(document),
            AcmeErrorCode::Unauthorized => AcmeError::Unauthorized(document),
            AcmeErrorCode::Malformed => AcmeError::Malformed(document),
            AcmeErrorCode::Caa
            | AcmeErrorCode::Dns
            | AcmeErrorCode::Connection
            | AcmeErrorCode::Tls
            | AcmeErrorCode::IncorrectResponse
            | AcmeErrorCode::RejectedIdentifier => AcmeError::ValidationFailed(document),
            _ => AcmeError::Server(document),
        }
    }
}

/// Classify a failed response from an ACME provider.
///
/// This never fails: bodies which are not problem documents degrade to an
/// `about:blank` document carrying the HTTP status and the body text, which
/// classifies as [`AcmeError::Server`].
pub fn classify(status: StatusCode, body: &[u8]) -> AcmeError {
    let document = match serde_json::from_slice::<AcmeErrorDocument>(body) {
        Ok(document) => document.with_default_status(status),
        Err(error) => {
            tracing::debug!(%status, "Response is not a problem document: {error}");
            AcmeErrorDocument::from_http(status, &String::from_utf8_lossy(body))
        }
    };

    tracing::trace!(%status, %document, "Classified error response");
    document.into()
}

mod acme {
    use std::fmt;

    use http::StatusCode;
    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    const URN_PREFIX: &str = "urn:ietf:params:acme:error:";
    const ABOUT_BLANK: &str = "about:blank";

    /// Error document returned by ACME servers when a request has caused an
    /// error.
    ///
    /// ACME Error documents follow RFC 7807 "Problem Details for HTTP APIs".
    #[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(from = "RawErrorInfo")]
    #[error("{code}: {detail}")]
    pub struct AcmeErrorDocument {
        #[serde(rename = "type")]
        r#type: String,
        #[serde(skip)]
        code: AcmeErrorCode,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        detail: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        subproblems: Vec<AcmeErrorDocument>,
    }

    impl AcmeErrorDocument {
        /// A generic document for a response which did not carry a problem document.
        pub fn from_http(status: StatusCode, body: &str) -> Self {
            let detail = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("").to_owned()
            } else {
                body.to_owned()
            };

            AcmeErrorDocument {
                r#type: ABOUT_BLANK.to_owned(),
                code: AcmeErrorCode::Blank,
                title: None,
                status: Some(status.as_u16()),
                detail,
                subproblems: Vec::new(),
            }
        }

        pub(super) fn with_default_status(mut self, status: StatusCode) -> Self {
            self.status.get_or_insert(status.as_u16());
            self
        }

        /// The error code provided in the ACME error document.
        pub fn kind(&self) -> &AcmeErrorCode {
            &self.code
        }

        /// The `type` field, exactly as sent by the ACME provider.
        pub fn raw_type(&self) -> &str {
            &self.r#type
        }

        /// The HTTP status, from the document or the response.
        pub fn status(&self) -> Option<u16> {
            self.status
        }

        /// The short summary of the problem type, if provided.
        pub fn title(&self) -> Option<&str> {
            self.title.as_deref()
        }

        /// The error message, intended to be human readable, in the
        /// ACME error document.
        pub fn message(&self) -> &str {
            &self.detail
        }

        /// Per-identifier problems, for `compound` errors.
        pub fn subproblems(&self) -> &[AcmeErrorDocument] {
            &self.subproblems
        }
    }

    /// Specific code indicating the kind of error that an ACME server
    /// encountered.
    ///
    /// These codes are specified in RFC 8555 section 6.7.
    #[derive(Debug, Serialize, Clone, PartialEq, Eq, Default)]
    #[non_exhaustive]
    pub enum AcmeErrorCode {
        /// The request specified an account that does not exist.
        AccountDoesNotExist,
        /// The request specified a certificate to be revoked that has already been revoked.
        AlreadyRevoked,
        /// The CSR is unacceptable (e.g., due to a short key).
        BadCsr,
        /// A bad nonce was sent with the request. Try again with a new nonce.
        BadNonce,
        /// The JWS was signed by a public key the server does not support.
        BadPublicKey,
        /// The revocation reason provided is not allowed by the server.
        BadRevocationReason,
        /// The JWS was signed with an algorithm the server does not support.
        BadSignatureAlgorithm,
        /// Certification Authority Authorization (CAA) records forbid issuance.
        Caa,
        /// Specific error conditions are indicated in the "subproblems" array.
        Compound,
        /// The server could not connect to validation target.
        Connection,
        /// There was a problem with a DNS query during identifier validation.
        Dns,
        /// The request must include a value for the "externalAccountBinding" field.
        ExternalAccountRequired,
        /// Response received didn't match the challenge's requirements.
        IncorrectResponse,
        /// A contact URL for an account was invalid.
        InvalidContact,
        /// The request message was malformed.
        Malformed,
        /// The request attempted to finalize an order that is not ready.
        OrderNotReady,
        /// The request exceeds a rate limit.
        RateLimited,
        /// The server will not issue certificates for the identifier.
        RejectedIdentifier,
        /// The server experienced an internal error.
        ServerInternal,
        /// The server received a TLS error during validation.
        Tls,
        /// The client lacks sufficient authorization.
        Unauthorized,
        /// A contact URL for an account used an unsupported protocol scheme.
        UnsupportedContact,
        /// An identifier is of an unsupported type.
        UnsupportedIdentifier,
        /// Visit the "instance" URL and take actions specified there.
        UserActionRequired,

        /// Some other error occured. Holds the raw `type` value.
        Other(String),

        /// The problem document had no `type`.
        #[default]
        Blank,
    }

    impl fmt::Display for AcmeErrorCode {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                AcmeErrorCode::BadNonce => f.write_str("an invalid nonce was sent"),
                AcmeErrorCode::RateLimited => f.write_str("rate limit exceeded"),
                AcmeErrorCode::Unauthorized => f.write_str("unauthorized"),
                AcmeErrorCode::Malformed => f.write_str("malformed request"),
                AcmeErrorCode::Other(message) => f.write_str(message),
                AcmeErrorCode::Blank => f.write_str(ABOUT_BLANK),
                other => match other.tag() {
                    Some(tag) => f.write_str(tag),
                    None => f.write_str("unknown"),
                },
            }
        }
    }

    impl AcmeErrorCode {
        /// The final segment of the `urn:ietf:params:acme:error:` URN for this code.
        pub fn tag(&self) -> Option<&'static str> {
            let tag = match self {
                AcmeErrorCode::AccountDoesNotExist => "accountDoesNotExist",
                AcmeErrorCode::AlreadyRevoked => "alreadyRevoked",
                AcmeErrorCode::BadCsr => "badCSR",
                AcmeErrorCode::BadNonce => "badNonce",
                AcmeErrorCode::BadPublicKey => "badPublicKey",
                AcmeErrorCode::BadRevocationReason => "badRevocationReason",
                AcmeErrorCode::BadSignatureAlgorithm => "badSignatureAlgorithm",
                AcmeErrorCode::Caa => "caa",
                AcmeErrorCode::Compound => "compound",
                AcmeErrorCode::Connection => "connection",
                AcmeErrorCode::Dns => "dns",
                AcmeErrorCode::ExternalAccountRequired => "externalAccountRequired",
                AcmeErrorCode::IncorrectResponse => "incorrectResponse",
                AcmeErrorCode::InvalidContact => "invalidContact",
                AcmeErrorCode::Malformed => "malformed",
                AcmeErrorCode::OrderNotReady => "orderNotReady",
                AcmeErrorCode::RateLimited => "rateLimited",
                AcmeErrorCode::RejectedIdentifier => "rejectedIdentifier",
                AcmeErrorCode::ServerInternal => "serverInternal",
                AcmeErrorCode::Tls => "tls",
                AcmeErrorCode::Unauthorized => "unauthorized",
                AcmeErrorCode::UnsupportedContact => "unsupportedContact",
                AcmeErrorCode::UnsupportedIdentifier => "unsupportedIdentifier",
                AcmeErrorCode::UserActionRequired => "userActionRequired",
                AcmeErrorCode::Other(_) | AcmeErrorCode::Blank => return None,
            };
            Some(tag)
        }
    }

    impl From<String> for AcmeErrorCode {
        fn from(value: String) -> Self {
            if value == ABOUT_BLANK {
                return AcmeErrorCode::Blank;
            }

            let Some(tag) = value.strip_prefix(URN_PREFIX) else {
                tracing::warn!("Unexpected URN: {value}");
                return AcmeErrorCode::Other(value);
            };

            match tag {
                "accountDoesNotExist" => AcmeErrorCode::AccountDoesNotExist,
                "alreadyRevoked" => AcmeErrorCode::AlreadyRevoked,
                "badCSR" => AcmeErrorCode::BadCsr,
                "badNonce" => AcmeErrorCode::BadNonce,
                "badPublicKey" => AcmeErrorCode::BadPublicKey,
                "badRevocationReason" => AcmeErrorCode::BadRevocationReason,
                "badSignatureAlgorithm" => AcmeErrorCode::BadSignatureAlgorithm,
                "caa" => AcmeErrorCode::Caa,
                "compound" => AcmeErrorCode::Compound,
                "connection" => AcmeErrorCode::Connection,
                "dns" => AcmeErrorCode::Dns,
                "externalAccountRequired" => AcmeErrorCode::ExternalAccountRequired,
                "incorrectResponse" => AcmeErrorCode::IncorrectResponse,
                "invalidContact" => AcmeErrorCode::InvalidContact,
                "malformed" => AcmeErrorCode::Malformed,
                "orderNotReady" => AcmeErrorCode::OrderNotReady,
                "rateLimited" => AcmeErrorCode::RateLimited,
                "rejectedIdentifier" => AcmeErrorCode::RejectedIdentifier,
                "serverInternal" => AcmeErrorCode::ServerInternal,
                "tls" => AcmeErrorCode::Tls,
                "unauthorized" => AcmeErrorCode::Unauthorized,
                "unsupportedContact" => AcmeErrorCode::UnsupportedContact,
                "unsupportedIdentifier" => AcmeErrorCode::UnsupportedIdentifier,
                "userActionRequired" => AcmeErrorCode::UserActionRequired,
                _ => AcmeErrorCode::Other(value),
            }
        }
    }

    /// Deserializable format for an ACME error document.
    #[derive(Debug, Clone, Deserialize)]
    struct RawErrorInfo {
        #[serde(default)]
        r#type: Option<String>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        status: Option<u16>,
        #[serde(default)]
        detail: Option<String>,
        #[serde(default)]
        subproblems: Vec<RawErrorInfo>,
    }

    impl From<RawErrorInfo> for AcmeErrorDocument {
        fn from(value: RawErrorInfo) -> Self {
            let r#type = value.r#type.unwrap_or_else(|| ABOUT_BLANK.to_owned());
            AcmeErrorDocument {
                code: r#type.clone().into(),
                r#type,
                title: value.title,
                status: value.status,
                detail: value.detail.unwrap_or_default(),
                subproblems: value.subproblems.into_iter().map(Into::into).collect(),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rate_limited_is_distinguished() {
        let body = br#"{
            "type": "urn:ietf:params:acme:error:rateLimited",
            "detail": "too many new orders recently"
        }"#;
        let error = classify(StatusCode::BAD_REQUEST, body);
        let AcmeError::RateLimited(document) = error else {
            panic!("expected a rate limit error, got {error:?}");
        };
        assert_eq!(document.message(), "too many new orders recently");
        assert_eq!(document.status(), Some(400));
    }

    #[test]
    fn unknown_code_keeps_raw_type() {
        let body = br#"{"type": "urn:example:error:somethingNew", "detail": "new"}"#;
        let error = classify(StatusCode::BAD_REQUEST, body);
        let AcmeError::Server(document) = error else {
            panic!("expected a generic server error, got {error:?}");
        };
        assert_eq!(document.raw_type(), "urn:example:error:somethingNew");
        assert_eq!(
            document.kind(),
            &AcmeErrorCode::Other("urn:example:error:somethingNew".into())
        );
    }

    #[test]
    fn unknown_acme_urn_keeps_raw_type() {
        let body = br#"{"type": "urn:ietf:params:acme:error:futureThing", "detail": "?"}"#;
        let error = classify(StatusCode::FORBIDDEN, body);
        let AcmeError::Server(document) = error else {
            panic!("expected a generic server error, got {error:?}");
        };
        assert_eq!(document.raw_type(), "urn:ietf:params:acme:error:futureThing");
    }

    #[test]
    fn distinguished_codes() {
        let classified = |tag: &str| {
            let body = format!(r#"{{"type": "urn:ietf:params:acme:error:{tag}", "detail": "x"}}"#);
            classify(StatusCode::BAD_REQUEST, body.as_bytes())
        };

        assert!(matches!(classified("badNonce"), AcmeError::BadNonce(_)));
        assert!(matches!(classified("unauthorized"), AcmeError::Unauthorized(_)));
        assert!(matches!(classified("malformed"), AcmeError::Malformed(_)));
        assert!(matches!(classified("dns"), AcmeError::ValidationFailed(_)));
        assert!(matches!(classified("caa"), AcmeError::ValidationFailed(_)));
        assert!(matches!(
            classified("incorrectResponse"),
            AcmeError::ValidationFailed(_)
        ));
        assert!(matches!(classified("serverInternal"), AcmeError::Server(_)));
    }

    #[test]
    fn malformed_body_degrades() {
        let error = classify(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>");
        let AcmeError::Server(document) = error else {
            panic!("expected a generic server error, got {error:?}");
        };
        assert_eq!(document.raw_type(), "about:blank");
        assert_eq!(document.status(), Some(502));
        assert_eq!(document.message(), "<html>bad gateway</html>");

        let empty = classify(StatusCode::NOT_FOUND, b"");
        assert_eq!(empty.document().unwrap().message(), "Not Found");
    }

    #[test]
    fn success_status_still_classifies() {
        let error = classify(StatusCode::OK, b"{}");
        let AcmeError::Server(document) = error else {
            panic!("expected a generic server error, got {error:?}");
        };
        assert_eq!(document.raw_type(), "about:blank");
        assert_eq!(document.status(), Some(200));
        assert_eq!(document.message(), "");
    }

    #[test]
    fn problem_document_fixture() {
        let response = crate::response!("bad-nonce.http");
        let error = classify(response.status(), response.body().as_bytes());
        assert!(error.is_bad_nonce());
        assert_eq!(
            error.document().unwrap().message(),
            "JWS has an invalid anti-replay nonce"
        );
    }

    #[test]
    fn compound_subproblems() {
        let body = br#"{
            "type": "urn:ietf:params:acme:error:compound",
            "detail": "Errors during validation",
            "status": 403,
            "subproblems": [
                {"type": "urn:ietf:params:acme:error:caa", "detail": "CAA forbids"}
            ]
        }"#;
        let error = classify(StatusCode::FORBIDDEN, body);
        let document = error.document().unwrap();
        assert_eq!(document.kind(), &AcmeErrorCode::Compound);
        assert_eq!(document.subproblems()[0].kind(), &AcmeErrorCode::Caa);
    }
}
