//! JSON Object Signing and Encryption primitives used in RFC 8555
//! to implement the ACME protocol.
//!
//! ACME uses the flattened JSON serialization of a JWS for every authenticated
//! request. The protected header always carries the algorithm, the anti-replay
//! [`Nonce`], and the target URL, plus exactly one of:
//!
//! - `jwk`: the account's public key, used before the account has been registered
//!   with the ACME provider (see [`sign_with_jwk`]).
//! - `kid`: the account URL assigned by the ACME provider, used for every other
//!   request (see [`sign_with_kid`]).
//!
//! The functions here are pure: the [`Nonce`] is provided by the caller, and
//! nothing is retained between calls. [`super::Client`] tracks nonces.

use std::ops::Deref;
use std::sync::Arc;

use serde::{ser, Deserialize, Serialize};

use super::base64;
use super::errors::AcmeError;
use super::Url;

use crate::key::{jwk::Jwk, AccountKey};

pub use crate::key::SignatureAlgorithm;

/// Anti-replay nonce
///
/// This is a token provided by the ACME server. Each nonce may only be used
/// once, and each reply from the ACME server should contain a new nonce.
///
/// A new nonce is also avaiable from the ACME endpoint `new-nonce`.
///
/// The [`Nonce`] here is really just an opaque stirng token. Clients
/// may not assume anything about the structure of the nonce.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nonce(String);

impl AsRef<str> for Nonce {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl From<String> for Nonce {
    fn from(value: String) -> Self {
        Nonce(value)
    }
}

impl From<&str> for Nonce {
    fn from(value: &str) -> Self {
        Nonce(value.to_owned())
    }
}

/// Identifier used by ACME servers for registered accounts
///
/// RFC 8555 specifies that this should be the `GET` resource URL
/// for the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountKeyIdentifier(Arc<Url>);

impl ser::Serialize for AccountKeyIdentifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.deref().serialize(serializer)
    }
}

impl From<Url> for AccountKeyIdentifier {
    fn from(value: Url) -> Self {
        AccountKeyIdentifier(Arc::new(value))
    }
}

impl AccountKeyIdentifier {
    /// Get the underlying URL.
    pub fn to_url(&self) -> Url {
        self.0.deref().clone()
    }
}

impl AsRef<str> for AccountKeyIdentifier {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

/// The body of a signed request.
///
/// An absent body and an empty JSON object are different on the wire: [`Payload::Empty`]
/// encodes to the empty string (used for POST-as-GET), while `Payload::Json(json!({}))`
/// encodes to `base64url("{}")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<P> {
    /// A payload serialized as compact JSON.
    Json(P),

    /// No payload at all.
    Empty,
}

impl Payload<()> {
    /// The empty payload, for requests with no body.
    pub fn empty() -> Self {
        Payload::Empty
    }
}

impl<P> From<Option<P>> for Payload<P> {
    fn from(value: Option<P>) -> Self {
        match value {
            Some(payload) => Payload::Json(payload),
            None => Payload::Empty,
        }
    }
}

impl<P> Payload<P>
where
    P: Serialize,
{
    /// The base64url text of this payload, as placed in the `payload` field.
    pub fn encoded(&self) -> Result<String, serde_json::Error> {
        match self {
            Payload::Json(payload) => base64::Base64JSON(payload).serialized_value(),
            Payload::Empty => Ok(String::new()),
        }
    }
}

/// The signed header values for the JWS.
///
/// RFC 8555 only supports "Protected" / "Registered" headers, and only a
/// subset of those fields. Fields which are `None` are left out.
#[derive(Debug, Clone, Serialize)]
struct ProtectedHeader<'a> {
    alg: SignatureAlgorithm,
    #[serde(skip_serializing_if = "Option::is_none")]
    jwk: Option<Jwk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'a AccountKeyIdentifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<Nonce>,
    url: &'a Url,
}

/// The flattened JWS which is sent as the body of every authenticated ACME request.
///
/// Each field is already base64url encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    /// The encoded protected header.
    pub protected: String,

    /// The encoded payload, or the empty string.
    pub payload: String,

    /// The encoded signature over `protected.payload`.
    pub signature: String,
}

impl SignedEnvelope {
    /// The bytes which were signed to produce [`SignedEnvelope::signature`].
    pub fn signing_input(&self) -> String {
        signing_input(&self.protected, &self.payload)
    }

    /// Decode the protected header as a JSON value.
    pub fn protected_header(&self) -> Result<serde_json::Value, AcmeError> {
        let header = base64::decode(&self.protected).map_err(AcmeError::base64)?;
        serde_json::from_slice(&header).map_err(AcmeError::de)
    }

    /// Decode the payload bytes. An empty payload decodes to no bytes.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, AcmeError> {
        base64::decode(&self.payload).map_err(AcmeError::base64)
    }

    /// Decode the raw signature bytes.
    pub fn signature_bytes(&self) -> Result<Vec<u8>, AcmeError> {
        base64::decode(&self.signature).map_err(AcmeError::base64)
    }

    /// Serialize this envelope as the JSON body of an HTTP request.
    pub fn to_body(&self) -> Result<Vec<u8>, AcmeError> {
        serde_json::to_vec(self).map_err(AcmeError::ser)
    }
}

fn signing_input(protected: &str, payload: &str) -> String {
    format!("{protected}.{payload}")
}

/// Sign a request with the account's public key embedded as a `jwk`.
///
/// This is only valid before the account is known to the ACME provider, e.g. for
/// `newAccount` or for `revokeCert` signed by the certificate key.
pub fn sign_with_jwk<P>(
    key: &AccountKey,
    url: &Url,
    nonce: Option<Nonce>,
    payload: &Payload<P>,
) -> Result<SignedEnvelope, AcmeError>
where
    P: Serialize,
{
    let header = ProtectedHeader {
        alg: key.algorithm(),
        jwk: Some(key.as_jwk()),
        kid: None,
        nonce,
        url,
    };
    sign_envelope(key, &header, payload)
}

/// Sign a request with the account URL as the `kid`.
pub fn sign_with_kid<P>(
    key: &AccountKey,
    url: &Url,
    account: &AccountKeyIdentifier,
    nonce: Option<Nonce>,
    payload: &Payload<P>,
) -> Result<SignedEnvelope, AcmeError>
where
    P: Serialize,
{
    let header = ProtectedHeader {
        alg: key.algorithm(),
        jwk: None,
        kid: Some(account),
        nonce,
        url,
    };
    sign_envelope(key, &header, payload)
}

fn sign_envelope<P>(
    key: &AccountKey,
    header: &ProtectedHeader<'_>,
    payload: &Payload<P>,
) -> Result<SignedEnvelope, AcmeError>
where
    P: Serialize,
{
    let protected = base64::Base64JSON(header)
        .serialized_value()
        .map_err(AcmeError::ser)?;
    let payload = payload.encoded().map_err(AcmeError::ser)?;
    let signature = key.sign(signing_input(&protected, &payload).as_bytes())?;

    Ok(SignedEnvelope {
        protected,
        payload,
        signature: base64::encode(signature),
    })
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn url() -> Url {
        "https://letsencrypt.test/new-orderz".parse().unwrap()
    }

    fn account() -> AccountKeyIdentifier {
        AccountKeyIdentifier::from(
            "https://letsencrypt.test/account/foo-bar"
                .parse::<Url>()
                .unwrap(),
        )
    }

    #[test]
    fn payload_encodings_are_distinct() {
        let key = crate::key!("ec-p256");
        let nonce = Nonce::from("<nonce>");

        let object = sign_with_kid(
            &key,
            &url(),
            &account(),
            Some(nonce.clone()),
            &Payload::Json(json!({"foo": "bar"})),
        )
        .unwrap();
        assert_eq!(object.payload_bytes().unwrap(), br#"{"foo":"bar"}"#);

        let empty_object = sign_with_kid(
            &key,
            &url(),
            &account(),
            Some(nonce.clone()),
            &Payload::Json(json!({})),
        )
        .unwrap();
        assert_eq!(empty_object.payload_bytes().unwrap(), b"{}");

        let absent = sign_with_kid(&key, &url(), &account(), Some(nonce), &Payload::empty())
            .unwrap();
        assert_eq!(absent.payload, "");
        assert!(absent.payload_bytes().unwrap().is_empty());
    }

    #[test]
    fn jwk_mode_payloads() {
        let key = crate::key!("rsa-2048");

        let object = sign_with_jwk(
            &key,
            &url(),
            Some("n".into()),
            &Payload::Json(json!({"foo": "bar"})),
        )
        .unwrap();
        assert_eq!(object.payload_bytes().unwrap(), br#"{"foo":"bar"}"#);

        let empty = sign_with_jwk(&key, &url(), Some("n".into()), &Payload::Json(json!({})))
            .unwrap();
        assert_eq!(empty.payload_bytes().unwrap(), b"{}");

        let absent = sign_with_jwk(&key, &url(), Some("n".into()), &Payload::empty()).unwrap();
        assert_eq!(absent.payload, "");
    }

    #[test]
    fn jwk_header_has_key_and_nonce() {
        let key = crate::key!("ec-p256");
        let envelope =
            sign_with_jwk(&key, &url(), Some("abc123".into()), &Payload::empty()).unwrap();

        let header = envelope.protected_header().unwrap();
        assert_eq!(header["alg"], "ES256");
        assert_eq!(header["nonce"], "abc123");
        assert_eq!(header["url"], "https://letsencrypt.test/new-orderz");
        assert_eq!(header["jwk"]["kty"], "EC");
        assert_eq!(header["jwk"]["crv"], "P-256");
        assert!(header.get("kid").is_none());
    }

    #[test]
    fn kid_header_has_account_and_nonce() {
        let key = crate::key!("ec-p384");
        let envelope = sign_with_kid(
            &key,
            &url(),
            &account(),
            Some("abc123".into()),
            &Payload::empty(),
        )
        .unwrap();

        let header = envelope.protected_header().unwrap();
        assert_eq!(header["alg"], "ES384");
        assert_eq!(header["nonce"], "abc123");
        assert_eq!(header["kid"], "https://letsencrypt.test/account/foo-bar");
        assert!(header.get("jwk").is_none());
    }

    #[test]
    fn missing_nonce_is_omitted() {
        let key = crate::key!("ec-p256");
        let envelope = sign_with_jwk(&key, &url(), None, &Payload::empty()).unwrap();
        assert!(envelope.protected_header().unwrap().get("nonce").is_none());
    }

    #[test]
    fn signature_covers_protected_and_payload() {
        for key in [crate::key!("ec-p256"), crate::key!("ec-p521"), crate::key!("rsa-2048")] {
            let envelope = sign_with_jwk(
                &key,
                &url(),
                Some("nonce".into()),
                &Payload::Json(json!({"termsOfServiceAgreed": true})),
            )
            .unwrap();

            let signature = envelope.signature_bytes().unwrap();
            key.verify(envelope.signing_input().as_bytes(), &signature)
                .unwrap();
            assert!(key.verify(envelope.payload.as_bytes(), &signature).is_err());
        }
    }

    #[test]
    fn envelope_wire_shape() {
        let key = crate::key!("ec-p256");
        let envelope = sign_with_jwk(&key, &url(), Some("n".into()), &Payload::empty()).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&envelope.to_body().unwrap()).unwrap();
        let object = body.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert!(object.contains_key("protected"));
        assert!(object.contains_key("payload"));
        assert!(object.contains_key("signature"));
    }
}
