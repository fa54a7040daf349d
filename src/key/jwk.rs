//! JSON Web Keys and thumbprints
use std::fmt;

use base64ct::Encoding;
use serde::ser::{self, SerializeStruct};
use sha2::Digest;

/// JSON Web Key structure for the public half of an account key.
///
/// JWK serializes the information required to verify a signature
/// in a well-known JSON format. This is used to initially provide
/// a key for an ACME account, in the `jwk` field of the protected header.
///
/// Only the required members are serialized, in lexicographic order, so the
/// serialized form is also the RFC 7638 input used by [`Jwk::thumbprint`].
#[derive(Clone, PartialEq, Eq)]
pub struct Jwk(InnerJwk);

#[derive(Clone, PartialEq, Eq)]
enum InnerJwk {
    EllipticCurve {
        crv: &'static str,
        x: String,
        y: String,
    },
    Rsa {
        e: String,
        n: String,
    },
}

impl Jwk {
    pub(crate) fn elliptic_curve(crv: &'static str, x: String, y: String) -> Self {
        Jwk(InnerJwk::EllipticCurve { crv, x, y })
    }

    pub(crate) fn rsa(e: String, n: String) -> Self {
        Jwk(InnerJwk::Rsa { e, n })
    }

    /// The `kty` member of this key.
    pub fn key_type(&self) -> &'static str {
        match &self.0 {
            InnerJwk::EllipticCurve { .. } => "EC",
            InnerJwk::Rsa { .. } => "RSA",
        }
    }

    /// An RFC 7638 thumbprint, which uniquely identifies this JWS cryptographic
    /// key.
    ///
    /// The thumbprint hash value is used to build the key authorization
    /// for ACME challenges.
    pub fn thumbprint(&self) -> String {
        let thumb = serde_json::to_vec(&self).expect("Valid JSON format");

        let mut hasher = sha2::Sha256::new();
        hasher.update(&thumb);
        let digest = hasher.finalize();
        base64ct::Base64UrlUnpadded::encode_string(&digest)
    }
}

impl fmt::Debug for Jwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Jwk").field(&self.key_type()).finish()
    }
}

impl ser::Serialize for Jwk {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match &self.0 {
            InnerJwk::EllipticCurve { crv, x, y } => {
                let mut state = serializer.serialize_struct("Jwk", 4)?;
                state.serialize_field("crv", crv)?;
                state.serialize_field("kty", "EC")?;
                state.serialize_field("x", x)?;
                state.serialize_field("y", y)?;
                state.end()
            }
            InnerJwk::Rsa { e, n } => {
                let mut state = serializer.serialize_struct("Jwk", 3)?;
                state.serialize_field("e", e)?;
                state.serialize_field("kty", "RSA")?;
                state.serialize_field("n", n)?;
                state.end()
            }
        }
    }
}
