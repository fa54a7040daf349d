//! ECDSA account keys over the NIST curves

use base64ct::{Base64UrlUnpadded, Encoding};
use elliptic_curve::sec1::ToEncodedPoint;
use pkcs8::DecodePrivateKey;
use rand_core::OsRng;
use signature::{Signer, Verifier};

use super::{jwk::Jwk, KeyError, SignatureAlgorithm};

/// Named elliptic curves supported for account keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcdsaAlgorithm {
    /// The NIST P-256 (a.k.a. secp256r1, prime256v1) elliptic curve.
    P256,
    /// The NIST P-384 (a.k.a. secp384r1) elliptic curve.
    P384,
    /// The NIST P-521 (a.k.a. secp521r1) elliptic curve.
    P521,
}

impl EcdsaAlgorithm {
    pub(crate) fn random(&self) -> EcdsaSigningKey {
        match self {
            EcdsaAlgorithm::P256 => EcdsaSigningKey::P256(p256::SecretKey::random(&mut OsRng)),
            EcdsaAlgorithm::P384 => EcdsaSigningKey::P384(p384::SecretKey::random(&mut OsRng)),
            EcdsaAlgorithm::P521 => EcdsaSigningKey::P521(p521::SecretKey::random(&mut OsRng)),
        }
    }

    /// The JWS algorithm, which pairs the curve with a digest of matching size.
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            EcdsaAlgorithm::P256 => SignatureAlgorithm::ES256,
            EcdsaAlgorithm::P384 => SignatureAlgorithm::ES384,
            EcdsaAlgorithm::P521 => SignatureAlgorithm::ES512,
        }
    }

    fn crv(&self) -> &'static str {
        match self {
            EcdsaAlgorithm::P256 => "P-256",
            EcdsaAlgorithm::P384 => "P-384",
            EcdsaAlgorithm::P521 => "P-521",
        }
    }
}

/// Implements the ECDSA signature scheme across
/// varying elliptic curve cryptography algorithms
pub(crate) enum EcdsaSigningKey {
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(p521::SecretKey),
}

impl EcdsaSigningKey {
    pub(crate) fn from_pkcs8_der(der: &[u8], algorithm: EcdsaAlgorithm) -> Result<Self, KeyError> {
        Ok(match algorithm {
            EcdsaAlgorithm::P256 => EcdsaSigningKey::P256(p256::SecretKey::from_pkcs8_der(der)?),
            EcdsaAlgorithm::P384 => EcdsaSigningKey::P384(p384::SecretKey::from_pkcs8_der(der)?),
            EcdsaAlgorithm::P521 => EcdsaSigningKey::P521(p521::SecretKey::from_pkcs8_der(der)?),
        })
    }

    pub(crate) fn curve(&self) -> EcdsaAlgorithm {
        match self {
            EcdsaSigningKey::P256(_) => EcdsaAlgorithm::P256,
            EcdsaSigningKey::P384(_) => EcdsaAlgorithm::P384,
            EcdsaSigningKey::P521(_) => EcdsaAlgorithm::P521,
        }
    }

    /// Uncompressed SEC1 public point.
    fn public_point(&self) -> Vec<u8> {
        match self {
            EcdsaSigningKey::P256(key) => key.public_key().to_encoded_point(false).as_bytes().to_vec(),
            EcdsaSigningKey::P384(key) => key.public_key().to_encoded_point(false).as_bytes().to_vec(),
            EcdsaSigningKey::P521(key) => key.public_key().to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    pub(crate) fn as_jwk(&self) -> Jwk {
        // Uncompressed points are 0x04 || x || y with equal-width coordinates.
        let point = self.public_point();
        let (x, y) = point[1..].split_at((point.len() - 1) / 2);
        Jwk::elliptic_curve(
            self.curve().crv(),
            Base64UrlUnpadded::encode_string(x),
            Base64UrlUnpadded::encode_string(y),
        )
    }

    pub(crate) fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        match self {
            EcdsaSigningKey::P256(key) => {
                let signer = p256::ecdsa::SigningKey::from(key);
                let signature: p256::ecdsa::Signature = signer.try_sign(message)?;
                Ok(signature.to_bytes().to_vec())
            }
            EcdsaSigningKey::P384(key) => {
                let signer = p384::ecdsa::SigningKey::from(key);
                let signature: p384::ecdsa::Signature = signer.try_sign(message)?;
                Ok(signature.to_bytes().to_vec())
            }
            EcdsaSigningKey::P521(key) => {
                let signer = p521::ecdsa::SigningKey::from_bytes(&key.to_bytes())?;
                let signature: p521::ecdsa::Signature = signer.try_sign(message)?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }

    pub(crate) fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), KeyError> {
        let point = self.public_point();
        match self {
            EcdsaSigningKey::P256(_) => {
                let verifier = p256::ecdsa::VerifyingKey::from_sec1_bytes(&point)?;
                let signature = p256::ecdsa::Signature::from_slice(signature)?;
                verifier.verify(message, &signature)?;
            }
            EcdsaSigningKey::P384(_) => {
                let verifier = p384::ecdsa::VerifyingKey::from_sec1_bytes(&point)?;
                let signature = p384::ecdsa::Signature::from_slice(signature)?;
                verifier.verify(message, &signature)?;
            }
            EcdsaSigningKey::P521(_) => {
                let verifier = p521::ecdsa::VerifyingKey::from_sec1_bytes(&point)?;
                let signature = p521::ecdsa::Signature::from_slice(signature)?;
                verifier.verify(message, &signature)?;
            }
        }
        Ok(())
    }
}
