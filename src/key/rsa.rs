use base64ct::{Base64UrlUnpadded, Encoding};
use pkcs8::DecodePrivateKey;
use rand_core::OsRng;
use rsa::pkcs1v15;
use rsa::traits::PublicKeyParts;
use signature::{SignatureEncoding, Signer, Verifier};

use super::{jwk::Jwk, KeyError};

/// Modulus sizes for newly generated RSA account keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RsaKeySize {
    /// 2048 bit modulus
    Rsa2048,

    /// 3072 bit modulus
    Rsa3072,

    /// 4096 bit modulus
    Rsa4096,
}

impl RsaKeySize {
    pub(crate) fn random(&self) -> Result<RsaSigningKey, KeyError> {
        let keypair = ::rsa::RsaPrivateKey::new(&mut OsRng, self.bits())?;
        Ok(RsaSigningKey { keypair })
    }

    pub(crate) fn bits(&self) -> usize {
        match self {
            RsaKeySize::Rsa2048 => 2048,
            RsaKeySize::Rsa3072 => 3072,
            RsaKeySize::Rsa4096 => 4096,
        }
    }

    fn from_bits(bits: usize) -> Self {
        match bits {
            ..=2048 => RsaKeySize::Rsa2048,
            2049..=3072 => RsaKeySize::Rsa3072,
            _ => RsaKeySize::Rsa4096,
        }
    }
}

/// RSA account key, always used with PKCS#1 v1.5 and SHA-256 (`RS256`).
pub(crate) struct RsaSigningKey {
    keypair: ::rsa::RsaPrivateKey,
}

impl RsaSigningKey {
    pub(crate) fn from_pkcs8_der(der: &[u8]) -> Result<Self, KeyError> {
        let keypair = ::rsa::RsaPrivateKey::from_pkcs8_der(der)?;
        Ok(Self { keypair })
    }

    pub(crate) fn size(&self) -> RsaKeySize {
        RsaKeySize::from_bits(self.keypair.size() * 8)
    }

    pub(crate) fn as_jwk(&self) -> Jwk {
        Jwk::rsa(
            Base64UrlUnpadded::encode_string(&self.keypair.e().to_bytes_be()),
            Base64UrlUnpadded::encode_string(&self.keypair.n().to_bytes_be()),
        )
    }

    pub(crate) fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        let signer = pkcs1v15::SigningKey::<sha2::Sha256>::new(self.keypair.clone());
        let signature = signer.try_sign(message)?;
        Ok(signature.to_vec())
    }

    pub(crate) fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), KeyError> {
        let verifier = pkcs1v15::VerifyingKey::<sha2::Sha256>::new(self.keypair.to_public_key());
        let signature = pkcs1v15::Signature::try_from(signature)?;
        verifier.verify(message, &signature)?;
        Ok(())
    }
}
