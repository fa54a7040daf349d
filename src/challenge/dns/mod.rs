//! DNS-01 challenges.
//!
//! The proof for a DNS-01 challenge is a TXT record at `_acme-challenge.{domain}.`
//! holding the base64url encoded SHA-256 digest of the key authorization.
//! Wildcard domains share the record of their base domain.

use sha2::Digest;

use super::AuthorizationChallenge;
use crate::protocol::base64;

mod gandi;
mod validator;

pub use self::gandi::{GandiConfig, GandiRecord, GandiSolver};
pub use self::validator::{DnsValidator, DnsValidatorConfig, HickoryResolver, TxtResolver};

/// Name of the record which holds the challenge proof.
pub const ACME_CHALLENGE_RECORD: &str = "_acme-challenge";

/// Derives the TXT record name and value for a DNS-01 challenge.
#[derive(Debug, Default, Clone, Copy)]
pub struct DnsDataExtractor;

impl DnsDataExtractor {
    /// The fully qualified record name, with a trailing dot.
    pub fn record_name(&self, challenge: &AuthorizationChallenge) -> String {
        let domain = challenge.domain().trim_end_matches('.');
        let domain = domain.strip_prefix("*.").unwrap_or(domain);
        format!("{ACME_CHALLENGE_RECORD}.{domain}.")
    }

    /// The record value.
    pub fn record_value(&self, challenge: &AuthorizationChallenge) -> String {
        base64::encode(&sha2::Sha256::digest(challenge.payload().as_bytes()))
    }
}

/// The registrable domain, taken as the last two labels of `domain`.
///
/// No public suffix list is consulted, so `example.co.uk` maps to `co.uk`.
pub fn top_level_domain(domain: &str) -> String {
    let labels: Vec<&str> = domain.trim_end_matches('.').split('.').collect();
    labels[labels.len().saturating_sub(2)..].join(".")
}

#[cfg(test)]
mod test {
    use super::*;

    fn challenge(domain: &str, payload: &str) -> AuthorizationChallenge {
        AuthorizationChallenge::new(
            domain,
            "dns-01",
            "https://example.com/acme/chall/Rg5dV14Gh1Q".parse().unwrap(),
            "evaGxfADs6pSRb2LAv9IZf17Dt3juxGJ-PCt92wr-oA",
            payload,
        )
    }

    #[test]
    fn record_name_strips_wildcard() {
        let extractor = DnsDataExtractor;
        assert_eq!(
            extractor.record_name(&challenge("sub-domain.bar.com", "x")),
            "_acme-challenge.sub-domain.bar.com."
        );
        assert_eq!(
            extractor.record_name(&challenge("*.bar.com", "x")),
            "_acme-challenge.bar.com."
        );
    }

    #[test]
    fn record_name_accepts_fully_qualified_domain() {
        let extractor = DnsDataExtractor;
        assert_eq!(
            extractor.record_name(&challenge("sub-domain.bar.com.", "x")),
            "_acme-challenge.sub-domain.bar.com."
        );
    }

    #[test]
    fn record_value_is_digest_of_payload() {
        // SHA-256 of the empty string.
        let extractor = DnsDataExtractor;
        assert_eq!(
            extractor.record_value(&challenge("example.org", "")),
            "47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU"
        );
    }

    #[test]
    fn top_level_domain_is_last_two_labels() {
        assert_eq!(top_level_domain("sub-domain.bar.com"), "bar.com");
        assert_eq!(top_level_domain("bar.com"), "bar.com");
        assert_eq!(top_level_domain("a.b.example.co.uk"), "co.uk");
        assert_eq!(top_level_domain("localhost"), "localhost");
    }
}
