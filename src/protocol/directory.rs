//! The ACME directory, which bootstraps every interaction with a provider.

use serde::{Deserialize, Serialize};

use super::Url;

/// Resource URLs published by an ACME provider, as described in RFC 8555 section 7.1.1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
    /// Where to fetch a fresh anti-replay nonce.
    pub new_nonce: Url,

    /// Where to register a new account.
    pub new_account: Url,

    /// Where to create a new order.
    pub new_order: Url,

    /// Pre-authorization endpoint, which many providers don't offer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_authz: Option<Url>,

    /// Where to revoke a certificate.
    pub revoke_cert: Url,

    /// Where to roll over an account key.
    pub key_change: Url,

    /// Optional metadata about the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Metadata>,
}

/// Metadata in the directory `meta` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// The current terms of service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<Url>,

    /// The provider's website.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<Url>,

    /// Hostnames recognised in CAA records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caa_identities: Vec<String>,

    /// Whether new accounts need an external account binding.
    #[serde(default)]
    pub external_account_required: bool,
}
