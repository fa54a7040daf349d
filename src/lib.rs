//! # Signed transport and challenge solving for ACME clients
//!
//! `yacme-core` implements the parts of an [ACME](https://tools.ietf.org/html/rfc8555)
//! client which carry every security-relevant decision: signing requests, tracking the
//! anti-replay nonce, classifying error responses, and solving authorization challenges.
//!
//! ## Features
//!
//! Account keys may be RSA (RS256) or ECDSA over P-256, P-384 or P-521 (ES256, ES384,
//! ES512). Requests identify the account either with an embedded JWK or with the
//! account URL as a `kid`.
//!
//! HTTP-01 and DNS-01 challenges are supported, with solvers for the Gandi LiveDNS API
//! and for the pebble challenge test server.
//!
//! Account, order and certificate workflows are not part of this crate. They are built
//! on top of [`protocol::AcmeClient`].
//!
//! ## Usage
//!
//! The crate is split into several levels of api:
//!
//! - `protocol` provides the JWS protocol, the nonce-tracking client and error classification.
//! - `challenge` provides challenge solvers, validators and the registry which dispatches between them.
//! - `key` provides RSA and ECDSA account keys.

pub mod challenge;
pub mod key;
pub mod protocol;
