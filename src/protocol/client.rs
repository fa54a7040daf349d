//! Client for sending signed HTTP requests to an ACME server

use std::sync::Arc;

use http::HeaderMap;
use reqwest::Certificate;
use serde::Serialize;

use super::directory::Directory;
use super::errors::{classify, AcmeError};
use super::jose::{self, AccountKeyIdentifier, Nonce, Payload, SignedEnvelope};
use super::response::{Decode, Response, ResponseBody};
use super::transport::{Transport, TransportError};
use super::Request;
use super::Url;
use crate::key::AccountKey;

pub use AcmeClient as Client;

const NONCE_HEADER: &str = "Replay-Nonce";

/// Builder struct for an ACME HTTP client.
#[derive(Debug)]
pub struct ClientBuilder {
    inner: reqwest::ClientBuilder,
    transport: Option<Arc<dyn Transport>>,
    new_nonce: Option<Url>,
    nonce: Option<Nonce>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub(crate) fn new() -> Self {
        let builder = reqwest::Client::builder()
            .user_agent(concat!("yacme-core/", env!("CARGO_PKG_VERSION")));

        ClientBuilder {
            inner: builder,
            transport: None,
            new_nonce: None,
            nonce: None,
        }
    }

    /// Use a custom [`Transport`] instead of a [`reqwest::Client`].
    ///
    /// When a transport is set, the reqwest-specific settings on this builder
    /// are ignored.
    pub fn transport<T>(mut self, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Share a [`Transport`] with other clients or challenge solvers.
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the URL to use to fetch a new nonce.
    ///
    /// This is used to bootstrap the nonce at the start of an interaction
    /// with an ACME provider, and to acquire a new nonce if an old one
    /// ends up invalidated. Both of these actions happen transparently
    /// when using the [`Client::request`] method, to ensure that the JWS always
    /// contains a valid nonce.
    pub fn with_nonce_url(mut self, url: Url) -> Self {
        self.new_nonce = Some(url);
        self
    }

    /// Seed the client with a nonce which was obtained elsewhere.
    pub fn with_nonce(mut self, nonce: Nonce) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Add a custom root certificate to the underlying [`reqwest::Client`].
    ///
    /// This is useful if you are using a self-signed certificate from your ACME
    /// provider for testing, e.g. when using [Pebble](https://github.com/letsencrypt/pebble).
    pub fn add_root_certificate(mut self, cert: Certificate) -> Self {
        self.inner = self.inner.add_root_certificate(cert);
        self
    }

    /// Set a timeout on the underlying [`reqwest::Client`].
    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.inner = self.inner.timeout(timeout);
        self
    }

    /// Set a connect timeout on the underlying [`reqwest::Client`].
    pub fn connect_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.inner = self.inner.connect_timeout(timeout);
        self
    }

    /// Finalize this and build this client for the given account key.
    pub fn build(self, key: Arc<AccountKey>) -> Result<AcmeClient, AcmeError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(self.inner.build().map_err(TransportError::from)?),
        };

        Ok(AcmeClient {
            transport,
            key,
            nonce: self.nonce,
            new_nonce: self.new_nonce,
        })
    }
}

/// ACME HTTP Client
///
/// The client owns the account key and the current anti-replay [`Nonce`]. Every
/// signed request consumes the stored nonce, and every response (success or
/// failure) replaces it with the `Replay-Nonce` header when one is present.
///
/// Methods which send requests take `&mut self`, so a single client can only
/// have one request in flight. Use one client per concurrent task.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use yacme_core::key::{SignatureKind, EcdsaAlgorithm};
/// # use yacme_core::protocol::{AcmeClient, Request};
/// # use yacme_core::protocol::request::Key;
/// #
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let key = Arc::new(SignatureKind::Ecdsa(EcdsaAlgorithm::P256).random()?);
///
/// let mut client = AcmeClient::builder().build(key)?;
/// let directory = client
///     .directory("https://acme.example.com/directory".parse()?)
///     .await?;
///
/// let request = Request::post(
///     serde_json::json!({"termsOfServiceAgreed": true}),
///     directory.new_account,
///     Key::Jwk,
/// );
/// let account = client.request(&request, true).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AcmeClient {
    transport: Arc<dyn Transport>,
    key: Arc<AccountKey>,
    nonce: Option<Nonce>,
    new_nonce: Option<Url>,
}

impl AcmeClient {
    /// Create a new client builder to configure a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client for the given key which sends requests through `transport`.
    pub fn new(key: Arc<AccountKey>, transport: Arc<dyn Transport>) -> Self {
        AcmeClient {
            transport,
            key,
            nonce: None,
            new_nonce: None,
        }
    }

    /// Set the URL used for fetching a new Nonce from the ACME provider.
    pub fn set_new_nonce_url(&mut self, url: Url) {
        self.new_nonce = Some(url);
    }

    /// Replace the stored nonce.
    pub fn set_nonce(&mut self, nonce: Nonce) {
        self.nonce = Some(nonce);
    }

    /// The nonce which will be used for the next signed request, if one is stored.
    pub fn nonce(&self) -> Option<&Nonce> {
        self.nonce.as_ref()
    }

    /// The account key used to sign requests.
    pub fn key(&self) -> &Arc<AccountKey> {
        &self.key
    }

    /// The transport used to send requests.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

impl AcmeClient {
    /// Fetch the ACME directory and use its `newNonce` URL for future nonces.
    pub async fn directory(&mut self, url: Url) -> Result<Directory, AcmeError> {
        let response: Response<Directory> = self.execute(&Request::get(url)).await?;
        let directory = response.into_inner();
        self.new_nonce = Some(directory.new_nonce.clone());
        Ok(directory)
    }

    /// Sign a payload with the account's public key as the `jwk`, consuming the
    /// current nonce.
    pub async fn sign_with_jwk<P>(
        &mut self,
        url: &Url,
        payload: &Payload<P>,
    ) -> Result<SignedEnvelope, AcmeError>
    where
        P: Serialize,
    {
        let nonce = self.next_nonce().await?;
        jose::sign_with_jwk(&self.key, url, nonce, payload)
    }

    /// Sign a payload with the account URL as the `kid`, consuming the current nonce.
    pub async fn sign_with_kid<P>(
        &mut self,
        url: &Url,
        account: &AccountKeyIdentifier,
        payload: &Payload<P>,
    ) -> Result<SignedEnvelope, AcmeError>
    where
        P: Serialize,
    {
        let nonce = self.next_nonce().await?;
        jose::sign_with_kid(&self.key, url, account, nonce, payload)
    }

    /// Send a request, and return the body as JSON (when `expect_json` is set) or
    /// as the raw text.
    ///
    /// A body which does not parse as JSON when `expect_json` is set fails with
    /// [`AcmeError::ExpectedJson`].
    pub async fn request<P>(
        &mut self,
        request: &Request<P>,
        expect_json: bool,
    ) -> Result<ResponseBody, AcmeError>
    where
        P: Serialize,
    {
        let response = self.execute_internal(request).await?;
        ResponseBody::parse(response.body(), expect_json)
    }

    /// Send a request and decode the response body.
    ///
    /// Request payloads must be serializable, and request responses must implement [`Decode`].
    /// `Decode` is implemented for all types that implement [`serde::Deserialize`].
    pub async fn execute<P, R>(&mut self, request: &Request<P>) -> Result<Response<R>, AcmeError>
    where
        P: Serialize,
        R: Decode,
    {
        let response = self.execute_internal(request).await?;
        Response::from_decoded_response(request.url().clone(), response)
    }

    async fn execute_internal<P>(
        &mut self,
        request: &Request<P>,
    ) -> Result<http::Response<Vec<u8>>, AcmeError>
    where
        P: Serialize,
    {
        let mut retried = false;
        loop {
            let nonce = if request.is_signed() {
                self.next_nonce().await?
            } else {
                None
            };

            let signed = request.sign(&self.key, nonce)?;

            #[cfg(feature = "trace-requests")]
            tracing::trace!(
                "REQ: {} {}\n{}",
                signed.method(),
                signed.uri(),
                String::from_utf8_lossy(signed.body())
            );

            let response = self.transport.send(signed).await?;
            self.record_nonce(response.headers());

            #[cfg(feature = "trace-requests")]
            tracing::trace!(
                "RES: {}\n{}",
                response.status(),
                String::from_utf8_lossy(response.body())
            );

            if response.status().is_success() {
                return Ok(response);
            }

            match classify(response.status(), response.body()) {
                error if error.is_bad_nonce() && !retried => {
                    tracing::debug!(url = %request.url().as_str(), "Retrying request with next nonce");
                    retried = true;
                }
                error => {
                    return Err(error);
                }
            }
        }
    }
}

pub(crate) fn extract_nonce(headers: &HeaderMap) -> Result<Nonce, AcmeError> {
    let value = headers.get(NONCE_HEADER).ok_or(AcmeError::MissingNonce)?;
    Ok(Nonce::from(
        value
            .to_str()
            .map_err(|_| AcmeError::InvalidNonce(Some(value.clone())))?
            .to_owned(),
    ))
}

impl AcmeClient {
    fn record_nonce(&mut self, headers: &HeaderMap) {
        match extract_nonce(headers) {
            Ok(nonce) => self.nonce = Some(nonce),
            Err(AcmeError::MissingNonce) => {}
            Err(error) => tracing::warn!("Ignoring nonce header: {error}"),
        }
    }

    /// Take the stored nonce, fetching a new one if none is stored.
    ///
    /// Without a stored nonce or a new-nonce URL, the JWS is signed without a nonce
    /// and the provider's `badNonce` reply seeds one for the retry.
    async fn next_nonce(&mut self) -> Result<Option<Nonce>, AcmeError> {
        if let Some(value) = self.nonce.take() {
            return Ok(Some(value));
        }

        let Some(url) = self.new_nonce.clone() else {
            tracing::warn!("No nonce URL provided, unable to fetch new nonce");
            return Ok(None);
        };

        tracing::debug!("Requesting a new nonce");
        let request = Request::head(url).sign(&self.key, None)?;
        let response = self.transport.send(request).await?;

        if !response.status().is_success() {
            return Err(classify(response.status(), response.body()));
        }

        extract_nonce(response.headers()).map(Some)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn extract_nonce_from_header() {
        let response = crate::response!("new-nonce.http");
        let nonce = extract_nonce(response.headers()).unwrap();
        assert_eq!(nonce.as_ref(), "oFvnlFP1wIhRlYS2jTaXbA");
    }

    #[test]
    fn missing_nonce_header() {
        let response = crate::response!("directory.http");
        assert!(matches!(
            extract_nonce(response.headers()),
            Err(AcmeError::MissingNonce)
        ));
    }

    static_assertions::assert_impl_all!(AcmeClient: Send, Sync);
}
