//! The HTTP transport used to reach ACME providers and challenge APIs.
//!
//! Everything in this crate sends HTTP through the [`Transport`] trait, which
//! only knows how to turn an [`http::Request`] into an [`http::Response`].
//! Connection handling, TLS, pooling and timeouts are properties of the
//! transport. [`reqwest::Client`] is the provided implementation.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// A boxed error from an arbitrary transport implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The transport failed to deliver a request or to receive a response.
///
/// Timeouts and connection failures are not distinguished from each other.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The `reqwest` library encountered an error.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    /// The request could not be constructed.
    #[error("invalid HTTP request: {0}")]
    Request(#[from] http::Error),

    /// Any other transport failure.
    #[error("{0}")]
    Other(BoxError),
}

impl TransportError {
    /// Wrap an arbitrary error from a custom transport.
    pub fn other<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        TransportError::Other(error.into())
    }
}

/// Send HTTP requests and collect the full response body.
#[async_trait]
pub trait Transport: fmt::Debug + Send + Sync {
    /// Send a single request. Non-2xx responses are returned as `Ok`; only a failure
    /// to complete the exchange is an error.
    async fn send(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> Result<http::Response<Vec<u8>>, TransportError>;
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn send(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> Result<http::Response<Vec<u8>>, TransportError> {
        let request = reqwest::Request::try_from(request)?;
        tracing::trace!(method = %request.method(), url = %request.url(), "Sending request");

        let response = self.execute(request).await?;

        let mut builder = http::Response::builder()
            .status(response.status())
            .version(response.version());
        if let Some(headers) = builder.headers_mut() {
            *headers = response.headers().clone();
        }

        let body = response.bytes().await?;
        Ok(builder.body(body.to_vec())?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static_assertions::assert_impl_all!(TransportError: Send, Sync);
    static_assertions::assert_obj_safe!(Transport);

    #[test]
    fn other_errors_keep_their_message() {
        let error = TransportError::other("connection refused");
        assert_eq!(error.to_string(), "connection refused");
    }
}
