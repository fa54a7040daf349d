//! HTTP responses which adhere to RFC 8555
//!
//! RFC 8555 does not constrain HTTP responses from the ACME service
//! strongly, except that they should contain a [nonce][super::jose::Nonce].

use chrono::{DateTime, Utc};
use http::HeaderMap;
use serde::de::DeserializeOwned;

use super::jose::Nonce;
use super::AcmeError;
use super::Url;

/// Helper trait for any type which can be decoded from a
/// response from an ACME server.
///
/// This trait is blanket-implemetned for [`serde::de::DeserializeOwned`]
/// so most types should implement or derive [`serde::Deserialize`]
/// rather than implementing this type.
pub trait Decode: Sized {
    /// Decode an ACME response from a byte slice.
    fn decode(data: &[u8]) -> Result<Self, AcmeError>;
}

impl<T> Decode for T
where
    T: DeserializeOwned,
{
    fn decode(data: &[u8]) -> Result<Self, AcmeError> {
        serde_json::from_slice(data).map_err(|source| AcmeError::ExpectedJson {
            body: String::from_utf8_lossy(data).into_owned(),
            source,
        })
    }
}

/// The body of a successful response, as returned by [`super::Client::request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// The body parsed as JSON.
    Json(serde_json::Value),

    /// The raw body text.
    Text(String),
}

impl ResponseBody {
    pub(crate) fn parse(body: &[u8], expect_json: bool) -> Result<Self, AcmeError> {
        if expect_json {
            serde_json::Value::decode(body).map(ResponseBody::Json)
        } else {
            Ok(ResponseBody::Text(String::from_utf8_lossy(body).into_owned()))
        }
    }

    /// The JSON value, if this body was parsed as JSON.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    /// The raw text, if this body was not parsed.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Json(_) => None,
            ResponseBody::Text(text) => Some(text),
        }
    }
}

/// A HTTP response from an ACME service
#[derive(Debug, Clone)]
pub struct Response<T> {
    url: Url,
    status: http::StatusCode,
    headers: http::HeaderMap,
    payload: T,
}

impl<T> Response<T>
where
    T: Decode,
{
    pub(crate) fn from_decoded_response(
        url: Url,
        response: http::Response<Vec<u8>>,
    ) -> Result<Self, AcmeError> {
        let (parts, body) = response.into_parts();
        let payload: T = T::decode(&body)?;

        Ok(Response {
            url,
            status: parts.status,
            headers: parts.headers,
            payload,
        })
    }
}

impl<T> Response<T> {
    /// Response [`http::StatusCode`]
    pub fn status(&self) -> http::StatusCode {
        self.status
    }

    /// Destination URL from the original request.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The headers returned with this response
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The seconds to wait for a retry, from now.
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        self.headers()
            .get(http::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                if v.contains("GMT") {
                    DateTime::parse_from_rfc2822(v)
                        .map(|ts| ts.signed_duration_since(Utc::now()))
                        .ok()
                        .and_then(|d| d.to_std().ok())
                } else {
                    v.parse::<u64>().ok().map(std::time::Duration::from_secs)
                }
            })
    }

    /// Get the [`Nonce`] from this response.
    ///
    /// Normally, this is unnecessay, as [`super::Client`] will automatically handle
    /// and track [`Nonce`] values.
    pub fn nonce(&self) -> Option<Nonce> {
        super::client::extract_nonce(&self.headers).ok()
    }

    /// The URL from the `Location` HTTP header.
    pub fn location(&self) -> Option<Url> {
        self.headers
            .get(http::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
    }

    /// URLs from `Link` headers with the given `rel`, e.g. `"up"` or `"alternate"`.
    pub fn links(&self, rel: &str) -> Vec<Url> {
        self.headers
            .get_all(http::header::LINK)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .filter_map(|link| {
                let (target, params) = link.split_once(';')?;
                let relation = format!("rel=\"{rel}\"");
                params
                    .split(';')
                    .any(|param| param.trim() == relation)
                    .then(|| target.trim().trim_start_matches('<').trim_end_matches('>'))
            })
            .filter_map(|target| target.parse().ok())
            .collect()
    }

    /// The [`mime::Mime`] from the `Content-Type` header.
    pub fn content_type(&self) -> Option<mime::Mime> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }

    /// The response payload.
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Extract just the response payload.
    pub fn into_inner(self) -> T {
        self.payload
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn response(name: &str, fixture: &str) -> Response<serde_json::Value> {
        let parsed = crate::protocol::test::parse(fixture);
        let (parts, body) = parsed.into_parts();
        let response = http::Response::from_parts(parts, body.into_bytes());
        Response::from_decoded_response(name.parse().unwrap(), response).unwrap()
    }

    #[test]
    fn headers_from_fixture() {
        let response = response(
            "https://example.com/acme/new-order",
            crate::example!("new-order.http"),
        );

        assert_eq!(response.status(), http::StatusCode::CREATED);
        assert_eq!(response.nonce().unwrap().as_ref(), "MYAuvOpaoIiywTezizk5vw");
        assert_eq!(
            response.location().unwrap().as_str(),
            "https://example.com/acme/order/TOlocE8rfgo"
        );
        assert_eq!(
            response.content_type().unwrap().essence_str(),
            "application/json"
        );
        assert_eq!(
            response.links("index")[0].as_str(),
            "https://example.com/acme/directory"
        );
        assert_eq!(
            response.retry_after(),
            Some(std::time::Duration::from_secs(30))
        );
        assert_eq!(response.payload()["status"], "pending");
    }

    #[test]
    fn text_and_json_bodies() {
        assert_eq!(
            ResponseBody::parse(b"foo", false).unwrap(),
            ResponseBody::Text("foo".into())
        );
        assert!(matches!(
            ResponseBody::parse(b"invalid json", true),
            Err(AcmeError::ExpectedJson { body, .. }) if body == "invalid json"
        ));
    }
}
