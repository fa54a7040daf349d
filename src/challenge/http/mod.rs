//! HTTP-01 challenges.
//!
//! The proof for an HTTP-01 challenge is the key authorization, served as plain text
//! at `http://{domain}/.well-known/acme-challenge/{token}`.

use super::AuthorizationChallenge;
use crate::protocol::{AcmeError, Url};

mod mock_server;
mod validator;

pub use self::mock_server::{MockServerConfig, MockServerHttpSolver};
pub use self::validator::HttpValidator;

/// Derives where and what to serve for an HTTP-01 challenge.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpDataExtractor;

impl HttpDataExtractor {
    /// The path at which the proof is served.
    pub fn check_path(&self, challenge: &AuthorizationChallenge) -> String {
        format!("/.well-known/acme-challenge/{}", challenge.token())
    }

    /// The URL at which the proof is served.
    pub fn check_url(&self, challenge: &AuthorizationChallenge) -> Result<Url, AcmeError> {
        Ok(format!(
            "http://{}{}",
            challenge.domain(),
            self.check_path(challenge)
        )
        .parse()?)
    }

    /// The content which must be served.
    pub fn check_content<'c>(&self, challenge: &'c AuthorizationChallenge) -> &'c str {
        challenge.payload()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn check_url_from_token() {
        let challenge = AuthorizationChallenge::new(
            "example.org",
            "http-01",
            "https://example.com/acme/chall/prV_B7yEyA4".parse().unwrap(),
            "LoqXcYV8q5ONbJQxbmR7SCTNo3tiAXDfowyjxAjEuX0",
            "LoqXcYV8q5ONbJQxbmR7SCTNo3tiAXDfowyjxAjEuX0.9jg46WB3rR_AHD-EBXdN7cBkH1WOu0tA3M9fm21mqTI",
        );
        let extractor = HttpDataExtractor;

        assert_eq!(
            extractor.check_url(&challenge).unwrap().as_str(),
            "http://example.org/.well-known/acme-challenge/LoqXcYV8q5ONbJQxbmR7SCTNo3tiAXDfowyjxAjEuX0"
        );
        assert_eq!(extractor.check_content(&challenge), challenge.payload());
    }
}
