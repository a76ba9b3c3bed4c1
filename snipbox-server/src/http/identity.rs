//! Identity provider seam
//!
//! Authentication lives outside this server. The provider only maps an
//! inbound request to the user it was authenticated as.

use axum::http::{HeaderMap, HeaderName};

use crate::models::UserId;

/// Header set by the authenticating proxy in front of the server
pub const DEFAULT_USER_HEADER: &str = "x-user-id";

pub trait IdentityProvider: Send + Sync {
    /// The authenticated user, if any.
    fn identify(&self, headers: &HeaderMap) -> Option<UserId>;
}

/// Trusts a user id header written by an upstream proxy.
///
/// Only safe when the proxy strips the header from client requests.
#[derive(Debug, Clone)]
pub struct TrustedHeaderIdentity {
    header: HeaderName,
}

impl TrustedHeaderIdentity {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

impl Default for TrustedHeaderIdentity {
    fn default() -> Self {
        Self::new(HeaderName::from_static(DEFAULT_USER_HEADER))
    }
}

impl IdentityProvider for TrustedHeaderIdentity {
    fn identify(&self, headers: &HeaderMap) -> Option<UserId> {
        headers
            .get(&self.header)?
            .to_str()
            .ok()?
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .map(UserId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &'static str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(DEFAULT_USER_HEADER, HeaderValue::from_static(value));
        map
    }

    #[test]
    fn reads_numeric_header() {
        let identity = TrustedHeaderIdentity::default();
        assert_eq!(identity.identify(&headers("42")), Some(UserId(42)));
    }

    #[test]
    fn rejects_garbage_and_non_positive_ids() {
        let identity = TrustedHeaderIdentity::default();
        assert_eq!(identity.identify(&headers("abc")), None);
        assert_eq!(identity.identify(&headers("0")), None);
        assert_eq!(identity.identify(&headers("-3")), None);
    }

    #[test]
    fn missing_header_is_anonymous() {
        let identity = TrustedHeaderIdentity::default();
        assert_eq!(identity.identify(&HeaderMap::new()), None);
    }
}
