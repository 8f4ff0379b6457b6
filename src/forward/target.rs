//! The fixed upstream origin.

use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{HeaderValue, Uri};
use url::Url;

/// Reasons an upstream URL is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("{0}")]
    Parse(String),
    #[error("unsupported scheme {0:?}, expected http or https")]
    Scheme(String),
    #[error("missing host")]
    MissingHost,
    #[error("query strings and fragments are not allowed in the upstream URL")]
    QueryOrFragment,
    #[error("credentials are not allowed in the upstream URL")]
    Credentials,
}

/// Scheme, authority and optional base path every request is relayed to.
///
/// Built once at startup and shared read-only for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    scheme: Scheme,
    authority: Authority,
    base_path: String,
}

impl UpstreamTarget {
    /// Parse an `http://` or `https://` URL.
    pub fn parse(input: &str) -> Result<Self, TargetError> {
        let url = Url::parse(input.trim()).map_err(|e| TargetError::Parse(e.to_string()))?;

        let scheme = match url.scheme() {
            "http" => Scheme::HTTP,
            "https" => Scheme::HTTPS,
            other => return Err(TargetError::Scheme(other.to_string())),
        };
        if url.query().is_some() || url.fragment().is_some() {
            return Err(TargetError::QueryOrFragment);
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(TargetError::Credentials);
        }

        let host = url.host_str().ok_or(TargetError::MissingHost)?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority =
            Authority::try_from(authority.as_str()).map_err(|e| TargetError::Parse(e.to_string()))?;

        let base_path = url.path().trim_end_matches('/').to_string();

        Ok(Self {
            scheme,
            authority,
            base_path,
        })
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Base path without a trailing slash; empty when the URL has none.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Value for the rewritten `Host` header.
    pub fn host_header(&self) -> HeaderValue {
        // Authority only holds visible ASCII, which is always a valid header value.
        HeaderValue::from_str(self.authority.as_str())
            .unwrap_or_else(|_| HeaderValue::from_static(""))
    }

    /// Build the outbound URI for an inbound path and query.
    ///
    /// The base path is prepended: a target of `https://host/v3/key` relays
    /// `/abc?x=1` to `https://host/v3/key/abc?x=1`.
    pub fn join(&self, inbound: Option<&PathAndQuery>) -> Result<Uri, axum::http::Error> {
        let inbound = inbound.map(PathAndQuery::as_str).unwrap_or("/");
        let path_and_query = if inbound.starts_with('/') {
            format!("{}{}", self.base_path, inbound)
        } else {
            format!("{}/{}", self.base_path, inbound)
        };

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

impl std::fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority, self.base_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pq(s: &str) -> PathAndQuery {
        PathAndQuery::try_from(s).unwrap()
    }

    #[test]
    fn parses_plain_origin() {
        let target = UpstreamTarget::parse("http://127.0.0.1:5000").unwrap();
        assert_eq!(target.scheme(), &Scheme::HTTP);
        assert_eq!(target.authority().as_str(), "127.0.0.1:5000");
        assert_eq!(target.base_path(), "");
        assert_eq!(target.host_header(), "127.0.0.1:5000");
    }

    #[test]
    fn default_port_is_omitted_from_host() {
        let target = UpstreamTarget::parse("https://example.com:443/").unwrap();
        assert_eq!(target.authority().as_str(), "example.com");
    }

    #[test]
    fn joins_base_path() {
        let target = UpstreamTarget::parse("https://mainnet.example.io/v3/key/").unwrap();
        assert_eq!(
            target.join(Some(&pq("/abc?x=1"))).unwrap().to_string(),
            "https://mainnet.example.io/v3/key/abc?x=1"
        );
        assert_eq!(
            target.join(Some(&pq("/"))).unwrap().to_string(),
            "https://mainnet.example.io/v3/key/"
        );
        assert_eq!(
            target.join(None).unwrap().to_string(),
            "https://mainnet.example.io/v3/key/"
        );
    }

    #[test]
    fn joins_without_base_path() {
        let target = UpstreamTarget::parse("http://[::1]:8080").unwrap();
        assert_eq!(
            target.join(Some(&pq("/v3/abc123"))).unwrap().to_string(),
            "http://[::1]:8080/v3/abc123"
        );
    }

    #[test]
    fn rejects_bad_targets() {
        assert_eq!(
            UpstreamTarget::parse("ws://example.com"),
            Err(TargetError::Scheme("ws".into()))
        );
        assert_eq!(
            UpstreamTarget::parse("http://example.com/?a=1"),
            Err(TargetError::QueryOrFragment)
        );
        assert_eq!(
            UpstreamTarget::parse("http://user:pw@example.com"),
            Err(TargetError::Credentials)
        );
        assert!(matches!(
            UpstreamTarget::parse("not a url"),
            Err(TargetError::Parse(_))
        ));
    }
}
