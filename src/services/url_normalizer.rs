//! Canonical form and protocol classification for mirror URLs.
//!
//! URLs are stored with surrounding whitespace removed and exactly one
//! trailing slash, so `http://host/path` and `http://host/path/` name the
//! same endpoint.

use crate::{
    errors::{TopologyError, TopologyResult},
    models::MirrorProtocol,
};
use std::fmt;
use tracing::debug;
use url::Url;

/// A URL in canonical form. Always ends with a single `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUrl(String);

impl NormalizedUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UrlNormalizer;

impl UrlNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Trim whitespace and settle the trailing slash.
    ///
    /// Fails only when nothing is left after trimming.
    pub fn normalize(&self, text: &str) -> TopologyResult<NormalizedUrl> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            debug!(input = ?text, "empty URL rejected");
            return Err(TopologyError::InvalidUrl {
                input: text.to_string(),
            });
        }

        let mut url = trimmed.trim_end_matches('/').to_string();
        url.push('/');
        Ok(NormalizedUrl(url))
    }

    /// Derive the transport protocol from the URL's scheme.
    ///
    /// The URL must parse as an absolute URL with a host; anything else is
    /// `InvalidUrl`. A well-formed URL with a scheme outside the supported
    /// set is `UnsupportedProtocol`.
    pub fn classify(&self, url: &NormalizedUrl) -> TopologyResult<MirrorProtocol> {
        let invalid = || TopologyError::InvalidUrl {
            input: url.to_string(),
        };

        let parsed = Url::parse(url.as_str()).map_err(|err| {
            debug!(url = %url, error = %err, "URL failed to parse");
            invalid()
        })?;

        let Some(protocol) = MirrorProtocol::from_scheme(parsed.scheme()) else {
            debug!(url = %url, scheme = %parsed.scheme(), "unsupported URL scheme");
            return Err(TopologyError::UnsupportedProtocol {
                input: url.to_string(),
                scheme: parsed.scheme().to_string(),
            });
        };

        if parsed.host_str().is_none_or(str::is_empty) {
            debug!(url = %url, "URL has no host");
            return Err(invalid());
        }

        Ok(protocol)
    }

    /// Normalize and classify in one step.
    pub fn parse(&self, text: &str) -> TopologyResult<(NormalizedUrl, MirrorProtocol)> {
        let url = self.normalize(text)?;
        let protocol = self.classify(&url)?;
        debug!(url = %url, protocol = %protocol, "URL accepted");
        Ok((url, protocol))
    }
}
