//! Error types shared by the validators and the topology aggregate.
//!
//! Every variant of [`TopologyError`] is a recoverable input failure: the
//! operator is shown the message and may resubmit. [`FieldError`] is the
//! shape handed to a form layer.

use crate::services::mirror_store::StoreError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("`{input}` is not a valid IPv4 address, possibly including netmask")]
    InvalidAddress { input: String },

    #[error("`{input}` is not a valid URL")]
    InvalidUrl { input: String },

    #[error("URL `{input}` uses unsupported protocol `{scheme}`")]
    UnsupportedProtocol { input: String, scheme: String },

    #[error("mirror `{candidate}` (tier {tier}) cannot act as an upstream")]
    InvalidUpstream { candidate: String, tier: u8 },

    #[error("linking `{mirror}` to upstream `{candidate}` would create a cycle")]
    CyclicUpstream { mirror: String, candidate: String },

    #[error(
        "linking `{mirror}` to upstream `{candidate}` would make a chain of {hops} hops (max {max})"
    )]
    UpstreamChainTooLong {
        mirror: String,
        candidate: String,
        hops: usize,
        max: usize,
    },

    #[error("tier {tier} is out of range (0..={max})")]
    InvalidTier { tier: u8, max: u8 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type TopologyResult<T> = Result<T, TopologyError>;

impl TopologyError {
    /// The form field this error belongs to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidAddress { .. } => "ip",
            Self::InvalidUrl { .. } | Self::UnsupportedProtocol { .. } => "url",
            Self::InvalidUpstream { .. }
            | Self::CyclicUpstream { .. }
            | Self::UpstreamChainTooLong { .. } => "upstream",
            Self::InvalidTier { .. } => "tier",
            Self::Store(_) => "__all__",
        }
    }

    /// The offending operator input, echoed back in form errors.
    pub fn input(&self) -> Option<String> {
        match self {
            Self::InvalidAddress { input }
            | Self::InvalidUrl { input }
            | Self::UnsupportedProtocol { input, .. } => Some(input.clone()),
            Self::InvalidUpstream { candidate, .. }
            | Self::CyclicUpstream { candidate, .. }
            | Self::UpstreamChainTooLong { candidate, .. } => Some(candidate.clone()),
            Self::InvalidTier { tier, .. } => Some(tier.to_string()),
            Self::Store(_) => None,
        }
    }
}

/// A field-level form error, as surfaced to an operator.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    /// Mirror the rejected input was submitted for, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror: Option<String>,
    pub field: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
}

impl FieldError {
    /// Tag the error with the name of the mirror being edited.
    pub fn for_mirror(mut self, name: impl Into<String>) -> Self {
        self.mirror = Some(name.into());
        self
    }
}

impl From<&TopologyError> for FieldError {
    fn from(err: &TopologyError) -> Self {
        Self {
            mirror: None,
            field: err.field(),
            message: err.to_string(),
            input: err.input(),
        }
    }
}

impl From<TopologyError> for FieldError {
    fn from(err: TopologyError) -> Self {
        Self::from(&err)
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mirror {
            Some(mirror) => write!(f, "{mirror}: {}: {}", self.field, self.message),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

impl std::error::Error for FieldError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn address_error_echoes_input_on_ip_field() {
        let err = TopologyError::InvalidAddress {
            input: "10.0.0.1/33".into(),
        };
        let field = FieldError::from(&err);
        assert_eq!(field.field, "ip");
        assert_eq!(field.input.as_deref(), Some("10.0.0.1/33"));
        assert!(field.message.contains("10.0.0.1/33"));
    }

    #[test]
    fn upstream_errors_share_a_field() {
        let invalid = TopologyError::InvalidUpstream {
            candidate: "leaf".into(),
            tier: 2,
        };
        let cyclic = TopologyError::CyclicUpstream {
            mirror: "root".into(),
            candidate: "leaf".into(),
        };
        assert_eq!(invalid.field(), cyclic.field());
    }

    #[test]
    fn field_error_serializes_without_empty_fields() {
        let err = TopologyError::Store(StoreError::DuplicateMirrorName("alpha".into()));
        let value = serde_json::to_value(FieldError::from(err)).unwrap();
        assert_eq!(
            value,
            json!({
                "field": "__all__",
                "message": "a mirror named `alpha` already exists",
            })
        );
    }

    #[test]
    fn display_includes_mirror_when_tagged() {
        let err = TopologyError::InvalidUrl { input: " ".into() };
        let field = FieldError::from(err).for_mirror("alpha");
        assert!(field.to_string().starts_with("alpha: url: "));
    }
}
