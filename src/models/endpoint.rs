//! Endpoints — the ways a mirror can be reached.
//!
//! A mirror owns any number of URL endpoints (http, https, ftp, rsync
//! module URLs) and rsync ACL entries naming the hosts allowed to pull
//! from it. Both are removed together with their mirror.

use crate::{
    errors::TopologyError,
    models::{mirror::MirrorId, protocol::MirrorProtocol},
    services::address_validator::AddressValidator,
};
use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::{fmt, net::Ipv4Addr};
use uuid::Uuid;

pub type MirrorUrlId = Uuid;
pub type MirrorRsyncId = Uuid;

/// A normalized URL attached to a mirror.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MirrorUrl {
    pub id: MirrorUrlId,

    /// Owning mirror.
    pub mirror_id: MirrorId,

    /// Normalized URL; always ends with `/`.
    pub url: String,

    /// Protocol inferred from the URL scheme at write time.
    pub protocol: MirrorProtocol,

    pub created_at: DateTime<Utc>,
}

impl MirrorUrl {
    pub fn new(mirror_id: MirrorId, url: String, protocol: MirrorProtocol) -> Self {
        Self {
            id: Uuid::new_v4(),
            mirror_id,
            url,
            protocol,
            created_at: Utc::now(),
        }
    }
}

/// An rsync endpoint: the address (or network) of a host allowed to sync.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MirrorRsync {
    pub id: MirrorRsyncId,

    /// Owning mirror.
    pub mirror_id: MirrorId,

    pub address: RsyncAddress,

    pub created_at: DateTime<Utc>,
}

impl MirrorRsync {
    pub fn new(mirror_id: MirrorId, address: RsyncAddress) -> Self {
        Self {
            id: Uuid::new_v4(),
            mirror_id,
            address,
            created_at: Utc::now(),
        }
    }

    pub fn protocol(&self) -> MirrorProtocol {
        MirrorProtocol::Rsync
    }
}

/// A validated IPv4 address with an optional netmask.
///
/// `text` is the operator's input exactly as accepted; it is what gets
/// stored and displayed. Construct through `AddressValidator`; the serde
/// form is the text alone and is validated again on the way in.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct RsyncAddress {
    text: String,
    net: Ipv4Net,
    prefix: Option<u8>,
}

impl RsyncAddress {
    pub(crate) fn new(text: String, net: Ipv4Net, prefix: Option<u8>) -> Self {
        Self { text, net, prefix }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.net.addr()
    }

    /// The netmask as written, if any.
    pub fn prefix(&self) -> Option<u8> {
        self.prefix
    }

    /// Effective prefix length; a bare address is a /32 host.
    pub fn prefix_len(&self) -> u8 {
        self.net.prefix_len()
    }

    /// The network address with host bits cleared.
    pub fn network(&self) -> Ipv4Addr {
        self.net.network()
    }

    /// Whether `ip` falls within this address's network.
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.net.contains(&ip)
    }

    pub fn as_net(&self) -> Ipv4Net {
        self.net
    }
}

impl TryFrom<String> for RsyncAddress {
    type Error = TopologyError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        AddressValidator::new().validate(&text)
    }
}

impl From<RsyncAddress> for String {
    fn from(address: RsyncAddress) -> Self {
        address.text
    }
}

impl fmt::Display for RsyncAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(text: &str) -> RsyncAddress {
        AddressValidator::new().validate(text).unwrap()
    }

    #[test]
    fn bare_address_is_a_single_host() {
        let host = address("10.0.0.1");
        assert_eq!(host.prefix_len(), 32);
        assert!(host.contains(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(!host.contains(Ipv4Addr::new(10, 0, 0, 2)));
    }

    #[test]
    fn network_clears_host_bits() {
        let net = address("192.168.7.130/25");
        assert_eq!(net.network(), Ipv4Addr::new(192, 168, 7, 128));
        assert!(net.contains(Ipv4Addr::new(192, 168, 7, 255)));
        assert!(!net.contains(Ipv4Addr::new(192, 168, 7, 127)));
    }

    #[test]
    fn zero_prefix_matches_everything() {
        let any = address("1.2.3.4/0");
        assert_eq!(any.network(), Ipv4Addr::UNSPECIFIED);
        assert!(any.contains(Ipv4Addr::new(203, 0, 113, 9)));
    }

    #[test]
    fn rsync_endpoint_reports_rsync_protocol() {
        let endpoint = MirrorRsync::new(Uuid::new_v4(), address("10.0.0.1"));
        assert_eq!(endpoint.protocol(), MirrorProtocol::Rsync);
        assert_eq!(endpoint.address.to_string(), "10.0.0.1");
    }

    #[test]
    fn serializes_as_accepted_text() {
        let json = serde_json::to_string(&address("010.0.0.1/8")).unwrap();
        assert_eq!(json, "\"010.0.0.1/8\"");

        let back: RsyncAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address("010.0.0.1/8"));
        assert_eq!(back.network(), Ipv4Addr::new(10, 0, 0, 0));
    }

    #[test]
    fn deserializing_invalid_address_fails() {
        for text in ["\"999.1.1.1/77\"", "\"1.1.1.1/40\"", "\"\""] {
            let err = serde_json::from_str::<RsyncAddress>(text).unwrap_err();
            assert!(err.to_string().contains("not a valid IPv4 address"), "{err}");
        }
    }

    #[test]
    fn stored_endpoint_with_bad_address_is_rejected() {
        let json = format!(
            r#"{{"id":"{id}","mirror_id":"{id}","address":"999.1.1.1/77","created_at":"2024-01-01T00:00:00Z"}}"#,
            id = Uuid::new_v4()
        );
        assert!(serde_json::from_str::<MirrorRsync>(&json).is_err());
    }
}
