//! Validation of rsync endpoint addresses.
//!
//! Accepts a dotted-quad IPv4 address, optionally followed by `/` and a
//! prefix length. The accepted text is kept verbatim.

use crate::{
    errors::{TopologyError, TopologyResult},
    models::RsyncAddress,
};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use tracing::debug;

const MAX_OCTET_DIGITS: usize = 3;
const MAX_PREFIX_LEN: u8 = 32;

#[derive(Debug, Clone, Copy, Default)]
pub struct AddressValidator;

impl AddressValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate `text` as `a.b.c.d` or `a.b.c.d/n`.
    ///
    /// Octets are 1–3 digits in 0..=255. The prefix is `0`–`9`, or two digits
    /// from `10` to `32`.
    pub fn validate(&self, text: &str) -> TopologyResult<RsyncAddress> {
        let invalid = || TopologyError::InvalidAddress {
            input: text.to_string(),
        };

        let (host, prefix) = match text.split_once('/') {
            Some((host, prefix)) => (host, Some(parse_prefix(prefix).ok_or_else(invalid)?)),
            None => (text, None),
        };

        let addr = parse_dotted_quad(host).ok_or_else(invalid)?;
        let net = Ipv4Net::new(addr, prefix.unwrap_or(MAX_PREFIX_LEN)).map_err(|_| invalid())?;

        debug!(address = %text, network = %net.trunc(), "rsync address valid");
        Ok(RsyncAddress::new(text.to_string(), net, prefix))
    }
}

/// Parse exactly four dot-separated decimal octets.
fn parse_dotted_quad(host: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut parts = host.split('.');
    for slot in octets.iter_mut() {
        *slot = parse_octet(parts.next()?)?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(Ipv4Addr::from(octets))
}

fn parse_octet(part: &str) -> Option<u8> {
    if part.is_empty() || part.len() > MAX_OCTET_DIGITS || !is_ascii_digits(part) {
        return None;
    }
    part.parse::<u8>().ok()
}

fn parse_prefix(part: &str) -> Option<u8> {
    if part.is_empty() || part.len() > 2 || !is_ascii_digits(part) {
        return None;
    }
    // Two-digit prefixes may not start with zero.
    if part.len() == 2 && part.starts_with('0') {
        return None;
    }
    let prefix = part.parse::<u8>().ok()?;
    (prefix <= MAX_PREFIX_LEN).then_some(prefix)
}

fn is_ascii_digits(part: &str) -> bool {
    part.bytes().all(|b| b.is_ascii_digit())
}
