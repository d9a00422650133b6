//! Transport protocols a mirror endpoint can speak.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A transport identifier derived from an endpoint.
///
/// The variant order is the display order used when a set of protocols is
/// rendered for operators.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MirrorProtocol {
    Http,
    Https,
    Ftp,
    Rsync,
}

impl MirrorProtocol {
    /// Every supported protocol, in display order.
    pub const ALL: [MirrorProtocol; 4] = [
        MirrorProtocol::Http,
        MirrorProtocol::Https,
        MirrorProtocol::Ftp,
        MirrorProtocol::Rsync,
    ];

    /// Map a URL scheme to its protocol. Matching is case-insensitive.
    ///
    /// Returns `None` for any scheme outside the supported set.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "ftp" => Some(Self::Ftp),
            "rsync" => Some(Self::Rsync),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Ftp => "ftp",
            Self::Rsync => "rsync",
        }
    }

    /// Whether end users download packages over this protocol.
    ///
    /// rsync endpoints exist for downstream mirrors to sync from.
    pub fn is_download(&self) -> bool {
        !matches!(self, Self::Rsync)
    }
}

impl fmt::Display for MirrorProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
