//! Represents a mirror — one host in the tiered distribution network.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MirrorId = Uuid;

/// A mirror in the distribution hierarchy.
///
/// Tier 0 mirrors are authoritative sources; higher tiers sit further
/// downstream. A mirror syncs from at most one `upstream`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Mirror {
    /// Unique identifier for this mirror.
    pub id: MirrorId,

    /// Display name, unique across the network.
    pub name: String,

    /// Rank in the hierarchy (0 = root).
    pub tier: u8,

    /// ISO country code the mirror is hosted in, if known.
    pub country: Option<String>,

    /// Contact address for the mirror administrator.
    pub admin_email: Option<String>,

    /// Whether the mirror is currently in service.
    pub active: bool,

    /// Whether the mirror is listed for end users.
    pub public: bool,

    /// Whether the mirror carries install media.
    pub isos: bool,

    /// Credentials downstream mirrors use against this mirror's rsync daemon.
    pub rsync_user: Option<String>,
    pub rsync_password: Option<String>,

    /// Free-form operator notes.
    pub notes: Option<String>,

    /// The mirror this one syncs from. Non-owning.
    pub upstream: Option<MirrorId>,

    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Mirror {
    /// Build a fresh mirror record from operator input.
    pub fn from_new(new: NewMirror) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: new.name,
            tier: new.tier,
            country: new.country,
            admin_email: new.admin_email,
            active: new.active,
            public: new.public,
            isos: new.isos,
            rsync_user: new.rsync_user,
            rsync_password: new.rsync_password,
            notes: new.notes,
            upstream: None,
            created_at: now,
            last_modified: now,
        }
    }

    /// Apply an edit in place. Fields left as `None` are untouched.
    pub fn apply(&mut self, update: MirrorUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(tier) = update.tier {
            self.tier = tier;
        }
        if let Some(country) = update.country {
            self.country = country;
        }
        if let Some(admin_email) = update.admin_email {
            self.admin_email = admin_email;
        }
        if let Some(active) = update.active {
            self.active = active;
        }
        if let Some(public) = update.public {
            self.public = public;
        }
        if let Some(isos) = update.isos {
            self.isos = isos;
        }
        if let Some(notes) = update.notes {
            self.notes = notes;
        }
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}

/// Operator input for creating a mirror.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct NewMirror {
    pub name: String,
    pub tier: u8,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub public: bool,
    #[serde(default = "default_true")]
    pub isos: bool,
    #[serde(default)]
    pub rsync_user: Option<String>,
    #[serde(default)]
    pub rsync_password: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Upstream to link on creation. Checked like `set_upstream`.
    #[serde(default)]
    pub upstream: Option<MirrorId>,
}

impl NewMirror {
    pub fn new(name: impl Into<String>, tier: u8) -> Self {
        Self {
            name: name.into(),
            tier,
            active: true,
            public: true,
            isos: true,
            ..Default::default()
        }
    }
}

/// A partial edit of a mirror's identity, flags and tier.
///
/// Upstream links and endpoints have dedicated operations.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct MirrorUpdate {
    pub name: Option<String>,
    pub tier: Option<u8>,
    pub country: Option<Option<String>>,
    pub admin_email: Option<Option<String>>,
    pub active: Option<bool>,
    pub public: Option<bool>,
    pub isos: Option<bool>,
    pub notes: Option<Option<String>>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_mirror_starts_without_upstream() {
        let mut new = NewMirror::new("alpha", 1);
        new.upstream = Some(Uuid::new_v4());
        let mirror = Mirror::from_new(new);
        assert_eq!(mirror.upstream, None);
        assert!(mirror.active && mirror.public);
        assert_eq!(mirror.created_at, mirror.last_modified);
    }

    #[test]
    fn apply_leaves_unset_fields_alone() {
        let mut mirror = Mirror::from_new(NewMirror {
            country: Some("DE".into()),
            ..NewMirror::new("alpha", 2)
        });
        mirror.apply(MirrorUpdate {
            tier: Some(1),
            public: Some(false),
            ..Default::default()
        });
        assert_eq!(mirror.tier, 1);
        assert!(!mirror.public);
        assert_eq!(mirror.country.as_deref(), Some("DE"));
        assert_eq!(mirror.name, "alpha");
    }

    #[test]
    fn apply_can_clear_optional_fields() {
        let mut mirror = Mirror::from_new(NewMirror {
            admin_email: Some("ops@example.org".into()),
            ..NewMirror::new("alpha", 2)
        });
        mirror.apply(MirrorUpdate {
            admin_email: Some(None),
            ..Default::default()
        });
        assert_eq!(mirror.admin_email, None);
    }
}
