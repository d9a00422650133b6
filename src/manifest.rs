//! Manifest files describing a whole mirror network.
//!
//! A manifest lists mirrors with their raw, operator-written URLs, rsync
//! addresses and upstream names. Applying it replays those edits through
//! `MirrorTopology` and collects every rejection instead of stopping at the
//! first one.

use crate::{
    errors::FieldError,
    models::{MirrorProtocol, NewMirror},
    services::{mirror_store::MirrorStore, topology_service::MirrorTopology},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fmt::Write as _, fs, path::Path};
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub mirrors: Vec<MirrorEntry>,
}

/// One mirror as written in a manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorEntry {
    #[serde(flatten)]
    pub mirror: NewMirror,

    /// Name of the mirror to sync from.
    #[serde(default, rename = "upstream_name")]
    pub upstream: Option<String>,

    #[serde(default)]
    pub urls: Vec<String>,

    /// rsync addresses, each optionally with a netmask.
    #[serde(default)]
    pub rsync: Vec<String>,
}

/// Outcome of applying a manifest.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub mirrors: Vec<MirrorSummary>,
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MirrorSummary {
    pub name: String,
    pub tier: u8,
    pub upstream: Option<String>,
    pub protocols: Vec<MirrorProtocol>,
}

impl Manifest {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing manifest {}", path.display()))
    }

    /// Replay the manifest into `topology`.
    ///
    /// Mirrors are created first, then endpoints attached, then upstream
    /// links made in manifest order, so an entry may name an upstream that
    /// appears later in the file.
    pub fn apply<S: MirrorStore>(&self, topology: &mut MirrorTopology<S>) -> Report {
        let mut report = Report::default();

        // --- Mirrors ---
        let mut created = Vec::with_capacity(self.mirrors.len());
        for entry in &self.mirrors {
            let mut new = entry.mirror.clone();
            if let Some(id) = new.upstream.take() {
                debug!(mirror = %entry.mirror.name, upstream = %id, "upstream id in manifest");
                report.errors.push(FieldError {
                    mirror: Some(entry.mirror.name.clone()),
                    field: "upstream",
                    message: "manifests link upstreams by name; use `upstream_name`".to_string(),
                    input: Some(id.to_string()),
                });
            }
            match topology.create_mirror(new) {
                Ok(mirror) => created.push((entry, mirror.id)),
                Err(err) => report
                    .errors
                    .push(FieldError::from(err).for_mirror(&entry.mirror.name)),
            }
        }

        // --- Endpoints ---
        for (entry, id) in &created {
            for url in &entry.urls {
                if let Err(err) = topology.add_url(*id, url) {
                    report
                        .errors
                        .push(FieldError::from(err).for_mirror(&entry.mirror.name));
                }
            }
            for address in &entry.rsync {
                if let Err(err) = topology.add_rsync_endpoint(*id, address) {
                    report
                        .errors
                        .push(FieldError::from(err).for_mirror(&entry.mirror.name));
                }
            }
        }

        // --- Upstream links ---
        for (entry, id) in &created {
            let Some(upstream_name) = &entry.upstream else {
                continue;
            };
            let Some(upstream) = topology.mirror_by_name(upstream_name) else {
                debug!(mirror = %entry.mirror.name, upstream = %upstream_name, "unknown upstream");
                report.errors.push(FieldError {
                    mirror: Some(entry.mirror.name.clone()),
                    field: "upstream",
                    message: format!("no mirror named `{upstream_name}`"),
                    input: Some(upstream_name.clone()),
                });
                continue;
            };
            if let Err(err) = topology.set_upstream(*id, Some(upstream.id)) {
                report
                    .errors
                    .push(FieldError::from(err).for_mirror(&entry.mirror.name));
            }
        }

        // --- Summary ---
        for (_, id) in &created {
            let (Ok(mirror), Ok(protocols)) = (topology.mirror(*id), topology.supported_protocols(*id))
            else {
                continue;
            };
            let upstream = mirror
                .upstream
                .and_then(|up| topology.mirror(up).ok())
                .map(|up| up.name);
            report.mirrors.push(MirrorSummary {
                name: mirror.name,
                tier: mirror.tier,
                upstream,
                protocols: protocols.into_iter().collect(),
            });
        }

        info!(
            mirrors = report.mirrors.len(),
            errors = report.errors.len(),
            "manifest applied"
        );
        report
    }
}

impl Report {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Human-readable rendering, one line per mirror then one per error.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for mirror in &self.mirrors {
            let protocols = if mirror.protocols.is_empty() {
                "-".to_string()
            } else {
                mirror
                    .protocols
                    .iter()
                    .map(MirrorProtocol::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let _ = write!(out, "{} (tier {})", mirror.name, mirror.tier);
            if let Some(upstream) = &mirror.upstream {
                let _ = write!(out, " <- {upstream}");
            }
            let _ = writeln!(out, ": {protocols}");
        }
        for error in &self.errors {
            let _ = writeln!(out, "error: {error}");
        }
        out
    }
}
