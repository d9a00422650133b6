//! MirrorTopology — the aggregate operators edit the mirror network through.
//!
//! Every mutation runs the relevant validator first and only then touches
//! the store, so a rejected request leaves storage exactly as it was.

use crate::{
    config::TopologyConfig,
    errors::{TopologyError, TopologyResult},
    models::{
        Mirror, MirrorId, MirrorProtocol, MirrorRsync, MirrorRsyncId, MirrorUpdate, MirrorUrl,
        MirrorUrlId, NewMirror,
    },
    services::{
        address_validator::AddressValidator, mirror_store::MirrorStore,
        tier_constraint::TierConstraint, url_normalizer::UrlNormalizer,
    },
};
use std::collections::BTreeSet;
use tracing::{debug, info};

pub struct MirrorTopology<S> {
    store: S,
    addresses: AddressValidator,
    urls: UrlNormalizer,
    tiers: TierConstraint,
}

impl<S: MirrorStore> MirrorTopology<S> {
    /// Wire the validators described by `config` around `store`.
    pub fn new(store: S, config: &TopologyConfig) -> Self {
        Self {
            store,
            addresses: AddressValidator::new(),
            urls: UrlNormalizer::new(),
            tiers: TierConstraint::new(config),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn mirror(&self, id: MirrorId) -> TopologyResult<Mirror> {
        Ok(self.store.mirror(id)?)
    }

    pub fn mirror_by_name(&self, name: &str) -> Option<Mirror> {
        self.store.mirrors().into_iter().find(|m| m.name == name)
    }

    pub fn mirrors(&self) -> Vec<Mirror> {
        self.store.mirrors()
    }

    /// Register a new mirror, optionally linked to an upstream.
    pub fn create_mirror(&mut self, new: NewMirror) -> TopologyResult<Mirror> {
        self.tiers.validate_tier(new.tier)?;
        let upstream = new.upstream;
        let mut mirror = Mirror::from_new(new);

        if let Some(upstream_id) = upstream {
            let candidate = self.store.mirror(upstream_id)?;
            self.tiers
                .validate_upstream(&mirror, Some(&candidate), &self.store.mirrors())?;
            mirror.upstream = Some(upstream_id);
        }

        self.store.insert_mirror(mirror.clone())?;
        info!(mirror = %mirror.name, tier = mirror.tier, "mirror created");
        Ok(mirror)
    }

    /// Edit a mirror's identity, flags or tier.
    ///
    /// A mirror other mirrors sync from must stay in the upstream tier range.
    pub fn update_mirror(&mut self, id: MirrorId, update: MirrorUpdate) -> TopologyResult<Mirror> {
        let mut mirror = self.store.mirror(id)?;

        if let Some(tier) = update.tier.filter(|tier| *tier != mirror.tier) {
            self.tiers.validate_tier(tier)?;
            if !self.tiers.allows_upstream_tier(tier) && !self.store.dependents(id).is_empty() {
                debug!(mirror = %mirror.name, tier, "tier change would orphan dependents");
                return Err(TopologyError::InvalidUpstream {
                    candidate: mirror.name,
                    tier,
                });
            }
        }

        mirror.apply(update);
        self.store.update_mirror(mirror.clone())?;
        info!(mirror = %mirror.name, "mirror updated");
        Ok(mirror)
    }

    /// Remove a mirror and everything it owns.
    pub fn delete_mirror(&mut self, id: MirrorId) -> TopologyResult<Mirror> {
        let mirror = self.store.delete_mirror(id)?;
        info!(mirror = %mirror.name, "mirror deleted");
        Ok(mirror)
    }

    /// Normalize `raw`, infer its protocol, and attach it to the mirror.
    pub fn add_url(&mut self, mirror_id: MirrorId, raw: &str) -> TopologyResult<MirrorUrl> {
        let mirror = self.store.mirror(mirror_id)?;
        let (url, protocol) = self.urls.parse(raw)?;

        let record = MirrorUrl::new(mirror.id, url.into_string(), protocol);
        self.store.insert_url(record.clone())?;
        info!(mirror = %mirror.name, url = %record.url, protocol = %protocol, "URL added");
        Ok(record)
    }

    pub fn remove_url(&mut self, url_id: MirrorUrlId) -> TopologyResult<MirrorUrl> {
        let removed = self.store.delete_url(url_id)?;
        info!(url = %removed.url, "URL removed");
        Ok(removed)
    }

    /// Validate `raw` as an address (with optional netmask) and attach it.
    pub fn add_rsync_endpoint(
        &mut self,
        mirror_id: MirrorId,
        raw: &str,
    ) -> TopologyResult<MirrorRsync> {
        let mirror = self.store.mirror(mirror_id)?;
        let address = self.addresses.validate(raw)?;

        let record = MirrorRsync::new(mirror.id, address);
        self.store.insert_rsync(record.clone())?;
        info!(mirror = %mirror.name, address = %record.address, "rsync endpoint added");
        Ok(record)
    }

    pub fn remove_rsync_endpoint(&mut self, rsync_id: MirrorRsyncId) -> TopologyResult<MirrorRsync> {
        let removed = self.store.delete_rsync(rsync_id)?;
        info!(address = %removed.address, "rsync endpoint removed");
        Ok(removed)
    }

    /// Point `mirror_id` at `candidate`, or detach it with `None`.
    pub fn set_upstream(
        &mut self,
        mirror_id: MirrorId,
        candidate: Option<MirrorId>,
    ) -> TopologyResult<()> {
        let mut mirror = self.store.mirror(mirror_id)?;
        let candidate = candidate.map(|id| self.store.mirror(id)).transpose()?;

        self.tiers
            .validate_upstream(&mirror, candidate.as_ref(), &self.store.mirrors())?;

        mirror.upstream = candidate.as_ref().map(|c| c.id);
        mirror.touch();
        self.store.update_mirror(mirror.clone())?;
        info!(
            mirror = %mirror.name,
            upstream = ?candidate.as_ref().map(|c| c.name.as_str()),
            "upstream set"
        );
        Ok(())
    }

    pub fn clear_upstream(&mut self, mirror_id: MirrorId) -> TopologyResult<()> {
        self.set_upstream(mirror_id, None)
    }

    /// Mirrors that `mirror_id` could legally sync from, sorted by name.
    pub fn upstream_candidates(&self, mirror_id: MirrorId) -> TopologyResult<Vec<Mirror>> {
        let mirror = self.store.mirror(mirror_id)?;
        let tiers = self.tiers.upstream_tiers();
        let pool = self.store.mirrors_with_tier_in(*tiers.start(), *tiers.end());
        let network = self.store.mirrors();

        let mut candidates: Vec<Mirror> = self
            .tiers
            .candidates(&mirror, &pool, &network)
            .into_iter()
            .cloned()
            .collect();
        candidates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(candidates)
    }

    pub fn urls(&self, mirror_id: MirrorId) -> TopologyResult<Vec<MirrorUrl>> {
        self.store.mirror(mirror_id)?;
        Ok(self.store.urls(mirror_id))
    }

    pub fn rsync_endpoints(&self, mirror_id: MirrorId) -> TopologyResult<Vec<MirrorRsync>> {
        self.store.mirror(mirror_id)?;
        Ok(self.store.rsync_endpoints(mirror_id))
    }

    /// Protocols the mirror can be reached over, derived from its endpoints.
    ///
    /// Computed from storage on every call.
    pub fn supported_protocols(&self, mirror_id: MirrorId) -> TopologyResult<BTreeSet<MirrorProtocol>> {
        self.store.mirror(mirror_id)?;

        let from_urls = self.store.urls(mirror_id).into_iter().map(|url| url.protocol);
        let from_rsync = self
            .store
            .rsync_endpoints(mirror_id)
            .into_iter()
            .map(|rsync| rsync.protocol());
        Ok(from_urls.chain(from_rsync).collect())
    }

    /// Supported protocols as a comma-separated list, e.g. `http, rsync`.
    pub fn protocol_summary(&self, mirror_id: MirrorId) -> TopologyResult<String> {
        let protocols = self.supported_protocols(mirror_id)?;
        Ok(protocols
            .iter()
            .map(MirrorProtocol::as_str)
            .collect::<Vec<_>>()
            .join(", "))
    }
}
