//! Rules for which mirrors may act as upstream for which others.
//!
//! Only mirrors in the upstream tier range (tier 0 or 1 by default) may be
//! synced from, whatever the child's own tier. Links must not form cycles;
//! since storage could in principle hold a corrupt chain, every walk up the
//! upstream chain is bounded by the number of tiers.

use crate::{
    config::TopologyConfig,
    errors::{TopologyError, TopologyResult},
    models::{Mirror, MirrorId},
};
use std::ops::RangeInclusive;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct TierConstraint {
    upstream_tiers: RangeInclusive<u8>,
    max_tier: u8,
}

/// Outcome of walking a candidate's upstream chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainWalk {
    /// Reached a mirror with no upstream after this many hops.
    Terminated(usize),
    /// The mirror being edited appears in the chain.
    ReachesMirror,
    /// Still linked after the hop budget ran out.
    Unbounded,
}

impl TierConstraint {
    pub fn new(config: &TopologyConfig) -> Self {
        Self {
            upstream_tiers: config.min_upstream_tier..=config.max_upstream_tier,
            max_tier: config.max_tier,
        }
    }

    /// Whether a mirror of `tier` may be chosen as an upstream.
    pub fn allows_upstream_tier(&self, tier: u8) -> bool {
        self.upstream_tiers.contains(&tier)
    }

    pub fn upstream_tiers(&self) -> RangeInclusive<u8> {
        self.upstream_tiers.clone()
    }

    /// Check that `tier` is a tier the network defines.
    pub fn validate_tier(&self, tier: u8) -> TopologyResult<()> {
        if tier > self.max_tier {
            return Err(TopologyError::InvalidTier {
                tier,
                max: self.max_tier,
            });
        }
        Ok(())
    }

    /// Maximum number of upstream hops in any chain.
    pub fn walk_bound(&self) -> usize {
        usize::from(self.max_tier) + 1
    }

    /// Check whether `mirror` may sync from `candidate`.
    ///
    /// `network` is used to resolve upstream references while walking the
    /// candidate's chain; mirrors missing from it end the walk. The link is
    /// refused when the chain through it, from the deepest mirror syncing
    /// from `mirror` up to the root, would exceed `walk_bound` hops. Choosing
    /// no upstream is always allowed.
    pub fn validate_upstream(
        &self,
        mirror: &Mirror,
        candidate: Option<&Mirror>,
        network: &[Mirror],
    ) -> TopologyResult<()> {
        let Some(candidate) = candidate else {
            return Ok(());
        };

        let hops_above = match self.walk(mirror.id, candidate, network) {
            ChainWalk::Terminated(hops) => hops,
            walk => {
                debug!(
                    mirror = %mirror.name,
                    candidate = %candidate.name,
                    walk = ?walk,
                    "upstream rejected: cycle"
                );
                return Err(TopologyError::CyclicUpstream {
                    mirror: mirror.name.clone(),
                    candidate: candidate.name.clone(),
                });
            }
        };

        if !self.allows_upstream_tier(candidate.tier) {
            debug!(
                mirror = %mirror.name,
                candidate = %candidate.name,
                tier = candidate.tier,
                "upstream rejected: tier"
            );
            return Err(TopologyError::InvalidUpstream {
                candidate: candidate.name.clone(),
                tier: candidate.tier,
            });
        }

        let hops = self.depth_below(mirror.id, network) + 1 + hops_above;
        if hops > self.walk_bound() {
            debug!(
                mirror = %mirror.name,
                candidate = %candidate.name,
                hops,
                "upstream rejected: chain too long"
            );
            return Err(TopologyError::UpstreamChainTooLong {
                mirror: mirror.name.clone(),
                candidate: candidate.name.clone(),
                hops,
                max: self.walk_bound(),
            });
        }

        Ok(())
    }

    /// Filter `pool` down to the mirrors `mirror` may legally sync from.
    pub fn candidates<'a>(
        &self,
        mirror: &Mirror,
        pool: &'a [Mirror],
        network: &[Mirror],
    ) -> Vec<&'a Mirror> {
        pool.iter()
            .filter(|&candidate| {
                self.validate_upstream(mirror, Some(candidate), network)
                    .is_ok()
            })
            .collect()
    }

    fn walk(&self, mirror_id: MirrorId, candidate: &Mirror, network: &[Mirror]) -> ChainWalk {
        let mut current = candidate;
        let mut hops = 0;
        loop {
            if current.id == mirror_id {
                return ChainWalk::ReachesMirror;
            }
            let Some(next_id) = current.upstream else {
                return ChainWalk::Terminated(hops);
            };
            if hops == self.walk_bound() {
                return ChainWalk::Unbounded;
            }
            hops += 1;
            match network.iter().find(|m| m.id == next_id) {
                Some(next) => current = next,
                None => {
                    warn!(
                        mirror = %current.name,
                        upstream = %next_id,
                        "upstream reference points at unknown mirror"
                    );
                    return ChainWalk::Terminated(hops);
                }
            }
        }
    }

    /// Length of the longest chain of mirrors syncing (directly or not) from
    /// `mirror_id`. Stops one level past the bound.
    fn depth_below(&self, mirror_id: MirrorId, network: &[Mirror]) -> usize {
        let mut level = vec![mirror_id];
        let mut depth = 0;
        while depth <= self.walk_bound() {
            let next: Vec<MirrorId> = network
                .iter()
                .filter(|m| m.upstream.is_some_and(|up| level.contains(&up)))
                .map(|m| m.id)
                .collect();
            if next.is_empty() {
                break;
            }
            depth += 1;
            level = next;
        }
        depth
    }
}

impl Default for TierConstraint {
    fn default() -> Self {
        Self::new(&TopologyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMirror;

    fn mirror(name: &str, tier: u8, upstream: Option<&Mirror>) -> Mirror {
        let mut m = Mirror::from_new(NewMirror::new(name, tier));
        m.upstream = upstream.map(|u| u.id);
        m
    }

    #[test]
    fn no_upstream_is_always_allowed() {
        let leaf = mirror("leaf", 2, None);
        assert!(TierConstraint::default()
            .validate_upstream(&leaf, None, &[])
            .is_ok());
    }

    #[test]
    fn accepts_tier_zero_and_one_candidates() {
        let constraint = TierConstraint::default();
        let root = mirror("root", 0, None);
        let hop = mirror("hop", 1, Some(&root));
        let leaf = mirror("leaf", 2, None);
        let network = vec![root.clone(), hop.clone(), leaf.clone()];

        assert!(constraint.validate_upstream(&leaf, Some(&root), &network).is_ok());
        assert!(constraint.validate_upstream(&leaf, Some(&hop), &network).is_ok());
    }

    #[test]
    fn rejects_downstream_tier_candidates() {
        let constraint = TierConstraint::default();
        let other = mirror("other", 2, None);
        let leaf = mirror("leaf", 2, None);
        let network = vec![other.clone(), leaf.clone()];

        let err = constraint
            .validate_upstream(&leaf, Some(&other), &network)
            .unwrap_err();
        assert_eq!(
            err,
            TopologyError::InvalidUpstream {
                candidate: "other".into(),
                tier: 2
            }
        );
    }

    #[test]
    fn a_mirror_cannot_be_its_own_upstream() {
        let root = mirror("root", 0, None);
        let err = TierConstraint::default()
            .validate_upstream(&root, Some(&root), &[root.clone()])
            .unwrap_err();
        assert!(matches!(err, TopologyError::CyclicUpstream { .. }));
    }

    #[test]
    fn detects_transitive_cycle() {
        let a = mirror("a", 0, None);
        let b = mirror("b", 1, Some(&a));
        let c = mirror("c", 2, Some(&b));
        let network = vec![a.clone(), b.clone(), c.clone()];

        let err = TierConstraint::default()
            .validate_upstream(&a, Some(&c), &network)
            .unwrap_err();
        assert_eq!(
            err,
            TopologyError::CyclicUpstream {
                mirror: "a".into(),
                candidate: "c".into()
            }
        );
    }

    #[test]
    fn corrupt_cycle_in_storage_still_terminates() {
        let mut x = mirror("x", 1, None);
        let mut y = mirror("y", 1, None);
        x.upstream = Some(y.id);
        y.upstream = Some(x.id);
        let edited = mirror("edited", 2, None);
        let network = vec![x.clone(), y.clone(), edited.clone()];

        let err = TierConstraint::default()
            .validate_upstream(&edited, Some(&x), &network)
            .unwrap_err();
        assert!(matches!(err, TopologyError::CyclicUpstream { .. }));
    }

    #[test]
    fn chain_longer_than_tier_count_is_rejected() {
        let constraint = TierConstraint::default();
        let mut chain = vec![mirror("m0", 0, None)];
        for i in 1..=constraint.walk_bound() + 1 {
            let next = mirror(&format!("m{i}"), 1, chain.last());
            chain.push(next);
        }
        let edited = mirror("edited", 2, None);

        let deepest = chain.last().unwrap();
        assert!(matches!(
            constraint.validate_upstream(&edited, Some(deepest), &chain),
            Err(TopologyError::CyclicUpstream { .. })
        ));

        let within_bound = &chain[constraint.walk_bound() - 1];
        assert!(constraint
            .validate_upstream(&edited, Some(within_bound), &chain)
            .is_ok());
    }

    #[test]
    fn dangling_reference_ends_the_walk() {
        let mut orphan = mirror("orphan", 1, None);
        orphan.upstream = Some(uuid::Uuid::new_v4());
        let leaf = mirror("leaf", 2, None);

        assert!(TierConstraint::default()
            .validate_upstream(&leaf, Some(&orphan), &[orphan.clone()])
            .is_ok());
    }

    #[test]
    fn candidates_exclude_self_and_descendants() {
        let constraint = TierConstraint::default();
        let a = mirror("a", 0, None);
        let b = mirror("b", 1, Some(&a));
        let c = mirror("c", 1, None);
        let network = vec![a.clone(), b.clone(), c.clone()];

        let names: Vec<&str> = constraint
            .candidates(&a, &network, &network)
            .into_iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["c"]);
    }

    #[test]
    fn validate_tier_honours_max_tier() {
        let constraint = TierConstraint::default();
        assert!(constraint.validate_tier(2).is_ok());
        assert_eq!(
            constraint.validate_tier(3),
            Err(TopologyError::InvalidTier { tier: 3, max: 2 })
        );
    }

    #[test]
    fn custom_upstream_range() {
        let constraint = TierConstraint::new(&TopologyConfig {
            max_tier: 4,
            min_upstream_tier: 0,
            max_upstream_tier: 2,
        });
        assert!(constraint.allows_upstream_tier(2));
        assert!(!constraint.allows_upstream_tier(3));
        assert_eq!(constraint.walk_bound(), 5);
    }

    #[test]
    fn link_above_deep_subtree_is_rejected() {
        let constraint = TierConstraint::default();
        let bound = constraint.walk_bound();
        let top = mirror("top", 0, None);
        let mut chain = vec![mirror("m0", 1, None)];
        for i in 1..=bound {
            let next = mirror(&format!("m{i}"), 1, chain.last());
            chain.push(next);
        }
        let head = chain[0].clone();
        let mut network = chain.clone();
        network.push(top.clone());

        let err = constraint
            .validate_upstream(&head, Some(&top), &network)
            .unwrap_err();
        assert_eq!(
            err,
            TopologyError::UpstreamChainTooLong {
                mirror: "m0".into(),
                candidate: "top".into(),
                hops: bound + 1,
                max: bound,
            }
        );
    }

    #[test]
    fn subtree_depth_counts_longest_branch() {
        let constraint = TierConstraint::default();
        let a = mirror("a", 1, None);
        let b = mirror("b", 1, Some(&a));
        let c = mirror("c", 2, Some(&b));
        let short = mirror("short", 2, Some(&a));
        let network = vec![a.clone(), b, c, short];
        assert_eq!(constraint.depth_below(a.id, &network), 2);
    }
}
