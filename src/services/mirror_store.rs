//! Storage collaborator for mirrors and their endpoints.
//!
//! `MirrorTopology` talks to storage only through [`MirrorStore`]. The
//! in-memory implementation backs the CLI and the tests; a database-backed
//! store would implement the same trait.

use crate::models::{Mirror, MirrorId, MirrorRsync, MirrorRsyncId, MirrorUrl, MirrorUrlId};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("mirror `{0}` not found")]
    MirrorNotFound(MirrorId),
    #[error("mirror URL `{0}` not found")]
    UrlNotFound(MirrorUrlId),
    #[error("rsync endpoint `{0}` not found")]
    RsyncNotFound(MirrorRsyncId),
    #[error("a mirror named `{0}` already exists")]
    DuplicateMirrorName(String),
    #[error("URL `{0}` is already registered")]
    DuplicateUrl(String),
    #[error("mirror `{name}` is the upstream of {dependents} other mirror(s)")]
    MirrorInUse { name: String, dependents: usize },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// CRUD access to mirrors, URLs and rsync endpoints.
///
/// Implementations must make each call all-or-nothing.
pub trait MirrorStore {
    fn insert_mirror(&mut self, mirror: Mirror) -> StoreResult<()>;
    fn update_mirror(&mut self, mirror: Mirror) -> StoreResult<()>;
    /// Remove a mirror together with every endpoint it owns.
    fn delete_mirror(&mut self, id: MirrorId) -> StoreResult<Mirror>;
    fn mirror(&self, id: MirrorId) -> StoreResult<Mirror>;
    fn mirrors(&self) -> Vec<Mirror>;
    /// Mirrors with `low <= tier <= high`.
    fn mirrors_with_tier_in(&self, low: u8, high: u8) -> Vec<Mirror>;
    /// Mirrors whose upstream is `id`.
    fn dependents(&self, id: MirrorId) -> Vec<Mirror>;

    fn insert_url(&mut self, url: MirrorUrl) -> StoreResult<()>;
    fn delete_url(&mut self, id: MirrorUrlId) -> StoreResult<MirrorUrl>;
    fn urls(&self, mirror_id: MirrorId) -> Vec<MirrorUrl>;

    fn insert_rsync(&mut self, rsync: MirrorRsync) -> StoreResult<()>;
    fn delete_rsync(&mut self, id: MirrorRsyncId) -> StoreResult<MirrorRsync>;
    fn rsync_endpoints(&self, mirror_id: MirrorId) -> Vec<MirrorRsync>;
}

/// A [`MirrorStore`] held entirely in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMirrorStore {
    mirrors: BTreeMap<MirrorId, Mirror>,
    urls: BTreeMap<MirrorUrlId, MirrorUrl>,
    rsync: BTreeMap<MirrorRsyncId, MirrorRsync>,
}

impl InMemoryMirrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_mirror(&self, id: MirrorId) -> StoreResult<()> {
        if self.mirrors.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::MirrorNotFound(id))
        }
    }

    fn ensure_name_free(&self, name: &str, except: Option<MirrorId>) -> StoreResult<()> {
        let taken = self
            .mirrors
            .values()
            .any(|m| m.name == name && Some(m.id) != except);
        if taken {
            return Err(StoreError::DuplicateMirrorName(name.to_string()));
        }
        Ok(())
    }
}

impl MirrorStore for InMemoryMirrorStore {
    fn insert_mirror(&mut self, mirror: Mirror) -> StoreResult<()> {
        self.ensure_name_free(&mirror.name, None)?;
        debug!(mirror = %mirror.name, id = %mirror.id, "stored mirror");
        self.mirrors.insert(mirror.id, mirror);
        Ok(())
    }

    fn update_mirror(&mut self, mirror: Mirror) -> StoreResult<()> {
        self.ensure_mirror(mirror.id)?;
        self.ensure_name_free(&mirror.name, Some(mirror.id))?;
        self.mirrors.insert(mirror.id, mirror);
        Ok(())
    }

    fn delete_mirror(&mut self, id: MirrorId) -> StoreResult<Mirror> {
        let mirror = self.mirror(id)?;
        let dependents = self.dependents(id).len();
        if dependents > 0 {
            return Err(StoreError::MirrorInUse {
                name: mirror.name,
                dependents,
            });
        }

        self.urls.retain(|_, url| url.mirror_id != id);
        self.rsync.retain(|_, rsync| rsync.mirror_id != id);
        self.mirrors.remove(&id);
        debug!(mirror = %mirror.name, "deleted mirror and its endpoints");
        Ok(mirror)
    }

    fn mirror(&self, id: MirrorId) -> StoreResult<Mirror> {
        self.mirrors
            .get(&id)
            .cloned()
            .ok_or(StoreError::MirrorNotFound(id))
    }

    fn mirrors(&self) -> Vec<Mirror> {
        self.mirrors.values().cloned().collect()
    }

    fn mirrors_with_tier_in(&self, low: u8, high: u8) -> Vec<Mirror> {
        self.mirrors
            .values()
            .filter(|m| (low..=high).contains(&m.tier))
            .cloned()
            .collect()
    }

    fn dependents(&self, id: MirrorId) -> Vec<Mirror> {
        self.mirrors
            .values()
            .filter(|m| m.upstream == Some(id))
            .cloned()
            .collect()
    }

    fn insert_url(&mut self, url: MirrorUrl) -> StoreResult<()> {
        self.ensure_mirror(url.mirror_id)?;
        if self.urls.values().any(|existing| existing.url == url.url) {
            return Err(StoreError::DuplicateUrl(url.url));
        }
        self.urls.insert(url.id, url);
        Ok(())
    }

    fn delete_url(&mut self, id: MirrorUrlId) -> StoreResult<MirrorUrl> {
        self.urls.remove(&id).ok_or(StoreError::UrlNotFound(id))
    }

    fn urls(&self, mirror_id: MirrorId) -> Vec<MirrorUrl> {
        self.urls
            .values()
            .filter(|url| url.mirror_id == mirror_id)
            .cloned()
            .collect()
    }

    fn insert_rsync(&mut self, rsync: MirrorRsync) -> StoreResult<()> {
        self.ensure_mirror(rsync.mirror_id)?;
        self.rsync.insert(rsync.id, rsync);
        Ok(())
    }

    fn delete_rsync(&mut self, id: MirrorRsyncId) -> StoreResult<MirrorRsync> {
        self.rsync.remove(&id).ok_or(StoreError::RsyncNotFound(id))
    }

    fn rsync_endpoints(&self, mirror_id: MirrorId) -> Vec<MirrorRsync> {
        self.rsync
            .values()
            .filter(|rsync| rsync.mirror_id == mirror_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MirrorProtocol, NewMirror};

    fn stored(store: &mut InMemoryMirrorStore, name: &str, tier: u8) -> Mirror {
        let mirror = Mirror::from_new(NewMirror::new(name, tier));
        store.insert_mirror(mirror.clone()).unwrap();
        mirror
    }

    #[test]
    fn names_are_unique() {
        let mut store = InMemoryMirrorStore::new();
        stored(&mut store, "alpha", 0);
        let err = store
            .insert_mirror(Mirror::from_new(NewMirror::new("alpha", 1)))
            .unwrap_err();
        assert_eq!(err, StoreError::DuplicateMirrorName("alpha".into()));
    }

    #[test]
    fn tier_query_is_inclusive() {
        let mut store = InMemoryMirrorStore::new();
        stored(&mut store, "t0", 0);
        stored(&mut store, "t1", 1);
        stored(&mut store, "t2", 2);

        let mut names: Vec<String> = store
            .mirrors_with_tier_in(0, 1)
            .into_iter()
            .map(|m| m.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["t0", "t1"]);
    }

    #[test]
    fn delete_cascades_endpoints() {
        let mut store = InMemoryMirrorStore::new();
        let mirror = stored(&mut store, "alpha", 1);
        store
            .insert_url(MirrorUrl::new(
                mirror.id,
                "http://a.org/".into(),
                MirrorProtocol::Http,
            ))
            .unwrap();

        store.delete_mirror(mirror.id).unwrap();
        assert!(store.urls(mirror.id).is_empty());
        assert!(matches!(
            store.mirror(mirror.id),
            Err(StoreError::MirrorNotFound(_))
        ));
    }

    #[test]
    fn delete_refused_while_dependents_exist() {
        let mut store = InMemoryMirrorStore::new();
        let root = stored(&mut store, "root", 0);
        let mut child = Mirror::from_new(NewMirror::new("child", 2));
        child.upstream = Some(root.id);
        store.insert_mirror(child).unwrap();

        let err = store.delete_mirror(root.id).unwrap_err();
        assert_eq!(
            err,
            StoreError::MirrorInUse {
                name: "root".into(),
                dependents: 1
            }
        );
        assert!(store.mirror(root.id).is_ok());
    }

    #[test]
    fn endpoints_require_an_existing_mirror() {
        let mut store = InMemoryMirrorStore::new();
        let orphan = MirrorUrl::new(uuid::Uuid::new_v4(), "http://a.org/".into(), MirrorProtocol::Http);
        assert!(matches!(
            store.insert_url(orphan),
            Err(StoreError::MirrorNotFound(_))
        ));
    }
}
