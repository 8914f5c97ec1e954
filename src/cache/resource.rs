//! Per-kind resource cache backed by moka
//!
//! Concurrent misses on the same owner id are coalesced by moka, so they
//! share one fetch. Entries never expire on their own; they leave the cache
//! through [`ResourceCache::invalidate`], [`ResourceCache::clear`] or a
//! capacity eviction, and in every case their object URL is revoked.
//!
//! Every entry records the owner generation its fetch started under.
//! Invalidation bumps the generation, so a fetch that was already in flight
//! is discarded by the next read instead of being served.

use moka::future::Cache;
use moka::notification::RemovalCause;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{BlobRegistry, ObjectUrl, ResourceEntry, ResourceKind};
use crate::api::Transport;

/// Content type assumed when the server does not send one
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// (clear count, per-owner invalidation count)
type Generation = (u64, u64);

#[derive(Default)]
struct Generations {
    cleared: u64,
    owners: HashMap<String, u64>,
}

#[derive(Clone)]
struct Cached {
    generation: Generation,
    entry: ResourceEntry,
}

/// Cache-aside layer for one resource kind
pub struct ResourceCache {
    kind: ResourceKind,
    transport: Arc<Transport>,
    blobs: Arc<BlobRegistry>,
    entries: Cache<String, Cached>,
    generations: Mutex<Generations>,
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("kind", &self.kind)
            .field("entry_count", &self.entries.entry_count())
            .finish()
    }
}

impl ResourceCache {
    /// Create a cache holding at most `max_capacity` entries
    pub fn new(
        kind: ResourceKind,
        transport: Arc<Transport>,
        blobs: Arc<BlobRegistry>,
        max_capacity: u64,
    ) -> Self {
        let evicted = blobs.clone();
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .eviction_listener(move |_key, cached: Cached, cause: RemovalCause| {
                if cause.was_evicted() {
                    if let ResourceEntry::Present(url) = cached.entry {
                        evicted.revoke(&url);
                    }
                }
            })
            .build();

        Self {
            kind,
            transport,
            blobs,
            entries,
            generations: Mutex::new(Generations::default()),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Object URL of the resource owned by `owner_id`, fetched on first use
    ///
    /// Returns `None` when the resource does not exist. Cached results,
    /// including absence, are returned without a network call.
    pub async fn get_resource(&self, owner_id: &str) -> Option<ObjectUrl> {
        let path = self.kind.path(owner_id);
        self.get_resource_at(owner_id, &path).await
    }

    /// Same as [`get_resource`](Self::get_resource) with an explicit remote
    /// path, for endpoints that are not addressed by owner id
    /// (e.g. `/me/profile-picture`)
    pub async fn get_resource_at(&self, owner_id: &str, path: &str) -> Option<ObjectUrl> {
        loop {
            let cached = self
                .entries
                .get_with(owner_id.to_string(), self.fetch(owner_id, path))
                .await;
            if cached.generation == self.generation(owner_id) {
                return cached.entry.url().cloned();
            }
            tracing::debug!(
                "Discarding {} for {} fetched before an invalidation",
                self.kind.label(),
                owner_id
            );
            self.discard(owner_id, cached.generation).await;
        }
    }

    /// Cached entry for `owner_id`, without fetching
    pub async fn peek(&self, owner_id: &str) -> Option<ResourceEntry> {
        self.entries
            .get(owner_id)
            .await
            .filter(|cached| cached.generation == self.generation(owner_id))
            .map(|cached| cached.entry)
    }

    /// Drop the entry for `owner_id` so the next read fetches again
    ///
    /// A fetch still in flight for `owner_id` is discarded when it lands.
    pub async fn invalidate(&self, owner_id: &str) {
        *self
            .lock_generations()
            .owners
            .entry(owner_id.to_string())
            .or_default() += 1;
        if let Some(cached) = self.entries.remove(owner_id).await {
            self.revoke(&cached.entry);
        }
        tracing::debug!("Invalidated {} for {}", self.kind.label(), owner_id);
    }

    /// Drop every entry
    pub async fn clear(&self) {
        {
            let mut generations = self.lock_generations();
            generations.cleared += 1;
            generations.owners.clear();
        }
        for (_key, cached) in self.entries.iter() {
            self.revoke(&cached.entry);
        }
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
    }

    /// Approximate number of cached entries
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    fn lock_generations(&self) -> MutexGuard<'_, Generations> {
        self.generations.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn generation(&self, owner_id: &str) -> Generation {
        let generations = self.lock_generations();
        let owner = generations.owners.get(owner_id).copied().unwrap_or(0);
        (generations.cleared, owner)
    }

    fn revoke(&self, entry: &ResourceEntry) {
        if let ResourceEntry::Present(url) = entry {
            self.blobs.revoke(url);
        }
    }

    /// Remove the entry for `owner_id` if it still carries `stale`
    async fn discard(&self, owner_id: &str, stale: Generation) {
        let still_stale = self
            .entries
            .get(owner_id)
            .await
            .is_some_and(|cached| cached.generation == stale);
        if !still_stale {
            return;
        }
        if let Some(cached) = self.entries.remove(owner_id).await {
            if cached.generation == stale {
                self.revoke(&cached.entry);
            }
        }
    }

    async fn fetch(&self, owner_id: &str, path: &str) -> Cached {
        let generation = self.generation(owner_id);
        let entry = self.fetch_entry(owner_id, path).await;
        Cached { generation, entry }
    }

    async fn fetch_entry(&self, owner_id: &str, path: &str) -> ResourceEntry {
        match self.transport.get(path).await {
            Ok(response) if response.is_empty() => {
                tracing::debug!("No {} for {} (empty body)", self.kind.label(), owner_id);
                ResourceEntry::Absent
            }
            Ok(response) => {
                let content_type = response
                    .content_type
                    .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());
                let url = self.blobs.register(response.body, content_type);
                tracing::debug!("Cached {} for {} as {}", self.kind.label(), owner_id, url);
                ResourceEntry::Present(url)
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!("No {} for {}", self.kind.label(), owner_id);
                ResourceEntry::Absent
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to fetch {} for {}, caching as absent: {}",
                    self.kind.label(),
                    owner_id,
                    e
                );
                ResourceEntry::Absent
            }
        }
    }
}
