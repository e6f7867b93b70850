//! Rate-limited external sync jobs.
//!
//! Two singleton jobs are guarded by reclaimable lock records that are never
//! deleted: the catalog sync from the release feed, and the boot image id
//! lookup. Whoever wins the conditional write runs the job; everyone else
//! serves what the last successful run stored.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use hearth_core::config::ImageFilterConfig;
use hearth_state::{Catalog, CatalogEntry, LockOutcome, LockRecord, Reclaim, StateError, WorkflowLock};
use serde::Serialize;
use tracing::{info, warn};

use crate::collaborators::{MachineImage, ProvisioningApi, ReleaseFeed};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::manifest::parse_manifests;

/// Lock record guarding the catalog sync.
pub const CATALOG_SYNC: &str = "CATALOG_SYNC";
/// Lock record guarding image resolution; its payload carries the cached id.
pub const IMAGE_RESOLVE: &str = "IMAGE_RESOLVE";

const VERSION_KEY: &str = "version";
const IMAGE_ID_KEY: &str = "imageId";
const SYNC_FAILED: &str = "Failed to update games list.";

/// Catalog as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogSnapshot {
    pub games: Vec<CatalogEntry>,
    /// Set when the sync attempt failed and `games` is the stored copy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone)]
pub struct SyncCache {
    lock: WorkflowLock,
    catalog: Catalog,
    feed: Arc<dyn ReleaseFeed>,
    provisioning: Arc<dyn ProvisioningApi>,
    image_filter: ImageFilterConfig,
    catalog_cooldown: Duration,
    image_policy: Reclaim,
}

impl SyncCache {
    pub fn new(
        lock: WorkflowLock,
        catalog: Catalog,
        feed: Arc<dyn ReleaseFeed>,
        provisioning: Arc<dyn ProvisioningApi>,
        image_filter: ImageFilterConfig,
        catalog_cooldown: Duration,
        image_policy: Reclaim,
    ) -> Self {
        Self {
            lock,
            catalog,
            feed,
            provisioning,
            image_filter,
            catalog_cooldown,
            image_policy,
        }
    }

    /// Sync the catalog if this caller wins the cooldown lock, then return it.
    pub async fn sync_catalog(&self) -> OrchestratorResult<CatalogSnapshot> {
        let mut message = None;
        match self.lock.acquire_or_reclaim(
            CATALOG_SYNC,
            "catalog-sync",
            Reclaim::FailedOrOlderThan(self.catalog_cooldown),
        ) {
            Ok(record) => match self.pull_catalog(&record).await {
                Ok(Some((version, games))) => {
                    let payload = BTreeMap::from([(VERSION_KEY.to_string(), version)]);
                    self.finish(CATALOG_SYNC, LockOutcome::Success(payload));
                    return Ok(CatalogSnapshot {
                        games,
                        message: None,
                    });
                }
                Ok(None) => self.finish(CATALOG_SYNC, LockOutcome::Success(record.payload)),
                Err(e) => {
                    warn!(error = %e, "catalog sync failed");
                    self.finish(CATALOG_SYNC, LockOutcome::Failed);
                    message = Some(SYNC_FAILED.to_string());
                }
            },
            Err(StateError::AlreadyLocked(_)) => {}
            Err(e) => {
                warn!(error = %e, "failed to take catalog sync lock");
                message = Some(SYNC_FAILED.to_string());
            }
        }

        Ok(CatalogSnapshot {
            games: self.catalog.list()?,
            message,
        })
    }

    /// Fetch and store a newer catalog. `None` when the stored one is current.
    async fn pull_catalog(
        &self,
        record: &LockRecord,
    ) -> OrchestratorResult<Option<(String, Vec<CatalogEntry>)>> {
        let tag = self
            .feed
            .latest_release_tag()
            .await
            .map_err(OrchestratorError::ReleaseFeed)?;
        if record.payload.get(VERSION_KEY) == Some(&tag) {
            info!(%tag, "catalog already current");
            return Ok(None);
        }

        let manifests = self
            .feed
            .download_manifests(&tag)
            .await
            .map_err(OrchestratorError::ReleaseFeed)?;
        let games = parse_manifests(&manifests);
        self.catalog.replace(&games)?;
        info!(%tag, count = games.len(), "catalog synced");
        Ok(Some((tag, games)))
    }

    /// The cached boot image id, if any run has stored one.
    pub fn current_image_id(&self) -> OrchestratorResult<Option<String>> {
        Ok(self
            .lock
            .get(IMAGE_RESOLVE)?
            .and_then(|record| record.payload.get(IMAGE_ID_KEY).cloned()))
    }

    /// Look up the newest matching image if the rate limit allows.
    ///
    /// When another caller holds the job or the last success is recent, the
    /// cached id is returned instead.
    pub async fn refresh_image_id(&self) -> OrchestratorResult<Option<String>> {
        match self
            .lock
            .acquire_or_reclaim(IMAGE_RESOLVE, "image-resolve", self.image_policy)
        {
            Ok(_) => {}
            Err(StateError::AlreadyLocked(_)) => return self.current_image_id(),
            Err(e) => return Err(e.into()),
        }

        let images = match self.provisioning.list_recent_images(&self.image_filter).await {
            Ok(images) => images,
            Err(e) => {
                self.finish(IMAGE_RESOLVE, LockOutcome::Failed);
                return Err(OrchestratorError::Provisioning(e));
            }
        };
        let Some(image) = newest_image(images) else {
            self.finish(IMAGE_RESOLVE, LockOutcome::Failed);
            return Err(OrchestratorError::NoImage);
        };

        info!(image_id = %image.image_id, "boot image resolved");
        let payload = BTreeMap::from([(IMAGE_ID_KEY.to_string(), image.image_id.clone())]);
        self.lock.complete(IMAGE_RESOLVE, LockOutcome::Success(payload))?;
        Ok(Some(image.image_id))
    }

    /// Cached image id, resolving one first when nothing is cached.
    pub async fn image_id(&self) -> OrchestratorResult<String> {
        if let Some(id) = self.current_image_id()? {
            return Ok(id);
        }
        self.refresh_image_id()
            .await?
            .ok_or(OrchestratorError::NoImage)
    }

    fn finish(&self, resource_id: &str, outcome: LockOutcome) {
        if let Err(e) = self.lock.complete(resource_id, outcome) {
            // The record is reclaimable after the cooldown either way.
            warn!(%resource_id, error = %e, "failed to record sync outcome");
        }
    }
}

/// Newest image by creation time; images without a parseable one rank last.
pub fn newest_image(mut images: Vec<MachineImage>) -> Option<MachineImage> {
    images.sort_by_cached_key(|image| Reverse(created_at(image)));
    images.into_iter().next()
}

fn created_at(image: &MachineImage) -> Option<DateTime<FixedOffset>> {
    let raw = image.created_at.as_deref()?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(at) => Some(at),
        Err(e) => {
            warn!(image_id = %image.image_id, %raw, error = %e, "unparseable image creation time");
            None
        }
    }
}
