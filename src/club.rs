use crate::backup::{BackupClient, PushReceipt};
use crate::config::Config;
use crate::db::Database;
use crate::error::{ClubError, RemoteSyncError};
use crate::scoring::{self, Comparison, RankedRestaurant, RestaurantScore};
use crate::store::{GroupStore, ReviewUpsert};
use tracing::{error, info, warn};

/// Result of the remote mirroring step that follows a local commit.
#[derive(Debug)]
pub enum SyncOutcome {
    Synced(PushReceipt),
    Skipped,                 // No remote backup configured
    Failed(RemoteSyncError), // Local snapshot stands, push can be retried
}

/// A mutation that was applied and durably saved.
#[derive(Debug)]
pub struct Committed<T> {
    pub value: T,
    pub sync: SyncOutcome,
}

impl<T> Committed<T> {
    pub fn has_warning(&self) -> bool {
        matches!(self.sync, SyncOutcome::Failed(_))
    }
}

/// One club session: the in-memory store, its snapshot and the optional
/// remote mirror. Each mutation runs validate, apply, persist, sync in order
/// and finishes before the next one starts.
pub struct Club {
    store: GroupStore,
    db: Database,
    backup: Option<BackupClient>,
}

impl Club {
    pub fn new(store: GroupStore, db: Database) -> Self {
        Self {
            store,
            db,
            backup: None,
        }
    }

    /// Takes the snapshot lock, loads the snapshot and validates it against
    /// the configured categories.
    pub async fn open(config: &Config) -> Result<Self, ClubError> {
        let db = Database::open(&config.snapshot_path)?;
        let snapshot = db.load().await?;
        let store = GroupStore::from_snapshot(config.categories.clone(), snapshot)?
            .with_self_votes(config.allow_self_vote);
        info!(
            groups = store.snapshot().len(),
            self_votes = config.allow_self_vote,
            "club opened"
        );
        Ok(Self::new(store, db))
    }

    pub fn with_backup(mut self, backup: BackupClient) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn store(&self) -> &GroupStore {
        &self.store
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn create_group(
        &mut self,
        name: &str,
        members: Vec<String>,
    ) -> Result<Committed<()>, ClubError> {
        self.commit("create_group", |store| store.create_group(name, members))
            .await
    }

    pub async fn add_restaurant(
        &mut self,
        group: &str,
        name: &str,
        lat: f64,
        lon: f64,
    ) -> Result<Committed<()>, ClubError> {
        self.commit("add_restaurant", |store| {
            store.add_restaurant(group, name, lat, lon)
        })
        .await
    }

    pub async fn upsert_review(
        &mut self,
        group: &str,
        restaurant: &str,
        reviewer: &str,
        votes: Vec<u8>,
        category_comments: Vec<String>,
        comment: &str,
    ) -> Result<Committed<ReviewUpsert>, ClubError> {
        self.commit("upsert_review", |store| {
            store.upsert_review(group, restaurant, reviewer, votes, category_comments, comment)
        })
        .await
    }

    pub async fn vote_comment(
        &mut self,
        group: &str,
        restaurant: &str,
        voter: &str,
        target_reviewer: &str,
    ) -> Result<Committed<u32>, ClubError> {
        self.commit("vote_comment", |store| {
            store.vote_comment(group, restaurant, voter, target_reviewer)
        })
        .await
    }

    pub fn summary(&self, group: &str, restaurant: &str) -> Result<RestaurantScore, ClubError> {
        scoring::summarize(self.store.restaurant(group, restaurant)?)
    }

    pub fn compare(
        &self,
        group: &str,
        restaurants: &[String],
    ) -> Result<Vec<Comparison>, ClubError> {
        scoring::compare(group, self.store.group(group)?, restaurants)
    }

    pub fn ranking(&self, group: &str) -> Result<Vec<RankedRestaurant>, ClubError> {
        Ok(scoring::ranking(self.store.group(group)?))
    }

    /// Pushes the current state again, e.g. after an earlier sync failed.
    pub async fn resync(&self) -> Result<SyncOutcome, ClubError> {
        let bytes = Database::snapshot_bytes(self.store.snapshot())?;
        Ok(self.sync(&bytes).await)
    }

    async fn commit<T, F>(&mut self, action: &str, apply: F) -> Result<Committed<T>, ClubError>
    where
        F: FnOnce(&mut GroupStore) -> Result<T, ClubError>,
    {
        let previous = self.store.clone();
        let value = apply(&mut self.store)?;

        let bytes = match self.db.save(self.store.snapshot()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                // Memory must not run ahead of disk
                self.store = previous;
                error!(action, error = %e, "snapshot save failed, change rolled back");
                return Err(e.into());
            }
        };
        info!(action, "change committed");

        let sync = self.sync(&bytes).await;
        Ok(Committed { value, sync })
    }

    async fn sync(&self, bytes: &[u8]) -> SyncOutcome {
        let Some(backup) = &self.backup else {
            return SyncOutcome::Skipped;
        };
        match backup.push_snapshot(bytes).await {
            Ok(receipt) => SyncOutcome::Synced(receipt),
            Err(e) => {
                warn!(error = %e, "remote backup failed, local snapshot kept");
                SyncOutcome::Failed(e)
            }
        }
    }
}
