//! Caller-checked access to the record store.
//!
//! Every operation takes the caller explicitly. Writes from a caller without
//! a session are rejected with [`Error::Unauthorized`]; reads from such a
//! caller return an empty result instead of an error, so "no session" stays
//! distinguishable from a backend fault.
//!
//! Subscribers to the full record set receive a fresh snapshot after every
//! committed write made through this gateway. Writes made by other
//! processes sharing the database are picked up by [`Gateway::spawn_poller`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identity::UserId;
use crate::record::{RecordId, ScoutingRecord, StoredRecord};
use crate::storage::Storage;

/// An immutable, newest-first view of every record at one point in time.
pub type Snapshot = Arc<Vec<StoredRecord>>;

/// The write side of the store, as the form sees it.
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    /// Append a validated record on behalf of `caller`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] when `caller` is `None`, a schema
    /// violation if the store rejects the record, or a transient error if the
    /// store cannot be reached. Nothing is written on error.
    async fn submit(&self, caller: Option<&UserId>, record: &ScoutingRecord) -> Result<RecordId>;
}

/// Shared handle to the record store. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Gateway {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    storage: Mutex<Storage>,
    snapshot: watch::Sender<Snapshot>,
}

impl Gateway {
    /// Wrap an open storage engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial snapshot cannot be read.
    pub fn new(storage: Storage) -> Result<Self> {
        let initial = storage.all_newest_first()?;
        let (snapshot, _) = watch::channel(Arc::new(initial));
        Ok(Self {
            inner: Arc::new(Inner {
                storage: Mutex::new(storage),
                snapshot,
            }),
        })
    }

    fn storage(&self) -> Result<MutexGuard<'_, Storage>> {
        self.inner
            .storage
            .lock()
            .map_err(|_| Error::store_unavailable("storage lock poisoned"))
    }

    /// Append a record on behalf of `caller`, blocking the current thread.
    ///
    /// # Errors
    ///
    /// See [`SubmissionGateway::submit`].
    pub fn submit_blocking(
        &self,
        caller: Option<&UserId>,
        record: &ScoutingRecord,
    ) -> Result<RecordId> {
        let Some(caller) = caller else {
            warn!("Rejected submission without a session");
            return Err(Error::Unauthorized);
        };

        let stored = {
            let storage = self.storage()?;
            let stored = storage.insert(caller, record)?;
            // The row is committed; a failed re-read only delays subscribers
            if let Err(e) = self.publish(&storage) {
                warn!("Record {} stored but not published: {e}", stored.id);
            }
            stored
        };

        info!(
            "Record {} submitted by {} (match {}, team {})",
            stored.id, caller, stored.record.match_number, stored.record.team_number
        );
        Ok(stored.id)
    }

    /// Records submitted by the caller, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn my_records(&self, caller: Option<&UserId>) -> Result<Vec<StoredRecord>> {
        match caller {
            Some(caller) => self.storage()?.by_scouter(caller),
            None => Ok(Vec::new()),
        }
    }

    /// Every record, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn all_records(&self, caller: Option<&UserId>) -> Result<Vec<StoredRecord>> {
        if caller.is_none() {
            return Ok(Vec::new());
        }
        self.storage()?.all_newest_first()
    }

    /// Every record for one match.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn match_records(
        &self,
        caller: Option<&UserId>,
        match_number: u32,
    ) -> Result<Vec<StoredRecord>> {
        if caller.is_none() {
            return Ok(Vec::new());
        }
        self.storage()?.by_match(match_number)
    }

    /// Every record for one team.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn team_records(
        &self,
        caller: Option<&UserId>,
        team_number: u32,
    ) -> Result<Vec<StoredRecord>> {
        if caller.is_none() {
            return Ok(Vec::new());
        }
        self.storage()?.by_team(team_number)
    }

    /// Subscribe to the full record set.
    ///
    /// The subscription starts from a fresh read. A caller without a session
    /// gets a subscription that holds an empty set and never updates.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn subscribe_all(&self, caller: Option<&UserId>) -> Result<Subscription> {
        if caller.is_none() {
            return Ok(Subscription { rx: None });
        }

        let storage = self.storage()?;
        self.publish(&storage)?;
        Ok(Subscription {
            rx: Some(self.inner.snapshot.subscribe()),
        })
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.snapshot.receiver_count()
    }

    /// Publish a new snapshot if another connection appended records since the
    /// last one. Returns whether anything was published.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn refresh(&self) -> Result<bool> {
        let storage = self.storage()?;
        let latest = storage.latest_id()?;
        let published = self.inner.snapshot.borrow().first().map(|r| r.id);
        if latest == published {
            return Ok(false);
        }
        debug!("Store advanced from {:?} to {:?}", published, latest);
        self.publish(&storage)?;
        Ok(true)
    }

    /// Poll the store at `interval` while anyone is subscribed, so that writes
    /// from other processes reach subscribers. Must be called inside a tokio
    /// runtime; abort the returned handle to stop polling.
    #[must_use]
    pub fn spawn_poller(&self, interval: Duration) -> JoinHandle<()> {
        let gateway = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if gateway.subscriber_count() == 0 {
                    continue;
                }
                if let Err(e) = gateway.refresh() {
                    warn!("Polling the store failed: {e}");
                }
            }
        })
    }

    /// Re-read every record and hand the snapshot to subscribers.
    fn publish(&self, storage: &Storage) -> Result<()> {
        let all = storage.all_newest_first()?;
        debug!(
            "Publishing snapshot of {} records to {} subscribers",
            all.len(),
            self.subscriber_count()
        );
        self.inner.snapshot.send_replace(Arc::new(all));
        Ok(())
    }
}

#[async_trait]
impl SubmissionGateway for Gateway {
    async fn submit(&self, caller: Option<&UserId>, record: &ScoutingRecord) -> Result<RecordId> {
        let gateway = self.clone();
        let caller = caller.cloned();
        let record = record.clone();
        tokio::task::spawn_blocking(move || gateway.submit_blocking(caller.as_ref(), &record))
            .await
            .map_err(|e| Error::internal(format!("submission task failed: {e}")))?
    }
}

/// A live subscription to every record.
#[derive(Debug)]
pub struct Subscription {
    rx: Option<watch::Receiver<Snapshot>>,
}

impl Subscription {
    /// The most recent snapshot.
    #[must_use]
    pub fn current(&self) -> Snapshot {
        match &self.rx {
            Some(rx) => Arc::clone(&rx.borrow()),
            None => Arc::new(Vec::new()),
        }
    }

    /// Wait until a newer snapshot is available, and return it.
    ///
    /// A subscription opened without a session never sees a newer snapshot,
    /// so for it this waits forever.
    ///
    /// # Errors
    ///
    /// Returns a store-unavailable error once the gateway is gone.
    pub async fn changed(&mut self) -> Result<Snapshot> {
        let Some(rx) = self.rx.as_mut() else {
            return std::future::pending().await;
        };
        rx.changed()
            .await
            .map_err(|_| Error::store_unavailable("record store closed"))?;
        Ok(Arc::clone(&rx.borrow_and_update()))
    }
}
