//! In-memory [`Storage`] backend.
//!
//! Used by tests, the demo, and single-process setups that don't need
//! persistence. It also lets callers flip the readiness flag and make loads
//! fail, which is what the admission tests need to exercise the denial paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use warden_protocol::PlayerId;

use crate::{Storage, StorageError, UserRecord};

/// A [`Storage`] that keeps every record in a `HashMap`.
///
/// `std::sync::Mutex` rather than an async one: no lock is ever held across
/// an `.await`.
#[derive(Debug)]
pub struct MemoryStorage {
    accepting: AtomicBool,
    records: Mutex<HashMap<PlayerId, UserRecord>>,
    failing: Mutex<HashSet<PlayerId>>,
    loads: AtomicU64,
    saves: AtomicU64,
}

impl MemoryStorage {
    /// Creates an empty store that accepts logins.
    pub fn new() -> Self {
        Self {
            accepting: AtomicBool::new(true),
            records: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            loads: AtomicU64::new(0),
            saves: AtomicU64::new(0),
        }
    }

    /// Flips the readiness flag reported by [`Storage::is_accepting_logins`].
    pub fn set_accepting_logins(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }

    /// Seeds (or replaces) a record.
    pub fn insert(&self, record: UserRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.id, record);
    }

    /// Returns a copy of the stored record, if any.
    pub fn record(&self, id: &PlayerId) -> Option<UserRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Makes every subsequent load of `id` fail until [`Self::heal`] is called.
    pub fn fail_loads_for(&self, id: PlayerId) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
    }

    /// Undoes [`Self::fail_loads_for`].
    pub fn heal(&self, id: &PlayerId) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// Number of successful loads served so far.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of saves served so far.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn is_accepting_logins(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    async fn load_user(&self, id: PlayerId, name: &str) -> Result<UserRecord, StorageError> {
        if !self.is_accepting_logins() {
            return Err(StorageError::NotReady);
        }
        if self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
        {
            return Err(StorageError::LoadFailed(id, "simulated failure".into()));
        }

        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let record = records
            .entry(id)
            .or_insert_with(|| UserRecord::new(id, name));
        // Names are refreshed on every login.
        record.name = name.to_string();
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(record.clone())
    }

    async fn save_user(&self, record: &UserRecord) -> Result<(), StorageError> {
        if !self.is_accepting_logins() {
            return Err(StorageError::SaveFailed(record.id, "storage not ready".into()));
        }
        self.insert(record.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
