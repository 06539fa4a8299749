//! Fragment store contract and the in-memory implementation.

use crate::dependency::CacheDependency;
use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::vary::ControlCachedVary;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// What a key resolves to: a vary descriptor under a base key, or a
/// rendered entry.
#[derive(Clone, Debug)]
pub enum CachedItem {
    Vary(Arc<ControlCachedVary>),
    Entry(Arc<CacheEntry>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expiration {
    Absolute(SystemTime),
    Sliding(Duration),
}

pub struct InsertRequest {
    pub base_key: String,
    /// Stored under `base_key` when present; the entry goes under
    /// `real_key` either way.
    pub vary: Option<Arc<ControlCachedVary>>,
    pub real_key: String,
    pub entry: Arc<CacheEntry>,
    pub dependency: Option<Arc<dyn CacheDependency>>,
    pub expiration: Expiration,
    pub provider: Option<String>,
}

/// Shared fragment store. Implementations are used from many request
/// threads at once.
pub trait FragmentStore: Send + Sync {
    fn get(&self, key: &str, provider: Option<&str>) -> Option<CachedItem>;

    fn insert(&self, request: InsertRequest) -> Result<(), CacheError>;

    fn remove(&self, key: &str, provider: Option<&str>);
}

pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> SystemTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(UNIX_EPOCH + Duration::from_secs(1_000_000_000))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}

fn millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

struct Slot {
    item: CachedItem,
    dependency: Option<Arc<dyn CacheDependency>>,
    expiration: Option<Expiration>,
    last_access_ms: AtomicU64,
}

impl Slot {
    fn is_live(&self, now: SystemTime) -> bool {
        if self
            .dependency
            .as_ref()
            .is_some_and(|dependency| dependency.has_changed())
        {
            return false;
        }
        match self.expiration {
            None => true,
            Some(Expiration::Absolute(at)) => now < at,
            Some(Expiration::Sliding(window)) => {
                let idle = millis(now).saturating_sub(self.last_access_ms.load(Ordering::Relaxed));
                u128::from(idle) < window.as_millis()
            }
        }
    }

    fn release(self) {
        if let Some(dependency) = self.dependency {
            dependency.dispose();
        }
    }
}

type SlotKey = (String, String);

fn same_dependency(
    a: Option<&Arc<dyn CacheDependency>>,
    b: Option<&Arc<dyn CacheDependency>>,
) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

fn slot_key(key: &str, provider: Option<&str>) -> SlotKey {
    (provider.unwrap_or_default().to_string(), key.to_string())
}

/// In-process store. The default provider is always available; named
/// providers must be added with [`with_provider`](Self::with_provider).
pub struct MemoryFragmentStore {
    slots: RwLock<HashMap<SlotKey, Slot>>,
    providers: HashSet<String>,
    clock: Arc<dyn Clock>,
}

impl MemoryFragmentStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            providers: HashSet::new(),
            clock,
        }
    }

    pub fn with_provider(mut self, name: impl Into<String>) -> Self {
        self.providers.insert(name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    fn check_provider(&self, provider: Option<&str>) -> Result<(), CacheError> {
        match provider {
            Some(name) if !self.providers.contains(name) => Err(CacheError::Insert(format!(
                "unknown cache provider '{name}'"
            ))),
            _ => Ok(()),
        }
    }

    fn put(&self, key: SlotKey, slot: Slot) {
        let incoming = slot.dependency.clone();
        let replaced = self.slots.write().insert(key, slot);
        if let Some(old) = replaced {
            if same_dependency(old.dependency.as_ref(), incoming.as_ref()) {
                return;
            }
            old.release();
        }
    }

    /// Remove `key` if it is still expired at `now`. Returns whether a slot
    /// was removed; a slot replaced since the caller looked is left alone.
    fn evict_expired(&self, key: &SlotKey, now: SystemTime) -> bool {
        let removed = {
            let mut slots = self.slots.write();
            if slots.get(key).is_some_and(|slot| !slot.is_live(now)) {
                slots.remove(key)
            } else {
                None
            }
        };
        match removed {
            Some(slot) => {
                log::debug!(target: "cache.store", "expired {}", key.1);
                slot.release();
                true
            }
            None => false,
        }
    }
}

impl Default for MemoryFragmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryFragmentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryFragmentStore")
            .field("len", &self.len())
            .field("providers", &self.providers)
            .finish()
    }
}

impl FragmentStore for MemoryFragmentStore {
    fn get(&self, key: &str, provider: Option<&str>) -> Option<CachedItem> {
        let now = self.clock.now();
        let slot_key = slot_key(key, provider);
        {
            let slots = self.slots.read();
            let slot = slots.get(&slot_key)?;
            if slot.is_live(now) {
                slot.last_access_ms.store(millis(now), Ordering::Relaxed);
                return Some(slot.item.clone());
            }
        }
        self.evict_expired(&slot_key, now);
        None
    }

    fn insert(&self, request: InsertRequest) -> Result<(), CacheError> {
        let provider = request.provider.as_deref();
        self.check_provider(provider)?;
        let now_ms = millis(self.clock.now());

        if let Some(vary) = request.vary {
            self.put(
                slot_key(&request.base_key, provider),
                Slot {
                    item: CachedItem::Vary(vary),
                    dependency: None,
                    expiration: None,
                    last_access_ms: AtomicU64::new(now_ms),
                },
            );
        }
        log::trace!(target: "cache.store", "insert {} ({} bytes)", request.real_key, request.entry.output.len());
        self.put(
            slot_key(&request.real_key, provider),
            Slot {
                item: CachedItem::Entry(request.entry),
                dependency: request.dependency,
                expiration: Some(request.expiration),
                last_access_ms: AtomicU64::new(now_ms),
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str, provider: Option<&str>) {
        let removed = self.slots.write().remove(&slot_key(key, provider));
        if let Some(slot) = removed {
            log::debug!(target: "cache.store", "removed {key}");
            slot.release();
        }
    }
}
