//! Per-thread registry of live tracked objects
//!
//! Every `Tracked` handle registers here on construction and releases on drop.
//! The registry is thread-local: test threads never see each other's objects.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{AllocationLedger, AllocationStats, ObjectId, ObjectRecord, Snapshot, TypeKey};

/// Identifier of a thread's registry (distinguishes snapshots across threads)
pub type RegistryId = u64;

static NEXT_REGISTRY: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::new());
}

/// Cumulative counters for one collection session
#[derive(Debug)]
struct Collection {
    session: u64,
    /// Number of live collectors; collection stops when it reaches zero
    holders: usize,
    allocated: BTreeMap<TypeKey, AllocationStats>,
    collected: BTreeMap<TypeKey, AllocationStats>,
}

/// Tracks live objects for the current thread
#[derive(Debug)]
struct Registry {
    id: RegistryId,

    /// Last issued object id (ids start at 1)
    last_object: u64,

    /// Capture counter
    epoch: u64,

    live: BTreeMap<ObjectId, ObjectRecord>,

    collection: Option<Collection>,

    last_session: u64,
}

impl Registry {
    fn new() -> Self {
        Self {
            id: NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed),
            last_object: 0,
            epoch: 0,
            live: BTreeMap::new(),
            collection: None,
            last_session: 0,
        }
    }

    fn register(&mut self, ty: TypeKey, size: usize) -> ObjectId {
        self.last_object += 1;
        let id = ObjectId(self.last_object);
        self.live.insert(id, ObjectRecord { id, ty, size });

        if let Some(ref mut c) = self.collection {
            c.allocated.entry(ty).or_default().record(size);
        }

        tracing::trace!(object = id.0, ty = ty.name(), size, "registered");
        id
    }

    fn release(&mut self, id: ObjectId) {
        let Some(record) = self.live.remove(&id) else {
            return;
        };

        if let Some(ref mut c) = self.collection {
            c.collected.entry(record.ty).or_default().record(record.size);
        }

        tracing::trace!(object = id.0, ty = record.ty.name(), "released");
    }

    fn capture(&mut self) -> Snapshot {
        self.epoch += 1;

        let allocations = self.collection.as_ref().map(|c| AllocationLedger {
            session: c.session,
            allocated: c.allocated.clone(),
            collected: c.collected.clone(),
        });

        tracing::debug!(
            registry = self.id,
            epoch = self.epoch,
            live = self.live.len(),
            collecting = allocations.is_some(),
            "captured census"
        );

        Snapshot {
            registry: self.id,
            epoch: self.epoch,
            watermark: self.last_object,
            objects: self.live.clone(),
            allocations,
        }
    }

    fn start_collecting(&mut self) -> u64 {
        if let Some(ref mut c) = self.collection {
            c.holders += 1;
            return c.session;
        }

        self.last_session += 1;
        self.collection = Some(Collection {
            session: self.last_session,
            holders: 1,
            allocated: BTreeMap::new(),
            collected: BTreeMap::new(),
        });
        tracing::debug!(session = self.last_session, "allocation collection started");
        self.last_session
    }

    fn stop_collecting(&mut self) {
        let finished = match self.collection {
            Some(ref mut c) => {
                c.holders = c.holders.saturating_sub(1);
                c.holders == 0
            }
            None => false,
        };

        if finished {
            if let Some(c) = self.collection.take() {
                tracing::debug!(session = c.session, "allocation collection stopped");
            }
        }
    }
}

/// Record a new object of type `ty` occupying `size` bytes
pub(crate) fn register(ty: TypeKey, size: usize) -> ObjectId {
    REGISTRY.with(|r| r.borrow_mut().register(ty, size))
}

/// Forget an object. No-op when the thread's registry is already torn down.
pub(crate) fn release(id: ObjectId) {
    let _ = REGISTRY.try_with(|r| r.borrow_mut().release(id));
}

/// Capture the current thread's census
pub(crate) fn capture() -> Snapshot {
    REGISTRY.with(|r| r.borrow_mut().capture())
}

/// Begin (or join) an allocation collection session; returns its id
pub(crate) fn start_collecting() -> u64 {
    REGISTRY.with(|r| r.borrow_mut().start_collecting())
}

/// Leave the current collection session
pub(crate) fn stop_collecting() {
    let _ = REGISTRY.try_with(|r| r.borrow_mut().stop_collecting());
}

/// Whether allocation collection is active on this thread
pub fn is_collecting() -> bool {
    REGISTRY.with(|r| r.borrow().collection.is_some())
}

/// Number of live tracked objects on this thread
pub fn live_objects() -> usize {
    REGISTRY.with(|r| r.borrow().live.len())
}
