//! Live-object census and snapshot comparison
//!
//! Objects opt in by embedding a [`Tracked`] handle. A [`Snapshot`] records
//! every live tracked object of the calling thread at the moment of capture;
//! two snapshots can be compared with [`Diff`] and [`Traffic`].

mod diff;
mod object_set;
pub(crate) mod registry;
mod tracked;

pub use diff::{Diff, Traffic};
pub use object_set::ObjectSet;
pub use registry::{is_collecting, live_objects, RegistryId};
pub use tracked::Tracked;

use std::any::TypeId;
use std::collections::BTreeMap;
use std::fmt;

use crate::CensusError;

/// Identity of a tracked object (unique within one registry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub(crate) u64);

impl ObjectId {
    /// Raw sequence number
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Runtime type of a tracked object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeKey {
    name: &'static str,
    id: TypeId,
}

impl TypeKey {
    /// Key for type `T`
    pub fn of<T: 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// Fully qualified type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Check whether this key denotes `T`
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

/// One live object as seen by the census
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectRecord {
    /// Object identity
    pub id: ObjectId,
    /// Runtime type
    pub ty: TypeKey,
    /// Shallow size in bytes
    pub size: usize,
}

impl ObjectRecord {
    /// Check the record's type
    pub fn type_is<T: 'static>(&self) -> bool {
        self.ty.is::<T>()
    }
}

/// Count and byte total of a group of allocations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AllocationStats {
    /// Number of objects
    pub objects_count: usize,
    /// Total bytes
    pub size_in_bytes: usize,
}

impl AllocationStats {
    pub(crate) fn record(&mut self, size: usize) {
        self.objects_count += 1;
        self.size_in_bytes += size;
    }

    /// Growth since an earlier cumulative reading
    pub fn since(&self, earlier: &AllocationStats) -> AllocationStats {
        AllocationStats {
            objects_count: self.objects_count.saturating_sub(earlier.objects_count),
            size_in_bytes: self.size_in_bytes.saturating_sub(earlier.size_in_bytes),
        }
    }

    fn add(&mut self, other: &AllocationStats) {
        self.objects_count += other.objects_count;
        self.size_in_bytes += other.size_in_bytes;
    }
}

/// Census line for one type
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TypeStats {
    /// Fully qualified type name
    pub type_name: &'static str,
    /// Live instances
    pub count: usize,
    /// Total shallow size
    pub size_in_bytes: usize,
}

/// Cumulative allocation counters captured with a snapshot
#[derive(Debug, Clone)]
pub(crate) struct AllocationLedger {
    pub(crate) session: u64,
    pub(crate) allocated: BTreeMap<TypeKey, AllocationStats>,
    pub(crate) collected: BTreeMap<TypeKey, AllocationStats>,
}

/// Immutable census of the live tracked objects of one thread
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub(crate) registry: RegistryId,
    pub(crate) epoch: u64,
    pub(crate) watermark: u64,
    pub(crate) objects: BTreeMap<ObjectId, ObjectRecord>,
    pub(crate) allocations: Option<AllocationLedger>,
}

impl Snapshot {
    /// Capture the calling thread's census
    pub fn capture() -> Self {
        registry::capture()
    }

    /// Registry (thread) the snapshot belongs to
    pub fn registry(&self) -> RegistryId {
        self.registry
    }

    /// Capture sequence number within the registry
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Highest object id issued before capture
    pub fn watermark(&self) -> u64 {
        self.watermark
    }

    /// Whether allocation collection was active at capture
    pub fn collects_allocations(&self) -> bool {
        self.allocations.is_some()
    }

    /// All live objects
    pub fn objects(&self) -> ObjectSet {
        ObjectSet::from_records(self.objects.values().copied())
    }

    /// Live objects matching `predicate`
    pub fn objects_where<P>(&self, predicate: P) -> ObjectSet
    where
        P: Fn(&ObjectRecord) -> bool,
    {
        ObjectSet::from_records(self.objects.values().filter(|r| predicate(r)).copied())
    }

    /// Live objects of type `T`
    pub fn of_type<T: 'static>(&self) -> ObjectSet {
        self.objects_where(ObjectRecord::type_is::<T>)
    }

    /// Whether the given object was alive at capture
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Per-type census, ordered by type name
    pub fn type_stats(&self) -> Vec<TypeStats> {
        self.objects().type_stats()
    }

    /// Compare this (later) snapshot against an earlier checkpoint
    pub fn difference(&self, before: &Snapshot) -> Result<Diff, CensusError> {
        Diff::between(before, self)
    }

    /// Allocation traffic between an earlier checkpoint and this snapshot
    pub fn traffic_from(&self, before: &Snapshot) -> Result<Traffic, CensusError> {
        Traffic::between(before, self)
    }

    /// Human-readable census
    pub fn report(&self) -> String {
        let stats = self.type_stats();
        let mut out = format!(
            "Census epoch {} ({} objects, {} bytes)",
            self.epoch,
            self.objects.len(),
            stats.iter().map(|s| s.size_in_bytes).sum::<usize>()
        );
        for line in stats {
            out.push_str(&format!(
                "\n  {:<48} {:>8} {:>10} B",
                line.type_name, line.count, line.size_in_bytes
            ));
        }
        out
    }

    pub(crate) fn check_comparable(before: &Snapshot, after: &Snapshot) -> Result<(), CensusError> {
        if before.registry != after.registry {
            return Err(CensusError::ForeignSnapshot {
                expected: after.registry,
                found: before.registry,
            });
        }
        if before.epoch > after.epoch {
            return Err(CensusError::OutOfOrder {
                before: before.epoch,
                after: after.epoch,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gadget {
        _tracked: Tracked<Gadget>,
    }

    impl Gadget {
        fn new() -> Self {
            Self {
                _tracked: Tracked::new(),
            }
        }
    }

    #[test]
    fn test_capture_groups_by_type() {
        let _a = Gadget::new();
        let _b = Gadget::new();
        let _c: Tracked<u64> = Tracked::with_size(8);

        let snapshot = Snapshot::capture();
        assert_eq!(snapshot.of_type::<Gadget>().count(), 2);
        assert_eq!(snapshot.of_type::<u64>().size_in_bytes(), 8);
        assert_eq!(snapshot.type_stats().len(), 2);
    }

    #[test]
    fn test_report_lists_types() {
        let _a = Gadget::new();
        let report = Snapshot::capture().report();
        assert!(report.contains("Gadget"), "report was: {report}");
    }

    #[test]
    fn test_allocation_stats_since() {
        let earlier = AllocationStats {
            objects_count: 2,
            size_in_bytes: 16,
        };
        let later = AllocationStats {
            objects_count: 5,
            size_in_bytes: 40,
        };
        assert_eq!(
            later.since(&earlier),
            AllocationStats {
                objects_count: 3,
                size_in_bytes: 24
            }
        );
    }
}
