//! Comparison of two snapshots

use std::collections::BTreeMap;

use super::{AllocationStats, ObjectSet, Snapshot, TypeKey};
use crate::CensusError;

/// Difference between an earlier and a later snapshot
///
/// - new: alive in `after`, absent from `before`
/// - dead: alive in `before`, absent from `after`
/// - survived: alive in both
#[derive(Debug, Clone)]
pub struct Diff {
    new: ObjectSet,
    dead: ObjectSet,
    survived: ObjectSet,
    traffic: Option<Traffic>,
}

impl Diff {
    /// Compare two snapshots of the same registry
    pub fn between(before: &Snapshot, after: &Snapshot) -> Result<Self, CensusError> {
        Snapshot::check_comparable(before, after)?;

        let new = ObjectSet::from_records(
            after
                .objects
                .values()
                .filter(|r| !before.objects.contains_key(&r.id))
                .copied(),
        );
        let (survived, dead): (Vec<_>, Vec<_>) = before
            .objects
            .values()
            .copied()
            .partition(|r| after.objects.contains_key(&r.id));

        let traffic = Traffic::between(before, after).ok();

        tracing::debug!(
            before = before.epoch,
            after = after.epoch,
            new = new.count(),
            dead = dead.len(),
            survived = survived.len(),
            "computed snapshot diff"
        );

        Ok(Self {
            new,
            dead: ObjectSet::from_records(dead),
            survived: ObjectSet::from_records(survived),
            traffic,
        })
    }

    /// Objects created after `before` and still alive at `after`
    pub fn new_objects(&self) -> &ObjectSet {
        &self.new
    }

    /// Objects alive at `before` and gone at `after`
    pub fn dead_objects(&self) -> &ObjectSet {
        &self.dead
    }

    /// Objects alive at both points
    pub fn survived_objects(&self) -> &ObjectSet {
        &self.survived
    }

    /// Every construction between the two points, survivors or not
    ///
    /// Fails unless one collection session spans both snapshots.
    pub fn allocation_traffic(&self) -> Result<&Traffic, CensusError> {
        self.traffic
            .as_ref()
            .ok_or(CensusError::AllocationsNotCollected)
    }
}

/// Allocation and collection events within a snapshot window, per type
#[derive(Debug, Clone, Default)]
pub struct Traffic {
    allocated: BTreeMap<TypeKey, AllocationStats>,
    collected: BTreeMap<TypeKey, AllocationStats>,
}

impl Traffic {
    /// Traffic between two snapshots taken in the same collection session
    pub fn between(before: &Snapshot, after: &Snapshot) -> Result<Self, CensusError> {
        Snapshot::check_comparable(before, after)?;

        let (Some(earlier), Some(later)) = (&before.allocations, &after.allocations) else {
            return Err(CensusError::AllocationsNotCollected);
        };
        if earlier.session != later.session {
            return Err(CensusError::AllocationsNotCollected);
        }

        let window = |from: &BTreeMap<TypeKey, AllocationStats>,
                      to: &BTreeMap<TypeKey, AllocationStats>| {
            to.iter()
                .map(|(ty, stats)| (*ty, stats.since(&from.get(ty).copied().unwrap_or_default())))
                .filter(|(_, stats)| stats.objects_count > 0)
                .collect::<BTreeMap<_, _>>()
        };

        Ok(Self {
            allocated: window(&earlier.allocated, &later.allocated),
            collected: window(&earlier.collected, &later.collected),
        })
    }

    /// Narrow to types matching `predicate`
    pub fn select<P>(&self, predicate: P) -> Traffic
    where
        P: Fn(&TypeKey) -> bool,
    {
        let keep = |map: &BTreeMap<TypeKey, AllocationStats>| -> BTreeMap<TypeKey, AllocationStats> {
            map.iter()
                .filter(|(ty, _)| predicate(ty))
                .map(|(ty, stats)| (*ty, *stats))
                .collect()
        };
        Self {
            allocated: keep(&self.allocated),
            collected: keep(&self.collected),
        }
    }

    /// Narrow to type `T`
    pub fn of_type<T: 'static>(&self) -> Traffic {
        self.select(TypeKey::is::<T>)
    }

    /// Objects constructed within the window
    pub fn allocated(&self) -> AllocationStats {
        Self::total(&self.allocated)
    }

    /// Objects destroyed within the window
    pub fn collected(&self) -> AllocationStats {
        Self::total(&self.collected)
    }

    fn total(map: &BTreeMap<TypeKey, AllocationStats>) -> AllocationStats {
        map.values().fold(AllocationStats::default(), |mut acc, s| {
            acc.add(s);
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::census::{registry, Tracked};

    struct Item {
        _tracked: Tracked<Item>,
    }

    fn item() -> Item {
        Item {
            _tracked: Tracked::new(),
        }
    }

    #[test]
    fn test_new_dead_survived() {
        let keep = item();
        let doomed = item();
        let before = Snapshot::capture();

        drop(doomed);
        let fresh = item();
        let after = Snapshot::capture();

        let diff = after.difference(&before).expect("comparable snapshots");
        assert_eq!(diff.new_objects().of_type::<Item>().count(), 1);
        assert_eq!(diff.dead_objects().of_type::<Item>().count(), 1);
        assert_eq!(diff.survived_objects().of_type::<Item>().count(), 1);
        assert!(diff.new_objects().contains(fresh._tracked.id()));
        assert!(diff.survived_objects().contains(keep._tracked.id()));
    }

    #[test]
    fn test_out_of_order_rejected() {
        let first = Snapshot::capture();
        let second = Snapshot::capture();
        let err = Diff::between(&second, &first).unwrap_err();
        assert!(matches!(err, CensusError::OutOfOrder { .. }));
    }

    #[test]
    fn test_traffic_requires_collection() {
        let before = Snapshot::capture();
        let _x = item();
        let after = Snapshot::capture();

        let diff = after.difference(&before).expect("comparable snapshots");
        assert!(matches!(
            diff.allocation_traffic(),
            Err(CensusError::AllocationsNotCollected)
        ));
    }

    #[test]
    fn test_traffic_counts_dead_allocations() {
        registry::start_collecting();
        let before = Snapshot::capture();
        for _ in 0..3 {
            let _temp = item();
        }
        let after = Snapshot::capture();
        registry::stop_collecting();

        let traffic = after.traffic_from(&before).expect("collected");
        let items = traffic.of_type::<Item>();
        assert_eq!(items.allocated().objects_count, 3);
        assert_eq!(items.collected().objects_count, 3);
        assert_eq!(items.allocated().size_in_bytes, 3 * std::mem::size_of::<Item>());
    }

    #[test]
    fn test_traffic_across_sessions_rejected() {
        registry::start_collecting();
        let before = Snapshot::capture();
        registry::stop_collecting();

        registry::start_collecting();
        let after = Snapshot::capture();
        registry::stop_collecting();

        assert!(matches!(
            Traffic::between(&before, &after),
            Err(CensusError::AllocationsNotCollected)
        ));
    }
}
