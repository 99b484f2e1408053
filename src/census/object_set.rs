//! Filterable set of census records

use std::collections::BTreeMap;

use super::{AllocationStats, ObjectId, ObjectRecord, TypeKey, TypeStats};

/// A set of objects taken from a snapshot or a diff
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectSet {
    /// Sorted by id
    records: Vec<ObjectRecord>,
}

impl ObjectSet {
    pub(crate) fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = ObjectRecord>,
    {
        let mut records: Vec<_> = records.into_iter().collect();
        records.sort_by_key(|r| r.id);
        records.dedup_by_key(|r| r.id);
        Self { records }
    }

    /// Number of objects
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Total shallow size
    pub fn size_in_bytes(&self) -> usize {
        self.records.iter().map(|r| r.size).sum()
    }

    /// Count and size together
    pub fn stats(&self) -> AllocationStats {
        AllocationStats {
            objects_count: self.count(),
            size_in_bytes: self.size_in_bytes(),
        }
    }

    /// True when no object matched
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over the records in id order
    pub fn iter(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.records.iter()
    }

    /// Check membership by identity
    pub fn contains(&self, id: ObjectId) -> bool {
        self.records.binary_search_by_key(&id, |r| r.id).is_ok()
    }

    /// Narrow the set with a predicate
    pub fn select<P>(&self, predicate: P) -> ObjectSet
    where
        P: Fn(&ObjectRecord) -> bool,
    {
        Self {
            records: self.records.iter().filter(|r| predicate(r)).copied().collect(),
        }
    }

    /// Narrow the set to type `T`
    pub fn of_type<T: 'static>(&self) -> ObjectSet {
        self.select(ObjectRecord::type_is::<T>)
    }

    /// Objects present in either set
    pub fn union(&self, other: &ObjectSet) -> ObjectSet {
        Self::from_records(self.records.iter().chain(other.records.iter()).copied())
    }

    /// True when every object of `other` is also in `self`
    pub fn is_superset(&self, other: &ObjectSet) -> bool {
        other.records.iter().all(|r| self.contains(r.id))
    }

    /// Group by type, ordered by type name
    pub fn type_stats(&self) -> Vec<TypeStats> {
        let mut groups: BTreeMap<TypeKey, AllocationStats> = BTreeMap::new();
        for record in &self.records {
            groups.entry(record.ty).or_default().record(record.size);
        }
        groups
            .into_iter()
            .map(|(ty, stats)| TypeStats {
                type_name: ty.name(),
                count: stats.objects_count,
                size_in_bytes: stats.size_in_bytes,
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a ObjectSet {
    type Item = &'a ObjectRecord;
    type IntoIter = std::slice::Iter<'a, ObjectRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    fn record(id: u64, ty: TypeKey, size: usize) -> ObjectRecord {
        ObjectRecord {
            id: ObjectId(id),
            ty,
            size,
        }
    }

    #[test]
    fn test_select_and_totals() {
        let set = ObjectSet::from_records([
            record(3, TypeKey::of::<A>(), 8),
            record(1, TypeKey::of::<A>(), 8),
            record(2, TypeKey::of::<B>(), 24),
        ]);

        assert_eq!(set.count(), 3);
        assert_eq!(set.size_in_bytes(), 40);
        assert_eq!(set.of_type::<A>().count(), 2);
        assert_eq!(set.of_type::<B>().size_in_bytes(), 24);
        assert!(set.contains(ObjectId(3)));
        assert!(!set.contains(ObjectId(4)));
    }

    #[test]
    fn test_union_deduplicates() {
        let left = ObjectSet::from_records([record(1, TypeKey::of::<A>(), 1)]);
        let right = ObjectSet::from_records([
            record(1, TypeKey::of::<A>(), 1),
            record(2, TypeKey::of::<A>(), 1),
        ]);
        let both = left.union(&right);
        assert_eq!(both.count(), 2);
        assert!(both.is_superset(&left));
        assert!(both.is_superset(&right));
    }
}
