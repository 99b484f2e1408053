//! Memory probe capability
//!
//! Scenarios talk to the census only through [`MemoryProbe`], so another
//! backend (an external profiler, a recorded trace) can stand in for the
//! in-process registry. The object-safe core is `capture`, `query` and
//! `diff`; `check` is generic and only available on sized probes.

mod in_process;

pub use in_process::InProcessProbe;

use crate::census::{Diff, ObjectRecord, ObjectSet, Snapshot, Traffic};
use crate::CensusError;

/// Capture, query and diff over live objects
pub trait MemoryProbe {
    /// Census of everything alive right now
    fn capture(&self) -> Snapshot;

    /// Log the full census on every check
    fn verbose(&self) -> bool {
        false
    }

    /// Current live objects matching `predicate`
    fn query(&self, predicate: &dyn Fn(&ObjectRecord) -> bool) -> ObjectSet {
        self.capture().objects_where(predicate)
    }

    /// Compare two snapshots
    fn diff(&self, before: &Snapshot, after: &Snapshot) -> Result<Diff, CensusError> {
        Diff::between(before, after)
    }

    /// Allocation traffic between two snapshots
    fn traffic(&self, before: &Snapshot, after: &Snapshot) -> Result<Traffic, CensusError> {
        Traffic::between(before, after)
    }

    /// Compare the current state against a checkpoint
    fn difference_from(&self, before: &Snapshot) -> Result<Diff, CensusError> {
        let after = self.capture();
        self.diff(before, &after)
    }

    /// Take a named checkpoint for a later comparison
    fn checkpoint(&self, label: &str) -> Snapshot {
        let snapshot = self.capture();
        tracing::info!(
            label,
            epoch = snapshot.epoch(),
            objects = snapshot.objects().count(),
            "checkpoint"
        );
        snapshot
    }

    /// Capture and hand the census to `check`
    ///
    /// The census is logged before `check` runs so a failed assertion
    /// leaves the state that caused it in the output.
    fn check<F, R>(&self, check: F) -> R
    where
        Self: Sized,
        F: FnOnce(&Snapshot) -> R,
    {
        let snapshot = self.capture();
        if self.verbose() {
            tracing::info!("{}", snapshot.report());
        } else {
            tracing::debug!(
                epoch = snapshot.epoch(),
                objects = snapshot.objects().count(),
                "check"
            );
        }
        check(&snapshot)
    }
}

impl<P: MemoryProbe + ?Sized> MemoryProbe for &P {
    fn capture(&self) -> Snapshot {
        (**self).capture()
    }

    fn verbose(&self) -> bool {
        (**self).verbose()
    }

    fn query(&self, predicate: &dyn Fn(&ObjectRecord) -> bool) -> ObjectSet {
        (**self).query(predicate)
    }

    fn diff(&self, before: &Snapshot, after: &Snapshot) -> Result<Diff, CensusError> {
        (**self).diff(before, after)
    }

    fn traffic(&self, before: &Snapshot, after: &Snapshot) -> Result<Traffic, CensusError> {
        (**self).traffic(before, after)
    }
}
