//! # Instance census for leak-checking tests
//!
//! Counts live objects by type, diffs snapshots and measures allocation
//! traffic between two points of a test.
//!
//! ## Model
//!
//! 1. **Tracking**: a type embeds a [`Tracked`] handle; construction registers
//!    one object with the thread's registry, drop releases it
//! 2. **Snapshot**: an immutable census of live objects, grouped by type with
//!    count and shallow byte size
//! 3. **Diff**: new, dead and surviving objects between two snapshots
//! 4. **Traffic**: every construction inside a window, survivors or not
//!    (requires allocation collection)
//!
//! ## Usage Example
//!
//! ```
//! use census::{CensusConfig, InProcessProbe, MemoryProbe};
//! use census::subjects::Employee;
//!
//! let probe = InProcessProbe::new(CensusConfig::default());
//! let _first = Employee::new();
//! let checkpoint = probe.checkpoint("one employee");
//! let _second = Employee::new();
//!
//! let diff = probe.difference_from(&checkpoint).unwrap();
//! assert_eq!(diff.new_objects().of_type::<Employee>().count(), 1);
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod census;    // Registry, snapshots and diffs
pub mod probe;     // Capture/query/diff capability
pub mod scenarios; // Leak-checking scenarios
pub mod subjects;  // Allocation subjects

// Re-exports for convenience
pub use census::{Diff, ObjectRecord, ObjectSet, Snapshot, Tracked, Traffic, TypeKey};
pub use probe::{InProcessProbe, MemoryProbe};
pub use scenarios::{Scenario, ScenarioOutcome};

use thiserror::Error;

/// Environment variable that turns on allocation collection
pub const COLLECT_ALLOCATIONS_ENV: &str = "CENSUS_COLLECT_ALLOCATIONS";

/// Configuration for a probe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CensusConfig {
    /// Record allocation traffic while the probe lives
    pub collect_allocations: bool,

    /// Log the full census on every check
    pub verbose: bool,
}

impl CensusConfig {
    /// Configuration from the environment (`CENSUS_COLLECT_ALLOCATIONS=1`)
    pub fn from_env() -> Self {
        let collect_allocations = std::env::var(COLLECT_ALLOCATIONS_ENV)
            .map(|value| parse_flag(&value))
            .unwrap_or(false);

        Self {
            collect_allocations,
            ..Self::default()
        }
    }

    /// Enable or disable allocation collection
    pub fn with_allocation_collection(mut self, enabled: bool) -> Self {
        self.collect_allocations = enabled;
        self
    }

    /// Enable or disable census reports on every check
    pub fn with_verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Errors raised by the census
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CensusError {
    /// Traffic requested without one collection session spanning both snapshots
    #[error("allocations were not collected between the two snapshots")]
    AllocationsNotCollected,

    /// Snapshots come from different thread registries
    #[error("snapshot from registry {found} cannot be compared with registry {expected}")]
    ForeignSnapshot {
        /// Registry of the later snapshot
        expected: u64,
        /// Registry of the earlier snapshot
        found: u64,
    },

    /// The "before" snapshot was captured after the "after" snapshot
    #[error("snapshot epoch {before} was captured after epoch {after}")]
    OutOfOrder {
        /// Epoch of the snapshot passed as before
        before: u64,
        /// Epoch of the snapshot passed as after
        after: u64,
    },

    /// Scenario name did not match any scenario
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),
}
