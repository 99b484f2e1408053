//! Allocation subjects used by the scenarios
//!
//! - `Employee`: identity-only value object
//! - `Employees`: batch allocator with a wasteful and an efficient loop
//! - `Leaky` / `Calculator`: a container that retains employees and the
//!   disposable wrapper that owns it

mod leaky;

pub use leaky::{Calculator, Leaky};

use std::hint::black_box;

use crate::census::{ObjectId, Tracked};

/// Identity-only subject
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Employee {
    tracked: Tracked<Employee>,
}

impl Employee {
    /// Construct a new, distinct employee
    pub fn new() -> Self {
        Self {
            tracked: Tracked::new(),
        }
    }

    /// Identity in the census
    pub fn id(&self) -> ObjectId {
        self.tracked.id()
    }
}

/// Batch allocator
#[derive(Debug, Default)]
pub struct Employees;

impl Employees {
    /// Create the allocator
    pub fn new() -> Self {
        Self
    }

    /// Constructs a fresh employee on every iteration
    pub fn wasteful(&self, count: usize) {
        for _ in 0..count {
            let employee = Employee::new();
            black_box(&employee);
        }
    }

    /// Constructs one employee and reuses it
    pub fn efficient(&self, count: usize) {
        let employee = Employee::new();
        for _ in 0..count {
            black_box(&employee);
        }
    }
}
