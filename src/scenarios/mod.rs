//! Leak-checking scenarios
//!
//! Each scenario builds its own subjects, probes the census and reports the
//! measured value next to the expectation. Two scenarios carry known
//! mismatches and are flagged with [`Scenario::known_issue`].

use std::fmt;
use std::str::FromStr;

use crate::census::{ObjectRecord, Snapshot};
use crate::probe::{InProcessProbe, MemoryProbe};
use crate::subjects::{Calculator, Employee, Employees};
use crate::{CensusConfig, CensusError};

/// Named scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// Two employees alive → census counts two
    InstanceCount,
    /// Calculator leaks an employee and is never released
    LeakWithoutRelease,
    /// Calculator leaks an employee, then releases it
    LeakWithRelease,
    /// Employees created after a checkpoint show up as new
    CheckpointDiff,
    /// One hundred employees stay within a byte budget
    SizeBound,
    /// Allocation traffic of the wasteful batch loop
    AllocationTraffic,
}

/// What a scenario asserts about its measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// Measured value must equal
    Equals(usize),
    /// Measured value must not exceed
    AtMost(usize),
}

impl Expectation {
    /// Evaluate against a measured value
    pub fn holds(&self, actual: usize) -> bool {
        match *self {
            Expectation::Equals(expected) => actual == expected,
            Expectation::AtMost(bound) => actual <= bound,
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Equals(expected) => write!(f, "== {expected}"),
            Expectation::AtMost(bound) => write!(f, "<= {bound}"),
        }
    }
}

/// Secondary assertion recorded alongside the main measurement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    /// What was measured
    pub what: &'static str,
    /// Asserted expectation
    pub expectation: Expectation,
    /// Measured value
    pub actual: usize,
}

impl Check {
    /// True when the expectation held
    pub fn passed(&self) -> bool {
        self.expectation.holds(self.actual)
    }
}

/// Result of running one scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioOutcome {
    /// Scenario that ran
    pub scenario: Scenario,
    /// Asserted expectation
    pub expectation: Expectation,
    /// Measured value
    pub actual: usize,
    /// Further assertions made by the scenario
    pub checks: Vec<Check>,
    /// Census report taken at the moment of the check
    pub report: String,
}

impl ScenarioOutcome {
    /// True when the expectation and every further check held
    pub fn passed(&self) -> bool {
        self.expectation.holds(self.actual) && self.checks.iter().all(Check::passed)
    }

    /// Failed, but the failure is documented
    pub fn is_known_failure(&self) -> bool {
        !self.passed() && self.scenario.known_issue().is_some()
    }
}

impl fmt::Display for ScenarioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match (self.passed(), self.is_known_failure()) {
            (true, _) => "PASS",
            (false, true) => "FAIL (known)",
            (false, false) => "FAIL",
        };
        write!(
            f,
            "{:<22} {:<13} expected {} got {}",
            self.scenario.name(),
            status,
            self.expectation,
            self.actual
        )?;
        for check in &self.checks {
            write!(
                f,
                "\n    {}: expected {} got {}",
                check.what, check.expectation, check.actual
            )?;
        }
        Ok(())
    }
}

/// What a scenario body measured
#[derive(Debug)]
struct Measurement {
    actual: usize,
    checks: Vec<Check>,
    report: String,
}

impl Measurement {
    fn new(actual: usize, memory: &Snapshot) -> Self {
        Self {
            actual,
            checks: Vec::new(),
            report: memory.report(),
        }
    }

    fn with_check(mut self, what: &'static str, expectation: Expectation, actual: usize) -> Self {
        self.checks.push(Check {
            what,
            expectation,
            actual,
        });
        self
    }
}

impl Scenario {
    /// Every scenario in table order
    pub const ALL: [Scenario; 6] = [
        Scenario::InstanceCount,
        Scenario::LeakWithoutRelease,
        Scenario::LeakWithRelease,
        Scenario::CheckpointDiff,
        Scenario::SizeBound,
        Scenario::AllocationTraffic,
    ];

    /// Kebab-case name
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::InstanceCount => "instance-count",
            Scenario::LeakWithoutRelease => "leak-without-release",
            Scenario::LeakWithRelease => "leak-with-release",
            Scenario::CheckpointDiff => "checkpoint-diff",
            Scenario::SizeBound => "size-bound",
            Scenario::AllocationTraffic => "allocation-traffic",
        }
    }

    /// One-line description
    pub fn description(&self) -> &'static str {
        match self {
            Scenario::InstanceCount => "two live employees are counted",
            Scenario::LeakWithoutRelease => "an unreleased calculator leaves no employee behind",
            Scenario::LeakWithRelease => "releasing a calculator kills its leaked employee",
            Scenario::CheckpointDiff => "employees created after a checkpoint are new",
            Scenario::SizeBound => "100 employees fit in 2500 bytes",
            Scenario::AllocationTraffic => "the wasteful loop allocates a single employee",
        }
    }

    /// Documented reason the scenario is expected to fail
    pub fn known_issue(&self) -> Option<&'static str> {
        match self {
            Scenario::LeakWithoutRelease => {
                Some("the calculator is never released, so its employee is still alive")
            }
            Scenario::AllocationTraffic => {
                Some("expectation kept at 1 although the loop allocates one employee per iteration")
            }
            _ => None,
        }
    }

    /// Asserted expectation
    pub fn expectation(&self) -> Expectation {
        match self {
            Scenario::InstanceCount => Expectation::Equals(2),
            Scenario::LeakWithoutRelease => Expectation::Equals(0),
            Scenario::LeakWithRelease => Expectation::Equals(1),
            Scenario::CheckpointDiff => Expectation::Equals(2),
            Scenario::SizeBound => Expectation::AtMost(2500),
            Scenario::AllocationTraffic => Expectation::Equals(1),
        }
    }

    /// Run the scenario on the current thread
    pub fn run(&self) -> Result<ScenarioOutcome, CensusError> {
        self.run_with(CensusConfig::default())
    }

    /// Run with an explicit base configuration
    ///
    /// Allocation traffic always collects allocations regardless of `config`.
    pub fn run_with(&self, config: CensusConfig) -> Result<ScenarioOutcome, CensusError> {
        let config = match self {
            Scenario::AllocationTraffic => config.with_allocation_collection(true),
            _ => config,
        };
        self.run_on(&InProcessProbe::new(config))
    }

    /// Run against any probe backend
    ///
    /// The allocation traffic scenario needs a probe that collects
    /// allocations; otherwise it fails with `AllocationsNotCollected`.
    pub fn run_on<P: MemoryProbe>(&self, probe: &P) -> Result<ScenarioOutcome, CensusError> {
        let measured = match self {
            Scenario::InstanceCount => instance_count(probe),
            Scenario::LeakWithoutRelease => leak_without_release(probe),
            Scenario::LeakWithRelease => leak_with_release(probe)?,
            Scenario::CheckpointDiff => checkpoint_diff(probe)?,
            Scenario::SizeBound => size_bound(probe),
            Scenario::AllocationTraffic => allocation_traffic(probe)?,
        };

        let outcome = ScenarioOutcome {
            scenario: *self,
            expectation: self.expectation(),
            actual: measured.actual,
            checks: measured.checks,
            report: measured.report,
        };
        let actual = outcome.actual;

        if outcome.passed() {
            tracing::info!(scenario = self.name(), actual, "scenario passed");
        } else if let Some(issue) = self.known_issue() {
            tracing::warn!(scenario = self.name(), actual, issue, "scenario failed as documented");
        } else {
            tracing::error!(
                scenario = self.name(),
                actual,
                expected = %outcome.expectation,
                "scenario failed"
            );
        }

        Ok(outcome)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = CensusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('_', "-").to_ascii_lowercase();
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == wanted)
            .ok_or_else(|| CensusError::UnknownScenario(s.to_string()))
    }
}

fn instance_count<P: MemoryProbe>(probe: &P) -> Measurement {
    let _first = Employee::new();
    let _second = Employee::new();

    probe.check(|memory| Measurement::new(memory.of_type::<Employee>().count(), memory))
}

fn leak_without_release<P: MemoryProbe>(probe: &P) -> Measurement {
    let mut calculator = Calculator::new();
    calculator.do_work();

    probe.check(|memory| Measurement::new(memory.of_type::<Employee>().count(), memory))
}

fn leak_with_release<P: MemoryProbe>(probe: &P) -> Result<Measurement, CensusError> {
    let mut calculator = Calculator::new();
    calculator.do_work();

    let before_release = probe.checkpoint("before release");
    calculator.release();

    probe.check(|memory| -> Result<Measurement, CensusError> {
        let diff = probe.diff(&before_release, memory)?;
        let dead = diff.dead_objects().of_type::<Employee>().count();
        Ok(Measurement::new(dead, memory))
    })
}

fn checkpoint_diff<P: MemoryProbe>(probe: &P) -> Result<Measurement, CensusError> {
    let _first = Employee::new();
    let checkpoint = probe.checkpoint("after first employee");

    let _second = Employee::new();
    let _third = Employee::new();

    probe.check(|memory| -> Result<Measurement, CensusError> {
        let diff = probe.diff(&checkpoint, memory)?;
        let new = diff.new_objects().of_type::<Employee>().count();
        Ok(Measurement::new(new, memory))
    })
}

fn size_bound<P: MemoryProbe>(probe: &P) -> Measurement {
    let employees: Vec<Employee> = (0..100).map(|_| Employee::new()).collect();

    let size = probe.query(&|r: &ObjectRecord| r.type_is::<Employee>()).size_in_bytes();
    let measured = probe.check(|memory| Measurement::new(size, memory));
    drop(employees);
    measured
}

fn allocation_traffic<P: MemoryProbe>(probe: &P) -> Result<Measurement, CensusError> {
    let employees = Employees::new();
    let snapshot = probe.checkpoint("before batch");

    employees.wasteful(10);

    probe.check(|memory| -> Result<Measurement, CensusError> {
        let live = memory.of_type::<Employee>().count();
        let traffic = probe.traffic(&snapshot, memory)?;
        let allocated = traffic.of_type::<Employee>().allocated().objects_count;

        Ok(Measurement::new(allocated, memory).with_check(
            "live employees",
            Expectation::Equals(0),
            live,
        ))
    })
}
