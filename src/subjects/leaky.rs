use crate::census::Tracked;
use crate::subjects::Employee;

/// Container that keeps every employee handed to it until released
#[derive(Debug, Default)]
pub struct Leaky {
    employees: Vec<Employee>,
    _tracked: Tracked<Leaky>,
}

impl Leaky {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `employee`
    pub fn retain(&mut self, employee: Employee) {
        self.employees.push(employee);
    }

    /// Drop every retained employee (idempotent)
    pub fn release_all(&mut self) {
        if !self.employees.is_empty() {
            tracing::debug!(released = self.employees.len(), "leaky container released");
        }
        self.employees.clear();
    }

    /// Number of retained employees
    pub fn len(&self) -> usize {
        self.employees.len()
    }

    /// True when nothing is retained
    pub fn is_empty(&self) -> bool {
        self.employees.is_empty()
    }
}

/// Disposable wrapper owning one `Leaky`
///
/// `do_work` leaks an employee into the container until `release` is
/// called. Dropping the calculator releases as well.
#[derive(Debug, Default)]
pub struct Calculator {
    leaky: Leaky,
    _tracked: Tracked<Calculator>,
}

impl Calculator {
    /// Create a calculator with an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct an employee and retain it in the owned container
    pub fn do_work(&mut self) {
        self.leaky.retain(Employee::new());
    }

    /// Release everything retained so far
    pub fn release(&mut self) {
        self.leaky.release_all();
    }

    /// Employees currently retained
    pub fn retained(&self) -> usize {
        self.leaky.len()
    }
}

impl Drop for Calculator {
    fn drop(&mut self) {
        self.release();
    }
}
