#![allow(dead_code)]

use census::subjects::Employee;

/// Route census logs through the test harness (`RUST_LOG=census=debug`)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Construct `count` employees held in one vector
pub fn employees(count: usize) -> Vec<Employee> {
    (0..count).map(|_| Employee::new()).collect()
}
