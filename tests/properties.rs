use proptest::prelude::*;

use census::subjects::{Employee, Employees, Leaky};
use census::{InProcessProbe, MemoryProbe, Snapshot};

#[derive(Debug, Clone)]
enum Op {
    Create,
    Drop(usize),
    Retain,
    ReleaseAll,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Create),
        2 => (0usize..16).prop_map(Op::Drop),
        1 => Just(Op::Retain),
        1 => Just(Op::ReleaseAll),
    ]
}

fn apply(ops: &[Op], held: &mut Vec<Employee>, leaky: &mut Leaky) {
    for op in ops {
        match op {
            Op::Create => held.push(Employee::new()),
            Op::Drop(index) => {
                if !held.is_empty() {
                    held.remove(index % held.len());
                }
            }
            Op::Retain => leaky.retain(Employee::new()),
            Op::ReleaseAll => leaky.release_all(),
        }
    }
}

proptest! {
    #[test]
    fn census_counts_exactly_what_is_alive(n in 0usize..200) {
        let employees: Vec<Employee> = (0..n).map(|_| Employee::new()).collect();
        let count = Snapshot::capture().of_type::<Employee>().count();
        prop_assert_eq!(count, n);
        drop(employees);
        prop_assert_eq!(Snapshot::capture().of_type::<Employee>().count(), 0);
    }

    #[test]
    fn release_all_is_idempotent(retained in 0usize..32) {
        let mut leaky = Leaky::new();
        for _ in 0..retained {
            leaky.retain(Employee::new());
        }
        leaky.release_all();
        let once = Snapshot::capture().of_type::<Employee>().count();
        leaky.release_all();
        let twice = Snapshot::capture().of_type::<Employee>().count();
        prop_assert_eq!(once, 0);
        prop_assert_eq!(once, twice);
        prop_assert!(leaky.is_empty());
    }

    #[test]
    fn nothing_vanishes_unclassified(
        setup in proptest::collection::vec(op(), 0..40),
        action in proptest::collection::vec(op(), 0..40),
    ) {
        let mut held = Vec::new();
        let mut leaky = Leaky::new();
        apply(&setup, &mut held, &mut leaky);
        let before = Snapshot::capture();

        apply(&action, &mut held, &mut leaky);
        let after = Snapshot::capture();

        let diff = after.difference(&before).expect("comparable");
        let accounted = diff.dead_objects().of_type::<Employee>()
            .union(&after.of_type::<Employee>());
        prop_assert!(accounted.is_superset(&before.of_type::<Employee>()));

        // new objects were issued after the earlier capture
        for record in diff.new_objects() {
            prop_assert!(record.id.get() > before.watermark());
        }
    }

    #[test]
    fn allocators_report_their_allocation_events(n in 1usize..100) {
        let employees = Employees::new();
        let probe = InProcessProbe::collecting_allocations();

        let before = probe.capture();
        employees.wasteful(n);
        let middle = probe.capture();
        employees.efficient(n);
        let after = probe.capture();

        let wasteful = middle.traffic_from(&before).expect("collected");
        let efficient = after.traffic_from(&middle).expect("collected");
        prop_assert_eq!(wasteful.of_type::<Employee>().allocated().objects_count, n);
        prop_assert_eq!(efficient.of_type::<Employee>().allocated().objects_count, 1);
    }
}
