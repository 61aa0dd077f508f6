use chrono::{TimeZone, Utc};
use slate_core::calc::{Calculator, Op};
use slate_core::datastore::TaskStore;
use slate_core::filter::TaskFilter;
use tempfile::tempdir;

#[test]
fn store_roundtrip_and_filtering() {
    let temp = tempdir().expect("tempdir");
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

    let mut store = TaskStore::open(temp.path()).expect("open task store");
    let groceries = store.add("buy groceries", now).expect("add task");
    let laundry = store.add("do laundry", now).expect("add task");
    store.toggle(laundry).expect("toggle task");

    let active = store.filtered(TaskFilter::Active);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, groceries);

    let completed = store.filtered(TaskFilter::Completed);
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, laundry);

    let snapshot = store.tasks().to_vec();
    drop(store);

    let reopened = TaskStore::open(temp.path()).expect("reopen task store");
    assert_eq!(reopened.tasks(), snapshot.as_slice());
    assert_eq!(reopened.filtered(TaskFilter::All).len(), 2);
}

#[test]
fn calculator_flow_matches_key_surface() {
    let mut calc = Calculator::new();

    calc.input_digit('6');
    calc.set_operator(Op::Div);
    calc.input_digit('3');
    calc.compute();
    assert_eq!(calc.display(), "2");

    // The result becomes the first operand of the next operation.
    calc.set_operator(Op::Mul);
    calc.input_digit('1');
    calc.input_decimal();
    calc.input_digit('5');
    calc.compute();
    assert_eq!(calc.display(), "3");

    calc.clear();
    assert_eq!(calc.display(), "0");
}
