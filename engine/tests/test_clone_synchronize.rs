//! Clone and synchronize tests
//!
//! Forked cursors share one arrival record; barriers continue with the last
//! (`wait = true`) or first (`wait = false`) sibling.

use queue_simulator_core_rs::models::{AttributeMod, AttributeScope};
use queue_simulator_core_rs::{
    constant, ArrivalOutcome, Generator, MonitorLevel, Simulation, Trajectory, TrajectoryBuilder,
};
use std::sync::Arc;

fn timeout(d: f64) -> Trajectory {
    TrajectoryBuilder::new("timeout").timeout(d).build()
}

/// Spawn one arrival of `trajectory` at t = 1 and run to completion
fn run_one(trajectory: Trajectory) -> Simulation {
    let mut sim = Simulation::new(5);
    sim.add_resource("desk", 1, None).unwrap();
    sim.add_generator(
        Generator::new("a", Arc::new(trajectory), constant(1.0))
            .with_limit(1)
            .with_monitor(MonitorLevel::Full),
    )
    .unwrap();
    sim.run().unwrap();
    sim
}

#[test]
fn test_clone_produces_single_record_at_last_finish() {
    let t = TrajectoryBuilder::new("t")
        .clone_into(2, vec![&timeout(1.0), &timeout(5.0)])
        .timeout(1.0)
        .build();
    let sim = run_one(t);

    let records = sim.arrival_records();
    assert_eq!(records.len(), 1, "clones share one arrival record");
    assert_eq!(records[0].end_time, 1.0 + 5.0 + 1.0);
    assert_eq!(records[0].activity_time, 6.0);
    assert!(records[0].finished);
    assert_eq!(sim.in_flight(), 0);
}

#[test]
fn test_synchronize_wait_continues_with_last() {
    let t = TrajectoryBuilder::new("t")
        .clone_into(3, vec![&timeout(1.0), &timeout(2.0), &timeout(3.0)])
        .synchronize(true)
        .timeout(1.0)
        .build();
    let sim = run_one(t);

    let record = &sim.arrival_records()[0];
    assert_eq!(record.end_time, 1.0 + 3.0 + 1.0);
    assert_eq!(record.activity_time, 4.0);
    assert_eq!(record.waiting_time, 0.0);
    assert_eq!(
        record.activity_time + record.waiting_time,
        record.end_time - record.start_time
    );
}

#[test]
fn test_synchronize_no_wait_continues_with_first() {
    let t = TrajectoryBuilder::new("t")
        .clone_into(3, vec![&timeout(1.0), &timeout(2.0), &timeout(3.0)])
        .synchronize(false)
        .timeout(10.0)
        .build();
    let sim = run_one(t);

    let records = sim.arrival_records();
    assert_eq!(records.len(), 1);
    // First sibling passes at t = 2 and runs the 10-unit tail alone
    assert_eq!(records[0].end_time, 12.0);
    assert_eq!(records[0].activity_time, 11.0);
    assert!(records[0].finished);
}

#[test]
fn test_sibling_dropping_out_releases_barrier() {
    let quit = TrajectoryBuilder::new("quit").timeout(3.0).leave(1.0).build();
    let t = TrajectoryBuilder::new("t")
        .clone_into(2, vec![&timeout(1.0), &quit])
        .synchronize(true)
        .timeout(1.0)
        .build();
    let sim = run_one(t);

    let record = &sim.arrival_records()[0];
    // Parked at t = 2, released when the sibling leaves at t = 4
    assert_eq!(record.end_time, 5.0);
    assert_eq!(record.waiting_time, 2.0);
    assert_eq!(record.activity_time, 2.0);
    assert_eq!(record.outcome, ArrivalOutcome::Finished);
}

#[test]
fn test_missing_continuations_go_to_next_activity() {
    let t = TrajectoryBuilder::new("t")
        .clone_into(3, vec![&timeout(4.0)])
        .synchronize(true)
        .build();
    let sim = run_one(t);

    // Original takes the 4-unit continuation, the two clones arrive at once
    assert_eq!(sim.arrival_records()[0].end_time, 5.0);
}

#[test]
fn test_clones_share_attributes() {
    let bump = TrajectoryBuilder::new("bump")
        .set_attribute_mod("hits", AttributeScope::Arrival, AttributeMod::Add, |_| 1.0)
        .build();
    let t = TrajectoryBuilder::new("t")
        .clone_into(3, vec![&bump, &bump, &bump])
        .synchronize(true)
        .timeout_with(|ctx| ctx.attribute_or("hits", 0.0))
        .build();
    let sim = run_one(t);

    let record = &sim.arrival_records()[0];
    assert_eq!(record.flow_time(), 3.0);
}

#[test]
fn test_nested_clones_join_inner_then_outer() {
    let inner = TrajectoryBuilder::new("inner")
        .clone_into(2, vec![&timeout(1.0), &timeout(2.0)])
        .synchronize(true)
        .build();
    let t = TrajectoryBuilder::new("t")
        .clone_into(2, vec![&inner, &timeout(5.0)])
        .synchronize(true)
        .timeout(1.0)
        .build();
    let sim = run_one(t);

    let records = sim.arrival_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].end_time, 1.0 + 5.0 + 1.0);
    assert_eq!(sim.in_flight(), 0);
}

#[test]
fn test_clone_cursors_share_holdings() {
    let t = TrajectoryBuilder::new("t")
        .seize("desk", 1)
        .clone_into(2, vec![&timeout(1.0), &timeout(2.0)])
        .synchronize(true)
        .release("desk", 1)
        .build();
    let sim = run_one(t);

    assert!(sim.arrival_records()[0].finished);
    assert_eq!(sim.resource("desk").unwrap().server_count(), 0);
    assert_eq!(sim.resource_usage_records()[0].activity_time, 2.0);
}

#[test]
fn test_synchronize_without_clone_passes_through() {
    let t = TrajectoryBuilder::new("t")
        .synchronize(true)
        .timeout(1.0)
        .build();
    let sim = run_one(t);
    assert_eq!(sim.arrival_records()[0].flow_time(), 1.0);
}
