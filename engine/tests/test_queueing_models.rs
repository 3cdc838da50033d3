//! Classic queueing models checked against their closed-form results
//!
//! M/M/1 with lambda = 2, mu = 4 (rho = 0.5): L = rho / (1 - rho) = 1 and
//! W = 1 / (mu - lambda) = 0.5. M/M/2/3 with lambda = 3, mu = 2: blocking
//! probability p3 = 0.84375 / 4.46875.

use queue_simulator_core_rs::{
    Distribution, Generator, MonitorLevel, ResourceSample, Simulation, TrajectoryBuilder,
};
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

/// Single-resource model: exponential interarrivals and service
fn queue_model(
    seed: u64,
    arrival_rate: f64,
    service_rate: f64,
    servers: u32,
    queue: Option<usize>,
) -> Simulation {
    let service = Distribution::Exponential { rate: service_rate };
    let customer = Arc::new(
        TrajectoryBuilder::new("customer")
            .seize("server", 1)
            .timeout_with(move |ctx| service.sample(ctx.rng()))
            .release("server", 1)
            .build(),
    );

    let mut sim = Simulation::new(seed);
    sim.add_resource("server", servers, queue).unwrap();
    sim.add_generator(
        Generator::new(
            "customer",
            customer,
            Distribution::Exponential { rate: arrival_rate }.into_fn(),
        )
        .with_monitor(MonitorLevel::Basic),
    )
    .unwrap();
    sim
}

/// Time-weighted mean of `server_count + queue_count` over `[0, until]`
fn time_average_in_system(samples: &[&ResourceSample], until: f64) -> f64 {
    let mut area = 0.0;
    let mut last_time = 0.0;
    let mut last_value = 0.0;
    for sample in samples {
        area += last_value * (sample.time - last_time);
        last_time = sample.time;
        last_value = sample.system_count();
    }
    area += last_value * (until - last_time);
    area / until
}

fn rejection_rate(sim: &Simulation) -> f64 {
    let records = sim.arrival_records();
    let rejected = records
        .iter()
        .filter(|r| r.outcome.label() == "rejected")
        .count();
    rejected as f64 / records.len() as f64
}

// ============================================================================
// M/M/1
// ============================================================================

#[test]
fn test_mm1_average_number_in_system() {
    let horizon = 20_000.0;
    let mut sim = queue_model(42, 2.0, 4.0, 1, None);
    sim.run_until(horizon).unwrap();

    let samples = sim.records().samples_for_resource("server");
    let l = time_average_in_system(&samples, horizon);
    assert!((l - 1.0).abs() < 0.15, "L = {}, expected about 1.0", l);
}

#[test]
fn test_mm1_mean_time_in_system() {
    let mut sim = queue_model(7, 2.0, 4.0, 1, None);
    sim.run_until(20_000.0).unwrap();

    let records = sim.arrival_records();
    assert!(records.len() > 30_000, "only {} arrivals", records.len());
    let w = records.iter().map(|r| r.flow_time()).sum::<f64>() / records.len() as f64;
    assert!((w - 0.5).abs() < 0.05, "W = {}, expected about 0.5", w);
}

#[test]
fn test_activity_plus_waiting_equals_flow_time() {
    let mut sim = queue_model(99, 3.0, 4.0, 1, None);
    sim.run_until(2_000.0).unwrap();

    let finished: Vec<_> = sim.arrival_records().iter().filter(|r| r.finished).collect();
    assert!(!finished.is_empty());
    for record in finished {
        let total = record.activity_time + record.waiting_time;
        let flow = record.end_time - record.start_time;
        assert!(
            (total - flow).abs() <= 1e-9 * flow.max(1.0),
            "{}: activity {} + waiting {} != {}",
            record.name,
            record.activity_time,
            record.waiting_time,
            flow
        );
        let server_wait = record.per_resource_wait.get("server").copied().unwrap_or(0.0);
        assert!((server_wait - record.waiting_time).abs() <= 1e-9 * flow.max(1.0));
    }
}

// ============================================================================
// M/M/c/k
// ============================================================================

#[test]
fn test_mm23_blocks_more_than_unbounded_queue() {
    let mut bounded = queue_model(11, 3.0, 2.0, 2, Some(1));
    let mut unbounded = queue_model(11, 3.0, 2.0, 2, None);
    bounded.run_until(5_000.0).unwrap();
    unbounded.run_until(5_000.0).unwrap();

    let blocked = rejection_rate(&bounded);
    assert!(blocked > rejection_rate(&unbounded));
    assert_eq!(rejection_rate(&unbounded), 0.0);

    let expected = 0.84375 / 4.46875;
    assert!(
        (blocked - expected).abs() < 0.03,
        "blocking {} expected about {}",
        blocked,
        expected
    );
}

#[test]
fn test_mm23_never_exceeds_system_size() {
    let mut sim = queue_model(3, 5.0, 2.0, 2, Some(1));
    sim.run_until(1_000.0).unwrap();

    for sample in sim.resource_samples() {
        assert!(sample.server_count <= 2);
        assert!(sample.queue_count <= 1);
        assert_eq!(sample.capacity, 2);
        assert_eq!(sample.queue_capacity, Some(1));
    }
}

// ============================================================================
// Network
// ============================================================================

#[test]
fn test_tandem_queues_conserve_arrivals() {
    let service = Distribution::Exponential { rate: 5.0 };
    let job = Arc::new(
        TrajectoryBuilder::new("job")
            .seize("first", 1)
            .timeout_with(move |ctx| service.sample(ctx.rng()))
            .release("first", 1)
            .seize("second", 1)
            .timeout_with(move |ctx| service.sample(ctx.rng()))
            .release("second", 1)
            .build(),
    );

    let mut sim = Simulation::new(8);
    sim.add_resource("first", 1, None).unwrap();
    sim.add_resource("second", 1, None).unwrap();
    sim.add_generator(
        Generator::new("job", job, Distribution::Exponential { rate: 2.0 }.into_fn())
            .stop_at(500.0),
    )
    .unwrap();
    sim.run().unwrap();

    let generated = sim.generated_count("job").unwrap();
    assert_eq!(sim.arrival_records().len() as u64, generated);
    assert_eq!(sim.in_flight(), 0);
    assert!(sim.arrival_records().iter().all(|r| r.start_time < 500.0));

    let by_resource = sim.resource_samples_by_resource();
    assert_eq!(by_resource.len(), 2);
    assert_eq!(by_resource["second"].last().unwrap().server_count, 0);
}
