//! Event dispatch and trajectory stepping
//!
//! A cursor runs activities back to back at the current instant until one
//! suspends it (timeout, queued seize, synchronize barrier) or ends its
//! path. Suspended cursors wait in `Simulation::cursors` for a `Resume`
//! event; admission from a resource queue and barrier release both come
//! back through the scheduler at the current instant.
//!
//! Usage errors (unknown resource, over-release, bad duration) end the
//! arrival with `ArrivalOutcome::Failed` and never stop the run. Scheduler
//! breaches and out-of-range branches do.

use crate::events::{Event, EventKind};
use crate::models::{
    Activity, Arrival, ArrivalError, ArrivalId, ArrivalOutcome, AttributeScope, Context, Cursor,
    CursorId, ForkId, ForkState, GeneratorId, NodeId, PendingSeize, ResourceId, SeizeOutcome,
    Terminal,
};
use crate::monitor::{ArrivalRecord, AttributeRecord, ResourceSample, ResourceUsageRecord};
use crate::orchestrator::engine::{Simulation, SimulationError};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// What happens to a cursor after one activity
enum Step {
    /// Run the next activity now
    Continue,
    /// Wait for a resume event
    Suspend,
    /// End the cursor with a real outcome
    Terminate(ArrivalOutcome),
    /// End the cursor silently (superseded at a barrier)
    Discard,
}

impl Simulation {
    pub(super) fn dispatch(&mut self, event: Event) -> Result<(), SimulationError> {
        match event.kind {
            EventKind::Spawn { generator } => self.spawn(generator),
            EventKind::Resume { cursor } => self.advance(cursor),
        }
    }

    // ========================================================================
    // Generators
    // ========================================================================

    /// Create an arrival, run it until it suspends, then schedule the next spawn
    fn spawn(&mut self, generator_id: GeneratorId) -> Result<(), SimulationError> {
        let now = self.now();
        let Some(generator) = self.generators.get_mut(generator_id.0) else {
            return Ok(());
        };
        let name = generator.spawn_name();
        let trajectory = Arc::clone(generator.trajectory());
        let monitor = generator.monitor();

        let arrival_id = ArrivalId(self.next_arrival);
        self.next_arrival += 1;
        let cursor_id = self.new_cursor_id();

        debug!(time = now, arrival = %name, "Arrival spawned");
        self.arrivals.insert(
            arrival_id,
            Arrival::new(arrival_id, name, generator_id, now, monitor),
        );
        self.cursors
            .insert(cursor_id, Cursor::new(cursor_id, arrival_id, trajectory));

        self.advance(cursor_id)?;
        self.schedule_next_spawn(generator_id)
    }

    pub(super) fn schedule_next_spawn(
        &mut self,
        generator_id: GeneratorId,
    ) -> Result<(), SimulationError> {
        let now = self.now();
        let Some(generator) = self.generators.get_mut(generator_id.0) else {
            return Ok(());
        };
        if let Some(at) = generator.next_spawn(now, &self.globals, &mut self.rng) {
            self.scheduler.schedule(
                at,
                EventKind::Spawn {
                    generator: generator_id,
                },
            )?;
        }
        Ok(())
    }

    fn new_cursor_id(&mut self) -> CursorId {
        let id = CursorId(self.next_cursor);
        self.next_cursor += 1;
        id
    }

    // ========================================================================
    // Stepping
    // ========================================================================

    /// Run a suspended cursor until it suspends again or ends
    fn advance(&mut self, cursor_id: CursorId) -> Result<(), SimulationError> {
        let Some(mut cursor) = self.cursors.remove(&cursor_id) else {
            return Ok(());
        };

        loop {
            let Some(node_id) = cursor.unwind() else {
                return self.end_cursor(cursor, Some(ArrivalOutcome::Finished));
            };
            let trajectory = Arc::clone(&cursor.trajectory);
            let node = trajectory
                .node(node_id)
                .ok_or_else(|| SimulationError::DanglingNode {
                    trajectory: trajectory.name().to_string(),
                    node: node_id.0,
                })?;

            trace!(time = self.now(), cursor = %cursor.id, activity = node.activity.kind(), "Executing");
            match self.execute(&mut cursor, node_id, &node.activity, node.next)? {
                Step::Continue => {}
                Step::Suspend => {
                    self.cursors.insert(cursor.id, cursor);
                    return Ok(());
                }
                Step::Terminate(outcome) => return self.end_cursor(cursor, Some(outcome)),
                Step::Discard => return self.end_cursor(cursor, None),
            }
        }
    }

    fn execute(
        &mut self,
        cursor: &mut Cursor,
        node_id: NodeId,
        activity: &Activity,
        next: Option<NodeId>,
    ) -> Result<Step, SimulationError> {
        let now = self.now();

        match activity {
            Activity::Seize {
                resource,
                amount,
                on_reject,
            } => {
                let Some(resource_id) = self.resource_id(resource) else {
                    return self.usage_error(cursor, ArrivalError::UnknownResource(resource.clone()));
                };

                match self.resources[resource_id.0].try_seize(cursor.id, *amount, now) {
                    SeizeOutcome::Granted => {
                        if *amount > 0 {
                            self.arrival_mut(cursor.arrival)?
                                .acquire(resource_id, *amount, now, now);
                            self.sample(resource_id, now);
                        }
                        cursor.node = next;
                        Ok(Step::Continue)
                    }
                    SeizeOutcome::Enqueued { position } => {
                        trace!(time = now, cursor = %cursor.id, resource = %resource, position, "Queued");
                        cursor.pending = Some(PendingSeize {
                            resource: resource_id,
                            requested_at: now,
                        });
                        cursor.node = next;
                        self.sample(resource_id, now);
                        Ok(Step::Suspend)
                    }
                    SeizeOutcome::Rejected => match on_reject {
                        Some(continuation) => {
                            cursor.enter(continuation.entry, next, continuation.merge);
                            Ok(Step::Continue)
                        }
                        None => Ok(Step::Terminate(ArrivalOutcome::Rejected {
                            resource: resource.clone(),
                        })),
                    },
                }
            }

            Activity::Release { resource, amount } => {
                let Some(resource_id) = self.resource_id(resource) else {
                    return self.usage_error(cursor, ArrivalError::UnknownResource(resource.clone()));
                };

                let arrival = self.arrival_mut(cursor.arrival)?;
                let amount = amount.unwrap_or_else(|| arrival.held(resource_id));
                let emptied = match arrival.give_back(resource_id, resource, amount) {
                    Ok(emptied) => emptied,
                    Err(e) => return self.usage_error(cursor, e),
                };

                if let Some(holding) = emptied {
                    if arrival.monitor.is_full() {
                        let record = ResourceUsageRecord {
                            name: arrival.name.clone(),
                            resource: resource.clone(),
                            start_time: holding.requested_at,
                            end_time: now,
                            activity_time: now - holding.granted_at,
                        };
                        self.monitor.resource_usage(record);
                    }
                }
                self.release_units(resource_id, amount)?;
                cursor.node = next;
                Ok(Step::Continue)
            }

            Activity::Timeout { duration } => {
                let delay = self.evaluate(cursor.arrival, |ctx| duration(ctx))?;
                if !delay.is_finite() || delay < 0.0 {
                    return self.usage_error(cursor, ArrivalError::InvalidDuration(delay));
                }
                cursor.activity_time += delay;
                cursor.node = next;
                self.scheduler
                    .schedule_in(delay, EventKind::Resume { cursor: cursor.id })?;
                Ok(Step::Suspend)
            }

            Activity::SetAttribute {
                key,
                value,
                scope,
                modifier,
            } => {
                let value = self.evaluate(cursor.arrival, |ctx| value(ctx))?;
                let arrival = self.arrivals.get_mut(&cursor.arrival);
                let Some(arrival) = arrival else {
                    return Err(SimulationError::UnknownArrival(cursor.arrival));
                };

                let (stored, owner) = match scope {
                    AttributeScope::Arrival => (
                        arrival.attributes.apply(key, *modifier, value),
                        Some(arrival.name.clone()),
                    ),
                    AttributeScope::Global => (self.globals.apply(key, *modifier, value), None),
                };
                if arrival.monitor.is_full() {
                    self.monitor.attribute(AttributeRecord {
                        time: now,
                        arrival: owner,
                        key: key.clone(),
                        value: stored,
                    });
                }
                cursor.node = next;
                Ok(Step::Continue)
            }

            Activity::Branch {
                selector,
                continuations,
            } => {
                let index = self.evaluate(cursor.arrival, |ctx| selector(ctx))?;
                let continuation =
                    continuations
                        .get(index)
                        .ok_or(SimulationError::BranchOutOfRange {
                            index,
                            len: continuations.len(),
                        })?;
                cursor.enter(continuation.entry, next, continuation.merge);
                Ok(Step::Continue)
            }

            Activity::Leave { probability } => {
                let p = self.evaluate(cursor.arrival, |ctx| probability(ctx))?;
                if self.rng.bernoulli(p) {
                    return Ok(Step::Terminate(ArrivalOutcome::Left));
                }
                cursor.node = next;
                Ok(Step::Continue)
            }

            Activity::Clone { n, continuations } => {
                self.fork(cursor, *n, continuations, next)?;
                Ok(Step::Continue)
            }

            Activity::Synchronize { wait } => self.synchronize(cursor, *wait, next),

            Activity::Rollback { target, times } => {
                let taken = cursor.rollbacks.entry(node_id).or_insert(0);
                if times.map_or(true, |limit| *taken < limit) {
                    *taken += 1;
                    cursor.node = Some(*target);
                } else {
                    cursor.node = next;
                }
                Ok(Step::Continue)
            }

            Activity::Log { message } => {
                let text = self.evaluate(cursor.arrival, |ctx| message(ctx))?;
                let arrival = self.arrival_mut(cursor.arrival)?;
                info!(time = now, arrival = %arrival.name, "{}", text);
                cursor.node = next;
                Ok(Step::Continue)
            }
        }
    }

    /// Evaluate a callable against the arrival's attributes
    fn evaluate<T>(
        &mut self,
        arrival: ArrivalId,
        f: impl FnOnce(&mut Context<'_>) -> T,
    ) -> Result<T, SimulationError> {
        let now = self.scheduler.now();
        let attributes = &self
            .arrivals
            .get(&arrival)
            .ok_or(SimulationError::UnknownArrival(arrival))?
            .attributes;
        let mut ctx = Context::new(now, attributes, &self.globals, &mut self.rng);
        Ok(f(&mut ctx))
    }

    fn usage_error(&self, cursor: &Cursor, error: ArrivalError) -> Result<Step, SimulationError> {
        let name = self
            .arrivals
            .get(&cursor.arrival)
            .map_or("?", |a| a.name.as_str());
        warn!(time = self.now(), arrival = %name, %error, "Arrival failed");
        Ok(Step::Terminate(ArrivalOutcome::Failed {
            reason: error.to_string(),
        }))
    }

    fn resource_id(&self, name: &str) -> Option<ResourceId> {
        self.resource_index.get(name).copied()
    }

    fn arrival_mut(&mut self, id: ArrivalId) -> Result<&mut Arrival, SimulationError> {
        self.arrivals
            .get_mut(&id)
            .ok_or(SimulationError::UnknownArrival(id))
    }

    // ========================================================================
    // Resources
    // ========================================================================

    /// Return units to a resource and wake the admitted waiters
    fn release_units(&mut self, resource_id: ResourceId, amount: u32) -> Result<(), SimulationError> {
        let now = self.now();
        let resource = &mut self.resources[resource_id.0];
        let admitted = resource.release(amount)?;
        let resource_name = resource.name().to_string();
        let changed = amount > 0 || !admitted.is_empty();

        for request in admitted {
            let Some(cursor) = self.cursors.get_mut(&request.cursor) else {
                continue;
            };
            let requested_at = cursor
                .pending
                .take()
                .map_or(request.enqueued_at, |p| p.requested_at);
            let wait = now - request.enqueued_at;
            cursor.waiting_time += wait;

            if let Some(arrival) = self.arrivals.get_mut(&cursor.arrival) {
                arrival.acquire(resource_id, request.amount, requested_at, now);
                arrival.add_resource_wait(&resource_name, wait);
            }
            trace!(time = now, cursor = %request.cursor, resource = %resource_name, wait, "Admitted");
            self.scheduler.schedule(
                now,
                EventKind::Resume {
                    cursor: request.cursor,
                },
            )?;
        }

        if changed {
            self.sample(resource_id, now);
        }
        Ok(())
    }

    fn sample(&mut self, resource_id: ResourceId, now: f64) {
        let Some(resource) = self.resources.get(resource_id.0) else {
            return;
        };
        if !resource.monitor().is_on() {
            return;
        }
        let sample = ResourceSample {
            resource: resource.name().to_string(),
            time: now,
            server_count: resource.server_count(),
            queue_count: resource.queue_count(),
            capacity: resource.capacity(),
            queue_capacity: resource.queue_capacity().limit(),
        };
        self.monitor.resource_sample(sample);
    }

    // ========================================================================
    // Clone / Synchronize
    // ========================================================================

    /// Split `cursor` into `n` cursors joined by a new fork
    ///
    /// The original follows continuation 0 synchronously; the siblings are
    /// resumed at the current instant in order.
    fn fork(
        &mut self,
        cursor: &mut Cursor,
        n: usize,
        continuations: &[Option<NodeId>],
        next: Option<NodeId>,
    ) -> Result<(), SimulationError> {
        let n = n.max(1);
        let fork = ForkId(self.next_fork);
        self.next_fork += 1;

        let arrival = self.arrival_mut(cursor.arrival)?;
        for inherited in &cursor.forks {
            if let Some(state) = arrival.forks.get_mut(inherited) {
                state.pending += n - 1;
            }
        }
        arrival.forks.insert(
            fork,
            ForkState {
                pending: n,
                ..ForkState::default()
            },
        );
        arrival.live_cursors += n - 1;
        cursor.forks.push(fork);

        let now = self.now();
        for i in 1..n {
            let mut sibling = cursor.sibling(self.new_cursor_id());
            sibling.enter(continuations.get(i).copied().flatten(), next, true);
            let sibling_id = sibling.id;
            self.cursors.insert(sibling_id, sibling);
            self.scheduler
                .schedule(now, EventKind::Resume { cursor: sibling_id })?;
        }

        cursor.enter(continuations.first().copied().flatten(), next, true);
        Ok(())
    }

    fn synchronize(
        &mut self,
        cursor: &mut Cursor,
        wait: bool,
        next: Option<NodeId>,
    ) -> Result<Step, SimulationError> {
        let now = self.now();
        cursor.node = next;

        let Some(&fork) = cursor.forks.last() else {
            return Ok(Step::Continue);
        };
        let arrival = self.arrival_mut(cursor.arrival)?;
        let Some(state) = arrival.forks.get_mut(&fork) else {
            cursor.forks.pop();
            return Ok(Step::Continue);
        };

        if !wait {
            if state.passed {
                return Ok(Step::Discard);
            }
            state.passed = true;
            state.pending = state.pending.saturating_sub(1);
            if state.pending == 0 {
                arrival.forks.remove(&fork);
            }
            cursor.forks.pop();
            return Ok(Step::Continue);
        }

        state.pending = state.pending.saturating_sub(1);
        cursor.forks.pop();
        if state.pending > 0 {
            state.parked.push((cursor.id, now));
            return Ok(Step::Suspend);
        }

        // Last one in: it continues, everyone parked before it is dropped
        let parked = arrival
            .forks
            .remove(&fork)
            .map(|state| state.parked)
            .unwrap_or_default();
        for (parked_id, _) in parked {
            if let Some(parked_cursor) = self.cursors.remove(&parked_id) {
                self.end_cursor(parked_cursor, None)?;
            }
        }
        Ok(Step::Continue)
    }

    // ========================================================================
    // Termination
    // ========================================================================

    /// End a cursor, resolving forks it leaves behind and completing the
    /// arrival when it was the last one
    ///
    /// `outcome` is `None` for cursors dropped by a barrier; those do not
    /// overwrite the arrival's terminal snapshot.
    fn end_cursor(
        &mut self,
        cursor: Cursor,
        outcome: Option<ArrivalOutcome>,
    ) -> Result<(), SimulationError> {
        let now = self.now();
        let mut ending = vec![(cursor, outcome)];

        while let Some((cursor, outcome)) = ending.pop() {
            let arrival = self.arrival_mut(cursor.arrival)?;
            if let Some(outcome) = outcome {
                arrival.terminal = Some(Terminal {
                    outcome,
                    time: now,
                    activity_time: cursor.activity_time,
                    waiting_time: cursor.waiting_time,
                });
            }
            arrival.live_cursors = arrival.live_cursors.saturating_sub(1);

            let mut resumed = Vec::new();
            let mut dropped = Vec::new();
            for fork in cursor.forks.iter().rev() {
                let Some(state) = arrival.forks.get_mut(fork) else {
                    continue;
                };
                state.pending = state.pending.saturating_sub(1);
                if state.pending > 0 {
                    continue;
                }
                // Nobody else will reach this barrier: release the last parked cursor
                if let Some(mut state) = arrival.forks.remove(fork) {
                    if let Some(survivor) = state.parked.pop() {
                        resumed.push(survivor);
                    }
                    dropped.extend(state.parked.into_iter().map(|(id, _)| id));
                }
            }
            let done = arrival.live_cursors == 0;

            for (survivor, parked_at) in resumed {
                if let Some(parked) = self.cursors.get_mut(&survivor) {
                    parked.waiting_time += now - parked_at;
                    self.scheduler
                        .schedule(now, EventKind::Resume { cursor: survivor })?;
                }
            }
            for id in dropped {
                if let Some(parked) = self.cursors.remove(&id) {
                    ending.push((parked, None));
                }
            }

            if done {
                self.complete(cursor.arrival)?;
            }
        }
        Ok(())
    }

    /// Record a finished arrival and free everything it still holds
    fn complete(&mut self, arrival_id: ArrivalId) -> Result<(), SimulationError> {
        let now = self.now();
        let Some(mut arrival) = self.arrivals.remove(&arrival_id) else {
            return Ok(());
        };
        let terminal = arrival.terminal.take().unwrap_or(Terminal {
            outcome: ArrivalOutcome::Failed {
                reason: "no cursor reached a terminal state".to_string(),
            },
            time: now,
            activity_time: 0.0,
            waiting_time: 0.0,
        });

        let holdings = std::mem::take(&mut arrival.holdings);
        if !holdings.is_empty() && terminal.outcome.is_finished() {
            warn!(time = now, arrival = %arrival.name, held = holdings.len(), "Arrival finished while holding resources, releasing");
        }
        for (resource_id, holding) in holdings {
            let resource_name = self.resources[resource_id.0].name().to_string();
            if arrival.monitor.is_full() {
                self.monitor.resource_usage(ResourceUsageRecord {
                    name: arrival.name.clone(),
                    resource: resource_name,
                    start_time: holding.requested_at,
                    end_time: now,
                    activity_time: now - holding.granted_at,
                });
            }
            self.release_units(resource_id, holding.amount)?;
        }

        debug!(
            time = now,
            arrival = %arrival.name,
            outcome = terminal.outcome.label(),
            "Arrival completed"
        );
        if arrival.monitor.is_on() {
            let generator = self
                .generators
                .get(arrival.generator.0)
                .map(|g| g.name().to_string())
                .unwrap_or_default();
            self.monitor.arrival(ArrivalRecord {
                name: arrival.name,
                generator,
                start_time: arrival.start_time,
                end_time: terminal.time,
                activity_time: terminal.activity_time,
                waiting_time: terminal.waiting_time,
                finished: terminal.outcome.is_finished(),
                outcome: terminal.outcome,
                per_resource_wait: arrival.resource_wait,
            });
        }
        Ok(())
    }
}
