// Gantry: A Transportation Control Kernel for Automated Guided Vehicles
// Copyright (C) 2026  The Gantry Developers
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # Scheduler
//!
//! The scheduler arbitrates exclusive claims on sets of resources (points
//! and paths). Blocks induce transitive expansion: when any member of a
//! block appears in a claim, all members are added before arbitration, and
//! the same closure is applied on release. Grants are atomic: a request
//! receives the whole expanded set or nothing. Refused requests queue in
//! FIFO order per vehicle; whenever resources are released, newly
//! satisfiable requests are granted in arrival order with ties broken by
//! the lowest vehicle id.
//!
//! Deadlock avoidance is a property of the movement discipline built on
//! top: a vehicle claims the resources of its next step *before* releasing
//! anything it holds, and a request that would conflict is queued rather
//! than partially granted. Together with the global FIFO grant order this
//! keeps the wait-for graph acyclic.
//!
//! The scheduler never calls back into the dispatcher while holding its
//! table lock: grants triggered by a release are collected first and handed
//! to the notification sink after the lock is dropped.

use crate::model::types::{ResourceRef, VehicleId};

use log::*;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;
use thiserror::Error;

/// Resource allocation errors
#[derive(Error, Debug, PartialEq)]
pub enum AllocationError {
    /// The requested resources are held by another vehicle
    #[error("Resources are already allocated to another vehicle: {0:?}")]
    ResourcesUnavailable(BTreeSet<ResourceRef>),
    /// A release names resources the vehicle does not hold
    #[error("Vehicle {0:?} does not hold all resources it tries to release: {1:?}")]
    NotHeld(VehicleId, BTreeSet<ResourceRef>),
}

/// Notification that a previously queued request has been granted.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    /// The vehicle whose request was granted
    pub vehicle: VehicleId,
    /// The full expanded resource set now held through this grant
    pub resources: BTreeSet<ResourceRef>,
}

/// Sink receiving deferred grant notifications. Called without any
/// scheduler lock held.
pub type GrantSink = Box<dyn Fn(Grant) + Send + Sync>;

#[derive(Debug)]
struct PendingRequest {
    seq: u64,
    vehicle: VehicleId,
    resources: BTreeSet<ResourceRef>,
}

#[derive(Debug, Default)]
struct SchedulerState {
    held: HashMap<VehicleId, BTreeSet<ResourceRef>>,
    pending: VecDeque<PendingRequest>,
    blocks: Vec<BTreeSet<ResourceRef>>,
    next_seq: u64,
}

impl SchedulerState {
    /// Expand a set by block membership, to a fixpoint.
    fn expand(&self, resources: &BTreeSet<ResourceRef>) -> BTreeSet<ResourceRef> {
        let mut closure = resources.clone();
        loop {
            let before = closure.len();
            for block in self.blocks.iter() {
                if block.iter().any(|m| closure.contains(m)) {
                    closure.extend(block.iter().copied());
                }
            }
            if closure.len() == before {
                return closure;
            }
        }
    }

    /// The subset of `resources` held by vehicles other than `vehicle`.
    fn conflicts(
        &self,
        vehicle: VehicleId,
        resources: &BTreeSet<ResourceRef>,
    ) -> BTreeSet<ResourceRef> {
        let mut conflicting = BTreeSet::new();
        for (holder, held) in self.held.iter() {
            if *holder == vehicle {
                continue;
            }
            conflicting.extend(held.intersection(resources).copied());
        }
        conflicting
    }

    fn has_pending(&self, vehicle: VehicleId) -> bool {
        self.pending.iter().any(|r| r.vehicle == vehicle)
    }

    fn grant(&mut self, vehicle: VehicleId, resources: &BTreeSet<ResourceRef>) {
        self.held.entry(vehicle).or_default().extend(resources.iter().copied());
    }

    /// Grant every pending request that has become satisfiable, in arrival
    /// order with ties broken by the lowest vehicle id, skipping requests
    /// behind an unsatisfied earlier request of the same vehicle.
    fn grant_satisfiable(&mut self) -> Vec<Grant> {
        let mut grants: Vec<Grant> = Vec::new();
        loop {
            let mut order: Vec<usize> = (0..self.pending.len()).collect();
            order.sort_by_key(|i| (self.pending[*i].seq, self.pending[*i].vehicle));

            let mut granted_index: Option<usize> = None;
            let mut blocked: BTreeSet<VehicleId> = BTreeSet::new();
            for i in order {
                let request = &self.pending[i];
                if blocked.contains(&request.vehicle) {
                    continue;
                }
                if self.conflicts(request.vehicle, &request.resources).is_empty() {
                    granted_index = Some(i);
                    break;
                }
                // FIFO per vehicle: later requests wait behind this one
                blocked.insert(request.vehicle);
            }

            match granted_index {
                Some(i) => {
                    let request = self.pending.remove(i).expect("index is in range");
                    self.grant(request.vehicle, &request.resources);
                    grants.push(Grant { vehicle: request.vehicle, resources: request.resources });
                }
                None => return grants,
            }
        }
    }
}

/// # Scheduler struct
///
/// The shared allocation table plus the queue of pending requests, guarded
/// by one mutex. All operations are non-blocking.
pub struct Scheduler {
    state: Mutex<SchedulerState>,
    sink: GrantSink,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("Scheduler")
            .field("holders", &state.held.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl Scheduler {
    /// Create a scheduler delivering deferred grants to `sink`.
    pub fn new(sink: GrantSink) -> Self {
        Self { state: Mutex::new(SchedulerState::default()), sink }
    }

    /// Install the block member sets for the current operating session.
    /// Block membership is static while operating.
    pub fn set_blocks(&self, blocks: Vec<BTreeSet<ResourceRef>>) {
        self.state.lock().unwrap().blocks = blocks;
    }

    /// Expand a resource set by block membership, exactly as arbitration
    /// will.
    pub fn expand(&self, resources: &BTreeSet<ResourceRef>) -> BTreeSet<ResourceRef> {
        self.state.lock().unwrap().expand(resources)
    }

    /// Non-blocking claim. On a grant the vehicle owns the whole expanded
    /// set and `true` is returned; otherwise the request is queued in FIFO
    /// order behind the vehicle's earlier requests and `false` is returned.
    /// The eventual grant is delivered through the sink. Claiming the empty
    /// set succeeds trivially.
    pub fn allocate(&self, vehicle: VehicleId, resources: &BTreeSet<ResourceRef>) -> bool {
        let mut state = self.state.lock().unwrap();
        let expanded = state.expand(resources);
        if expanded.is_empty() {
            return true;
        }
        if !state.has_pending(vehicle) && state.conflicts(vehicle, &expanded).is_empty() {
            state.grant(vehicle, &expanded);
            trace!("Allocated {:?} to {:?}", expanded, vehicle);
            return true;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.push_back(PendingRequest { seq, vehicle, resources: expanded });
        trace!("Queued allocation request #{} of {:?}", seq, vehicle);
        false
    }

    /// Claim that must succeed immediately. Fails with the conflicting
    /// subset when any resource is held by another vehicle; never queues.
    pub fn allocate_now(
        &self,
        vehicle: VehicleId,
        resources: &BTreeSet<ResourceRef>,
    ) -> Result<(), AllocationError> {
        let mut state = self.state.lock().unwrap();
        let expanded = state.expand(resources);
        let conflicting = state.conflicts(vehicle, &expanded);
        if !conflicting.is_empty() {
            return Err(AllocationError::ResourcesUnavailable(conflicting));
        }
        state.grant(vehicle, &expanded);
        Ok(())
    }

    /// Release a subset of the resources a vehicle holds. The subset is
    /// expanded by block membership before release. Newly satisfiable
    /// pending requests are granted and delivered through the sink.
    pub fn free(
        &self,
        vehicle: VehicleId,
        resources: &BTreeSet<ResourceRef>,
    ) -> Result<(), AllocationError> {
        let grants = {
            let mut state = self.state.lock().unwrap();
            let expanded = state.expand(resources);
            let missing: BTreeSet<ResourceRef> = match state.held.get(&vehicle) {
                Some(held) => expanded.difference(held).copied().collect(),
                None => expanded.clone(),
            };
            if !missing.is_empty() {
                return Err(AllocationError::NotHeld(vehicle, missing));
            }
            if let Some(held) = state.held.get_mut(&vehicle) {
                for resource in expanded.iter() {
                    held.remove(resource);
                }
                if held.is_empty() {
                    state.held.remove(&vehicle);
                }
            }
            state.grant_satisfiable()
        };
        self.deliver(grants);
        Ok(())
    }

    /// Release everything a vehicle holds and drop its pending requests.
    pub fn free_all(&self, vehicle: VehicleId) {
        let grants = {
            let mut state = self.state.lock().unwrap();
            state.held.remove(&vehicle);
            state.pending.retain(|r| r.vehicle != vehicle);
            state.grant_satisfiable()
        };
        self.deliver(grants);
    }

    /// Withdraw all pending requests of a vehicle without touching what it
    /// already holds.
    pub fn withdraw_pending(&self, vehicle: VehicleId) {
        self.state.lock().unwrap().pending.retain(|r| r.vehicle != vehicle);
    }

    /// A snapshot of the allocation table.
    pub fn allocations(&self) -> HashMap<VehicleId, BTreeSet<ResourceRef>> {
        self.state.lock().unwrap().held.clone()
    }

    /// The resources currently held by one vehicle.
    pub fn allocated_by(&self, vehicle: VehicleId) -> BTreeSet<ResourceRef> {
        self.state.lock().unwrap().held.get(&vehicle).cloned().unwrap_or_default()
    }

    fn deliver(&self, grants: Vec<Grant>) {
        for grant in grants {
            debug!("Granting queued allocation to {:?}", grant.vehicle);
            (self.sink)(grant);
        }
    }
}
