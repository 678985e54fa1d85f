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

//! # Per-source search trees
//!
//! One [`SearchTree`] is the result of a single-source shortest-path search
//! for one vehicle from one point. The search runs over *arrival states*
//! (the pair of a point and the step that reached it) rather than bare
//! points, so evaluators whose step cost depends on the previous step (turn
//! penalties) stay exact. Ties are broken deterministically: lower
//! destination point id first, then lower path id.

use crate::model::order::{Route, Step, VehicleOrientation};
use crate::model::plant::Plant;
use crate::model::types::{PathId, PointId, RouteCost};
use crate::model::vehicle::Vehicle;
use crate::routing::evaluator::RouteEvaluator;

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// How the search arrived at a point: over which path, in which direction.
/// `via == None` marks the source state.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub(crate) struct ArrivalKey {
    point: PointId,
    via: Option<(PathId, VehicleOrientation)>,
}

#[derive(Debug, Clone, Copy)]
struct Record {
    cost: RouteCost,
    pred: Option<ArrivalKey>,
}

struct QueueItem {
    cost: RouteCost,
    point: u32,
    path: u32,
    reverse: bool,
    key: ArrivalKey,
}

impl QueueItem {
    fn sort_key(&self) -> (RouteCost, u32, u32, bool) {
        (self.cost, self.point, self.path, self.reverse)
    }
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // inverted so the max-heap pops the smallest item first
        other.sort_key().cmp(&self.sort_key())
    }
}

/// All passable steps leaving `point` for the given vehicle: outgoing paths
/// travelled forward, incoming paths travelled in reverse. A path is
/// impassable when it is locked, forbidden for the vehicle, or has zero
/// maximum velocity in the required direction.
fn passable_steps(
    plant: &Plant,
    vehicle: &Vehicle,
    point: PointId,
) -> Vec<(PathId, VehicleOrientation, PointId)> {
    let mut steps = Vec::new();
    let entry = match plant.point(point) {
        Ok(p) => p,
        Err(_) => return steps,
    };
    for path_id in entry.outgoing_paths() {
        if vehicle.forbidden_paths().contains(path_id) {
            continue;
        }
        if let Ok(path) = plant.path(*path_id) {
            if !path.is_locked() && path.max_velocity() > 0 {
                steps.push((*path_id, VehicleOrientation::Forward, path.destination()));
            }
        }
    }
    for path_id in entry.incoming_paths() {
        if vehicle.forbidden_paths().contains(path_id) {
            continue;
        }
        if let Ok(path) = plant.path(*path_id) {
            if !path.is_locked() && path.max_reverse_velocity() > 0 {
                steps.push((*path_id, VehicleOrientation::Reverse, path.source()));
            }
        }
    }
    steps
}

/// Reconstruct the step described by an arrival state.
fn arrival_step(plant: &Plant, key: &ArrivalKey) -> Option<Step> {
    let (path_id, orientation) = key.via?;
    let path = plant.path(path_id).ok()?;
    let source = match orientation {
        VehicleOrientation::Forward => path.source(),
        VehicleOrientation::Reverse => path.destination(),
    };
    Some(Step { path: path_id, source, destination: key.point, orientation, index: 0 })
}

/// Single-source shortest path result for one vehicle from one point.
pub(crate) struct SearchTree {
    source: PointId,
    records: HashMap<ArrivalKey, Record>,
    best: HashMap<PointId, ArrivalKey>,
}

impl SearchTree {
    /// Run the search. Costs come from `evaluator`; passability respects
    /// path locks, per-direction velocities, and the vehicle's forbidden
    /// paths.
    pub(crate) fn build(
        plant: &Plant,
        vehicle: &Vehicle,
        evaluator: &dyn RouteEvaluator,
        source: PointId,
    ) -> Self {
        let mut records: HashMap<ArrivalKey, Record> = HashMap::new();
        let mut best: HashMap<PointId, ArrivalKey> = HashMap::new();
        let mut heap: BinaryHeap<QueueItem> = BinaryHeap::new();

        let start = ArrivalKey { point: source, via: None };
        records.insert(start, Record { cost: 0, pred: None });
        heap.push(QueueItem {
            cost: 0,
            point: source.index() as u32,
            path: u32::MAX,
            reverse: false,
            key: start,
        });

        while let Some(item) = heap.pop() {
            let key = item.key;
            match records.get(&key) {
                Some(record) if record.cost == item.cost => {}
                _ => continue, // stale queue entry
            }
            best.entry(key.point).or_insert(key);

            let prev_step = arrival_step(plant, &key);
            for (path_id, orientation, next_point) in passable_steps(plant, vehicle, key.point) {
                let step = Step {
                    path: path_id,
                    source: key.point,
                    destination: next_point,
                    orientation,
                    index: 0,
                };
                let step_cost = evaluator.step_cost(plant, prev_step.as_ref(), &step);
                let next_cost = item.cost.saturating_add(step_cost);
                let next_key = ArrivalKey { point: next_point, via: Some((path_id, orientation)) };
                let improves =
                    records.get(&next_key).map(|r| next_cost < r.cost).unwrap_or(true);
                if improves {
                    records.insert(next_key, Record { cost: next_cost, pred: Some(key) });
                    heap.push(QueueItem {
                        cost: next_cost,
                        point: next_point.index() as u32,
                        path: path_id.index() as u32,
                        reverse: orientation == VehicleOrientation::Reverse,
                        key: next_key,
                    });
                }
            }
        }

        Self { source, records, best }
    }

    /// Cost to reach `destination`, if it is reachable at all.
    pub(crate) fn cost_to(&self, destination: PointId) -> Option<RouteCost> {
        let key = self.best.get(&destination)?;
        self.records.get(key).map(|r| r.cost)
    }

    /// Materialise the best route to `destination`. Routing to the source
    /// itself yields the zero-cost, zero-step route.
    pub(crate) fn route_to(&self, plant: &Plant, destination: PointId) -> Option<Route> {
        if destination == self.source {
            return Some(Route::default());
        }
        let mut key = *self.best.get(&destination)?;
        let cost = self.records.get(&key)?.cost;
        let mut steps: Vec<Step> = Vec::new();
        while key.via.is_some() {
            steps.push(arrival_step(plant, &key)?);
            key = self.records.get(&key)?.pred?;
        }
        steps.reverse();
        for (index, step) in steps.iter_mut().enumerate() {
            step.index = index;
        }
        Some(Route::new(steps, cost))
    }
}
