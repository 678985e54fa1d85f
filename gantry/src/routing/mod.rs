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

//! # Router
//!
//! The router computes least-cost routes for vehicles between points of the
//! plant, using whichever [`RouteEvaluator`] it was constructed with. It
//! maintains per-vehicle cost tables (rebuilt on entry to operating mode
//! and after every topology edit), attaches concrete routes to the drive
//! orders of a transport order, answers routability queries, and tracks the
//! routes currently selected for each vehicle; the aggregate of those
//! selected routes is what the recharge and parking strategies consult as
//! "targeted points".

pub mod evaluator;
mod table;

pub use evaluator::{
    CompositeEvaluator, DistanceEvaluator, ExplicitPenaltyEvaluator, RouteEvaluator,
    TurnPenaltyEvaluator,
};

use crate::model::order::{Destination, DestinationRef, DriveOrder, Route, TransportOrder, OP_NOP};
use crate::model::plant::Plant;
use crate::model::types::{ModelError, PointId, RouteCost, VehicleId, COST_INFINITY};
use table::SearchTree;

use log::*;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Routing errors
#[derive(Error, Debug, PartialEq)]
pub enum RoutingError {
    /// No passable route connects the two endpoints for this vehicle
    #[error("No route found for vehicle {vehicle}: {from} -> {to}")]
    NoRouteFound {
        /// Name of the vehicle the route was computed for
        vehicle: String,
        /// Name of the start point
        from: String,
        /// Name of the destination point or location
        to: String,
    },
    /// The vehicle's position is unknown, so no route can start
    #[error("Vehicle {0} has no known position")]
    VehicleUnpositioned(String),
    /// No routing table exists for the vehicle; `update_routing_tables` has
    /// not been called since it was added
    #[error("No routing table for vehicle {0}")]
    NoRoutingTable(String),
    /// Route evaluators must produce non-negative costs
    #[error("A route evaluator cost must not be negative: {0}")]
    NegativeCost(i64),
    /// The destination offers no link permitting the requested operation
    #[error("No link of location {location} permits operation {operation}")]
    OperationNotOffered {
        /// Name of the location
        location: String,
        /// The operation that was requested
        operation: String,
    },
    /// Error propagated from the plant model
    #[error("Plant model error: {0}")]
    Model(#[from] ModelError),
}

/// # Router
///
/// Per-vehicle shortest-path tables over the plant topology, plus the
/// registry of currently selected routes.
pub struct Router {
    evaluator: Box<dyn RouteEvaluator>,
    tables: HashMap<VehicleId, HashMap<PointId, SearchTree>>,
    selected_routes: HashMap<VehicleId, Vec<DriveOrder>>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("vehicles", &self.tables.len())
            .field("selected_routes", &self.selected_routes.len())
            .finish()
    }
}

impl Router {
    /// Create a router using the given cost function.
    pub fn new(evaluator: Box<dyn RouteEvaluator>) -> Self {
        Self { evaluator, tables: HashMap::new(), selected_routes: HashMap::new() }
    }

    /// Rebuild the per-vehicle cost tables from the current topology. Must
    /// be called on entry to operating mode and after any topology edit.
    /// Rebuilding over an unchanged topology yields identical tables.
    pub fn update_routing_tables(&mut self, plant: &Plant) {
        self.tables.clear();
        for vehicle in plant.vehicles() {
            let mut trees: HashMap<PointId, SearchTree> = HashMap::new();
            for point in plant.points() {
                trees.insert(
                    point.id(),
                    SearchTree::build(plant, vehicle, self.evaluator.as_ref(), point.id()),
                );
            }
            self.tables.insert(vehicle.id(), trees);
        }
        debug!(
            "Routing tables rebuilt for {} vehicles over {} points",
            self.tables.len(),
            plant.points().count()
        );
    }

    fn tree(&self, vehicle: VehicleId, source: PointId) -> Option<&SearchTree> {
        self.tables.get(&vehicle).and_then(|trees| trees.get(&source))
    }

    /// Aggregate cost of the cheapest route between two points for the
    /// given vehicle, or [`COST_INFINITY`] when no route exists.
    pub fn costs(&self, vehicle: VehicleId, source: PointId, destination: PointId) -> RouteCost {
        self.tree(vehicle, source)
            .and_then(|tree| tree.cost_to(destination))
            .unwrap_or(COST_INFINITY)
    }

    /// The cheapest route between two points for the given vehicle, or
    /// `None` when no route exists. Identical endpoints yield the
    /// zero-cost, zero-step route.
    pub fn route_between(
        &self,
        plant: &Plant,
        vehicle: VehicleId,
        source: PointId,
        destination: PointId,
    ) -> Option<Route> {
        self.tree(vehicle, source).and_then(|tree| tree.route_to(plant, destination))
    }

    /// The access points a destination resolves to: the point itself, or
    /// every link point of the location that permits the operation.
    fn destination_points(
        plant: &Plant,
        destination: &Destination,
    ) -> Result<Vec<PointId>, RoutingError> {
        match &destination.target {
            DestinationRef::Point(point) => {
                plant.point(*point)?;
                Ok(vec![*point])
            }
            DestinationRef::Location(location_id) => {
                let location = plant.location(*location_id)?;
                let location_type = plant.location_type(location.type_id())?;
                let operation = destination.operation.as_str();
                if operation != OP_NOP && !location_type.allows_operation(operation) {
                    return Err(RoutingError::OperationNotOffered {
                        location: location.name().to_string(),
                        operation: operation.to_string(),
                    });
                }
                let points: Vec<PointId> = location
                    .links()
                    .iter()
                    .filter(|link| operation == OP_NOP || link.permits(operation))
                    .map(|link| link.point)
                    .collect();
                if points.is_empty() {
                    return Err(RoutingError::OperationNotOffered {
                        location: location.name().to_string(),
                        operation: operation.to_string(),
                    });
                }
                Ok(points)
            }
        }
    }

    fn destination_name(plant: &Plant, destination: &Destination) -> String {
        match &destination.target {
            DestinationRef::Point(p) => {
                plant.point(*p).map(|p| p.name().to_string()).unwrap_or_else(|_| format!("{:?}", p))
            }
            DestinationRef::Location(l) => plant
                .location(*l)
                .map(|l| l.name().to_string())
                .unwrap_or_else(|_| format!("{:?}", l)),
        }
    }

    /// Attach a concrete route to each drive order of `order`, starting at
    /// `source`. Each leg resolves to the cheapest reachable access point of
    /// its destination; ties go to the lower point id. Fails with
    /// [`RoutingError::NoRouteFound`] when any leg is unreachable.
    pub fn route_order(
        &self,
        plant: &Plant,
        vehicle: VehicleId,
        source: PointId,
        order: &TransportOrder,
    ) -> Result<Vec<DriveOrder>, RoutingError> {
        let vehicle_name = plant.vehicle(vehicle)?.name().to_string();
        if self.tables.get(&vehicle).is_none() {
            return Err(RoutingError::NoRoutingTable(vehicle_name));
        }
        let mut current = source;
        let mut routed: Vec<DriveOrder> = Vec::with_capacity(order.drive_orders().len());
        for drive_order in order.drive_orders() {
            let tree = self
                .tree(vehicle, current)
                .ok_or_else(|| RoutingError::NoRoutingTable(vehicle_name.clone()))?;
            let candidates = Self::destination_points(plant, drive_order.destination())?;
            let best = candidates
                .iter()
                .filter_map(|point| tree.cost_to(*point).map(|cost| (cost, *point)))
                .min_by_key(|(cost, point)| (*cost, point.index()));
            let (_, point) = best.ok_or_else(|| RoutingError::NoRouteFound {
                vehicle: vehicle_name.clone(),
                from: plant.point(current).map(|p| p.name().to_string()).unwrap_or_default(),
                to: Self::destination_name(plant, drive_order.destination()),
            })?;
            let route = tree
                .route_to(plant, point)
                .expect("destination was reported reachable by the same tree");
            let mut leg = drive_order.clone();
            leg.set_route(Some(route));
            routed.push(leg);
            current = point;
        }
        Ok(routed)
    }

    /// Which vehicles can reach every destination of `order`, in sequence,
    /// from their current positions.
    pub fn check_routability(&self, plant: &Plant, order: &TransportOrder) -> BTreeSet<VehicleId> {
        let mut routable = BTreeSet::new();
        for vehicle in plant.vehicles() {
            let position = match vehicle.position() {
                Some(p) => p,
                None => continue,
            };
            if self.route_order(plant, vehicle.id(), position, order).is_ok() {
                routable.insert(vehicle.id());
            }
        }
        routable
    }

    /// Record the route currently chosen for a vehicle, or clear it with
    /// `None`.
    pub fn select_route(&mut self, vehicle: VehicleId, drive_orders: Option<Vec<DriveOrder>>) {
        match drive_orders {
            Some(orders) => {
                self.selected_routes.insert(vehicle, orders);
            }
            None => {
                self.selected_routes.remove(&vehicle);
            }
        }
    }

    /// The currently selected route of every processing vehicle.
    pub fn selected_routes(&self) -> &HashMap<VehicleId, Vec<DriveOrder>> {
        &self.selected_routes
    }

    /// Every point that appears in some vehicle's currently selected route.
    pub fn targeted_points(&self) -> BTreeSet<PointId> {
        let mut points = BTreeSet::new();
        for drive_orders in self.selected_routes.values() {
            for drive_order in drive_orders {
                if let Some(route) = drive_order.route() {
                    for step in route.steps() {
                        points.insert(step.source);
                        points.insert(step.destination);
                    }
                }
            }
        }
        points
    }
}
