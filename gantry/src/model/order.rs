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

//! Module defining transport orders, drive orders, and routes.

use crate::model::types::{LocationId, OrderId, PathId, PointId, VehicleId};
use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

/// The no-op operation: the vehicle merely visits the destination.
pub const OP_NOP: &str = "NOP";

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Direction a path is traversed in relative to its definition.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub enum VehicleOrientation {
    /// Travelling from the path's source to its destination.
    Forward,
    /// Travelling against the path's direction.
    Reverse,
}

/// One movement along a single path, ending on a point.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// The path to travel.
    pub path: PathId,
    /// The point the step starts at.
    pub source: PointId,
    /// The point the step ends at.
    pub destination: PointId,
    /// Direction the path is traversed in.
    pub orientation: VehicleOrientation,
    /// Position of this step within its route, starting at zero.
    pub index: usize,
}

/// The routed realisation of a drive order: an ordered sequence of connected
/// steps. A route between identical endpoints has no steps and zero cost.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Route {
    steps: Vec<Step>,
    cost: u64,
}

impl Route {
    /// Create a route from connected steps and the aggregate cost computed
    /// for them.
    pub fn new(steps: Vec<Step>, cost: u64) -> Self {
        Self { steps, cost }
    }

    /// The steps of the route, in travel order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Aggregate cost of the route.
    pub fn cost(&self) -> u64 {
        self.cost
    }

    /// The point the route ends at, if it has any steps.
    pub fn final_destination(&self) -> Option<PointId> {
        self.steps.last().map(|s| s.destination)
    }

    /// True if adjacent steps are connected: each step starts where its
    /// predecessor ended.
    pub fn is_connected(&self) -> bool {
        self.steps.windows(2).all(|w| w[0].destination == w[1].source)
    }
}

/// Where a drive order is headed: a plain point or a location operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DestinationRef {
    /// Visit a point.
    Point(PointId),
    /// Visit a location through one of its links.
    Location(LocationId),
}

/// The destination leg of a drive order, optionally with an operation to be
/// performed on arrival.
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    /// The target of the leg.
    pub target: DestinationRef,
    /// The operation to perform on arrival; [`OP_NOP`] for none.
    pub operation: String,
    /// Free-form properties forwarded to the vehicle adapter.
    pub properties: BTreeMap<String, String>,
}

impl Destination {
    /// A destination that merely visits a point.
    pub fn point(point: PointId) -> Self {
        Self {
            target: DestinationRef::Point(point),
            operation: OP_NOP.to_string(),
            properties: BTreeMap::new(),
        }
    }

    /// A destination performing `operation` at a location.
    pub fn location(location: LocationId, operation: impl Into<String>) -> Self {
        Self {
            target: DestinationRef::Location(location),
            operation: operation.into(),
            properties: BTreeMap::new(),
        }
    }

    /// True if no operation is to be performed on arrival.
    pub fn is_nop(&self) -> bool {
        self.operation == OP_NOP
    }
}

/// Execution state of a drive order.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum DriveOrderState {
    /// Not yet started.
    Pristine,
    /// The vehicle is moving along the route.
    Travelling,
    /// The vehicle has arrived and is performing the destination operation.
    Operating,
    /// Movement and operation are complete.
    Finished,
    /// Execution failed.
    Failed,
}

/// One destination leg of a transport order, together with its route once
/// the router has attached one.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveOrder {
    destination: Destination,
    route: Option<Route>,
    state: DriveOrderState,
}

impl DriveOrder {
    /// Create a pristine drive order for the given destination.
    pub fn new(destination: Destination) -> Self {
        Self { destination, route: None, state: DriveOrderState::Pristine }
    }

    /// The destination of this leg.
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// The attached route, if the order has been routed.
    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// Execution state of this leg.
    pub fn state(&self) -> DriveOrderState {
        self.state
    }

    pub(crate) fn set_route(&mut self, route: Option<Route>) {
        self.route = route;
    }

    pub(crate) fn set_state(&mut self, state: DriveOrderState) {
        self.state = state;
    }
}

/// Lifecycle state of a transport order. Transitions are monotonic; the
/// three right-most states are terminal.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum OrderState {
    /// Just created; dependencies may still be unresolved.
    Raw,
    /// Dispatchable: all dependencies are in a terminal state.
    Active,
    /// Assigned to a vehicle and being executed.
    BeingProcessed,
    /// All drive orders finished successfully.
    Finished,
    /// Execution failed.
    Failed,
    /// Aborted on user request.
    Withdrawn,
}

impl OrderState {
    /// True if the state is final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Withdrawn)
    }

    /// True if the state machine permits moving from `self` to `to`.
    pub fn may_transition_to(&self, to: OrderState) -> bool {
        match (self, to) {
            (a, b) if *a == b => true,
            (Self::Raw, Self::Active) => true,
            (Self::Raw, Self::Failed) | (Self::Raw, Self::Withdrawn) => true,
            (Self::Active, Self::BeingProcessed) => true,
            (Self::Active, Self::Failed) | (Self::Active, Self::Withdrawn) => true,
            (Self::BeingProcessed, Self::Finished) => true,
            (Self::BeingProcessed, Self::Failed) | (Self::BeingProcessed, Self::Withdrawn) => true,
            _ => false,
        }
    }
}

/// An ordered, non-empty sequence of drive orders to be executed by one
/// vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportOrder {
    name: String,
    id: OrderId,
    drive_orders: Vec<DriveOrder>,
    current_drive_order: Option<usize>,
    intended_vehicle: Option<VehicleId>,
    processing_vehicle: Option<VehicleId>,
    state: OrderState,
    deadline: u64,
    created: u64,
    finished: Option<u64>,
    dependencies: BTreeSet<OrderId>,
    wrapping_sequence: Option<OrderId>,
    withdrawal_requested: bool,
    auto_generated: bool,
}

impl TransportOrder {
    pub(crate) fn new(
        name: String,
        id: OrderId,
        destinations: Vec<Destination>,
        deadline: u64,
    ) -> Self {
        let drive_orders = destinations.into_iter().map(DriveOrder::new).collect();
        Self {
            name,
            id,
            drive_orders,
            current_drive_order: None,
            intended_vehicle: None,
            processing_vehicle: None,
            state: OrderState::Raw,
            deadline,
            created: now_millis(),
            finished: None,
            dependencies: BTreeSet::new(),
            wrapping_sequence: None,
            withdrawal_requested: false,
            auto_generated: false,
        }
    }

    /// Return the id of the transport order.
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Return the name of the transport order.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The drive orders of this transport order, in execution order.
    pub fn drive_orders(&self) -> &[DriveOrder] {
        &self.drive_orders
    }

    /// Index of the drive order currently being executed, if any.
    pub fn current_drive_order(&self) -> Option<usize> {
        self.current_drive_order
    }

    /// The vehicle this order should preferably be assigned to.
    pub fn intended_vehicle(&self) -> Option<VehicleId> {
        self.intended_vehicle
    }

    /// The vehicle currently processing this order, if any.
    pub fn processing_vehicle(&self) -> Option<VehicleId> {
        self.processing_vehicle
    }

    /// Lifecycle state of the order.
    pub fn state(&self) -> OrderState {
        self.state
    }

    /// Deadline in milliseconds since the epoch.
    pub fn deadline(&self) -> u64 {
        self.deadline
    }

    /// Creation time in milliseconds since the epoch.
    pub fn created(&self) -> u64 {
        self.created
    }

    /// Time the order reached a terminal state, if it has.
    pub fn finished(&self) -> Option<u64> {
        self.finished
    }

    /// Orders that must reach a terminal state before this one becomes
    /// dispatchable.
    pub fn dependencies(&self) -> &BTreeSet<OrderId> {
        &self.dependencies
    }

    /// The successor in the wrapping order sequence, if this order belongs
    /// to one.
    pub fn wrapping_sequence(&self) -> Option<OrderId> {
        self.wrapping_sequence
    }

    /// True if a withdrawal has been requested but not yet carried out.
    pub fn withdrawal_requested(&self) -> bool {
        self.withdrawal_requested
    }

    /// True if the dispatcher created this order itself (recharge/parking).
    pub fn is_auto_generated(&self) -> bool {
        self.auto_generated
    }

    /// True if every drive order has finished.
    pub fn all_drive_orders_finished(&self) -> bool {
        self.drive_orders.iter().all(|d| d.state() == DriveOrderState::Finished)
    }

    /// True if the first destination requests the given vehicle's recharge
    /// operation.
    pub fn is_recharge_order(&self, recharge_operation: &str) -> bool {
        self.drive_orders.first().map(|d| d.destination().operation == recharge_operation).unwrap_or(false)
    }

    pub(crate) fn set_intended_vehicle(&mut self, vehicle: Option<VehicleId>) {
        self.intended_vehicle = vehicle;
    }

    pub(crate) fn set_processing_vehicle(&mut self, vehicle: Option<VehicleId>) {
        self.processing_vehicle = vehicle;
    }

    pub(crate) fn set_state(&mut self, state: OrderState) {
        self.state = state;
        if state.is_terminal() && self.finished.is_none() {
            self.finished = Some(now_millis());
        }
    }

    pub(crate) fn set_current_drive_order(&mut self, index: Option<usize>) {
        self.current_drive_order = index;
    }

    pub(crate) fn set_dependencies(&mut self, dependencies: BTreeSet<OrderId>) {
        self.dependencies = dependencies;
    }

    pub(crate) fn set_wrapping_sequence(&mut self, successor: Option<OrderId>) {
        self.wrapping_sequence = successor;
    }

    pub(crate) fn request_withdrawal(&mut self) {
        self.withdrawal_requested = true;
    }

    pub(crate) fn set_auto_generated(&mut self, auto: bool) {
        self.auto_generated = auto;
    }

    pub(crate) fn drive_order_mut(&mut self, index: usize) -> Option<&mut DriveOrder> {
        self.drive_orders.get_mut(index)
    }
}
