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

//! # Dispatcher
//!
//! The dispatcher keeps every vehicle either usefully working, recharging,
//! or parking. It runs on a single worker thread fed by one message queue:
//! vehicle adapters post state reports, the scheduler posts deferred
//! allocation grants, and the kernel posts order changes and the shutdown
//! signal. Between messages the dispatcher runs full `dispatch()` passes:
//! garbage collection of archived orders, withdrawals, order completion,
//! assignment of available orders to available vehicles, and the creation
//! of recharge and parking orders for idle vehicles.
//!
//! Movement follows a strict allocate-before-release discipline: before a
//! vehicle is commanded onto its next step, the block-expanded resources of
//! that step are claimed; only after the vehicle reports arrival is
//! everything behind it released. A conflicting claim queues in the
//! scheduler, and the vehicle simply waits between steps until the grant
//! arrives.

pub mod adapter;

pub use adapter::{
    AdapterHandle, LoopbackAdapter, MovementCommand, VehicleAdapter, VehicleReport,
};

use crate::allocate::{Grant, Scheduler};
use crate::hub::EventHub;
use crate::model::event::{Event, MessageLevel};
use crate::model::order::{
    now_millis, DriveOrderState, OrderState, Route, Step, VehicleOrientation,
};
use crate::model::plant::Plant;
use crate::model::printer;
use crate::model::types::{OrderId, PointId, ResourceRef, VehicleId};
use crate::model::vehicle::{ProcState, VehicleState};
use crate::routing::Router;
use crate::Stopper;

use itertools::Itertools;
use log::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Message driving the dispatcher worker.
#[derive(Debug)]
pub enum DispatcherMessage {
    /// A vehicle adapter posted a state report.
    Report {
        /// The reporting vehicle
        vehicle: VehicleId,
        /// The report itself
        report: VehicleReport,
    },
    /// The scheduler granted a previously queued allocation request.
    Granted(Grant),
    /// Transport orders were created or edited; run a dispatch pass.
    OrdersChanged,
    /// Stop the worker loop.
    Shutdown,
}

/// Tunables of the dispatcher, passed in at construction instead of being
/// read from any global store.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How long terminal transport orders are retained before garbage
    /// collection, in milliseconds.
    pub archive_horizon_ms: u64,
    /// Whether idle vehicles are sent to parking positions.
    pub parking_enabled: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { archive_horizon_ms: 3_600_000, parking_enabled: true }
    }
}

/// # Dispatcher struct
///
/// Matches transport orders to vehicles and drives each order through its
/// lifecycle. All mutable state lives in the shared plant, the router's
/// selected-route registry, and the scheduler's allocation table; the
/// dispatcher itself only holds references plus the adapter registry.
pub struct Dispatcher {
    plant: Arc<RwLock<Plant>>,
    router: Arc<RwLock<Router>>,
    scheduler: Arc<Scheduler>,
    hub: Arc<EventHub>,
    adapters: Mutex<HashMap<VehicleId, Arc<dyn VehicleAdapter>>>,
    recharge_strategy: crate::strategy::RechargeStrategy,
    parking_strategy: crate::strategy::ParkingStrategy,
    config: DispatcherConfig,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("config", &self.config).finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher over the shared kernel state.
    pub fn new(
        plant: Arc<RwLock<Plant>>,
        router: Arc<RwLock<Router>>,
        scheduler: Arc<Scheduler>,
        hub: Arc<EventHub>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            plant,
            router,
            scheduler,
            hub,
            adapters: Mutex::new(HashMap::new()),
            recharge_strategy: crate::strategy::RechargeStrategy::new(),
            parking_strategy: crate::strategy::ParkingStrategy::new(),
            config,
        }
    }

    /// Attach a communication adapter for a vehicle. Commands for vehicles
    /// without an adapter are dropped with a warning.
    pub fn register_adapter(&self, vehicle: VehicleId, adapter: Arc<dyn VehicleAdapter>) {
        self.adapters.lock().unwrap().insert(vehicle, adapter);
    }

    /// Detach the communication adapter of a vehicle.
    pub fn unregister_adapter(&self, vehicle: VehicleId) {
        self.adapters.lock().unwrap().remove(&vehicle);
    }

    /// Worker loop: drain messages, run a dispatch pass, repeat until the
    /// stopper fires or a shutdown message arrives.
    pub fn run(&self, rx: &Receiver<DispatcherMessage>, stop: Stopper) {
        info!("Dispatcher worker started");
        loop {
            if stop.is_stop() {
                break;
            }
            let first = match rx.recv_timeout(Duration::from_millis(50)) {
                Ok(DispatcherMessage::Shutdown) => break,
                Ok(message) => Some(message),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            let mut shutdown = false;
            if let Some(message) = first {
                self.handle_message(message);
                while let Ok(message) = rx.try_recv() {
                    if matches!(message, DispatcherMessage::Shutdown) {
                        shutdown = true;
                        break;
                    }
                    self.handle_message(message);
                }
            }
            if shutdown {
                break;
            }
            self.dispatch();
        }
        info!("Dispatcher worker stopped");
    }

    /// Process a single message.
    pub fn handle_message(&self, message: DispatcherMessage) {
        match message {
            DispatcherMessage::Report { vehicle, report } => match report {
                VehicleReport::Position(point) => self.on_position(vehicle, point),
                VehicleReport::State(state) => self.on_state(vehicle, state),
                VehicleReport::Energy(level) => self.on_energy(vehicle, level),
                VehicleReport::OperationComplete => self.on_operation_complete(vehicle),
                VehicleReport::Error { kind, message } => {
                    self.on_vehicle_error(vehicle, &kind, &message)
                }
            },
            DispatcherMessage::Granted(grant) => self.on_grant(grant),
            DispatcherMessage::OrdersChanged => {}
            DispatcherMessage::Shutdown => {}
        }
    }

    // ------------------------------------------------------------------
    // The dispatch pass
    // ------------------------------------------------------------------

    /// One full dispatch pass. Atomic with respect to the vehicle state
    /// transitions it initiates: the pass holds the plant and router write
    /// locks throughout.
    pub fn dispatch(&self) {
        let mut plant = self.plant.write().unwrap();
        let mut router = self.router.write().unwrap();
        self.collect_garbage(&mut plant);
        self.process_withdrawals(&mut plant, &mut router);
        self.finish_completed(&mut plant, &mut router);
        self.activate_orders(&mut plant);
        self.assign_orders(&mut plant, &mut router);
        let mut created = self.create_recharge_orders(&mut plant, &router);
        created |= self.create_parking_orders(&mut plant, &router);
        if created {
            // synthetic orders are assigned within the same pass
            self.activate_orders(&mut plant);
            self.assign_orders(&mut plant, &mut router);
        }
    }

    /// Remove terminal transport orders older than the archival horizon,
    /// oldest first.
    fn collect_garbage(&self, plant: &mut Plant) {
        let now = now_millis();
        let victims: Vec<(u64, OrderId)> = plant
            .orders()
            .filter(|o| o.state().is_terminal())
            .filter_map(|o| o.finished().map(|f| (f, o.id())))
            .filter(|(f, _)| f.saturating_add(self.config.archive_horizon_ms) <= now)
            .sorted()
            .collect();
        for (_, id) in victims {
            if let Err(e) = plant.remove_order(id) {
                warn!("Garbage collection failed for {:?}: {}", id, e);
            }
        }
    }

    /// Carry out requested withdrawals. Unassigned orders are withdrawn
    /// directly; assigned orders are withdrawn at the next step boundary,
    /// or right away when their vehicle has no command in flight.
    fn process_withdrawals(&self, plant: &mut Plant, router: &mut Router) {
        let flagged: Vec<(OrderId, Option<VehicleId>)> = plant
            .orders()
            .filter(|o| o.withdrawal_requested() && !o.state().is_terminal())
            .map(|o| (o.id(), o.processing_vehicle()))
            .collect();
        for (order_id, processing_vehicle) in flagged {
            match processing_vehicle {
                None => {
                    if plant.modify_order(order_id, |o| o.set_state(OrderState::Withdrawn)).is_ok()
                    {
                        info!("Withdrew unassigned order {:?}", order_id);
                        self.propagate_sequence_withdrawal(plant, order_id);
                    }
                }
                Some(vehicle) => {
                    let in_flight = self.command_in_flight(plant, vehicle, order_id);
                    if !in_flight {
                        self.finalize_withdrawal(plant, router, vehicle, order_id);
                    }
                }
            }
        }
    }

    /// True while the vehicle is moving along a step or performing an
    /// operation; withdrawals wait for the next boundary.
    fn command_in_flight(&self, plant: &Plant, vehicle: VehicleId, order_id: OrderId) -> bool {
        let v = match plant.vehicle(vehicle) {
            Ok(v) => v,
            Err(_) => return false,
        };
        if v.next_position().is_some() {
            return true;
        }
        if let (Ok(order), Some(do_idx)) = (plant.order(order_id), v.current_drive_order()) {
            if let Some(drive) = order.drive_orders().get(do_idx) {
                return drive.state() == DriveOrderState::Operating;
            }
        }
        false
    }

    /// Safety net for orders whose vehicle has reported every step
    /// complete but whose bookkeeping did not finish inline.
    fn finish_completed(&self, plant: &mut Plant, router: &mut Router) {
        let complete: Vec<(OrderId, VehicleId)> = plant
            .orders()
            .filter(|o| o.state() == OrderState::BeingProcessed && o.all_drive_orders_finished())
            .filter_map(|o| o.processing_vehicle().map(|v| (o.id(), v)))
            .collect();
        for (order_id, vehicle) in complete {
            self.finish_order(plant, router, vehicle, order_id);
        }
    }

    /// Promote RAW orders whose dependencies have all reached a terminal
    /// state (or were already garbage collected).
    fn activate_orders(&self, plant: &mut Plant) {
        let ready: Vec<OrderId> = plant
            .orders()
            .filter(|o| o.state() == OrderState::Raw && !o.withdrawal_requested())
            .filter(|o| {
                o.dependencies().iter().all(|dep| {
                    plant.order(*dep).map(|d| d.state().is_terminal()).unwrap_or(true)
                })
            })
            .map(|o| o.id())
            .collect();
        for order_id in ready {
            if let Err(e) = plant.transition_order(order_id, OrderState::Active) {
                warn!("Could not activate {:?}: {}", order_id, e);
            }
        }
    }

    fn vehicle_can_take(
        vehicle: &crate::model::vehicle::Vehicle,
        order: &crate::model::order::TransportOrder,
    ) -> bool {
        vehicle.is_available_for_orders()
            && vehicle.position().is_some()
            && (!vehicle.is_energy_critical()
                || order.is_recharge_order(vehicle.recharge_operation()))
            && (!order.is_auto_generated() || order.intended_vehicle() == Some(vehicle.id()))
    }

    /// Assign available orders to available vehicles: for each order, the
    /// intended vehicle when it is among the candidates, otherwise the
    /// candidate with the lowest total route cost, ties broken by the lower
    /// vehicle id.
    fn assign_orders(&self, plant: &mut Plant, router: &mut Router) {
        let queue: Vec<(u64, OrderId)> = plant
            .orders()
            .filter(|o| {
                o.state() == OrderState::Active
                    && o.processing_vehicle().is_none()
                    && !o.withdrawal_requested()
            })
            .map(|o| (o.deadline(), o.id()))
            .sorted()
            .collect();

        for (_, order_id) in queue {
            let order = match plant.order(order_id) {
                Ok(o) if o.state() == OrderState::Active => o.clone(),
                _ => continue,
            };

            let mut candidates: Vec<(u64, VehicleId)> = Vec::new();
            for vehicle in plant.vehicles() {
                if !Self::vehicle_can_take(vehicle, &order) {
                    continue;
                }
                let position = match vehicle.position() {
                    Some(p) => p,
                    None => continue,
                };
                if let Ok(routed) = router.route_order(plant, vehicle.id(), position, &order) {
                    let cost = routed
                        .iter()
                        .filter_map(|d| d.route().map(Route::cost))
                        .fold(0u64, u64::saturating_add);
                    candidates.push((cost, vehicle.id()));
                }
            }

            if candidates.is_empty() {
                if !order.is_auto_generated() {
                    self.preempt_parking(plant);
                }
                continue;
            }

            let chosen = order
                .intended_vehicle()
                .filter(|intended| candidates.iter().any(|(_, v)| v == intended))
                .unwrap_or_else(|| {
                    candidates.iter().min_by_key(|(cost, v)| (*cost, *v)).map(|(_, v)| *v).unwrap()
                });
            self.assign_order(plant, router, chosen, order_id);
        }
    }

    /// Ask a vehicle that is merely driving to a parking position to give
    /// up its parking order, so a real order can be served next pass.
    fn preempt_parking(&self, plant: &mut Plant) {
        let parked: Option<OrderId> = plant
            .orders()
            .filter(|o| {
                o.state() == OrderState::BeingProcessed
                    && o.is_auto_generated()
                    && !o.withdrawal_requested()
                    && o.drive_orders().iter().all(|d| d.destination().is_nop())
            })
            .map(|o| o.id())
            .next();
        if let Some(order_id) = parked {
            debug!("Preempting parking order {:?} for real work", order_id);
            let _ = plant.modify_order(order_id, |o| o.request_withdrawal());
        }
    }

    /// Bind an order to a vehicle: route it, move it to BEING_PROCESSED,
    /// attach the routes, publish the selected route, and start the first
    /// drive order.
    fn assign_order(
        &self,
        plant: &mut Plant,
        router: &mut Router,
        vehicle: VehicleId,
        order_id: OrderId,
    ) {
        let position = match plant.vehicle(vehicle).ok().and_then(|v| v.position()) {
            Some(p) => p,
            None => return,
        };
        let _ = plant.modify_vehicle(vehicle, |v| v.set_proc_state(ProcState::AwaitingOrder));
        let order = match plant.order(order_id) {
            Ok(o) => o.clone(),
            Err(_) => return,
        };
        let routed = match router.route_order(plant, vehicle, position, &order) {
            Ok(routed) => routed,
            Err(e) => {
                // no route after all: the vehicle goes back to idle and the
                // order stays dispatchable
                debug!("Routing failed while assigning {:?}: {}", order_id, e);
                let _ = plant.modify_vehicle(vehicle, |v| v.set_proc_state(ProcState::Idle));
                return;
            }
        };
        let routes: Vec<Option<Route>> =
            routed.iter().map(|leg| leg.route().cloned()).collect();
        let _ = plant.modify_order(order_id, |o| {
            o.set_processing_vehicle(Some(vehicle));
            o.set_current_drive_order(Some(0));
            for (index, route) in routes.iter().enumerate() {
                if let Some(d) = o.drive_order_mut(index) {
                    d.set_route(route.clone());
                }
            }
            o.set_state(OrderState::BeingProcessed);
        });
        let _ = plant.modify_vehicle(vehicle, |v| {
            v.set_proc_state(ProcState::ProcessingOrder);
            v.set_transport_order(Some(order_id));
            v.set_current_drive_order(Some(0));
            v.set_current_step(None);
        });
        router.select_route(vehicle, Some(routed));
        if let (Ok(o), Ok(v)) = (plant.order(order_id), plant.vehicle(vehicle)) {
            info!("Assigned {} to {}", printer::order(plant, o).unwrap_or_default(), v.name());
        }
        self.start_drive_order(plant, router, vehicle, order_id, 0);
    }

    /// Create recharge orders for idle vehicles below the critical energy
    /// threshold. Returns true if any order was created.
    fn create_recharge_orders(&self, plant: &mut Plant, router: &Router) -> bool {
        let mut created = false;
        let needy: Vec<VehicleId> = plant
            .vehicles()
            .filter(|v| {
                v.is_available_for_orders() && v.position().is_some() && v.is_energy_critical()
            })
            .map(|v| v.id())
            .filter(|v| !self.has_pending_auto_order(plant, *v))
            .collect();
        for vehicle_id in needy {
            let vehicle = match plant.vehicle(vehicle_id) {
                Ok(v) => v.clone(),
                Err(_) => continue,
            };
            let location = match self.recharge_strategy.select_location(plant, router, &vehicle) {
                Some(l) => l,
                None => {
                    debug!("No free charging station for {}", vehicle.name());
                    continue;
                }
            };
            let name = plant.generate_order_name("Recharge");
            let destination = crate::model::order::Destination::location(
                location,
                vehicle.recharge_operation().to_string(),
            );
            match plant.create_order(name, vec![destination], now_millis() + 3_600_000) {
                Ok(order_id) => {
                    let _ = plant.modify_order(order_id, |o| {
                        o.set_intended_vehicle(Some(vehicle_id));
                        o.set_auto_generated(true);
                    });
                    info!("Created recharge order {:?} for {}", order_id, vehicle.name());
                    created = true;
                }
                Err(e) => warn!("Could not create recharge order: {}", e),
            }
        }
        created
    }

    /// Create parking orders for idle vehicles with nothing to do. Returns
    /// true if any order was created.
    fn create_parking_orders(&self, plant: &mut Plant, router: &Router) -> bool {
        if !self.config.parking_enabled {
            return false;
        }
        let mut created = false;
        let idle: Vec<VehicleId> = plant
            .vehicles()
            .filter(|v| {
                v.is_available_for_orders() && v.position().is_some() && !v.is_energy_critical()
            })
            .filter(|v| {
                // already parked?
                v.position()
                    .and_then(|p| plant.point(p).ok())
                    .map(|p| !p.is_parking_position())
                    .unwrap_or(false)
            })
            .map(|v| v.id())
            .filter(|v| !self.has_pending_auto_order(plant, *v))
            .collect();
        for vehicle_id in idle {
            let vehicle = match plant.vehicle(vehicle_id) {
                Ok(v) => v.clone(),
                Err(_) => continue,
            };
            let point = match self.parking_strategy.select_point(plant, router, &vehicle) {
                Some(p) => p,
                None => continue,
            };
            let name = plant.generate_order_name("Park");
            let destination = crate::model::order::Destination::point(point);
            match plant.create_order(name, vec![destination], now_millis() + 3_600_000) {
                Ok(order_id) => {
                    let _ = plant.modify_order(order_id, |o| {
                        o.set_intended_vehicle(Some(vehicle_id));
                        o.set_auto_generated(true);
                    });
                    info!("Created parking order {:?} for {}", order_id, vehicle.name());
                    created = true;
                }
                Err(e) => warn!("Could not create parking order: {}", e),
            }
        }
        created
    }

    fn has_pending_auto_order(&self, plant: &Plant, vehicle: VehicleId) -> bool {
        plant.orders().any(|o| {
            !o.state().is_terminal()
                && o.is_auto_generated()
                && o.intended_vehicle() == Some(vehicle)
        })
    }

    // ------------------------------------------------------------------
    // Per-step progression
    // ------------------------------------------------------------------

    fn step_resources(&self, step: &Step) -> BTreeSet<ResourceRef> {
        let mut resources = BTreeSet::new();
        resources.insert(ResourceRef::Path(step.path));
        resources.insert(ResourceRef::Point(step.destination));
        self.scheduler.expand(&resources)
    }

    fn step_passable(
        plant: &Plant,
        vehicle: &crate::model::vehicle::Vehicle,
        step: &Step,
    ) -> bool {
        if vehicle.forbidden_paths().contains(&step.path) {
            return false;
        }
        match plant.path(step.path) {
            Ok(path) => {
                !path.is_locked()
                    && match step.orientation {
                        VehicleOrientation::Forward => path.max_velocity() > 0,
                        VehicleOrientation::Reverse => path.max_reverse_velocity() > 0,
                    }
            }
            Err(_) => false,
        }
    }

    /// The route a drive order should travel: the one attached at
    /// assignment if it is still passable, or a fresh one when a path was
    /// locked in the meantime. Returns `None` when no passable route exists
    /// any more.
    fn ensure_route(
        &self,
        plant: &mut Plant,
        router: &Router,
        vehicle: VehicleId,
        order_id: OrderId,
        do_idx: usize,
    ) -> Option<Route> {
        let v = plant.vehicle(vehicle).ok()?.clone();
        let route = plant.order(order_id).ok()?.drive_orders().get(do_idx)?.route()?.clone();
        if route.steps().iter().all(|s| Self::step_passable(plant, &v, s)) {
            return Some(route);
        }
        let destination = route.final_destination()?;
        let position = v.position()?;
        let replanned = router.route_between(plant, vehicle, position, destination)?;
        if !replanned.steps().iter().all(|s| Self::step_passable(plant, &v, s)) {
            return None;
        }
        debug!("Re-planned route for {:?} after topology change", vehicle);
        let replacement = replanned.clone();
        let _ = plant.modify_order(order_id, |o| {
            if let Some(d) = o.drive_order_mut(do_idx) {
                d.set_route(Some(replacement));
            }
        });
        Some(replanned)
    }

    /// Begin executing a drive order: allocate the first step and command
    /// the vehicle, or go straight to the operating phase when the vehicle
    /// is already standing at the destination.
    fn start_drive_order(
        &self,
        plant: &mut Plant,
        router: &mut Router,
        vehicle: VehicleId,
        order_id: OrderId,
        do_idx: usize,
    ) {
        let route = match self.ensure_route(plant, router, vehicle, order_id, do_idx) {
            Some(route) => route,
            None => {
                self.fail_current_order(plant, router, vehicle, "no passable route remains");
                return;
            }
        };
        if route.steps().is_empty() {
            let destination = match plant.order(order_id) {
                Ok(o) => match o.drive_orders().get(do_idx) {
                    Some(d) => d.destination().clone(),
                    None => return,
                },
                Err(_) => return,
            };
            if destination.is_nop() {
                self.finish_drive_order(plant, router, vehicle, order_id, do_idx);
            } else {
                self.begin_operation(plant, vehicle, order_id, do_idx, destination.operation);
            }
            return;
        }
        let first = route.steps()[0].clone();
        let _ = plant.modify_order(order_id, |o| {
            if let Some(d) = o.drive_order_mut(do_idx) {
                if d.state() == DriveOrderState::Pristine {
                    d.set_state(DriveOrderState::Travelling);
                }
            }
        });
        let _ = plant.modify_vehicle(vehicle, |v| {
            v.set_current_step(Some(0));
            v.set_state(VehicleState::Executing);
        });
        self.request_step(plant, vehicle, order_id, do_idx, first);
    }

    /// Claim the resources of a step. On an immediate grant the vehicle is
    /// commanded right away; otherwise it waits for the deferred grant.
    fn request_step(
        &self,
        plant: &mut Plant,
        vehicle: VehicleId,
        order_id: OrderId,
        do_idx: usize,
        step: Step,
    ) {
        let resources = self.step_resources(&step);
        if self.scheduler.allocate(vehicle, &resources) {
            self.begin_step(plant, vehicle, order_id, do_idx, step, resources);
        } else {
            debug!("Vehicle {:?} waits for resources of step {}", vehicle, step.index);
        }
    }

    /// The step's resources are ours; command the movement.
    fn begin_step(
        &self,
        plant: &mut Plant,
        vehicle: VehicleId,
        order_id: OrderId,
        do_idx: usize,
        step: Step,
        resources: BTreeSet<ResourceRef>,
    ) {
        let _ = plant.modify_vehicle(vehicle, |v| {
            v.push_allocated_resources(resources);
            v.set_next_position(Some(step.destination));
        });
        self.hub.process_event(&Event::SchedulerChanged(vehicle));
        self.send_to_adapter(
            vehicle,
            MovementCommand { order: order_id, drive_order_index: do_idx, step: Some(step), operation: None },
        );
    }

    /// Command the destination operation of a drive order.
    fn begin_operation(
        &self,
        plant: &mut Plant,
        vehicle: VehicleId,
        order_id: OrderId,
        do_idx: usize,
        operation: String,
    ) {
        let recharge = plant
            .vehicle(vehicle)
            .map(|v| v.recharge_operation() == operation)
            .unwrap_or(false);
        let _ = plant.modify_order(order_id, |o| {
            if let Some(d) = o.drive_order_mut(do_idx) {
                d.set_state(DriveOrderState::Operating);
            }
        });
        let _ = plant.modify_vehicle(vehicle, |v| {
            v.set_state(if recharge { VehicleState::Charging } else { VehicleState::Executing });
        });
        self.send_to_adapter(
            vehicle,
            MovementCommand {
                order: order_id,
                drive_order_index: do_idx,
                step: None,
                operation: Some(operation),
            },
        );
    }

    /// Release everything behind the vehicle: every allocated set before
    /// the most recent one containing the vehicle's position.
    fn free_behind(&self, plant: &mut Plant, vehicle: VehicleId, position: PointId) {
        let sets: Vec<BTreeSet<ResourceRef>> = match plant.vehicle(vehicle) {
            Ok(v) => v.allocated_resources().to_vec(),
            Err(_) => return,
        };
        let keep_from = match sets
            .iter()
            .rposition(|s| s.contains(&ResourceRef::Point(position)))
        {
            Some(index) => index,
            None => return,
        };
        let kept: Vec<BTreeSet<ResourceRef>> = sets[keep_from..].to_vec();
        let kept_union: BTreeSet<ResourceRef> = kept.iter().flatten().copied().collect();
        let release: BTreeSet<ResourceRef> = sets[..keep_from]
            .iter()
            .flatten()
            .copied()
            .filter(|r| !kept_union.contains(r))
            .collect();
        let _ = plant.modify_vehicle(vehicle, |v| {
            v.clear_allocated_resources();
            for set in kept {
                v.push_allocated_resources(set);
            }
        });
        if !release.is_empty() {
            if let Err(e) = self.scheduler.free(vehicle, &release) {
                warn!("Releasing resources behind {:?} failed: {}", vehicle, e);
            }
            self.hub.process_event(&Event::SchedulerChanged(vehicle));
        }
    }

    /// Keep only `keep` (which the vehicle holds) and release the rest.
    fn free_all_but(&self, plant: &mut Plant, vehicle: VehicleId, keep: BTreeSet<ResourceRef>) {
        let union: BTreeSet<ResourceRef> = match plant.vehicle(vehicle) {
            Ok(v) => v.allocated_resources_union(),
            Err(_) => return,
        };
        let release: BTreeSet<ResourceRef> =
            union.iter().copied().filter(|r| !keep.contains(r)).collect();
        let retained: BTreeSet<ResourceRef> =
            union.iter().copied().filter(|r| keep.contains(r)).collect();
        let _ = plant.modify_vehicle(vehicle, |v| {
            v.clear_allocated_resources();
            if !retained.is_empty() {
                v.push_allocated_resources(retained);
            }
        });
        if !release.is_empty() {
            if let Err(e) = self.scheduler.free(vehicle, &release) {
                warn!("Releasing resources of {:?} failed: {}", vehicle, e);
            }
            self.hub.process_event(&Event::SchedulerChanged(vehicle));
        }
    }

    // ------------------------------------------------------------------
    // Vehicle reports
    // ------------------------------------------------------------------

    fn on_position(&self, vehicle: VehicleId, point: PointId) {
        let mut plant = self.plant.write().unwrap();
        let mut router = self.router.write().unwrap();

        if let Err(e) = plant.set_vehicle_position(vehicle, Some(point)) {
            warn!("Position report for {:?} rejected: {}", vehicle, e);
            return;
        }
        let snapshot = match plant.vehicle(vehicle) {
            Ok(v) => (v.transport_order(), v.current_drive_order(), v.current_step()),
            Err(_) => return,
        };
        let _ = plant.modify_vehicle(vehicle, |v| v.set_next_position(None));

        let (order_id, do_idx, step_idx) = match snapshot {
            (Some(order), Some(do_idx), Some(step_idx)) => (order, do_idx, step_idx),
            _ => return,
        };
        let order = match plant.order(order_id) {
            Ok(o) => o.clone(),
            Err(_) => return,
        };
        if order.withdrawal_requested() {
            self.finalize_withdrawal(&mut plant, &mut router, vehicle, order_id);
            return;
        }
        let steps: Vec<Step> = match order.drive_orders().get(do_idx).and_then(|d| d.route()) {
            Some(route) => route.steps().to_vec(),
            None => return,
        };
        let step = match steps.get(step_idx) {
            Some(s) => s.clone(),
            None => return,
        };
        if step.destination != point {
            warn!(
                "Vehicle {:?} reported {:?} instead of the commanded step destination",
                vehicle, point
            );
            return;
        }

        if step_idx + 1 < steps.len() {
            let next = steps[step_idx + 1].clone();
            let _ = plant.modify_vehicle(vehicle, |v| v.set_current_step(Some(step_idx + 1)));
            // claim the next step before anything behind is released
            self.request_step(&mut plant, vehicle, order_id, do_idx, next);
            self.free_behind(&mut plant, vehicle, point);
        } else {
            self.free_behind(&mut plant, vehicle, point);
            let destination = order.drive_orders()[do_idx].destination().clone();
            if destination.is_nop() {
                self.finish_drive_order(&mut plant, &mut router, vehicle, order_id, do_idx);
            } else {
                self.begin_operation(&mut plant, vehicle, order_id, do_idx, destination.operation);
            }
        }
    }

    fn on_state(&self, vehicle: VehicleId, state: VehicleState) {
        let mut plant = self.plant.write().unwrap();
        let _ = plant.modify_vehicle(vehicle, |v| v.set_state(state));
    }

    fn on_energy(&self, vehicle: VehicleId, level: u32) {
        let mut plant = self.plant.write().unwrap();
        let _ = plant.modify_vehicle(vehicle, |v| v.set_energy_level(level));
    }

    fn on_operation_complete(&self, vehicle: VehicleId) {
        let mut plant = self.plant.write().unwrap();
        let mut router = self.router.write().unwrap();
        let snapshot = match plant.vehicle(vehicle) {
            Ok(v) => (v.transport_order(), v.current_drive_order()),
            Err(_) => return,
        };
        let (order_id, do_idx) = match snapshot {
            (Some(order), Some(do_idx)) => (order, do_idx),
            _ => return,
        };
        self.finish_drive_order(&mut plant, &mut router, vehicle, order_id, do_idx);
    }

    fn on_vehicle_error(&self, vehicle: VehicleId, kind: &str, message: &str) {
        let mut plant = self.plant.write().unwrap();
        let mut router = self.router.write().unwrap();
        let name =
            plant.vehicle(vehicle).map(|v| v.name().to_string()).unwrap_or_default();
        self.hub.process_event(&Event::Message {
            level: MessageLevel::Error,
            text: format!("Vehicle {} reported error {}: {}", name, kind, message),
        });
        let _ = plant.modify_vehicle(vehicle, |v| v.set_state(VehicleState::Error));
        self.fail_current_order(&mut plant, &mut router, vehicle, message);
        self.abort_adapter(vehicle);
    }

    fn on_grant(&self, grant: Grant) {
        let mut plant = self.plant.write().unwrap();
        let snapshot = match plant.vehicle(grant.vehicle) {
            Ok(v) => (
                v.proc_state(),
                v.transport_order(),
                v.current_drive_order(),
                v.current_step(),
                v.next_position(),
            ),
            Err(_) => return,
        };
        let (order_id, do_idx, step_idx) = match snapshot {
            (ProcState::ProcessingOrder, Some(order), Some(do_idx), Some(step_idx), None) => {
                (order, do_idx, step_idx)
            }
            _ => {
                // the vehicle no longer needs these resources
                debug!("Returning stale grant of {:?}", grant.vehicle);
                let _ = self.scheduler.free(grant.vehicle, &grant.resources);
                return;
            }
        };
        let step = match plant
            .order(order_id)
            .ok()
            .and_then(|o| o.drive_orders().get(do_idx).cloned())
            .and_then(|d| d.route().map(|r| r.steps().to_vec()))
            .and_then(|steps| steps.get(step_idx).cloned())
        {
            Some(step) => step,
            None => {
                let _ = self.scheduler.free(grant.vehicle, &grant.resources);
                return;
            }
        };
        self.begin_step(&mut plant, grant.vehicle, order_id, do_idx, step, grant.resources);
    }

    // ------------------------------------------------------------------
    // Completion, failure, withdrawal
    // ------------------------------------------------------------------

    fn finish_drive_order(
        &self,
        plant: &mut Plant,
        router: &mut Router,
        vehicle: VehicleId,
        order_id: OrderId,
        do_idx: usize,
    ) {
        let _ = plant.modify_order(order_id, |o| {
            if let Some(d) = o.drive_order_mut(do_idx) {
                d.set_state(DriveOrderState::Finished);
            }
        });
        let order = match plant.order(order_id) {
            Ok(o) => o.clone(),
            Err(_) => return,
        };
        if order.withdrawal_requested() {
            self.finalize_withdrawal(plant, router, vehicle, order_id);
            return;
        }
        if do_idx + 1 < order.drive_orders().len() {
            let _ = plant.modify_order(order_id, |o| o.set_current_drive_order(Some(do_idx + 1)));
            let _ = plant.modify_vehicle(vehicle, |v| {
                v.set_current_drive_order(Some(do_idx + 1));
                v.set_current_step(None);
            });
            self.start_drive_order(plant, router, vehicle, order_id, do_idx + 1);
        } else {
            self.finish_order(plant, router, vehicle, order_id);
        }
    }

    fn finish_order(
        &self,
        plant: &mut Plant,
        router: &mut Router,
        vehicle: VehicleId,
        order_id: OrderId,
    ) {
        let _ = plant.modify_order(order_id, |o| {
            o.set_current_drive_order(None);
            o.set_state(OrderState::Finished);
        });
        let _ = plant.modify_vehicle(vehicle, |v| {
            v.set_proc_state(ProcState::Idle);
            v.set_state(VehicleState::Idle);
            v.set_transport_order(None);
            v.set_current_drive_order(None);
            v.set_current_step(None);
            v.set_next_position(None);
        });
        router.select_route(vehicle, None);
        if let Some(position) = plant.vehicle(vehicle).ok().and_then(|v| v.position()) {
            let mut standing = BTreeSet::new();
            standing.insert(ResourceRef::Point(position));
            let keep = plant.block_closure(&standing);
            self.free_all_but(plant, vehicle, keep);
        }
        if let Ok(order) = plant.order(order_id) {
            info!("Finished {}", printer::order(plant, order).unwrap_or_default());
        }
    }

    /// Mark the current drive order and its transport order FAILED, free
    /// every held resource, and return the vehicle to idle so other work
    /// can proceed.
    fn fail_current_order(
        &self,
        plant: &mut Plant,
        router: &mut Router,
        vehicle: VehicleId,
        reason: &str,
    ) {
        let snapshot = match plant.vehicle(vehicle) {
            Ok(v) => (v.transport_order(), v.current_drive_order()),
            Err(_) => return,
        };
        let (order_id, do_idx) = match snapshot {
            (Some(order), do_idx) => (order, do_idx),
            _ => return,
        };
        warn!("Failing order {:?} of {:?}: {}", order_id, vehicle, reason);
        let _ = plant.modify_order(order_id, |o| {
            if let Some(index) = do_idx {
                if let Some(d) = o.drive_order_mut(index) {
                    if d.state() != DriveOrderState::Finished {
                        d.set_state(DriveOrderState::Failed);
                    }
                }
            }
            o.set_current_drive_order(None);
            o.set_state(OrderState::Failed);
        });
        let _ = plant.modify_vehicle(vehicle, |v| {
            v.set_proc_state(ProcState::Idle);
            v.set_transport_order(None);
            v.set_current_drive_order(None);
            v.set_current_step(None);
            v.set_next_position(None);
            v.clear_allocated_resources();
        });
        self.scheduler.free_all(vehicle);
        self.hub.process_event(&Event::SchedulerChanged(vehicle));
        router.select_route(vehicle, None);
        self.hub.process_event(&Event::Message {
            level: MessageLevel::Error,
            text: format!("Transport order failed: {}", reason),
        });
        self.propagate_sequence_withdrawal(plant, order_id);
    }

    /// Carry out a withdrawal at a step boundary: the order becomes
    /// WITHDRAWN, the vehicle idle, and every held resource is released, in
    /// exactly that event order.
    fn finalize_withdrawal(
        &self,
        plant: &mut Plant,
        router: &mut Router,
        vehicle: VehicleId,
        order_id: OrderId,
    ) {
        self.abort_adapter(vehicle);
        let _ = plant.modify_order(order_id, |o| {
            o.set_current_drive_order(None);
            o.set_state(OrderState::Withdrawn);
        });
        let _ = plant.modify_vehicle(vehicle, |v| {
            v.set_proc_state(ProcState::Idle);
            v.set_state(VehicleState::Idle);
            v.set_transport_order(None);
            v.set_current_drive_order(None);
            v.set_current_step(None);
            v.set_next_position(None);
            v.clear_allocated_resources();
        });
        self.scheduler.free_all(vehicle);
        self.hub.process_event(&Event::SchedulerChanged(vehicle));
        router.select_route(vehicle, None);
        info!("Withdrew order {:?} from {:?}", order_id, vehicle);
        self.propagate_sequence_withdrawal(plant, order_id);
    }

    /// A failed or withdrawn order pulls its wrapping sequence successors
    /// with it: each one is flagged and withdrawn on the next pass.
    fn propagate_sequence_withdrawal(&self, plant: &mut Plant, order_id: OrderId) {
        let mut current = order_id;
        loop {
            let successor = match plant.order(current) {
                Ok(o) => o.wrapping_sequence(),
                Err(_) => return,
            };
            let successor = match successor {
                Some(s) => s,
                None => return,
            };
            let terminal =
                plant.order(successor).map(|o| o.state().is_terminal()).unwrap_or(true);
            if !terminal {
                debug!("Propagating withdrawal to sequence successor {:?}", successor);
                let _ = plant.modify_order(successor, |o| o.request_withdrawal());
            }
            current = successor;
        }
    }

    // ------------------------------------------------------------------
    // Operating-session support
    // ------------------------------------------------------------------

    /// Claim the standing position of every positioned vehicle, as happens
    /// on entry to operating mode. Two vehicles inside one block is a model
    /// defect and reported as an error message.
    pub fn allocate_standing_positions(&self) {
        let mut plant = self.plant.write().unwrap();
        let positioned: Vec<(VehicleId, PointId)> = plant
            .vehicles()
            .filter_map(|v| v.position().map(|p| (v.id(), p)))
            .collect();
        for (vehicle, position) in positioned {
            let mut standing = BTreeSet::new();
            standing.insert(ResourceRef::Point(position));
            let resources = self.scheduler.expand(&standing);
            match self.scheduler.allocate_now(vehicle, &resources) {
                Ok(()) => {
                    let _ = plant.modify_vehicle(vehicle, |v| {
                        v.clear_allocated_resources();
                        v.push_allocated_resources(resources);
                    });
                }
                Err(e) => {
                    self.hub.process_event(&Event::Message {
                        level: MessageLevel::Error,
                        text: format!(
                            "Cannot allocate standing position of {:?}: {}",
                            vehicle, e
                        ),
                    });
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Adapter plumbing
    // ------------------------------------------------------------------

    fn send_to_adapter(&self, vehicle: VehicleId, command: MovementCommand) {
        let adapter = self.adapters.lock().unwrap().get(&vehicle).cloned();
        match adapter {
            Some(adapter) => adapter.send_command(command),
            None => warn!("No adapter registered for {:?}; dropping command", vehicle),
        }
    }

    fn abort_adapter(&self, vehicle: VehicleId) {
        if let Some(adapter) = self.adapters.lock().unwrap().get(&vehicle).cloned() {
            adapter.abort();
        }
    }
}
