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

//! # Kernel state machine and facade
//!
//! The kernel wires the plant, router, scheduler, dispatcher, and event hub
//! together and gates which operations are legal in which state. The plant
//! is built (or loaded from a plant document) while MODELLING; entering
//! OPERATING seals the topology, rebuilds the routing tables, claims every
//! vehicle's standing position, and starts the dispatcher worker; SHUTDOWN
//! is terminal. Every transition emits a state event.

use crate::allocate::Scheduler;
use crate::dispatch::{Dispatcher, DispatcherConfig, DispatcherMessage, LoopbackAdapter};
use crate::dispatch::adapter::AdapterHandle;
use crate::error::Error;
use crate::exchange::order_set::{OrderSetDocument, TransportEntry};
use crate::exchange::plant_file::{self, PlantDocument};
use crate::hub::{EventHub, PollQueue};
use crate::model::event::{Event, MessageLevel};
use crate::model::order::{now_millis, Destination};
use crate::model::plant::Plant;
use crate::model::types::{OrderId, VehicleId};
use crate::model::vehicle::ProcState;
use crate::routing::{RouteEvaluator, Router};
use crate::Stopper;

use log::*;
use std::collections::BTreeSet;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

/// The lifecycle states of the kernel.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum KernelState {
    /// The plant model is being built or edited; nothing moves.
    Modelling,
    /// The topology is frozen and the dispatcher is running.
    Operating,
    /// Terminal: the kernel has released everything and will not come back.
    Shutdown,
}

/// Construction-time configuration of the kernel, passed in explicitly
/// instead of living in any global store.
#[derive(Debug, Clone, Default)]
pub struct KernelConfig {
    /// Dispatcher tunables.
    pub dispatcher: DispatcherConfig,
}

/// # Kernel struct
///
/// Owns the shared state and the dispatcher worker. All components are
/// reference counted so adapters and front ends can hold on to the pieces
/// they need.
pub struct Kernel {
    plant: Arc<RwLock<Plant>>,
    router: Arc<RwLock<Router>>,
    scheduler: Arc<Scheduler>,
    hub: Arc<EventHub>,
    dispatcher: Arc<Dispatcher>,
    state: Mutex<KernelState>,
    tx: Mutex<Sender<DispatcherMessage>>,
    rx: Mutex<Option<Receiver<DispatcherMessage>>>,
    worker: Mutex<Option<(Stopper, JoinHandle<Receiver<DispatcherMessage>>)>>,
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel").field("state", &self.state()).finish()
    }
}

impl Kernel {
    /// Create a kernel in MODELLING state with an empty plant, routing with
    /// the given evaluator.
    pub fn new(config: KernelConfig, evaluator: Box<dyn RouteEvaluator>) -> Arc<Self> {
        let hub = Arc::new(EventHub::new());
        let plant = Arc::new(RwLock::new(Plant::new(hub.clone())));
        let router = Arc::new(RwLock::new(Router::new(evaluator)));
        let (tx, rx) = channel();
        let grant_tx = Mutex::new(tx.clone());
        let scheduler = Arc::new(Scheduler::new(Box::new(move |grant| {
            let _ = grant_tx.lock().unwrap().send(DispatcherMessage::Granted(grant));
        })));
        let dispatcher = Arc::new(Dispatcher::new(
            plant.clone(),
            router.clone(),
            scheduler.clone(),
            hub.clone(),
            config.dispatcher,
        ));
        Arc::new(Self {
            plant,
            router,
            scheduler,
            hub,
            dispatcher,
            state: Mutex::new(KernelState::Modelling),
            tx: Mutex::new(tx),
            rx: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
        })
    }

    /// The current kernel state.
    pub fn state(&self) -> KernelState {
        *self.state.lock().unwrap()
    }

    /// The shared plant. Writers must hold the write lock for a whole
    /// logical mutation.
    pub fn plant(&self) -> Arc<RwLock<Plant>> {
        self.plant.clone()
    }

    /// The shared router.
    pub fn router(&self) -> Arc<RwLock<Router>> {
        self.router.clone()
    }

    /// The resource scheduler.
    pub fn scheduler(&self) -> Arc<Scheduler> {
        self.scheduler.clone()
    }

    /// The event hub.
    pub fn hub(&self) -> Arc<EventHub> {
        self.hub.clone()
    }

    /// The dispatcher.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    fn require_state(&self, required: KernelState) -> Result<(), Error> {
        let actual = self.state();
        match actual {
            KernelState::Shutdown => {
                Err(Error::KernelUnavailable("the kernel has shut down".to_string()))
            }
            _ if actual == required => Ok(()),
            _ => Err(Error::UnsupportedOperation(format!(
                "operation requires kernel state {:?}, but the kernel is {:?}",
                required, actual
            ))),
        }
    }

    // ------------------------------------------------------------------
    // State machine
    // ------------------------------------------------------------------

    /// Move the kernel to another state. MODELLING and OPERATING alternate;
    /// SHUTDOWN is reachable from anywhere and terminal. Each successful
    /// transition emits a state event.
    pub fn set_state(&self, to: KernelState) -> Result<(), Error> {
        let from = self.state();
        if from == to {
            return Ok(());
        }
        match (from, to) {
            (KernelState::Modelling, KernelState::Operating) => self.enter_operating()?,
            (KernelState::Operating, KernelState::Modelling) => self.enter_modelling()?,
            (_, KernelState::Shutdown) => self.enter_shutdown(),
            _ => return Err(Error::IllegalStateTransition { from, to }),
        }
        *self.state.lock().unwrap() = to;
        self.hub.process_event(&Event::KernelStateChanged { from, to });
        info!("Kernel state: {:?} -> {:?}", from, to);
        Ok(())
    }

    fn enter_operating(&self) -> Result<(), Error> {
        {
            let mut plant = self.plant.write().unwrap();
            if plant.points().next().is_none() {
                self.hub.process_event(&Event::Message {
                    level: MessageLevel::Error,
                    text: "Cannot start operating on an empty topology".to_string(),
                });
                return Err(Error::IllegalStateTransition {
                    from: KernelState::Modelling,
                    to: KernelState::Operating,
                });
            }
            plant.seal();
            self.scheduler.set_blocks(plant.blocks_snapshot());
            self.router.write().unwrap().update_routing_tables(&plant);
        }
        self.dispatcher.allocate_standing_positions();
        self.spawn_worker();
        // an initial dispatcher pass picks up any orders created earlier
        let _ = self.tx.lock().unwrap().send(DispatcherMessage::OrdersChanged);
        Ok(())
    }

    fn enter_modelling(&self) -> Result<(), Error> {
        {
            let plant = self.plant.read().unwrap();
            let busy_vehicle =
                plant.vehicles().any(|v| v.proc_state() != ProcState::Idle);
            let live_order = plant.orders().any(|o| !o.state().is_terminal());
            if busy_vehicle || live_order {
                return Err(Error::IllegalStateTransition {
                    from: KernelState::Operating,
                    to: KernelState::Modelling,
                });
            }
        }
        self.stop_worker();
        let vehicles: Vec<VehicleId> = {
            let plant = self.plant.read().unwrap();
            plant.vehicles().map(|v| v.id()).collect()
        };
        for vehicle in vehicles {
            self.scheduler.free_all(vehicle);
        }
        let mut plant = self.plant.write().unwrap();
        plant.unseal();
        plant.clear_topology();
        Ok(())
    }

    fn enter_shutdown(&self) {
        self.stop_worker();
        let vehicles: Vec<VehicleId> = {
            let plant = self.plant.read().unwrap();
            plant.vehicles().map(|v| v.id()).collect()
        };
        for vehicle in vehicles {
            self.scheduler.free_all(vehicle);
        }
        self.hub.process_event(&Event::Message {
            level: MessageLevel::Info,
            text: "Kernel shutting down".to_string(),
        });
    }

    fn spawn_worker(&self) {
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            return;
        }
        let rx = match self.rx.lock().unwrap().take() {
            Some(rx) => rx,
            None => {
                error!("Dispatcher receiver is missing; worker not started");
                return;
            }
        };
        // drop reports that piled up while modelling
        while rx.try_recv().is_ok() {}
        let stopper = Stopper::new();
        let stop = stopper.clone();
        let dispatcher = self.dispatcher.clone();
        let handle = std::thread::spawn(move || {
            dispatcher.run(&rx, stop);
            rx
        });
        *worker = Some((stopper, handle));
    }

    fn stop_worker(&self) {
        let taken = self.worker.lock().unwrap().take();
        if let Some((stopper, handle)) = taken {
            stopper.send_stop();
            let _ = self.tx.lock().unwrap().send(DispatcherMessage::Shutdown);
            match handle.join() {
                Ok(rx) => *self.rx.lock().unwrap() = Some(rx),
                Err(_) => error!("Dispatcher worker panicked"),
            }
        }
    }

    // ------------------------------------------------------------------
    // Plant documents
    // ------------------------------------------------------------------

    /// Replace the plant with the contents of a plant document. Only legal
    /// while MODELLING.
    pub fn load_plant_document(&self, document: &PlantDocument) -> Result<(), Error> {
        self.require_state(KernelState::Modelling)?;
        let mut plant = self.plant.write().unwrap();
        plant.clear_topology();
        plant_file::load_into(document, &mut plant)?;
        info!("Plant model loaded: {} points", plant.points().count());
        Ok(())
    }

    /// Write the current plant out as a plant document.
    pub fn dump_plant_document(&self) -> Result<PlantDocument, Error> {
        let plant = self.plant.read().unwrap();
        Ok(plant_file::dump_from(&plant)?)
    }

    // ------------------------------------------------------------------
    // Transport orders
    // ------------------------------------------------------------------

    /// Create a transport order. Only legal while OPERATING. A name is
    /// generated when none is given.
    pub fn submit_transport_order(
        &self,
        name: Option<String>,
        destinations: Vec<Destination>,
        intended_vehicle: Option<VehicleId>,
        deadline: u64,
        dependencies: BTreeSet<OrderId>,
        wrapping_sequence: Option<OrderId>,
    ) -> Result<OrderId, Error> {
        self.require_state(KernelState::Operating)?;
        let order_id = {
            let mut plant = self.plant.write().unwrap();
            let name = name.unwrap_or_else(|| plant.generate_order_name("TOrder"));
            let order_id = plant.create_order(name, destinations, deadline)?;
            plant.modify_order(order_id, |o| {
                o.set_intended_vehicle(intended_vehicle);
                o.set_dependencies(dependencies);
                o.set_wrapping_sequence(wrapping_sequence);
            })?;
            order_id
        };
        let _ = self.tx.lock().unwrap().send(DispatcherMessage::OrdersChanged);
        Ok(order_id)
    }

    /// Request the withdrawal of a transport order. The dispatcher observes
    /// the request on its next pass and withdraws the order at the next
    /// step boundary.
    pub fn withdraw_transport_order(&self, order: OrderId) -> Result<(), Error> {
        self.require_state(KernelState::Operating)?;
        self.plant.write().unwrap().modify_order(order, |o| o.request_withdrawal())?;
        let _ = self.tx.lock().unwrap().send(DispatcherMessage::OrdersChanged);
        Ok(())
    }

    /// Create one transport order per entry of an order-set document,
    /// resolving location and vehicle names against the plant. Script
    /// entries are not executed by the kernel.
    pub fn submit_order_set(&self, document: &OrderSetDocument) -> Result<Vec<OrderId>, Error> {
        self.require_state(KernelState::Operating)?;
        let mut created = Vec::new();
        for entry in document.transports.iter() {
            let transport = match entry {
                TransportEntry::Transport(t) => t,
                TransportEntry::Script(script) => {
                    return Err(Error::UnsupportedOperation(format!(
                        "transport scripts are handled outside the kernel: {}",
                        script.file_name
                    )))
                }
            };
            let order_id = {
                let mut plant = self.plant.write().unwrap();
                let mut destinations = Vec::with_capacity(transport.destinations.len());
                for spec in transport.destinations.iter() {
                    let location = plant.location_by_name(&spec.location)?;
                    let mut destination = Destination::location(location, spec.operation.clone());
                    destination.properties = spec.properties.clone();
                    destinations.push(destination);
                }
                let intended = match transport.intended_vehicle.as_deref() {
                    Some(name) => Some(plant.vehicle_by_name(name)?),
                    None => None,
                };
                let mut dependencies = BTreeSet::new();
                for name in transport.dependencies.iter() {
                    dependencies.insert(plant.order_by_name(name)?);
                }
                let name = match transport.name.clone() {
                    Some(name) => name,
                    None => plant.generate_order_name("TOrder"),
                };
                let deadline =
                    if transport.deadline_ms == 0 { now_millis() } else { transport.deadline_ms };
                let order_id = plant.create_order(name, destinations, deadline)?;
                plant.modify_order(order_id, |o| {
                    o.set_intended_vehicle(intended);
                    o.set_dependencies(dependencies);
                })?;
                order_id
            };
            created.push(order_id);
        }
        let _ = self.tx.lock().unwrap().send(DispatcherMessage::OrdersChanged);
        Ok(created)
    }

    /// True once every transport order in the plant is terminal.
    pub fn all_orders_terminal(&self) -> bool {
        let plant = self.plant.read().unwrap();
        let result = plant.orders().all(|o| o.state().is_terminal());
        result
    }

    // ------------------------------------------------------------------
    // Adapters and events
    // ------------------------------------------------------------------

    /// A report handle for a vehicle's communication adapter.
    pub fn adapter_handle(&self, vehicle: VehicleId) -> AdapterHandle {
        AdapterHandle::new(vehicle, self.tx.lock().unwrap().clone())
    }

    /// Attach a loopback (simulated) vehicle for `vehicle` and register it
    /// with the dispatcher. In auto mode the vehicle acknowledges commands
    /// immediately.
    pub fn attach_loopback_vehicle(&self, vehicle: VehicleId, auto: bool) -> Arc<LoopbackAdapter> {
        let handle = self.adapter_handle(vehicle);
        let adapter = Arc::new(if auto {
            LoopbackAdapter::new_auto(handle)
        } else {
            LoopbackAdapter::new_manual(handle)
        });
        self.dispatcher.register_adapter(vehicle, adapter.clone());
        adapter
    }

    /// Create a bounded poll queue receiving every event, for subscribers
    /// that pull instead of listening.
    pub fn create_poll_queue(&self, capacity: usize) -> Arc<PollQueue> {
        let queue = PollQueue::new(capacity);
        self.hub.subscribe_all(Box::new(queue.clone()));
        queue
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        self.stop_worker();
    }
}
