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

//! Shared helpers for the test modules: an event recorder and a dispatcher
//! rig that runs the whole stack synchronously, without the worker thread.

use crate::allocate::Scheduler;
use crate::dispatch::adapter::AdapterHandle;
use crate::dispatch::{Dispatcher, DispatcherConfig, DispatcherMessage, LoopbackAdapter};
use crate::hub::{EventHub, EventListener};
use crate::model::event::Event;
use crate::model::order::TransportOrder;
use crate::model::plant::Plant;
use crate::model::types::{OrderId, VehicleId};
use crate::model::vehicle::Vehicle;
use crate::routing::{DistanceEvaluator, Router};

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, RwLock};

/// Record every event the hub broadcasts from now on.
pub(crate) fn record_events(hub: &EventHub) -> Arc<Mutex<Vec<Event>>> {
    struct Recorder(Arc<Mutex<Vec<Event>>>);
    impl EventListener for Recorder {
        fn handle_event(&self, event: &Event) {
            self.0.lock().unwrap().push(event.clone());
        }
    }
    let store = Arc::new(Mutex::new(Vec::new()));
    hub.subscribe_all(Box::new(Recorder(store.clone())));
    store
}

/// The whole dispatching stack wired up synchronously: messages are pumped
/// by the test instead of a worker thread, so every assertion sees a
/// deterministic state.
pub(crate) struct Rig {
    pub plant: Arc<RwLock<Plant>>,
    pub router: Arc<RwLock<Router>>,
    pub scheduler: Arc<Scheduler>,
    pub hub: Arc<EventHub>,
    pub dispatcher: Arc<Dispatcher>,
    pub tx: Sender<DispatcherMessage>,
    pub rx: Receiver<DispatcherMessage>,
    pub events: Arc<Mutex<Vec<Event>>>,
}

impl Rig {
    /// Wire a rig around a prepared plant. Set `RUST_LOG` to see the
    /// dispatcher's tracing while a test runs.
    pub fn new(plant: Plant, config: DispatcherConfig) -> Self {
        let _ = pretty_env_logger::try_init();
        let hub = plant.hub().clone();
        let events = record_events(&hub);
        let (tx, rx) = channel();
        let grant_tx = Mutex::new(tx.clone());
        let scheduler = Arc::new(Scheduler::new(Box::new(move |grant| {
            let _ = grant_tx.lock().unwrap().send(DispatcherMessage::Granted(grant));
        })));
        let router = Arc::new(RwLock::new(Router::new(Box::new(DistanceEvaluator))));
        let plant = Arc::new(RwLock::new(plant));
        let dispatcher = Arc::new(Dispatcher::new(
            plant.clone(),
            router.clone(),
            scheduler.clone(),
            hub.clone(),
            config,
        ));
        Self { plant, router, scheduler, hub, dispatcher, tx, rx, events }
    }

    /// Seal the plant, build the routing tables, install the blocks, and
    /// claim standing positions, as the kernel does on entering operating
    /// mode.
    pub fn start_operating(&self) {
        {
            let mut plant = self.plant.write().unwrap();
            plant.seal();
            self.scheduler.set_blocks(plant.blocks_snapshot());
            self.router.write().unwrap().update_routing_tables(&plant);
        }
        self.dispatcher.allocate_standing_positions();
    }

    /// Attach a manual loopback adapter for a vehicle.
    pub fn attach_manual(&self, vehicle: VehicleId) -> Arc<LoopbackAdapter> {
        let adapter =
            Arc::new(LoopbackAdapter::new_manual(AdapterHandle::new(vehicle, self.tx.clone())));
        self.dispatcher.register_adapter(vehicle, adapter.clone());
        adapter
    }

    /// Process every queued dispatcher message.
    pub fn pump(&self) {
        while let Ok(message) = self.rx.try_recv() {
            self.dispatcher.handle_message(message);
        }
    }

    /// Pump, run one dispatch pass, pump again.
    pub fn cycle(&self) {
        self.pump();
        self.dispatcher.dispatch();
        self.pump();
    }

    /// Pump messages, step every adapter, and dispatch, until nothing moves
    /// any more (or `max_rounds` is reached).
    pub fn run_until_settled(&self, adapters: &[Arc<LoopbackAdapter>], max_rounds: usize) {
        for _ in 0..max_rounds {
            self.cycle();
            let mut progressed = false;
            for adapter in adapters {
                while adapter.step() {
                    progressed = true;
                    self.pump();
                }
            }
            self.cycle();
            if !progressed {
                return;
            }
        }
    }

    /// Snapshot of a transport order.
    pub fn order(&self, id: OrderId) -> TransportOrder {
        self.plant.read().unwrap().order(id).unwrap().clone()
    }

    /// Snapshot of a vehicle.
    pub fn vehicle(&self, id: VehicleId) -> Vehicle {
        self.plant.read().unwrap().vehicle(id).unwrap().clone()
    }

    /// Snapshot of the recorded events.
    pub fn recorded(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}
