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

#![deny(missing_docs)]

//! # Gantry: a transportation control kernel for AGV fleets
//!
//! This is a library for controlling fleets of automated guided vehicles
//! (AGVs) over a fixed topological network. It computes passable routes,
//! arbitrates exclusive claims on shared track resources, assigns transport
//! orders to vehicles and drives each order through its lifecycle, and
//! chooses recharge and parking destinations for idle vehicles. Everything
//! outside these concerns (graphics, physical vehicle drivers, persistence
//! of working state) lives in external collaborators that talk to the
//! kernel through its typed API, its boundary documents, and its event
//! stream.
//!
//! ## Structure
//!
//! This library is structured in the following way:
//!
//! - **[`model`]**: The plant model. The central structure is the
//!   [`Plant`](model::Plant): the authoritative owner of points, paths,
//!   stations, blocks, vehicles, and transport orders, emitting a change
//!   event for every mutation.
//!
//! - **[`routing`]**: The [`Router`](routing::Router) with its pluggable
//!   [route evaluators](routing::evaluator): per-vehicle shortest-path
//!   tables, route attachment, routability checks, and the selected-route
//!   registry.
//!
//! - **[`allocate`]**: The [`Scheduler`](allocate::Scheduler), arbitrating
//!   exclusive, block-expanded claims on points and paths with FIFO
//!   fairness.
//!
//! - **[`dispatch`]**: The [`Dispatcher`](dispatch::Dispatcher) worker and
//!   the [vehicle adapter interface](dispatch::adapter), including the
//!   simulated loopback vehicle.
//!
//! - **[`strategy`]**: Recharge and parking destination selection for idle
//!   vehicles.
//!
//! - **[`hub`]**: The synchronous event hub and the bounded poll queues
//!   used by remote subscribers.
//!
//! - **[`exchange`]**: The versioned plant-model document and the
//!   order-set intake document.
//!
//! - **[`kernel`]**: The [`Kernel`](kernel::Kernel) facade and its
//!   MODELLING / OPERATING / SHUTDOWN state machine.
//!
//! - **[`plant_models`]**: Prepared plant topologies used by tests,
//!   examples, and load experiments.
//!
//! ## Usage
//!
//! Build a plant (or load a plant document), create the kernel, attach
//! vehicle adapters, enter operating mode, and submit transport orders:
//!
//! ```rust
//! use gantry::dispatch::DispatcherConfig;
//! use gantry::kernel::{Kernel, KernelConfig, KernelState};
//! use gantry::model::Destination;
//! use gantry::routing::DistanceEvaluator;
//! use std::collections::BTreeSet;
//!
//! fn main() -> Result<(), gantry::Error> {
//!     let config = KernelConfig {
//!         dispatcher: DispatcherConfig { parking_enabled: false, ..Default::default() },
//!     };
//!     let kernel = Kernel::new(config, Box::new(DistanceEvaluator));
//!
//!     // build the plant while modelling
//!     let (a, b, agv) = {
//!         let plant = kernel.plant();
//!         let mut plant = plant.write().unwrap();
//!         let a = plant.add_point("A", gantry::model::PointKind::Halt, Default::default())?;
//!         let b = plant.add_point("B", gantry::model::PointKind::Halt, Default::default())?;
//!         plant.add_path("A--B", a, b, 10)?;
//!         let agv = plant.add_vehicle("AGV-01")?;
//!         plant.set_vehicle_position(agv, Some(a))?;
//!         (a, b, agv)
//!     };
//!
//!     let adapter = kernel.attach_loopback_vehicle(agv, true);
//!     kernel.set_state(KernelState::Operating)?;
//!     adapter.report_ready();
//!
//!     kernel.submit_transport_order(
//!         None,
//!         vec![Destination::point(b)],
//!         Some(agv),
//!         0,
//!         BTreeSet::new(),
//!         None,
//!     )?;
//!
//!     // the dispatcher worker and the loopback vehicle take it from here
//!     # let _ = a;
//!     kernel.set_state(KernelState::Shutdown)?;
//!     Ok(())
//! }
//! ```

pub mod plant_models;
mod test;

pub mod allocate;
pub mod dispatch;
mod error;
pub mod exchange;
pub mod hub;
pub mod kernel;
pub mod model;
pub mod routing;
pub mod strategy;

pub use error::Error;
pub use kernel::{Kernel, KernelConfig, KernelState};

use std::sync::{Arc, RwLock};

/// Stop signal shared between the kernel and its worker threads: cloned
/// handles observe the flag, the owner raises it once.
#[derive(Clone, Debug, Default)]
pub struct Stopper {
    flag: Arc<RwLock<bool>>,
}

impl Stopper {
    /// Create a new stopper with the flag lowered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the stop flag. Blocks until the write lock can be acquired.
    pub fn send_stop(&self) {
        *self.flag.write().unwrap() = true;
    }

    /// Check the stop flag. Blocks until the read lock can be acquired.
    pub fn is_stop(&self) -> bool {
        *self.flag.read().unwrap()
    }
}
