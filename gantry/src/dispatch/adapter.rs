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

//! # Vehicle communication adapters
//!
//! The dispatcher talks to physical vehicles through the [`VehicleAdapter`]
//! trait: it sends one movement or operation command at a time and may
//! abort. Adapters run on their own threads and report back asynchronously
//! through an [`AdapterHandle`], which posts [`VehicleReport`]s into the
//! dispatcher's message queue; reports of one vehicle are processed in the
//! order they were posted.
//!
//! The [`LoopbackAdapter`] is a simulated vehicle used by tests and the
//! command line front end: it acknowledges every movement by reporting the
//! step's destination, either immediately (auto mode) or when prompted
//! (manual mode, for tests that need stepwise control).

use crate::dispatch::DispatcherMessage;
use crate::model::order::Step;
use crate::model::types::{OrderId, PointId};
use crate::model::vehicle::VehicleState;
use crate::model::types::VehicleId;

use log::*;
use std::collections::VecDeque;
use std::sync::mpsc::Sender;
use std::sync::Mutex;

/// One command handed to a vehicle adapter: a movement along a single step,
/// or an operation to perform in place. Exactly one of `step` and
/// `operation` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementCommand {
    /// The transport order this command belongs to.
    pub order: OrderId,
    /// Index of the drive order within the transport order.
    pub drive_order_index: usize,
    /// The step to travel, if this is a movement.
    pub step: Option<Step>,
    /// The operation to perform in place, if this is an operation.
    pub operation: Option<String>,
}

/// A state report posted by a vehicle adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleReport {
    /// The vehicle reached a point.
    Position(PointId),
    /// The vehicle changed its condition.
    State(VehicleState),
    /// The vehicle measured its energy level in percent.
    Energy(u32),
    /// The commanded operation finished.
    OperationComplete,
    /// The vehicle failed.
    Error {
        /// Machine-readable failure kind
        kind: String,
        /// Human-readable description
        message: String,
    },
}

/// Callback handle an adapter uses to report into the dispatcher queue.
pub struct AdapterHandle {
    vehicle: VehicleId,
    tx: Mutex<Sender<DispatcherMessage>>,
}

impl std::fmt::Debug for AdapterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterHandle").field("vehicle", &self.vehicle).finish()
    }
}

impl AdapterHandle {
    /// Create a handle reporting for `vehicle` into the given queue.
    pub fn new(vehicle: VehicleId, tx: Sender<DispatcherMessage>) -> Self {
        Self { vehicle, tx: Mutex::new(tx) }
    }

    /// The vehicle this handle reports for.
    pub fn vehicle(&self) -> VehicleId {
        self.vehicle
    }

    /// Post a report. Reports are delivered in posting order.
    pub fn report(&self, report: VehicleReport) {
        let tx = self.tx.lock().unwrap();
        if tx.send(DispatcherMessage::Report { vehicle: self.vehicle, report }).is_err() {
            debug!("Dropping report for {:?}: dispatcher is gone", self.vehicle);
        }
    }
}

/// Interface of a vehicle communication adapter as seen by the dispatcher.
pub trait VehicleAdapter: Send + Sync {
    /// Hand one command to the vehicle.
    fn send_command(&self, command: MovementCommand);
    /// Abort whatever the vehicle is currently doing.
    fn abort(&self);
}

struct LoopbackState {
    pending: VecDeque<MovementCommand>,
    energy: u32,
}

/// # Loopback adapter
///
/// A simulated vehicle. In auto mode every command is executed the moment
/// it arrives: movements report the step's destination, operations report
/// completion. In manual mode commands queue until [`LoopbackAdapter::step`]
/// is called, which executes exactly one of them; tests use this to stop a
/// vehicle between steps.
pub struct LoopbackAdapter {
    handle: AdapterHandle,
    auto: bool,
    energy_drain: u32,
    charge_operation: String,
    state: Mutex<LoopbackState>,
}

impl std::fmt::Debug for LoopbackAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackAdapter")
            .field("vehicle", &self.handle.vehicle())
            .field("auto", &self.auto)
            .finish()
    }
}

impl LoopbackAdapter {
    /// Create a self-advancing loopback vehicle.
    pub fn new_auto(handle: AdapterHandle) -> Self {
        Self::new(handle, true)
    }

    /// Create a loopback vehicle that only advances when [`Self::step`] is
    /// called.
    pub fn new_manual(handle: AdapterHandle) -> Self {
        Self::new(handle, false)
    }

    fn new(handle: AdapterHandle, auto: bool) -> Self {
        Self {
            handle,
            auto,
            energy_drain: 0,
            charge_operation: crate::model::vehicle::DEFAULT_RECHARGE_OPERATION.to_string(),
            state: Mutex::new(LoopbackState { pending: VecDeque::new(), energy: 100 }),
        }
    }

    /// Drain `amount` percent of energy per executed movement, reporting the
    /// new level after each step. Zero disables energy simulation.
    pub fn with_energy_drain(mut self, amount: u32) -> Self {
        self.energy_drain = amount;
        self
    }

    /// Announce the vehicle to the dispatcher as idle. Call once after the
    /// vehicle has been placed on its starting point.
    pub fn report_ready(&self) {
        self.handle.report(VehicleReport::State(VehicleState::Idle));
    }

    /// Report a vehicle failure, as a broken-down vehicle would.
    pub fn report_failure(&self, kind: &str, message: &str) {
        self.handle.report(VehicleReport::Error {
            kind: kind.to_string(),
            message: message.to_string(),
        });
    }

    /// Number of commands waiting to be executed.
    pub fn pending_commands(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Execute one queued command. Returns false if none was queued.
    pub fn step(&self) -> bool {
        let command = self.state.lock().unwrap().pending.pop_front();
        match command {
            Some(command) => {
                self.execute(command);
                true
            }
            None => false,
        }
    }

    fn execute(&self, command: MovementCommand) {
        if let Some(step) = command.step {
            if self.energy_drain > 0 {
                let mut state = self.state.lock().unwrap();
                state.energy = state.energy.saturating_sub(self.energy_drain);
                let energy = state.energy;
                drop(state);
                self.handle.report(VehicleReport::Energy(energy));
            }
            self.handle.report(VehicleReport::Position(step.destination));
        } else if let Some(operation) = command.operation {
            if operation == self.charge_operation {
                self.state.lock().unwrap().energy = 100;
                self.handle.report(VehicleReport::Energy(100));
            }
            self.handle.report(VehicleReport::OperationComplete);
        }
    }
}

impl VehicleAdapter for LoopbackAdapter {
    fn send_command(&self, command: MovementCommand) {
        if self.auto {
            self.execute(command);
        } else {
            self.state.lock().unwrap().pending.push_back(command);
        }
    }

    fn abort(&self) {
        self.state.lock().unwrap().pending.clear();
    }
}
