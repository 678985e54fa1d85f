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

//! Module defining vehicles.

use crate::model::types::{OrderId, PathId, PointId, Pose, ResourceRef, VehicleId};
use std::collections::{BTreeSet, HashSet};

/// The default operation a vehicle requests at a charging station.
pub const DEFAULT_RECHARGE_OPERATION: &str = "CHARGE";

/// Condition of a vehicle as last reported by its communication adapter.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum VehicleState {
    /// No adapter is attached, or it has not reported yet.
    Unknown,
    /// The adapter is attached but the vehicle cannot be used.
    Unavailable,
    /// The vehicle reported a fault.
    Error,
    /// The vehicle is ready for work.
    Idle,
    /// The vehicle is moving or operating.
    Executing,
    /// The vehicle is recharging its energy storage.
    Charging,
}

/// Processing condition of a vehicle from the dispatcher's point of view.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ProcState {
    /// The vehicle is not assigned to any order.
    Idle,
    /// An order was selected for the vehicle; routing is in progress.
    AwaitingOrder,
    /// The vehicle is executing a transport order.
    ProcessingOrder,
}

/// An automated guided vehicle.
///
/// Vehicles persist across kernel mode changes, but their processing state
/// is reset when the kernel returns to modelling. The ordered list of
/// allocated resource sets mirrors the scheduler's view; whenever it is
/// non-empty, its head set contains the vehicle's current position.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    name: String,
    id: VehicleId,
    energy_level: u32,
    critical_energy: u32,
    good_energy: u32,
    max_velocity: u64,
    position: Option<PointId>,
    next_position: Option<PointId>,
    precise_pose: Option<Pose>,
    state: VehicleState,
    proc_state: ProcState,
    transport_order: Option<OrderId>,
    current_drive_order: Option<usize>,
    current_step: Option<usize>,
    allocated_resources: Vec<BTreeSet<ResourceRef>>,
    recharge_operation: String,
    forbidden_paths: HashSet<PathId>,
    locked: bool,
}

impl Vehicle {
    pub(crate) fn new(name: String, id: VehicleId) -> Self {
        Self {
            name,
            id,
            energy_level: 100,
            critical_energy: 30,
            good_energy: 90,
            max_velocity: 1000,
            position: None,
            next_position: None,
            precise_pose: None,
            state: VehicleState::Unknown,
            proc_state: ProcState::Idle,
            transport_order: None,
            current_drive_order: None,
            current_step: None,
            allocated_resources: Vec::new(),
            recharge_operation: DEFAULT_RECHARGE_OPERATION.to_string(),
            forbidden_paths: HashSet::new(),
            locked: false,
        }
    }

    /// Return the id of the vehicle.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// Return the name of the vehicle.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remaining energy in percent (0..=100).
    pub fn energy_level(&self) -> u32 {
        self.energy_level
    }

    /// True if the energy level is at or below the critical threshold.
    pub fn is_energy_critical(&self) -> bool {
        self.energy_level <= self.critical_energy
    }

    /// True if the energy level is at or above the good threshold.
    pub fn is_energy_good(&self) -> bool {
        self.energy_level >= self.good_energy
    }

    /// The critical energy threshold in percent.
    pub fn critical_energy(&self) -> u32 {
        self.critical_energy
    }

    /// The good energy threshold in percent.
    pub fn good_energy(&self) -> u32 {
        self.good_energy
    }

    /// Maximum velocity of the vehicle in mm/s.
    pub fn max_velocity(&self) -> u64 {
        self.max_velocity
    }

    /// The point the vehicle currently occupies, if known.
    pub fn position(&self) -> Option<PointId> {
        self.position
    }

    /// The point the vehicle is moving towards, if a movement is in flight.
    pub fn next_position(&self) -> Option<PointId> {
        self.next_position
    }

    /// The precise pose reported by the adapter, if any.
    pub fn precise_pose(&self) -> Option<Pose> {
        self.precise_pose
    }

    /// The adapter-reported state of the vehicle.
    pub fn state(&self) -> VehicleState {
        self.state
    }

    /// The dispatcher-side processing state of the vehicle.
    pub fn proc_state(&self) -> ProcState {
        self.proc_state
    }

    /// The transport order the vehicle is processing, if any.
    pub fn transport_order(&self) -> Option<OrderId> {
        self.transport_order
    }

    /// Index of the drive order being executed within the current transport
    /// order, if any.
    pub fn current_drive_order(&self) -> Option<usize> {
        self.current_drive_order
    }

    /// Index of the route step being executed within the current drive
    /// order, if any.
    pub fn current_step(&self) -> Option<usize> {
        self.current_step
    }

    /// The ordered list of resource sets the vehicle currently holds.
    pub fn allocated_resources(&self) -> &[BTreeSet<ResourceRef>] {
        &self.allocated_resources
    }

    /// Union of all resource sets the vehicle currently holds.
    pub fn allocated_resources_union(&self) -> BTreeSet<ResourceRef> {
        self.allocated_resources.iter().flatten().copied().collect()
    }

    /// The operation this vehicle requests at a charging station.
    pub fn recharge_operation(&self) -> &str {
        &self.recharge_operation
    }

    /// Paths this vehicle must never use.
    pub fn forbidden_paths(&self) -> &HashSet<PathId> {
        &self.forbidden_paths
    }

    /// True if the vehicle is withheld from order assignment.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// True if the dispatcher may assign a transport order to this vehicle.
    pub fn is_available_for_orders(&self) -> bool {
        self.proc_state == ProcState::Idle && self.state == VehicleState::Idle && !self.locked
    }

    /// Set the energy level, clamped to 0..=100.
    pub fn set_energy_level(&mut self, level: u32) {
        self.energy_level = level.min(100);
    }

    /// Set the critical and good energy thresholds in percent.
    pub fn set_energy_thresholds(&mut self, critical: u32, good: u32) {
        self.critical_energy = critical.min(100);
        self.good_energy = good.min(100);
    }

    /// Set the maximum velocity in mm/s.
    pub fn set_max_velocity(&mut self, velocity: u64) {
        self.max_velocity = velocity;
    }

    /// Set the adapter-reported state.
    pub fn set_state(&mut self, state: VehicleState) {
        self.state = state;
    }

    /// Set the precise pose reported by the adapter.
    pub fn set_precise_pose(&mut self, pose: Option<Pose>) {
        self.precise_pose = pose;
    }

    /// Set the operation requested at charging stations.
    pub fn set_recharge_operation(&mut self, operation: impl Into<String>) {
        self.recharge_operation = operation.into();
    }

    /// Forbid the vehicle from using a path.
    pub fn forbid_path(&mut self, path: PathId) {
        self.forbidden_paths.insert(path);
    }

    /// Withhold the vehicle from order assignment, or release it again.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub(crate) fn set_position(&mut self, position: Option<PointId>) {
        self.position = position;
    }

    pub(crate) fn set_next_position(&mut self, position: Option<PointId>) {
        self.next_position = position;
    }

    pub(crate) fn set_proc_state(&mut self, proc_state: ProcState) {
        self.proc_state = proc_state;
    }

    pub(crate) fn set_transport_order(&mut self, order: Option<OrderId>) {
        self.transport_order = order;
    }

    pub(crate) fn set_current_drive_order(&mut self, index: Option<usize>) {
        self.current_drive_order = index;
    }

    pub(crate) fn set_current_step(&mut self, index: Option<usize>) {
        self.current_step = index;
    }

    pub(crate) fn push_allocated_resources(&mut self, resources: BTreeSet<ResourceRef>) {
        self.allocated_resources.push(resources);
    }

    pub(crate) fn clear_allocated_resources(&mut self) {
        self.allocated_resources.clear();
    }

    /// Reset the processing state, as happens when the kernel returns to
    /// modelling. The adapter-reported state and energy level survive.
    pub(crate) fn reset_proc_state(&mut self) {
        self.proc_state = ProcState::Idle;
        self.transport_order = None;
        self.current_drive_order = None;
        self.current_step = None;
        self.next_position = None;
        self.allocated_resources.clear();
    }
}
