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

//! Module defining topology nodes.

use crate::model::types::{PathId, PointId, Pose, VehicleId};
use std::collections::BTreeSet;

/// What a vehicle may do while standing on a point.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum PointKind {
    /// Vehicles may halt here to load, unload, or wait for new orders.
    Halt,
    /// Vehicles may halt here and be left parked for a longer period.
    Park,
    /// Vehicles may only report their passage; halting is not allowed.
    Report,
}

/// A topology node: a discrete position a vehicle may occupy. At most one
/// vehicle occupies a point at any instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    name: String,
    id: PointId,
    kind: PointKind,
    pose: Pose,
    occupying_vehicle: Option<VehicleId>,
    incoming_paths: BTreeSet<PathId>,
    outgoing_paths: BTreeSet<PathId>,
}

impl Point {
    pub(crate) fn new(name: String, id: PointId, kind: PointKind, pose: Pose) -> Self {
        Self {
            name,
            id,
            kind,
            pose,
            occupying_vehicle: None,
            incoming_paths: BTreeSet::new(),
            outgoing_paths: BTreeSet::new(),
        }
    }

    /// Return the id of the point.
    pub fn id(&self) -> PointId {
        self.id
    }

    /// Return the name of the point.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the kind of the point.
    pub fn kind(&self) -> PointKind {
        self.kind
    }

    /// Return the pose a vehicle assumes when standing on this point.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// The vehicle currently occupying this point, if any.
    pub fn occupying_vehicle(&self) -> Option<VehicleId> {
        self.occupying_vehicle
    }

    /// True if this point is a parking position.
    pub fn is_parking_position(&self) -> bool {
        self.kind == PointKind::Park
    }

    /// Paths ending at this point.
    pub fn incoming_paths(&self) -> &BTreeSet<PathId> {
        &self.incoming_paths
    }

    /// Paths starting at this point.
    pub fn outgoing_paths(&self) -> &BTreeSet<PathId> {
        &self.outgoing_paths
    }

    pub(crate) fn set_occupying_vehicle(&mut self, vehicle: Option<VehicleId>) {
        self.occupying_vehicle = vehicle;
    }

    pub(crate) fn attach_incoming(&mut self, path: PathId) {
        self.incoming_paths.insert(path);
    }

    pub(crate) fn attach_outgoing(&mut self, path: PathId) {
        self.outgoing_paths.insert(path);
    }
}
