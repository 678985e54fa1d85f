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

//! Module defining topology edges.

use crate::model::types::{PathId, PointId};
use std::collections::BTreeMap;

/// Property key carrying the travel orientation tag of a path. The turn
/// penalty evaluator charges a constant whenever two consecutive steps carry
/// different tags.
pub const PROP_TRAVEL_ORIENTATION: &str = "gantry:travelOrientation";

/// Property key carrying an explicit routing penalty for a path, as a
/// non-negative integer in cost units.
pub const PROP_ROUTING_PENALTY: &str = "gantry:routingPenalty";

/// A directed edge between two distinct points, bearing a positive length in
/// abstract distance units and per-direction velocity limits. A maximum
/// velocity of zero makes the path impassable in that direction; a locked
/// path is impassable in both.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    name: String,
    id: PathId,
    source: PointId,
    destination: PointId,
    length: u64,
    max_velocity: u64,
    max_reverse_velocity: u64,
    locked: bool,
    properties: BTreeMap<String, String>,
}

impl Path {
    pub(crate) fn new(
        name: String,
        id: PathId,
        source: PointId,
        destination: PointId,
        length: u64,
    ) -> Self {
        Self {
            name,
            id,
            source,
            destination,
            length,
            max_velocity: 1000,
            max_reverse_velocity: 0,
            locked: false,
            properties: BTreeMap::new(),
        }
    }

    /// Return the id of the path.
    pub fn id(&self) -> PathId {
        self.id
    }

    /// Return the name of the path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The point this path starts at.
    pub fn source(&self) -> PointId {
        self.source
    }

    /// The point this path ends at.
    pub fn destination(&self) -> PointId {
        self.destination
    }

    /// Length in abstract distance units, always positive.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Maximum velocity when travelling source to destination, in mm/s.
    pub fn max_velocity(&self) -> u64 {
        self.max_velocity
    }

    /// Maximum velocity when travelling destination to source, in mm/s.
    pub fn max_reverse_velocity(&self) -> u64 {
        self.max_reverse_velocity
    }

    /// True if the path is administratively locked.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Free-form properties attached to this path.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// The value of a single property, if present.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// The travel orientation tag, if one is set.
    pub fn travel_orientation(&self) -> Option<&str> {
        self.property(PROP_TRAVEL_ORIENTATION)
    }

    /// Set the forward maximum velocity.
    pub fn set_max_velocity(&mut self, velocity: u64) {
        self.max_velocity = velocity;
    }

    /// Set the reverse maximum velocity. A non-zero value allows the path to
    /// be travelled against its direction.
    pub fn set_max_reverse_velocity(&mut self, velocity: u64) {
        self.max_reverse_velocity = velocity;
    }

    /// Lock or unlock the path.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    /// Set a free-form property.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }
}
