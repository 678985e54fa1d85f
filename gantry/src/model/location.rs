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

//! Module defining stations and their operation profiles.

use crate::model::types::{LocationId, LocationTypeId, PointId};
use std::collections::BTreeSet;

/// The operation profile shared by a set of locations, e.g. every charging
/// station of the same make.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationType {
    name: String,
    id: LocationTypeId,
    allowed_operations: BTreeSet<String>,
}

impl LocationType {
    pub(crate) fn new(name: String, id: LocationTypeId, operations: BTreeSet<String>) -> Self {
        Self { name, id, allowed_operations: operations }
    }

    /// Return the id of the location type.
    pub fn id(&self) -> LocationTypeId {
        self.id
    }

    /// Return the name of the location type.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The operations locations of this type offer.
    pub fn allowed_operations(&self) -> &BTreeSet<String> {
        &self.allowed_operations
    }

    /// True if locations of this type offer the given operation.
    pub fn allows_operation(&self, operation: &str) -> bool {
        self.allowed_operations.contains(operation)
    }
}

/// Connection between a location and one of its access points. An empty
/// allowed-operations set imposes no restriction beyond the location type.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// The point vehicles stand on while operating at the location.
    pub point: PointId,
    /// Operations permitted through this particular link; empty means all
    /// operations of the location's type.
    pub allowed_operations: BTreeSet<String>,
}

impl Link {
    /// Create a link to the given access point without operation
    /// restrictions.
    pub fn new(point: PointId) -> Self {
        Self { point, allowed_operations: BTreeSet::new() }
    }

    /// Create a link restricted to the given operations.
    pub fn with_operations(point: PointId, operations: BTreeSet<String>) -> Self {
        Self { point, allowed_operations: operations }
    }

    /// True if this link permits the given operation (subject to the
    /// location type also allowing it).
    pub fn permits(&self, operation: &str) -> bool {
        self.allowed_operations.is_empty() || self.allowed_operations.contains(operation)
    }
}

/// A station vehicles visit to perform operations, attached to one or more
/// points via links.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    name: String,
    id: LocationId,
    type_id: LocationTypeId,
    links: Vec<Link>,
}

impl Location {
    pub(crate) fn new(name: String, id: LocationId, type_id: LocationTypeId, links: Vec<Link>) -> Self {
        Self { name, id, type_id, links }
    }

    /// Return the id of the location.
    pub fn id(&self) -> LocationId {
        self.id
    }

    /// Return the name of the location.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type this location belongs to.
    pub fn type_id(&self) -> LocationTypeId {
        self.type_id
    }

    /// The links attaching this location to its access points.
    pub fn links(&self) -> &[Link] {
        &self.links
    }
}
