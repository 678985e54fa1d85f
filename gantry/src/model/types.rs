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

//! Module containing all type definitions of the plant model

use petgraph::prelude::*;
use petgraph::stable_graph::StableGraph;
use std::hash::{Hash, Hasher};
use thiserror::Error;

pub(crate) type IndexType = u32;
/// Point identification (and index into the topology graph)
pub type PointId = NodeIndex<IndexType>;
/// Path identification (and edge index into the topology graph)
pub type PathId = EdgeIndex<IndexType>;
/// Topology graph: points are nodes, paths are directed edges. All path
/// attributes (length, velocities, lock flag) live on the [`Path`] entity,
/// keyed by the stable edge index.
///
/// [`Path`]: crate::model::Path
pub type PlantGraph = StableGraph<(), (), Directed, IndexType>;

/// Location identification
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct LocationId(pub u32);
/// Location type identification
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct LocationTypeId(pub u32);
/// Block identification
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct BlockId(pub u32);
/// Vehicle identification
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct VehicleId(pub u32);
/// Transport order identification
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct OrderId(pub u32);

/// Aggregate route cost, in abstract distance units
pub type RouteCost = u64;
/// Cost of an unreachable destination
pub const COST_INFINITY: RouteCost = RouteCost::MAX;

/// Position and heading of an object in the plant, in abstract layout units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// X coordinate
    pub x: i64,
    /// Y coordinate
    pub y: i64,
    /// Z coordinate
    pub z: i64,
    /// Heading in degrees, counter-clockwise from the positive X axis
    pub orientation_deg: f64,
}

/// A resource the scheduler arbitrates: a point or a path. Whole blocks are
/// expanded into their member resources before arbitration.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub enum ResourceRef {
    /// A topology node
    Point(PointId),
    /// A directed topology edge
    Path(PathId),
}

/// The entity classes managed by the plant
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub enum ObjectClass {
    /// A topology node
    Point,
    /// A directed topology edge
    Path,
    /// A station attached to points
    Location,
    /// The operation profile of a set of locations
    LocationType,
    /// A set of resources claimed as one unit
    Block,
    /// An automated guided vehicle
    Vehicle,
    /// A workflow of drive orders
    TransportOrder,
}

/// # Value-type object reference
///
/// A reference addresses a business object by class and id without holding
/// the object itself, so it can cross the process boundary and be resolved
/// back against the plant on ingress. Two resolved references are equal when
/// their class and id are equal; the name is a mutable hint and does not
/// participate in equality or hashing.
///
/// The `Placeholder` variant describes an object by name before its target
/// exists (model load phase). Resolving a placeholder after loading has been
/// sealed is an error, and the loader reports it loudly.
#[derive(Debug, Clone)]
pub enum ObjectRef {
    /// Reference to an existing object
    Resolved {
        /// Class of the referenced object
        class: ObjectClass,
        /// Raw id of the referenced object, unique within the class
        id: u64,
        /// Name hint at the time the reference was created
        name: String,
    },
    /// Forward declaration by name only, valid during model loading
    Placeholder {
        /// Class of the declared object
        class: ObjectClass,
        /// Name the object will be looked up by
        name: String,
    },
}

impl ObjectRef {
    /// The class of the referenced object.
    pub fn class(&self) -> ObjectClass {
        match self {
            Self::Resolved { class, .. } => *class,
            Self::Placeholder { class, .. } => *class,
        }
    }

    /// The name hint carried by the reference.
    pub fn name(&self) -> &str {
        match self {
            Self::Resolved { name, .. } => name,
            Self::Placeholder { name, .. } => name,
        }
    }

    /// Returns true if and only if this is a placeholder.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Resolved { class: c1, id: i1, .. },
                Self::Resolved { class: c2, id: i2, .. },
            ) => c1 == c2 && i1 == i2,
            (
                Self::Placeholder { class: c1, name: n1 },
                Self::Placeholder { class: c2, name: n2 },
            ) => c1 == c2 && n1 == n2,
            _ => false,
        }
    }
}

impl Eq for ObjectRef {}

impl Hash for ObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Resolved { class, id, .. } => {
                class.hash(state);
                id.hash(state);
            }
            Self::Placeholder { class, name } => {
                class.hash(state);
                name.hash(state);
            }
        }
    }
}

/// Plant model errors
#[derive(Error, Debug, PartialEq)]
pub enum ModelError {
    /// The referenced object does not exist in the plant
    #[error("Object is not known in the plant model: {0}")]
    ObjectUnknown(String),
    /// An object with the same id or name already exists
    #[error("An object with the same id or name exists already: {0}")]
    ObjectExists(String),
    /// A path must connect two distinct points
    #[error("Path endpoints must be two distinct points: {0}")]
    DegeneratePath(String),
    /// A path length must be a positive number of distance units
    #[error("Path length must be positive: {0}")]
    InvalidPathLength(String),
    /// The point is already occupied by another vehicle
    #[error("Point {point} is already occupied by vehicle {occupant}")]
    PointOccupied {
        /// Name of the contested point
        point: String,
        /// Name of the vehicle standing on it
        occupant: String,
    },
    /// Topology mutations are rejected while the plant is sealed
    #[error("The topology is sealed; return to modelling before editing it")]
    TopologySealed,
    /// A placeholder reference survived until after loading was sealed
    #[error("Unresolved placeholder reference: {0:?} named {1}")]
    UnresolvedPlaceholder(ObjectClass, String),
    /// A transport order state may only move towards a terminal state
    #[error("Illegal transport order transition: {0} -> {1}")]
    IllegalOrderTransition(String, String),
    /// A transport order needs at least one destination
    #[error("A transport order needs at least one destination: {0}")]
    EmptyOrder(String),
}
