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

//! # Plant model
//!
//! The plant model is the static topology plus the live business objects of
//! a transport installation: points and paths (as a directed graph),
//! stations with typed operations, blocks, vehicles, and transport orders.
//! The central structure is the [`Plant`], the single owner and writer of
//! all of them.
//!
//! ## Example usage
//!
//! The following example builds a tiny plant with two points connected by a
//! path, and a vehicle standing on the first point.
//!
//! ```rust
//! use gantry::hub::EventHub;
//! use gantry::model::{Plant, PointKind, Pose};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut plant = Plant::new(Arc::new(EventHub::new()));
//!
//!     let a = plant.add_point("A", PointKind::Halt, Pose::default())?;
//!     let b = plant.add_point("B", PointKind::Halt, Pose::default())?;
//!     plant.add_path("A--B", a, b, 10)?;
//!
//!     let agv = plant.add_vehicle("AGV-01")?;
//!     plant.set_vehicle_position(agv, Some(a))?;
//!
//!     assert_eq!(plant.point(a)?.occupying_vehicle(), Some(agv));
//!     Ok(())
//! }
//! ```

pub mod block;
pub mod event;
pub mod location;
pub mod order;
pub mod path;
pub mod plant;
pub mod point;
pub mod printer;
pub mod types;
pub mod vehicle;

pub use block::Block;
pub use event::{Event, MessageLevel, ObjectSnapshot};
pub use location::{Link, Location, LocationType};
pub use order::{
    now_millis, Destination, DestinationRef, DriveOrder, DriveOrderState, OrderState, Route, Step,
    TransportOrder, VehicleOrientation, OP_NOP,
};
pub use path::{Path, PROP_ROUTING_PENALTY, PROP_TRAVEL_ORIENTATION};
pub use plant::Plant;
pub use point::{Point, PointKind};
pub use types::{
    BlockId, LocationId, LocationTypeId, ModelError, ObjectClass, ObjectRef, OrderId, PathId,
    PlantGraph, PointId, Pose, ResourceRef, RouteCost, VehicleId, COST_INFINITY,
};
pub use vehicle::{ProcState, Vehicle, VehicleState, DEFAULT_RECHARGE_OPERATION};
