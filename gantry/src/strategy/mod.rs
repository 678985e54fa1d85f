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

//! # Destination strategies
//!
//! Strategies pick destinations for vehicles that have nothing to do: a
//! charging station when the energy level is critical, a parking position
//! otherwise. Both consult the router's cost tables and the live targeting
//! state so that two vehicles are never sent towards the same contested
//! spot.

mod parking;
mod recharge;

pub use parking::ParkingStrategy;
pub use recharge::RechargeStrategy;

use crate::model::plant::Plant;
use crate::model::types::{PointId, ResourceRef};
use crate::model::vehicle::Vehicle;
use crate::routing::Router;
use std::collections::BTreeSet;

/// True if the block closure of `point` contains any point that is occupied
/// by a vehicle other than `vehicle`, or targeted by any vehicle's selected
/// route. Such a point is contested and no strategy sends a vehicle there.
pub(crate) fn point_contested(
    plant: &Plant,
    router: &Router,
    vehicle: &Vehicle,
    point: PointId,
) -> bool {
    let mut seed = BTreeSet::new();
    seed.insert(ResourceRef::Point(point));
    let closure = plant.block_closure(&seed);
    let targeted = router.targeted_points();
    for resource in closure {
        let member = match resource {
            ResourceRef::Point(p) => p,
            ResourceRef::Path(_) => continue,
        };
        if targeted.contains(&member) {
            return true;
        }
        if let Ok(entry) = plant.point(member) {
            match entry.occupying_vehicle() {
                Some(occupant) if occupant != vehicle.id() => return true,
                _ => {}
            }
        }
    }
    false
}
