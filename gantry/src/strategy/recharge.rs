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

//! Module selecting charging stations for low-energy vehicles.

use crate::model::plant::Plant;
use crate::model::types::LocationId;
use crate::model::vehicle::Vehicle;
use crate::routing::Router;
use crate::strategy::point_contested;

use log::*;

/// Picks the charging station a low-energy vehicle should head for: the
/// reachable, uncontested location offering the vehicle's recharge
/// operation with the lowest route cost from the vehicle's position. Ties
/// are broken by the lower location id.
#[derive(Debug, Default)]
pub struct RechargeStrategy;

impl RechargeStrategy {
    /// Create the strategy.
    pub fn new() -> Self {
        Self
    }

    /// Select a charging station for `vehicle`, or `None` when every
    /// candidate is contested or unreachable.
    pub fn select_location(
        &self,
        plant: &Plant,
        router: &Router,
        vehicle: &Vehicle,
    ) -> Option<LocationId> {
        let position = vehicle.position()?;
        let operation = vehicle.recharge_operation();

        let mut best: Option<(u64, LocationId)> = None;
        for location in plant.locations() {
            let location_type = match plant.location_type(location.type_id()) {
                Ok(t) => t,
                Err(_) => continue,
            };
            if !location_type.allows_operation(operation) {
                continue;
            }
            for link in location.links() {
                if !link.permits(operation) {
                    continue;
                }
                if point_contested(plant, router, vehicle, link.point) {
                    trace!(
                        "Skipping contested access point of {} for {}",
                        location.name(),
                        vehicle.name()
                    );
                    continue;
                }
                let cost = router.costs(vehicle.id(), position, link.point);
                if cost == crate::model::types::COST_INFINITY {
                    continue;
                }
                let candidate = (cost, location.id());
                if best.map(|b| candidate < b).unwrap_or(true) {
                    best = Some(candidate);
                }
            }
        }
        best.map(|(_, location)| location)
    }
}
