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

//! Module selecting parking positions for idle vehicles.

use crate::model::plant::Plant;
use crate::model::types::PointId;
use crate::model::vehicle::Vehicle;
use crate::routing::Router;
use crate::strategy::point_contested;

/// Picks the parking position an idle vehicle should head for: the nearest
/// point flagged as a parking position whose block closure overlaps no
/// occupied or targeted point. Ties are broken by the lower point id. When
/// every parking position is contested or unreachable, the vehicle stays
/// where it is.
#[derive(Debug, Default)]
pub struct ParkingStrategy;

impl ParkingStrategy {
    /// Create the strategy.
    pub fn new() -> Self {
        Self
    }

    /// Select a parking position for `vehicle`, or `None` to leave it in
    /// place.
    pub fn select_point(
        &self,
        plant: &Plant,
        router: &Router,
        vehicle: &Vehicle,
    ) -> Option<PointId> {
        let position = vehicle.position()?;

        let mut best: Option<(u64, PointId)> = None;
        for point in plant.points() {
            if !point.is_parking_position() || point.id() == position {
                continue;
            }
            if point_contested(plant, router, vehicle, point.id()) {
                continue;
            }
            let cost = router.costs(vehicle.id(), position, point.id());
            if cost == crate::model::types::COST_INFINITY {
                continue;
            }
            let candidate = (cost, point.id());
            if best.map(|b| candidate < b).unwrap_or(true) {
                best = Some(candidate);
            }
        }
        best.map(|(_, point)| point)
    }
}
