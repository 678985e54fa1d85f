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

//! # Prepared plant models
//!
//! Collection of prepared plants used by tests, documentation examples,
//! and load experiments. Every constructor returns a fully built [`Plant`];
//! pass your own hub with `plant_with` when the events matter.

use crate::hub::EventHub;
use crate::model::location::Link;
use crate::model::plant::Plant;
use crate::model::point::PointKind;
use crate::model::types::{PointId, Pose, ResourceRef};

use rand::prelude::*;
use std::sync::Arc;

fn pose(x: i64, y: i64) -> Pose {
    Pose { x, y, z: 0, orientation_deg: 0.0 }
}

/// # Small loop
///
/// Four points in a one-way ring, one vehicle parked on `D`:
///
/// ```text
/// A ──▶ B
/// ▲     │
/// │     ▼
/// D ◀── C
/// ```
///
/// All paths have length 10. `D` is a parking position.
#[derive(Debug)]
pub struct SmallLoop;

impl SmallLoop {
    /// Build the plant with a private event hub.
    pub fn plant() -> Plant {
        Self::plant_with(Arc::new(EventHub::new()))
    }

    /// Build the plant broadcasting on `hub`.
    pub fn plant_with(hub: Arc<EventHub>) -> Plant {
        let mut plant = Plant::new(hub);

        let a = plant.add_point("A", PointKind::Halt, pose(0, 0)).unwrap();
        let b = plant.add_point("B", PointKind::Halt, pose(10, 0)).unwrap();
        let c = plant.add_point("C", PointKind::Halt, pose(10, 10)).unwrap();
        let d = plant.add_point("D", PointKind::Park, pose(0, 10)).unwrap();

        plant.add_path("A--B", a, b, 10).unwrap();
        plant.add_path("B--C", b, c, 10).unwrap();
        plant.add_path("C--D", c, d, 10).unwrap();
        plant.add_path("D--A", d, a, 10).unwrap();

        let agv = plant.add_vehicle("AGV-01").unwrap();
        plant.set_vehicle_position(agv, Some(d)).unwrap();

        plant
    }
}

/// # Two-aisle warehouse
///
/// A gate loop feeding two parallel aisles, a charging station, a pickup
/// and a dropoff station, and two parking positions:
///
/// ```text
///          IN ──▶ A1 ──▶ A2 ──▶ OUT
///          ▲      ▲             │
///          │      │(narrow)     ▼
/// P1 ◀──── G ◀──▶ B1 ──▶ B2 ───▶ G
/// P2 ◀──┘         CH
/// ```
///
/// The narrow crossing `A1 <-> B1` and both its endpoints form the block
/// `Narrows`, so a vehicle entering the crossing claims both aisle heads at
/// once. `Pickup` is linked to `A2`, `Dropoff` to `B2`, and the `Charger`
/// to `CH`. `AGV-01` and `AGV-02` start on the parking positions.
#[derive(Debug)]
pub struct TwoAisleWarehouse;

impl TwoAisleWarehouse {
    /// Build the plant with a private event hub.
    pub fn plant() -> Plant {
        Self::plant_with(Arc::new(EventHub::new()))
    }

    /// Build the plant broadcasting on `hub`.
    pub fn plant_with(hub: Arc<EventHub>) -> Plant {
        let mut plant = Plant::new(hub);

        let gate = plant.add_point("G", PointKind::Halt, pose(0, 50)).unwrap();
        let p_in = plant.add_point("IN", PointKind::Halt, pose(0, 0)).unwrap();
        let a1 = plant.add_point("A1", PointKind::Halt, pose(50, 0)).unwrap();
        let a2 = plant.add_point("A2", PointKind::Halt, pose(100, 0)).unwrap();
        let p_out = plant.add_point("OUT", PointKind::Halt, pose(150, 0)).unwrap();
        let b1 = plant.add_point("B1", PointKind::Halt, pose(50, 50)).unwrap();
        let b2 = plant.add_point("B2", PointKind::Halt, pose(100, 50)).unwrap();
        let ch = plant.add_point("CH", PointKind::Halt, pose(50, 100)).unwrap();
        let p1 = plant.add_point("P1", PointKind::Park, pose(-50, 50)).unwrap();
        let p2 = plant.add_point("P2", PointKind::Park, pose(-50, 100)).unwrap();

        plant.add_path("G--IN", gate, p_in, 50).unwrap();
        plant.add_path("IN--A1", p_in, a1, 50).unwrap();
        plant.add_path("A1--A2", a1, a2, 50).unwrap();
        plant.add_path("A2--OUT", a2, p_out, 50).unwrap();
        plant.add_path("OUT--B2", p_out, b2, 70).unwrap();
        plant.add_path("B2--G", b2, gate, 100).unwrap();
        plant.add_path("G--B1", gate, b1, 50).unwrap();
        plant.add_path("B1--B2", b1, b2, 50).unwrap();
        let narrow = plant.add_path("B1--A1", b1, a1, 50).unwrap();
        plant.modify_path(narrow, |p| p.set_max_reverse_velocity(500)).unwrap();
        plant.add_path("B1--CH", b1, ch, 50).unwrap();
        plant.add_path("CH--G", ch, gate, 80).unwrap();
        plant.add_path("G--P1", gate, p1, 50).unwrap();
        plant.add_path("P1--G", p1, gate, 50).unwrap();
        plant.add_path("G--P2", gate, p2, 60).unwrap();
        plant.add_path("P2--G", p2, gate, 60).unwrap();

        plant
            .add_block(
                "Narrows",
                vec![
                    ResourceRef::Path(narrow),
                    ResourceRef::Point(a1),
                    ResourceRef::Point(b1),
                ],
            )
            .unwrap();

        let charging = plant
            .add_location_type("ChargingStation", vec!["CHARGE".to_string()])
            .unwrap();
        let transfer = plant
            .add_location_type("Transfer", vec!["LOAD".to_string(), "UNLOAD".to_string()])
            .unwrap();
        plant.add_location("Charger", charging, vec![Link::new(ch)]).unwrap();
        plant.add_location("Pickup", transfer, vec![Link::new(a2)]).unwrap();
        plant.add_location("Dropoff", transfer, vec![Link::new(b2)]).unwrap();

        let agv1 = plant.add_vehicle("AGV-01").unwrap();
        let agv2 = plant.add_vehicle("AGV-02").unwrap();
        plant.set_vehicle_position(agv1, Some(p1)).unwrap();
        plant.set_vehicle_position(agv2, Some(p2)).unwrap();

        plant
    }
}

/// Generate a random ring-with-chords plant of `n_points` points and
/// `n_vehicles` vehicles, deterministically from `seed`. Used by load
/// tests; every point pair stays connected through the ring, so any order
/// over the plant is routable.
pub fn random_plant(seed: u64, n_points: usize, n_vehicles: usize) -> Plant {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut plant = Plant::new(Arc::new(EventHub::new()));
    let n_points = n_points.max(2);

    let points: Vec<PointId> = (0..n_points)
        .map(|i| {
            let kind = if i % 7 == 3 { PointKind::Park } else { PointKind::Halt };
            plant.add_point(format!("N{:03}", i), kind, pose(i as i64 * 10, 0)).unwrap()
        })
        .collect();

    for i in 0..n_points {
        let next = (i + 1) % n_points;
        let length = rng.gen_range(5, 50);
        plant
            .add_path(format!("R{:03}", i), points[i], points[next], length)
            .unwrap();
    }

    let n_chords = n_points / 3;
    for c in 0..n_chords {
        let from = rng.gen_range(0, n_points);
        let to = rng.gen_range(0, n_points);
        if from == to {
            continue;
        }
        let length = rng.gen_range(5, 80);
        plant
            .add_path(format!("X{:03}", c), points[from], points[to], length)
            .unwrap();
    }

    for v in 0..n_vehicles.min(n_points) {
        let vehicle = plant.add_vehicle(format!("AGV-{:02}", v)).unwrap();
        plant.set_vehicle_position(vehicle, Some(points[v])).unwrap();
    }

    plant
}
