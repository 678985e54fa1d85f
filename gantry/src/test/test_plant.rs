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

//! Test the object pool behaviour of the plant, without dispatching.

use crate::hub::EventHub;
use crate::model::event::{Event, ObjectSnapshot};
use crate::model::order::{Destination, OrderState};
use crate::model::plant::Plant;
use crate::model::point::PointKind;
use crate::model::types::{ModelError, Pose, ResourceRef};
use crate::model::vehicle::ProcState;
use crate::plant_models::SmallLoop;
use crate::test::util::record_events;

use maplit::btreeset;
use std::sync::Arc;

fn empty_plant() -> Plant {
    Plant::new(Arc::new(EventHub::new()))
}

#[test]
fn test_duplicate_names_rejected() {
    let mut plant = empty_plant();
    plant.add_point("A", PointKind::Halt, Pose::default()).unwrap();
    assert_eq!(
        plant.add_point("A", PointKind::Halt, Pose::default()),
        Err(ModelError::ObjectExists("A".to_string()))
    );
    // the same name is free in another class
    plant.add_vehicle("A").unwrap();
    assert_eq!(plant.add_vehicle("A"), Err(ModelError::ObjectExists("A".to_string())));
}

#[test]
fn test_path_validation() {
    let mut plant = empty_plant();
    let a = plant.add_point("A", PointKind::Halt, Pose::default()).unwrap();
    let b = plant.add_point("B", PointKind::Halt, Pose::default()).unwrap();
    assert_eq!(
        plant.add_path("loop", a, a, 10),
        Err(ModelError::DegeneratePath("loop".to_string()))
    );
    assert_eq!(
        plant.add_path("flat", a, b, 0),
        Err(ModelError::InvalidPathLength("flat".to_string()))
    );
    let path = plant.add_path("A--B", a, b, 10).unwrap();
    assert_eq!(plant.point(a).unwrap().outgoing_paths(), &btreeset! {path});
    assert_eq!(plant.point(b).unwrap().incoming_paths(), &btreeset! {path});
}

#[test]
fn test_name_lookup() {
    let plant = SmallLoop::plant();
    let a = plant.point_by_name("A").unwrap();
    assert_eq!(plant.point(a).unwrap().name(), "A");
    let agv = plant.vehicle_by_name("AGV-01").unwrap();
    assert_eq!(plant.vehicle(agv).unwrap().name(), "AGV-01");
    plant.point_by_name("nope").unwrap_err();
}

#[test]
fn test_occupancy_invariant() {
    let mut plant = empty_plant();
    let a = plant.add_point("A", PointKind::Halt, Pose::default()).unwrap();
    let v1 = plant.add_vehicle("V1").unwrap();
    let v2 = plant.add_vehicle("V2").unwrap();

    plant.set_vehicle_position(v1, Some(a)).unwrap();
    assert_eq!(plant.point(a).unwrap().occupying_vehicle(), Some(v1));

    // a second vehicle cannot stand on the same point
    assert!(matches!(
        plant.set_vehicle_position(v2, Some(a)),
        Err(ModelError::PointOccupied { .. })
    ));

    // moving the first away frees the point
    plant.set_vehicle_position(v1, None).unwrap();
    assert_eq!(plant.point(a).unwrap().occupying_vehicle(), None);
    plant.set_vehicle_position(v2, Some(a)).unwrap();
}

#[test]
fn test_mutation_events_carry_images() {
    let mut plant = empty_plant();
    let events = record_events(plant.hub());
    let v = plant.add_vehicle("V1").unwrap();
    plant.modify_vehicle(v, |vehicle| vehicle.set_energy_level(40)).unwrap();

    let recorded = events.lock().unwrap();
    match &recorded[0] {
        Event::ObjectCreated(ObjectSnapshot::Vehicle(created)) => {
            assert_eq!(created.name(), "V1");
        }
        other => panic!("expected vehicle creation, got {:?}", other),
    }
    match &recorded[1] {
        Event::ObjectChanged {
            before: ObjectSnapshot::Vehicle(before),
            after: ObjectSnapshot::Vehicle(after),
        } => {
            assert_eq!(before.energy_level(), 100);
            assert_eq!(after.energy_level(), 40);
        }
        other => panic!("expected vehicle change, got {:?}", other),
    }
}

#[test]
fn test_sealed_topology_rejects_edits() {
    let mut plant = SmallLoop::plant();
    plant.seal();
    assert_eq!(
        plant.add_point("X", PointKind::Halt, Pose::default()),
        Err(ModelError::TopologySealed)
    );
    // path attribute edits stay legal while sealed
    let path = plant.path_by_name("A--B").unwrap();
    plant.modify_path(path, |p| p.set_locked(true)).unwrap();
    assert!(plant.path(path).unwrap().is_locked());
    plant.unseal();
    plant.add_point("X", PointKind::Halt, Pose::default()).unwrap();
}

#[test]
fn test_block_closure_fixpoint() {
    let mut plant = empty_plant();
    let a = plant.add_point("A", PointKind::Halt, Pose::default()).unwrap();
    let b = plant.add_point("B", PointKind::Halt, Pose::default()).unwrap();
    let c = plant.add_point("C", PointKind::Halt, Pose::default()).unwrap();
    plant.add_block("AB", vec![ResourceRef::Point(a), ResourceRef::Point(b)]).unwrap();
    plant.add_block("BC", vec![ResourceRef::Point(b), ResourceRef::Point(c)]).unwrap();

    // chained blocks expand transitively: A pulls B, B pulls C
    let closure = plant.block_closure(&btreeset! {ResourceRef::Point(a)});
    assert_eq!(
        closure,
        btreeset! {ResourceRef::Point(a), ResourceRef::Point(b), ResourceRef::Point(c)}
    );
}

#[test]
fn test_order_lifecycle_monotonic() {
    let mut plant = SmallLoop::plant();
    let b = plant.point_by_name("B").unwrap();
    let order = plant.create_order("TO-1", vec![Destination::point(b)], 0).unwrap();

    plant.transition_order(order, OrderState::Active).unwrap();
    plant.transition_order(order, OrderState::BeingProcessed).unwrap();
    plant.transition_order(order, OrderState::Finished).unwrap();
    assert!(plant.order(order).unwrap().finished().is_some());

    // terminal states are final
    assert!(matches!(
        plant.transition_order(order, OrderState::Active),
        Err(ModelError::IllegalOrderTransition(_, _))
    ));
}

#[test]
fn test_empty_order_rejected() {
    let mut plant = SmallLoop::plant();
    assert_eq!(
        plant.create_order("TO-1", vec![], 0),
        Err(ModelError::EmptyOrder("TO-1".to_string()))
    );
}

#[test]
fn test_clear_topology_keeps_vehicles() {
    let mut plant = SmallLoop::plant();
    let agv = plant.vehicle_by_name("AGV-01").unwrap();
    let b = plant.point_by_name("B").unwrap();
    plant.create_order("TO-1", vec![Destination::point(b)], 0).unwrap();

    plant.clear_topology();

    assert_eq!(plant.points().count(), 0);
    assert_eq!(plant.paths().count(), 0);
    assert_eq!(plant.orders().count(), 0);
    let vehicle = plant.vehicle(agv).unwrap();
    assert_eq!(vehicle.position(), None);
    assert_eq!(vehicle.proc_state(), ProcState::Idle);

    // names of destroyed objects are free again
    plant.add_point("A", PointKind::Halt, Pose::default()).unwrap();
}
