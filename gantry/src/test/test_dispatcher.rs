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

//! Test the dispatcher: assignment, progression, withdrawal, failure,
//! recharge and parking order generation.

use crate::dispatch::DispatcherConfig;
use crate::hub::EventHub;
use crate::model::event::{Event, ObjectSnapshot};
use crate::model::location::Link;
use crate::model::order::{Destination, OrderState};
use crate::model::plant::Plant;
use crate::model::point::PointKind;
use crate::model::types::{OrderId, PointId, Pose, ResourceRef, VehicleId};
use crate::model::vehicle::ProcState;
use crate::test::util::Rig;

use maplit::btreeset;
use std::sync::Arc;

fn config(parking_enabled: bool) -> DispatcherConfig {
    DispatcherConfig { archive_horizon_ms: 3_600_000, parking_enabled }
}

/// One-way ring `A -> B -> C -> A`, all lengths 10, one vehicle on `A`.
fn ring_plant() -> (Plant, VehicleId, PointId, PointId, PointId) {
    let mut plant = Plant::new(Arc::new(EventHub::new()));
    let a = plant.add_point("A", PointKind::Halt, Pose::default()).unwrap();
    let b = plant.add_point("B", PointKind::Halt, Pose::default()).unwrap();
    let c = plant.add_point("C", PointKind::Halt, Pose::default()).unwrap();
    plant.add_path("A--B", a, b, 10).unwrap();
    plant.add_path("B--C", b, c, 10).unwrap();
    plant.add_path("C--A", c, a, 10).unwrap();
    let agv = plant.add_vehicle("AGV-01").unwrap();
    plant.set_vehicle_position(agv, Some(a)).unwrap();
    (plant, agv, a, b, c)
}

fn create_order(rig: &Rig, name: &str, destinations: Vec<Destination>) -> OrderId {
    let mut plant = rig.plant.write().unwrap();
    plant.create_order(name, destinations, 0).unwrap()
}

#[test]
fn test_assign_and_finish_simple_order() {
    let (plant, agv, a, b, _c) = ring_plant();
    let rig = Rig::new(plant, config(false));
    let adapter = rig.attach_manual(agv);
    rig.start_operating();
    adapter.report_ready();
    rig.pump();

    let order = create_order(&rig, "TO-1", vec![Destination::point(b)]);
    rig.cycle();

    // assigned: the order is being processed, the first step is claimed and
    // commanded
    let snapshot = rig.order(order);
    assert_eq!(snapshot.state(), OrderState::BeingProcessed);
    assert_eq!(snapshot.processing_vehicle(), Some(agv));
    let vehicle = rig.vehicle(agv);
    assert_eq!(vehicle.proc_state(), ProcState::ProcessingOrder);
    assert_eq!(vehicle.next_position(), Some(b));
    assert!(rig
        .scheduler
        .allocated_by(agv)
        .contains(&ResourceRef::Point(b)));
    assert_eq!(adapter.pending_commands(), 1);

    // the vehicle reaches B: the order finishes, everything behind is
    // released, only the standing point stays claimed
    assert!(adapter.step());
    rig.pump();

    assert_eq!(rig.order(order).state(), OrderState::Finished);
    let vehicle = rig.vehicle(agv);
    assert_eq!(vehicle.position(), Some(b));
    assert_eq!(vehicle.proc_state(), ProcState::Idle);
    assert_eq!(rig.scheduler.allocated_by(agv), btreeset! {ResourceRef::Point(b)});
    assert_eq!(vehicle.allocated_resources_union(), btreeset! {ResourceRef::Point(b)});
    // the selected route is gone once the vehicle stops processing
    assert!(rig.router.read().unwrap().selected_routes().is_empty());
    let _ = a;
}

#[test]
fn test_cheapest_candidate_wins() {
    let mut plant = Plant::new(Arc::new(EventHub::new()));
    let far = plant.add_point("FAR", PointKind::Halt, Pose::default()).unwrap();
    let near = plant.add_point("NEAR", PointKind::Halt, Pose::default()).unwrap();
    let goal = plant.add_point("GOAL", PointKind::Halt, Pose::default()).unwrap();
    plant.add_path("FAR--GOAL", far, goal, 100).unwrap();
    plant.add_path("NEAR--GOAL", near, goal, 10).unwrap();
    let v1 = plant.add_vehicle("V1").unwrap();
    let v2 = plant.add_vehicle("V2").unwrap();
    plant.set_vehicle_position(v1, Some(far)).unwrap();
    plant.set_vehicle_position(v2, Some(near)).unwrap();

    let rig = Rig::new(plant, config(false));
    let a1 = rig.attach_manual(v1);
    let a2 = rig.attach_manual(v2);
    rig.start_operating();
    a1.report_ready();
    a2.report_ready();
    rig.pump();

    let order = create_order(&rig, "TO-1", vec![Destination::point(goal)]);
    rig.cycle();

    assert_eq!(rig.order(order).processing_vehicle(), Some(v2));
    assert_eq!(rig.vehicle(v1).proc_state(), ProcState::Idle);
}

#[test]
fn test_intended_vehicle_preferred_over_cheaper() {
    let mut plant = Plant::new(Arc::new(EventHub::new()));
    let far = plant.add_point("FAR", PointKind::Halt, Pose::default()).unwrap();
    let near = plant.add_point("NEAR", PointKind::Halt, Pose::default()).unwrap();
    let goal = plant.add_point("GOAL", PointKind::Halt, Pose::default()).unwrap();
    plant.add_path("FAR--GOAL", far, goal, 100).unwrap();
    plant.add_path("NEAR--GOAL", near, goal, 10).unwrap();
    let v1 = plant.add_vehicle("V1").unwrap();
    let v2 = plant.add_vehicle("V2").unwrap();
    plant.set_vehicle_position(v1, Some(far)).unwrap();
    plant.set_vehicle_position(v2, Some(near)).unwrap();

    let rig = Rig::new(plant, config(false));
    let a1 = rig.attach_manual(v1);
    let a2 = rig.attach_manual(v2);
    rig.start_operating();
    a1.report_ready();
    a2.report_ready();
    rig.pump();

    let order = {
        let mut plant = rig.plant.write().unwrap();
        let order = plant.create_order("TO-1", vec![Destination::point(goal)], 0).unwrap();
        plant.modify_order(order, |o| o.set_intended_vehicle(Some(v1))).unwrap();
        order
    };
    rig.cycle();

    // the intended vehicle wins although it is the more expensive candidate
    assert_eq!(rig.order(order).processing_vehicle(), Some(v1));
}

#[test]
fn test_withdrawal_mid_order() {
    let (plant, agv, a, b, c) = ring_plant();
    let rig = Rig::new(plant, config(false));
    let adapter = rig.attach_manual(agv);
    rig.start_operating();
    adapter.report_ready();
    rig.pump();

    let order = create_order(
        &rig,
        "TO-1",
        vec![Destination::point(b), Destination::point(c), Destination::point(a)],
    );
    rig.cycle();

    // leg 1 done: the vehicle stands on B and is commanded towards C
    assert!(adapter.step());
    rig.pump();
    assert_eq!(rig.vehicle(agv).position(), Some(b));
    assert_eq!(rig.vehicle(agv).next_position(), Some(c));

    // the withdrawal arrives while the movement is in flight
    rig.plant.write().unwrap().modify_order(order, |o| o.request_withdrawal()).unwrap();
    rig.cycle();
    // not interrupted mid-step
    assert_eq!(rig.order(order).state(), OrderState::BeingProcessed);

    let mark = rig.recorded().len();
    // the step completes; the withdrawal is carried out at the boundary
    assert!(adapter.step());
    rig.pump();

    assert_eq!(rig.order(order).state(), OrderState::Withdrawn);
    let vehicle = rig.vehicle(agv);
    assert_eq!(vehicle.proc_state(), ProcState::Idle);
    assert!(vehicle.allocated_resources().is_empty());
    assert!(rig.scheduler.allocated_by(agv).is_empty());

    // events arrive in order: order withdrawn, vehicle idle, scheduler
    let tail = &rig.recorded()[mark..];
    let order_changed = tail.iter().position(|e| match e {
        Event::ObjectChanged { after: ObjectSnapshot::TransportOrder(o), .. } => {
            o.state() == OrderState::Withdrawn
        }
        _ => false,
    });
    let vehicle_idle = tail.iter().position(|e| match e {
        Event::ObjectChanged { after: ObjectSnapshot::Vehicle(v), .. } => {
            v.proc_state() == ProcState::Idle
        }
        _ => false,
    });
    let scheduler_changed =
        tail.iter().position(|e| matches!(e, Event::SchedulerChanged(v) if *v == agv));
    let order_changed = order_changed.expect("order change event");
    let vehicle_idle = vehicle_idle.expect("vehicle change event");
    let scheduler_changed = scheduler_changed.expect("scheduler change event");
    assert!(order_changed < vehicle_idle, "order change must precede vehicle change");
    assert!(vehicle_idle < scheduler_changed, "vehicle change must precede scheduler change");
}

#[test]
fn test_withdraw_unassigned_order() {
    let (plant, agv, _a, b, _c) = ring_plant();
    let rig = Rig::new(plant, config(false));
    let _adapter = rig.attach_manual(agv);
    rig.start_operating();
    // the vehicle never reports ready, so the order stays unassigned
    let order = create_order(&rig, "TO-1", vec![Destination::point(b)]);
    rig.plant.write().unwrap().modify_order(order, |o| o.request_withdrawal()).unwrap();
    rig.cycle();
    assert_eq!(rig.order(order).state(), OrderState::Withdrawn);
}

#[test]
fn test_vehicle_error_fails_order_and_frees_resources() {
    let (plant, agv, _a, b, c) = ring_plant();
    let rig = Rig::new(plant, config(false));
    let adapter = rig.attach_manual(agv);
    rig.start_operating();
    adapter.report_ready();
    rig.pump();

    let order = create_order(&rig, "TO-1", vec![Destination::point(b), Destination::point(c)]);
    rig.cycle();
    assert_eq!(rig.order(order).state(), OrderState::BeingProcessed);

    adapter.report_failure("HW", "drive controller fault");
    rig.pump();

    assert_eq!(rig.order(order).state(), OrderState::Failed);
    let vehicle = rig.vehicle(agv);
    assert_eq!(vehicle.proc_state(), ProcState::Idle);
    assert_eq!(vehicle.state(), crate::model::vehicle::VehicleState::Error);
    assert!(rig.scheduler.allocated_by(agv).is_empty());
    assert!(rig
        .recorded()
        .iter()
        .any(|e| matches!(e, Event::Message { level: crate::model::event::MessageLevel::Error, .. })));
}

#[test]
fn test_two_vehicles_share_a_corridor() {
    // X -> M -> Y for V1, P -> M -> Q for V2; M is contested
    let mut plant = Plant::new(Arc::new(EventHub::new()));
    let x = plant.add_point("X", PointKind::Halt, Pose::default()).unwrap();
    let y = plant.add_point("Y", PointKind::Halt, Pose::default()).unwrap();
    let p = plant.add_point("P", PointKind::Halt, Pose::default()).unwrap();
    let q = plant.add_point("Q", PointKind::Halt, Pose::default()).unwrap();
    let m = plant.add_point("M", PointKind::Halt, Pose::default()).unwrap();
    plant.add_path("X--M", x, m, 10).unwrap();
    plant.add_path("M--Y", m, y, 10).unwrap();
    plant.add_path("P--M", p, m, 10).unwrap();
    plant.add_path("M--Q", m, q, 10).unwrap();
    let v1 = plant.add_vehicle("V1").unwrap();
    let v2 = plant.add_vehicle("V2").unwrap();
    plant.set_vehicle_position(v1, Some(x)).unwrap();
    plant.set_vehicle_position(v2, Some(p)).unwrap();

    let rig = Rig::new(plant, config(false));
    let a1 = rig.attach_manual(v1);
    let a2 = rig.attach_manual(v2);
    rig.start_operating();
    a1.report_ready();
    a2.report_ready();
    rig.pump();

    let o1 = create_order(&rig, "TO-1", vec![Destination::point(y)]);
    let o2 = create_order(&rig, "TO-2", vec![Destination::point(q)]);
    rig.cycle();

    // both orders are assigned, but only one vehicle may enter M
    assert_eq!(rig.order(o1).state(), OrderState::BeingProcessed);
    assert_eq!(rig.order(o2).state(), OrderState::BeingProcessed);
    let moving = [rig.vehicle(v1), rig.vehicle(v2)]
        .iter()
        .filter(|v| v.next_position().is_some())
        .count();
    assert_eq!(moving, 1, "exactly one vehicle may move towards M");

    rig.run_until_settled(&[a1, a2], 50);

    assert_eq!(rig.order(o1).state(), OrderState::Finished);
    assert_eq!(rig.order(o2).state(), OrderState::Finished);
    assert_eq!(rig.vehicle(v1).position(), Some(y));
    assert_eq!(rig.vehicle(v2).position(), Some(q));
}

#[test]
fn test_recharge_order_created_and_executed() {
    let mut plant = Plant::new(Arc::new(EventHub::new()));
    let s = plant.add_point("S", PointKind::Halt, Pose::default()).unwrap();
    let ch = plant.add_point("CH", PointKind::Halt, Pose::default()).unwrap();
    plant.add_path("S--CH", s, ch, 10).unwrap();
    let charging = plant.add_location_type("ChargingStation", vec!["CHARGE".to_string()]).unwrap();
    plant.add_location("Charger", charging, vec![Link::new(ch)]).unwrap();
    let agv = plant.add_vehicle("AGV-01").unwrap();
    plant.set_vehicle_position(agv, Some(s)).unwrap();
    plant.modify_vehicle(agv, |v| v.set_energy_level(10)).unwrap();

    let rig = Rig::new(plant, config(false));
    let adapter = rig.attach_manual(agv);
    rig.start_operating();
    adapter.report_ready();
    rig.pump();

    rig.cycle();
    let recharge: Vec<_> = rig
        .plant
        .read()
        .unwrap()
        .orders()
        .filter(|o| o.is_auto_generated())
        .map(|o| o.id())
        .collect();
    assert_eq!(recharge.len(), 1);
    let order = rig.order(recharge[0]);
    assert!(order.is_recharge_order("CHARGE"));
    assert_eq!(order.intended_vehicle(), Some(agv));

    rig.run_until_settled(&[adapter], 50);

    let order = rig.order(recharge[0]);
    assert_eq!(order.state(), OrderState::Finished);
    let vehicle = rig.vehicle(agv);
    assert_eq!(vehicle.position(), Some(ch));
    // the loopback vehicle reports a full battery after charging
    assert_eq!(vehicle.energy_level(), 100);
    // no second recharge order appears now that energy is good again
    rig.cycle();
    let autos = rig
        .plant
        .read()
        .unwrap()
        .orders()
        .filter(|o| o.is_auto_generated() && !o.state().is_terminal())
        .count();
    assert_eq!(autos, 0);
}

#[test]
fn test_parking_order_created_for_idle_vehicle() {
    let plant = crate::plant_models::SmallLoop::plant();
    let agv = plant.vehicle_by_name("AGV-01").unwrap();
    let b = plant.point_by_name("B").unwrap();
    let d = plant.point_by_name("D").unwrap();

    let rig = Rig::new(plant, config(true));
    {
        // move the vehicle off its parking position first
        let mut plant = rig.plant.write().unwrap();
        plant.set_vehicle_position(agv, Some(b)).unwrap();
    }
    let adapter = rig.attach_manual(agv);
    rig.start_operating();
    adapter.report_ready();
    rig.pump();

    rig.run_until_settled(&[adapter], 50);

    // the vehicle was sent to the free parking position
    assert_eq!(rig.vehicle(agv).position(), Some(d));
    let plant = rig.plant.read().unwrap();
    assert!(plant
        .orders()
        .all(|o| o.is_auto_generated() && o.state() == OrderState::Finished));
    assert!(plant.orders().count() >= 1);
}

#[test]
fn test_garbage_collection_after_horizon() {
    let (plant, agv, _a, b, _c) = ring_plant();
    let rig = Rig::new(
        plant,
        DispatcherConfig { archive_horizon_ms: 0, parking_enabled: false },
    );
    let adapter = rig.attach_manual(agv);
    rig.start_operating();
    adapter.report_ready();
    rig.pump();

    let order = create_order(&rig, "TO-1", vec![Destination::point(b)]);
    rig.cycle();
    assert!(adapter.step());
    rig.pump();
    assert_eq!(rig.order(order).state(), OrderState::Finished);

    // with a zero horizon the next pass collects the terminal order
    rig.cycle();
    assert!(rig.plant.read().unwrap().order(order).is_err());
}

#[test]
fn test_dependencies_gate_dispatch() {
    let (plant, agv, a, b, _c) = ring_plant();
    let rig = Rig::new(plant, config(false));
    let adapter = rig.attach_manual(agv);
    rig.start_operating();
    adapter.report_ready();
    rig.pump();

    let (first, second) = {
        let mut plant = rig.plant.write().unwrap();
        let first = plant.create_order("TO-1", vec![Destination::point(b)], 0).unwrap();
        let second = plant.create_order("TO-2", vec![Destination::point(a)], 0).unwrap();
        plant
            .modify_order(second, |o| o.set_dependencies(btreeset! {first}))
            .unwrap();
        (first, second)
    };
    rig.cycle();

    // the dependent order is not even activated while TO-1 lives
    assert_eq!(rig.order(first).state(), OrderState::BeingProcessed);
    assert_eq!(rig.order(second).state(), OrderState::Raw);

    rig.run_until_settled(&[adapter], 50);

    assert_eq!(rig.order(first).state(), OrderState::Finished);
    assert_eq!(rig.order(second).state(), OrderState::Finished);
    assert_eq!(rig.vehicle(agv).position(), Some(a));
}

#[test]
fn test_wrapping_sequence_withdrawal_propagation() {
    let (plant, agv, _a, b, c) = ring_plant();
    let rig = Rig::new(plant, config(false));
    let adapter = rig.attach_manual(agv);
    rig.start_operating();
    adapter.report_ready();
    rig.pump();

    let (first, second) = {
        let mut plant = rig.plant.write().unwrap();
        let first = plant.create_order("SEQ-1", vec![Destination::point(b)], 0).unwrap();
        let second = plant.create_order("SEQ-2", vec![Destination::point(c)], 0).unwrap();
        plant.modify_order(first, |o| o.set_wrapping_sequence(Some(second))).unwrap();
        plant
            .modify_order(second, |o| o.set_dependencies(btreeset! {first}))
            .unwrap();
        (first, second)
    };
    rig.cycle();
    assert_eq!(rig.order(first).state(), OrderState::BeingProcessed);

    // the first order fails; the failure pulls the successor with it
    adapter.report_failure("HW", "lost guidance");
    rig.pump();
    assert_eq!(rig.order(first).state(), OrderState::Failed);
    rig.cycle();
    assert_eq!(rig.order(second).state(), OrderState::Withdrawn);
}
