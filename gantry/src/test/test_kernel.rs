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

//! Test the kernel state machine and the end-to-end order flow through the
//! dispatcher worker.

use crate::dispatch::DispatcherConfig;
use crate::error::Error;
use crate::exchange::order_set::{
    DestinationSpec, OrderSetDocument, ScriptSpec, TransportEntry, TransportSpec,
};
use crate::hub::QueueEntry;
use crate::kernel::{Kernel, KernelConfig, KernelState};
use crate::model::event::Event;
use crate::model::location::Link;
use crate::model::order::{Destination, OrderState};
use crate::model::point::PointKind;
use crate::model::types::{Pose, VehicleId};
use crate::routing::DistanceEvaluator;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn quiet_config() -> KernelConfig {
    KernelConfig {
        dispatcher: DispatcherConfig { parking_enabled: false, ..Default::default() },
    }
}

/// `A --10--> B`, a `Pickup` station on `B`, one vehicle on `A`.
fn build_line_plant(kernel: &Arc<Kernel>) -> VehicleId {
    let plant = kernel.plant();
    let mut plant = plant.write().unwrap();
    let a = plant.add_point("A", PointKind::Halt, Pose::default()).unwrap();
    let b = plant.add_point("B", PointKind::Halt, Pose::default()).unwrap();
    plant.add_path("A--B", a, b, 10).unwrap();
    let transfer = plant.add_location_type("Transfer", vec!["LOAD".to_string()]).unwrap();
    plant.add_location("Pickup", transfer, vec![Link::new(b)]).unwrap();
    let agv = plant.add_vehicle("AGV-01").unwrap();
    plant.set_vehicle_position(agv, Some(a)).unwrap();
    agv
}

fn wait_until<F: Fn() -> bool>(what: &str, timeout: Duration, condition: F) {
    let deadline = Instant::now() + timeout;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_state_machine_guards() {
    let kernel = Kernel::new(quiet_config(), Box::new(DistanceEvaluator));
    assert_eq!(kernel.state(), KernelState::Modelling);

    // an empty topology cannot operate
    assert!(matches!(
        kernel.set_state(KernelState::Operating),
        Err(Error::IllegalStateTransition { .. })
    ));

    build_line_plant(&kernel);
    kernel.set_state(KernelState::Operating).unwrap();
    assert_eq!(kernel.state(), KernelState::Operating);
    assert!(kernel.plant().read().unwrap().is_sealed());

    // nothing is running, so we may return to modelling; the topology is
    // destroyed and the vehicles persist
    kernel.set_state(KernelState::Modelling).unwrap();
    {
        let plant = kernel.plant();
        let plant = plant.read().unwrap();
        assert_eq!(plant.points().count(), 0);
        assert_eq!(plant.vehicles().count(), 1);
        assert!(!plant.is_sealed());
    }

    kernel.set_state(KernelState::Shutdown).unwrap();
    assert!(matches!(
        kernel.set_state(KernelState::Operating),
        Err(Error::IllegalStateTransition { .. })
    ));
}

#[test]
fn test_operations_gated_by_state() {
    let kernel = Kernel::new(quiet_config(), Box::new(DistanceEvaluator));
    let agv = build_line_plant(&kernel);

    // orders cannot be submitted while modelling
    let refused = kernel.submit_transport_order(
        None,
        vec![Destination::point(kernel.plant().read().unwrap().point_by_name("B").unwrap())],
        Some(agv),
        0,
        BTreeSet::new(),
        None,
    );
    assert!(matches!(refused, Err(Error::UnsupportedOperation(_))));

    // plant documents cannot be loaded while operating
    kernel.set_state(KernelState::Operating).unwrap();
    let document = kernel.dump_plant_document().unwrap();
    assert!(matches!(
        kernel.load_plant_document(&document),
        Err(Error::UnsupportedOperation(_))
    ));

    // nothing works after shutdown
    kernel.set_state(KernelState::Shutdown).unwrap();
    assert!(matches!(
        kernel.submit_order_set(&OrderSetDocument::new()),
        Err(Error::KernelUnavailable(_))
    ));
}

#[test]
fn test_end_to_end_order_execution() {
    let kernel = Kernel::new(quiet_config(), Box::new(DistanceEvaluator));
    let agv = build_line_plant(&kernel);
    let adapter = kernel.attach_loopback_vehicle(agv, true);

    kernel.set_state(KernelState::Operating).unwrap();
    adapter.report_ready();

    let mut order_set = OrderSetDocument::new();
    order_set.transports.push(TransportEntry::Transport(TransportSpec {
        name: Some("TO-1".to_string()),
        deadline_ms: 0,
        intended_vehicle: Some("AGV-01".to_string()),
        destinations: vec![DestinationSpec {
            location: "Pickup".to_string(),
            operation: "LOAD".to_string(),
            properties: Default::default(),
        }],
        dependencies: vec![],
    }));
    let created = kernel.submit_order_set(&order_set).unwrap();
    assert_eq!(created.len(), 1);

    wait_until("the order to finish", Duration::from_secs(10), || {
        kernel.all_orders_terminal()
    });

    {
        let plant = kernel.plant();
        let plant = plant.read().unwrap();
        let order = plant.order(created[0]).unwrap();
        assert_eq!(order.state(), OrderState::Finished);
        assert_eq!(order.processing_vehicle(), Some(agv));
        let b = plant.point_by_name("B").unwrap();
        assert_eq!(plant.vehicle(agv).unwrap().position(), Some(b));
    }

    kernel.set_state(KernelState::Shutdown).unwrap();
}

#[test]
fn test_order_set_scripts_are_refused() {
    let kernel = Kernel::new(quiet_config(), Box::new(DistanceEvaluator));
    build_line_plant(&kernel);
    kernel.set_state(KernelState::Operating).unwrap();

    let mut order_set = OrderSetDocument::new();
    order_set
        .transports
        .push(TransportEntry::Script(ScriptSpec { file_name: "batch.tcs".to_string() }));
    assert!(matches!(
        kernel.submit_order_set(&order_set),
        Err(Error::UnsupportedOperation(_))
    ));
}

#[test]
fn test_poll_queue_sees_state_transitions() {
    let kernel = Kernel::new(quiet_config(), Box::new(DistanceEvaluator));
    let queue = kernel.create_poll_queue(256);
    build_line_plant(&kernel);
    kernel.set_state(KernelState::Operating).unwrap();

    let polled = queue.poll(Duration::from_millis(100));
    let transition = polled.iter().any(|entry| {
        matches!(
            entry,
            QueueEntry::Delivered(Event::KernelStateChanged {
                from: KernelState::Modelling,
                to: KernelState::Operating,
            })
        )
    });
    assert!(transition, "expected the state transition in {:?}", polled.len());
    kernel.set_state(KernelState::Shutdown).unwrap();
}

#[test]
fn test_generated_order_names_are_unique() {
    let kernel = Kernel::new(quiet_config(), Box::new(DistanceEvaluator));
    let agv = build_line_plant(&kernel);
    let adapter = kernel.attach_loopback_vehicle(agv, true);
    kernel.set_state(KernelState::Operating).unwrap();
    adapter.report_ready();

    let b = kernel.plant().read().unwrap().point_by_name("B").unwrap();
    let first = kernel
        .submit_transport_order(None, vec![Destination::point(b)], None, 0, BTreeSet::new(), None)
        .unwrap();
    let second = kernel
        .submit_transport_order(None, vec![Destination::point(b)], None, 0, BTreeSet::new(), None)
        .unwrap();
    let plant = kernel.plant();
    let plant = plant.read().unwrap();
    assert_ne!(plant.order(first).unwrap().name(), plant.order(second).unwrap().name());
}
