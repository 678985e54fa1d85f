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

//! Test the router and the route evaluators.

use crate::hub::EventHub;
use crate::model::location::Link;
use crate::model::order::Destination;
use crate::model::path::PROP_ROUTING_PENALTY;
use crate::model::path::PROP_TRAVEL_ORIENTATION;
use crate::model::plant::Plant;
use crate::model::point::PointKind;
use crate::model::types::{PointId, Pose, VehicleId, COST_INFINITY};
use crate::routing::{
    CompositeEvaluator, DistanceEvaluator, ExplicitPenaltyEvaluator, Router, RoutingError,
    TurnPenaltyEvaluator,
};

use lazy_static::lazy_static;
use std::sync::Arc;

lazy_static! {
    static ref A: PointId = 0.into();
    static ref B: PointId = 1.into();
    static ref C: PointId = 2.into();
    static ref D: PointId = 3.into();
}

/// # Diamond net
///
/// ```text
///     B
///  10╱ ╲5
///   A   D
///  10╲ ╱5
///     C
/// ```
///
/// Two equal-cost routes from `A` to `D`; path ids increase in creation
/// order `A--B`, `A--C`, `B--D`, `C--D`.
fn diamond() -> (Plant, VehicleId) {
    let mut plant = Plant::new(Arc::new(EventHub::new()));
    assert_eq!(*A, plant.add_point("A", PointKind::Halt, Pose::default()).unwrap());
    assert_eq!(*B, plant.add_point("B", PointKind::Halt, Pose::default()).unwrap());
    assert_eq!(*C, plant.add_point("C", PointKind::Halt, Pose::default()).unwrap());
    assert_eq!(*D, plant.add_point("D", PointKind::Halt, Pose::default()).unwrap());
    plant.add_path("A--B", *A, *B, 10).unwrap();
    plant.add_path("A--C", *A, *C, 10).unwrap();
    plant.add_path("B--D", *B, *D, 5).unwrap();
    plant.add_path("C--D", *C, *D, 5).unwrap();
    let agv = plant.add_vehicle("AGV-01").unwrap();
    plant.set_vehicle_position(agv, Some(*A)).unwrap();
    (plant, agv)
}

fn distance_router(plant: &Plant) -> Router {
    let mut router = Router::new(Box::new(DistanceEvaluator));
    router.update_routing_tables(plant);
    router
}

#[test]
fn test_shortest_path_tie_break() {
    let (plant, agv) = diamond();
    let router = distance_router(&plant);

    let route = router.route_between(&plant, agv, *A, *D).unwrap();
    assert_eq!(route.cost(), 15);
    // equal cost: the route through the lower point id (B) wins
    let visited: Vec<PointId> = route.steps().iter().map(|s| s.destination).collect();
    assert_eq!(visited, vec![*B, *D]);
    assert!(route.is_connected());
    assert_eq!(route.steps()[0].index, 0);
    assert_eq!(route.steps()[1].index, 1);
}

#[test]
fn test_turn_penalty_costs() {
    let (mut plant, agv) = diamond();
    for (name, tag) in
        [("A--B", "x"), ("A--C", "x"), ("B--D", "y"), ("C--D", "y")].iter()
    {
        let path = plant.path_by_name(name).unwrap();
        plant.modify_path(path, |p| p.set_property(PROP_TRAVEL_ORIENTATION, *tag)).unwrap();
    }
    let mut router = Router::new(Box::new(TurnPenaltyEvaluator::new(7).unwrap()));
    router.update_routing_tables(&plant);

    // 10 (A--B, no previous step) + 5 (B--D) + 7 (orientation change x -> y)
    assert_eq!(router.costs(agv, *A, *D), 22);
}

#[test]
fn test_explicit_penalty_costs() {
    let (mut plant, agv) = diamond();
    let penalised = plant.path_by_name("B--D").unwrap();
    plant.modify_path(penalised, |p| p.set_property(PROP_ROUTING_PENALTY, "100")).unwrap();
    let mut router = Router::new(Box::new(ExplicitPenaltyEvaluator));
    router.update_routing_tables(&plant);

    // the penalty pushes the route over C
    let route = router.route_between(&plant, agv, *A, *D).unwrap();
    let visited: Vec<PointId> = route.steps().iter().map(|s| s.destination).collect();
    assert_eq!(visited, vec![*C, *D]);
    assert_eq!(route.cost(), 15);
}

#[test]
fn test_composite_weights() {
    let (plant, agv) = diamond();
    let evaluator = CompositeEvaluator::new(vec![
        (2, Box::new(DistanceEvaluator)),
        (1, Box::new(ExplicitPenaltyEvaluator)),
    ])
    .unwrap();
    let mut router = Router::new(Box::new(evaluator));
    router.update_routing_tables(&plant);

    // 2 * 15 + 1 * 15 without any penalty properties
    assert_eq!(router.costs(agv, *A, *D), 45);
}

#[test]
fn test_negative_costs_rejected_at_construction() {
    assert_eq!(TurnPenaltyEvaluator::new(-1).unwrap_err(), RoutingError::NegativeCost(-1));
    let composite = CompositeEvaluator::new(vec![(-3, Box::new(DistanceEvaluator))]);
    assert!(matches!(composite, Err(RoutingError::NegativeCost(-3))));
}

#[test]
fn test_identical_endpoints_zero_route() {
    let (plant, agv) = diamond();
    let router = distance_router(&plant);
    let route = router.route_between(&plant, agv, *A, *A).unwrap();
    assert!(route.steps().is_empty());
    assert_eq!(route.cost(), 0);
    assert_eq!(router.costs(agv, *A, *A), 0);
}

#[test]
fn test_locked_paths_block_routing() {
    let (mut plant, agv) = diamond();
    for name in ["A--B", "A--C"].iter() {
        let path = plant.path_by_name(name).unwrap();
        plant.modify_path(path, |p| p.set_locked(true)).unwrap();
    }
    let router = distance_router(&plant);
    assert_eq!(router.costs(agv, *A, *D), COST_INFINITY);
    assert!(router.route_between(&plant, agv, *A, *D).is_none());
}

#[test]
fn test_reverse_travel_requires_velocity() {
    let (mut plant, agv) = diamond();
    let router = distance_router(&plant);
    // all paths lead away from A; nothing can come back yet
    assert_eq!(router.costs(agv, *D, *A), COST_INFINITY);

    let back = plant.path_by_name("B--D").unwrap();
    plant.modify_path(back, |p| p.set_max_reverse_velocity(500)).unwrap();
    let ab = plant.path_by_name("A--B").unwrap();
    plant.modify_path(ab, |p| p.set_max_reverse_velocity(500)).unwrap();
    let router = distance_router(&plant);

    let route = router.route_between(&plant, agv, *D, *A).unwrap();
    assert_eq!(route.cost(), 15);
    let visited: Vec<PointId> = route.steps().iter().map(|s| s.destination).collect();
    assert_eq!(visited, vec![*B, *A]);
}

#[test]
fn test_forbidden_paths_respected_per_vehicle() {
    let (mut plant, agv) = diamond();
    let other = plant.add_vehicle("AGV-02").unwrap();
    let ab = plant.path_by_name("A--B").unwrap();
    plant.modify_vehicle(agv, |v| v.forbid_path(ab)).unwrap();
    let router = distance_router(&plant);

    // the restricted vehicle routes around its forbidden path
    let route = router.route_between(&plant, agv, *A, *D).unwrap();
    let visited: Vec<PointId> = route.steps().iter().map(|s| s.destination).collect();
    assert_eq!(visited, vec![*C, *D]);
    // the unrestricted vehicle still takes the tie-break route over B
    let route = router.route_between(&plant, other, *A, *D).unwrap();
    let visited: Vec<PointId> = route.steps().iter().map(|s| s.destination).collect();
    assert_eq!(visited, vec![*B, *D]);
}

#[test]
fn test_update_routing_tables_idempotent() {
    let (plant, agv) = diamond();
    let mut router = distance_router(&plant);
    let before: Vec<u64> = plant
        .points()
        .map(|p| router.costs(agv, *A, p.id()))
        .collect();
    router.update_routing_tables(&plant);
    let after: Vec<u64> = plant
        .points()
        .map(|p| router.costs(agv, *A, p.id()))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_location_destination_resolves_cheapest_link() {
    let (mut plant, agv) = diamond();
    let transfer = plant.add_location_type("Transfer", vec!["LOAD".to_string()]).unwrap();
    // linked to both B (cost 10) and C (cost 10); tie goes to the lower id
    plant
        .add_location("Station", transfer, vec![Link::new(*C), Link::new(*B)])
        .unwrap();
    let station = plant.location_by_name("Station").unwrap();
    let order = plant
        .create_order("TO-1", vec![Destination::location(station, "LOAD")], 0)
        .unwrap();
    let router = distance_router(&plant);

    let order = plant.order(order).unwrap().clone();
    let routed = router.route_order(&plant, agv, *A, &order).unwrap();
    assert_eq!(routed.len(), 1);
    assert_eq!(routed[0].route().unwrap().final_destination(), Some(*B));
}

#[test]
fn test_route_order_fails_on_unoffered_operation() {
    let (mut plant, agv) = diamond();
    let transfer = plant.add_location_type("Transfer", vec!["LOAD".to_string()]).unwrap();
    plant.add_location("Station", transfer, vec![Link::new(*B)]).unwrap();
    let station = plant.location_by_name("Station").unwrap();
    let order =
        plant.create_order("TO-1", vec![Destination::location(station, "WELD")], 0).unwrap();
    let router = distance_router(&plant);

    let order = plant.order(order).unwrap().clone();
    assert!(matches!(
        router.route_order(&plant, agv, *A, &order),
        Err(RoutingError::OperationNotOffered { .. })
    ));
}

#[test]
fn test_check_routability_in_sequence() {
    let (mut plant, agv) = diamond();
    // legs D then B: reaching D works, but nothing leaves D
    let order = plant
        .create_order(
            "TO-1",
            vec![Destination::point(*D), Destination::point(*B)],
            0,
        )
        .unwrap();
    let router = distance_router(&plant);
    let order = plant.order(order).unwrap().clone();
    assert!(router.check_routability(&plant, &order).is_empty());

    // a single-leg order to D is routable for the positioned vehicle
    let reachable = plant.create_order("TO-2", vec![Destination::point(*D)], 0).unwrap();
    let reachable = plant.order(reachable).unwrap().clone();
    let routable = router.check_routability(&plant, &reachable);
    assert!(routable.contains(&agv));
}

#[test]
fn test_random_plant_fully_routable() {
    // the generated plant is a ring with chords, so every point reaches
    // every other point for every vehicle
    let plant = crate::plant_models::random_plant(42, 30, 3);
    let mut router = Router::new(Box::new(DistanceEvaluator));
    router.update_routing_tables(&plant);
    for vehicle in plant.vehicles() {
        for from in plant.points() {
            for to in plant.points() {
                assert_ne!(
                    router.costs(vehicle.id(), from.id(), to.id()),
                    COST_INFINITY,
                    "{} cannot reach {} from {}",
                    vehicle.name(),
                    to.name(),
                    from.name()
                );
            }
        }
    }
}

#[test]
fn test_selected_routes_and_targeted_points() {
    let (plant, agv) = diamond();
    let mut router = distance_router(&plant);
    assert!(router.targeted_points().is_empty());

    let route = router.route_between(&plant, agv, *A, *D).unwrap();
    let mut drive_order =
        crate::model::order::DriveOrder::new(Destination::point(*D));
    drive_order.set_route(Some(route));
    router.select_route(agv, Some(vec![drive_order]));

    let targeted = router.targeted_points();
    assert!(targeted.contains(&*B));
    assert!(targeted.contains(&*D));

    router.select_route(agv, None);
    assert!(router.targeted_points().is_empty());
    assert!(router.selected_routes().is_empty());
}
