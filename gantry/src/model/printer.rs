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

//! # Helper (printer) functions for the plant
//! Module containing helper functions to get formatted strings about plant
//! objects, with ids resolved to names where possible.

use crate::model::order::{Route, TransportOrder};
use crate::model::plant::Plant;
use crate::model::types::{ModelError, ResourceRef, VehicleId};
use std::collections::{BTreeSet, HashMap};

/// Returns the formatted string for a route: the sequence of visited point
/// names separated by arrows, followed by the aggregate cost.
pub fn route(plant: &Plant, route: &Route) -> Result<String, ModelError> {
    if route.steps().is_empty() {
        return Ok(format!("(in place, cost {})", route.cost()));
    }
    let mut parts: Vec<String> =
        vec![plant.point(route.steps()[0].source)?.name().to_string()];
    for step in route.steps() {
        parts.push(plant.point(step.destination)?.name().to_string());
    }
    Ok(format!("{} (cost {})", parts.join(" -> "), route.cost()))
}

/// Returns the formatted string for a single resource.
pub fn resource(plant: &Plant, resource: &ResourceRef) -> Result<String, ModelError> {
    match resource {
        ResourceRef::Point(p) => Ok(plant.point(*p)?.name().to_string()),
        ResourceRef::Path(p) => Ok(plant.path(*p)?.name().to_string()),
    }
}

/// Returns the formatted string for a resource set, sorted by name.
pub fn resource_set(plant: &Plant, set: &BTreeSet<ResourceRef>) -> Result<String, ModelError> {
    let mut names: Vec<String> =
        set.iter().map(|r| resource(plant, r)).collect::<Result<_, _>>()?;
    names.sort();
    Ok(format!("{{{}}}", names.join(", ")))
}

/// Get a vector of strings representing the allocation table, one line per
/// vehicle holding any resources.
pub fn allocations(
    plant: &Plant,
    table: &HashMap<VehicleId, BTreeSet<ResourceRef>>,
) -> Result<Vec<String>, ModelError> {
    let mut lines: Vec<String> = Vec::new();
    for (vehicle, set) in table.iter() {
        if set.is_empty() {
            continue;
        }
        lines.push(format!(
            "{}: {}",
            plant.vehicle(*vehicle)?.name(),
            resource_set(plant, set)?
        ));
    }
    lines.sort();
    Ok(lines)
}

/// Returns the formatted string for a transport order: name, state, and the
/// destination chain.
pub fn order(plant: &Plant, order: &TransportOrder) -> Result<String, ModelError> {
    let mut destinations: Vec<String> = Vec::new();
    for drive_order in order.drive_orders() {
        let destination = drive_order.destination();
        let target = match &destination.target {
            crate::model::order::DestinationRef::Point(p) => plant.point(*p)?.name().to_string(),
            crate::model::order::DestinationRef::Location(l) => {
                plant.location(*l)?.name().to_string()
            }
        };
        if destination.is_nop() {
            destinations.push(target);
        } else {
            destinations.push(format!("{}:{}", target, destination.operation));
        }
    }
    Ok(format!("{} [{:?}] {}", order.name(), order.state(), destinations.join(", ")))
}
