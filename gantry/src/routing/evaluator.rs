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

//! # Route evaluators
//!
//! Route evaluators are cost functions over candidate steps. The router's
//! search multiplies out whichever evaluator it was constructed with, so the
//! same search yields shortest-distance routes, turn-minimising routes, or
//! anything in between. Step costs must be non-negative for the search to
//! be correct; constructors reject negative parameters.

use crate::model::order::Step;
use crate::model::path::PROP_ROUTING_PENALTY;
use crate::model::plant::Plant;
use crate::model::types::RouteCost;
use crate::routing::RoutingError;

use log::*;

/// Trait for creating route evaluators.
pub trait RouteEvaluator: Send + Sync {
    /// Cost of traversing `step`, given the step travelled immediately
    /// before it (`None` at the start of a route). Never negative by
    /// construction.
    fn step_cost(&self, plant: &Plant, prev: Option<&Step>, step: &Step) -> RouteCost;
}

/// Cost of a step is the length of its path.
#[derive(Debug, Default)]
pub struct DistanceEvaluator;

impl RouteEvaluator for DistanceEvaluator {
    fn step_cost(&self, plant: &Plant, _prev: Option<&Step>, step: &Step) -> RouteCost {
        plant.path(step.path).map(|p| p.length()).unwrap_or(0)
    }
}

/// Cost of a step is its path length, plus a constant penalty whenever the
/// step's travel orientation tag differs from the previous step's.
#[derive(Debug)]
pub struct TurnPenaltyEvaluator {
    penalty: RouteCost,
}

impl TurnPenaltyEvaluator {
    /// Create an evaluator charging `penalty` per orientation change.
    /// Negative penalties are rejected.
    pub fn new(penalty: i64) -> Result<Self, RoutingError> {
        if penalty < 0 {
            return Err(RoutingError::NegativeCost(penalty));
        }
        Ok(Self { penalty: penalty as RouteCost })
    }
}

impl RouteEvaluator for TurnPenaltyEvaluator {
    fn step_cost(&self, plant: &Plant, prev: Option<&Step>, step: &Step) -> RouteCost {
        let length = plant.path(step.path).map(|p| p.length()).unwrap_or(0);
        let turned = match prev {
            None => false,
            Some(prev) => {
                let prev_tag =
                    plant.path(prev.path).ok().and_then(|p| p.travel_orientation().map(String::from));
                let tag =
                    plant.path(step.path).ok().and_then(|p| p.travel_orientation().map(String::from));
                prev_tag != tag
            }
        };
        if turned {
            length.saturating_add(self.penalty)
        } else {
            length
        }
    }
}

/// Cost of a step is its path length plus the path's explicit routing
/// penalty property, when one is present. Properties that do not parse as a
/// non-negative integer are ignored with a warning.
#[derive(Debug, Default)]
pub struct ExplicitPenaltyEvaluator;

impl RouteEvaluator for ExplicitPenaltyEvaluator {
    fn step_cost(&self, plant: &Plant, _prev: Option<&Step>, step: &Step) -> RouteCost {
        let path = match plant.path(step.path) {
            Ok(p) => p,
            Err(_) => return 0,
        };
        let penalty = match path.property(PROP_ROUTING_PENALTY) {
            None => 0,
            Some(raw) => match raw.parse::<RouteCost>() {
                Ok(value) => value,
                Err(_) => {
                    warn!("Ignoring unparsable routing penalty on path {}: {}", path.name(), raw);
                    0
                }
            },
        };
        path.length().saturating_add(penalty)
    }
}

/// Weighted sum of other evaluators. Weights are non-negative by
/// construction.
pub struct CompositeEvaluator {
    parts: Vec<(RouteCost, Box<dyn RouteEvaluator>)>,
}

impl std::fmt::Debug for CompositeEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeEvaluator").field("parts", &self.parts.len()).finish()
    }
}

impl CompositeEvaluator {
    /// Combine `parts` into one evaluator. Negative weights are rejected.
    pub fn new(parts: Vec<(i64, Box<dyn RouteEvaluator>)>) -> Result<Self, RoutingError> {
        let mut checked = Vec::with_capacity(parts.len());
        for (weight, evaluator) in parts {
            if weight < 0 {
                return Err(RoutingError::NegativeCost(weight));
            }
            checked.push((weight as RouteCost, evaluator));
        }
        Ok(Self { parts: checked })
    }
}

impl RouteEvaluator for CompositeEvaluator {
    fn step_cost(&self, plant: &Plant, prev: Option<&Step>, step: &Step) -> RouteCost {
        self.parts.iter().fold(0, |acc: RouteCost, (weight, evaluator)| {
            acc.saturating_add(weight.saturating_mul(evaluator.step_cost(plant, prev, step)))
        })
    }
}
