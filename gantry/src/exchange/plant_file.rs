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

//! Module defining the versioned plant-model document and its loader.
//!
//! The document describes the whole topology by name: paths, links, blocks,
//! and vehicle positions reference points by their names. The loader
//! materialises those references as placeholders and resolves them in a
//! second pass, failing loudly on the first name that does not resolve.

use crate::exchange::ExchangeError;
use crate::model::location::Link;
use crate::model::plant::Plant;
use crate::model::point::PointKind;
use crate::model::types::{ObjectClass, ObjectRef, PointId, Pose, ResourceRef};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The plant document version this reader and writer support.
pub const PLANT_FILE_VERSION: &str = "plant-0.1";

/// A point of the topology.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PointSpec {
    /// Unique point name
    pub name: String,
    /// HALT, PARK, or REPORT
    pub kind: String,
    /// X coordinate
    pub x: i64,
    /// Y coordinate
    pub y: i64,
    /// Z coordinate
    #[serde(default)]
    pub z: i64,
    /// Heading a vehicle assumes on this point, in degrees
    #[serde(default)]
    pub orientation_deg: f64,
}

/// A directed path between two points.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PathSpec {
    /// Unique path name
    pub name: String,
    /// Name of the source point
    pub source: String,
    /// Name of the destination point
    pub destination: String,
    /// Length in abstract distance units, positive
    pub length: u64,
    /// Maximum forward velocity in mm/s
    pub max_velocity: u64,
    /// Maximum reverse velocity in mm/s; zero forbids reverse travel
    #[serde(default)]
    pub max_reverse_velocity: u64,
    /// True if the path is administratively locked
    #[serde(default)]
    pub locked: bool,
    /// Free-form properties
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// A location type with its operation profile.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LocationTypeSpec {
    /// Unique location type name
    pub name: String,
    /// Operations locations of this type offer
    pub allowed_operations: Vec<String>,
}

/// A link between a location and one of its access points.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LinkSpec {
    /// Name of the access point
    pub point: String,
    /// Operations permitted through this link; empty means all
    #[serde(default)]
    pub allowed_operations: Vec<String>,
}

/// A location (station).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LocationSpec {
    /// Unique location name
    pub name: String,
    /// Name of the location's type
    pub location_type: String,
    /// Links to the access points
    pub links: Vec<LinkSpec>,
}

/// A block of resources claimed as one unit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BlockSpec {
    /// Unique block name
    pub name: String,
    /// Names of member points and paths
    pub members: Vec<String>,
}

/// A vehicle.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VehicleSpec {
    /// Unique vehicle name
    pub name: String,
    /// Maximum velocity in mm/s
    pub max_velocity: u64,
    /// Critical energy threshold in percent
    pub critical_energy: u32,
    /// Good energy threshold in percent
    pub good_energy: u32,
    /// Operation requested at charging stations
    pub recharge_operation: String,
    /// Name of the point the vehicle starts on, if known
    #[serde(default)]
    pub position: Option<String>,
    /// Names of paths this vehicle must never use
    #[serde(default)]
    pub forbidden_paths: Vec<String>,
}

/// Scaling of the visual layout, kept so the plant overview can restore
/// its projection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VisualLayoutSpec {
    /// Horizontal scale, layout units per distance unit
    pub scale_x: f64,
    /// Vertical scale, layout units per distance unit
    pub scale_y: f64,
}

impl Default for VisualLayoutSpec {
    fn default() -> Self {
        Self { scale_x: 50.0, scale_y: 50.0 }
    }
}

/// A complete plant model as persisted outside the kernel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlantDocument {
    /// Document version; must match [`PLANT_FILE_VERSION`]
    pub version: String,
    /// All points
    pub points: Vec<PointSpec>,
    /// All paths
    pub paths: Vec<PathSpec>,
    /// All location types
    pub location_types: Vec<LocationTypeSpec>,
    /// All locations
    pub locations: Vec<LocationSpec>,
    /// All blocks
    pub blocks: Vec<BlockSpec>,
    /// All vehicles
    pub vehicles: Vec<VehicleSpec>,
    /// Visual layout parameters
    #[serde(default)]
    pub layout: VisualLayoutSpec,
}

impl PlantDocument {
    /// An empty document of the supported version.
    pub fn new() -> Self {
        Self {
            version: PLANT_FILE_VERSION.to_string(),
            points: Vec::new(),
            paths: Vec::new(),
            location_types: Vec::new(),
            locations: Vec::new(),
            blocks: Vec::new(),
            vehicles: Vec::new(),
            layout: VisualLayoutSpec::default(),
        }
    }

    /// Serialise the document.
    pub fn to_json(&self) -> Result<String, ExchangeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a document, rejecting any version this reader does not
    /// support. A version mismatch is a fatal load error.
    pub fn from_json(raw: &str) -> Result<Self, ExchangeError> {
        let document: Self = serde_json::from_str(raw)?;
        if document.version != PLANT_FILE_VERSION {
            return Err(ExchangeError::VersionMismatch {
                expected: PLANT_FILE_VERSION.to_string(),
                found: document.version,
            });
        }
        Ok(document)
    }
}

impl Default for PlantDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a placeholder point reference against the plant, failing loudly
/// with the offending name.
fn resolve_point(plant: &Plant, reference: &ObjectRef) -> Result<PointId, ExchangeError> {
    plant
        .point_by_name(reference.name())
        .map_err(|_| ExchangeError::Unresolved(reference.name().to_string()))
}

fn point_placeholder(name: &str) -> ObjectRef {
    ObjectRef::Placeholder { class: ObjectClass::Point, name: name.to_string() }
}

fn parse_kind(raw: &str) -> Result<PointKind, ExchangeError> {
    match raw {
        "HALT" => Ok(PointKind::Halt),
        "PARK" => Ok(PointKind::Park),
        "REPORT" => Ok(PointKind::Report),
        other => Err(ExchangeError::Invalid(format!("unknown point kind: {}", other))),
    }
}

fn kind_string(kind: PointKind) -> String {
    match kind {
        PointKind::Halt => "HALT",
        PointKind::Park => "PARK",
        PointKind::Report => "REPORT",
    }
    .to_string()
}

/// Build the document's model inside `plant`. The plant must be unsealed;
/// vehicles that already exist (they persist across modelling sessions) are
/// updated in place instead of duplicated.
pub fn load_into(document: &PlantDocument, plant: &mut Plant) -> Result<(), ExchangeError> {
    if document.version != PLANT_FILE_VERSION {
        return Err(ExchangeError::VersionMismatch {
            expected: PLANT_FILE_VERSION.to_string(),
            found: document.version.clone(),
        });
    }

    for spec in document.points.iter() {
        let pose = Pose { x: spec.x, y: spec.y, z: spec.z, orientation_deg: spec.orientation_deg };
        plant.add_point(spec.name.clone(), parse_kind(&spec.kind)?, pose)?;
    }

    for spec in document.paths.iter() {
        let source = resolve_point(plant, &point_placeholder(&spec.source))?;
        let destination = resolve_point(plant, &point_placeholder(&spec.destination))?;
        let path = plant.add_path(spec.name.clone(), source, destination, spec.length)?;
        let spec = spec.clone();
        plant.modify_path(path, move |p| {
            p.set_max_velocity(spec.max_velocity);
            p.set_max_reverse_velocity(spec.max_reverse_velocity);
            p.set_locked(spec.locked);
            for (key, value) in spec.properties {
                p.set_property(key, value);
            }
        })?;
    }

    for spec in document.location_types.iter() {
        plant.add_location_type(spec.name.clone(), spec.allowed_operations.iter().cloned())?;
    }

    for spec in document.locations.iter() {
        let type_id = plant
            .location_type_by_name(&spec.location_type)
            .map_err(|_| ExchangeError::Unresolved(spec.location_type.clone()))?;
        let mut links = Vec::with_capacity(spec.links.len());
        for link in spec.links.iter() {
            let point = resolve_point(plant, &point_placeholder(&link.point))?;
            links.push(Link::with_operations(
                point,
                link.allowed_operations.iter().cloned().collect(),
            ));
        }
        plant.add_location(spec.name.clone(), type_id, links)?;
    }

    for spec in document.blocks.iter() {
        let mut members = Vec::with_capacity(spec.members.len());
        for name in spec.members.iter() {
            let member = match plant.point_by_name(name) {
                Ok(point) => ResourceRef::Point(point),
                Err(_) => match plant.path_by_name(name) {
                    Ok(path) => ResourceRef::Path(path),
                    Err(_) => return Err(ExchangeError::Unresolved(name.clone())),
                },
            };
            members.push(member);
        }
        plant.add_block(spec.name.clone(), members)?;
    }

    for spec in document.vehicles.iter() {
        let vehicle = match plant.vehicle_by_name(&spec.name) {
            Ok(existing) => existing,
            Err(_) => plant.add_vehicle(spec.name.clone())?,
        };
        let position = match spec.position.as_deref() {
            Some(name) => Some(resolve_point(plant, &point_placeholder(name))?),
            None => None,
        };
        let mut forbidden = Vec::with_capacity(spec.forbidden_paths.len());
        for name in spec.forbidden_paths.iter() {
            forbidden
                .push(plant.path_by_name(name).map_err(|_| ExchangeError::Unresolved(name.clone()))?);
        }
        let spec = spec.clone();
        plant.modify_vehicle(vehicle, move |v| {
            v.set_max_velocity(spec.max_velocity);
            v.set_energy_thresholds(spec.critical_energy, spec.good_energy);
            v.set_recharge_operation(spec.recharge_operation);
            for path in forbidden {
                v.forbid_path(path);
            }
        })?;
        plant.set_vehicle_position(vehicle, position)?;
    }

    Ok(())
}

/// Write the plant back out as a document. Entries are sorted by name so
/// that dumping, loading, and dumping again yields an identical document.
pub fn dump_from(plant: &Plant) -> Result<PlantDocument, ExchangeError> {
    let mut document = PlantDocument::new();

    for point in plant.points() {
        let pose = point.pose();
        document.points.push(PointSpec {
            name: point.name().to_string(),
            kind: kind_string(point.kind()),
            x: pose.x,
            y: pose.y,
            z: pose.z,
            orientation_deg: pose.orientation_deg,
        });
    }
    document.points.sort_by(|a, b| a.name.cmp(&b.name));

    for path in plant.paths() {
        document.paths.push(PathSpec {
            name: path.name().to_string(),
            source: plant.point(path.source())?.name().to_string(),
            destination: plant.point(path.destination())?.name().to_string(),
            length: path.length(),
            max_velocity: path.max_velocity(),
            max_reverse_velocity: path.max_reverse_velocity(),
            locked: path.is_locked(),
            properties: path.properties().clone(),
        });
    }
    document.paths.sort_by(|a, b| a.name.cmp(&b.name));

    for location_type in plant.location_types() {
        document.location_types.push(LocationTypeSpec {
            name: location_type.name().to_string(),
            allowed_operations: location_type.allowed_operations().iter().cloned().collect(),
        });
    }
    document.location_types.sort_by(|a, b| a.name.cmp(&b.name));

    for location in plant.locations() {
        let mut links = Vec::with_capacity(location.links().len());
        for link in location.links() {
            links.push(LinkSpec {
                point: plant.point(link.point)?.name().to_string(),
                allowed_operations: link.allowed_operations.iter().cloned().collect(),
            });
        }
        document.locations.push(LocationSpec {
            name: location.name().to_string(),
            location_type: plant.location_type(location.type_id())?.name().to_string(),
            links,
        });
    }
    document.locations.sort_by(|a, b| a.name.cmp(&b.name));

    for block in plant.blocks() {
        let mut members = Vec::with_capacity(block.members().len());
        for member in block.members() {
            members.push(match member {
                ResourceRef::Point(p) => plant.point(*p)?.name().to_string(),
                ResourceRef::Path(p) => plant.path(*p)?.name().to_string(),
            });
        }
        members.sort();
        document.blocks.push(BlockSpec { name: block.name().to_string(), members });
    }
    document.blocks.sort_by(|a, b| a.name.cmp(&b.name));

    for vehicle in plant.vehicles() {
        let position = match vehicle.position() {
            Some(point) => Some(plant.point(point)?.name().to_string()),
            None => None,
        };
        let mut forbidden = Vec::with_capacity(vehicle.forbidden_paths().len());
        for path in vehicle.forbidden_paths() {
            forbidden.push(plant.path(*path)?.name().to_string());
        }
        forbidden.sort();
        document.vehicles.push(VehicleSpec {
            name: vehicle.name().to_string(),
            max_velocity: vehicle.max_velocity(),
            critical_energy: vehicle.critical_energy(),
            good_energy: vehicle.good_energy(),
            recharge_operation: vehicle.recharge_operation().to_string(),
            position,
            forbidden_paths: forbidden,
        });
    }
    document.vehicles.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(document)
}
