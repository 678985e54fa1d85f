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

//! # The plant model
//!
//! This module holds the authoritative in-memory store of all business
//! objects: the topology (points and paths as a [`petgraph`] stable graph),
//! stations, blocks, vehicles, and transport orders. Every object is
//! addressed by a stable id and a unique name per class. All mutation goes
//! through the [`Plant`], which emits a typed change event carrying
//! pre-image and post-image snapshots for every edit, so no change can
//! bypass the event stream.

use crate::hub::EventHub;
use crate::model::block::Block;
use crate::model::event::{Event, ObjectSnapshot};
use crate::model::location::{Link, Location, LocationType};
use crate::model::order::{Destination, OrderState, TransportOrder};
use crate::model::path::Path;
use crate::model::point::{Point, PointKind};
use crate::model::types::{
    BlockId, LocationId, LocationTypeId, ModelError, ObjectClass, OrderId, PathId, PlantGraph,
    PointId, Pose, ResourceRef, VehicleId,
};
use crate::model::vehicle::Vehicle;

use log::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// # Plant struct
///
/// The plant owns the topology graph and all business objects, and is the
/// single writer for every one of them. Topology entities (points, paths,
/// locations, location types, blocks) may only be created while the plant is
/// unsealed; the kernel seals the plant on entry to operating mode and
/// destroys the topology on return to modelling. Vehicles persist across
/// mode changes with their processing state reset. Transport orders are
/// created at any time while operating.
#[derive(Debug)]
pub struct Plant {
    graph: PlantGraph,
    points: HashMap<PointId, Point>,
    paths: HashMap<PathId, Path>,
    locations: HashMap<LocationId, Location>,
    location_types: HashMap<LocationTypeId, LocationType>,
    blocks: HashMap<BlockId, Block>,
    vehicles: HashMap<VehicleId, Vehicle>,
    orders: HashMap<OrderId, TransportOrder>,
    names: HashMap<(ObjectClass, String), u64>,
    next_location_id: u32,
    next_location_type_id: u32,
    next_block_id: u32,
    next_vehicle_id: u32,
    next_order_id: u32,
    order_name_seq: u64,
    sealed: bool,
    hub: Arc<EventHub>,
}

impl Plant {
    /// Generate an empty plant broadcasting its change events on `hub`.
    pub fn new(hub: Arc<EventHub>) -> Self {
        Self {
            graph: PlantGraph::default(),
            points: HashMap::new(),
            paths: HashMap::new(),
            locations: HashMap::new(),
            location_types: HashMap::new(),
            blocks: HashMap::new(),
            vehicles: HashMap::new(),
            orders: HashMap::new(),
            names: HashMap::new(),
            next_location_id: 0,
            next_location_type_id: 0,
            next_block_id: 0,
            next_vehicle_id: 0,
            next_order_id: 0,
            order_name_seq: 0,
            sealed: false,
            hub,
        }
    }

    /// The event hub this plant broadcasts on.
    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    fn emit(&self, event: Event) {
        self.hub.process_event(&event);
    }

    fn claim_name(&mut self, class: ObjectClass, name: &str, id: u64) -> Result<(), ModelError> {
        if self.names.contains_key(&(class, name.to_string())) {
            return Err(ModelError::ObjectExists(name.to_string()));
        }
        self.names.insert((class, name.to_string()), id);
        Ok(())
    }

    fn check_unsealed(&self) -> Result<(), ModelError> {
        if self.sealed {
            Err(ModelError::TopologySealed)
        } else {
            Ok(())
        }
    }

    /// Freeze the topology. Called by the kernel on entry to operating mode.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Thaw the topology. Called by the kernel on return to modelling.
    pub fn unseal(&mut self) {
        self.sealed = false;
    }

    /// True while the topology is frozen.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    // ------------------------------------------------------------------
    // Topology construction
    // ------------------------------------------------------------------

    /// Add a new point to the topology. Returns the id of the point, which
    /// is used to reference it from paths, links, and blocks.
    pub fn add_point(
        &mut self,
        name: impl Into<String>,
        kind: PointKind,
        pose: Pose,
    ) -> Result<PointId, ModelError> {
        self.check_unsealed()?;
        let name = name.into();
        let id = self.graph.add_node(());
        if let Err(e) = self.claim_name(ObjectClass::Point, &name, id.index() as u64) {
            self.graph.remove_node(id);
            return Err(e);
        }
        let point = Point::new(name, id, kind, pose);
        self.emit(Event::ObjectCreated(ObjectSnapshot::Point(point.clone())));
        self.points.insert(id, point);
        Ok(id)
    }

    /// Add a new path from `source` to `destination` with the given length
    /// in abstract distance units. The path starts out passable forwards
    /// only; velocities, the lock flag, and properties are edited through
    /// [`Plant::modify_path`].
    pub fn add_path(
        &mut self,
        name: impl Into<String>,
        source: PointId,
        destination: PointId,
        length: u64,
    ) -> Result<PathId, ModelError> {
        self.check_unsealed()?;
        let name = name.into();
        if source == destination {
            return Err(ModelError::DegeneratePath(name));
        }
        if length == 0 {
            return Err(ModelError::InvalidPathLength(name));
        }
        if !self.points.contains_key(&source) {
            return Err(ModelError::ObjectUnknown(format!("{:?}", source)));
        }
        if !self.points.contains_key(&destination) {
            return Err(ModelError::ObjectUnknown(format!("{:?}", destination)));
        }
        let id = self.graph.add_edge(source, destination, ());
        if let Err(e) = self.claim_name(ObjectClass::Path, &name, id.index() as u64) {
            self.graph.remove_edge(id);
            return Err(e);
        }
        let path = Path::new(name, id, source, destination, length);
        self.points.get_mut(&source).unwrap().attach_outgoing(id);
        self.points.get_mut(&destination).unwrap().attach_incoming(id);
        self.emit(Event::ObjectCreated(ObjectSnapshot::Path(path.clone())));
        self.paths.insert(id, path);
        Ok(id)
    }

    /// Add a new location type enumerating the operations its locations
    /// offer.
    pub fn add_location_type(
        &mut self,
        name: impl Into<String>,
        operations: impl IntoIterator<Item = String>,
    ) -> Result<LocationTypeId, ModelError> {
        self.check_unsealed()?;
        let name = name.into();
        let id = LocationTypeId(self.next_location_type_id);
        self.claim_name(ObjectClass::LocationType, &name, id.0 as u64)?;
        self.next_location_type_id += 1;
        let location_type = LocationType::new(name, id, operations.into_iter().collect());
        self.emit(Event::ObjectCreated(ObjectSnapshot::LocationType(location_type.clone())));
        self.location_types.insert(id, location_type);
        Ok(id)
    }

    /// Add a new location of the given type, attached to its access points
    /// through `links`.
    pub fn add_location(
        &mut self,
        name: impl Into<String>,
        type_id: LocationTypeId,
        links: Vec<Link>,
    ) -> Result<LocationId, ModelError> {
        self.check_unsealed()?;
        let name = name.into();
        if !self.location_types.contains_key(&type_id) {
            return Err(ModelError::ObjectUnknown(format!("{:?}", type_id)));
        }
        for link in links.iter() {
            if !self.points.contains_key(&link.point) {
                return Err(ModelError::ObjectUnknown(format!("{:?}", link.point)));
            }
        }
        let id = LocationId(self.next_location_id);
        self.claim_name(ObjectClass::Location, &name, id.0 as u64)?;
        self.next_location_id += 1;
        let location = Location::new(name, id, type_id, links);
        self.emit(Event::ObjectCreated(ObjectSnapshot::Location(location.clone())));
        self.locations.insert(id, location);
        Ok(id)
    }

    /// Add a new block over the given member resources.
    pub fn add_block(
        &mut self,
        name: impl Into<String>,
        members: impl IntoIterator<Item = ResourceRef>,
    ) -> Result<BlockId, ModelError> {
        self.check_unsealed()?;
        let name = name.into();
        let members: BTreeSet<ResourceRef> = members.into_iter().collect();
        for member in members.iter() {
            match member {
                ResourceRef::Point(p) if !self.points.contains_key(p) => {
                    return Err(ModelError::ObjectUnknown(format!("{:?}", p)))
                }
                ResourceRef::Path(p) if !self.paths.contains_key(p) => {
                    return Err(ModelError::ObjectUnknown(format!("{:?}", p)))
                }
                _ => {}
            }
        }
        let id = BlockId(self.next_block_id);
        self.claim_name(ObjectClass::Block, &name, id.0 as u64)?;
        self.next_block_id += 1;
        let block = Block::new(name, id, members);
        self.emit(Event::ObjectCreated(ObjectSnapshot::Block(block.clone())));
        self.blocks.insert(id, block);
        Ok(id)
    }

    /// Add a new vehicle. Vehicles may be added at any time and persist
    /// across kernel mode changes.
    pub fn add_vehicle(&mut self, name: impl Into<String>) -> Result<VehicleId, ModelError> {
        let name = name.into();
        let id = VehicleId(self.next_vehicle_id);
        self.claim_name(ObjectClass::Vehicle, &name, id.0 as u64)?;
        self.next_vehicle_id += 1;
        let vehicle = Vehicle::new(name, id);
        self.emit(Event::ObjectCreated(ObjectSnapshot::Vehicle(vehicle.clone())));
        self.vehicles.insert(id, vehicle);
        Ok(id)
    }

    /// Destroy the topology and all transport orders, as happens on return
    /// to modelling. Vehicles persist, but their processing state is reset
    /// and their positions are cleared since the points they referenced are
    /// gone.
    pub fn clear_topology(&mut self) {
        for (_, order) in std::mem::take(&mut self.orders) {
            self.names.remove(&(ObjectClass::TransportOrder, order.name().to_string()));
            self.emit(Event::ObjectRemoved(ObjectSnapshot::TransportOrder(order)));
        }
        for (_, location) in std::mem::take(&mut self.locations) {
            self.names.remove(&(ObjectClass::Location, location.name().to_string()));
            self.emit(Event::ObjectRemoved(ObjectSnapshot::Location(location)));
        }
        for (_, location_type) in std::mem::take(&mut self.location_types) {
            self.names.remove(&(ObjectClass::LocationType, location_type.name().to_string()));
            self.emit(Event::ObjectRemoved(ObjectSnapshot::LocationType(location_type)));
        }
        for (_, block) in std::mem::take(&mut self.blocks) {
            self.names.remove(&(ObjectClass::Block, block.name().to_string()));
            self.emit(Event::ObjectRemoved(ObjectSnapshot::Block(block)));
        }
        for (_, path) in std::mem::take(&mut self.paths) {
            self.names.remove(&(ObjectClass::Path, path.name().to_string()));
            self.emit(Event::ObjectRemoved(ObjectSnapshot::Path(path)));
        }
        for (_, point) in std::mem::take(&mut self.points) {
            self.names.remove(&(ObjectClass::Point, point.name().to_string()));
            self.emit(Event::ObjectRemoved(ObjectSnapshot::Point(point)));
        }
        self.graph.clear();
        let vehicle_ids: Vec<VehicleId> = self.vehicles.keys().copied().collect();
        for id in vehicle_ids {
            // position references a destroyed point, so it must go as well
            self.modify_vehicle(id, |v| {
                v.reset_proc_state();
                v.set_position(None);
            })
            .expect("vehicle exists");
        }
        debug!("Topology cleared; {} vehicles persist", self.vehicles.len());
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// The topology graph. Nodes are points, edges are paths.
    pub fn graph(&self) -> &PlantGraph {
        &self.graph
    }

    /// Look up a point by id.
    pub fn point(&self, id: PointId) -> Result<&Point, ModelError> {
        self.points.get(&id).ok_or_else(|| ModelError::ObjectUnknown(format!("{:?}", id)))
    }

    /// Look up a path by id.
    pub fn path(&self, id: PathId) -> Result<&Path, ModelError> {
        self.paths.get(&id).ok_or_else(|| ModelError::ObjectUnknown(format!("{:?}", id)))
    }

    /// Look up a location by id.
    pub fn location(&self, id: LocationId) -> Result<&Location, ModelError> {
        self.locations.get(&id).ok_or_else(|| ModelError::ObjectUnknown(format!("{:?}", id)))
    }

    /// Look up a location type by id.
    pub fn location_type(&self, id: LocationTypeId) -> Result<&LocationType, ModelError> {
        self.location_types.get(&id).ok_or_else(|| ModelError::ObjectUnknown(format!("{:?}", id)))
    }

    /// Look up a block by id.
    pub fn block(&self, id: BlockId) -> Result<&Block, ModelError> {
        self.blocks.get(&id).ok_or_else(|| ModelError::ObjectUnknown(format!("{:?}", id)))
    }

    /// Look up a vehicle by id.
    pub fn vehicle(&self, id: VehicleId) -> Result<&Vehicle, ModelError> {
        self.vehicles.get(&id).ok_or_else(|| ModelError::ObjectUnknown(format!("{:?}", id)))
    }

    /// Look up a transport order by id.
    pub fn order(&self, id: OrderId) -> Result<&TransportOrder, ModelError> {
        self.orders.get(&id).ok_or_else(|| ModelError::ObjectUnknown(format!("{:?}", id)))
    }

    fn lookup_name(&self, class: ObjectClass, name: &str) -> Result<u64, ModelError> {
        self.names
            .get(&(class, name.to_string()))
            .copied()
            .ok_or_else(|| ModelError::ObjectUnknown(name.to_string()))
    }

    /// Look up a point by name.
    pub fn point_by_name(&self, name: &str) -> Result<PointId, ModelError> {
        self.lookup_name(ObjectClass::Point, name).map(|id| PointId::new(id as usize))
    }

    /// Look up a path by name.
    pub fn path_by_name(&self, name: &str) -> Result<PathId, ModelError> {
        self.lookup_name(ObjectClass::Path, name).map(|id| PathId::new(id as usize))
    }

    /// Look up a location by name.
    pub fn location_by_name(&self, name: &str) -> Result<LocationId, ModelError> {
        self.lookup_name(ObjectClass::Location, name).map(|id| LocationId(id as u32))
    }

    /// Look up a location type by name.
    pub fn location_type_by_name(&self, name: &str) -> Result<LocationTypeId, ModelError> {
        self.lookup_name(ObjectClass::LocationType, name).map(|id| LocationTypeId(id as u32))
    }

    /// Look up a block by name.
    pub fn block_by_name(&self, name: &str) -> Result<BlockId, ModelError> {
        self.lookup_name(ObjectClass::Block, name).map(|id| BlockId(id as u32))
    }

    /// Look up a vehicle by name.
    pub fn vehicle_by_name(&self, name: &str) -> Result<VehicleId, ModelError> {
        self.lookup_name(ObjectClass::Vehicle, name).map(|id| VehicleId(id as u32))
    }

    /// Look up a transport order by name.
    pub fn order_by_name(&self, name: &str) -> Result<OrderId, ModelError> {
        self.lookup_name(ObjectClass::TransportOrder, name).map(|id| OrderId(id as u32))
    }

    /// Iterate over all points.
    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.points.values()
    }

    /// Iterate over all paths.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.values()
    }

    /// Iterate over all locations.
    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        self.locations.values()
    }

    /// Iterate over all location types.
    pub fn location_types(&self) -> impl Iterator<Item = &LocationType> {
        self.location_types.values()
    }

    /// Iterate over all blocks.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// Iterate over all vehicles.
    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Iterate over all transport orders.
    pub fn orders(&self) -> impl Iterator<Item = &TransportOrder> {
        self.orders.values()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Mutate a point through `edit`, emitting a change event carrying the
    /// pre-image and post-image.
    pub fn modify_point<F>(&mut self, id: PointId, edit: F) -> Result<(), ModelError>
    where
        F: FnOnce(&mut Point),
    {
        let point =
            self.points.get_mut(&id).ok_or_else(|| ModelError::ObjectUnknown(format!("{:?}", id)))?;
        let before = point.clone();
        edit(point);
        let after = point.clone();
        self.emit(Event::ObjectChanged {
            before: ObjectSnapshot::Point(before),
            after: ObjectSnapshot::Point(after),
        });
        Ok(())
    }

    /// Mutate a path through `edit`, emitting a change event carrying the
    /// pre-image and post-image. Editing velocities, lock flags, and
    /// properties is legal while the plant is sealed.
    pub fn modify_path<F>(&mut self, id: PathId, edit: F) -> Result<(), ModelError>
    where
        F: FnOnce(&mut Path),
    {
        let path =
            self.paths.get_mut(&id).ok_or_else(|| ModelError::ObjectUnknown(format!("{:?}", id)))?;
        let before = path.clone();
        edit(path);
        let after = path.clone();
        self.emit(Event::ObjectChanged {
            before: ObjectSnapshot::Path(before),
            after: ObjectSnapshot::Path(after),
        });
        Ok(())
    }

    /// Mutate a vehicle through `edit`, emitting a change event carrying
    /// the pre-image and post-image.
    pub fn modify_vehicle<F>(&mut self, id: VehicleId, edit: F) -> Result<(), ModelError>
    where
        F: FnOnce(&mut Vehicle),
    {
        let vehicle = self
            .vehicles
            .get_mut(&id)
            .ok_or_else(|| ModelError::ObjectUnknown(format!("{:?}", id)))?;
        let before = vehicle.clone();
        edit(vehicle);
        let after = vehicle.clone();
        self.emit(Event::ObjectChanged {
            before: ObjectSnapshot::Vehicle(before),
            after: ObjectSnapshot::Vehicle(after),
        });
        Ok(())
    }

    /// Mutate a transport order through `edit`, emitting a change event
    /// carrying the pre-image and post-image.
    pub fn modify_order<F>(&mut self, id: OrderId, edit: F) -> Result<(), ModelError>
    where
        F: FnOnce(&mut TransportOrder),
    {
        let order =
            self.orders.get_mut(&id).ok_or_else(|| ModelError::ObjectUnknown(format!("{:?}", id)))?;
        let before = order.clone();
        edit(order);
        let after = order.clone();
        self.emit(Event::ObjectChanged {
            before: ObjectSnapshot::TransportOrder(before),
            after: ObjectSnapshot::TransportOrder(after),
        });
        Ok(())
    }

    /// Move a transport order to another lifecycle state. Transitions are
    /// monotonic; moving out of a terminal state is rejected.
    pub fn transition_order(&mut self, id: OrderId, to: OrderState) -> Result<(), ModelError> {
        let current = self.order(id)?.state();
        if !current.may_transition_to(to) {
            return Err(ModelError::IllegalOrderTransition(
                format!("{:?}", current),
                format!("{:?}", to),
            ));
        }
        if current == to {
            return Ok(());
        }
        self.modify_order(id, |o| o.set_state(to))
    }

    /// Place a vehicle on a point (or nowhere). Keeps point occupancy
    /// consistent and enforces that at most one vehicle occupies a point at
    /// any instant.
    pub fn set_vehicle_position(
        &mut self,
        id: VehicleId,
        position: Option<PointId>,
    ) -> Result<(), ModelError> {
        let old_position = self.vehicle(id)?.position();
        if old_position == position {
            return Ok(());
        }
        if let Some(target) = position {
            let point = self.point(target)?;
            if let Some(occupant) = point.occupying_vehicle() {
                if occupant != id {
                    return Err(ModelError::PointOccupied {
                        point: point.name().to_string(),
                        occupant: self.vehicle(occupant)?.name().to_string(),
                    });
                }
            }
        }
        if let Some(old) = old_position {
            // the old point may already be gone during topology teardown
            if self.points.contains_key(&old) {
                self.modify_point(old, |p| p.set_occupying_vehicle(None))?;
            }
        }
        if let Some(target) = position {
            self.modify_point(target, |p| p.set_occupying_vehicle(Some(id)))?;
        }
        self.modify_vehicle(id, |v| v.set_position(position))
    }

    // ------------------------------------------------------------------
    // Transport orders
    // ------------------------------------------------------------------

    /// Generate a fresh, unused transport order name.
    pub fn generate_order_name(&mut self, prefix: &str) -> String {
        loop {
            let name = format!("{}-{:04}", prefix, self.order_name_seq);
            self.order_name_seq += 1;
            if !self.names.contains_key(&(ObjectClass::TransportOrder, name.clone())) {
                return name;
            }
        }
    }

    /// Create a new transport order in state RAW. `destinations` must not be
    /// empty, and every referenced object must exist.
    pub fn create_order(
        &mut self,
        name: impl Into<String>,
        destinations: Vec<Destination>,
        deadline: u64,
    ) -> Result<OrderId, ModelError> {
        let name = name.into();
        if destinations.is_empty() {
            return Err(ModelError::EmptyOrder(name));
        }
        for destination in destinations.iter() {
            match &destination.target {
                crate::model::order::DestinationRef::Point(p) => {
                    self.point(*p)?;
                }
                crate::model::order::DestinationRef::Location(l) => {
                    self.location(*l)?;
                }
            }
        }
        let id = OrderId(self.next_order_id);
        self.claim_name(ObjectClass::TransportOrder, &name, id.0 as u64)?;
        self.next_order_id += 1;
        let order = TransportOrder::new(name, id, destinations, deadline);
        self.emit(Event::ObjectCreated(ObjectSnapshot::TransportOrder(order.clone())));
        self.orders.insert(id, order);
        Ok(id)
    }

    /// Remove a transport order, as the dispatcher's garbage collection
    /// does once an order has been terminal for longer than the archival
    /// horizon.
    pub fn remove_order(&mut self, id: OrderId) -> Result<(), ModelError> {
        let order =
            self.orders.remove(&id).ok_or_else(|| ModelError::ObjectUnknown(format!("{:?}", id)))?;
        self.names.remove(&(ObjectClass::TransportOrder, order.name().to_string()));
        self.emit(Event::ObjectRemoved(ObjectSnapshot::TransportOrder(order)));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------

    /// Expand a resource set by block membership: whenever any member of a
    /// block appears in the set, all of the block's members are added. The
    /// expansion runs to a fixpoint so chained blocks are honoured.
    pub fn block_closure(&self, resources: &BTreeSet<ResourceRef>) -> BTreeSet<ResourceRef> {
        let mut closure = resources.clone();
        loop {
            let before = closure.len();
            for block in self.blocks.values() {
                if block.members().iter().any(|m| closure.contains(m)) {
                    closure.extend(block.members().iter().copied());
                }
            }
            if closure.len() == before {
                return closure;
            }
        }
    }

    /// A snapshot of all block member sets, as handed to the scheduler when
    /// the kernel enters operating mode. Block membership is static within
    /// an operating session.
    pub fn blocks_snapshot(&self) -> Vec<BTreeSet<ResourceRef>> {
        self.blocks.values().map(|b| b.members().clone()).collect()
    }
}
