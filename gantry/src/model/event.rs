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

//! Module for defining events

use crate::kernel::KernelState;
use crate::model::block::Block;
use crate::model::location::{Location, LocationType};
use crate::model::order::TransportOrder;
use crate::model::path::Path;
use crate::model::point::Point;
use crate::model::types::{ObjectClass, ObjectRef, VehicleId};
use crate::model::vehicle::Vehicle;

/// Copy of a business object, detached from the live plant. Event
/// subscribers receive snapshots, never references into the pool.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectSnapshot {
    /// A topology node
    Point(Point),
    /// A directed topology edge
    Path(Path),
    /// A station
    Location(Location),
    /// A station operation profile
    LocationType(LocationType),
    /// A resource block
    Block(Block),
    /// A vehicle
    Vehicle(Vehicle),
    /// A transport order
    TransportOrder(TransportOrder),
}

impl ObjectSnapshot {
    /// A value-type reference addressing the snapshotted object.
    pub fn object_ref(&self) -> ObjectRef {
        let (class, id, name) = match self {
            Self::Point(p) => (ObjectClass::Point, p.id().index() as u64, p.name()),
            Self::Path(p) => (ObjectClass::Path, p.id().index() as u64, p.name()),
            Self::Location(l) => (ObjectClass::Location, l.id().0 as u64, l.name()),
            Self::LocationType(t) => (ObjectClass::LocationType, t.id().0 as u64, t.name()),
            Self::Block(b) => (ObjectClass::Block, b.id().0 as u64, b.name()),
            Self::Vehicle(v) => (ObjectClass::Vehicle, v.id().0 as u64, v.name()),
            Self::TransportOrder(o) => (ObjectClass::TransportOrder, o.id().0 as u64, o.name()),
        };
        ObjectRef::Resolved { class, id, name: name.to_string() }
    }
}

/// Severity of a message event.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum MessageLevel {
    /// Informational
    Info,
    /// Something unusual happened, work continues
    Warning,
    /// Work was lost or a component failed
    Error,
}

/// Event to broadcast
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A business object came into existence.
    ObjectCreated(ObjectSnapshot),
    /// A business object was mutated. Both images are detached copies.
    ObjectChanged {
        /// The object before the mutation
        before: ObjectSnapshot,
        /// The object after the mutation
        after: ObjectSnapshot,
    },
    /// A business object was removed.
    ObjectRemoved(ObjectSnapshot),
    /// The kernel moved to another state.
    KernelStateChanged {
        /// The state left behind
        from: KernelState,
        /// The state entered
        to: KernelState,
    },
    /// The scheduler's allocation table changed for a vehicle.
    SchedulerChanged(VehicleId),
    /// A free-text notification for users.
    Message {
        /// Severity of the message
        level: MessageLevel,
        /// Human readable message body
        text: String,
    },
    /// A remote proxy connected to or disconnected from the kernel.
    ProxyStateChanged {
        /// Identification of the peer
        peer: String,
        /// True on connect, false on disconnect
        connected: bool,
    },
}

impl Event {
    /// The reference of the object this event talks about, if it talks
    /// about one.
    pub fn object_ref(&self) -> Option<ObjectRef> {
        match self {
            Event::ObjectCreated(s) | Event::ObjectRemoved(s) => Some(s.object_ref()),
            Event::ObjectChanged { after, .. } => Some(after.object_ref()),
            _ => None,
        }
    }

    /// True if the event concerns an object of the given class.
    pub fn concerns_class(&self, class: ObjectClass) -> bool {
        self.object_ref().map(|r| r.class() == class).unwrap_or(false)
    }

    /// True if the event is a message event.
    pub fn is_message(&self) -> bool {
        matches!(self, Event::Message { .. })
    }
}
