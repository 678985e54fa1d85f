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

//! Module defining blocks.

use crate::model::types::{BlockId, ResourceRef};
use std::collections::BTreeSet;

/// A named set of resources that must be held as a single indivisible unit:
/// whenever any member is claimed, every member is added to the claim before
/// arbitration. Membership is static within an operating session.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    name: String,
    id: BlockId,
    members: BTreeSet<ResourceRef>,
}

impl Block {
    pub(crate) fn new(name: String, id: BlockId, members: BTreeSet<ResourceRef>) -> Self {
        Self { name, id, members }
    }

    /// Return the id of the block.
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Return the name of the block.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The member resources of this block.
    pub fn members(&self) -> &BTreeSet<ResourceRef> {
        &self.members
    }

    /// True if the given resource belongs to this block.
    pub fn contains(&self, resource: &ResourceRef) -> bool {
        self.members.contains(resource)
    }
}
