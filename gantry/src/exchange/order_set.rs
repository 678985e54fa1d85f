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

//! Module defining the order-set intake document.

use crate::exchange::ExchangeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The order-set version this reader and writer support.
pub const ORDER_SET_VERSION: &str = "orders-0.1";

/// One destination of a transport entry: a location, the operation to
/// perform there, and free-form properties forwarded to the vehicle.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DestinationSpec {
    /// Name of the destination location
    pub location: String,
    /// Operation to perform on arrival
    pub operation: String,
    /// Free-form properties
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// A transport order to be created.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TransportSpec {
    /// Order name; the kernel generates one when absent
    #[serde(default)]
    pub name: Option<String>,
    /// Deadline in milliseconds since the epoch; zero means "now"
    pub deadline_ms: u64,
    /// Name of the vehicle this order is intended for, if any
    #[serde(default)]
    pub intended_vehicle: Option<String>,
    /// The ordered destinations of the order
    pub destinations: Vec<DestinationSpec>,
    /// Names of orders that must reach a terminal state first
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// A reference to an external transport script resource. Scripts are
/// expanded by the order intake collaborator, not by the kernel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScriptSpec {
    /// Name of the script resource
    pub file_name: String,
}

/// One entry of an order set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind")]
pub enum TransportEntry {
    /// A transport order
    #[serde(rename = "transport")]
    Transport(TransportSpec),
    /// A transport script reference
    #[serde(rename = "script")]
    Script(ScriptSpec),
}

/// An ordered set of transport entries submitted to the kernel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OrderSetDocument {
    /// Document version; must match [`ORDER_SET_VERSION`]
    pub version: String,
    /// The entries, in submission order
    pub transports: Vec<TransportEntry>,
}

impl Default for OrderSetDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderSetDocument {
    /// An empty order set of the supported version.
    pub fn new() -> Self {
        Self { version: ORDER_SET_VERSION.to_string(), transports: Vec::new() }
    }

    /// Serialise the document.
    pub fn to_json(&self) -> Result<String, ExchangeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a document, rejecting any version this reader does not
    /// support.
    pub fn from_json(raw: &str) -> Result<Self, ExchangeError> {
        let document: Self = serde_json::from_str(raw)?;
        if document.version != ORDER_SET_VERSION {
            return Err(ExchangeError::VersionMismatch {
                expected: ORDER_SET_VERSION.to_string(),
                found: document.version,
            });
        }
        Ok(document)
    }
}
