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

//! # Boundary documents
//!
//! Two serde documents cross the kernel boundary: the versioned plant-model
//! document the kernel is rebuilt from at startup, and the order-set
//! document external systems submit transport orders with. Both are
//! canonically round-trippable: serialising a document and parsing it back
//! yields an equal document. Reader and writer declare the version string
//! they support; a mismatch is a fatal load error.
//!
//! Cross-references inside a document are by name. The loader materialises
//! them as placeholder references first and resolves them against the plant
//! in a second pass, so a reference to a missing object fails loudly with
//! the offending name instead of silently dropping an edge.

pub mod order_set;
pub mod plant_file;

pub use order_set::{
    DestinationSpec, OrderSetDocument, ScriptSpec, TransportEntry, TransportSpec,
    ORDER_SET_VERSION,
};
pub use plant_file::{PlantDocument, PLANT_FILE_VERSION};

use crate::model::types::ModelError;
use thiserror::Error;

/// Errors of the boundary documents
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// The document declares a version this reader does not support
    #[error("Unsupported document version: expected {expected}, found {found}")]
    VersionMismatch {
        /// The version this reader supports
        expected: String,
        /// The version the document declares
        found: String,
    },
    /// The document is not syntactically valid
    #[error("Malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
    /// A field value is out of range or unknown
    #[error("Invalid document field: {0}")]
    Invalid(String),
    /// A by-name reference does not resolve against the plant
    #[error("Unresolved reference in document: {0}")]
    Unresolved(String),
    /// Error propagated from the plant model while loading
    #[error("Plant model error: {0}")]
    Model(#[from] ModelError),
    /// Reading or writing the document failed
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}
