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

//! Module containing all error types

use crate::allocate::AllocationError;
use crate::exchange::ExchangeError;
use crate::kernel::KernelState;
use crate::model::types::ModelError;
use crate::routing::RoutingError;
use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Error propagated from the plant model
    #[error("Plant model error: {0}")]
    Model(#[from] ModelError),
    /// Error propagated from the router
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),
    /// Error propagated from the scheduler
    #[error("Resource allocation error: {0}")]
    Allocation(#[from] AllocationError),
    /// Error propagated from a boundary document
    #[error("Exchange document error: {0}")]
    Exchange(#[from] ExchangeError),
    /// The requested kernel state transition is not allowed
    #[error("Illegal kernel state transition: {from:?} -> {to:?}")]
    IllegalStateTransition {
        /// The state the kernel is in
        from: KernelState,
        /// The state that was requested
        to: KernelState,
    },
    /// The operation is not legal right now, or not supported at all
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
    /// The kernel has shut down and no longer serves requests
    #[error("Kernel unavailable: {0}")]
    KernelUnavailable(String),
    /// A remote peer presented invalid credentials
    #[error("Invalid credentials: {0}")]
    CredentialsInvalid(String),
    /// An I/O operation failed
    #[error("I/O failure: {0}")]
    IoFailure(#[from] std::io::Error),
}
