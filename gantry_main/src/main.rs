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

use gantry::dispatch::{DispatcherConfig, LoopbackAdapter};
use gantry::exchange::{OrderSetDocument, PlantDocument};
use gantry::kernel::{Kernel, KernelConfig, KernelState};
use gantry::routing::DistanceEvaluator;

use clap::{Parser, Subcommand};
use log::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Exit code for a clean shutdown.
const EXIT_OK: i32 = 0;
/// Exit code for an unrecoverable kernel error.
const EXIT_KERNEL_ERROR: i32 = 1;
/// Exit code for a model that could not be loaded.
const EXIT_MODEL_ERROR: i32 = 2;

#[derive(Parser)]
#[command(name = "gantry", about = "Transportation control kernel for AGV fleets")]
struct CommandLineArguments {
    #[command(subcommand)]
    cmd: MainCommand,
}

#[derive(Subcommand)]
enum MainCommand {
    /// Validate a plant model document and print a summary
    Check {
        /// The plant model document (JSON)
        model: PathBuf,
    },
    /// Operate a plant with simulated vehicles, executing an order set
    Run {
        /// The plant model document (JSON)
        model: PathBuf,
        /// An order-set document to execute (JSON)
        #[arg(long)]
        orders: Option<PathBuf>,
        /// Give up after this many seconds
        #[arg(long, default_value_t = 60)]
        timeout: u64,
        /// Leave idle vehicles where they are instead of parking them
        #[arg(long)]
        no_parking: bool,
        /// Simulated energy drain per movement, in percent per step
        #[arg(long, default_value_t = 0)]
        energy_drain: u32,
    },
}

fn main() {
    pretty_env_logger::init();
    let args = CommandLineArguments::parse();

    let code = match args.cmd {
        MainCommand::Check { model } => check(&model),
        MainCommand::Run { model, orders, timeout, no_parking, energy_drain } => {
            run(&model, orders.as_deref(), timeout, no_parking, energy_drain)
        }
    };
    std::process::exit(code);
}

fn load_plant_document(path: &Path) -> Result<PlantDocument, i32> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            error!("Cannot read {}: {}", path.display(), e);
            return Err(EXIT_MODEL_ERROR);
        }
    };
    match PlantDocument::from_json(&raw) {
        Ok(document) => Ok(document),
        Err(e) => {
            error!("Cannot parse {}: {}", path.display(), e);
            Err(EXIT_MODEL_ERROR)
        }
    }
}

fn check(model: &Path) -> i32 {
    let document = match load_plant_document(model) {
        Ok(document) => document,
        Err(code) => return code,
    };
    let kernel = Kernel::new(KernelConfig::default(), Box::new(DistanceEvaluator));
    if let Err(e) = kernel.load_plant_document(&document) {
        error!("Model does not load: {}", e);
        return EXIT_MODEL_ERROR;
    }
    println!(
        "{}: {} points, {} paths, {} locations, {} blocks, {} vehicles",
        model.display(),
        document.points.len(),
        document.paths.len(),
        document.locations.len(),
        document.blocks.len(),
        document.vehicles.len(),
    );
    EXIT_OK
}

fn run(
    model: &Path,
    orders: Option<&Path>,
    timeout: u64,
    no_parking: bool,
    energy_drain: u32,
) -> i32 {
    let document = match load_plant_document(model) {
        Ok(document) => document,
        Err(code) => return code,
    };

    let config = KernelConfig {
        dispatcher: DispatcherConfig { parking_enabled: !no_parking, ..Default::default() },
    };
    let kernel = Kernel::new(config, Box::new(DistanceEvaluator));
    if let Err(e) = kernel.load_plant_document(&document) {
        error!("Model does not load: {}", e);
        return EXIT_MODEL_ERROR;
    }

    // every vehicle gets a simulated adapter
    let vehicles: Vec<_> = {
        let plant = kernel.plant();
        let plant = plant.read().unwrap();
        plant.vehicles().map(|v| v.id()).collect()
    };
    let adapters: Vec<Arc<LoopbackAdapter>> = vehicles
        .iter()
        .map(|v| {
            let adapter = Arc::new(
                LoopbackAdapter::new_auto(kernel.adapter_handle(*v))
                    .with_energy_drain(energy_drain),
            );
            kernel.dispatcher().register_adapter(*v, adapter.clone());
            adapter
        })
        .collect();

    if let Err(e) = kernel.set_state(KernelState::Operating) {
        error!("Cannot start operating: {}", e);
        return EXIT_KERNEL_ERROR;
    }
    for adapter in adapters.iter() {
        adapter.report_ready();
    }

    let mut submitted = 0;
    if let Some(path) = orders {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                error!("Cannot read {}: {}", path.display(), e);
                return EXIT_KERNEL_ERROR;
            }
        };
        let order_set = match OrderSetDocument::from_json(&raw) {
            Ok(order_set) => order_set,
            Err(e) => {
                error!("Cannot parse {}: {}", path.display(), e);
                return EXIT_KERNEL_ERROR;
            }
        };
        match kernel.submit_order_set(&order_set) {
            Ok(created) => submitted = created.len(),
            Err(e) => {
                error!("Order set rejected: {}", e);
                return EXIT_KERNEL_ERROR;
            }
        }
        info!("Submitted {} transport orders", submitted);
    }

    // wait for the fleet to finish, then report per-order outcomes
    let deadline = Instant::now() + Duration::from_secs(timeout);
    while !kernel.all_orders_terminal() {
        if Instant::now() >= deadline {
            error!("Timed out after {}s with unfinished orders", timeout);
            let _ = kernel.set_state(KernelState::Shutdown);
            return EXIT_KERNEL_ERROR;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    {
        let plant = kernel.plant();
        let plant = plant.read().unwrap();
        for order in plant.orders() {
            println!("{}: {:?}", order.name(), order.state());
        }
    }

    if let Err(e) = kernel.set_state(KernelState::Shutdown) {
        error!("Shutdown failed: {}", e);
        return EXIT_KERNEL_ERROR;
    }
    EXIT_OK
}
