//! # netsim - Discrete-Time Production Network Simulation
//!
//! A simulation engine for discrete units ("packages") flowing through a
//! directed network of production nodes, advancing in fixed time steps
//! ("turns").
//!
//! ## Core Components
//!
//! - **Ramp**: originates packages on a fixed delivery interval
//! - **Worker**: receives, queues, processes with a fixed duration, forwards
//! - **Storehouse**: terminal node accumulating received packages
//! - **ReceiverPreferences**: per-sender weighted routing table with an
//!   injectable probability source
//! - **Factory**: owns the node collections, validates the graph and runs
//!   the three per-turn phases
//!
//! ## Usage
//!
//! The network is constructed through the factory interface (an external
//! loader typically does this), validated, then run:
//!
//! ```
//! use netsim::{Factory, Ramp, Worker, Storehouse, PackageQueue, QueueKind};
//! use netsim::{ReceiverHandle, SenderHandle, simulate};
//!
//! let mut factory = Factory::new();
//! factory.add_ramp(Ramp::new(1, 2)).unwrap();
//! factory.add_worker(Worker::new(1, 3, PackageQueue::new(QueueKind::Fifo))).unwrap();
//! factory.add_storehouse(Storehouse::new(1)).unwrap();
//! factory.connect(SenderHandle::Ramp(1), ReceiverHandle::worker(1)).unwrap();
//! factory.connect(SenderHandle::Worker(1), ReceiverHandle::storehouse(1)).unwrap();
//!
//! simulate(&mut factory, 7, |f, turns| {
//!     println!("running {turns} turns over {} ramps", f.ramps().count());
//! }).unwrap();
//! ```
//!
//! Each turn runs three strictly ordered phases: deliveries (ramps create
//! packages), passing (loaded senders dispatch through their routing
//! tables), work (workers advance processing). A network that fails the
//! consistency gate refuses to run at all.
//!
//! ## Simulation Harness
//!
//! For scenario-driven runs from YAML files, see the `simulator/` directory
//! and the `scenario_runner` binary.

// Core simulation modules
pub mod ns_factory;
pub mod ns_interface;
pub mod ns_nodes;
pub mod ns_package;
pub mod ns_reports;
pub mod ns_simulation;
pub mod ns_storage;

// Re-export commonly used types
pub use ns_factory::{Factory, FactoryError, FactoryNode, NodeCollection};
pub use ns_interface::{
    ElementId, FixedSequence, PackageId, ProbabilitySource, ReceiverHandle, ReceiverKind,
    SenderHandle, Time, TimeOffset, UniformSource,
};
pub use ns_nodes::{
    PackageSender, Ramp, ReceiverPreferences, RoutingError, Storehouse, Worker,
};
pub use ns_package::{reset_id_pool, IdPool, Package};
pub use ns_reports::{
    simulation_turn_report, structure_report, IntervalReportNotifier, SpecificTurnsReportNotifier,
};
pub use ns_simulation::{simulate, SimulationError};
pub use ns_storage::{PackageQueue, QueueKind};
