//! # netsim Simulator
//!
//! Simulation harness for the netsim production-network engine. Builds a
//! factory from a declarative layout, drives the turn phases with seeded
//! probability sources and collects throughput statistics.
//!
//! This is a standalone testing tool that uses the core `netsim` library.

mod config;
mod runner;
mod stats;

#[allow(unused_imports)]
pub use config::{
    FactoryLayout, FlowSimConfig, LinkSpec, QueueSpec, RampSpec, ReceiverSpec, SenderSpec,
    StorehouseSpec, WorkerSpec,
};
#[allow(unused_imports)]
pub use runner::FlowRunner;
#[allow(unused_imports)]
pub use stats::{FlowResult, FlowStats};
