//! Statistics and results for factory flow simulations

use std::collections::BTreeMap;

use netsim::{ElementId, Factory, TimeOffset};

/// Counters accumulated while the run is in progress
#[derive(Debug, Default)]
pub struct FlowStats {
    /// Packages created by ramps
    pub produced: usize,

    /// Peak input-queue depth seen per worker
    pub peak_queue_depth: BTreeMap<ElementId, usize>,
}

impl FlowStats {
    /// Record end-of-turn observations
    pub fn observe_turn(&mut self, factory: &Factory) {
        for worker in factory.workers() {
            let depth = self.peak_queue_depth.entry(worker.id()).or_insert(0);
            *depth = (*depth).max(worker.queue().len());
        }
    }

    /// Close the run out into a result snapshot
    pub fn into_result(
        self,
        factory: &Factory,
        seed_used: [u8; 32],
        turns_completed: TimeOffset,
    ) -> FlowResult {
        let stored: BTreeMap<ElementId, usize> = factory
            .storehouses()
            .map(|s| (s.id(), s.stock().len()))
            .collect();

        let in_flight = factory
            .workers()
            .map(|w| {
                w.queue().len()
                    + usize::from(w.processing_buffer().is_some())
                    + usize::from(w.sending_buffer().is_some())
            })
            .sum::<usize>()
            + factory
                .ramps()
                .filter(|r| r.sending_buffer().is_some())
                .count();

        FlowResult {
            seed_used,
            turns_completed,
            produced: self.produced,
            stored,
            in_flight,
            peak_queue_depth: self.peak_queue_depth,
        }
    }
}

/// Simulation result
#[derive(Debug)]
pub struct FlowResult {
    /// Seed used for the simulation
    pub seed_used: [u8; 32],

    /// Number of turns completed
    pub turns_completed: TimeOffset,

    /// Packages created by ramps over the whole run
    pub produced: usize,

    /// Final stock size per storehouse
    pub stored: BTreeMap<ElementId, usize>,

    /// Packages still in queues or buffers when the run ended
    pub in_flight: usize,

    /// Peak input-queue depth per worker
    pub peak_queue_depth: BTreeMap<ElementId, usize>,
}

impl FlowResult {
    pub fn total_stored(&self) -> usize {
        self.stored.values().sum()
    }

    /// Print a summary of the simulation results
    pub fn print_summary(&self) {
        println!("\n╔════════════════════════════════════════════════════════╗");
        println!("║        Factory Flow Simulation Results                 ║");
        println!("╚════════════════════════════════════════════════════════╝\n");

        println!("Configuration:");
        println!("  Seed: {:?}", self.seed_used);
        println!("  Turns: {}\n", self.turns_completed);

        println!("Throughput:");
        println!("  Packages produced: {}", self.produced);
        println!("  Packages stored:   {}", self.total_stored());
        println!("  Still in flight:   {}\n", self.in_flight);

        println!("Storehouses:");
        for (id, count) in &self.stored {
            println!("  #{id}: {count} packages");
        }
        println!();

        println!("Worker queues (peak depth):");
        for (id, depth) in &self.peak_queue_depth {
            println!("  #{id}: {depth}");
        }
        println!();
    }
}
