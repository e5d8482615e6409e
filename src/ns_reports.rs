// human-readable reporting over the factory's read accessors

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::ns_factory::Factory;
use crate::ns_interface::{ReceiverHandle, ReceiverKind, Time, TimeOffset};
use crate::ns_nodes::ReceiverPreferences;
use crate::ns_package::Package;
use crate::ns_storage::QueueKind;

fn receiver_label(handle: ReceiverHandle) -> String {
    match handle.kind {
        ReceiverKind::Worker => format!("worker #{}", handle.id),
        ReceiverKind::Storehouse => format!("storehouse #{}", handle.id),
    }
}

fn sorted_receivers(prefs: &ReceiverPreferences) -> Vec<ReceiverHandle> {
    let mut handles: Vec<ReceiverHandle> = prefs.iter().map(|(h, _)| h).collect();
    handles.sort_by_key(|h| (h.kind, h.id));
    handles
}

fn buffer_label(buffer: Option<&Package>) -> String {
    match buffer {
        Some(p) => format!("#{}", p.id()),
        None => "(empty)".to_string(),
    }
}

/// Static description of the network: every node with its parameters and
/// receivers, collections in ascending id order.
pub fn structure_report(factory: &Factory) -> String {
    let mut out = String::new();

    out.push_str("== LOADING RAMPS ==\n");
    for ramp in factory.ramps_by_id() {
        let _ = writeln!(out, "LOADING RAMP #{}", ramp.id());
        let _ = writeln!(out, "  Delivery interval: {}", ramp.delivery_interval());
        out.push_str("  Receivers:\n");
        for handle in sorted_receivers(ramp.preferences()) {
            let _ = writeln!(out, "    {}", receiver_label(handle));
        }
    }

    out.push_str("\n== WORKERS ==\n");
    for worker in factory.workers_by_id() {
        let _ = writeln!(out, "WORKER #{}", worker.id());
        let _ = writeln!(out, "  Processing time: {}", worker.processing_duration());
        let _ = writeln!(
            out,
            "  Queue type: {}",
            match worker.queue().kind() {
                QueueKind::Fifo => "FIFO",
                QueueKind::Lifo => "LIFO",
            }
        );
        out.push_str("  Receivers:\n");
        for handle in sorted_receivers(worker.preferences()) {
            let _ = writeln!(out, "    {}", receiver_label(handle));
        }
    }

    out.push_str("\n== STOREHOUSES ==\n");
    for storehouse in factory.storehouses_by_id() {
        let _ = writeln!(out, "STOREHOUSE #{}", storehouse.id());
    }

    out
}

/// Per-turn snapshot of every buffer, queue and stockpile.
pub fn simulation_turn_report(factory: &Factory, turn: Time) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== [ Turn: {turn} ] ===");

    out.push_str("== WORKERS ==\n");
    for worker in factory.workers_by_id() {
        let _ = writeln!(out, "WORKER #{}", worker.id());
        let _ = writeln!(
            out,
            "  PBuffer: {} (pt = {})",
            buffer_label(worker.processing_buffer()),
            worker.processing_duration()
        );
        out.push_str("  Queue:");
        for package in worker.queue().iter() {
            let _ = write!(out, " #{}", package.id());
        }
        out.push('\n');
        let _ = writeln!(out, "  SBuffer: {}", buffer_label(worker.sending_buffer()));
    }

    out.push_str("== STOREHOUSES ==\n");
    for storehouse in factory.storehouses_by_id() {
        let _ = writeln!(out, "STOREHOUSE #{}", storehouse.id());
        out.push_str("  Stock:");
        for package in storehouse.stock().iter() {
            let _ = write!(out, " #{}", package.id());
        }
        out.push('\n');
    }

    out
}

/// Emits a report every `every` turns, starting with turn 1.
pub struct IntervalReportNotifier {
    every: TimeOffset,
}

impl IntervalReportNotifier {
    pub fn new(every: TimeOffset) -> Self {
        assert!(every > 0, "report interval must be positive");
        Self { every }
    }

    pub fn should_generate_report(&self, turn: Time) -> bool {
        (turn - 1) % self.every == 0
    }
}

/// Emits a report on an explicit set of turns.
pub struct SpecificTurnsReportNotifier {
    turns: BTreeSet<Time>,
}

impl SpecificTurnsReportNotifier {
    pub fn new(turns: BTreeSet<Time>) -> Self {
        Self { turns }
    }

    pub fn should_generate_report(&self, turn: Time) -> bool {
        self.turns.contains(&turn)
    }
}
