// turn loop: consistency gate, then deliveries -> passing -> work per turn

use std::fmt;

use crate::ns_factory::{Factory, FactoryError};
use crate::ns_interface::{Time, TimeOffset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationError {
    /// The network failed the consistency gate; no turns were run.
    InconsistentNetwork,

    /// A phase operation failed mid-run (empty table or dangling handle,
    /// both contract violations on a validated network).
    Factory(FactoryError),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::InconsistentNetwork => {
                write!(f, "network failed the consistency check")
            }
            SimulationError::Factory(e) => write!(f, "phase failure: {e}"),
        }
    }
}

impl std::error::Error for SimulationError {}

impl From<FactoryError> for SimulationError {
    fn from(e: FactoryError) -> Self {
        SimulationError::Factory(e)
    }
}

/// Run `turns` turns over a constructed factory.
///
/// The consistency gate runs first and a failing network aborts the whole
/// run; there are no partial runs. `report` is invoked exactly once, after
/// the gate and before any phase of turn 1, with the factory and the total
/// turn count (the reporting layer uses it for a pre-run snapshot). Each
/// turn is three strictly ordered, fully completing phases.
pub fn simulate<F>(
    factory: &mut Factory,
    turns: TimeOffset,
    mut report: F,
) -> Result<(), SimulationError>
where
    F: FnMut(&Factory, Time),
{
    if !factory.is_consistent() {
        return Err(SimulationError::InconsistentNetwork);
    }

    report(factory, turns);

    for turn in 1..=turns {
        factory.do_deliveries(turn);
        factory.do_package_passing()?;
        factory.do_work(turn);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ns_interface::{ReceiverHandle, SenderHandle};
    use crate::ns_nodes::{Ramp, Storehouse, Worker};
    use crate::ns_storage::{PackageQueue, QueueKind};

    fn line_factory(interval: u64, duration: u64) -> Factory {
        let mut factory = Factory::new();
        factory.add_ramp(Ramp::new(1, interval)).unwrap();
        factory
            .add_worker(Worker::new(1, duration, PackageQueue::new(QueueKind::Fifo)))
            .unwrap();
        factory.add_storehouse(Storehouse::new(1)).unwrap();
        factory
            .connect(SenderHandle::Ramp(1), ReceiverHandle::worker(1))
            .unwrap();
        factory
            .connect(SenderHandle::Worker(1), ReceiverHandle::storehouse(1))
            .unwrap();
        factory
    }

    #[test]
    fn inconsistent_network_refuses_to_run() {
        let mut factory = Factory::new();
        factory.add_ramp(Ramp::new(1, 1)).unwrap();

        let mut calls = 0;
        let result = simulate(&mut factory, 5, |_, _| calls += 1);
        assert_eq!(result, Err(SimulationError::InconsistentNetwork));
        assert_eq!(calls, 0);
        // no turn ran: the ramp never delivered
        assert!(factory.find_ramp(1).unwrap().sending_buffer().is_none());
    }

    #[test]
    fn report_callback_runs_exactly_once_before_turn_one() {
        let mut factory = line_factory(1, 1);
        let mut snapshots = Vec::new();
        simulate(&mut factory, 4, |f, turns| {
            // pre-run: nothing has been produced yet
            snapshots.push((f.find_storehouse(1).unwrap().stock().len(), turns));
        })
        .unwrap();
        assert_eq!(snapshots, vec![(0, 4)]);
    }

    #[test]
    fn seven_turn_line_trace() {
        // ramp fires on 1, 3, 5, 7; the first package starts processing on
        // turn 1, finishes at work(4) and lands in the storehouse at
        // passing(5); the second starts at work(5) and is still in process
        // when the run ends
        let mut factory = line_factory(2, 3);
        simulate(&mut factory, 7, |_, _| {}).unwrap();

        assert_eq!(factory.find_storehouse(1).unwrap().stock().len(), 1);
        let worker = factory.find_worker(1).unwrap();
        assert_eq!(worker.queue().len(), 2);
        assert!(worker.processing_buffer().is_some());
        assert_eq!(worker.processing_start_time(), Some(5));
        assert!(worker.sending_buffer().is_none());
        assert!(factory.find_ramp(1).unwrap().sending_buffer().is_none());
    }

    #[test]
    fn single_interval_line_reaches_steady_throughput() {
        // interval 1, duration 1: after warm-up one package per turn lands
        let mut factory = line_factory(1, 1);
        simulate(&mut factory, 10, |_, _| {}).unwrap();
        let stored = factory.find_storehouse(1).unwrap().stock().len();
        assert!(stored >= 3, "stored {stored}");
        let worker = factory.find_worker(1).unwrap();
        // nothing is lost: everything delivered is somewhere downstream
        let in_flight = worker.queue().len()
            + usize::from(worker.processing_buffer().is_some())
            + usize::from(worker.sending_buffer().is_some())
            + usize::from(factory.find_ramp(1).unwrap().sending_buffer().is_some());
        assert_eq!(stored + in_flight, 10);
    }
}
