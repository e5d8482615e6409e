//! Factory flow simulation runner

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use netsim::{
    simulation_turn_report, Factory, FactoryError, IntervalReportNotifier, PackageQueue, Ramp,
    ReceiverHandle, SenderHandle, SimulationError, Storehouse, UniformSource, Worker,
};

use super::config::{FlowSimConfig, ReceiverSpec, SenderSpec};
use super::stats::{FlowResult, FlowStats};

/// Builds a factory from a layout and drives the three phases turn by turn,
/// collecting statistics along the way.
pub struct FlowRunner {
    config: FlowSimConfig,
    seed: [u8; 32],
    factory: Factory,
    stats: FlowStats,
}

impl FlowRunner {
    /// Create a runner with the factory built and wired.
    ///
    /// Every sender gets its own probability source seeded from the master
    /// seed, so a run is reproducible from the seed alone.
    pub fn new(config: FlowSimConfig) -> Result<Self, FactoryError> {
        let seed = config.resolve_seed();
        let mut seed_rng = StdRng::from_seed(seed);
        let mut next_source = || {
            let mut sender_seed = [0u8; 32];
            seed_rng.fill_bytes(&mut sender_seed);
            Box::new(UniformSource::from_seed(sender_seed))
        };

        let mut factory = Factory::new();
        for spec in &config.layout.ramps {
            // node constructors assert on zero values; scenario input is
            // untrusted, so reject it as an error the caller can skip on
            if spec.delivery_interval == 0 {
                return Err(FactoryError::ZeroDeliveryInterval(spec.id));
            }
            factory.add_ramp(Ramp::new_with_source(
                spec.id,
                spec.delivery_interval,
                next_source(),
            ))?;
        }
        for spec in &config.layout.workers {
            if spec.processing_time == 0 {
                return Err(FactoryError::ZeroProcessingDuration(spec.id));
            }
            factory.add_worker(Worker::new_with_source(
                spec.id,
                spec.processing_time,
                PackageQueue::new(spec.queue.into()),
                next_source(),
            ))?;
        }
        for spec in &config.layout.storehouses {
            factory.add_storehouse(Storehouse::new(spec.id))?;
        }
        for link in &config.layout.links {
            let sender = match link.sender {
                SenderSpec::Ramp { id } => SenderHandle::Ramp(id),
                SenderSpec::Worker { id } => SenderHandle::Worker(id),
            };
            let receiver = match link.receiver {
                ReceiverSpec::Worker { id } => ReceiverHandle::worker(id),
                ReceiverSpec::Storehouse { id } => ReceiverHandle::storehouse(id),
            };
            factory.connect(sender, receiver)?;
        }

        Ok(Self {
            config,
            seed,
            factory,
            stats: FlowStats::default(),
        })
    }

    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    /// Run all configured turns.
    pub fn run(mut self) -> Result<FlowResult, SimulationError> {
        if !self.factory.is_consistent() {
            warn!("network failed the consistency check, refusing to run");
            return Err(SimulationError::InconsistentNetwork);
        }

        let notifier = self.config.report_interval.map(IntervalReportNotifier::new);

        info!(
            "starting flow run: {} turns, {} ramps, {} workers, {} storehouses",
            self.config.turns,
            self.factory.ramps().count(),
            self.factory.workers().count(),
            self.factory.storehouses().count()
        );

        for turn in 1..=self.config.turns {
            let loaded_before: Vec<bool> = self
                .factory
                .ramps()
                .map(|r| r.sending_buffer().is_some())
                .collect();

            self.factory.do_deliveries(turn);

            self.stats.produced += self
                .factory
                .ramps()
                .zip(loaded_before)
                .filter(|(ramp, was_loaded)| ramp.sending_buffer().is_some() && !was_loaded)
                .count();

            self.factory
                .do_package_passing()
                .map_err(SimulationError::from)?;
            self.factory.do_work(turn);

            self.stats.observe_turn(&self.factory);

            if let Some(n) = &notifier {
                if n.should_generate_report(turn) {
                    print!("{}", simulation_turn_report(&self.factory, turn));
                }
            }
        }

        info!("flow run complete");
        let turns = self.config.turns;
        Ok(self.stats.into_result(&self.factory, self.seed, turns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory_flow::config::{
        FactoryLayout, LinkSpec, QueueSpec, RampSpec, StorehouseSpec, WorkerSpec,
    };

    fn line_config(turns: u64) -> FlowSimConfig {
        FlowSimConfig {
            turns,
            seed: Some([7u8; 32]),
            report_interval: None,
            layout: FactoryLayout {
                ramps: vec![RampSpec {
                    id: 1,
                    delivery_interval: 2,
                }],
                workers: vec![WorkerSpec {
                    id: 1,
                    processing_time: 3,
                    queue: QueueSpec::Fifo,
                }],
                storehouses: vec![StorehouseSpec { id: 1 }],
                links: vec![
                    LinkSpec {
                        sender: SenderSpec::Ramp { id: 1 },
                        receiver: ReceiverSpec::Worker { id: 1 },
                    },
                    LinkSpec {
                        sender: SenderSpec::Worker { id: 1 },
                        receiver: ReceiverSpec::Storehouse { id: 1 },
                    },
                ],
            },
        }
    }

    #[test]
    fn runner_builds_and_runs_a_line_network() {
        let runner = FlowRunner::new(line_config(7)).unwrap();
        let result = runner.run().unwrap();
        assert_eq!(result.turns_completed, 7);
        assert_eq!(result.produced, 4);
        assert_eq!(result.total_stored(), 1);
        assert_eq!(result.total_stored() + result.in_flight, result.produced);
    }

    #[test]
    fn zero_valued_scenario_parameters_are_errors_not_panics() {
        let mut config = line_config(5);
        config.layout.ramps[0].delivery_interval = 0;
        assert_eq!(
            FlowRunner::new(config).err(),
            Some(FactoryError::ZeroDeliveryInterval(1))
        );

        let mut config = line_config(5);
        config.layout.workers[0].processing_time = 0;
        assert_eq!(
            FlowRunner::new(config).err(),
            Some(FactoryError::ZeroProcessingDuration(1))
        );
    }

    #[test]
    fn unlinked_network_refuses_to_run() {
        let mut config = line_config(5);
        config.layout.links.clear();
        let runner = FlowRunner::new(config).unwrap();
        assert!(matches!(
            runner.run(),
            Err(SimulationError::InconsistentNetwork)
        ));
    }
}
