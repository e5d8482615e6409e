//! Configuration for factory flow simulations

use netsim::{ElementId, QueueKind, TimeOffset};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Configuration for a flow simulation run
#[derive(Debug, Clone)]
pub struct FlowSimConfig {
    /// Number of turns to run
    pub turns: TimeOffset,

    /// Random seed (None = generate random)
    pub seed: Option<[u8; 32]>,

    /// Emit a turn report every N turns (None = no turn reports)
    pub report_interval: Option<TimeOffset>,

    /// Network layout
    pub layout: FactoryLayout,
}

impl FlowSimConfig {
    /// Get or generate seed
    pub fn resolve_seed(&self) -> [u8; 32] {
        self.seed.unwrap_or_else(|| {
            let mut temp_rng = StdRng::from_entropy();
            let mut seed = [0u8; 32];
            temp_rng.fill_bytes(&mut seed);
            seed
        })
    }
}

/// Declarative description of the network to build
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct FactoryLayout {
    #[serde(default)]
    pub ramps: Vec<RampSpec>,

    #[serde(default)]
    pub workers: Vec<WorkerSpec>,

    #[serde(default)]
    pub storehouses: Vec<StorehouseSpec>,

    #[serde(default)]
    pub links: Vec<LinkSpec>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RampSpec {
    pub id: ElementId,
    pub delivery_interval: TimeOffset,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct WorkerSpec {
    pub id: ElementId,
    pub processing_time: TimeOffset,

    #[serde(default)]
    pub queue: QueueSpec,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct StorehouseSpec {
    pub id: ElementId,
}

#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueSpec {
    #[default]
    Fifo,
    Lifo,
}

impl From<QueueSpec> for QueueKind {
    fn from(spec: QueueSpec) -> Self {
        match spec {
            QueueSpec::Fifo => QueueKind::Fifo,
            QueueSpec::Lifo => QueueKind::Lifo,
        }
    }
}

/// One routing-table entry: sender -> receiver
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LinkSpec {
    pub sender: SenderSpec,
    pub receiver: ReceiverSpec,
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SenderSpec {
    Ramp { id: ElementId },
    Worker { id: ElementId },
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReceiverSpec {
    Worker { id: ElementId },
    Storehouse { id: ElementId },
}
