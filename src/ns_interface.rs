use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// all the same numeric type of some size to allow casting/interop
pub type ElementId = u64;
pub type PackageId = ElementId;

pub type Time = u64;
pub type TimeOffset = u64;

/// Which receiver collection a handle points into.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReceiverKind {
    Worker,
    Storehouse,
}

/// Weak handle to a receiver owned by the factory.
///
/// Routing tables never own the receivers they point at; they hold these
/// handles and the factory resolves them at dispatch time. Removing a node
/// from the factory cascades over every table, so a handle stored in a live
/// table always resolves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReceiverHandle {
    pub kind: ReceiverKind,
    pub id: ElementId,
}

impl ReceiverHandle {
    pub fn worker(id: ElementId) -> Self {
        Self {
            kind: ReceiverKind::Worker,
            id,
        }
    }

    pub fn storehouse(id: ElementId) -> Self {
        Self {
            kind: ReceiverKind::Storehouse,
            id,
        }
    }
}

/// Handle to a sender owned by the factory (key of the consistency walk).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SenderHandle {
    Ramp(ElementId),
    Worker(ElementId),
}

/// Source of uniform draws in `[0, 1)` driving receiver choice.
///
/// Injectable so that routing is deterministic under test with a
/// fixed-sequence stub.
pub trait ProbabilitySource {
    fn next_probability(&mut self) -> f64;
}

/// Default rand-backed source. Seedable for reproducible runs.
pub struct UniformSource {
    rng: StdRng,
}

impl UniformSource {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            rng: StdRng::from_seed(seed),
        }
    }
}

impl Default for UniformSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbabilitySource for UniformSource {
    fn next_probability(&mut self) -> f64 {
        // Rng::gen::<f64> is uniform over [0, 1)
        self.rng.gen::<f64>()
    }
}

/// Replays a fixed sequence of draws, cycling when exhausted.
///
/// Used to pin down routing decisions in tests and traces.
pub struct FixedSequence {
    values: Vec<f64>,
    next: usize,
}

impl FixedSequence {
    pub fn new(values: Vec<f64>) -> Self {
        assert!(!values.is_empty(), "sequence must have at least one value");
        Self { values, next: 0 }
    }
}

impl ProbabilitySource for FixedSequence {
    fn next_probability(&mut self) -> f64 {
        let value = self.values[self.next % self.values.len()];
        self.next += 1;
        value
    }
}
