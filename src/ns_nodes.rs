// node state machines: routing, ramps, workers, storehouses

use std::fmt;

use indexmap::IndexMap;

use crate::ns_interface::{
    ElementId, ProbabilitySource, ReceiverHandle, Time, TimeOffset, UniformSource,
};
use crate::ns_package::Package;
use crate::ns_storage::{PackageQueue, QueueKind};

/// Dispatch was attempted on a sender with no receivers.
///
/// This is a contract violation: callers are expected to gate on
/// `Factory::is_consistent()` before running phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingError {
    EmptyTable,
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingError::EmptyTable => write!(f, "routing table has no receivers"),
        }
    }
}

impl std::error::Error for RoutingError {}

/// Weighted routing table of one sender.
///
/// Entries keep insertion order (the draw walks them in that order) and the
/// weights always sum to 1 while the table is non-empty.
pub struct ReceiverPreferences {
    entries: IndexMap<ReceiverHandle, f64>,
    source: Box<dyn ProbabilitySource>,
}

impl ReceiverPreferences {
    pub fn new() -> Self {
        Self::with_source(Box::new(UniformSource::new()))
    }

    /// Create a table with an injected probability source (deterministic
    /// routing under test or seeded simulation runs).
    pub fn with_source(source: Box<dyn ProbabilitySource>) -> Self {
        Self {
            entries: IndexMap::new(),
            source,
        }
    }

    /// Insert a receiver with weight `1/N` (N = new entry count), rescaling
    /// the existing entries so the total stays 1. Adding a handle that is
    /// already present is a no-op.
    pub fn add_receiver(&mut self, handle: ReceiverHandle) {
        if self.entries.contains_key(&handle) {
            return;
        }
        let fresh = 1.0 / (self.entries.len() + 1) as f64;
        for weight in self.entries.values_mut() {
            *weight *= 1.0 - fresh;
        }
        self.entries.insert(handle, fresh);
    }

    /// Remove a receiver and renormalize the remaining weights to sum 1,
    /// preserving their relative proportions.
    pub fn remove_receiver(&mut self, handle: ReceiverHandle) {
        if self.entries.shift_remove(&handle).is_none() || self.entries.is_empty() {
            return;
        }
        let total: f64 = self.entries.values().sum();
        for weight in self.entries.values_mut() {
            *weight /= total;
        }
    }

    /// Draw one receiver: a uniform value in `[0, 1)` is matched against the
    /// cumulative weights in insertion order.
    pub fn choose_receiver(&mut self) -> Result<ReceiverHandle, RoutingError> {
        if self.entries.is_empty() {
            return Err(RoutingError::EmptyTable);
        }
        let draw = self.source.next_probability();
        let mut cumulative = 0.0;
        let mut chosen = None;
        for (handle, weight) in &self.entries {
            cumulative += weight;
            if draw < cumulative {
                return Ok(*handle);
            }
            chosen = Some(*handle);
        }
        // cumulative fell short of the draw by floating-point dust
        chosen.ok_or(RoutingError::EmptyTable)
    }

    pub fn contains(&self, handle: ReceiverHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn weight(&self, handle: ReceiverHandle) -> Option<f64> {
        self.entries.get(&handle).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insertion-ordered `(receiver, weight)` view.
    pub fn iter(&self) -> impl Iterator<Item = (ReceiverHandle, f64)> + '_ {
        self.entries.iter().map(|(h, w)| (*h, *w))
    }
}

impl Default for ReceiverPreferences {
    fn default() -> Self {
        Self::new()
    }
}

/// Sender capability shared by ramps and workers: a routing table plus a
/// single-slot output buffer awaiting the passing phase.
pub struct PackageSender {
    preferences: ReceiverPreferences,
    buffer: Option<Package>,
}

impl PackageSender {
    pub fn new() -> Self {
        Self {
            preferences: ReceiverPreferences::new(),
            buffer: None,
        }
    }

    pub fn with_source(source: Box<dyn ProbabilitySource>) -> Self {
        Self {
            preferences: ReceiverPreferences::with_source(source),
            buffer: None,
        }
    }

    pub fn preferences(&self) -> &ReceiverPreferences {
        &self.preferences
    }

    pub fn preferences_mut(&mut self) -> &mut ReceiverPreferences {
        &mut self.preferences
    }

    pub fn sending_buffer(&self) -> Option<&Package> {
        self.buffer.as_ref()
    }

    /// Vacate the output buffer (passing phase hand-off).
    pub fn take_sending(&mut self) -> Option<Package> {
        self.buffer.take()
    }

    fn push_package(&mut self, package: Package) {
        debug_assert!(self.buffer.is_none(), "output buffer is a single slot");
        self.buffer = Some(package);
    }
}

impl Default for PackageSender {
    fn default() -> Self {
        Self::new()
    }
}

/// Originates packages on a fixed interval.
pub struct Ramp {
    id: ElementId,
    delivery_interval: TimeOffset,
    sender: PackageSender,
}

impl Ramp {
    pub fn new(id: ElementId, delivery_interval: TimeOffset) -> Self {
        Self::new_with_source(id, delivery_interval, Box::new(UniformSource::new()))
    }

    pub fn new_with_source(
        id: ElementId,
        delivery_interval: TimeOffset,
        source: Box<dyn ProbabilitySource>,
    ) -> Self {
        assert!(delivery_interval > 0, "delivery interval must be positive");
        Self {
            id,
            delivery_interval,
            sender: PackageSender::with_source(source),
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn delivery_interval(&self) -> TimeOffset {
        self.delivery_interval
    }

    /// Create one new package into the output buffer on delivery turns
    /// (turns 1, k+1, 2k+1, ...). A still-loaded buffer is held, not
    /// overwritten; the delivery is skipped.
    pub fn deliver_goods(&mut self, turn: Time) {
        if (turn - 1) % self.delivery_interval == 0 && self.sender.sending_buffer().is_none() {
            self.sender.push_package(Package::new());
        }
    }

    pub fn preferences(&self) -> &ReceiverPreferences {
        self.sender.preferences()
    }

    pub fn preferences_mut(&mut self) -> &mut ReceiverPreferences {
        self.sender.preferences_mut()
    }

    pub fn sending_buffer(&self) -> Option<&Package> {
        self.sender.sending_buffer()
    }

    pub(crate) fn take_sending(&mut self) -> Option<Package> {
        self.sender.take_sending()
    }
}

struct Processing {
    package: Package,
    started: Time,
}

/// Receives, queues, processes with a fixed duration, then forwards.
pub struct Worker {
    id: ElementId,
    processing_duration: TimeOffset,
    queue: PackageQueue,
    processing: Option<Processing>,
    sender: PackageSender,
}

impl Worker {
    pub fn new(id: ElementId, processing_duration: TimeOffset, queue: PackageQueue) -> Self {
        Self::new_with_source(
            id,
            processing_duration,
            queue,
            Box::new(UniformSource::new()),
        )
    }

    pub fn new_with_source(
        id: ElementId,
        processing_duration: TimeOffset,
        queue: PackageQueue,
        source: Box<dyn ProbabilitySource>,
    ) -> Self {
        assert!(processing_duration > 0, "processing duration must be positive");
        Self {
            id,
            processing_duration,
            queue,
            processing: None,
            sender: PackageSender::with_source(source),
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn processing_duration(&self) -> TimeOffset {
        self.processing_duration
    }

    /// Incoming packages are queued unconditionally; the queue is unbounded.
    pub fn receive_package(&mut self, package: Package) {
        self.queue.push(package);
    }

    /// Advance the processing pipeline by one turn.
    ///
    /// An idle worker pulls the next package from its queue and records the
    /// start turn. A package whose duration has elapsed moves to the output
    /// buffer, unless the buffer is still loaded from an earlier turn, in
    /// which case it is held until the passing phase vacates the slot
    /// (finished work is never dropped). The elapsed check is `>=` so a held
    /// package still advances after overshooting the exact duration.
    pub fn do_work(&mut self, turn: Time) {
        if self.processing.is_none() {
            if let Some(package) = self.queue.pop() {
                self.processing = Some(Processing {
                    package,
                    started: turn,
                });
            }
        }

        let finished = self.processing.as_ref().is_some_and(|p| {
            turn - p.started >= self.processing_duration && self.sender.sending_buffer().is_none()
        });
        if finished {
            if let Some(done) = self.processing.take() {
                self.sender.push_package(done.package);
            }
        }
    }

    pub fn queue(&self) -> &PackageQueue {
        &self.queue
    }

    pub fn processing_buffer(&self) -> Option<&Package> {
        self.processing.as_ref().map(|p| &p.package)
    }

    pub fn processing_start_time(&self) -> Option<Time> {
        self.processing.as_ref().map(|p| p.started)
    }

    pub fn preferences(&self) -> &ReceiverPreferences {
        self.sender.preferences()
    }

    pub fn preferences_mut(&mut self) -> &mut ReceiverPreferences {
        self.sender.preferences_mut()
    }

    pub fn sending_buffer(&self) -> Option<&Package> {
        self.sender.sending_buffer()
    }

    pub(crate) fn take_sending(&mut self) -> Option<Package> {
        self.sender.take_sending()
    }
}

/// Terminal node: accumulates everything it receives.
pub struct Storehouse {
    id: ElementId,
    stock: PackageQueue,
}

impl Storehouse {
    pub fn new(id: ElementId) -> Self {
        // discipline is irrelevant here, nothing is ever withdrawn
        Self::with_stock(id, PackageQueue::new(QueueKind::Fifo))
    }

    pub fn with_stock(id: ElementId, stock: PackageQueue) -> Self {
        Self { id, stock }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn receive_package(&mut self, package: Package) {
        self.stock.push(package);
    }

    pub fn stock(&self) -> &PackageQueue {
        &self.stock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ns_interface::FixedSequence;

    fn assert_weights_sum_to_one(prefs: &ReceiverPreferences) {
        let total: f64 = prefs.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9, "weights sum to {total}");
    }

    #[test]
    fn added_receivers_share_weight_equally() {
        let mut prefs = ReceiverPreferences::new();
        for id in 1..=4 {
            prefs.add_receiver(ReceiverHandle::worker(id));
            assert_weights_sum_to_one(&prefs);
        }
        for (_, weight) in prefs.iter() {
            assert!((weight - 0.25).abs() < 1e-9);
        }
    }

    #[test]
    fn removal_renormalizes_preserving_proportions() {
        let mut prefs = ReceiverPreferences::new();
        prefs.add_receiver(ReceiverHandle::worker(1));
        prefs.add_receiver(ReceiverHandle::worker(2));
        prefs.add_receiver(ReceiverHandle::storehouse(3));

        prefs.remove_receiver(ReceiverHandle::worker(1));
        assert_eq!(prefs.len(), 2);
        assert_weights_sum_to_one(&prefs);
        assert!((prefs.weight(ReceiverHandle::worker(2)).unwrap() - 0.5).abs() < 1e-9);
        assert!((prefs.weight(ReceiverHandle::storehouse(3)).unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn weights_stay_normalized_over_mixed_mutations() {
        let mut prefs = ReceiverPreferences::new();
        for id in 0..10 {
            prefs.add_receiver(ReceiverHandle::worker(id));
        }
        for id in (0..10).step_by(3) {
            prefs.remove_receiver(ReceiverHandle::worker(id));
            assert_weights_sum_to_one(&prefs);
        }
        prefs.add_receiver(ReceiverHandle::storehouse(99));
        assert_weights_sum_to_one(&prefs);
    }

    #[test]
    fn choose_walks_entries_in_insertion_order() {
        let mut prefs =
            ReceiverPreferences::with_source(Box::new(FixedSequence::new(vec![0.0, 0.5, 0.99])));
        let first = ReceiverHandle::worker(1);
        let second = ReceiverHandle::storehouse(2);
        prefs.add_receiver(first);
        prefs.add_receiver(second);

        assert_eq!(prefs.choose_receiver(), Ok(first));
        assert_eq!(prefs.choose_receiver(), Ok(second));
        assert_eq!(prefs.choose_receiver(), Ok(second));
    }

    #[test]
    fn choose_on_empty_table_is_an_error() {
        let mut prefs = ReceiverPreferences::new();
        assert_eq!(prefs.choose_receiver(), Err(RoutingError::EmptyTable));
    }

    #[test]
    fn removed_receiver_is_never_chosen() {
        let mut prefs =
            ReceiverPreferences::with_source(Box::new(FixedSequence::new(vec![0.0, 0.5, 0.999])));
        let gone = ReceiverHandle::worker(1);
        let kept = ReceiverHandle::storehouse(2);
        prefs.add_receiver(gone);
        prefs.add_receiver(kept);
        prefs.remove_receiver(gone);

        for _ in 0..3 {
            assert_eq!(prefs.choose_receiver(), Ok(kept));
        }
    }

    #[test]
    fn ramp_delivers_on_interval_turns_only() {
        let mut ramp = Ramp::new(1, 3);
        let mut delivered = Vec::new();
        for turn in 1..=10 {
            ramp.deliver_goods(turn);
            if ramp.take_sending().is_some() {
                delivered.push(turn);
            }
        }
        assert_eq!(delivered, vec![1, 4, 7, 10]);
    }

    #[test]
    fn ramp_holds_undispatched_package_instead_of_dropping() {
        let mut ramp = Ramp::new(1, 1);
        ramp.deliver_goods(1);
        let held = ramp.sending_buffer().map(|p| p.id());
        assert!(held.is_some());

        // next delivery turn, buffer still loaded: skip, do not replace
        ramp.deliver_goods(2);
        assert_eq!(ramp.sending_buffer().map(|p| p.id()), held);
    }

    #[test]
    fn worker_finishes_after_exact_duration() {
        let mut worker = Worker::new(1, 2, PackageQueue::new(QueueKind::Fifo));
        worker.receive_package(Package::new());

        worker.do_work(5);
        assert!(worker.processing_buffer().is_some());
        assert_eq!(worker.processing_start_time(), Some(5));
        assert!(worker.sending_buffer().is_none());

        worker.do_work(6);
        assert!(worker.sending_buffer().is_none());

        worker.do_work(7);
        assert!(worker.sending_buffer().is_some());
        assert!(worker.processing_buffer().is_none());
    }

    #[test]
    fn finished_package_waits_for_occupied_send_buffer() {
        let mut worker = Worker::new(1, 1, PackageQueue::new(QueueKind::Fifo));
        worker.receive_package(Package::new());
        worker.receive_package(Package::new());

        worker.do_work(1); // load first
        worker.do_work(2); // first moves to send buffer
        let first = worker.sending_buffer().map(|p| p.id());
        assert!(first.is_some());

        worker.do_work(3); // load second
        let second = worker.processing_buffer().map(|p| p.id());
        assert!(second.is_some());

        worker.do_work(4); // second is done but the slot is taken: hold
        assert_eq!(worker.sending_buffer().map(|p| p.id()), first);
        assert_eq!(worker.processing_buffer().map(|p| p.id()), second);

        // passing phase vacates the slot; held package advances next turn
        assert_eq!(worker.take_sending().map(|p| p.id()), first);
        worker.do_work(5);
        assert_eq!(worker.sending_buffer().map(|p| p.id()), second);
        assert!(worker.processing_buffer().is_none());
    }

    #[test]
    fn lifo_worker_processes_newest_first() {
        let mut worker = Worker::new(1, 1, PackageQueue::new(QueueKind::Lifo));
        let a = Package::new();
        let b = Package::new();
        let newest = b.id();
        worker.receive_package(a);
        worker.receive_package(b);

        worker.do_work(1);
        assert_eq!(worker.processing_buffer().map(|p| p.id()), Some(newest));
    }

    #[test]
    fn storehouse_accumulates_in_arrival_order() {
        let mut storehouse = Storehouse::new(7);
        let a = Package::new();
        let b = Package::new();
        let ids = vec![a.id(), b.id()];
        storehouse.receive_package(a);
        storehouse.receive_package(b);

        let stocked: Vec<_> = storehouse.stock().iter().map(|p| p.id()).collect();
        assert_eq!(stocked, ids);
    }
}
