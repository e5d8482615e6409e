// the factory: node collections, cross-node phases, graph validation

use std::fmt;

use hashbrown::HashMap;
use log::debug;

use crate::ns_interface::{ElementId, ReceiverHandle, ReceiverKind, SenderHandle, Time};
use crate::ns_nodes::{Ramp, ReceiverPreferences, RoutingError, Storehouse, Worker};
use crate::ns_package::Package;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryError {
    /// A node with this id already exists in the target collection.
    DuplicateId(ElementId),

    /// Connect/dispatch referenced a sender the factory does not own.
    UnknownSender(SenderHandle),

    /// Connect/dispatch referenced a receiver the factory does not own.
    UnknownReceiver(ReceiverHandle),

    /// Passing was attempted on a sender with an empty routing table.
    EmptyRoutingTable,

    /// A ramp was given a zero delivery interval.
    ZeroDeliveryInterval(ElementId),

    /// A worker was given a zero processing duration.
    ZeroProcessingDuration(ElementId),
}

impl fmt::Display for FactoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactoryError::DuplicateId(id) => write!(f, "duplicate node id {id}"),
            FactoryError::UnknownSender(s) => write!(f, "unknown sender {s:?}"),
            FactoryError::UnknownReceiver(r) => write!(f, "unknown receiver {r:?}"),
            FactoryError::EmptyRoutingTable => write!(f, "sender has an empty routing table"),
            FactoryError::ZeroDeliveryInterval(id) => {
                write!(f, "ramp {id} has a zero delivery interval")
            }
            FactoryError::ZeroProcessingDuration(id) => {
                write!(f, "worker {id} has a zero processing duration")
            }
        }
    }
}

impl std::error::Error for FactoryError {}

impl From<RoutingError> for FactoryError {
    fn from(e: RoutingError) -> Self {
        match e {
            RoutingError::EmptyTable => FactoryError::EmptyRoutingTable,
        }
    }
}

/// Access to the id every factory-owned node exposes.
pub trait FactoryNode {
    fn element_id(&self) -> ElementId;
}

impl FactoryNode for Ramp {
    fn element_id(&self) -> ElementId {
        self.id()
    }
}

impl FactoryNode for Worker {
    fn element_id(&self) -> ElementId {
        self.id()
    }
}

impl FactoryNode for Storehouse {
    fn element_id(&self) -> ElementId {
        self.id()
    }
}

/// Insertion-ordered collection of nodes of one kind.
///
/// Lookups are linear scans; mutation is rare and runs are short, so no
/// index is kept.
pub struct NodeCollection<N: FactoryNode> {
    nodes: Vec<N>,
}

impl<N: FactoryNode> NodeCollection<N> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Append a node; ids are unique within a collection.
    pub fn add(&mut self, node: N) -> Result<(), FactoryError> {
        let id = node.element_id();
        if self.find_by_id(id).is_some() {
            return Err(FactoryError::DuplicateId(id));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Remove by id; returns whether anything was removed.
    pub fn remove_by_id(&mut self, id: ElementId) -> bool {
        match self.nodes.iter().position(|n| n.element_id() == id) {
            Some(pos) => {
                self.nodes.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn find_by_id(&self, id: ElementId) -> Option<&N> {
        self.nodes.iter().find(|n| n.element_id() == id)
    }

    pub fn find_by_id_mut(&mut self, id: ElementId) -> Option<&mut N> {
        self.nodes.iter_mut().find(|n| n.element_id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &N> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut N> {
        self.nodes.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut N> {
        self.nodes.get_mut(index)
    }
}

impl<N: FactoryNode> Default for NodeCollection<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum NodeColor {
    Unvisited,
    InProgress,
    Done,
}

/// First violation found by the consistency walk. Only used internally to
/// decide pass/fail.
enum ConsistencyViolation {
    NoReceivers(SenderHandle),
    NoExit(SenderHandle),
    DanglingSender(SenderHandle),
}

impl fmt::Display for ConsistencyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyViolation::NoReceivers(s) => write!(f, "sender {s:?} has no receivers"),
            ConsistencyViolation::NoExit(s) => write!(f, "sender {s:?} only routes to itself"),
            ConsistencyViolation::DanglingSender(s) => {
                write!(f, "sender {s:?} is not owned by the factory")
            }
        }
    }
}

/// Owns the three node collections and orchestrates everything that crosses
/// node boundaries: deliveries, passing, work, connection bookkeeping and
/// the pre-run consistency gate.
pub struct Factory {
    ramps: NodeCollection<Ramp>,
    workers: NodeCollection<Worker>,
    storehouses: NodeCollection<Storehouse>,
}

impl Factory {
    pub fn new() -> Self {
        Self {
            ramps: NodeCollection::new(),
            workers: NodeCollection::new(),
            storehouses: NodeCollection::new(),
        }
    }

    pub fn add_ramp(&mut self, ramp: Ramp) -> Result<(), FactoryError> {
        self.ramps.add(ramp)
    }

    pub fn add_worker(&mut self, worker: Worker) -> Result<(), FactoryError> {
        self.workers.add(worker)
    }

    pub fn add_storehouse(&mut self, storehouse: Storehouse) -> Result<(), FactoryError> {
        self.storehouses.add(storehouse)
    }

    pub fn remove_ramp(&mut self, id: ElementId) -> bool {
        // ramps are never receivers, nothing to cascade
        self.ramps.remove_by_id(id)
    }

    /// Remove a worker and purge its handle from every routing table.
    pub fn remove_worker(&mut self, id: ElementId) -> bool {
        let removed = self.workers.remove_by_id(id);
        if removed {
            self.purge_receiver(ReceiverHandle::worker(id));
        }
        removed
    }

    /// Remove a storehouse and purge its handle from every routing table.
    pub fn remove_storehouse(&mut self, id: ElementId) -> bool {
        let removed = self.storehouses.remove_by_id(id);
        if removed {
            self.purge_receiver(ReceiverHandle::storehouse(id));
        }
        removed
    }

    fn purge_receiver(&mut self, handle: ReceiverHandle) {
        for ramp in self.ramps.iter_mut() {
            ramp.preferences_mut().remove_receiver(handle);
        }
        for worker in self.workers.iter_mut() {
            worker.preferences_mut().remove_receiver(handle);
        }
    }

    pub fn find_ramp(&self, id: ElementId) -> Option<&Ramp> {
        self.ramps.find_by_id(id)
    }

    pub fn find_ramp_mut(&mut self, id: ElementId) -> Option<&mut Ramp> {
        self.ramps.find_by_id_mut(id)
    }

    pub fn find_worker(&self, id: ElementId) -> Option<&Worker> {
        self.workers.find_by_id(id)
    }

    pub fn find_worker_mut(&mut self, id: ElementId) -> Option<&mut Worker> {
        self.workers.find_by_id_mut(id)
    }

    pub fn find_storehouse(&self, id: ElementId) -> Option<&Storehouse> {
        self.storehouses.find_by_id(id)
    }

    pub fn find_storehouse_mut(&mut self, id: ElementId) -> Option<&mut Storehouse> {
        self.storehouses.find_by_id_mut(id)
    }

    /// Insertion-ordered iteration.
    pub fn ramps(&self) -> impl Iterator<Item = &Ramp> {
        self.ramps.iter()
    }

    pub fn workers(&self) -> impl Iterator<Item = &Worker> {
        self.workers.iter()
    }

    pub fn storehouses(&self) -> impl Iterator<Item = &Storehouse> {
        self.storehouses.iter()
    }

    /// Ascending-id views for reporting.
    pub fn ramps_by_id(&self) -> Vec<&Ramp> {
        let mut nodes: Vec<&Ramp> = self.ramps.iter().collect();
        nodes.sort_by_key(|n| n.id());
        nodes
    }

    pub fn workers_by_id(&self) -> Vec<&Worker> {
        let mut nodes: Vec<&Worker> = self.workers.iter().collect();
        nodes.sort_by_key(|n| n.id());
        nodes
    }

    pub fn storehouses_by_id(&self) -> Vec<&Storehouse> {
        let mut nodes: Vec<&Storehouse> = self.storehouses.iter().collect();
        nodes.sort_by_key(|n| n.id());
        nodes
    }

    pub fn has_receiver(&self, handle: ReceiverHandle) -> bool {
        match handle.kind {
            ReceiverKind::Worker => self.workers.find_by_id(handle.id).is_some(),
            ReceiverKind::Storehouse => self.storehouses.find_by_id(handle.id).is_some(),
        }
    }

    /// Add `receiver` to `sender`'s routing table, rejecting handles the
    /// factory does not own.
    pub fn connect(
        &mut self,
        sender: SenderHandle,
        receiver: ReceiverHandle,
    ) -> Result<(), FactoryError> {
        if !self.has_receiver(receiver) {
            return Err(FactoryError::UnknownReceiver(receiver));
        }
        self.sender_preferences_mut(sender)
            .ok_or(FactoryError::UnknownSender(sender))?
            .add_receiver(receiver);
        Ok(())
    }

    /// Drop `receiver` from `sender`'s routing table.
    pub fn disconnect(
        &mut self,
        sender: SenderHandle,
        receiver: ReceiverHandle,
    ) -> Result<(), FactoryError> {
        self.sender_preferences_mut(sender)
            .ok_or(FactoryError::UnknownSender(sender))?
            .remove_receiver(receiver);
        Ok(())
    }

    fn sender_preferences(&self, sender: SenderHandle) -> Option<&ReceiverPreferences> {
        match sender {
            SenderHandle::Ramp(id) => self.ramps.find_by_id(id).map(|r| r.preferences()),
            SenderHandle::Worker(id) => self.workers.find_by_id(id).map(|w| w.preferences()),
        }
    }

    fn sender_preferences_mut(&mut self, sender: SenderHandle) -> Option<&mut ReceiverPreferences> {
        match sender {
            SenderHandle::Ramp(id) => self.ramps.find_by_id_mut(id).map(|r| r.preferences_mut()),
            SenderHandle::Worker(id) => {
                self.workers.find_by_id_mut(id).map(|w| w.preferences_mut())
            }
        }
    }

    /// True iff every sender has a non-empty routing table and every ramp
    /// can reach at least one storehouse by walking routing tables forward.
    ///
    /// Three-color depth-first walk over the sender graph. Storehouse
    /// receivers satisfy a sender immediately; worker receivers recurse.
    /// Meeting a node already on the recursion stack is neutral: the cycle
    /// itself is not a failure, but it contributes no exit either, so some
    /// other branch of an ancestor has to reach a storehouse. The first
    /// violation decides; there are no partial results.
    pub fn is_consistent(&self) -> bool {
        // a sender with zero receivers is invalid even if unreachable
        if self.ramps.iter().any(|r| r.preferences().is_empty())
            || self.workers.iter().any(|w| w.preferences().is_empty())
        {
            return false;
        }

        let mut colors: HashMap<SenderHandle, NodeColor> = HashMap::new();
        for ramp in self.ramps.iter() {
            match self.reaches_storehouse(SenderHandle::Ramp(ramp.id()), &mut colors) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("ramp {} cannot reach a storehouse", ramp.id());
                    return false;
                }
                Err(violation) => {
                    debug!("consistency violation: {violation}");
                    return false;
                }
            }
        }
        true
    }

    fn reaches_storehouse(
        &self,
        sender: SenderHandle,
        colors: &mut HashMap<SenderHandle, NodeColor>,
    ) -> Result<bool, ConsistencyViolation> {
        match colors.get(&sender) {
            Some(NodeColor::Done) => return Ok(true),
            Some(NodeColor::InProgress) => return Ok(false),
            _ => {}
        }
        colors.insert(sender, NodeColor::InProgress);

        let prefs = self
            .sender_preferences(sender)
            .ok_or(ConsistencyViolation::DanglingSender(sender))?;
        if prefs.is_empty() {
            return Err(ConsistencyViolation::NoReceivers(sender));
        }

        // self-loops do not count as a valid exit
        let has_candidate = prefs.iter().any(|(handle, _)| {
            handle.kind == ReceiverKind::Storehouse || SenderHandle::Worker(handle.id) != sender
        });
        if !has_candidate {
            return Err(ConsistencyViolation::NoExit(sender));
        }

        let mut satisfied = false;
        for (handle, _) in prefs.iter() {
            match handle.kind {
                ReceiverKind::Storehouse => satisfied = true,
                ReceiverKind::Worker => {
                    let next = SenderHandle::Worker(handle.id);
                    if next == sender {
                        continue;
                    }
                    if self.reaches_storehouse(next, colors)? {
                        satisfied = true;
                    }
                }
            }
        }

        // an unsatisfied node goes back to unvisited so a later walk that
        // reaches it through a resolved ancestor can re-examine it
        colors.insert(
            sender,
            if satisfied {
                NodeColor::Done
            } else {
                NodeColor::Unvisited
            },
        );
        Ok(satisfied)
    }

    /// Phase 1: every ramp gets a chance to create a package.
    pub fn do_deliveries(&mut self, turn: Time) {
        for ramp in self.ramps.iter_mut() {
            ramp.deliver_goods(turn);
        }
    }

    /// Phase 2: every loaded sender dispatches, ramps first then workers.
    ///
    /// Fails only by propagating an empty-table draw or a dangling handle;
    /// neither can occur on a network that passed `is_consistent`.
    pub fn do_package_passing(&mut self) -> Result<(), FactoryError> {
        for i in 0..self.ramps.len() {
            let dispatch = {
                let ramp = match self.ramps.get_mut(i) {
                    Some(r) => r,
                    None => continue,
                };
                if ramp.sending_buffer().is_none() {
                    continue;
                }
                let handle = ramp.preferences_mut().choose_receiver()?;
                ramp.take_sending().map(|p| (handle, p))
            };
            if let Some((handle, package)) = dispatch {
                self.deposit(handle, package)?;
            }
        }

        for i in 0..self.workers.len() {
            let dispatch = {
                let worker = match self.workers.get_mut(i) {
                    Some(w) => w,
                    None => continue,
                };
                if worker.sending_buffer().is_none() {
                    continue;
                }
                let handle = worker.preferences_mut().choose_receiver()?;
                worker.take_sending().map(|p| (handle, p))
            };
            if let Some((handle, package)) = dispatch {
                self.deposit(handle, package)?;
            }
        }

        Ok(())
    }

    /// Phase 3: every worker advances its processing pipeline.
    pub fn do_work(&mut self, turn: Time) {
        for worker in self.workers.iter_mut() {
            worker.do_work(turn);
        }
    }

    fn deposit(&mut self, handle: ReceiverHandle, package: Package) -> Result<(), FactoryError> {
        match handle.kind {
            ReceiverKind::Worker => self
                .workers
                .find_by_id_mut(handle.id)
                .ok_or(FactoryError::UnknownReceiver(handle))?
                .receive_package(package),
            ReceiverKind::Storehouse => self
                .storehouses
                .find_by_id_mut(handle.id)
                .ok_or(FactoryError::UnknownReceiver(handle))?
                .receive_package(package),
        }
        Ok(())
    }
}

impl Default for Factory {
    fn default() -> Self {
        Self::new()
    }
}
