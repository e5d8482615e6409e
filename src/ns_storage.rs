// ordered package holding areas (worker queues, storehouse stock)

use std::collections::VecDeque;

use crate::ns_package::Package;

/// Removal discipline of a queue, fixed at construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueueKind {
    Fifo,
    Lifo,
}

/// An ordered stockpile of packages.
///
/// `push` always appends; `pop` removes the oldest (FIFO) or newest (LIFO)
/// entry.
#[derive(Debug)]
pub struct PackageQueue {
    kind: QueueKind,
    packages: VecDeque<Package>,
}

impl PackageQueue {
    pub fn new(kind: QueueKind) -> Self {
        Self {
            kind,
            packages: VecDeque::new(),
        }
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn push(&mut self, package: Package) {
        self.packages.push_back(package);
    }

    pub fn pop(&mut self) -> Option<Package> {
        match self.kind {
            QueueKind::Fifo => self.packages.pop_front(),
            QueueKind::Lifo => self.packages.pop_back(),
        }
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Insertion-ordered view of the held packages.
    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter()
    }
}
