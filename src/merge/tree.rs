use super::keyed_reader::{line_key, KeyedReader};
use std::io::{self, BufRead};

const ROOT: usize = 0;

#[derive(Debug, Clone, Copy)]
enum Node {
    Empty,
    Leaf(usize),
    Branch { left: usize, right: usize },
}

#[derive(Debug)]
struct Slot {
    node: Node,
    leaves: usize,
    /// Stream holding the smallest current key below this slot.
    winner: Option<usize>,
}

impl Slot {
    fn new(node: Node, leaves: usize) -> Self {
        Self {
            node,
            leaves,
            winner: None,
        }
    }
}

/// Balanced binary merge over any number of key-sorted line streams.
///
/// Each leaf wraps one [`KeyedReader`]; each branch caches which of its
/// two subtrees holds the smaller current key, so the overall minimum is
/// always at the root. New streams go into the subtree with fewer leaves,
/// which keeps the depth logarithmic, and may be added at any time.
///
/// On equal keys the left subtree wins, so the output order is
/// deterministic for a given insertion order.
pub struct MergeTree<R> {
    streams: Vec<KeyedReader<R>>,
    slots: Vec<Slot>,
    last_key: Option<String>,
}

impl<R: BufRead> Default for MergeTree<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: BufRead> MergeTree<R> {
    pub fn new() -> Self {
        Self {
            streams: Vec::new(),
            slots: vec![Slot::new(Node::Empty, 0)],
            last_key: None,
        }
    }

    pub fn insert(&mut self, reader: KeyedReader<R>) {
        let stream = self.streams.len();
        self.streams.push(reader);
        self.insert_at(ROOT, stream);
    }

    /// Number of streams merged, exhausted ones included.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Smallest current key over all streams.
    pub fn key(&self) -> Option<&str> {
        self.slots[ROOT]
            .winner
            .and_then(|stream| self.streams[stream].key())
    }

    /// Key of the most recently emitted line.
    pub fn last_key(&self) -> Option<&str> {
        self.last_key.as_deref()
    }

    /// Longest root-to-leaf path, counted in edges.
    pub fn depth(&self) -> usize {
        self.depth_at(ROOT)
    }

    /// Takes the line with the smallest key and advances its stream.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        if self.slots[ROOT].winner.is_none() {
            return Ok(None);
        }
        let line = self.advance_at(ROOT)?;
        if let Some(line) = &line {
            self.last_key = Some(line_key(line).to_string());
        }
        Ok(line)
    }

    fn insert_at(&mut self, slot: usize, stream: usize) {
        match self.slots[slot].node {
            Node::Empty => self.slots[slot].node = Node::Leaf(stream),
            Node::Leaf(existing) => {
                let left = self.push_leaf(existing);
                let right = self.push_leaf(stream);
                self.slots[slot].node = Node::Branch { left, right };
            }
            Node::Branch { left, right } => {
                if self.slots[left].leaves < self.slots[right].leaves {
                    self.insert_at(left, stream);
                } else {
                    self.insert_at(right, stream);
                }
            }
        }
        self.slots[slot].leaves += 1;
        self.update(slot);
    }

    fn push_leaf(&mut self, stream: usize) -> usize {
        self.slots.push(Slot::new(Node::Leaf(stream), 1));
        let slot = self.slots.len() - 1;
        self.update(slot);
        slot
    }

    fn advance_at(&mut self, slot: usize) -> io::Result<Option<String>> {
        let Some(winner) = self.slots[slot].winner else {
            return Ok(None);
        };
        let line = match self.slots[slot].node {
            Node::Empty => None,
            Node::Leaf(stream) => self.streams[stream].take_and_advance()?,
            Node::Branch { left, right } => {
                if self.slots[left].winner == Some(winner) {
                    self.advance_at(left)?
                } else {
                    self.advance_at(right)?
                }
            }
        };
        self.update(slot);
        Ok(line)
    }

    fn update(&mut self, slot: usize) {
        let winner = match self.slots[slot].node {
            Node::Empty => None,
            Node::Leaf(stream) => (!self.streams[stream].is_exhausted()).then_some(stream),
            Node::Branch { left, right } => {
                match (self.slots[left].winner, self.slots[right].winner) {
                    (Some(l), Some(r)) => {
                        if self.streams[l].key() <= self.streams[r].key() {
                            Some(l)
                        } else {
                            Some(r)
                        }
                    }
                    (l, None) => l,
                    (None, r) => r,
                }
            }
        };
        self.slots[slot].winner = winner;
    }

    fn depth_at(&self, slot: usize) -> usize {
        match self.slots[slot].node {
            Node::Empty | Node::Leaf(_) => 0,
            Node::Branch { left, right } => 1 + self.depth_at(left).max(self.depth_at(right)),
        }
    }
}

impl<R: BufRead> Iterator for MergeTree<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}
