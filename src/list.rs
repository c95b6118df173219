//! Circular doubly-linked image list over a slot arena.
//!
//! Slot 0 is the anchor: its `next`/`prev` are the head and tail, and its
//! `count` holds the number of real entries. Every other live slot carries a
//! cached 1-based position. The total is always exact; per-node positions go
//! stale (`dirty`) whenever a mutation shifts existing nodes, and
//! [`ImageList::recount`] repairs them.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::trace;

use crate::entry::FileEntry;

const ANCHOR: usize = 0;

/// Handle to a list node. Stays valid across reordering; a removed node's
/// handle never resolves again, even when its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct Node {
    entry: Option<FileEntry>,
    prev: usize,
    next: usize,
    count: usize,
    generation: u32,
    live: bool,
}

impl Node {
    fn anchor() -> Self {
        Self {
            entry: None,
            prev: ANCHOR,
            next: ANCHOR,
            count: 0,
            generation: 0,
            live: true,
        }
    }
}

#[derive(Debug)]
pub struct ImageList {
    nodes: Vec<Node>,
    free: Vec<usize>,
    dirty: bool,
}

impl Default for ImageList {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageList {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::anchor()],
            free: Vec::new(),
            dirty: false,
        }
    }

    /// Number of real entries. Always exact.
    pub fn len(&self) -> usize {
        self.nodes[ANCHOR].count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether cached positions are stale.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn anchor(&self) -> NodeId {
        self.id_of(ANCHOR)
    }

    pub fn is_anchor(&self, id: NodeId) -> bool {
        id.index == ANCHOR
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.resolve(id).is_some_and(|idx| idx != ANCHOR)
    }

    pub fn first(&self) -> Option<NodeId> {
        let head = self.nodes[ANCHOR].next;
        (head != ANCHOR).then(|| self.id_of(head))
    }

    pub fn last(&self) -> Option<NodeId> {
        let tail = self.nodes[ANCHOR].prev;
        (tail != ANCHOR).then(|| self.id_of(tail))
    }

    /// Raw successor; the anchor is part of the cycle.
    pub fn next_of(&self, id: NodeId) -> NodeId {
        let idx = self.resolve(id).unwrap_or(ANCHOR);
        self.id_of(self.nodes[idx].next)
    }

    /// Raw predecessor; the anchor is part of the cycle.
    pub fn prev_of(&self, id: NodeId) -> NodeId {
        let idx = self.resolve(id).unwrap_or(ANCHOR);
        self.id_of(self.nodes[idx].prev)
    }

    pub fn get(&self, id: NodeId) -> Option<&FileEntry> {
        self.resolve(id).and_then(|idx| self.nodes[idx].entry.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut FileEntry> {
        self.resolve(id)
            .and_then(|idx| self.nodes[idx].entry.as_mut())
    }

    /// Cached position of `id` (the anchor reports the total). May be stale
    /// while [`Self::is_dirty`] is set.
    pub fn cached_count(&self, id: NodeId) -> Option<usize> {
        self.resolve(id).map(|idx| self.nodes[idx].count)
    }

    /// 1-based position of `id`, recounting first if needed.
    pub fn position_of(&mut self, id: NodeId) -> Option<usize> {
        if !self.contains(id) {
            return None;
        }
        if self.dirty {
            self.recount();
        }
        self.cached_count(id)
    }

    pub fn add_front(&mut self, entry: FileEntry) -> NodeId {
        let idx = self.alloc(entry);
        let head = self.nodes[ANCHOR].next;
        self.link(idx, ANCHOR, head);
        self.nodes[ANCHOR].count += 1;
        self.nodes[idx].count = 1;
        // Every existing node moved one position back.
        if self.len() > 1 {
            self.dirty = true;
        }
        self.id_of(idx)
    }

    pub fn add_end(&mut self, entry: FileEntry) -> NodeId {
        let idx = self.alloc(entry);
        let tail = self.nodes[ANCHOR].prev;
        self.link(idx, tail, ANCHOR);
        self.nodes[ANCHOR].count += 1;
        self.nodes[idx].count = self.nodes[ANCHOR].count;
        self.id_of(idx)
    }

    /// Unlink `id` and hand its entry back. The anchor and stale handles are
    /// ignored.
    pub fn remove(&mut self, id: NodeId) -> Option<FileEntry> {
        let idx = self.resolve(id)?;
        if idx == ANCHOR {
            return None;
        }
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
        self.nodes[ANCHOR].count -= 1;
        if next != ANCHOR {
            self.dirty = true;
        }
        let node = &mut self.nodes[idx];
        node.live = false;
        node.generation = node.generation.wrapping_add(1);
        node.prev = ANCHOR;
        node.next = ANCHOR;
        node.count = 0;
        let entry = node.entry.take();
        self.free.push(idx);
        trace!(slot = idx, remaining = self.len(), "node removed");
        entry
    }

    /// Reassign sequential positions from the anchor and clear the dirty flag.
    pub fn recount(&mut self) {
        let mut n = 0;
        let mut idx = self.nodes[ANCHOR].next;
        while idx != ANCHOR {
            n += 1;
            self.nodes[idx].count = n;
            idx = self.nodes[idx].next;
        }
        self.nodes[ANCHOR].count = n;
        self.dirty = false;
    }

    /// Reorder with `compare`. Ties keep whatever order the sort produces.
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&FileEntry, &FileEntry) -> Ordering,
    {
        let mut order = self.indices();
        let nodes = &self.nodes;
        order.sort_unstable_by(|&a, &b| match (&nodes[a].entry, &nodes[b].entry) {
            (Some(x), Some(y)) => compare(x, y),
            _ => Ordering::Equal,
        });
        self.relink(&order);
    }

    pub fn reverse(&mut self) {
        for node in self.nodes.iter_mut().filter(|n| n.live) {
            std::mem::swap(&mut node.next, &mut node.prev);
        }
        self.recount();
    }

    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order = self.indices();
        order.shuffle(rng);
        self.relink(&order);
    }

    /// Drop every entry for which `keep` returns `false`.
    pub fn retain<F>(&mut self, mut keep: F) -> Vec<FileEntry>
    where
        F: FnMut(&FileEntry) -> bool,
    {
        let doomed: Vec<NodeId> = self
            .iter()
            .filter(|(_, entry)| !keep(*entry))
            .map(|(id, _)| id)
            .collect();
        doomed.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn find_path(&self, path: &Path) -> Option<NodeId> {
        self.iter()
            .find(|(_, entry)| entry.path() == path)
            .map(|(id, _)| id)
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.iter().map(|(_, e)| e.path().to_path_buf()).collect()
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            idx: self.nodes[ANCHOR].next,
        }
    }

    fn resolve(&self, id: NodeId) -> Option<usize> {
        self.nodes
            .get(id.index)
            .filter(|n| n.live && n.generation == id.generation)
            .map(|_| id.index)
    }

    fn id_of(&self, index: usize) -> NodeId {
        NodeId {
            index,
            generation: self.nodes[index].generation,
        }
    }

    fn alloc(&mut self, entry: FileEntry) -> usize {
        match self.free.pop() {
            Some(idx) => {
                let node = &mut self.nodes[idx];
                node.entry = Some(entry);
                node.live = true;
                idx
            }
            None => {
                self.nodes.push(Node {
                    entry: Some(entry),
                    prev: ANCHOR,
                    next: ANCHOR,
                    count: 0,
                    generation: 0,
                    live: true,
                });
                self.nodes.len() - 1
            }
        }
    }

    fn link(&mut self, idx: usize, prev: usize, next: usize) {
        self.nodes[idx].prev = prev;
        self.nodes[idx].next = next;
        self.nodes[prev].next = idx;
        self.nodes[next].prev = idx;
    }

    fn indices(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.len());
        let mut idx = self.nodes[ANCHOR].next;
        while idx != ANCHOR {
            out.push(idx);
            idx = self.nodes[idx].next;
        }
        out
    }

    /// Rebuild the cycle in `order` and recount.
    fn relink(&mut self, order: &[usize]) {
        let mut prev = ANCHOR;
        for &idx in order {
            self.nodes[prev].next = idx;
            self.nodes[idx].prev = prev;
            prev = idx;
        }
        self.nodes[prev].next = ANCHOR;
        self.nodes[ANCHOR].prev = prev;
        self.recount();
    }
}

impl FromIterator<FileEntry> for ImageList {
    fn from_iter<I: IntoIterator<Item = FileEntry>>(iter: I) -> Self {
        let mut list = Self::new();
        for entry in iter {
            list.add_end(entry);
        }
        list
    }
}

/// Walks real entries from head to tail.
pub struct Iter<'a> {
    list: &'a ImageList,
    idx: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (NodeId, &'a FileEntry);

    fn next(&mut self) -> Option<Self::Item> {
        while self.idx != ANCHOR {
            let idx = self.idx;
            let node = &self.list.nodes[idx];
            self.idx = node.next;
            if let Some(entry) = node.entry.as_ref() {
                return Some((self.list.id_of(idx), entry));
            }
        }
        None
    }
}
