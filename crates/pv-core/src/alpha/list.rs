//! Ordered alpha-vector sets.
//!
//! An [`AlphaList`] is a deque of [`AlphaNode`]s tagged with a generation
//! number. Appending keeps existing positions (and so existing handles)
//! valid; every operation that removes, inserts at the head, or reorders
//! nodes moves the list to a fresh generation.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

use pv_math::{approx_equal, equal, greater_than, lex_compare, round_to, SORT_PRECISION};

use super::node::{AlphaNode, NodeHandle, Provenance};
use super::vector::{is_dominated, is_lexicographically_better};

static NEXT_GENERATION: AtomicU32 = AtomicU32::new(1);

fn next_generation() -> u32 {
    NEXT_GENERATION.fetch_add(1, AtomicOrdering::Relaxed)
}

/// An ordered set of alpha vectors.
#[derive(Debug)]
pub struct AlphaList {
    nodes: VecDeque<AlphaNode>,
    generation: u32,
    /// Action shared by every member, for Q-sets and projections.
    pub action: Option<usize>,
    /// Observation shared by every member, for projections.
    pub observation: Option<usize>,
}

impl Default for AlphaList {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for AlphaList {
    /// Copies are new lists; handles into `self` do not resolve against them.
    fn clone(&self) -> Self {
        AlphaList {
            nodes: self.nodes.clone(),
            generation: next_generation(),
            action: self.action,
            observation: self.observation,
        }
    }
}

impl PartialEq for AlphaList {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
            && self.action == other.action
            && self.observation == other.observation
    }
}

impl AlphaList {
    pub fn new() -> Self {
        AlphaList {
            nodes: VecDeque::new(),
            generation: next_generation(),
            action: None,
            observation: None,
        }
    }

    /// Empty list with header tags.
    pub fn with_header(action: Option<usize>, observation: Option<usize>) -> Self {
        AlphaList {
            action,
            observation,
            ..Self::new()
        }
    }

    /// A list holding one all-zero vector.
    pub fn zero(num_states: usize, action: usize) -> Self {
        let mut list = Self::new();
        list.append(vec![0.0; num_states], action);
        list
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    fn reshape(&mut self) {
        self.generation = next_generation();
    }

    fn handle_for(&self, index: usize) -> NodeHandle {
        NodeHandle {
            generation: self.generation,
            index: index as u32,
        }
    }

    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &AlphaNode> + '_ {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AlphaNode> + '_ {
        self.nodes.iter_mut()
    }

    /// Nodes paired with handles valid for the current generation.
    pub fn handles(&self) -> impl Iterator<Item = (NodeHandle, &AlphaNode)> + '_ {
        let generation = self.generation;
        self.nodes.iter().enumerate().map(move |(i, node)| {
            (
                NodeHandle {
                    generation,
                    index: i as u32,
                },
                node,
            )
        })
    }

    pub fn handle_at(&self, index: usize) -> Option<NodeHandle> {
        (index < self.nodes.len()).then(|| self.handle_for(index))
    }

    /// Resolve a handle. Handles from other lists or older generations
    /// return `None`.
    pub fn get(&self, handle: NodeHandle) -> Option<&AlphaNode> {
        if handle.generation != self.generation {
            return None;
        }
        self.nodes.get(handle.index())
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut AlphaNode> {
        if handle.generation != self.generation {
            return None;
        }
        self.nodes.get_mut(handle.index())
    }

    pub fn node(&self, index: usize) -> Option<&AlphaNode> {
        self.nodes.get(index)
    }

    pub fn head(&self) -> Option<&AlphaNode> {
        self.nodes.front()
    }

    pub fn tail(&self) -> Option<&AlphaNode> {
        self.nodes.back()
    }

    // ------------------------------------------------------------------
    // Insertion and removal
    // ------------------------------------------------------------------

    /// Append a plain vector. Its id is one past the tail's, or 0.
    pub fn append(&mut self, alpha: Vec<f64>, action: usize) -> NodeHandle {
        self.append_node(AlphaNode::new(alpha, action))
    }

    /// Append a node, keeping its provenance and witness.
    pub fn append_node(&mut self, mut node: AlphaNode) -> NodeHandle {
        node.id = self.nodes.back().map_or(0, |tail| tail.id + 1);
        self.nodes.push_back(node);
        self.handle_for(self.nodes.len() - 1)
    }

    /// Prepend a plain vector. Its id is one below the head's, or 0.
    pub fn prepend(&mut self, alpha: Vec<f64>, action: usize) -> NodeHandle {
        let mut node = AlphaNode::new(alpha, action);
        node.id = self.nodes.front().map_or(0, |head| head.id - 1);
        self.nodes.push_front(node);
        self.reshape();
        self.handle_for(0)
    }

    /// Append only if no equal vector is present.
    pub fn append_unique(
        &mut self,
        alpha: Vec<f64>,
        action: usize,
        epsilon: f64,
    ) -> Option<NodeHandle> {
        if self.contains(&alpha, epsilon) {
            return None;
        }
        Some(self.append(alpha, action))
    }

    /// Queue-style append; same as [`append_node`](Self::append_node).
    pub fn enqueue(&mut self, node: AlphaNode) -> NodeHandle {
        self.append_node(node)
    }

    /// Remove and return the head.
    pub fn dequeue(&mut self) -> Option<AlphaNode> {
        let node = self.nodes.pop_front();
        if node.is_some() {
            self.reshape();
        }
        node
    }

    /// Remove the node a handle points at.
    pub fn remove(&mut self, handle: NodeHandle) -> Option<AlphaNode> {
        if handle.generation != self.generation {
            return None;
        }
        let node = self.nodes.remove(handle.index());
        if node.is_some() {
            self.reshape();
        }
        node
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.reshape();
    }

    /// Move every node of `other` to the tail of `self`.
    pub fn union(&mut self, other: AlphaList) {
        self.nodes.extend(other.nodes);
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// First node equal to `alpha` componentwise within `epsilon`.
    pub fn find(&self, alpha: &[f64], epsilon: f64) -> Option<NodeHandle> {
        self.nodes
            .iter()
            .position(|n| approx_equal(&n.alpha, alpha, epsilon))
            .map(|i| self.handle_for(i))
    }

    pub fn contains(&self, alpha: &[f64], epsilon: f64) -> bool {
        self.find(alpha, epsilon).is_some()
    }

    /// Node with the largest value at `belief`.
    ///
    /// A node has to beat `initial_value` by more than `epsilon` to be chosen.
    /// Ties within `epsilon` go to the lexicographically larger vector
    /// without moving the running best value.
    pub fn best_vector(
        &self,
        belief: &[f64],
        initial_value: f64,
        epsilon: f64,
    ) -> (Option<NodeHandle>, f64) {
        let mut best: Option<usize> = None;
        let mut best_value = initial_value;
        for (i, node) in self.nodes.iter().enumerate() {
            let value = node.value(belief);
            if let Some(b) = best {
                if equal(value, best_value, epsilon) {
                    if is_lexicographically_better(&node.alpha, &self.nodes[b].alpha, epsilon) {
                        best = Some(i);
                    }
                    continue;
                }
            }
            if greater_than(value, best_value, epsilon) {
                best = Some(i);
                best_value = value;
            }
        }
        (best.map(|i| self.handle_for(i)), best_value)
    }

    /// Remove and return the best node at `belief`.
    pub fn remove_best_vector(&mut self, belief: &[f64], epsilon: f64) -> Option<AlphaNode> {
        let (best, _) = self.best_vector(belief, f64::NEG_INFINITY, epsilon);
        best.and_then(|h| self.remove(h))
    }

    // ------------------------------------------------------------------
    // Marks
    // ------------------------------------------------------------------

    pub fn clear_marks(&mut self) {
        for node in &mut self.nodes {
            node.mark = false;
        }
    }

    pub fn count_unmarked(&self) -> usize {
        self.nodes.iter().filter(|n| !n.mark).count()
    }

    pub fn all_marked(&self) -> bool {
        self.nodes.iter().all(|n| n.mark)
    }

    /// Mark every node strictly dominated by `reference`. Returns how many
    /// nodes became marked.
    pub fn mark_dominated(&mut self, reference: &[f64]) -> usize {
        let mut count = 0;
        for node in &mut self.nodes {
            if !node.mark && is_dominated(&node.alpha, reference) {
                node.mark = true;
                count += 1;
            }
        }
        count
    }

    /// Move marked nodes into a new list, keeping relative order on both sides.
    /// The moved nodes have their marks cleared.
    pub fn extract_marked(&mut self) -> AlphaList {
        let mut extracted = AlphaList::with_header(self.action, self.observation);
        let mut kept = VecDeque::with_capacity(self.nodes.len());
        for mut node in self.nodes.drain(..) {
            if node.mark {
                node.mark = false;
                extracted.nodes.push_back(node);
            } else {
                kept.push_back(node);
            }
        }
        self.nodes = kept;
        self.reshape();
        extracted
    }

    /// Drop marked nodes. Returns how many were removed.
    pub fn remove_marked(&mut self) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|n| !n.mark);
        let removed = before - self.nodes.len();
        if removed > 0 {
            self.reshape();
        }
        removed
    }

    /// Remove and return the first unmarked node.
    pub fn extract_unmarked(&mut self) -> Option<AlphaNode> {
        let index = self.nodes.iter().position(|n| !n.mark)?;
        let node = self.nodes.remove(index);
        self.reshape();
        node
    }

    // ------------------------------------------------------------------
    // Ordering and ids
    // ------------------------------------------------------------------

    /// Lexicographically descending, stable.
    pub fn sort(&mut self) {
        self.sort_by(|a, b| lex_compare(&b.alpha, &a.alpha, SORT_PRECISION));
    }

    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&AlphaNode, &AlphaNode) -> Ordering,
    {
        self.nodes.make_contiguous().sort_by(compare);
        self.reshape();
    }

    /// Ids become positions 0..len.
    pub fn renumber(&mut self) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.id = i as i64;
        }
    }

    // ------------------------------------------------------------------
    // Comparison
    // ------------------------------------------------------------------

    /// Same vectors in the same order.
    pub fn same(&self, other: &AlphaList, epsilon: f64) -> bool {
        self.len() == other.len()
            && self
                .nodes
                .iter()
                .zip(other.nodes.iter())
                .all(|(a, b)| approx_equal(&a.alpha, &b.alpha, epsilon))
    }

    /// Same vectors in any order.
    pub fn similar(&self, other: &AlphaList, epsilon: f64) -> bool {
        self.len() == other.len()
            && self.nodes.iter().all(|n| other.contains(&n.alpha, epsilon))
            && other.nodes.iter().all(|n| self.contains(&n.alpha, epsilon))
    }

    /// Every vector is within `epsilon` of zero.
    pub fn is_zero(&self, epsilon: f64) -> bool {
        self.nodes
            .iter()
            .all(|n| super::vector::is_zero(&n.alpha, epsilon))
    }

    // ------------------------------------------------------------------
    // Transformations
    // ------------------------------------------------------------------

    /// Round every component to `precision` decimal places.
    pub fn round(&mut self, precision: u32) {
        for node in &mut self.nodes {
            for x in &mut node.alpha {
                *x = round_to(*x, precision);
            }
        }
    }

    /// Copy with `offset` added to every component.
    pub fn scaled(&self, offset: f64) -> AlphaList {
        let mut copy = self.clone();
        if offset != 0.0 {
            for node in &mut copy.nodes {
                for x in &mut node.alpha {
                    *x += offset;
                }
            }
        }
        copy
    }

    pub fn clear_obs_sources(&mut self) {
        for node in &mut self.nodes {
            if let Some(slots) = node.provenance.obs_source_mut() {
                slots.iter_mut().for_each(|s| *s = None);
            }
        }
    }

    /// Drop all provenance links, e.g. before handing a list to a new solve.
    pub fn clear_provenance(&mut self) {
        for node in &mut self.nodes {
            node.provenance = Provenance::Plain;
        }
    }
}

/// Longest list among `lists`.
pub fn max_len<'a>(lists: impl IntoIterator<Item = &'a AlphaList>) -> usize {
    lists.into_iter().map(AlphaList::len).max().unwrap_or(0)
}

impl FromIterator<(Vec<f64>, usize)> for AlphaList {
    fn from_iter<I: IntoIterator<Item = (Vec<f64>, usize)>>(iter: I) -> Self {
        let mut list = AlphaList::new();
        for (alpha, action) in iter {
            list.append(alpha, action);
        }
        list
    }
}
