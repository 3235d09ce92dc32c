// --- File: src/core/output.rs
use crate::core::matrix::DenseMatrix;
use crate::core::types::LossName;
use crate::error::{FastTextError, Result};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Added inside every logarithm so that zero probabilities stay finite.
const LOG_EPSILON: f32 = 1e-5;

fn std_log(x: f32) -> f32 {
    (x + LOG_EPSILON).ln()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// A scored label. Ordered so that the "greater" candidate is the better one:
/// higher log-probability first, lower label index on ties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored {
    pub score: f32,
    pub id: usize,
}

impl Eq for Scored {}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Keeps the `k` best candidates seen so far. The worst kept candidate sits
/// at the top of a min-heap so it can be evicted in O(log k).
pub struct TopK {
    k: usize,
    heap: BinaryHeap<Reverse<Scored>>,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self { k, heap: BinaryHeap::with_capacity(k + 1) }
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.k
    }

    /// Score of the worst kept candidate once the set is full.
    pub fn floor(&self) -> Option<f32> {
        if self.is_full() {
            self.heap.peek().map(|Reverse(s)| s.score)
        } else {
            None
        }
    }

    pub fn offer(&mut self, candidate: Scored) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.heap.push(Reverse(candidate));
        } else if let Some(Reverse(worst)) = self.heap.peek() {
            if candidate > *worst {
                self.heap.pop();
                self.heap.push(Reverse(candidate));
            }
        }
    }

    /// Best first.
    pub fn into_sorted_vec(self) -> Vec<Scored> {
        // `into_sorted_vec` on Reverse gives best-first directly.
        self.heap.into_sorted_vec().into_iter().map(|Reverse(s)| s).collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
    count: i64,
}

/// Huffman tree over the labels. Leaves are `0..osz`, internal nodes
/// `osz..2*osz-1`, and the root is the last node.
#[derive(Debug, Clone)]
pub struct HuffmanTree {
    nodes: Vec<Node>,
    osz: usize,
}

impl HuffmanTree {
    /// Builds the tree from label counts sorted by decreasing frequency, the
    /// order in which they are stored in the model file.
    pub fn build(counts: &[i64]) -> Self {
        let osz = counts.len();
        let size = (2 * osz).saturating_sub(1);
        let mut nodes = vec![
            Node { parent: None, left: None, right: None, count: 1_000_000_000_000_000 };
            size
        ];
        for (node, &count) in nodes.iter_mut().zip(counts) {
            node.count = count;
        }

        // Two-queue merge: leaves are consumed from the least frequent end,
        // internal nodes in creation order.
        let mut leaf = osz as isize - 1;
        let mut next = osz;
        for i in osz..size {
            let mut pick = [0usize; 2];
            for slot in pick.iter_mut() {
                if leaf >= 0 && nodes[leaf as usize].count < nodes[next].count {
                    *slot = leaf as usize;
                    leaf -= 1;
                } else {
                    *slot = next;
                    next += 1;
                }
            }
            nodes[i].left = Some(pick[0]);
            nodes[i].right = Some(pick[1]);
            nodes[i].count = nodes[pick[0]].count + nodes[pick[1]].count;
            nodes[pick[0]].parent = Some(i);
            nodes[pick[1]].parent = Some(i);
        }
        Self { nodes, osz }
    }

    pub fn root(&self) -> Option<usize> {
        self.nodes.len().checked_sub(1)
    }

    pub fn is_leaf(&self, node: usize) -> bool {
        self.nodes[node].left.is_none() && self.nodes[node].right.is_none()
    }

    /// Depth of a leaf, i.e. the number of binary decisions to reach it.
    pub fn depth(&self, leaf: usize) -> usize {
        let mut depth = 0;
        let mut node = leaf;
        while let Some(parent) = self.nodes[node].parent {
            depth += 1;
            node = parent;
        }
        depth
    }

    fn children(&self, node: usize) -> Option<(usize, usize)> {
        Some((self.nodes[node].left?, self.nodes[node].right?))
    }
}

#[derive(Debug, Clone)]
enum Scorer {
    Softmax,
    /// One-vs-all and negative sampling score every label independently.
    Sigmoid,
    Hierarchical(HuffmanTree),
}

/// Output layer: weight matrix plus the loss-specific way to turn the hidden
/// vector into label scores.
#[derive(Debug, Clone)]
pub struct OutputModel {
    weights: DenseMatrix,
    loss: LossName,
    scorer: Scorer,
}

impl OutputModel {
    /// `counts` are the frequencies of the output classes, needed only to
    /// rebuild the hierarchical-softmax tree.
    pub fn new(weights: DenseMatrix, loss: LossName, counts: &[i64]) -> Result<Self> {
        let scorer = match loss {
            LossName::Softmax => Scorer::Softmax,
            LossName::OneVsAll | LossName::NegativeSampling => Scorer::Sigmoid,
            LossName::HierarchicalSoftmax => {
                if counts.len() != weights.rows() {
                    return Err(FastTextError::corrupt(format!(
                        "{} output rows for {} classes",
                        weights.rows(),
                        counts.len()
                    )));
                }
                Scorer::Hierarchical(HuffmanTree::build(counts))
            }
        };
        Ok(Self { weights, loss, scorer })
    }

    pub fn weights(&self) -> &DenseMatrix {
        &self.weights
    }

    pub fn loss(&self) -> LossName {
        self.loss
    }

    pub fn classes(&self) -> usize {
        self.weights.rows()
    }

    /// The `k` best classes for `hidden` as (log-probability, class index),
    /// best first, ties broken by lower index. Classes whose probability is
    /// below `threshold` are dropped.
    pub fn predict(&self, hidden: &[f32], k: usize, threshold: f32) -> Vec<Scored> {
        if k == 0 || self.classes() == 0 {
            return Vec::new();
        }
        match &self.scorer {
            Scorer::Softmax => self.find_k_best(&self.softmax(hidden), k, threshold),
            Scorer::Sigmoid => {
                let probs: Vec<f32> = (0..self.classes())
                    .map(|i| sigmoid(self.weights.dot_row(hidden, i)))
                    .collect();
                self.find_k_best(&probs, k, threshold)
            }
            Scorer::Hierarchical(tree) => self.tree_search(tree, hidden, k, threshold),
        }
    }

    fn softmax(&self, hidden: &[f32]) -> Vec<f32> {
        let mut out: Vec<f32> = (0..self.classes())
            .map(|i| self.weights.dot_row(hidden, i))
            .collect();
        let max = out.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut z = 0.0;
        for v in out.iter_mut() {
            *v = (*v - max).exp();
            z += *v;
        }
        out.iter_mut().for_each(|v| *v /= z);
        out
    }

    fn find_k_best(&self, probs: &[f32], k: usize, threshold: f32) -> Vec<Scored> {
        let mut best = TopK::new(k);
        for (id, &p) in probs.iter().enumerate() {
            if p < threshold {
                continue;
            }
            best.offer(Scored { score: std_log(p), id });
        }
        best.into_sorted_vec()
    }

    /// Best-first search over the Huffman tree.
    ///
    /// The frontier is a max-heap on accumulated log-probability; a leaf's
    /// score can only shrink on the way down, so once the frontier's best
    /// cannot beat the current k-th leaf nothing left can.
    /// O(k + S log S) where S is number of nodes expanded.
    fn tree_search(&self, tree: &HuffmanTree, hidden: &[f32], k: usize, threshold: f32) -> Vec<Scored> {
        let Some(root) = tree.root() else {
            return Vec::new();
        };
        let log_threshold = std_log(threshold);
        let mut best = TopK::new(k);
        let mut frontier = BinaryHeap::new();
        frontier.push(Scored { score: 0.0, id: root });

        while let Some(Scored { score, id: node }) = frontier.pop() {
            if score < log_threshold {
                break;
            }
            if let Some(floor) = best.floor() {
                if score < floor {
                    break;
                }
            }
            let Some((left, right)) = tree.children(node) else {
                best.offer(Scored { score, id: node });
                continue;
            };
            let f = sigmoid(self.weights.dot_row(hidden, node - tree.osz));
            frontier.push(Scored { score: score + std_log(1.0 - f), id: left });
            frontier.push(Scored { score: score + std_log(f), id: right });
        }
        best.into_sorted_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exhaustive_tree_scores(model: &OutputModel, tree: &HuffmanTree, hidden: &[f32]) -> Vec<Scored> {
        fn walk(model: &OutputModel, tree: &HuffmanTree, hidden: &[f32], node: usize, score: f32, out: &mut Vec<Scored>) {
            match tree.children(node) {
                None => out.push(Scored { score, id: node }),
                Some((l, r)) => {
                    let f = sigmoid(model.weights.dot_row(hidden, node - tree.osz));
                    walk(model, tree, hidden, l, score + std_log(1.0 - f), out);
                    walk(model, tree, hidden, r, score + std_log(f), out);
                }
            }
        }
        let mut out = Vec::new();
        walk(model, tree, hidden, tree.root().unwrap(), 0.0, &mut out);
        out.sort_by(|a, b| b.cmp(a));
        out
    }

    #[test]
    fn top_k_keeps_best_and_breaks_ties_by_lower_id() {
        let mut top = TopK::new(2);
        for (score, id) in [(0.5, 3), (0.9, 7), (0.5, 1), (0.1, 0)] {
            top.offer(Scored { score, id });
        }
        let ids: Vec<usize> = top.into_sorted_vec().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![7, 1]);
    }

    #[test]
    fn huffman_tree_shape() {
        let tree = HuffmanTree::build(&[10, 5, 3, 1]);
        assert_eq!(tree.nodes.len(), 7);
        assert_eq!(tree.root(), Some(6));
        // Most frequent label sits closest to the root.
        assert!(tree.depth(0) < tree.depth(3));
        assert!((0..4).all(|leaf| tree.is_leaf(leaf)));
        assert!(!tree.is_leaf(6));

        let single = HuffmanTree::build(&[4]);
        assert_eq!(single.root(), Some(0));
        assert!(single.is_leaf(0));
        assert_eq!(HuffmanTree::build(&[]).root(), None);
    }

    #[test]
    fn equal_counts_build_the_same_tree_every_time() {
        let a = HuffmanTree::build(&[3, 3, 3, 3, 3]);
        let b = HuffmanTree::build(&[3, 3, 3, 3, 3]);
        let shape = |t: &HuffmanTree| t.nodes.iter().map(|n| (n.parent, n.left, n.right)).collect::<Vec<_>>();
        assert_eq!(shape(&a), shape(&b));
        // The first internal node joins the two rightmost leaves.
        assert_eq!(a.nodes[5].left, Some(4));
        assert_eq!(a.nodes[5].right, Some(3));
    }

    #[test]
    fn softmax_probabilities_sum_to_one() {
        let w = DenseMatrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]]).unwrap();
        let model = OutputModel::new(w, LossName::Softmax, &[1, 1, 1]).unwrap();
        let all = model.predict(&[0.5, 0.25], 3, 0.0);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, 2);
        let total: f32 = all.iter().map(|s| s.score.exp() - LOG_EPSILON).sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn sigmoid_threshold_drops_weak_labels() {
        let w = DenseMatrix::from_rows(&[vec![4.0], vec![-4.0]]).unwrap();
        let model = OutputModel::new(w, LossName::OneVsAll, &[1, 1]).unwrap();
        let kept = model.predict(&[1.0], 2, 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 0);
    }

    #[test]
    fn tree_search_matches_exhaustive_enumeration() {
        let counts = [50, 30, 20, 10, 8, 5, 3, 1];
        let rows: Vec<Vec<f32>> = (0..counts.len())
            .map(|i| vec![(i as f32 * 0.37).sin(), (i as f32 * 1.3).cos(), 0.25 - i as f32 * 0.1])
            .collect();
        let w = DenseMatrix::from_rows(&rows).unwrap();
        let model = OutputModel::new(w, LossName::HierarchicalSoftmax, &counts).unwrap();
        let Scorer::Hierarchical(tree) = &model.scorer else { unreachable!() };
        let hidden = [0.3, -0.7, 1.1];
        let expected = exhaustive_tree_scores(&model, tree, &hidden);
        for k in 1..=counts.len() {
            let got = model.predict(&hidden, k, 0.0);
            assert_eq!(got.len(), k);
            let got_ids: Vec<usize> = got.iter().map(|s| s.id).collect();
            let want_ids: Vec<usize> = expected[..k].iter().map(|s| s.id).collect();
            assert_eq!(got_ids, want_ids, "k = {k}");
        }
        // Leaf probabilities of a binary tree add up to one.
        let total: f32 = expected.iter().map(|s| s.score.exp()).sum();
        assert!((total - 1.0).abs() < 1e-3);
    }

    #[test]
    fn hierarchical_needs_one_row_per_class() {
        let w = DenseMatrix::from_rows(&[vec![1.0]]).unwrap();
        assert!(matches!(
            OutputModel::new(w, LossName::HierarchicalSoftmax, &[1, 1]),
            Err(FastTextError::CorruptModel(_))
        ));
    }
}
