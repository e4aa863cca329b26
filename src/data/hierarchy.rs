// ============================================================
// Layer 4 — Hierarchical Label Indexer
// ============================================================
// Scans every example's label tuple once and builds:
//
//   DynamicDict — (level, label) → observed child labels at the
//                 next level. Child lists KEEP duplicates: each
//                 example contributes one edge, so list length
//                 carries frequency information downstream.
//
//   LabelMeta   — per-level list of every observed label value,
//                 used for level cardinality and iteration.
//
// Keys are a structured (level, label) pair rather than a
// concatenated string, so nothing ever parses a key back apart.
//
// The optional decoder-ready remap turns each label tuple into a
// sequence `[0, id(l0), id(l1), ...]` over a single global id
// space, with id 0 reserved as the start symbol.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// A taxonomy node: `label` as observed at `level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub level: usize,
    pub label: i64,
}

impl NodeKey {
    pub fn new(level: usize, label: i64) -> Self {
        Self { level, label }
    }
}

/// Serialized form of one dictionary node — JSON objects cannot
/// key on a (level, label) pair directly, so the cache stores a
/// flat entry list instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynaEntry {
    pub level: usize,
    pub label: i64,
    pub children: Vec<i64>,
}

/// Parent → children mapping built empirically from the corpus.
#[derive(Debug, Clone, Default)]
pub struct DynamicDict {
    entries: HashMap<NodeKey, Vec<i64>>,
}

impl DynamicDict {
    /// Children observed under `key`, duplicates included, in
    /// corpus order. Empty for leaves and unseen nodes.
    pub fn children(&self, key: NodeKey) -> &[i64] {
        self.entries.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn node_count(&self) -> usize {
        self.entries.len()
    }

    fn push_child(&mut self, key: NodeKey, child: i64) {
        self.entries.entry(key).or_default().push(child);
    }

    /// Flatten to entries sorted by key, for the on-disk cache.
    pub fn to_entries(&self) -> Vec<DynaEntry> {
        let mut keys: Vec<NodeKey> = self.entries.keys().copied().collect();
        keys.sort();
        keys.into_iter()
            .map(|k| DynaEntry {
                level: k.level,
                label: k.label,
                children: self.entries[&k].clone(),
            })
            .collect()
    }

    pub fn from_entries(entries: Vec<DynaEntry>) -> Self {
        let mut dict = Self::default();
        for e in entries {
            dict.entries.insert(NodeKey::new(e.level, e.label), e.children);
        }
        dict
    }
}

/// Per-level label observations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelMeta {
    /// `levels[i]` lists every label value observed at level `i`,
    /// once per example that reaches that depth.
    levels: Vec<Vec<i64>>,
}

impl LabelMeta {
    /// All observations at `level` (duplicates included).
    pub fn observed(&self, level: usize) -> &[i64] {
        self.levels.get(level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct label values at `level`, ascending.
    pub fn distinct(&self, level: usize) -> Vec<i64> {
        let set: BTreeSet<i64> = self.observed(level).iter().copied().collect();
        set.into_iter().collect()
    }

    /// Deepest level index observed across the corpus.
    pub fn max_level(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Class count for a classifier trained on `level`. Both
    /// corpus schemas produce dense 0-based ids per level, so the
    /// largest value + 1 covers the range.
    pub fn num_classes(&self, level: usize) -> usize {
        self.observed(level)
            .iter()
            .max()
            .map(|&m| m as usize + 1)
            .unwrap_or(0)
    }

    fn push(&mut self, level: usize, label: i64) {
        if self.levels.len() <= level {
            self.levels.resize(level + 1, Vec::new());
        }
        self.levels[level].push(label);
    }
}

/// Single pass over all label tuples, producing the dictionary
/// and the level metadata together.
///
/// Examples shorter than the deepest tuple only contribute to the
/// levels they actually have — their missing child edges are
/// simply absent.
pub fn index_labels(label_tuples: &[Vec<i64>]) -> (DynamicDict, LabelMeta) {
    let mut dict = DynamicDict::default();
    let mut meta = LabelMeta::default();
    for tuple in label_tuples {
        for (level, &label) in tuple.iter().enumerate() {
            if level + 1 < tuple.len() {
                dict.push_child(NodeKey::new(level, label), tuple[level + 1]);
            }
            meta.push(level, label);
        }
    }
    (dict, meta)
}

// ─── Decoder-Ready Labels ─────────────────────────────────────────────────────
// Re-keys every (level, label) pair into one global id space so a
// sequence decoder can emit all levels from a single softmax.
// Id 0 is reserved as the start-of-sequence symbol and never
// assigned to a label.
//
// Enumeration order is level-major, then ascending by original
// label value inside a level. Sorting replaces the original's
// unstable set iteration, so the same corpus always produces the
// same id assignment.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderLabels {
    /// Per example: `[0, id(level0 label), id(level1 label), ...]`
    pub sequences: Vec<Vec<i64>>,
    /// Total id count including the reserved start symbol.
    pub num_labels: i64,
}

impl DecoderLabels {
    pub fn build(label_tuples: &[Vec<i64>]) -> Self {
        let max_depth = label_tuples.iter().map(Vec::len).max().unwrap_or(0);

        let mut label2id: HashMap<NodeKey, i64> = HashMap::new();
        let mut next_id: i64 = 1; // 0 is the start symbol
        for level in 0..max_depth {
            let distinct: BTreeSet<i64> = label_tuples
                .iter()
                .filter(|t| t.len() > level)
                .map(|t| t[level])
                .collect();
            for label in distinct {
                label2id.insert(NodeKey::new(level, label), next_id);
                next_id += 1;
            }
        }

        let sequences = label_tuples
            .iter()
            .map(|tuple| {
                let mut row = Vec::with_capacity(tuple.len() + 1);
                row.push(0);
                for (level, &label) in tuple.iter().enumerate() {
                    row.push(label2id[&NodeKey::new(level, label)]);
                }
                row
            })
            .collect();

        Self {
            sequences,
            num_labels: next_id,
        }
    }
}
