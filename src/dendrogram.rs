//! Average-linkage hierarchical clustering over a dense dissimilarity
//! matrix, with height-based flat cuts.

use crate::error::{CoexError, Result};
use ndarray::Array2;

/// One agglomeration step. Cluster ids follow the usual convention:
/// leaves are `0..n_leaves`, the cluster formed by merge `i` gets id
/// `n_leaves + i`.
#[derive(Debug, Clone)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub height: f64,
    pub size: usize,
}

/// Result of a full agglomerative run: `n_leaves - 1` merges in
/// non-decreasing height order.
#[derive(Debug, Clone)]
pub struct Dendrogram {
    pub n_leaves: usize,
    pub merges: Vec<Merge>,
}

impl Dendrogram {
    pub fn max_height(&self) -> f64 {
        self.merges.last().map(|m| m.height).unwrap_or(0.0)
    }

    /// Flat cluster labels from cutting all merges above `height`.
    ///
    /// Labels are renumbered 0..k-1 in order of each cluster's smallest
    /// leaf index, so cuts are deterministic and stable across runs.
    pub fn cut_at_height(&self, height: f64) -> Vec<usize> {
        let n = self.n_leaves;
        // Union-find over leaves + internal nodes.
        let mut parent: Vec<usize> = (0..n + self.merges.len()).collect();

        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        for (step, merge) in self.merges.iter().enumerate() {
            if merge.height > height {
                break;
            }
            let node = n + step;
            let l = find(&mut parent, merge.left);
            let r = find(&mut parent, merge.right);
            parent[l] = node;
            parent[r] = node;
        }

        let mut label_of_root: Vec<Option<usize>> = vec![None; n + self.merges.len()];
        let mut labels = vec![0usize; n];
        let mut next = 0usize;
        for leaf in 0..n {
            let root = find(&mut parent, leaf);
            let label = *label_of_root[root].get_or_insert_with(|| {
                let l = next;
                next += 1;
                l
            });
            labels[leaf] = label;
        }
        labels
    }
}

/// Agglomerative clustering with average (UPGMA) linkage.
///
/// The input must be a symmetric dissimilarity matrix with a zero
/// diagonal. Quadratic memory, cubic worst-case time; fine for the few
/// thousand variables this pipeline sees.
pub fn average_linkage(dissimilarity: &Array2<f64>) -> Result<Dendrogram> {
    let n = dissimilarity.nrows();
    if n != dissimilarity.ncols() {
        return Err(CoexError::DimensionMismatch {
            context: "dissimilarity must be square",
            expected: n,
            actual: dissimilarity.ncols(),
        });
    }
    if n < 2 {
        return Err(CoexError::EmptyInput(
            "clustering needs at least 2 variables".into(),
        ));
    }

    // Working distance matrix between active clusters, indexed by slot.
    let mut dist = dissimilarity.clone();
    // Slot -> (cluster id, size); None when the slot has been merged away.
    let mut active: Vec<Option<(usize, usize)>> = (0..n).map(|i| Some((i, 1))).collect();
    let mut merges = Vec::with_capacity(n - 1);

    for step in 0..n - 1 {
        // Globally closest active pair; ties resolve to the lowest slots.
        let mut best: Option<(usize, usize, f64)> = None;
        for a in 0..n {
            if active[a].is_none() {
                continue;
            }
            for b in (a + 1)..n {
                if active[b].is_none() {
                    continue;
                }
                let d = dist[[a, b]];
                if best.map_or(true, |(_, _, bd)| d < bd) {
                    best = Some((a, b, d));
                }
            }
        }
        let (a, b, height) = best.expect("at least two active clusters remain");

        let (id_a, size_a) = active[a].expect("slot a is active");
        let (id_b, size_b) = active[b].expect("slot b is active");
        let merged_size = size_a + size_b;

        // Lance-Williams update for average linkage: the merged cluster's
        // distance to any other cluster is the size-weighted mean.
        let wa = size_a as f64 / merged_size as f64;
        let wb = size_b as f64 / merged_size as f64;
        for c in 0..n {
            if c == a || c == b || active[c].is_none() {
                continue;
            }
            let d = wa * dist[[a, c]] + wb * dist[[b, c]];
            dist[[a, c]] = d;
            dist[[c, a]] = d;
        }

        active[a] = Some((n + step, merged_size));
        active[b] = None;
        merges.push(Merge {
            left: id_a,
            right: id_b,
            height,
            size: merged_size,
        });
    }

    // Average linkage cannot produce inversions from a proper metric, but
    // numerical noise can; normalize so cuts behave monotonically.
    let mut running_max = 0.0f64;
    for merge in &mut merges {
        running_max = running_max.max(merge.height);
        merge.height = running_max;
    }

    Ok(Dendrogram {
        n_leaves: n,
        merges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn two_tight_pairs_merge_first() {
        // 0-1 and 2-3 are close; the groups are far apart.
        let dissim = array![
            [0.0, 0.1, 0.9, 0.8],
            [0.1, 0.0, 0.85, 0.9],
            [0.9, 0.85, 0.0, 0.05],
            [0.8, 0.9, 0.05, 0.0],
        ];
        let dendrogram = average_linkage(&dissim).unwrap();
        assert_eq!(dendrogram.merges.len(), 3);
        // First two merges are the tight pairs.
        assert_eq!(dendrogram.merges[0].height, 0.05);
        assert_eq!(dendrogram.merges[1].height, 0.1);

        let labels = dendrogram.cut_at_height(0.5);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn cut_below_all_merges_yields_singletons() {
        let dissim = array![[0.0, 0.4, 0.6], [0.4, 0.0, 0.5], [0.6, 0.5, 0.0]];
        let dendrogram = average_linkage(&dissim).unwrap();
        let labels = dendrogram.cut_at_height(0.1);
        assert_eq!(labels, vec![0, 1, 2]);
    }

    #[test]
    fn cut_above_max_height_yields_one_cluster() {
        let dissim = array![[0.0, 0.4, 0.6], [0.4, 0.0, 0.5], [0.6, 0.5, 0.0]];
        let dendrogram = average_linkage(&dissim).unwrap();
        let labels = dendrogram.cut_at_height(dendrogram.max_height());
        assert!(labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn heights_are_non_decreasing() {
        let dissim = array![
            [0.0, 0.3, 0.7, 0.2],
            [0.3, 0.0, 0.6, 0.4],
            [0.7, 0.6, 0.0, 0.5],
            [0.2, 0.4, 0.5, 0.0],
        ];
        let dendrogram = average_linkage(&dissim).unwrap();
        for pair in dendrogram.merges.windows(2) {
            assert!(pair[0].height <= pair[1].height);
        }
    }
}
