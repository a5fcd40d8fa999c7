//! Module detection: dendrogram branch cut, minimum-size enforcement,
//! and eigengene-correlation merging.

use crate::correlation::pearson;
use crate::dendrogram::average_linkage;
use crate::eigengene::eigengene_matrix;
use crate::error::{CoexError, Result};
use crate::tom::tom_dissimilarity;
use log::{debug, info};
use ndarray::Array2;

/// Label reserved for variables that belong to no module.
pub const UNASSIGNED: usize = 0;

/// Cut and merge parameters.
#[derive(Debug, Clone)]
pub struct ModuleParams {
    /// Branches smaller than this are sent to the unassigned pool.
    pub min_module_size: usize,
    /// Branch cut height as a fraction of the dendrogram's maximum merge
    /// height.
    pub cut_height_fraction: f64,
    /// Modules whose eigengenes correlate above `1 - merge_cut_height`
    /// are merged.
    pub merge_cut_height: f64,
}

impl Default for ModuleParams {
    fn default() -> Self {
        Self {
            min_module_size: 30,
            cut_height_fraction: 0.99,
            merge_cut_height: 0.25,
        }
    }
}

/// Final module assignment: a partition of the variables.
///
/// `labels[v]` is the module of variable `v`, with [`UNASSIGNED`] (0)
/// for the reserved noise pool. `module_labels` lists the non-trivial
/// modules in label order; `eigengenes` holds one column per entry of
/// `module_labels`, sample-aligned with the expression matrix.
#[derive(Debug, Clone)]
pub struct ModuleSet {
    pub labels: Vec<usize>,
    pub module_labels: Vec<usize>,
    pub eigengenes: Array2<f64>,
}

impl ModuleSet {
    pub fn n_modules(&self) -> usize {
        self.module_labels.len()
    }

    /// Member column indices of one module.
    pub fn members(&self, module: usize) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == module)
            .map(|(i, _)| i)
            .collect()
    }

    /// Column of `eigengenes` holding the given module.
    pub fn eigengene_column(&self, module: usize) -> Option<usize> {
        self.module_labels.iter().position(|&m| m == module)
    }
}

/// Relabel raw cut clusters into final module labels: clusters meeting
/// the minimum size get labels 1..=m in decreasing size order (ties by
/// smallest member index); everything else is unassigned.
fn enforce_min_size(raw_labels: &[usize], min_module_size: usize) -> (Vec<usize>, usize) {
    let n_clusters = raw_labels.iter().max().map_or(0, |&m| m + 1);
    let mut sizes = vec![0usize; n_clusters];
    for &l in raw_labels {
        sizes[l] += 1;
    }

    let mut surviving: Vec<usize> = (0..n_clusters)
        .filter(|&c| sizes[c] >= min_module_size)
        .collect();
    // Decreasing size; raw labels are already ordered by first member, so
    // a plain tiebreak on the label keeps the ordering stable.
    surviving.sort_by(|&a, &b| sizes[b].cmp(&sizes[a]).then(a.cmp(&b)));

    let mut remap = vec![UNASSIGNED; n_clusters];
    for (rank, &cluster) in surviving.iter().enumerate() {
        remap[cluster] = rank + 1;
    }
    let labels = raw_labels.iter().map(|&l| remap[l]).collect();
    (labels, surviving.len())
}

/// Merge the pair of modules with the most-correlated eigengenes, repeat
/// until no pair exceeds the threshold. Each merge recomputes the merged
/// module's eigengene before the next round, so at most `m - 1`
/// iterations can happen.
fn merge_correlated_modules(
    expression_values: &Array2<f64>,
    labels: &mut Vec<usize>,
    params: &ModuleParams,
) -> Result<()> {
    let threshold = 1.0 - params.merge_cut_height;
    loop {
        let module_labels: Vec<usize> = {
            let mut seen: Vec<usize> = labels
                .iter()
                .copied()
                .filter(|&l| l != UNASSIGNED)
                .collect();
            seen.sort_unstable();
            seen.dedup();
            seen
        };
        if module_labels.len() < 2 {
            return Ok(());
        }

        let eigengenes = eigengene_matrix(expression_values, labels, &module_labels)?;
        let mut best: Option<(usize, usize, f64)> = None;
        for a in 0..module_labels.len() {
            for b in (a + 1)..module_labels.len() {
                if let Some(r) = pearson(
                    eigengenes.column(a).view(),
                    eigengenes.column(b).view(),
                ) {
                    if best.map_or(true, |(_, _, br)| r > br) {
                        best = Some((a, b, r));
                    }
                }
            }
        }

        let Some((a, b, r)) = best else {
            return Ok(());
        };
        if r < threshold {
            return Ok(());
        }

        let keep = module_labels[a];
        let absorb = module_labels[b];
        debug!(
            "Merging module {} into module {} (eigengene correlation {:.3}).",
            absorb, keep, r
        );
        for label in labels.iter_mut() {
            if *label == absorb {
                *label = keep;
            }
        }
    }
}

/// Renumber surviving modules 1..=m by decreasing size after merging.
fn renumber_by_size(labels: &mut Vec<usize>) -> Vec<usize> {
    let mut seen: Vec<usize> = labels
        .iter()
        .copied()
        .filter(|&l| l != UNASSIGNED)
        .collect();
    seen.sort_unstable();
    seen.dedup();

    let mut sized: Vec<(usize, usize)> = seen
        .iter()
        .map(|&m| (m, labels.iter().filter(|&&l| l == m).count()))
        .collect();
    sized.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut remap = std::collections::HashMap::new();
    for (rank, &(old, _)) in sized.iter().enumerate() {
        remap.insert(old, rank + 1);
    }
    for label in labels.iter_mut() {
        if *label != UNASSIGNED {
            *label = remap[label];
        }
    }
    (1..=sized.len()).collect()
}

/// Detect modules from a topological overlap matrix.
///
/// Clustering runs over `1 - TOM` with average linkage; the dendrogram
/// is cut at `cut_height_fraction` of its maximum merge height, branches
/// below `min_module_size` go to the unassigned pool, and modules with
/// eigengene correlation above `1 - merge_cut_height` are merged.
///
/// Fails with [`CoexError::NoModulesFound`] when no branch survives the
/// minimum size, rather than passing off an all-unassigned labeling as
/// structure.
pub fn detect_modules(
    expression_values: &Array2<f64>,
    tom: &Array2<f64>,
    params: &ModuleParams,
) -> Result<ModuleSet> {
    if expression_values.ncols() != tom.nrows() {
        return Err(CoexError::DimensionMismatch {
            context: "expression columns vs TOM dimension",
            expected: tom.nrows(),
            actual: expression_values.ncols(),
        });
    }
    if !(0.0..=1.0).contains(&params.cut_height_fraction) {
        return Err(CoexError::InvalidParameter(format!(
            "cut height fraction must be in [0, 1], got {}",
            params.cut_height_fraction
        )));
    }

    let dissimilarity = tom_dissimilarity(tom);
    let dendrogram = average_linkage(&dissimilarity)?;
    let cut_height = params.cut_height_fraction * dendrogram.max_height();
    let raw_labels = dendrogram.cut_at_height(cut_height);

    let (mut labels, n_provisional) = enforce_min_size(&raw_labels, params.min_module_size);
    if n_provisional == 0 {
        return Err(CoexError::NoModulesFound);
    }
    info!(
        "Branch cut at height {:.4}: {} provisional modules, {} variables unassigned.",
        cut_height,
        n_provisional,
        labels.iter().filter(|&&l| l == UNASSIGNED).count()
    );

    merge_correlated_modules(expression_values, &mut labels, params)?;
    let module_labels = renumber_by_size(&mut labels);
    info!("{} modules after eigengene merging.", module_labels.len());

    let eigengenes = eigengene_matrix(expression_values, &labels, &module_labels)?;
    Ok(ModuleSet {
        labels,
        module_labels,
        eigengenes,
    })
}
