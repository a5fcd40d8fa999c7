//! Weighted co-expression network analysis for small clinical omics
//! cohorts.
//!
//! The crate covers the analysis path from a filtered expression matrix
//! to ranked candidate variables:
//!
//! - **filter**: low-information feature removal with an audit trail
//! - **network**: signed / unsigned soft-threshold adjacency
//! - **soft_threshold**: scale-free topology fit and power selection
//! - **tom**: topological overlap similarity and dissimilarity
//! - **dendrogram** / **modules**: average-linkage clustering, branch
//!   cutting, minimum-size enforcement, eigengene merging
//! - **eigengene**: PC1 module summaries
//! - **association** / **membership**: module-trait correlation and
//!   per-variable kME / trait-significance scoring
//! - **stats**: univariate two-group screen with FDR adjustment
//! - **pca**: cohort-structure inspection
//! - **synth**: seeded block-structured cohorts with ground truth
//! - **io**: TSV matrices in, TSV result tables out
//!
//! Every threshold a human would re-tune between runs (soft-threshold
//! power, cut height, minimum module size, merge height) is an explicit
//! parameter with a documented default; nothing is chosen silently.
//!
//! # Example
//!
//! ```no_run
//! use coexnet::prelude::*;
//!
//! # fn run() -> coexnet::error::Result<()> {
//! let expression = read_expression_tsv(std::path::Path::new("expression.tsv"))?;
//! let traits = read_trait_tsv(std::path::Path::new("traits.tsv"))?.aligned_to(&expression)?;
//!
//! let filtered = filter_features(&expression, &FilterParams::default())?.matrix;
//! let adjacency = adjacency(&filtered, 6.0, NetworkMode::Unsigned)?;
//! let tom = topological_overlap(&adjacency)?;
//! let modules = detect_modules(filtered.values(), &tom, &ModuleParams::default())?;
//! let table = module_trait_associations(&modules.eigengenes, &modules.module_labels, &traits)?;
//! # Ok(())
//! # }
//! ```

pub mod association;
pub mod correlation;
pub mod data;
pub mod dendrogram;
pub mod eigengene;
pub mod error;
pub mod filter;
pub mod io;
pub mod membership;
pub mod modules;
pub mod network;
pub mod pca;
pub mod soft_threshold;
pub mod stats;
pub mod synth;
pub mod tom;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::association::{module_trait_associations, AssociationTable};
    pub use crate::data::{ExpressionMatrix, TraitMatrix};
    pub use crate::error::{CoexError, Result};
    pub use crate::filter::{filter_features, FilterOutcome, FilterParams};
    pub use crate::io::{read_expression_tsv, read_trait_tsv};
    pub use crate::membership::{score_membership, MembershipTable};
    pub use crate::modules::{detect_modules, ModuleParams, ModuleSet, UNASSIGNED};
    pub use crate::network::{adjacency, NetworkMode};
    pub use crate::pca::{sample_pca, PcaResult};
    pub use crate::soft_threshold::{
        default_candidate_powers, evaluate_powers, power_fit, select_power, PowerFit,
        PowerSelection, TopologyCriteria,
    };
    pub use crate::stats::{two_group_screen, UnivariateTable};
    pub use crate::synth::{generate, SyntheticCohort, SyntheticConfig};
    pub use crate::tom::{tom_dissimilarity, topological_overlap};
}
