//! Per-variable scoring: module membership (kME) against every module
//! eigengene, and trait significance against one chosen clinical trait.
//!
//! The two scores together rank variables inside a module of interest by
//! how central they are to the module and how strongly they track the
//! outcome; downstream candidate selection consumes this table.

use crate::association::validate_trait;
use crate::correlation::{correlation_p_value, pairwise_complete_pearson, pearson};
use crate::data::{ExpressionMatrix, TraitMatrix};
use crate::error::{CoexError, Result};
use crate::modules::ModuleSet;
use log::info;
use ndarray::{Array1, Array2};
use rayon::prelude::*;

/// kME and trait-significance scores for every retained variable.
#[derive(Debug, Clone)]
pub struct MembershipTable {
    pub feature_ids: Vec<String>,
    /// Module assignment per feature (0 = unassigned).
    pub labels: Vec<usize>,
    pub module_labels: Vec<usize>,
    /// features x modules correlation with each module eigengene.
    pub membership: Array2<f64>,
    pub membership_p: Array2<f64>,
    pub trait_name: String,
    /// features-long correlation with the chosen trait.
    pub trait_significance: Vec<f64>,
    pub trait_significance_p: Vec<f64>,
}

/// Score every feature against every module eigengene and one trait.
pub fn score_membership(
    expression: &ExpressionMatrix,
    modules: &ModuleSet,
    traits: &TraitMatrix,
    trait_name: &str,
) -> Result<MembershipTable> {
    if expression.n_features() != modules.labels.len() {
        return Err(CoexError::DimensionMismatch {
            context: "expression columns vs module labels",
            expected: modules.labels.len(),
            actual: expression.n_features(),
        });
    }
    let trait_idx = traits.trait_index(trait_name)?;
    let trait_column = traits.values().column(trait_idx);
    validate_trait(trait_name, trait_column)?;

    let n_features = expression.n_features();
    let n_samples = expression.n_samples();
    let n_modules = modules.n_modules();
    if traits.n_samples() != n_samples {
        return Err(CoexError::DimensionMismatch {
            context: "trait rows vs expression rows",
            expected: n_samples,
            actual: traits.n_samples(),
        });
    }

    struct FeatureScores {
        kme: Vec<f64>,
        kme_p: Vec<f64>,
        gs: f64,
        gs_p: f64,
    }

    let trait_vec: Array1<f64> = trait_column.to_owned();
    let scored: Vec<Result<FeatureScores>> = (0..n_features)
        .into_par_iter()
        .map(|f| {
            let column = expression.values().column(f);
            let mut kme = Vec::with_capacity(n_modules);
            let mut kme_p = Vec::with_capacity(n_modules);
            for m in 0..n_modules {
                let r = pearson(column, modules.eigengenes.column(m)).ok_or_else(|| {
                    CoexError::DegenerateColumn {
                        feature: expression.feature_ids()[f].clone(),
                    }
                })?;
                kme.push(r);
                kme_p.push(correlation_p_value(r, n_samples)?);
            }
            let (gs, n_obs) = pairwise_complete_pearson(column, trait_vec.view())
                .ok_or_else(|| CoexError::ConstantTrait {
                    name: trait_name.to_string(),
                })?;
            Ok(FeatureScores {
                kme,
                kme_p,
                gs,
                gs_p: correlation_p_value(gs, n_obs)?,
            })
        })
        .collect();

    let mut membership = Array2::<f64>::zeros((n_features, n_modules));
    let mut membership_p = Array2::<f64>::zeros((n_features, n_modules));
    let mut trait_significance = Vec::with_capacity(n_features);
    let mut trait_significance_p = Vec::with_capacity(n_features);
    for (f, scores) in scored.into_iter().enumerate() {
        let scores = scores?;
        for m in 0..n_modules {
            membership[[f, m]] = scores.kme[m];
            membership_p[[f, m]] = scores.kme_p[m];
        }
        trait_significance.push(scores.gs);
        trait_significance_p.push(scores.gs_p);
    }

    info!(
        "Membership scoring: {} features x {} modules against trait '{}'.",
        n_features, n_modules, trait_name
    );
    Ok(MembershipTable {
        feature_ids: expression.feature_ids().to_vec(),
        labels: modules.labels.clone(),
        module_labels: modules.module_labels.clone(),
        membership,
        membership_p,
        trait_name: trait_name.to_string(),
        trait_significance,
        trait_significance_p,
    })
}
