// main.rs

// --- External Crate Imports ---
use anyhow::{anyhow, Context, Error, Result};
use clap::Parser;
use coexnet::association::module_trait_associations;
use coexnet::correlation::column_correlation_matrix;
use coexnet::error::CoexError;
use coexnet::filter::{filter_features, FilterParams};
use coexnet::io;
use coexnet::membership::score_membership;
use coexnet::modules::{detect_modules, ModuleParams, UNASSIGNED};
use coexnet::network::{soft_threshold, NetworkMode};
use coexnet::pca::sample_pca;
use coexnet::soft_threshold::{
    default_candidate_powers, power_fit, select_power, PowerFit, TopologyCriteria,
};
use coexnet::stats::two_group_screen;
use coexnet::tom::topological_overlap;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::time::Instant;

// --- Main Function ---
fn main() -> Result<(), Error> {
    let total_time_start = Instant::now();
    let cli_args = cli::CliArgs::parse();

    // Initialize logger
    let log_level = cli_args
        .log_level
        .parse::<log::LevelFilter>()
        .unwrap_or_else(|_| {
            eprintln!(
                "Warning: Invalid log level '{}' provided. Defaulting to Info.",
                cli_args.log_level
            );
            log::LevelFilter::Info
        });
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_micros()
        .init();

    info!("Starting coexnet with args: {:?}", cli_args);

    // Configure Rayon thread pool
    let num_threads = cli_args.threads.unwrap_or_else(num_cpus::get);
    info!("Using {} threads for parallel operations.", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    // --- 1. Load Expression Matrix and Trait Table ---
    info!(
        "Reading expression matrix from {}",
        cli_args.expression.display()
    );
    let expression = io::read_expression_tsv(&cli_args.expression)?;
    info!("Reading trait table from {}", cli_args.traits.display());
    let traits = io::read_trait_tsv(&cli_args.traits)?
        .aligned_to(&expression)
        .context("aligning trait table to expression samples")?;

    let target_trait = match &cli_args.target_trait {
        Some(name) => {
            traits.trait_index(name)?;
            name.clone()
        }
        None => {
            let first = traits.trait_names()[0].clone();
            info!("No --target-trait given; defaulting to '{}'.", first);
            first
        }
    };

    // --- 2. Feature Filtering ---
    let filter_params = FilterParams {
        min_variance: cli_args.min_variance,
        min_unique_fraction: cli_args.min_unique_fraction,
    };
    let filtered = filter_features(&expression, &filter_params)?;
    if !filtered.removed.is_empty() {
        debug!(
            "Removed features (first 10): {:?}",
            filtered.removed.iter().take(10).collect::<Vec<_>>()
        );
    }
    let expression = filtered.matrix;

    // --- 3. Soft-Threshold Power ---
    let network_mode: NetworkMode = cli_args.mode.parse()?;
    info!(
        "Computing correlation matrix for {} features...",
        expression.n_features()
    );
    let correlations = column_correlation_matrix(expression.values(), expression.feature_ids())?;

    let criteria = TopologyCriteria {
        fit_threshold: cli_args.fit_threshold,
        relaxed_threshold: cli_args.relaxed_fit_threshold,
        ..TopologyCriteria::default()
    };
    let power = match cli_args.power {
        Some(power) => {
            info!("Using caller-supplied soft-threshold power {}.", power);
            let fit = power_fit(&correlations, power, network_mode, criteria.bins);
            io::write_power_fits(&cli_args.output_prefix, &[fit])?;
            power
        }
        None => {
            let candidates = default_candidate_powers();
            info!(
                "Selecting soft-threshold power from {} candidates...",
                candidates.len()
            );
            let pb_style = ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} powers ({percent}%) ETA: {eta}",
                )
                .map_err(|e| anyhow!("Failed to create progress bar style: {}", e))?
                .progress_chars("=> ");
            let pb = ProgressBar::new(candidates.len() as u64).with_style(pb_style);

            let fits: Vec<PowerFit> = candidates
                .iter()
                .map(|&p| {
                    let fit = power_fit(&correlations, p, network_mode, criteria.bins);
                    pb.inc(1);
                    fit
                })
                .collect();
            pb.finish_with_message("Power sweep complete.");
            io::write_power_fits(&cli_args.output_prefix, &fits)?;

            match select_power(fits, &criteria) {
                Ok(selection) => {
                    if selection.relaxed {
                        warn!(
                            "No power crossed fit threshold {}; falling back to power {} \
                             (highest mean connectivity above the relaxed threshold). \
                             Inspect {}.power_fit.tsv before trusting downstream results.",
                            criteria.fit_threshold, selection.power, cli_args.output_prefix
                        );
                    } else {
                        info!("Selected soft-threshold power {}.", selection.power);
                    }
                    selection.power
                }
                Err(e @ CoexError::NoScaleFreeFit { .. }) => {
                    return Err(anyhow!(
                        "{}. The diagnostic table was written to {}.power_fit.tsv; \
                         rerun with an explicit --power after inspecting it.",
                        e,
                        cli_args.output_prefix
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    // --- 4. Adjacency and Topological Overlap ---
    info!(
        "Building {} adjacency at power {}...",
        network_mode.as_str(),
        power
    );
    let adjacency = soft_threshold(&correlations, power, network_mode);
    drop(correlations);
    info!("Computing topological overlap...");
    let tom = topological_overlap(&adjacency)?;
    drop(adjacency);

    // --- 5. Module Detection ---
    let module_params = ModuleParams {
        min_module_size: cli_args.min_module_size,
        cut_height_fraction: cli_args.cut_height_fraction,
        merge_cut_height: cli_args.merge_cut_height,
    };
    let modules = detect_modules(expression.values(), &tom, &module_params)?;
    drop(tom);
    info!(
        "Detected {} modules; {} variables unassigned.",
        modules.n_modules(),
        modules.labels.iter().filter(|&&l| l == UNASSIGNED).count()
    );

    // --- 6. Module-Trait Association and Membership Scoring ---
    let association =
        module_trait_associations(&modules.eigengenes, &modules.module_labels, &traits)?;
    let membership = score_membership(&expression, &modules, &traits, &target_trait)?;

    // --- 7. Univariate Screen (binary target trait only) ---
    let target_column = traits.trait_column(&target_trait)?;
    let is_binary = target_column
        .iter()
        .filter(|v| v.is_finite())
        .all(|&v| v == 0.0 || v == 1.0);
    let univariate = if is_binary {
        Some(two_group_screen(&expression, &traits, &target_trait)?)
    } else {
        info!(
            "Target trait '{}' is not binary; skipping the univariate screen.",
            target_trait
        );
        None
    };

    // --- 8. Write Outputs ---
    let output_prefix_path = PathBuf::from(&cli_args.output_prefix);
    if let Some(parent) = output_prefix_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow!(
                    "Failed to create output directory {}: {}",
                    parent.display(),
                    e
                )
            })?;
            info!("Created output directory: {}", parent.display());
        }
    }
    info!(
        "Writing results to files with prefix '{}'...",
        cli_args.output_prefix
    );

    io::write_module_assignments(&cli_args.output_prefix, expression.feature_ids(), &modules)?;
    io::write_eigengenes(&cli_args.output_prefix, expression.sample_ids(), &modules)?;
    io::write_association_table(&cli_args.output_prefix, &association)?;
    io::write_membership_table(&cli_args.output_prefix, &membership)?;
    if let Some(table) = &univariate {
        io::write_univariate_table(&cli_args.output_prefix, table)?;
    }
    if cli_args.pca_components > 0 {
        let pca = sample_pca(&expression, cli_args.pca_components)?;
        io::write_pca_scores(&cli_args.output_prefix, &pca)?;
    }

    info!(
        "coexnet finished successfully in {:.2?}.",
        total_time_start.elapsed()
    );
    Ok(())
}

// --- Module Implementations ---

mod cli {
    use clap::Parser; // For the derive macro to find Parser
    use std::path::PathBuf;

    #[derive(Parser, Debug)]
    #[command(author, version, about = "Weighted co-expression network analysis over TSV matrices.", long_about = None, propagate_version = true)]
    pub(crate) struct CliArgs {
        /// Expression matrix TSV: samples in rows, features in columns.
        #[arg(short = 'e', long = "expression", required = true)]
        pub(crate) expression: PathBuf,

        /// Clinical trait TSV: samples in rows, traits in columns (NA allowed).
        #[arg(short = 'c', long = "traits", required = true)]
        pub(crate) traits: PathBuf,

        #[arg(short, long = "out", required = true)]
        pub(crate) output_prefix: String,

        /// Soft-threshold power; omit to select by scale-free topology fit.
        #[arg(short = 'p', long)]
        pub(crate) power: Option<f64>,

        /// Network mode: 'unsigned' or 'signed'.
        #[arg(long, default_value = "unsigned")]
        pub(crate) mode: String,

        #[arg(long, default_value_t = 30)]
        pub(crate) min_module_size: usize,

        #[arg(long, default_value_t = 0.25)]
        pub(crate) merge_cut_height: f64,

        /// Branch cut height as a fraction of the dendrogram's max height.
        #[arg(long, default_value_t = 0.99)]
        pub(crate) cut_height_fraction: f64,

        #[arg(long, default_value_t = 1e-12)]
        pub(crate) min_variance: f64,

        #[arg(long, default_value_t = 0.1)]
        pub(crate) min_unique_fraction: f64,

        /// Primary scale-free topology fit threshold.
        #[arg(long, default_value_t = 0.85)]
        pub(crate) fit_threshold: f64,

        /// Fallback threshold for the highest-mean-connectivity rule.
        #[arg(long, default_value_t = 0.5)]
        pub(crate) relaxed_fit_threshold: f64,

        /// Trait used for membership scoring and the univariate screen;
        /// defaults to the first trait column.
        #[arg(long)]
        pub(crate) target_trait: Option<String>,

        /// Sample PCA components to write (0 skips PCA output).
        #[arg(long, default_value_t = 0)]
        pub(crate) pca_components: usize,

        #[arg(short = 't', long)]
        pub(crate) threads: Option<usize>,

        #[arg(long, default_value = "Info")]
        pub(crate) log_level: String,
    }
}
