//! TSV input and output.
//!
//! Input matrices follow the cohort-export convention: first column is
//! the sample id, header row names the features (or traits). Trait
//! tables may contain `NA` / empty cells for missing clinical values.
//! Outputs are plain TSV files under a common prefix.

use crate::association::AssociationTable;
use crate::data::{ExpressionMatrix, TraitMatrix};
use crate::error::{CoexError, Result};
use crate::membership::MembershipTable;
use crate::modules::ModuleSet;
use crate::soft_threshold::PowerFit;
use crate::stats::UnivariateTable;
use log::info;
use ndarray::Array2;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn parse_cell(raw: &str, row: usize, col: usize, allow_missing: bool) -> Result<f64> {
    let trimmed = raw.trim();
    if allow_missing && (trimmed.is_empty() || trimmed.eq_ignore_ascii_case("na")) {
        return Ok(f64::NAN);
    }
    trimmed.parse::<f64>().map_err(|_| CoexError::Parse {
        row,
        col,
        value: raw.to_string(),
    })
}

fn read_labeled_tsv(path: &Path, allow_missing: bool) -> Result<(Vec<String>, Vec<String>, Array2<f64>)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(CoexError::EmptyInput(format!(
            "{} has no value columns",
            path.display()
        )));
    }
    let column_names: Vec<String> = headers.iter().skip(1).map(String::from).collect();

    let mut row_ids = Vec::new();
    let mut cells: Vec<f64> = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != headers.len() {
            return Err(CoexError::DimensionMismatch {
                context: "TSV row width vs header",
                expected: headers.len(),
                actual: record.len(),
            });
        }
        row_ids.push(record[0].to_string());
        for (col_idx, raw) in record.iter().skip(1).enumerate() {
            cells.push(parse_cell(raw, row_idx + 2, col_idx + 2, allow_missing)?);
        }
    }
    if row_ids.is_empty() {
        return Err(CoexError::EmptyInput(format!(
            "{} has no data rows",
            path.display()
        )));
    }

    let values = Array2::from_shape_vec((row_ids.len(), column_names.len()), cells)
        .map_err(|e| CoexError::Numerical(format!("matrix shape: {}", e)))?;
    Ok((row_ids, column_names, values))
}

/// Read an expression matrix (samples x features, all values present).
pub fn read_expression_tsv(path: &Path) -> Result<ExpressionMatrix> {
    let (sample_ids, feature_ids, values) = read_labeled_tsv(path, false)?;
    info!(
        "Read expression matrix from {}: {} samples x {} features.",
        path.display(),
        sample_ids.len(),
        feature_ids.len()
    );
    ExpressionMatrix::new(sample_ids, feature_ids, values)
}

/// Read a trait table (samples x traits, `NA` / empty cells allowed).
pub fn read_trait_tsv(path: &Path) -> Result<TraitMatrix> {
    let (sample_ids, trait_names, values) = read_labeled_tsv(path, true)?;
    info!(
        "Read trait table from {}: {} samples x {} traits.",
        path.display(),
        sample_ids.len(),
        trait_names.len()
    );
    TraitMatrix::new(sample_ids, trait_names, values)
}

fn create_output_file(prefix: &str, suffix: &str) -> Result<BufWriter<File>> {
    let filename = format!("{}.{}.tsv", prefix, suffix);
    Ok(BufWriter::new(File::create(&filename)?))
}

fn fmt_value(v: f64) -> String {
    if v.is_nan() {
        "NA".to_string()
    } else {
        format!("{:.6}", v)
    }
}

/// Write the soft-threshold diagnostic table.
pub fn write_power_fits(prefix: &str, fits: &[PowerFit]) -> Result<()> {
    let mut writer = create_output_file(prefix, "power_fit")?;
    info!("Writing soft-threshold diagnostics to {}.power_fit.tsv", prefix);
    writeln!(
        writer,
        "Power\tFitIndex\tSlope\tMeanConnectivity\tMedianConnectivity\tMaxConnectivity"
    )?;
    for fit in fits {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            fit.power,
            fmt_value(fit.fit_index),
            fmt_value(fit.slope),
            fmt_value(fit.mean_connectivity),
            fmt_value(fit.median_connectivity),
            fmt_value(fit.max_connectivity)
        )?;
    }
    Ok(())
}

/// Write the per-feature module assignment table.
pub fn write_module_assignments(
    prefix: &str,
    feature_ids: &[String],
    modules: &ModuleSet,
) -> Result<()> {
    let mut writer = create_output_file(prefix, "modules")?;
    info!("Writing module assignments to {}.modules.tsv", prefix);
    writeln!(writer, "FeatureID\tModule")?;
    for (feature, &label) in feature_ids.iter().zip(modules.labels.iter()) {
        writeln!(writer, "{}\t{}", feature, label)?;
    }
    Ok(())
}

/// Write the eigengene matrix (samples x modules).
pub fn write_eigengenes(prefix: &str, sample_ids: &[String], modules: &ModuleSet) -> Result<()> {
    let mut writer = create_output_file(prefix, "eigengenes")?;
    info!("Writing module eigengenes to {}.eigengenes.tsv", prefix);
    write!(writer, "SampleID")?;
    for module in &modules.module_labels {
        write!(writer, "\tME{}", module)?;
    }
    writeln!(writer)?;
    for (row, sample) in sample_ids.iter().enumerate() {
        write!(writer, "{}", sample)?;
        for col in 0..modules.eigengenes.ncols() {
            write!(writer, "\t{}", fmt_value(modules.eigengenes[[row, col]]))?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Write the module-trait association table in long form.
pub fn write_association_table(prefix: &str, table: &AssociationTable) -> Result<()> {
    let mut writer = create_output_file(prefix, "module_trait")?;
    info!(
        "Writing module-trait associations to {}.module_trait.tsv",
        prefix
    );
    writeln!(writer, "Module\tTrait\tCorrelation\tPValue")?;
    for (m, &module) in table.module_labels.iter().enumerate() {
        for (t, name) in table.trait_names.iter().enumerate() {
            writeln!(
                writer,
                "ME{}\t{}\t{}\t{}",
                module,
                name,
                fmt_value(table.correlations[[m, t]]),
                fmt_value(table.p_values[[m, t]])
            )?;
        }
    }
    Ok(())
}

/// Write the membership / trait-significance table.
pub fn write_membership_table(prefix: &str, table: &MembershipTable) -> Result<()> {
    let mut writer = create_output_file(prefix, "membership")?;
    info!("Writing membership scores to {}.membership.tsv", prefix);
    write!(writer, "FeatureID\tModule")?;
    for module in &table.module_labels {
        write!(writer, "\tkME{}\tkME{}_p", module, module)?;
    }
    writeln!(writer, "\tGS_{}\tGS_{}_p", table.trait_name, table.trait_name)?;
    for f in 0..table.feature_ids.len() {
        write!(writer, "{}\t{}", table.feature_ids[f], table.labels[f])?;
        for m in 0..table.module_labels.len() {
            write!(
                writer,
                "\t{}\t{}",
                fmt_value(table.membership[[f, m]]),
                fmt_value(table.membership_p[[f, m]])
            )?;
        }
        writeln!(
            writer,
            "\t{}\t{}",
            fmt_value(table.trait_significance[f]),
            fmt_value(table.trait_significance_p[f])
        )?;
    }
    Ok(())
}

/// Write sample PCA scores with per-component explained variance in the
/// header.
pub fn write_pca_scores(prefix: &str, pca: &crate::pca::PcaResult) -> Result<()> {
    let mut writer = create_output_file(prefix, "pca")?;
    info!("Writing sample PCA scores to {}.pca.tsv", prefix);
    write!(writer, "SampleID")?;
    for (i, fraction) in pca.explained_variance.iter().enumerate() {
        write!(writer, "\tPC{} ({:.1}%)", i + 1, fraction * 100.0)?;
    }
    writeln!(writer)?;
    for (row, sample) in pca.sample_ids.iter().enumerate() {
        write!(writer, "{}", sample)?;
        for col in 0..pca.scores.ncols() {
            write!(writer, "\t{}", fmt_value(pca.scores[[row, col]]))?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Write the univariate screen table.
pub fn write_univariate_table(prefix: &str, table: &UnivariateTable) -> Result<()> {
    let mut writer = create_output_file(prefix, "univariate")?;
    info!("Writing univariate screen to {}.univariate.tsv", prefix);
    writeln!(
        writer,
        "FeatureID\tTStatistic\tTPValue\tUStatistic\tUPValue\tLog2FoldChange\tQValue"
    )?;
    for row in &table.rows {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            row.feature_id,
            fmt_value(row.t_statistic),
            fmt_value(row.t_p_value),
            fmt_value(row.u_statistic),
            fmt_value(row.u_p_value),
            fmt_value(row.log2_fold_change),
            fmt_value(row.q_value)
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn expression_round_trip() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "SampleID\tmiR21\tmiR155").unwrap();
        writeln!(file, "P001\t1.5\t-0.25").unwrap();
        writeln!(file, "P002\t2.0\t0.75").unwrap();
        file.flush().unwrap();

        let expr = read_expression_tsv(file.path()).unwrap();
        assert_eq!(expr.sample_ids(), &["P001".to_string(), "P002".to_string()]);
        assert_eq!(expr.feature_ids(), &["miR21".to_string(), "miR155".to_string()]);
        assert_eq!(expr.values()[[1, 1]], 0.75);
    }

    #[test]
    fn traits_parse_missing_cells() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "SampleID\tstatus\tage").unwrap();
        writeln!(file, "P001\t1\tNA").unwrap();
        writeln!(file, "P002\t0\t54").unwrap();
        file.flush().unwrap();

        let traits = read_trait_tsv(file.path()).unwrap();
        assert!(traits.values()[[0, 1]].is_nan());
        assert_eq!(traits.values()[[1, 1]], 54.0);
    }

    #[test]
    fn expression_rejects_missing_cells() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "SampleID\ta").unwrap();
        writeln!(file, "P001\tNA").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            read_expression_tsv(file.path()),
            Err(CoexError::Parse { .. })
        ));
    }

    #[test]
    fn unparsable_cell_reports_position() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "SampleID\ta").unwrap();
        writeln!(file, "P001\tnot-a-number").unwrap();
        file.flush().unwrap();

        match read_expression_tsv(file.path()) {
            Err(CoexError::Parse { row, col, value }) => {
                assert_eq!(row, 2);
                assert_eq!(col, 2);
                assert_eq!(value, "not-a-number");
            }
            other => panic!("expected Parse error, got {:?}", other.map(|_| ())),
        }
    }
}
