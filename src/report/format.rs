//! Formatted terminal output: comparison table, run summary, dataset summary.
//!
//! We keep formatting code in one place so:
//! - the estimators stay free of presentation concerns
//! - output changes are localized (the golden tests below pin the layout)

use crate::data::VariableSummary;
use crate::domain::{FittedModel, ModelKind, OutputFormat, QuantileFailure, RunConfig};
use crate::report::table::ComparisonTable;

const STARS_LEGEND: &str = "*** p<0.01, ** p<0.05, * p<0.1";

/// Render the table in the requested flavour, footer included.
pub fn format_table(
    table: &ComparisonTable,
    format: OutputFormat,
    n_obs: usize,
    failures: &[QuantileFailure],
) -> String {
    match format {
        OutputFormat::Text => format_table_text(table, n_obs, failures),
        OutputFormat::Markdown => format_table_markdown(table, n_obs, failures),
    }
}

/// Aligned plain text. Each term takes two lines: estimate with stars, then
/// the standard error in parentheses.
pub fn format_table_text(table: &ComparisonTable, n_obs: usize, failures: &[QuantileFailure]) -> String {
    let term_w = table
        .rows
        .iter()
        .map(|r| r.term.chars().count())
        .max()
        .unwrap_or(0)
        .max("Term".len());
    let widths = column_widths(table);
    let rule = "-".repeat(term_w + widths.iter().map(|w| w + 1).sum::<usize>());

    let mut out = String::new();
    let mut header = format!("{:<term_w$}", "Term");
    for (h, &w) in table.headers.iter().zip(&widths) {
        header.push_str(&format!(" {h:>w$}"));
    }
    push_line(&mut out, &header);
    push_line(&mut out, &rule);

    for row in &table.rows {
        let mut est = format!("{:<term_w$}", row.term);
        let mut se = format!("{:<term_w$}", "");
        for (cell, &w) in row.cells.iter().zip(&widths) {
            est.push_str(&format!(" {:>w$}", cell.estimate_text()));
            se.push_str(&format!(" {:>w$}", cell.std_error_text()));
        }
        push_line(&mut out, &est);
        push_line(&mut out, &se);
    }
    push_line(&mut out, &rule);

    out.push_str(&format!("N = {n_obs}\n"));
    out.push_str(STARS_LEGEND);
    out.push('\n');
    if !failures.is_empty() {
        out.push_str("Failed quantiles:\n");
        for f in failures {
            out.push_str(&format!(
                "  {}: {}\n",
                ModelKind::Quantile { tau: f.tau }.label(),
                f.reason
            ));
        }
    }
    out
}

/// GitHub-flavoured Markdown. Stars are escaped so they do not turn into
/// emphasis.
pub fn format_table_markdown(table: &ComparisonTable, n_obs: usize, failures: &[QuantileFailure]) -> String {
    let mut out = String::new();
    out.push_str("| Term |");
    for h in &table.headers {
        out.push_str(&format!(" {h} |"));
    }
    out.push('\n');
    out.push_str("|:---|");
    for _ in &table.headers {
        out.push_str("---:|");
    }
    out.push('\n');

    for row in &table.rows {
        out.push_str(&format!("| {} |", row.term));
        for cell in &row.cells {
            out.push_str(&format!(" {} |", escape_md(&cell.estimate_text())));
        }
        out.push('\n');
        out.push_str("| |");
        for cell in &row.cells {
            out.push_str(&format!(" {} |", cell.std_error_text()));
        }
        out.push('\n');
    }

    out.push('\n');
    out.push_str(&format!("N = {n_obs}. {}\n", escape_md(STARS_LEGEND)));
    if !failures.is_empty() {
        out.push('\n');
        out.push_str("Failed quantiles:\n\n");
        for f in failures {
            out.push_str(&format!(
                "- {}: {}\n",
                ModelKind::Quantile { tau: f.tau }.label(),
                f.reason
            ));
        }
    }
    out
}

/// Format the run header (data, formula, estimator settings, fit diagnostics).
pub fn format_run_summary(
    config: &RunConfig,
    n_obs: usize,
    dropped: usize,
    models: &[&FittedModel],
) -> String {
    let mut out = String::new();

    out.push_str("=== qreg - Quantile regression sweep ===\n");
    let spec = &config.spec;
    let rhs = if spec.regressors.is_empty() {
        "1".to_string()
    } else {
        spec.regressors.join(" + ")
    };
    out.push_str(&format!(
        "Model: {} ~ {}{}\n",
        spec.dependent,
        rhs,
        if spec.intercept { "" } else { " (no intercept)" }
    ));
    out.push_str(&format!(
        "Sample: n={n_obs} ({dropped} rows dropped for missing values)\n"
    ));
    out.push_str(&format!("Quantiles: {}\n", fmt_vec(&config.quantiles)));
    out.push_str(&format!(
        "Inference: {:.0}% intervals, QR standard errors '{}'\n",
        config.confidence_level * 100.0,
        config.estimator.se_method.label()
    ));

    if !models.is_empty() {
        out.push_str("\nModel diagnostics:\n");
        for m in models {
            let objective = match m.kind {
                ModelKind::Ols => "SSE",
                ModelKind::Quantile { .. } => "check loss",
            };
            out.push_str(&format!(
                "  {:<10} {objective}={:.4} iterations={}\n",
                m.kind.label(),
                m.objective,
                m.iterations
            ));
        }
    }
    out.push('\n');
    out
}

/// Per-variable descriptive statistics.
pub fn format_dataset_summary(summary: &[VariableSummary], n_rows: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("Observations: {n_rows}\n"));
    out.push_str(&format!("Variables: {}\n\n", summary.len()));

    push_line(
        &mut out,
        &format!(
            "{:<16} {:>8} {:>8} {:>12} {:>12} {:>12}",
            "variable", "n", "missing", "mean", "min", "max"
        ),
    );
    push_line(
        &mut out,
        &format!(
            "{:-<16} {:-<8} {:-<8} {:-<12} {:-<12} {:-<12}",
            "", "", "", "", "", ""
        ),
    );
    for s in summary {
        push_line(
            &mut out,
            &format!(
                "{:<16} {:>8} {:>8} {:>12.4} {:>12.4} {:>12.4}",
                truncate(&s.name, 16),
                s.n,
                s.missing,
                s.mean,
                s.min,
                s.max
            ),
        );
    }
    out
}

fn column_widths(table: &ComparisonTable) -> Vec<usize> {
    table
        .headers
        .iter()
        .enumerate()
        .map(|(j, h)| {
            table
                .rows
                .iter()
                .flat_map(|r| [r.cells[j].estimate_text().len(), r.cells[j].std_error_text().len()])
                .max()
                .unwrap_or(0)
                .max(h.len())
        })
        .collect()
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn escape_md(s: &str) -> String {
    s.replace('*', "\\*")
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| x.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
