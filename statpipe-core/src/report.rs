use crate::aggregate::{Bucket, QuantileEstimate};
use crate::cardinality::CardinalityEstimate;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Final structured result of a pipeline run. Pure data; `render` is a
/// formatting function over it and never recomputes anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Values that passed projection and filter and fed the aggregator.
    pub count: u64,
    pub mean: Option<f64>,
    pub sample_std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub quantiles: Vec<QuantileEstimate>,
    pub histogram: Vec<Bucket>,
    /// Aggregated values outside the bucket span.
    pub out_of_range: u64,
    /// Records whose projected value failed the filter predicate.
    pub filtered_out: u64,
    /// Records that could not be deserialized or projected.
    pub rejected: u64,
    /// First accepted projected values, bounded by the preview limit.
    pub preview: Vec<f64>,
    pub distinct_labels: Option<CardinalityEstimate>,
}

pub fn render(report: &PipelineReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<16} {}", "Values:", report.count);
    match report.mean {
        Some(m) => {
            let _ = writeln!(out, "{:<16} {m:.6}", "Mean:");
        }
        None => {
            let _ = writeln!(out, "{:<16} n/a", "Mean:");
        }
    }
    match report.sample_std_dev {
        Some(sd) => {
            let _ = writeln!(out, "{:<16} {sd:.6}", "Sample stdev:");
        }
        None => {
            let _ = writeln!(out, "{:<16} n/a (fewer than 2 values)", "Sample stdev:");
        }
    }
    if let (Some(min), Some(max)) = (report.min, report.max) {
        let _ = writeln!(out, "{:<16} {min:.6} .. {max:.6}", "Range:");
    }
    for q in &report.quantiles {
        let _ = writeln!(out, "{:<16} {:.6}", format!("p{}:", q.q * 100.0), q.value);
    }
    let _ = writeln!(out, "Histogram:");
    for (i, b) in report.histogram.iter().enumerate() {
        // last bucket is upper-inclusive
        let close = if i + 1 == report.histogram.len() {
            "]"
        } else {
            ")"
        };
        let _ = writeln!(
            out,
            "  [{:>10.3}, {:>10.3}{close} {}",
            b.lower, b.upper, b.count
        );
    }
    let _ = writeln!(out, "{:<16} {}", "Out of range:", report.out_of_range);
    let _ = writeln!(out, "{:<16} {}", "Filtered out:", report.filtered_out);
    let _ = writeln!(out, "{:<16} {}", "Rejected:", report.rejected);
    if let Some(card) = &report.distinct_labels {
        let _ = writeln!(
            out,
            "{:<16} ~{}",
            "Distinct labels:", card.approximate_distinct
        );
    }
    if !report.preview.is_empty() {
        let vals: Vec<String> = report.preview.iter().map(|v| format!("{v:.1}")).collect();
        let _ = writeln!(out, "{:<16} {}", "Preview:", vals.join(", "));
    }
    out
}
