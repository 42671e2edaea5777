use crate::report::{render, PipelineReport};
use statpipe_common::Result;
use std::io::Write;
use std::path::Path;

pub fn print_summary(report: &PipelineReport) {
    print!("{}", render(report));
}

pub fn export_json(output_path: &Path, report: &PipelineReport) -> Result<()> {
    let mut file = std::fs::File::create(output_path)?;
    serde_json::to_writer_pretty(&mut file, report)
        .map_err(|e| statpipe_common::StatPipeError::Other(e.to_string()))?;
    Ok(())
}

/// One row per bucket plus a trailing totals row, so the whole distribution
/// survives a spreadsheet round trip.
pub fn export_csv(output_path: &Path, report: &PipelineReport) -> Result<()> {
    let mut file = std::fs::File::create(output_path)?;
    writeln!(file, "lower,upper,count")?;
    for b in &report.histogram {
        writeln!(file, "{},{},{}", b.lower, b.upper, b.count)?;
    }
    writeln!(
        file,
        "# values={} out_of_range={} filtered_out={} rejected={}",
        report.count, report.out_of_range, report.filtered_out, report.rejected
    )?;
    Ok(())
}
