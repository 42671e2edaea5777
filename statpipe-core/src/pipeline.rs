use crate::aggregate::Aggregator;
use crate::cardinality::LabelCardinality;
use crate::report::PipelineReport;
use crate::source::{RecordIter, RecordSource};
use crate::transform::Transform;
use rayon::prelude::*;
use statpipe_common::{PipelineConfig, RejectionPolicy, Result, Stage, StatPipeError};
use tracing::{debug, info, warn};

/// Wires source -> transform -> aggregator -> report in one streaming pass.
/// Collaborators are injected; the driver owns only policy.
pub struct Driver {
    config: PipelineConfig,
}

/// Partial results of one partition, merged at the single fan-in point.
struct Partial {
    agg: Aggregator,
    labels: LabelCardinality,
    filtered_out: u64,
    rejected: u64,
    processed: u64,
    preview: Vec<f64>,
}

impl Driver {
    /// Fails fast on a bad bucket configuration instead of at the first
    /// record.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Aggregator::new(&config.edges)?;
        Ok(Driver { config })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(PipelineConfig::default())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Single-threaded run: one pass over the source's lazy sequence.
    pub fn run(&self, source: &dyn RecordSource, transform: &Transform) -> Result<PipelineReport> {
        let iter = source
            .fetch_all()
            .map_err(|e| fatal(Stage::Fetching, 0, e))?;
        let partial = self.consume(iter, transform)?;
        let report = self.finish(partial);
        info!(
            count = report.count,
            rejected = report.rejected,
            "pipeline completed"
        );
        Ok(report)
    }

    /// Parallel run: each source partition is aggregated independently and
    /// the partials are merged. Merging is exact and order-independent, so
    /// the result matches a sequential run over the same records.
    pub fn run_partitioned(
        &self,
        source: &dyn RecordSource,
        transform: &Transform,
    ) -> Result<PipelineReport> {
        let parts = source
            .partitions()
            .map_err(|e| fatal(Stage::Fetching, 0, e))?;
        debug!(partitions = parts.len(), "partitioned run");
        let partials: Vec<Result<Partial>> = parts
            .into_par_iter()
            .map(|iter| self.consume(iter, transform))
            .collect();

        let mut merged: Option<Partial> = None;
        for p in partials {
            let p = p?;
            merged = Some(match merged {
                None => p,
                Some(mut acc) => {
                    acc.agg.merge(p.agg)?;
                    acc.labels.merge(&p.labels);
                    acc.filtered_out += p.filtered_out;
                    acc.rejected += p.rejected;
                    acc.processed += p.processed;
                    acc.preview.extend(p.preview);
                    acc.preview.truncate(self.config.preview_limit);
                    acc
                }
            });
        }
        let merged = match merged {
            Some(m) => m,
            // partitions() never returns an empty set, but an empty source
            // still deserves a well-formed report
            None => self.consume(Box::new(std::iter::empty()), transform)?,
        };
        Ok(self.finish(merged))
    }

    fn consume(&self, iter: RecordIter, transform: &Transform) -> Result<Partial> {
        // Driver::new already validated the edges
        let mut agg = Aggregator::new(&self.config.edges)?;
        let mut labels = LabelCardinality::new();
        let mut filtered_out = 0u64;
        let mut rejected = 0u64;
        let mut processed = 0u64;
        let mut preview = Vec::new();
        let deadline = self
            .config
            .fetch_timeout_secs
            .map(|s| std::time::Instant::now() + std::time::Duration::from_secs(s));

        for item in iter {
            if let Some(dl) = deadline {
                if std::time::Instant::now() >= dl {
                    return Err(fatal(
                        Stage::Fetching,
                        processed,
                        StatPipeError::SourceUnavailable(format!(
                            "fetch exceeded {}s deadline",
                            self.config.fetch_timeout_secs.unwrap_or(0)
                        )),
                    ));
                }
            }
            let record = match item {
                Ok(r) => r,
                Err(e) if e.is_per_record() => {
                    warn!(error = %e, "record rejected");
                    self.reject(Stage::Fetching, processed, &mut rejected, e)?;
                    continue;
                }
                Err(e) => return Err(fatal(Stage::Fetching, processed, e)),
            };
            processed += 1;
            labels.add(&record.value.label);
            let value = match transform.project(&record) {
                Ok(v) => v,
                Err(e) if e.is_per_record() => {
                    warn!(key = record.key, error = %e, "record rejected");
                    self.reject(Stage::Transforming, processed, &mut rejected, e)?;
                    continue;
                }
                Err(e) => return Err(fatal(Stage::Transforming, processed, e)),
            };
            if !transform.accept(value) {
                filtered_out += 1;
                continue;
            }
            agg.observe(value);
            if preview.len() < self.config.preview_limit {
                preview.push(value);
            }
        }

        Ok(Partial {
            agg,
            labels,
            filtered_out,
            rejected,
            processed,
            preview,
        })
    }

    fn reject(
        &self,
        stage: Stage,
        processed: u64,
        rejected: &mut u64,
        cause: StatPipeError,
    ) -> Result<()> {
        match self.config.on_rejection {
            RejectionPolicy::Skip => {
                *rejected += 1;
                Ok(())
            }
            RejectionPolicy::Abort => Err(fatal(stage, processed, cause)),
        }
    }

    fn finish(&self, mut partial: Partial) -> PipelineReport {
        let stats = *partial.agg.stats();
        let quantiles = partial.agg.quantiles(&self.config.quantiles);
        let (min, max) = match partial.agg.min_max() {
            Some((mn, mx)) => (Some(mn), Some(mx)),
            None => (None, None),
        };
        PipelineReport {
            count: stats.count(),
            mean: stats.mean().ok(),
            sample_std_dev: stats.sample_std_dev().ok(),
            min,
            max,
            quantiles,
            histogram: partial.agg.histogram(),
            out_of_range: partial.agg.out_of_range(),
            filtered_out: partial.filtered_out,
            rejected: partial.rejected,
            preview: partial.preview,
            distinct_labels: Some(partial.labels.estimate()),
        }
    }
}

fn fatal(stage: Stage, records_processed: u64, cause: StatPipeError) -> StatPipeError {
    StatPipeError::Aborted {
        stage,
        records_processed,
        cause: cause.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use statpipe_common::Record;

    fn cities() -> MemorySource {
        MemorySource::new(vec![
            Record::new(1, 21.0, "London"),
            Record::new(2, 34.0, "Rome"),
            Record::new(3, 33.0, "Barcelona"),
            Record::new(4, 8.0, "Oslo"),
        ])
    }

    fn config(edges: &[f64]) -> PipelineConfig {
        PipelineConfig {
            edges: edges.to_vec(),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn bad_edges_fail_at_construction() {
        assert!(Driver::new(config(&[5.0])).is_err());
        assert!(Driver::new(config(&[5.0, 3.0])).is_err());
    }

    #[test]
    fn every_record_is_accounted_for() {
        let driver = Driver::new(config(&[20.0, 30.0, 40.0])).unwrap();
        let report = driver.run(&cities(), &Transform::identity()).unwrap();
        // 8.0 is below the span; the other three land in buckets
        let in_buckets: u64 = report.histogram.iter().map(|b| b.count).sum();
        assert_eq!(in_buckets, 3);
        assert_eq!(report.out_of_range, 1);
        assert_eq!(report.filtered_out, 0);
        assert_eq!(report.rejected, 0);
        assert_eq!(
            in_buckets + report.out_of_range + report.filtered_out + report.rejected,
            4
        );
    }

    #[test]
    fn filtered_records_do_not_reach_the_aggregator() {
        let driver = Driver::new(config(&[0.0, 50.0])).unwrap();
        let report = driver
            .run(&cities(), &Transform::filtered(|v| v > 20.0))
            .unwrap();
        assert_eq!(report.count, 3);
        assert_eq!(report.filtered_out, 1);
    }

    #[test]
    fn abort_policy_stops_on_projection_failure() {
        let cfg = PipelineConfig {
            edges: vec![0.0, 50.0],
            on_rejection: RejectionPolicy::Abort,
            ..PipelineConfig::default()
        };
        let driver = Driver::new(cfg).unwrap();
        let t = Transform::new(
            |r| {
                if r.key == 3 {
                    Err(StatPipeError::Projection("missing field".into()))
                } else {
                    Ok(r.value.numeric)
                }
            },
            |_| true,
        );
        let err = driver.run(&cities(), &t).unwrap_err();
        match err {
            StatPipeError::Aborted {
                stage,
                records_processed,
                ..
            } => {
                assert_eq!(stage, Stage::Transforming);
                assert_eq!(records_processed, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn skip_policy_tallies_and_continues() {
        let driver = Driver::new(config(&[0.0, 50.0])).unwrap();
        let t = Transform::new(
            |r| {
                if r.key == 3 {
                    Err(StatPipeError::Projection("missing field".into()))
                } else {
                    Ok(r.value.numeric)
                }
            },
            |_| true,
        );
        let report = driver.run(&cities(), &t).unwrap();
        assert_eq!(report.rejected, 1);
        assert_eq!(report.count, 3);
    }

    #[test]
    fn partitioned_matches_sequential() {
        let driver = Driver::new(config(&[0.0, 10.0, 20.0, 30.0, 40.0])).unwrap();
        let seq = driver.run(&cities(), &Transform::identity()).unwrap();
        let par = driver
            .run_partitioned(&cities().with_partitions(3), &Transform::identity())
            .unwrap();
        assert_eq!(seq.count, par.count);
        assert!((seq.mean.unwrap() - par.mean.unwrap()).abs() < 1e-12);
        assert_eq!(
            seq.histogram.iter().map(|b| b.count).collect::<Vec<_>>(),
            par.histogram.iter().map(|b| b.count).collect::<Vec<_>>()
        );
        assert_eq!(seq.out_of_range, par.out_of_range);
        // label sketches built on separate partitions merge into the same
        // distinct count as the sequential run
        assert_eq!(
            par.distinct_labels.unwrap().approximate_distinct,
            seq.distinct_labels.unwrap().approximate_distinct
        );
    }

    #[test]
    fn rerun_on_unchanged_snapshot_is_idempotent() {
        let driver = Driver::new(config(&[0.0, 10.0, 20.0, 30.0, 40.0])).unwrap();
        let src = cities();
        let a = driver.run(&src, &Transform::identity()).unwrap();
        let b = driver.run(&src, &Transform::identity()).unwrap();
        assert_eq!(a.mean, b.mean);
        assert_eq!(a.sample_std_dev, b.sample_std_dev);
        assert_eq!(
            a.histogram.iter().map(|x| x.count).collect::<Vec<_>>(),
            b.histogram.iter().map(|x| x.count).collect::<Vec<_>>()
        );
    }

    #[test]
    fn expired_deadline_is_source_unavailable() {
        let cfg = PipelineConfig {
            edges: vec![0.0, 50.0],
            fetch_timeout_secs: Some(0),
            ..PipelineConfig::default()
        };
        let driver = Driver::new(cfg).unwrap();
        let err = driver.run(&cities(), &Transform::identity()).unwrap_err();
        match err {
            StatPipeError::Aborted { stage, cause, .. } => {
                assert_eq!(stage, Stage::Fetching);
                assert!(cause.contains("deadline"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_source_yields_empty_report() {
        let driver = Driver::new(config(&[0.0, 1.0])).unwrap();
        let report = driver
            .run(&MemorySource::new(Vec::new()), &Transform::identity())
            .unwrap();
        assert_eq!(report.count, 0);
        assert!(report.mean.is_none());
        assert!(report.sample_std_dev.is_none());
        assert_eq!(report.histogram.len(), 1);
        assert_eq!(report.histogram[0].count, 0);
    }
}
