use serde::{Deserialize, Serialize};
use statpipe_common::{Result, StatPipeError};
use tdigest::TDigest;

// --- streaming moments ---

/// Welford accumulator: count, running mean and M2 (sum of squared
/// deviations from the mean). Avoids the catastrophic cancellation a naive
/// sum-of-squares shows on large-magnitude inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    /// Chan's parallel combine; exact up to ordinary float rounding and
    /// independent of merge order.
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * other.count as f64 / count as f64;
        let m2 = self.m2
            + other.m2
            + delta * delta * self.count as f64 * other.count as f64 / count as f64;
        *self = RunningStats { count, mean, m2 };
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.mean * self.count as f64
    }

    /// Raw second moment, recovered from M2 for callers that want the
    /// classic count/sum/sum-of-squares triple.
    pub fn sum_of_squares(&self) -> f64 {
        self.m2 + self.sum() * self.mean
    }

    pub fn mean(&self) -> Result<f64> {
        if self.count == 0 {
            return Err(StatPipeError::InsufficientData { count: 0 });
        }
        Ok(self.mean)
    }

    /// Sample standard deviation with Bessel's correction. An error, never
    /// NaN, when fewer than two values were seen.
    pub fn sample_std_dev(&self) -> Result<f64> {
        if self.count <= 1 {
            return Err(StatPipeError::InsufficientData { count: self.count });
        }
        Ok((self.m2 / (self.count - 1) as f64).sqrt())
    }
}

// --- histogram ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub lower: f64,
    pub upper: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantileEstimate {
    pub q: f64,
    pub value: f64,
}

/// Single-pass aggregator: moments, bucket counts and quantile digest
/// maintained together so the input is consumed exactly once.
#[derive(Clone)]
pub struct Aggregator {
    stats: RunningStats,
    edges: Vec<f64>,
    counts: Vec<u64>,
    out_of_range: u64,
    min: f64,
    max: f64,
    digest: TDigest,
    digest_buf: Vec<f64>,
}

const DIGEST_BUF_LEN: usize = 10_000;

impl Aggregator {
    /// Edges must be strictly increasing and at least two, defining at
    /// least one bucket. Validated here, not per record.
    pub fn new(edges: &[f64]) -> Result<Self> {
        if edges.len() < 2 {
            return Err(StatPipeError::InvalidBucketConfig(format!(
                "need at least 2 edges, got {}",
                edges.len()
            )));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(StatPipeError::InvalidBucketConfig(
                "edges must be strictly increasing".into(),
            ));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(StatPipeError::InvalidBucketConfig(
                "edges must be finite".into(),
            ));
        }
        Ok(Self {
            stats: RunningStats::new(),
            edges: edges.to_vec(),
            counts: vec![0; edges.len() - 1],
            out_of_range: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            digest: TDigest::new_with_size(100),
            digest_buf: Vec::new(),
        })
    }

    /// Bucket policy: `lower <= v < upper`, with the final bucket's upper
    /// edge inclusive. Values outside the edge span go to the out-of-range
    /// tally, never dropped silently.
    pub fn observe(&mut self, v: f64) {
        self.stats.update(v);
        if v < self.min {
            self.min = v;
        }
        if v > self.max {
            self.max = v;
        }
        let last = self.edges[self.edges.len() - 1];
        // NaN fails both comparisons and lands in the out-of-range tally
        if !(v >= self.edges[0] && v <= last) {
            self.out_of_range += 1;
        } else {
            let idx = self
                .edges
                .partition_point(|e| *e <= v)
                .saturating_sub(1)
                .min(self.counts.len() - 1);
            self.counts[idx] += 1;
        }
        self.digest_buf.push(v);
        if self.digest_buf.len() >= DIGEST_BUF_LEN {
            self.flush_digest();
        }
    }

    fn flush_digest(&mut self) {
        if self.digest_buf.is_empty() {
            return;
        }
        let merged = self
            .digest
            .merge_unsorted(self.digest_buf.drain(..).collect());
        self.digest = merged;
    }

    /// Fold another partition's partial aggregate into this one. Exact and
    /// order-independent, so parallel fan-in is safe.
    pub fn merge(&mut self, mut other: Aggregator) -> Result<()> {
        if self.edges != other.edges {
            return Err(StatPipeError::InvalidBucketConfig(
                "cannot merge aggregators with different edges".into(),
            ));
        }
        self.stats.merge(&other.stats);
        for (c, oc) in self.counts.iter_mut().zip(other.counts.iter()) {
            *c += oc;
        }
        self.out_of_range += other.out_of_range;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.flush_digest();
        other.flush_digest();
        self.digest = TDigest::merge_digests(vec![self.digest.clone(), other.digest]);
        Ok(())
    }

    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    pub fn out_of_range(&self) -> u64 {
        self.out_of_range
    }

    /// Emit the histogram; zero-count buckets are kept.
    pub fn histogram(&self) -> Vec<Bucket> {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, &c)| Bucket {
                lower: self.edges[i],
                upper: self.edges[i + 1],
                count: c,
            })
            .collect()
    }

    pub fn min_max(&self) -> Option<(f64, f64)> {
        if self.stats.count() == 0 {
            None
        } else {
            Some((self.min, self.max))
        }
    }

    pub fn quantiles(&mut self, qs: &[f64]) -> Vec<QuantileEstimate> {
        self.flush_digest();
        if self.stats.count() == 0 {
            return Vec::new();
        }
        qs.iter()
            .map(|&q| QuantileEstimate {
                q,
                value: self.digest.estimate_quantile(q),
            })
            .collect()
    }
}
