// src/engines/metrics/histogram.rs
use serde::{Deserialize, Serialize};

/// Bucket counts above this widen the bucket width until the range fits.
pub const MAX_BUCKETS: usize = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Inclusive lower edge.
    pub lower: f64,
    /// Exclusive upper edge.
    pub upper: f64,
    pub count: usize,
    /// Share of all samples in this bucket or any lower one, in percent.
    pub cumulative_pct: f64,
}

/// Fixed-width histogram of returns. Buckets are aligned to multiples of the
/// width, so the same samples always land in the same buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub bucket_width: f64,
    pub buckets: Vec<HistogramBucket>,
    pub total: usize,
}

impl Histogram {
    pub fn build(samples: &[f64], bucket_width: f64) -> Self {
        let mut width = bucket_width;
        if samples.is_empty() || !(width > 0.0) {
            return Self {
                bucket_width: width,
                buckets: Vec::new(),
                total: 0,
            };
        }

        let (min, max) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)));

        let (lo_idx, hi_idx) = loop {
            let lo = (min / width).floor();
            let hi = (max / width).floor();
            if hi - lo < MAX_BUCKETS as f64 {
                break (lo as i64, hi as i64);
            }
            width *= 2.0;
        };

        let mut counts = vec![0usize; (hi_idx - lo_idx + 1) as usize];
        for &s in samples {
            let idx = ((s / width).floor() as i64 - lo_idx).clamp(0, counts.len() as i64 - 1);
            counts[idx as usize] += 1;
        }

        let total = samples.len();
        let mut cumulative = 0usize;
        let buckets = counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| {
                cumulative += count;
                let lower = (lo_idx + i as i64) as f64 * width;
                HistogramBucket {
                    lower,
                    upper: lower + width,
                    count,
                    cumulative_pct: cumulative as f64 / total as f64 * 100.0,
                }
            })
            .collect();

        Self {
            bucket_width: width,
            buckets,
            total,
        }
    }

    /// Percentile rank of `value`: share of samples in buckets entirely below it.
    pub fn percentile_rank(&self, value: f64) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let below: usize = self
            .buckets
            .iter()
            .take_while(|b| b.upper <= value)
            .map(|b| b.count)
            .sum();
        below as f64 / self.total as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReturnPercentiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

impl ReturnPercentiles {
    /// All zero for an empty sample.
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self {
            p5: percentile(&sorted, 5.0),
            p25: percentile(&sorted, 25.0),
            p50: percentile(&sorted, 50.0),
            p75: percentile(&sorted, 75.0),
            p95: percentile(&sorted, 95.0),
        }
    }
}

/// Linear interpolation between order statistics at rank `p / 100 * (n - 1)`.
/// An exact rank takes the lower order statistic. `sorted` must be ascending
/// and non-empty; `p` is clamped to `[0, 100]`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = p.clamp(0.0, 100.0) / 100.0 * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            if lo == hi || frac == 0.0 {
                sorted[lo]
            } else {
                sorted[lo] + frac * (sorted[hi] - sorted[lo])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_of_one_to_five() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 50.0), 3.0);
        assert_eq!(percentile(&sorted, 100.0), 5.0);
        assert_eq!(percentile(&sorted, 12.5), 1.5);
    }

    #[test]
    fn single_sample_percentiles_equal_the_sample() {
        let p = ReturnPercentiles::from_samples(&[0.02]);
        assert_eq!(p.p5, 0.02);
        assert_eq!(p.p95, 0.02);
    }

    #[test]
    fn histogram_counts_and_cumulates() {
        let h = Histogram::build(&[0.001, 0.002, 0.006, -0.004], 0.005);
        assert_eq!(h.total, 4);
        assert_eq!(h.buckets.len(), 3);
        assert_eq!(h.buckets[0].count, 1);
        assert_eq!(h.buckets[1].count, 2);
        assert_eq!(h.buckets[2].count, 1);
        assert_eq!(h.buckets.last().unwrap().cumulative_pct, 100.0);
        assert_eq!(h.percentile_rank(0.0), 25.0);
    }

    #[test]
    fn wide_range_widens_buckets() {
        let h = Histogram::build(&[-100.0, 100.0], 0.001);
        assert!(h.buckets.len() <= MAX_BUCKETS);
        assert!(h.bucket_width > 0.001);
        assert_eq!(h.buckets.iter().map(|b| b.count).sum::<usize>(), 2);
    }
}
