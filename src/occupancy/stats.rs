/// Summary of an occupancy logit distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogitStatistics {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub median: f32,
    pub p25: f32,
    pub p75: f32,
    pub p90: f32,
    pub p95: f32,
}

impl LogitStatistics {
    /// Returns `None` for an empty field.
    pub fn from_logits(logits: &[f32]) -> Option<Self> {
        if logits.is_empty() {
            return None;
        }

        let mut sorted = logits.to_vec();
        sorted.sort_unstable_by(|a, b| a.total_cmp(b));

        let len = sorted.len();
        let sum: f64 = logits.iter().map(|&l| l as f64).sum();

        Some(Self {
            min: sorted[0],
            max: sorted[len - 1],
            mean: (sum / len as f64) as f32,
            median: sorted[len / 2],
            p25: sorted[len / 4],
            p75: sorted[3 * len / 4],
            p90: sorted[9 * len / 10],
            p95: sorted[19 * len / 20],
        })
    }

    /// Suggests a threshold that marks roughly `target_occupancy` (0..1) of the
    /// sampled volume as occupied.
    ///
    /// Interpolates linearly between quartiles, so it is only as precise as
    /// the distribution is smooth.
    pub fn suggest_threshold(&self, target_occupancy: f32) -> f32 {
        let target = target_occupancy.clamp(0.0, 1.0);

        if target < 0.25 {
            self.p75 + (self.max - self.p75) * (0.25 - target) / 0.25
        } else if target < 0.5 {
            self.median + (self.p75 - self.median) * (0.5 - target) / 0.25
        } else if target < 0.75 {
            self.p25 + (self.median - self.p25) * (0.75 - target) / 0.25
        } else {
            self.min + (self.p25 - self.min) * (1.0 - target) / 0.25
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_statistics_are_ordered() {
        let logits: Vec<f32> = (0..100).map(|i| (i as f32 - 50.0) / 10.0).rev().collect();
        let stats = LogitStatistics::from_logits(&logits).unwrap();

        assert_eq!(stats.min, -5.0);
        assert_abs_diff_eq!(stats.max, 4.9, epsilon = 1e-6);
        assert!(stats.min <= stats.p25);
        assert!(stats.p25 <= stats.median);
        assert!(stats.median <= stats.p75);
        assert!(stats.p75 <= stats.p90);
        assert!(stats.p90 <= stats.p95);
        assert!(stats.p95 <= stats.max);
        assert_abs_diff_eq!(stats.mean, -0.05, epsilon = 1e-5);
    }

    #[test]
    fn test_empty_field_has_no_statistics() {
        assert!(LogitStatistics::from_logits(&[]).is_none());
    }

    #[test]
    fn test_suggest_threshold_is_monotonic() {
        let stats = LogitStatistics {
            min: -2.0,
            max: 2.0,
            mean: 0.0,
            median: 0.0,
            p25: -0.5,
            p75: 0.5,
            p90: 1.0,
            p95: 1.5,
        };

        let t1 = stats.suggest_threshold(0.1);
        let t2 = stats.suggest_threshold(0.5);
        let t3 = stats.suggest_threshold(0.9);

        assert!(t1 > t2);
        assert!(t2 > t3);
        assert_eq!(stats.suggest_threshold(0.5), stats.median);
        assert_eq!(stats.suggest_threshold(0.0), stats.max);
        assert_eq!(stats.suggest_threshold(1.0), stats.min);
    }
}
