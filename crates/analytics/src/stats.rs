//! Small numeric helpers shared by the aggregations

use crate::grading::round2;

/// Running average, maximum and minimum over the known values of a column
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkStats {
    count: usize,
    sum: i64,
    max: Option<i32>,
    min: Option<i32>,
}

impl MarkStats {
    pub fn collect(values: impl IntoIterator<Item = Option<i32>>) -> Self {
        let mut stats = Self::default();
        for value in values.into_iter().flatten() {
            stats.push(value);
        }
        stats
    }

    pub fn push(&mut self, value: i32) {
        self.count += 1;
        self.sum += i64::from(value);
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
    }

    /// Mean rounded to two decimals, `None` when no value was seen
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| round2(self.sum as f64 / self.count as f64))
    }

    pub fn max(&self) -> Option<i32> {
        self.max
    }

    pub fn min(&self) -> Option<i32> {
        self.min
    }

    pub fn sum(&self) -> i64 {
        self.sum
    }
}

/// `part * 100 / whole` rounded to two decimals, 0 for an empty whole
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 * 100.0 / whole as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_stats_skip_missing() {
        let stats = MarkStats::collect([Some(120), None, Some(81), Some(100)]);
        assert_eq!(stats.average(), Some(100.33));
        assert_eq!(stats.max(), Some(120));
        assert_eq!(stats.min(), Some(81));
        assert_eq!(stats.sum(), 301);

        let empty = MarkStats::collect([None, None]);
        assert_eq!(empty.average(), None);
        assert_eq!(empty.max(), None);
    }

    #[test]
    fn test_percentage_guards_zero() {
        assert_eq!(percentage(3, 10), 30.0);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(0, 0), 0.0);
    }
}
