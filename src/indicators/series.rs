//! Bounded rolling series with z-score normalisation

use std::collections::VecDeque;

/// Standard deviations below this are treated as zero variance
const MIN_STD: f64 = 1e-12;

/// Fixed-capacity history of one indicator
#[derive(Debug, Clone)]
pub struct RollingSeries {
    capacity: usize,
    values: VecDeque<f64>,
}

impl RollingSeries {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a value, evicting the oldest when full
    ///
    /// Non-finite values are skipped and leave the history unchanged.
    pub fn push(&mut self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.values.push_back(value);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
        true
    }

    /// Overwrite the most recent value, or append when empty
    pub fn replace_latest(&mut self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match self.values.back_mut() {
            Some(last) => *last = value,
            None => self.values.push_back(value),
        }
        true
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    /// Population standard deviation
    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let var = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / self.values.len() as f64;
        Some(var.sqrt())
    }

    /// z-score of `value` against the history, 0 when degenerate
    pub fn zscore(&self, value: f64) -> f64 {
        if self.values.len() < 2 || !value.is_finite() {
            return 0.0;
        }
        match (self.mean(), self.std_dev()) {
            (Some(mean), Some(std)) if std.is_finite() && std >= MIN_STD => {
                let z = (value - mean) / std;
                if z.is_finite() {
                    z
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    /// z-score of the most recent value
    pub fn latest_zscore(&self) -> f64 {
        self.latest().map_or(0.0, |v| self.zscore(v))
    }
}
