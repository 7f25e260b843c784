//! Minute, hour and day aggregation
//!
//! Samples are bucketed by wall-clock minute. When a minute ends its mean
//! is stored as one minute value (the last hour is kept). Minute values
//! roll up the same way into hour values (the last day is kept). Minutes
//! without samples leave no entry.

use super::rolling::RollingAverage;

/// Minute values kept
pub const MINUTES_PER_HOUR: usize = 60;

/// Hour values kept
pub const HOURS_PER_DAY: usize = 24;

/// Running sum of the samples in an open bucket
#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    index: u64,
    sum: i64,
    count: u32,
}

impl Bucket {
    fn mean(&self) -> Option<i32> {
        (self.count > 0).then(|| (self.sum / self.count as i64) as i32)
    }
}

/// Minute/hour/day history of one quantity
#[derive(Debug, Clone, Default)]
pub struct History {
    minute: Option<Bucket>,
    hour: Option<Bucket>,
    minutes: RollingAverage<MINUTES_PER_HOUR>,
    hours: RollingAverage<HOURS_PER_DAY>,
}

impl History {
    /// Create an empty history
    pub const fn new() -> Self {
        Self {
            minute: None,
            hour: None,
            minutes: RollingAverage::new(),
            hours: RollingAverage::new(),
        }
    }

    /// Record `value` taken at `now_s` seconds
    ///
    /// Timestamps that go backwards are counted in the open minute.
    pub fn record(&mut self, value: i32, now_s: u64) {
        let index = now_s / 60;
        let bucket = match self.minute {
            Some(open) if index > open.index => {
                self.close_minute(open);
                Bucket {
                    index,
                    ..Bucket::default()
                }
            }
            Some(open) => open,
            None => Bucket {
                index,
                ..Bucket::default()
            },
        };
        self.minute = Some(Bucket {
            sum: bucket.sum + value as i64,
            count: bucket.count + 1,
            ..bucket
        });
    }

    fn close_minute(&mut self, minute: Bucket) {
        let Some(mean) = minute.mean() else {
            return;
        };
        self.minutes.push(mean);

        let index = minute.index / 60;
        let hour = match self.hour {
            Some(open) if index > open.index => {
                if let Some(hour_mean) = open.mean() {
                    self.hours.push(hour_mean);
                }
                Bucket {
                    index,
                    ..Bucket::default()
                }
            }
            Some(open) => open,
            None => Bucket {
                index,
                ..Bucket::default()
            },
        };
        self.hour = Some(Bucket {
            sum: hour.sum + mean as i64,
            count: hour.count + 1,
            ..hour
        });
    }

    /// Mean of the current minute, or of the last closed minute if the
    /// current one has no samples yet
    pub fn minute_average(&self) -> Option<i32> {
        self.minute
            .and_then(|m| m.mean())
            .or_else(|| self.minutes.latest())
    }

    /// Mean over the last hour of minute values, including the open minute
    pub fn hour_average(&self) -> Option<i32> {
        let (sum, count) = self.minutes.totals();
        mean_with(sum, count, self.minute.and_then(|m| m.mean()))
    }

    /// Mean over the last day of hour values, including the open hour
    pub fn day_average(&self) -> Option<i32> {
        let (sum, count) = self.hours.totals();
        mean_with(sum, count, self.open_hour_mean())
    }

    fn open_hour_mean(&self) -> Option<i32> {
        let mut sum = 0i64;
        let mut count = 0i64;
        if let Some(hour) = self.hour {
            sum += hour.sum;
            count += hour.count as i64;
        }
        if let Some(mean) = self.minute.and_then(|m| m.mean()) {
            sum += mean as i64;
            count += 1;
        }
        (count > 0).then(|| (sum / count) as i32)
    }

    /// Closed minute values, oldest first
    pub fn minutes(&self) -> &RollingAverage<MINUTES_PER_HOUR> {
        &self.minutes
    }

    /// Closed hour values, oldest first
    pub fn hours(&self) -> &RollingAverage<HOURS_PER_DAY> {
        &self.hours
    }

    /// Forget everything
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

fn mean_with(sum: i64, count: usize, extra: Option<i32>) -> Option<i32> {
    let (sum, count) = match extra {
        Some(e) => (sum + e as i64, count as i64 + 1),
        None => (sum, count as i64),
    };
    (count > 0).then(|| (sum / count) as i32)
}
