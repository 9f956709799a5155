//! Metric primitives shared by every role view.

use crate::models::TrendPoint;
use chrono::{DateTime, Duration, Utc};

/// Percentage `numerator / denominator`, rounded to a whole number.
///
/// A zero denominator yields 0.
pub fn rate(numerator: usize, denominator: usize) -> u32 {
    if denominator == 0 {
        return 0;
    }
    ((numerator as f64 / denominator as f64) * 100.0).round() as u32
}

/// Arithmetic mean rounded to one decimal place; 0 for no values.
pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    (mean * 10.0).round() / 10.0
}

/// Whether a last-access timestamp (unix seconds, 0 = never) is inside the window.
pub fn is_active(lastaccess: i64, now: DateTime<Utc>, window: Duration) -> bool {
    lastaccess > 0 && now.timestamp() - lastaccess <= window.num_seconds()
}

/// Number of timestamps inside the rolling window ending at `now`.
pub fn active_count<I>(lastaccess: I, now: DateTime<Utc>, window: Duration) -> usize
where
    I: IntoIterator<Item = i64>,
{
    lastaccess
        .into_iter()
        .filter(|t| is_active(*t, now, window))
        .count()
}

/// Event counts per week for the last `weeks` weeks, oldest first.
///
/// Week `k` covers `[now - (weeks - k) * 7d, now - (weeks - k - 1) * 7d)`;
/// timestamps outside every bucket are ignored. Bucket starts before the
/// earliest representable date are pinned to it.
pub fn weekly_trend<I>(timestamps: I, now: DateTime<Utc>, weeks: usize) -> Vec<TrendPoint>
where
    I: IntoIterator<Item = i64>,
{
    if weeks == 0 {
        return Vec::new();
    }

    let week_secs = Duration::weeks(1).num_seconds();
    let end = now.timestamp();
    let start = end.saturating_sub(week_secs.saturating_mul(weeks as i64));
    let mut counts = vec![0usize; weeks];

    for t in timestamps {
        if t < start || t >= end {
            continue;
        }
        let bucket = ((t - start) / week_secs) as usize;
        if let Some(count) = counts.get_mut(bucket) {
            *count += 1;
        }
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(k, count)| TrendPoint {
            period_start: weeks_before(now, weeks - k).date_naive(),
            count,
        })
        .collect()
}

fn weeks_before(now: DateTime<Utc>, weeks: usize) -> DateTime<Utc> {
    i64::try_from(weeks)
        .ok()
        .and_then(Duration::try_weeks)
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_750_000_000, 0).unwrap()
    }

    #[test]
    fn test_rate_zero_denominator() {
        assert_eq!(rate(0, 0), 0);
        assert_eq!(rate(5, 0), 0);
    }

    #[test]
    fn test_rate_rounds() {
        assert_eq!(rate(84, 200), 42);
        assert_eq!(rate(1, 3), 33);
        assert_eq!(rate(2, 3), 67);
        assert_eq!(rate(1, 8), 13);
        assert_eq!(rate(10, 10), 100);
    }

    #[test]
    fn test_average() {
        assert_eq!(average(&[]), 0.0);
        assert_eq!(average(&[70.0, 80.0, 91.0]), 80.3);
        assert_eq!(average(&[4.25, 4.0]), 4.1);
        assert_eq!(average(&[3.0]), 3.0);
    }

    #[test]
    fn test_active_window() {
        let window = Duration::days(30);
        let ts = now().timestamp();
        let samples = vec![
            ts,
            ts - Duration::days(30).num_seconds(),
            ts - Duration::days(31).num_seconds(),
            0,
        ];
        assert_eq!(active_count(samples, now(), window), 2);
    }

    #[test]
    fn test_weekly_trend_buckets() {
        let ts = now().timestamp();
        let day = Duration::days(1).num_seconds();
        let points = weekly_trend(
            vec![ts - day, ts - 2 * day, ts - 9 * day, ts - 30 * day, ts + day],
            now(),
            4,
        );

        assert_eq!(points.len(), 4);
        let counts: Vec<usize> = points.iter().map(|p| p.count).collect();
        assert_eq!(counts, vec![0, 0, 1, 2]);
        assert!(points[0].period_start < points[3].period_start);
        assert_eq!(
            points[3].period_start,
            (now() - Duration::weeks(1)).date_naive()
        );
    }

    #[test]
    fn test_weekly_trend_zero_weeks() {
        assert!(weekly_trend(vec![1, 2, 3], now(), 0).is_empty());
    }

    #[test]
    fn test_weekly_trend_near_earliest_date() {
        let now = DateTime::<Utc>::MIN_UTC + Duration::days(10);
        let points = weekly_trend(vec![now.timestamp() - 1], now, 4);

        assert_eq!(points.len(), 4);
        assert_eq!(points[0].period_start, DateTime::<Utc>::MIN_UTC.date_naive());
        assert_eq!(points[3].period_start, (now - Duration::weeks(1)).date_naive());
        assert_eq!(points[3].count, 1);
    }
}
