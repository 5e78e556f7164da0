use serde::{Deserialize, Serialize};

/// Price statistics over the outflow-priced items observed in a bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    pub avg: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub stddev: Option<f64>,
}

impl PriceStats {
    /// Computes stats over a (non-empty-checked) slice of sold prices.
    pub fn from_prices(prices: &[i64]) -> Self {
        if prices.is_empty() {
            return Self::default();
        }
        let n = prices.len() as f64;
        let sum: i64 = prices.iter().sum();
        let avg = sum as f64 / n;

        let mut sorted = prices.to_vec();
        sorted.sort_unstable();
        let median = median_of_sorted(&sorted);

        let min = *sorted.first().unwrap();
        let max = *sorted.last().unwrap();

        let variance = prices
            .iter()
            .map(|&p| {
                let d = p as f64 - avg;
                d * d
            })
            .sum::<f64>()
            / n;
        let stddev = variance.sqrt();

        Self {
            avg: Some(avg),
            median: Some(median),
            min: Some(min),
            max: Some(max),
            stddev: Some(stddev),
        }
    }
}

fn median_of_sorted(sorted: &[i64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
    }
}

/// One row of hourly IP statistics. `hour_bucket_s` is the floor of
/// the wall-clock hour this row describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyBucket {
    pub ip_id: u64,
    pub hour_bucket_s: u64,
    pub inflow: i64,
    pub outflow: i64,
    pub active_count: i64,
    pub sample_count: i64,
    /// outflow / inflow when inflow > 0, else undefined.
    pub liquidity_index: Option<f64>,
    pub price_stats: PriceStats,
}

impl HourlyBucket {
    pub fn liquidity_index_of(inflow: i64, outflow: i64) -> Option<f64> {
        if inflow > 0 {
            Some(outflow as f64 / inflow as f64)
        } else {
            None
        }
    }
}

/// Sum-of-children + median-of-children + weighted-average-of-children's
/// averages rollup bucket. Shared shape for daily/weekly/monthly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupBucket {
    pub ip_id: u64,
    pub bucket_start_s: u64,
    pub inflow: i64,
    pub outflow: i64,
    pub liquidity_index: Option<f64>,
    pub median_of_children_avg: Option<f64>,
    pub weighted_avg_price: Option<f64>,
    pub child_count: u32,
}

pub type DailyBucket = RollupBucket;
pub type WeeklyBucket = RollupBucket;
pub type MonthlyBucket = RollupBucket;

/// Sums inflow/outflow, averages the children's averages weighted by their
/// sample_count, and takes the median of the children's averages. Pure
/// helper used by the archiver collaborator.
pub fn rollup_hourly(ip_id: u64, bucket_start_s: u64, children: &[HourlyBucket]) -> RollupBucket {
    let inflow: i64 = children.iter().map(|c| c.inflow).sum();
    let outflow: i64 = children.iter().map(|c| c.outflow).sum();

    let total_samples: i64 = children.iter().map(|c| c.sample_count).sum();
    let weighted_avg_price = if total_samples > 0 {
        let weighted_sum: f64 = children
            .iter()
            .filter_map(|c| c.price_stats.avg.map(|a| a * c.sample_count as f64))
            .sum();
        Some(weighted_sum / total_samples as f64)
    } else {
        None
    };

    let mut avgs: Vec<f64> = children.iter().filter_map(|c| c.price_stats.avg).collect();
    avgs.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median_of_children_avg = if avgs.is_empty() {
        None
    } else {
        let n = avgs.len();
        Some(if n % 2 == 1 {
            avgs[n / 2]
        } else {
            (avgs[n / 2 - 1] + avgs[n / 2]) / 2.0
        })
    };

    RollupBucket {
        ip_id,
        bucket_start_s,
        inflow,
        outflow,
        liquidity_index: HourlyBucket::liquidity_index_of(inflow, outflow),
        median_of_children_avg,
        weighted_avg_price,
        child_count: children.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liquidity_index_is_none_when_inflow_zero() {
        assert_eq!(HourlyBucket::liquidity_index_of(0, 5), None);
    }

    #[test]
    fn liquidity_index_divides_outflow_by_inflow() {
        assert_eq!(HourlyBucket::liquidity_index_of(4, 2), Some(0.5));
    }

    #[test]
    fn price_stats_on_empty_is_all_none() {
        let s = PriceStats::from_prices(&[]);
        assert_eq!(s, PriceStats::default());
    }

    #[test]
    fn price_stats_basic() {
        let s = PriceStats::from_prices(&[100, 200, 300]);
        assert_eq!(s.min, Some(100));
        assert_eq!(s.max, Some(300));
        assert_eq!(s.avg, Some(200.0));
        assert_eq!(s.median, Some(200.0));
    }

    #[test]
    fn price_stats_even_count_median_averages_middle_two() {
        let s = PriceStats::from_prices(&[100, 200, 300, 400]);
        assert_eq!(s.median, Some(250.0));
    }

    #[test]
    fn rollup_sums_inflow_and_outflow_monotonically() {
        let mk = |inflow, outflow, avg, samples| HourlyBucket {
            ip_id: 1,
            hour_bucket_s: 0,
            inflow,
            outflow,
            active_count: 0,
            sample_count: samples,
            liquidity_index: HourlyBucket::liquidity_index_of(inflow, outflow),
            price_stats: PriceStats {
                avg: Some(avg),
                median: Some(avg),
                min: Some(avg as i64),
                max: Some(avg as i64),
                stddev: Some(0.0),
            },
        };

        let children = vec![mk(2, 1, 100.0, 10), mk(3, 2, 200.0, 20)];
        let r = rollup_hourly(1, 0, &children);

        assert_eq!(r.inflow, 5);
        assert_eq!(r.outflow, 3);
        assert_eq!(r.child_count, 2);
        // weighted avg = (100*10 + 200*20) / 30 = 166.67
        assert!((r.weighted_avg_price.unwrap() - 166.666_66).abs() < 0.01);
    }
}
