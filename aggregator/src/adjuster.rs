/// Inputs to one interval-adjustment decision, taken after a crawl result
/// has been folded into the state machine and hourly counters.
#[derive(Debug, Clone, Copy)]
pub struct AdjustInput {
    pub pages_on_sale: u32,
    pub pages_sold: u32,
    pub current_weight: f64,
    pub inflow: i64,
    pub outflow: i64,
    pub is_first_crawl: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustResult {
    pub new_interval_s: u64,
    pub new_weight: f64,
}

const ACCELERATE_STEP_S: i64 = 15 * 60;
const DECELERATE_STEP_S: i64 = 15 * 60;
const REGRESS_STEP_S: i64 = 5 * 60;

/// Pure decision on each completed crawl. `current_weight` is converted back
/// to an interval via `base_interval_s / current_weight`; the result is
/// re-clamped to `[min_interval_s, max_interval_s]` and converted back to a
/// weight (`base_interval_s / new_interval_s`) for the descriptor.
pub fn adjust(
    input: AdjustInput,
    base_interval_s: u64,
    min_interval_s: u64,
    max_interval_s: u64,
) -> AdjustResult {
    let current_interval_s = if input.current_weight > 0.0 {
        (base_interval_s as f64 / input.current_weight).round() as i64
    } else {
        base_interval_s as i64
    };

    let base = base_interval_s as i64;
    let new_interval_s = if input.is_first_crawl {
        current_interval_s
    } else if input.inflow > 100 * input.pages_on_sale as i64
        || input.outflow > 100 * input.pages_sold as i64
    {
        current_interval_s - ACCELERATE_STEP_S
    } else if input.inflow < 50 * input.pages_on_sale as i64
        && input.outflow < 3 * input.pages_sold as i64
    {
        current_interval_s + DECELERATE_STEP_S
    } else {
        match current_interval_s.cmp(&base) {
            std::cmp::Ordering::Less => (current_interval_s + REGRESS_STEP_S).min(base),
            std::cmp::Ordering::Greater => (current_interval_s - REGRESS_STEP_S).max(base),
            std::cmp::Ordering::Equal => current_interval_s,
        }
    };

    let clamped = new_interval_s.clamp(min_interval_s as i64, max_interval_s as i64) as u64;
    let new_weight = base_interval_s as f64 / clamped as f64;

    AdjustResult {
        new_interval_s: clamped,
        new_weight,
    }
}
