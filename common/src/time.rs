use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in whole seconds.
pub fn now_s() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs()
}

/// Current Unix time in whole milliseconds, used for sidecar pop-time
/// bookkeeping where rescue-age precision matters.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as u64
}

/// Floors a Unix-second timestamp to the start of its UTC+9 (JST) day.
/// Bucket boundaries for daily/weekly/monthly rollups are fixed to JST
/// regardless of the host's local timezone.
pub fn floor_to_jst_day(ts_s: u64) -> u64 {
    const JST_OFFSET_S: u64 = 9 * 3600;
    const DAY_S: u64 = 86_400;
    let shifted = ts_s + JST_OFFSET_S;
    (shifted / DAY_S) * DAY_S - JST_OFFSET_S
}

/// Floors a Unix-second timestamp to the start of its wall-clock hour.
pub fn floor_to_hour(ts_s: u64) -> u64 {
    const HOUR_S: u64 = 3600;
    (ts_s / HOUR_S) * HOUR_S
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_to_hour_truncates() {
        assert_eq!(floor_to_hour(3_661), 3_600);
        assert_eq!(floor_to_hour(3_600), 3_600);
    }

    #[test]
    fn floor_to_jst_day_shifts_boundary() {
        // 2024-01-01T00:00:00Z is still 2023-12-31 09:00 JST... no: JST = UTC+9,
        // so UTC midnight is 09:00 JST, well inside the same JST day as
        // UTC 15:00 the day before (which is 00:00 JST).
        let utc_1500_prev_day = 1_704_034_800u64; // 2023-12-31T15:00:00Z == 2024-01-01T00:00:00+09:00
        let utc_midnight = 1_704_067_200u64; // 2024-01-01T00:00:00Z == 2024-01-01T09:00:00+09:00
        assert_eq!(
            floor_to_jst_day(utc_1500_prev_day),
            floor_to_jst_day(utc_midnight)
        );
    }
}
