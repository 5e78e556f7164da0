#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    HighOutflow,
    LowLiquidity,
    Surge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub ip_id: u64,
    pub hour_bucket_s: u64,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub metric_value: f64,
    pub threshold_value: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct AlertThresholds {
    pub high_outflow: i64,
    pub low_liquidity: f64,
    pub high_liquidity: f64,
}

/// One alert row per triggering condition. A single hourly snapshot can
/// trigger more than one alert (e.g. high outflow and a liquidity surge
/// in the same hour).
pub fn check_and_create_alerts(
    ip_id: u64,
    hour_bucket_s: u64,
    outflow: i64,
    liquidity_index: Option<f64>,
    thresholds: AlertThresholds,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if outflow >= thresholds.high_outflow {
        alerts.push(Alert {
            ip_id,
            hour_bucket_s,
            kind: AlertKind::HighOutflow,
            severity: AlertSeverity::Warning,
            message: format!("hourly outflow {outflow} reached the high-outflow threshold"),
            metric_value: outflow as f64,
            threshold_value: thresholds.high_outflow as f64,
        });
    }

    if let Some(liquidity) = liquidity_index {
        if liquidity < thresholds.low_liquidity {
            alerts.push(Alert {
                ip_id,
                hour_bucket_s,
                kind: AlertKind::LowLiquidity,
                severity: AlertSeverity::Info,
                message: format!("liquidity index {liquidity:.4} fell below the low-liquidity threshold"),
                metric_value: liquidity,
                threshold_value: thresholds.low_liquidity,
            });
        } else if liquidity > thresholds.high_liquidity {
            alerts.push(Alert {
                ip_id,
                hour_bucket_s,
                kind: AlertKind::Surge,
                severity: AlertSeverity::Critical,
                message: format!("liquidity index {liquidity:.4} exceeded the high-liquidity threshold"),
                metric_value: liquidity,
                threshold_value: thresholds.high_liquidity,
            });
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> AlertThresholds {
        AlertThresholds {
            high_outflow: 50,
            low_liquidity: 0.1,
            high_liquidity: 3.0,
        }
    }

    #[test]
    fn high_outflow_triggers_warning() {
        let alerts = check_and_create_alerts(1, 0, 60, Some(1.0), thresholds());
        assert!(alerts
            .iter()
            .any(|a| a.kind == AlertKind::HighOutflow && a.severity == AlertSeverity::Warning));
    }

    #[test]
    fn low_liquidity_triggers_info() {
        let alerts = check_and_create_alerts(1, 0, 0, Some(0.05), thresholds());
        assert!(alerts
            .iter()
            .any(|a| a.kind == AlertKind::LowLiquidity && a.severity == AlertSeverity::Info));
    }

    #[test]
    fn surge_triggers_critical() {
        let alerts = check_and_create_alerts(1, 0, 0, Some(5.0), thresholds());
        assert!(alerts
            .iter()
            .any(|a| a.kind == AlertKind::Surge && a.severity == AlertSeverity::Critical));
    }

    #[test]
    fn undefined_liquidity_triggers_no_liquidity_alert() {
        let alerts = check_and_create_alerts(1, 0, 0, None, thresholds());
        assert!(!alerts.iter().any(|a| a.kind == AlertKind::LowLiquidity || a.kind == AlertKind::Surge));
    }

    #[test]
    fn quiet_hour_triggers_nothing() {
        let alerts = check_and_create_alerts(1, 0, 1, Some(1.0), thresholds());
        assert!(alerts.is_empty());
    }

    #[test]
    fn high_outflow_alert_carries_the_triggering_metric_and_threshold() {
        let alerts = check_and_create_alerts(1, 0, 60, Some(1.0), thresholds());
        let alert = alerts.iter().find(|a| a.kind == AlertKind::HighOutflow).unwrap();
        assert_eq!(alert.metric_value, 60.0);
        assert_eq!(alert.threshold_value, 50.0);
        assert!(!alert.message.is_empty());
    }
}
