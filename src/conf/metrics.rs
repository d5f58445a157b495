use anyhow::Result;
use chrono::Utc;
use prometheus::GaugeVec;

use crate::{metric, DEFAULT_METRICS_NAMESPACE};

/// Availability of a remote configuration endpoint.
#[derive(Clone)]
pub struct ConfigMetrics {
    timestamp: GaugeVec,
    status: GaugeVec,
}

impl std::fmt::Debug for ConfigMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigMetrics").finish_non_exhaustive()
    }
}

impl ConfigMetrics {
    pub fn new() -> Result<Self> {
        let ns = DEFAULT_METRICS_NAMESPACE;
        Ok(Self {
            timestamp: metric::new_gauge(
                ns,
                "config",
                "availability",
                "timestamp",
                "Unix timestamp (in seconds) when the config was last successfully fetched via HTTP",
                &["endpoint"],
            )?,
            status: metric::new_gauge(
                ns,
                "config",
                "availability",
                "status",
                "Whether the config is currently available via HTTP (1=available, 0=not available)",
                &["endpoint"],
            )?,
        })
    }

    pub fn observe(&self, endpoint: &str, available: bool) {
        if available {
            self.status.with_label_values(&[endpoint]).set(1.0);
            self.timestamp
                .with_label_values(&[endpoint])
                .set(Utc::now().timestamp() as f64);
        } else {
            self.status.with_label_values(&[endpoint]).set(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe() {
        let m = ConfigMetrics::new().unwrap();
        let endpoint = "http://config.test/metrics-observe.yaml";
        m.observe(endpoint, true);
        assert_eq!(m.status.with_label_values(&[endpoint]).get(), 1.0);
        assert!(m.timestamp.with_label_values(&[endpoint]).get() > 0.0);

        let ts = m.timestamp.with_label_values(&[endpoint]).get();
        m.observe(endpoint, false);
        assert_eq!(m.status.with_label_values(&[endpoint]).get(), 0.0);
        assert_eq!(m.timestamp.with_label_values(&[endpoint]).get(), ts);

        // a second instance shares the registered gauges
        let again = ConfigMetrics::new().unwrap();
        assert_eq!(again.status.with_label_values(&[endpoint]).get(), 0.0);
    }
}
