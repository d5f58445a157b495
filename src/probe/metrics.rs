use anyhow::Result;
use prometheus::GaugeVec;

use crate::{metric, DEFAULT_METRICS_NAMESPACE};

use super::{ProbeResult, Status};

/// Per-prober gauges, labelled by prober name and endpoint.
#[derive(Clone)]
pub struct ProbeMetrics {
    total: GaugeVec,
    total_time: GaugeVec,
    duration: GaugeVec,
    status: GaugeVec,
    sla: GaugeVec,
}

impl std::fmt::Debug for ProbeMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeMetrics").finish_non_exhaustive()
    }
}

impl ProbeMetrics {
    pub fn new(subsystem: &str) -> Result<Self> {
        let ns = DEFAULT_METRICS_NAMESPACE;
        let by_status = ["name", "status", "endpoint"];
        let by_name = ["name", "endpoint"];
        Ok(Self {
            total: metric::new_gauge(ns, subsystem, "", "total", "Total Probed Counts", &by_status)?,
            total_time: metric::new_gauge(
                ns,
                subsystem,
                "",
                "total_time",
                "Total Time(Seconds) of Status",
                &by_status,
            )?,
            duration: metric::new_gauge(
                ns,
                subsystem,
                "",
                "duration",
                "Probe Duration(Milliseconds)",
                &by_status,
            )?,
            status: metric::new_gauge(ns, subsystem, "", "status", "Probe Status", &by_name)?,
            sla: metric::new_gauge(ns, subsystem, "", "sla", "Probe SLA", &by_name)?,
        })
    }

    pub fn export(&self, r: &ProbeResult) {
        let name = r.name.as_str();
        let endpoint = r.endpoint.as_str();
        let status = r.status.as_str();

        let count = r.stat.status.get(&r.status).copied().unwrap_or_default();
        self.total
            .with_label_values(&[name, status, endpoint])
            .set(count as f64);

        self.total_time
            .with_label_values(&[name, Status::Up.as_str(), endpoint])
            .set(r.stat.uptime.as_secs_f64());
        self.total_time
            .with_label_values(&[name, Status::Down.as_str(), endpoint])
            .set(r.stat.downtime.as_secs_f64());

        self.duration
            .with_label_values(&[name, status, endpoint])
            .set(r.round_trip_time.as_millis() as f64);
        self.status
            .with_label_values(&[name, endpoint])
            .set(r.status.value() as f64);
        self.sla
            .with_label_values(&[name, endpoint])
            .set(r.stat.sla());
    }
}
