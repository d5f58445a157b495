use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{probe, DEFAULT_TIME_FORMAT};

fn format_time(t: &DateTime<Utc>, format: &str) -> String {
    let format = if format.trim().is_empty() {
        DEFAULT_TIME_FORMAT
    } else {
        format
    };
    t.format(format).to_string()
}

fn format_duration(d: Duration) -> String {
    humantime::format_duration(Duration::from_secs(d.as_secs())).to_string()
}

/// One alert message for a single result.
pub fn to_text(r: &probe::ProbeResult) -> String {
    format!(
        "[{}] {}\n{} - ⏱ {}ms\n{}\nProbed at {}",
        r.title(),
        r.status.emoji(),
        r.endpoint,
        r.round_trip_time.as_millis(),
        r.message,
        format_time(&r.start_time, DEFAULT_TIME_FORMAT),
    )
}

/// One line of the SLA summary.
pub fn sla_line(r: &probe::ProbeResult) -> String {
    format!(
        "{} - {} - {} {} - SLA: {:.2}% - Uptime: {} - Downtime: {} - Total: {}",
        r.name,
        r.endpoint,
        r.status.emoji(),
        r.status,
        r.stat.sla(),
        format_duration(r.stat.uptime),
        format_duration(r.stat.downtime),
        r.stat.total,
    )
}

/// The overall SLA summary of every result.
pub fn sla_text(results: &[probe::ProbeResult], timeformat: &str) -> String {
    let mut text = format!(
        "[Overall SLA Report] {}\n\n",
        format_time(&Utc::now(), timeformat)
    );
    for r in results {
        text.push_str(&sla_line(r));
        text.push('\n');
    }
    text
}
