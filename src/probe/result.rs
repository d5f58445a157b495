use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{NotificationStrategyData, Status, StatusCounter};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub name: String,
    pub endpoint: String,
    pub start_time: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub round_trip_time: Duration,
    pub status: Status,
    pub pre_status: Status,
    pub message: String,
    pub latest_downtime: Option<DateTime<Utc>>,
    #[serde(with = "humantime_serde")]
    pub recovery_time: Duration,
    pub stat: Stat,
}

impl Default for ProbeResult {
    fn default() -> Self {
        Self {
            name: Default::default(),
            endpoint: Default::default(),
            start_time: Utc::now(),
            round_trip_time: Default::default(),
            status: Status::Init,
            pre_status: Status::Init,
            message: Default::default(),
            latest_downtime: None,
            recovery_time: Default::default(),
            stat: Default::default(),
        }
    }
}

impl ProbeResult {
    pub fn title(&self) -> String {
        if self.pre_status == Status::Init && self.status == Status::Up {
            format!("Monitoring {}", self.name)
        } else if self.status != Status::Up {
            format!("{} Failure", self.name)
        } else {
            format!(
                "{} Recovery - ( {}s Downtime )",
                self.name,
                self.recovery_time.as_secs()
            )
        }
    }

    /// Brings the reported status in line with the raw status counter.
    ///
    /// The status only moves to Up/Down once the counter has seen `threshold`
    /// consecutive identical raw results for that direction.
    pub fn apply_threshold(&mut self, failure: u32, success: u32) {
        let counter = &self.stat.status_counter;
        let (target, threshold) = if counter.current_status {
            (Status::Up, success)
        } else {
            (Status::Down, failure)
        };

        self.pre_status = self.status;
        if self.status == target || counter.status_count < threshold as usize {
            return;
        }

        let now = Utc::now();
        match target {
            Status::Down => self.latest_downtime = Some(now),
            Status::Up if self.status == Status::Down => {
                if let Some(down) = self.latest_downtime {
                    self.recovery_time = (now - down).to_std().unwrap_or_default();
                }
            }
            _ => {}
        }
        self.status = target;
    }

    /// Accounts one finished check into the SLA statistics.
    pub fn do_stat(&mut self, interval: Duration) {
        self.stat.total += 1;
        *self.stat.status.entry(self.status).or_insert(0) += 1;
        match self.status {
            Status::Up => self.stat.uptime += interval,
            Status::Down => self.stat.downtime += interval,
            _ => {}
        }
    }

    /// Takes over the long running statistics of a previously saved result.
    pub fn restore(&mut self, saved: &ProbeResult) {
        let max_len = self.stat.status_counter.max_len();
        let notification = self.stat.notification_strategy_data.settings;

        // a prober that configured fine starts over from Init, never Bad
        let usable = |s: Status| match s {
            Status::Bad | Status::Init => Status::Init,
            s => s,
        };
        self.status = usable(saved.status);
        self.pre_status = usable(saved.pre_status);
        self.latest_downtime = saved.latest_downtime;
        self.recovery_time = saved.recovery_time;
        self.stat = saved.stat.clone();

        self.stat.status_counter.set_max_len(max_len);
        self.stat.notification_strategy_data.settings = notification;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stat {
    pub since: DateTime<Utc>,
    pub total: i64,
    pub status: HashMap<Status, i64>,
    #[serde(with = "humantime_serde")]
    pub uptime: Duration,
    #[serde(with = "humantime_serde")]
    pub downtime: Duration,
    pub notification_strategy_data: NotificationStrategyData,
    pub status_counter: StatusCounter,
}

impl Default for Stat {
    fn default() -> Self {
        Self {
            since: Utc::now(),
            total: Default::default(),
            status: Default::default(),
            uptime: Default::default(),
            downtime: Default::default(),
            notification_strategy_data: Default::default(),
            status_counter: StatusCounter::new(1),
        }
    }
}

impl Stat {
    /// Availability in percent over the accounted up and down time.
    pub fn sla(&self) -> f64 {
        let up = self.uptime.as_secs_f64();
        let down = self.downtime.as_secs_f64();
        if up + down <= 0.0 {
            return 100.0;
        }
        up / (up + down) * 100.0
    }
}

/// The live result of a prober.
///
/// The owning worker is the only writer; everybody else reads a cloned
/// snapshot.
#[derive(Debug, Default)]
pub struct SharedResult(RwLock<ProbeResult>);

impl SharedResult {
    pub fn new(result: ProbeResult) -> Self {
        Self(RwLock::new(result))
    }

    pub fn snapshot(&self) -> ProbeResult {
        self.0.read().clone()
    }

    pub fn status(&self) -> Status {
        self.0.read().status
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut ProbeResult) -> R) -> R {
        f(&mut self.0.write())
    }

    pub fn mark_bad(&self, message: String) {
        let mut r = self.0.write();
        r.status = Status::Bad;
        r.message = message;
    }
}

impl Clone for SharedResult {
    fn clone(&self) -> Self {
        Self::new(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(max_len: usize) -> ProbeResult {
        let mut r = ProbeResult {
            name: "dummy".to_string(),
            ..Default::default()
        };
        r.stat.status_counter = StatusCounter::new(max_len);
        r
    }

    fn check(r: &mut ProbeResult, ok: bool, failure: u32, success: u32) -> Status {
        r.stat
            .status_counter
            .append_status(ok, if ok { "ok" } else { "boom" }.to_string());
        r.apply_threshold(failure, success);
        r.status
    }

    #[test]
    fn test_threshold_suppresses_flaps() {
        let mut r = result_with(3);

        assert_eq!(check(&mut r, true, 3, 2), Status::Init);
        assert_eq!(check(&mut r, true, 3, 2), Status::Up);
        assert_eq!(r.pre_status, Status::Init);

        // a single failure keeps the stable Up status
        assert_eq!(check(&mut r, false, 3, 2), Status::Up);
        assert_eq!(check(&mut r, true, 3, 2), Status::Up);

        assert_eq!(check(&mut r, false, 3, 2), Status::Up);
        assert_eq!(check(&mut r, false, 3, 2), Status::Up);
        assert_eq!(check(&mut r, false, 3, 2), Status::Down);
        assert_eq!(r.pre_status, Status::Up);
        assert!(r.latest_downtime.is_some());

        assert_eq!(check(&mut r, false, 3, 2), Status::Down);
        assert_eq!(r.pre_status, Status::Down);

        assert_eq!(check(&mut r, true, 3, 2), Status::Down);
        assert_eq!(check(&mut r, true, 3, 2), Status::Up);
        assert_eq!(r.pre_status, Status::Down);
    }

    #[test]
    fn test_title() {
        let mut r = result_with(1);
        r.pre_status = Status::Init;
        r.status = Status::Up;
        assert_eq!(r.title(), "Monitoring dummy");
        r.status = Status::Down;
        assert_eq!(r.title(), "dummy Failure");
        r.pre_status = Status::Down;
        r.status = Status::Up;
        r.recovery_time = Duration::from_secs(42);
        assert_eq!(r.title(), "dummy Recovery - ( 42s Downtime )");
    }

    #[test]
    fn test_stat_and_sla() {
        let mut r = result_with(1);
        assert_eq!(r.stat.sla(), 100.0);

        r.status = Status::Up;
        for _ in 0..3 {
            r.do_stat(Duration::from_secs(10));
        }
        r.status = Status::Down;
        r.do_stat(Duration::from_secs(10));

        assert_eq!(r.stat.total, 4);
        assert_eq!(r.stat.status[&Status::Up], 3);
        assert_eq!(r.stat.status[&Status::Down], 1);
        assert_eq!(r.stat.uptime, Duration::from_secs(30));
        assert_eq!(r.stat.downtime, Duration::from_secs(10));
        assert_eq!(r.stat.sla(), 75.0);
    }

    #[test]
    fn test_restore_keeps_current_limits() {
        let mut saved = result_with(10);
        saved.status = Status::Down;
        saved.stat.total = 99;
        for _ in 0..10 {
            saved.stat.status_counter.append_status(false, "boom".to_string());
        }

        let mut r = result_with(2);
        r.restore(&saved);
        assert_eq!(r.status, Status::Down);
        assert_eq!(r.stat.total, 99);
        assert_eq!(r.stat.status_counter.max_len(), 2);
        assert_eq!(r.stat.status_counter.status_history.len(), 2);
        assert_eq!(r.name, "dummy");
    }

    #[test]
    fn test_restore_never_brings_back_bad() {
        let mut saved = result_with(1);
        saved.status = Status::Bad;
        saved.pre_status = Status::Up;
        saved.stat.total = 7;

        let mut r = result_with(1);
        r.restore(&saved);
        assert_eq!(r.status, Status::Init);
        assert_eq!(r.pre_status, Status::Up);
        assert_eq!(r.stat.total, 7);
    }

    #[test]
    fn test_shared_result_snapshot() {
        let shared = SharedResult::new(result_with(2));
        let before = shared.snapshot();

        shared.update(|r| {
            r.stat.status_counter.append_status(false, "boom".to_string());
            r.message = "changed".to_string();
        });

        assert!(before.stat.status_counter.status_history.is_empty());
        assert_eq!(before.message, "");
        assert_eq!(shared.snapshot().message, "changed");

        shared.mark_bad("Bad Configuration: nope".to_string());
        assert_eq!(shared.status(), Status::Bad);
    }

    #[test]
    fn test_result_yaml() {
        let mut r = result_with(3);
        r.status = Status::Up;
        r.do_stat(Duration::from_secs(60));
        let yaml = serde_yaml::to_string(&r).unwrap();
        let back: ProbeResult = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.stat.uptime, Duration::from_secs(60));
        assert_eq!(back.status, Status::Up);
    }
}
