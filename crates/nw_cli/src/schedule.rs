use chrono::{DateTime, Datelike, Duration as TimeDelta, Timelike, Utc};
use nw_scrapers::cli::format_summary;
use nw_scrapers::RunCoordinator;
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_HOURS: &str = "0,3,6,9,12,15,18,21";

/// UTC hours of the day at which a run fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hours(Vec<u32>);

impl Hours {
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

impl FromStr for Hours {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut hours = s
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|h| match h.parse::<u32>() {
                Ok(hour) if hour < 24 => Ok(hour),
                _ => Err(format!("Invalid hour: {}", h)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if hours.is_empty() {
            return Err("At least one hour is required".to_string());
        }
        hours.sort_unstable();
        hours.dedup();
        Ok(Hours(hours))
    }
}

impl fmt::Display for Hours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours: Vec<String> = self.0.iter().map(u32::to_string).collect();
        f.write_str(&hours.join(", "))
    }
}

/// Remembers the hour bucket of the last firing so that a bucket fires at
/// most once.
#[derive(Debug, Clone, Default)]
pub struct TriggerGuard {
    last_fired: Option<String>,
}

impl TriggerGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `YYYY-M-D-H` in UTC.
    pub fn bucket_key(at: DateTime<Utc>) -> String {
        format!("{}-{}-{}-{}", at.year(), at.month(), at.day(), at.hour())
    }

    /// Marks the bucket of `at` as fired. False when it already was.
    pub fn try_fire(&mut self, at: DateTime<Utc>) -> bool {
        let key = Self::bucket_key(at);
        if self.last_fired.as_deref() == Some(key.as_str()) {
            return false;
        }
        self.last_fired = Some(key);
        true
    }

    pub fn last_fired(&self) -> Option<&str> {
        self.last_fired.as_deref()
    }

    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}

#[derive(Debug, Clone)]
pub struct Schedule {
    hours: Hours,
    jitter: Duration,
}

impl Schedule {
    pub fn new(hours: Hours, jitter: Duration) -> Self {
        Self { hours, jitter }
    }

    /// First top of a scheduled hour strictly after `after`.
    pub fn next_fire(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let into_hour = TimeDelta::seconds(i64::from(after.minute() * 60 + after.second()))
            + TimeDelta::nanoseconds(i64::from(after.nanosecond()));
        let hour_start = after - into_hour;

        (1..=24)
            .map(|step| hour_start + TimeDelta::hours(step))
            .find(|candidate| self.hours.as_slice().contains(&candidate.hour()))
            .unwrap_or(hour_start + TimeDelta::hours(24))
    }

    /// Random start delay in `[0, jitter]`.
    pub fn jitter_delay(&self) -> Duration {
        let max = self.jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}

/// Fires `coordinator` at every scheduled hour, forever. Runs are awaited
/// inline, so a slow run delays the next trigger instead of overlapping it.
pub async fn run_forever(schedule: &Schedule, coordinator: &RunCoordinator, filter: Option<&str>) {
    let mut guard = TriggerGuard::new();
    info!("🕓 Scheduler planned at {} UTC", schedule.hours);

    loop {
        let now = Utc::now();
        let next = schedule.next_fire(now);
        info!("💤 Next run at {}", next.to_rfc3339());
        tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;

        if !guard.try_fire(next) {
            info!("⏭️ Already ran in bucket {}, skipping", TriggerGuard::bucket_key(next));
            continue;
        }

        let delay = schedule.jitter_delay();
        info!("⏳ Waiting {}ms before starting", delay.as_millis());
        tokio::time::sleep(delay).await;

        let summary = coordinator.run_matching(filter).await;
        print!("{}", format_summary(&summary));
    }
}
