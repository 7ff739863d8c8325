use chrono::{Duration as ChronoDuration, NaiveTime, Utc};
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

use crate::config::{RawConfig, ScheduleSpec, ScheduleUnit};
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;

/// Drive the whole pipeline on the configured cadence. The loop awaits
/// each run to completion before arming the next trigger, so two
/// invocations of the same profile can never overlap.
pub async fn run_scheduled(
    pipeline: &Pipeline,
    cfg: &RawConfig,
    schedule: &ScheduleSpec,
) -> Result<()> {
    match &schedule.at {
        Some(at) => {
            if schedule.every != ScheduleUnit::Days {
                return Err(Error::Config(
                    "schedule.at requires schedule.every: days".to_string(),
                ));
            }
            run_daily_at(pipeline, cfg, at).await
        }
        None => run_interval(pipeline, cfg, schedule).await,
    }
}

async fn run_interval(pipeline: &Pipeline, cfg: &RawConfig, schedule: &ScheduleSpec) -> Result<()> {
    let period_secs = schedule.interval.max(1) * schedule.every.seconds();
    let mut ticker = interval(Duration::from_secs(period_secs));
    // A run that outlasts the period delays the next tick instead of
    // bursting to catch up.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!("Running every {} second(s)", period_secs);
    // The first tick resolves immediately; consume it so the first run
    // happens after one full period, matching the trigger cadence.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        pipeline.run_all(cfg).await;
    }
}

async fn run_daily_at(pipeline: &Pipeline, cfg: &RawConfig, at: &str) -> Result<()> {
    let target = parse_at(at)?;
    let tz_hours = cfg.run.io.out_utc.unwrap_or(0);
    let tz = chrono::FixedOffset::east_opt(tz_hours * 3600)
        .ok_or_else(|| Error::Config(format!("run io.out_utc [{}] is invalid", tz_hours)))?;

    tracing::info!("Running daily at {} (UTC{:+})", at, tz_hours);
    loop {
        let now = Utc::now().with_timezone(&tz).naive_local();
        let mut next = now.date().and_time(target);
        if next <= now {
            next = next + ChronoDuration::days(1);
        }
        let wait = (next - now).to_std().unwrap_or(std::time::Duration::ZERO);
        tracing::debug!("Next run at {} ({:?} from now)", next, wait);
        sleep(wait).await;
        pipeline.run_all(cfg).await;
    }
}

fn parse_at(at: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(at, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(at, "%H:%M"))
        .map_err(|_| {
            Error::Config(format!(
                "schedule.at [{}] is not an HH:MM or HH:MM:SS time",
                at
            ))
        })
}
