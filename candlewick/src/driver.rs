use std::collections::BTreeMap;
use std::sync::Arc;

use candlewick_core::{DriverHandle, SeriesOutcome, TickReport, Timeframe};
use chrono::{DateTime, Datelike, Months, NaiveTime, TimeDelta, Utc};
use tokio::sync::oneshot;

use crate::collector::Collector;

/// The first bar boundary of `timeframe` strictly after `now`.
///
/// Intraday and daily boundaries sit on the UTC epoch grid. Weeks start on
/// Monday 00:00 UTC; months and quarters on the first day of the month.
#[must_use]
pub fn next_due(timeframe: Timeframe, now: DateTime<Utc>) -> DateTime<Utc> {
    let step = timeframe.minutes() * 60;
    match timeframe {
        Timeframe::W1 => {
            let days_since_monday = i64::from(now.weekday().num_days_from_monday());
            let monday = now.date_naive() - TimeDelta::days(days_since_monday);
            (monday + TimeDelta::weeks(1))
                .and_time(NaiveTime::MIN)
                .and_utc()
        }
        Timeframe::Mo1 | Timeframe::Mo3 => {
            let span = if timeframe == Timeframe::Mo1 { 1 } else { 3 };
            let month0 = now.month0() - now.month0() % span;
            let start = now
                .date_naive()
                .with_day(1)
                .and_then(|d| d.with_month0(month0))
                .unwrap_or_else(|| now.date_naive());
            start
                .checked_add_months(Months::new(span))
                .unwrap_or(start)
                .and_time(NaiveTime::MIN)
                .and_utc()
        }
        _ => {
            let ts = now.timestamp();
            DateTime::from_timestamp(ts - ts.rem_euclid(step) + step, 0)
                .unwrap_or(now + timeframe.nominal())
        }
    }
}

impl Collector {
    /// Reconcile every registered instrument at `timeframe` as of `now`.
    ///
    /// Instruments are processed concurrently; the shared limiter bounds the
    /// provider calls in flight. Markers of changed series are recorded and
    /// the status record is flushed once at the end of the batch.
    pub async fn tick(&self, timeframe: Timeframe, now: DateTime<Utc>) -> TickReport {
        let mut report = self.gather(timeframe, now).await;
        self.settle(std::slice::from_mut(&mut report)).await;
        report
    }

    /// [`tick`](Self::tick) for several timeframes at once.
    ///
    /// All timeframes are fanned out together, so a slow backfill at one
    /// timeframe does not hold back the others, and the status record is
    /// flushed once for the whole batch. Reports come back in the order of
    /// `timeframes`.
    pub async fn tick_all(&self, timeframes: &[Timeframe], now: DateTime<Utc>) -> Vec<TickReport> {
        let mut reports =
            futures::future::join_all(timeframes.iter().map(|&tf| self.gather(tf, now))).await;
        self.settle(&mut reports).await;
        reports
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "candlewick::driver::tick",
            skip(self),
            fields(timeframe = %timeframe, instruments = self.registry.len()),
        )
    )]
    async fn gather(&self, timeframe: Timeframe, now: DateTime<Utc>) -> TickReport {
        let tasks = self.registry.iter().map(|inst| async move {
            SeriesOutcome {
                instrument: inst.key().clone(),
                timeframe,
                outcome: self.reconcile(inst.key(), timeframe, now).await,
            }
        });
        TickReport {
            timeframe,
            started_at: now,
            outcomes: futures::future::join_all(tasks).await,
            status_error: None,
        }
    }

    /// Record the markers of a finished batch and flush the status record
    /// once, if anything changed.
    async fn settle(&self, reports: &mut [TickReport]) {
        let mut changed = 0usize;
        for o in reports.iter().flat_map(|r| &r.outcomes) {
            if let Some(marker) = o.outcome.marker() {
                self.status.record(marker);
                changed += 1;
            }
        }
        let status_error = if changed > 0 {
            self.status.flush().await.err()
        } else {
            None
        };
        for report in reports.iter_mut() {
            report.status_error.clone_from(&status_error);
        }

        #[cfg(feature = "tracing")]
        {
            for report in reports.iter() {
                let up_to_date = report
                    .outcomes
                    .iter()
                    .filter(|o| matches!(o.outcome, candlewick_core::ReconcileOutcome::UpToDate))
                    .count();
                tracing::info!(
                    timeframe = %report.timeframe,
                    up_to_date,
                    failed = report.failures(),
                    "tick complete"
                );
            }
            if let Some(e) = &status_error {
                tracing::error!(error = %e, changed, "status record could not be written");
            }
        }
    }

    /// Drive collection until `stop` fires or its sender is dropped.
    ///
    /// Every configured timeframe is processed once at start-up, then again
    /// each time its next bar boundary passes. Timeframes due at the same
    /// check run as one batch. The loop sleeps `tick_interval` between
    /// checks; a batch in progress is completed before the loop observes the
    /// stop signal.
    pub async fn run_until(&self, mut stop: oneshot::Receiver<()>) {
        let mut due: BTreeMap<Timeframe, DateTime<Utc>> = self
            .cfg
            .timeframes
            .iter()
            .map(|&tf| (tf, DateTime::<Utc>::MIN_UTC))
            .collect();
        let interval = self.cfg.tick_interval;

        #[cfg(feature = "tracing")]
        tracing::info!(
            timeframes = due.len(),
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "driver started"
        );

        loop {
            let now = Utc::now();
            let ready: Vec<Timeframe> = due
                .iter()
                .filter(|&(_, next)| now >= *next)
                .map(|(&tf, _)| tf)
                .collect();
            if !ready.is_empty() {
                let _reports = self.tick_all(&ready, now).await;
                for tf in ready {
                    due.insert(tf, next_due(tf, now));
                }
            }

            tokio::select! {
                biased;
                _ = &mut stop => {
                    #[cfg(feature = "tracing")]
                    tracing::info!("driver stopping");
                    return;
                }
                () = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Spawn the driver loop on the current Tokio runtime.
    ///
    /// The returned handle stops the loop gracefully via
    /// [`DriverHandle::stop`]; dropping it aborts the task.
    #[must_use]
    pub fn spawn(self: Arc<Self>) -> DriverHandle {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            self.run_until(stop_rx).await;
        });
        DriverHandle::new(join, stop_tx)
    }
}
