//! Reconciliation of one (instrument, timeframe) series against the provider.
//!
//! A pass walks a small state machine:
//!
//! - `Idle` reads the stored tail and picks the next phase.
//! - `Bootstrapping` seeds an empty series.
//! - `Backfilling` fetches the missing range in capped chunks, skipping
//!   chunks that are closed or beyond the provider's retention.
//! - `Incremental` appends the latest closed bar.
//! - `Persist` merges everything gathered in one store write.
//!
//! Bars gathered before a failing fetch are discarded, so a failed pass leaves
//! the series exactly as it was.

use std::time::Duration;

use candlewick_core::types::{Bar, FetchRequest, ProviderLimits};
use candlewick_core::{
    CandlewickError, Instrument, InstrumentKey, ReconcileOutcome, ReconciliationMarker, Timeframe,
    resample_to_timeframe, sanitize,
};
use chrono::{DateTime, TimeDelta, Utc};

use crate::backoff::jitter_wait;
use crate::collector::Collector;

/// Trailing period requested when only the latest closed bar is needed.
#[must_use]
pub const fn lookback(timeframe: Timeframe) -> TimeDelta {
    match timeframe {
        Timeframe::M1 | Timeframe::M5 | Timeframe::M15 => TimeDelta::days(1),
        Timeframe::H1 | Timeframe::H4 => TimeDelta::days(7),
        Timeframe::D1 => TimeDelta::days(14),
        Timeframe::W1 => TimeDelta::weeks(8),
        Timeframe::Mo1 => TimeDelta::days(180),
        _ => TimeDelta::days(400),
    }
}

/// Whole bars expected strictly after `last` up to `now`.
///
/// A value of 0 or 1 means the series is at most one bar behind.
#[must_use]
pub fn expected_missing(last: DateTime<Utc>, now: DateTime<Utc>, timeframe: Timeframe) -> i64 {
    (now - last)
        .num_minutes()
        .div_euclid(timeframe.minutes())
        .max(0)
}

/// The next chunk of a backfill: its exclusive end and the bars it covers.
fn next_chunk(
    cursor: DateTime<Utc>,
    remaining: i64,
    timeframe: Timeframe,
    cap: i64,
) -> Option<(DateTime<Utc>, i64)> {
    if remaining <= 0 {
        return None;
    }
    let bars = remaining.min(cap.max(1));
    let width = TimeDelta::try_minutes(timeframe.minutes().checked_mul(bars)?)?;
    Some((cursor.checked_add_signed(width)?, bars))
}

/// Split `remaining` bars starting at `cursor` into half-open windows of at
/// most `cap` bars each.
#[must_use]
pub fn plan_chunks(
    cursor: DateTime<Utc>,
    remaining: i64,
    timeframe: Timeframe,
    cap: usize,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let cap = i64::try_from(cap).unwrap_or(i64::MAX);
    let mut out = Vec::new();
    let (mut cursor, mut remaining) = (cursor, remaining);
    while let Some((end, n)) = next_chunk(cursor, remaining, timeframe, cap) {
        out.push((cursor, end));
        cursor = end;
        remaining -= n;
    }
    out
}

/// Keep bars that are structurally valid, fall in `[start, end)`, and are
/// closed as of `now`.
pub(crate) fn sanitize_chunk(
    bars: Vec<Bar>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    timeframe: Timeframe,
    now: DateTime<Utc>,
) -> Vec<Bar> {
    let nominal = timeframe.nominal();
    let (valid, _rejected) = sanitize(bars);
    #[cfg(feature = "tracing")]
    for e in &_rejected {
        tracing::warn!(timeframe = %timeframe, error = %e, "dropping malformed bar");
    }
    valid
        .into_iter()
        .filter(|b| b.ts >= start && b.ts < end && b.ts + nominal <= now)
        .collect()
}

/// First grid point at or after `ts` for timeframes up to a day.
fn align_up(ts: DateTime<Utc>, timeframe: Timeframe) -> DateTime<Utc> {
    let step = timeframe.minutes() * 60;
    if timeframe.minutes() > 1_440 {
        return ts;
    }
    let rem = ts.timestamp().rem_euclid(step);
    if rem == 0 && ts.timestamp_subsec_nanos() == 0 {
        return ts;
    }
    DateTime::from_timestamp(ts.timestamp() - rem + step, 0).unwrap_or(ts)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Bootstrapping,
    Backfilling {
        cursor: DateTime<Utc>,
        remaining: i64,
    },
    Incremental {
        last: DateTime<Utc>,
    },
    Persist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum PassKind {
    #[default]
    Backfill,
    Bootstrap,
    Incremental,
}

#[derive(Debug, Default)]
struct Pass {
    kind: PassKind,
    fetched: usize,
    skipped: usize,
    gathered: Vec<Bar>,
}

impl Collector {
    /// Bring one series up to date as of `now`.
    ///
    /// Behavior:
    /// - Empty series are seeded with the latest closed bar, or with
    ///   `bootstrap_history` worth of bars when configured.
    /// - A series more than one bar behind is backfilled in chunks no larger
    ///   than the provider's per-request cap.
    /// - Otherwise the latest closed bar is appended if it is new.
    ///
    /// Errors are reported as [`ReconcileOutcome::Failed`]; the series is not
    /// modified in that case.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "candlewick::engine::reconcile",
            skip(self),
            fields(instrument = %key, timeframe = %timeframe),
        )
    )]
    pub async fn reconcile(
        &self,
        key: &InstrumentKey,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> ReconcileOutcome {
        let outcome = match self.registry.require(key) {
            Ok(instrument) => self.run_pass(instrument, timeframe, now).await,
            Err(e) => Err(e),
        };
        outcome.unwrap_or_else(|e| {
            #[cfg(feature = "tracing")]
            tracing::warn!(instrument = %key, timeframe = %timeframe, error = %e, "reconciliation failed");
            ReconcileOutcome::Failed(e)
        })
    }

    async fn run_pass(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, CandlewickError> {
        let key = instrument.key();
        let nominal = timeframe.nominal();
        let limits = self.effective_limits(timeframe);
        let cap = i64::try_from(limits.max_bars_per_request).unwrap_or(i64::MAX);
        let horizon = limits.horizon(now);

        let mut pass = Pass::default();
        let mut phase = Phase::Idle;
        loop {
            phase = match phase {
                Phase::Idle => match self.store.tail(key, timeframe).await? {
                    None => Phase::Bootstrapping,
                    Some(last) if expected_missing(last, now, timeframe) <= 1 => {
                        Phase::Incremental { last }
                    }
                    Some(last) => Phase::Backfilling {
                        cursor: last + nominal,
                        remaining: expected_missing(last, now, timeframe),
                    },
                },
                Phase::Bootstrapping => {
                    pass.kind = PassKind::Bootstrap;
                    let history = self
                        .cfg
                        .bootstrap_history
                        .and_then(|d| TimeDelta::from_std(d).ok())
                        .filter(|d| *d >= nominal);
                    match history {
                        Some(span) => {
                            let cursor = align_up(now - span, timeframe);
                            Phase::Backfilling {
                                cursor,
                                remaining: expected_missing(cursor, now, timeframe),
                            }
                        }
                        None => {
                            let latest = self.latest_closed(instrument, timeframe, now).await?;
                            pass.gathered.extend(latest);
                            Phase::Persist
                        }
                    }
                }
                Phase::Backfilling { cursor, remaining } => {
                    match next_chunk(cursor, remaining, timeframe, cap) {
                        None => Phase::Persist,
                        Some((end, n)) => {
                            self.backfill_chunk(
                                instrument, timeframe, now, horizon, &mut pass, cursor, end,
                            )
                            .await?;
                            Phase::Backfilling {
                                cursor: end,
                                remaining: remaining - n,
                            }
                        }
                    }
                }
                Phase::Incremental { last } => {
                    pass.kind = PassKind::Incremental;
                    match self.latest_closed(instrument, timeframe, now).await {
                        Ok(Some(bar)) if bar.ts > last => {
                            pass.gathered.push(bar);
                            Phase::Persist
                        }
                        Ok(_) => return Ok(ReconcileOutcome::UpToDate),
                        Err(e) if e.is_no_data() => return Ok(ReconcileOutcome::UpToDate),
                        Err(e) => return Err(e),
                    }
                }
                Phase::Persist => return self.persist(key, timeframe, now, pass).await,
            };
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn backfill_chunk(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
        now: DateTime<Utc>,
        horizon: Option<DateTime<Utc>>,
        pass: &mut Pass,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), CandlewickError> {
        if horizon.is_some_and(|h| end <= h) {
            #[cfg(feature = "tracing")]
            tracing::debug!(start = %start, end = %end, "chunk beyond retention; skipped");
            pass.skipped += 1;
            return Ok(());
        }
        if self.calendar.is_closed(instrument, &start, &end, timeframe) {
            #[cfg(feature = "tracing")]
            tracing::debug!(start = %start, end = %end, "chunk inside a closure; skipped");
            pass.skipped += 1;
            return Ok(());
        }

        if pass.fetched > 0 {
            let delay = self.cfg.chunk_delay;
            let wait = jitter_wait(delay.base_ms, u32::from(delay.jitter_percent));
            tokio::time::sleep(Duration::from_millis(wait)).await;
        }
        pass.fetched += 1;

        match self
            .fetch_bars(instrument, FetchRequest::window(timeframe, start, end))
            .await
        {
            Ok(bars) => {
                pass.gathered
                    .extend(sanitize_chunk(bars, start, end, timeframe, now));
                Ok(())
            }
            Err(e) if e.is_no_data() => {
                #[cfg(feature = "tracing")]
                tracing::debug!(start = %start, end = %end, "provider had no bars for chunk");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn persist(
        &self,
        key: &InstrumentKey,
        timeframe: Timeframe,
        now: DateTime<Utc>,
        pass: Pass,
    ) -> Result<ReconcileOutcome, CandlewickError> {
        let (changed, tail) = if pass.gathered.is_empty() {
            (0, None)
        } else {
            let outcome = self.store.merge(key, timeframe, pass.gathered).await?;
            #[cfg(feature = "tracing")]
            for e in &outcome.rejected {
                tracing::warn!(instrument = %key, timeframe = %timeframe, error = %e, "dropped malformed bar during merge");
            }
            (outcome.changed, outcome.bars.last().map(|b| b.ts))
        };

        let marker = tail
            .filter(|_| changed > 0)
            .map(|last_bar| ReconciliationMarker {
                instrument: key.clone(),
                timeframe,
                last_bar,
                updated_at: now,
            });

        #[cfg(feature = "tracing")]
        tracing::info!(
            instrument = %key,
            timeframe = %timeframe,
            fetched = pass.fetched,
            skipped = pass.skipped,
            merged = changed,
            "series reconciled"
        );

        Ok(match (pass.kind, marker) {
            (PassKind::Incremental, Some(marker)) => ReconcileOutcome::Incremental { marker },
            (PassKind::Incremental, None) => ReconcileOutcome::UpToDate,
            (PassKind::Bootstrap, Some(marker)) => ReconcileOutcome::Bootstrapped {
                merged: changed,
                marker,
            },
            (PassKind::Bootstrap, None) if pass.fetched == 0 && pass.skipped > 0 => {
                ReconcileOutcome::UpToDate
            }
            (PassKind::Bootstrap, None) => {
                return Err(CandlewickError::no_data(format!(
                    "no closed {timeframe} bars to seed {key}"
                )));
            }
            (PassKind::Backfill, _) if pass.fetched == 0 => ReconcileOutcome::UpToDate,
            (PassKind::Backfill, marker) => ReconcileOutcome::Backfilled {
                fetched_chunks: pass.fetched,
                skipped_chunks: pass.skipped,
                merged: changed,
                marker,
            },
        })
    }

    /// The newest closed, valid bar from a lookback fetch.
    async fn latest_closed(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<Option<Bar>, CandlewickError> {
        let bars = self
            .fetch_bars(instrument, FetchRequest::lookback(timeframe, lookback(timeframe)))
            .await?;
        let nominal = timeframe.nominal();
        let (valid, _rejected) = sanitize(bars);
        #[cfg(feature = "tracing")]
        for e in &_rejected {
            tracing::warn!(instrument = %instrument.key(), timeframe = %timeframe, error = %e, "dropping malformed bar");
        }
        Ok(valid
            .into_iter()
            .filter(|b| b.ts + nominal <= now)
            .max_by_key(|b| b.ts))
    }

    /// Fetch bars natively, or by resampling a finer timeframe the provider
    /// does serve.
    pub(crate) async fn fetch_bars(
        &self,
        instrument: &Instrument,
        req: FetchRequest,
    ) -> Result<Vec<Bar>, CandlewickError> {
        let symbol = instrument.provider_symbol();
        let target = req.timeframe;
        if self.provider.supports(target) {
            return self.fetch(symbol, req).await;
        }
        let Some(source) = target
            .resample_source()
            .filter(|s| self.provider.supports(*s))
        else {
            return Err(CandlewickError::unsupported(format!(
                "{target} bars from {}",
                self.provider.name()
            )));
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(target_tf = %target, source_tf = %source, "resampling from finer timeframe");
        let raw = self
            .fetch(
                symbol,
                FetchRequest {
                    timeframe: source,
                    span: req.span,
                },
            )
            .await?;
        let (valid, _rejected) = sanitize(raw);
        let bars = resample_to_timeframe(valid, target)?;
        if bars.is_empty() {
            return Err(CandlewickError::no_data(format!("{target} bars for {symbol}")));
        }
        Ok(bars)
    }

    /// Per-request cap and retention for `timeframe`, accounting for
    /// resampling: the source cap is divided by the bucket ratio.
    pub(crate) fn effective_limits(&self, timeframe: Timeframe) -> ProviderLimits {
        if self.provider.supports(timeframe) {
            return self.provider.limits(timeframe);
        }
        match timeframe
            .resample_source()
            .filter(|s| self.provider.supports(*s))
        {
            Some(source) => {
                let mut limits = self.provider.limits(source);
                let ratio = usize::try_from(timeframe.minutes() / source.minutes()).unwrap_or(1);
                limits.max_bars_per_request = (limits.max_bars_per_request / ratio.max(1)).max(1);
                limits
            }
            None => self.provider.limits(timeframe),
        }
    }
}
