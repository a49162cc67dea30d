use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::types::Bar;
use crate::{CandlewickError, Timeframe};

/// Generic resampler that groups sorted bars by a bucket function and
/// aggregates OHLCV within each bucket.
fn resample_by<F>(mut bars: Vec<Bar>, bucket_of: F) -> Vec<Bar>
where
    F: Fn(DateTime<Utc>) -> Option<DateTime<Utc>>,
{
    bars.sort_by_key(|b| b.ts);

    let mut out: Vec<Bar> = Vec::new();
    let mut iter = bars.into_iter();
    let Some((mut cur_bucket, mut agg)) = iter
        .by_ref()
        .find_map(|b| bucket_of(b.ts).map(|bucket| (bucket, BucketAgg::from(&b))))
    else {
        return out;
    };

    for b in iter {
        let Some(bucket) = bucket_of(b.ts) else {
            continue;
        };
        if bucket == cur_bucket {
            agg.absorb(&b);
        } else {
            out.push(agg.finish(cur_bucket));
            cur_bucket = bucket;
            agg = BucketAgg::from(&b);
        }
    }
    out.push(agg.finish(cur_bucket));
    out
}

struct BucketAgg {
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: u128,
}

impl From<&Bar> for BucketAgg {
    fn from(b: &Bar) -> Self {
        Self {
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
            volume: u128::from(b.volume),
        }
    }
}

impl BucketAgg {
    fn absorb(&mut self, b: &Bar) {
        if b.high > self.high {
            self.high = b.high;
        }
        if b.low < self.low {
            self.low = b.low;
        }
        self.close = b.close;
        self.volume += u128::from(b.volume);
    }

    fn finish(&self, ts: DateTime<Utc>) -> Bar {
        Bar {
            ts,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: u64::try_from(self.volume).unwrap_or(u64::MAX),
        }
    }
}

const fn bucket_minutes(ts: DateTime<Utc>, minutes: i64) -> Option<DateTime<Utc>> {
    let step = minutes * 60;
    let bucket = ts.timestamp() - ts.timestamp().rem_euclid(step);
    DateTime::from_timestamp(bucket, 0)
}

/// Resample bars into UTC-aligned buckets of `minutes`, labelled by the
/// bucket start (left-labelled, left-closed).
///
/// - Open = first open in the bucket (earliest ts)
/// - High = max high, Low = min low
/// - Close = last close in the bucket (latest ts)
/// - Volume = sum of volumes, saturating at `u64::MAX`
///
/// # Errors
/// Returns `Err(CandlewickError::InvalidArg)` if `minutes` is not positive.
pub fn resample_to_minutes(bars: Vec<Bar>, minutes: i64) -> Result<Vec<Bar>, CandlewickError> {
    if minutes <= 0 {
        return Err(CandlewickError::InvalidArg(
            "resample minutes must be positive".into(),
        ));
    }
    Ok(resample_by(bars, |ts| bucket_minutes(ts, minutes)))
}

/// Resample bars of a finer timeframe into `target`.
///
/// # Errors
/// Returns `Err(CandlewickError::InvalidArg)` if `target` is not intraday;
/// calendar-aligned buckets (days, weeks, months) are not synthesized.
pub fn resample_to_timeframe(bars: Vec<Bar>, target: Timeframe) -> Result<Vec<Bar>, CandlewickError> {
    if !target.is_intraday() {
        return Err(CandlewickError::InvalidArg(format!(
            "cannot synthesize {target} bars by resampling"
        )));
    }
    resample_to_minutes(bars, target.minutes())
}
