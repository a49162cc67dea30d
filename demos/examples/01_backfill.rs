use std::time::Duration;

use candlewick::{InstrumentKey, ReconcileOutcome, Timeframe};
use candlewick_demos::common::{builder, init_tracing, scratch_dir};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let root = scratch_dir("backfill");
    let collector = builder(&root)
        .bootstrap_history(Some(Duration::from_secs(3 * 24 * 3_600)))
        .build()?;
    let eurusd = InstrumentKey::new("eurusd");
    let now = chrono::Utc::now();

    // Seed three days of 5-minute bars; weekend hours are skipped, not fetched.
    match collector.reconcile(&eurusd, Timeframe::M5, now).await {
        ReconcileOutcome::Bootstrapped { merged, marker } => {
            println!("seeded {merged} bars up to {}", marker.last_bar);
        }
        other => println!("bootstrap: {other:?}"),
    }

    // A second pass right away finds nothing new.
    println!("rerun: {:?}", collector.reconcile(&eurusd, Timeframe::M5, now).await);
    Ok(())
}
