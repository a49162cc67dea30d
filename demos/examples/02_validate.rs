use candlewick::Timeframe;
use candlewick_demos::common::{builder, init_tracing, scratch_dir};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let root = scratch_dir("validate");
    let collector = builder(&root)
        .timeframes(&[Timeframe::M15, Timeframe::H1])
        .build()?;
    let now = chrono::Utc::now();
    let timeframes = collector.config().timeframes.clone();
    for tf in timeframes {
        let _ = collector.tick(tf, now).await;
    }

    for health in collector.validate_all(now).await? {
        if !health.is_healthy() {
            println!(
                "{} {}: {} bars, {} gaps, stale={}",
                health.instrument,
                health.timeframe,
                health.bar_count,
                health.gap_count,
                health.stale.is_some()
            );
        }
    }
    Ok(())
}
