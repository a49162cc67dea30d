use candlewick::Timeframe;
use candlewick_demos::common::{builder, init_tracing, scratch_dir};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let root = scratch_dir("tracing");
    let collector = builder(&root).timeframes(&[Timeframe::H1]).build()?;

    // One batch over the whole universe: every series is empty, so each is seeded.
    let report = collector.tick(Timeframe::H1, chrono::Utc::now()).await;
    println!(
        "{} series, {} failures, files under {}",
        report.outcomes.len(),
        report.failures(),
        root.display()
    );
    Ok(())
}
