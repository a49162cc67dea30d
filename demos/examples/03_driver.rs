use std::sync::Arc;
use std::time::Duration;

use candlewick::Timeframe;
use candlewick_demos::common::{builder, init_tracing, scratch_dir};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let root = scratch_dir("driver");
    let collector = Arc::new(
        builder(&root)
            .timeframes(&[Timeframe::M1, Timeframe::M5])
            .tick_interval(Duration::from_secs(1))
            .max_in_flight(4)
            .build()?,
    );

    let handle = Arc::clone(&collector).spawn();
    tokio::time::sleep(Duration::from_secs(5)).await;
    handle.stop().await;

    println!("{} series tracked", collector.status().snapshot().len());
    Ok(())
}
