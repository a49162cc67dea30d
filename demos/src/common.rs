use std::path::Path;
use std::sync::Arc;

use candlewick::{BarProvider, ChunkDelay, Collector, CollectorBuilder};
use tracing_subscriber::fmt::format::FmtSpan;

/// Install a human-friendly subscriber with env-based filtering.
///
/// Suggested: `RUST_LOG=info,candlewick=debug`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// The provider used by the demos: a synthetic source, so they run offline.
#[must_use]
pub fn get_provider() -> Arc<dyn BarProvider> {
    Arc::new(candlewick_mock::MockProvider::new())
}

/// A builder writing under `root`, without inter-chunk pauses.
#[must_use]
pub fn builder(root: &Path) -> CollectorBuilder {
    Collector::builder()
        .with_provider(get_provider())
        .data_dir(root.join("data"))
        .status_path(root.join("data").join("status.json"))
        .chunk_delay(ChunkDelay {
            base_ms: 0,
            jitter_percent: 0,
        })
}

/// A scratch directory under the system temp dir.
#[must_use]
pub fn scratch_dir(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("candlewick-demo-{name}-{}", std::process::id()))
}
