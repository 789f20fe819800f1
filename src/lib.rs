pub mod analysis;
pub mod config;
pub mod normalize;
pub mod report;

use tracing_subscriber::EnvFilter;

pub use analysis::{AggregatedResult, Aggregator, AnalysisBackend, AnalysisError, HttpBackend};
pub use normalize::{AnalysisRecord, ClassificationEntry, ResponseNormalizer};
pub use report::{generate_report, GeneratedReport, ReportVariant};

/// Install the stderr log subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}
