pub mod enrichment;
pub mod monitor;

pub use enrichment::{enrich, EnrichOptions};
pub use monitor::{Alert, MetricsSummary, Monitor, SystemStatus};
