//! COLDVAULT Jobs - Archiver and Fallback Reader
//!
//! The archiver moves records past the retention window from the operational
//! store into the archive; the fallback reader serves a record from whichever
//! store holds it. Both take their stores through a [`JobContext`].
//!
//! - `archiver`: one archive run and its report
//! - `fallback`: read-through record lookup
//! - `scheduler`: periodic archive task with graceful shutdown
//! - `metrics`: in-process counters for both jobs
//! - `telemetry`: tracing subscriber setup

pub mod archiver;
pub mod context;
pub mod fallback;
pub mod metrics;
pub mod scheduler;
pub mod telemetry;

pub use archiver::{ArchiveRunReport, Archiver};
pub use context::JobContext;
pub use fallback::{FallbackReader, RecordRead, RecordSource};
pub use metrics::{
    ArchiverMetrics, ArchiverMetricsSnapshot, FallbackMetrics, FallbackMetricsSnapshot,
};
pub use scheduler::{archive_task, ArchiveTaskConfig};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
