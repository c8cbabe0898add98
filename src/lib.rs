//! Energomera meter exporter library
//!
//! Reads Energomera meters over an IEC 61107 style serial session and keeps the
//! latest readings as Prometheus gauges.

pub mod models;
pub mod api;
pub mod config;
pub mod exporter;
pub mod metering_61107;
pub mod supervisor;

// Re-export common types for easier access
pub use models::{Device, Measurement, Metric};
pub use api::ApiManager;
pub use config::Config;
pub use exporter::{AppStatusRecorder, CycleRecorder, GaugeSink, PrometheusSink};
pub use metering_61107::Iec61107Manager;
