pub mod config;
pub mod enrichment;
pub mod error;
pub mod leads;
pub mod report;
pub mod telemetry;
pub mod wizard;
