pub mod config;
pub mod models;
pub mod notion;
pub mod pipeline;
pub mod runner;
pub mod scrapers;
pub mod snapshot;
pub mod telemetry;
