pub mod config;
pub mod error;
pub mod production;
pub mod telemetry;
