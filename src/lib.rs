pub mod collector;
pub mod config;
pub mod constants;
pub mod error;
pub mod fetcher;
pub mod forecast;
pub mod logging;
pub mod observability;
pub mod persistence;
pub mod pipeline;
pub mod report;
pub mod server;
pub mod session;
pub mod sources;
pub mod types;

// Ports the core depends on, and the adapters that implement them
pub mod app;
pub mod infra;
