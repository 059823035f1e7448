pub mod analysis;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod health;
pub mod live;
pub mod market_data;
pub mod metrics;
pub mod observability;
pub mod server;
pub mod types;
