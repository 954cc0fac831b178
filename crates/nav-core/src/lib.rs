pub mod config;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod notion;
pub mod server;
