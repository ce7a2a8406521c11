//! Networking: listener configuration, transport middleware and server lifecycle.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;

pub use config::NetworkConfig;
pub use middleware::build_http_layers;
pub use module::NetworkModule;
