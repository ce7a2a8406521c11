//! Handlers served next to the request pipeline.

pub mod health;

pub use health::liveness_handler;
