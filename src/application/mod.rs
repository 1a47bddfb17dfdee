//! Application services layer.

pub mod api_keys;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod tokens;
