//! Student score prediction service: feature validation, model evaluation,
//! a shared prediction cache and the HTTP surface around them.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
