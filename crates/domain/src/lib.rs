//! Domain layer for the Placement Prep backend.
//!
//! This crate contains:
//! - Domain models (profiles, discussion groups, messages, submissions)
//! - Pure rules: scoring, prompt construction
//! - Defensive parsers for generated text

pub mod models;
pub mod services;
