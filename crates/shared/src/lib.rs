//! Shared utilities and common types for the Placement Prep backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Identity token verification (RS256)
//! - Transcript cursors
//! - Common validation logic

pub mod jwt;
pub mod pagination;
pub mod validation;
