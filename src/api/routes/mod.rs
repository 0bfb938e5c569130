// src/api/routes/mod.rs
//! API routes module
//!
//! This module organizes all HTTP routes for the strategy insights API.

pub mod health;
pub mod v1;
