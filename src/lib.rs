// src/lib.rs
//! Strategy insights: document and website intake, LLM analysis with a
//! deterministic fallback, insight review and presentation outlines.

pub mod ai;
pub mod api;
pub mod backfill;
pub mod config;
pub mod error;
pub mod repository;
pub mod services;
pub mod storage;
pub mod web;

pub use error::{InsightError, InsightResult};
