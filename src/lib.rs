//! Tollgate - Admission Control for Metered APIs
//!
//! This crate implements the admission layer of a metered API gateway:
//! per-caller fixed-window rate limiting and tier-based monthly quotas,
//! with every counter held in an external Redis-compatible store so any
//! number of gateway instances converge on the same counts. The engine
//! produces transport-agnostic decisions; rendering them into HTTP
//! responses is left to the embedding service.

pub mod admission;
pub mod config;
pub mod error;
pub mod store;
